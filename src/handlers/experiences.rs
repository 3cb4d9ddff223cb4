use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Experience;
use crate::state::AppState;

// GET /api/experiences
#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceListItem {
    id: String,
    title: String,
    location: String,
    image: String,
    description: String,
    price: f64,
    available_dates: Vec<String>,
    available_times: Vec<String>,
}

impl From<Experience> for ExperienceListItem {
    fn from(exp: Experience) -> Self {
        Self {
            id: exp.id,
            title: exp.title,
            location: exp.location,
            image: exp.image,
            description: exp.description,
            price: exp.price,
            available_dates: exp.available_dates,
            available_times: exp.available_times,
        }
    }
}

pub async fn list_experiences(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * limit;

    let (experiences, total) = {
        let db = state.db.lock().unwrap();
        let experiences = queries::list_experiences(&db, limit, offset)?;
        let total = queries::count_experiences(&db)?;
        (experiences, total)
    };

    let total_pages = if total == 0 { 0 } else { (total + limit - 1) / limit };
    let items: Vec<ExperienceListItem> = experiences.into_iter().map(Into::into).collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "count": items.len(),
        "total": total,
        "page": page,
        "totalPages": total_pages,
        "hasMore": page < total_pages,
        "data": items,
    })))
}

// GET /api/experiences/:id
#[derive(Serialize)]
pub struct SlotAvailability {
    date: String,
    time: String,
    available: i64,
}

pub async fn experience_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if Uuid::parse_str(&id).is_err() {
        return Err(AppError::BadRequest("Invalid experience ID format".to_string()));
    }

    let (experience, slots) = {
        let db = state.db.lock().unwrap();
        let experience = queries::get_experience(&db, &id)?
            .ok_or_else(|| AppError::NotFound("Experience not found".to_string()))?;
        let slots = queries::get_slots(&db, &id)?;
        (experience, slots)
    };

    // Expose remaining availability without internal counters; sold-out slots
    // are omitted entirely.
    let available_slots: Vec<SlotAvailability> = slots
        .iter()
        .filter(|slot| !slot.is_sold_out())
        .map(|slot| SlotAvailability {
            date: slot.date.clone(),
            time: slot.time.clone(),
            available: slot.remaining(),
        })
        .collect();
    let total_available: i64 = available_slots.iter().map(|slot| slot.available).sum();

    Ok(Json(serde_json::json!({
        "success": true,
        "data": {
            "id": experience.id,
            "title": experience.title,
            "location": experience.location,
            "image": experience.image,
            "description": experience.description,
            "price": experience.price,
            "about": experience.about,
            "availableDates": experience.available_dates,
            "availableTimes": experience.available_times,
            "availableSlots": available_slots,
            "totalAvailableSlots": total_available,
        },
    })))
}
