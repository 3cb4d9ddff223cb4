use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::models::PromoKind;
use crate::services::promo::{self, round2, PromoEvaluation};
use crate::state::AppState;

// POST /api/promo/validate
#[derive(Deserialize)]
pub struct PromoValidateRequest {
    pub code: Option<String>,
    pub amount: Option<f64>,
}

/// Stateless preview of a promo code. Shares the evaluation logic with the
/// booking transaction so the previewed discount always matches the charge.
pub async fn validate_promo(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PromoValidateRequest>,
) -> Response {
    let Some(code) = req
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "valid": false, "error": "Promo code is required" })),
        )
            .into_response();
    };

    let amount = req.amount.unwrap_or(0.0);
    if amount <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "valid": false, "error": "Valid amount is required" })),
        )
            .into_response();
    }

    match promo::evaluate(&state.promos, code, amount) {
        PromoEvaluation::UnknownCode => Json(serde_json::json!({
            "valid": false,
            "error": "Invalid promo code",
            "message": "The promo code you entered is not valid",
        }))
        .into_response(),
        PromoEvaluation::MinimumNotMet { min_amount } => Json(serde_json::json!({
            "valid": false,
            "error": "Minimum amount not met",
            "message": format!("This promo code requires a minimum purchase of ₹{min_amount}"),
            "minAmount": min_amount,
        }))
        .into_response(),
        PromoEvaluation::Applied {
            code,
            kind,
            value,
            discount,
        } => {
            let final_amount = round2(amount - discount);
            let discount_text = match kind {
                PromoKind::Percent => format!("{value}%"),
                PromoKind::Flat => format!("₹{value}"),
            };
            let description = state.promos.get(&code).map(|promo| promo.description.clone());

            Json(serde_json::json!({
                "valid": true,
                "code": code,
                "type": kind,
                "value": value,
                "discount": discount,
                "finalAmount": final_amount,
                "savings": discount,
                "message": format!("{discount_text} discount applied successfully!"),
                "description": description,
            }))
            .into_response()
        }
    }
}

// GET /api/promo/validate
pub async fn list_promos(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let promos: Vec<serde_json::Value> = state
        .promos
        .entries()
        .into_iter()
        .map(|(code, promo)| {
            serde_json::json!({
                "code": code,
                "type": promo.kind,
                "value": promo.value,
                "minAmount": promo.min_amount,
                "description": promo.description,
            })
        })
        .collect();

    Json(serde_json::json!({
        "success": true,
        "count": promos.len(),
        "data": promos,
    }))
}
