use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, PromoCatalog, PromoKind, MAX_QUANTITY};
use crate::services::availability::{self, SlotError};
use crate::services::promo::{self, PromoEvaluation};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\w+([\.-]?\w+)*@\w+([\.-]?\w+)*(\.\w{2,3})+$").unwrap());

/// Raw create-booking request as it arrives on the wire. Everything is
/// optional here; the coordinator owns validation so that missing fields are
/// reported together instead of as deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub experience_id: Option<String>,
    pub title: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub selected_date: Option<String>,
    pub selected_time: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub promo_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoApplied {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: PromoKind,
    pub value: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_id: String,
    pub experience_title: String,
    pub full_name: String,
    pub email: String,
    pub date: String,
    pub time: String,
    pub quantity: i64,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub promo_applied: Option<PromoApplied>,
    pub status: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Missing required fields")]
    MissingFields { missing: Vec<&'static str> },

    #[error("Invalid experience ID format")]
    InvalidId,

    #[error("Quantity must be between 1 and 20")]
    InvalidQuantity,

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Experience not found")]
    ExperienceNotFound,

    #[error("Selected date or time is not available")]
    InvalidSelection,

    #[error("Not enough slots available")]
    CapacityExceeded { available: i64, requested: i64 },

    #[error("You already have a booking for this slot")]
    DuplicateBooking { existing_id: String },

    #[error("Promo code requires minimum purchase of ₹{min_amount}")]
    PromoMinimumNotMet { min_amount: f64 },

    #[error("booking transaction failed: {0}")]
    Transaction(#[from] anyhow::Error),
}

impl From<SlotError> for BookingError {
    fn from(err: SlotError) -> Self {
        match err {
            SlotError::InvalidSelection => BookingError::InvalidSelection,
            SlotError::CapacityExceeded {
                available,
                requested,
            } => BookingError::CapacityExceeded {
                available,
                requested,
            },
            SlotError::Store(e) => BookingError::Transaction(e),
        }
    }
}

/// Turn a raw booking request into a committed booking plus updated slot
/// counter, or a typed failure with zero side effects. Experience load, slot
/// resolution, duplicate check, booking insert and slot increment all happen
/// inside one transaction; any failure rolls the whole attempt back.
pub fn create_booking(
    conn: &mut Connection,
    promos: &PromoCatalog,
    req: &BookingRequest,
) -> Result<BookingConfirmation, BookingError> {
    let mut missing = vec![];
    let experience_id = require_text(&mut missing, "experienceId", req.experience_id.as_deref());
    let title = require_text(&mut missing, "title", req.title.as_deref());
    let price = require_value(&mut missing, "price", req.price);
    let quantity = require_value(&mut missing, "quantity", req.quantity);
    let date = require_text(&mut missing, "selectedDate", req.selected_date.as_deref());
    let time = require_text(&mut missing, "selectedTime", req.selected_time.as_deref());
    let full_name = require_text(&mut missing, "fullName", req.full_name.as_deref());
    let email = require_text(&mut missing, "email", req.email.as_deref());

    let (
        Some(experience_id),
        Some(title),
        Some(price),
        Some(quantity),
        Some(date),
        Some(time),
        Some(full_name),
        Some(email),
    ) = (experience_id, title, price, quantity, date, time, full_name, email)
    else {
        return Err(BookingError::MissingFields { missing });
    };

    if Uuid::parse_str(experience_id).is_err() {
        return Err(BookingError::InvalidId);
    }

    if !(1..=MAX_QUANTITY).contains(&quantity) {
        return Err(BookingError::InvalidQuantity);
    }

    let email = email.to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(BookingError::InvalidEmail);
    }

    let promo_code = req
        .promo_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    let tx = conn
        .transaction()
        .map_err(|e| BookingError::Transaction(e.into()))?;

    let Some(experience) = queries::get_experience(&tx, experience_id)? else {
        return Err(BookingError::ExperienceNotFound);
    };

    let slot = availability::resolve_slot(&tx, &experience, date, time)?;
    if slot.booked + quantity > slot.capacity {
        return Err(BookingError::CapacityExceeded {
            available: slot.remaining(),
            requested: quantity,
        });
    }

    if let Some(existing) = queries::find_active_duplicate(&tx, experience_id, &email, date, time)?
    {
        return Err(BookingError::DuplicateBooking {
            existing_id: existing.id,
        });
    }

    let subtotal = price * quantity as f64;
    let mut discount = 0.0;
    let mut promo_applied = None;

    if let Some(code) = promo_code {
        match promo::evaluate(promos, code, subtotal) {
            PromoEvaluation::Applied {
                code,
                kind,
                value,
                discount: applied,
            } => {
                discount = applied;
                promo_applied = Some(PromoApplied {
                    code,
                    kind,
                    value,
                    discount: applied,
                });
            }
            PromoEvaluation::MinimumNotMet { min_amount } => {
                // A recognized but under-qualified code aborts the whole
                // booking; unknown codes fall through with no discount.
                return Err(BookingError::PromoMinimumNotMet { min_amount });
            }
            PromoEvaluation::UnknownCode => {}
        }
    }

    let discount = discount.min(subtotal);
    let total = subtotal - discount;

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        experience_id: experience_id.to_string(),
        experience_title: title.to_string(),
        full_name: full_name.to_string(),
        email: email.clone(),
        phone: req
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .map(String::from),
        date: date.to_string(),
        time: time.to_string(),
        quantity,
        price_per_person: price,
        subtotal,
        discount,
        total,
        promo_code: promo_code.map(|code| code.to_uppercase()),
        status: BookingStatus::Confirmed,
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(&tx, &booking)?;
    availability::reserve(&tx, experience_id, date, time, quantity)?;

    tx.commit()
        .map_err(|e| BookingError::Transaction(e.into()))?;

    tracing::info!(
        booking_id = %booking.id,
        experience_id = %booking.experience_id,
        quantity,
        total,
        "booking confirmed"
    );

    Ok(BookingConfirmation {
        booking_id: booking.id,
        experience_title: booking.experience_title,
        full_name: booking.full_name,
        email: booking.email,
        date: booking.date,
        time: booking.time,
        quantity,
        subtotal,
        discount,
        total,
        promo_applied,
        status: BookingStatus::Confirmed.as_str().to_string(),
    })
}

fn require_text<'a>(
    missing: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => Some(v),
        None => {
            missing.push(name);
            None
        }
    }
}

fn require_value<T: Copy>(
    missing: &mut Vec<&'static str>,
    name: &'static str,
    value: Option<T>,
) -> Option<T> {
    if value.is_none() {
        missing.push(name);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Experience, Slot};

    const EXP_ID: &str = "7c9f8f64-5b1a-4f0e-9c5d-2b7a1e3d4f55";

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        let now = Utc::now().naive_utc();
        let experience = Experience {
            id: EXP_ID.to_string(),
            title: "Spice Market Food Walk".to_string(),
            location: "Kochi".to_string(),
            image: "https://example.com/spice.jpg".to_string(),
            description: "Taste your way through the market".to_string(),
            price: 1000.0,
            about: "Street food tour with a local chef.".to_string(),
            available_dates: vec!["2025-07-01".to_string(), "2025-07-02".to_string()],
            available_times: vec!["10:00".to_string(), "14:00".to_string()],
            created_at: now,
            updated_at: now,
        };
        queries::insert_experience(&conn, &experience).unwrap();
        conn
    }

    fn request() -> BookingRequest {
        BookingRequest {
            experience_id: Some(EXP_ID.to_string()),
            title: Some("Spice Market Food Walk".to_string()),
            price: Some(1000.0),
            quantity: Some(2),
            selected_date: Some("2025-07-01".to_string()),
            selected_time: Some("10:00".to_string()),
            full_name: Some("Asha Rao".to_string()),
            email: Some("asha@example.com".to_string()),
            phone: None,
            promo_code: None,
        }
    }

    fn catalog() -> PromoCatalog {
        PromoCatalog::builtin()
    }

    #[test]
    fn test_booking_without_promo() {
        let mut conn = setup();
        let confirmation = create_booking(&mut conn, &catalog(), &request()).unwrap();

        assert_eq!(confirmation.subtotal, 2000.0);
        assert_eq!(confirmation.discount, 0.0);
        assert_eq!(confirmation.total, 2000.0);
        assert_eq!(confirmation.status, "confirmed");
        assert!(confirmation.promo_applied.is_none());

        let stored = queries::get_booking_by_id(&conn, &confirmation.booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.quantity, 2);
        assert_eq!(stored.price_per_person, 1000.0);
    }

    #[test]
    fn test_booking_materializes_slot_lazily() {
        let mut conn = setup();
        let confirmation = create_booking(&mut conn, &catalog(), &request()).unwrap();
        assert_eq!(confirmation.quantity, 2);

        let slot = queries::get_slot(&conn, EXP_ID, "2025-07-01", "10:00")
            .unwrap()
            .unwrap();
        assert_eq!(slot.capacity, 10);
        assert_eq!(slot.booked, 2);
        assert_eq!(queries::get_slots(&conn, EXP_ID).unwrap().len(), 1);
    }

    #[test]
    fn test_booking_with_percent_promo() {
        let mut conn = setup();
        let mut req = request();
        req.promo_code = Some("save10".to_string());

        let confirmation = create_booking(&mut conn, &catalog(), &req).unwrap();
        assert_eq!(confirmation.subtotal, 2000.0);
        assert_eq!(confirmation.discount, 200.0);
        assert_eq!(confirmation.total, 1800.0);

        let applied = confirmation.promo_applied.unwrap();
        assert_eq!(applied.code, "SAVE10");
        assert_eq!(applied.kind, PromoKind::Percent);

        let stored = queries::get_booking_by_id(&conn, &confirmation.booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.promo_code.as_deref(), Some("SAVE10"));
        assert_eq!(stored.discount, 200.0);
    }

    #[test]
    fn test_promo_minimum_not_met_aborts_booking() {
        let mut conn = setup();
        let mut req = request();
        req.price = Some(250.0);
        req.quantity = Some(2); // subtotal 500 < FLAT100 minimum 1000
        req.promo_code = Some("FLAT100".to_string());

        let err = create_booking(&mut conn, &catalog(), &req).unwrap_err();
        match err {
            BookingError::PromoMinimumNotMet { min_amount } => assert_eq!(min_amount, 1000.0),
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing was committed: no booking, no slot row.
        assert_eq!(
            queries::count_bookings_by_email(&conn, "asha@example.com", None).unwrap(),
            0
        );
        assert!(queries::get_slots(&conn, EXP_ID).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_promo_is_ignored() {
        let mut conn = setup();
        let mut req = request();
        req.promo_code = Some("XYZ123".to_string());

        let confirmation = create_booking(&mut conn, &catalog(), &req).unwrap();
        assert_eq!(confirmation.discount, 0.0);
        assert_eq!(confirmation.total, 2000.0);
        assert!(confirmation.promo_applied.is_none());

        // The supplied code is still snapshotted, upper-cased.
        let stored = queries::get_booking_by_id(&conn, &confirmation.booking_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.promo_code.as_deref(), Some("XYZ123"));
    }

    #[test]
    fn test_missing_fields_reported_together() {
        let mut conn = setup();
        let req = BookingRequest {
            experience_id: Some(EXP_ID.to_string()),
            title: Some("Spice Market Food Walk".to_string()),
            ..Default::default()
        };

        let err = create_booking(&mut conn, &catalog(), &req).unwrap_err();
        match err {
            BookingError::MissingFields { missing } => {
                assert_eq!(
                    missing,
                    vec![
                        "price",
                        "quantity",
                        "selectedDate",
                        "selectedTime",
                        "fullName",
                        "email"
                    ]
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_id_quantity_email() {
        let mut conn = setup();

        let mut req = request();
        req.experience_id = Some("not-a-uuid".to_string());
        assert!(matches!(
            create_booking(&mut conn, &catalog(), &req),
            Err(BookingError::InvalidId)
        ));

        for quantity in [0, 21] {
            let mut req = request();
            req.quantity = Some(quantity);
            assert!(matches!(
                create_booking(&mut conn, &catalog(), &req),
                Err(BookingError::InvalidQuantity)
            ));
        }

        let mut req = request();
        req.email = Some("not-an-email".to_string());
        assert!(matches!(
            create_booking(&mut conn, &catalog(), &req),
            Err(BookingError::InvalidEmail)
        ));
    }

    #[test]
    fn test_experience_not_found() {
        let mut conn = setup();
        let mut req = request();
        req.experience_id = Some(Uuid::new_v4().to_string());
        assert!(matches!(
            create_booking(&mut conn, &catalog(), &req),
            Err(BookingError::ExperienceNotFound)
        ));
    }

    #[test]
    fn test_invalid_selection() {
        let mut conn = setup();
        let mut req = request();
        req.selected_time = Some("03:00".to_string());
        assert!(matches!(
            create_booking(&mut conn, &catalog(), &req),
            Err(BookingError::InvalidSelection)
        ));
    }

    #[test]
    fn test_capacity_exceeded_reports_shortfall() {
        let mut conn = setup();
        let mut slot = Slot::new("2025-07-01", "10:00");
        slot.booked = 9;
        queries::insert_slot(&conn, EXP_ID, &slot).unwrap();

        let err = create_booking(&mut conn, &catalog(), &request()).unwrap_err();
        match err {
            BookingError::CapacityExceeded {
                available,
                requested,
            } => {
                assert_eq!(available, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let slot = queries::get_slot(&conn, EXP_ID, "2025-07-01", "10:00")
            .unwrap()
            .unwrap();
        assert_eq!(slot.booked, 9);
    }

    #[test]
    fn test_sequential_overbooking_is_rejected() {
        let mut conn = setup();

        // 5 bookings of 2 fill the lazily created capacity-10 slot.
        for i in 0..5 {
            let mut req = request();
            req.email = Some(format!("guest{i}@example.com"));
            create_booking(&mut conn, &catalog(), &req).unwrap();
        }

        let mut req = request();
        req.email = Some("late@example.com".to_string());
        req.quantity = Some(1);
        let err = create_booking(&mut conn, &catalog(), &req).unwrap_err();
        assert!(matches!(
            err,
            BookingError::CapacityExceeded {
                available: 0,
                requested: 1
            }
        ));

        let slot = queries::get_slot(&conn, EXP_ID, "2025-07-01", "10:00")
            .unwrap()
            .unwrap();
        assert_eq!(slot.booked, slot.capacity);
    }

    #[test]
    fn test_duplicate_booking_rejected_without_slot_mutation() {
        let mut conn = setup();
        let first = create_booking(&mut conn, &catalog(), &request()).unwrap();

        let mut req = request();
        // Same email modulo case still counts as the same customer.
        req.email = Some("Asha@Example.com".to_string());
        let err = create_booking(&mut conn, &catalog(), &req).unwrap_err();
        match err {
            BookingError::DuplicateBooking { existing_id } => {
                assert_eq!(existing_id, first.booking_id);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let slot = queries::get_slot(&conn, EXP_ID, "2025-07-01", "10:00")
            .unwrap()
            .unwrap();
        assert_eq!(slot.booked, 2);
    }

    #[test]
    fn test_cancelled_booking_does_not_block_rebooking() {
        let mut conn = setup();
        let first = create_booking(&mut conn, &catalog(), &request()).unwrap();

        conn.execute(
            "UPDATE bookings SET status = 'cancelled' WHERE id = ?1",
            [&first.booking_id],
        )
        .unwrap();

        let second = create_booking(&mut conn, &catalog(), &request()).unwrap();
        assert_ne!(second.booking_id, first.booking_id);
    }

    #[test]
    fn test_failed_insert_rolls_back_slot_materialization() {
        let mut conn = setup();
        // Negative price slips past request validation and trips the store's
        // subtotal check during insert, after the slot row was created.
        let mut req = request();
        req.price = Some(-10.0);

        let err = create_booking(&mut conn, &catalog(), &req).unwrap_err();
        assert!(matches!(err, BookingError::Transaction(_)));

        assert!(queries::get_slots(&conn, EXP_ID).unwrap().is_empty());
        assert_eq!(
            queries::count_bookings_by_email(&conn, "asha@example.com", None).unwrap(),
            0
        );
    }

    #[test]
    fn test_email_is_normalized_lowercase() {
        let mut conn = setup();
        let mut req = request();
        req.email = Some("ASHA@Example.COM".to_string());

        let confirmation = create_booking(&mut conn, &catalog(), &req).unwrap();
        assert_eq!(confirmation.email, "asha@example.com");
    }
}
