use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Experience, Slot};

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("Selected date or time is not available")]
    InvalidSelection,

    #[error("Not enough slots available")]
    CapacityExceeded { available: i64, requested: i64 },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Find the slot for (date, time), materializing it with default capacity when
/// the pair is advertised in the experience's available lists but has no
/// explicit slot row yet. Must run inside the booking transaction so a later
/// abort also rolls the new slot back.
pub fn resolve_slot(
    conn: &Connection,
    experience: &Experience,
    date: &str,
    time: &str,
) -> Result<Slot, SlotError> {
    if let Some(slot) = queries::get_slot(conn, &experience.id, date, time)? {
        return Ok(slot);
    }

    if !experience.allows(date, time) {
        return Err(SlotError::InvalidSelection);
    }

    let slot = Slot::new(date, time);
    queries::insert_slot(conn, &experience.id, &slot)?;
    tracing::debug!(
        experience_id = %experience.id,
        date,
        time,
        "materialized slot on first booking"
    );
    Ok(slot)
}

/// Apply the reservation via the conditional increment. The guard re-checks
/// `booked + quantity <= capacity` against the freshest value inside the
/// transaction; a rejected update is reported with the exact shortfall.
pub fn reserve(
    conn: &Connection,
    experience_id: &str,
    date: &str,
    time: &str,
    quantity: i64,
) -> Result<(), SlotError> {
    if queries::try_reserve_slot(conn, experience_id, date, time, quantity)? {
        return Ok(());
    }

    let available = queries::get_slot(conn, experience_id, date, time)?
        .map(|slot| slot.remaining())
        .unwrap_or(0);
    Err(SlotError::CapacityExceeded {
        available,
        requested: quantity,
    })
}
