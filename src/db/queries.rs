use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingStatus, Experience, Slot};

// ── Experiences ──

pub fn insert_experience(conn: &Connection, experience: &Experience) -> anyhow::Result<()> {
    experience.validate()?;

    let available_dates = serde_json::to_string(&experience.available_dates)?;
    let available_times = serde_json::to_string(&experience.available_times)?;
    let created_at = experience.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let updated_at = experience.updated_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO experiences (id, title, location, image, description, price, about, available_dates, available_times, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            experience.id,
            experience.title,
            experience.location,
            experience.image,
            experience.description,
            experience.price,
            experience.about,
            available_dates,
            available_times,
            created_at,
            updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_experience(conn: &Connection, id: &str) -> anyhow::Result<Option<Experience>> {
    let result = conn.query_row(
        "SELECT id, title, location, image, description, price, about, available_dates, available_times, created_at, updated_at
         FROM experiences WHERE id = ?1",
        params![id],
        |row| Ok(parse_experience_row(row)),
    );

    match result {
        Ok(experience) => Ok(Some(experience?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_experiences(
    conn: &Connection,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Experience>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, location, image, description, price, about, available_dates, available_times, created_at, updated_at
         FROM experiences ORDER BY created_at DESC, id LIMIT ?1 OFFSET ?2",
    )?;

    let rows = stmt.query_map(params![limit, offset], |row| Ok(parse_experience_row(row)))?;

    let mut experiences = vec![];
    for row in rows {
        experiences.push(row??);
    }
    Ok(experiences)
}

pub fn count_experiences(conn: &Connection) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM experiences", [], |row| row.get(0))?;
    Ok(count)
}

fn parse_experience_row(row: &rusqlite::Row) -> anyhow::Result<Experience> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let location: String = row.get(2)?;
    let image: String = row.get(3)?;
    let description: String = row.get(4)?;
    let price: f64 = row.get(5)?;
    let about: String = row.get(6)?;
    let available_dates_json: String = row.get(7)?;
    let available_times_json: String = row.get(8)?;
    let created_at_str: String = row.get(9)?;
    let updated_at_str: String = row.get(10)?;

    let available_dates: Vec<String> =
        serde_json::from_str(&available_dates_json).unwrap_or_default();
    let available_times: Vec<String> =
        serde_json::from_str(&available_times_json).unwrap_or_default();

    Ok(Experience {
        id,
        title,
        location,
        image,
        description,
        price,
        about,
        available_dates,
        available_times,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

// ── Slots ──

pub fn get_slot(
    conn: &Connection,
    experience_id: &str,
    date: &str,
    time: &str,
) -> anyhow::Result<Option<Slot>> {
    let result = conn.query_row(
        "SELECT date, time, booked, capacity FROM slots
         WHERE experience_id = ?1 AND date = ?2 AND time = ?3",
        params![experience_id, date, time],
        |row| {
            Ok(Slot {
                date: row.get(0)?,
                time: row.get(1)?,
                booked: row.get(2)?,
                capacity: row.get(3)?,
            })
        },
    );

    match result {
        Ok(slot) => Ok(Some(slot)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_slots(conn: &Connection, experience_id: &str) -> anyhow::Result<Vec<Slot>> {
    let mut stmt = conn.prepare(
        "SELECT date, time, booked, capacity FROM slots
         WHERE experience_id = ?1 ORDER BY date, time",
    )?;

    let rows = stmt.query_map(params![experience_id], |row| {
        Ok(Slot {
            date: row.get(0)?,
            time: row.get(1)?,
            booked: row.get(2)?,
            capacity: row.get(3)?,
        })
    })?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row?);
    }
    Ok(slots)
}

pub fn insert_slot(conn: &Connection, experience_id: &str, slot: &Slot) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO slots (experience_id, date, time, booked, capacity)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![experience_id, slot.date, slot.time, slot.booked, slot.capacity],
    )?;
    Ok(())
}

/// Conditional increment: only succeeds while `booked + quantity <= capacity`,
/// evaluated against the latest value inside the enclosing transaction.
/// Returns false when the guard rejects the update.
pub fn try_reserve_slot(
    conn: &Connection,
    experience_id: &str,
    date: &str,
    time: &str,
    quantity: i64,
) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE slots SET booked = booked + ?4
         WHERE experience_id = ?1 AND date = ?2 AND time = ?3
           AND booked + ?4 <= capacity",
        params![experience_id, date, time, quantity],
    )?;
    Ok(changed > 0)
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let created_at = booking.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
    let updated_at = booking.updated_at.format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO bookings (id, experience_id, experience_title, full_name, email, phone, date, time, quantity, price_per_person, subtotal, discount, total, promo_code, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            booking.id,
            booking.experience_id,
            booking.experience_title,
            booking.full_name,
            booking.email,
            booking.phone,
            booking.date,
            booking.time,
            booking.quantity,
            booking.price_per_person,
            booking.subtotal,
            booking.discount,
            booking.total,
            booking.promo_code,
            booking.status.as_str(),
            created_at,
            updated_at,
        ],
    )?;
    Ok(())
}

pub fn find_active_duplicate(
    conn: &Connection,
    experience_id: &str,
    email: &str,
    date: &str,
    time: &str,
) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, experience_id, experience_title, full_name, email, phone, date, time, quantity, price_per_person, subtotal, discount, total, promo_code, status, created_at, updated_at
         FROM bookings
         WHERE experience_id = ?1 AND email = ?2 AND date = ?3 AND time = ?4 AND status != 'cancelled'",
        params![experience_id, email, date, time],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, experience_id, experience_title, full_name, email, phone, date, time, quantity, price_per_person, subtotal, discount, total, promo_code, status, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_by_email(
    conn: &Connection,
    email: &str,
    status_filter: Option<&str>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            "SELECT id, experience_id, experience_title, full_name, email, phone, date, time, quantity, price_per_person, subtotal, discount, total, promo_code, status, created_at, updated_at \
             FROM bookings WHERE email = ?1 AND status = ?2 ORDER BY created_at DESC, id LIMIT ?3 OFFSET ?4"
                .to_string(),
            vec![
                Box::new(email.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(status.to_string()),
                Box::new(limit),
                Box::new(offset),
            ],
        ),
        None => (
            "SELECT id, experience_id, experience_title, full_name, email, phone, date, time, quantity, price_per_person, subtotal, discount, total, promo_code, status, created_at, updated_at \
             FROM bookings WHERE email = ?1 ORDER BY created_at DESC, id LIMIT ?2 OFFSET ?3"
                .to_string(),
            vec![
                Box::new(email.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
                Box::new(offset),
            ],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn count_bookings_by_email(
    conn: &Connection,
    email: &str,
    status_filter: Option<&str>,
) -> anyhow::Result<i64> {
    let count: i64 = match status_filter {
        Some(status) => conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE email = ?1 AND status = ?2",
            params![email, status],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?,
    };
    Ok(count)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let experience_id: String = row.get(1)?;
    let experience_title: String = row.get(2)?;
    let full_name: String = row.get(3)?;
    let email: String = row.get(4)?;
    let phone: Option<String> = row.get(5)?;
    let date: String = row.get(6)?;
    let time: String = row.get(7)?;
    let quantity: i64 = row.get(8)?;
    let price_per_person: f64 = row.get(9)?;
    let subtotal: f64 = row.get(10)?;
    let discount: f64 = row.get(11)?;
    let total: f64 = row.get(12)?;
    let promo_code: Option<String> = row.get(13)?;
    let status_str: String = row.get(14)?;
    let created_at_str: String = row.get(15)?;
    let updated_at_str: String = row.get(16)?;

    Ok(Booking {
        id,
        experience_id,
        experience_title,
        full_name,
        email,
        phone,
        date,
        time,
        quantity,
        price_per_person,
        subtotal,
        discount,
        total,
        promo_code,
        status: BookingStatus::parse(&status_str),
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn parse_timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .unwrap_or_else(|_| Utc::now().naive_utc())
}
