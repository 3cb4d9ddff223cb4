use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Capacity assigned to slots materialized on first booking.
pub const DEFAULT_SLOT_CAPACITY: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub location: String,
    pub image: String,
    pub description: String,
    pub price: f64,
    pub about: String,
    pub available_dates: Vec<String>,
    pub available_times: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Experience {
    /// Whether (date, time) is part of the advertised availability.
    pub fn allows(&self, date: &str, time: &str) -> bool {
        self.available_dates.iter().any(|d| d == date)
            && self.available_times.iter().any(|t| t == time)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let title_len = self.title.trim().chars().count();
        if !(3..=200).contains(&title_len) {
            anyhow::bail!("title must be between 3 and 200 characters");
        }
        if self.price < 0.0 {
            anyhow::bail!("price cannot be negative");
        }
        Ok(())
    }
}

/// Capacity bucket for one (date, time) pair of an experience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub date: String,
    pub time: String,
    pub booked: i64,
    pub capacity: i64,
}

impl Slot {
    pub fn new(date: &str, time: &str) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            booked: 0,
            capacity: DEFAULT_SLOT_CAPACITY,
        }
    }

    pub fn remaining(&self) -> i64 {
        self.capacity - self.booked
    }

    pub fn is_sold_out(&self) -> bool {
        self.booked >= self.capacity
    }
}
