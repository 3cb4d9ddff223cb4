pub mod booking;
pub mod experience;
pub mod promo;

pub use booking::{Booking, BookingStatus, MAX_QUANTITY};
pub use experience::{Experience, Slot, DEFAULT_SLOT_CAPACITY};
pub use promo::{PromoCatalog, PromoCode, PromoKind};
