//! # warden-clock
//!
//! The single time source for Warden.
//!
//! Every component that stamps a decision, a review request, or an audit
//! entry asks a [`Clock`] instead of calling `Utc::now()` directly. Production
//! code uses [`SystemClock`]; tests use [`ManualClock`], which stays fixed
//! until it is explicitly advanced.

pub mod clock;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ClockError;
