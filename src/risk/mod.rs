//! Risk controls for the rotator.
//!
//! - Daily trade and loss limits gating new entries

mod limits;

pub use limits::DailyLimits;
