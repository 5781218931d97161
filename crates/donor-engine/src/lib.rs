//! Eligibility, donation bookkeeping and campaign notifications for blood-donation drives.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
