//! Rental marketplace core: configuration, telemetry bootstrap, and the
//! booking/review/notification engine behind the HTTP API.

pub mod config;
pub mod error;
pub mod marketplace;
pub mod telemetry;
