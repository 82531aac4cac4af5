//! API middleware.
//!
//! Only routes that reach the inference service are admission-controlled.

pub mod rate;
