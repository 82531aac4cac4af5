//! Admission control for the paid inference service.
//!
//! Every LLM-reaching request is keyed by a one-way fingerprint of the
//! caller's network identity and counted against fixed time buckets in the
//! durable store. Store failures deny.

pub mod controller;
pub mod fingerprint;

pub use controller::*;
pub use fingerprint::*;
