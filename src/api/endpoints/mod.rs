//! Route handlers. Each one runs its pipeline work on the blocking pool.

pub mod analyze;
pub mod followup;
pub mod health;
pub mod reports;
