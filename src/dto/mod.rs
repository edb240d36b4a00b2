//! Request bodies and read-only response projections.

pub mod delivery;
pub mod tracking;
