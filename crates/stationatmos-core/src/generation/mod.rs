//! Generation - procedural creation of station rooms and their pipework.

mod station;

pub use station::*;
