//! Component definitions for the ECS simulation.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod common;
mod device;
mod pipe;

pub use common::*;
pub use device::*;
pub use pipe::*;
