//! Systems - logic that operates on components

mod connectivity;
mod devices;
mod tiles;

pub use connectivity::*;
pub use devices::*;
pub use tiles::*;
