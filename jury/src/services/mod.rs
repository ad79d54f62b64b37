//! Service implementations
//!
//! Concrete implementations of the traits the engine depends on.

pub mod clock;
pub mod env;
pub mod memory_store;

#[cfg(test)]
mod tests;

pub use clock::{ManualClock, SystemClock};
pub use env::RealEnvSource;
pub use memory_store::InMemoryStore;
