//! Configuration types shared between the relay crates.

pub mod timeouts;

pub use timeouts::ServerTimeouts;
