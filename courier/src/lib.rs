//! The courier process: configuration, wiring and the shutdown race
//!
//! [`Courier`] is deserialised from a RON file (see [`config`]) and
//! [`Courier::run`] starts everything it describes. The process ends on
//! the first of an interrupt (success) or a fatal credential error
//! (failure), see [`supervisor`].

pub mod config;
mod controller;
pub mod supervisor;

pub use controller::Courier;
