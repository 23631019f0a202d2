//! Testing utilities and mock implementations
//!
//! Lets components and the agent host be tested without an MQTT broker.

pub mod mocks;

pub use mocks::*;
