//! Wire-level types for the component messaging contract
//!
//! Topic layout, identifier validation, and the JSON documents exchanged on
//! component topics.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
