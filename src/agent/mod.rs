//! Agent process side of the component contract
//!
//! [`ComponentHost`] owns the components of one agent and routes inbound
//! command messages to them.

pub mod host;
pub mod managed;

pub use host::ComponentHost;
pub use managed::ManagedComponent;
