//! Component base: context, lifecycle state machine, and command routing
//!
//! A concrete component implements [`ComponentBehavior`] and is wrapped in a
//! [`Component`], which provides the lifecycle, retained documents, and the
//! `cmd/<action>` → `evt/<action>/result` contract.

pub mod behavior;
pub mod context;
pub mod handlers;
pub mod lifecycle;
pub mod router;
pub mod state;

pub use crate::protocol::ComponentStatus;
pub use behavior::ComponentBehavior;
pub use context::ComponentContext;
pub use handlers::{CfgSetHandler, PingHandler, LOGS_ENABLED_KEY};
pub use lifecycle::Component;
pub use router::{CommandHandler, CommandRouter, DispatchOutcome};
pub use state::ComponentState;
