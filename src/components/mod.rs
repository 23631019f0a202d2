//! Concrete component implementations and the kind → constructor factory

pub mod example;

pub use example::{ExampleComponent, TelemetryOptions};

use crate::agent::ManagedComponent;
use crate::component::ComponentContext;
use crate::config::ConfigError;
use crate::error::{ComponentError, ComponentResult};
use crate::transport::Transport;

/// Component kinds this build can instantiate
pub const KNOWN_KINDS: [&str; 1] = [example::KIND];

/// Build the component implementing `kind`, bound to `context`
pub fn build_component<T: Transport + 'static>(
    kind: &str,
    context: ComponentContext<T>,
) -> ComponentResult<Box<dyn ManagedComponent>> {
    match kind {
        example::KIND => Ok(Box::new(ExampleComponent::component(context)?)),
        other => Err(ComponentError::Config(ConfigError::InvalidConfig(format!(
            "Unknown component kind '{other}' for component '{}' (known: {})",
            context.component_id(),
            KNOWN_KINDS.join(", ")
        )))),
    }
}
