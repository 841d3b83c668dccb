//! Dockhand — Docker container tools over the Model Context Protocol
//!
//! A fixed set of container lifecycle tools (logs, start/stop/restart,
//! stats, list, run, delete) registered in a `ToolRegistry` and executed by
//! a `Dispatcher` against one long-lived `RuntimeClient`. Every call
//! validates → executes → reduces to a single readable result.

pub mod config;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod mcp;
pub mod registry;
pub mod runtime;
pub mod schema;

pub use dispatcher::{Dispatcher, InvocationResult};
pub use error::{FailureKind, RegistryError, RuntimeError, ToolFailure, ValidationError};
pub use registry::{ToolDescriptor, ToolRegistry};
pub use runtime::{ContainerRuntime, RuntimeClient};
