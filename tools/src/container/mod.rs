//! Container tools — logs, lifecycle, stats, listing, run, and delete.
//!
//! Each submodule exposes
//! `pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult`
//! which resolves the container, performs the runtime call, and renders the
//! outcome as text.

pub mod delete;
pub mod list;
pub mod logs;
pub mod restart;
pub mod run;
pub mod start;
pub mod stats;
pub mod stop;

use crate::error::RegistryError;
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::schema::{ArgValue, ArgumentSchema, ParamSpec, ParamType};

/// Default number of log lines returned by `get_logs`
pub const DEFAULT_LOG_TAIL: i64 = 20;

fn container_id() -> ParamSpec {
    ParamSpec::required(
        "container_id",
        ParamType::String,
        "Container ID, ID prefix, or name",
    )
}

/// Register every container tool with the registry.
pub fn register_tools(reg: &mut ToolRegistry) -> Result<(), RegistryError> {
    reg.register_tool(ToolDescriptor::new(
        "get_logs",
        "Get last N lines of logs from a container",
        ArgumentSchema::new(vec![
            container_id(),
            ParamSpec::optional("tail", ParamType::Integer, "Number of lines from the end of the logs")
                .with_default(ArgValue::Integer(DEFAULT_LOG_TAIL)),
        ]),
        logs::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "start_container",
        "Start a stopped container",
        ArgumentSchema::new(vec![container_id()]),
        start::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "stop_container",
        "Stop a running container",
        ArgumentSchema::new(vec![container_id()]),
        stop::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "restart_container",
        "Restart a container",
        ArgumentSchema::new(vec![container_id()]),
        restart::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "container_stats",
        "Get CPU and memory usage of a container",
        ArgumentSchema::new(vec![container_id()]),
        stats::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "list_containers",
        "List all Docker containers with ID, name, and status",
        ArgumentSchema::empty(),
        list::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "run_container",
        "Run a new Docker container",
        ArgumentSchema::new(vec![
            ParamSpec::required("image_name", ParamType::String, "Image to run, e.g. nginx:latest"),
            ParamSpec::optional("name", ParamType::String, "Name for the new container"),
            ParamSpec::optional(
                "ports",
                ParamType::Mapping,
                "Port mapping from \"<port>/<proto>\" to host port, e.g. {\"80/tcp\": 8080}",
            )
            .with_constraint(run::port_map),
            ParamSpec::optional("detach", ParamType::Boolean, "Return as soon as the container starts")
                .with_default(ArgValue::Boolean(true)),
        ]),
        run::execute,
    ))?;

    reg.register_tool(ToolDescriptor::new(
        "delete_container",
        "Delete (remove) a Docker container",
        ArgumentSchema::new(vec![
            container_id(),
            ParamSpec::optional("force", ParamType::Boolean, "Kill the container first if it is running")
                .with_default(ArgValue::Boolean(false)),
        ]),
        delete::execute,
    ))?;

    Ok(())
}
