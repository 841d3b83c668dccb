//! run_container — Create and start a container from an image

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{RuntimeError, ToolFailure};
use crate::registry::ToolResult;
use crate::runtime::{RunSpec, RuntimeClient};
use crate::schema::{ArgValue, Arguments};

const PROTOCOLS: [&str; 3] = ["tcp", "udp", "sctp"];

pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult {
    let ports = match args.opt_mapping("ports") {
        Some(map) => Some(parse_ports(map).map_err(ToolFailure::unexpected)?),
        None => None,
    };
    let spec = RunSpec {
        image: args.str("image_name")?.to_string(),
        name: args.opt_str("name").map(str::to_string),
        ports,
        detach: args.bool("detach")?,
    };

    let container = client.create_and_run(spec).await.map_err(|e| {
        let message = format!("Error running container: {e}");
        match e {
            RuntimeError::NotFound(_) => ToolFailure::not_found(message),
            RuntimeError::Api { .. } => ToolFailure::runtime(message),
            RuntimeError::Transport(_) | RuntimeError::Unexpected(_) => {
                ToolFailure::unexpected(message)
            }
        }
    })?;

    Ok(format!(
        "Container {} started with ID: {}",
        container.name(),
        container.short_id()
    ))
}

/// Constraint for the `ports` argument
pub fn port_map(value: &ArgValue) -> Result<(), String> {
    match value {
        ArgValue::Mapping(map) => parse_ports(map).map(|_| ()),
        _ => Err("expected a mapping".into()),
    }
}

/// Parse `{"<port>/<proto>": host_port}` into typed bindings
pub fn parse_ports(map: &Map<String, Value>) -> Result<BTreeMap<String, u16>, String> {
    map.iter()
        .map(|(key, value)| {
            let container_port = parse_container_port(key)?;
            let host_port = parse_host_port(value)
                .ok_or_else(|| format!("host port for '{key}' must be an integer between 1 and 65535"))?;
            Ok((container_port, host_port))
        })
        .collect()
}

fn parse_container_port(key: &str) -> Result<String, String> {
    let (port, proto) = key.split_once('/').unwrap_or((key, "tcp"));
    let valid_port = port.parse::<u16>().map(|p| p != 0).unwrap_or(false);
    if !valid_port || !PROTOCOLS.contains(&proto) {
        return Err(format!("'{key}' is not of the form \"<port>/<proto>\""));
    }
    Ok(format!("{port}/{proto}"))
}

fn parse_host_port(value: &Value) -> Option<u16> {
    let port = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    u16::try_from(port).ok().filter(|p| *p != 0)
}
