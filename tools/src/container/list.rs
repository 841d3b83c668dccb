//! list_containers — List every container, stopped ones included

use crate::error::ToolFailure;
use crate::registry::ToolResult;
use crate::runtime::RuntimeClient;
use crate::schema::Arguments;

pub async fn execute(client: RuntimeClient, _args: Arguments) -> ToolResult {
    let containers = client
        .list(true)
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    if containers.is_empty() {
        return Ok("No containers found.".to_string());
    }

    Ok(containers
        .iter()
        .map(|c| format!("{} | {} | {}", c.short_id(), c.name(), c.status()))
        .collect::<Vec<_>>()
        .join("\n"))
}
