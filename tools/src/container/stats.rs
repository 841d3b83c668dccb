//! container_stats — Point-in-time CPU and memory usage

use crate::error::ToolFailure;
use crate::registry::ToolResult;
use crate::runtime::RuntimeClient;
use crate::schema::Arguments;

pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult {
    let container = client
        .resolve(args.str("container_id")?)
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    let stats = container
        .fetch_stats()
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    Ok(format!(
        "CPU Usage: {}, Memory Usage: {} bytes",
        stats.cpu_usage_total, stats.memory_usage_bytes
    ))
}
