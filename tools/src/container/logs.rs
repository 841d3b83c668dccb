//! get_logs — Tail a container's combined stdout/stderr

use crate::error::ToolFailure;
use crate::registry::ToolResult;
use crate::runtime::RuntimeClient;
use crate::schema::Arguments;

pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult {
    let container_id = args.str("container_id")?;
    // A negative tail asks the daemon for every line
    let tail = u64::try_from(args.int("tail")?).ok();

    let container = client
        .resolve(container_id)
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;
    let raw = container
        .fetch_logs(tail)
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    let logs = String::from_utf8_lossy(&raw);
    if logs.is_empty() {
        Ok("No logs available.".to_string())
    } else {
        Ok(logs.into_owned())
    }
}
