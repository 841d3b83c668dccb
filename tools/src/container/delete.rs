//! delete_container — Remove a container

use crate::error::{RuntimeError, ToolFailure};
use crate::registry::ToolResult;
use crate::runtime::RuntimeClient;
use crate::schema::Arguments;

pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult {
    let container_id = args.str("container_id")?;
    let force = args.bool("force")?;

    let removed = match client.resolve(container_id).await {
        Ok(container) => container
            .remove(force)
            .await
            .map(|_| container.name().to_string()),
        Err(e) => Err(e),
    };

    removed
        .map(|name| format!("Container {name} removed successfully."))
        .map_err(|e| match e {
            RuntimeError::NotFound(_) => {
                ToolFailure::not_found(format!("Container '{container_id}' not found."))
            }
            RuntimeError::Api { .. } => ToolFailure::runtime(format!("Docker API error: {e}")),
            RuntimeError::Transport(_) | RuntimeError::Unexpected(_) => {
                ToolFailure::unexpected(format!("Error removing container: {e}"))
            }
        })
}
