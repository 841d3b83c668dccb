//! stop_container — Stop a running container

use crate::error::ToolFailure;
use crate::registry::ToolResult;
use crate::runtime::RuntimeClient;
use crate::schema::Arguments;

pub async fn execute(client: RuntimeClient, args: Arguments) -> ToolResult {
    let container = client
        .resolve(args.str("container_id")?)
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    container
        .stop()
        .await
        .map_err(|e| ToolFailure::runtime(format!("Error: {e}")))?;

    Ok(format!("Container {} stopped", container.name()))
}
