//! Container runtime binding
//!
//! `ContainerRuntime` is the seam to the daemon. `RuntimeClient` wraps one
//! backend for the process lifetime and hands out `ContainerHandle`s that
//! live for a single tool invocation. Nothing is cached: every call
//! re-resolves against the daemon.

pub mod docker;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RuntimeError;

pub use docker::DockerRuntime;
pub use memory::InMemoryRuntime;

/// Number of id characters shown to callers
pub const SHORT_ID_LEN: usize = 12;

/// Point-in-time view of one container as reported by the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl ContainerInfo {
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Truncate a container id the way the docker CLI displays it
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// One resource usage sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStats {
    pub cpu_usage_total: u64,
    pub memory_usage_bytes: u64,
}

/// Parameters for creating and starting a new container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: Option<String>,
    /// `"<port>/<proto>"` → host port
    pub ports: Option<BTreeMap<String, u16>>,
    pub detach: bool,
}

/// Operations a container daemon backend must provide.
///
/// Implementations are shared across concurrent invocations and must be
/// safe to call from several tasks at once.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<(), RuntimeError>;

    async fn inspect(&self, reference: &str) -> Result<ContainerInfo, RuntimeError>;

    async fn list(&self, include_stopped: bool) -> Result<Vec<ContainerInfo>, RuntimeError>;

    async fn create_and_run(&self, spec: RunSpec) -> Result<ContainerInfo, RuntimeError>;

    /// `tail = None` means every line
    async fn logs(&self, id: &str, tail: Option<u64>) -> Result<Vec<u8>, RuntimeError>;

    async fn start(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, id: &str) -> Result<(), RuntimeError>;

    async fn restart(&self, id: &str) -> Result<(), RuntimeError>;

    async fn stats(&self, id: &str) -> Result<ContainerStats, RuntimeError>;

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError>;
}

/// Process-wide handle on the container daemon
#[derive(Clone)]
pub struct RuntimeClient {
    backend: Arc<dyn ContainerRuntime>,
}

impl RuntimeClient {
    pub fn new(backend: Arc<dyn ContainerRuntime>) -> Self {
        Self { backend }
    }

    pub async fn ping(&self) -> Result<(), RuntimeError> {
        self.backend.ping().await
    }

    /// Look a container up by id, id prefix, or name
    pub async fn resolve(&self, reference: &str) -> Result<ContainerHandle<'_>, RuntimeError> {
        let info = self.backend.inspect(reference).await?;
        Ok(ContainerHandle { client: self, info })
    }

    /// Snapshot of the daemon's containers; ordering is daemon-defined
    pub async fn list(&self, include_stopped: bool) -> Result<Vec<ContainerHandle<'_>>, RuntimeError> {
        let infos = self.backend.list(include_stopped).await?;
        Ok(infos
            .into_iter()
            .map(|info| ContainerHandle { client: self, info })
            .collect())
    }

    pub async fn create_and_run(&self, spec: RunSpec) -> Result<ContainerHandle<'_>, RuntimeError> {
        let info = self.backend.create_and_run(spec).await?;
        Ok(ContainerHandle { client: self, info })
    }
}

/// A live reference to one container, valid for one invocation
pub struct ContainerHandle<'a> {
    client: &'a RuntimeClient,
    info: ContainerInfo,
}

impl ContainerHandle<'_> {
    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn short_id(&self) -> &str {
        self.info.short_id()
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn status(&self) -> &str {
        &self.info.status
    }

    pub fn info(&self) -> &ContainerInfo {
        &self.info
    }

    pub async fn fetch_logs(&self, tail: Option<u64>) -> Result<Vec<u8>, RuntimeError> {
        self.client.backend.logs(&self.info.id, tail).await
    }

    pub async fn start(&self) -> Result<(), RuntimeError> {
        self.client.backend.start(&self.info.id).await
    }

    pub async fn stop(&self) -> Result<(), RuntimeError> {
        self.client.backend.stop(&self.info.id).await
    }

    pub async fn restart(&self) -> Result<(), RuntimeError> {
        self.client.backend.restart(&self.info.id).await
    }

    pub async fn fetch_stats(&self) -> Result<ContainerStats, RuntimeError> {
        self.client.backend.stats(&self.info.id).await
    }

    pub async fn remove(&self, force: bool) -> Result<(), RuntimeError> {
        self.client.backend.remove(&self.info.id, force).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_truncates() {
        assert_eq!(short_id("0123456789abcdef0123"), "0123456789ab");
        assert_eq!(short_id("abc"), "abc");
    }

    #[tokio::test]
    async fn test_handle_reflects_daemon_state() {
        let runtime = Arc::new(InMemoryRuntime::new());
        let id = runtime.add_container("web", "nginx", false);
        let client = RuntimeClient::new(runtime);

        let handle = client.resolve("web").await.unwrap();
        assert_eq!(handle.id(), id);
        assert_eq!(handle.status(), "exited");
        handle.start().await.unwrap();

        // A fresh resolve sees the mutation; the old handle keeps its snapshot
        assert_eq!(handle.status(), "exited");
        let again = client.resolve(&id[..6]).await.unwrap();
        assert_eq!(again.status(), "running");
    }

    #[tokio::test]
    async fn test_resolve_missing_is_not_found() {
        let client = RuntimeClient::new(Arc::new(InMemoryRuntime::new()));
        let err = client.resolve("ghost").await.err().unwrap();
        assert!(err.is_not_found());
    }
}
