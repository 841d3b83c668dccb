//! In-process container runtime
//!
//! Keeps containers in a table guarded by a mutex that is never held across
//! an await point. Mirrors the daemon behaviours the tools depend on: id
//! prefix lookup, name conflicts, the running-container removal rule, and
//! unknown images. Faults can be injected per operation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{ContainerInfo, ContainerRuntime, ContainerStats, RunSpec};
use crate::error::RuntimeError;

const RUNNING: &str = "running";
const EXITED: &str = "exited";

#[derive(Debug, Clone)]
struct Container {
    id: String,
    name: String,
    image: String,
    status: &'static str,
    logs: Vec<u8>,
    ports: BTreeMap<String, u16>,
    stats: ContainerStats,
}

impl Container {
    fn info(&self) -> ContainerInfo {
        ContainerInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            status: self.status.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<Container>,
    images: BTreeSet<String>,
    faults: HashMap<&'static str, RuntimeError>,
    generated_names: u64,
}

impl State {
    fn fault(&self, op: &'static str) -> Result<(), RuntimeError> {
        match self.faults.get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Exact id, exact name, then unique id prefix
    fn position(&self, reference: &str) -> Result<usize, RuntimeError> {
        let reference = reference.trim_start_matches('/');
        if let Some(pos) = self
            .containers
            .iter()
            .position(|c| c.id == reference || c.name == reference)
        {
            return Ok(pos);
        }
        let mut matches = self
            .containers
            .iter()
            .enumerate()
            .filter(|(_, c)| !reference.is_empty() && c.id.starts_with(reference));
        match (matches.next(), matches.next()) {
            (Some((pos, _)), None) => Ok(pos),
            _ => Err(RuntimeError::NotFound(format!(
                "No such container: {reference}"
            ))),
        }
    }
}

/// Container runtime held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make an image available to `create_and_run`
    pub fn with_image(self, image: &str) -> Self {
        self.lock().images.insert(image.to_string());
        self
    }

    /// Add a container directly, returning its id
    pub fn add_container(&self, name: &str, image: &str, running: bool) -> String {
        let mut state = self.lock();
        let id = new_container_id();
        state.images.insert(image.to_string());
        state.containers.push(Container {
            id: id.clone(),
            name: name.to_string(),
            image: image.to_string(),
            status: if running { RUNNING } else { EXITED },
            logs: Vec::new(),
            ports: BTreeMap::new(),
            stats: ContainerStats {
                cpu_usage_total: 0,
                memory_usage_bytes: 0,
            },
        });
        id
    }

    pub fn set_logs(&self, reference: &str, logs: &[u8]) {
        let mut state = self.lock();
        if let Ok(pos) = state.position(reference) {
            state.containers[pos].logs = logs.to_vec();
        }
    }

    pub fn set_stats(&self, reference: &str, stats: ContainerStats) {
        let mut state = self.lock();
        if let Ok(pos) = state.position(reference) {
            state.containers[pos].stats = stats;
        }
    }

    /// Make every later call of `op` fail with `err`
    pub fn fail(&self, op: &'static str, err: RuntimeError) {
        self.lock().faults.insert(op, err);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    pub fn status_of(&self, reference: &str) -> Option<String> {
        let state = self.lock();
        state
            .position(reference)
            .ok()
            .map(|pos| state.containers[pos].status.to_string())
    }

    pub fn ports_of(&self, reference: &str) -> Option<BTreeMap<String, u16>> {
        let state = self.lock();
        state
            .position(reference)
            .ok()
            .map(|pos| state.containers[pos].ports.clone())
    }

    pub fn image_of(&self, reference: &str) -> Option<String> {
        let state = self.lock();
        state
            .position(reference)
            .ok()
            .map(|pos| state.containers[pos].image.clone())
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave the table half-written
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_container<T>(
        &self,
        op: &'static str,
        id: &str,
        f: impl FnOnce(&mut Container) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let mut state = self.lock();
        state.fault(op)?;
        let pos = state.position(id)?;
        f(&mut state.containers[pos])
    }
}

fn new_container_id() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn ping(&self) -> Result<(), RuntimeError> {
        self.lock().fault("ping")
    }

    async fn inspect(&self, reference: &str) -> Result<ContainerInfo, RuntimeError> {
        let state = self.lock();
        state.fault("inspect")?;
        let pos = state.position(reference)?;
        Ok(state.containers[pos].info())
    }

    async fn list(&self, include_stopped: bool) -> Result<Vec<ContainerInfo>, RuntimeError> {
        let state = self.lock();
        state.fault("list")?;
        Ok(state
            .containers
            .iter()
            .filter(|c| include_stopped || c.status == RUNNING)
            .map(Container::info)
            .collect())
    }

    async fn create_and_run(&self, spec: RunSpec) -> Result<ContainerInfo, RuntimeError> {
        let mut state = self.lock();
        state.fault("create_and_run")?;

        if !state.images.contains(&spec.image) {
            return Err(RuntimeError::NotFound(format!(
                "No such image: {}",
                spec.image
            )));
        }

        let name = match spec.name {
            Some(name) => {
                if state.containers.iter().any(|c| c.name == name) {
                    return Err(RuntimeError::Api {
                        status: 409,
                        message: format!(
                            "Conflict. The container name \"/{name}\" is already in use"
                        ),
                    });
                }
                name
            }
            None => {
                state.generated_names += 1;
                format!("container_{}", state.generated_names)
            }
        };

        if let Some(ports) = &spec.ports {
            let taken: BTreeSet<u16> = state
                .containers
                .iter()
                .filter(|c| c.status == RUNNING)
                .flat_map(|c| c.ports.values().copied())
                .collect();
            if let Some(port) = ports.values().find(|p| taken.contains(p)) {
                return Err(RuntimeError::Api {
                    status: 500,
                    message: format!("Bind for 0.0.0.0:{port} failed: port is already allocated"),
                });
            }
        }

        let container = Container {
            id: new_container_id(),
            name,
            image: spec.image,
            status: if spec.detach { RUNNING } else { EXITED },
            logs: Vec::new(),
            ports: spec.ports.unwrap_or_default(),
            stats: ContainerStats {
                cpu_usage_total: 0,
                memory_usage_bytes: 0,
            },
        };
        let info = container.info();
        state.containers.push(container);
        Ok(info)
    }

    async fn logs(&self, id: &str, tail: Option<u64>) -> Result<Vec<u8>, RuntimeError> {
        self.with_container("logs", id, |c| {
            let text = String::from_utf8_lossy(&c.logs);
            let lines: Vec<&str> = text.split_inclusive('\n').collect();
            let skip = match tail {
                Some(n) => lines.len().saturating_sub(n as usize),
                None => 0,
            };
            Ok(lines[skip..].concat().into_bytes())
        })
    }

    async fn start(&self, id: &str) -> Result<(), RuntimeError> {
        self.with_container("start", id, |c| {
            c.status = RUNNING;
            Ok(())
        })
    }

    async fn stop(&self, id: &str) -> Result<(), RuntimeError> {
        self.with_container("stop", id, |c| {
            c.status = EXITED;
            Ok(())
        })
    }

    async fn restart(&self, id: &str) -> Result<(), RuntimeError> {
        self.with_container("restart", id, |c| {
            c.status = RUNNING;
            Ok(())
        })
    }

    async fn stats(&self, id: &str) -> Result<ContainerStats, RuntimeError> {
        self.with_container("stats", id, |c| Ok(c.stats))
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        state.fault("remove")?;
        let pos = state.position(id)?;
        if state.containers[pos].status == RUNNING && !force {
            return Err(RuntimeError::Api {
                status: 409,
                message: format!(
                    "You cannot remove a running container {}. Stop the container before attempting removal or force remove",
                    state.containers[pos].id
                ),
            });
        }
        state.containers.remove(pos);
        Ok(())
    }
}
