//! Tool Registry — maps tool names to their schema and handler

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

use crate::error::{RegistryError, ToolFailure};
use crate::runtime::RuntimeClient;
use crate::schema::{ArgumentSchema, Arguments};

/// Outcome of a handler: readable text or a typed failure
pub type ToolResult = Result<String, ToolFailure>;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// A tool handler function
pub type ToolHandler = Arc<dyn Fn(RuntimeClient, Arguments) -> HandlerFuture + Send + Sync>;

/// One registered tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub schema: ArgumentSchema,
    pub handler: ToolHandler,
}

impl ToolDescriptor {
    pub fn new<F, Fut>(
        name: &'static str,
        description: &'static str,
        schema: ArgumentSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(RuntimeClient, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        Self {
            name,
            description,
            schema,
            handler: Arc::new(move |client: RuntimeClient, args: Arguments| -> HandlerFuture {
                Box::pin(handler(client, args))
            }),
        }
    }
}

/// Append-only tool table, populated once at startup
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in container tool
    pub fn with_builtin_tools() -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        crate::container::register_tools(&mut reg)?;
        info!("Registered {} built-in tools", reg.tool_count());
        Ok(reg)
    }

    /// Register a tool. Names must be unique and schemas well-formed.
    pub fn register_tool(&mut self, tool: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(tool.name) {
            return Err(RegistryError::DuplicateTool(tool.name.to_string()));
        }
        tool.schema
            .check()
            .map_err(|reason| RegistryError::InvalidSchema {
                tool: tool.name.to_string(),
                reason,
            })?;

        info!("Registered tool: {}", tool.name);
        self.index.insert(tool.name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor, RegistryError> {
        self.index
            .get(name)
            .map(|&pos| &self.tools[pos])
            .ok_or_else(|| RegistryError::UnknownOperation(name.to_string()))
    }

    /// Tools in registration order
    pub fn list_tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    /// Get total tool count
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}
