//! MCP (Model Context Protocol) server
//!
//! Exposes the container tools to MCP clients as newline-delimited
//! JSON-RPC 2.0 over stdio.

pub mod protocol;
pub mod server;

pub use server::McpServer;
