//! MCP (Model Context Protocol) integration: auth, capability discovery, health (C12–C14).

pub mod auth;
pub mod capability;
pub mod health;
