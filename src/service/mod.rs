//! Service integrations for external collaborators.
//!
//! This module contains implementations for the services used by the snipe-bot:
//! - Durable snapshot storage (e.g., SurrealDB)
//! - Per-user settings (e.g., SurrealDB)
//! - The platform event source and the reply surface (e.g., JSON lines)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod db;
pub mod events;
pub mod settings;
