//! Shared wire types for the huginn backend: application configuration,
//! dashboard DTOs and the chat request/response pair.
//!
//! Kept free of server dependencies so external consumers (dashboard
//! frontend, CLI tooling) can deserialize the same payloads.

pub mod chat;
pub mod config;
pub mod dashboard;
