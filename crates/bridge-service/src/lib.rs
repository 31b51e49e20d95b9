//! Platform bridge service library.
//!
//! A webhook server that sits between a messaging platform's official account
//! and application code:
//!
//! - Authenticates platform callbacks signed with a shared token
//! - Issues QR-code "scenes" and binds each to the user who subscribes
//!   through it
//! - Accepts outbound message requests and delivers them as template messages
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> (TicketIssuer | MessageSender)
//! ```
//!
//! All state is in memory and lives as long as the process.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Records and request/response bodies
//! - `observability` - Metrics and log correlation helpers
//! - `routes` - Axum router setup
//! - `services` - Signature verification, stores and platform adapters

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
