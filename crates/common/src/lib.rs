//! Common utilities shared across the platform bridge crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for platform access-token management with automatic refresh
pub mod token_manager;
