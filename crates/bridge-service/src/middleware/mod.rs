//! HTTP middleware for the bridge service.

pub mod http_metrics;
