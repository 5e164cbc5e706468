//! HTTP handlers
//!
//! Thin request/response layer over the live stream service: validate the
//! payload, extract the caller, call the service, map the result.

pub mod health;
pub mod streams;

pub use health::health_check;
pub use streams::*;
