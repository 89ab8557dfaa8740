//! Instagram Publisher Backend service
//!
//! Authenticates callers with their Facebook access token, stores their
//! images in S3 and publishes them to connected Instagram Business Accounts.

#![deny(clippy::all)]
#![warn(clippy::pedantic, clippy::nursery, missing_docs, dead_code)]

/// Instagram Graph API client
pub mod graph_api;

/// S3 image storage
pub mod media_storage;

/// Request middleware
pub mod middleware;

/// HTTP routes
#[allow(missing_docs)]
pub mod routes;

/// HTTP server
pub mod server;

/// Publishing and query services
pub mod services;

/// Shared types
pub mod types;
