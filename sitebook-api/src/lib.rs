//! # SiteBook API Server Library
//!
//! Router, configuration and handlers for the SiteBook HTTP API. Exposed as a
//! library so integration tests can build the router directly.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Environment configuration
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
