//! # Pactrack API Server Library
//!
//! ## Modules
//!
//! - `app`: application state, storage wiring and router builder
//! - `config`: environment configuration
//! - `error`: error handling and HTTP response mapping
//! - `middleware`: security headers
//! - `routes`: route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
