//! Provisioning artifact builder library
//!
//! This module exports the core components for testing and integration.

pub mod artifacts;
pub mod cli;
pub mod compose;
pub mod config;
pub mod crypt;
pub mod error;
pub mod logging;
pub mod render;
pub mod yaml;
