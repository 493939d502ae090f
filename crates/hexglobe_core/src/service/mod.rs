//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and layout calls into use-case level APIs.
//! - Keep the CLI decoupled from storage details.

pub mod seed;
pub mod tile_service;
