//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Adapt storage to the form collaborator contracts.

pub mod catalog_service;
