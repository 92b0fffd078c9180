//! core
//!
//! Core domain types and configuration for geoconnect.
//!
//! # Modules
//!
//! - [`types`] - Strong types: RefSpec, TransactionId
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing

pub mod config;
pub mod types;
