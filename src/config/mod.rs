//! # Configuration Module
//!
//! This module provides the client configuration and its validation.

pub mod config;

pub use config::{ClientConfig, SourceKind, WireEncoding};
