//! Rawdrop - photo drop box with background RAW conversion
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod conversion;
pub mod media;
pub mod server;
