//! Colloquy API Library Crate
//!
//! This library contains the HTTP side of the service: configuration, the
//! application state, the request handlers and routing. The `api` binary is a
//! thin wrapper around this library.

pub mod audio_files;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
