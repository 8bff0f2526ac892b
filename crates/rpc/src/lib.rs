//! HTTP boundary for the rendez registry.
//!
//! Thin plumbing around the core: each route decodes a request into a
//! registry value, invokes exactly one registry operation, and serializes
//! the result back. All state lives in [`AppState`] and is injected into
//! the handlers; the crate owns no globals.

pub mod server;

pub use server::{start_server, AppState};
