//! Single-document whiteboard: persistence service, typed client API, and a
//! debounced autosave pipeline for a canvas editor session.
//!
//! ARCHITECTURE
//! ============
//! - `services` + `routes` form the HTTP backend (`getById` / `create` /
//!   `update` over a pluggable store).
//! - `api` is the typed client surface consumed by the editor.
//! - `canvas` defines the document-store boundary and a headless in-memory
//!   implementation; `editor` + `autosave` wire a canvas to the backend.

pub mod api;
pub mod autosave;
pub mod canvas;
pub mod config;
pub mod content;
pub mod db;
pub mod editor;
pub mod model;
pub mod notify;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;
