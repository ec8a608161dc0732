//! Domain services used by the HTTP routes and the in-process client.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation.

pub mod store;
pub mod whiteboard;
