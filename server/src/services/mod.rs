//! Domain services used by the page, JSON, and websocket routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own persistence, identity, and realtime fan-out so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod bookmark;
pub mod identity;
pub mod realtime;
pub mod session;
