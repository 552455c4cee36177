//! WebSocket gateway: wire protocol, per-connection sessions, upgrade handler

pub mod handler;
pub mod protocol;
pub mod session;
