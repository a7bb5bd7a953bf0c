//! Courier Gateway
//!
//! HTTP and WebSocket boundary in front of the task supervisor: submission,
//! status queries, stop, and live log feeds.

pub mod api;
pub mod server;
pub mod ws_protocol;
pub mod ws_server;

pub use server::{build_router, start_server, GatewayState};
pub use ws_protocol::{ClientMessage, ServerMessage};
