//! Control socket for out-of-band refresh requests

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{request_refresh, request_refresh_at};
pub use protocol::{socket_path, state_dir, ClientMessage, ServerMessage};
pub use server::IpcServer;
