//! Bookmark protocol server.
//!
//! Serves the aggregated bookmark collection as read-only resources plus two
//! tools (resync and search) over line-delimited JSON-RPC 2.0 on stdio.

pub mod protocol;
pub mod server;

pub use protocol::{JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, ProtocolError};
pub use server::Server;
