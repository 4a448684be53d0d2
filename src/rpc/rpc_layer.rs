// RPC layer - the stdio tool-protocol surface.

#[path = "protocol.rs"]
pub mod protocol;

#[path = "tool_server.rs"]
pub mod tool_server;

pub use tool_server::ToolServer;
