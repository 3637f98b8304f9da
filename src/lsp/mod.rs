//! LSP JSON-RPC stdio transport, subprocess ownership, and capability
//! translation.
pub mod capability;
pub mod process;
pub mod wire;
