//! LSP Broker (C8): drives external language servers over
//! `Content-Length`-framed JSON-RPC (spec.md §4.7, §6).

pub mod broker;
pub mod protocol;

pub use broker::{LspBroker, ServerState};
