//! Network layer for Raft RPC communication.
//!
//! Raft messages travel as JSON over HTTP: hyper serves them on the raft port
//! and reqwest sends them.

mod client;
mod server;

pub use client::{APPEND_PATH, NetworkClient, NetworkConnection, SNAPSHOT_PATH, VOTE_PATH};
pub use server::RaftServer;
