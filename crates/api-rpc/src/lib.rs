//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 server for the karaoke host daemon, plus the
//! `events.subscribe.v1` push channel.

pub mod error;
pub mod handler;
mod rate_limiter;
pub mod server;
mod subscriptions;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};
