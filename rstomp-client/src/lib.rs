//! # rstomp-client
//!
//! STOMP session engine and client for rstomp.
//!
//! This crate provides:
//! - The session state machine, generic over its transport and completion type
//! - Transport and completion capability traits
//! - A tokio TCP transport and a high-level async client
//! - YAML/environment configuration

pub mod client;
pub mod completion;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod session;
pub mod transport;

pub use client::Client;
pub use completion::{Completion, OneshotCompletion, ReceiptHandle};
pub use config::{ClientConfig, ConfigError};
pub use connection::TcpTransport;
pub use error::ClientError;
pub use factory::SessionFactory;
pub use session::{HookError, HookResult, Session, SessionHandler, SessionState};
pub use transport::{Transport, TransportHandler};
