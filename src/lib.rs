//! Client for a WebSocket video-analysis service.
//!
//! The pieces, bottom-up:
//! - [`connection`]: socket lifecycle and reconnect policy
//! - [`correlator`]: request envelopes and busy affordances
//! - [`router`]: inbound stage dispatch
//! - [`session`]: accumulated results and chat history
//! - [`client`]: the dispatch loop tying them to a [`view::ViewRenderer`]

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod correlator;
pub mod credentials;
pub mod error;
pub mod markup;
pub mod model;
pub mod protocol;
pub mod router;
pub mod session;
pub mod terminal;
pub mod view;

pub use client::{Client, UserCommand};
pub use config::ClientConfig;
pub use connection::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use error::{ClientError, Result};
