//! Real-time group chat relay over WebSockets.
//!
//! Clients connect to `/ws`, claim a unique display name with their first
//! frame, and from then on every frame they send is relayed to every
//! connected client, themselves included. Each module focuses on a concrete
//! responsibility:
//!
//! - [`cli`] parses the command line into a [`cli::RelayConfig`].
//! - [`message`] defines the `{"sender", "text"}` JSON frame and how it is
//!   read off a WebSocket.
//! - [`registry`] owns the set of admitted connections and claimed names.
//! - [`peer`] is the write half of one connection, shared with broadcasts.
//! - [`broadcast`] fans one message out to a registry snapshot and evicts
//!   peers that cannot be written to.
//! - [`session`] drives one connection through admission, the read loop and
//!   teardown.
//! - [`server`] wires the `/ws` route into an axum server.
//!
//! Unit tests drive sessions and broadcasts over in-memory channels;
//! integration tests talk to a real relay over WebSockets.

pub mod broadcast;
pub mod cli;
pub mod error;
pub mod message;
pub mod peer;
pub mod registry;
pub mod server;
pub mod session;

pub use server::Relay;
