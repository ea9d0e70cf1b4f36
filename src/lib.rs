//! Client core for the agrichat real-time support chat.
//!
//! Four cooperating layers, bottom-up: the transport (one persistent socket
//! per authenticated session, re-exported in [`transport`]), the event
//! coordinator ([`types::events::EventBus`] + [`coordinator`]), the
//! per-conversation [`session`], and the list-level [`directory`]. REST
//! consumption lives in [`rest`]; everything is wired together through an
//! explicit [`config::Config`]; there are no globals.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod directory;
pub mod handlers;
pub mod http;
pub mod keepalive;
pub mod request;
pub mod rest;
pub mod rooms;
pub mod send;
pub mod session;
pub mod test_utils;
pub mod transport;
pub mod types;
pub mod typing;
pub mod upload;
pub mod wire;

pub use client::Client;
pub use config::Config;
