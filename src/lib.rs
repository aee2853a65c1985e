//! Client for Deezer's Pipe GraphQL API.
//!
//! Deezer's web and desktop apps query the Pipe API with short-lived JWTs
//! that are obtained by exchanging the long-lived `arl` cookie. This crate
//! takes care of that exchange, caches the token, refreshes it before it
//! expires and retries once when the API rejects it. Query types generated
//! from `.graphql` files plug in through [`protocol::pipe::Query`].
//!
//! # Modules
//!
//! * [`arl`] - the long-lived credential
//! * [`config`] - endpoints, user agent and timing
//! * [`auth`] - single-flight token acquisition and caching
//! * [`pipe`] - the GraphQL client with refresh-and-retry
//! * [`protocol`] - wire types
//! * [`error`] - error categories
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod arl;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod pipe;
pub mod protocol;
pub mod token;

pub use arl::Arl;
pub use config::Config;
pub use error::{Error, Result};
pub use pipe::Client;
