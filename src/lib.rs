//! # adaptnet
//!
//! An adaptive HTTP request layer for API clients.
//!
//! `adaptnet` picks the best HTTP backend the host platform supports, keeps
//! one session cookie consistent between a shared cookie store and a
//! fallback preference slot, compresses request bodies with a codec that
//! downgrades itself when the server refuses it, and turns error redirects
//! into typed failures.
//!
//! ## Features
//!
//! - **Transport selection**: a pooled, caching engine where the platform
//!   allows it, a plain per-request HTTP/1.1 client otherwise
//! - **Cancellation**: every request runs on a dedicated connection that is
//!   disconnected however the caller leaves
//! - **Cookies**: shared store with a fallback copy for when it is locked
//! - **Compression**: Brotli request bodies with a sticky fallback to deflate
//! - **Error redirects**: `/error/<message>` locations surfaced as errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use adaptnet::Client;
//!
//! # async fn run() -> Result<(), adaptnet::base::neterror::NetError> {
//! let client = Client::builder()
//!     .active_url("https://maps.example.com")
//!     .build()?;
//! let outcome = client.post_graphql(r#"{"query":"{ viewer { id } }"}"#).await?;
//! println!("{:?}", outcome.response().map(|r| r.status()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error type and connection states
//! - [`client`] - The [`Client`] facade
//! - [`config`] - JSON-loadable configuration
//! - [`cookies`] - Cookie jar, shared store and session synchronization
//! - [`http`] - Requests, responses, compression, disk cache, error redirects
//! - [`prefs`] - Durable key-value preferences
//! - [`socket`] - TCP and TLS connection setup
//! - [`transport`] - Capability detection, backends and connections
//! - [`urlrequest`] - Redirects, cancellable execution, the active endpoint

pub mod base;
pub mod client;
pub mod config;
pub mod cookies;
pub mod http;
pub mod prefs;
pub mod socket;
pub mod transport;
pub mod urlrequest;

pub use base::neterror::NetError;
pub use client::{ApiOutcome, Client, ClientBuilder};
pub use config::ClientConfig;
