//! Request-level plumbing above the transports.
//!
//! - [`job`]: redirect following
//! - [`runner`]: cancellable execution on a dedicated connection
//! - [`endpoint`]: the active backend and its API URL

pub mod endpoint;
pub mod job;
pub mod runner;

pub use endpoint::{api_url, ActiveEndpoint};
pub use job::RedirectJob;
pub use runner::{run_on_connection, RequestRunner};
