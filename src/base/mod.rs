//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/`:
//! - [`NetError`](neterror::NetError): Network error codes matching `net_error_list.h`
//! - [`LoadState`](loadstate::LoadState): Connection states

pub mod context;
pub mod loadstate;
pub mod neterror;

#[cfg(test)]
mod tests;
