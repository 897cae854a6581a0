//! HTTP request handlers.
//!
//! - [`upload`]: Relay uploaded files onto a CRM deal
//!
//! Handlers return [`crate::errors::Error`], which converts to the JSON error bodies clients
//! expect.

pub mod upload;
