//! Helpers shared by the drivers.
//!
//! - [`tls`]: rustls setup for the PostgreSQL target

pub mod tls;

pub use tls::{SslMode, TlsBuilder};
