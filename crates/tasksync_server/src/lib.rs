//! # TaskSync Server
//!
//! Reference self-hosted endpoint for TaskSync.
//!
//! This crate provides:
//! - The `GET`/`PUT /api/data` snapshot resource
//! - Version assignment on every accepted `PUT`
//! - Optional bearer authentication (shared secret or HMAC-SHA256 tokens)
//!
//! The server holds exactly one snapshot and never merges: a `PUT` replaces
//! the stored snapshot wholesale. It has no socket code of its own; an HTTP
//! framework hosts [`DataServer::handle`].
//!
//! # Authentication
//!
//! ```rust
//! use tasksync_server::{AuthConfig, DataServer, ServerConfig, TokenValidator};
//!
//! let auth = AuthConfig::new(b"my-secure-secret-32-bytes-long!".to_vec());
//! let server = DataServer::in_memory(ServerConfig::default().with_signed_tokens(auth.clone()));
//!
//! let token = TokenValidator::new(auth).create_token("laptop").unwrap();
//! let header = format!("Bearer {token}");
//! assert_eq!(server.handle("GET", "/api/data", Some(&header), b"").status, 404);
//! assert_eq!(server.handle("GET", "/api/data", None, b"").status, 401);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{bearer_token, AuthConfig, SimpleTokenValidator, TokenValidator};
pub use config::{AuthMode, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{PutResponse, RequestHandler, DATA_PATH};
pub use server::{DataServer, ServerResponse};
