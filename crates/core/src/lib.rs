//! Core domain types for the graftgate streaming gateway.
//!
//! This crate holds the pieces shared between the server and its tests:
//! configuration, the session/token model, attachment metadata resolution,
//! and the transformation request model.

pub mod attachment;
pub mod config;
pub mod error;
pub mod token;
pub mod transform;

pub use attachment::{AttachmentInfo, mime_for_extension, resolve_attachment};
pub use config::AppConfig;
pub use error::Error;
pub use token::{Session, StoredToken, TokenGrant};
pub use transform::{LengthPolicy, TransformKind, TransformQuery, sanitize_base_name};
