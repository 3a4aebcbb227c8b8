//! HTTP endpoint handlers.

pub mod common;
pub mod oauth;
pub mod preview;
pub mod sinks;
pub mod transform;

pub use oauth::{oauth_begin, oauth_callback, oauth_status};
pub use preview::{preview_original, preview_raw, preview_with_code};
pub use sinks::{fill_rdf_repo, fill_wizard};
pub use transform::transform_stored;
