//! Temporary disk staging for result streams.
//!
//! Some engine output formats are served without a content-length header,
//! while some sink integrations refuse uploads of unknown length. The staging
//! store materializes a result stream to disk exactly once so the final hop
//! can run with a known length, and guarantees the staged file is removed on
//! every exit path of the same request.

pub mod error;
pub mod store;

pub use error::{StagingError, StagingResult};
pub use store::{StagedFile, StagingStore};
