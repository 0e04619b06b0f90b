//! Tessel Core Library
//!
//! Foundational types for the tessel ordered executor: node identifiers, the
//! error taxonomy, and the [`Node`] contract that units of deferred work
//! implement.
//!
//! The executor itself lives in `tessel-executor`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod prelude;
pub mod traits;
pub mod types;

pub use error::{Result, ResultExt, TesselError};
pub use traits::Node;
pub use types::NodeId;
