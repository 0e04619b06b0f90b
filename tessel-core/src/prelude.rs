//! Prelude for convenient imports.
//!
//! # Example
//!
//! ```ignore
//! use tessel_core::prelude::*;
//! ```

pub use crate::error::{Result, ResultExt, TesselError};
pub use crate::traits::Node;
pub use crate::types::NodeId;
