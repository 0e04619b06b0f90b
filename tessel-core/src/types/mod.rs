//! Core types for tessel.
//!
//! - `NodeId`: Identifier for a unit of deferred work, ordered by submission

mod ids;

pub use ids::NodeId;
