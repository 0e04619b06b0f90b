//! Core traits for tessel components.
//!
//! - `Node`: The unit of deferred work the executor runs in id order

mod node;

pub use node::Node;
