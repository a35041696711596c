//! The transcoding engine: splitter, flattener, builder and the
//! split-and-flatten pipeline.
//!
//! All four pieces share one contract, the path encoding: dotted flat
//! keys whose marker-prefixed segments make the flattening losslessly
//! reversible. Flattening and building are exact inverses for any
//! message whose structure respects the key-field configuration.

pub mod build;
pub mod flatten;
pub mod pipeline;
pub mod split;

pub use build::{BuildReport, Builder};
pub use flatten::{FlatMessage, Flattener};
pub use pipeline::flatten_messages;
pub use split::{split, split_by_key, split_by_path};
