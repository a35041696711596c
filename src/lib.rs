//! # ticflat - TIC 4.0 message transcoding
//!
//! A library for converting TIC 4.0 telemetry messages between their
//! hierarchical tree form and a flat, single-level dotted-path form,
//! and for validating that a tree-form message is structurally
//! well-formed.
//!
//! ## Modules
//!
//! - **transcode**: split, flatten and rebuild messages
//! - **validate**: structural validation (array uniqueness, allowed values)
//! - **config**: the key-field configuration shared by all operations
//!
//! ## Quick Start
//!
//! ### Flattening
//!
//! ```rust
//! use ticflat::{RawConfig, TicConfig, ValueRules, Flattener};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TicConfig::new(RawConfig::default(), &ValueRules::new())?;
//!
//! let message = json!({
//!     "energy": [
//!         {"arrayid": "a", "timestamp": "t1", "value": 10},
//!         {"arrayid": "b", "timestamp": "t1", "value": 20}
//!     ]
//! });
//!
//! let flat = Flattener::new(&config).flatten(&message, None)?;
//! assert_eq!(flat.get("energy.$a.value"), Some(&json!(10)));
//! # Ok(())
//! # }
//! ```
//!
//! ### Rebuilding
//!
//! ```rust
//! use ticflat::{RawConfig, TicConfig, ValueRules, Builder, Flattener};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = TicConfig::new(RawConfig::default(), &ValueRules::new())?;
//!
//! let message = json!({"crane": {"timestamp": "t1", "weight": 12.5}});
//! let flat = Flattener::new(&config).flatten(&message, None)?;
//!
//! let report = Builder::new(&config).build(&flat, None);
//! assert!(report.skipped.is_empty());
//! assert_eq!(report.message, message);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod node;
pub mod result;
pub mod rules;
pub mod time;
pub mod transcode;
pub mod validate;

// Re-export the types most callers need
pub use config::{RawConfig, TicConfig};
pub use error::{ErrorCatalog, TicError};
pub use result::TicResult;
pub use rules::{Rule, SchemaValidator, ValueRules};
pub use transcode::{
    flatten_messages, split, split_by_key, split_by_path, BuildReport, Builder, FlatMessage,
    Flattener,
};
pub use validate::Validator;
