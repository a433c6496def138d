//! # stamp_spec
//!
//! Typed model of template spec files for stamp.
//!
//! A spec declares the inputs a template accepts and the ordered steps that
//! render it. This crate only parses; runtime checks (path safety, variable
//! resolution, file existence) belong to `stamp_templates`.
//!
//! ## Example
//!
//! ```rust
//! use stamp_spec::{Action, SpecReader};
//!
//! let spec = SpecReader::from_str(r#"
//! inputs:
//!   - name: service
//! steps:
//!   - action: include
//!     params:
//!       paths:
//!         - paths: ['.']
//! "#).unwrap();
//!
//! assert_eq!(spec.inputs[0].name, "service");
//! assert!(matches!(spec.steps[0].action, Action::Include(_)));
//! ```

pub mod error;
pub mod models;
pub mod reader;

pub use error::{SpecError, SpecResult};
pub use models::*;
pub use reader::{SpecReader, DEFAULT_SPEC_FILE};
