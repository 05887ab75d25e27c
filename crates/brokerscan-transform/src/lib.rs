//! Brokerscan Transform - from raw text fields to destination rows
//!
//! Rewrites legacy load functions into current builtins and binds each
//! file group's source fields to the destination row schema.

pub mod binder;
pub mod error;
pub mod legacy;

pub use binder::{RowSchemaBinder, StagedGroup, StagingSchema, TransformPlan};
pub use error::TransformError;
pub use legacy::{is_legacy_function, rewrite_legacy_expr, rewrite_legacy_exprs};
