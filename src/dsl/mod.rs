//! DSL layer: line grammar + validated in-memory forms.
//!
//! This module is intentionally separate from execution. It owns:
//! - line splitting (target spec vs. dot-delimited operator chain)
//! - target resolution (overwrite flag, id, DICOM type, color)
//! - the closed operator set with arity/argument validation

pub mod line;
pub mod ops;
pub mod target;

pub use line::{split_chain, split_line, OpToken};
pub use ops::{parse_chain, Op, SearchMode};
pub use target::{resolve_target, TargetSpec};
