//! Line-scoped errors raised while applying a script line.
//!
//! Every variant aborts the current line only; the batch driver reports it
//! together with the offending line text and moves on. Resource-level
//! failures (unreadable files, invalid manifest) are anyhow errors at the
//! CLI boundary instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    /// Malformed line grammar (missing '=', unmatched parentheses, ...).
    #[error("syntax: {detail}")]
    Syntax { detail: String },

    /// A new structure was requested without a DICOM type.
    #[error("no DICOM type was supplied for a new structure")]
    MissingDicomType,

    /// Wrong arity or an invalid argument for an operator.
    #[error("{op}: {detail}")]
    Argument { op: String, detail: String },

    /// Operator name not in the operator table.
    #[error("unknown operator '{name}'")]
    UnknownOperator { name: String },

    /// Overwrite target or referenced structure id absent from the set.
    #[error("no structure with id '{id}' in the structure set")]
    StructureNotFound { id: String },

    /// A search operator (ALL, LIST, PTVALL) matched nothing.
    #[error("no structures matched search text '{search}'")]
    NoMatches { search: String },

    /// LIST pre-check: a numbered expansion id is already taken.
    #[error("expansion id '{existing}' for base '{id}' already exists; remove or rename it first")]
    DuplicateExpansionId { id: String, existing: String },

    /// Raised by the volume algebra (duplicate create, stale handle,
    /// oversized margin step).
    #[error("structure set: {detail}")]
    Algebra { detail: String },
}

impl ScriptError {
    pub fn syntax(detail: impl Into<String>) -> Self {
        ScriptError::Syntax {
            detail: detail.into(),
        }
    }

    pub fn argument(op: impl Into<String>, detail: impl Into<String>) -> Self {
        ScriptError::Argument {
            op: op.into(),
            detail: detail.into(),
        }
    }

    pub fn algebra(detail: impl Into<String>) -> Self {
        ScriptError::Algebra {
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;
