//! Target-spec resolution: `[!|~]ID[,DicomType][|R,G,B]`.
//!
//! A leading '!' or '~' selects overwrite mode (the id must already exist
//! in the set); otherwise a new structure is created and the DICOM type is
//! mandatory. The optional color rides behind '|'.

use crate::algebra::{DicomType, Rgb};
use crate::error::{Result, ScriptError};
use crate::id;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct TargetSpec {
    pub overwrite: bool,
    /// Sanitized id; uniquified against the set at bind time.
    pub id: String,
    /// Present iff `overwrite` is false.
    pub dicom_type: Option<DicomType>,
    pub color: Option<Rgb>,
}

pub fn resolve_target(spec: &str) -> Result<TargetSpec> {
    let (overwrite, rest) = match spec.strip_prefix(['!', '~']) {
        Some(rest) => (true, rest),
        None => (false, spec),
    };

    let (id_part, color_part) = match rest.split_once('|') {
        Some((id_part, color_part)) => (id_part, Some(color_part)),
        None => (rest, None),
    };

    let fields: Vec<&str> = id_part.split(',').collect();
    let sanitized = id::sanitize(fields[0]);
    if sanitized.is_empty() {
        return Err(ScriptError::syntax("empty structure id in target spec"));
    }

    let dicom_type = if overwrite {
        None
    } else {
        if fields.len() != 2 {
            return Err(ScriptError::MissingDicomType);
        }
        Some(DicomType::validate(fields[1]))
    };

    Ok(TargetSpec {
        overwrite,
        id: sanitized,
        dicom_type,
        color: color_part.and_then(parse_color),
    })
}

/// Exactly three byte components. A malformed color is skipped with a
/// warning; the structure is still created.
fn parse_color(part: &str) -> Option<Rgb> {
    let components: Vec<&str> = part.split(',').collect();
    if components.len() != 3 {
        warn!("color provided but incorrect format: {part}");
        return None;
    }

    let mut bytes = [0u8; 3];
    for (slot, component) in bytes.iter_mut().zip(&components) {
        match component.parse::<u8>() {
            Ok(value) => *slot = value,
            Err(_) => {
                warn!("color component '{component}' is not a byte value, skipping color");
                return None;
            }
        }
    }
    Some(Rgb {
        r: bytes[0],
        g: bytes[1],
        b: bytes[2],
    })
}
