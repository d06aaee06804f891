//! Volume algebra boundary: the geometry engine the interpreter drives.
//!
//! The interpreter never inspects a volume; it only composes calls on this
//! trait. The shipped implementation (`ExprAlgebra`) is symbolic: it
//! records the composition instead of computing contours, which is enough
//! for plan/report mode and for the tests. A clinical engine implements
//! the same trait against real contour math.

pub mod expr;

pub use expr::{ExprAlgebra, Manifest, ManifestEntry, Volume};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Categorical DICOM tag for a structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DicomType {
    Ptv,
    Ctv,
    Gtv,
    Avoidance,
    Control,
    Organ,
    #[default]
    None,
}

impl DicomType {
    /// Whitelist validation: anything outside the known set coerces to NONE.
    pub fn validate(raw: &str) -> DicomType {
        match raw.to_uppercase().as_str() {
            "PTV" => DicomType::Ptv,
            "CTV" => DicomType::Ctv,
            "GTV" => DicomType::Gtv,
            "AVOIDANCE" => DicomType::Avoidance,
            "CONTROL" => DicomType::Control,
            "ORGAN" => DicomType::Organ,
            _ => DicomType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DicomType::Ptv => "PTV",
            DicomType::Ctv => "CTV",
            DicomType::Gtv => "GTV",
            DicomType::Avoidance => "AVOIDANCE",
            DicomType::Control => "CONTROL",
            DicomType::Organ => "ORGAN",
            DicomType::None => "NONE",
        }
    }
}

impl fmt::Display for DicomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structure display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Inner or outer asymmetric margin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginGeometry {
    #[default]
    Outer,
    Inner,
}

impl MarginGeometry {
    /// Case-insensitive parse of the optional ASYMMARGIN geometry argument.
    pub fn from_arg(raw: &str) -> Option<MarginGeometry> {
        match raw.to_uppercase().as_str() {
            "OUTER" => Some(MarginGeometry::Outer),
            "INNER" => Some(MarginGeometry::Inner),
            _ => None,
        }
    }
}

impl fmt::Display for MarginGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginGeometry::Outer => f.write_str("outer"),
            MarginGeometry::Inner => f.write_str("inner"),
        }
    }
}

/// Opaque key for a structure in the store. Stays valid until the
/// structure is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructureHandle(pub(crate) u64);

/// Per-face distances in the canonical (-x, -y, -z, +x, +y, +z) =
/// (right, ant, inf, left, post, sup) layout.
pub type FaceMargins = [f64; 6];

/// Largest margin the engine applies in a single step; the interpreter
/// decomposes anything larger into repeated steps.
pub const MAX_MARGIN_STEP_MM: f64 = 50.0;

pub trait VolumeAlgebra {
    type Volume: Clone;

    /// Add an empty structure. Fails on a duplicate id (case-insensitive)
    /// or an id over the 16-character budget.
    fn create(&mut self, dicom_type: DicomType, id: &str) -> Result<StructureHandle>;

    /// Case-insensitive id lookup, first match in set order.
    fn find(&self, id: &str) -> Option<StructureHandle>;

    fn remove(&mut self, handle: StructureHandle) -> Result<()>;

    fn id_of(&self, handle: StructureHandle) -> Result<&str>;
    fn dicom_type_of(&self, handle: StructureHandle) -> Result<DicomType>;
    fn color_of(&self, handle: StructureHandle) -> Result<Option<Rgb>>;
    fn set_color(&mut self, handle: StructureHandle, color: Rgb) -> Result<()>;

    fn volume_of(&self, handle: StructureHandle) -> Result<Self::Volume>;
    fn set_volume(&mut self, handle: StructureHandle, volume: Self::Volume) -> Result<()>;

    fn union(&self, volumes: &[Self::Volume]) -> Self::Volume;
    fn intersect(&self, a: Self::Volume, b: Self::Volume) -> Self::Volume;
    fn subtract(&self, a: Self::Volume, b: Self::Volume) -> Self::Volume;
    fn symmetric_difference(&self, a: Self::Volume, b: Self::Volume) -> Self::Volume;

    /// Uniform expansion (positive) or contraction (negative). Defined
    /// only for |mm| <= 50; larger distances are the caller's problem.
    fn margin(&self, volume: Self::Volume, mm: f64) -> Result<Self::Volume>;

    fn asymmetric_margin(
        &self,
        volume: Self::Volume,
        faces: FaceMargins,
        geometry: MarginGeometry,
    ) -> Self::Volume;

    fn is_empty(&self, handle: StructureHandle) -> bool;
    fn is_high_resolution(&self, handle: StructureHandle) -> bool;
    fn can_convert_to_high_resolution(&self, handle: StructureHandle) -> bool;
    fn convert_to_high_resolution(&mut self, handle: StructureHandle) -> Result<()>;

    /// All structure ids in set order.
    fn all_structure_ids(&self) -> Vec<String>;
}
