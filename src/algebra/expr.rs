//! Symbolic volume algebra + the structure-set manifest it loads from.
//!
//! Manifest shape (JSON):
//! {
//!   "structures": [
//!     {
//!       "id": "PTV1",
//!       "dicom_type": "PTV",          // optional, defaults to NONE
//!       "empty": false,               // optional
//!       "high_resolution": false,     // optional
//!       "convertible": true,          // optional
//!       "color": {"r":255,"g":0,"b":0} // optional
//!     },
//!     ...
//!   ]
//! }
//!
//! Volumes are expression trees over the manifest's source contours; two
//! volumes are equal when their compositions are equal. This is what the
//! plan report prints and what the tests assert against.

use crate::algebra::{
    DicomType, FaceMargins, MarginGeometry, Rgb, StructureHandle, VolumeAlgebra,
    MAX_MARGIN_STEP_MM,
};
use crate::error::{Result, ScriptError};
use crate::id::{self, MAX_ID_LEN};
use anyhow::bail;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Composition of set operations over source contours.
#[derive(Debug, Clone, PartialEq)]
pub enum Volume {
    Empty,
    Source(String),
    Union(Vec<Volume>),
    Intersect(Box<Volume>, Box<Volume>),
    Subtract(Box<Volume>, Box<Volume>),
    SymDiff(Box<Volume>, Box<Volume>),
    Margin(Box<Volume>, f64),
    AsymMargin(Box<Volume>, FaceMargins, MarginGeometry),
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volume::Empty => f.write_str("empty"),
            Volume::Source(id) => f.write_str(id),
            Volume::Union(vs) => {
                f.write_str("union(")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
            Volume::Intersect(a, b) => write!(f, "intersect({a}, {b})"),
            Volume::Subtract(a, b) => write!(f, "sub({a}, {b})"),
            Volume::SymDiff(a, b) => write!(f, "xor({a}, {b})"),
            Volume::Margin(v, mm) => write!(f, "margin({v}, {mm})"),
            Volume::AsymMargin(v, faces, geometry) => {
                write!(f, "asymmargin({v}, {faces:?}, {geometry})")
            }
        }
    }
}

/// Raw structure row as it appears in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub id: String,

    #[serde(default)]
    pub dicom_type: DicomType,

    #[serde(default)]
    pub empty: bool,

    #[serde(default)]
    pub high_resolution: bool,

    #[serde(default = "default_convertible")]
    pub convertible: bool,

    #[serde(default)]
    pub color: Option<Rgb>,
}

fn default_convertible() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub structures: Vec<ManifestEntry>,
}

#[derive(Debug, Clone)]
struct StructureRecord {
    id: String,
    dicom_type: DicomType,
    color: Option<Rgb>,
    volume: Volume,
    high_resolution: bool,
    convertible: bool,
}

/// In-memory structure store with symbolic volumes. Iteration order is
/// insertion order, which stands in for the set order of a real engine.
#[derive(Debug, Default)]
pub struct ExprAlgebra {
    structures: BTreeMap<u64, StructureRecord>,
    next: u64,
}

impl ExprAlgebra {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from a manifest, rejecting duplicate ids.
    pub fn from_manifest(manifest: &Manifest) -> anyhow::Result<Self> {
        let mut out = Self::new();
        for entry in &manifest.structures {
            let entry_id = entry.id.trim();
            if entry_id.is_empty() {
                bail!("manifest contains a structure with an empty id");
            }
            if out.find(entry_id).is_some() {
                bail!("duplicate structure id in manifest: {}", entry_id);
            }

            let volume = if entry.empty {
                Volume::Empty
            } else {
                Volume::Source(entry_id.to_string())
            };
            out.insert_record(StructureRecord {
                id: entry_id.to_string(),
                dicom_type: entry.dicom_type,
                color: entry.color,
                volume,
                high_resolution: entry.high_resolution,
                convertible: entry.convertible,
            });
        }
        Ok(out)
    }

    /// Handles in set order; convenience for report building.
    pub fn handles(&self) -> Vec<StructureHandle> {
        self.structures.keys().map(|k| StructureHandle(*k)).collect()
    }

    fn insert_record(&mut self, record: StructureRecord) -> StructureHandle {
        let key = self.next;
        self.next += 1;
        self.structures.insert(key, record);
        StructureHandle(key)
    }

    fn record(&self, handle: StructureHandle) -> Result<&StructureRecord> {
        self.structures
            .get(&handle.0)
            .ok_or_else(|| ScriptError::algebra("stale structure handle"))
    }

    fn record_mut(&mut self, handle: StructureHandle) -> Result<&mut StructureRecord> {
        self.structures
            .get_mut(&handle.0)
            .ok_or_else(|| ScriptError::algebra("stale structure handle"))
    }
}

impl VolumeAlgebra for ExprAlgebra {
    type Volume = Volume;

    fn create(&mut self, dicom_type: DicomType, id: &str) -> Result<StructureHandle> {
        if id.is_empty() {
            return Err(ScriptError::algebra("structure id may not be empty"));
        }
        if id.chars().count() > MAX_ID_LEN {
            return Err(ScriptError::algebra(format!(
                "structure id '{id}' exceeds {MAX_ID_LEN} characters"
            )));
        }
        if self.find(id).is_some() {
            return Err(ScriptError::algebra(format!(
                "structure id '{id}' already exists"
            )));
        }
        Ok(self.insert_record(StructureRecord {
            id: id.to_string(),
            dicom_type,
            color: None,
            volume: Volume::Empty,
            high_resolution: false,
            convertible: true,
        }))
    }

    fn find(&self, id: &str) -> Option<StructureHandle> {
        self.structures
            .iter()
            .find(|(_, r)| id::same_id(&r.id, id))
            .map(|(k, _)| StructureHandle(*k))
    }

    fn remove(&mut self, handle: StructureHandle) -> Result<()> {
        self.structures
            .remove(&handle.0)
            .map(|_| ())
            .ok_or_else(|| ScriptError::algebra("stale structure handle"))
    }

    fn id_of(&self, handle: StructureHandle) -> Result<&str> {
        Ok(&self.record(handle)?.id)
    }

    fn dicom_type_of(&self, handle: StructureHandle) -> Result<DicomType> {
        Ok(self.record(handle)?.dicom_type)
    }

    fn color_of(&self, handle: StructureHandle) -> Result<Option<Rgb>> {
        Ok(self.record(handle)?.color)
    }

    fn set_color(&mut self, handle: StructureHandle, color: Rgb) -> Result<()> {
        self.record_mut(handle)?.color = Some(color);
        Ok(())
    }

    fn volume_of(&self, handle: StructureHandle) -> Result<Volume> {
        Ok(self.record(handle)?.volume.clone())
    }

    fn set_volume(&mut self, handle: StructureHandle, volume: Volume) -> Result<()> {
        self.record_mut(handle)?.volume = volume;
        Ok(())
    }

    fn union(&self, volumes: &[Volume]) -> Volume {
        match volumes {
            [] => Volume::Empty,
            [only] => only.clone(),
            many => Volume::Union(many.to_vec()),
        }
    }

    fn intersect(&self, a: Volume, b: Volume) -> Volume {
        Volume::Intersect(Box::new(a), Box::new(b))
    }

    fn subtract(&self, a: Volume, b: Volume) -> Volume {
        Volume::Subtract(Box::new(a), Box::new(b))
    }

    fn symmetric_difference(&self, a: Volume, b: Volume) -> Volume {
        Volume::SymDiff(Box::new(a), Box::new(b))
    }

    fn margin(&self, volume: Volume, mm: f64) -> Result<Volume> {
        if mm.abs() > MAX_MARGIN_STEP_MM {
            return Err(ScriptError::algebra(format!(
                "margin step {mm}mm exceeds {MAX_MARGIN_STEP_MM}mm"
            )));
        }
        Ok(Volume::Margin(Box::new(volume), mm))
    }

    fn asymmetric_margin(
        &self,
        volume: Volume,
        faces: FaceMargins,
        geometry: MarginGeometry,
    ) -> Volume {
        Volume::AsymMargin(Box::new(volume), faces, geometry)
    }

    fn is_empty(&self, handle: StructureHandle) -> bool {
        self.record(handle)
            .map(|r| r.volume == Volume::Empty)
            .unwrap_or(true)
    }

    fn is_high_resolution(&self, handle: StructureHandle) -> bool {
        self.record(handle)
            .map(|r| r.high_resolution)
            .unwrap_or(false)
    }

    fn can_convert_to_high_resolution(&self, handle: StructureHandle) -> bool {
        self.record(handle)
            .map(|r| r.convertible && !r.high_resolution)
            .unwrap_or(false)
    }

    fn convert_to_high_resolution(&mut self, handle: StructureHandle) -> Result<()> {
        let record = self.record_mut(handle)?;
        if !record.convertible {
            return Err(ScriptError::algebra(format!(
                "structure '{}' cannot be converted to high resolution",
                record.id
            )));
        }
        record.high_resolution = true;
        Ok(())
    }

    fn all_structure_ids(&self) -> Vec<String> {
        self.structures.values().map(|r| r.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn manifest(ids: &[&str]) -> Manifest {
        Manifest {
            structures: ids
                .iter()
                .map(|id| ManifestEntry {
                    id: id.to_string(),
                    dicom_type: DicomType::None,
                    empty: false,
                    high_resolution: false,
                    convertible: true,
                    color: None,
                })
                .collect(),
        }
    }

    #[test]
    fn manifest_rejects_duplicate_ids() {
        let err = ExprAlgebra::from_manifest(&manifest(&["Body", "BODY"])).unwrap_err();
        assert!(err.to_string().contains("duplicate structure id"));
    }

    #[test]
    fn manifest_parses_from_json() {
        let m: Manifest = serde_json::from_str(
            r#"{"structures":[
                {"id":"PTV1","dicom_type":"PTV"},
                {"id":"Body","dicom_type":"ORGAN","color":{"r":0,"g":255,"b":0}},
                {"id":"Shell","empty":true}
            ]}"#,
        )
        .unwrap();
        let algebra = ExprAlgebra::from_manifest(&m).unwrap();
        assert_eq!(
            algebra.all_structure_ids(),
            vec!["PTV1".to_string(), "Body".to_string(), "Shell".to_string()]
        );

        let ptv = algebra.find("ptv1").unwrap();
        assert_eq!(algebra.dicom_type_of(ptv).unwrap(), DicomType::Ptv);
        assert!(!algebra.is_empty(ptv));

        let shell = algebra.find("Shell").unwrap();
        assert!(algebra.is_empty(shell));
    }

    #[test]
    fn create_rejects_duplicates_and_oversized_ids() {
        let mut algebra = ExprAlgebra::from_manifest(&manifest(&["Body"])).unwrap();
        assert!(algebra.create(DicomType::Control, "body").is_err());
        assert!(algebra
            .create(DicomType::Control, "abcdefghijklmnopq")
            .is_err());
        assert!(algebra.create(DicomType::Control, "ring").is_ok());
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut algebra = ExprAlgebra::new();
        let h = algebra.create(DicomType::Control, "tmp").unwrap();
        algebra.remove(h).unwrap();
        assert!(algebra.volume_of(h).is_err());
        assert!(algebra.find("tmp").is_none());
    }

    #[test]
    fn margin_rejects_oversized_steps() {
        let algebra = ExprAlgebra::new();
        assert!(algebra.margin(Volume::Source("x".into()), 50.0).is_ok());
        assert!(algebra.margin(Volume::Source("x".into()), 50.1).is_err());
        assert!(algebra.margin(Volume::Source("x".into()), -51.0).is_err());
    }

    #[test]
    fn conversion_flips_the_flag_once() {
        let mut algebra = ExprAlgebra::new();
        let h = algebra.create(DicomType::Organ, "Liver").unwrap();
        assert!(algebra.can_convert_to_high_resolution(h));
        algebra.convert_to_high_resolution(h).unwrap();
        assert!(algebra.is_high_resolution(h));
        assert!(!algebra.can_convert_to_high_resolution(h));
    }

    #[test]
    fn volumes_render_compactly() {
        let v = Volume::Subtract(
            Box::new(Volume::Margin(Box::new(Volume::Source("PTV".into())), 20.0)),
            Box::new(Volume::Margin(Box::new(Volume::Source("PTV".into())), 5.0)),
        );
        assert_eq!(v.to_string(), "sub(margin(PTV, 20), margin(PTV, 5))");
    }
}
