//! Serializable views of a batch run: per-line outcomes plus the final
//! structure set.

use crate::algebra::{DicomType, Rgb, VolumeAlgebra};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct StructureView {
    pub id: String,
    pub dicom_type: DicomType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
    pub high_resolution: bool,
    pub empty: bool,
    /// Rendered volume composition.
    pub volume: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    /// Original line text, the source of truth for error correlation.
    pub line: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ids created by this line that survived it.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotalsView {
    pub lines_applied: usize,
    pub lines_failed: usize,
    pub structures: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub totals: TotalsView,
    pub lines: Vec<LineReport>,
    pub structures: Vec<StructureView>,
}

/// Assemble the report from the driver's line outcomes and the final
/// state of the structure set.
pub fn build_report<A>(algebra: &A, lines: Vec<LineReport>) -> ApplyReport
where
    A: VolumeAlgebra,
    A::Volume: fmt::Display,
{
    let mut structures = Vec::new();
    for sid in algebra.all_structure_ids() {
        let Some(handle) = algebra.find(&sid) else {
            continue;
        };
        structures.push(StructureView {
            id: sid,
            dicom_type: algebra.dicom_type_of(handle).unwrap_or_default(),
            color: algebra.color_of(handle).ok().flatten(),
            high_resolution: algebra.is_high_resolution(handle),
            empty: algebra.is_empty(handle),
            volume: algebra
                .volume_of(handle)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        });
    }

    let lines_applied = lines.iter().filter(|l| l.ok).count();
    let lines_failed = lines.len() - lines_applied;

    ApplyReport {
        totals: TotalsView {
            lines_applied,
            lines_failed,
            structures: structures.len(),
        },
        lines,
        structures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::ExprAlgebra;
    use crate::interp::Generator;
    use pretty_assertions::assert_eq;

    #[test]
    fn report_reflects_the_final_set() {
        let mut algebra = ExprAlgebra::new();
        algebra.create(DicomType::Organ, "Body").unwrap();
        let mut generator = Generator::new(&mut algebra);
        assert!(generator.run("X,CONTROL=Body.Margin(5)").is_ok());

        let report = build_report(
            &algebra,
            vec![LineReport {
                line: "X,CONTROL=Body.Margin(5)".to_string(),
                ok: true,
                error: None,
                created: vec!["X".to_string()],
            }],
        );

        assert_eq!(report.totals.lines_applied, 1);
        assert_eq!(report.totals.lines_failed, 0);
        assert_eq!(report.totals.structures, 2);
        assert_eq!(report.structures[1].id, "X");
        assert_eq!(report.structures[1].volume, "margin(empty, 5)");
    }

    #[test]
    fn report_serializes_to_json() {
        let algebra = ExprAlgebra::new();
        let report = build_report::<ExprAlgebra>(&algebra, Vec::new());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"totals\""));
    }
}
