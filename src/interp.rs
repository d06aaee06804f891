//! The interpreter: one script line in, one or more committed structures out.
//!
//! Processing is a strict left-to-right reduction over the operator chain.
//! Each operator reads the working structure's volume, derives the next
//! one through the volume algebra, and writes it back. The expansion
//! operators (SIMTPTV, LIST) re-bind the working structure; LIST
//! additionally re-enters the reduction for every structure it creates.

use crate::algebra::{
    DicomType, StructureHandle, VolumeAlgebra, MAX_MARGIN_STEP_MM,
};
use crate::dsl::{self, Op, SearchMode, TargetSpec};
use crate::error::{Result, ScriptError};
use crate::id;

pub struct Generator<'a, A: VolumeAlgebra> {
    algebra: &'a mut A,
    created: Vec<StructureHandle>,
}

impl<'a, A: VolumeAlgebra> Generator<'a, A> {
    pub fn new(algebra: &'a mut A) -> Self {
        Self {
            algebra,
            created: Vec::new(),
        }
    }

    /// Structures this line has created so far, in creation order. The
    /// batch driver uses this for reporting and for atomic-line rollback.
    pub fn created(&self) -> &[StructureHandle] {
        &self.created
    }

    /// Run one whitespace-stripped, non-comment line to completion and
    /// return the final working structure.
    pub fn run(&mut self, line: &str) -> Result<StructureHandle> {
        let (target_str, chain_str) = dsl::split_line(line)?;
        let target = dsl::resolve_target(target_str)?;
        let (base_ref, tokens) = dsl::split_chain(chain_str)?;
        let ops = dsl::parse_chain(&tokens)?;

        let working = self.bind_target(&target)?;
        if let Some(color) = target.color {
            self.algebra.set_color(working, color)?;
        }

        let seed = self.volume_of_ref(&base_ref)?;
        self.algebra.set_volume(working, seed)?;

        self.apply_ops(working, &ops)
    }

    /// Obtain the working structure: look it up in overwrite mode, create
    /// it (with a collision-free id) otherwise.
    fn bind_target(&mut self, target: &TargetSpec) -> Result<StructureHandle> {
        if target.overwrite {
            self.algebra
                .find(&target.id)
                .ok_or_else(|| ScriptError::StructureNotFound {
                    id: target.id.clone(),
                })
        } else {
            let dicom_type = target.dicom_type.unwrap_or_default();
            let unique = id::uniquify(&target.id, &self.algebra.all_structure_ids());
            self.create(dicom_type, &unique)
        }
    }

    fn apply_ops(&mut self, mut working: StructureHandle, ops: &[Op]) -> Result<StructureHandle> {
        for (index, op) in ops.iter().enumerate() {
            match op {
                Op::Ring {
                    start,
                    end,
                    high_res,
                } => {
                    if *high_res {
                        self.convert_if_possible(working)?;
                    }
                    let v = self.algebra.volume_of(working)?;
                    let outer = self.chunked_margin(v.clone(), *end)?;
                    let inner = self.chunked_margin(v, *start)?;
                    let ring = self.algebra.subtract(outer, inner);
                    self.algebra.set_volume(working, ring)?;
                }
                Op::Or(ids) => {
                    let mut volumes = vec![self.algebra.volume_of(working)?];
                    for sid in ids {
                        volumes.push(self.volume_of_ref(sid)?);
                    }
                    let v = self.algebra.union(&volumes);
                    self.algebra.set_volume(working, v)?;
                }
                Op::And(ids) => {
                    let current = self.algebra.volume_of(working)?;
                    let rhs = self.union_of_refs(ids)?;
                    let v = self.algebra.intersect(current, rhs);
                    self.algebra.set_volume(working, v)?;
                }
                Op::Sub(ids) => {
                    let current = self.algebra.volume_of(working)?;
                    let rhs = self.union_of_refs(ids)?;
                    let v = self.algebra.subtract(current, rhs);
                    self.algebra.set_volume(working, v)?;
                }
                Op::Not(ids) => {
                    let current = self.algebra.volume_of(working)?;
                    let rhs = self.union_of_refs(ids)?;
                    let v = self.algebra.symmetric_difference(current, rhs);
                    self.algebra.set_volume(working, v)?;
                }
                Op::CropOut {
                    reference,
                    distance,
                } => {
                    // Keep only what lies at least `distance` inside the
                    // reference: intersect with the contracted reference.
                    let current = self.algebra.volume_of(working)?;
                    let eroded = self.chunked_margin(self.volume_of_ref(reference)?, -distance)?;
                    let v = self.algebra.intersect(current, eroded);
                    self.algebra.set_volume(working, v)?;
                }
                Op::CropIn {
                    reference,
                    distance,
                } => {
                    // Remove everything within `distance` of the reference:
                    // subtract the expanded reference.
                    let current = self.algebra.volume_of(working)?;
                    let grown = self.chunked_margin(self.volume_of_ref(reference)?, *distance)?;
                    let v = self.algebra.subtract(current, grown);
                    self.algebra.set_volume(working, v)?;
                }
                Op::Margin { distance } => {
                    let current = self.algebra.volume_of(working)?;
                    let v = self.chunked_margin(current, *distance)?;
                    self.algebra.set_volume(working, v)?;
                }
                Op::AsymMargin { faces, geometry } => {
                    let current = self.algebra.volume_of(working)?;
                    let v = self.algebra.asymmetric_margin(current, *faces, *geometry);
                    self.algebra.set_volume(working, v)?;
                }
                Op::PtvAll => {
                    let mut volumes = Vec::new();
                    for sid in self.algebra.all_structure_ids() {
                        if sid.to_uppercase().starts_with("PTV") {
                            volumes.push(self.volume_of_ref(&sid)?);
                        }
                    }
                    if volumes.is_empty() {
                        return Err(ScriptError::NoMatches {
                            search: "PTV".to_string(),
                        });
                    }
                    let v = self.algebra.union(&volumes);
                    self.algebra.set_volume(working, v)?;
                }
                Op::HighRes => {
                    self.convert_if_possible(working)?;
                }
                Op::All { search, mode } => {
                    let matches = self.search_matches(search, *mode)?;
                    let volumes = matches
                        .iter()
                        .map(|h| self.algebra.volume_of(*h))
                        .collect::<Result<Vec<_>>>()?;
                    let v = self.algebra.union(&volumes);
                    self.algebra.set_volume(working, v)?;
                }
                Op::SimtPtv => {
                    working = self.expand_sim_ptvs(working)?;
                }
                Op::List { search, mode } => {
                    return self.expand_list(working, search, *mode, &ops[index + 1..]);
                }
            }
        }
        Ok(working)
    }

    /// SIMTPTV: for every structure whose id starts with PTV, synthesize
    /// `z_<base>_10mm` seeded from it and expanded by 10mm. The working
    /// structure is re-bound to the last synthesized structure.
    fn expand_sim_ptvs(&mut self, working: StructureHandle) -> Result<StructureHandle> {
        let snapshot = self.algebra.all_structure_ids();
        let mut latest = working;
        for sid in snapshot {
            if !sid.to_uppercase().starts_with("PTV") {
                continue;
            }
            let source = self.volume_of_ref(&sid)?;
            let handle = self.create(DicomType::Ptv, &format!("z_{}_10mm", sim_ptv_base(&sid)))?;
            let expanded = self.chunked_margin(source, 10.0)?;
            self.algebra.set_volume(handle, expanded)?;
            latest = handle;
        }
        Ok(latest)
    }

    /// LIST: one new structure per match, numbered from 1, each seeded
    /// from its match and run through the rest of the chain. The
    /// placeholder target structure is removed at the end.
    fn expand_list(
        &mut self,
        working: StructureHandle,
        search: &str,
        mode: SearchMode,
        rest: &[Op],
    ) -> Result<StructureHandle> {
        let placeholder_id = self.algebra.id_of(working)?.to_string();
        let dicom_type = self.algebra.dicom_type_of(working)?;

        let existing = self.algebra.all_structure_ids();
        for n in 1..=99u32 {
            let candidate = format!("{placeholder_id}{n}");
            if existing.iter().any(|e| id::same_id(e, &candidate)) {
                return Err(ScriptError::DuplicateExpansionId {
                    id: placeholder_id,
                    existing: candidate,
                });
            }
        }

        let matches = self.search_matches(search, mode)?;
        let mut latest = working;
        for (index, source) in matches.into_iter().enumerate() {
            let seed = self.algebra.volume_of(source)?;
            let expansion_id = id::uniquify(
                &format!("{placeholder_id}{}", index + 1),
                &self.algebra.all_structure_ids(),
            );
            let handle = self.create(dicom_type, &expansion_id)?;
            self.algebra.set_volume(handle, seed)?;
            latest = self.apply_ops(handle, rest)?;
        }

        // The placeholder only ever existed to anchor the expansion.
        self.algebra.remove(working)?;
        Ok(latest)
    }

    fn create(&mut self, dicom_type: DicomType, sid: &str) -> Result<StructureHandle> {
        let handle = self.algebra.create(dicom_type, sid)?;
        self.created.push(handle);
        Ok(handle)
    }

    fn volume_of_ref(&self, sid: &str) -> Result<A::Volume> {
        let handle = self
            .algebra
            .find(sid)
            .ok_or_else(|| ScriptError::StructureNotFound {
                id: sid.to_string(),
            })?;
        self.algebra.volume_of(handle)
    }

    fn union_of_refs(&self, ids: &[String]) -> Result<A::Volume> {
        let volumes = ids
            .iter()
            .map(|sid| self.volume_of_ref(sid))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.algebra.union(&volumes))
    }

    fn convert_if_possible(&mut self, handle: StructureHandle) -> Result<()> {
        if self.algebra.can_convert_to_high_resolution(handle) {
            self.algebra.convert_to_high_resolution(handle)?;
        }
        Ok(())
    }

    /// The algebra only accepts single steps up to 50mm; larger distances
    /// become repeated signed 50mm steps plus a remainder step.
    fn chunked_margin(&self, volume: A::Volume, mm: f64) -> Result<A::Volume> {
        let steps = (mm.abs() / MAX_MARGIN_STEP_MM).floor() as u32;
        if steps == 0 {
            return self.algebra.margin(volume, mm);
        }

        let step = MAX_MARGIN_STEP_MM.copysign(mm);
        let remainder = mm % MAX_MARGIN_STEP_MM;
        let mut out = volume;
        for _ in 0..steps {
            out = self.algebra.margin(out, step)?;
        }
        if remainder != 0.0 {
            out = self.algebra.margin(out, remainder)?;
        }
        Ok(out)
    }

    /// Non-empty structures whose id matches, in set order.
    fn search_matches(&self, search: &str, mode: SearchMode) -> Result<Vec<StructureHandle>> {
        let mut matches = Vec::new();
        for sid in self.algebra.all_structure_ids() {
            let Some(handle) = self.algebra.find(&sid) else {
                continue;
            };
            if self.algebra.is_empty(handle) {
                continue;
            }
            if mode.matches(&sid, search) {
                matches.push(handle);
            }
        }
        if matches.is_empty() {
            return Err(ScriptError::NoMatches {
                search: search.to_string(),
            });
        }
        Ok(matches)
    }
}

/// Short PTV label for SIMTPTV output ids: ids of up to five characters
/// pass through whole, compound ids keep the prefix before the first '_',
/// anything else truncates to five characters.
fn sim_ptv_base(sid: &str) -> String {
    if sid.chars().count() <= 5 {
        sid.to_string()
    } else if let Some((prefix, _)) = sid.split_once('_') {
        prefix.to_string()
    } else {
        sid.chars().take(5).collect()
    }
}
