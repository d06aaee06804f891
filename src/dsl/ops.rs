//! The operator table: raw tokens parsed into a closed operator set.
//!
//! Everything that can be validated without the structure set happens
//! here (operator names, arity, numeric arguments, search modes, margin
//! geometry), so a line with a malformed chain fails before the target
//! structure is bound.

use crate::algebra::{FaceMargins, MarginGeometry};
use crate::dsl::line::OpToken;
use crate::error::{Result, ScriptError};
use tracing::warn;

/// Search modes for ALL and LIST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Starts,
    In,
    Ends,
}

impl SearchMode {
    fn from_arg(op: &str, raw: &str) -> Result<SearchMode> {
        match raw.to_uppercase().as_str() {
            "STARTS" => Ok(SearchMode::Starts),
            "IN" => Ok(SearchMode::In),
            "ENDS" => Ok(SearchMode::Ends),
            _ => Err(ScriptError::argument(
                op,
                format!("'{raw}' is not a search mode; STARTS, IN and ENDS are valid"),
            )),
        }
    }

    /// Case-insensitive match of `search` (already uppercased) against an id.
    pub fn matches(self, id: &str, search: &str) -> bool {
        let id = id.to_uppercase();
        match self {
            SearchMode::Starts => id.starts_with(search),
            SearchMode::In => id.contains(search),
            SearchMode::Ends => id.ends_with(search),
        }
    }
}

/// One step of an operator chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Ring {
        start: f64,
        end: f64,
        high_res: bool,
    },
    Or(Vec<String>),
    And(Vec<String>),
    Sub(Vec<String>),
    Not(Vec<String>),
    CropOut {
        reference: String,
        distance: f64,
    },
    CropIn {
        reference: String,
        distance: f64,
    },
    Margin {
        distance: f64,
    },
    AsymMargin {
        faces: FaceMargins,
        geometry: MarginGeometry,
    },
    PtvAll,
    HighRes,
    All {
        search: String,
        mode: SearchMode,
    },
    SimtPtv,
    List {
        search: String,
        mode: SearchMode,
    },
}

pub fn parse_chain(tokens: &[OpToken]) -> Result<Vec<Op>> {
    tokens.iter().map(parse_op).collect()
}

pub fn parse_op(token: &OpToken) -> Result<Op> {
    let name = token.name.to_uppercase();
    let args = &token.args;

    let op = match name.as_str() {
        "RING" => {
            arity_range(&name, args, 2, 3)?;
            Op::Ring {
                start: number(&name, &args[0])?,
                end: number(&name, &args[1])?,
                // Any third argument requests high-resolution conversion.
                high_res: args.len() == 3,
            }
        }
        "OR" => Op::Or(references(&name, args)?),
        "AND" => Op::And(references(&name, args)?),
        "SUB" => Op::Sub(references(&name, args)?),
        "NOT" => Op::Not(references(&name, args)?),
        "CROPOUT" | "CROPIN" => {
            arity(&name, args, 2)?;
            let reference = args[0].clone();
            let distance = number(&name, &args[1])?;
            if distance < 0.0 {
                return Err(ScriptError::argument(&name, "crop distance must be positive"));
            }
            if name == "CROPOUT" {
                Op::CropOut { reference, distance }
            } else {
                Op::CropIn { reference, distance }
            }
        }
        "MARGIN" => {
            arity(&name, args, 1)?;
            Op::Margin {
                distance: number(&name, &args[0])?,
            }
        }
        "ASYMMARGIN" => {
            arity_range(&name, args, 6, 7)?;
            // Scripts give ant, post, left, right, sup, inf; the algebra
            // wants (-x,-y,-z,+x,+y,+z) = (right, ant, inf, left, post, sup).
            let given: Vec<f64> = args[..6]
                .iter()
                .map(|a| number(&name, a))
                .collect::<Result<_>>()?;
            let faces = [given[3], given[0], given[5], given[2], given[1], given[4]];
            let geometry = match args.get(6) {
                None => MarginGeometry::default(),
                Some(raw) => MarginGeometry::from_arg(raw).unwrap_or_else(|| {
                    warn!("unknown margin geometry '{raw}', using outer");
                    MarginGeometry::default()
                }),
            };
            Op::AsymMargin { faces, geometry }
        }
        "PTVALL" => {
            arity(&name, args, 0)?;
            Op::PtvAll
        }
        "HIGHRES" => {
            arity(&name, args, 0)?;
            Op::HighRes
        }
        "ALL" => {
            arity(&name, args, 2)?;
            Op::All {
                search: args[0].to_uppercase(),
                mode: SearchMode::from_arg(&name, &args[1])?,
            }
        }
        "SIMTPTV" => {
            arity(&name, args, 0)?;
            Op::SimtPtv
        }
        "LIST" => {
            arity(&name, args, 2)?;
            Op::List {
                search: args[0].to_uppercase(),
                mode: SearchMode::from_arg(&name, &args[1])?,
            }
        }
        _ => {
            return Err(ScriptError::UnknownOperator {
                name: token.name.clone(),
            });
        }
    };
    Ok(op)
}

fn arity(op: &str, args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(ScriptError::argument(
            op,
            format!("expected {expected} argument(s), got {}", args.len()),
        ));
    }
    Ok(())
}

fn arity_range(op: &str, args: &[String], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(ScriptError::argument(
            op,
            format!("expected {min}..{max} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}

/// One or more structure id arguments, kept verbatim for lookup.
fn references(op: &str, args: &[String]) -> Result<Vec<String>> {
    if args.is_empty() {
        return Err(ScriptError::argument(op, "expected at least one structure id"));
    }
    Ok(args.to_vec())
}

fn number(op: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| ScriptError::argument(op, format!("'{raw}' is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(name: &str, args: &[&str]) -> OpToken {
        OpToken {
            name: name.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn operator_names_are_case_insensitive() {
        for name in ["ring", "Ring", "RING"] {
            assert_eq!(
                parse_op(&token(name, &["5", "20"])).unwrap(),
                Op::Ring {
                    start: 5.0,
                    end: 20.0,
                    high_res: false
                }
            );
        }
    }

    #[test]
    fn ring_third_argument_sets_high_res() {
        assert_eq!(
            parse_op(&token("Ring", &["5", "20", "1"])).unwrap(),
            Op::Ring {
                start: 5.0,
                end: 20.0,
                high_res: true
            }
        );
    }

    #[test]
    fn boolean_operators_need_at_least_one_id() {
        assert_eq!(
            parse_op(&token("OR", &["PTV2", "PTV3"])).unwrap(),
            Op::Or(vec!["PTV2".to_string(), "PTV3".to_string()])
        );
        assert!(parse_op(&token("AND", &[])).is_err());
    }

    #[test]
    fn crop_distance_must_be_a_positive_number() {
        assert!(parse_op(&token("CropOut", &["Body", "-3"])).is_err());
        assert!(parse_op(&token("CropIn", &["Body", "three"])).is_err());
        assert_eq!(
            parse_op(&token("CropOut", &["Body", "3"])).unwrap(),
            Op::CropOut {
                reference: "Body".to_string(),
                distance: 3.0
            }
        );
    }

    #[test]
    fn asym_margin_reorders_faces_into_canonical_layout() {
        // ant=1, post=2, left=3, right=4, sup=5, inf=6
        let op = parse_op(&token("AsymMargin", &["1", "2", "3", "4", "5", "6"])).unwrap();
        assert_eq!(
            op,
            Op::AsymMargin {
                faces: [4.0, 1.0, 6.0, 3.0, 2.0, 5.0],
                geometry: MarginGeometry::Outer
            }
        );
    }

    #[test]
    fn asym_margin_geometry_argument() {
        let op =
            parse_op(&token("AsymMargin", &["1", "2", "3", "4", "5", "6", "inner"])).unwrap();
        assert!(matches!(
            op,
            Op::AsymMargin {
                geometry: MarginGeometry::Inner,
                ..
            }
        ));
        // Unrecognized geometry falls back to outer rather than failing.
        let op = parse_op(&token("AsymMargin", &["1", "2", "3", "4", "5", "6", "huh"])).unwrap();
        assert!(matches!(
            op,
            Op::AsymMargin {
                geometry: MarginGeometry::Outer,
                ..
            }
        ));
    }

    #[test]
    fn zero_arg_operators_reject_arguments() {
        assert_eq!(parse_op(&token("PTVALL", &[])).unwrap(), Op::PtvAll);
        assert_eq!(parse_op(&token("HighRes", &[])).unwrap(), Op::HighRes);
        assert!(parse_op(&token("HighRes", &["5"])).is_err());
    }

    #[test]
    fn search_operators_uppercase_their_search_text() {
        assert_eq!(
            parse_op(&token("All", &["ptv", "starts"])).unwrap(),
            Op::All {
                search: "PTV".to_string(),
                mode: SearchMode::Starts
            }
        );
        assert!(matches!(
            parse_op(&token("All", &["ptv", "sideways"])),
            Err(ScriptError::Argument { .. })
        ));
    }

    #[test]
    fn unknown_operator_is_its_own_error() {
        assert!(matches!(
            parse_op(&token("Sprinkle", &["1"])),
            Err(ScriptError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn search_mode_matching() {
        assert!(SearchMode::Starts.matches("PTV_Boost", "PTV"));
        assert!(!SearchMode::Starts.matches("zPTV", "PTV"));
        assert!(SearchMode::In.matches("zPTVz", "PTV"));
        assert!(SearchMode::Ends.matches("Opti_PTV", "PTV"));
        assert!(SearchMode::Ends.matches("opti_ptv", "PTV"));
    }
}
