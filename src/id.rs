//! Structure identity: DICOM id sanitization and collision-free ids.
//!
//! Structure ids are capped at 16 characters and restricted to
//! alphanumerics plus '^', '_' and '-'. Lookups treat ids as
//! case-insensitive, matching the store.

/// DICOM structure id length ceiling.
pub const MAX_ID_LEN: usize = 16;

/// Case-insensitive id comparison used everywhere ids are matched.
pub fn same_id(a: &str, b: &str) -> bool {
    a.to_uppercase() == b.to_uppercase()
}

/// Trim, cap at 16 characters, and replace every character that is not
/// alphanumeric, '^', '_' or '-' with '_'. Idempotent.
pub fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .take(MAX_ID_LEN)
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '^' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Append "_0", "_1", ... until the candidate no longer collides with an
/// existing id.
///
/// Gives up once the current attempt has reached the 16-character budget
/// and returns the last attempt as-is; the store rejects it downstream.
pub fn uniquify(candidate: &str, existing: &[String]) -> String {
    let taken = |id: &str| existing.iter().any(|e| same_id(e, id));

    if !taken(candidate) {
        return candidate.to_string();
    }

    let mut attempt = candidate.to_string();
    let mut n = 0u32;
    while taken(&attempt) && attempt.chars().count() < MAX_ID_LEN {
        attempt = format!("{candidate}_{n}");
        n += 1;
    }
    attempt
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sanitize_replaces_illegal_characters() {
        assert_eq!(sanitize("Opti (L+R)"), "Opti__L_R_");
        assert_eq!(sanitize("PTV^High_5-a"), "PTV^High_5-a");
    }

    #[test]
    fn sanitize_trims_and_truncates() {
        assert_eq!(sanitize("  Body  "), "Body");
        assert_eq!(sanitize("a_very_long_structure_name"), "a_very_long_stru");
        assert_eq!(sanitize("a_very_long_structure_name").chars().count(), 16);
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["Opti (L+R)", "  x  ", "PTV 70.2 Gy boost!", ""] {
            let once = sanitize(raw);
            assert_eq!(sanitize(&once), once);
        }
    }

    #[test]
    fn sanitize_never_exceeds_budget() {
        for raw in ["", "x", "abcdefghijklmnop", "abcdefghijklmnopqrstuvwx"] {
            assert!(sanitize(raw).chars().count() <= MAX_ID_LEN);
        }
    }

    #[test]
    fn uniquify_passes_through_free_ids() {
        let existing = vec!["Body".to_string(), "PTV1".to_string()];
        assert_eq!(uniquify("Opti", &existing), "Opti");
    }

    #[test]
    fn uniquify_appends_counter_suffixes() {
        let existing = vec!["Opti".to_string(), "Opti_0".to_string()];
        assert_eq!(uniquify("Opti", &existing), "Opti_1");
    }

    #[test]
    fn uniquify_is_case_insensitive() {
        let existing = vec!["OPTI".to_string()];
        assert_eq!(uniquify("Opti", &existing), "Opti_0");
    }

    #[test]
    fn uniquify_result_is_fresh_within_budget() {
        let existing: Vec<String> = (0..5).map(|n| format!("ring_{n}")).collect();
        let mut all = existing.clone();
        all.push("ring".to_string());
        let fresh = uniquify("ring", &all);
        assert!(!all.iter().any(|e| same_id(e, &fresh)));
    }

    #[test]
    fn uniquify_stops_at_the_length_ceiling() {
        // 15-char base: the first suffixed attempt is already 17 chars, so
        // the loop bails after one round and hands back the oversized id.
        let base = "abcdefghijklmno";
        let existing = vec![base.to_string()];
        let out = uniquify(base, &existing);
        assert_eq!(out, format!("{base}_0"));
        assert!(out.chars().count() > MAX_ID_LEN);
    }
}
