//! Conflict resolution, deduplication and defaulting over a freshly parsed
//! [`Invocation`]. Idempotent: normalizing an already-normalized invocation
//! is a no-op (§8 property 4).

use std::path::PathBuf;

use crate::types::{Flag, Invocation};

const DEFAULT_OUTPUT: &str = "a.out";

/// Normalize an invocation in place: dedup explicit search paths, resolve
/// `-pie`/`-no-pie` last-wins, drop duplicate non-positional-sensitive
/// flags, and default the output to `a.out`.
pub fn normalize(mut inv: Invocation) -> Invocation {
    dedup_search_paths(&mut inv);
    resolve_pie_conflict(&mut inv);
    dedup_flags(&mut inv);
    default_output(&mut inv);
    inv
}

fn dedup_search_paths(inv: &mut Invocation) {
    let mut seen = std::collections::HashSet::new();
    inv.explicit_search_paths.retain(|p| seen.insert(p.clone()));
}

/// Drop any earlier `-pie`/`-no-pie` occurrence whose opposite appears
/// later: last-wins.
fn resolve_pie_conflict(inv: &mut Invocation) {
    let last_pie_index = inv.flags.iter().rposition(|f| matches!(f, Flag::SetPie));
    let last_no_pie_index = inv.flags.iter().rposition(|f| matches!(f, Flag::NoPie));

    match (last_pie_index, last_no_pie_index) {
        (Some(pie_idx), Some(no_pie_idx)) if pie_idx > no_pie_idx => {
            inv.flags.retain(|f| !matches!(f, Flag::NoPie));
        }
        (Some(pie_idx), Some(no_pie_idx)) if no_pie_idx > pie_idx => {
            inv.flags.retain(|f| !matches!(f, Flag::SetPie));
        }
        _ => {}
    }
}

/// Drop duplicate (structurally equal) flags on their second occurrence,
/// except positional-sensitive ones (§4.2).
fn dedup_flags(inv: &mut Invocation) {
    let mut seen: Vec<Flag> = Vec::with_capacity(inv.flags.len());
    inv.flags.retain(|flag| {
        if flag.is_positional_sensitive() {
            return true;
        }
        if seen.contains(flag) {
            false
        } else {
            seen.push(flag.clone());
            true
        }
    });
}

fn default_output(inv: &mut Invocation) {
    if inv.output.is_none() {
        inv.output = Some(PathBuf::from(DEFAULT_OUTPUT));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LinkMode;

    fn base_invocation() -> Invocation {
        Invocation {
            raw_args: vec![],
            flags: vec![],
            inputs: vec![],
            output: None,
            link_mode: LinkMode::Executable,
            explicit_search_paths: vec![],
        }
    }

    #[test]
    fn dedups_search_paths_preserving_first_occurrence() {
        let mut inv = base_invocation();
        inv.explicit_search_paths = vec![
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            PathBuf::from("/a"),
        ];
        let normalized = normalize(inv);
        assert_eq!(
            normalized.explicit_search_paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn no_pie_after_pie_wins() {
        let mut inv = base_invocation();
        inv.flags = vec![Flag::SetPie, Flag::NoPie];
        let normalized = normalize(inv);
        assert_eq!(normalized.flags, vec![Flag::NoPie]);
    }

    #[test]
    fn pie_after_no_pie_wins() {
        let mut inv = base_invocation();
        inv.flags = vec![Flag::NoPie, Flag::SetPie];
        let normalized = normalize(inv);
        assert_eq!(normalized.flags, vec![Flag::SetPie]);
    }

    #[test]
    fn dedups_flags_except_positional_sensitive_ones() {
        let mut inv = base_invocation();
        inv.flags = vec![
            Flag::AsNeeded,
            Flag::AsNeeded,
            Flag::StartGroup,
            Flag::StartGroup,
        ];
        let normalized = normalize(inv);
        assert_eq!(
            normalized.flags,
            vec![Flag::AsNeeded, Flag::StartGroup, Flag::StartGroup]
        );
    }

    #[test]
    fn defaults_output_when_unset() {
        let inv = base_invocation();
        let normalized = normalize(inv);
        assert_eq!(normalized.output, Some(PathBuf::from("a.out")));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut inv = base_invocation();
        inv.flags = vec![Flag::SetPie, Flag::NoPie, Flag::AsNeeded, Flag::AsNeeded];
        inv.explicit_search_paths = vec![PathBuf::from("/a"), PathBuf::from("/a")];
        let once = normalize(inv);
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
