//! Map [`LibRef`]s to concrete files on disk, honoring the static/dynamic
//! preference derived from `-Bstatic`/`-Bdynamic`/`-static`, and attach an
//! advisory detected architecture via the platform `file` tool.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::{Error, Flag, Invocation, LibKind, LibRef, Result, ResolvedLib};

/// Walk `flags` in order, tracking the last of `-Bstatic`/`-static` (true)
/// vs `-Bdynamic` (false). Defaults to dynamic preference.
fn static_preference(flags: &[Flag]) -> bool {
    let mut prefer_static = false;
    for flag in flags {
        match flag {
            Flag::BStatic | Flag::SetStatic => prefer_static = true,
            Flag::BDynamic => prefer_static = false,
            _ => {}
        }
    }
    prefer_static
}

/// All lib references named on the command line, in source order: flags
/// (`-l`, `-framework`) first, then `Lib` inputs, per §4.6.
fn collect_lib_refs(inv: &Invocation) -> Vec<&LibRef> {
    let from_flags = inv.flags.iter().filter_map(Flag::as_link_lib);
    let from_inputs = inv.inputs.iter().filter_map(crate::types::Input::as_lib);
    from_flags.chain(from_inputs).collect()
}

fn detect_arch(path: &Path) -> Option<String> {
    let output = Command::new("file").arg(path).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).to_lowercase();
    for keyword in ["x86-64", "aarch64", "arm64", "80386", "arm"] {
        if text.contains(keyword) {
            return Some(keyword.to_string());
        }
    }
    None
}

fn kind_from_extension(path: &Path) -> LibKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("a") => LibKind::Static,
        _ => LibKind::Shared,
    }
}

fn resolve_one(lib_ref: &LibRef, search_paths: &[PathBuf], prefer_static: bool) -> Option<ResolvedLib> {
    match lib_ref {
        LibRef::Path(p) => {
            if p.exists() {
                let kind = kind_from_extension(p);
                Some(ResolvedLib {
                    lib_ref: lib_ref.clone(),
                    path: p.clone(),
                    kind,
                    detected_arch: detect_arch(p),
                })
            } else {
                None
            }
        }
        LibRef::Named(name) => {
            for dir in search_paths {
                let static_candidate = dir.join(format!("lib{name}.a"));
                let shared_candidate = shared_candidate_in(dir, name);
                let ordered = if prefer_static {
                    [Some((static_candidate.clone(), LibKind::Static)), shared_candidate.clone().map(|p| (p, LibKind::Shared))]
                } else {
                    [shared_candidate.clone().map(|p| (p, LibKind::Shared)), Some((static_candidate.clone(), LibKind::Static))]
                };
                for candidate in ordered.into_iter().flatten() {
                    let (path, kind) = candidate;
                    if path.exists() {
                        return Some(ResolvedLib {
                            lib_ref: lib_ref.clone(),
                            path: path.clone(),
                            kind,
                            detected_arch: detect_arch(&path),
                        });
                    }
                }
            }
            None
        }
        LibRef::Framework(name) => {
            for root in ["/System/Library/Frameworks", "/Library/Frameworks"] {
                let path = PathBuf::from(root)
                    .join(format!("{name}.framework"))
                    .join(name);
                if path.exists() {
                    return Some(ResolvedLib {
                        lib_ref: lib_ref.clone(),
                        path: path.clone(),
                        kind: LibKind::Shared,
                        detected_arch: detect_arch(&path),
                    });
                }
            }
            None
        }
    }
}

fn shared_candidate_in(dir: &Path, name: &str) -> Option<PathBuf> {
    for ext in ["so", "dylib"] {
        let candidate = dir.join(format!("lib{name}.{ext}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    // Return a non-existent canonical form too, so the static/dynamic
    // ordering loop still has something to test with `.exists()` when
    // nothing is actually present.
    Some(dir.join(format!("lib{name}.so")))
}

/// Resolve every lib reference in `inv` against `explicit ++ system` search
/// paths. A single missing `Named` reference yields [`Error::Resolve`];
/// multiple failures compose into [`Error::Multiple`].
pub fn resolve(inv: &Invocation, system_search_paths: &[PathBuf]) -> Result<Vec<ResolvedLib>> {
    let search_paths: Vec<PathBuf> = inv
        .explicit_search_paths
        .iter()
        .cloned()
        .chain(system_search_paths.iter().cloned())
        .collect();
    let prefer_static = static_preference(&inv.flags);

    let mut resolved = Vec::new();
    let mut errors = Vec::new();

    for lib_ref in collect_lib_refs(inv) {
        match resolve_one(lib_ref, &search_paths, prefer_static) {
            Some(lib) => resolved.push(lib),
            None => {
                if let LibRef::Named(name) = lib_ref {
                    errors.push(Error::Resolve {
                        lib: name.clone(),
                        searched: search_paths.clone(),
                    });
                }
            }
        }
    }

    match errors.len() {
        0 => Ok(resolved),
        1 => Err(errors.into_iter().next().unwrap()),
        _ => Err(Error::Multiple(errors)),
    }
}
