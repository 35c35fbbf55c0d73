//! Locate backends, `nm`, real compilers (avoiding self-reference), system
//! search paths, sysroot, and linker versions. Every function here is a
//! pure lookup over the environment and filesystem; none of them mutate
//! anything.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::{Backend, Error, Result};

/// Basenames this driver itself may be installed under. `real_compiler`
/// filters these out of `PATH` lookups so that installing `jello` as `CC`
/// doesn't recurse into itself.
const OWN_WRAPPER_NAMES: &[&str] = &["jello", "gelcc", "gelc++", "geld"];

fn candidate_names(backend: Backend) -> &'static [&'static str] {
    match backend {
        Backend::Mold => &["mold", "ld.mold"],
        Backend::Lld => &["ld.lld", "lld"],
        Backend::Gold => &["ld.gold"],
        Backend::Bfd => &["ld.bfd"],
        Backend::System => &["ld"],
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Select a backend linker and its path.
///
/// `override_backend` (e.g. `--backend`/`JELLO_BACKEND`) wins unconditionally.
/// Otherwise, if `preferred` (from `-fuse-ld=...`) names a known backend or
/// an absolute existing path, that is used. Otherwise the first backend in
/// `preference` whose executable is found on `PATH` wins.
pub fn backend(
    override_backend: Option<Backend>,
    preferred: Option<&str>,
    preference: &[Backend],
) -> Result<(Backend, PathBuf)> {
    if let Some(backend) = override_backend {
        return find_backend_by_name_list(backend)
            .ok_or_else(|| Error::Discovery(format!("no linker backend found for `{backend}`")));
    }

    if let Some(preferred) = preferred {
        if let Ok(known) = preferred.parse::<Backend>() {
            if let Some(found) = find_backend_by_name_list(known) {
                return Ok(found);
            }
        } else {
            let path = Path::new(preferred);
            if path.is_absolute() && path.exists() {
                return Ok((Backend::System, path.to_path_buf()));
            }
        }
    }

    for candidate in preference {
        if let Some(found) = find_backend_by_name_list(*candidate) {
            return Ok(found);
        }
    }

    Err(Error::Discovery("no linker backend found".to_string()))
}

fn find_backend_by_name_list(backend: Backend) -> Option<(Backend, PathBuf)> {
    candidate_names(backend)
        .iter()
        .find_map(|name| find_on_path(name))
        .map(|path| (backend, path))
}

/// Locate an `nm`-equivalent: an explicit override, else `llvm-nm`, else
/// `nm`.
pub fn nm(override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
    }
    find_on_path("llvm-nm")
        .or_else(|| find_on_path("nm"))
        .ok_or_else(|| Error::Discovery("no `nm`-equivalent found on PATH".to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lang {
    C,
    Cxx,
}

/// Locate a compiler, honoring `CC`/`CXX` first.
pub fn compiler(lang: Lang) -> Result<PathBuf> {
    let env_var = match lang {
        Lang::C => "CC",
        Lang::Cxx => "CXX",
    };
    if let Ok(value) = std::env::var(env_var) {
        if let Some(path) = find_on_path(&value) {
            return Ok(path);
        }
    }
    fallback_compiler(lang)
}

/// Like [`compiler`] but skips `CC`/`CXX` and filters out any resolved
/// path whose basename is one of this driver's own wrapper names. Used by
/// the `gelcc`/`gelc++` passthrough mode to avoid recursing into itself
/// when it is installed as `CC`.
pub fn real_compiler(lang: Lang) -> Result<PathBuf> {
    let path = fallback_compiler(lang)?;
    let basename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if OWN_WRAPPER_NAMES.contains(&basename) {
        return Err(Error::Discovery(format!(
            "refusing to forward to `{}`: it resolves back to this driver",
            path.display()
        )));
    }
    Ok(path)
}

fn fallback_compiler(lang: Lang) -> Result<PathBuf> {
    let names: &[&str] = match lang {
        Lang::C => &["cc", "gcc", "clang"],
        Lang::Cxx => &["c++", "g++", "clang++"],
    };
    names
        .iter()
        .find_map(|name| find_on_path(name))
        .ok_or_else(|| Error::Discovery("no compiler found on PATH".to_string()))
}

/// Parse `ld --verbose` for `SEARCH_DIR("...")` directives, falling back
/// to a platform-sensible default list.
pub fn search_paths(ld_path: Option<&Path>) -> Vec<PathBuf> {
    if let Some(ld_path) = ld_path {
        if let Ok(output) = Command::new(ld_path).arg("--verbose").output() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let parsed = parse_search_dir_directives(&stdout);
            if !parsed.is_empty() {
                return parsed;
            }
        }
    }
    default_search_paths()
}

fn parse_search_dir_directives(verbose_output: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for line in verbose_output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("SEARCH_DIR(\"") {
            if let Some(end) = rest.find('"') {
                let raw = &rest[..end];
                let raw = raw.strip_prefix('=').unwrap_or(raw);
                paths.push(PathBuf::from(raw));
            }
        }
    }
    paths
}

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/usr/lib"),
        PathBuf::from("/usr/local/lib"),
        PathBuf::from("/lib"),
    ];
    if cfg!(target_os = "macos") {
        paths.push(PathBuf::from(
            "/Library/Developer/CommandLineTools/SDKs/MacOSX.sdk/usr/lib",
        ));
    }
    paths
}

/// Run `<compiler> --print-sysroot`; a non-empty stdout is accepted.
pub fn sysroot(compiler_path: &Path) -> Option<PathBuf> {
    let output = Command::new(compiler_path)
        .arg("--print-sysroot")
        .output()
        .ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(trimmed))
    }
}

/// The first line of `<path> --version`.
pub fn linker_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}
