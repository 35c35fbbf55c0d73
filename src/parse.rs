//! Raw argument list → structured [`Invocation`].
//!
//! Drives a left-to-right sweep over the token stream. Macro forms
//! (`@file`, `-Wl,...`, `-Xlinker`) expand into fresh tokens that are
//! re-fed through the same sweep rather than handled as a separate pass.

use std::fs;
use std::path::PathBuf;

use crate::types::{Error, Flag, Input, Invocation, LibRef, LinkMode, Result};

/// Cheap first pass: true if the invocation is compile-only and should
/// never enter the link pipeline (`-c`, `-S`, `-E`).
pub fn is_compile_only(args: &[String]) -> bool {
    args.iter().any(|a| a == "-c" || a == "-S" || a == "-E")
}

/// Frontend compiler-only flags that can never affect linking and are
/// dropped outright rather than preserved as `Passthrough`.
fn is_dropped_frontend_flag(arg: &str) -> bool {
    if arg == "-c" || arg == "-pipe" {
        return true;
    }
    if arg.starts_with("-O") {
        return true;
    }
    if arg.starts_with("-W") && !arg.starts_with("-Wl,") {
        return true;
    }
    if arg.starts_with("-f") && !arg.starts_with("-flto") && arg != "-fuse-ld" && !arg.starts_with("-fuse-ld=") {
        return true;
    }
    if arg.starts_with("-D") || arg.starts_with("-I") || arg.starts_with("-std=") {
        return true;
    }
    false
}

struct Tokens {
    queue: std::collections::VecDeque<String>,
}

impl Tokens {
    fn new(args: Vec<String>) -> Tokens {
        Tokens { queue: args.into() }
    }

    fn next(&mut self) -> Option<String> {
        self.queue.pop_front()
    }

    fn prepend(&mut self, tokens: Vec<String>) {
        for tok in tokens.into_iter().rev() {
            self.queue.push_front(tok);
        }
    }
}

/// Parse a raw argument list (not including argv[0]) into an [`Invocation`].
pub fn parse(args: &[String]) -> Result<Invocation> {
    let raw_args = args.to_vec();
    let mut flags = Vec::new();
    let mut inputs = Vec::new();
    let mut explicit_search_paths = Vec::new();
    let mut output = None;

    let mut tokens = Tokens::new(args.to_vec());

    while let Some(arg) = tokens.next() {
        // --- macro expansion forms ---
        if let Some(rest) = arg.strip_prefix('@') {
            let contents = fs::read_to_string(rest)
                .map_err(|e| Error::Parse(format!("cannot read response file `{rest}`: {e}")))?;
            let expanded: Vec<String> = contents
                .split(|c: char| c == '\n' || c == ' ')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            tokens.prepend(expanded);
            inputs.push(Input::ResponseFile(PathBuf::from(rest)));
            continue;
        }
        if let Some(rest) = arg.strip_prefix("-Wl,") {
            let expanded: Vec<String> = rest
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            tokens.prepend(expanded);
            continue;
        }
        if arg == "-Xlinker" {
            let value = tokens
                .next()
                .ok_or_else(|| Error::Parse("-Xlinker requires a value".to_string()))?;
            tokens.prepend(vec![value]);
            continue;
        }

        // --- frontend-only flags, dropped ---
        if is_dropped_frontend_flag(&arg) {
            continue;
        }

        // --- flags with values, glued or spaced ---
        if let Some(value) = glued_or_spaced(&arg, "-l", &mut tokens)? {
            flags.push(Flag::LinkLib(LibRef::Named(value)));
            continue;
        }
        if let Some(value) = glued_or_spaced(&arg, "-L", &mut tokens)? {
            let path = PathBuf::from(value);
            explicit_search_paths.push(path.clone());
            flags.push(Flag::SearchPath(path));
            continue;
        }
        if arg == "-o" {
            let value = require_value(&arg, &mut tokens)?;
            let path = PathBuf::from(value);
            output = Some(path.clone());
            flags.push(Flag::Output(path));
            continue;
        }
        if arg == "--sysroot" || arg.starts_with("--sysroot=") {
            let value = equals_or_spaced("--sysroot", &arg, &mut tokens)?;
            flags.push(Flag::Sysroot(PathBuf::from(value)));
            continue;
        }
        if arg == "--rpath" || arg == "-rpath" || arg.starts_with("--rpath=") {
            let value = equals_or_spaced_alias(&["--rpath", "-rpath"], &arg, &mut tokens)?;
            flags.push(Flag::Rpath(value));
            continue;
        }
        if arg == "-rpath-link" || arg.starts_with("-rpath-link=") {
            let value = equals_or_spaced("-rpath-link", &arg, &mut tokens)?;
            flags.push(Flag::RpathLink(value));
            continue;
        }
        if arg == "--dynamic-linker" || arg == "-dynamic-linker" || arg.starts_with("--dynamic-linker=") {
            let value = equals_or_spaced_alias(
                &["--dynamic-linker", "-dynamic-linker"],
                &arg,
                &mut tokens,
            )?;
            flags.push(Flag::DynamicLinker(PathBuf::from(value)));
            continue;
        }
        if arg == "-Map" || arg.starts_with("-Map=") {
            let value = equals_or_spaced("-Map", &arg, &mut tokens)?;
            flags.push(Flag::MapFile(PathBuf::from(value)));
            continue;
        }
        if arg == "-T" || arg.starts_with("-T=") {
            let value = equals_or_spaced("-T", &arg, &mut tokens)?;
            flags.push(Flag::LinkerScript(PathBuf::from(value)));
            continue;
        }
        if arg == "--target" || arg.starts_with("--target=") {
            let value = equals_or_spaced("--target", &arg, &mut tokens)?;
            flags.push(Flag::Target(value));
            continue;
        }
        if arg.starts_with("-march=") {
            flags.push(Flag::Arch(arg["-march=".len()..].to_string()));
            continue;
        }
        if arg == "-arch" {
            let value = require_value(&arg, &mut tokens)?;
            flags.push(Flag::Arch(value));
            continue;
        }
        if arg == "--version-script" || arg.starts_with("--version-script=") {
            let value = equals_or_spaced("--version-script", &arg, &mut tokens)?;
            flags.push(Flag::VersionScript(PathBuf::from(value)));
            continue;
        }
        if arg == "-soname" || arg == "-h" || arg.starts_with("-soname=") {
            let value = equals_or_spaced_alias(&["-soname", "-h"], &arg, &mut tokens)?;
            flags.push(Flag::Soname(value));
            continue;
        }
        if arg == "-z" {
            let value = require_value(&arg, &mut tokens)?;
            flags.push(Flag::ZDirective(value));
            continue;
        }
        if let Some(level) = arg.strip_prefix("--icf=") {
            flags.push(Flag::Icf(level.to_string()));
            continue;
        }
        if arg == "-stdlib" || arg.starts_with("-stdlib=") {
            let value = equals_or_spaced("-stdlib", &arg, &mut tokens)?;
            flags.push(Flag::Stdlib(value));
            continue;
        }
        if let Some(value) = arg.strip_prefix("-fuse-ld=") {
            flags.push(Flag::UseLinker(value.to_string()));
            continue;
        }
        if let Some(value) = arg.strip_prefix("-flto") {
            let value = value.strip_prefix('=').map(str::to_string);
            flags.push(Flag::Lto(value));
            continue;
        }
        if arg == "-framework" {
            let value = require_value(&arg, &mut tokens)?;
            flags.push(Flag::LinkLib(LibRef::Framework(value)));
            continue;
        }

        // --- aliases and bare boolean flags ---
        if let Some(flag) = canonicalize_alias(&arg) {
            flags.push(flag);
            continue;
        }

        if arg.starts_with('-') {
            flags.push(Flag::Passthrough(arg.clone()));
            continue;
        }

        inputs.push(Input::classify(PathBuf::from(arg)));
    }

    let link_mode = derive_link_mode(&flags);

    Ok(Invocation {
        raw_args,
        flags,
        inputs,
        output,
        link_mode,
        explicit_search_paths,
    })
}

/// Match glued (`-lfoo`) or spaced (`-l foo`) forms of a short flag.
fn glued_or_spaced(arg: &str, prefix: &str, tokens: &mut Tokens) -> Result<Option<String>> {
    if arg == prefix {
        let value = require_value(prefix, tokens)?;
        return Ok(Some(value));
    }
    if let Some(rest) = arg.strip_prefix(prefix) {
        if !rest.is_empty() {
            return Ok(Some(rest.to_string()));
        }
    }
    Ok(None)
}

fn require_value(flag: &str, tokens: &mut Tokens) -> Result<String> {
    tokens
        .next()
        .ok_or_else(|| Error::Parse(format!("{flag} requires a value")))
}

/// Match `--flag=value` or spaced `--flag value` for a single canonical
/// flag spelling.
fn equals_or_spaced(flag: &str, arg: &str, tokens: &mut Tokens) -> Result<String> {
    equals_or_spaced_alias(&[flag], arg, tokens)
}

/// Like [`equals_or_spaced`] but accepts any of several equivalent
/// spellings of the flag (e.g. `--dynamic-linker` / `-dynamic-linker`).
fn equals_or_spaced_alias(aliases: &[&str], arg: &str, tokens: &mut Tokens) -> Result<String> {
    for alias in aliases {
        if let Some(rest) = arg.strip_prefix(&format!("{alias}=")) {
            return Ok(rest.to_string());
        }
    }
    require_value(aliases[0], tokens)
}

fn canonicalize_alias(arg: &str) -> Option<Flag> {
    Some(match arg {
        "-(" | "--start-group" => Flag::StartGroup,
        "-)" | "--end-group" => Flag::EndGroup,
        "--whole-archive" => Flag::WholeArchive,
        "--no-whole-archive" => Flag::NoWholeArchive,
        "--as-needed" => Flag::AsNeeded,
        "--no-as-needed" => Flag::NoAsNeeded,
        "-static" => Flag::SetStatic,
        "-Bstatic" | "--Bstatic" => Flag::BStatic,
        "-Bdynamic" | "--Bdynamic" => Flag::BDynamic,
        "--push-state" => Flag::PushState,
        "--pop-state" => Flag::PopState,
        "--gc-sections" => Flag::GcSections,
        "--no-gc-sections" => Flag::NoGcSections,
        "-E" | "--export-dynamic" => Flag::ExportDynamic,
        "-pie" => Flag::SetPie,
        "-no-pie" | "--no-pie" => Flag::NoPie,
        "-shared" | "-Bshareable" => Flag::SetShared,
        "-r" | "--relocatable" => Flag::Relocatable,
        "-nostdlib" => Flag::NoStdlib,
        "-nostartfiles" => Flag::NoStartFiles,
        "-nodefaultlibs" => Flag::NoDefaultLibs,
        "-m32" => Flag::M32,
        "-m64" => Flag::M64,
        "-v" | "--verbose" => Flag::Verbose,
        "-t" | "--trace" => Flag::Trace,
        "-M" | "--print-map" => Flag::PrintMap,
        "--debug" => Flag::Debug,
        "-s" | "--strip-all" => Flag::StripAll,
        "-S" | "--strip-debug" => Flag::StripDebug,
        _ => return None,
    })
}

/// Link mode wins in the order Shared > Pie > Static, else Executable.
fn derive_link_mode(flags: &[Flag]) -> LinkMode {
    if flags.iter().any(|f| matches!(f, Flag::Relocatable)) {
        return LinkMode::Relocatable;
    }
    if flags.iter().any(|f| matches!(f, Flag::SetShared)) {
        return LinkMode::Shared;
    }
    if flags.iter().any(|f| matches!(f, Flag::SetPie)) {
        return LinkMode::Pie;
    }
    if flags.iter().any(|f| matches!(f, Flag::SetStatic)) {
        return LinkMode::Static;
    }
    LinkMode::Executable
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn basic_parse() {
        let inv = parse(&args(&["foo.o", "-o", "out", "-lfoo", "-L/usr/lib"])).unwrap();
        assert_eq!(inv.inputs, vec![Input::Object(PathBuf::from("foo.o"))]);
        assert_eq!(inv.output, Some(PathBuf::from("out")));
        assert_eq!(inv.explicit_search_paths, vec![PathBuf::from("/usr/lib")]);
        assert!(inv
            .flags
            .iter()
            .any(|f| *f == Flag::LinkLib(LibRef::Named("foo".to_string()))));
    }

    #[test]
    fn wl_comma_forwarding() {
        let inv = parse(&args(&["foo.o", "-Wl,--as-needed,-rpath,/opt/lib"])).unwrap();
        assert!(inv.flags.contains(&Flag::AsNeeded));
        assert!(inv.flags.contains(&Flag::Rpath("/opt/lib".to_string())));
    }

    #[test]
    fn link_mode_shared_and_static() {
        let inv = parse(&args(&["-shared", "foo.o"])).unwrap();
        assert_eq!(inv.link_mode, LinkMode::Shared);

        let inv = parse(&args(&["-static", "foo.o", "-lfoo"])).unwrap();
        assert_eq!(inv.link_mode, LinkMode::Static);
    }

    #[test]
    fn output_missing_value_is_parse_error() {
        let result = parse(&args(&["foo.o", "-o"]));
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn wl_empty_commas_produce_no_tokens() {
        let inv = parse(&args(&["foo.o", "-Wl,,,"])).unwrap();
        assert_eq!(inv.inputs, vec![Input::Object(PathBuf::from("foo.o"))]);
    }

    #[test]
    fn response_file_read_failure_names_the_path() {
        let result = parse(&args(&["@/nonexistent/path/to/args"]));
        match result {
            Err(Error::Parse(msg)) => assert!(msg.contains("/nonexistent/path/to/args")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn empty_argv_yields_empty_invocation() {
        let inv = parse(&args(&[])).unwrap();
        assert!(inv.inputs.is_empty());
        assert!(inv.flags.is_empty());
        assert_eq!(inv.output, None);
        assert_eq!(inv.link_mode, LinkMode::Executable);
    }

    #[test]
    fn frontend_only_flags_are_dropped() {
        let inv = parse(&args(&["-O2", "-Wall", "-DFOO=1", "-Ipath", "-std=c11", "foo.o"])).unwrap();
        assert_eq!(inv.flags, vec![]);
        assert_eq!(inv.inputs, vec![Input::Object(PathBuf::from("foo.o"))]);
    }

    #[test]
    fn unknown_flags_preserved_as_passthrough() {
        let inv = parse(&args(&["--some-weird-flag", "foo.o"])).unwrap();
        assert!(inv
            .flags
            .contains(&Flag::Passthrough("--some-weird-flag".to_string())));
    }

    #[test]
    fn xlinker_prepends_its_value() {
        let inv = parse(&args(&["-Xlinker", "--as-needed", "foo.o"])).unwrap();
        assert!(inv.flags.contains(&Flag::AsNeeded));
    }

    #[test]
    fn compile_only_prescan() {
        assert!(is_compile_only(&args(&["-c", "foo.c"])));
        assert!(is_compile_only(&args(&["-S", "foo.c"])));
        assert!(is_compile_only(&args(&["-E", "foo.c"])));
        assert!(!is_compile_only(&args(&["foo.o", "-o", "out"])));
    }
}
