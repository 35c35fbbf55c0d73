//! Classify backend stderr output against a priority-ordered rule table
//! (E001–E018), producing deduplicated, fix-annotated [`Diagnostic`]s.
//!
//! Rules are compiled once into a process-wide [`OnceLock`] since
//! `regex::Regex` compilation is comparatively expensive and the table is
//! immutable for the life of the process.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Confidence, Diagnostic, ExecResult, Fix, FixAction, LibRef, Severity};

struct Rule {
    code: &'static str,
    pattern: &'static str,
    severity: Severity,
    builder: fn(&regex::Captures<'_>, &str) -> (Vec<String>, Vec<Fix>),
}

fn high(description: &str, action: FixAction) -> Fix {
    Fix { description: description.to_string(), confidence: Confidence::High, action }
}

fn medium(description: &str, action: FixAction) -> Fix {
    Fix { description: description.to_string(), confidence: Confidence::Medium, action }
}

fn low(description: &str, action: FixAction) -> Fix {
    Fix { description: description.to_string(), confidence: Confidence::Low, action }
}

fn add_lib(name: &str) -> FixAction {
    FixAction::AddFlag(crate::types::Flag::LinkLib(LibRef::Named(name.to_string())))
}

fn is_cxx_symbol(sym: &str) -> bool {
    sym.starts_with("std::")
        || sym.starts_with("__cxa_")
        || sym.starts_with("__gxx_")
        || sym.starts_with("operator ")
        || sym.starts_with("typeinfo ")
        || sym.starts_with("vtable ")
}

fn is_math_symbol(sym: &str) -> bool {
    matches!(
        sym,
        "sin" | "cos" | "tan" | "sqrt" | "pow" | "exp" | "log" | "floor" | "ceil" | "fabs" | "atan2"
    )
}

fn e001_undefined_reference(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let sym = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let mut fixes = Vec::new();
    if is_cxx_symbol(sym) {
        fixes.push(high("relink using the C++ driver", FixAction::UseCxxDriver));
        fixes.push(high("link the C++ standard library", add_lib("stdc++")));
    } else if is_math_symbol(sym) {
        fixes.push(high("link the math library", add_lib("m")));
    } else if sym.starts_with("pthread_") {
        fixes.push(high("add -pthread", FixAction::AddFlag(crate::types::Flag::Passthrough("-pthread".to_string()))));
    } else if sym.contains("stack_chk") || sym.contains("__stack_chk") {
        fixes.push(high("link the stack-protector support library", add_lib("ssp")));
    }
    (vec![sym.to_string()], fixes)
}

fn e002_library_not_found(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let lib = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let fixes = vec![
        medium(&format!("install a development package providing lib{lib}"), FixAction::SuggestPackage(format!("lib{lib}-dev"))),
        medium("add the directory containing this library to the search path", FixAction::AddSearchPath(String::new())),
    ];
    (vec![lib.to_string()], fixes)
}

fn e003_dso_missing(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let so_name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let lib_name = so_name
        .trim_start_matches("lib")
        .split('.')
        .next()
        .unwrap_or(so_name);
    let fixes = vec![high(
        &format!("add -l{lib_name} explicitly"),
        add_lib(lib_name),
    )];
    (vec![so_name.to_string()], fixes)
}

fn e004_needs_fpic(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let file = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
    let fixes = vec![high(
        "recompile the offending object with -fPIC",
        FixAction::SuggestRecompile { file: file.clone(), flags: vec!["-fPIC".to_string()] },
    )];
    (vec![file], fixes)
}

fn e005_incompatible(caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let evidence = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_else(|| line.to_string());
    let fixes = vec![medium(
        "rebuild this object for the target architecture",
        FixAction::SuggestRecompile { file: String::new(), flags: vec![] },
    )];
    (vec![evidence], fixes)
}

fn e006_multiple_definition(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let sym = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let fixes = vec![low(
        "remove the duplicate definition or mark one copy weak",
        FixAction::SuggestRecompile { file: String::new(), flags: vec![] },
    )];
    (vec![sym.to_string()], fixes)
}

fn e007_file_not_recognized(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![medium(
        "rebuild for the correct target architecture",
        FixAction::SuggestRecompile { file: String::new(), flags: vec![] },
    )];
    (vec![line.trim().to_string()], fixes)
}

fn e008_no_entry_symbol(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![medium(
        "define an entry symbol or pass -e <symbol>",
        FixAction::AddFlag(crate::types::Flag::Passthrough("-e _start".to_string())),
    )];
    (vec![line.trim().to_string()], fixes)
}

fn e009_version_not_found(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let sym = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let fixes = vec![medium(
        "rebuild against the library version this symbol expects",
        FixAction::SuggestRecompile { file: String::new(), flags: vec![] },
    )];
    (vec![sym.to_string()], fixes)
}

fn e010_hidden_symbol(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let sym = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let fixes = vec![high(
        "give this symbol default visibility",
        FixAction::SuggestRecompile { file: String::new(), flags: vec!["-fvisibility=default".to_string()] },
    )];
    (vec![sym.to_string()], fixes)
}

fn e011_discarded_section(caps: &regex::Captures<'_>, _line: &str) -> (Vec<String>, Vec<Fix>) {
    let sym = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let fixes = vec![low(
        "mark the symbol used or disable --gc-sections",
        FixAction::RemoveFlag(crate::types::Flag::GcSections),
    )];
    (vec![sym.to_string()], fixes)
}

fn e012_tls_mismatch(caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let evidence = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_else(|| line.to_string());
    let fixes = vec![high(
        "use consistent thread-local storage across all translation units",
        FixAction::SuggestRecompile { file: String::new(), flags: vec![] },
    )];
    (vec![evidence], fixes)
}

fn e013_textrel(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![high(
        "rebuild with -fPIC to avoid text relocations",
        FixAction::SuggestRecompile { file: String::new(), flags: vec!["-fPIC".to_string()] },
    )];
    (vec![line.trim().to_string()], fixes)
}

fn e014_lto_mismatch(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![
        high("use the same compiler/LTO plugin version throughout", FixAction::SuggestRecompile { file: String::new(), flags: vec![] }),
        medium("load the linker plugin explicitly", FixAction::AddFlag(crate::types::Flag::Passthrough("-fuse-linker-plugin".to_string()))),
    ];
    (vec![line.trim().to_string()], fixes)
}

fn e015_cannot_open_output(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    (vec![line.trim().to_string()], Vec::new())
}

fn e016_region_overflow(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![low(
        "shrink the binary (e.g. -Os) or enlarge the memory region",
        FixAction::SuggestRecompile { file: String::new(), flags: vec!["-Os".to_string()] },
    )];
    (vec![line.trim().to_string()], fixes)
}

fn e017_got_overflow(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    let fixes = vec![medium(
        "use a larger code model or hide symbol visibility",
        FixAction::SuggestRecompile { file: String::new(), flags: vec!["-mcmodel=medium".to_string(), "-fvisibility=hidden".to_string()] },
    )];
    (vec![line.trim().to_string()], fixes)
}

fn e018_linker_script_syntax(_caps: &regex::Captures<'_>, line: &str) -> (Vec<String>, Vec<Fix>) {
    (vec![line.trim().to_string()], Vec::new())
}

fn rule_table() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule { code: "E001", pattern: r"undefined reference to [`']([^'`]+)'", severity: Severity::Error, builder: e001_undefined_reference },
            Rule { code: "E002", pattern: r"cannot find -l(\S+)|library not found for -l(\S+)|unable to find library -l(\S+)", severity: Severity::Error, builder: e002_library_not_found },
            Rule { code: "E003", pattern: r"DSO missing from command line for (\S+\.so\S*)", severity: Severity::Error, builder: e003_dso_missing },
            Rule { code: "E004", pattern: r"relocation R_\S+ against|recompile with -fPIC.*?([^\s:]+\.o)?", severity: Severity::Error, builder: e004_needs_fpic },
            Rule { code: "E005", pattern: r"skipping incompatible|is incompatible with", severity: Severity::Error, builder: e005_incompatible },
            Rule { code: "E006", pattern: r"multiple definition of [`']([^'`]+)'", severity: Severity::Error, builder: e006_multiple_definition },
            Rule { code: "E007", pattern: r"file not recognized", severity: Severity::Error, builder: e007_file_not_recognized },
            Rule { code: "E008", pattern: r"cannot find entry symbol", severity: Severity::Warning, builder: e008_no_entry_symbol },
            Rule { code: "E009", pattern: r"version [`']?(\S+)[`']? not found for symbol", severity: Severity::Error, builder: e009_version_not_found },
            Rule { code: "E010", pattern: r"hidden symbol [`']([^'`]+)' .*referenced by DSO", severity: Severity::Error, builder: e010_hidden_symbol },
            Rule { code: "E011", pattern: r"[`']([^'`]+)'.*defined in discarded section", severity: Severity::Error, builder: e011_discarded_section },
            Rule { code: "E012", pattern: r"TLS .*non-TLS|non-TLS .*TLS", severity: Severity::Error, builder: e012_tls_mismatch },
            Rule { code: "E013", pattern: r"read-only segment has dynamic relocations|DT_TEXTREL", severity: Severity::Warning, builder: e013_textrel },
            Rule { code: "E014", pattern: r"LTO version mismatch|needs LTO plugin|requires.*LTO", severity: Severity::Error, builder: e014_lto_mismatch },
            Rule { code: "E015", pattern: r"cannot open output file", severity: Severity::Error, builder: e015_cannot_open_output },
            Rule { code: "E016", pattern: r"region .* overflowed|will not fit in region", severity: Severity::Error, builder: e016_region_overflow },
            Rule { code: "E017", pattern: r"GOT overflow", severity: Severity::Error, builder: e017_got_overflow },
            Rule { code: "E018", pattern: r"syntax error.*\.ld\b|\.ld:\d+: syntax error", severity: Severity::Error, builder: e018_linker_script_syntax },
        ]
    })
}

/// Compiled regexes for [`rule_table`], in the same order, built once and
/// reused across every call.
fn compiled_rules() -> &'static [(Rule, Regex)] {
    static COMPILED: OnceLock<Vec<(Rule, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        rule_table()
            .iter()
            .map(|r| {
                let regex = Regex::new(r.pattern).expect("diagnostic rule patterns are fixed at compile time");
                (
                    Rule { code: r.code, pattern: r.pattern, severity: r.severity, builder: r.builder },
                    regex,
                )
            })
            .collect()
    })
}

/// Match every stderr line against the rule table in priority order; the
/// first matching rule wins per line. Results are deduplicated by
/// `(code, evidence)` before being returned.
pub fn diagnose_stderr(stderr: &str) -> Vec<Diagnostic> {
    let compiled = compiled_rules();

    let mut diagnostics = Vec::new();
    for line in stderr.lines() {
        for (rule, regex) in compiled {
            if let Some(caps) = regex.captures(line) {
                let (evidence, fixes) = (rule.builder)(&caps, line);
                diagnostics.push(Diagnostic {
                    severity: rule.severity,
                    code: rule.code.to_string(),
                    message: line.trim().to_string(),
                    evidence,
                    fixes,
                });
                break;
            }
        }
    }
    Diagnostic::dedup(diagnostics)
}

/// Diagnose the stderr of a completed execution, replacing
/// `post_diagnostics` in the returned (re-wrapped) [`ExecResult`]. The
/// plan itself is shared, never mutated.
pub fn diagnose(result: ExecResult) -> ExecResult {
    let post_diagnostics = diagnose_stderr(&result.stderr);
    ExecResult { post_diagnostics, ..result }
}

/// Whether any diagnostic in `diagnostics` has a High-confidence fix.
pub fn auto_fixable(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::auto_fixable)
}
