//! Symbol extraction: shells out to `nm -P -g` per object/archive member,
//! classifies each line, and derives the provider/requirement views that
//! Resolve and Reorder build their dependency graph from.
//!
//! Extraction is parallelized across a bounded worker pool sized to
//! [`std::thread::available_parallelism`]; each worker drains a shared
//! work queue and returns its own `Vec<Symbol>`, which are concatenated
//! and re-sorted by object path before being handed back, so the result
//! is independent of whichever thread finished first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use crate::types::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Text,
    Data,
    Bss,
    Rodata,
    Undefined,
    Weak,
    Common,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolScope {
    Global,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub scope: SymbolScope,
    pub object: PathBuf,
}

/// Classify a single `nm -P` type letter: uppercase is global scope,
/// lowercase is local scope; the letter itself picks the kind.
fn classify_type_letter(letter: char) -> (SymbolKind, SymbolScope) {
    let scope = if letter.is_ascii_uppercase() {
        SymbolScope::Global
    } else {
        SymbolScope::Local
    };
    let kind = match letter.to_ascii_uppercase() {
        'T' => SymbolKind::Text,
        'D' => SymbolKind::Data,
        'B' => SymbolKind::Bss,
        'R' => SymbolKind::Rodata,
        'U' => SymbolKind::Undefined,
        'W' | 'V' => SymbolKind::Weak,
        'C' => SymbolKind::Common,
        _ => SymbolKind::Other,
    };
    (kind, scope)
}

/// Parse one object's `nm -P -g` output. POSIX portable format is
/// `name type [value size]`, one symbol per line.
fn parse_nm_output(object: &Path, output: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let Some(name) = fields.next() else { continue };
        let Some(type_field) = fields.next() else { continue };
        let Some(letter) = type_field.chars().next() else { continue };
        let (kind, scope) = classify_type_letter(letter);
        symbols.push(Symbol {
            name: name.to_string(),
            kind,
            scope,
            object: object.to_path_buf(),
        });
    }
    symbols
}

fn run_nm(nm_path: &Path, object: &Path) -> Result<Vec<Symbol>> {
    let output = Command::new(nm_path)
        .arg("-P")
        .arg("-g")
        .arg(object)
        .output()
        .map_err(|e| Error::Symbol(format!("failed to run `nm` on {}: {e}", object.display())))?;
    if !output.status.success() {
        return Err(Error::Symbol(format!(
            "`nm` failed on {}: {}",
            object.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(parse_nm_output(object, &String::from_utf8_lossy(&output.stdout)))
}

/// Extract symbols from every object in `objects`, using up to
/// `available_parallelism()` worker threads draining a shared queue.
/// Results are concatenated and sorted by object path so the output is
/// deterministic regardless of scheduling order.
pub fn extract_symbols(objects: &[PathBuf], nm_path: &Path) -> Result<Vec<Symbol>> {
    if objects.is_empty() {
        return Ok(Vec::new());
    }

    let worker_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(objects.len());

    let queue = Mutex::new(objects.iter().collect::<Vec<_>>());
    let results: Mutex<Vec<Result<Vec<Symbol>>>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| loop {
                let next = queue.lock().unwrap().pop();
                let Some(object) = next else { break };
                let outcome = run_nm(nm_path, object);
                results.lock().unwrap().push(outcome);
            });
        }
    });

    let mut symbols = Vec::new();
    for outcome in results.into_inner().unwrap() {
        symbols.extend(outcome?);
    }
    symbols.sort_by(|a, b| (&a.object, &a.name).cmp(&(&b.object, &b.name)));
    Ok(symbols)
}

/// Names defined by any object: global scope, and a kind that actually
/// denotes a definition (excludes `Undefined` and the catch-all `Other`).
pub fn providers(symbols: &[Symbol]) -> HashSet<&str> {
    symbols
        .iter()
        .filter(|s| {
            s.scope == SymbolScope::Global
                && !matches!(s.kind, SymbolKind::Undefined | SymbolKind::Other)
        })
        .map(|s| s.name.as_str())
        .collect()
}

/// Names some object requires but does not itself define.
pub fn requirements(symbols: &[Symbol]) -> HashSet<&str> {
    symbols
        .iter()
        .filter(|s| s.kind == SymbolKind::Undefined)
        .map(|s| s.name.as_str())
        .collect()
}

/// Requirements with no matching provider anywhere in `symbols` — the
/// basis for an `undefined reference` diagnostic.
pub fn unresolved<'a>(symbols: &'a [Symbol]) -> Vec<&'a str> {
    let provided = providers(symbols);
    let mut missing: Vec<&str> = requirements(symbols)
        .into_iter()
        .filter(|name| !provided.contains(name))
        .collect();
    missing.sort_unstable();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_defined_global_and_local() {
        assert_eq!(
            classify_type_letter('T'),
            (SymbolKind::Text, SymbolScope::Global)
        );
        assert_eq!(
            classify_type_letter('t'),
            (SymbolKind::Text, SymbolScope::Local)
        );
    }

    #[test]
    fn classifies_undefined_and_weak() {
        assert_eq!(
            classify_type_letter('U'),
            (SymbolKind::Undefined, SymbolScope::Global)
        );
        assert_eq!(
            classify_type_letter('W'),
            (SymbolKind::Weak, SymbolScope::Global)
        );
    }

    #[test]
    fn classifies_data_bss_rodata_and_an_unknown_letter_as_other() {
        assert_eq!(classify_type_letter('D').0, SymbolKind::Data);
        assert_eq!(classify_type_letter('B').0, SymbolKind::Bss);
        assert_eq!(classify_type_letter('R').0, SymbolKind::Rodata);
        assert_eq!(classify_type_letter('N').0, SymbolKind::Other);
        assert_eq!(classify_type_letter('a').0, SymbolKind::Other);
    }

    #[test]
    fn parses_portable_nm_lines() {
        let object = Path::new("a.o");
        let output = "main T 0000000000001149 000000000000001a\nputs U\nhelper t 0000000000001160 0000000000000010\n";
        let symbols = parse_nm_output(object, output);
        assert_eq!(symbols.len(), 3);
        assert_eq!(symbols[0].name, "main");
        assert_eq!(symbols[0].kind, SymbolKind::Text);
        assert_eq!(symbols[1].name, "puts");
        assert_eq!(symbols[1].kind, SymbolKind::Undefined);
        assert_eq!(symbols[2].scope, SymbolScope::Local);
    }

    #[test]
    fn providers_and_requirements_exclude_local_and_undefined_respectively() {
        let a = Path::new("a.o");
        let b = Path::new("b.o");
        let symbols = vec![
            Symbol { name: "main".into(), kind: SymbolKind::Text, scope: SymbolScope::Global, object: a.to_path_buf() },
            Symbol { name: "helper".into(), kind: SymbolKind::Text, scope: SymbolScope::Local, object: a.to_path_buf() },
            Symbol { name: "puts".into(), kind: SymbolKind::Undefined, scope: SymbolScope::Global, object: a.to_path_buf() },
            Symbol { name: "puts".into(), kind: SymbolKind::Text, scope: SymbolScope::Global, object: b.to_path_buf() },
        ];
        let provided = providers(&symbols);
        assert!(provided.contains("main"));
        assert!(provided.contains("puts"));
        assert!(!provided.contains("helper"));

        let required = requirements(&symbols);
        assert!(required.contains("puts"));
        assert!(!required.contains("main"));
    }

    #[test]
    fn providers_excludes_global_symbols_of_kind_other() {
        let a = Path::new("a.o");
        let symbols = vec![
            Symbol { name: "main".into(), kind: SymbolKind::Text, scope: SymbolScope::Global, object: a.to_path_buf() },
            Symbol { name: "a.c".into(), kind: SymbolKind::Other, scope: SymbolScope::Global, object: a.to_path_buf() },
        ];
        let provided = providers(&symbols);
        assert!(provided.contains("main"));
        assert!(!provided.contains("a.c"));
    }

    #[test]
    fn unresolved_reports_only_names_with_no_provider() {
        let a = Path::new("a.o");
        let symbols = vec![
            Symbol { name: "missing_fn".into(), kind: SymbolKind::Undefined, scope: SymbolScope::Global, object: a.to_path_buf() },
            Symbol { name: "main".into(), kind: SymbolKind::Text, scope: SymbolScope::Global, object: a.to_path_buf() },
        ];
        assert_eq!(unresolved(&symbols), vec!["missing_fn"]);
    }

    #[test]
    fn extract_symbols_on_empty_input_is_empty() {
        assert_eq!(extract_symbols(&[], Path::new("nm")).unwrap(), Vec::new());
    }
}
