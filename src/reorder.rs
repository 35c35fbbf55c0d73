//! Topologically order static archives by their symbol dependencies so
//! that a library appears after anything that depends on it, and detect
//! cyclic dependencies that instead require a `--start-group`/`--end-group`
//! wrapper.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::symbols::{self, Symbol};
use crate::types::{Confidence, Fix, FixAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Gray,
    Black,
}

struct Graph {
    /// Edge `a -> b` means `a` requires a symbol `b` defines.
    edges: HashMap<usize, Vec<usize>>,
    paths: Vec<PathBuf>,
}

fn build_graph(paths: &[PathBuf], per_lib_symbols: &[Vec<Symbol>]) -> Graph {
    let providers: Vec<_> = per_lib_symbols.iter().map(|s| symbols::providers(s)).collect();
    let requirements: Vec<_> = per_lib_symbols.iter().map(|s| symbols::requirements(s)).collect();

    let mut edges: HashMap<usize, Vec<usize>> = HashMap::new();
    for a in 0..paths.len() {
        let mut targets = Vec::new();
        for b in 0..paths.len() {
            if a == b {
                continue;
            }
            if requirements[a].iter().any(|req| providers[b].contains(req)) {
                targets.push(b);
            }
        }
        edges.insert(a, targets);
    }
    Graph { edges, paths: paths.to_vec() }
}

/// Depth-first topological sort with gray/black marking. Returns `Ok(order)`
/// (dependents before dependencies) or `Err(cycle_node_indices)` on the
/// first back edge found, where the cycle is every node on the current DFS
/// stack.
fn topo_sort(graph: &Graph) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let n = graph.paths.len();
    let mut marks: HashMap<usize, Mark> = HashMap::new();
    let mut order = Vec::with_capacity(n);
    let mut stack: Vec<usize> = Vec::new();

    fn visit(
        node: usize,
        graph: &Graph,
        marks: &mut HashMap<usize, Mark>,
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> std::result::Result<(), Vec<usize>> {
        match marks.get(&node) {
            Some(Mark::Black) => return Ok(()),
            Some(Mark::Gray) => {
                let cycle_start = stack.iter().position(|&n| n == node).unwrap_or(0);
                return Err(stack[cycle_start..].to_vec());
            }
            None => {}
        }
        marks.insert(node, Mark::Gray);
        stack.push(node);
        for &next in graph.edges.get(&node).into_iter().flatten() {
            visit(next, graph, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(node, Mark::Black);
        order.push(node);
        Ok(())
    }

    for node in 0..n {
        if !marks.contains_key(&node) {
            visit(node, graph, &mut marks, &mut stack, &mut order)?;
        }
    }
    // `order` is built post-order (a provider is appended only after every
    // node that requires it has finished visiting), so a dependency ends up
    // before its dependents. Reverse to get dependents-before-dependencies,
    // per §4.7: "a library depended upon comes after its dependents".
    order.reverse();
    Ok(order)
}

/// Member object names inside a static archive, read via its `ar` header.
/// Returns an empty vec if the file can't be opened or isn't a valid
/// archive; this is purely cosmetic enrichment of a fix description.
fn archive_member_names(path: &Path) -> Vec<String> {
    let Ok(file) = std::fs::File::open(path) else { return Vec::new() };
    let Ok(mut archive) = ar::Archive::new(file) else { return Vec::new() };
    let mut names = Vec::new();
    while let Some(entry) = archive.next_entry() {
        if let Ok(entry) = entry {
            names.push(String::from_utf8_lossy(entry.header().identifier()).into_owned());
        }
    }
    names
}

/// A description of the cycle naming each library's basename and, where
/// readable, the archive members it contributes.
fn describe_cycle(paths: &[PathBuf], indices: &[usize]) -> String {
    indices
        .iter()
        .map(|&i| {
            let basename = paths[i]
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| paths[i].display().to_string());
            let members = archive_member_names(&paths[i]);
            if members.is_empty() {
                basename
            } else {
                format!("{basename} [{}]", members.join(", "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Order `static_lib_paths` so each library comes after its dependents,
/// per §4.7. `nm_path` is used to extract symbols from each archive; if
/// extraction fails for every library, the input order is returned
/// unchanged with no fixes.
pub fn reorder(static_lib_paths: &[PathBuf], nm_path: &Path) -> (Vec<PathBuf>, Vec<Fix>) {
    if static_lib_paths.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let per_lib_symbols: Vec<Vec<Symbol>> = static_lib_paths
        .iter()
        .map(|path| symbols::extract_symbols(std::slice::from_ref(path), nm_path).unwrap_or_default())
        .collect();

    if per_lib_symbols.iter().all(Vec::is_empty) {
        return (static_lib_paths.to_vec(), Vec::new());
    }

    let graph = build_graph(static_lib_paths, &per_lib_symbols);

    match topo_sort(&graph) {
        Ok(order) => {
            let sorted = order.into_iter().map(|i| static_lib_paths[i].clone()).collect();
            (sorted, Vec::new())
        }
        Err(cycle) => {
            let description = describe_cycle(static_lib_paths, &cycle);
            let cycle_paths: Vec<PathBuf> = cycle.iter().map(|&i| static_lib_paths[i].clone()).collect();
            let fix = Fix {
                description: format!(
                    "wrap cyclic static libraries in a --start-group/--end-group block: {description}"
                ),
                confidence: Confidence::High,
                action: FixAction::AddGroup(cycle_paths),
            };
            (static_lib_paths.to_vec(), vec![fix])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{SymbolKind, SymbolScope};

    fn symbol(name: &str, kind: SymbolKind, object: &Path) -> Symbol {
        Symbol {
            name: name.to_string(),
            kind,
            scope: SymbolScope::Global,
            object: object.to_path_buf(),
        }
    }

    #[test]
    fn acyclic_graph_orders_dependents_before_dependencies() {
        let a = PathBuf::from("liba.a");
        let b = PathBuf::from("libb.a");
        let paths = vec![a.clone(), b.clone()];
        // a requires `helper`, which b defines. So a depends on b.
        let per_lib = vec![
            vec![symbol("helper", SymbolKind::Undefined, &a)],
            vec![symbol("helper", SymbolKind::Text, &b)],
        ];
        let graph = build_graph(&paths, &per_lib);
        let order = topo_sort(&graph).unwrap();
        // dependents (a, index 0) come before dependencies (b, index 1).
        let pos_a = order.iter().position(|&i| i == 0).unwrap();
        let pos_b = order.iter().position(|&i| i == 1).unwrap();
        assert!(pos_a < pos_b);
    }

    #[test]
    fn mutual_dependency_is_detected_as_a_cycle() {
        let a = PathBuf::from("liba.a");
        let b = PathBuf::from("libb.a");
        let paths = vec![a.clone(), b.clone()];
        // a needs what b defines, and b needs what a defines.
        let per_lib = vec![
            vec![
                symbol("has_b", SymbolKind::Undefined, &a),
                symbol("has_a", SymbolKind::Text, &a),
            ],
            vec![
                symbol("has_a", SymbolKind::Undefined, &b),
                symbol("has_b", SymbolKind::Text, &b),
            ],
        ];
        let graph = build_graph(&paths, &per_lib);
        assert!(topo_sort(&graph).is_err());
    }

    #[test]
    fn reorder_with_no_symbols_anywhere_keeps_input_order() {
        let paths = vec![PathBuf::from("liba.a"), PathBuf::from("libb.a")];
        let (order, fixes) = reorder(&paths, Path::new("/nonexistent/nm"));
        assert_eq!(order, paths);
        assert!(fixes.is_empty());
    }

    #[test]
    fn reorder_on_empty_input_is_empty() {
        let (order, fixes) = reorder(&[], Path::new("nm"));
        assert!(order.is_empty());
        assert!(fixes.is_empty());
    }
}
