//! Orchestrates the twelve-step pipeline: parse, normalize, discover,
//! resolve, reorder, plan, (explain), (emit), (dry-run), execute,
//! diagnose, print. This is the only module that sequences the other
//! components; each of them stays independently testable.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::types::{Backend, Confidence, Diagnostic, ExecResult, FixAction, FixMode, LinkPlan, Result, Severity};
use crate::{diagnose, discovery, emit, execute, normalize, parse, plan as plan_mod, reorder, resolve};
use crate::discovery::Lang;
use crate::triple::Triple;

/// What the pipeline produced, ready for the binary entry point to act
/// on (print, exit with a particular code).
pub struct Outcome {
    pub plan: Arc<LinkPlan>,
    pub exec_result: Option<ExecResult>,
    pub exit_code: i32,
}

/// The `-fuse-ld=`/`-use-linker` value named on the command line, if any,
/// used as Discovery's `preferred` hint.
fn preferred_backend_hint(inv: &crate::types::Invocation) -> Option<String> {
    inv.flags.iter().find_map(|f| match f {
        crate::types::Flag::UseLinker(name) => Some(name.clone()),
        _ => None,
    })
}

/// Run the full pipeline over a raw linker-style argument list (used by
/// both `geld` and the `link` subcommand).
pub fn run_pipeline(args: &[String], config: &Config) -> Result<Outcome> {
    // 1. Parse.
    let inv = parse::parse(args)?;

    // 2. Normalize.
    let mut inv = normalize::normalize(inv);

    // 3. Discovery: pick a compiler, detect the target triple.
    let compiler = discovery::compiler(Lang::C).ok();
    let triple = match Triple::detect(compiler.as_deref()) {
        Ok(triple) => triple,
        Err(_) => Triple::detect_host()?,
    };

    // 4. Discovery: select a backend.
    let preferred = preferred_backend_hint(&inv);
    let (backend, backend_path) = discovery::backend(
        config.backend,
        preferred.as_deref(),
        &config.backend_preference,
    )?;

    // 5. Resolve libraries, honoring config's extra search paths; a
    // resolution failure is downgraded to a warning, not fatal.
    let mut search_paths = config.search_paths.clone();
    search_paths.extend(inv.explicit_search_paths.iter().cloned());
    inv.explicit_search_paths = search_paths;

    let ld_path = Some(backend_path.as_path());
    let system_search_paths = discovery::search_paths(ld_path);
    let resolved_libs = match resolve::resolve(&inv, &system_search_paths) {
        Ok(libs) => libs,
        Err(e) => {
            tracing::warn!(error = %e, "library resolution failed; continuing with an empty resolved set");
            Vec::new()
        }
    };

    // 6. Reorder static archives, surfacing a cycle as an AddGroup fix.
    let static_archive_paths = inv.static_archive_paths(&resolved_libs);
    let nm_path = config
        .nm
        .clone()
        .or_else(|| discovery::nm(None).ok())
        .unwrap_or_else(|| PathBuf::from("nm"));
    let (_ordered_archives, fixes) = reorder::reorder(&static_archive_paths, &nm_path);

    // 7. Plan: construct the immutable LinkPlan. `fix_mode` travels with the
    // plan so that rendering can tell an `Auto`-applied `AddGroup` fix from
    // a merely-recorded one (see `plan::render_inputs`).
    let built = plan_mod::plan(
        inv,
        triple,
        backend,
        backend_path,
        resolved_libs,
        system_search_paths,
        fixes,
        config.fix_mode,
    );
    let mut built = Arc::new(built);

    // 8. Explain.
    if config.explain {
        write_explain_trace(&built);
    }

    // 9. Emit.
    if config.emit_plan {
        if let Err(e) = emit::write_artifacts(&config.plan_dir, &built, &built.diagnostics) {
            tracing::warn!(error = %e, "failed to write plan artifacts");
        }
    }

    // 10. Dry run. The command line itself is not printed here: callers
    // that want it (the `link` subcommand, `geld`) print
    // `execute::dry_run(&outcome.plan)` themselves; `plan` prints the
    // plan in its requested format instead, and printing it here too
    // would double the output.
    if config.dry_run {
        return Ok(Outcome { plan: built, exec_result: None, exit_code: 0 });
    }

    // 11. Execute.
    let mut exec_result = execute::run(Arc::clone(&built))?;

    // 12. Diagnose: always when the backend failed; also when Hard_fail
    // policy is active, since it must catch Sev_error diagnostics even
    // on a successful exit.
    if exec_result.exit_code != 0 || config.fix_mode == FixMode::HardFail {
        exec_result = diagnose::diagnose(exec_result);
    }

    // 12b. Auto-mode retry: a failed link whose diagnostics include a
    // High-confidence, flag-level fix gets that fix applied to a fresh
    // plan and the backend re-invoked once. Fixes that need an out-of-band
    // action this driver can't perform in-process (recompiling an object,
    // re-resolving a library, switching the compiler driver) aren't
    // retried; see DESIGN.md for the scoping rationale.
    if config.fix_mode == FixMode::Auto && exec_result.exit_code != 0 {
        if let Some(retried_plan) = apply_high_confidence_fixes(&built, &exec_result.post_diagnostics) {
            let retried_plan = Arc::new(retried_plan);
            tracing::info!("auto mode: retrying link with auto-applied high-confidence fixes");
            let mut retried_result = execute::run(Arc::clone(&retried_plan))?;
            retried_result = diagnose::diagnose(retried_result);
            if retried_result.exit_code == 0 {
                built = retried_plan;
            }
            exec_result = retried_result;
        }
    }

    let mut exit_code = exec_result.exit_code;
    if config.fix_mode == FixMode::HardFail
        && exec_result.post_diagnostics.iter().any(|d| d.severity == Severity::Error)
        && exit_code == 0
    {
        exit_code = 1;
    }

    // 13. Print diagnostics.
    if !config.silent {
        print_diagnostics(&exec_result);
    }

    Ok(Outcome { plan: built, exec_result: Some(exec_result), exit_code })
}

/// Build a retried plan by applying every High-confidence `AddFlag`/
/// `RemoveFlag` fix carried by `diagnostics`, or `None` if none applied (no
/// High-confidence fix, or only kinds this driver can't apply in-process).
fn apply_high_confidence_fixes(plan: &LinkPlan, diagnostics: &[Diagnostic]) -> Option<LinkPlan> {
    let mut flags = plan.flags.clone();
    let mut changed = false;
    for diag in diagnostics {
        for fix in &diag.fixes {
            if fix.confidence != Confidence::High {
                continue;
            }
            match &fix.action {
                FixAction::AddFlag(flag) => {
                    if !flags.contains(flag) {
                        flags.push(flag.clone());
                        changed = true;
                    }
                }
                FixAction::RemoveFlag(flag) => {
                    let before = flags.len();
                    flags.retain(|f| f != flag);
                    changed |= flags.len() != before;
                }
                _ => {}
            }
        }
    }
    if !changed {
        return None;
    }
    let mut retried = plan.clone();
    retried.flags = flags;
    retried.backend_args = plan_mod::render_backend_args(&retried);
    Some(retried)
}

fn write_explain_trace(plan: &LinkPlan) {
    eprintln!("jello: explain");
    eprintln!("  triple:        {}", plan.triple);
    eprintln!("  backend:       {} ({})", plan.backend, plan.backend_path.display());
    eprintln!("  link mode:     {:?}", plan.link_mode);
    eprintln!("  output:        {}", plan.output.display());
    eprintln!("  search paths:  {}", plan.search_paths.len());
    eprintln!("  resolved libs: {}", plan.resolved_libs.len());
    if !plan.fixes_applied.is_empty() {
        eprintln!("  fixes:");
        for fix in &plan.fixes_applied {
            eprintln!("    - {} ({:?})", fix.description, fix.confidence);
        }
    }
    eprintln!("  command:       {}", execute::dry_run(plan));
}

fn print_diagnostics(result: &ExecResult) {
    for diag in &result.post_diagnostics {
        eprintln!("[{}] {}: {}", diag.code, severity_label(diag.severity), diag.message);
        for fix in &diag.fixes {
            eprintln!("    fix: {} ({:?} confidence)", fix.description, fix.confidence);
        }
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Hint => "hint",
    }
}

/// Forward an invocation verbatim to a real compiler, used by the
/// `gelcc`/`gelc++` passthrough mode. Never enters the pipeline.
pub fn run_passthrough(lang: Lang, args: &[String]) -> Result<i32> {
    let compiler = discovery::real_compiler(lang)?;
    execute::run_cmd(&compiler, args)
}

/// Print the detected toolchain and configuration for the `doctor`
/// subcommand.
pub fn doctor_report(config: &Config) -> String {
    let mut lines = Vec::new();
    let compiler = discovery::compiler(Lang::C).ok();
    let triple = Triple::detect(compiler.as_deref()).ok();

    lines.push(format!(
        "compiler: {}",
        compiler.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "not found".to_string())
    ));
    lines.push(format!(
        "triple: {}",
        triple.as_ref().map(ToString::to_string).unwrap_or_else(|| "undetected".to_string())
    ));

    for candidate in Backend::default_preference() {
        match discovery::backend(Some(*candidate), None, &[*candidate]) {
            Ok((backend, path)) => {
                let version = discovery::linker_version(&path).unwrap_or_else(|| "unknown version".to_string());
                lines.push(format!("backend {backend}: {} ({version})", path.display()));
            }
            Err(_) => lines.push(format!("backend {candidate}: not found")),
        }
    }

    let nm_path = discovery::nm(config.nm.as_deref());
    lines.push(format!(
        "nm: {}",
        nm_path.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|_| "not found".to_string())
    ));

    lines.push(format!("plan dir: {}", config.plan_dir.display()));
    lines.push(format!("fix mode: {:?}", config.fix_mode));

    lines.join("\n")
}

/// Write a default project configuration file for `init`.
pub fn init_default_config(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join(".jello.json");
    let default = serde_json::json!({
        "backend": serde_json::Value::Null,
        "backend_preference": ["mold", "lld", "gold", "bfd", "system"],
        "fix_mode": "suggest",
        "emit_plan": true,
        "plan_dir": ".jello",
        "explain": false,
        "dry_run": false,
        "search_paths": [],
        "nm": serde_json::Value::Null,
        "log_level": "info",
        "silent": false,
    });
    std::fs::write(&path, serde_json::to_string_pretty(&default)?)?;
    Ok(path)
}
