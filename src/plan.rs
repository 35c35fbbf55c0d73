//! Construct the immutable [`LinkPlan`] and render its canonical
//! `backend_args`. Rendering is a pure function of the plan's fields, so
//! the same plan always produces the same argument vector (§4.8 invariant).

use std::path::PathBuf;

use crate::types::{
    Backend, Fix, FixAction, FixMode, Flag, Input, Invocation, LibRef, LinkMode, LinkPlan,
    ResolvedLib, LINK_PLAN_SCHEMA_VERSION,
};
use crate::triple::Triple;

/// Renders a single flag's canonical textual form for step 6, or `None`
/// if it's already emitted by steps 1, 2 or 5, or consumed elsewhere
/// (target selection, stdlib linkage, debug info) rather than rendered.
fn render_flag(flag: &Flag) -> Option<String> {
    Some(match flag {
        Flag::LinkLib(lib_ref) => render_lib_ref(lib_ref),
        Flag::Rpath(v) => format!("-rpath {v}"),
        Flag::RpathLink(v) => format!("-rpath-link {v}"),
        Flag::WholeArchive => "--whole-archive".to_string(),
        Flag::NoWholeArchive => "--no-whole-archive".to_string(),
        Flag::StartGroup => "--start-group".to_string(),
        Flag::EndGroup => "--end-group".to_string(),
        Flag::AsNeeded => "--as-needed".to_string(),
        Flag::NoAsNeeded => "--no-as-needed".to_string(),
        Flag::BStatic => "-Bstatic".to_string(),
        Flag::BDynamic => "-Bdynamic".to_string(),
        Flag::PushState => "--push-state".to_string(),
        Flag::PopState => "--pop-state".to_string(),
        Flag::GcSections => "--gc-sections".to_string(),
        Flag::NoGcSections => "--no-gc-sections".to_string(),
        Flag::Icf(v) => format!("--icf={v}"),
        Flag::ExportDynamic => "--export-dynamic".to_string(),
        Flag::ZDirective(v) => format!("-z {v}"),
        Flag::Soname(v) => format!("-soname {v}"),
        Flag::VersionScript(p) => format!("--version-script {}", p.display()),
        Flag::LinkerScript(p) => format!("-T {}", p.display()),
        Flag::MapFile(p) => format!("-Map={}", p.display()),
        Flag::Verbose => "--verbose".to_string(),
        Flag::Trace => "--trace".to_string(),
        Flag::PrintMap => "-M".to_string(),
        Flag::StripAll => "-s".to_string(),
        Flag::StripDebug => "-S".to_string(),
        Flag::Passthrough(s) => s.clone(),
        _ => return None,
    })
}

fn render_lib_ref(lib_ref: &LibRef) -> String {
    match lib_ref {
        LibRef::Named(n) => format!("-l{n}"),
        LibRef::Path(p) => p.display().to_string(),
        LibRef::Framework(n) => format!("-framework {n}"),
    }
}

fn render_input(input: &Input) -> String {
    match input {
        Input::Object(p)
        | Input::Archive(p)
        | Input::SharedObject(p)
        | Input::LinkerScript(p)
        | Input::RawInput(p) => p.display().to_string(),
        Input::ResponseFile(p) => format!("@{}", p.display()),
        Input::Lib(lib_ref) => render_lib_ref(lib_ref),
    }
}

/// Render the canonical `backend_args` for a constructed plan, per the
/// seven-step order: output, link mode, search paths, sysroot, dynamic
/// linker, remaining flags, inputs.
pub fn render_backend_args(plan: &LinkPlan) -> Vec<String> {
    let mut args = Vec::new();

    args.push("-o".to_string());
    args.push(plan.output.display().to_string());

    match plan.link_mode {
        LinkMode::Shared => args.push("-shared".to_string()),
        LinkMode::Pie => args.push("-pie".to_string()),
        LinkMode::Static => args.push("-static".to_string()),
        LinkMode::Relocatable => args.push("-r".to_string()),
        LinkMode::Executable => {}
    }

    for path in &plan.search_paths {
        args.push("-L".to_string());
        args.push(path.display().to_string());
    }

    if let Some(sysroot) = &plan.sysroot {
        args.push(format!("--sysroot={}", sysroot.display()));
    }

    if let Some(dynamic_linker) = &plan.dynamic_linker {
        args.push("--dynamic-linker".to_string());
        args.push(dynamic_linker.display().to_string());
    }

    for flag in &plan.flags {
        if let Some(rendered) = render_flag(flag) {
            args.push(rendered);
        }
    }

    args.extend(render_inputs(plan));

    args
}

/// Render step 7 (inputs), wrapping any static archives named by an
/// `Auto`-mode `AddGroup` fix in `--start-group`/`--end-group`. Outside
/// `Auto` mode the fix is still recorded in `fixes_applied` (so `explain`
/// and `doctor` can surface it) but never alters the rendered command.
fn render_inputs(plan: &LinkPlan) -> Vec<String> {
    let group_paths = if plan.fix_mode == FixMode::Auto {
        plan.fixes_applied.iter().find_map(|fix| match &fix.action {
            FixAction::AddGroup(paths) => Some(paths),
            _ => None,
        })
    } else {
        None
    };

    let mut args = Vec::new();
    let mut in_group = false;
    for input in &plan.inputs {
        let belongs_to_group = group_paths
            .map(|paths| matches!(input, Input::Archive(p) if paths.contains(p)))
            .unwrap_or(false);
        if belongs_to_group && !in_group {
            args.push("--start-group".to_string());
            in_group = true;
        } else if !belongs_to_group && in_group {
            args.push("--end-group".to_string());
            in_group = false;
        }
        args.push(render_input(input));
    }
    if in_group {
        args.push("--end-group".to_string());
    }
    args
}

/// Build the immutable [`LinkPlan`] from the pipeline's intermediate
/// results. `sysroot` and `dynamic_linker` are extracted from the first
/// matching flag in `inv.flags`; `output` defaults to `a.out`.
pub fn plan(
    inv: Invocation,
    triple: Triple,
    backend: Backend,
    backend_path: PathBuf,
    resolved_libs: Vec<ResolvedLib>,
    search_paths: Vec<PathBuf>,
    fixes: Vec<Fix>,
    fix_mode: FixMode,
) -> LinkPlan {
    let sysroot = inv.flags.iter().find_map(|f| match f {
        Flag::Sysroot(p) => Some(p.clone()),
        _ => None,
    });
    let dynamic_linker = inv.flags.iter().find_map(|f| match f {
        Flag::DynamicLinker(p) => Some(p.clone()),
        _ => None,
    });
    let output = inv.output.clone().unwrap_or_else(|| PathBuf::from("a.out"));

    let mut plan = LinkPlan {
        schema_version: LINK_PLAN_SCHEMA_VERSION,
        backend,
        backend_path,
        triple,
        link_mode: inv.link_mode,
        output,
        inputs: inv.inputs,
        flags: inv.flags,
        search_paths,
        resolved_libs,
        sysroot,
        dynamic_linker,
        fixes_applied: fixes,
        diagnostics: Vec::new(),
        raw_args: inv.raw_args,
        backend_args: Vec::new(),
        fix_mode,
    };
    plan.backend_args = render_backend_args(&plan);
    plan
}
