//! Spawn the backend linker (or any passthrough command), classify its
//! termination, and render a shell-quoted replay command for `dry_run`.

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};
use std::sync::Arc;

use crate::types::{Error, ExecResult, LinkPlan, Result};

fn shell_quote(arg: &str) -> String {
    if !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | '+' | ','))
    {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// The exact shell command that `run` would spawn, without spawning it.
pub fn dry_run(plan: &LinkPlan) -> String {
    std::iter::once(plan.backend_path.display().to_string())
        .chain(plan.backend_args.iter().cloned())
        .map(|arg| shell_quote(&arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn classify_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        1
    }
}

/// Spawn `plan.backend_path` with `plan.backend_args`, capturing stdout and
/// stderr separately. A spawn failure is a fatal [`Error::Exec`]; a
/// nonzero or signal-terminated exit is reported in `ExecResult`, not as
/// an `Err`.
pub fn run(plan: Arc<LinkPlan>) -> Result<ExecResult> {
    let output = Command::new(&plan.backend_path)
        .args(&plan.backend_args)
        .output()
        .map_err(|e| Error::Exec {
            exit_code: 1,
            stderr: format!("failed to spawn {}: {e}", plan.backend_path.display()),
        })?;

    Ok(ExecResult {
        plan,
        exit_code: classify_status(output.status),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        post_diagnostics: Vec::new(),
    })
}

/// Run an arbitrary command line (used by the `gelcc`/`gelc++` passthrough
/// path in §6), returning its classified exit code.
pub fn run_cmd(program: &std::path::Path, args: &[String]) -> Result<i32> {
    let status = Command::new(program).args(args).status().map_err(|e| Error::Exec {
        exit_code: 1,
        stderr: format!("failed to spawn {}: {e}", program.display()),
    })?;
    Ok(classify_status(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triple::{Arch, Env, Os, Triple};
    use crate::types::{Backend, LinkMode, LINK_PLAN_SCHEMA_VERSION};
    use std::path::PathBuf;

    fn plan(backend_path: PathBuf, backend_args: Vec<String>) -> Arc<LinkPlan> {
        Arc::new(LinkPlan {
            schema_version: LINK_PLAN_SCHEMA_VERSION,
            backend: Backend::System,
            backend_path,
            triple: Triple { arch: Arch::X86_64, vendor: None, os: Os::Linux, env: Some(Env::Gnu) },
            link_mode: LinkMode::Executable,
            output: PathBuf::from("a.out"),
            inputs: vec![],
            flags: vec![],
            search_paths: vec![],
            resolved_libs: vec![],
            sysroot: None,
            dynamic_linker: None,
            fixes_applied: vec![],
            diagnostics: vec![],
            raw_args: vec![],
            backend_args,
            fix_mode: crate::types::FixMode::Suggest,
        })
    }

    #[test]
    fn dry_run_quotes_arguments_needing_it() {
        let p = plan(PathBuf::from("/usr/bin/ld"), vec!["-o".to_string(), "my out".to_string()]);
        assert_eq!(dry_run(&p), "/usr/bin/ld -o 'my out'");
    }

    #[test]
    fn dry_run_leaves_simple_arguments_unquoted() {
        let p = plan(PathBuf::from("ld"), vec!["-shared".to_string(), "foo.o".to_string()]);
        assert_eq!(dry_run(&p), "ld -shared foo.o");
    }

    #[test]
    fn run_reports_nonzero_exit_without_erroring() {
        let p = plan(PathBuf::from("/bin/sh"), vec!["-c".to_string(), "exit 7".to_string()]);
        let result = run(p).unwrap();
        assert_eq!(result.exit_code, 7);
        assert!(!result.success());
    }

    #[test]
    fn run_captures_stdout_and_stderr_separately() {
        let p = plan(
            PathBuf::from("/bin/sh"),
            vec!["-c".to_string(), "echo out; echo err 1>&2".to_string()],
        );
        let result = run(p).unwrap();
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[test]
    fn spawn_failure_is_a_fatal_exec_error() {
        let p = plan(PathBuf::from("/nonexistent/binary/path"), vec![]);
        assert!(run(p).is_err());
    }
}
