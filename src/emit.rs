//! Serialize a [`LinkPlan`] and its diagnostics to `plan_dir`, writing each
//! file atomically (write-to-temp, then rename) so a reader never observes
//! a partially written artifact.

use std::io::Write;
use std::path::Path;

use crate::execute::dry_run;
use crate::types::{Diagnostic, Error, LinkPlan, Result};

fn write_atomically(dir: &Path, filename: &str, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(dir.join(filename)).map_err(|e| e.error)?;
    Ok(())
}

fn render_replay_script(plan: &LinkPlan) -> String {
    format!(
        "#!/bin/sh\n# replay: {} link via {}\nexec {}\n",
        plan.triple,
        plan.backend,
        dry_run(plan),
    )
}

/// Write `linkplan.json`, `linkplan.sh` and `diagnostics.json` into
/// `plan_dir`, creating it if missing. Per §7, emit failures are logged
/// and never propagate as a fatal error to the driver; this function
/// still returns a `Result` so callers can choose to log it.
pub fn write_artifacts(plan_dir: &Path, plan: &LinkPlan, diagnostics: &[Diagnostic]) -> Result<()> {
    std::fs::create_dir_all(plan_dir)
        .map_err(|e| Error::Plan(format!("cannot create plan directory {}: {e}", plan_dir.display())))?;

    let plan_json = serde_json::to_vec_pretty(plan)
        .map_err(|e| Error::Plan(format!("cannot serialize linkplan.json: {e}")))?;
    write_atomically(plan_dir, "linkplan.json", &plan_json)
        .map_err(|e| Error::Plan(format!("cannot write linkplan.json: {e}")))?;

    let replay = render_replay_script(plan);
    write_atomically(plan_dir, "linkplan.sh", replay.as_bytes())
        .map_err(|e| Error::Plan(format!("cannot write linkplan.sh: {e}")))?;

    let diagnostics_json = serde_json::to_vec_pretty(diagnostics)
        .map_err(|e| Error::Plan(format!("cannot serialize diagnostics.json: {e}")))?;
    write_atomically(plan_dir, "diagnostics.json", &diagnostics_json)
        .map_err(|e| Error::Plan(format!("cannot write diagnostics.json: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triple::{Arch, Env, Os, Triple};
    use crate::types::{Backend, LinkMode, LINK_PLAN_SCHEMA_VERSION};
    use std::path::PathBuf;

    fn sample_plan() -> LinkPlan {
        LinkPlan {
            schema_version: LINK_PLAN_SCHEMA_VERSION,
            backend: Backend::Lld,
            backend_path: PathBuf::from("/usr/bin/ld.lld"),
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
            backend_args: vec!["-o".to_string(), "a.out".to_string()],
            fix_mode: crate::types::FixMode::Suggest,
        }
    }

    #[test]
    fn writes_all_three_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan();
        write_artifacts(dir.path(), &plan, &[]).unwrap();

        assert!(dir.path().join("linkplan.json").exists());
        assert!(dir.path().join("linkplan.sh").exists());
        assert!(dir.path().join("diagnostics.json").exists());
    }

    #[test]
    fn linkplan_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan();
        write_artifacts(dir.path(), &plan, &[]).unwrap();

        let contents = std::fs::read_to_string(dir.path().join("linkplan.json")).unwrap();
        let reparsed: LinkPlan = serde_json::from_str(&contents).unwrap();
        assert_eq!(reparsed, plan);
    }

    #[test]
    fn replay_script_has_shebang_and_backend_name() {
        let dir = tempfile::tempdir().unwrap();
        let plan = sample_plan();
        write_artifacts(dir.path(), &plan, &[]).unwrap();

        let script = std::fs::read_to_string(dir.path().join("linkplan.sh")).unwrap();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("lld"));
    }

    #[test]
    fn creates_missing_plan_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("plan");
        write_artifacts(&nested, &sample_plan(), &[]).unwrap();
        assert!(nested.join("linkplan.json").exists());
    }
}
