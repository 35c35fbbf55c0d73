//! The `clap`-derived command line surface: basename dispatch into
//! `gelcc`/`gelc++`/`geld`/direct-invocation modes, and the `link`,
//! `doctor`, `plan`, `init` subcommands of direct invocation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::discovery::Lang;
use crate::types::{Backend, FixMode};

/// How this process was invoked, determined by its argv[0] basename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `gelcc`/`gelc++`: forward verbatim to a real compiler.
    CcWrapper(Lang),
    /// `geld`: run the full pipeline on the raw argument list.
    LdReplacement,
    /// Any other basename: the `link`/`doctor`/`plan`/`init` subcommands.
    Direct,
}

/// Inspect `argv0`'s basename (after stripping any `.exe` suffix) and
/// return the invocation mode it selects.
pub fn bin_dispatch(argv0: &str) -> Mode {
    let basename = argv0.rsplit(['/', '\\']).next().unwrap_or(argv0);
    let basename = basename.strip_suffix(".exe").unwrap_or(basename);
    match basename {
        "gelcc" => Mode::CcWrapper(Lang::C),
        "gelc++" => Mode::CcWrapper(Lang::Cxx),
        "geld" => Mode::LdReplacement,
        _ => Mode::Direct,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FixModeArg {
    Auto,
    Suggest,
    Strict,
}

impl From<FixModeArg> for FixMode {
    fn from(value: FixModeArg) -> Self {
        match value {
            FixModeArg::Auto => FixMode::Auto,
            FixModeArg::Suggest => FixMode::Suggest,
            FixModeArg::Strict => FixMode::HardFail,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    Mold,
    Lld,
    Gold,
    Bfd,
    System,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Mold => Backend::Mold,
            BackendArg::Lld => Backend::Lld,
            BackendArg::Gold => Backend::Gold,
            BackendArg::Bfd => Backend::Bfd,
            BackendArg::System => Backend::System,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlanFormat {
    Json,
    Shell,
}

#[derive(Debug, Parser)]
#[command(name = "jello", version, about = "A deterministic linker driver")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full normalize/resolve/reorder/link pipeline.
    Link(LinkArgs),
    /// Print detected compilers, triple, backends and active configuration.
    Doctor,
    /// Run the pipeline in dry-run mode and print the serialized plan.
    Plan(PlanArgs),
    /// Write a default project configuration file.
    Init,
}

#[derive(Debug, clap::Args)]
pub struct LinkArgs {
    /// Print the command that would run, without executing it.
    #[clap(short = 'n', long)]
    pub dry_run: bool,

    /// Write a human-readable reasoning trace to stderr.
    #[clap(long)]
    pub explain: bool,

    /// Do not emit linkplan.json/linkplan.sh/diagnostics.json.
    #[clap(long)]
    pub no_plan: bool,

    /// Artifact directory (default `.jello`).
    #[clap(long, value_name = "DIR")]
    pub plan_dir: Option<PathBuf>,

    /// Fix-mode policy.
    #[clap(long, value_enum, value_name = "MODE")]
    pub mode: Option<FixModeArg>,

    /// Force a specific backend linker.
    #[clap(long, value_enum)]
    pub backend: Option<BackendArg>,

    /// The remaining linker-style arguments, forwarded verbatim into Parse.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Debug, clap::Args)]
pub struct PlanArgs {
    /// Serialization format for the printed plan.
    #[clap(short = 'f', long, value_enum, default_value = "json")]
    pub format: PlanFormat,

    /// The remaining linker-style arguments, forwarded verbatim into Parse.
    #[clap(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_cc_wrapper_basenames() {
        assert_eq!(bin_dispatch("gelcc"), Mode::CcWrapper(Lang::C));
        assert_eq!(bin_dispatch("gelc++"), Mode::CcWrapper(Lang::Cxx));
        assert_eq!(bin_dispatch("/usr/local/bin/gelcc"), Mode::CcWrapper(Lang::C));
    }

    #[test]
    fn dispatches_ld_replacement_basename() {
        assert_eq!(bin_dispatch("geld"), Mode::LdReplacement);
        assert_eq!(bin_dispatch("/usr/bin/geld"), Mode::LdReplacement);
    }

    #[test]
    fn strips_exe_suffix_on_windows_style_basenames() {
        assert_eq!(bin_dispatch("gelcc.exe"), Mode::CcWrapper(Lang::C));
    }

    #[test]
    fn any_other_basename_is_direct() {
        assert_eq!(bin_dispatch("jello"), Mode::Direct);
        assert_eq!(bin_dispatch("/usr/bin/jello"), Mode::Direct);
    }

    #[test]
    fn link_args_trailing_var_arg_does_not_swallow_flags_before_it() {
        let cli = Cli::parse_from([
            "jello", "link", "--dry-run", "--backend", "lld", "foo.o", "-lfoo", "-o", "out",
        ]);
        let Command::Link(args) = cli.command else { panic!("expected link subcommand") };
        assert!(args.dry_run);
        assert_eq!(args.backend, Some(BackendArg::Lld));
        assert_eq!(args.args, vec!["foo.o", "-lfoo", "-o", "out"]);
    }

    #[test]
    fn plan_args_parses_format_and_trailing_args() {
        let cli = Cli::parse_from(["jello", "plan", "-f", "shell", "foo.o"]);
        let Command::Plan(args) = cli.command else { panic!("expected plan subcommand") };
        assert_eq!(args.format, PlanFormat::Shell);
        assert_eq!(args.args, vec!["foo.o"]);
    }
}
