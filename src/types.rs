//! The closed algebra the rest of the crate is built on: library references,
//! inputs, flags, the invocation model, the link plan, diagnostics and the
//! error taxonomy. Every enumerated concept here is a closed sum type so
//! that a missing match arm is a compile error, not a runtime surprise.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::triple::Triple;

/// The current `linkplan.json` schema version. Bump when the serialized
/// shape of [`LinkPlan`] changes incompatibly.
pub const LINK_PLAN_SCHEMA_VERSION: u32 = 1;

/// How a library was referenced on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum LibRef {
    /// `-lfoo`.
    Named(String),
    /// An explicit file path.
    Path(PathBuf),
    /// `-framework Foo` (Darwin only).
    Framework(String),
}

impl LibRef {
    /// A human-readable name suitable for diagnostics and fix descriptions.
    pub fn display_name(&self) -> String {
        match self {
            LibRef::Named(name) => format!("-l{name}"),
            LibRef::Path(path) => path.display().to_string(),
            LibRef::Framework(name) => format!("-framework {name}"),
        }
    }
}

/// Static or shared archive classification of a resolved library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LibKind {
    Static,
    Shared,
}

/// A library reference resolved to a concrete file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLib {
    pub lib_ref: LibRef,
    pub path: PathBuf,
    pub kind: LibKind,
    /// Advisory arch string from the platform `file` tool (`None` if the
    /// tool isn't available or detection was inconclusive).
    pub detected_arch: Option<String>,
}

/// A positional argument, classified by extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Input {
    Object(PathBuf),
    Archive(PathBuf),
    SharedObject(PathBuf),
    LinkerScript(PathBuf),
    ResponseFile(PathBuf),
    Lib(LibRef),
    RawInput(PathBuf),
}

impl Input {
    /// Classify a positional argument by its extension, per §3 of the design:
    /// `.o`/`.obj` → Object, `.a` → Archive, `.so`/`.dylib`/`.dll` → SharedObject,
    /// `.ld`/`.lds` → LinkerScript, anything else → RawInput.
    pub fn classify(path: PathBuf) -> Input {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("o") | Some("obj") => Input::Object(path),
            Some("a") => Input::Archive(path),
            Some("so") | Some("dylib") | Some("dll") => Input::SharedObject(path),
            Some("ld") | Some("lds") => Input::LinkerScript(path),
            _ => Input::RawInput(path),
        }
    }

    pub fn as_lib(&self) -> Option<&LibRef> {
        match self {
            Input::Lib(lib_ref) => Some(lib_ref),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Input::Object(p)
            | Input::Archive(p)
            | Input::SharedObject(p)
            | Input::LinkerScript(p)
            | Input::ResponseFile(p)
            | Input::RawInput(p) => Some(p),
            Input::Lib(_) => None,
        }
    }
}

/// The overall kind of link being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    Executable,
    Shared,
    Static,
    Pie,
    Relocatable,
}

/// Every linker flag semantics this driver understands. Anything outside
/// this set is preserved verbatim as [`Flag::Passthrough`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Flag {
    Output(PathBuf),
    SearchPath(PathBuf),
    LinkLib(LibRef),
    Sysroot(PathBuf),
    DynamicLinker(PathBuf),
    Rpath(String),
    RpathLink(String),
    WholeArchive,
    NoWholeArchive,
    StartGroup,
    EndGroup,
    AsNeeded,
    NoAsNeeded,
    BStatic,
    BDynamic,
    PushState,
    PopState,
    GcSections,
    NoGcSections,
    Icf(String),
    ExportDynamic,
    SetPie,
    NoPie,
    SetShared,
    SetStatic,
    Relocatable,
    NoStdlib,
    NoStartFiles,
    NoDefaultLibs,
    Stdlib(String),
    Target(String),
    Arch(String),
    M32,
    M64,
    Lto(Option<String>),
    UseLinker(String),
    ZDirective(String),
    Soname(String),
    VersionScript(PathBuf),
    LinkerScript(PathBuf),
    MapFile(PathBuf),
    Verbose,
    Trace,
    PrintMap,
    Debug,
    StripAll,
    StripDebug,
    Passthrough(String),
}

impl Flag {
    /// Flags whose relative position in the link line is significant and
    /// which Normalize must therefore never deduplicate, per §4.2.
    pub fn is_positional_sensitive(&self) -> bool {
        matches!(
            self,
            Flag::BStatic
                | Flag::BDynamic
                | Flag::WholeArchive
                | Flag::NoWholeArchive
                | Flag::PushState
                | Flag::PopState
                | Flag::StartGroup
                | Flag::EndGroup
        )
    }

    pub fn as_link_lib(&self) -> Option<&LibRef> {
        match self {
            Flag::LinkLib(lib_ref) => Some(lib_ref),
            _ => None,
        }
    }
}

/// The command after parsing and normalization: flags, inputs, derived link
/// mode and output, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub raw_args: Vec<String>,
    pub flags: Vec<Flag>,
    pub inputs: Vec<Input>,
    pub output: Option<PathBuf>,
    pub link_mode: LinkMode,
    pub explicit_search_paths: Vec<PathBuf>,
}

impl Invocation {
    /// Every static-archive path referenced either as an `Archive` input or
    /// as a resolved static library, used by Reorder.
    pub fn static_archive_paths(&self, resolved: &[ResolvedLib]) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .inputs
            .iter()
            .filter_map(|input| match input {
                Input::Archive(path) => Some(path.clone()),
                _ => None,
            })
            .collect();
        for lib in resolved {
            if lib.kind == LibKind::Static && !paths.contains(&lib.path) {
                paths.push(lib.path.clone());
            }
        }
        paths
    }
}

/// Confidence that an automatic fix is correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A concrete corrective action a [`Fix`] can propose or (in `auto` mode)
/// apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FixAction {
    AddFlag(Flag),
    RemoveFlag(Flag),
    ReorderLibs(Vec<PathBuf>),
    AddGroup(Vec<PathBuf>),
    SuggestPackage(String),
    SuggestRecompile { file: String, flags: Vec<String> },
    UseCxxDriver,
    AddSearchPath(String),
}

/// A single proposed remedy for a [`Diagnostic`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    pub description: String,
    pub confidence: Confidence,
    pub action: FixAction,
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// A structured, stable-coded classification of a backend message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub evidence: Vec<String>,
    pub fixes: Vec<Fix>,
}

impl Diagnostic {
    /// Whether at least one of this diagnostic's fixes is high-confidence,
    /// i.e. eligible for `fix_mode = auto`.
    pub fn auto_fixable(&self) -> bool {
        self.fixes.iter().any(|fix| fix.confidence == Confidence::High)
    }

    /// Deduplicate by `(code, joined evidence)`, preserving the first
    /// occurrence of each key. Idempotent per §8 property 7.
    pub fn dedup(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::with_capacity(diagnostics.len());
        for diag in diagnostics {
            let key = (diag.code.clone(), diag.evidence.join("\u{1}"));
            if seen.insert(key) {
                out.push(diag);
            }
        }
        out
    }
}

/// The immutable, serializable artifact that fully explains a link.
/// Constructed once by Plan and never mutated afterwards; Execute and Emit
/// only ever hold a shared reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlan {
    pub schema_version: u32,
    pub backend: Backend,
    pub backend_path: PathBuf,
    pub triple: Triple,
    pub link_mode: LinkMode,
    pub output: PathBuf,
    pub inputs: Vec<Input>,
    pub flags: Vec<Flag>,
    pub search_paths: Vec<PathBuf>,
    pub resolved_libs: Vec<ResolvedLib>,
    pub sysroot: Option<PathBuf>,
    pub dynamic_linker: Option<PathBuf>,
    pub fixes_applied: Vec<Fix>,
    pub diagnostics: Vec<Diagnostic>,
    pub raw_args: Vec<String>,
    pub backend_args: Vec<String>,
    /// The fix-mode policy active when this plan was built. Rendering reads
    /// this to decide whether a recorded `AddGroup` fix is merely suggested
    /// (`Suggest`/`HardFail`) or actually reflected in `backend_args`
    /// (`Auto`), so the same inputs under a different policy can produce a
    /// different, still-deterministic, render.
    pub fix_mode: FixMode,
}

/// A backend linker binary the driver delegates the actual link to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Backend {
    Mold,
    Lld,
    Gold,
    Bfd,
    System,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Mold => "mold",
            Backend::Lld => "lld",
            Backend::Gold => "gold",
            Backend::Bfd => "bfd",
            Backend::System => "system",
        }
    }

    pub fn default_preference() -> &'static [Backend] {
        &[
            Backend::Mold,
            Backend::Lld,
            Backend::Gold,
            Backend::Bfd,
            Backend::System,
        ]
    }
}

impl std::str::FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mold" => Ok(Backend::Mold),
            "lld" => Ok(Backend::Lld),
            "gold" => Ok(Backend::Gold),
            "bfd" => Ok(Backend::Bfd),
            "system" => Ok(Backend::System),
            other => Err(Error::Discovery(format!("unknown backend `{other}`"))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of handing a [`LinkPlan`] to [`crate::execute`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecResult {
    pub plan: Arc<LinkPlan>,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub post_diagnostics: Vec<Diagnostic>,
}

impl ExecResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Policy controlling how suggested fixes are handled by the Driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixMode {
    /// Apply any fix the pipeline itself can safely perform and record it.
    Auto,
    /// Never mutate the plan; only ever present fixes to the user.
    Suggest,
    /// Exit non-zero if any `Severity::Error` diagnostic is produced, even
    /// when the backend itself exited successfully.
    HardFail,
}

/// The closed taxonomy of failures a phase can surface. `Multiple` composes
/// sub-errors for batched contexts (most commonly several unresolved
/// libraries at once).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("parse: {0}")]
    Parse(String),
    #[error("normalize: {0}")]
    Normalize(String),
    #[error("discovery: {0}")]
    Discovery(String),
    #[error("resolve: cannot find -l{lib} (searched: {})", .searched.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    Resolve { lib: String, searched: Vec<PathBuf> },
    #[error("symbol: {0}")]
    Symbol(String),
    #[error("reorder: {0}")]
    Reorder(String),
    #[error("plan: {0}")]
    Plan(String),
    #[error("exec: backend exited with code {exit_code}: {stderr}")]
    Exec { exit_code: i32, stderr: String },
    #[error("{} errors occurred:\n{}", .0.len(), .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<Error>),
}

pub type Result<T> = std::result::Result<T, Error>;
