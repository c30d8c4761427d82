//! Common error types for the ilfs crates.

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`IlfsError`].
pub type IlfsResult<T> = Result<T, IlfsError>;

/// Errors raised anywhere in the composition engine.
///
/// Variants correspond to the error kinds a session can fail with; every
/// error is fatal for the session that raised it.
#[derive(Error, Diagnostic, Debug)]
pub enum IlfsError {
    /// Kernel or tool capability absent on this host.
    #[error("Platform capability missing: {feature}")]
    #[diagnostic(code(ilfs::platform))]
    Platform {
        /// The missing capability.
        feature: String,
    },

    /// CLI or configuration lexical/grammar error.
    #[error("{message}")]
    #[diagnostic(code(ilfs::usage))]
    Usage {
        /// The error message.
        message: String,
    },

    /// The template scanner hit malformed input.
    #[error("Template syntax error: {detail}")]
    #[diagnostic(
        code(ilfs::template::syntax),
        help("Only ${{NAME}} references are recognized; write \\$ for a literal dollar")
    )]
    TemplateSyntax {
        /// What the scanner choked on.
        detail: String,
    },

    /// A `${NAME}` reference names a variable that is not set.
    #[error("Undefined template variable: {name}")]
    #[diagnostic(code(ilfs::template::undefined))]
    TemplateUndefined {
        /// The unset variable name.
        name: String,
    },

    /// Option name outside the closed schema.
    #[error("Unknown option: {name}")]
    #[diagnostic(
        code(ilfs::options::unknown),
        help("Valid options are ro, rw, init and type")
    )]
    UnknownOption {
        /// The unknown option name.
        name: String,
    },

    /// Option value outside the schema's value set.
    #[error("Invalid value for option {name}: {value:?}")]
    #[diagnostic(code(ilfs::options::invalid_value))]
    InvalidOptionValue {
        /// The option name.
        name: String,
        /// The rejected value.
        value: String,
    },

    /// A paths-table line references a tree that was never defined.
    #[error("Unknown tree: {name}")]
    #[diagnostic(code(ilfs::tree::unknown))]
    UnknownTree {
        /// The tree name.
        name: String,
    },

    /// A tree name was defined twice in one session.
    #[error("Duplicate tree: {name}")]
    #[diagnostic(code(ilfs::tree::duplicate))]
    DuplicateTree {
        /// The tree name.
        name: String,
    },

    /// A tree root does not resolve to an existing directory.
    #[error("Invalid tree root for {name}: {root}")]
    #[diagnostic(
        code(ilfs::tree::invalid_root),
        help("Tree roots must resolve to existing directories on the host")
    )]
    InvalidTreeRoot {
        /// The tree name.
        name: String,
        /// The rejected root.
        root: String,
    },

    /// A composed path violates the path grammar.
    #[error("Invalid path: {path:?}")]
    #[diagnostic(
        code(ilfs::path::invalid),
        help("Composed paths are absolute, with no empty, '.' or '..' components")
    )]
    PathInvalid {
        /// The rejected path.
        path: String,
    },

    /// A path equals or descends from a previously registered path.
    #[error("Path {path} is shadowed by {prior}")]
    #[diagnostic(code(ilfs::path::shadow))]
    PathShadow {
        /// The path being registered.
        path: String,
        /// The earlier path that shadows it.
        prior: String,
    },

    /// The on-disk source object does not match the declared type.
    #[error("Type mismatch for {path}: expected {expected}, found {actual}")]
    #[diagnostic(code(ilfs::path::type_mismatch))]
    PathTypeMismatch {
        /// The composed path.
        path: String,
        /// The declared type.
        expected: String,
        /// What the filesystem probe found.
        actual: String,
    },

    /// A non-glob path has no source object and no initializer policy
    /// that tolerates its absence.
    #[error("No match for path: {path}")]
    #[diagnostic(
        code(ilfs::path::no_match),
        help("Set init=missing or init=always to create the path at mount time")
    )]
    PathNoMatch {
        /// The unmatched path spec.
        path: String,
    },

    /// Glob-expanded paths cannot carry an initializing policy.
    #[error("Initializer forbidden on glob spec: {path}")]
    #[diagnostic(code(ilfs::init::forbidden_on_glob))]
    InitForbiddenOnGlob {
        /// The glob path spec.
        path: String,
    },

    /// A path is absent but its policy demands pre-existence.
    #[error("Path {path} is missing and init={policy} requires it to exist")]
    #[diagnostic(code(ilfs::init::required_missing))]
    InitRequiredMissing {
        /// The composed path.
        path: String,
        /// The resolved init policy.
        policy: String,
    },

    /// A path must be initialized but its command string is blank.
    #[error("Blank initializer command for path: {path}")]
    #[diagnostic(code(ilfs::init::blank_command))]
    InitBlankCommand {
        /// The composed path.
        path: String,
    },

    /// An initializer reported success but the path is still wrong.
    #[error("Initializer for {path} did not produce the declared result: {detail}")]
    #[diagnostic(code(ilfs::init::result_mismatch))]
    InitResultMismatch {
        /// The composed path.
        path: String,
        /// What the post-run probe found.
        detail: String,
    },

    /// An initializer action or command failed.
    #[error("Initializer failed for {path}: {detail}")]
    #[diagnostic(code(ilfs::init::failed))]
    InitFailed {
        /// The composed path.
        path: String,
        /// Exit status or failure detail.
        detail: String,
    },

    /// A placeholder location is occupied by an object of the wrong type.
    #[error("Mountpoint collision at {path}: {detail}")]
    #[diagnostic(code(ilfs::mountpoint::collision))]
    MountpointCollision {
        /// The placeholder path on the parent tree.
        path: String,
        /// What collided.
        detail: String,
    },

    /// A mount syscall failed.
    #[error("Mount failed for {path}: {detail}")]
    #[diagnostic(code(ilfs::mount::failed))]
    MountFailed {
        /// The mount target.
        path: String,
        /// The underlying failure.
        detail: String,
    },

    /// The configuration binds no path to `/`.
    #[error("No path bound to /")]
    #[diagnostic(
        code(ilfs::mount::no_root),
        help("The paths table must bind / to one of the trees")
    )]
    NoRootConfigured,

    /// Invariant violation; non-recoverable.
    #[error("Internal error: {message}")]
    #[diagnostic(
        code(ilfs::internal),
        help("This is a bug, please report it at https://github.com/ilfs-tools/ilfs/issues")
    )]
    Internal {
        /// The error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(ilfs::io))]
    Io(#[from] std::io::Error),

    /// A configuration error annotated with its source line.
    #[error("line {line}: {source}")]
    #[diagnostic(code(ilfs::config::line))]
    AtLine {
        /// 1-based line number in the offending table.
        line: usize,
        /// The underlying error.
        #[source]
        source: Box<IlfsError>,
    },
}

impl IlfsError {
    /// Attach a 1-based source line to a configuration error.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        IlfsError::AtLine {
            line,
            source: Box::new(self),
        }
    }

    /// Strip line-context wrappers and return the underlying kind.
    #[must_use]
    pub fn kind(&self) -> &IlfsError {
        match self {
            IlfsError::AtLine { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Process exit code for this error.
    ///
    /// Platform capability failures exit 2, invariant violations exit 70,
    /// everything else exits 1.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            IlfsError::Platform { .. } => 2,
            IlfsError::Internal { .. } => 70,
            _ => 1,
        }
    }
}
