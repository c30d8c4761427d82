//! The closed option schema and the four-scope option model.
//!
//! Options live at four scopes (schema defaults, the global `-o` set, the
//! per-tree set, the per-path set) and resolve with a precedence that
//! depends on the option: `ro` lets the global scope win so an operator
//! can force an entire composition read-only, everything else lets the
//! most specific scope refine.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;

use ilfs_common::{IlfsError, IlfsResult, PathKind};

/// When a path's initializer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitPolicy {
    /// The path must already exist; never initialize.
    Never,
    /// Skip the load-time existence check, but still demand existence at
    /// execution time. The default for glob specs.
    Skip,
    /// Initialize only when the source object is missing.
    Missing,
    /// Always run the initializer.
    Always,
}

impl InitPolicy {
    /// Does this policy tolerate an absent source object at load time?
    #[must_use]
    pub fn tolerates_missing(self) -> bool {
        !matches!(self, InitPolicy::Never)
    }

    /// Does this policy permit running an initializer?
    #[must_use]
    pub fn may_initialize(self) -> bool {
        matches!(self, InitPolicy::Missing | InitPolicy::Always)
    }
}

impl FromStr for InitPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(InitPolicy::Never),
            "skip" => Ok(InitPolicy::Skip),
            "missing" => Ok(InitPolicy::Missing),
            "always" => Ok(InitPolicy::Always),
            _ => Err(()),
        }
    }
}

impl fmt::Display for InitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitPolicy::Never => "never",
            InitPolicy::Skip => "skip",
            InitPolicy::Missing => "missing",
            InitPolicy::Always => "always",
        })
    }
}

/// Declared type of a composed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// A directory (`d`).
    Dir,
    /// A regular file (`f`).
    File,
    /// Either (`e`); matches any probe result.
    Either,
}

impl PathType {
    /// Does an on-disk object of `kind` satisfy this declaration?
    #[must_use]
    pub fn matches(self, kind: PathKind) -> bool {
        match self {
            PathType::Either => true,
            PathType::Dir => kind == PathKind::Dir,
            PathType::File => kind == PathKind::File,
        }
    }
}

impl FromStr for PathType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "d" => Ok(PathType::Dir),
            "f" => Ok(PathType::File),
            "e" => Ok(PathType::Either),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PathType::Dir => "d",
            PathType::File => "f",
            PathType::Either => "e",
        })
    }
}

/// The scopes an option can be set at, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Schema defaults; always present.
    Defaults,
    /// The session-wide `-o` set.
    Global,
    /// The path's tree.
    Tree,
    /// The path itself.
    Path,
}

/// Keys of the closed schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    /// Read-only policy (`ro`, boolean, alias `rw` = `ro=0`).
    Ro,
    /// Initializer policy (`init`).
    Init,
    /// Declared path type (`type`).
    Type,
}

impl OptionKey {
    /// Scope precedence for this key, lowest to highest.
    ///
    /// `ro` inverts the usual order so the operator's global `-o ro` can
    /// remount an entire composition read-only; every other option lets
    /// the most specific scope win.
    #[must_use]
    pub fn precedence(self) -> [Scope; 4] {
        match self {
            OptionKey::Ro => [Scope::Defaults, Scope::Path, Scope::Tree, Scope::Global],
            _ => [Scope::Defaults, Scope::Global, Scope::Tree, Scope::Path],
        }
    }
}

/// One row of the schema table, for diagnostics and parse dispatch.
struct OptionSpec {
    name: &'static str,
    key: OptionKey,
    /// Value implied when the option appears bare (`ro`, `rw`); `None`
    /// means a value is required.
    bare_value: Option<&'static str>,
    /// Canonical name the option stores under (aliases differ).
    canonical: &'static str,
}

static SCHEMA: Lazy<Vec<OptionSpec>> = Lazy::new(|| {
    vec![
        OptionSpec {
            name: "ro",
            key: OptionKey::Ro,
            bare_value: Some("1"),
            canonical: "ro",
        },
        OptionSpec {
            name: "rw",
            key: OptionKey::Ro,
            bare_value: Some("0"),
            canonical: "ro",
        },
        OptionSpec {
            name: "init",
            key: OptionKey::Init,
            bare_value: None,
            canonical: "init",
        },
        OptionSpec {
            name: "type",
            key: OptionKey::Type,
            bare_value: None,
            canonical: "type",
        },
    ]
});

/// A set of option values at one scope. Any key may be unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    /// Read-only policy, if set.
    pub ro: Option<bool>,
    /// Initializer policy, if set.
    pub init: Option<InitPolicy>,
    /// Declared path type, if set.
    pub path_type: Option<PathType>,
}

impl OptionSet {
    /// Parse a comma-separated `name[=value]` option string.
    ///
    /// Aliases are canonicalized at parse time (`rw` stores as `ro=0`), so
    /// the set only ever holds canonical keys. Unknown names and values
    /// outside the schema are rejected.
    pub fn parse(optstr: &str) -> IlfsResult<Self> {
        let mut set = OptionSet::default();
        for item in optstr.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let (name, value) = match item.split_once('=') {
                Some((n, v)) => (n, Some(v)),
                None => (item, None),
            };
            let spec = SCHEMA
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| IlfsError::UnknownOption {
                    name: name.to_string(),
                })?;
            let value = match (value, spec.bare_value) {
                (Some(v), _) if spec.canonical != spec.name => {
                    // Aliases are value-less by definition.
                    return Err(IlfsError::InvalidOptionValue {
                        name: name.to_string(),
                        value: v.to_string(),
                    });
                }
                (Some(v), _) => v,
                (None, Some(bare)) => bare,
                (None, None) => {
                    return Err(IlfsError::InvalidOptionValue {
                        name: name.to_string(),
                        value: String::new(),
                    });
                }
            };
            set.store(spec.key, spec.canonical, value)?;
        }
        Ok(set)
    }

    fn store(&mut self, key: OptionKey, name: &str, value: &str) -> IlfsResult<()> {
        let invalid = || IlfsError::InvalidOptionValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        match key {
            OptionKey::Ro => {
                self.ro = Some(match value {
                    "0" => false,
                    "1" => true,
                    _ => return Err(invalid()),
                });
            }
            OptionKey::Init => {
                self.init = Some(value.parse().map_err(|()| invalid())?);
            }
            OptionKey::Type => {
                self.path_type = Some(value.parse().map_err(|()| invalid())?);
            }
        }
        Ok(())
    }

    /// Overlay `other` onto `self`; keys set in `other` win.
    ///
    /// Used to concatenate repeated `-o` strings into the global scope.
    pub fn merge_from(&mut self, other: &OptionSet) {
        if let Some(ro) = other.ro {
            self.ro = Some(ro);
        }
        if let Some(init) = other.init {
            self.init = Some(init);
        }
        if let Some(t) = other.path_type {
            self.path_type = Some(t);
        }
    }

    /// True when no key is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ro.is_none() && self.init.is_none() && self.path_type.is_none()
    }
}

/// Schema defaults: `ro=0`, `init=never`, `type=e`.
pub mod defaults {
    use super::{InitPolicy, PathType};

    /// Default read-only policy.
    pub const RO: bool = false;
    /// Default initializer policy.
    pub const INIT: InitPolicy = InitPolicy::Never;
    /// Default path type.
    pub const TYPE: PathType = PathType::Either;
}
