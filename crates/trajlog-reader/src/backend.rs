//! Backend selection.
//!
//! A [`BackendSelector`] either hands over a ready backend or names a
//! [`BackendKind`]. Each kind maps to exactly one constructor through an
//! exhaustive `match`, so adding a backend is adding a variant and an arm.
//! Constructor arguments travel as [`BackendArgs`], bound by position or
//! by name.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use trajlog_core::{BackendError, BackendReader, Value};
use trajlog_log::{ConfigError, LogBackendReader, LogReaderConfig};
use trajlog_memory::{InMemoryBackendReader, InMemoryStorage};

use crate::error::ReaderError;

// ── BackendArgs ─────────────────────────────────────────────────

/// One constructor argument.
#[derive(Clone, Debug)]
pub enum BackendArg {
    /// A filesystem location.
    Path(PathBuf),
    /// Shared in-memory storage.
    Storage(InMemoryStorage),
    /// A plain value: strings, numbers, flags.
    Value(Value),
}

impl BackendArg {
    fn kind(&self) -> &'static str {
        match self {
            Self::Path(_) => "path",
            Self::Storage(_) => "storage",
            Self::Value(v) => v.kind(),
        }
    }
}

impl From<PathBuf> for BackendArg {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<&Path> for BackendArg {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<InMemoryStorage> for BackendArg {
    fn from(s: InMemoryStorage) -> Self {
        Self::Storage(s)
    }
}

impl From<Value> for BackendArg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<bool> for BackendArg {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

impl From<&str> for BackendArg {
    fn from(s: &str) -> Self {
        Self::Value(Value::from(s))
    }
}

/// Positional and named constructor arguments for a backend.
///
/// ```
/// use trajlog_reader::BackendArgs;
///
/// let args = BackendArgs::new()
///     .arg("/data/run-7")
///     .named("tolerate_truncated_shards", false);
/// assert_eq!(args.positional().len(), 1);
/// assert!(args.get_named("tolerate_truncated_shards").is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct BackendArgs {
    positional: Vec<BackendArg>,
    named: IndexMap<String, BackendArg>,
}

impl BackendArgs {
    /// No arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl Into<BackendArg>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Set a named argument, replacing an earlier one of the same name.
    pub fn named(mut self, name: impl Into<String>, arg: impl Into<BackendArg>) -> Self {
        self.named.insert(name.into(), arg.into());
        self
    }

    /// Positional arguments in order.
    pub fn positional(&self) -> &[BackendArg] {
        &self.positional
    }

    /// The named argument `name`.
    pub fn get_named(&self, name: &str) -> Option<&BackendArg> {
        self.named.get(name)
    }

    /// Whether no argument was given.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Bind arguments to the parameter list `params`.
    ///
    /// Positional arguments fill parameters in order; named ones fill the
    /// parameter of that name. Extra positionals, unknown names and
    /// parameters given twice are rejected.
    fn bind(self, backend: BackendKind, params: &[&'static str]) -> Result<BoundArgs, BackendError> {
        if self.positional.len() > params.len() {
            return Err(BackendError::invalid_argument(format!(
                "{backend} backend takes at most {} positional arguments, got {}",
                params.len(),
                self.positional.len()
            )));
        }
        let mut bound: IndexMap<&'static str, BackendArg> = params
            .iter()
            .copied()
            .zip(self.positional)
            .collect();
        for (name, arg) in self.named {
            let Some(&param) = params.iter().find(|p| **p == name) else {
                return Err(BackendError::invalid_argument(format!(
                    "{backend} backend got an unexpected argument '{name}'"
                )));
            };
            if bound.insert(param, arg).is_some() {
                return Err(BackendError::invalid_argument(format!(
                    "{backend} backend got multiple values for argument '{param}'"
                )));
            }
        }
        Ok(BoundArgs { backend, bound })
    }
}

struct BoundArgs {
    backend: BackendKind,
    bound: IndexMap<&'static str, BackendArg>,
}

impl BoundArgs {
    fn required(&mut self, name: &str) -> Result<BackendArg, BackendError> {
        self.bound.shift_remove(name).ok_or_else(|| {
            BackendError::invalid_argument(format!(
                "{} backend is missing required argument '{name}'",
                self.backend
            ))
        })
    }

    fn optional(&mut self, name: &str) -> Option<BackendArg> {
        self.bound.shift_remove(name)
    }

    fn wrong_type(&self, name: &str, expected: &str, found: &BackendArg) -> BackendError {
        BackendError::invalid_argument(format!(
            "{} backend argument '{name}' must be {expected}, got {}",
            self.backend,
            found.kind()
        ))
    }
}

// ── Factories ───────────────────────────────────────────────────

/// Constructor of one backend kind.
pub type BackendFactory = fn(BackendArgs) -> Result<Box<dyn BackendReader>, BackendError>;

/// `log(data_dir, tolerate_truncated_shards = true)`
fn open_log(args: BackendArgs) -> Result<Box<dyn BackendReader>, BackendError> {
    let mut args = args.bind(BackendKind::Log, &["data_dir", "tolerate_truncated_shards"])?;
    let data_dir = match args.required("data_dir")? {
        BackendArg::Path(p) => p,
        BackendArg::Value(Value::Str(s)) => PathBuf::from(s),
        other => return Err(args.wrong_type("data_dir", "a path", &other)),
    };
    let mut config = LogReaderConfig::default();
    match args.optional("tolerate_truncated_shards") {
        None => {}
        Some(BackendArg::Value(Value::Bool(b))) => config.tolerate_truncated_shards = b,
        Some(_) => {
            return Err(ConfigError::InvalidOption {
                name: "tolerate_truncated_shards".into(),
                expected: "a bool",
            }
            .into())
        }
    }
    Ok(Box::new(LogBackendReader::open(data_dir, config)?))
}

/// `in_memory(storage)`
fn open_in_memory(args: BackendArgs) -> Result<Box<dyn BackendReader>, BackendError> {
    let mut args = args.bind(BackendKind::InMemory, &["storage"])?;
    match args.required("storage")? {
        BackendArg::Storage(storage) => Ok(Box::new(InMemoryBackendReader::new(storage))),
        other => Err(args.wrong_type("storage", "an in-memory storage handle", &other)),
    }
}

// ── BackendKind ─────────────────────────────────────────────────

/// The storage backends a reader can construct by name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The sharded binary log written by `trajlog_log::LogWriter`.
    #[default]
    Log,
    /// A trajectory held in an [`InMemoryStorage`].
    InMemory,
}

impl BackendKind {
    /// Every kind, in declaration order.
    pub const ALL: [BackendKind; 2] = [BackendKind::Log, BackendKind::InMemory];

    /// Canonical tag accepted by [`FromStr`].
    pub fn tag(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::InMemory => "in_memory",
        }
    }

    /// The constructor for this kind.
    pub fn factory(self) -> BackendFactory {
        match self {
            Self::Log => open_log,
            Self::InMemory => open_in_memory,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BackendKind {
    type Err = ReaderError;

    /// Accepts the canonical tags plus `riegeli` as an alias of `log`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" | "riegeli" => Ok(Self::Log),
            "in_memory" => Ok(Self::InMemory),
            other => Err(ReaderError::Configuration {
                value: other.to_string(),
            }),
        }
    }
}

// ── BackendSelector ─────────────────────────────────────────────

/// Which backend a [`TrajectoryReader`](crate::TrajectoryReader) reads from.
pub enum BackendSelector {
    /// Construct a backend of this kind from the arguments.
    Kind(BackendKind),
    /// Parse the name into a [`BackendKind`] first.
    Named(String),
    /// Use this backend as-is; arguments are ignored.
    Instance(Box<dyn BackendReader>),
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::Kind(BackendKind::default())
    }
}

impl fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

impl From<BackendKind> for BackendSelector {
    fn from(kind: BackendKind) -> Self {
        Self::Kind(kind)
    }
}

impl From<&str> for BackendSelector {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for BackendSelector {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<Box<dyn BackendReader>> for BackendSelector {
    fn from(backend: Box<dyn BackendReader>) -> Self {
        Self::Instance(backend)
    }
}
