//! Key Derivation Module
//!
//! Turns a callable identity, an optional owner scope and the call arguments into
//! a SHA-256 fingerprint.
//!
//! Arguments are encoded structurally through `serde`: positional arguments as an
//! ordered JSON array, keyword arguments as a JSON object. `serde_json::Map` keeps
//! its keys sorted, so keyword order never changes the key. The encoding goes
//! through a tagging serializer so options and non-finite floats stay distinguishable.

mod canonical;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Cache Key ==
/// Fingerprint of one (callable, scope, arguments) request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hashes an already canonical string.
    pub fn from_canonical(canonical: &str) -> Self {
        let digest = Sha256::digest(canonical.as_bytes());
        CacheKey(format!("{:x}", digest))
    }

    /// The fingerprint as 64 lowercase hex digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Scope ==
static NEXT_SCOPE: AtomicU64 = AtomicU64::new(1);

/// Owner token partitioning a wrapper's cache.
///
/// Two owners get separate entries only if their scopes differ; nothing about the
/// owner's fields is looked at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Scope {
    /// Process-unique token from [`Scope::unique`]
    Unique(u64),
    /// Caller-chosen name; equal names share entries
    Named(String),
}

impl Scope {
    /// A token no other `Scope::unique` call returns in this process.
    pub fn unique() -> Self {
        Scope::Unique(NEXT_SCOPE.fetch_add(1, Ordering::Relaxed))
    }

    /// A stable token chosen by the caller.
    ///
    /// Owners built with the same name share cached entries.
    pub fn named(name: impl Into<String>) -> Self {
        Scope::Named(name.into())
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::unique()
    }
}

/// Owners of memoized methods declare their cache scope explicitly.
pub trait Scoped {
    fn scope(&self) -> &Scope;
}

// == Bundle Shape ==
/// How the arguments reached the deriver; part of every fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Shape {
    /// Separate positional and keyword values via [`KeyDeriver::derive`]
    Split,
    /// A bundle that serialized to a sequence or tuple
    Sequence,
    /// A bundle that serialized to a struct or map
    Record,
    /// A bundle that serialized to `()`
    Unit,
    /// Any other bundle, kept as one positional argument
    Single,
}

// == Key Deriver ==
pub struct KeyDeriver;

impl KeyDeriver {
    /// Fingerprints a call given separate positional and keyword arguments.
    ///
    /// `keyword` must serialize to a map (or `()` for none).
    pub fn derive<P, K>(
        identity: &str,
        scope: Option<&Scope>,
        positional: &P,
        keyword: &K,
    ) -> Result<CacheKey>
    where
        P: Serialize + ?Sized,
        K: Serialize + ?Sized,
    {
        let positional = match canonical::to_value(positional)? {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        let keyword = match canonical::to_value(keyword)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(CacheError::KeyDerivation(format!(
                    "keyword arguments must serialize to a map, got {}",
                    other
                )))
            }
        };
        Self::fingerprint(identity, scope, Shape::Split, positional, keyword)
    }

    /// Fingerprints a call from one argument bundle.
    ///
    /// Tuples and sequences are positional, structs and maps are keyword
    /// arguments, `()` is no arguments, anything else is one positional argument.
    /// The bundle's shape is hashed too, so `None` and `Some(vec![])` differ.
    pub fn derive_from<A>(identity: &str, scope: Option<&Scope>, args: &A) -> Result<CacheKey>
    where
        A: Serialize + ?Sized,
    {
        let (shape, positional, keyword) = match canonical::to_value(args)? {
            Value::Array(items) => (Shape::Sequence, items, Map::new()),
            Value::Object(map) => (Shape::Record, Vec::new(), map),
            Value::Null => (Shape::Unit, Vec::new(), Map::new()),
            single => (Shape::Single, vec![single], Map::new()),
        };
        Self::fingerprint(identity, scope, shape, positional, keyword)
    }

    fn fingerprint(
        identity: &str,
        scope: Option<&Scope>,
        shape: Shape,
        positional: Vec<Value>,
        keyword: Map<String, Value>,
    ) -> Result<CacheKey> {
        let canonical = serde_json::to_string(&(identity, scope, shape, positional, keyword))?;
        Ok(CacheKey::from_canonical(&canonical))
    }
}
