//! Identity types shared across every component of the execution core.

use std::fmt;
use std::sync::Arc;

/// Identifies a single user function, stable for the lifetime of the process.
///
/// Cloning is O(1) (an `Arc<str>` bump) since every map in the system —
/// cache, circuit breaker registry, executor registry — is keyed by this
/// type and clones it on most lookup paths.
#[derive(Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FunctionId(Arc<str>);

impl FunctionId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionId({:?})", self.0)
    }
}

impl From<&str> for FunctionId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for FunctionId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl serde::Serialize for FunctionId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for FunctionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s))
    }
}

/// Content hash of a module's source (code, optional tests, optional script).
///
/// Used as the cache's secondary index so that two `FunctionId`s whose code
/// is byte-identical share one loaded module stub.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct CodeHash([u8; 32]);

impl CodeHash {
    /// Hashes `code`, an optional `tests` blob, and an optional `script` blob,
    /// NUL-separating the three so that no concatenation of parts can collide
    /// with a different split of the same bytes.
    pub fn digest(code: &str, tests: Option<&str>, script: Option<&str>) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(code.as_bytes());
        hasher.update([0u8]);
        hasher.update(tests.unwrap_or("").as_bytes());
        hasher.update([0u8]);
        hasher.update(script.unwrap_or("").as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeHash({})", self.to_hex())
    }
}

impl fmt::Display for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Identifies a single execution attempt, assigned when admission succeeds.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct ExecutionId(uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

/// Identifies a single row in the generic per-function log table (spec.md
/// §3 "Log Store Row"), distinct from an [`ExecutionId`].
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, serde::Serialize, serde::Deserialize)]
pub struct LogRowId(uuid::Uuid);

impl LogRowId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for LogRowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LogRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::str::FromStr for LogRowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(uuid::Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_hash_distinguishes_split_point() {
        let a = CodeHash::digest("ab", Some("c"), None);
        let b = CodeHash::digest("a", Some("bc"), None);
        assert_ne!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn code_hash_is_deterministic() {
        let a = CodeHash::digest("fn main() {}", None, Some("script"));
        let b = CodeHash::digest("fn main() {}", None, Some("script"));
        assert_eq!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn function_id_cheap_clone_round_trips() {
        let id = FunctionId::from("fn-123");
        let cloned = id.clone();
        assert_eq!(id, cloned);
        assert_eq!(id.as_str(), "fn-123");
    }

    #[test]
    fn execution_ids_are_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn execution_id_round_trips_through_display_and_from_str() {
        let id = ExecutionId::new();
        let parsed: ExecutionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn log_row_ids_are_unique() {
        assert_ne!(LogRowId::new(), LogRowId::new());
    }
}
