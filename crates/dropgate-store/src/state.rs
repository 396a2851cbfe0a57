//! The per-network coordination record.
//!
//! A record is a JSON object. Stage results live under dotted key paths such
//! as `airdrop-1.merkleDistributorAddress` or `app:aragon-voting.proxyAddress`;
//! each `.` descends one object level and everything between dots, including
//! `:` and `-`, is a literal key.

use crate::errors::{Result, StateError};
use dropgate_core::Address;
use serde_json::{Map, Value};
use std::fmt;

/// Top-level key holding the chain id the record belongs to.
pub const NETWORK_ID_KEY: &str = "networkId";

/// A parsed dotted key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    raw: String,
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse `path`, rejecting empty paths and empty segments.
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| StateError::InvalidKeyPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        if path.is_empty() {
            return Err(invalid("empty path"));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(invalid("empty segment"));
        }
        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Path segments, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// In-memory coordination record for one network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkState {
    root: Map<String, Value>,
}

impl NetworkState {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a parsed JSON object.
    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    /// The underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Chain id stored in the record, if any.
    pub fn network_id(&self) -> Option<u64> {
        self.root.get(NETWORK_ID_KEY).and_then(Value::as_u64)
    }

    /// Bind the record to `chain_id`.
    pub fn set_network_id(&mut self, chain_id: u64) {
        self.root
            .insert(NETWORK_ID_KEY.to_string(), Value::from(chain_id));
    }

    /// Value at a dotted path. Malformed paths are treated as absent.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let key = KeyPath::parse(path).ok()?;
        self.get(&key)
    }

    /// Value at a parsed path.
    pub fn get(&self, key: &KeyPath) -> Option<&Value> {
        let (first, rest) = key.segments().split_first()?;
        let mut current = self.root.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Whether a non-null value exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.get_path(path).is_some_and(|v| !v.is_null())
    }

    /// String value at `path`.
    pub fn get_str(&self, path: &str) -> Result<&str> {
        match self.get_path(path) {
            None | Some(Value::Null) => Err(StateError::MissingState {
                keys: vec![path.to_string()],
            }),
            Some(value) => value.as_str().ok_or_else(|| StateError::InvalidValue {
                key: path.to_string(),
                reason: format!("expected a string, found {value}"),
            }),
        }
    }

    /// Address value at `path`.
    pub fn get_address(&self, path: &str) -> Result<Address> {
        self.get_str(path)?
            .parse()
            .map_err(|e| StateError::InvalidValue {
                key: path.to_string(),
                reason: format!("{e}"),
            })
    }

    /// Unsigned integer value at `path`. Accepts JSON numbers and decimal strings.
    pub fn get_u64(&self, path: &str) -> Result<u64> {
        let invalid = |value: &Value| StateError::InvalidValue {
            key: path.to_string(),
            reason: format!("expected an unsigned integer, found {value}"),
        };
        match self.get_path(path) {
            None | Some(Value::Null) => Err(StateError::MissingState {
                keys: vec![path.to_string()],
            }),
            Some(value @ Value::Number(n)) => n.as_u64().ok_or_else(|| invalid(value)),
            Some(value @ Value::String(s)) => s.parse().map_err(|_| invalid(value)),
            Some(value) => Err(invalid(value)),
        }
    }

    /// Set the value at a dotted path, creating intermediate objects.
    ///
    /// Fails if an intermediate segment already holds a non-object value.
    pub fn set_path(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let key = KeyPath::parse(path)?;
        let Some((last, parents)) = key.segments().split_last() else {
            return Err(StateError::InvalidKeyPath {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        };

        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = entry
                .as_object_mut()
                .ok_or_else(|| StateError::InvalidKeyPath {
                    path: path.to_string(),
                    reason: format!("{segment} is not an object"),
                })?;
        }
        current.insert(last.clone(), value.into());
        Ok(())
    }

    /// Remove the value at `path`, returning it. Absent paths are a no-op.
    pub fn remove_path(&mut self, path: &str) -> Result<Option<Value>> {
        let key = KeyPath::parse(path)?;
        let Some((last, parents)) = key.segments().split_last() else {
            return Ok(None);
        };

        let mut current = &mut self.root;
        for segment in parents {
            match current.get_mut(segment).and_then(Value::as_object_mut) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(current.remove(last))
    }

    /// Fail with every absent key in `keys`, in order.
    pub fn require<S: AsRef<str>>(&self, keys: &[S]) -> Result<()> {
        assert_required(self, keys)
    }

    /// Render as pretty JSON.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Check that every key in `keys` is present in `state`.
///
/// Returns `MissingState` listing exactly the absent keys in the order given.
/// Malformed paths count as absent.
pub fn assert_required<S: AsRef<str>>(state: &NetworkState, keys: &[S]) -> Result<()> {
    let missing: Vec<String> = keys
        .iter()
        .map(AsRef::as_ref)
        .filter(|key| !state.contains(key))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StateError::MissingState { keys: missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_path_parsing() {
        let key = KeyPath::parse("app:aragon-voting.proxyAddress").unwrap();
        assert_eq!(key.segments(), ["app:aragon-voting", "proxyAddress"]);
        assert!(KeyPath::parse("").is_err());
        assert!(KeyPath::parse("a..b").is_err());
        assert!(KeyPath::parse(".a").is_err());
    }

    #[test]
    fn test_set_and_get_nested() {
        let mut state = NetworkState::new();
        state
            .set_path("airdrop-1.merkleFile", "airdrops/one.json")
            .unwrap();
        state.set_path("airdrop-1.voteId", 7).unwrap();

        assert_eq!(state.get_str("airdrop-1.merkleFile").unwrap(), "airdrops/one.json");
        assert_eq!(state.get_u64("airdrop-1.voteId").unwrap(), 7);
        assert_eq!(
            state.as_map()["airdrop-1"],
            json!({ "merkleFile": "airdrops/one.json", "voteId": 7 })
        );
    }

    #[test]
    fn test_remove_path() {
        let mut state = NetworkState::new();
        state.set_path("airdrop-1.voteId", 3).unwrap();
        state.set_path("airdrop-1.merkleFile", "one.json").unwrap();

        assert_eq!(state.remove_path("airdrop-1.voteId").unwrap(), Some(json!(3)));
        assert!(!state.contains("airdrop-1.voteId"));
        assert!(state.contains("airdrop-1.merkleFile"));
        assert_eq!(state.remove_path("airdrop-1.voteId").unwrap(), None);
        assert_eq!(state.remove_path("airdrop-2.voteId").unwrap(), None);
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut state = NetworkState::new();
        state.set_path("daoTokenAddress", "0x01").unwrap();
        let err = state.set_path("daoTokenAddress.inner", 1).unwrap_err();
        assert!(matches!(err, StateError::InvalidKeyPath { .. }));
    }

    #[test]
    fn test_missing_state_lists_every_key() {
        let state = NetworkState::new();
        let err = assert_required(&state, &["daoTokenAddress", "votingApp"]).unwrap_err();
        assert_eq!(err.missing_keys(), ["daoTokenAddress", "votingApp"]);
    }

    #[test]
    fn test_missing_state_keeps_caller_order_and_skips_present() {
        let mut state = NetworkState::new();
        state.set_path("b", "x").unwrap();
        state.set_path("d.e", Value::Null).unwrap();
        let err = state.require(&["c", "b", "a", "d.e"]).unwrap_err();
        assert_eq!(err.missing_keys(), ["c", "a", "d.e"]);
        assert!(state.require(&["b"]).is_ok());
        assert!(state.require::<&str>(&[]).is_ok());
    }

    #[test]
    fn test_typed_getters_reject_wrong_types() {
        let mut state = NetworkState::new();
        state.set_path("token", 12).unwrap();
        state.set_path("id", "seven").unwrap();
        assert!(matches!(
            state.get_address("token"),
            Err(StateError::InvalidValue { .. })
        ));
        assert!(matches!(
            state.get_u64("id"),
            Err(StateError::InvalidValue { .. })
        ));
        assert!(matches!(
            state.get_str("absent"),
            Err(StateError::MissingState { .. })
        ));
    }

    #[test]
    fn test_network_id() {
        let mut state = NetworkState::new();
        assert_eq!(state.network_id(), None);
        state.set_network_id(5);
        assert_eq!(state.network_id(), Some(5));
    }
}
