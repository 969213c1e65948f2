use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for canvas ids. Backend uuids repeat on every
/// refresh, so comparisons and hashing stay O(1).
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned identifier for nodes and edges on the canvas.
/// Internally a `Spur` index: 4 bytes, Copy, Eq, Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a new string as a NodeId, or return existing if already interned.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique local id with a prefix (e.g. `dummy_3`).
    ///
    /// Used for nodes and edges that only exist on the client and have no
    /// backend identity yet.
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{prefix}_{n}"))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::intern(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("c1f2-orders");
        let b = NodeId::intern("c1f2-orders");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "c1f2-orders");
        assert_eq!(a.to_string(), "c1f2-orders");
    }

    #[test]
    fn prefixed_ids_are_unique() {
        let a = NodeId::with_prefix("dummy");
        let b = NodeId::with_prefix("dummy");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("dummy_"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = NodeId::intern("node-7");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"node-7\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
