use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for node ids. Rule trees reuse the same ids on
/// every flatten/unflatten pass, so each one is hashed once.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Reserved id of the synthetic root inserted by `flatten`.
/// Never valid as a data id.
pub const SENTINEL_ID: &str = "__rt_sentinel_root__";

/// An interned identifier for a rule-tree node.
/// Internally a `Spur` index: 4 bytes, Copy, Eq and Hash in O(1).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// The id of the flattened form's synthetic root.
    pub fn sentinel() -> Self {
        Self::intern(SENTINEL_ID)
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
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
        Self::intern(s)
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
        let a = NodeId::intern("e76e691d-5866-4f76-b308-c3b0de43f665");
        let b = NodeId::intern("e76e691d-5866-4f76-b308-c3b0de43f665");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "e76e691d-5866-4f76-b308-c3b0de43f665");
    }

    #[test]
    fn sentinel_is_reserved() {
        assert!(NodeId::sentinel().is_sentinel());
        assert!(!NodeId::intern("root").is_sentinel());
        assert_eq!(NodeId::sentinel().as_str(), SENTINEL_ID);
    }

    #[test]
    fn display_is_the_raw_id() {
        assert_eq!(NodeId::intern("A").to_string(), "A");
    }
}
