//! Identifier types.
//!
//! Stats, buffs and techniques are all named by interned strings. Each kind
//! gets its own newtype so a buff id can never be passed where a technique
//! id is expected. All of them use `Arc<str>` for cheap cloning and fast
//! comparison, and serialize as plain strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a new identifier from a string slice.
            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Self {
                Self(Arc::from(s))
            }

            /// Get the string representation of this identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                self.0.as_ref().serialize(serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok($name::from(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_str(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Arc::from(s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

interned_id!(
    /// Identifier of a numeric variable: a craft stat (`intensity`,
    /// `control`), a state field (`pool`, `stability`) or any named variable
    /// a formula can reference.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use craftsage::StatId;
    ///
    /// let control = StatId::from_str("control");
    /// let control2: StatId = "control".into();
    /// assert_eq!(control, control2);
    /// assert_eq!(control.as_str(), "control");
    /// ```
    StatId
);

interned_id!(
    /// Identifier of a buff definition in the catalog.
    BuffId
);

interned_id!(
    /// Identifier of a technique definition in the catalog.
    TechniqueId
);

impl From<&BuffId> for StatId {
    /// A buff's stack count is exposed to formulas under the buff's own name.
    fn from(buff: &BuffId) -> Self {
        StatId::from_str(buff.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = TechniqueId::from_str("steady_fusion");
        let id2 = TechniqueId::from_str("steady_fusion");
        assert_eq!(id1, id2);
        assert_eq!(id1.as_str(), "steady_fusion");
    }

    #[test]
    fn test_id_serializes_as_string() {
        let id = BuffId::from_str("focus");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"focus\"");

        let back: BuffId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_buff_id_as_stat() {
        let buff = BuffId::from_str("focus");
        assert_eq!(StatId::from(&buff).as_str(), "focus");
    }

    #[test]
    fn test_id_ordering() {
        let a = StatId::from_str("control");
        let b = StatId::from_str("intensity");
        assert!(a < b);
    }
}
