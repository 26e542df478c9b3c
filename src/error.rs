//! Error types for craft resolution and search.
//!
//! Every failure the engine can produce is a `CraftError`. Resolution and
//! search errors bubble up to the top-level `recommend` call unchanged; the
//! engine never emits a partial recommendation.

use crate::ids::{BuffId, StatId, TechniqueId};
use crate::native::Capability;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CraftError>;

/// Format a modifier cycle path as a readable string.
fn format_cycle_path(path: &[StatId]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// The specific legality condition a technique failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// The craft is already completed, failed or out of turns.
    Terminal,
    /// The technique still has turns left on its cooldown.
    OnCooldown(u32),
    /// Finalized pool cost exceeds the current pool.
    InsufficientPool,
    /// Finalized stability cost exceeds the current stability.
    InsufficientStability,
    /// The toxicity cost would push toxicity past the allowed maximum.
    ToxicityLimit,
    /// The technique requires a different condition.
    ConditionMismatch,
    /// A required buff is missing or has too few stacks.
    MissingBuff,
    /// The host's availability precheck rejected the technique.
    HostRejected,
}

impl std::fmt::Display for Unavailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailability::Terminal => write!(f, "craft is finished"),
            Unavailability::OnCooldown(turns) => write!(f, "on cooldown for {} turn(s)", turns),
            Unavailability::InsufficientPool => write!(f, "not enough pool"),
            Unavailability::InsufficientStability => write!(f, "not enough stability"),
            Unavailability::ToxicityLimit => write!(f, "toxicity limit reached"),
            Unavailability::ConditionMismatch => write!(f, "condition requirement not met"),
            Unavailability::MissingBuff => write!(f, "buff requirement not met"),
            Unavailability::HostRejected => write!(f, "rejected by host precheck"),
        }
    }
}

/// Errors that can occur while resolving techniques or searching.
///
/// # Examples
///
/// ```rust
/// use craftsage::CraftError;
///
/// let err = CraftError::UnsupportedEffect("transmute".to_string());
/// assert_eq!(err.to_string(), "Unsupported effect kind: transmute");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CraftError {
    /// An effect kind the resolver does not model.
    ///
    /// Fatal to the branch that hit it; never silently dropped.
    #[error("Unsupported effect kind: {0}")]
    UnsupportedEffect(String),

    /// A technique cannot be used in the given state.
    #[error("Technique {technique} unavailable: {reason}")]
    ActionUnavailable {
        technique: TechniqueId,
        reason: Unavailability,
    },

    /// The host does not provide a native capability.
    #[error("Native capability unavailable: {0:?}")]
    NativeCapabilityUnavailable(Capability),

    /// A state invariant is violated.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A configuration value is outside its documented bounds.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A technique id is not in the catalog.
    #[error("Unknown technique: {0}")]
    UnknownTechnique(TechniqueId),

    /// A buff id is not in the catalog.
    #[error("Unknown buff: {0}")]
    UnknownBuff(BuffId),

    /// Buff stat modifiers reference each other in a cycle.
    ///
    /// If `a` scales with `b`, `b` with `c` and `c` with `a`, the path is
    /// `[a, b, c, a]`.
    #[error("Modifier cycle detected: {}", format_cycle_path(.path))]
    ModifierCycle { path: Vec<StatId> },

    /// Catalog data could not be parsed.
    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl CraftError {
    /// Shorthand for an `ActionUnavailable` error.
    pub fn unavailable(technique: &TechniqueId, reason: Unavailability) -> Self {
        CraftError::ActionUnavailable {
            technique: technique.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CraftError::UnknownBuff(BuffId::from_str("focus"));
        assert!(err.to_string().contains("focus"));
    }

    #[test]
    fn test_unavailable_display() {
        let err = CraftError::unavailable(
            &TechniqueId::from_str("fusion"),
            Unavailability::OnCooldown(2),
        );
        let display = err.to_string();
        assert!(display.contains("fusion"));
        assert!(display.contains("cooldown for 2"));
    }

    #[test]
    fn test_cycle_error_display() {
        let a = StatId::from_str("A");
        let b = StatId::from_str("B");
        let err = CraftError::ModifierCycle {
            path: vec![a.clone(), b.clone(), a.clone()],
        };
        let display = err.to_string();
        assert!(display.contains("Modifier cycle detected"));
        assert!(display.contains("A -> B -> A"));
    }
}
