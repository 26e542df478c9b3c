//! # craftsage - Deterministic Expected-Value Crafting Advisor
//!
//! An advisor engine for turn-based crafting minigames that provides:
//! - **Deterministic** recommendations (same input → same output)
//! - **Explicit** stochastic branching (success and failure are both simulated)
//! - **Data-driven** techniques, buffs and effects (no hardcoded content)
//! - **Parity-aware** formula evaluation with optional host delegation
//!
//! ## Core Concepts
//!
//! ### Advisor Pipeline
//!
//! A recommendation flows through a simple pipeline:
//!
//! ```text
//! [CraftState] → [Technique resolver] → [Transition] → [Search] → [Recommendation]
//! ```
//!
//! 1. **Technique resolver** decides legality, finalizes costs and success
//!    chance, and collects the effect batch
//! 2. **Transition engine** produces the success and failure states
//! 3. **Search** takes the expectation over both branches, several plies deep
//! 4. **Recommendation** carries the best plan and ranked alternatives
//!
//! ### Key Features
//!
//! - **Stat Modifiers**: Buff modifiers resolve in dependency order
//! - **Cycle Detection**: Catalogs with circular modifiers are rejected
//! - **Phased Costs**: Condition, buff and mastery adjustments in a fixed order
//! - **Native Parity**: Host functions are probed once and cross-checked
//! - **Superseding**: Stale advisor results are discarded, never merged
//!
//! ## Example
//!
//! ```rust
//! use craftsage::*;
//!
//! let catalog = Catalog::new()
//!     .with_technique(
//!         Technique::new("simple_fusion", TechniqueType::Fusion)
//!             .with_pool_cost(10.0)
//!             .with_stability_cost(2.0)
//!             .with_effect(Effect::completion(Scaling::flat(15.0))),
//!     )
//!     .with_technique(
//!         Technique::new("risky_fusion", TechniqueType::Fusion)
//!             .with_pool_cost(10.0)
//!             .with_success_chance(0.5)
//!             .with_effect(Effect::completion(Scaling::flat(20.0))),
//!     );
//!
//! let mut advisor = Advisor::new(catalog, CraftRules::default()).unwrap();
//! let state = CraftState::new(20.0, 5.0);
//!
//! let recommendation = advisor.recommend(&state).unwrap().unwrap();
//! assert_eq!(recommendation.best.technique.as_str(), "simple_fusion");
//! assert_eq!(recommendation.alternatives.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`ids`] - Identifier types
//! - [`variables`] - Variable bag formulas read from
//! - [`scaling`] - Formula evaluator
//! - [`graph`] - Modifier dependency graph
//! - [`stats`] - Stat sheet resolution
//! - [`state`] - Craft state snapshot
//! - [`catalog`] - Technique and buff definitions
//! - [`effect`] - Effect resolver
//! - [`cost`] - Finalized costs
//! - [`rules`] - Craft rules and condition drift
//! - [`context`] - Read-only session context
//! - [`technique`] - Technique resolver
//! - [`transition`] - State transition engine
//! - [`native`] - Native-parity adapter
//! - [`search`] - Expected-value search
//! - [`advisor`] - Session-level advisor
//! - [`error`] - Error types

pub mod advisor;
pub mod catalog;
pub mod context;
pub mod cost;
pub mod effect;
pub mod error;
pub mod graph;
pub mod ids;
pub mod native;
pub mod rules;
pub mod scaling;
pub mod search;
pub mod state;
pub mod stats;
pub mod technique;
pub mod transition;
pub mod variables;

// Re-export main types for convenience
pub use advisor::{Advisor, Ticket};
pub use context::CraftContext;
pub use error::{CraftError, Result, Unavailability};
pub use ids::{BuffId, StatId, TechniqueId};
pub use search::{recommend, ActionPlan, Recommendation, ScoringWeights, SearchConfig};
pub use state::{ActiveBuffs, Condition, CraftOutcome, CraftState};
pub use stats::StatSheet;
pub use variables::VariableBag;

// Re-export definitions
pub use catalog::{
    Buff, BuffCost, BuffDecay, BuffTrigger, Catalog, MasteryTier, ModifierOp, StatModifier,
    Technique, TechniqueType, TierAdjust,
};
pub use effect::{Effect, EffectCondition};
pub use rules::{ConditionDrift, ConditionModifiers, CraftRules, DriftPolicy};
pub use scaling::{evaluate, Scaling, Term};

// Re-export the resolution pipeline
pub use native::{LocalModel, NativeAdapter, NativeHost, ParityConfig, ParityStrategy};
pub use technique::{legal_actions, resolve, ResolvedTechnique};
pub use transition::{step, Transition};
