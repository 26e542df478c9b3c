//! Session-level advisor.
//!
//! An `Advisor` owns everything a session needs (catalog, rules, parity
//! strategy, drift policy, search configuration) and serializes
//! invocations. Rapid state changes can start a new search before an older
//! one is delivered; only the result of the latest invocation is accepted,
//! older ones are discarded.
//!
//! ```text
//! begin() → Ticket ─ run(ticket, state) → result ─ complete(ticket, result)
//!                                                   └─ stale ticket: dropped
//! ```

use crate::catalog::Catalog;
use crate::context::CraftContext;
use crate::error::Result;
use crate::native::{LocalModel, ParityStrategy};
use crate::rules::{ConditionDrift, CraftRules, DriftPolicy};
use crate::search::{recommend, Recommendation, SearchConfig};
use crate::state::CraftState;
use std::fmt;
use tracing::{debug, info};

/// Identifies one invocation. Later tickets compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recommendation session.
///
/// # Examples
///
/// ```rust
/// use craftsage::advisor::Advisor;
/// use craftsage::*;
///
/// let catalog = Catalog::new().with_technique(
///     Technique::new("press", TechniqueType::Fusion)
///         .with_pool_cost(5.0)
///         .with_effect(Effect::completion(Scaling::flat(10.0))),
/// );
/// let mut advisor = Advisor::new(catalog, CraftRules::default()).unwrap();
///
/// let state = CraftState::new(20.0, 10.0);
/// let first = advisor.begin();
/// let second = advisor.begin();
///
/// let stale = advisor.run(first, &state).unwrap();
/// assert!(advisor.complete(first, stale).is_none());
///
/// let fresh = advisor.run(second, &state).unwrap();
/// let accepted = advisor.complete(second, fresh).unwrap();
/// assert_eq!(accepted.best.technique.as_str(), "press");
/// ```
pub struct Advisor<M = LocalModel> {
    catalog: Catalog,
    rules: CraftRules,
    model: M,
    drift: Box<dyn ConditionDrift>,
    config: SearchConfig,
    issued: u64,
    latest: Option<Recommendation>,
}

impl Advisor<LocalModel> {
    /// A session using the local model and the reverting drift policy.
    pub fn new(catalog: Catalog, rules: CraftRules) -> Result<Self> {
        Advisor::with_model(catalog, rules, LocalModel)
    }
}

impl<M: ParityStrategy> Advisor<M> {
    /// A session with an explicit parity strategy.
    pub fn with_model(catalog: Catalog, rules: CraftRules, model: M) -> Result<Self> {
        catalog.validate()?;
        rules.validate()?;
        Ok(Self {
            catalog,
            rules,
            model,
            drift: Box::new(DriftPolicy::default()),
            config: SearchConfig::default(),
            issued: 0,
            latest: None,
        })
    }

    /// Replace the drift policy.
    pub fn with_drift(mut self, drift: impl ConditionDrift + 'static) -> Self {
        self.drift = Box::new(drift);
        self
    }

    /// Replace the search configuration.
    pub fn with_config(mut self, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Swap the catalog. Results already in flight become stale.
    pub fn set_catalog(&mut self, catalog: Catalog) -> Result<()> {
        catalog.validate()?;
        self.catalog = catalog;
        self.latest = None;
        self.issued += 1;
        Ok(())
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn rules(&self) -> &CraftRules {
        &self.rules
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The parity strategy, e.g. to read a native adapter's drift log.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Start an invocation. Supersedes every earlier ticket.
    pub fn begin(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Whether a ticket is still the latest one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }

    /// Search from `state` on behalf of `ticket`.
    pub fn run(&self, ticket: Ticket, state: &CraftState) -> Result<Option<Recommendation>> {
        debug!("running search for ticket {}", ticket);
        let ctx = CraftContext::new(&self.catalog, &self.rules, &self.model, self.drift.as_ref());
        recommend(state, &ctx, &self.config)
    }

    /// Deliver a result. Accepted only when `ticket` is still the latest;
    /// a stale result is dropped and `None` returned.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        result: Option<Recommendation>,
    ) -> Option<&Recommendation> {
        if !self.is_current(ticket) {
            info!(
                "discarding result for superseded ticket {} (latest is #{})",
                ticket, self.issued
            );
            return None;
        }
        self.latest = result;
        self.latest.as_ref()
    }

    /// Begin, run and complete in one call.
    ///
    /// A failed search clears the latest recommendation, so nothing from an
    /// earlier state stays on display.
    pub fn recommend(&mut self, state: &CraftState) -> Result<Option<&Recommendation>> {
        let ticket = self.begin();
        match self.run(ticket, state) {
            Ok(result) => Ok(self.complete(ticket, result)),
            Err(err) => {
                if self.is_current(ticket) {
                    self.latest = None;
                }
                Err(err)
            }
        }
    }

    /// The last accepted recommendation.
    pub fn latest(&self) -> Option<&Recommendation> {
        self.latest.as_ref()
    }
}
