//! Native-parity adapter.
//!
//! The host game may expose its own formula evaluator, availability check
//! and caps. The engine talks to them through the `ParityStrategy` trait,
//! which has two implementations selected once per session:
//!
//! - [`LocalModel`]: the locally modeled rules only.
//! - [`NativeAdapter`]: asks the host first, falls back to the local model
//!   when a capability is missing or the call fails, and records every
//!   disagreement between the two as a [`ParityDrift`].
//!
//! Drift is a quality signal for the caller, never an error.

use crate::catalog::Technique;
use crate::error::{CraftError, Result};
use crate::rules::CraftRules;
use crate::scaling::{evaluate, Scaling};
use crate::state::CraftState;
use crate::variables::VariableBag;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A host function the engine can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    FormulaEvaluator,
    AvailabilityPrecheck,
    CompletionCap,
    PerfectionCap,
    MaxToxicity,
}

/// Functions the host may provide.
///
/// Every method defaults to `NativeCapabilityUnavailable`, so a host only
/// implements what it actually has.
pub trait NativeHost {
    /// Whether the host provides a capability.
    fn supports(&self, capability: Capability) -> bool;

    fn evaluate(&self, _scaling: &Scaling, _variables: &VariableBag) -> Result<f64> {
        Err(CraftError::NativeCapabilityUnavailable(
            Capability::FormulaEvaluator,
        ))
    }

    fn can_use(&self, _technique: &Technique, _state: &CraftState) -> Result<bool> {
        Err(CraftError::NativeCapabilityUnavailable(
            Capability::AvailabilityPrecheck,
        ))
    }

    fn completion_cap(&self, _state: &CraftState) -> Result<f64> {
        Err(CraftError::NativeCapabilityUnavailable(
            Capability::CompletionCap,
        ))
    }

    fn perfection_cap(&self, _state: &CraftState) -> Result<f64> {
        Err(CraftError::NativeCapabilityUnavailable(
            Capability::PerfectionCap,
        ))
    }

    fn max_toxicity(&self) -> Result<f64> {
        Err(CraftError::NativeCapabilityUnavailable(Capability::MaxToxicity))
    }
}

/// The strategy interface the engine resolves formulas and limits through.
pub trait ParityStrategy {
    /// Evaluate a scaling.
    fn evaluate(&self, scaling: &Scaling, variables: &VariableBag) -> f64;

    /// Final availability of a technique, given the local verdict.
    fn precheck(&self, technique: &Technique, state: &CraftState, local: bool) -> bool;

    fn completion_cap(&self, state: &CraftState, rules: &CraftRules) -> f64;

    fn perfection_cap(&self, state: &CraftState, rules: &CraftRules) -> f64;

    fn max_toxicity(&self, rules: &CraftRules) -> Option<f64>;
}

/// Locally modeled rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalModel;

impl ParityStrategy for LocalModel {
    fn evaluate(&self, scaling: &Scaling, variables: &VariableBag) -> f64 {
        evaluate(scaling, variables)
    }

    fn precheck(&self, _technique: &Technique, _state: &CraftState, local: bool) -> bool {
        local
    }

    fn completion_cap(&self, _state: &CraftState, rules: &CraftRules) -> f64 {
        rules.completion_target
    }

    fn perfection_cap(&self, _state: &CraftState, rules: &CraftRules) -> f64 {
        rules.perfection_cap
    }

    fn max_toxicity(&self, rules: &CraftRules) -> Option<f64> {
        rules.max_toxicity
    }
}

/// Which side wins when native and local results disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParityPreference {
    #[default]
    Local,
    Native,
}

/// Adapter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParityConfig {
    #[serde(default)]
    pub prefer: ParityPreference,
}

/// A compared value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParityValue {
    Number(f64),
    Flag(bool),
}

/// One native/local disagreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityDrift {
    pub capability: Capability,
    /// What was being computed, for diagnosis.
    pub subject: String,
    pub native: ParityValue,
    pub local: ParityValue,
}

fn same(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

/// Host-delegating strategy with local fallback.
///
/// # Examples
///
/// ```rust
/// use craftsage::native::{Capability, NativeAdapter, NativeHost, ParityConfig, ParityStrategy};
/// use craftsage::{CraftRules, CraftState};
///
/// struct Host;
///
/// impl NativeHost for Host {
///     fn supports(&self, capability: Capability) -> bool {
///         capability == Capability::CompletionCap
///     }
///
///     fn completion_cap(&self, _state: &CraftState) -> craftsage::Result<f64> {
///         Ok(90.0)
///     }
/// }
///
/// let adapter = NativeAdapter::new(Host, ParityConfig::default());
/// let rules = CraftRules::new(100.0, 50.0);
/// let state = CraftState::new(10.0, 10.0);
///
/// // local wins by default, the disagreement is recorded
/// assert_eq!(adapter.completion_cap(&state, &rules), 100.0);
/// assert_eq!(adapter.drift_log().len(), 1);
/// assert!(!adapter.probe(Capability::FormulaEvaluator));
/// ```
pub struct NativeAdapter<H> {
    host: H,
    config: ParityConfig,
    probed: RefCell<BTreeMap<Capability, bool>>,
    drift: RefCell<Vec<ParityDrift>>,
}

impl<H: NativeHost> NativeAdapter<H> {
    pub fn new(host: H, config: ParityConfig) -> Self {
        Self {
            host,
            config,
            probed: RefCell::new(BTreeMap::new()),
            drift: RefCell::new(Vec::new()),
        }
    }

    /// Whether the host provides a capability. Asked once, then cached.
    pub fn probe(&self, capability: Capability) -> bool {
        if let Some(available) = self.probed.borrow().get(&capability) {
            return *available;
        }
        let available = self.host.supports(capability);
        debug!(?capability, available, "probed native capability");
        self.probed.borrow_mut().insert(capability, available);
        available
    }

    /// Call the host if it has the capability; `None` means use local.
    pub fn invoke<T>(&self, capability: Capability, call: impl FnOnce(&H) -> Result<T>) -> Option<T> {
        if !self.probe(capability) {
            return None;
        }
        match call(&self.host) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(?capability, error = %err, "native call failed, using local model");
                None
            }
        }
    }

    /// Disagreements recorded so far.
    pub fn drift_log(&self) -> Vec<ParityDrift> {
        self.drift.borrow().clone()
    }

    /// Drain the recorded disagreements.
    pub fn take_drift(&self) -> Vec<ParityDrift> {
        std::mem::take(&mut *self.drift.borrow_mut())
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    fn record(&self, capability: Capability, subject: String, native: ParityValue, local: ParityValue) {
        warn!(?capability, %subject, ?native, ?local, "native/local parity drift");
        self.drift.borrow_mut().push(ParityDrift {
            capability,
            subject,
            native,
            local,
        });
    }

    fn reconcile(&self, capability: Capability, subject: impl FnOnce() -> String, native: Option<f64>, local: f64) -> f64 {
        match native {
            Some(native) if !same(native, local) => {
                self.record(
                    capability,
                    subject(),
                    ParityValue::Number(native),
                    ParityValue::Number(local),
                );
                match self.config.prefer {
                    ParityPreference::Local => local,
                    ParityPreference::Native => native,
                }
            }
            Some(native) => native,
            None => local,
        }
    }
}

impl<H: NativeHost> ParityStrategy for NativeAdapter<H> {
    fn evaluate(&self, scaling: &Scaling, variables: &VariableBag) -> f64 {
        let local = evaluate(scaling, variables);
        let native = self.invoke(Capability::FormulaEvaluator, |host| {
            host.evaluate(scaling, variables)
        });
        self.reconcile(
            Capability::FormulaEvaluator,
            || format!("{:?}", scaling),
            native,
            local,
        )
    }

    fn precheck(&self, technique: &Technique, state: &CraftState, local: bool) -> bool {
        let Some(native) = self.invoke(Capability::AvailabilityPrecheck, |host| {
            host.can_use(technique, state)
        }) else {
            return local;
        };
        if native == local {
            return native;
        }
        self.record(
            Capability::AvailabilityPrecheck,
            technique.id.to_string(),
            ParityValue::Flag(native),
            ParityValue::Flag(local),
        );
        match self.config.prefer {
            ParityPreference::Local => local,
            ParityPreference::Native => native,
        }
    }

    fn completion_cap(&self, state: &CraftState, rules: &CraftRules) -> f64 {
        let native = self.invoke(Capability::CompletionCap, |host| host.completion_cap(state));
        self.reconcile(
            Capability::CompletionCap,
            || "completion cap".to_string(),
            native,
            rules.completion_target,
        )
    }

    fn perfection_cap(&self, state: &CraftState, rules: &CraftRules) -> f64 {
        let native = self.invoke(Capability::PerfectionCap, |host| host.perfection_cap(state));
        self.reconcile(
            Capability::PerfectionCap,
            || "perfection cap".to_string(),
            native,
            rules.perfection_cap,
        )
    }

    fn max_toxicity(&self, rules: &CraftRules) -> Option<f64> {
        let native = self.invoke(Capability::MaxToxicity, |host| host.max_toxicity());
        match (native, rules.max_toxicity) {
            (Some(native), Some(local)) => Some(self.reconcile(
                Capability::MaxToxicity,
                || "max toxicity".to_string(),
                Some(native),
                local,
            )),
            (Some(native), None) => Some(native),
            (None, local) => local,
        }
    }
}
