use craftsage::native::{Capability, ParityPreference, ParityValue};
use craftsage::*;
use std::cell::Cell;

/// A host whose cap disagrees with local rules and that refuses one
/// technique.
struct Host {
    calls: Cell<u32>,
}

impl Host {
    fn new() -> Self {
        Host {
            calls: Cell::new(0),
        }
    }
}

impl NativeHost for Host {
    fn supports(&self, capability: Capability) -> bool {
        matches!(
            capability,
            Capability::CompletionCap | Capability::AvailabilityPrecheck
        )
    }

    fn can_use(&self, technique: &Technique, _state: &CraftState) -> Result<bool> {
        self.calls.set(self.calls.get() + 1);
        Ok(technique.id.as_str() != "forbidden")
    }

    fn completion_cap(&self, _state: &CraftState) -> Result<f64> {
        Ok(40.0)
    }
}

fn catalog() -> Catalog {
    Catalog::new()
        .with_technique(
            Technique::new("forbidden", TechniqueType::Fusion)
                .with_effect(Effect::completion(Scaling::flat(30.0))),
        )
        .with_technique(
            Technique::new("allowed", TechniqueType::Fusion)
                .with_effect(Effect::completion(Scaling::flat(10.0))),
        )
}

fn advisor(prefer: ParityPreference) -> Advisor<NativeAdapter<Host>> {
    let adapter = NativeAdapter::new(Host::new(), ParityConfig { prefer });
    Advisor::with_model(catalog(), CraftRules::new(100.0, 100.0), adapter)
        .unwrap()
        .with_config(SearchConfig::default().with_depth(0))
        .unwrap()
}

/// Local rules win by default; disagreements are logged, not raised.
#[test]
fn test_local_preference_records_drift() {
    let mut advisor = advisor(ParityPreference::Local);
    let state = CraftState::new(10.0, 10.0);

    let best = advisor.recommend(&state).unwrap().unwrap().best.clone();
    assert_eq!(best.technique.as_str(), "forbidden");
    assert_eq!(best.success_state.completion, 30.0);

    let drift = advisor.model().drift_log();
    assert!(drift.iter().any(|d| d.capability == Capability::CompletionCap
        && d.native == ParityValue::Number(40.0)
        && d.local == ParityValue::Number(100.0)));
    assert!(drift.iter().any(|d| d.capability == Capability::AvailabilityPrecheck
        && d.subject == "forbidden"
        && d.native == ParityValue::Flag(false)));
    assert!(advisor.model().host().calls.get() > 0);
}

/// Preferring native results changes both legality and caps.
#[test]
fn test_native_preference_changes_outcome() {
    let mut advisor = advisor(ParityPreference::Native);
    let state = CraftState::new(10.0, 10.0);

    let recommendation = advisor.recommend(&state).unwrap().unwrap();
    assert_eq!(recommendation.best.technique.as_str(), "allowed");
    assert!(recommendation.alternatives.is_empty());

    // the native completion cap applies to the craft
    let mut state = CraftState::new(10.0, 10.0);
    state.completion = 35.0;
    let best = advisor.recommend(&state).unwrap().unwrap().best.clone();
    assert_eq!(best.success_state.completion, 40.0);
    assert_eq!(best.success_state.wasted_completion, 5.0);
}

/// Capabilities the host lacks fall back silently.
#[test]
fn test_missing_capabilities_fall_back() {
    let adapter = NativeAdapter::new(Host::new(), ParityConfig::default());
    let rules = CraftRules::new(100.0, 60.0).with_max_toxicity(8.0);
    let state = CraftState::new(10.0, 10.0);

    assert!(!adapter.probe(Capability::FormulaEvaluator));
    assert_eq!(
        adapter.evaluate(&Scaling::flat(3.0), &VariableBag::new()),
        3.0
    );
    assert_eq!(adapter.perfection_cap(&state, &rules), 60.0);
    assert_eq!(adapter.max_toxicity(&rules), Some(8.0));
    assert!(adapter.drift_log().is_empty());
}
