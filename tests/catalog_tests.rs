use craftsage::native::LocalModel;
use craftsage::*;

const CATALOG: &str = r#"{
    "buffs": [
        {
            "id": "focus",
            "stackable": true,
            "maxStacks": 5,
            "stats": [
                {"stat": "intensity", "op": "add", "amount": {"baseValue": 2}},
                {"stat": "pool_cost_percentage", "op": "add", "amount": {"baseValue": -12.5}}
            ],
            "decay": {"perTurn": 1}
        },
        {
            "id": "echo",
            "effects": {
                "always": [{"kind": "perfection", "amount": {"baseValue": 1}}],
                "onFusion": [{"kind": "addStack", "buff": "focus", "amount": {"baseValue": 1}}]
            },
            "decay": "onTrigger"
        }
    ],
    "techniques": [
        {
            "id": "fusion",
            "type": "fusion",
            "poolCost": 10,
            "stabilityCost": 2,
            "successChance": 0.75,
            "effects": [
                {"kind": "completion", "amount": {"baseValue": 5, "statReference": {"id": "intensity", "multiplier": 1.5}}}
            ],
            "masteryTier": 1,
            "mastery": [{"poolCost": {"add": -2}, "effectMultiplier": 2}]
        },
        {
            "id": "calm",
            "type": "stabilize",
            "poolCost": 6,
            "conditionRequirement": "negative",
            "noMaxStabilityLoss": true,
            "effects": [
                {"kind": "stability", "amount": {"baseValue": 4}},
                {"kind": "negate", "when": {"buffAtLeast": {"buff": "focus", "stacks": 3}}},
                {"kind": "consumeBuff", "buff": "focus", "amount": {"baseValue": 1}}
            ]
        }
    ]
}"#;

/// Load a catalog from host JSON.
#[test]
fn test_catalog_from_json() {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    assert_eq!(catalog.techniques().len(), 2);
    assert_eq!(catalog.buffs().count(), 2);

    let fusion = catalog.technique(&TechniqueId::from_str("fusion")).unwrap();
    assert_eq!(fusion.kind, TechniqueType::Fusion);
    assert_eq!(fusion.success_chance, 0.75);
    assert_eq!(fusion.effect_multiplier(), 2.0);

    let focus = catalog.buff(&BuffId::from_str("focus")).unwrap();
    assert_eq!(focus.max_stacks(), 5);
    assert_eq!(focus.decay, BuffDecay::PerTurn(1));

    let echo = catalog.buff(&BuffId::from_str("echo")).unwrap();
    assert_eq!(echo.max_stacks(), 1);
    assert_eq!(echo.triggered_effects(TechniqueType::Fusion).count(), 2);
    assert_eq!(echo.triggered_effects(TechniqueType::Refine).count(), 1);
}

/// Costs pass through every phase with the loaded data.
#[test]
fn test_loaded_costs_and_effects() {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    let rules = CraftRules::default().with_condition(
        Condition::Positive,
        ConditionModifiers {
            pool_cost: 1.5,
            stability_cost: 1.0,
        },
    );
    let drift = DriftPolicy::Static;
    let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);

    let state = CraftState::new(50.0, 10.0)
        .with_stat("intensity", 6.0)
        .with_condition(Condition::Positive)
        .with_buff("focus", 2)
        .with_buff("echo", 1);
    let fusion = catalog.technique(&TechniqueId::from_str("fusion")).unwrap();
    let resolved = resolve(fusion, &state, &ctx).unwrap();

    // 10 → x1.5 = 15 → -25% = 11.25 → -2 = 9.25
    assert_eq!(resolved.cost.pool.value, 9.25);
    assert_eq!(resolved.cost.pool.after(cost::CostPhase::Buffs), Some(11.25));
    assert_eq!(resolved.batch.len(), 3);

    let transition = step(fusion, &state, &ctx).unwrap();
    // intensity 6 + 2 * 2 = 10, so (5 + 15) * 2 = 40
    assert_eq!(transition.success.completion, 40.0);
    assert_eq!(transition.success.perfection, 1.0);
    assert_eq!(transition.failure.completion, 0.0);
    assert_eq!(transition.failure.perfection, 0.0);
    // echo grants a focus stack then burns out; focus then decays by one
    let focus = BuffId::from_str("focus");
    assert_eq!(transition.success.active_buffs.stacks(&focus), 2);
    assert!(!transition
        .success
        .active_buffs
        .contains(&BuffId::from_str("echo")));
}

/// A guarded negate stops the rest of the batch only when it holds.
#[test]
fn test_loaded_negate() {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    let rules = CraftRules::default();
    let drift = DriftPolicy::Static;
    let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
    let calm = catalog.technique(&TechniqueId::from_str("calm")).unwrap();
    let focus = BuffId::from_str("focus");

    let mut state = CraftState::new(50.0, 10.0)
        .with_condition(Condition::Negative)
        .with_buff("focus", 3);
    state.stability = 4.0;
    let next = step(calm, &state, &ctx).unwrap().success;
    assert_eq!(next.stability, 8.0);
    assert_eq!(next.max_stability, 10.0);
    // consume was negated; per-turn decay still applies
    assert_eq!(next.active_buffs.stacks(&focus), 2);

    let state = CraftState::new(50.0, 10.0)
        .with_condition(Condition::Negative)
        .with_buff("focus", 2);
    let next = step(calm, &state, &ctx).unwrap().success;
    assert_eq!(next.active_buffs.stacks(&focus), 0);
}

/// Condition requirements come through JSON.
#[test]
fn test_loaded_condition_requirement() {
    let catalog = Catalog::from_json(CATALOG).unwrap();
    let rules = CraftRules::default();
    let drift = DriftPolicy::Static;
    let ctx = CraftContext::new(&catalog, &rules, &LocalModel, &drift);
    let calm = catalog.technique(&TechniqueId::from_str("calm")).unwrap();

    let err = technique::check_legal(calm, &CraftState::new(50.0, 10.0), &ctx).unwrap_err();
    assert_eq!(
        err,
        CraftError::unavailable(&calm.id, Unavailability::ConditionMismatch)
    );
}

/// Broken catalogs are rejected at load time.
#[test]
fn test_catalog_rejections() {
    assert!(matches!(
        Catalog::from_json("{not json"),
        Err(CraftError::Catalog(_))
    ));

    let dangling = r#"{"techniques": [
        {"id": "x", "type": "support", "effects": [{"kind": "createBuff", "buff": "ghost", "amount": {"baseValue": 1}}]}
    ]}"#;
    assert_eq!(
        Catalog::from_json(dangling),
        Err(CraftError::UnknownBuff(BuffId::from_str("ghost")))
    );

    let cyclic = r#"{"buffs": [
        {"id": "a", "stats": [{"stat": "x", "op": "add", "amount": {"statReference": {"id": "y"}}}]},
        {"id": "b", "stats": [{"stat": "y", "op": "percent", "amount": {"statReference": {"id": "x"}}}]}
    ]}"#;
    match Catalog::from_json(cyclic) {
        Err(CraftError::ModifierCycle { path }) => {
            assert!(path.len() >= 3);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected a modifier cycle, got {:?}", other),
    }
}

/// Unknown effect kinds load and keep their name.
#[test]
fn test_unknown_effect_kind_round_trips() {
    let json = r#"{"techniques": [
        {"id": "x", "type": "support", "effects": [{"kind": "transmute"}]}
    ]}"#;
    let catalog = Catalog::from_json(json).unwrap();
    let effect = &catalog.techniques()[0].effects[0];
    assert_eq!(effect, &Effect::Unsupported("transmute".to_string()));
    assert_eq!(
        serde_json::to_string(effect).unwrap(),
        r#"{"kind":"transmute"}"#
    );
}

/// Rules and search settings load from JSON with documented defaults.
#[test]
fn test_configuration_from_json() {
    let rules = CraftRules::from_json(r#"{"completionTarget": 80, "maxToxicity": 12}"#).unwrap();
    assert_eq!(rules.completion_target, 80.0);
    assert_eq!(rules.max_toxicity, Some(12.0));

    let config = SearchConfig::from_json("{}").unwrap();
    assert_eq!(config, SearchConfig::default());
    assert!(matches!(
        SearchConfig::from_json(r#"{"depth": 12}"#),
        Err(CraftError::InvalidConfig(_))
    ));
}
