//! Advisor example: loading a catalog and playing a craft with recommendations
//!
//! This example demonstrates:
//! - Loading techniques and buffs from host JSON
//! - Configuring rules, drift and search depth
//! - Following the recommended plan turn by turn
//! - Reading the cost breakdown of a plan

use craftsage::cost::CostPhase;
use craftsage::*;

const CATALOG: &str = r#"{
    "buffs": [
        {
            "id": "focus",
            "stackable": true,
            "maxStacks": 3,
            "stats": [{"stat": "intensity", "op": "percent", "amount": {"baseValue": 20}}],
            "decay": {"perTurn": 1}
        }
    ],
    "techniques": [
        {
            "id": "fusion",
            "type": "fusion",
            "poolCost": 10,
            "stabilityCost": 2,
            "successChance": 0.9,
            "effects": [{"kind": "completion", "amount": {"statReference": {"id": "intensity"}}}]
        },
        {
            "id": "refine",
            "type": "refine",
            "poolCost": 8,
            "stabilityCost": 1,
            "effects": [{"kind": "perfection", "amount": {"statReference": {"id": "control", "multiplier": 0.8}}}]
        },
        {
            "id": "steady",
            "type": "stabilize",
            "poolCost": 6,
            "noMaxStabilityLoss": true,
            "effects": [{"kind": "stability", "amount": {"baseValue": 3}}]
        },
        {
            "id": "focus_up",
            "type": "support",
            "poolCost": 4,
            "cooldown": 3,
            "effects": [{"kind": "createBuff", "buff": "focus", "amount": {"baseValue": 2}}]
        }
    ]
}"#;

fn main() -> Result<()> {
    println!("=== Crafting Advisor Demo ===\n");

    let catalog = Catalog::from_json(CATALOG)?;
    let rules = CraftRules::new(60.0, 40.0).with_max_turns(12);
    let mut advisor = Advisor::new(catalog, rules)?
        .with_drift(DriftPolicy::Revert)
        .with_config(SearchConfig::default().with_depth(2))?;

    let mut state = CraftState::new(80.0, 10.0)
        .with_stat("intensity", 12.0)
        .with_stat("control", 10.0)
        .with_condition(Condition::Positive);

    loop {
        let Some(recommendation) = advisor.recommend(&state)? else {
            println!("\nNo further actions.");
            break;
        };
        let plan = &recommendation.best;

        println!(
            "Turn {:>2} | pool {:>5.1} | stability {:>4.1}/{:<4.1} | completion {:>5.1} | perfection {:>5.1}",
            state.turn,
            state.pool,
            state.stability,
            state.max_stability,
            state.completion,
            state.perfection
        );
        println!(
            "  → {} (score {:.2}, success {:.0}%, {} nodes)",
            plan.technique,
            plan.expected_score,
            plan.success_chance * 100.0,
            recommendation.nodes_visited
        );
        if let Some(buffed) = plan.cost.pool.after(CostPhase::Buffs) {
            println!(
                "    pool cost {:.2} (after buffs {:.2}), stability cost {:.2}",
                plan.cost.pool.value, buffed, plan.cost.stability.value
            );
        }
        for alternative in &recommendation.alternatives {
            println!(
                "    alt {} (score {:.2})",
                alternative.technique, alternative.expected_score
            );
        }

        // Follow the likely branch
        state = if plan.success_chance >= 0.5 {
            plan.success_state.clone()
        } else {
            plan.failure_state.clone()
        };
    }

    println!(
        "\nFinal: completion {:.1}, perfection {:.1}, after {} turns",
        state.completion, state.perfection, state.turn
    );
    Ok(())
}
