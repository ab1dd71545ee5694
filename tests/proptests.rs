//! Property tests for the parser/planner/runtime invariants.

mod common;

use common::*;
use proptest::prelude::*;
use stratsim::domain::parser::Parser;
use stratsim::domain::planner::{Plan, Planner, PlanOp};
use stratsim::domain::registry::build_registry;
use stratsim::domain::runtime::{EvalCtx, NanPolicy, Runtime};
use stratsim::domain::timeframe::Timeframe;
use stratsim::domain::token::Token;

fn sma_cmp_tokens(period: u32, op: &str, level: f64) -> Vec<Token> {
    vec![sma_token(period), Token::operator(op), Token::number(level)]
}

fn plan_of(tokens: &[Token]) -> Plan {
    let registry = build_registry();
    let parser = Parser::new(&registry);
    let pred = parser.parse_predicate(tokens).unwrap();
    Planner::new(Timeframe::M5).build(&pred).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn replanning_is_stable(period in 1u32..50, level in -1000.0f64..1000.0) {
        let tokens = sma_cmp_tokens(period, ">", level);
        let a = plan_of(&tokens);
        let b = plan_of(&tokens);
        prop_assert_eq!(a.root_id(), b.root_id());
    }

    #[test]
    fn duplicated_subexpression_plans_once(period in 1u32..50) {
        // SMA(p) > 10 AND SMA(p) < 90
        let mut tokens = sma_cmp_tokens(period, ">", 10.0);
        tokens.push(Token::logical("AND"));
        tokens.extend(sma_cmp_tokens(period, "<", 90.0));
        let plan = plan_of(&tokens);
        let indicators = plan
            .nodes
            .iter()
            .filter(|n| matches!(n.op, PlanOp::Indicator { .. }))
            .count();
        prop_assert_eq!(indicators, 1);
    }

    #[test]
    fn distinct_periods_plan_separately(a in 1u32..50, b in 51u32..100) {
        let mut tokens = sma_cmp_tokens(a, ">", 10.0);
        tokens.push(Token::logical("AND"));
        tokens.extend(sma_cmp_tokens(b, "<", 90.0));
        let plan = plan_of(&tokens);
        let indicators = plan
            .nodes
            .iter()
            .filter(|n| matches!(n.op, PlanOp::Indicator { .. }))
            .count();
        prop_assert_eq!(indicators, 2);
    }

    #[test]
    fn topological_order_respects_dependencies(
        period in 1u32..20,
        clause_count in 1usize..5,
    ) {
        let mut tokens = sma_cmp_tokens(period, ">", 0.0);
        for i in 1..clause_count {
            tokens.push(Token::logical(if i % 2 == 0 { "AND" } else { "OR" }));
            tokens.extend(sma_cmp_tokens(period + i as u32, "<", 100.0));
        }
        let plan = plan_of(&tokens);

        let mut rank = std::collections::HashMap::new();
        for (position, &idx) in plan.order.iter().enumerate() {
            prop_assert!(rank.insert(idx, position).is_none(), "node scheduled twice");
        }
        for &idx in &plan.order {
            for &dep in &plan.nodes[idx].deps {
                prop_assert!(rank[&dep] < rank[&idx]);
            }
        }
    }

    #[test]
    fn signal_length_always_matches_base(
        closes in prop::collection::vec(1.0f64..1000.0, 1..120),
        period in 1u32..30,
        level in 0.0f64..1000.0,
    ) {
        let provider = provider_5m(&closes);
        let registry = build_registry();
        let parser = Parser::new(&registry);
        let pred = parser
            .parse_predicate(&sma_cmp_tokens(period, ">", level))
            .unwrap();
        let plan = Planner::new(Timeframe::M5).build(&pred).unwrap();
        let mut ctx =
            EvalCtx::new("TEST", Timeframe::M5, &provider, NanPolicy::default()).unwrap();
        let out = Runtime::new(&mut ctx, &registry).exec_plan(&plan).unwrap();
        prop_assert_eq!(out.len(), closes.len());
    }

    #[test]
    fn nan_policy_toggle_complements_warmup_only(
        closes in prop::collection::vec(1.0f64..1000.0, 5..60),
    ) {
        // SMA(5) > 0 is true wherever the average is defined
        let tokens = sma_cmp_tokens(5, ">", 0.0);
        let registry = build_registry();
        let parser = Parser::new(&registry);
        let pred = parser.parse_predicate(&tokens).unwrap();
        let plan = Planner::new(Timeframe::M5).build(&pred).unwrap();

        let run = |nan_is_false: bool| {
            let provider = provider_5m(&closes);
            let mut ctx = EvalCtx::new(
                "TEST",
                Timeframe::M5,
                &provider,
                NanPolicy { nan_is_false },
            )
            .unwrap();
            Runtime::new(&mut ctx, &registry).exec_plan(&plan).unwrap()
        };
        let strict = run(true);
        let lax = run(false);
        for i in 0..closes.len() {
            if i < 4 {
                // NaN positions flip with the policy
                prop_assert!(!strict[i]);
                prop_assert!(lax[i]);
            } else {
                prop_assert_eq!(strict[i], lax[i]);
            }
        }
    }

    #[test]
    fn crosses_above_never_true_at_index_zero(
        closes in prop::collection::vec(1.0f64..1000.0, 1..50),
        level in 1.0f64..1000.0,
    ) {
        let tokens = vec![
            close_token(),
            Token::operator("crosses_above"),
            Token::number(level),
        ];
        let provider = provider_5m(&closes);
        let registry = build_registry();
        let parser = Parser::new(&registry);
        let pred = parser.parse_predicate(&tokens).unwrap();
        let plan = Planner::new(Timeframe::M5).build(&pred).unwrap();
        let mut ctx =
            EvalCtx::new("TEST", Timeframe::M5, &provider, NanPolicy::default()).unwrap();
        let out = Runtime::new(&mut ctx, &registry).exec_plan(&plan).unwrap();
        prop_assert!(!out[0]);
        for i in 1..closes.len() {
            let expected = closes[i - 1] <= level && closes[i] > level;
            prop_assert_eq!(out[i], expected);
        }
    }
}
