//! Property-based tests for paths, globs, policies and history.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chrono::Utc;
use proptest::prelude::*;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use waypoint::builder::StateBuilder;
use waypoint::core::{Glob, Path, StateNode, StateRegistry, TransitionHistory, TransitionRecord};
use waypoint::resolve::ResolvePolicy;
use waypoint::transition::{owned_params_equal, Reload, TreeChanges};
use waypoint::Params;

prop_compose! {
    fn segment()(index in 0..4usize) -> String {
        ["a", "b", "c", "d"][index].to_string()
    }
}

prop_compose! {
    fn state_name()(segments in prop::collection::vec(segment(), 1..5)) -> String {
        segments.join(".")
    }
}

prop_compose! {
    fn arbitrary_policy()(variant in 0..3u8) -> ResolvePolicy {
        match variant {
            0 => ResolvePolicy::Jit,
            1 => ResolvePolicy::Lazy,
            _ => ResolvePolicy::Eager,
        }
    }
}

/// Registry holding `name` and every ancestor of it.
fn register_chain(registry: &mut StateRegistry, name: &str) -> Arc<StateNode> {
    let segments: Vec<&str> = name.split('.').collect();
    for depth in 1..=segments.len() {
        let prefix = segments[..depth].join(".");
        if !registry.contains(&prefix) {
            registry
                .register(StateBuilder::new(prefix.clone()).param(format!("p{depth}")))
                .unwrap();
        }
    }
    registry.get(name).unwrap()
}

fn path_of(node: &Arc<StateNode>) -> Path {
    Path::from_states(&StateNode::path(node), ResolvePolicy::Jit)
}

fn record(from: &str, to: &str) -> TransitionRecord {
    TransitionRecord {
        id: Uuid::new_v4(),
        from: from.to_string(),
        to: to.to_string(),
        params: Params::new(),
        timestamp: Utc::now(),
    }
}

proptest! {
    #[test]
    fn literal_glob_matches_only_itself(name in state_name(), other in state_name()) {
        let glob = Glob::new(name.clone());
        prop_assert!(glob.matches(&name));
        prop_assert_eq!(glob.matches(&other), name == other);
    }

    #[test]
    fn double_star_matches_every_descendant(name in state_name(), suffix in state_name()) {
        let glob = Glob::new(format!("{name}.**"));
        let descendant = format!("{name}.{suffix}");
        prop_assert!(glob.matches(&descendant));
        prop_assert!(!glob.matches(&name));
    }

    #[test]
    fn single_star_matches_one_segment(name in state_name(), child in segment(), grandchild in segment()) {
        let glob = Glob::new(format!("{name}.*"));
        let child_name = format!("{name}.{child}");
        let grandchild_name = format!("{child_name}.{grandchild}");
        prop_assert!(glob.matches(&child_name));
        prop_assert!(!glob.matches(&grandchild_name));
    }

    #[test]
    fn policy_satisfaction_follows_ordinals(a in arbitrary_policy(), b in arbitrary_policy()) {
        prop_assert_eq!(a.satisfies(b), a.ordinal() >= b.ordinal());
        prop_assert!(a.satisfies(ResolvePolicy::Jit));
    }

    #[test]
    fn diff_partitions_both_paths(from_name in state_name(), to_name in state_name()) {
        let mut registry = StateRegistry::new();
        let from_node = register_chain(&mut registry, &from_name);
        let to_node = register_chain(&mut registry, &to_name);
        let from = path_of(&from_node);
        let to = path_of(&to_node);

        let changes = TreeChanges::compute(
            &from, &to, &Params::new(), &Params::new(), &owned_params_equal, &Reload::None,
        );

        // retained + reversed(exiting) is the source; retained + entering is the target
        let exited_in_order = changes.exiting.reversed();
        prop_assert_eq!(changes.retained.concat(&exited_in_order).names(), from.names());
        prop_assert_eq!(changes.retained.concat(&changes.entering).names(), to.names());

        // the keep prefix is maximal
        let keep = changes.keep();
        if keep < from.len() && keep < to.len() {
            prop_assert_ne!(
                from.element_at(keep).unwrap().state().name(),
                to.element_at(keep).unwrap().state().name()
            );
        }
        prop_assert_eq!(changes.is_identity(), from_name == to_name);
    }

    #[test]
    fn changed_param_stops_the_keep_prefix(name in state_name(), changed in 1..5usize) {
        let mut registry = StateRegistry::new();
        let node = register_chain(&mut registry, &name);
        let path = path_of(&node);
        let changed = changed.min(path.len() - 1);

        let mut before = Params::new();
        let mut after = Params::new();
        before.insert(format!("p{changed}"), json!(1));
        after.insert(format!("p{changed}"), json!(2));

        let changes = TreeChanges::compute(
            &path, &path, &before, &after, &owned_params_equal, &Reload::None,
        );
        prop_assert_eq!(changes.keep(), changed);
    }

    #[test]
    fn history_preserves_order(targets in prop::collection::vec(state_name(), 1..10)) {
        let mut history = TransitionHistory::new();
        let mut previous = String::new();
        for target in &targets {
            history = history.record(record(&previous, target));
            previous = target.clone();
        }

        let path = history.get_path();
        prop_assert_eq!(path.len(), targets.len() + 1);
        prop_assert_eq!(path[0], "");
        for (i, target) in targets.iter().enumerate() {
            prop_assert_eq!(path[i + 1], target.as_str());
        }
    }

    #[test]
    fn history_record_is_pure(from in state_name(), to in state_name()) {
        let history = TransitionHistory::new();
        let new_history = history.record(record(&from, &to));

        // Original history unchanged
        prop_assert_eq!(history.len(), 0);
        prop_assert_eq!(new_history.len(), 1);
    }

    #[test]
    fn history_roundtrip_serialization(targets in prop::collection::vec(state_name(), 0..5)) {
        let history = targets
            .iter()
            .fold(TransitionHistory::new(), |history, target| history.record(record("", target)));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: TransitionHistory = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(history, deserialized);
    }
}
