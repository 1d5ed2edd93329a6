// Copyright (c) 2025 - Cowboy AI, Inc.
//! Properties of the stage graph

use proptest::prelude::*;

use cim_perf_cluster::stage::{StageId, StagePlan};

proptest! {
    /// Every data-center plan is submittable in order
    #[test]
    fn prop_data_center_plan_is_acyclic(nodes in 1usize..32) {
        let plan = StagePlan::data_center(nodes);
        prop_assert!(plan.validate().is_ok());

        let node_stages = plan
            .stages()
            .filter(|stage| matches!(stage.id, StageId::Node(_)))
            .count();
        prop_assert_eq!(node_stages, nodes);
    }

    /// Nodes never await each other or the database
    #[test]
    fn prop_nodes_are_independent(nodes in 1usize..32) {
        let plan = StagePlan::data_center(nodes);
        for (awaiter, awaited) in plan.suspension_points() {
            if let StageId::Node(_) = awaiter {
                prop_assert!(!matches!(awaited, StageId::Node(_)));
                prop_assert_ne!(awaited, StageId::Database);
                prop_assert_ne!(awaited, StageId::DatabaseStart);
            }
        }
    }
}
