// Copyright (c) 2025 - Cowboy AI, Inc.
//! Properties of cluster role resolution

use proptest::prelude::*;
use std::net::{IpAddr, Ipv4Addr};

use cim_perf_cluster::domain::{ClusterRole, Machine, NodeConfig};
use cim_perf_cluster::topology::ClusterTopology;
use cim_perf_cluster::{ErrorKind, ProvisioningError};

fn address(a: u8, b: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(10, 0, a, b))
}

fn application(i: u8) -> Machine {
    Machine::new(address(1, i), address(0, i)).with_tag(ClusterRole::ApplicationNode.tag())
}

fn database() -> Machine {
    Machine::new(address(3, 1), address(2, 1)).with_tag(ClusterRole::Database.tag())
}

/// `count` distinct application machines plus a database, shuffled
fn stack(count: usize) -> impl Strategy<Value = Vec<Machine>> {
    let mut machines: Vec<Machine> = (0..count as u8).map(application).collect();
    machines.push(database());
    Just(machines).prop_shuffle()
}

proptest! {
    /// Config i always binds to the i-th machine in address order
    #[test]
    fn prop_binding_ignores_enumeration_order(
        (count, machines) in (1usize..8).prop_flat_map(|n| (Just(n), stack(n)))
    ) {
        let configs = NodeConfig::numbered(count);
        let topology = ClusterTopology::resolve(&machines, &configs, &[ClusterRole::Database])
            .unwrap();

        prop_assert_eq!(topology.nodes.len(), count);
        for (i, node) in topology.nodes.iter().enumerate() {
            prop_assert_eq!(node.index, i);
            prop_assert_eq!(&node.config.name, &format!("jira-node-{}", i + 1));
            prop_assert_eq!(node.machine.private_address, address(0, i as u8));
        }
    }

    /// N ± 1 application machines for N configs never resolves
    #[test]
    fn prop_off_by_one_is_a_configuration_error(
        count in 1usize..8,
        extra in any::<bool>(),
    ) {
        let machines_count = if extra { count + 1 } else { count - 1 };
        let mut machines: Vec<Machine> = (0..machines_count as u8).map(application).collect();
        machines.push(database());

        let result = ClusterTopology::resolve(
            &machines,
            &NodeConfig::numbered(count),
            &[ClusterRole::Database],
        );

        prop_assert!(matches!(result, Err(ProvisioningError::Configuration(_))));
    }

    /// A singleton role played by zero or several machines never resolves
    #[test]
    fn prop_singleton_roles_need_exactly_one_machine(databases in 0usize..4) {
        prop_assume!(databases != 1);
        let mut machines = vec![application(0)];
        machines.extend((0..databases as u8).map(|i| {
            Machine::new(address(3, i), address(2, i)).with_tag(ClusterRole::Database.tag())
        }));

        let error = ClusterTopology::resolve(
            &machines,
            &NodeConfig::numbered(1),
            &[ClusterRole::Database],
        )
        .unwrap_err();

        prop_assert_eq!(error.kind(), ErrorKind::Configuration);
    }
}
