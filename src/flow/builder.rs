//! Flow rule builder.
//!
//! # Responsibilities
//! - Bootstrap rule sequence for a freshly activated switch
//! - Forward/reverse address-rewrite pair for a steering decision
//!
//! # Priorities
//! ```text
//!   20  steering pair (per client flow)
//!   10  proactive: dst = backend, src = backend → NORMAL
//!    0  table-miss → CONTROLLER, catch-all → NORMAL
//! ```

use std::net::Ipv4Addr;

use crate::config::BalancerConfig;
use crate::flow::rule::{FlowRule, SteeringDecision, SteeringPair};
use crate::load_balancer::BackendPool;
use crate::protocol::{FlowAction, FlowMatch, FlowTimeouts, OutputPort, PortNo};

/// Rule priorities by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priorities {
    pub table_miss: u16,
    pub proactive: u16,
    pub steering: u16,
}

impl Default for Priorities {
    fn default() -> Self {
        Self {
            table_miss: 0,
            proactive: 10,
            steering: 20,
        }
    }
}

/// Converts decisions into rule descriptors.
#[derive(Debug, Clone)]
pub struct FlowRuleBuilder {
    priorities: Priorities,
    steering_timeouts: FlowTimeouts,
    table_id: u8,
}

impl FlowRuleBuilder {
    pub fn new(priorities: Priorities, steering_timeouts: FlowTimeouts) -> Self {
        Self {
            priorities,
            steering_timeouts,
            table_id: 0,
        }
    }

    pub fn from_config(config: &BalancerConfig) -> Self {
        Self::new(
            Priorities {
                table_miss: config.table_miss_priority,
                proactive: config.proactive_priority,
                steering: config.steering_priority,
            },
            FlowTimeouts {
                idle_secs: config.steering_idle_timeout_secs,
                hard_secs: config.steering_hard_timeout_secs,
            },
        )
    }

    pub fn priorities(&self) -> Priorities {
        self.priorities
    }

    fn rule(&self, flow_match: FlowMatch, actions: Vec<FlowAction>, priority: u16) -> FlowRule {
        FlowRule {
            table_id: self.table_id,
            flow_match,
            actions,
            priority,
            timeouts: FlowTimeouts::permanent(),
            notify_removal: false,
        }
    }

    /// Bootstrap sequence: table-miss, proactive dst rules, proactive src
    /// rules, catch-all NORMAL.
    pub fn build_bootstrap(&self, pool: &BackendPool) -> Vec<FlowRule> {
        let normal = || vec![FlowAction::output(OutputPort::Normal)];
        let mut rules = Vec::with_capacity(2 + 2 * pool.len());

        rules.push(self.rule(
            FlowMatch::all(),
            vec![FlowAction::output(OutputPort::Controller {
                max_len: OutputPort::CONTROLLER_NO_BUFFER,
            })],
            self.priorities.table_miss,
        ));

        for address in pool.addresses() {
            rules.push(self.rule(
                FlowMatch::all().with_ipv4_dst(address),
                normal(),
                self.priorities.proactive,
            ));
        }

        for address in pool.addresses() {
            rules.push(self.rule(
                FlowMatch::all().with_ipv4_src(address),
                normal(),
                self.priorities.proactive,
            ));
        }

        rules.push(self.rule(FlowMatch::all(), normal(), self.priorities.table_miss));
        rules
    }

    /// Actions applied to client → target traffic.
    pub fn forward_actions(&self, backend: Ipv4Addr) -> Vec<FlowAction> {
        vec![
            FlowAction::SetIpv4Dst { address: backend },
            FlowAction::output(OutputPort::Normal),
        ]
    }

    /// Forward and reverse rewrite rules for one flow.
    pub fn build_steering_pair(
        &self,
        ingress_port: PortNo,
        client: Ipv4Addr,
        target: Ipv4Addr,
        backend: Ipv4Addr,
    ) -> SteeringPair {
        let forward = FlowRule {
            table_id: self.table_id,
            flow_match: FlowMatch::all()
                .with_in_port(ingress_port)
                .with_ipv4_src(client)
                .with_ipv4_dst(target),
            actions: self.forward_actions(backend),
            priority: self.priorities.steering,
            timeouts: self.steering_timeouts,
            notify_removal: true,
        };

        // Reply leaves on the port the client arrived on, bypassing L2 learning.
        let reverse = FlowRule {
            table_id: self.table_id,
            flow_match: FlowMatch::all().with_ipv4_src(backend).with_ipv4_dst(client),
            actions: vec![
                FlowAction::SetIpv4Src { address: target },
                FlowAction::output(OutputPort::Physical(ingress_port)),
            ],
            priority: self.priorities.steering,
            timeouts: self.steering_timeouts,
            notify_removal: true,
        };

        SteeringPair {
            decision: SteeringDecision {
                ingress_port,
                client,
                target,
                backend,
            },
            forward,
            reverse,
        }
    }
}

impl Default for FlowRuleBuilder {
    fn default() -> Self {
        Self::new(Priorities::default(), FlowTimeouts::permanent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::protocol::ETH_TYPE_IPV4;

    fn pool() -> BackendPool {
        BackendPool::from_config(&[
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 2), weight: 3 },
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 3), weight: 2 },
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 4), weight: 1 },
        ])
        .unwrap()
    }

    #[test]
    fn bootstrap_has_eight_rules_in_order() {
        let rules = FlowRuleBuilder::default().build_bootstrap(&pool());
        assert_eq!(rules.len(), 8);

        assert_eq!(rules[0].priority, 0);
        assert!(rules[0].flow_match.is_match_all());
        assert_eq!(
            rules[0].actions,
            vec![FlowAction::output(OutputPort::Controller { max_len: 0xffff })]
        );

        for (rule, last) in rules[1..4].iter().zip([2u8, 3, 4]) {
            assert_eq!(rule.priority, 10);
            assert_eq!(rule.flow_match.ipv4_dst, Some(Ipv4Addr::new(10, 0, 0, last)));
            assert_eq!(rule.flow_match.eth_type, Some(ETH_TYPE_IPV4));
        }
        for (rule, last) in rules[4..7].iter().zip([2u8, 3, 4]) {
            assert_eq!(rule.priority, 10);
            assert_eq!(rule.flow_match.ipv4_src, Some(Ipv4Addr::new(10, 0, 0, last)));
        }

        assert_eq!(rules[7].priority, 0);
        assert!(rules[7].flow_match.is_match_all());
        assert_eq!(rules[7].actions, vec![FlowAction::output(OutputPort::Normal)]);
    }

    #[test]
    fn steering_pair_rewrites_both_directions() {
        let client = Ipv4Addr::new(10, 0, 5, 9);
        let target = Ipv4Addr::new(10, 0, 0, 100);
        let backend = Ipv4Addr::new(10, 0, 0, 2);
        let pair = FlowRuleBuilder::default().build_steering_pair(3, client, target, backend);

        assert_eq!(pair.forward.priority, 20);
        assert_eq!(pair.forward.flow_match.in_port, Some(3));
        assert_eq!(pair.forward.flow_match.ipv4_src, Some(client));
        assert_eq!(pair.forward.flow_match.ipv4_dst, Some(target));
        assert_eq!(
            pair.forward.actions,
            vec![
                FlowAction::SetIpv4Dst { address: backend },
                FlowAction::output(OutputPort::Normal)
            ]
        );

        assert_eq!(pair.reverse.priority, 20);
        assert_eq!(pair.reverse.flow_match.in_port, None);
        assert_eq!(pair.reverse.flow_match.ipv4_src, Some(backend));
        assert_eq!(pair.reverse.flow_match.ipv4_dst, Some(client));
        assert_eq!(
            pair.reverse.actions,
            vec![
                FlowAction::SetIpv4Src { address: target },
                FlowAction::output(OutputPort::Physical(3))
            ]
        );
        assert!(pair.forward.timeouts.is_permanent());
    }

    #[test]
    fn only_steering_rules_request_removal_notices() {
        let builder = FlowRuleBuilder::default();
        let pair = builder.build_steering_pair(
            1,
            Ipv4Addr::new(10, 0, 5, 9),
            Ipv4Addr::new(10, 0, 0, 100),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        assert!(pair.forward.notify_removal);
        assert!(pair.reverse.notify_removal);
        assert!(builder.build_bootstrap(&pool()).iter().all(|r| !r.notify_removal));

        match pair.forward.install_message(crate::protocol::DatapathId(1)) {
            crate::protocol::ControllerMessage::FlowInstall { notify_removal, .. } => {
                assert!(notify_removal)
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn configured_timeouts_apply_to_steering_only() {
        let builder = FlowRuleBuilder::new(
            Priorities::default(),
            FlowTimeouts { idle_secs: 30, hard_secs: 0 },
        );
        let pair = builder.build_steering_pair(
            1,
            Ipv4Addr::new(10, 0, 5, 9),
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 3),
        );
        assert_eq!(pair.reverse.timeouts.idle_secs, 30);
        assert!(builder
            .build_bootstrap(&pool())
            .iter()
            .all(|r| r.timeouts.is_permanent()));
    }
}
