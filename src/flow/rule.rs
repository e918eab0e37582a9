//! Rule descriptors and flow keys.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::protocol::{ControllerMessage, DatapathId, FlowAction, FlowMatch, FlowTimeouts, PortNo};

/// One match/action rule destined for a switch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRule {
    pub table_id: u8,
    pub flow_match: FlowMatch,
    pub actions: Vec<FlowAction>,
    pub priority: u16,
    pub timeouts: FlowTimeouts,
    /// Ask the switch to report the rule's removal.
    #[serde(default)]
    pub notify_removal: bool,
}

impl FlowRule {
    pub fn install_message(&self, datapath_id: DatapathId) -> ControllerMessage {
        ControllerMessage::FlowInstall {
            datapath_id,
            table_id: self.table_id,
            flow_match: self.flow_match,
            actions: self.actions.clone(),
            priority: self.priority,
            timeouts: self.timeouts,
            notify_removal: self.notify_removal,
        }
    }

    pub fn withdraw_message(&self, datapath_id: DatapathId) -> ControllerMessage {
        ControllerMessage::FlowWithdraw {
            datapath_id,
            table_id: self.table_id,
            flow_match: self.flow_match,
            priority: self.priority,
        }
    }
}

/// Direction of a steering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Client → target, destination rewritten to the backend.
    Forward,
    /// Backend → client, source rewritten back to the target.
    Reverse,
}

/// Identifies one directional steering rule on a switch.
///
/// `address` is the address the client targeted for `Forward` keys and the
/// chosen backend for `Reverse` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    pub client: Ipv4Addr,
    pub address: Ipv4Addr,
    pub direction: Direction,
}

impl FlowKey {
    pub fn forward(client: Ipv4Addr, target: Ipv4Addr) -> Self {
        Self {
            client,
            address: target,
            direction: Direction::Forward,
        }
    }

    pub fn reverse(client: Ipv4Addr, backend: Ipv4Addr) -> Self {
        Self {
            client,
            address: backend,
            direction: Direction::Reverse,
        }
    }
}

/// Result of a load-balancing decision for one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringDecision {
    pub ingress_port: PortNo,
    pub client: Ipv4Addr,
    /// The address the client sent to (virtual address or pool member).
    pub target: Ipv4Addr,
    pub backend: Ipv4Addr,
}

impl SteeringDecision {
    pub fn forward_key(&self) -> FlowKey {
        FlowKey::forward(self.client, self.target)
    }

    pub fn reverse_key(&self) -> FlowKey {
        FlowKey::reverse(self.client, self.backend)
    }
}

/// Forward and reverse rules for one decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteeringPair {
    pub decision: SteeringDecision,
    pub forward: FlowRule,
    pub reverse: FlowRule,
}

impl SteeringPair {
    pub fn forward_key(&self) -> FlowKey {
        self.decision.forward_key()
    }

    pub fn reverse_key(&self) -> FlowKey {
        self.decision.reverse_key()
    }
}
