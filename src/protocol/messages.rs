//! Inbound events and outbound instructions exchanged with switches.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::protocol::version::ProtocolVersion;

/// Ether-type carried by IPv4 frames.
pub const ETH_TYPE_IPV4: u16 = 0x0800;

/// Switch port number as reported in packet-in events.
pub type PortNo = u32;

/// Forwarding-engine identity of a switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(pub u64);

impl From<u64> for DatapathId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Switch-side packet buffer reference.
///
/// `NO_BUFFER` means the switch kept no copy and the frame travels with the
/// event; any other value points at a buffer the switch still holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BufferId(pub u32);

impl BufferId {
    pub const NO_BUFFER: BufferId = BufferId(0xffff_ffff);

    pub fn is_buffered(&self) -> bool {
        *self != Self::NO_BUFFER
    }
}

impl Default for BufferId {
    fn default() -> Self {
        Self::NO_BUFFER
    }
}

/// Output destinations understood by the switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "port", content = "value", rename_all = "snake_case")]
pub enum OutputPort {
    /// A physical switch port.
    Physical(PortNo),
    /// Hand the packet to the switch's regular L2/L3 pipeline.
    Normal,
    /// Every port except the ingress port.
    Flood,
    /// Punt to the controller. `max_len` of `0xffff` asks for the full frame.
    Controller { max_len: u16 },
}

impl OutputPort {
    /// Controller max length meaning "send the whole frame, do not buffer".
    pub const CONTROLLER_NO_BUFFER: u16 = 0xffff;
}

/// One action of a rule's ordered action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowAction {
    SetIpv4Src { address: Ipv4Addr },
    SetIpv4Dst { address: Ipv4Addr },
    Output { port: OutputPort },
}

impl FlowAction {
    pub fn output(port: OutputPort) -> Self {
        FlowAction::Output { port }
    }
}

/// Match predicate. `None` fields are wildcards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowMatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_src: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl FlowMatch {
    /// Match-all predicate.
    pub fn all() -> Self {
        Self::default()
    }

    /// IPv4 traffic, no further constraints.
    pub fn ipv4() -> Self {
        Self {
            eth_type: Some(ETH_TYPE_IPV4),
            ..Self::default()
        }
    }

    pub fn with_in_port(mut self, port: PortNo) -> Self {
        self.in_port = Some(port);
        self
    }

    pub fn with_ipv4_src(mut self, address: Ipv4Addr) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV4);
        self.ipv4_src = Some(address);
        self
    }

    pub fn with_ipv4_dst(mut self, address: Ipv4Addr) -> Self {
        self.eth_type = Some(ETH_TYPE_IPV4);
        self.ipv4_dst = Some(address);
        self
    }

    pub fn is_match_all(&self) -> bool {
        *self == Self::default()
    }
}

/// Rule expiry in seconds. Zero disables the respective timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowTimeouts {
    pub idle_secs: u16,
    pub hard_secs: u16,
}

impl FlowTimeouts {
    /// Never expires.
    pub fn permanent() -> Self {
        Self::default()
    }

    pub fn is_permanent(&self) -> bool {
        self.idle_secs == 0 && self.hard_secs == 0
    }
}

/// Event delivered by a switch (through whatever transport is in use).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchEvent {
    SwitchConnected {
        datapath_id: DatapathId,
        protocol_version: ProtocolVersion,
    },
    PacketIn {
        datapath_id: DatapathId,
        ingress_port: PortNo,
        #[serde(default)]
        buffer_id: BufferId,
        raw_frame: Vec<u8>,
    },
    SwitchDisconnected {
        datapath_id: DatapathId,
    },
    /// The switch expired or evicted a rule.
    FlowRemoved {
        datapath_id: DatapathId,
        flow_match: FlowMatch,
    },
    /// The switch refused a rule install.
    FlowRejected {
        datapath_id: DatapathId,
        flow_match: FlowMatch,
    },
}

impl SwitchEvent {
    pub fn datapath_id(&self) -> DatapathId {
        match self {
            SwitchEvent::SwitchConnected { datapath_id, .. }
            | SwitchEvent::PacketIn { datapath_id, .. }
            | SwitchEvent::SwitchDisconnected { datapath_id }
            | SwitchEvent::FlowRemoved { datapath_id, .. }
            | SwitchEvent::FlowRejected { datapath_id, .. } => *datapath_id,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            SwitchEvent::SwitchConnected { .. } => EventKind::SwitchConnected,
            SwitchEvent::PacketIn { .. } => EventKind::PacketIn,
            SwitchEvent::SwitchDisconnected { .. } => EventKind::SwitchDisconnected,
            SwitchEvent::FlowRemoved { .. } => EventKind::FlowRemoved,
            SwitchEvent::FlowRejected { .. } => EventKind::FlowRejected,
        }
    }
}

/// Tag used to key the controller's dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SwitchConnected,
    PacketIn,
    SwitchDisconnected,
    FlowRemoved,
    FlowRejected,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::SwitchConnected,
        EventKind::PacketIn,
        EventKind::SwitchDisconnected,
        EventKind::FlowRemoved,
        EventKind::FlowRejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SwitchConnected => "switch_connected",
            EventKind::PacketIn => "packet_in",
            EventKind::SwitchDisconnected => "switch_disconnected",
            EventKind::FlowRemoved => "flow_removed",
            EventKind::FlowRejected => "flow_rejected",
        }
    }
}

/// Instruction produced by the controller for one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerMessage {
    FlowInstall {
        datapath_id: DatapathId,
        table_id: u8,
        flow_match: FlowMatch,
        actions: Vec<FlowAction>,
        priority: u16,
        timeouts: FlowTimeouts,
        /// Switch sends `FlowRemoved` when the rule times out or is evicted.
        #[serde(default)]
        notify_removal: bool,
    },
    /// Strict delete: only the rule with exactly this match and priority.
    FlowWithdraw {
        datapath_id: DatapathId,
        table_id: u8,
        flow_match: FlowMatch,
        priority: u16,
    },
    PacketOut {
        datapath_id: DatapathId,
        buffer_id: BufferId,
        in_port: PortNo,
        actions: Vec<FlowAction>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Vec<u8>>,
    },
}

impl ControllerMessage {
    pub fn datapath_id(&self) -> DatapathId {
        match self {
            ControllerMessage::FlowInstall { datapath_id, .. }
            | ControllerMessage::FlowWithdraw { datapath_id, .. }
            | ControllerMessage::PacketOut { datapath_id, .. } => *datapath_id,
        }
    }

    /// Builds a packet-out, attaching the frame only when the switch holds no
    /// buffered copy of it.
    pub fn packet_out(
        datapath_id: DatapathId,
        buffer_id: BufferId,
        in_port: PortNo,
        actions: Vec<FlowAction>,
        raw_frame: &[u8],
    ) -> Self {
        let data = if buffer_id.is_buffered() {
            None
        } else {
            Some(raw_frame.to_vec())
        };
        ControllerMessage::PacketOut {
            datapath_id,
            buffer_id,
            in_port,
            actions,
            data,
        }
    }
}
