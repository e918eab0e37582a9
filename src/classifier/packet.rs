//! Packet classifier.

use std::net::Ipv4Addr;

use crate::classifier::frame::{parse_ethernet, parse_ipv4, ParseError};
use crate::protocol::{PortNo, ETH_TYPE_IPV4};

/// Link-layer discovery protocol.
pub const ETH_TYPE_LLDP: u16 = 0x88cc;
/// Broadcast domain discovery protocol.
pub const ETH_TYPE_BDDP: u16 = 0x8942;

/// Why a frame was not handed to the steering path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Infrastructure discovery/control traffic. Never forwarded.
    Discovery { ether_type: u16 },
    /// No IPv4 payload, so no L3 decision is possible.
    NonIpv4 { ether_type: u16 },
}

/// Header fields of an actionable IPv4 packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedPacket {
    pub ingress_port: PortNo,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub ip_protocol: u8,
}

/// Classifier verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Packet(ClassifiedPacket),
    Ignored(IgnoreReason),
}

impl Classification {
    pub fn is_ignored(&self) -> bool {
        matches!(self, Classification::Ignored(_))
    }
}

/// Turns raw frames into [`Classification`]s.
#[derive(Debug, Clone)]
pub struct PacketClassifier {
    reserved_ether_types: Vec<u16>,
}

impl PacketClassifier {
    pub fn new() -> Self {
        Self {
            reserved_ether_types: vec![ETH_TYPE_LLDP, ETH_TYPE_BDDP],
        }
    }

    /// Whether `ether_type` belongs to infrastructure discovery traffic.
    pub fn is_reserved(&self, ether_type: u16) -> bool {
        self.reserved_ether_types.contains(&ether_type)
    }

    /// Classify a frame received on `ingress_port`.
    pub fn classify(
        &self,
        ingress_port: PortNo,
        frame: &[u8],
    ) -> Result<Classification, ParseError> {
        let ethernet = parse_ethernet(frame)?;

        if self.is_reserved(ethernet.ether_type) {
            return Ok(Classification::Ignored(IgnoreReason::Discovery {
                ether_type: ethernet.ether_type,
            }));
        }

        if ethernet.ether_type != ETH_TYPE_IPV4 {
            return Ok(Classification::Ignored(IgnoreReason::NonIpv4 {
                ether_type: ethernet.ether_type,
            }));
        }

        let ip = parse_ipv4(&frame[ethernet.payload_offset..])?;
        Ok(Classification::Packet(ClassifiedPacket {
            ingress_port,
            src: ip.src,
            dst: ip.dst,
            ip_protocol: ip.protocol,
        }))
    }
}

impl Default for PacketClassifier {
    fn default() -> Self {
        Self::new()
    }
}
