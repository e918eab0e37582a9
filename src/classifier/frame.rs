//! Ethernet and IPv4 header parsing.

use std::net::Ipv4Addr;

use thiserror::Error;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;
pub const IPV4_MIN_HEADER_LEN: usize = 20;

const ETHER_TYPE_OFFSET: usize = 12;
const IPV4_PROTOCOL_OFFSET: usize = 9;
const IPV4_SRC_OFFSET: usize = 12;
const IPV4_DST_OFFSET: usize = 16;

/// 802.1Q customer tag.
pub const ETH_TYPE_VLAN: u16 = 0x8100;
/// 802.1ad service tag.
pub const ETH_TYPE_QINQ: u16 = 0x88a8;

/// Errors raised on malformed frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{layer} header truncated: need {needed} bytes, got {got}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("expected IPv4, got IP version {0}")]
    BadIpVersion(u8),

    #[error("IPv4 header length {0} is below the minimum of 5 words")]
    BadHeaderLength(u8),
}

/// Parsed Ethernet header with VLAN tags skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    /// Ether-type of the innermost payload.
    pub ether_type: u16,
    /// Offset of the payload within the frame.
    pub payload_offset: usize,
    /// Number of VLAN tags that were skipped.
    pub vlan_tags: usize,
}

/// The IPv4 fields the controller decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub header_len: usize,
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_ipv4(bytes: &[u8], offset: usize) -> Ipv4Addr {
    let mut octets = [0u8; 4];
    octets.copy_from_slice(&bytes[offset..offset + 4]);
    Ipv4Addr::from(octets)
}

/// Parse the Ethernet header, stepping over any stacked VLAN tags.
pub fn parse_ethernet(frame: &[u8]) -> Result<EthernetHeader, ParseError> {
    if frame.len() < ETHERNET_HEADER_LEN {
        return Err(ParseError::Truncated {
            layer: "ethernet",
            needed: ETHERNET_HEADER_LEN,
            got: frame.len(),
        });
    }

    let mut ether_type = read_u16(frame, ETHER_TYPE_OFFSET);
    let mut payload_offset = ETHERNET_HEADER_LEN;
    let mut vlan_tags = 0;

    while ether_type == ETH_TYPE_VLAN || ether_type == ETH_TYPE_QINQ {
        let needed = payload_offset + VLAN_TAG_LEN;
        if frame.len() < needed {
            return Err(ParseError::Truncated {
                layer: "vlan",
                needed,
                got: frame.len(),
            });
        }
        // Tag control info occupies the first two bytes, inner ether-type the next two.
        ether_type = read_u16(frame, payload_offset + 2);
        payload_offset = needed;
        vlan_tags += 1;
    }

    Ok(EthernetHeader {
        ether_type,
        payload_offset,
        vlan_tags,
    })
}

/// Parse an IPv4 header at the start of `packet`.
pub fn parse_ipv4(packet: &[u8]) -> Result<Ipv4Header, ParseError> {
    if packet.len() < IPV4_MIN_HEADER_LEN {
        return Err(ParseError::Truncated {
            layer: "ipv4",
            needed: IPV4_MIN_HEADER_LEN,
            got: packet.len(),
        });
    }

    let version = packet[0] >> 4;
    if version != 4 {
        return Err(ParseError::BadIpVersion(version));
    }

    let ihl = packet[0] & 0x0f;
    if ihl < 5 {
        return Err(ParseError::BadHeaderLength(ihl));
    }

    let header_len = usize::from(ihl) * 4;
    if packet.len() < header_len {
        return Err(ParseError::Truncated {
            layer: "ipv4 options",
            needed: header_len,
            got: packet.len(),
        });
    }

    Ok(Ipv4Header {
        src: read_ipv4(packet, IPV4_SRC_OFFSET),
        dst: read_ipv4(packet, IPV4_DST_OFFSET),
        protocol: packet[IPV4_PROTOCOL_OFFSET],
        header_len,
    })
}
