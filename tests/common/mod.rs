//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use sdn_balancer::config::{BackendConfig, BalancerConfig};
use sdn_balancer::controller::Controller;
use sdn_balancer::protocol::{ControllerMessage, DatapathId, ProtocolVersion};
use sdn_balancer::session::{ChannelClosed, SharedChannel, SwitchChannel};

pub const VIP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 100);
pub const CLIENT: Ipv4Addr = Ipv4Addr::new(10, 0, 5, 9);
pub const BACKEND_A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
pub const BACKEND_B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);
pub const BACKEND_C: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 4);

/// Switch channel that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    messages: Mutex<Vec<ControllerMessage>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<ControllerMessage> {
        std::mem::take(&mut *self.messages.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl SwitchChannel for RecordingChannel {
    fn send(&self, message: ControllerMessage) -> Result<(), ChannelClosed> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Switch channel that refuses messages matching a predicate and records the rest.
#[derive(Debug)]
pub struct FailingChannel {
    reject: fn(&ControllerMessage) -> bool,
    accepted: Mutex<Vec<ControllerMessage>>,
}

impl FailingChannel {
    pub fn new(reject: fn(&ControllerMessage) -> bool) -> Arc<Self> {
        Arc::new(Self {
            reject,
            accepted: Mutex::new(Vec::new()),
        })
    }

    pub fn take(&self) -> Vec<ControllerMessage> {
        std::mem::take(&mut *self.accepted.lock().unwrap())
    }
}

impl SwitchChannel for FailingChannel {
    fn send(&self, message: ControllerMessage) -> Result<(), ChannelClosed> {
        if (self.reject)(&message) {
            return Err(ChannelClosed);
        }
        self.accepted.lock().unwrap().push(message);
        Ok(())
    }
}

/// Default pool (10.0.0.2:3, 10.0.0.3:2, 10.0.0.4:1) behind [`VIP`].
pub fn balancer_config() -> BalancerConfig {
    BalancerConfig {
        virtual_address: Some(VIP),
        ..BalancerConfig::default()
    }
}

pub fn pool(entries: &[(Ipv4Addr, u32)]) -> Vec<BackendConfig> {
    entries
        .iter()
        .map(|(address, weight)| BackendConfig {
            address: *address,
            weight: *weight,
        })
        .collect()
}

pub fn controller() -> Controller {
    Controller::new(&balancer_config()).unwrap()
}

/// Connect `dpid` over a recording channel and discard the bootstrap rules.
pub fn connect(controller: &Controller, dpid: u64) -> Arc<RecordingChannel> {
    let recorder = RecordingChannel::new();
    let channel: SharedChannel = recorder.clone();
    controller
        .on_switch_connected(DatapathId(dpid), ProtocolVersion::V1_3, channel)
        .unwrap();
    recorder.take();
    recorder
}

pub fn ethernet_frame(ether_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01, 0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x02];
    frame.extend_from_slice(&ether_type.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

pub fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8) -> Vec<u8> {
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&20u16.to_be_bytes());
    packet[8] = 64;
    packet[9] = protocol;
    packet[12..16].copy_from_slice(&src.octets());
    packet[16..20].copy_from_slice(&dst.octets());
    packet
}

pub fn ipv4_frame(src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    ethernet_frame(0x0800, &ipv4_packet(src, dst, 6))
}

pub fn vlan_ipv4_frame(vlan: u16, src: Ipv4Addr, dst: Ipv4Addr) -> Vec<u8> {
    let mut payload = vlan.to_be_bytes().to_vec();
    payload.extend_from_slice(&0x0800u16.to_be_bytes());
    payload.extend_from_slice(&ipv4_packet(src, dst, 17));
    ethernet_frame(0x8100, &payload)
}

pub fn lldp_frame(payload: &[u8]) -> Vec<u8> {
    ethernet_frame(0x88cc, payload)
}

pub fn is_install(message: &ControllerMessage) -> bool {
    matches!(message, ControllerMessage::FlowInstall { .. })
}

pub fn is_packet_out(message: &ControllerMessage) -> bool {
    matches!(message, ControllerMessage::PacketOut { .. })
}
