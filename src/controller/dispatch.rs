//! Explicit event dispatch table.
//!
//! Maps each [`EventKind`] to the controller method that handles it. The
//! table is built once when the controller is constructed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::controller::event_loop::{Controller, EventOutcome};
use crate::error::{ControllerError, Result};
use crate::protocol::{EventKind, SwitchEvent};
use crate::session::SharedChannel;

/// Handler invoked for one event. The channel is the outbound path of the
/// connection the event arrived on.
pub type EventHandler = fn(&Controller, &SharedChannel, SwitchEvent) -> Result<EventOutcome>;

/// Event kind → handler.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<EventKind, EventHandler>,
}

impl DispatchTable {
    /// An empty table. Every lookup misses.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The table the controller runs with: one handler per event kind.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(EventKind::SwitchConnected, handle_switch_connected);
        table.register(EventKind::PacketIn, handle_packet_in);
        table.register(EventKind::SwitchDisconnected, handle_switch_disconnected);
        table.register(EventKind::FlowRemoved, handle_flow_removed);
        table.register(EventKind::FlowRejected, handle_flow_rejected);
        table
    }

    /// Bind `handler` to `kind`, replacing any previous binding.
    pub fn register(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.insert(kind, handler);
    }

    pub fn handler(&self, kind: EventKind) -> Option<EventHandler> {
        self.handlers.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.handlers.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("DispatchTable").field("kinds", &kinds).finish()
    }
}

fn mismatched(event: &SwitchEvent) -> ControllerError {
    ControllerError::UnhandledEvent { kind: event.kind() }
}

fn handle_switch_connected(
    controller: &Controller,
    channel: &SharedChannel,
    event: SwitchEvent,
) -> Result<EventOutcome> {
    match event {
        SwitchEvent::SwitchConnected {
            datapath_id,
            protocol_version,
        } => controller.on_switch_connected(datapath_id, protocol_version, Arc::clone(channel)),
        other => Err(mismatched(&other)),
    }
}

fn handle_packet_in(
    controller: &Controller,
    _channel: &SharedChannel,
    event: SwitchEvent,
) -> Result<EventOutcome> {
    match event {
        SwitchEvent::PacketIn {
            datapath_id,
            ingress_port,
            buffer_id,
            raw_frame,
        } => controller.on_packet_in(datapath_id, ingress_port, buffer_id, &raw_frame),
        other => Err(mismatched(&other)),
    }
}

fn handle_switch_disconnected(
    controller: &Controller,
    _channel: &SharedChannel,
    event: SwitchEvent,
) -> Result<EventOutcome> {
    match event {
        SwitchEvent::SwitchDisconnected { datapath_id } => {
            controller.on_switch_disconnected(datapath_id)
        }
        other => Err(mismatched(&other)),
    }
}

fn handle_flow_removed(
    controller: &Controller,
    _channel: &SharedChannel,
    event: SwitchEvent,
) -> Result<EventOutcome> {
    match event {
        SwitchEvent::FlowRemoved {
            datapath_id,
            flow_match,
        } => controller.on_flow_removed(datapath_id, &flow_match),
        other => Err(mismatched(&other)),
    }
}

fn handle_flow_rejected(
    controller: &Controller,
    _channel: &SharedChannel,
    event: SwitchEvent,
) -> Result<EventOutcome> {
    match event {
        SwitchEvent::FlowRejected {
            datapath_id,
            flow_match,
        } => controller.on_flow_rejected(datapath_id, &flow_match),
        other => Err(mismatched(&other)),
    }
}
