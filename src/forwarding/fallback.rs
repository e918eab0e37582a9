//! Flood-based fallback forwarder.

use crate::error::{ControllerError, Result};
use crate::protocol::{BufferId, ControllerMessage, FlowAction, OutputPort, PortNo};
use crate::session::SwitchSession;

/// Floods unmatched traffic out of every port but the ingress port.
#[derive(Debug, Clone, Default)]
pub struct FallbackForwarder;

impl FallbackForwarder {
    pub fn new() -> Self {
        Self
    }

    /// Emit a flooding packet-out for an unmatched frame.
    ///
    /// The frame travels with the message only when the switch did not buffer it.
    pub fn handle_unmatched(
        &self,
        session: &SwitchSession,
        ingress_port: PortNo,
        raw_frame: &[u8],
        buffer_id: BufferId,
    ) -> Result<()> {
        let datapath_id = session.datapath_id();
        let message = ControllerMessage::packet_out(
            datapath_id,
            buffer_id,
            ingress_port,
            vec![FlowAction::output(OutputPort::Flood)],
            raw_frame,
        );
        session
            .send(message)
            .map_err(|_| ControllerError::SwitchUnreachable { datapath_id })?;

        tracing::trace!(
            datapath_id = %datapath_id,
            ingress_port,
            buffered = buffer_id.is_buffered(),
            "Flooded unmatched frame"
        );
        Ok(())
    }
}
