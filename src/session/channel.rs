//! Outbound message channel to one switch.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::protocol::ControllerMessage;

/// The switch can no longer be reached through this channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("switch channel closed")]
pub struct ChannelClosed;

/// Fire-and-forget sink for messages to a single switch.
///
/// `send` must not block: a slow switch may never stall event handling for
/// other switches.
pub trait SwitchChannel: Send + Sync + fmt::Debug {
    fn send(&self, message: ControllerMessage) -> Result<(), ChannelClosed>;
}

/// Channel handle shared between a session and its transport.
pub type SharedChannel = Arc<dyn SwitchChannel>;

impl SwitchChannel for mpsc::UnboundedSender<ControllerMessage> {
    fn send(&self, message: ControllerMessage) -> Result<(), ChannelClosed> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| ChannelClosed)
    }
}
