//! Switch session registry.
//!
//! # Responsibilities
//! - Validate the protocol version announced in the handshake
//! - Track each switch through HANDSHAKING → ACTIVE → DISCONNECTED
//! - Own the per-switch outbound channel and installed rule set
//! - Treat re-registration of a live datapath as a reconnect
//!
//! A DISCONNECTED session stays in the map as a tombstone so late events for
//! it are reported stale. It holds no channel and no rules, and the next
//! registration of the same datapath overwrites it, so the map never grows
//! past the number of distinct datapaths seen.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;

use crate::error::{ControllerError, Result};
use crate::flow::InstalledRuleSet;
use crate::protocol::{ControllerMessage, DatapathId, ProtocolVersion, SupportedVersions};
use crate::session::channel::{ChannelClosed, SharedChannel};

/// Connection state of one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Version accepted, bootstrap not yet run.
    Handshaking,
    /// Bootstrapped; packet-ins are handled.
    Active,
    /// Terminal. Late events are stale.
    Disconnected,
}

/// Identifies one session of one switch. A reconnect gets a new `session_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub datapath_id: DatapathId,
    pub session_id: u64,
    pub version: ProtocolVersion,
}

/// What a session held when it was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub handle: SessionHandle,
    pub discarded_pairs: usize,
}

/// One connected switch.
#[derive(Debug)]
pub struct SwitchSession {
    handle: SessionHandle,
    state: ConnectionState,
    channel: Option<SharedChannel>,
    installed: InstalledRuleSet,
    connected_at: Instant,
}

impl SwitchSession {
    fn new(handle: SessionHandle, channel: SharedChannel) -> Self {
        Self {
            handle,
            state: ConnectionState::Handshaking,
            channel: Some(channel),
            installed: InstalledRuleSet::new(),
            connected_at: Instant::now(),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn datapath_id(&self) -> DatapathId {
        self.handle.datapath_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ConnectionState::Active
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    /// Queue a message for the switch. Never blocks.
    pub fn send(&self, message: ControllerMessage) -> std::result::Result<(), ChannelClosed> {
        match &self.channel {
            Some(channel) => channel.send(message),
            None => Err(ChannelClosed),
        }
    }

    pub fn installed(&self) -> &InstalledRuleSet {
        &self.installed
    }

    pub fn installed_mut(&mut self) -> &mut InstalledRuleSet {
        &mut self.installed
    }

    fn tear_down(&mut self) -> SessionSummary {
        let discarded_pairs = self.installed.len();
        self.state = ConnectionState::Disconnected;
        self.channel = None;
        self.installed.clear();
        SessionSummary {
            handle: self.handle,
            discarded_pairs,
        }
    }
}

/// Registry of all switch sessions, keyed by datapath.
#[derive(Debug)]
pub struct SwitchRegistry {
    sessions: DashMap<DatapathId, SwitchSession>,
    supported: SupportedVersions,
    next_session_id: AtomicU64,
}

impl SwitchRegistry {
    pub fn new(supported: SupportedVersions) -> Self {
        Self {
            sessions: DashMap::new(),
            supported,
            next_session_id: AtomicU64::new(1),
        }
    }

    pub fn supported_versions(&self) -> &SupportedVersions {
        &self.supported
    }

    /// Start a session in HANDSHAKING.
    ///
    /// Fails with `UnsupportedProtocol` without touching any existing session.
    /// A live session for the same datapath is replaced and its installed rule
    /// set discarded.
    pub fn register(
        &self,
        datapath_id: DatapathId,
        version: ProtocolVersion,
        channel: SharedChannel,
    ) -> Result<SessionHandle> {
        if !self.supported.contains(version) {
            return Err(ControllerError::UnsupportedProtocol {
                datapath_id,
                version,
            });
        }

        let handle = SessionHandle {
            datapath_id,
            session_id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            version,
        };

        if let Some(mut previous) = self
            .sessions
            .insert(datapath_id, SwitchSession::new(handle, channel))
        {
            if previous.state != ConnectionState::Disconnected {
                let summary = previous.tear_down();
                tracing::info!(
                    datapath_id = %datapath_id,
                    previous_session = summary.handle.session_id,
                    discarded_pairs = summary.discarded_pairs,
                    "Switch reconnected, previous session replaced"
                );
            }
        }

        tracing::debug!(
            datapath_id = %datapath_id,
            session_id = handle.session_id,
            version = %version,
            "Switch handshaking"
        );
        Ok(handle)
    }

    /// HANDSHAKING → ACTIVE. Fails if the session was replaced or torn down meanwhile.
    pub fn activate(&self, handle: &SessionHandle) -> Result<()> {
        let stale = ControllerError::StaleEvent {
            datapath_id: handle.datapath_id,
        };
        let mut session = self.sessions.get_mut(&handle.datapath_id).ok_or(stale)?;
        if session.handle.session_id != handle.session_id
            || session.state != ConnectionState::Handshaking
        {
            return Err(ControllerError::StaleEvent {
                datapath_id: handle.datapath_id,
            });
        }
        session.state = ConnectionState::Active;
        Ok(())
    }

    /// Connection state, or `None` for a datapath never seen.
    pub fn state(&self, datapath_id: DatapathId) -> Option<ConnectionState> {
        self.sessions.get(&datapath_id).map(|s| s.state)
    }

    /// Run `f` against the ACTIVE session of `datapath_id`.
    ///
    /// The session is locked for the duration of `f`, which serializes
    /// handling of concurrent events for the same switch.
    pub fn with_active<R>(
        &self,
        datapath_id: DatapathId,
        f: impl FnOnce(&mut SwitchSession) -> R,
    ) -> Result<R> {
        match self.sessions.get_mut(&datapath_id) {
            Some(mut session) if session.is_active() => Ok(f(&mut session)),
            _ => Err(ControllerError::StaleEvent { datapath_id }),
        }
    }

    /// Mark the switch DISCONNECTED and discard its session state.
    ///
    /// Returns `None` if the datapath is unknown or already disconnected.
    pub fn unregister(&self, datapath_id: DatapathId) -> Option<SessionSummary> {
        let mut session = self.sessions.get_mut(&datapath_id)?;
        if session.state == ConnectionState::Disconnected {
            return None;
        }
        Some(session.tear_down())
    }

    /// Like [`unregister`](Self::unregister), but only if `handle` is still
    /// the current session. A closing old connection must not tear down the
    /// session of the connection that replaced it.
    pub fn unregister_session(&self, handle: &SessionHandle) -> Option<SessionSummary> {
        let mut session = self.sessions.get_mut(&handle.datapath_id)?;
        if session.handle.session_id != handle.session_id
            || session.state == ConnectionState::Disconnected
        {
            return None;
        }
        Some(session.tear_down())
    }

    /// Datapaths currently ACTIVE.
    pub fn active_switches(&self) -> Vec<DatapathId> {
        let mut active: Vec<DatapathId> = self
            .sessions
            .iter()
            .filter(|s| s.is_active())
            .map(|s| *s.key())
            .collect();
        active.sort();
        active
    }

    pub fn active_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_active()).count()
    }

    /// Sessions in the map, DISCONNECTED tombstones included.
    pub fn tracked_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of steering pairs installed on a switch.
    pub fn installed_pairs(&self, datapath_id: DatapathId) -> Option<usize> {
        self.sessions.get(&datapath_id).map(|s| s.installed.len())
    }
}

impl Default for SwitchRegistry {
    fn default() -> Self {
        Self::new(SupportedVersions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn channel() -> (SharedChannel, mpsc::UnboundedReceiver<ControllerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(tx), rx)
    }

    #[test]
    fn register_then_activate() {
        let registry = SwitchRegistry::default();
        let (tx, _rx) = channel();
        let handle = registry
            .register(DatapathId(1), ProtocolVersion::V1_3, tx)
            .unwrap();
        assert_eq!(registry.state(DatapathId(1)), Some(ConnectionState::Handshaking));
        assert!(registry.with_active(DatapathId(1), |_| ()).is_err());

        registry.activate(&handle).unwrap();
        assert_eq!(registry.state(DatapathId(1)), Some(ConnectionState::Active));
        assert_eq!(registry.active_switches(), vec![DatapathId(1)]);
    }

    #[test]
    fn unsupported_version_creates_no_session() {
        let registry = SwitchRegistry::default();
        let (tx, _rx) = channel();
        let err = registry
            .register(DatapathId(1), ProtocolVersion::V1_0, tx)
            .unwrap_err();
        assert!(matches!(err, ControllerError::UnsupportedProtocol { .. }));
        assert_eq!(registry.state(DatapathId(1)), None);
    }

    #[test]
    fn unregister_is_terminal() {
        let registry = SwitchRegistry::default();
        let (tx, _rx) = channel();
        let handle = registry
            .register(DatapathId(7), ProtocolVersion::V1_3, tx)
            .unwrap();
        registry.activate(&handle).unwrap();

        let summary = registry.unregister(DatapathId(7)).unwrap();
        assert_eq!(summary.handle, handle);
        assert_eq!(registry.state(DatapathId(7)), Some(ConnectionState::Disconnected));
        assert!(registry.unregister(DatapathId(7)).is_none());
        assert!(matches!(
            registry.with_active(DatapathId(7), |_| ()),
            Err(ControllerError::StaleEvent { .. })
        ));
        assert!(registry.activate(&handle).is_err());
    }

    #[test]
    fn old_connection_cannot_tear_down_replacement() {
        let registry = SwitchRegistry::default();
        let (first_tx, _first_rx) = channel();
        let (second_tx, _second_rx) = channel();

        let first = registry
            .register(DatapathId(2), ProtocolVersion::V1_3, first_tx)
            .unwrap();
        registry.activate(&first).unwrap();
        let second = registry
            .register(DatapathId(2), ProtocolVersion::V1_3, second_tx)
            .unwrap();
        registry.activate(&second).unwrap();
        assert_ne!(first.session_id, second.session_id);

        assert!(registry.unregister_session(&first).is_none());
        assert_eq!(registry.state(DatapathId(2)), Some(ConnectionState::Active));
        assert!(registry.unregister_session(&second).is_some());
    }

    #[test]
    fn reconnect_overwrites_the_tombstone() {
        let registry = SwitchRegistry::default();
        for _ in 0..3 {
            let (tx, _rx) = channel();
            let handle = registry
                .register(DatapathId(4), ProtocolVersion::V1_3, tx)
                .unwrap();
            registry.activate(&handle).unwrap();
            assert!(registry.unregister_session(&handle).is_some());
        }
        assert_eq!(registry.tracked_count(), 1);
        assert_eq!(registry.state(DatapathId(4)), Some(ConnectionState::Disconnected));

        let (tx, _rx) = channel();
        let handle = registry
            .register(DatapathId(4), ProtocolVersion::V1_3, tx)
            .unwrap();
        registry.activate(&handle).unwrap();
        assert_eq!(registry.tracked_count(), 1);
        assert_eq!(registry.active_switches(), vec![DatapathId(4)]);
    }

    #[test]
    fn torn_down_session_cannot_send() {
        let registry = SwitchRegistry::default();
        let (tx, _rx) = channel();
        let handle = registry
            .register(DatapathId(3), ProtocolVersion::V1_3, tx)
            .unwrap();
        registry.activate(&handle).unwrap();
        registry.unregister(DatapathId(3));

        let session = registry.sessions.get(&DatapathId(3)).unwrap();
        let message = ControllerMessage::packet_out(
            DatapathId(3),
            crate::protocol::BufferId::NO_BUFFER,
            1,
            vec![],
            &[],
        );
        assert_eq!(session.send(message), Err(ChannelClosed));
    }
}
