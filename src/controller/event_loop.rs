//! Controller event loop.
//!
//! # Responsibilities
//! - Drive each switch through HANDSHAKING → ACTIVE → DISCONNECTED
//! - Run the bootstrap sequence when a switch becomes ACTIVE
//! - Turn packet-ins into steering decisions or fallback floods
//! - Discard events for switches that are no longer ACTIVE
//! - Swap the backend pool on reconfiguration

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::classifier::{Classification, ClassifiedPacket, IgnoreReason, PacketClassifier};
use crate::config::BalancerConfig;
use crate::controller::dispatch::DispatchTable;
use crate::error::{ControllerError, Result};
use crate::flow::{FlowRuleBuilder, PairInstall, ReleaseCause, RuleInstaller};
use crate::forwarding::FallbackForwarder;
use crate::load_balancer::{BackendPool, LoadBalancingPolicy};
use crate::observability::metrics;
use crate::protocol::{
    BufferId, ControllerMessage, DatapathId, EventKind, FlowMatch, PortNo, ProtocolVersion,
    SupportedVersions, SwitchEvent,
};
use crate::session::{SessionHandle, SessionSummary, SharedChannel, SwitchRegistry, SwitchSession};

/// Why a frame took the flooding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodReason {
    /// Not an IPv4 frame.
    NonIpv4,
    /// Destination is neither a backend nor the virtual address.
    NotTarget,
    /// The classifier could not parse the frame.
    Malformed,
}

/// What handling one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Session became ACTIVE and its bootstrap rules were pushed.
    Bootstrapped { session: SessionHandle, rules: usize },
    /// Discovery traffic; nothing was sent.
    Ignored(IgnoreReason),
    /// Frame was flooded by the fallback forwarder.
    Flooded(FloodReason),
    /// Frame was steered to a backend.
    Steered {
        client: Ipv4Addr,
        target: Ipv4Addr,
        backend: Ipv4Addr,
        freshly_installed: bool,
    },
    /// Session torn down.
    Disconnected { discarded_pairs: usize },
    /// A flow-removed or flow-rejected notification was processed.
    PairReleased { released: bool },
}

impl EventOutcome {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            EventOutcome::Bootstrapped { .. } => "bootstrapped",
            EventOutcome::Ignored(_) => "ignored",
            EventOutcome::Flooded(FloodReason::NonIpv4) => "flooded_non_ipv4",
            EventOutcome::Flooded(FloodReason::NotTarget) => "flooded_not_target",
            EventOutcome::Flooded(FloodReason::Malformed) => "flooded_malformed",
            EventOutcome::Steered {
                freshly_installed: true,
                ..
            } => "steered",
            EventOutcome::Steered { .. } => "steered_existing",
            EventOutcome::Disconnected { .. } => "disconnected",
            EventOutcome::PairReleased { .. } => "pair_released",
        }
    }
}

/// The load-balancing controller.
///
/// All methods take `&self`; share it across connection tasks behind an `Arc`.
#[derive(Debug)]
pub struct Controller {
    registry: SwitchRegistry,
    classifier: PacketClassifier,
    policy: LoadBalancingPolicy,
    builder: FlowRuleBuilder,
    installer: RuleInstaller,
    fallback: FallbackForwarder,
    virtual_address: Option<Ipv4Addr>,
    dispatch: DispatchTable,
}

impl Controller {
    /// Build a controller from balancer settings.
    ///
    /// Fails on an empty pool, a zero weight or an unknown protocol version.
    pub fn new(config: &BalancerConfig) -> Result<Self> {
        let supported = SupportedVersions::parse(&config.supported_versions).map_err(|unknown| {
            ControllerError::UnknownProtocolVersion {
                version: unknown.into_iter().next().map(|u| u.0).unwrap_or_default(),
            }
        })?;

        let policy = LoadBalancingPolicy::from_config(&config.backends)?;

        tracing::info!(
            backends = policy.pool().len(),
            total_weight = policy.pool().total_weight(),
            virtual_address = ?config.virtual_address,
            "Controller initialized"
        );

        Ok(Self {
            registry: SwitchRegistry::new(supported),
            classifier: PacketClassifier::new(),
            policy,
            builder: FlowRuleBuilder::from_config(config),
            installer: RuleInstaller::new(),
            fallback: FallbackForwarder::new(),
            virtual_address: config.virtual_address,
            dispatch: DispatchTable::standard(),
        })
    }

    pub fn registry(&self) -> &SwitchRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &LoadBalancingPolicy {
        &self.policy
    }

    pub fn builder(&self) -> &FlowRuleBuilder {
        &self.builder
    }

    pub fn virtual_address(&self) -> Option<Ipv4Addr> {
        self.virtual_address
    }

    /// Whether traffic to `address` is steered.
    pub fn is_steering_target(&self, pool: &BackendPool, address: Ipv4Addr) -> bool {
        pool.contains(address) || self.virtual_address == Some(address)
    }

    /// Route an inbound event through the dispatch table.
    pub fn dispatch(&self, channel: &SharedChannel, event: SwitchEvent) -> Result<EventOutcome> {
        let kind = event.kind();
        let handler = self
            .dispatch
            .handler(kind)
            .ok_or(ControllerError::UnhandledEvent { kind })?;
        handler(self, channel, event)
    }

    /// Handshake: register the session, activate it, push the bootstrap rules.
    pub fn on_switch_connected(
        &self,
        datapath_id: DatapathId,
        version: ProtocolVersion,
        channel: SharedChannel,
    ) -> Result<EventOutcome> {
        let handle = match self.registry.register(datapath_id, version, channel) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(datapath_id = %datapath_id, error = %err, "Handshake rejected");
                return Err(err);
            }
        };
        self.registry.activate(&handle)?;

        let rules = self.builder.build_bootstrap(&self.policy.pool());
        let pushed = self.registry.with_active(datapath_id, |session| {
            if session.handle() != handle {
                return Err(ControllerError::StaleEvent { datapath_id });
            }
            self.installer.bootstrap(session, &rules)
        });

        let rules = match pushed {
            Ok(Ok(rules)) => rules,
            Ok(Err(err)) | Err(err) => {
                self.registry.unregister_session(&handle);
                metrics::set_active_switches(self.registry.active_count());
                return Err(err);
            }
        };

        metrics::set_active_switches(self.registry.active_count());
        tracing::info!(
            datapath_id = %datapath_id,
            session_id = handle.session_id,
            version = %version,
            "Switch connected"
        );
        Ok(EventOutcome::Bootstrapped {
            session: handle,
            rules,
        })
    }

    /// Handle one packet-in.
    ///
    /// Events for a switch that is not ACTIVE fail with `StaleEvent` and
    /// produce no output.
    pub fn on_packet_in(
        &self,
        datapath_id: DatapathId,
        ingress_port: PortNo,
        buffer_id: BufferId,
        raw_frame: &[u8],
    ) -> Result<EventOutcome> {
        let result = self
            .registry
            .with_active(datapath_id, |session| {
                self.handle_frame(session, ingress_port, buffer_id, raw_frame)
            })
            .and_then(|inner| inner);

        match &result {
            Ok(outcome) => metrics::record_packet_in(outcome.label()),
            Err(err) => {
                metrics::record_packet_in(err.kind());
                self.note_stale(EventKind::PacketIn, err);
            }
        }
        result
    }

    /// Terminal transition. Discards the switch's installed rule set.
    pub fn on_switch_disconnected(&self, datapath_id: DatapathId) -> Result<EventOutcome> {
        match self.registry.unregister(datapath_id) {
            Some(summary) => Ok(self.disconnected(summary)),
            None => {
                let err = ControllerError::StaleEvent { datapath_id };
                self.note_stale(EventKind::SwitchDisconnected, &err);
                Err(err)
            }
        }
    }

    /// Transport-level close of the connection that owned `handle`.
    ///
    /// A no-op if the switch has since reconnected on another connection.
    pub fn on_connection_closed(&self, handle: &SessionHandle) -> Option<EventOutcome> {
        self.registry
            .unregister_session(handle)
            .map(|summary| self.disconnected(summary))
    }

    /// The switch removed a rule (timeout or eviction).
    pub fn on_flow_removed(
        &self,
        datapath_id: DatapathId,
        flow_match: &FlowMatch,
    ) -> Result<EventOutcome> {
        self.release(EventKind::FlowRemoved, datapath_id, flow_match, ReleaseCause::Removed)
    }

    /// The switch refused a rule install.
    pub fn on_flow_rejected(
        &self,
        datapath_id: DatapathId,
        flow_match: &FlowMatch,
    ) -> Result<EventOutcome> {
        self.release(EventKind::FlowRejected, datapath_id, flow_match, ReleaseCause::Rejected)
    }

    /// Apply a reloaded balancer section.
    ///
    /// Only the backend pool is swapped at runtime. Installed steering rules
    /// are left in place.
    pub fn reconfigure(&self, config: &BalancerConfig) -> Result<()> {
        let pool = BackendPool::from_config(&config.backends)?;

        if config.virtual_address != self.virtual_address
            || FlowRuleBuilder::from_config(config).priorities() != self.builder.priorities()
        {
            tracing::warn!("Virtual address and rule priority changes take effect after restart");
        }

        self.policy.replace_pool(pool);
        Ok(())
    }

    fn handle_frame(
        &self,
        session: &mut SwitchSession,
        ingress_port: PortNo,
        buffer_id: BufferId,
        raw_frame: &[u8],
    ) -> Result<EventOutcome> {
        let datapath_id = session.datapath_id();

        let packet = match self.classifier.classify(ingress_port, raw_frame) {
            Ok(Classification::Packet(packet)) => packet,
            Ok(Classification::Ignored(reason @ IgnoreReason::Discovery { .. })) => {
                tracing::trace!(datapath_id = %datapath_id, ?reason, "Discovery frame ignored");
                return Ok(EventOutcome::Ignored(reason));
            }
            Ok(Classification::Ignored(IgnoreReason::NonIpv4 { .. })) => {
                return self.flood(session, ingress_port, buffer_id, raw_frame, FloodReason::NonIpv4);
            }
            Err(err) => {
                tracing::warn!(
                    datapath_id = %datapath_id,
                    ingress_port,
                    error = %ControllerError::from(err),
                    "Flooding unparsable frame"
                );
                return self.flood(session, ingress_port, buffer_id, raw_frame, FloodReason::Malformed);
            }
        };

        let pool = self.policy.pool();
        if !self.is_steering_target(&pool, packet.dst) {
            return self.flood(session, ingress_port, buffer_id, raw_frame, FloodReason::NotTarget);
        }

        tracing::info!(
            datapath_id = %datapath_id,
            src = %packet.src,
            dst = %packet.dst,
            ingress_port,
            "Packet in"
        );

        self.steer(session, &pool, packet, buffer_id, raw_frame)
    }

    fn steer(
        &self,
        session: &mut SwitchSession,
        pool: &BackendPool,
        packet: ClassifiedPacket,
        buffer_id: BufferId,
        raw_frame: &[u8],
    ) -> Result<EventOutcome> {
        let datapath_id = session.datapath_id();
        let now = Instant::now();

        // An existing pair pins the flow to its backend without touching the rotation.
        let existing = session
            .installed_mut()
            .lookup(packet.src, packet.dst, now)
            .map(|pair| pair.decision.backend);

        let (backend, freshly_installed) = match existing {
            Some(backend) => (backend, false),
            None => {
                let selected = self.policy.select_from(pool, packet.src);
                metrics::record_backend_selection(selected.address.to_string());

                let pair = self.builder.build_steering_pair(
                    packet.ingress_port,
                    packet.src,
                    packet.dst,
                    selected.address,
                );
                match self.installer.install_steering_pair(session, pair, now)? {
                    PairInstall::Installed => {
                        tracing::info!(
                            datapath_id = %datapath_id,
                            client = %packet.src,
                            backend = %selected.address,
                            "Redirecting traffic to backend"
                        );
                        (selected.address, true)
                    }
                    PairInstall::AlreadyInstalled { backend } => (backend, false),
                }
            }
        };

        let message = ControllerMessage::packet_out(
            datapath_id,
            buffer_id,
            packet.ingress_port,
            self.builder.forward_actions(backend),
            raw_frame,
        );
        session
            .send(message)
            .map_err(|_| ControllerError::SwitchUnreachable { datapath_id })?;

        Ok(EventOutcome::Steered {
            client: packet.src,
            target: packet.dst,
            backend,
            freshly_installed,
        })
    }

    fn flood(
        &self,
        session: &SwitchSession,
        ingress_port: PortNo,
        buffer_id: BufferId,
        raw_frame: &[u8],
        reason: FloodReason,
    ) -> Result<EventOutcome> {
        self.fallback
            .handle_unmatched(session, ingress_port, raw_frame, buffer_id)?;
        Ok(EventOutcome::Flooded(reason))
    }

    fn release(
        &self,
        kind: EventKind,
        datapath_id: DatapathId,
        flow_match: &FlowMatch,
        cause: ReleaseCause,
    ) -> Result<EventOutcome> {
        let result = self.registry.with_active(datapath_id, |session| {
            self.installer
                .release_pair(session, flow_match, cause)
                .is_some()
        });
        match result {
            Ok(released) => Ok(EventOutcome::PairReleased { released }),
            Err(err) => {
                self.note_stale(kind, &err);
                Err(err)
            }
        }
    }

    fn disconnected(&self, summary: SessionSummary) -> EventOutcome {
        metrics::set_active_switches(self.registry.active_count());
        tracing::info!(
            datapath_id = %summary.handle.datapath_id,
            session_id = summary.handle.session_id,
            discarded_pairs = summary.discarded_pairs,
            "Switch disconnected"
        );
        EventOutcome::Disconnected {
            discarded_pairs: summary.discarded_pairs,
        }
    }

    fn note_stale(&self, kind: EventKind, err: &ControllerError) {
        if let ControllerError::StaleEvent { datapath_id } = err {
            tracing::debug!(
                datapath_id = %datapath_id,
                event = kind.as_str(),
                "Discarding stale event"
            );
            metrics::record_stale_event();
        }
    }
}
