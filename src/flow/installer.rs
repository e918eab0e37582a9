//! Rule installer.
//!
//! # Responsibilities
//! - Push rule descriptors to a switch session
//! - Suppress duplicate steering installs via the session's installed rule set
//! - Keep steering pairs whole: roll back a half-installed pair, and withdraw
//!   the surviving half when the switch drops or rejects the other
//! - Never let two tracked pairs share a reverse rule: a new pair whose
//!   reverse match is already taken displaces the older pair first

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::error::{ControllerError, Result};
use crate::flow::installed::InstalledPair;
use crate::flow::rule::{FlowRule, SteeringPair};
use crate::observability::metrics;
use crate::protocol::FlowMatch;
use crate::session::SwitchSession;

/// Outcome of a steering install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairInstall {
    /// Both rules were pushed.
    Installed,
    /// The flow already had a live pair; nothing was pushed.
    AlreadyInstalled { backend: Ipv4Addr },
}

/// Why a tracked pair is being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCause {
    /// The switch reported one of the rules removed (timeout or eviction).
    Removed,
    /// The switch refused one of the rules.
    Rejected,
}

impl ReleaseCause {
    fn as_str(&self) -> &'static str {
        match self {
            ReleaseCause::Removed => "removed",
            ReleaseCause::Rejected => "rejected",
        }
    }
}

/// Pushes rules to switches.
#[derive(Debug, Clone, Default)]
pub struct RuleInstaller;

impl RuleInstaller {
    pub fn new() -> Self {
        Self
    }

    /// Queue one rule install. Fire-and-forget: an error means the switch is
    /// unreachable, not that it refused the rule.
    pub fn install(&self, session: &SwitchSession, rule: &FlowRule) -> Result<()> {
        let datapath_id = session.datapath_id();
        session
            .send(rule.install_message(datapath_id))
            .map_err(|e| ControllerError::InstallationFailed {
                datapath_id,
                rule: Box::new(rule.clone()),
                reason: e.to_string(),
            })
    }

    /// Queue a strict delete of `rule`.
    pub fn withdraw(&self, session: &SwitchSession, rule: &FlowRule) -> Result<()> {
        let datapath_id = session.datapath_id();
        session
            .send(rule.withdraw_message(datapath_id))
            .map_err(|_| ControllerError::SwitchUnreachable { datapath_id })
    }

    /// Push the bootstrap sequence. Returns the number of rules pushed.
    pub fn bootstrap(&self, session: &SwitchSession, rules: &[FlowRule]) -> Result<usize> {
        for rule in rules {
            self.install(session, rule)?;
            metrics::record_flow_install("bootstrap");
        }
        tracing::info!(
            datapath_id = %session.datapath_id(),
            rules = rules.len(),
            "Bootstrap rules installed"
        );
        Ok(rules.len())
    }

    /// Install a steering pair unless the flow already has one.
    ///
    /// Both keys are registered only after both rules were pushed. If the
    /// reverse rule cannot be pushed the forward rule is withdrawn again.
    ///
    /// The reverse match only names backend and client, so the same client
    /// reaching the same backend through two targets would overwrite one
    /// reverse rule with the other. The older pair is withdrawn and forgotten
    /// before the new one is pushed.
    pub fn install_steering_pair(
        &self,
        session: &mut SwitchSession,
        pair: SteeringPair,
        now: Instant,
    ) -> Result<PairInstall> {
        let decision = pair.decision;
        let existing = session
            .installed_mut()
            .lookup(decision.client, decision.target, now)
            .map(|installed| installed.decision.backend);
        if let Some(backend) = existing {
            tracing::debug!(
                datapath_id = %session.datapath_id(),
                client = %decision.client,
                backend = %backend,
                "Steering pair already installed"
            );
            return Ok(PairInstall::AlreadyInstalled { backend });
        }

        self.displace_reverse_owner(session, &pair);

        if let Err(err) = self.install(session, &pair.forward) {
            self.report_failure(&err);
            return Err(err);
        }

        if let Err(err) = self.install(session, &pair.reverse) {
            self.report_failure(&err);
            if let Err(rollback) = self.withdraw(session, &pair.forward) {
                tracing::debug!(
                    datapath_id = %session.datapath_id(),
                    error = %rollback,
                    "Forward rule rollback not delivered"
                );
            }
            return Err(err);
        }

        metrics::record_flow_install("steering_forward");
        metrics::record_flow_install("steering_reverse");
        session.installed_mut().insert(pair, now);
        Ok(PairInstall::Installed)
    }

    /// Forget the pair containing `flow_match` and withdraw its other rule.
    pub fn release_pair(
        &self,
        session: &mut SwitchSession,
        flow_match: &FlowMatch,
        cause: ReleaseCause,
    ) -> Option<InstalledPair> {
        let pair = session.installed_mut().remove_by_match(flow_match)?;

        let survivor = if pair.forward.flow_match == *flow_match {
            &pair.reverse
        } else {
            &pair.forward
        };
        if let Err(err) = self.withdraw(session, survivor) {
            tracing::debug!(
                datapath_id = %session.datapath_id(),
                error = %err,
                "Sibling withdraw not delivered"
            );
        }

        tracing::info!(
            datapath_id = %session.datapath_id(),
            client = %pair.decision.client,
            backend = %pair.decision.backend,
            cause = cause.as_str(),
            "Steering pair released"
        );
        Some(pair)
    }

    fn displace_reverse_owner(&self, session: &mut SwitchSession, pair: &SteeringPair) {
        let Some(owner) = session.installed().reverse_owner(pair) else {
            return;
        };
        let Some(old) = session.installed_mut().remove(&owner) else {
            return;
        };
        for rule in [&old.forward, &old.reverse] {
            if let Err(err) = self.withdraw(session, rule) {
                tracing::debug!(
                    datapath_id = %session.datapath_id(),
                    error = %err,
                    "Displaced rule withdraw not delivered"
                );
            }
        }
        tracing::info!(
            datapath_id = %session.datapath_id(),
            client = %old.decision.client,
            backend = %old.decision.backend,
            old_target = %old.decision.target,
            new_target = %pair.decision.target,
            "Steering pair displaced by a pair sharing its reverse rule"
        );
    }

    fn report_failure(&self, err: &ControllerError) {
        tracing::warn!(error = %err, "Rule installation failed");
        metrics::record_install_failure();
    }
}
