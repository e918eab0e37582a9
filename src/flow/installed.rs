//! Per-switch record of installed steering pairs.
//!
//! Both keys of a pair are inserted and removed together. Entries whose rules
//! carry a timeout are soft-expired from their install time; the switch's own
//! flow-removed notifications remove entries explicitly.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use crate::flow::rule::{FlowKey, FlowRule, SteeringDecision, SteeringPair};
use crate::protocol::{FlowMatch, FlowTimeouts};

/// A steering pair known to be on the switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPair {
    pub decision: SteeringDecision,
    pub forward: FlowRule,
    pub reverse: FlowRule,
    pub installed_at: Instant,
    pub expires_at: Option<Instant>,
}

impl InstalledPair {
    fn new(pair: SteeringPair, now: Instant) -> Self {
        let expires_at = soft_expiry(pair.forward.timeouts).map(|ttl| now + ttl);
        Self {
            decision: pair.decision,
            forward: pair.forward,
            reverse: pair.reverse,
            installed_at: now,
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Local view of when a rule stops existing on the switch.
///
/// The earliest moment the rule may be gone: the shorter of the non-zero
/// timeouts. An idle rule can vanish long before its hard timeout, and
/// forgetting a pair early only means the next packet-in reinstalls it.
fn soft_expiry(timeouts: FlowTimeouts) -> Option<Duration> {
    [timeouts.idle_secs, timeouts.hard_secs]
        .into_iter()
        .filter(|secs| *secs > 0)
        .min()
        .map(|secs| Duration::from_secs(u64::from(secs)))
}

/// Installed steering pairs of one switch.
#[derive(Debug, Default)]
pub struct InstalledRuleSet {
    /// Keyed by forward key.
    pairs: HashMap<FlowKey, InstalledPair>,
    /// Reverse key → forward key.
    reverse_index: HashMap<FlowKey, FlowKey>,
    /// Rule match → forward key, for switch notifications.
    match_index: HashMap<FlowMatch, FlowKey>,
}

impl InstalledRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pairs (each pair accounts for two keys).
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Whether a key of either direction is present.
    pub fn contains(&self, key: &FlowKey) -> bool {
        self.pairs.contains_key(key) || self.reverse_index.contains_key(key)
    }

    /// Every key currently tracked, both directions.
    pub fn keys(&self) -> Vec<FlowKey> {
        self.pairs
            .values()
            .flat_map(|pair| [pair.decision.forward_key(), pair.decision.reverse_key()])
            .collect()
    }

    /// Forward key of another pair whose reverse rule has the same match as
    /// `pair`'s. Installing `pair` would overwrite that rule on the switch.
    pub fn reverse_owner(&self, pair: &SteeringPair) -> Option<FlowKey> {
        self.reverse_index
            .get(&pair.reverse_key())
            .copied()
            .filter(|owner| *owner != pair.forward_key())
    }

    /// Register both keys of `pair`, dropping any pair it shares a key with.
    pub fn insert(&mut self, pair: SteeringPair, now: Instant) {
        let forward_key = pair.forward_key();
        if self.pairs.contains_key(&forward_key) {
            self.remove(&forward_key);
        }
        if let Some(owner) = self.reverse_owner(&pair) {
            self.remove(&owner);
        }
        self.reverse_index.insert(pair.reverse_key(), forward_key);
        self.match_index.insert(pair.forward.flow_match, forward_key);
        self.match_index.insert(pair.reverse.flow_match, forward_key);
        self.pairs.insert(forward_key, InstalledPair::new(pair, now));
    }

    /// Live pair for `client` → `target`. A soft-expired pair is dropped and
    /// reported absent.
    pub fn lookup(&mut self, client: Ipv4Addr, target: Ipv4Addr, now: Instant) -> Option<&InstalledPair> {
        let key = FlowKey::forward(client, target);
        if self.pairs.get(&key)?.is_expired(now) {
            self.remove(&key);
            return None;
        }
        self.pairs.get(&key)
    }

    /// Remove the pair with forward key `key`.
    pub fn remove(&mut self, key: &FlowKey) -> Option<InstalledPair> {
        let pair = self.pairs.remove(key)?;
        // Only drop index entries still pointing at this pair.
        let reverse_key = pair.decision.reverse_key();
        if self.reverse_index.get(&reverse_key) == Some(key) {
            self.reverse_index.remove(&reverse_key);
        }
        for flow_match in [pair.forward.flow_match, pair.reverse.flow_match] {
            if self.match_index.get(&flow_match) == Some(key) {
                self.match_index.remove(&flow_match);
            }
        }
        Some(pair)
    }

    /// Remove the pair one of whose rules has `flow_match`.
    pub fn remove_by_match(&mut self, flow_match: &FlowMatch) -> Option<InstalledPair> {
        let key = *self.match_index.get(flow_match)?;
        self.remove(&key)
    }

    /// Drop every soft-expired pair. Returns how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<FlowKey> = self
            .pairs
            .iter()
            .filter(|(_, pair)| pair.is_expired(now))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.reverse_index.clear();
        self.match_index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::builder::{FlowRuleBuilder, Priorities};

    fn pair(client: u8, backend: u8) -> SteeringPair {
        FlowRuleBuilder::default().build_steering_pair(
            1,
            Ipv4Addr::new(10, 0, 5, client),
            Ipv4Addr::new(10, 0, 0, 100),
            Ipv4Addr::new(10, 0, 0, backend),
        )
    }

    #[test]
    fn insert_registers_both_keys() {
        let mut set = InstalledRuleSet::new();
        let p = pair(9, 2);
        set.insert(p.clone(), Instant::now());

        assert_eq!(set.len(), 1);
        assert!(set.contains(&p.forward_key()));
        assert!(set.contains(&p.reverse_key()));
        assert_eq!(set.keys().len(), 2);
    }

    #[test]
    fn remove_by_either_match_drops_both_keys() {
        let mut set = InstalledRuleSet::new();
        let p = pair(9, 2);
        set.insert(p.clone(), Instant::now());

        let removed = set.remove_by_match(&p.reverse.flow_match).unwrap();
        assert_eq!(removed.decision, p.decision);
        assert!(!set.contains(&p.forward_key()));
        assert!(!set.contains(&p.reverse_key()));
        assert!(set.remove_by_match(&p.forward.flow_match).is_none());
    }

    #[test]
    fn reinserting_a_flow_replaces_the_old_backend() {
        let mut set = InstalledRuleSet::new();
        let first = pair(9, 2);
        let second = pair(9, 3);
        set.insert(first.clone(), Instant::now());
        set.insert(second.clone(), Instant::now());

        assert_eq!(set.len(), 1);
        assert!(!set.contains(&first.reverse_key()));
        assert!(set.contains(&second.reverse_key()));
    }

    #[test]
    fn timed_pairs_soft_expire() {
        let builder = FlowRuleBuilder::new(
            Priorities::default(),
            FlowTimeouts { idle_secs: 10, hard_secs: 0 },
        );
        let client = Ipv4Addr::new(10, 0, 5, 9);
        let target = Ipv4Addr::new(10, 0, 0, 100);
        let p = builder.build_steering_pair(1, client, target, Ipv4Addr::new(10, 0, 0, 2));

        let mut set = InstalledRuleSet::new();
        let start = Instant::now();
        set.insert(p, start);

        assert!(set.lookup(client, target, start + Duration::from_secs(5)).is_some());
        assert!(set.lookup(client, target, start + Duration::from_secs(10)).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn permanent_pairs_never_expire() {
        let mut set = InstalledRuleSet::new();
        let start = Instant::now();
        set.insert(pair(9, 2), start);
        assert_eq!(set.purge_expired(start + Duration::from_secs(86_400)), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn shorter_timeout_bounds_local_expiry() {
        assert_eq!(
            soft_expiry(FlowTimeouts { idle_secs: 10, hard_secs: 60 }),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            soft_expiry(FlowTimeouts { idle_secs: 90, hard_secs: 60 }),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            soft_expiry(FlowTimeouts { idle_secs: 0, hard_secs: 60 }),
            Some(Duration::from_secs(60))
        );
        assert_eq!(soft_expiry(FlowTimeouts::permanent()), None);
    }

    #[test]
    fn idle_timeout_expires_pair_before_hard_timeout() {
        let builder = FlowRuleBuilder::new(
            Priorities::default(),
            FlowTimeouts { idle_secs: 10, hard_secs: 60 },
        );
        let client = Ipv4Addr::new(10, 0, 5, 9);
        let target = Ipv4Addr::new(10, 0, 0, 100);
        let p = builder.build_steering_pair(1, client, target, Ipv4Addr::new(10, 0, 0, 2));

        let mut set = InstalledRuleSet::new();
        let start = Instant::now();
        set.insert(p, start);

        assert!(set.lookup(client, target, start + Duration::from_secs(5)).is_some());
        assert!(set.lookup(client, target, start + Duration::from_secs(30)).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn pair_sharing_a_reverse_match_displaces_the_older_one() {
        let builder = FlowRuleBuilder::default();
        let client = Ipv4Addr::new(10, 0, 5, 9);
        let backend = Ipv4Addr::new(10, 0, 0, 2);
        let via_vip = builder.build_steering_pair(1, client, Ipv4Addr::new(10, 0, 0, 100), backend);
        let via_member = builder.build_steering_pair(1, client, Ipv4Addr::new(10, 0, 0, 3), backend);

        let mut set = InstalledRuleSet::new();
        set.insert(via_vip.clone(), Instant::now());
        assert_eq!(set.reverse_owner(&via_vip), None);
        assert_eq!(set.reverse_owner(&via_member), Some(via_vip.forward_key()));

        set.insert(via_member.clone(), Instant::now());
        assert_eq!(set.len(), 1);
        assert!(!set.contains(&via_vip.forward_key()));
        assert!(set.contains(&via_member.forward_key()));
        assert!(set.remove_by_match(&via_vip.forward.flow_match).is_none());
        assert_eq!(
            set.remove_by_match(&via_member.reverse.flow_match).map(|p| p.decision),
            Some(via_member.decision)
        );
    }
}
