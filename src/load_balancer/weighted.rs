//! Weighted round-robin load balancing strategy.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::load_balancer::{backend::Backend, pool::BackendPool, LoadBalancer};

/// Weighted round-robin selector.
///
/// Each call advances the rotation `r = (r + 1) mod total_weight` and returns
/// the first backend whose cumulative weight exceeds `r`. Over one full cycle
/// every backend is picked exactly `weight` times.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    rotation: AtomicU64,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a given rotation value.
    pub fn starting_at(rotation: u64) -> Self {
        Self {
            rotation: AtomicU64::new(rotation),
        }
    }

    /// Current rotation value.
    pub fn rotation(&self) -> u64 {
        self.rotation.load(Ordering::SeqCst)
    }

    fn advance(&self, total_weight: u64) -> u64 {
        // Single atomic read-modify-write across all switches.
        let previous = self
            .rotation
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| {
                Some((r + 1) % total_weight)
            })
            .unwrap_or_else(|current| current);
        (previous + 1) % total_weight
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_backend(&self, pool: &BackendPool, _client: Ipv4Addr) -> Backend {
        let rotation = self.advance(pool.total_weight());
        pool.backend_at(rotation)
    }

    fn reset(&self) {
        self.rotation.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn pool() -> BackendPool {
        BackendPool::from_config(&[
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 2), weight: 3 },
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 3), weight: 2 },
            BackendConfig { address: Ipv4Addr::new(10, 0, 0, 4), weight: 1 },
        ])
        .unwrap()
    }

    #[test]
    fn test_weighted_cycle_is_deterministic() {
        let lb = WeightedRoundRobin::new();
        let pool = pool();
        let client = Ipv4Addr::new(10, 0, 5, 9);

        let cycle: Vec<u8> = (0..6)
            .map(|_| lb.next_backend(&pool, client).address.octets()[3])
            .collect();
        // r runs 1,2,3,4,5,0
        assert_eq!(cycle, vec![2, 2, 3, 3, 4, 2]);
        assert_eq!(lb.rotation(), 0);

        let again: Vec<u8> = (0..6)
            .map(|_| lb.next_backend(&pool, client).address.octets()[3])
            .collect();
        assert_eq!(cycle, again);
    }

    #[test]
    fn test_first_pick_advances_rotation_to_one() {
        let lb = WeightedRoundRobin::new();
        let picked = lb.next_backend(&pool(), Ipv4Addr::new(10, 0, 5, 9));
        assert_eq!(lb.rotation(), 1);
        assert_eq!(picked.address, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_client_address_does_not_bias_selection() {
        let a = WeightedRoundRobin::new();
        let b = WeightedRoundRobin::new();
        let pool = pool();
        for i in 0..12u8 {
            let x = a.next_backend(&pool, Ipv4Addr::new(10, 0, 5, i));
            let y = b.next_backend(&pool, Ipv4Addr::new(192, 168, 0, 1));
            assert_eq!(x, y);
        }
    }

    #[test]
    fn test_reset_and_starting_point() {
        let lb = WeightedRoundRobin::starting_at(4);
        let picked = lb.next_backend(&pool(), Ipv4Addr::LOCALHOST);
        assert_eq!(picked.address, Ipv4Addr::new(10, 0, 0, 4));
        lb.reset();
        assert_eq!(lb.rotation(), 0);
    }
}
