//! Backend pool management.
//!
//! # Responsibilities
//! - Hold the ordered backend pool and its total weight
//! - Apply the load balancing algorithm to select backends
//! - Replace the pool atomically on reconfiguration

use std::net::Ipv4Addr;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::BackendConfig;
use crate::error::{ControllerError, Result};
use crate::load_balancer::{backend::Backend, weighted::WeightedRoundRobin, LoadBalancer};

/// Fixed, ordered sequence of backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPool {
    backends: Vec<Backend>,
    total_weight: u64,
}

impl BackendPool {
    /// Build a pool from configuration. Fails on an empty pool or a zero weight.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self> {
        if configs.is_empty() {
            return Err(ControllerError::EmptyBackendPool);
        }

        let mut backends = Vec::with_capacity(configs.len());
        let mut total_weight = 0u64;
        for (position, config) in configs.iter().enumerate() {
            if config.weight == 0 {
                return Err(ControllerError::ZeroWeight {
                    address: config.address,
                });
            }
            total_weight += u64::from(config.weight);
            backends.push(Backend::new(config.address, config.weight, position));
        }

        Ok(Self {
            backends,
            total_weight,
        })
    }

    /// Sum of all weights; the modulus of the rotation.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Backend> {
        self.backends.iter()
    }

    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.backends.iter().map(|b| b.address)
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.backends.iter().any(|b| b.address == address)
    }

    pub fn get(&self, address: Ipv4Addr) -> Option<&Backend> {
        self.backends.iter().find(|b| b.address == address)
    }

    /// First backend whose cumulative weight exceeds `offset`.
    ///
    /// `offset` is taken modulo the total weight.
    pub fn backend_at(&self, offset: u64) -> Backend {
        let offset = offset % self.total_weight;
        let mut running = 0u64;
        for backend in &self.backends {
            running += u64::from(backend.weight);
            if offset < running {
                return *backend;
            }
        }
        // Unreachable while total_weight is the sum of the weights.
        self.backends[self.backends.len() - 1]
    }
}

/// Selection policy over a swappable pool.
#[derive(Debug)]
pub struct LoadBalancingPolicy {
    pool: ArcSwap<BackendPool>,
    balancer: Box<dyn LoadBalancer>,
}

impl LoadBalancingPolicy {
    /// Weighted round robin over `pool`.
    pub fn new(pool: BackendPool) -> Self {
        Self::with_balancer(pool, Box::new(WeightedRoundRobin::new()))
    }

    pub fn with_balancer(pool: BackendPool, balancer: Box<dyn LoadBalancer>) -> Self {
        Self {
            pool: ArcSwap::from_pointee(pool),
            balancer,
        }
    }

    /// Build from backend configuration.
    pub fn from_config(configs: &[BackendConfig]) -> Result<Self> {
        Ok(Self::new(BackendPool::from_config(configs)?))
    }

    /// Current pool snapshot.
    pub fn pool(&self) -> Arc<BackendPool> {
        self.pool.load_full()
    }

    /// Select a backend for `client` from the current pool.
    pub fn select_backend(&self, client: Ipv4Addr) -> Backend {
        let pool = self.pool.load();
        self.balancer.next_backend(&pool, client)
    }

    /// Select from a snapshot the caller already holds.
    pub fn select_from(&self, pool: &BackendPool, client: Ipv4Addr) -> Backend {
        self.balancer.next_backend(pool, client)
    }

    /// Swap in a new pool. Readers see the old or the new pool, never a mix.
    pub fn replace_pool(&self, pool: BackendPool) {
        tracing::info!(
            backends = pool.len(),
            total_weight = pool.total_weight(),
            "Backend pool replaced"
        );
        self.pool.store(Arc::new(pool));
        self.balancer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(entries: &[([u8; 4], u32)]) -> Vec<BackendConfig> {
        entries
            .iter()
            .map(|(ip, weight)| BackendConfig {
                address: Ipv4Addr::from(*ip),
                weight: *weight,
            })
            .collect()
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(
            BackendPool::from_config(&[]),
            Err(ControllerError::EmptyBackendPool)
        ));
    }

    #[test]
    fn zero_weight_is_rejected() {
        let err = BackendPool::from_config(&configs(&[([10, 0, 0, 2], 1), ([10, 0, 0, 3], 0)]))
            .unwrap_err();
        assert!(matches!(err, ControllerError::ZeroWeight { address } if address == Ipv4Addr::new(10, 0, 0, 3)));
    }

    #[test]
    fn backend_at_walks_cumulative_weights() {
        let pool =
            BackendPool::from_config(&configs(&[([10, 0, 0, 2], 3), ([10, 0, 0, 3], 2), ([10, 0, 0, 4], 1)]))
                .unwrap();
        assert_eq!(pool.total_weight(), 6);
        let picks: Vec<u8> = (0..6).map(|r| pool.backend_at(r).address.octets()[3]).collect();
        assert_eq!(picks, vec![2, 2, 2, 3, 3, 4]);
        assert_eq!(pool.backend_at(7).address, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn replace_pool_is_observed_by_next_selection() {
        let policy = LoadBalancingPolicy::from_config(&configs(&[([10, 0, 0, 2], 1)])).unwrap();
        let client = Ipv4Addr::new(10, 0, 5, 9);
        assert_eq!(policy.select_backend(client).address, Ipv4Addr::new(10, 0, 0, 2));

        policy.replace_pool(BackendPool::from_config(&configs(&[([10, 0, 0, 9], 1)])).unwrap());
        assert_eq!(policy.select_backend(client).address, Ipv4Addr::new(10, 0, 0, 9));
        assert!(policy.pool().contains(Ipv4Addr::new(10, 0, 0, 9)));
    }
}
