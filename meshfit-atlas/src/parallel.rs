//! Worker pool for per-chart work
//!
//! Charts are independent once the surface has been split, so flattening
//! runs as an ordered parallel map over them. Results always come back in
//! input order, which keeps the atlas identical for any thread count.

use log::{debug, warn};
use meshfit_core::{Error, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Shared pool and the settings it was built with, created on first use
static GLOBAL_THREAD_POOL: OnceLock<(PoolSettings, ThreadPool)> = OnceLock::new();

/// The part of a [`ThreadPoolConfig`] fixed once the pool exists
#[derive(Debug, Clone, PartialEq, Eq)]
struct PoolSettings {
    num_threads: Option<usize>,
    stack_size: Option<usize>,
    thread_name_prefix: String,
}

impl From<&ThreadPoolConfig> for PoolSettings {
    fn from(config: &ThreadPoolConfig) -> Self {
        Self {
            num_threads: config.num_threads,
            stack_size: config.stack_size,
            thread_name_prefix: config.thread_name_prefix.clone(),
        }
    }
}

/// Thread pool configuration for parallel processing
///
/// `num_threads`, `stack_size` and `thread_name_prefix` shape the shared
/// pool and only apply to whichever config builds it first; later configs
/// asking for a different shape get a warning and the existing pool.
/// `enabled` and `min_parallel_items` apply on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = one per core)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Below this many items work stays on the calling thread
    pub min_parallel_items: usize,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: "meshfit-atlas".to_string(),
            enabled: true,
            min_parallel_items: 8,
        }
    }
}

impl ThreadPoolConfig {
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_parallel_items(mut self, min_items: usize) -> Self {
        self.min_parallel_items = min_items;
        self
    }
}

fn build_pool(config: &ThreadPoolConfig) -> std::result::Result<ThreadPool, ThreadPoolBuildError> {
    let mut builder = ThreadPoolBuilder::new();
    if let Some(num_threads) = config.num_threads {
        builder = builder.num_threads(num_threads);
    }
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }
    if !config.thread_name_prefix.is_empty() {
        let prefix = config.thread_name_prefix.clone();
        builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
    }
    builder.build()
}

/// Whether `config` asks for the pool that is installed; warns if not.
fn matches_installed(installed: &PoolSettings, config: &ThreadPoolConfig) -> bool {
    let requested = PoolSettings::from(config);
    if requested == *installed {
        return true;
    }
    warn!(
        "Atlas thread pool already built with {:?}; ignoring requested {:?}",
        installed, requested
    );
    false
}

/// Initialize the shared pool with a custom configuration.
///
/// Only the first initialization takes effect; later calls keep the existing
/// pool and warn when they ask for a different one.
pub fn init_thread_pool(config: &ThreadPoolConfig) -> Result<()> {
    if let Some((installed, _)) = GLOBAL_THREAD_POOL.get() {
        matches_installed(installed, config);
        return Ok(());
    }
    let pool = build_pool(config)
        .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))?;
    let threads = pool.current_num_threads();
    match GLOBAL_THREAD_POOL.set((PoolSettings::from(config), pool)) {
        Ok(()) => debug!("Initialized atlas thread pool ({} threads)", threads),
        Err(_) => {
            if let Some((installed, _)) = GLOBAL_THREAD_POOL.get() {
                matches_installed(installed, config);
            }
        }
    }
    Ok(())
}

/// The shared pool, built from `config` if nothing initialized it yet.
fn thread_pool(config: &ThreadPoolConfig) -> Option<&'static ThreadPool> {
    match GLOBAL_THREAD_POOL.get() {
        Some((installed, _)) => {
            matches_installed(installed, config);
        }
        None => {
            if let Err(e) = init_thread_pool(config) {
                warn!("Thread pool unavailable, running sequentially: {}", e);
                return None;
            }
        }
    }
    GLOBAL_THREAD_POOL.get().map(|(_, pool)| pool)
}

/// Map `f` over `data`, in parallel when enabled and worthwhile.
/// Output order always matches input order.
pub fn parallel_map<T, U, F>(config: &ThreadPoolConfig, data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    if !config.enabled || data.len() < config.min_parallel_items {
        return data.iter().map(f).collect();
    }
    let Some(pool) = thread_pool(config) else {
        return data.iter().map(f).collect();
    };
    pool.install(|| data.par_iter().map(f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_pool_config() {
        let config = ThreadPoolConfig::default()
            .with_threads(4)
            .with_stack_size(16 * 1024 * 1024)
            .with_enabled(true)
            .with_min_parallel_items(2);

        assert_eq!(config.num_threads, Some(4));
        assert_eq!(config.stack_size, Some(16 * 1024 * 1024));
        assert!(config.enabled);
        assert_eq!(config.min_parallel_items, 2);
    }

    #[test]
    fn test_parallel_map_keeps_order() {
        let data: Vec<u64> = (0..1000).collect();
        let config = ThreadPoolConfig::default().with_min_parallel_items(1);
        let result = parallel_map(&config, &data, |x| x * 2);
        assert_eq!(result, data.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_parallel_map_disabled() {
        let data = vec![1, 2, 3, 4, 5];
        let config = ThreadPoolConfig::default().with_enabled(false);
        assert_eq!(parallel_map(&config, &data, |x| x + 1), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = ThreadPoolConfig::default().with_threads(2);
        assert!(init_thread_pool(&config).is_ok());
        assert!(init_thread_pool(&config).is_ok());
    }

    #[test]
    fn test_pool_shape_fixed_by_first_config() {
        assert!(init_thread_pool(&ThreadPoolConfig::default().with_threads(2)).is_ok());
        let (installed, pool) = GLOBAL_THREAD_POOL.get().unwrap();
        let threads = pool.current_num_threads();

        // A differently shaped request is reported and the pool is reused
        let other = ThreadPoolConfig::default()
            .with_threads(threads + 1)
            .with_min_parallel_items(1);
        assert!(!matches_installed(installed, &other));
        let data: Vec<usize> = (0..64).collect();
        assert_eq!(parallel_map(&other, &data, |x| x + 1), (1..65).collect::<Vec<_>>());
        assert_eq!(thread_pool(&other).unwrap().current_num_threads(), threads);
        assert!(std::ptr::eq(thread_pool(&other).unwrap(), pool));
    }

    #[test]
    fn test_per_call_fields_do_not_conflict() {
        let installed = PoolSettings::from(&ThreadPoolConfig::default().with_threads(2));
        let same_shape = ThreadPoolConfig::default()
            .with_threads(2)
            .with_enabled(false)
            .with_min_parallel_items(100);
        assert!(matches_installed(&installed, &same_shape));
        assert!(!matches_installed(&installed, &ThreadPoolConfig::default().with_threads(3)));
        assert!(!matches_installed(
            &installed,
            &ThreadPoolConfig::default().with_threads(2).with_stack_size(1 << 20)
        ));
    }
}
