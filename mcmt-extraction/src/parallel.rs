//! Parallel processing utilities for extraction
//!
//! This module provides configurable thread pool management and the chunked
//! scheduler the extraction pass runs on. Cells are split into contiguous
//! chunks, each chunk is handled by one task, and results come back in chunk
//! order.

use mcmt_core::{Error, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::{Arc, Mutex, OnceLock};

/// Global thread pool shared by schedulers without a thread count of their own
static GLOBAL_THREAD_POOL: OnceLock<Arc<ThreadPool>> = OnceLock::new();
static THREAD_POOL_CONFIG: Mutex<ThreadPoolConfig> = Mutex::new(ThreadPoolConfig::new());

const DEFAULT_STACK_SIZE: usize = 8 * 1024 * 1024;
const DEFAULT_THREAD_PREFIX: &str = "mcmt-worker";

/// Thread pool configuration for parallel processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPoolConfig {
    /// Number of threads to use (None = global pool)
    pub num_threads: Option<usize>,
    /// Thread stack size in bytes
    pub stack_size: Option<usize>,
    /// Thread name prefix
    pub thread_name_prefix: String,
    /// Enable parallel processing (can be disabled for debugging)
    pub enabled: bool,
    /// Minimum chunk size for parallel iteration
    pub min_chunk_size: usize,
    /// Maximum chunk size for parallel iteration
    pub max_chunk_size: usize,
    /// Adaptive chunk sizing based on workload
    pub adaptive_chunks: bool,
}

impl ThreadPoolConfig {
    const fn new() -> Self {
        Self {
            num_threads: None,
            stack_size: None,
            thread_name_prefix: String::new(),
            enabled: true,
            min_chunk_size: 256,
            max_chunk_size: 16384,
            adaptive_chunks: true,
        }
    }

    /// Set number of threads
    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    /// Set stack size
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Enable or disable parallel processing
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set chunk size range
    pub fn with_chunk_size_range(mut self, min: usize, max: usize) -> Self {
        self.min_chunk_size = min;
        self.max_chunk_size = max;
        self
    }

    /// Enable adaptive chunk sizing
    pub fn with_adaptive_chunks(mut self, adaptive: bool) -> Self {
        self.adaptive_chunks = adaptive;
        self
    }

    /// Chunk size for `data_size` items spread over `num_threads` workers
    pub fn chunk_size(&self, data_size: usize, num_threads: usize) -> usize {
        let num_threads = num_threads.max(1);
        let base = if self.adaptive_chunks {
            // Aim for 4 chunks per thread
            data_size / (num_threads * 4)
        } else {
            data_size / num_threads
        };

        base.max(self.min_chunk_size)
            .min(self.max_chunk_size.max(self.min_chunk_size))
            .max(1)
    }

    fn build_pool(&self) -> Result<ThreadPool> {
        let mut builder = ThreadPoolBuilder::new();

        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }

        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        if !self.thread_name_prefix.is_empty() {
            let prefix = self.thread_name_prefix.clone();
            builder = builder.thread_name(move |index| format!("{}-{}", prefix, index));
        }

        builder
            .build()
            .map_err(|e| Error::Algorithm(format!("Failed to create thread pool: {}", e)))
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            stack_size: Some(DEFAULT_STACK_SIZE),
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            ..Self::new()
        }
    }
}

/// Initialize the global thread pool with custom configuration
pub fn init_thread_pool(config: ThreadPoolConfig) -> Result<()> {
    if GLOBAL_THREAD_POOL.get().is_some() {
        return Ok(()); // Already initialized
    }

    let pool = config.build_pool()?;
    tracing::debug!(
        "Initialized global thread pool with {} threads",
        pool.current_num_threads()
    );

    if let Ok(mut global_config) = THREAD_POOL_CONFIG.lock() {
        *global_config = config;
    }

    GLOBAL_THREAD_POOL
        .set(Arc::new(pool))
        .map_err(|_| Error::Algorithm("Thread pool already initialized".to_string()))?;

    Ok(())
}

/// Get the global thread pool, initializing with defaults if needed
pub fn get_thread_pool() -> Arc<ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let pool = ThreadPoolBuilder::new()
                .num_threads(num_cpus::get())
                .stack_size(DEFAULT_STACK_SIZE)
                .thread_name(|index| format!("{}-{}", DEFAULT_THREAD_PREFIX, index))
                .build()
                .expect("Failed to create default thread pool");
            Arc::new(pool)
        })
        .clone()
}

/// Get current thread pool configuration
pub fn get_config() -> ThreadPoolConfig {
    THREAD_POOL_CONFIG
        .lock()
        .map(|config| config.clone())
        .unwrap_or_else(|_| ThreadPoolConfig::default())
}

/// Parallel map on the global pool, chunked by the global configuration
pub fn parallel_map<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    parallel_map_indexed(data, |_, x| f(x))
}

/// Parallel map with index
pub fn parallel_map_indexed<T, U, F>(data: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(usize, &T) -> U + Sync + Send,
{
    ParallelScheduler::global()
        .map_chunks(data.len(), |_, range| {
            range.map(|i| f(i, &data[i])).collect::<Vec<U>>()
        })
        .into_iter()
        .flatten()
        .collect()
}

/// Chunked executor over an index range.
///
/// A scheduler with an explicit thread count owns a private pool; otherwise
/// it runs on the global one.
#[derive(Debug, Clone)]
pub struct ParallelScheduler {
    config: ThreadPoolConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelScheduler {
    pub fn new(config: ThreadPoolConfig) -> Result<Self> {
        if config.num_threads == Some(0) {
            return Err(Error::InvalidData(
                "Thread count must be at least 1".to_string(),
            ));
        }

        let pool = match config.num_threads {
            Some(threads) if config.enabled => {
                let pool = config.build_pool()?;
                tracing::debug!("Created scheduler pool with {} threads", threads);
                Some(Arc::new(pool))
            }
            _ => None,
        };

        Ok(Self { config, pool })
    }

    /// Scheduler on the global pool with the global configuration
    pub fn global() -> Self {
        Self {
            config: get_config(),
            pool: None,
        }
    }

    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    /// Worker count tasks are spread over
    pub fn num_threads(&self) -> usize {
        if !self.config.enabled {
            return 1;
        }
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => get_thread_pool().current_num_threads(),
        }
    }

    /// Split `0..len` into contiguous chunks
    pub fn chunk_ranges(&self, len: usize) -> Vec<Range<usize>> {
        let size = self.config.chunk_size(len, self.num_threads());
        (0..len)
            .step_by(size)
            .map(|start| start..(start + size).min(len))
            .collect()
    }

    /// Run `f(chunk_index, range)` for every chunk of `0..len`. Results are
    /// returned in chunk order regardless of which worker finished first.
    pub fn map_chunks<U, F>(&self, len: usize, f: F) -> Vec<U>
    where
        U: Send,
        F: Fn(usize, Range<usize>) -> U + Sync + Send,
    {
        let ranges = self.chunk_ranges(len);
        if !self.config.enabled || ranges.len() <= 1 {
            return ranges.into_iter().enumerate().map(|(i, r)| f(i, r)).collect();
        }

        let run = || {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(i, r)| f(i, r))
                .collect::<Vec<U>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => get_thread_pool().install(run),
        }
    }
}

impl Default for ParallelScheduler {
    fn default() -> Self {
        Self::global()
    }
}
