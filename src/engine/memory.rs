// src/engine/memory.rs
//
// Working-set estimates, allocation pre-checks and byte-weighted backpressure
// for batch runs.
//
// Container memory limits are read from cgroup v2/v1 so a batch inside a
// constrained container does not get OOM-killed.

use crate::engine::resample::SizePolicy;
use crate::error::{Result, StylizeError};
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::sync::{Arc, OnceLock};

/// Minimum memory to reserve for system and other processes (in bytes)
const MIN_RESERVED_MEMORY: u64 = 64 * 1024 * 1024;
const MAX_RESERVED_MEMORY: u64 = 512 * 1024 * 1024;

/// Lower bound for any estimate to avoid zero-ish weights
const MIN_ESTIMATE_BYTES: u64 = 8 * 1024 * 1024;

/// Decoder scratch and encoder output allowance
const CODEC_OVERHEAD_BYTES: u64 = 8 * 1024 * 1024;

/// Fallback semaphore capacity when detection fails
const FALLBACK_SEMAPHORE_CAPACITY: u64 = 2 * 1024 * 1024 * 1024;

/// In-memory weighted semaphore for byte-based backpressure
#[derive(Debug)]
pub struct WeightedSemaphore {
    capacity: u64,
    state: Mutex<u64>, // available bytes
    cvar: Condvar,
}

#[derive(Debug)]
pub struct MemoryPermit {
    sem: Arc<WeightedSemaphore>,
    weight: u64,
}

impl WeightedSemaphore {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            state: Mutex::new(capacity),
            cvar: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available(&self) -> u64 {
        *self.state.lock()
    }

    pub fn acquire(self: &Arc<Self>, weight: u64) -> MemoryPermit {
        let mut available = self.state.lock();
        // clamp absurd weights to capacity to avoid deadlock
        let need = weight.min(self.capacity);
        while *available < need {
            self.cvar.wait(&mut available);
        }
        *available -= need;
        MemoryPermit {
            sem: Arc::clone(self),
            weight: need,
        }
    }

    fn release(&self, weight: u64) {
        let mut available = self.state.lock();
        *available = available.saturating_add(weight).min(self.capacity);
        // Waiters have heterogeneous weights; notify_one can starve the large ones.
        self.cvar.notify_all();
    }
}

impl MemoryPermit {
    pub fn weight(&self) -> u64 {
        self.weight
    }
}

impl Drop for MemoryPermit {
    fn drop(&mut self) {
        self.sem.release(self.weight);
    }
}

static GLOBAL_MEMORY_SEMAPHORE: OnceLock<Arc<WeightedSemaphore>> = OnceLock::new();

/// Get global weighted semaphore for memory backpressure
pub fn memory_semaphore() -> Arc<WeightedSemaphore> {
    GLOBAL_MEMORY_SEMAPHORE
        .get_or_init(|| Arc::new(WeightedSemaphore::new(compute_semaphore_capacity())))
        .clone()
}

fn compute_semaphore_capacity() -> u64 {
    match detect_available_memory() {
        Some(mem) => mem
            .saturating_sub(compute_reserved_memory(mem))
            .max(MIN_ESTIMATE_BYTES),
        None => FALLBACK_SEMAPHORE_CAPACITY,
    }
}

/// Reserve 5% of total, clamped to [64MB, 512MB]
fn compute_reserved_memory(total_bytes: u64) -> u64 {
    (total_bytes / 20).clamp(MIN_RESERVED_MEMORY, MAX_RESERVED_MEMORY)
}

fn bytes_for_image(width: u32, height: u32, bytes_per_pixel: u64) -> u64 {
    (width as u64 * height as u64).saturating_mul(bytes_per_pixel)
}

/// Peak bytes one invocation holds for a `width` x `height` source.
///
/// Full resolution: decoded RGBA, separated RGB, source mask, restored RGB
/// and the recomposed RGBA. Working resolution: the accumulating RGB, its
/// blurred copy, the f32 horizontal-pass buffer and the working mask.
pub fn estimate_working_set(width: u32, height: u32, policy: &SizePolicy) -> u64 {
    let (ww, wh) = policy.plan(width, height).working;
    let full = bytes_for_image(width, height, 4 + 3 + 1 + 3 + 4);
    let working = bytes_for_image(ww, wh, 3 + 3 + 12 + 1);
    full.saturating_add(working)
        .saturating_add(CODEC_OVERHEAD_BYTES)
        .max(MIN_ESTIMATE_BYTES)
}

/// Fail early with `AllocationFailed` if the largest single buffer of the run
/// cannot be reserved.
pub fn ensure_allocatable(width: u32, height: u32) -> Result<()> {
    let bytes = bytes_for_image(width, height, 4);
    let fail = || StylizeError::allocation_failed(width, height, bytes);
    let len = usize::try_from(bytes).map_err(|_| fail())?;
    let mut probe: Vec<u8> = Vec::new();
    probe.try_reserve_exact(len).map_err(|_| fail())?;
    Ok(())
}

/// Detects available memory from container limits or system memory
///
/// Returns available memory in bytes, or None if detection fails.
pub fn detect_available_memory() -> Option<u64> {
    detect_cgroup_v2_memory()
        .or_else(detect_cgroup_v1_memory)
        .or_else(detect_system_memory)
}

fn detect_cgroup_v2_memory() -> Option<u64> {
    let rel = fs::read_to_string("/proc/self/cgroup")
        .ok()
        .and_then(|c| parse_cgroup2_relative_path(&c))
        .unwrap_or_default();
    let path = join_cgroup_file("/sys/fs/cgroup", &rel, "memory.max");
    let content = fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed == "max" {
        return None;
    }
    trimmed.parse::<u64>().ok()
}

fn detect_cgroup_v1_memory() -> Option<u64> {
    let content = fs::read_to_string("/sys/fs/cgroup/memory/memory.limit_in_bytes").ok()?;
    let memory = content.trim().parse::<u64>().ok()?;
    // Very large values (like 2^63-1) mean "no limit"
    if memory > 1_000_000_000_000_000 {
        return None;
    }
    Some(memory)
}

fn detect_system_memory() -> Option<u64> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_total(&content)
}

fn parse_meminfo_total(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

fn parse_cgroup2_relative_path(content: &str) -> Option<String> {
    // Format: 0::/docker/abcd...
    content
        .lines()
        .find(|line| line.starts_with("0::"))
        .map(|line| line.trim_start_matches("0::").to_string())
}

fn join_cgroup_file(mount_point: &str, rel: &str, file: &str) -> String {
    let base = mount_point.trim_end_matches('/');
    let rel = rel.trim_matches('/');
    if rel.is_empty() {
        format!("{base}/{file}")
    } else {
        format!("{base}/{rel}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_reserved_memory_bounds_and_percent() {
        assert_eq!(compute_reserved_memory(256 * 1024 * 1024), MIN_RESERVED_MEMORY);
        assert_eq!(compute_reserved_memory(64 * 1024 * 1024 * 1024), MAX_RESERVED_MEMORY);
        let four_gb = 4 * 1024 * 1024 * 1024u64;
        assert_eq!(compute_reserved_memory(four_gb), four_gb / 20);
    }

    #[test]
    fn test_parse_cgroup2_relative_path() {
        let content = "12:cpu:/ignored\n0::/kubepods/pod1\n";
        assert_eq!(
            parse_cgroup2_relative_path(content).as_deref(),
            Some("/kubepods/pod1")
        );
    }

    #[test]
    fn test_join_cgroup_file_handles_empty_rel() {
        assert_eq!(
            join_cgroup_file("/sys/fs/cgroup/", "/", "memory.max"),
            "/sys/fs/cgroup/memory.max"
        );
        assert_eq!(
            join_cgroup_file("/sys/fs/cgroup", "/a/b", "memory.max"),
            "/sys/fs/cgroup/a/b/memory.max"
        );
    }

    #[test]
    fn test_parse_meminfo_total() {
        let meminfo = "MemTotal:       16318480 kB\nMemFree:         1000 kB\n";
        assert_eq!(parse_meminfo_total(meminfo), Some(16318480 * 1024));
        assert_eq!(parse_meminfo_total("garbage"), None);
    }

    #[test]
    fn test_estimate_grows_with_size() {
        let policy = SizePolicy::default();
        let small = estimate_working_set(100, 100, &policy);
        let large = estimate_working_set(4000, 3000, &policy);
        assert!(small >= MIN_ESTIMATE_BYTES);
        assert!(large > small);
        // full-resolution buffers dominate once the working size is capped
        assert!(large >= bytes_for_image(4000, 3000, 15));
    }

    #[test]
    fn test_ensure_allocatable() {
        assert!(ensure_allocatable(64, 64).is_ok());
        let err = ensure_allocatable(u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, StylizeError::AllocationFailed { .. }));
    }

    #[test]
    fn test_weighted_semaphore_acquire_release() {
        let sem = Arc::new(WeightedSemaphore::new(100));
        let permit = sem.acquire(60);
        assert_eq!(sem.available(), 40);
        drop(permit);
        assert_eq!(sem.available(), 100);
    }

    #[test]
    fn test_oversized_weight_is_clamped() {
        let sem = Arc::new(WeightedSemaphore::new(10));
        let permit = sem.acquire(1_000);
        assert_eq!(permit.weight(), 10);
    }

    #[test]
    fn weighted_semaphore_wakes_waiter_after_drop() {
        let sem = Arc::new(WeightedSemaphore::new(100));
        let (tx_started, rx_started) = std::sync::mpsc::channel();
        let (tx_done, rx_done) = std::sync::mpsc::channel();

        // Hold full capacity so the spawned thread must block.
        let permit = sem.acquire(100);

        let sem_wait = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            tx_started.send(()).unwrap();
            let _permit = sem_wait.acquire(10);
            tx_done.send(()).unwrap();
        });

        rx_started
            .recv_timeout(Duration::from_secs(1))
            .expect("waiter should signal start");
        drop(permit);

        rx_done
            .recv_timeout(Duration::from_secs(1))
            .expect("waiter should acquire after release");
        handle.join().unwrap();
    }
}
