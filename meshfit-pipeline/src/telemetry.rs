//! Memory telemetry
//!
//! A probe is picked once at startup. [`AllocatorProbe`] reads a
//! [`PeakAlloc`], a `stats_alloc` allocator that also tracks the high-water
//! mark of live heap bytes. Its counters only move when it is the binary's
//! `#[global_allocator]`; [`UnavailableProbe`] stands in otherwise.

use serde::Serialize;
use stats_alloc::{StatsAlloc, INSTRUMENTED_SYSTEM};
use std::alloc::{GlobalAlloc, Layout, System};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One memory sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MemoryReading {
    Available { current_mb: f64, peak_mb: f64 },
    Unavailable,
}

impl fmt::Display for MemoryReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryReading::Available { current_mb, peak_mb } => {
                write!(f, "{:.2} MB current, {:.2} MB peak", current_mb, peak_mb)
            }
            MemoryReading::Unavailable => f.write_str("memory telemetry unavailable"),
        }
    }
}

/// Source of memory usage readings
pub trait MemoryProbe: Send + Sync {
    fn name(&self) -> &'static str;

    fn sample(&self) -> MemoryReading;
}

/// Counting allocator that remembers the most bytes ever live at once
///
/// Install with `#[global_allocator] static GLOBAL: &PeakAlloc = &TRACKED_SYSTEM;`
pub struct PeakAlloc {
    stats: &'static StatsAlloc<System>,
    peak_bytes: AtomicUsize,
}

/// The system allocator wrapped in `stats_alloc` counters and peak tracking
pub static TRACKED_SYSTEM: PeakAlloc = PeakAlloc::new(&INSTRUMENTED_SYSTEM);

impl PeakAlloc {
    pub const fn new(stats: &'static StatsAlloc<System>) -> Self {
        Self {
            stats,
            peak_bytes: AtomicUsize::new(0),
        }
    }

    /// Heap bytes currently live
    pub fn current_bytes(&self) -> usize {
        let stats = self.stats.stats();
        stats.bytes_allocated.saturating_sub(stats.bytes_deallocated)
    }

    /// Most heap bytes live at any point so far
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed).max(self.current_bytes())
    }

    fn record(&self) {
        self.peak_bytes.fetch_max(self.current_bytes(), Ordering::Relaxed);
    }
}

unsafe impl GlobalAlloc for PeakAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = self.stats.alloc(layout);
        if !ptr.is_null() {
            self.record();
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        self.stats.dealloc(ptr, layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = self.stats.alloc_zeroed(layout);
        if !ptr.is_null() {
            self.record();
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = self.stats.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() && new_size > layout.size() {
            self.record();
        }
        new_ptr
    }
}

unsafe impl GlobalAlloc for &'static PeakAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        (**self).alloc(layout)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        (**self).dealloc(ptr, layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        (**self).alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        (**self).realloc(ptr, layout, new_size)
    }
}

/// Reads live and peak heap usage from a [`PeakAlloc`]
pub struct AllocatorProbe {
    allocator: &'static PeakAlloc,
}

impl AllocatorProbe {
    pub fn new(allocator: &'static PeakAlloc) -> Self {
        Self { allocator }
    }

    /// Probe over [`TRACKED_SYSTEM`]
    pub fn instrumented_system() -> Self {
        Self::new(&TRACKED_SYSTEM)
    }
}

impl MemoryProbe for AllocatorProbe {
    fn name(&self) -> &'static str {
        "allocator"
    }

    fn sample(&self) -> MemoryReading {
        MemoryReading::Available {
            current_mb: self.allocator.current_bytes() as f64 / BYTES_PER_MB,
            peak_mb: self.allocator.peak_bytes() as f64 / BYTES_PER_MB,
        }
    }
}

/// Probe for builds without an instrumented allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProbe;

impl MemoryProbe for UnavailableProbe {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn sample(&self) -> MemoryReading {
        MemoryReading::Unavailable
    }
}

/// Pick the probe for this process.
pub fn select_probe(instrumented: bool) -> Box<dyn MemoryProbe> {
    if instrumented {
        Box::new(AllocatorProbe::instrumented_system())
    } else {
        Box::new(UnavailableProbe)
    }
}
