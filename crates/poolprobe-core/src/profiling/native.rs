//! pprof CPU sampling and dhat heap tracking

use super::ProfileBackend;
use crate::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sampling frequency in Hz, off-beat from common timer periods
#[cfg(unix)]
const CPU_FREQUENCY: i32 = 99;

/// Heap statistics written on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapSnapshot {
    pub total_blocks: u64,
    pub total_bytes: u64,
    pub curr_blocks: usize,
    pub curr_bytes: usize,
    pub max_blocks: usize,
    pub max_bytes: usize,
}

impl From<dhat::HeapStats> for HeapSnapshot {
    fn from(stats: dhat::HeapStats) -> Self {
        Self {
            total_blocks: stats.total_blocks,
            total_bytes: stats.total_bytes,
            curr_blocks: stats.curr_blocks,
            curr_bytes: stats.curr_bytes,
            max_blocks: stats.max_blocks,
            max_bytes: stats.max_bytes,
        }
    }
}

#[cfg(unix)]
struct CpuCapture {
    guard: pprof::ProfilerGuard<'static>,
    out: File,
}

/// Production backend.
///
/// Heap figures come from dhat, which only sees allocations when
/// `dhat::Alloc` is the global allocator. The full dhat profile is written
/// next to the snapshot as `<target>.dhat.json` when the snapshot is taken.
#[derive(Default)]
pub struct NativeBackend {
    #[cfg(unix)]
    cpu: Mutex<Option<CpuCapture>>,
    heap: Mutex<Option<dhat::Profiler>>,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Path of the full dhat profile for a snapshot target
fn dhat_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".dhat.json");
    PathBuf::from(name)
}

impl ProfileBackend for NativeBackend {
    #[cfg(unix)]
    fn start_cpu(&self, out: File) -> Result<()> {
        let guard = pprof::ProfilerGuardBuilder::default()
            .frequency(CPU_FREQUENCY)
            .blocklist(&["libc", "libgcc", "pthread", "vdso"])
            .build()
            .map_err(|e| Error::CpuProfiler(e.to_string()))?;
        *self.cpu.lock() = Some(CpuCapture { guard, out });
        Ok(())
    }

    #[cfg(not(unix))]
    fn start_cpu(&self, _out: File) -> Result<()> {
        Err(Error::CpuProfiler("CPU sampling needs a unix target".to_string()))
    }

    #[cfg(unix)]
    fn stop_cpu(&self) -> Result<()> {
        use pprof::protos::Message;

        let Some(CpuCapture { guard, mut out }) = self.cpu.lock().take() else {
            return Ok(());
        };
        let report = guard
            .report()
            .build()
            .map_err(|e| Error::CpuProfiler(e.to_string()))?;
        // Sampling ends with the guard, before encoding allocates
        drop(guard);

        let profile = report.pprof().map_err(|e| Error::CpuProfiler(e.to_string()))?;
        let mut content = Vec::new();
        profile
            .encode(&mut content)
            .map_err(|e| Error::CpuProfiler(e.to_string()))?;
        out.write_all(&content)?;
        out.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn stop_cpu(&self) -> Result<()> {
        Ok(())
    }

    fn arm_heap(&self, target: &Path) -> Result<()> {
        let mut heap = self.heap.lock();
        if heap.is_none() {
            *heap = Some(dhat::Profiler::builder().file_name(dhat_path(target)).build());
        }
        Ok(())
    }

    fn collect(&self) {
        // Allocations are freed eagerly, there is no deferred garbage to sweep
        tracing::debug!("heap settled for snapshot");
    }

    fn write_heap(&self, out: &mut File) -> Result<()> {
        let Some(profiler) = self.heap.lock().take() else {
            return Err(Error::HeapSnapshot("heap tracking was not armed".to_string()));
        };
        let snapshot = HeapSnapshot::from(dhat::HeapStats::get());
        // Writes the full dhat profile
        drop(profiler);

        serde_json::to_writer_pretty(&mut *out, &snapshot)
            .map_err(|e| Error::HeapSnapshot(e.to_string()))?;
        out.write_all(b"\n")?;
        tracing::debug!(?snapshot, "heap snapshot");
        Ok(())
    }
}
