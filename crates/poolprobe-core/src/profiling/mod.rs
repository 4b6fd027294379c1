//! Profiling lifecycle
//!
//! The controller owns the output files and the start/stop sequencing; the
//! actual samplers sit behind [`ProfileBackend`].
//!
//! ```text
//! start: create cpu file -> start_cpu        create heap file -> arm_heap
//! stop:  stop_cpu (writes cpu file)          collect -> write_heap -> close
//! ```
//!
//! Every failure is returned to the caller, which treats it as fatal.

mod native;

pub use native::{HeapSnapshot, NativeBackend};

use crate::config::ProfilingConfig;
use crate::search::SearchHandler;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Samplers driven by the controller
pub trait ProfileBackend: Send + Sync {
    /// Begin continuous CPU sampling; the profile goes to `out` on stop
    fn start_cpu(&self, out: File) -> Result<()>;

    /// Stop CPU sampling and write the profile. No-op when not sampling.
    fn stop_cpu(&self) -> Result<()>;

    /// Begin tracking heap allocations for a later snapshot to `target`
    fn arm_heap(&self, target: &Path) -> Result<()>;

    /// Settle the heap before a snapshot
    fn collect(&self);

    /// Write one heap snapshot to `out`
    fn write_heap(&self, out: &mut File) -> Result<()>;
}

#[derive(Default)]
struct Session {
    cpu_active: bool,
    heap_file: Option<File>,
}

/// Starts and stops profile capture to the configured files
pub struct ProfilingController {
    config: ProfilingConfig,
    backend: Arc<dyn ProfileBackend>,
    session: Mutex<Session>,
    search: Option<Arc<dyn SearchHandler>>,
}

impl ProfilingController {
    pub fn new(config: ProfilingConfig, backend: Arc<dyn ProfileBackend>) -> Self {
        Self {
            config,
            backend,
            session: Mutex::new(Session::default()),
            search: None,
        }
    }

    /// Controller backed by pprof and dhat
    pub fn native(config: ProfilingConfig) -> Self {
        Self::new(config, Arc::new(NativeBackend::new()))
    }

    /// Report this handler's pool counters when profiling stops
    pub fn with_search(mut self, search: Arc<dyn SearchHandler>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn config(&self) -> &ProfilingConfig {
        &self.config
    }

    /// True while CPU sampling runs
    pub fn is_cpu_active(&self) -> bool {
        self.session.lock().cpu_active
    }

    /// True while a heap snapshot is pending
    pub fn is_heap_armed(&self) -> bool {
        self.session.lock().heap_file.is_some()
    }

    /// Open the configured targets and start capturing
    pub fn start(&self) -> Result<()> {
        // Logging first, so its own allocations land before the capture
        if let Some(path) = &self.config.cpuprofile {
            tracing::info!(path = %path.display(), "collecting CPU profile");
        }
        if let Some(path) = &self.config.memprofile {
            tracing::info!(path = %path.display(), "collecting heap profile");
        }

        let mut session = self.session.lock();

        if let Some(path) = &self.config.cpuprofile {
            if session.cpu_active {
                tracing::warn!("CPU profile already running, restarting it");
                self.backend.stop_cpu()?;
                session.cpu_active = false;
            }
            let file = create(path)?;
            self.backend.start_cpu(file)?;
            session.cpu_active = true;
        }

        if let Some(path) = &self.config.memprofile {
            if session.heap_file.is_some() {
                // TODO: refuse a second start instead of discarding the pending snapshot
                tracing::warn!("heap profile already armed, replacing its file");
            }
            session.heap_file = Some(create(path)?);
            self.backend.arm_heap(path)?;
        }

        Ok(())
    }

    /// Finish the capture and close the files
    pub fn stop(&self) -> Result<()> {
        let mut session = self.session.lock();

        let cpu_written = session.cpu_active;
        session.cpu_active = false;
        self.backend.stop_cpu()?;

        let heap_written = match session.heap_file.take() {
            Some(mut file) => {
                self.backend.collect();
                self.backend.write_heap(&mut file)?;
                file.sync_all().map_err(|e| self.heap_error(e))?;
                true
            }
            None => false,
        };
        drop(session);

        if cpu_written {
            if let Some(path) = &self.config.cpuprofile {
                tracing::info!(path = %path.display(), "written CPU profile");
            }
        }
        if heap_written {
            if let Some(path) = &self.config.memprofile {
                tracing::info!(path = %path.display(), "written heap profile");
            }
        }
        if let Some(stats) = self.search.as_ref().and_then(|s| s.pool_stats()) {
            tracing::info!(
                created = stats.created,
                reused = stats.reused,
                hit_rate = stats.hit_rate(),
                "request pool statistics"
            );
        }

        Ok(())
    }

    fn heap_error(&self, source: std::io::Error) -> Error {
        match &self.config.memprofile {
            Some(path) => Error::profile_file(path, source),
            None => Error::Io(source),
        }
    }
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| Error::profile_file(path, e))
}
