//! Startup configuration

use crate::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: String,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            hostname: "0.0.0.0".to_string(),
            workers: num_cpus::get(),
        }
    }
}

impl ServerConfig {
    /// Resolve hostname and port into a socket address
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.hostname, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid address {}:{}: {}", self.hostname, self.port, e)))
    }
}

/// Profile output targets
#[derive(Debug, Clone, Default)]
pub struct ProfilingConfig {
    /// CPU profile output (pprof protobuf)
    pub cpuprofile: Option<PathBuf>,
    /// Heap profile output (JSON heap statistics)
    pub memprofile: Option<PathBuf>,
}

impl ProfilingConfig {
    /// True when neither target is configured
    pub fn is_empty(&self) -> bool {
        self.cpuprofile.is_none() && self.memprofile.is_none()
    }
}

/// Everything the process needs to start
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub profiling: ProfilingConfig,
    /// Serve searches from the object pool instead of allocating per request
    pub with_pool: bool,
    /// Start profiling before serving and stop it on graceful shutdown
    pub auto_profile: bool,
}

impl Config {
    /// Reject combinations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.auto_profile && self.profiling.is_empty() {
            return Err(Error::Config(
                "autoProfile needs --cpuprofile or --memprofile".to_string(),
            ));
        }
        if let (Some(cpu), Some(mem)) = (&self.profiling.cpuprofile, &self.profiling.memprofile) {
            if cpu == mem {
                return Err(Error::Config(format!(
                    "cpuprofile and memprofile both point at {}",
                    cpu.display()
                )));
            }
        }
        self.server.addr()?;
        Ok(())
    }

    /// Reject a heap target when the global allocator is not dhat's, since
    /// the snapshot would only ever hold zeros
    pub fn require_heap_tracking(&self, tracked: bool) -> Result<()> {
        match &self.profiling.memprofile {
            Some(path) if !tracked => Err(Error::Config(format!(
                "--memprofile {} needs a build with the dhat-heap feature",
                path.display()
            ))),
            _ => Ok(()),
        }
    }
}
