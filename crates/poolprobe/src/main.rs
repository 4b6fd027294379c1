//! poolprobe - A/B allocation profiling server
//!
//! ```bash
//! # allocate per request
//! poolprobe --cpuprofile cpu.pprof --memprofile mem.json
//! # reuse request objects from the pool
//! poolprobe --withPool --cpuprofile cpu.pprof --memprofile mem.json
//!
//! curl localhost:8080/startProfiling
//! # ... load /userSearch ...
//! curl localhost:8080/stopProfiling
//! curl localhost:8080/stop
//! ```
//!
//! `--memprofile` needs a build with `--features dhat-heap`.

use clap::Parser;
use poolprobe_core::{logging, App, Config, ProfilingConfig, Server, ServerConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

#[cfg(not(feature = "dhat-heap"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "poolprobe", version, about = "Compare pooled and per-request allocation under profiling")]
struct Cli {
    /// Reuse request objects from a pool
    #[arg(long = "withPool", env = "POOLPROBE_WITH_POOL")]
    with_pool: bool,

    /// Write CPU profile to the specified file
    #[arg(long, env = "POOLPROBE_CPUPROFILE", value_name = "PATH")]
    cpuprofile: Option<PathBuf>,

    /// Write memory profile to the specified file
    #[arg(long, env = "POOLPROBE_MEMPROFILE", value_name = "PATH")]
    memprofile: Option<PathBuf>,

    /// Profile the whole run instead of waiting for /startProfiling
    #[arg(long = "autoProfile", env = "POOLPROBE_AUTO_PROFILE")]
    auto_profile: bool,

    /// Port to listen on
    #[arg(long, env = "POOLPROBE_PORT", default_value_t = 8080)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "POOLPROBE_HOSTNAME", default_value = "0.0.0.0")]
    hostname: String,

    /// Runtime worker threads (defaults to the CPU count)
    #[arg(long, env = "POOLPROBE_WORKERS")]
    workers: Option<usize>,

    /// Emit logs as JSON lines
    #[arg(long = "logJson", env = "POOLPROBE_LOG_JSON")]
    log_json: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config {
            server: ServerConfig {
                port: self.port,
                hostname: self.hostname,
                workers: self.workers.unwrap_or_else(num_cpus::get),
            },
            profiling: ProfilingConfig {
                cpuprofile: self.cpuprofile,
                memprofile: self.memprofile,
            },
            with_pool: self.with_pool,
            auto_profile: self.auto_profile,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.log_json {
        logging::init_logging_json();
    } else {
        logging::init_logging();
    }

    let config = cli.into_config();
    let checked = config
        .validate()
        .and_then(|()| config.require_heap_tracking(cfg!(feature = "dhat-heap")));
    if let Err(e) = checked {
        tracing::error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    let reason = runtime.block_on(async {
        let addr = config.server.addr()?;
        let server = Server::bind(addr)?;
        let app = App::from_config(&config);
        Ok::<_, poolprobe_core::Error>(app.run(server).await)
    });

    match reason {
        Ok(reason) => ExitCode::from(reason.exit_code()),
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            ExitCode::FAILURE
        }
    }
}
