//! poolprobe-core: allocation-strategy probe server
//!
//! A `/userSearch` endpoint that does a fixed amount of per-request work,
//! served either with a fresh request object per call or with objects reused
//! from a pool, plus HTTP triggers for CPU and heap profiling so the two
//! strategies can be compared run against run.
//!
//! ## Endpoints
//! - `/userSearch` - stub search, constant JSON body
//! - `/startProfiling`, `/stopProfiling` - profile capture to configured files
//! - `/stop` - graceful process shutdown

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod args;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod pool;
pub mod profiling;
pub mod request;
pub mod response;
pub mod search;
pub mod server;
pub mod shutdown;

// Re-exports
pub use args::{Params, QueryArgs};
pub use config::{Config, ProfilingConfig, ServerConfig};
pub use dispatch::{Dispatcher, Route, NOT_FOUND_BODY};
pub use error::{Error, Result};
pub use lifecycle::App;
pub use pool::{Pool, PoolStats};
pub use profiling::{HeapSnapshot, NativeBackend, ProfileBackend, ProfilingController};
pub use request::Request;
pub use response::{Response, StatusCode};
pub use search::{search, Pooled, SearchHandler, SearchRequest, Unpooled, RESPONSE_STUB};
pub use server::Server;
pub use shutdown::{Shutdown, ShutdownListener, ShutdownSignal};
