//! Process lifecycle
//!
//! Serve on a background task, park the caller on the shutdown listener,
//! report why the process should exit.

use crate::config::Config;
use crate::profiling::{NativeBackend, ProfileBackend, ProfilingController};
use crate::search;
use crate::server::Server;
use crate::shutdown::{self, Shutdown, ShutdownListener, ShutdownSignal};
use crate::Dispatcher;
use std::sync::Arc;

/// Wired-up application: dispatcher plus both ends of the shutdown channel
pub struct App {
    dispatcher: Arc<Dispatcher>,
    signal: ShutdownSignal,
    listener: ShutdownListener,
    auto_profile: bool,
}

impl App {
    /// Wire the components from `config`, using `backend` for profiling
    pub fn new(config: &Config, backend: Arc<dyn ProfileBackend>) -> Self {
        let (signal, listener) = shutdown::channel();
        let search = search::handler(config.with_pool);
        let profiler = Arc::new(
            ProfilingController::new(config.profiling.clone(), backend).with_search(search.clone()),
        );
        let dispatcher = Arc::new(Dispatcher::new(search, profiler, signal.clone()));

        Self {
            dispatcher,
            signal,
            listener,
            auto_profile: config.auto_profile,
        }
    }

    /// Wire the components with the pprof/dhat backend
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, Arc::new(NativeBackend::new()))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Handle for posting a shutdown from outside the request path
    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Serve until a shutdown signal arrives and return it
    pub async fn run(mut self, server: Server) -> Shutdown {
        let profiler = self.dispatcher.profiler().clone();

        if self.auto_profile {
            if let Err(e) = profiler.start() {
                tracing::error!(error = %e, "failed to start profiling");
                return Shutdown::Fatal(e.to_string());
            }
        }

        tracing::info!(
            addr = %server.local_addr(),
            handler = self.dispatcher.search().mode(),
            "listening"
        );

        let dispatcher = self.dispatcher.clone();
        let signal = self.signal.clone();
        let serving = tokio::spawn(async move {
            if let Err(e) = server.serve(dispatcher).await {
                tracing::error!(error = %e, "listen and serve error");
                signal.trigger(Shutdown::Fatal(e.to_string()));
            }
        });

        let reason = self.listener.wait().await;
        serving.abort();

        if self.auto_profile && reason.is_graceful() {
            if let Err(e) = profiler.stop() {
                tracing::error!(error = %e, "failed to stop profiling");
                return Shutdown::Fatal(e.to_string());
            }
        }

        match &reason {
            Shutdown::Requested => tracing::info!("stop requested, exiting"),
            Shutdown::Fatal(why) => tracing::error!(reason = %why, "fatal error, exiting"),
        }
        reason
    }
}
