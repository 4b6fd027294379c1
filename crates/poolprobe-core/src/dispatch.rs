//! Request dispatch by path

use crate::profiling::ProfilingController;
use crate::search::SearchHandler;
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::{Request, Response};
use std::sync::Arc;

/// Body of every 404
pub const NOT_FOUND_BODY: &str = "unknown resource accessed";

/// Known endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    UserSearch,
    StartProfiling,
    StopProfiling,
    Stop,
}

impl Route {
    /// Exact path match; anything else is unknown
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/userSearch" => Some(Route::UserSearch),
            "/startProfiling" => Some(Route::StartProfiling),
            "/stopProfiling" => Some(Route::StopProfiling),
            "/stop" => Some(Route::Stop),
            _ => None,
        }
    }
}

/// Routes requests to the search handler, the profiler, or shutdown.
///
/// Holds no per-request state; all collaborators are injected.
pub struct Dispatcher {
    search: Arc<dyn SearchHandler>,
    profiler: Arc<ProfilingController>,
    shutdown: ShutdownSignal,
}

impl Dispatcher {
    pub fn new(
        search: Arc<dyn SearchHandler>,
        profiler: Arc<ProfilingController>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            search,
            profiler,
            shutdown,
        }
    }

    pub fn search(&self) -> &Arc<dyn SearchHandler> {
        &self.search
    }

    pub fn profiler(&self) -> &Arc<ProfilingController> {
        &self.profiler
    }

    /// Handle one request
    pub fn dispatch(&self, req: &Request) -> Response {
        match Route::from_path(&req.path) {
            Some(Route::UserSearch) => Response::json(self.search.handle(&req.args())),
            Some(Route::StartProfiling) => self.profile_step("start", self.profiler.start()),
            Some(Route::StopProfiling) => self.profile_step("stop", self.profiler.stop()),
            Some(Route::Stop) => {
                if !self.shutdown.trigger(Shutdown::Requested) {
                    tracing::debug!("shutdown already pending");
                }
                Response::ok()
            }
            None => {
                tracing::debug!(method = %req.method, path = %req.path, "unknown resource");
                Response::not_found(NOT_FOUND_BODY)
            }
        }
    }

    fn profile_step(&self, step: &'static str, outcome: crate::Result<()>) -> Response {
        match outcome {
            Ok(()) => Response::ok(),
            Err(e) => {
                tracing::error!(step, error = %e, "profiling failed");
                let message = format!("{step} profiling: {e}");
                if !self.shutdown.trigger(Shutdown::Fatal(message.clone())) {
                    tracing::debug!("fatal shutdown already pending");
                }
                Response::internal_error(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfilingConfig;
    use crate::search::{self, RESPONSE_STUB};
    use crate::shutdown::{self, ShutdownListener};
    use crate::StatusCode;

    fn dispatcher(with_pool: bool, profiling: ProfilingConfig) -> (Dispatcher, ShutdownListener) {
        let (signal, listener) = shutdown::channel();
        let search = search::handler(with_pool);
        let profiler = Arc::new(ProfilingController::native(profiling).with_search(search.clone()));
        (Dispatcher::new(search, profiler, signal), listener)
    }

    #[test]
    fn test_route_from_path() {
        assert_eq!(Route::from_path("/userSearch"), Some(Route::UserSearch));
        assert_eq!(Route::from_path("/stop"), Some(Route::Stop));
        assert_eq!(Route::from_path("/usersearch"), None);
        assert_eq!(Route::from_path("/stop/"), None);
        assert_eq!(Route::from_path(""), None);
    }

    #[test]
    fn test_user_search() {
        for with_pool in [false, true] {
            let (d, _listener) = dispatcher(with_pool, ProfilingConfig::default());
            let res = d.dispatch(&Request::get("/userSearch?name=Gopher&city=Kazan&limit=34&offset=0"));
            assert_eq!(res.status, StatusCode::OK);
            assert_eq!(res.body.as_ref(), RESPONSE_STUB);
            assert_eq!(res.body_str(), Some(r#"{"organization": "a", "experience": 5}"#));
        }
    }

    #[test]
    fn test_user_search_ignores_garbage_params() {
        let (d, _listener) = dispatcher(true, ProfilingConfig::default());
        let res = d.dispatch(&Request::get("/userSearch?limit=abc&offset=&%zz=1&name"));
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body.as_ref(), RESPONSE_STUB);
    }

    #[test]
    fn test_unknown_path() {
        let (d, _listener) = dispatcher(false, ProfilingConfig::default());
        let res = d.dispatch(&Request::get("/unknown"));
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body_str(), Some(NOT_FOUND_BODY));
    }

    #[test]
    fn test_any_method_accepted() {
        let (d, _listener) = dispatcher(false, ProfilingConfig::default());
        let mut req = Request::get("/userSearch");
        req.method = http::Method::DELETE;
        assert_eq!(d.dispatch(&req).status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stop_signals_shutdown() {
        let (d, mut listener) = dispatcher(false, ProfilingConfig::default());
        assert_eq!(d.dispatch(&Request::get("/stop")).status, StatusCode::OK);
        assert_eq!(d.dispatch(&Request::get("/stop")).status, StatusCode::OK);
        assert_eq!(listener.wait().await, Shutdown::Requested);
    }

    #[test]
    fn test_profiling_without_targets_is_ok() {
        let (d, _listener) = dispatcher(false, ProfilingConfig::default());
        assert_eq!(d.dispatch(&Request::get("/startProfiling")).status, StatusCode::OK);
        assert_eq!(d.dispatch(&Request::get("/stopProfiling")).status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_profiling_file_error_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let profiling = ProfilingConfig {
            cpuprofile: Some(dir.path().join("no-such-dir").join("cpu.pprof")),
            memprofile: None,
        };
        let (d, mut listener) = dispatcher(false, profiling);

        let res = d.dispatch(&Request::get("/startProfiling"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        let reason = listener.wait().await;
        assert!(!reason.is_graceful());
        assert_eq!(reason.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_profiling_error_after_stop_is_still_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let profiling = ProfilingConfig {
            cpuprofile: Some(dir.path().join("no-such-dir").join("cpu.pprof")),
            memprofile: None,
        };
        let (d, mut listener) = dispatcher(false, profiling);

        assert_eq!(d.dispatch(&Request::get("/stop")).status, StatusCode::OK);
        let res = d.dispatch(&Request::get("/startProfiling"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);

        let reason = listener.wait().await;
        assert!(matches!(reason, Shutdown::Fatal(_)));
        assert_eq!(reason.exit_code(), 1);
    }
}
