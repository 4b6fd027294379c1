//! Native HTTP server implementation
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - One accept loop, one task per connection
//! - SO_REUSEADDR / TCP_NODELAY on the listener

use crate::{Dispatcher, Error, Request, Response, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Bound listener, ready to serve
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind `addr`. Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let bind_err = |source: std::io::Error| Error::Bind {
            addr: addr.to_string(),
            source,
        };
        let socket = create_optimized_socket(&addr).map_err(bind_err)?;
        let std_listener: std::net::TcpListener = socket.into();
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let listener = TcpListener::from_std(std_listener).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self, dispatcher: Arc<Dispatcher>) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) if is_transient(&e) => {
                    tracing::warn!(error = %e, "accept failed");
                    if is_fd_exhaustion(&e) {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                    continue;
                }
                Err(e) => return Err(Error::Io(e)),
            };

            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let dispatcher = dispatcher.clone();
                    async move { Ok::<_, Infallible>(handle(&dispatcher, req)) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    // Only log if not a normal connection close
                    if !e.is_incomplete_message() {
                        tracing::debug!(%peer, error = %e, "connection error");
                    }
                }
            });
        }
    }
}

fn handle(dispatcher: &Dispatcher, req: hyper::Request<Incoming>) -> hyper::Response<Full<Bytes>> {
    to_hyper_response(dispatcher.dispatch(&from_hyper_request(&req)))
}

/// Errors that leave the listener usable
fn is_transient(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset
            | ErrorKind::Interrupted
            | ErrorKind::WouldBlock
    ) || is_fd_exhaustion(e)
}

/// Out of descriptors; connections will be accepted again once some close
#[cfg(unix)]
fn is_fd_exhaustion(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::ENFILE | libc::EMFILE))
}

#[cfg(not(unix))]
fn is_fd_exhaustion(_e: &std::io::Error) -> bool {
    false
}

/// Create a TCP socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT
    socket.set_reuse_address(true)?;

    // TCP_NODELAY - disable Nagle's algorithm for lower latency
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Convert hyper request to our Request type
pub fn from_hyper_request<B>(req: &hyper::Request<B>) -> Request {
    let uri = req.uri();
    let mut request = Request::new(req.method().clone(), uri.path());
    request.query = uri.query().map(|s| s.to_string());
    request
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut response = hyper::Response::new(Full::new(res.body));
    *response.status_mut() =
        hyper::StatusCode::from_u16(res.status.as_u16()).unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in res.headers {
        response.headers_mut().insert(
            http::header::HeaderName::from_static(name),
            http::header::HeaderValue::from_static(value),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;

    #[test]
    fn test_from_hyper_request() {
        let req = hyper::Request::builder()
            .method("PUT")
            .uri("/userSearch?name=Gopher&city=Kazan")
            .body(())
            .unwrap();

        let request = from_hyper_request(&req);
        assert_eq!(request.method, http::Method::PUT);
        assert_eq!(request.path, "/userSearch");
        assert_eq!(request.query.as_deref(), Some("name=Gopher&city=Kazan"));
    }

    #[test]
    fn test_to_hyper_response() {
        let res = to_hyper_response(Response::json(b"{}"));
        assert_eq!(res.status(), hyper::StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "application/json");

        let res = to_hyper_response(Response::new(StatusCode(404)));
        assert_eq!(res.status(), hyper::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let first = Server::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let second = Server::bind(first.local_addr());
        assert!(matches!(second, Err(Error::Bind { .. })));
    }
}
