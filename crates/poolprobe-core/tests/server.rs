//! End-to-end tests over a real socket

use poolprobe_core::{App, Config, ProfilingConfig, Server, Shutdown, RESPONSE_STUB};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const TIMEOUT: Duration = Duration::from_secs(10);

fn start(config: Config) -> (SocketAddr, JoinHandle<Shutdown>) {
    let app = App::from_config(&config);
    let server = Server::bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = server.local_addr();
    (addr, tokio::spawn(app.run(server)))
}

/// Send one request and return (status, body)
async fn get(addr: SocketAddr, target: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, body) = raw.split_once("\r\n\r\n").expect("complete response");
    let status = head
        .split(' ')
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line");
    (status, body.to_string())
}

async fn finish(run: JoinHandle<Shutdown>) -> Shutdown {
    tokio::time::timeout(TIMEOUT, run).await.unwrap().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_user_search_example() {
    let (addr, run) = start(Config::default());

    let (status, body) = get(addr, "/userSearch?name=Gopher&city=Kazan&limit=34&offset=0").await;
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"organization": "a", "experience": 5}"#);

    get(addr, "/stop").await;
    assert_eq!(finish(run).await, Shutdown::Requested);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_resource() {
    let (addr, run) = start(Config::default());

    let (status, body) = get(addr, "/unknown").await;
    assert_eq!(status, 404);
    assert_eq!(body, "unknown resource accessed");

    get(addr, "/stop").await;
    finish(run).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pooled_searches() {
    let config = Config {
        with_pool: true,
        ..Config::default()
    };
    let (addr, run) = start(config);

    let clients: Vec<_> = (0..64)
        .map(|i| {
            tokio::spawn(async move {
                let target = format!("/userSearch?name=user{i}&city=c{i}&limit={i}&offset=x");
                get(addr, &target).await
            })
        })
        .collect();

    for client in clients {
        let (status, body) = client.await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body.as_bytes(), RESPONSE_STUB);
    }

    get(addr, "/stop").await;
    assert_eq!(finish(run).await.exit_code(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stops_are_tolerated() {
    let (addr, run) = start(Config::default());

    let stops: Vec<_> = (0..8)
        .map(|_| {
            tokio::spawn(async move {
                // The process may already be going away
                if let Ok(mut stream) = TcpStream::connect(addr).await {
                    let _ = stream
                        .write_all(b"GET /stop HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                        .await;
                    let mut sink = Vec::new();
                    let _ = stream.read_to_end(&mut sink).await;
                }
            })
        })
        .collect();
    for stop in stops {
        stop.await.unwrap();
    }

    assert_eq!(finish(run).await, Shutdown::Requested);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_profiling_file_error_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        profiling: ProfilingConfig {
            cpuprofile: None,
            memprofile: Some(dir.path().join("missing").join("mem.json")),
        },
        ..Config::default()
    };
    let (addr, run) = start(config);

    let (status, _) = get(addr, "/startProfiling").await;
    assert_eq!(status, 500);

    let reason = finish(run).await;
    assert!(!reason.is_graceful());
    assert_eq!(reason.exit_code(), 1);
}
