use std::{
    io::{Cursor, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, channel},
    },
    thread::JoinHandle,
    time::Duration,
};

use rawhttp::{
    body::{Body, BodyType, MessageBody},
    client::TcpClient,
    error::ConfigError,
    message::Request,
    parser::MessageParser,
};
use url::Url;

struct Reply {
    bytes: &'static [u8],
    /// Server closes the connection after the reply.
    close: bool,
}

impl Reply {
    fn keep(bytes: &'static [u8]) -> Self {
        Self {
            bytes,
            close: false,
        }
    }

    fn close(bytes: &'static [u8]) -> Self {
        Self { bytes, close: true }
    }
}

struct TestServer {
    address: SocketAddr,
    connections: Arc<AtomicUsize>,
    closed: Receiver<()>,
    handle: JoinHandle<Vec<String>>,
}

impl TestServer {
    /// Serves the replies in order, one per request, on as many connections
    /// as the client opens.
    fn spawn(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let (closed_sender, closed) = channel();

        let handle = std::thread::spawn(move || {
            let parser = MessageParser::default();
            let mut replies = replies.into_iter();
            let mut requests = Vec::new();

            'accept: while !replies.as_slice().is_empty() {
                let (stream, _) = listener.accept().unwrap();
                counter.fetch_add(1, Ordering::SeqCst);

                loop {
                    let request = match parser.parse_request(stream.try_clone().unwrap()) {
                        Ok(request) => request.eagerly().unwrap(),
                        Err(_) => break,
                    };

                    let body = request
                        .body()
                        .and_then(MessageBody::as_eager)
                        .map(|body| body.to_text().into_owned())
                        .unwrap_or_default();
                    requests.push(
                        format!("{} {} {}", request.method(), request.request_line().target, body)
                            .trim_end()
                            .to_string(),
                    );

                    let Some(reply) = replies.next() else {
                        break 'accept;
                    };

                    (&stream).write_all(reply.bytes).unwrap();

                    if reply.close {
                        stream.shutdown(Shutdown::Both).unwrap();
                        closed_sender.send(()).unwrap();
                        break;
                    }
                }
            }

            requests
        });

        Self {
            address,
            connections,
            closed,
            handle,
        }
    }

    fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.address, path)).unwrap()
    }

    fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn wait_closed(&self) {
        self.closed.recv_timeout(Duration::from_secs(5)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
    }

    fn join(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn read_body(body: Option<MessageBody>) -> Vec<u8> {
    body.unwrap().into_bytes().unwrap()
}

#[tracing_test::traced_test]
#[test]
fn test_keep_alive_reuses_connection() {
    let server = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nfirst"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecond"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/a"))).unwrap();
    assert!(!response.body().unwrap().is_eager());
    assert!(client.manager().contains(&server.url("/")));
    assert_eq!(read_body(response.into_body()), b"first");

    let response = client.send(Request::new("GET", server.url("/b"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"second");

    assert_eq!(server.connections(), 1);

    client.close().unwrap();
    assert_eq!(server.join(), ["GET /a", "GET /b"]);
}

#[tracing_test::traced_test]
#[test]
fn test_explicit_keep_alive_reuses_connection() {
    let server = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.1 200 OK\r\nConnection: keep-alive\r\nContent-Length: 5\r\n\r\nfirst"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nConnection: Keep-Alive\r\nContent-Length: 6\r\n\r\nsecond"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/a"))).unwrap();
    assert!(!response.body().unwrap().is_eager());
    assert!(client.manager().contains(&server.url("/")));
    assert_eq!(read_body(response.into_body()), b"first");

    let response = client.send(Request::new("GET", server.url("/b"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"second");
    assert_eq!(server.connections(), 1);

    client.close().unwrap();
    assert_eq!(server.join(), ["GET /a", "GET /b"]);
}

#[tracing_test::traced_test]
#[test]
fn test_ports_on_one_host_use_separate_connections() {
    let server_a = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nA"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nA"),
    ]);
    let server_b = TestServer::spawn(vec![Reply::keep(
        b"HTTP/1.1 200 OK\r\nContent-Length: 1\r\n\r\nB",
    )]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server_a.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"A");

    let response = client.send(Request::new("GET", server_b.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"B");

    let response = client.send(Request::new("GET", server_a.url("/again"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"A");

    assert_eq!(client.manager().len(), 2);
    assert_eq!(server_a.connections(), 1);
    assert_eq!(server_b.connections(), 1);

    client.close().unwrap();
    assert_eq!(server_a.join(), ["GET /", "GET /again"]);
    assert_eq!(server_b.join(), ["GET /"]);
}

#[tracing_test::traced_test]
#[test]
fn test_connection_close_is_eager_and_forgotten() {
    let server = TestServer::spawn(vec![
        Reply::close(b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 3\r\n\r\nbye"),
        Reply::keep(b"HTTP/1.1 204 No Content\r\n\r\n"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();

    assert!(response.body().unwrap().is_eager());
    assert!(client.manager().is_empty());
    assert_eq!(read_body(response.into_body()), b"bye");

    let response = client.send(Request::new("GET", server.url("/again"))).unwrap();
    assert_eq!(response.status_code(), 204);
    assert!(response.body().is_none());

    assert_eq!(server.connections(), 2);

    client.close().unwrap();
    server.join();
}

#[tracing_test::traced_test]
#[test]
fn test_http_1_0_closes_connection() {
    let server = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.0 200 OK\r\nContent-Length: 2\r\n\r\nv0"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nv1"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();
    assert!(response.body().unwrap().is_eager());
    assert!(client.manager().is_empty());
    assert_eq!(read_body(response.into_body()), b"v0");

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"v1");
    assert_eq!(server.connections(), 2);

    client.close().unwrap();
    server.join();
}

#[tracing_test::traced_test]
#[test]
fn test_head_response_has_no_body() {
    let server = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\n"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("HEAD", server.url("/"))).unwrap();
    assert!(response.body().is_none());
    assert_eq!(response.headers().get("content-length"), ["11"]);

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"hello world");
    assert_eq!(server.connections(), 1);

    client.close().unwrap();
    assert_eq!(server.join(), ["HEAD /", "GET /"]);
}

#[tracing_test::traced_test]
#[test]
fn test_chunked_response_with_trailer() {
    let server = TestServer::spawn(vec![
        Reply::keep(
            b"HTTP/1.1 200 OK\r\n\
            Transfer-Encoding: chunked\r\n\
            \r\n\
            4\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Checksum: 123\r\n\r\n",
        ),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\nnext"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/wiki"))).unwrap();
    let mut body = response.into_body().unwrap();
    assert_eq!(body.kind(), BodyType::Chunked);

    let reader = body.as_lazy_mut().unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).unwrap();

    assert_eq!(data, b"Wikipedia");
    assert_eq!(reader.trailer().unwrap().get("x-checksum"), ["123"]);

    let response = client.send(Request::new("GET", server.url("/next"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"next");
    assert_eq!(server.connections(), 1);

    client.close().unwrap();
    server.join();
}

#[tracing_test::traced_test]
#[test]
fn test_request_bodies() {
    let server = TestServer::spawn(vec![
        Reply::keep(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"),
        Reply::keep(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n"),
    ]);
    let mut client = TcpClient::new();

    let request = Request::new("POST", server.url("/fixed"))
        .with_body(Body::text(Some("text/plain".to_string()), "plain body"))
        .unwrap();
    let response = client.send(request).unwrap();
    assert_eq!(response.status_code(), 201);
    assert_eq!(read_body(response.into_body()), b"");

    let request = Request::new("PUT", server.url("/chunked"))
        .with_body(Body::chunked(
            None,
            Cursor::new(b"streamed in chunks".to_vec()),
            4,
        ))
        .unwrap();
    let response = client.send(request).unwrap();
    assert_eq!(response.status_code(), 201);
    assert_eq!(read_body(response.into_body()), b"");

    client.close().unwrap();
    assert_eq!(
        server.join(),
        ["POST /fixed plain body", "PUT /chunked streamed in chunks"]
    );
}

#[tracing_test::traced_test]
#[test]
fn test_stale_connection_replaced() {
    let server = TestServer::spawn(vec![
        // Closed without announcing it.
        Reply::close(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\none"),
        Reply::keep(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\ntwo"),
    ]);
    let mut client = TcpClient::new();

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"one");
    assert!(client.manager().contains(&server.url("/")));

    server.wait_closed();

    let response = client.send(Request::new("GET", server.url("/"))).unwrap();
    assert_eq!(read_body(response.into_body()), b"two");
    assert_eq!(server.connections(), 2);

    client.close().unwrap();
    server.join();
}

#[tracing_test::traced_test]
#[test]
fn test_missing_host_sends_nothing() {
    let mut client = TcpClient::new();
    let request = Request::new("GET", Url::parse("data:text/plain,hello").unwrap());

    let error = client.send(request).unwrap_err();

    assert_eq!(error.as_config(), Some(&ConfigError::MissingHost));
    assert!(client.manager().is_empty());
}
