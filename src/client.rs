//! Connection reuse and a blocking HTTP/1.x client
//!
//! [`ConnectionManager`] keeps at most one transport per host and port. After
//! each response it decides whether the transport may carry the next request
//! ([RFC 7230 section 6.3](https://tools.ietf.org/html/rfc7230#section-6.3)).
//!
//! The manager and client are not synchronized. Their methods take
//! `&mut self`, and a caller sharing one between threads must serialize
//! access, for example with a `Mutex`.
use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Debug,
    io::{ErrorKind, Read, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    time::Duration,
};

use url::Url;

use crate::{
    body::BodyType,
    error::{CloseError, ConfigError, GeneralError},
    message::{HttpVersion, Request, Response},
    parser::{MessageParser, ParserConfig},
};

pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Bidirectional byte stream to a remote host.
pub trait Transport: Read + Write + Send + Debug {
    /// Returns whether the transport can carry another request.
    ///
    /// Must not consume any bytes.
    fn is_open(&self) -> bool;

    /// Returns an independent handle for reading from the same stream.
    fn try_clone_reader(&self) -> std::io::Result<Box<dyn Read + Send>>;

    /// Shuts down both directions of the stream.
    fn shutdown(&mut self) -> std::io::Result<()>;
}

/// Opens transports to remote hosts.
pub trait Connector {
    type Transport: Transport;

    fn connect(&mut self, host: &str, port: u16) -> std::io::Result<Self::Transport>;
}

impl Transport for TcpStream {
    fn is_open(&self) -> bool {
        if self.set_nonblocking(true).is_err() {
            return false;
        }

        let mut buf = [0u8; 1];
        let result = self.peek(&mut buf);

        if self.set_nonblocking(false).is_err() {
            return false;
        }

        match result {
            // An idle connection has nothing to read until a request is sent.
            Err(error) if error.kind() == ErrorKind::WouldBlock => true,
            Ok(0) => false,
            Ok(_) => {
                tracing::debug!("unexpected data on idle connection");
                false
            }
            Err(error) => {
                tracing::debug!(%error, "idle connection failed");
                false
            }
        }
    }

    fn try_clone_reader(&self) -> std::io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn shutdown(&mut self) -> std::io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Connects with [`TcpStream`].
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let Some(timeout) = self.connect_timeout else {
            return TcpStream::connect((host, port));
        };

        let mut last_error = None;

        for address in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    tracing::debug!(%address, %error, "connect failed");
                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            std::io::Error::new(ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }
}

impl Connector for TcpConnector {
    type Transport = TcpStream;

    fn connect(&mut self, host: &str, port: u16) -> std::io::Result<TcpStream> {
        let stream = self.open(host, port)?;

        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        stream.set_nodelay(self.nodelay)?;

        Ok(stream)
    }
}

/// Client options.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Port used for `http` URIs without an explicit port.
    pub http_port: u16,
    /// Port used for `https` URIs without an explicit port.
    pub https_port: u16,
    /// Options for reading responses.
    pub parser: ParserConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            parser: ParserConfig::strict(),
        }
    }
}

/// Keeps one transport per host and port and decides when to close it.
#[derive(Debug)]
pub struct ConnectionManager<C: Connector = TcpConnector> {
    connector: C,
    http_port: u16,
    https_port: u16,
    transports: HashMap<String, C::Transport>,
}

impl ConnectionManager<TcpConnector> {
    pub fn new() -> Self {
        Self::with_connector(TcpConnector::default(), &ClientConfig::default())
    }
}

impl Default for ConnectionManager<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn with_connector(connector: C, config: &ClientConfig) -> Self {
        Self {
            connector,
            http_port: config.http_port,
            https_port: config.https_port,
            transports: HashMap::new(),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of addresses with a tracked transport.
    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    /// Returns whether a transport is tracked for the URI's host and port.
    pub fn contains(&self, uri: &Url) -> bool {
        self.address_for(uri)
            .is_ok_and(|address| self.transports.contains_key(&address))
    }

    /// Returns a transport to the URI's host and port, connecting if there is
    /// none or the tracked one is no longer open.
    ///
    /// Fails without any I/O if the URI has no host or no known port.
    pub fn acquire(&mut self, uri: &Url) -> Result<&mut C::Transport, GeneralError> {
        let host = uri.host_str().ok_or(ConfigError::MissingHost)?;
        let port = self.port_for(uri)?;
        let address = format!("{}:{}", host, port);

        match self.transports.entry(address) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_open() {
                    tracing::trace!(address = entry.key(), "reusing connection");
                    return Ok(entry.into_mut());
                }

                tracing::debug!(address = entry.key(), "replacing stale connection");
                let transport = self.connector.connect(host, port)?;
                let mut stale = entry.insert(transport);
                shutdown_quietly(entry.key(), &mut stale);

                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                tracing::debug!(address = entry.key(), "connecting");
                let transport = self.connector.connect(host, port)?;

                Ok(entry.insert(transport))
            }
        }
    }

    /// Applies the keep-alive policy to a response received from the URI.
    ///
    /// If the server closes the connection, announced by `Connection: close`
    /// or a version older than HTTP/1.1, the transport is no longer tracked,
    /// the body is read into memory and the transport is shut down. A body
    /// delimited by the end of the connection is handled the same way.
    /// Otherwise the response is returned unchanged.
    pub fn on_response(&mut self, uri: &Url, response: Response) -> Result<Response, GeneralError> {
        if !must_close(&response) {
            return Ok(response);
        }

        let transport = self
            .address_for(uri)
            .ok()
            .and_then(|address| self.transports.remove_entry(&address));

        let response = response.eagerly()?;

        if let Some((address, mut transport)) = transport {
            tracing::debug!(address, "closing connection after response");
            shutdown_quietly(&address, &mut transport);
        }

        Ok(response)
    }

    /// Stops tracking the transport for the URI's host and port and shuts it
    /// down.
    pub fn discard(&mut self, uri: &Url) {
        if let Some((address, mut transport)) = self
            .address_for(uri)
            .ok()
            .and_then(|address| self.transports.remove_entry(&address))
        {
            tracing::debug!(address, "discarding connection");
            shutdown_quietly(&address, &mut transport);
        }
    }

    /// Shuts down every tracked transport.
    ///
    /// All transports are shut down even if some fail. Lazy bodies still
    /// reading from a transport fail or end afterwards.
    pub fn close(&mut self) -> Result<(), CloseError> {
        let mut errors = Vec::new();

        for (address, mut transport) in self.transports.drain() {
            tracing::debug!(address, "closing connection");

            if let Err(error) = transport.shutdown() {
                tracing::warn!(address, %error, "failed to close connection");
                errors.push((address, error));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CloseError::new(errors))
        }
    }

    fn address_for(&self, uri: &Url) -> Result<String, ConfigError> {
        let host = uri.host_str().ok_or(ConfigError::MissingHost)?;
        let port = self.port_for(uri)?;

        Ok(format!("{}:{}", host, port))
    }

    fn port_for(&self, uri: &Url) -> Result<u16, ConfigError> {
        if let Some(port) = uri.port() {
            return Ok(port);
        }

        match uri.scheme() {
            "http" => Ok(self.http_port),
            "https" => Ok(self.https_port),
            scheme => Err(ConfigError::UnsupportedScheme(scheme.to_string())),
        }
    }
}

fn must_close(response: &Response) -> bool {
    response
        .headers()
        .get_comma_list("Connection")
        .iter()
        .any(|item| item == "close")
        || response.version().is_older_than(HttpVersion::HTTP_1_1)
        || response
            .body()
            .is_some_and(|body| body.kind() == BodyType::CloseDelimited)
}

fn shutdown_quietly<T: Transport>(address: &str, transport: &mut T) {
    if let Err(error) = transport.shutdown() {
        tracing::warn!(address, %error, "failed to close connection");
    }
}

/// Sends requests over connections managed by a [`ConnectionManager`].
///
/// Responses are returned with lazy bodies when the connection stays open.
/// Such a body must be read to the end, or made eager, before sending the
/// next request to the same host and port.
#[derive(Debug)]
pub struct TcpClient<C: Connector = TcpConnector> {
    manager: ConnectionManager<C>,
    parser: MessageParser,
}

impl TcpClient<TcpConnector> {
    pub fn new() -> Self {
        Self::with_connector(TcpConnector::default(), ClientConfig::default())
    }
}

impl Default for TcpClient<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> TcpClient<C> {
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self {
            manager: ConnectionManager::with_connector(connector, &config),
            parser: MessageParser::new(config.parser),
        }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ConnectionManager<C> {
        &mut self.manager
    }

    /// Sends the request and reads the response header.
    ///
    /// Failed requests are not retried. The connection is discarded when
    /// writing the request or reading the response fails.
    pub fn send(&mut self, request: Request) -> Result<Response, GeneralError> {
        let uri = request.uri().clone();
        let method = request.method().to_string();

        let transport = self.manager.acquire(&uri)?;

        match exchange(&self.parser, transport, request, &method) {
            Ok(response) => self.manager.on_response(&uri, response),
            Err(error) => {
                self.manager.discard(&uri);
                Err(error)
            }
        }
    }

    /// Closes all connections.
    pub fn close(&mut self) -> Result<(), CloseError> {
        self.manager.close()
    }
}

fn exchange<T: Transport>(
    parser: &MessageParser,
    transport: &mut T,
    request: Request,
    method: &str,
) -> Result<Response, GeneralError> {
    tracing::debug!(
        method,
        target = request.request_line().target.as_str(),
        "sending request"
    );

    request.write_to(&mut *transport)?;

    let reader = transport.try_clone_reader()?;

    parser.parse_response_to(reader, method)
}
