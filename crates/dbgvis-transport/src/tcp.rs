use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::SocketStream;

/// Default host a client connects to.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port of the debug-visualization service.
pub const DEFAULT_PORT: u16 = 5525;

/// TCP transport endpoint.
///
/// Provides bind/accept on the server side and connect on the client side.
/// The listener stays bound for the endpoint's lifetime, so a server can go
/// back to accepting after a client disconnects without losing its port.
pub struct TcpEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpEndpoint {
    /// Bind and listen on `host:port`.
    ///
    /// Every resolved address is tried in order; the first one that binds wins.
    pub fn bind(host: &str, port: u16) -> Result<Self> {
        let display = format!("{host}:{port}");
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpListener::bind(addr) {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
                        addr: display.clone(),
                        source: e,
                    })?;
                    info!(%local_addr, "listening on tcp socket");
                    return Ok(Self {
                        listener,
                        local_addr,
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Bind {
            addr: display,
            source: last_err.unwrap_or_else(|| ErrorKind::AddrNotAvailable.into()),
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<SocketStream> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        SocketStream::from_tcp(stream)
    }

    /// Accept an incoming connection if one is pending.
    ///
    /// The listener must have been switched to non-blocking mode with
    /// [`TcpEndpoint::set_nonblocking`]; otherwise this blocks like `accept`.
    /// The returned stream is always in blocking mode.
    pub fn try_accept(&self) -> Result<Option<SocketStream>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                // BSD-derived platforms hand out accepted sockets that inherit O_NONBLOCK.
                stream.set_nonblocking(false)?;
                debug!(%addr, "accepted connection");
                SocketStream::from_tcp(stream).map(Some)
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    /// Switch the listener between blocking and non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// Connect to a listening endpoint (blocking).
    pub fn connect(host: &str, port: u16) -> Result<SocketStream> {
        Self::connect_inner(host, port, None)
    }

    /// Connect with an upper bound on the time spent per resolved address.
    pub fn connect_timeout(host: &str, port: u16, timeout: Duration) -> Result<SocketStream> {
        Self::connect_inner(host, port, Some(timeout))
    }

    fn connect_inner(host: &str, port: u16, timeout: Option<Duration>) -> Result<SocketStream> {
        let display = format!("{host}:{port}");
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    debug!(%addr, "connected to tcp socket");
                    return SocketStream::from_tcp(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Connect {
            addr: display,
            source: last_err.unwrap_or_else(|| ErrorKind::AddrNotAvailable.into()),
        })
    }

    /// The address this endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| TransportError::Unresolved(format!("{host}:{port}")))?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Unresolved(format!("{host}:{port}")));
    }
    Ok(addrs)
}
