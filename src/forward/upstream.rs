use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream, UdpSocket};

use super::ForwardingResolverConfig;
use crate::dns::{DnsRequest, DnsResponse};
use crate::dns_error::UpstreamError;
use crate::libdns::proto::op::Message;
use crate::log::{debug, trace};

const MAX_UDP_RESPONSE_LEN: usize = 4096;

/// Where a forwarding resolver sends its queries.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Relays `request` and returns the decoded reply.
    async fn send(&self, request: &DnsRequest) -> Result<DnsResponse, UpstreamError>;
}

/// Plain DNS over UDP or TCP to one server.
#[derive(Debug, Clone)]
pub struct UdpTcpUpstream {
    server: String,
    port: u16,
    tcp: bool,
    timeout: Duration,
}

impl UdpTcpUpstream {
    pub fn new<S: Into<String>>(server: S, port: u16, tcp: bool, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            port,
            tcp,
            timeout,
        }
    }

    pub fn from_config(cfg: &ForwardingResolverConfig) -> Self {
        Self::new(cfg.server.as_str(), cfg.port, cfg.tcp, cfg.timeout())
    }

    async fn server_addr(&self) -> Result<SocketAddr, UpstreamError> {
        lookup_host((self.server.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| UpstreamError::NoAddress(self.server.clone()))
    }

    async fn exchange(&self, request: &Message) -> Result<Message, UpstreamError> {
        let addr = self.server_addr().await?;
        let query = request.to_vec()?;

        let response = if self.tcp {
            send_tcp_query(&query, addr).await?
        } else {
            let response = send_udp_query(&query, request.id(), addr).await?;
            if response.truncated() {
                debug!("truncated response from {}, retrying over TCP", addr);
                send_tcp_query(&query, addr).await?
            } else {
                response
            }
        };

        if response.id() != request.id() {
            return Err(UpstreamError::IdMismatch {
                expected: request.id(),
                received: response.id(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Upstream for UdpTcpUpstream {
    async fn send(&self, request: &DnsRequest) -> Result<DnsResponse, UpstreamError> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?
    }
}

impl fmt::Display for UdpTcpUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tcp { "tcp" } else { "udp" };
        write!(f, "{}://{}:{}", scheme, self.server, self.port)
    }
}

/// Sends `query` and waits for the datagram answering message `id`.
///
/// Datagrams that fail to decode or carry another id are discarded; the
/// caller's timeout bounds the wait.
async fn send_udp_query(query: &[u8], id: u16, addr: SocketAddr) -> Result<Message, UpstreamError> {
    let local = if addr.is_ipv4() {
        SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0)
    } else {
        SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0)
    };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(addr).await?;
    socket.send(query).await?;

    let mut buf = vec![0u8; MAX_UDP_RESPONSE_LEN];
    loop {
        let len = socket.recv(&mut buf).await?;

        trace!("UDP response from {} ({} bytes)", addr, len);

        match Message::from_vec(&buf[..len]) {
            Ok(response) if response.id() == id => return Ok(response),
            Ok(response) => debug!(
                "discarding datagram from {} with id {}, expected {}",
                addr,
                response.id(),
                id
            ),
            Err(err) => debug!("discarding undecodable datagram from {}: {}", addr, err),
        }
    }
}

async fn send_tcp_query(query: &[u8], addr: SocketAddr) -> Result<Message, UpstreamError> {
    let len = u16::try_from(query.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "query too large for TCP"))?;

    let mut stream = TcpStream::connect(addr).await?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(query).await?;
    stream.flush().await?;

    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;

    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;

    trace!("TCP response from {} ({} bytes)", addr, len);

    Ok(Message::from_vec(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{build_message, response_to, Name, RData, Record, RecordType};
    use crate::libdns::proto::{op::Query, rr::rdata::A};
    use std::str::FromStr;
    use tokio::net::TcpListener;

    fn query() -> Message {
        build_message(Query::query(
            Name::from_str("www.example.com.").unwrap(),
            RecordType::A,
        ))
    }

    fn answer(request: &Message, truncated: bool) -> Vec<u8> {
        let mut response = response_to(request);
        if truncated {
            response.set_truncated(true);
        } else {
            response.add_answer(Record::from_rdata(
                Name::from_str("www.example.com.").unwrap(),
                300,
                RData::A(A::new(192, 0, 2, 1)),
            ));
        }
        response.to_vec().unwrap()
    }

    async fn serve_udp(socket: UdpSocket, truncated: bool) {
        let mut buf = [0u8; 512];
        let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
        let request = Message::from_vec(&buf[..len]).unwrap();
        socket
            .send_to(&answer(&request, truncated), peer)
            .await
            .unwrap();
    }

    async fn serve_tcp(listener: TcpListener) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut len_buf = [0u8; 2];
        stream.read_exact(&mut len_buf).await.unwrap();
        let mut buf = vec![0u8; u16::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut buf).await.unwrap();

        let reply = answer(&Message::from_vec(&buf).unwrap(), false);
        stream
            .write_all(&(reply.len() as u16).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(&reply).await.unwrap();
    }

    #[tokio::test]
    async fn test_udp_exchange() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(serve_udp(socket, false));

        let upstream = UdpTcpUpstream::new("127.0.0.1", port, false, Duration::from_secs(2));
        let request = query();
        let response = upstream.send(&request).await.unwrap();

        assert_eq!(response.id(), request.id());
        assert_eq!(response.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_stray_udp_reply_is_discarded() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let request = Message::from_vec(&buf[..len]).unwrap();

            let mut stray = request.clone();
            stray.set_id(request.id().wrapping_add(1));
            socket.send_to(&answer(&stray, true), peer).await.unwrap();
            socket.send_to(b"junk", peer).await.unwrap();
            socket.send_to(&answer(&request, false), peer).await.unwrap();
        });

        let upstream = UdpTcpUpstream::new("127.0.0.1", port, false, Duration::from_secs(2));
        let request = query();
        let response = upstream.send(&request).await.unwrap();

        assert_eq!(response.id(), request.id());
        assert!(!response.truncated());
        assert_eq!(response.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_tcp_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(serve_tcp(listener));

        let upstream = UdpTcpUpstream::new("127.0.0.1", port, true, Duration::from_secs(2));
        let response = upstream.send(&query()).await.unwrap();

        assert_eq!(response.answers().len(), 1);
        assert_eq!(upstream.to_string(), format!("tcp://127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn test_truncated_udp_falls_back_to_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let socket = UdpSocket::bind(("127.0.0.1", port)).await.unwrap();
        tokio::spawn(serve_udp(socket, true));
        tokio::spawn(serve_tcp(listener));

        let upstream = UdpTcpUpstream::new("127.0.0.1", port, false, Duration::from_secs(2));
        let response = upstream.send(&query()).await.unwrap();

        assert!(!response.truncated());
        assert_eq!(response.answers().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        let upstream =
            UdpTcpUpstream::new("127.0.0.1", port, false, Duration::from_millis(100));
        let err = upstream.send(&query()).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Timeout(_)));
        drop(socket);
    }
}
