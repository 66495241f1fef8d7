//! UDP transport
//!
//! Star topology over a non-blocking [`UdpSocket`]. Clients only talk to the
//! host; the host relays client broadcasts and directed sends. Delivery is
//! best effort: the `reliable` flag is accepted but not honoured.
//!
//! # Wire Format
//!
//! ```text
//! [HELLO][name...]                    client -> host
//! [WELCOME][peer:u32]                 host -> client
//! [DATA][from:u32][to:u32][bytes...]  either way, to = 0 means everyone
//! [HEARTBEAT]                         either way
//! [BYE][peer:u32]                     peer left (or was dropped)
//! ```

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use super::{Transport, TransportError, TransportEvent};
use crate::net::types::PeerHandle;

/// Default port hosts listen on
pub const DEFAULT_PORT: u16 = 2100;

/// Buffer size for incoming datagrams
const RECV_BUFFER_SIZE: usize = 16384;

const HOST_PEER: PeerHandle = PeerHandle(1);
const BROADCAST: u32 = 0;

const FRAME_HELLO: u8 = 1;
const FRAME_WELCOME: u8 = 2;
const FRAME_DATA: u8 = 3;
const FRAME_HEARTBEAT: u8 = 4;
const FRAME_BYE: u8 = 5;

const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1000);
const HELLO_RETRY: Duration = Duration::from_millis(250);

#[derive(Debug)]
struct PeerLink {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Non-blocking UDP endpoint
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer: PeerHandle,
    /// Host: every client. Client: just the host.
    links: HashMap<PeerHandle, PeerLink>,
    addr_to_peer: HashMap<SocketAddr, PeerHandle>,
    next_peer: u32,
    timeout: Duration,
    last_heartbeat: Instant,
    recv_buf: Vec<u8>,
    events: VecDeque<TransportEvent>,
    open: bool,
}

impl UdpTransport {
    /// Listen for clients on `addr` (e.g. "0.0.0.0:2100" or "127.0.0.1:0")
    pub fn connect_as_host(addr: &str, timeout: Duration) -> Result<Self, TransportError> {
        let socket = bind(addr)?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::Bind(format!("Failed to get local addr: {}", e)))?;

        tracing::info!(port = local_addr.port(), "UDP host listening");

        Ok(Self::from_parts(socket, local_addr, HOST_PEER, timeout))
    }

    /// Connect to a host and wait (up to `timeout`) for a peer handle
    ///
    /// This is the only call in the transport that waits.
    pub fn connect_as_client(host: &str, name: &str, timeout: Duration) -> Result<Self, TransportError> {
        let host_addr = resolve(host)?;
        let bind_addr = if host_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = bind(bind_addr)?;
        let local_addr = socket
            .local_addr()
            .map_err(|e| TransportError::Bind(format!("Failed to get local addr: {}", e)))?;

        let mut hello = vec![FRAME_HELLO];
        hello.extend_from_slice(name.as_bytes());

        let started = Instant::now();
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let mut last_hello: Option<Instant> = None;

        while started.elapsed() < timeout {
            if last_hello.is_none_or(|t| t.elapsed() >= HELLO_RETRY) {
                socket
                    .send_to(&hello, host_addr)
                    .map_err(|e| TransportError::Send(e.to_string()))?;
                last_hello = Some(Instant::now());
            }

            match socket.recv_from(&mut buf) {
                Ok((len, from)) if from == host_addr && len >= 5 && buf[0] == FRAME_WELCOME => {
                    let peer = PeerHandle(read_u32(&buf[1..5]));
                    tracing::info!(%peer, host = %host_addr, "Connected to host");

                    let mut transport = Self::from_parts(socket, local_addr, peer, timeout);
                    transport.add_link(HOST_PEER, host_addr);
                    return Ok(transport);
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Receive error while connecting");
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }

        Err(TransportError::Timeout)
    }

    fn from_parts(socket: UdpSocket, local_addr: SocketAddr, peer: PeerHandle, timeout: Duration) -> Self {
        Self {
            socket,
            local_addr,
            peer,
            links: HashMap::new(),
            addr_to_peer: HashMap::new(),
            next_peer: HOST_PEER.0 + 1,
            timeout,
            last_heartbeat: Instant::now(),
            recv_buf: vec![0u8; RECV_BUFFER_SIZE],
            events: VecDeque::new(),
            open: true,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    fn hosting(&self) -> bool {
        self.peer == HOST_PEER
    }

    fn add_link(&mut self, peer: PeerHandle, addr: SocketAddr) {
        self.links.insert(
            peer,
            PeerLink {
                addr,
                last_seen: Instant::now(),
            },
        );
        self.addr_to_peer.insert(addr, peer);
    }

    fn remove_link(&mut self, peer: PeerHandle) -> bool {
        match self.links.remove(&peer) {
            Some(link) => {
                self.addr_to_peer.remove(&link.addr);
                true
            }
            None => false,
        }
    }

    fn send_raw(&self, addr: SocketAddr, frame: &[u8]) -> Result<(), TransportError> {
        self.socket
            .send_to(frame, addr)
            .map(|_| ())
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    /// Send to every client except `skip`, logging failures
    fn fan_out(&self, frame: &[u8], skip: Option<PeerHandle>) {
        for (peer, link) in &self.links {
            if Some(*peer) == skip {
                continue;
            }
            if let Err(e) = self.send_raw(link.addr, frame) {
                tracing::warn!(error = %e, %peer, "Relay failed");
            }
        }
    }

    /// Host: forget a client and tell the rest
    fn drop_client(&mut self, peer: PeerHandle) {
        if self.remove_link(peer) {
            self.events.push_back(TransportEvent::Disconnected { peer });
            self.fan_out(&bye_frame(peer), None);
        }
    }

    /// Drain the socket into the event queue
    fn recv_all(&mut self) {
        loop {
            let (len, from) = match self.socket.recv_from(&mut self.recv_buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Receive error");
                    break;
                }
            };
            let frame = self.recv_buf[..len].to_vec();
            if self.hosting() {
                self.handle_host_frame(from, &frame);
            } else {
                self.handle_client_frame(from, &frame);
            }
        }
    }

    fn handle_host_frame(&mut self, from: SocketAddr, frame: &[u8]) {
        let Some(&kind) = frame.first() else {
            return;
        };

        if kind == FRAME_HELLO {
            let peer = match self.addr_to_peer.get(&from) {
                Some(&peer) => peer,
                None => {
                    let peer = PeerHandle(self.next_peer);
                    self.next_peer += 1;
                    self.add_link(peer, from);
                    let name = String::from_utf8_lossy(&frame[1..]).into_owned();
                    tracing::debug!(%peer, addr = %from, "UDP peer attached");
                    self.events.push_back(TransportEvent::Connected { peer, name });
                    peer
                }
            };
            let mut welcome = vec![FRAME_WELCOME];
            welcome.extend_from_slice(&peer.0.to_le_bytes());
            if let Err(e) = self.send_raw(from, &welcome) {
                tracing::warn!(error = %e, %peer, "Failed to send welcome");
            }
            return;
        }

        let Some(&sender) = self.addr_to_peer.get(&from) else {
            tracing::trace!(addr = %from, "Ignoring datagram from unknown address");
            return;
        };
        if let Some(link) = self.links.get_mut(&sender) {
            link.last_seen = Instant::now();
        }

        match kind {
            FRAME_DATA if frame.len() >= 9 => {
                let to = read_u32(&frame[5..9]);
                let payload = frame[9..].to_vec();
                // Trust the socket address, not the claimed sender
                let relayed = data_frame(sender, to, &payload);
                if to == BROADCAST {
                    self.fan_out(&relayed, Some(sender));
                    self.events.push_back(TransportEvent::Message {
                        from: sender,
                        bytes: payload,
                    });
                } else if PeerHandle(to) == self.peer {
                    self.events.push_back(TransportEvent::Message {
                        from: sender,
                        bytes: payload,
                    });
                } else if let Some(link) = self.links.get(&PeerHandle(to)) {
                    if let Err(e) = self.send_raw(link.addr, &relayed) {
                        tracing::warn!(error = %e, to, "Relay failed");
                    }
                }
            }
            FRAME_HEARTBEAT => {}
            FRAME_BYE => self.drop_client(sender),
            other => tracing::trace!(kind = other, "Ignoring unexpected frame"),
        }
    }

    fn handle_client_frame(&mut self, from: SocketAddr, frame: &[u8]) {
        let Some(host) = self.links.get_mut(&HOST_PEER) else {
            return;
        };
        if host.addr != from {
            return;
        }
        host.last_seen = Instant::now();

        match frame.first().copied() {
            Some(FRAME_DATA) if frame.len() >= 9 => {
                let from_peer = PeerHandle(read_u32(&frame[1..5]));
                self.events.push_back(TransportEvent::Message {
                    from: from_peer,
                    bytes: frame[9..].to_vec(),
                });
            }
            Some(FRAME_BYE) if frame.len() >= 5 => {
                let peer = PeerHandle(read_u32(&frame[1..5]));
                if peer == self.peer {
                    // We were dropped by the host
                    self.remove_link(HOST_PEER);
                    self.events.push_back(TransportEvent::Disconnected { peer: HOST_PEER });
                } else {
                    self.events.push_back(TransportEvent::Disconnected { peer });
                }
            }
            _ => {}
        }
    }

    /// Heartbeats out, silent peers dropped
    fn maintain(&mut self) {
        if self.last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
            self.last_heartbeat = Instant::now();
            self.fan_out(&[FRAME_HEARTBEAT], None);
        }

        let timeout = self.timeout;
        let expired: Vec<PeerHandle> = self
            .links
            .iter()
            .filter(|(_, link)| link.last_seen.elapsed() > timeout)
            .map(|(peer, _)| *peer)
            .collect();

        for peer in expired {
            tracing::warn!(%peer, "Peer timed out");
            if self.hosting() {
                self.drop_client(peer);
            } else if self.remove_link(peer) {
                self.events.push_back(TransportEvent::Disconnected { peer });
            }
        }
    }
}

impl Transport for UdpTransport {
    fn local_peer(&self) -> PeerHandle {
        self.peer
    }

    fn host_peer(&self) -> PeerHandle {
        HOST_PEER
    }

    fn broadcast(&mut self, bytes: &[u8], _reliable: bool) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let frame = data_frame(self.peer, BROADCAST, bytes);
        if self.hosting() {
            self.fan_out(&frame, None);
            Ok(())
        } else {
            let host = self.links.get(&HOST_PEER).ok_or(TransportError::NoHost)?;
            self.send_raw(host.addr, &frame)
        }
    }

    fn send_to(&mut self, peer: PeerHandle, bytes: &[u8], _reliable: bool) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let frame = data_frame(self.peer, peer.0, bytes);
        let via = if self.hosting() { peer } else { HOST_PEER };
        let link = self.links.get(&via).ok_or(TransportError::UnknownPeer(peer))?;
        self.send_raw(link.addr, &frame)
    }

    fn receive_one(&mut self) -> Option<TransportEvent> {
        if !self.open {
            return None;
        }
        self.recv_all();
        self.maintain();
        self.events.pop_front()
    }

    fn disconnect(&mut self, peer: PeerHandle) {
        if !self.hosting() {
            tracing::debug!(%peer, "Only the host can drop peers");
            return;
        }
        if let Some(link) = self.links.get(&peer) {
            if let Err(e) = self.send_raw(link.addr, &bye_frame(peer)) {
                tracing::warn!(error = %e, %peer, "Failed to send bye");
            }
        }
        if self.remove_link(peer) {
            self.fan_out(&bye_frame(peer), None);
        }
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.fan_out(&bye_frame(self.peer), None);
        self.links.clear();
        self.addr_to_peer.clear();
        self.open = false;
        tracing::debug!(peer = %self.peer, "UDP transport closed");
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

fn bind(addr: &str) -> Result<UdpSocket, TransportError> {
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|_| TransportError::AddressParse(addr.to_string()))?;
    let socket = UdpSocket::bind(socket_addr).map_err(|e| TransportError::Bind(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::Bind(format!("Failed to set non-blocking: {}", e)))?;
    Ok(socket)
}

fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    addr.to_socket_addrs()
        .map_err(|_| TransportError::AddressParse(addr.to_string()))?
        .next()
        .ok_or_else(|| TransportError::AddressParse(addr.to_string()))
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn data_frame(from: PeerHandle, to: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(9 + payload.len());
    frame.push(FRAME_DATA);
    frame.extend_from_slice(&from.0.to_le_bytes());
    frame.extend_from_slice(&to.to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn bye_frame(peer: PeerHandle) -> Vec<u8> {
    let mut frame = vec![FRAME_BYE];
    frame.extend_from_slice(&peer.0.to_le_bytes());
    frame
}
