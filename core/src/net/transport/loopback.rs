//! In-memory transport
//!
//! Every endpoint attached to a [`LoopbackHub`] shares one single-threaded
//! queue table. Delivery is immediate and ordered per receiver. The host is
//! always peer 1; clients get increasing handles.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use super::{Transport, TransportError, TransportEvent};
use crate::net::types::PeerHandle;

const HOST_PEER: PeerHandle = PeerHandle(1);

#[derive(Debug, Default)]
struct HubInner {
    next_peer: u32,
    host_attached: bool,
    queues: BTreeMap<PeerHandle, VecDeque<TransportEvent>>,
}

impl HubInner {
    fn deliver(&mut self, to: PeerHandle, event: TransportEvent) -> bool {
        match self.queues.get_mut(&to) {
            Some(queue) => {
                queue.push_back(event);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, peer: PeerHandle) {
        if self.queues.remove(&peer).is_none() {
            return;
        }
        if peer == HOST_PEER {
            self.host_attached = false;
        }
        for queue in self.queues.values_mut() {
            queue.push_back(TransportEvent::Disconnected { peer });
        }
    }
}

/// Shared in-memory network
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Rc<RefCell<HubInner>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the host endpoint
    pub fn connect_as_host(&self) -> Result<LoopbackTransport, TransportError> {
        let mut inner = self.inner.borrow_mut();
        if inner.host_attached {
            return Err(TransportError::Bind("hub already has a host".to_string()));
        }
        inner.host_attached = true;
        inner.next_peer = inner.next_peer.max(HOST_PEER.0 + 1);
        inner.queues.insert(HOST_PEER, VecDeque::new());

        Ok(LoopbackTransport {
            hub: self.clone(),
            peer: HOST_PEER,
            open: true,
        })
    }

    /// Attach a client; the host sees a `Connected` event carrying `name`
    pub fn connect_as_client(&self, name: &str) -> Result<LoopbackTransport, TransportError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.host_attached {
            return Err(TransportError::NoHost);
        }
        let peer = PeerHandle(inner.next_peer);
        inner.next_peer += 1;
        inner.queues.insert(peer, VecDeque::new());
        inner.deliver(
            HOST_PEER,
            TransportEvent::Connected {
                peer,
                name: name.to_string(),
            },
        );

        Ok(LoopbackTransport {
            hub: self.clone(),
            peer,
            open: true,
        })
    }

    /// Push raw bytes at a peer as if `from` had sent them
    pub fn inject(&self, to: PeerHandle, from: PeerHandle, bytes: Vec<u8>) -> bool {
        self.inner
            .borrow_mut()
            .deliver(to, TransportEvent::Message { from, bytes })
    }

    /// Events waiting for `peer`
    pub fn pending(&self, peer: PeerHandle) -> usize {
        self.inner
            .borrow()
            .queues
            .get(&peer)
            .map_or(0, VecDeque::len)
    }

    pub fn attached(&self) -> Vec<PeerHandle> {
        self.inner.borrow().queues.keys().copied().collect()
    }
}

/// One endpoint on a [`LoopbackHub`]
#[derive(Debug)]
pub struct LoopbackTransport {
    hub: LoopbackHub,
    peer: PeerHandle,
    open: bool,
}

impl Transport for LoopbackTransport {
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
        let mut inner = self.hub.inner.borrow_mut();
        let targets: Vec<PeerHandle> = inner.queues.keys().copied().filter(|&p| p != self.peer).collect();
        for target in targets {
            inner.deliver(
                target,
                TransportEvent::Message {
                    from: self.peer,
                    bytes: bytes.to_vec(),
                },
            );
        }
        Ok(())
    }

    fn send_to(&mut self, peer: PeerHandle, bytes: &[u8], _reliable: bool) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed);
        }
        let delivered = self.hub.inner.borrow_mut().deliver(
            peer,
            TransportEvent::Message {
                from: self.peer,
                bytes: bytes.to_vec(),
            },
        );
        if delivered {
            Ok(())
        } else {
            Err(TransportError::UnknownPeer(peer))
        }
    }

    fn receive_one(&mut self) -> Option<TransportEvent> {
        if !self.open {
            return None;
        }
        self.hub
            .inner
            .borrow_mut()
            .queues
            .get_mut(&self.peer)
            .and_then(VecDeque::pop_front)
    }

    fn disconnect(&mut self, peer: PeerHandle) {
        if !self.open || peer == self.peer {
            return;
        }
        let mut inner = self.hub.inner.borrow_mut();
        // The dropped peer learns the host is gone; everyone else learns
        // the peer is gone.
        inner.deliver(peer, TransportEvent::Disconnected { peer: self.peer });
        let others: Vec<PeerHandle> = inner
            .queues
            .keys()
            .copied()
            .filter(|&p| p != peer && p != self.peer)
            .collect();
        for other in others {
            inner.deliver(other, TransportEvent::Disconnected { peer });
        }
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        self.hub.inner.borrow_mut().detach(self.peer);
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.close();
    }
}
