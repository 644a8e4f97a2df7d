// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! In-memory transports for exercising the endpoint without sockets.

use crate::transport::DatagramTransport;
use std::fmt::{Display, Formatter};
use std::io;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Address type used by the in-memory transports.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LoopbackAddr(pub u8);

impl Display for LoopbackAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "loop-{}", self.0)
    }
}

type Packet = (Vec<u8>, LoopbackAddr);

/// One side of an in-memory datagram link.
///
/// Everything sent from one side arrives on the other, in order and
/// without loss, which makes retransmission behavior observable and
/// deterministic in tests.
#[derive(Debug)]
pub struct LoopbackTransport {
    local: LoopbackAddr,
    remote_tx: mpsc::UnboundedSender<Packet>,
    rx: Mutex<mpsc::UnboundedReceiver<Packet>>,
}

/// Creates a connected pair of in-memory transports with addresses
/// `loop-0` and `loop-1`.
pub fn loopback_pair() -> (LoopbackTransport, LoopbackTransport) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();

    let a = LoopbackTransport {
        local: LoopbackAddr(0),
        remote_tx: b_tx,
        rx: Mutex::new(a_rx),
    };
    let b = LoopbackTransport {
        local: LoopbackAddr(1),
        remote_tx: a_tx,
        rx: Mutex::new(b_rx),
    };
    (a, b)
}

impl LoopbackTransport {
    /// This side's address.
    pub fn local_addr(&self) -> LoopbackAddr {
        self.local
    }

    /// The other side's address.
    pub fn peer_addr(&self) -> LoopbackAddr {
        LoopbackAddr(1 - self.local.0)
    }
}

impl DatagramTransport for LoopbackTransport {
    type Peer = LoopbackAddr;

    fn poll_send_to(
        &self,
        _cx: &mut Context<'_>,
        buf: &[u8],
        _peer: LoopbackAddr,
    ) -> Poll<io::Result<usize>> {
        match self.remote_tx.send((buf.to_vec(), self.local)) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(_) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
        }
    }

    fn poll_recv_from(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<(usize, LoopbackAddr)>> {
        let mut rx = self.rx.lock().expect("loopback receiver poisoned");
        match rx.poll_recv(cx) {
            Poll::Ready(Some((bytes, from))) => {
                let len = bytes.len().min(buf.len());
                buf[..len].copy_from_slice(&bytes[..len]);
                Poll::Ready(Ok((len, from)))
            }
            Poll::Ready(None) => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A transport that swallows everything sent and never produces a
/// datagram, standing in for an unreachable peer.
#[derive(Debug, Default)]
pub struct NullTransport;

/// The address of the one peer a [`NullTransport`] pretends to reach.
pub const NULL_PEER: LoopbackAddr = LoopbackAddr(0xFF);

impl DatagramTransport for NullTransport {
    type Peer = LoopbackAddr;

    fn poll_send_to(
        &self,
        _cx: &mut Context<'_>,
        buf: &[u8],
        _peer: LoopbackAddr,
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_recv_from(
        &self,
        _cx: &mut Context<'_>,
        _buf: &mut [u8],
    ) -> Poll<io::Result<(usize, LoopbackAddr)>> {
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DatagramTransportExt;

    #[tokio::test]
    async fn pair_delivers_in_order() {
        let (a, b) = loopback_pair();
        a.send_to(b"one", a.peer_addr()).await.unwrap();
        a.send_to(b"two", a.peer_addr()).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"one");
        assert_eq!(from, a.local_addr());

        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"two");
    }
}
