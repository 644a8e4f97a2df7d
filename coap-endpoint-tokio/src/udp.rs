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

use coap_endpoint::{Client, DatagramTransport, TransmissionParameters};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::task::{Context, Poll};
use tokio::io::ReadBuf;
use tokio::net::{ToSocketAddrs, UdpSocket};

/// A datagram transport over a [`tokio::net::UdpSocket`].
///
/// In order to use this type, you must be using Tokio for your event
/// loop.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds a new UDP transport to the given local address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<UdpTransport> {
        Ok(UdpTransport {
            socket: UdpSocket::bind(addr).await?,
        })
    }

    /// Wraps an already-bound socket.
    pub fn from_socket(socket: UdpSocket) -> UdpTransport {
        UdpTransport { socket }
    }

    /// The local address this transport is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramTransport for UdpTransport {
    type Peer = SocketAddr;

    fn poll_send_to(
        &self,
        cx: &mut Context<'_>,
        buf: &[u8],
        peer: SocketAddr,
    ) -> Poll<io::Result<usize>> {
        self.socket.poll_send_to(cx, buf, peer)
    }

    fn poll_recv_from(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<(usize, SocketAddr)>> {
        let mut read_buf = ReadBuf::new(buf);
        match self.socket.poll_recv_from(cx, &mut read_buf) {
            Poll::Ready(Ok(peer)) => Poll::Ready(Ok((read_buf.filled().len(), peer))),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Dials a CoAP peer over UDP with default transmission parameters,
/// binding an ephemeral local port of the matching address family.
pub async fn dial(peer: SocketAddr) -> io::Result<Client<UdpTransport>> {
    dial_with_parameters(peer, TransmissionParameters::default()).await
}

/// Dials a CoAP peer over UDP with the given transmission parameters.
pub async fn dial_with_parameters(
    peer: SocketAddr,
    params: TransmissionParameters,
) -> io::Result<Client<UdpTransport>> {
    let local: SocketAddr = if peer.is_ipv4() {
        (IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into()
    } else {
        (IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0).into()
    };
    let transport = UdpTransport::bind(local).await?;
    Ok(Client::with_parameters(transport, peer, params))
}
