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

//! Transport traits the endpoint is written against.
//!
//! The core is transport-agnostic: a datagram transport is anything
//! that can send and receive addressed packets, and a stream transport
//! is any `futures` `AsyncRead`/`AsyncWrite` pair carrying the
//! length-prefixed framing. Socket types live elsewhere (see the
//! `coap-endpoint-tokio` crate); in-memory implementations for tests
//! live in [`crate::loopback`].

use futures::future::poll_fn;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::io;
use std::task::{Context, Poll};

/// An unreliable, unordered, addressed packet transport.
///
/// Implementations are expected to be cheap to share behind an `Arc`;
/// both poll methods take `&self` so that a single receive loop can run
/// concurrently with any number of senders.
pub trait DatagramTransport: Send + Sync + 'static {
    /// The peer-address type, used to key retransmission and observer
    /// state.
    type Peer: Copy + Eq + Hash + Debug + Display + Send + Sync + Unpin + 'static;

    /// Attempts to send `buf` as a single datagram to `peer`.
    fn poll_send_to(
        &self,
        cx: &mut Context<'_>,
        buf: &[u8],
        peer: Self::Peer,
    ) -> Poll<io::Result<usize>>;

    /// Attempts to receive a single datagram, returning its length and
    /// the peer it came from.
    fn poll_recv_from(
        &self,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<(usize, Self::Peer)>>;
}

/// Future-returning conveniences over [`DatagramTransport`].
pub trait DatagramTransportExt: DatagramTransport {
    /// Sends `buf` as a single datagram to `peer`.
    fn send_to<'a>(
        &'a self,
        buf: &'a [u8],
        peer: Self::Peer,
    ) -> impl Future<Output = io::Result<usize>> + Send + 'a {
        poll_fn(move |cx| self.poll_send_to(cx, buf, peer))
    }

    /// Receives a single datagram into `buf`.
    fn recv_from<'a>(
        &'a self,
        buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<(usize, Self::Peer)>> + Send + 'a {
        poll_fn(move |cx| self.poll_recv_from(cx, buf))
    }
}

impl<T: DatagramTransport + ?Sized> DatagramTransportExt for T {}

/// Returns true for receive-side errors worth retrying after a short
/// back-off rather than tearing the loop down.
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
