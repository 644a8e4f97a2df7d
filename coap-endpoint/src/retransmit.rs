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

//! The confirmable-message reliability state machine.
//!
//! Sending a confirmable message enrolls it in an in-flight table keyed
//! by `(peer, message id)` and hands the exchange to a timer task that
//! retransmits with exponential back-off until an acknowledgement or
//! reset arrives, or the retransmit budget runs out. Acknowledgements
//! are applied by removing the record, so duplicates are naturally
//! no-ops.
//!
//! The table lock is only ever held for the map operation itself;
//! transmission always happens outside it.

use crate::consts::TransmissionParameters;
use crate::message::{Message, MsgId, MsgType};
use crate::transport::{DatagramTransport, DatagramTransportExt};
use crate::Error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::oneshot;

#[derive(Debug, Copy, Clone)]
enum Disposition {
    Acked,
    Reset,
}

struct Flight {
    signal: oneshot::Sender<Disposition>,
}

struct Inner<T: DatagramTransport> {
    transport: Arc<T>,
    inflight: RwLock<HashMap<(T::Peer, MsgId), Flight>>,
    params: TransmissionParameters,
}

/// Tracks in-flight confirmable messages for one transport.
///
/// Cloning is cheap and clones share the in-flight table.
pub struct Retransmitter<T: DatagramTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: DatagramTransport> Clone for Retransmitter<T> {
    fn clone(&self) -> Self {
        Retransmitter {
            inner: self.inner.clone(),
        }
    }
}

impl<T: DatagramTransport> std::fmt::Debug for Retransmitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self
            .inner
            .inflight
            .read()
            .map(|map| map.len())
            .unwrap_or(0);
        f.debug_struct("Retransmitter")
            .field("inflight", &len)
            .finish()
    }
}

/// A handle on one confirmable exchange, resolved when the peer
/// acknowledges or resets it, or when the retransmit budget runs out.
#[derive(Debug)]
pub struct Exchange {
    rx: oneshot::Receiver<Result<(), Error>>,
}

impl Exchange {
    /// Waits for the exchange to finish.
    pub async fn wait(self) -> Result<(), Error> {
        match self.rx.await {
            Ok(result) => result,
            // The record was displaced without resolving, which only
            // happens when its message id was reused.
            Err(_) => Err(Error::TransmissionTimeout),
        }
    }
}

impl<T: DatagramTransport> Retransmitter<T> {
    /// Creates a new retransmitter sending over `transport`.
    pub fn new(transport: Arc<T>, params: TransmissionParameters) -> Retransmitter<T> {
        Retransmitter {
            inner: Arc::new(Inner {
                transport,
                inflight: RwLock::new(HashMap::new()),
                params,
            }),
        }
    }

    /// The parameters this retransmitter runs with.
    pub fn parameters(&self) -> &TransmissionParameters {
        &self.inner.params
    }

    /// Transmits `msg` to `peer`, enrolling it for retransmission if it
    /// is confirmable.
    ///
    /// For confirmable messages the returned [`Exchange`] resolves when
    /// the exchange ends; non-confirmable, acknowledgement, and reset
    /// messages are sent exactly once and yield `None`.
    pub async fn record(&self, msg: &Message, peer: T::Peer) -> Result<Option<Exchange>, Error> {
        let wire = msg.to_bytes()?;

        if !msg.is_confirmable() {
            self.inner.transport.send_to(&wire, peer).await?;
            return Ok(None);
        }

        let key = (peer, msg.message_id);
        let (sig_tx, sig_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        self.write_map().insert(key, Flight { signal: sig_tx });

        if let Err(err) = self.inner.transport.send_to(&wire, peer).await {
            self.write_map().remove(&key);
            return Err(err.into());
        }
        debug!("confirmable 0x{:04X} sent to {}", msg.message_id, peer);

        tokio::spawn(retransmit_loop(
            self.inner.clone(),
            key,
            wire,
            sig_rx,
            done_tx,
        ));

        Ok(Some(Exchange { rx: done_rx }))
    }

    /// Applies an inbound message to the in-flight table:
    /// acknowledgements complete the matching exchange, resets fail it.
    /// Everything else is left alone.
    pub fn received(&self, msg: &Message, peer: T::Peer) -> bool {
        match msg.msg_type {
            MsgType::Ack => self.acknowledge(peer, msg.message_id),
            MsgType::Res => self.reset(peer, msg.message_id),
            _ => false,
        }
    }

    /// Signals the acknowledgement of `(peer, message_id)`.
    ///
    /// Returns true if an exchange was waiting on it. Applying the same
    /// acknowledgement twice is harmless.
    pub fn acknowledge(&self, peer: T::Peer, message_id: MsgId) -> bool {
        self.complete(peer, message_id, Disposition::Acked)
    }

    /// Signals that `(peer, message_id)` was reset by the peer.
    pub fn reset(&self, peer: T::Peer, message_id: MsgId) -> bool {
        self.complete(peer, message_id, Disposition::Reset)
    }

    /// Stops tracking `(peer, message_id)` without resolving its
    /// exchange, ending any retransmission for it. Used when the waiter
    /// gives up on the response.
    pub fn abandon(&self, peer: T::Peer, message_id: MsgId) -> bool {
        self.write_map().remove(&(peer, message_id)).is_some()
    }

    fn complete(&self, peer: T::Peer, message_id: MsgId, disposition: Disposition) -> bool {
        let flight = self.write_map().remove(&(peer, message_id));
        match flight {
            Some(flight) => {
                let _ = flight.signal.send(disposition);
                true
            }
            None => false,
        }
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<(T::Peer, MsgId), Flight>> {
        self.inner.inflight.write().expect("in-flight map poisoned")
    }
}

async fn retransmit_loop<T: DatagramTransport>(
    inner: Arc<Inner<T>>,
    key: (T::Peer, MsgId),
    wire: Vec<u8>,
    mut sig_rx: oneshot::Receiver<Disposition>,
    done_tx: oneshot::Sender<Result<(), Error>>,
) {
    let mut timeout = inner.params.initial_retransmit_timeout();
    let mut retransmits = 0u32;

    loop {
        match tokio::time::timeout(timeout, &mut sig_rx).await {
            Ok(Ok(Disposition::Acked)) => {
                debug!("exchange 0x{:04X} with {} acknowledged", key.1, key.0);
                let _ = done_tx.send(Ok(()));
                return;
            }
            Ok(Ok(Disposition::Reset)) => {
                debug!("exchange 0x{:04X} with {} reset", key.1, key.0);
                let _ = done_tx.send(Err(Error::Reset));
                return;
            }
            Ok(Err(_)) => {
                // Record displaced by a new exchange reusing the id.
                return;
            }
            Err(_elapsed) => {
                if retransmits >= inner.params.max_retransmit {
                    inner
                        .inflight
                        .write()
                        .expect("in-flight map poisoned")
                        .remove(&key);
                    debug!(
                        "exchange 0x{:04X} with {} timed out after {} retransmissions",
                        key.1, key.0, retransmits
                    );
                    let _ = done_tx.send(Err(Error::TransmissionTimeout));
                    return;
                }
                retransmits += 1;
                timeout *= 2;
                if let Err(err) = inner.transport.send_to(&wire, key.0).await {
                    inner
                        .inflight
                        .write()
                        .expect("in-flight map poisoned")
                        .remove(&key);
                    let _ = done_tx.send(Err(err.into()));
                    return;
                }
                debug!(
                    "retransmission #{} of 0x{:04X} to {}",
                    retransmits, key.1, key.0
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{loopback_pair, LoopbackTransport};
    use crate::message::MsgCode;
    use crate::transport::DatagramTransportExt;
    use std::time::Duration;

    fn quick_params() -> TransmissionParameters {
        TransmissionParameters {
            ack_timeout: Duration::from_millis(25),
            ack_random_factor: 1.0,
            max_retransmit: 2,
            ..Default::default()
        }
    }

    async fn drain(transport: &LoopbackTransport, window: Duration) -> usize {
        let mut buf = [0u8; 64];
        let mut count = 0;
        while tokio::time::timeout(window, transport.recv_from(&mut buf))
            .await
            .is_ok()
        {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn retransmit_budget_is_exact() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Con, MsgCode::GET, 0x0101);
        let exchange = retrans.record(&msg, peer).await.unwrap().unwrap();

        // One initial transmission plus max_retransmit resends.
        assert_eq!(drain(&b, Duration::from_millis(400)).await, 3);
        assert!(matches!(
            exchange.wait().await,
            Err(Error::TransmissionTimeout)
        ));
    }

    #[tokio::test]
    async fn acknowledgement_stops_retransmission() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Con, MsgCode::GET, 0x0202);
        let exchange = retrans.record(&msg, peer).await.unwrap().unwrap();

        let mut buf = [0u8; 64];
        b.recv_from(&mut buf).await.unwrap();
        assert!(retrans.acknowledge(peer, 0x0202));
        exchange.wait().await.unwrap();

        // Nothing further is sent for this exchange.
        assert_eq!(drain(&b, Duration::from_millis(150)).await, 0);
    }

    #[tokio::test]
    async fn duplicate_acknowledgement_is_idempotent() {
        let (a, _b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Con, MsgCode::GET, 7);
        let _exchange = retrans.record(&msg, peer).await.unwrap().unwrap();

        assert!(retrans.acknowledge(peer, 7));
        assert!(!retrans.acknowledge(peer, 7));
    }

    #[tokio::test]
    async fn reset_fails_the_exchange() {
        let (a, _b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Con, MsgCode::GET, 9);
        let exchange = retrans.record(&msg, peer).await.unwrap().unwrap();

        assert!(retrans.reset(peer, 9));
        assert!(matches!(exchange.wait().await, Err(Error::Reset)));
    }

    #[tokio::test]
    async fn non_confirmable_is_sent_once() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Non, MsgCode::GET, 11);
        assert!(retrans.record(&msg, peer).await.unwrap().is_none());

        assert_eq!(drain(&b, Duration::from_millis(150)).await, 1);
    }

    #[tokio::test]
    async fn received_routes_by_type() {
        let (a, _b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());

        let msg = Message::new(MsgType::Con, MsgCode::GET, 21);
        let exchange = retrans.record(&msg, peer).await.unwrap().unwrap();

        let ack = Message::new(MsgType::Ack, MsgCode::EMPTY, 21);
        assert!(retrans.received(&ack, peer));
        exchange.wait().await.unwrap();

        let unrelated = Message::new(MsgType::Con, MsgCode::GET, 21);
        assert!(!retrans.received(&unrelated, peer));
    }
}
