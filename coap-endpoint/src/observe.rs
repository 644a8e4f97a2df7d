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

//! Server-push notifications to observers of a resource.
//!
//! A single hub task owns the subscriber tables. Each subscriber gets a
//! transmitter task fed over a bounded queue; transmitter tasks never
//! reach back into the hub, they report their exit over a lifecycle
//! queue the hub drains. That keeps the ownership graph acyclic: hub
//! handles are clonable senders, and dropping a subscriber's queue is
//! its cancellation signal.

use crate::message::{Message, MsgId, MsgToken};
use crate::option::OptionNumber;
use crate::retransmit::Retransmitter;
use crate::transport::DatagramTransport;
use crate::Error;
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// How many undelivered notifications a single subscriber may have
/// queued before new ones are dropped.
const SUBSCRIBER_QUEUE_DEPTH: usize = 8;

const OBSERVE_SEQ_MODULUS: u32 = 1 << 24;

/// Compares two 24-bit Observe sequence numbers with serial-number
/// arithmetic (RFC 1982 section 3): returns true if `a` is newer than
/// `b`, treating wrap-around as forward motion.
pub fn observe_newer(a: u32, b: u32) -> bool {
    let a = a % OBSERVE_SEQ_MODULUS;
    let b = b % OBSERVE_SEQ_MODULUS;
    if a == b {
        return false;
    }
    let forward = (a.wrapping_sub(b)) % OBSERVE_SEQ_MODULUS;
    forward < OBSERVE_SEQ_MODULUS / 2
}

enum Command<P> {
    Register {
        resource: String,
        peer: P,
        token: MsgToken,
    },
    Unregister {
        resource: String,
        peer: P,
    },
    Notify {
        resource: String,
        message: Message,
    },
}

struct Subscriber {
    queue: mpsc::Sender<Message>,
}

/// Fans notifications out to the observers of each resource.
///
/// The handle is cheap to clone; all clones talk to the same hub task.
pub struct ObserveHub<T: DatagramTransport> {
    commands: mpsc::UnboundedSender<Command<T::Peer>>,
    retransmitter: Retransmitter<T>,
}

impl<T: DatagramTransport> Clone for ObserveHub<T> {
    fn clone(&self) -> Self {
        ObserveHub {
            commands: self.commands.clone(),
            retransmitter: self.retransmitter.clone(),
        }
    }
}

impl<T: DatagramTransport> std::fmt::Debug for ObserveHub<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserveHub").finish()
    }
}

impl<T: DatagramTransport> ObserveHub<T> {
    /// Creates a hub whose notifications are sent through the given
    /// retransmitter, and spawns its owning task.
    pub fn new(retransmitter: Retransmitter<T>) -> ObserveHub<T> {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let hub = ObserveHub {
            commands,
            retransmitter: retransmitter.clone(),
        };
        tokio::spawn(run_hub(command_rx, retransmitter));
        hub
    }

    /// Registers `peer` as an observer of `resource`. Notifications will
    /// carry `token` so the subscriber can correlate them with its
    /// original request.
    ///
    /// Registering the same peer again replaces its subscription.
    pub fn register(&self, resource: &str, peer: T::Peer, token: MsgToken) {
        let _ = self.commands.send(Command::Register {
            resource: resource.to_owned(),
            peer,
            token,
        });
    }

    /// Removes `peer` from the observers of `resource`.
    pub fn unregister(&self, resource: &str, peer: T::Peer) {
        let _ = self.commands.send(Command::Unregister {
            resource: resource.to_owned(),
            peer,
        });
    }

    /// Applies an acknowledgement from `peer` for a notification this
    /// hub sent. This is the same in-flight table the rest of the
    /// endpoint uses, so a server receive loop that already feeds the
    /// retransmitter need not call this separately.
    pub fn acknowledge(&self, peer: T::Peer, message_id: MsgId) -> bool {
        self.retransmitter.acknowledge(peer, message_id)
    }

    /// Queues a copy of `message` for every observer of `resource`.
    ///
    /// Each subscriber's transmitter assigns its own message id and
    /// Observe sequence number before sending.
    pub fn notify(&self, resource: &str, message: Message) {
        let _ = self.commands.send(Command::Notify {
            resource: resource.to_owned(),
            message,
        });
    }
}

async fn run_hub<T: DatagramTransport>(
    mut commands: mpsc::UnboundedReceiver<Command<T::Peer>>,
    retransmitter: Retransmitter<T>,
) {
    let mut observers: HashMap<String, HashMap<T::Peer, Subscriber>> = HashMap::new();
    let (exit_tx, mut exits) = mpsc::unbounded_channel::<(String, T::Peer)>();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Register { resource, peer, token }) => {
                    let (queue, queue_rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);
                    tokio::spawn(run_subscriber(
                        queue_rx,
                        resource.clone(),
                        peer,
                        token,
                        retransmitter.clone(),
                        exit_tx.clone(),
                    ));
                    // Replacing an entry drops the old queue, which is
                    // the old transmitter's cue to exit.
                    observers
                        .entry(resource.clone())
                        .or_default()
                        .insert(peer, Subscriber { queue });
                    debug!("observer {} added for [{}]", peer, resource);
                }
                Some(Command::Unregister { resource, peer }) => {
                    remove_observer(&mut observers, &resource, &peer);
                }
                Some(Command::Notify { resource, message }) => {
                    if let Some(subs) = observers.get(&resource) {
                        for (peer, sub) in subs {
                            if sub.queue.try_send(message.clone()).is_err() {
                                warn!(
                                    "observer {} of [{}] is not keeping up; notification dropped",
                                    peer, resource
                                );
                            }
                        }
                    }
                }
                // All hub handles are gone.
                None => return,
            },
            exit = exits.recv() => {
                if let Some((resource, peer)) = exit {
                    remove_observer(&mut observers, &resource, &peer);
                }
            }
        }
    }
}

fn remove_observer<P: std::hash::Hash + Eq + std::fmt::Display>(
    observers: &mut HashMap<String, HashMap<P, Subscriber>>,
    resource: &str,
    peer: &P,
) {
    if let Some(subs) = observers.get_mut(resource) {
        if subs.remove(peer).is_some() {
            debug!("observer {} of [{}] removed", peer, resource);
        }
        if subs.is_empty() {
            observers.remove(resource);
        }
    }
}

/// Per-subscriber transmitter: drains the notification queue, stamping
/// each message with this subscription's message id and Observe
/// sequence, and gives up the subscription when a confirmable
/// notification exhausts its retransmit budget.
async fn run_subscriber<T: DatagramTransport>(
    mut queue: mpsc::Receiver<Message>,
    resource: String,
    peer: T::Peer,
    token: MsgToken,
    retransmitter: Retransmitter<T>,
    exit_tx: mpsc::UnboundedSender<(String, T::Peer)>,
) {
    // Message ids start at a random point so ids from different
    // subscriptions do not march in lockstep.
    let mut msg_id: MsgId = rand::thread_rng().gen();
    let mut observe_seq: u32 = 0;

    while let Some(mut msg) = queue.recv().await {
        msg.message_id = msg_id;
        msg_id = msg_id.wrapping_add(1);
        msg.token = token;
        msg.set_option(OptionNumber::OBSERVE, observe_seq);
        observe_seq = (observe_seq + 1) % OBSERVE_SEQ_MODULUS;

        let exchange = match retransmitter.record(&msg, peer).await {
            Ok(exchange) => exchange,
            Err(err) => {
                warn!(
                    "giving up on observer {} of [{}]: {}",
                    peer, resource, err
                );
                let _ = exit_tx.send((resource, peer));
                return;
            }
        };

        if let Some(exchange) = exchange {
            match exchange.wait().await {
                Ok(()) => {}
                Err(Error::TransmissionTimeout) | Err(Error::Reset) => {
                    debug!(
                        "notification to observer {} of [{}] went unacknowledged",
                        peer, resource
                    );
                    let _ = exit_tx.send((resource, peer));
                    return;
                }
                Err(err) => {
                    warn!(
                        "notification to observer {} of [{}] failed: {}",
                        peer, resource, err
                    );
                    let _ = exit_tx.send((resource, peer));
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::TransmissionParameters;
    use crate::loopback::loopback_pair;
    use crate::message::{MsgCode, MsgType};
    use crate::transport::DatagramTransportExt;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn serial_comparison_handles_wrap() {
        assert!(observe_newer(1, 0));
        assert!(!observe_newer(0, 1));
        assert!(!observe_newer(5, 5));
        // Wrap-around: 2 is newer than a value just below the modulus.
        assert!(observe_newer(2, OBSERVE_SEQ_MODULUS - 3));
        assert!(!observe_newer(OBSERVE_SEQ_MODULUS - 3, 2));
    }

    fn quick_params() -> TransmissionParameters {
        TransmissionParameters {
            ack_timeout: Duration::from_millis(25),
            ack_random_factor: 1.0,
            max_retransmit: 1,
            ..Default::default()
        }
    }

    fn notification(payload: &[u8]) -> Message {
        let mut msg = Message::new(MsgType::Con, MsgCode::CONTENT, 0);
        msg.payload = payload.to_vec();
        msg
    }

    #[tokio::test]
    async fn notifications_reach_the_subscriber_in_sequence() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());
        let hub = ObserveHub::new(retrans);

        let token = MsgToken::try_new(&[0x77]).unwrap();
        hub.register("temp", peer, token);
        hub.notify("temp", notification(b"20.1"));

        let mut buf = [0u8; 128];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let first = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(first.payload, b"20.1");
        assert_eq!(first.token, token);
        assert_eq!(first.option_uint(OptionNumber::OBSERVE), Some(0));
        hub.acknowledge(peer, first.message_id);

        hub.notify("temp", notification(b"20.2"));
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let second = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(second.payload, b"20.2");
        assert_eq!(second.option_uint(OptionNumber::OBSERVE), Some(1));
        assert_eq!(second.message_id, first.message_id.wrapping_add(1));
        hub.acknowledge(peer, second.message_id);

        assert!(observe_newer(
            second.option_uint(OptionNumber::OBSERVE).unwrap(),
            first.option_uint(OptionNumber::OBSERVE).unwrap()
        ));
    }

    #[tokio::test]
    async fn unacknowledged_subscriber_is_dropped() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());
        let hub = ObserveHub::new(retrans);

        hub.register("temp", peer, MsgToken::EMPTY);
        hub.notify("temp", notification(b"first"));

        // Initial transmission plus one retransmission, never acked.
        let mut buf = [0u8; 128];
        let mut seen = 0;
        while tokio::time::timeout(Duration::from_millis(300), b.recv_from(&mut buf))
            .await
            .is_ok()
        {
            seen += 1;
        }
        assert_eq!(seen, 2);

        // The subscription is gone, so later notifications go nowhere.
        hub.notify("temp", notification(b"second"));
        assert!(
            tokio::time::timeout(Duration::from_millis(150), b.recv_from(&mut buf))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn unregister_stops_notifications() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());
        let hub = ObserveHub::new(retrans);

        hub.register("temp", peer, MsgToken::EMPTY);
        hub.unregister("temp", peer);
        // Let the hub task process both commands.
        tokio::task::yield_now().await;
        hub.notify("temp", notification(b"ignored"));

        let mut buf = [0u8; 128];
        assert!(
            tokio::time::timeout(Duration::from_millis(150), b.recv_from(&mut buf))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn non_confirmable_notifications_are_fire_and_forget() {
        let (a, b) = loopback_pair();
        let peer = a.peer_addr();
        let retrans = Retransmitter::new(Arc::new(a), quick_params());
        let hub = ObserveHub::new(retrans);

        hub.register("temp", peer, MsgToken::EMPTY);
        let mut msg = notification(b"20.3");
        msg.msg_type = MsgType::Non;
        hub.notify("temp", msg);

        let mut buf = [0u8; 128];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let got = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(got.msg_type, MsgType::Non);
        assert_eq!(got.payload, b"20.3");

        // No retransmissions follow.
        assert!(
            tokio::time::timeout(Duration::from_millis(150), b.recv_from(&mut buf))
                .await
                .is_err()
        );
    }
}
