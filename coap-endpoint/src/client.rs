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

//! A dialed CoAP client connection.

use crate::consts::TransmissionParameters;
use crate::message::{Message, MsgCode, MsgId, MsgIdGenerator, MsgType};
use crate::retransmit::Retransmitter;
use crate::transport::{DatagramTransport, DatagramTransportExt};
use crate::Error;
use std::sync::Arc;

/// A client connection to one CoAP peer over a datagram transport.
///
/// Confirmable sends are owned by the retransmitter until they are
/// acknowledged, reset, or time out; the client waits up to its
/// response timeout for a piggy-backed or separate response.
pub struct Client<T: DatagramTransport> {
    transport: Arc<T>,
    retransmitter: Retransmitter<T>,
    peer: T::Peer,
    msg_ids: MsgIdGenerator,
    params: TransmissionParameters,
}

impl<T: DatagramTransport> std::fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("peer", &self.peer).finish()
    }
}

impl<T: DatagramTransport> Client<T> {
    /// Creates a client talking to `peer` with default parameters.
    pub fn new(transport: T, peer: T::Peer) -> Client<T> {
        Client::with_parameters(transport, peer, TransmissionParameters::default())
    }

    /// Creates a client talking to `peer` with the given parameters.
    pub fn with_parameters(
        transport: T,
        peer: T::Peer,
        params: TransmissionParameters,
    ) -> Client<T> {
        let transport = Arc::new(transport);
        Client {
            retransmitter: Retransmitter::new(transport.clone(), params),
            transport,
            peer,
            msg_ids: MsgIdGenerator::new(),
            params,
        }
    }

    /// The peer this client talks to.
    pub fn peer(&self) -> &T::Peer {
        &self.peer
    }

    /// Returns a fresh message id for a request.
    pub fn next_message_id(&self) -> MsgId {
        self.msg_ids.next_id()
    }

    /// Sends a message, returning the response if one is expected.
    ///
    /// Confirmable messages are retransmitted until acknowledged and
    /// wait for a response; the possible failures are a response
    /// timeout, a reset from the peer, a transport failure, or an
    /// undecodable reply. Non-confirmable messages return `Ok(None)`
    /// right after transmission and only surface transport failures.
    pub async fn send(&self, msg: Message) -> Result<Option<Message>, Error> {
        self.retransmitter.record(&msg, self.peer).await?;

        if !msg.is_confirmable() {
            return Ok(None);
        }

        match tokio::time::timeout(self.params.response_timeout, self.wait_response(&msg)).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => {
                // Abandon the pending receive and stop retransmitting.
                self.retransmitter.abandon(self.peer, msg.message_id);
                debug!("request 0x{:04X} to {} timed out", msg.message_id, self.peer);
                Err(Error::ResponseTimeout)
            }
        }
    }

    /// Receives one message from the peer, regardless of its relation
    /// to any outstanding request.
    pub async fn receive(&self) -> Result<Message, Error> {
        let mut buf = vec![0u8; self.params.max_packet_len];
        loop {
            let (len, from) = self.transport.recv_from(&mut buf).await?;
            if from == self.peer {
                return Ok(Message::from_bytes(&buf[..len])?);
            }
        }
    }

    async fn wait_response(&self, req: &Message) -> Result<Message, Error> {
        let mut buf = vec![0u8; self.params.max_packet_len];

        loop {
            let (len, from) = self.transport.recv_from(&mut buf).await?;
            if from != self.peer {
                continue;
            }
            let msg = Message::from_bytes(&buf[..len])?;

            match msg.msg_type {
                MsgType::Ack if msg.message_id == req.message_id => {
                    self.retransmitter.acknowledge(self.peer, msg.message_id);
                    if msg.code.is_empty() {
                        // Separate acknowledgement; the response follows
                        // under the request's token.
                        debug!("request 0x{:04X} acknowledged separately", req.message_id);
                        continue;
                    }
                    return Ok(msg);
                }
                MsgType::Res if msg.message_id == req.message_id => {
                    self.retransmitter.reset(self.peer, msg.message_id);
                    return Err(Error::Reset);
                }
                MsgType::Con | MsgType::Non
                    if msg.code.is_response() && msg.token == req.token =>
                {
                    if msg.msg_type.is_con() {
                        // A confirmable separate response wants its own
                        // acknowledgement.
                        let ack = Message::new(MsgType::Ack, MsgCode::EMPTY, msg.message_id);
                        self.retransmitter.record(&ack, self.peer).await?;
                    }
                    return Ok(msg);
                }
                _ => {
                    debug!("ignoring unrelated message from {}: {}", self.peer, msg);
                }
            }
        }
    }
}
