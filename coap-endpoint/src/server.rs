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

//! Server receive loops for datagram and stream transports.

use crate::consts::{TransmissionParameters, OBSERVE_DEREGISTER, OBSERVE_REGISTER};
use crate::message::{Message, MsgCode, MsgIdGenerator, MsgType};
use crate::observe::ObserveHub;
use crate::request::{DatagramRequest, RequestHandler, StreamRequest};
use crate::retransmit::Retransmitter;
use crate::transport::{is_transient, DatagramTransport, DatagramTransportExt};
use crate::Error;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use futures::lock::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// How long the receive loop backs off after a transient read error.
const TRANSIENT_READ_BACKOFF: Duration = Duration::from_millis(5);

/// A CoAP server bound to one datagram transport.
///
/// The server runs a single receive loop. Acknowledgements and resets
/// are applied to the retransmitter inline; every request is handed to
/// its own task so a slow handler never blocks the loop.
pub struct Server<T: DatagramTransport, H> {
    transport: Arc<T>,
    handler: Arc<H>,
    retransmitter: Retransmitter<T>,
    msg_ids: Arc<MsgIdGenerator>,
    hub: Option<ObserveHub<T>>,
    params: TransmissionParameters,
}

impl<T: DatagramTransport, H> std::fmt::Debug for Server<T, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("observe", &self.hub.is_some())
            .field("params", &self.params)
            .finish()
    }
}

impl<T, H> Server<T, H>
where
    T: DatagramTransport,
    H: RequestHandler<DatagramRequest<T>> + Send + Sync + 'static,
{
    /// Creates a server reading from `transport` and dispatching every
    /// request to `handler`.
    pub fn new(transport: T, handler: H, params: TransmissionParameters) -> Server<T, H> {
        let transport = Arc::new(transport);
        let retransmitter = Retransmitter::new(transport.clone(), params);
        Server {
            transport,
            handler: Arc::new(handler),
            retransmitter,
            msg_ids: Arc::new(MsgIdGenerator::new()),
            hub: None,
            params,
        }
    }

    /// Attaches an observe hub, enabling subscription handling: GET
    /// requests carrying Observe=0 register the requester as an
    /// observer of the request path, Observe=1 deregisters it.
    pub fn with_observe_hub(mut self) -> Server<T, H> {
        self.hub = Some(ObserveHub::new(self.retransmitter.clone()));
        self
    }

    /// The hub used for pushing notifications, if one is attached.
    pub fn observe_hub(&self) -> Option<&ObserveHub<T>> {
        self.hub.as_ref()
    }

    /// The retransmitter this server sends responses through.
    pub fn retransmitter(&self) -> &Retransmitter<T> {
        &self.retransmitter
    }

    /// Runs the receive loop until the transport fails permanently.
    ///
    /// Malformed datagrams are logged and dropped; transient read
    /// errors are retried after a short back-off.
    pub async fn serve(&self) -> Result<(), Error> {
        let mut buf = vec![0u8; self.params.max_packet_len];

        loop {
            let (len, peer) = match self.transport.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) if is_transient(&err) => {
                    tokio::time::sleep(TRANSIENT_READ_BACKOFF).await;
                    continue;
                }
                Err(err) => {
                    error!("receive loop exiting: {}", err);
                    return Err(err.into());
                }
            };

            let msg = match Message::from_bytes(&buf[..len]) {
                Ok(msg) => msg,
                Err(err) => {
                    warn!("dropping malformed datagram from {}: {}", peer, err);
                    continue;
                }
            };
            debug!("inbound from {}: {}", peer, msg);

            match msg.msg_type {
                MsgType::Ack | MsgType::Res => {
                    self.retransmitter.received(&msg, peer);
                }
                MsgType::Con | MsgType::Non => {
                    if !msg.code.is_request() {
                        debug!("ignoring non-request {} from {}", msg.code, peer);
                        continue;
                    }

                    self.apply_observe_options(&msg, peer);

                    let request = DatagramRequest::new(
                        msg,
                        peer,
                        self.retransmitter.clone(),
                        self.msg_ids.clone(),
                    );
                    let handler = self.handler.clone();
                    tokio::spawn(async move {
                        if let Err(err) = handler.handle(request).await {
                            warn!("request handler failed: {}", err);
                        }
                    });
                }
            }
        }
    }

    fn apply_observe_options(&self, msg: &Message, peer: T::Peer) {
        let hub = match &self.hub {
            Some(hub) => hub,
            None => return,
        };
        if msg.code != MsgCode::GET {
            return;
        }
        match msg.option_uint(crate::option::OptionNumber::OBSERVE) {
            Some(OBSERVE_REGISTER) => hub.register(&msg.path_string(), peer, msg.token),
            Some(OBSERVE_DEREGISTER) => hub.unregister(&msg.path_string(), peer),
            _ => {}
        }
    }
}

/// Serves one reliable stream connection.
///
/// Reads length-framed messages from `reader` until it is closed,
/// handing each to `handler` with a request handle that writes framed
/// responses to `writer`. A framing error is fatal for the connection:
/// once the byte queue is out of sync there is no way back.
pub async fn serve_stream<R, W, P, H>(
    mut reader: R,
    writer: W,
    peer: P,
    handler: Arc<H>,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
    P: Clone + Send + Sync + std::fmt::Display,
    H: RequestHandler<StreamRequest<W, P>> + Send + Sync,
{
    let writer = Arc::new(Mutex::new(writer));
    let mut queue: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 2048];

    loop {
        // Drain every complete message at the head of the queue.
        while let Some((msg, used)) = Message::from_stream_head(&queue)? {
            queue.drain(..used);
            debug!("inbound stream message from {}: {}", peer, msg);

            let request = StreamRequest::new(msg, peer.clone(), writer.clone());
            if let Err(err) = handler.handle(request).await {
                warn!("stream request handler failed: {}", err);
            }
        }

        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            debug!("stream from {} closed", peer);
            return Ok(());
        }
        queue.extend_from_slice(&chunk[..read]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::loopback_pair;
    use crate::message::MsgToken;
    use crate::mux::ServeMux;
    use crate::option::OptionNumber;
    use crate::transport::DatagramTransportExt;

    fn mux() -> ServeMux<crate::loopback::LoopbackAddr> {
        let mut mux = ServeMux::new();
        mux.handle_fn("/hello", |_peer, msg: &Message| {
            let mut rsp = Message::new(MsgType::Ack, MsgCode::CONTENT, msg.message_id);
            rsp.token = msg.token;
            rsp.payload = b"hi there".to_vec();
            Some(rsp)
        });
        mux
    }

    #[tokio::test]
    async fn serves_a_piggybacked_response() {
        let (a, b) = loopback_pair();
        let server = Server::new(a, mux(), TransmissionParameters::default());
        let peer_a = b.peer_addr();
        tokio::spawn(async move { server.serve().await });

        let mut req = Message::new(MsgType::Con, MsgCode::GET, 0x1234);
        req.token = MsgToken::try_new(&[1]).unwrap();
        req.set_path_string("hello");
        b.send_to(&req.to_bytes().unwrap(), peer_a).await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let rsp = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(rsp.msg_type, MsgType::Ack);
        assert_eq!(rsp.code, MsgCode::CONTENT);
        assert_eq!(rsp.message_id, 0x1234);
        assert_eq!(rsp.token, req.token);
        assert_eq!(rsp.payload, b"hi there");
    }

    #[tokio::test]
    async fn unmatched_confirmable_gets_not_found() {
        let (a, b) = loopback_pair();
        let server = Server::new(a, mux(), TransmissionParameters::default());
        let peer_a = b.peer_addr();
        tokio::spawn(async move { server.serve().await });

        let req = {
            let mut req = Message::new(MsgType::Con, MsgCode::GET, 0x2345);
            req.set_path_string("missing");
            req
        };
        b.send_to(&req.to_bytes().unwrap(), peer_a).await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let rsp = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(rsp.code, MsgCode::NOT_FOUND);
        assert_eq!(rsp.message_id, 0x2345);
    }

    #[tokio::test]
    async fn malformed_datagrams_are_dropped() {
        let (a, b) = loopback_pair();
        let server = Server::new(a, mux(), TransmissionParameters::default());
        let peer_a = b.peer_addr();
        tokio::spawn(async move { server.serve().await });

        // Garbage first, then a valid request; the loop must survive.
        b.send_to(&[0xDE, 0xAD], peer_a).await.unwrap();
        let mut req = Message::new(MsgType::Con, MsgCode::GET, 0x3456);
        req.set_path_string("hello");
        b.send_to(&req.to_bytes().unwrap(), peer_a).await.unwrap();

        let mut buf = [0u8; 256];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let rsp = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(rsp.message_id, 0x3456);
    }

    #[tokio::test]
    async fn observe_registration_flows_to_the_hub() {
        let (a, b) = loopback_pair();
        let server =
            Server::new(a, mux(), TransmissionParameters::default()).with_observe_hub();
        let hub = server.observe_hub().unwrap().clone();
        let peer_a = b.peer_addr();
        tokio::spawn(async move { server.serve().await });

        let mut req = Message::new(MsgType::Con, MsgCode::GET, 0x4567);
        req.token = MsgToken::try_new(&[0x0B]).unwrap();
        req.set_path_string("hello");
        req.set_option(OptionNumber::OBSERVE, 0u32);
        b.send_to(&req.to_bytes().unwrap(), peer_a).await.unwrap();

        // First the piggybacked response to the GET itself.
        let mut buf = [0u8; 256];
        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let rsp = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(rsp.code, MsgCode::CONTENT);

        // Then a pushed notification for the observed resource.
        let mut update = Message::new(MsgType::Non, MsgCode::CONTENT, 0);
        update.payload = b"update".to_vec();
        hub.notify("hello", update);

        let (len, _) = b.recv_from(&mut buf).await.unwrap();
        let note = Message::from_bytes(&buf[..len]).unwrap();
        assert_eq!(note.payload, b"update");
        assert_eq!(note.token, req.token);
        assert_eq!(note.option_uint(OptionNumber::OBSERVE), Some(0));
    }

    #[derive(Clone, Default)]
    struct SharedWriter(Arc<std::sync::Mutex<Vec<u8>>>);

    impl AsyncWrite for SharedWriter {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.lock().unwrap().extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn stream_requests_are_answered_in_frame_order() {
        use futures::io::Cursor;

        let mut first = Message::new(MsgType::Con, MsgCode::GET, 0);
        first.token = MsgToken::try_new(&[0x01]).unwrap();
        first.set_path_string("hello");
        let mut second = Message::new(MsgType::Con, MsgCode::GET, 0);
        second.token = MsgToken::try_new(&[0x02]).unwrap();
        second.set_path_string("nowhere");

        let mut inbound = first.to_stream_bytes().unwrap();
        inbound.extend_from_slice(&second.to_stream_bytes().unwrap());

        let writer = SharedWriter::default();
        let handler = Arc::new(mux());
        serve_stream(
            Cursor::new(inbound),
            writer.clone(),
            crate::loopback::LoopbackAddr(9),
            handler,
        )
        .await
        .unwrap();

        let written = writer.0.lock().unwrap().clone();
        let (rsp, used) = Message::from_stream_head(&written).unwrap().unwrap();
        assert_eq!(rsp.code, MsgCode::CONTENT);
        assert_eq!(rsp.token.as_bytes(), &[0x01]);
        assert_eq!(rsp.payload, b"hi there");

        // The unmatched path gets a 4.04 on the same stream.
        let (rsp, more) = Message::from_stream_head(&written[used..])
            .unwrap()
            .unwrap();
        assert_eq!(rsp.code, MsgCode::NOT_FOUND);
        assert_eq!(rsp.token.as_bytes(), &[0x02]);
        assert_eq!(used + more, written.len());
    }
}
