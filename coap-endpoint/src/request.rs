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

//! The per-request handle passed to server handlers.

use crate::message::{Message, MsgCode, MsgIdGenerator, MsgType};
use crate::mux::ServeMux;
use crate::option::{OptionNumber, OptionValue};
use crate::retransmit::Retransmitter;
use crate::transport::DatagramTransport;
use crate::Error;
use futures::future::BoxFuture;
use futures::io::{AsyncWrite, AsyncWriteExt};
use futures::lock::Mutex;
use std::sync::Arc;

/// Handles one incoming request through its request handle.
///
/// The handle is consumed: a handler either acknowledges, responds, or
/// does neither, in which case the server falls back to a separate
/// empty acknowledgement for confirmable requests.
pub trait RequestHandler<R>: Send + Sync {
    /// Handles the request.
    fn handle(&self, req: R) -> BoxFuture<'_, Result<(), Error>>;
}

/// Adapter making a request handler out of a plain async function.
#[derive(Debug, Clone, Copy)]
pub struct HandlerFn<F>(F);

/// Builds a [`RequestHandler`] from a function or closure taking the
/// request handle.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn(f)
}

impl<R, F, Fut> RequestHandler<R> for HandlerFn<F>
where
    R: Send + 'static,
    F: Fn(R) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), Error>> + Send + 'static,
{
    fn handle(&self, req: R) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin((self.0)(req))
    }
}

/// An incoming datagram request waiting to be responded to.
pub struct DatagramRequest<T: DatagramTransport> {
    message: Message,
    peer: T::Peer,
    retransmitter: Retransmitter<T>,
    msg_ids: Arc<MsgIdGenerator>,
    acked: bool,
    responded: bool,
}

impl<T: DatagramTransport> std::fmt::Debug for DatagramRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramRequest")
            .field("peer", &self.peer)
            .field("message", &self.message)
            .field("acked", &self.acked)
            .field("responded", &self.responded)
            .finish()
    }
}

impl<T: DatagramTransport> DatagramRequest<T> {
    pub(crate) fn new(
        message: Message,
        peer: T::Peer,
        retransmitter: Retransmitter<T>,
        msg_ids: Arc<MsgIdGenerator>,
    ) -> DatagramRequest<T> {
        DatagramRequest {
            message,
            peer,
            retransmitter,
            msg_ids,
            acked: false,
            responded: false,
        }
    }

    /// The parsed request.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The remote address the request came from.
    pub fn peer(&self) -> &T::Peer {
        &self.peer
    }

    /// Sends a separate acknowledgement ahead of the eventual response,
    /// so the peer stops retransmitting while the handler does slow
    /// work.
    ///
    /// Idempotent, and a no-op for non-confirmable requests or after a
    /// response has already been recorded.
    pub async fn ack(&mut self) -> Result<(), Error> {
        if !self.message.is_confirmable() || self.acked || self.responded {
            return Ok(());
        }

        let ack = Message::new(MsgType::Ack, MsgCode::EMPTY, self.message.message_id);
        self.retransmitter.record(&ack, self.peer).await?;
        self.acked = true;
        Ok(())
    }

    /// Responds to the request.
    ///
    /// If [`ack`](Self::ack) has not been called this is a piggy-backed
    /// acknowledgement reusing the request's message id; after a
    /// separate acknowledgement it is a fresh non-confirmable message
    /// with a newly assigned id. Either way the response carries the
    /// request's token.
    pub async fn respond<O>(&mut self, code: MsgCode, payload: Vec<u8>, options: O) -> Result<(), Error>
    where
        O: IntoIterator<Item = (OptionNumber, OptionValue)>,
    {
        let mut msg = if self.acked {
            Message::new(MsgType::Non, code, self.msg_ids.next_id())
        } else {
            Message::new(MsgType::Ack, code, self.message.message_id)
        };
        msg.token = self.message.token;
        msg.payload = payload;
        for (number, value) in options {
            msg.add_option(number, value);
        }

        self.transmit(msg).await
    }

    /// Transmits a fully formed response message, routed through the
    /// retransmitter (which only enrolls confirmable messages).
    pub async fn transmit(&mut self, msg: Message) -> Result<(), Error> {
        self.retransmitter.record(&msg, self.peer).await?;
        self.responded = true;
        Ok(())
    }

    /// Whether a response has been recorded for this request.
    pub fn responded(&self) -> bool {
        self.responded
    }
}

impl<T: DatagramTransport> RequestHandler<DatagramRequest<T>> for ServeMux<T::Peer> {
    fn handle(&self, mut req: DatagramRequest<T>) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            match self.dispatch(&req.peer, &req.message) {
                Some(rsp) => req.transmit(rsp).await,
                // No reply from the handler: confirmable requests still
                // deserve an empty acknowledgement.
                None => req.ack().await,
            }
        })
    }
}

/// An incoming request on a reliable stream transport.
///
/// The transport already guarantees delivery, so `ack` is a no-op and
/// the response is a single frame carrying message id zero and the
/// request's token.
pub struct StreamRequest<W, P> {
    message: Message,
    peer: P,
    writer: Arc<Mutex<W>>,
    responded: bool,
}

impl<W, P: std::fmt::Debug> std::fmt::Debug for StreamRequest<W, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("peer", &self.peer)
            .field("message", &self.message)
            .field("responded", &self.responded)
            .finish()
    }
}

impl<W, P> StreamRequest<W, P>
where
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(message: Message, peer: P, writer: Arc<Mutex<W>>) -> StreamRequest<W, P> {
        StreamRequest {
            message,
            peer,
            writer,
            responded: false,
        }
    }

    /// The parsed request.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The remote address the request came from.
    pub fn peer(&self) -> &P {
        &self.peer
    }

    /// Does nothing: the transport is reliable.
    pub async fn ack(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Responds to the request with a single framed response record.
    pub async fn respond<O>(&mut self, code: MsgCode, payload: Vec<u8>, options: O) -> Result<(), Error>
    where
        O: IntoIterator<Item = (OptionNumber, OptionValue)>,
    {
        let mut msg = Message::new(MsgType::Ack, code, 0);
        msg.token = self.message.token;
        msg.payload = payload;
        for (number, value) in options {
            msg.add_option(number, value);
        }
        self.transmit(msg).await
    }

    /// Writes a fully formed response message to the stream.
    pub async fn transmit(&mut self, mut msg: Message) -> Result<(), Error> {
        msg.message_id = 0;
        let wire = msg.to_stream_bytes()?;

        let mut writer = self.writer.lock().await;
        writer.write_all(&wire).await?;
        writer.flush().await?;

        self.responded = true;
        Ok(())
    }
}

impl<W, P> RequestHandler<StreamRequest<W, P>> for ServeMux<P>
where
    W: AsyncWrite + Unpin + Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    fn handle(&self, mut req: StreamRequest<W, P>) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async move {
            match self.dispatch(&req.peer, &req.message) {
                Some(rsp) => req.transmit(rsp).await,
                None => Ok(()),
            }
        })
    }
}
