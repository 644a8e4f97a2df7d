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

//! CoAP-over-TCP plumbing: adapters from [`tokio::net::TcpStream`] to
//! the `futures` io traits the core's stream server consumes, and an
//! accept loop serving every connection of a listener.

use coap_endpoint::{serve_stream, RequestHandler, StreamRequest};
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead as _, AsyncWrite as _, ReadBuf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

/// The read half of a TCP connection, as a `futures` `AsyncRead`.
#[derive(Debug)]
pub struct TcpReader(OwnedReadHalf);

/// The write half of a TCP connection, as a `futures` `AsyncWrite`.
#[derive(Debug)]
pub struct TcpWriter(OwnedWriteHalf);

/// Splits a connection into the halves the stream server consumes.
pub fn split_stream(stream: TcpStream) -> (TcpReader, TcpWriter) {
    let (read, write) = stream.into_split();
    (TcpReader(read), TcpWriter(write))
}

impl futures::io::AsyncRead for TcpReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let mut read_buf = ReadBuf::new(buf);
        match Pin::new(&mut self.0).poll_read(cx, &mut read_buf) {
            Poll::Ready(Ok(())) => Poll::Ready(Ok(read_buf.filled().len())),
            Poll::Ready(Err(err)) => Poll::Ready(Err(err)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl futures::io::AsyncWrite for TcpWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

/// Accepts connections forever, serving each one on its own task.
pub async fn serve_tcp<H>(listener: TcpListener, handler: Arc<H>) -> io::Result<()>
where
    H: RequestHandler<StreamRequest<TcpWriter, SocketAddr>> + Send + Sync + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        log::debug!("accepted CoAP-over-TCP connection from {}", peer);

        let handler = handler.clone();
        tokio::spawn(async move {
            let (reader, writer) = split_stream(stream);
            if let Err(err) = serve_stream(reader, writer, peer, handler).await {
                log::warn!("connection from {} ended: {}", peer, err);
            }
        });
    }
}
