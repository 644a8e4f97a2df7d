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

//! An asynchronous implementation of the Constrained Application
//! Protocol (CoAP, [RFC 7252]), for building both constrained clients
//! and lightweight servers.
//!
//! [RFC 7252]: https://tools.ietf.org/html/rfc7252
//!
//! The crate is organized around a small set of pieces:
//!
//! * [`message`]: the [`Message`](message::Message) type and its
//!   bit-exact datagram and stream codecs.
//! * [`option`]: typed option values and the RFC 7252 option-number
//!   registry.
//! * [`Retransmitter`]: the confirmable-message reliability state
//!   machine (randomized initial timeout, exponential back-off, bounded
//!   retransmit count, acknowledgement deduplication).
//! * [`ServeMux`] and the request handles in [`request`]: path-pattern
//!   dispatch with piggy-backed or separate acknowledgements.
//! * [`ObserveHub`]: long-lived server-push notifications to the
//!   subscribers of a resource ([RFC 7641]).
//! * [`Server`] and [`Client`]: the receive loops gluing the above to a
//!   transport.
//!
//! [RFC 7641]: https://tools.ietf.org/html/rfc7641
//!
//! The core is transport-agnostic: anything implementing
//! [`DatagramTransport`] (or the `futures` io traits, for the
//! length-framed stream variant) will do. Tokio-backed UDP and TCP
//! transports live in the companion `coap-endpoint-tokio` crate, and
//! in-memory transports for tests live in [`loopback`].
//!
//! ## Example
//!
//! ```no_run
//! use coap_endpoint::prelude::*;
//! use coap_endpoint::loopback::loopback_pair;
//!
//! # async fn run() -> Result<(), coap_endpoint::Error> {
//! let (server_side, _client_side) = loopback_pair();
//!
//! let mut mux = ServeMux::new();
//! mux.handle_fn("hello", |_peer, req: &Message| {
//!     let mut rsp = Message::new(MsgType::Ack, MsgCode::CONTENT, req.message_id);
//!     rsp.token = req.token;
//!     rsp.payload = b"hi there".to_vec();
//!     Some(rsp)
//! });
//!
//! let server = Server::new(server_side, mux, TransmissionParameters::default());
//! server.serve().await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

#[macro_use]
extern crate log;

pub mod message;
pub mod option;

mod block;
pub use block::BlockInfo;

mod client;
pub use client::Client;

mod consts;
pub use consts::*;

mod content_format;
pub use content_format::ContentFormat;

mod error;
pub use error::{CodecError, Error};

pub mod loopback;

mod mux;
pub use mux::{Handler, ServeMux};

mod observe;
pub use observe::{observe_newer, ObserveHub};

mod request;
pub use request::{handler_fn, DatagramRequest, HandlerFn, RequestHandler, StreamRequest};

mod retransmit;
pub use retransmit::{Exchange, Retransmitter};

mod server;
pub use server::{serve_stream, Server};

mod transport;
pub use transport::{DatagramTransport, DatagramTransportExt};

mod util;

/// A convenience collection of the types most endpoints need.
pub mod prelude {
    pub use crate::consts::TransmissionParameters;
    pub use crate::message::{Message, MsgCode, MsgToken, MsgType};
    pub use crate::mux::ServeMux;
    pub use crate::option::{OptionNumber, OptionValue};
    pub use crate::transport::{DatagramTransport, DatagramTransportExt};
    pub use crate::{Client, Error, Server};
}
