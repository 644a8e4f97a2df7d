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

//! [Tokio][]-backed transports for the [`coap-endpoint`] crate.
//!
//! [`UdpTransport`] implements the core's datagram-transport trait over
//! [`tokio::net::UdpSocket`], and the [`tcp`] module adapts
//! [`tokio::net::TcpStream`] to the `futures` io traits the core's
//! stream server is written against.
//!
//! [Tokio]: https://tokio.rs/
//! [`coap-endpoint`]: https://docs.rs/coap-endpoint
//!
//! ## Example
//!
//! ```no_run
//! use coap_endpoint::prelude::*;
//! use coap_endpoint_tokio::dial;
//!
//! # async fn run() -> Result<(), coap_endpoint::Error> {
//! let client = dial("192.0.2.1:5683".parse().unwrap()).await?;
//!
//! let mut req = Message::new(MsgType::Con, MsgCode::GET, client.next_message_id());
//! req.set_path_string("/temperature");
//!
//! if let Some(rsp) = client.send(req).await? {
//!     println!("got response: {}", rsp);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

mod udp;
pub use udp::{dial, dial_with_parameters, UdpTransport};

pub mod tcp;
pub use tcp::serve_tcp;
