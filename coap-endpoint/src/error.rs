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

use thiserror::Error;

/// Errors produced while encoding or decoding CoAP messages.
///
/// These are cheap to copy and compare, which keeps codec call sites
/// and tests straightforward.
#[derive(Debug, Error, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CodecError {
    /// The datagram is shorter than the fixed CoAP header.
    #[error("short packet")]
    ShortPacket,

    /// The version field was not 1.
    #[error("invalid version")]
    InvalidVersion,

    /// The token length field exceeded eight bytes.
    #[error("invalid token length")]
    InvalidTokenLen,

    /// An option delta pushed the option number past the representable range.
    #[error("option gap too large")]
    OptionGapTooLarge,

    /// An option value is longer than the wire format can express.
    #[error("option is too long")]
    OptionTooLong,

    /// The buffer ended in the middle of a header, option, or payload.
    #[error("truncated")]
    Truncated,

    /// The reserved nibble value 15 appeared in an option header.
    #[error("unexpected extended option marker")]
    UnexpectedExtendedOptionMarker,
}

/// Type for errors encountered while sending or receiving CoAP requests
/// and responses.
#[derive(Debug, Error)]
pub enum Error {
    /// A message could not be encoded or decoded.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),

    /// The underlying transport failed.
    #[error("transport: {0}")]
    Io(#[from] std::io::Error),

    /// No response arrived within the configured response timeout.
    #[error("timed out waiting for a response")]
    ResponseTimeout,

    /// A confirmable exchange exhausted its retransmit budget without
    /// being acknowledged.
    #[error("confirmable transmission timed out")]
    TransmissionTimeout,

    /// The peer answered with a reset message.
    #[error("exchange was reset by the peer")]
    Reset,
}

impl Error {
    /// Returns true if this error indicates that the peer reset the exchange.
    pub fn is_reset(&self) -> bool {
        matches!(self, Error::Reset)
    }

    /// Returns true if this error is one of the two timeout flavors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ResponseTimeout | Error::TransmissionTimeout)
    }
}
