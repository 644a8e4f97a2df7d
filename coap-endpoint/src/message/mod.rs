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

//! Types related to building, parsing, and encoding CoAP messages.

use crate::option::{OptionNumber, OptionValue};
use rand::Rng;
use std::sync::atomic::{AtomicU16, Ordering};

/// Type for representing a CoAP message id.
pub type MsgId = u16;

mod msg_code;
pub use msg_code::MsgCode;

mod msg_type;
pub use msg_type::MsgType;

mod token;
pub use token::MsgToken;

mod display;

mod encode;
mod parse;

mod stream;
pub use stream::MAX_STREAM_MESSAGE_LEN;

pub(crate) const COAP_VERSION: u8 = 1;

pub(crate) const COAP_MSG_T_MASK: u8 = 0b0011_0000;
pub(crate) const COAP_MSG_T_OFFS: u8 = 4;
pub(crate) const COAP_MSG_TKL_MASK: u8 = 0b0000_1111;
pub(crate) const COAP_MSG_VER_OFFS: u8 = 6;

/// The marker byte separating the option list from the payload.
pub(crate) const PAYLOAD_MARKER: u8 = 0xFF;

/// A CoAP message.
///
/// The option list is kept in insertion order internally; the encoder
/// stable-sorts it by option number, so repeated options (Uri-Path
/// segments, for example) keep their relative order on the wire.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Message {
    /// The message type: CON, NON, ACK, or RST.
    pub msg_type: MsgType,

    /// The request method or response code.
    pub code: MsgCode,

    /// The 16-bit message id of this datagram exchange.
    pub message_id: MsgId,

    /// Zero to eight opaque bytes correlating responses to requests.
    pub token: MsgToken,

    /// The payload, stored without the `0xFF` wire marker.
    pub payload: Vec<u8>,

    options: Vec<(OptionNumber, OptionValue)>,
}

impl Message {
    /// Creates a new message with no token, options, or payload.
    pub fn new(msg_type: MsgType, code: MsgCode, message_id: MsgId) -> Message {
        Message {
            msg_type,
            code,
            message_id,
            ..Default::default()
        }
    }

    /// Returns true if this message is confirmable.
    pub fn is_confirmable(&self) -> bool {
        self.msg_type.is_con()
    }

    /// Appends an option without disturbing any existing entries.
    pub fn add_option(&mut self, number: OptionNumber, value: impl Into<OptionValue>) {
        self.options.push((number, value.into()));
    }

    /// Sets an option, discarding any previous entries with the same number.
    pub fn set_option(&mut self, number: OptionNumber, value: impl Into<OptionValue>) {
        self.remove_option(number);
        self.add_option(number, value);
    }

    /// Removes all entries for the given option number.
    pub fn remove_option(&mut self, number: OptionNumber) {
        self.options.retain(|(n, _)| *n != number);
    }

    /// Gets all the values for the given option, in insertion order.
    pub fn options(&self, number: OptionNumber) -> impl Iterator<Item = &OptionValue> {
        self.options
            .iter()
            .filter(move |(n, _)| *n == number)
            .map(|(_, v)| v)
    }

    /// Gets the first value for the given option number.
    pub fn option(&self, number: OptionNumber) -> Option<&OptionValue> {
        self.options(number).next()
    }

    /// Gets the first value for the given option number as an unsigned
    /// integer, if it is one.
    pub fn option_uint(&self, number: OptionNumber) -> Option<u32> {
        self.option(number).and_then(OptionValue::as_uint)
    }

    /// The full option list in insertion order. The encoder is the only
    /// place ordering by option number happens.
    pub fn all_options(&self) -> &[(OptionNumber, OptionValue)] {
        &self.options
    }

    pub(crate) fn push_decoded_option(&mut self, number: OptionNumber, value: OptionValue) {
        self.options.push((number, value));
    }

    /// Gets the Uri-Path segments set on this message, if any.
    pub fn path(&self) -> Vec<String> {
        self.options(OptionNumber::URI_PATH)
            .map(OptionValue::to_text)
            .collect()
    }

    /// Gets the Uri-Path as a `/`-separated string.
    pub fn path_string(&self) -> String {
        self.path().join("/")
    }

    /// Replaces the Uri-Path options with one entry per segment.
    pub fn set_path<S: AsRef<str>>(&mut self, segments: &[S]) {
        self.remove_option(OptionNumber::URI_PATH);
        for segment in segments {
            self.add_option(OptionNumber::URI_PATH, segment.as_ref());
        }
    }

    /// Sets the Uri-Path from a `/`-separated string, ignoring any
    /// leading slashes.
    ///
    /// An empty input produces a single empty segment; callers that care
    /// should validate beforehand.
    pub fn set_path_string(&mut self, s: &str) {
        let trimmed = s.trim_start_matches('/');
        let segments: Vec<&str> = trimmed.split('/').collect();
        self.set_path(&segments);
    }
}

/// Source of message ids for an endpoint.
///
/// Starts at a random value so that successful off-path attacks are less
/// likely, then increments per message; wrap-around is fine because the
/// retransmitter keys exchanges by (peer, id).
#[derive(Debug)]
pub struct MsgIdGenerator(AtomicU16);

impl MsgIdGenerator {
    /// Creates a new generator seeded from the thread RNG.
    pub fn new() -> MsgIdGenerator {
        MsgIdGenerator(AtomicU16::new(rand::thread_rng().gen()))
    }

    /// Returns the next message id.
    pub fn next_id(&self) -> MsgId {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for MsgIdGenerator {
    fn default() -> Self {
        MsgIdGenerator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmable() {
        assert!(Message::new(MsgType::Con, MsgCode::GET, 1).is_confirmable());
        assert!(!Message::new(MsgType::Non, MsgCode::GET, 1).is_confirmable());
    }

    #[test]
    fn missing_option() {
        let msg = Message::default();
        assert_eq!(msg.option(OptionNumber::MAX_AGE), None);
    }

    #[test]
    fn set_option_discards_previous() {
        let mut msg = Message::default();
        msg.add_option(OptionNumber::URI_QUERY, "a=1");
        msg.add_option(OptionNumber::URI_QUERY, "b=2");
        msg.set_option(OptionNumber::URI_QUERY, "c=3");
        let values: Vec<_> = msg.options(OptionNumber::URI_QUERY).collect();
        assert_eq!(values, vec![&OptionValue::Str("c=3".into())]);
    }

    #[test]
    fn path_round_trip() {
        let mut msg = Message::default();
        msg.set_path_string("/foo/bar");
        assert_eq!(msg.path(), vec!["foo", "bar"]);
        assert_eq!(msg.path_string(), "foo/bar");
    }

    #[test]
    fn leading_slash_is_insignificant() {
        let mut with = Message::default();
        with.set_path_string("/foo/bar");
        let mut without = Message::default();
        without.set_path_string("foo/bar");
        assert_eq!(with, without);
    }

    #[test]
    fn empty_path_is_single_empty_segment() {
        let mut msg = Message::default();
        msg.set_path_string("");
        assert_eq!(msg.path(), vec![""]);
    }

    #[test]
    fn msg_ids_increment() {
        let gen = MsgIdGenerator::new();
        let first = gen.next_id();
        assert_eq!(gen.next_id(), first.wrapping_add(1));
    }
}
