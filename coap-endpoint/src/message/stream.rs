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

//! Length-prefixed framing of CoAP messages for reliable stream
//! transports.
//!
//! The stream header carries no version, type, or message id; it is a
//! length nibble and token-length nibble, optional extended length
//! bytes, the code, and the token. The length counts every byte after
//! the token (options, marker, and payload).
//!
//! Messages decoded from a stream are given `MsgType::Con` and message
//! id zero: the transport is reliable, so the fields only exist to keep
//! the rest of the endpoint uniform.

use super::parse::parse_options_into;
use super::*;
use crate::CodecError;

const LEN_NIBBLE_BYTE: u8 = 13;
const LEN_BYTE_ADDEND: u64 = 13;
const LEN_NIBBLE_WORD: u8 = 14;
const LEN_WORD_ADDEND: u64 = 269;
const LEN_NIBBLE_DWORD: u8 = 15;
const LEN_DWORD_ADDEND: u64 = 65805;

/// The largest option-plus-payload length the stream framing can carry.
pub const MAX_STREAM_MESSAGE_LEN: u64 = LEN_DWORD_ADDEND + u32::MAX as u64;

fn ext_len_size(nibble: u8) -> usize {
    match nibble {
        LEN_NIBBLE_BYTE => 1,
        LEN_NIBBLE_WORD => 2,
        LEN_NIBBLE_DWORD => 4,
        _ => 0,
    }
}

impl Message {
    /// Produces the stream wire form of this message.
    pub fn to_stream_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut body = Vec::with_capacity(self.payload.len() + 16);
        self.encode_options_and_payload(&mut body)?;

        let len = body.len() as u64;
        let mut buf = Vec::with_capacity(body.len() + self.token.len() + 6);

        let tkl = self.token.len() as u8;
        if len < LEN_BYTE_ADDEND {
            buf.push(((len as u8) << 4) | tkl);
        } else if len < LEN_WORD_ADDEND {
            buf.push((LEN_NIBBLE_BYTE << 4) | tkl);
            buf.push((len - LEN_BYTE_ADDEND) as u8);
        } else if len < LEN_DWORD_ADDEND {
            buf.push((LEN_NIBBLE_WORD << 4) | tkl);
            buf.extend_from_slice(&((len - LEN_WORD_ADDEND) as u16).to_be_bytes());
        } else {
            buf.push((LEN_NIBBLE_DWORD << 4) | tkl);
            buf.extend_from_slice(&((len - LEN_DWORD_ADDEND) as u32).to_be_bytes());
        }

        buf.push(self.code.0);
        buf.extend_from_slice(self.token.as_bytes());
        buf.extend_from_slice(&body);

        Ok(buf)
    }

    /// Attempts to decode one stream-framed message from the head of
    /// `data`.
    ///
    /// On success, returns the message and the number of bytes it
    /// occupied so the caller can drop them from its read queue. Returns
    /// `Ok(None)` when `data` does not yet hold a complete message; no
    /// input is consumed in that case, which is what a read loop wants.
    pub fn from_stream_head(data: &[u8]) -> Result<Option<(Message, usize)>, CodecError> {
        let header = match data.first() {
            Some(&b) => b,
            None => return Ok(None),
        };

        let len_nibble = header >> 4;
        let token_len = (header & 0x0F) as usize;
        if token_len > 8 {
            return Err(CodecError::InvalidTokenLen);
        }

        let ext_size = ext_len_size(len_nibble);
        // Header byte, extended length, code.
        let code_at = 1 + ext_size;
        if data.len() < code_at + 1 {
            return Ok(None);
        }

        let body_len = match len_nibble {
            LEN_NIBBLE_BYTE => data[1] as u64 + LEN_BYTE_ADDEND,
            LEN_NIBBLE_WORD => u16::from_be_bytes([data[1], data[2]]) as u64 + LEN_WORD_ADDEND,
            LEN_NIBBLE_DWORD => {
                u32::from_be_bytes([data[1], data[2], data[3], data[4]]) as u64 + LEN_DWORD_ADDEND
            }
            n => n as u64,
        };

        let total = code_at + 1 + token_len + body_len as usize;
        if data.len() < total {
            return Ok(None);
        }

        let token_at = code_at + 1;
        let mut msg = Message {
            msg_type: MsgType::Con,
            code: MsgCode(data[code_at]),
            message_id: 0,
            token: MsgToken::try_new(&data[token_at..token_at + token_len])?,
            ..Default::default()
        };

        parse_options_into(&mut msg, &data[token_at + token_len..total])?;

        Ok(Some((msg, total)))
    }
}
