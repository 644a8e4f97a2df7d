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

//! Datagram (UDP) parsing of CoAP messages.

use super::*;
use crate::CodecError;

const EXT_BYTE_CODE: u8 = 13;
const EXT_BYTE_ADDEND: u32 = 13;
const EXT_WORD_CODE: u8 = 14;
const EXT_WORD_ADDEND: u32 = 269;
const EXT_RESERVED: u8 = 15;

fn parse_ext(nibble: u8, b: &mut &[u8]) -> Result<u32, CodecError> {
    match nibble {
        EXT_BYTE_CODE => {
            let (&first, rest) = b.split_first().ok_or(CodecError::Truncated)?;
            *b = rest;
            Ok(first as u32 + EXT_BYTE_ADDEND)
        }
        EXT_WORD_CODE => {
            if b.len() < 2 {
                return Err(CodecError::Truncated);
            }
            let ext = u16::from_be_bytes([b[0], b[1]]) as u32;
            *b = &b[2..];
            Ok(ext + EXT_WORD_ADDEND)
        }
        n => Ok(n as u32),
    }
}

/// Walks an option stream, appending each decoded option to `msg`, and
/// consumes the remainder as the payload when the `0xFF` marker is seen.
///
/// Used by both the datagram and stream framings, whose formats only
/// differ ahead of the option list.
pub(crate) fn parse_options_into(msg: &mut Message, mut b: &[u8]) -> Result<(), CodecError> {
    let mut prev = 0u32;

    while let Some((&header, rest)) = b.split_first() {
        if header == PAYLOAD_MARKER {
            if rest.is_empty() {
                // A marker with nothing behind it is a format error.
                return Err(CodecError::Truncated);
            }
            msg.payload = rest.to_vec();
            return Ok(());
        }

        let delta_nibble = header >> 4;
        let len_nibble = header & 0x0F;
        if delta_nibble == EXT_RESERVED || len_nibble == EXT_RESERVED {
            return Err(CodecError::UnexpectedExtendedOptionMarker);
        }

        b = rest;
        let delta = parse_ext(delta_nibble, &mut b)?;
        let len = parse_ext(len_nibble, &mut b)? as usize;

        let number = prev + delta;
        if number > u16::MAX as u32 {
            return Err(CodecError::OptionGapTooLarge);
        }

        if b.len() < len {
            return Err(CodecError::Truncated);
        }

        let number = OptionNumber(number as u16);
        let value = OptionValue::decode(number, &b[..len])?;
        msg.push_decoded_option(number, value);

        b = &b[len..];
        prev = number.0 as u32;
    }

    // No marker: the message has no payload.
    Ok(())
}

impl Message {
    /// The minimum length of a valid datagram message.
    pub const MIN_MESSAGE_LEN: usize = 4;

    /// Parses the given buffer as a single datagram-framed message.
    pub fn from_bytes(data: &[u8]) -> Result<Message, CodecError> {
        if data.len() < Self::MIN_MESSAGE_LEN {
            return Err(CodecError::ShortPacket);
        }

        if data[0] >> COAP_MSG_VER_OFFS != COAP_VERSION {
            return Err(CodecError::InvalidVersion);
        }

        let msg_type = MsgType::from_wire((data[0] & COAP_MSG_T_MASK) >> COAP_MSG_T_OFFS);
        let token_len = (data[0] & COAP_MSG_TKL_MASK) as usize;
        if token_len > 8 {
            return Err(CodecError::InvalidTokenLen);
        }
        if data.len() < 4 + token_len {
            return Err(CodecError::Truncated);
        }

        let mut msg = Message {
            msg_type,
            code: MsgCode(data[1]),
            message_id: u16::from_be_bytes([data[2], data[3]]),
            token: MsgToken::try_new(&data[4..4 + token_len])?,
            ..Default::default()
        };

        parse_options_into(&mut msg, &data[4 + token_len..])?;

        Ok(msg)
    }
}
