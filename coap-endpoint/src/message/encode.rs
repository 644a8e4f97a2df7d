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

//! Datagram (UDP) encoding of CoAP messages.

use super::*;
use crate::option::MAX_OPTION_VALUE_SIZE;
use crate::CodecError;

// Extended delta/length encoding, RFC 7252 section 3.1.
const EXT_BYTE_CODE: u8 = 13;
const EXT_BYTE_ADDEND: usize = 13;
const EXT_WORD_CODE: u8 = 14;
const EXT_WORD_ADDEND: usize = 269;

fn nibble_for(value: usize) -> (u8, Option<Vec<u8>>) {
    if value < EXT_BYTE_ADDEND {
        (value as u8, None)
    } else if value < EXT_WORD_ADDEND {
        (EXT_BYTE_CODE, Some(vec![(value - EXT_BYTE_ADDEND) as u8]))
    } else {
        let ext = (value - EXT_WORD_ADDEND) as u16;
        (EXT_WORD_CODE, Some(ext.to_be_bytes().to_vec()))
    }
}

fn write_option_header(buf: &mut Vec<u8>, delta: usize, len: usize) -> Result<(), CodecError> {
    if len > MAX_OPTION_VALUE_SIZE {
        return Err(CodecError::OptionTooLong);
    }
    if delta > MAX_OPTION_VALUE_SIZE {
        return Err(CodecError::OptionGapTooLarge);
    }

    let (d, d_ext) = nibble_for(delta);
    let (l, l_ext) = nibble_for(len);

    buf.push((d << 4) | l);
    if let Some(ext) = d_ext {
        buf.extend_from_slice(&ext);
    }
    if let Some(ext) = l_ext {
        buf.extend_from_slice(&ext);
    }

    Ok(())
}

impl Message {
    /// Serializes the option list (stable-sorted by option number) and
    /// the payload, with the `0xFF` marker in between when the payload
    /// is non-empty. Shared by the datagram and stream framings.
    pub(crate) fn encode_options_and_payload(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        let mut sorted: Vec<&(OptionNumber, OptionValue)> = self.all_options().iter().collect();
        sorted.sort_by_key(|(number, _)| *number);

        let mut prev = 0usize;
        for (number, value) in sorted {
            let bytes = value.wire_bytes();
            write_option_header(buf, number.0 as usize - prev, bytes.len())?;
            buf.extend_from_slice(&bytes);
            prev = number.0 as usize;
        }

        if !self.payload.is_empty() {
            buf.push(PAYLOAD_MARKER);
            buf.extend_from_slice(&self.payload);
        }

        Ok(())
    }

    /// Produces the datagram wire form of this message.
    ///
    /// The layout is the fixed four-byte header, the token, the
    /// delta-encoded option list in non-decreasing option-number order,
    /// and the marker-prefixed payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(4 + self.token.len() + self.payload.len() + 16);

        buf.push(
            (COAP_VERSION << COAP_MSG_VER_OFFS)
                | ((self.msg_type as u8) << COAP_MSG_T_OFFS)
                | (self.token.len() as u8 & COAP_MSG_TKL_MASK),
        );
        buf.push(self.code.0);
        buf.extend_from_slice(&self.message_id.to_be_bytes());
        buf.extend_from_slice(self.token.as_bytes());

        self.encode_options_and_payload(&mut buf)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionNumber;

    fn req_12345() -> Message {
        Message::new(MsgType::Con, MsgCode::GET, 12345)
    }

    #[test]
    fn small_message() {
        let mut req = req_12345();
        req.add_option(OptionNumber::ETAG, &b"weetag"[..]);
        req.add_option(OptionNumber::MAX_AGE, 3u32);

        // Inspected by hand.
        let exp = vec![
            0x40, 0x01, 0x30, 0x39, 0x46, 0x77, 0x65, 0x65, 0x74, 0x61, 0x67, 0xA1, 0x03,
        ];
        assert_eq!(req.to_bytes().unwrap(), exp);
    }

    #[test]
    fn small_message_with_payload() {
        let mut req = req_12345();
        req.add_option(OptionNumber::ETAG, &b"weetag"[..]);
        req.add_option(OptionNumber::MAX_AGE, 3u32);
        req.payload = b"hi".to_vec();

        let exp = vec![
            0x40, 0x01, 0x30, 0x39, 0x46, 0x77, 0x65, 0x65, 0x74, 0x61, 0x67, 0xA1, 0x03, 0xFF,
            b'h', b'i',
        ];
        assert_eq!(req.to_bytes().unwrap(), exp);
    }

    #[test]
    fn single_byte_path() {
        let mut req = req_12345();
        req.set_path_string("x");
        assert_eq!(
            req.to_bytes().unwrap(),
            vec![0x40, 0x01, 0x30, 0x39, 0xB1, 0x78]
        );
    }

    #[test]
    fn single_byte_path_with_leading_slash() {
        let mut req = req_12345();
        req.set_path_string("/x");
        assert_eq!(
            req.to_bytes().unwrap(),
            vec![0x40, 0x01, 0x30, 0x39, 0xB1, 0x78]
        );
    }

    #[test]
    fn twelve_byte_option_keeps_short_form() {
        let mut req = req_12345();
        req.set_path_string("123456789ABC");

        let mut exp = vec![0x40, 0x01, 0x30, 0x39, 0xBC];
        exp.extend_from_slice(b"123456789ABC");
        assert_eq!(req.to_bytes().unwrap(), exp);
    }

    #[test]
    fn thirteen_byte_option_uses_extension_byte() {
        let mut req = req_12345();
        req.set_path_string("123456789ABCD");

        // Length 13 switches to the one-byte extended form with ext = 0.
        let mut exp = vec![0x40, 0x01, 0x30, 0x39, 0xBD, 0x00];
        exp.extend_from_slice(b"123456789ABCD");
        assert_eq!(req.to_bytes().unwrap(), exp);
    }

    #[test]
    fn long_path_option() {
        let mut req = req_12345();
        req.set_path_string("this_path_is_longer_than_fifteen_bytes");
        assert_eq!(req.path_string(), "this_path_is_longer_than_fifteen_bytes");

        // Length 38 = 13 + 25, so the extension byte carries 25.
        let mut exp = vec![0x40, 0x01, 0x30, 0x39, 0xBD, 0x19];
        exp.extend_from_slice(b"this_path_is_longer_than_fifteen_bytes");
        assert_eq!(req.to_bytes().unwrap(), exp);
    }

    #[test]
    fn large_option_gap_uses_extension() {
        let mut req = req_12345();
        req.add_option(OptionNumber::CONTENT_FORMAT, 0u32);
        req.add_option(OptionNumber::PROXY_URI, "u");

        // Delta 12, then delta 23 = 13 + 10.
        assert_eq!(
            req.to_bytes().unwrap(),
            vec![0x40, 0x01, 0x30, 0x39, 0xC0, 0xD1, 0x0A, b'u']
        );
    }

    #[test]
    fn options_are_sorted_stably() {
        let mut req = req_12345();
        req.add_option(OptionNumber::LOCATION_PATH, "a");
        req.add_option(OptionNumber::LOCATION_PATH, "b");
        assert_eq!(
            req.to_bytes().unwrap(),
            vec![0x40, 0x01, 0x30, 0x39, 0x81, b'a', 0x01, b'b']
        );

        // Insertion order survives sorting around other numbers.
        let mut req = req_12345();
        req.add_option(OptionNumber::MAX_AGE, 3u32);
        req.add_option(OptionNumber::URI_PATH, "b");
        req.add_option(OptionNumber::URI_PATH, "a");
        assert_eq!(
            req.to_bytes().unwrap(),
            vec![0x40, 0x01, 0x30, 0x39, 0xB1, b'b', 0x01, b'a', 0x31, 0x03]
        );
    }

    #[test]
    fn oversize_option_is_rejected() {
        let mut req = req_12345();
        req.add_option(OptionNumber::ETAG, vec![0u8; MAX_OPTION_VALUE_SIZE + 1]);
        assert_eq!(req.to_bytes(), Err(CodecError::OptionTooLong));
    }
}
