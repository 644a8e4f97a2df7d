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

use super::*;
use crate::util::{encode_uint, try_decode_u32};
use crate::{BlockInfo, CodecError, ContentFormat};

/// Type describing the wire type of an option's value, as determined by
/// the option-number registry.
#[derive(Debug, Copy, Eq, PartialEq, Hash, Clone)]
pub enum OptionValueType {
    /// Opaque option value.
    Opaque,

    /// Option value is determined by the presence or absence of the option.
    Flag,

    /// Unsigned integer value, at most 32 bits wide.
    Integer,

    /// UTF8 string value.
    String,
}

/// The value carried by a single option entry.
///
/// The variant set is closed: anything that is not empty, opaque bytes,
/// a string, or an unsigned integer simply cannot be put into an option,
/// so there is no "unsupported value type" failure at encode time.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum OptionValue {
    /// No value; presence of the option is the whole message.
    Empty,

    /// An opaque byte sequence, emitted verbatim.
    Opaque(Vec<u8>),

    /// A UTF-8 string, emitted as its bytes.
    Str(String),

    /// An unsigned integer, emitted in shortest big-endian form
    /// (zero is emitted as no bytes at all).
    Uint(u32),
}

impl OptionValue {
    /// Serializes this value to its wire bytes.
    pub fn wire_bytes(&self) -> Vec<u8> {
        match self {
            OptionValue::Empty => Vec::new(),
            OptionValue::Opaque(bytes) => bytes.clone(),
            OptionValue::Str(s) => s.as_bytes().to_vec(),
            OptionValue::Uint(v) => {
                let mut buf = Vec::with_capacity(4);
                encode_uint(*v, &mut buf);
                buf
            }
        }
    }

    /// The length, in bytes, of the wire form of this value.
    pub fn wire_len(&self) -> usize {
        match self {
            OptionValue::Empty => 0,
            OptionValue::Opaque(bytes) => bytes.len(),
            OptionValue::Str(s) => s.len(),
            OptionValue::Uint(v) => match v {
                0 => 0,
                1..=0xFF => 1,
                0x100..=0xFFFF => 2,
                0x1_0000..=0xFF_FFFF => 3,
                _ => 4,
            },
        }
    }

    /// Reconstitutes a typed value from wire bytes, using the registry's
    /// expected type for `number`.
    ///
    /// String bytes are not validated beyond their length; byte sequences
    /// that do not form UTF-8 are preserved as opaque values.
    pub fn decode(number: OptionNumber, bytes: &[u8]) -> Result<OptionValue, CodecError> {
        match number.value_type() {
            OptionValueType::Integer => try_decode_u32(bytes)
                .map(OptionValue::Uint)
                .ok_or(CodecError::OptionTooLong),
            OptionValueType::String => match String::from_utf8(bytes.to_vec()) {
                Ok(s) => Ok(OptionValue::Str(s)),
                Err(e) => Ok(OptionValue::Opaque(e.into_bytes())),
            },
            OptionValueType::Opaque | OptionValueType::Flag => {
                if bytes.is_empty() {
                    Ok(OptionValue::Empty)
                } else {
                    Ok(OptionValue::Opaque(bytes.to_vec()))
                }
            }
        }
    }

    /// Returns the integer value, if this is an integer option.
    pub fn as_uint(&self) -> Option<u32> {
        match self {
            OptionValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string option.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the opaque bytes, if this is an opaque option.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            OptionValue::Opaque(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Renders this value as text, for path reconstruction and display.
    pub(crate) fn to_text(&self) -> String {
        match self {
            OptionValue::Empty => String::new(),
            OptionValue::Opaque(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            OptionValue::Str(s) => s.clone(),
            OptionValue::Uint(v) => v.to_string(),
        }
    }
}

impl From<()> for OptionValue {
    fn from(_: ()) -> Self {
        OptionValue::Empty
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

impl From<&[u8]> for OptionValue {
    fn from(bytes: &[u8]) -> Self {
        OptionValue::Opaque(bytes.to_vec())
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(bytes: Vec<u8>) -> Self {
        OptionValue::Opaque(bytes)
    }
}

impl From<u8> for OptionValue {
    fn from(v: u8) -> Self {
        OptionValue::Uint(v as u32)
    }
}

impl From<u16> for OptionValue {
    fn from(v: u16) -> Self {
        OptionValue::Uint(v as u32)
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Uint(v)
    }
}

impl From<ContentFormat> for OptionValue {
    fn from(cf: ContentFormat) -> Self {
        OptionValue::Uint(cf.0 as u32)
    }
}

impl From<BlockInfo> for OptionValue {
    fn from(block: BlockInfo) -> Self {
        OptionValue::Uint(block.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_bytes() {
        assert!(OptionValue::Empty.wire_bytes().is_empty());
        assert_eq!(OptionValue::from("x").wire_bytes(), b"x");
        assert_eq!(OptionValue::from(3u32).wire_bytes(), vec![3]);
        assert_eq!(OptionValue::from(838u32).wire_bytes(), vec![0x03, 0x46]);
        assert_eq!(
            OptionValue::from(&b"weetag"[..]).wire_bytes(),
            b"weetag".to_vec()
        );
        assert!(OptionValue::from(0u32).wire_bytes().is_empty());
    }

    #[test]
    fn wire_len_matches_bytes() {
        for value in [
            OptionValue::Empty,
            OptionValue::from(0u32),
            OptionValue::from(255u32),
            OptionValue::from(256u32),
            OptionValue::from(0x1_0000u32),
            OptionValue::from(u32::MAX),
            OptionValue::from("temperature"),
            OptionValue::from(vec![1, 2, 3]),
        ] {
            assert_eq!(value.wire_len(), value.wire_bytes().len(), "{:?}", value);
        }
    }

    #[test]
    fn typed_decode() {
        assert_eq!(
            OptionValue::decode(OptionNumber::MAX_AGE, &[3]),
            Ok(OptionValue::Uint(3))
        );
        assert_eq!(
            OptionValue::decode(OptionNumber::MAX_AGE, &[]),
            Ok(OptionValue::Uint(0))
        );
        assert_eq!(
            OptionValue::decode(OptionNumber::URI_PATH, b"temperature"),
            Ok(OptionValue::Str("temperature".into()))
        );
        assert_eq!(
            OptionValue::decode(OptionNumber::ETAG, b"weetag"),
            Ok(OptionValue::Opaque(b"weetag".to_vec()))
        );
        assert_eq!(
            OptionValue::decode(OptionNumber::IF_NONE_MATCH, &[]),
            Ok(OptionValue::Empty)
        );
        assert_eq!(
            OptionValue::decode(OptionNumber::MAX_AGE, &[0; 5]),
            Err(CodecError::OptionTooLong)
        );
    }

    #[test]
    fn invalid_utf8_stays_opaque() {
        let raw = [0xFF, 0xFE, b'a'];
        assert_eq!(
            OptionValue::decode(OptionNumber::URI_PATH, &raw),
            Ok(OptionValue::Opaque(raw.to_vec()))
        );
    }
}
