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

/// Type representing a CoAP message code: a three-bit class and a
/// five-bit detail packed into one byte.
///
/// Codes that are not in the registry still round-trip through the
/// codec unchanged; the constants below merely name the well-known ones.
#[derive(Copy, Eq, PartialEq, Hash, Clone, Ord, PartialOrd)]
pub struct MsgCode(pub u8);

impl MsgCode {
    /// Empty message code. Only used for resets and empty acknowledgements.
    pub const EMPTY: MsgCode = MsgCode(0);

    /// CoAP GET method.
    pub const GET: MsgCode = MsgCode(1);

    /// CoAP POST method.
    pub const POST: MsgCode = MsgCode(2);

    /// CoAP PUT method.
    pub const PUT: MsgCode = MsgCode(3);

    /// CoAP DELETE method.
    pub const DELETE: MsgCode = MsgCode(4);

    /// 2.01 Created.
    pub const CREATED: MsgCode = MsgCode(65);

    /// 2.02 Deleted.
    pub const DELETED: MsgCode = MsgCode(66);

    /// 2.03 Valid.
    pub const VALID: MsgCode = MsgCode(67);

    /// 2.04 Changed.
    pub const CHANGED: MsgCode = MsgCode(68);

    /// 2.05 Content.
    pub const CONTENT: MsgCode = MsgCode(69);

    /// 4.00 Bad Request.
    pub const BAD_REQUEST: MsgCode = MsgCode(128);

    /// 4.01 Unauthorized.
    pub const UNAUTHORIZED: MsgCode = MsgCode(129);

    /// 4.02 Bad Option.
    pub const BAD_OPTION: MsgCode = MsgCode(130);

    /// 4.03 Forbidden.
    pub const FORBIDDEN: MsgCode = MsgCode(131);

    /// 4.04 Not Found.
    pub const NOT_FOUND: MsgCode = MsgCode(132);

    /// 4.05 Method Not Allowed.
    pub const METHOD_NOT_ALLOWED: MsgCode = MsgCode(133);

    /// 4.06 Not Acceptable.
    pub const NOT_ACCEPTABLE: MsgCode = MsgCode(134);

    /// 4.12 Precondition Failed.
    pub const PRECONDITION_FAILED: MsgCode = MsgCode(140);

    /// 4.13 Request Entity Too Large.
    pub const REQUEST_ENTITY_TOO_LARGE: MsgCode = MsgCode(141);

    /// 4.15 Unsupported Media Type.
    pub const UNSUPPORTED_MEDIA_TYPE: MsgCode = MsgCode(143);

    /// 5.00 Internal Server Error.
    pub const INTERNAL_SERVER_ERROR: MsgCode = MsgCode(160);

    /// 5.01 Not Implemented.
    pub const NOT_IMPLEMENTED: MsgCode = MsgCode(161);

    /// 5.02 Bad Gateway.
    pub const BAD_GATEWAY: MsgCode = MsgCode(162);

    /// 5.03 Service Unavailable.
    pub const SERVICE_UNAVAILABLE: MsgCode = MsgCode(163);

    /// 5.04 Gateway Timeout.
    pub const GATEWAY_TIMEOUT: MsgCode = MsgCode(164);

    /// 5.05 Proxying Not Supported.
    pub const PROXYING_NOT_SUPPORTED: MsgCode = MsgCode(165);

    /// The three-bit class of this code.
    pub fn class(self) -> u8 {
        self.0 >> 5
    }

    /// The five-bit detail of this code.
    pub fn detail(self) -> u8 {
        self.0 & 0b11111
    }

    /// Returns true if this is the empty code.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this code is a request method.
    pub fn is_request(self) -> bool {
        self.class() == 0 && !self.is_empty()
    }

    /// Returns true if this code is a response code.
    pub fn is_response(self) -> bool {
        matches!(self.class(), 2..=5)
    }

    /// Returns true if this code indicates success.
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Returns true if this code is a client error.
    pub fn is_client_error(self) -> bool {
        self.class() == 4
    }

    /// Returns true if this code is a server error.
    pub fn is_server_error(self) -> bool {
        self.class() == 5
    }

    /// Returns true if this code is any sort of error.
    pub fn is_error(self) -> bool {
        self.is_client_error() || self.is_server_error()
    }

    fn static_name(self) -> Option<&'static str> {
        match self {
            MsgCode::GET => Some("GET"),
            MsgCode::POST => Some("POST"),
            MsgCode::PUT => Some("PUT"),
            MsgCode::DELETE => Some("DELETE"),
            MsgCode::CREATED => Some("Created"),
            MsgCode::DELETED => Some("Deleted"),
            MsgCode::VALID => Some("Valid"),
            MsgCode::CHANGED => Some("Changed"),
            MsgCode::CONTENT => Some("Content"),
            MsgCode::BAD_REQUEST => Some("BadRequest"),
            MsgCode::UNAUTHORIZED => Some("Unauthorized"),
            MsgCode::BAD_OPTION => Some("BadOption"),
            MsgCode::FORBIDDEN => Some("Forbidden"),
            MsgCode::NOT_FOUND => Some("NotFound"),
            MsgCode::METHOD_NOT_ALLOWED => Some("MethodNotAllowed"),
            MsgCode::NOT_ACCEPTABLE => Some("NotAcceptable"),
            MsgCode::PRECONDITION_FAILED => Some("PreconditionFailed"),
            MsgCode::REQUEST_ENTITY_TOO_LARGE => Some("RequestEntityTooLarge"),
            MsgCode::UNSUPPORTED_MEDIA_TYPE => Some("UnsupportedMediaType"),
            MsgCode::INTERNAL_SERVER_ERROR => Some("InternalServerError"),
            MsgCode::NOT_IMPLEMENTED => Some("NotImplemented"),
            MsgCode::BAD_GATEWAY => Some("BadGateway"),
            MsgCode::SERVICE_UNAVAILABLE => Some("ServiceUnavailable"),
            MsgCode::GATEWAY_TIMEOUT => Some("GatewayTimeout"),
            MsgCode::PROXYING_NOT_SUPPORTED => Some("ProxyingNotSupported"),
            _ => None,
        }
    }
}

impl core::fmt::Display for MsgCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.static_name() {
            f.write_str(name)
        } else {
            write!(f, "{}.{:02}", self.class(), self.detail())
        }
    }
}

impl core::fmt::Debug for MsgCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "MsgCode({})", self)
    }
}

impl Default for MsgCode {
    fn default() -> Self {
        MsgCode::EMPTY
    }
}

impl From<MsgCode> for u8 {
    fn from(code: MsgCode) -> Self {
        code.0
    }
}

impl From<u8> for MsgCode {
    fn from(byte: u8) -> Self {
        MsgCode(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert!(MsgCode::GET.is_request());
        assert!(!MsgCode::GET.is_response());
        assert!(MsgCode::CONTENT.is_success());
        assert!(MsgCode::NOT_FOUND.is_client_error());
        assert!(MsgCode::INTERNAL_SERVER_ERROR.is_server_error());
        assert!(MsgCode::EMPTY.is_empty());
        assert!(!MsgCode::EMPTY.is_request());
    }

    #[test]
    fn display() {
        assert_eq!(MsgCode::GET.to_string(), "GET");
        assert_eq!(MsgCode::CONTENT.to_string(), "Content");
        assert_eq!(MsgCode(0x45).to_string(), "Content");
        assert_eq!(MsgCode(0x9D).to_string(), "4.29");
    }
}
