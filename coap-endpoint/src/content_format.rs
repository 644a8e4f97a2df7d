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

use std::fmt::{Display, Formatter};

/// Type representing a CoAP content format, carried by the
/// Content-Format and Accept options.
#[derive(Debug, Copy, Eq, PartialEq, Hash, Clone, Ord, PartialOrd)]
pub struct ContentFormat(pub u16);

impl ContentFormat {
    /// `text/plain;charset=utf-8`
    pub const TEXT_PLAIN_UTF8: ContentFormat = ContentFormat(0);

    /// `application/link-format`
    pub const APP_LINK_FORMAT: ContentFormat = ContentFormat(40);

    /// `application/xml`
    pub const APP_XML: ContentFormat = ContentFormat(41);

    /// `application/octet-stream`
    pub const APP_OCTET_STREAM: ContentFormat = ContentFormat(42);

    /// `application/exi`
    pub const APP_EXI: ContentFormat = ContentFormat(47);

    /// `application/json`
    pub const APP_JSON: ContentFormat = ContentFormat(50);

    fn static_name(self) -> Option<&'static str> {
        match self {
            ContentFormat::TEXT_PLAIN_UTF8 => Some("text/plain;charset=utf-8"),
            ContentFormat::APP_LINK_FORMAT => Some("application/link-format"),
            ContentFormat::APP_XML => Some("application/xml"),
            ContentFormat::APP_OCTET_STREAM => Some("application/octet-stream"),
            ContentFormat::APP_EXI => Some("application/exi"),
            ContentFormat::APP_JSON => Some("application/json"),
            _ => None,
        }
    }
}

impl Display for ContentFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = self.static_name() {
            f.write_str(name)
        } else {
            write!(f, "application/x-coap-{}", self.0)
        }
    }
}

impl From<ContentFormat> for u32 {
    fn from(cf: ContentFormat) -> Self {
        cf.0 as u32
    }
}
