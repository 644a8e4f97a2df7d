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
use crate::option::OptionValue;
use std::fmt::{Display, Formatter};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} MID:0x{:04X}", self.msg_type, self.code, self.message_id)?;

        if !self.token.is_empty() {
            write!(f, " TOK:{}", self.token)?;
        }

        for (number, value) in self.all_options() {
            write!(f, " {}", number)?;
            match value {
                OptionValue::Empty => {}
                OptionValue::Opaque(bytes) => {
                    f.write_str(":")?;
                    for b in bytes {
                        write!(f, "{:02X}", b)?;
                    }
                }
                OptionValue::Str(s) => write!(f, ":{:?}", s)?,
                OptionValue::Uint(v) => write!(f, ":{}", v)?,
            }
        }

        if !self.payload.is_empty() {
            match std::str::from_utf8(&self.payload) {
                Ok(text) => write!(f, " {:?}", text)?,
                Err(_) => write!(f, " [{} byte payload]", self.payload.len())?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::OptionNumber;

    #[test]
    fn renders_the_interesting_parts() {
        let mut msg = Message::new(MsgType::Con, MsgCode::GET, 0x7D34);
        msg.token = MsgToken::try_new(&[0xDE, 0xAD]).unwrap();
        msg.add_option(OptionNumber::URI_PATH, "temperature");
        msg.payload = b"hi".to_vec();

        let rendered = msg.to_string();
        assert!(rendered.contains("CON"), "{}", rendered);
        assert!(rendered.contains("GET"), "{}", rendered);
        assert!(rendered.contains("0x7D34"), "{}", rendered);
        assert!(rendered.contains("DEAD"), "{}", rendered);
        assert!(rendered.contains("temperature"), "{}", rendered);
    }
}
