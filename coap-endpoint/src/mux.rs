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

//! Request dispatch by path pattern.

use crate::message::{Message, MsgCode, MsgType};
use std::collections::HashMap;

/// Handles a single request message, optionally producing a response to
/// transmit back to the requester.
pub trait Handler<P>: Send + Sync {
    /// Handles the message and optionally returns a response message.
    fn serve(&self, peer: &P, msg: &Message) -> Option<Message>;
}

impl<P, F> Handler<P> for F
where
    F: Fn(&P, &Message) -> Option<Message> + Send + Sync,
{
    fn serve(&self, peer: &P, msg: &Message) -> Option<Message> {
        self(peer, msg)
    }
}

/// Provides mappings from request paths to handlers.
///
/// Patterns are stored without a leading `/`. A pattern ending in `/`
/// matches every path it prefixes; any other pattern matches exactly.
/// The longest matching pattern wins.
pub struct ServeMux<P> {
    entries: HashMap<String, Box<dyn Handler<P>>>,
}

impl<P> std::fmt::Debug for ServeMux<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeMux")
            .field("patterns", &self.entries.keys())
            .finish()
    }
}

impl<P> Default for ServeMux<P> {
    fn default() -> Self {
        ServeMux::new()
    }
}

fn path_match(pattern: &str, path: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    if !pattern.ends_with('/') {
        return pattern == path;
    }
    path.len() >= pattern.len() && path.starts_with(pattern)
}

impl<P> ServeMux<P> {
    /// Creates a new, empty `ServeMux`.
    pub fn new() -> ServeMux<P> {
        ServeMux {
            entries: HashMap::new(),
        }
    }

    /// Configures a handler for the given pattern.
    ///
    /// # Panics
    ///
    /// Panics if the pattern is empty after removing leading slashes;
    /// registration is configuration-time work where a loud failure
    /// beats a silently dead route.
    pub fn handle<H>(&mut self, pattern: &str, handler: H)
    where
        H: Handler<P> + 'static,
    {
        let pattern = pattern.trim_start_matches('/');
        if pattern.is_empty() {
            panic!("invalid mux pattern {:?}", pattern);
        }
        self.entries.insert(pattern.to_owned(), Box::new(handler));
    }

    /// Configures a handler function for the given pattern.
    pub fn handle_fn<F>(&mut self, pattern: &str, f: F)
    where
        F: Fn(&P, &Message) -> Option<Message> + Send + Sync + 'static,
    {
        self.handle(pattern, f);
    }

    /// Removes the handler registered for the given pattern, if any.
    pub fn unhandle(&mut self, pattern: &str) {
        self.entries.remove(pattern.trim_start_matches('/'));
    }

    /// Finds the handler for a path string. The most specific (longest)
    /// pattern wins; among equally long candidates the lexicographically
    /// greatest is chosen so that the result is deterministic for a
    /// given map content.
    fn match_handler(&self, path: &str) -> Option<&dyn Handler<P>> {
        self.entries
            .iter()
            .filter(|(pattern, _)| path_match(pattern, path))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(|(_, handler)| handler.as_ref())
    }

    /// Routes a request message to its handler and returns the response
    /// to transmit, if any.
    ///
    /// When no pattern matches, confirmable requests get an
    /// acknowledgement carrying 4.04 NotFound (same message id and
    /// token, no payload) and non-confirmable requests get nothing.
    pub fn dispatch(&self, peer: &P, msg: &Message) -> Option<Message> {
        let path = msg.path_string();
        match self.match_handler(&path) {
            Some(handler) => handler.serve(peer, msg),
            None => {
                if msg.is_confirmable() {
                    let mut rsp = Message::new(MsgType::Ack, MsgCode::NOT_FOUND, msg.message_id);
                    rsp.token = msg.token;
                    Some(rsp)
                } else {
                    None
                }
            }
        }
    }
}
