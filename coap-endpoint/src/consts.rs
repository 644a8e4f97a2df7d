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

//! Transmission parameters and protocol constants.

use rand::Rng;
use std::time::Duration;

/// The standard default IP port number used for CoAP-over-UDP.
pub const DEFAULT_PORT_COAP_UDP: u16 = 5683;

/// The standard default IP port number used for CoAP-over-TCP.
pub const DEFAULT_PORT_COAP_TCP: u16 = 5683;

/// Value for the Observe option when registering an observer.
pub const OBSERVE_REGISTER: u32 = 0;

/// Value for the Observe option when deregistering an observer.
pub const OBSERVE_DEREGISTER: u32 = 1;

/// The [RFC 7252 section 4.8][tp] transmission parameters, plus the
/// client-side response timeout and the receive buffer sizing.
///
/// Every endpoint value (client, server, retransmitter, observe hub)
/// takes these at construction; there is no process-wide default.
///
/// [tp]: https://tools.ietf.org/html/rfc7252#section-4.8
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TransmissionParameters {
    /// Base acknowledgement timeout (`ACK_TIMEOUT`).
    pub ack_timeout: Duration,

    /// Randomization factor applied to the initial timeout
    /// (`ACK_RANDOM_FACTOR`).
    pub ack_random_factor: f64,

    /// Maximum number of retransmissions of a confirmable message
    /// (`MAX_RETRANSMIT`). The message is transmitted at most this many
    /// times plus one.
    pub max_retransmit: u32,

    /// How long a client waits for a response before giving up.
    pub response_timeout: Duration,

    /// The largest datagram this endpoint will send or receive.
    pub max_packet_len: usize,
}

impl Default for TransmissionParameters {
    fn default() -> Self {
        TransmissionParameters {
            ack_timeout: Duration::from_secs(2),
            ack_random_factor: 1.5,
            max_retransmit: 4,
            response_timeout: Duration::from_secs(2),
            max_packet_len: 1500,
        }
    }
}

impl TransmissionParameters {
    /// Draws an initial retransmission timeout uniformly from
    /// `[ACK_TIMEOUT, ACK_TIMEOUT * ACK_RANDOM_FACTOR]`.
    pub fn initial_retransmit_timeout(&self) -> Duration {
        let lo = self.ack_timeout;
        let hi = self.ack_timeout.mul_f64(self.ack_random_factor.max(1.0));
        if hi <= lo {
            return lo;
        }
        rand::thread_rng().gen_range(lo..=hi)
    }

    /// `MAX_TRANSMIT_SPAN`: the maximum time from the first transmission
    /// of a confirmable message to its last retransmission.
    pub fn max_transmit_span(&self) -> Duration {
        self.ack_timeout
            .mul_f64(((1u64 << self.max_retransmit) - 1) as f64)
            .mul_f64(self.ack_random_factor)
    }

    /// `MAX_TRANSMIT_WAIT`: the maximum time from the first transmission
    /// of a confirmable message to the sender giving up.
    pub fn max_transmit_wait(&self) -> Duration {
        self.ack_timeout
            .mul_f64(((1u64 << (self.max_retransmit + 1)) - 1) as f64)
            .mul_f64(self.ack_random_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_rfc() {
        let params = TransmissionParameters::default();
        assert_eq!(params.ack_timeout, Duration::from_secs(2));
        assert_eq!(params.max_retransmit, 4);
        assert_eq!(params.max_transmit_span(), Duration::from_secs(45));
        assert_eq!(params.max_transmit_wait(), Duration::from_secs(93));
    }

    #[test]
    fn initial_timeout_is_within_bounds() {
        let params = TransmissionParameters::default();
        for _ in 0..100 {
            let t = params.initial_retransmit_timeout();
            assert!(t >= Duration::from_secs(2));
            assert!(t <= Duration::from_secs(3));
        }
    }

    #[test]
    fn degenerate_random_factor() {
        let params = TransmissionParameters {
            ack_random_factor: 1.0,
            ..Default::default()
        };
        assert_eq!(params.initial_retransmit_timeout(), params.ack_timeout);
    }
}
