//! ICMP echo-request header fabrication (§3.4, §4.4).

use crate::checksum::checksum;

const TYPE_ECHO_REQUEST: u8 = 8;
const CODE_ECHO_REQUEST: u8 = 0;
const HEADER_LEN: usize = 8;

/// An 8-octet ICMP echo-request header, no payload (§3.4, §6.2).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EchoRequest {
    pub identifier: u16,
    pub sequence_number: u16,
}

impl EchoRequest {
    fn serialise(self, checksum_value: u16) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = TYPE_ECHO_REQUEST;
        out[1] = CODE_ECHO_REQUEST;
        out[2..4].copy_from_slice(&checksum_value.to_be_bytes());
        out[4..6].copy_from_slice(&self.identifier.to_be_bytes());
        out[6..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        out
    }

    /// Build the wire bytes, with the checksum computed over the
    /// whole message (§3.4: "covers the entire ICMP message", which
    /// for an echo request with no payload is just the header itself)
    /// per the build order in §4.4 steps 1-2.
    pub fn build(self) -> Vec<u8> {
        let unchecked = self.serialise(0);
        let sum = checksum(&unchecked);
        self.serialise(sum).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_request_recomputed_checksum_is_zero() {
        let request = EchoRequest {
            identifier: 0,
            sequence_number: 7,
        };
        let message = request.build();
        assert_eq!(0, checksum(&message));
    }

    #[test]
    fn echo_request_has_correct_type_and_code() {
        let request = EchoRequest {
            identifier: 0,
            sequence_number: 0,
        };
        let message = request.build();
        assert_eq!(TYPE_ECHO_REQUEST, message[0]);
        assert_eq!(CODE_ECHO_REQUEST, message[1]);
    }

    #[test]
    fn sequence_number_is_encoded_big_endian_at_offset_6() {
        let request = EchoRequest {
            identifier: 0,
            sequence_number: 0x0102,
        };
        let message = request.build();
        assert_eq!([0x01, 0x02], message[6..8]);
    }
}
