//! The session-layer length prefix that precedes every frame on the wire:
//! a 4-byte big-endian word giving the length of the frame that follows.
//! Reading the bytes off the socket is the network crate's job; this just
//! owns the prefix's own encoding so both sides agree on it.

pub const LENGTH_PREFIX_LEN: usize = 4;

pub fn encode_length_prefix(frame_len: usize) -> [u8; LENGTH_PREFIX_LEN] {
    (frame_len as u32).to_be_bytes()
}

pub fn decode_length_prefix(bytes: [u8; LENGTH_PREFIX_LEN]) -> usize {
    u32::from_be_bytes(bytes) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefix_round_trips() {
        let prefix = encode_length_prefix(12345);
        assert_eq!(decode_length_prefix(prefix), 12345);
    }
}
