//! Display-name encoding for the opaque user data attached to each peer.

/// Encode a display name as user data.
pub fn encode(name: &str) -> Vec<u8> {
    name.as_bytes().to_vec()
}

/// Decode user data back into a display name.
///
/// Never fails: user data arrives from remote peers, so malformed bytes
/// are replaced with U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_display_names() {
        for name in ["alice", "", "Zoë", "名前", "a b\tc", "🎧 listener"] {
            assert_eq!(decode(&encode(name)), name);
        }
    }

    #[test]
    fn encode_is_utf8() {
        assert_eq!(encode("bob"), b"bob".to_vec());
        assert_eq!(encode("é"), vec![0xc3, 0xa9]);
    }

    #[test]
    fn malformed_bytes_decode_with_replacement() {
        let decoded = decode(&[b'h', b'i', 0xff, 0xfe]);
        assert!(decoded.starts_with("hi"));
        assert!(decoded.contains('\u{fffd}'));
    }

    #[test]
    fn truncated_sequence_does_not_panic() {
        // First byte of a two-byte sequence with nothing after it.
        assert_eq!(decode(&[0xc3]), "\u{fffd}");
    }
}
