//! The Apple IIgs PackBytes run-length scheme.
//!
//! Each run starts with a flag byte: the top two bits select the run kind
//! and the low six bits hold the count less one.
//!
//! | bits 7-6 | run                                       |
//! |----------|-------------------------------------------|
//! | 00       | `count` literal bytes follow              |
//! | 01       | one byte, repeated `count` times          |
//! | 10       | four bytes, the group repeated `count` times |
//! | 11       | one byte, repeated `count * 4` times      |

use log::warn;

const MODE_LITERAL: u8 = 0;
const MODE_REPEAT: u8 = 1;
const MODE_REPEAT_QUAD: u8 = 2;
const MODE_REPEAT_BYTE_X4: u8 = 3;

/// Unpack a PackBytes stream.  Truncated input yields whatever was decoded
/// before the stream ran out.
pub fn unpack_bytes(buffer: &[u8]) -> Vec<u8> {
    let mut unpacked = Vec::with_capacity(buffer.len() * 2);
    let mut ptr = 0;
    while ptr < buffer.len() {
        let flag = buffer[ptr];
        ptr += 1;
        let mode = flag >> 6;
        let count = (flag & 0x3F) as usize + 1;

        let width = match mode {
            MODE_LITERAL => count,
            MODE_REPEAT | MODE_REPEAT_BYTE_X4 => 1,
            _ => 4,
        };
        if ptr + width > buffer.len() {
            warn!(
                "packed data truncated at offset {}: run needs {} bytes, {} remain",
                ptr - 1,
                width,
                buffer.len() - ptr
            );
            unpacked.extend_from_slice(&buffer[ptr..]);
            break;
        }
        let data = &buffer[ptr..ptr + width];
        ptr += width;

        match mode {
            MODE_LITERAL => unpacked.extend_from_slice(data),
            MODE_REPEAT => unpacked.extend(std::iter::repeat(data[0]).take(count)),
            MODE_REPEAT_QUAD => {
                for _ in 0..count {
                    unpacked.extend_from_slice(data);
                }
            }
            MODE_REPEAT_BYTE_X4 => unpacked.extend(std::iter::repeat(data[0]).take(count * 4)),
            _ => unreachable!(),
        }
    }
    unpacked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_mode() {
        assert_eq!(unpack_bytes(&[0x02, 1, 2, 3]), vec![1, 2, 3]);
        assert_eq!(unpack_bytes(&[0x43, 9]), vec![9; 4]);
        assert_eq!(
            unpack_bytes(&[0x81, 1, 2, 3, 4]),
            vec![1, 2, 3, 4, 1, 2, 3, 4]
        );
        assert_eq!(unpack_bytes(&[0xC1, 7]), vec![7; 8]);
    }

    #[test]
    fn test_length_is_sum_of_runs() {
        // Literal 2, repeat 64, quad 3, repeat x4 5.
        let stream = [
            0x01, 0xAA, 0xBB, 0x7F, 0x11, 0x82, 1, 2, 3, 4, 0xC4, 0x22,
        ];
        let unpacked = unpack_bytes(&stream);
        assert_eq!(unpacked.len(), 2 + 64 + 3 * 4 + 5 * 4);
        assert_eq!(&unpacked[..3], &[0xAA, 0xBB, 0x11]);
        assert_eq!(unpacked[unpacked.len() - 1], 0x22);
    }

    #[test]
    fn test_truncated() {
        assert_eq!(unpack_bytes(&[0x00, 0xAA, 0x05, 1]), vec![0xAA, 1]);
        assert!(unpack_bytes(&[0x40]).is_empty());
        assert!(unpack_bytes(&[]).is_empty());
    }
}
