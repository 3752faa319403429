//! EBML primitives: element IDs, variable-length integers and element
//! payload decoding.
//!
//! Three related encodings share the "count leading zeros for the length"
//! scheme:
//!
//! | Field        | Length | Marker bit          | All-ones value   |
//! |--------------|--------|---------------------|------------------|
//! | Element ID   | 1–4    | kept in the value   | reserved         |
//! | Data size    | 1–8    | stripped            | unknown size     |
//! | Vint (track) | 1–8    | stripped            | plain value      |

use crate::error::MatroskaErrorKind;

/// Element IDs used by the demuxer.
pub mod ids {
    pub const EBML: u32 = 0x1A45_DFA3;
    pub const DOC_TYPE: u32 = 0x4282;

    pub const SEGMENT: u32 = 0x1853_8067;
    pub const SEEK_HEAD: u32 = 0x114D_9B74;
    pub const SEGMENT_INFO: u32 = 0x1549_A966;
    pub const TIMECODE_SCALE: u32 = 0x2A_D7B1;
    pub const DURATION: u32 = 0x4489;

    pub const TRACKS: u32 = 0x1654_AE6B;
    pub const TRACK_ENTRY: u32 = 0xAE;
    pub const TRACK_NUMBER: u32 = 0xD7;
    pub const TRACK_TYPE: u32 = 0x83;
    pub const CODEC_ID: u32 = 0x86;

    pub const CLUSTER: u32 = 0x1F43_B675;
    pub const TIMECODE: u32 = 0xE7;
    pub const POSITION: u32 = 0xA7;
    pub const PREV_SIZE: u32 = 0xAB;
    pub const SIMPLE_BLOCK: u32 = 0xA3;
    pub const BLOCK_GROUP: u32 = 0xA0;
    pub const BLOCK: u32 = 0xA1;
    pub const BLOCK_ADDITIONS: u32 = 0x75A1;
    pub const BLOCK_DURATION: u32 = 0x9B;
    pub const REFERENCE_BLOCK: u32 = 0xFB;

    pub const CUES: u32 = 0x1C53_BB6B;
    pub const TAGS: u32 = 0x1254_C367;
    pub const CHAPTERS: u32 = 0x1043_A770;
    pub const ATTACHMENTS: u32 = 0x1941_A469;

    pub const CRC32: u32 = 0xBF;
    pub const VOID: u32 = 0xEC;

    /// Lone `0xFF` in ID position: end of stream.
    pub const END_OF_STREAM: u32 = 0xFF;
}

/// Total length of an element ID from its first byte (1–4), or `None` if
/// the top nibble is zero.
pub fn id_length(first: u8) -> Option<usize> {
    let len = first.leading_zeros() as usize + 1;
    (len <= 4).then_some(len)
}

/// Total length of a data size or vint from its first byte (1–8), or
/// `None` for a zero byte.
pub fn vint_length(first: u8) -> Option<usize> {
    (first != 0).then(|| first.leading_zeros() as usize + 1)
}

/// Value of a vint with its length marker stripped. `bytes.len()` must be
/// the length announced by its first byte.
pub fn decode_vint(bytes: &[u8]) -> u64 {
    let len = bytes.len();
    let first_mask = 0xFFu8.checked_shr(len as u32).unwrap_or(0);
    bytes[1..]
        .iter()
        .fold(u64::from(bytes[0] & first_mask), |acc, &b| (acc << 8) | u64::from(b))
}

/// Decode an element data size. `None` is the reserved all-ones pattern,
/// meaning "unknown size".
pub fn decode_size(bytes: &[u8]) -> Option<u64> {
    let value = decode_vint(bytes);
    let all_ones = (1u64 << (7 * bytes.len())) - 1;
    (value != all_ones).then_some(value)
}

/// Big-endian unsigned integer element, 0–8 bytes.
pub fn read_uint(data: &[u8]) -> Option<u64> {
    (data.len() <= 8).then(|| data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// Big-endian two's-complement integer element, 0–8 bytes.
pub fn read_int(data: &[u8]) -> Option<i64> {
    if data.is_empty() {
        return Some(0);
    }
    let raw = read_uint(data)?;
    let shift = 64 - 8 * data.len() as u32;
    Some(((raw << shift) as i64) >> shift)
}

/// IEEE 754 float element: 0, 4 or 8 bytes.
pub fn read_float(data: &[u8]) -> Option<f64> {
    match data.len() {
        0 => Some(0.0),
        4 => Some(f64::from(f32::from_be_bytes([
            data[0], data[1], data[2], data[3],
        ]))),
        8 => {
            let mut b = [0u8; 8];
            b.copy_from_slice(data);
            Some(f64::from_be_bytes(b))
        }
        _ => None,
    }
}

/// ASCII/UTF-8 string element; trailing NUL padding is dropped.
pub fn read_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// A child element inside a fully buffered master element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child<'a> {
    pub id: u32,
    /// Offset of the child's ID relative to the start of the parent's data.
    pub offset: usize,
    pub data: &'a [u8],
}

/// Split a buffered master element's data into its direct children.
///
/// Errors carry the offset (relative to `data`) of the offending element.
pub fn children(data: &[u8]) -> Result<Vec<Child<'_>>, (MatroskaErrorKind, usize)> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let offset = pos;

        let first = data[pos];
        let id_len = id_length(first).ok_or((MatroskaErrorKind::InvalidId(first), offset))?;
        let id_bytes = data
            .get(pos..pos + id_len)
            .ok_or((MatroskaErrorKind::ElementOverflow(u32::from(first)), offset))?;
        let id = id_bytes
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        pos += id_len;

        let size_first = *data.get(pos).ok_or((MatroskaErrorKind::ElementOverflow(id), offset))?;
        let size_len =
            vint_length(size_first).ok_or((MatroskaErrorKind::InvalidSize(size_first), offset))?;
        let size_bytes = data
            .get(pos..pos + size_len)
            .ok_or((MatroskaErrorKind::ElementOverflow(id), offset))?;
        let size = decode_size(size_bytes).ok_or((MatroskaErrorKind::UnknownSize(id), offset))?;
        pos += size_len;

        let end = usize::try_from(size)
            .ok()
            .and_then(|s| pos.checked_add(s))
            .filter(|&end| end <= data.len())
            .ok_or((MatroskaErrorKind::ElementOverflow(id), offset))?;

        out.push(Child {
            id,
            offset,
            data: &data[pos..end],
        });
        pos = end;
    }
    Ok(out)
}
