//! Builders for synthetic EBML/Matroska streams used in unit tests.

use crate::matroska::ebml::ids;

/// Element ID bytes (leading zero bytes dropped).
pub fn id_bytes(id: u32) -> Vec<u8> {
    let bytes = id.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(3);
    bytes[skip..].to_vec()
}

/// Shortest data-size encoding of `size`.
pub fn size_bytes(size: u64) -> Vec<u8> {
    let len = (1..=8)
        .find(|&len| size < (1u64 << (7 * len)) - 1)
        .expect("size fits in 8 bytes");
    let marked = size | (1u64 << (7 * len));
    marked.to_be_bytes()[8 - len..].to_vec()
}

pub fn element(id: u32, body: &[u8]) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.extend(size_bytes(body.len() as u64));
    out.extend_from_slice(body);
    out
}

/// Element header with the reserved unknown-size marker; children follow.
pub fn unknown_size_header(id: u32) -> Vec<u8> {
    let mut out = id_bytes(id);
    out.extend([0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    out
}

pub fn uint_element(id: u32, value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    element(id, &bytes[skip..])
}

pub fn ebml_header(doc_type: &str) -> Vec<u8> {
    element(ids::EBML, &element(ids::DOC_TYPE, doc_type.as_bytes()))
}

pub fn segment_info(timecode_scale: u64) -> Vec<u8> {
    element(
        ids::SEGMENT_INFO,
        &uint_element(ids::TIMECODE_SCALE, timecode_scale),
    )
}

/// Block body: track vint, 16-bit relative timecode, flags, payload.
pub fn block_body(track: u8, timecode: i16, flags: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![0x80 | track];
    body.extend(timecode.to_be_bytes());
    body.push(flags);
    body.extend_from_slice(payload);
    body
}

pub fn simple_block(track: u8, timecode: i16, payload: &[u8]) -> Vec<u8> {
    element(ids::SIMPLE_BLOCK, &block_body(track, timecode, 0x80, payload))
}

pub fn cluster(timecode: u64, children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = uint_element(ids::TIMECODE, timecode);
    for child in children {
        body.extend_from_slice(child);
    }
    element(ids::CLUSTER, &body)
}

/// EBML header + bounded Segment wrapping `children`.
pub fn stream(children: &[Vec<u8>]) -> Vec<u8> {
    let mut out = ebml_header("matroska");
    out.extend(element(ids::SEGMENT, &children.concat()));
    out
}
