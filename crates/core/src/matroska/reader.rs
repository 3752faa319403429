use std::io::{self, ErrorKind, Read};
use std::time::Duration;

use super::ebml::{self, ids};
use super::pacing::{Pacer, RealtimePacer};
use crate::error::{BridgeError, MatroskaErrorKind, Result};

/// Track read when none is configured.
pub const DEFAULT_TARGET_TRACK: u64 = 1;

/// Nanoseconds per timecode tick when `SegmentInfo` does not say.
pub const DEFAULT_TIMECODE_SCALE: u64 = 1_000_000;

/// Cap on elements that are buffered whole (EBML header, SegmentInfo,
/// Tracks, integer children).
const MAX_BUFFERED_ELEMENT_LEN: u64 = 16 * 1024 * 1024;

/// 100 ns ticks per second.
const TICKS_PER_SECOND: u128 = 10_000_000;
const NANOS_PER_TICK: i128 = 100;

/// Decoded `SegmentInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// Nanoseconds per cluster/block timecode tick.
    pub timecode_scale: u64,
    /// Segment duration in timecode ticks, if declared.
    pub duration: Option<f64>,
}

impl Default for SegmentInfo {
    fn default() -> Self {
        Self {
            timecode_scale: DEFAULT_TIMECODE_SCALE,
            duration: None,
        }
    }
}

/// One `TrackEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub number: u64,
    /// 1 video, 2 audio, 0x11 subtitle, ...
    pub track_type: Option<u64>,
    pub codec_id: Option<String>,
}

/// Per-cluster fields, reset whenever a new Cluster starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterInfo {
    pub timecode: Option<u64>,
    pub position: Option<u64>,
    pub prev_size: Option<u64>,
}

/// Header of the block most recently returned by
/// [`MatroskaReader::read_frame_header`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub track_number: u64,
    /// Timecode relative to the cluster, in timecode ticks.
    pub timecode: i16,
    pub flags: u8,
    /// Cluster timecode in force when the block was read.
    pub cluster_timecode: u64,
    /// `true` for SimpleBlock, `false` for a Block inside a BlockGroup.
    pub simple: bool,
}

impl BlockHeader {
    /// Keyframe flag; only SimpleBlocks carry one.
    pub fn keyframe(&self) -> Option<bool> {
        self.simple.then_some(self.flags & 0x80 != 0)
    }
}

/// Non-Block children of the current BlockGroup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockGroupInfo {
    pub reference_block: Option<i64>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
struct OpenCluster {
    end: Option<u64>,
    info: ClusterInfo,
}

#[derive(Debug, Clone, Copy)]
struct OpenBlockGroup {
    end: u64,
    info: BlockGroupInfo,
}

/// Pull-based Matroska demuxer for a single track, paced to real time.
///
/// Parsing is an explicit nesting of states rather than a tree walk:
///
/// ```text
/// pre-EBML -> pre-Segment -> Segment -> Cluster -> BlockGroup
/// ```
///
/// A state is left when the stream position reaches the end offset
/// recorded on entry; unknown-size Segments and Clusters never close that
/// way (an unknown-size Cluster ends when a segment-level element such as
/// the next Cluster appears). Any element ID not accepted by the current
/// state is a fatal error; there is no resynchronization.
///
/// ## Usage
///
/// ```no_run
/// # fn main() -> mediabridge::Result<()> {
/// use mediabridge::MatroskaReader;
///
/// let file = std::fs::File::open("input.mkv")?;
/// let mut reader = MatroskaReader::new(std::io::BufReader::new(file));
/// reader.read_stream_header()?;
/// loop {
///     let len = reader.read_frame_header()?;
///     if len == 0 {
///         break;
///     }
///     let mut frame = vec![0u8; len];
///     reader.read_payload(&mut frame)?;
///     let rtp_timestamp = reader.wait_for_frame_timestamp(48_000);
///     // hand `frame` and `rtp_timestamp` to a sink
/// }
/// # Ok(())
/// # }
/// ```
///
/// [`wait_for_frame_timestamp`](Self::wait_for_frame_timestamp) blocks the
/// calling thread with the default [`RealtimePacer`]; run the reader on its
/// own thread or supply a different [`Pacer`].
pub struct MatroskaReader<R, P = RealtimePacer> {
    source: R,
    pacer: P,
    target_track: u64,
    position: u64,
    started: bool,
    doc_type: Option<String>,
    segment: Option<Option<u64>>,
    cluster: Option<OpenCluster>,
    block_group: Option<OpenBlockGroup>,
    segment_info: SegmentInfo,
    tracks: Vec<TrackInfo>,
    block: Option<BlockHeader>,
    pending_payload: u64,
}

impl<R: Read> MatroskaReader<R, RealtimePacer> {
    /// Reader for track 1, paced against the wall clock.
    pub fn new(source: R) -> Self {
        Self::with_pacer(source, RealtimePacer::new())
    }
}

impl<R: Read, P: Pacer> MatroskaReader<R, P> {
    pub fn with_pacer(source: R, pacer: P) -> Self {
        Self {
            source,
            pacer,
            target_track: DEFAULT_TARGET_TRACK,
            position: 0,
            started: false,
            doc_type: None,
            segment: None,
            cluster: None,
            block_group: None,
            segment_info: SegmentInfo::default(),
            tracks: Vec::new(),
            block: None,
            pending_payload: 0,
        }
    }

    /// Select the track whose frames are returned.
    pub fn target_track(mut self, track: u64) -> Self {
        self.target_track = track;
        self
    }

    /// Bytes consumed from the source so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.doc_type.as_deref()
    }

    pub fn segment_info(&self) -> &SegmentInfo {
        &self.segment_info
    }

    /// Track entries seen so far, in stream order.
    pub fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    pub fn cluster(&self) -> Option<ClusterInfo> {
        self.cluster.map(|c| c.info)
    }

    pub fn block_group(&self) -> Option<BlockGroupInfo> {
        self.block_group.map(|g| g.info)
    }

    /// Header of the current frame, until its timestamp is consumed.
    pub fn current_block(&self) -> Option<&BlockHeader> {
        self.block.as_ref()
    }

    pub fn pacer(&self) -> &P {
        &self.pacer
    }

    /// Read the EBML header and enter the Segment.
    pub fn read_stream_header(&mut self) -> Result<()> {
        loop {
            let start = self.position;
            let id = self.read_required_id()?;
            let size = self.read_size()?;
            match id {
                ids::CRC32 | ids::VOID => self.skip_element(id, size, start)?,
                ids::EBML => {
                    let data_start = self.position;
                    let data = self.read_element_data(id, size, start)?;
                    self.parse_ebml_header(&data, data_start)?;
                    break;
                }
                _ => return Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
            }
        }

        loop {
            let start = self.position;
            let id = self.read_required_id()?;
            let size = self.read_size()?;
            match id {
                ids::CRC32 | ids::VOID => self.skip_element(id, size, start)?,
                ids::SEGMENT => {
                    self.open_segment(size);
                    return Ok(());
                }
                _ => return Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
            }
        }
    }

    /// Advance to the next block on the target track and return its
    /// payload length. `0` means end of stream.
    ///
    /// Any payload of the previous frame not consumed with
    /// [`read_payload`](Self::read_payload) is skipped first.
    pub fn read_frame_header(&mut self) -> Result<usize> {
        if !self.started {
            self.started = true;
            self.pacer.start();
        }
        if self.pending_payload > 0 {
            let pending = self.pending_payload;
            self.pending_payload = 0;
            self.skip(pending)?;
        }

        loop {
            self.close_finished();

            let start = self.position;
            let Some(id) = self.read_id()? else {
                tracing::debug!(position = self.position, "end of stream");
                return Ok(0);
            };
            if id == ids::END_OF_STREAM {
                tracing::debug!(position = start, "end-of-stream marker");
                return Ok(0);
            }
            let size = self.read_size()?;
            self.check_fits(id, size, start)?;

            tracing::trace!(
                id = format_args!("0x{id:X}"),
                offset = start,
                size,
                "element"
            );

            let frame = if self.block_group.is_some() {
                self.in_block_group(id, size, start)?
            } else if self.cluster.is_some() {
                self.in_cluster(id, size, start)?
            } else if self.segment.is_some() {
                self.in_segment(id, size, start)?;
                None
            } else {
                self.at_top_level(id, size, start)?;
                None
            };

            if let Some(len) = frame {
                return Ok(len);
            }
        }
    }

    /// Read the next `buf.len()` bytes of the current frame's payload.
    pub fn read_payload(&mut self, buf: &mut [u8]) -> Result<()> {
        let len = buf.len() as u64;
        if len > self.pending_payload {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "read of {len} bytes exceeds remaining frame payload of {}",
                    self.pending_payload
                ),
            )
            .into());
        }
        self.read_exact(buf)?;
        self.pending_payload -= len;
        Ok(())
    }

    /// Next frame's payload, or `None` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.read_frame_header()?;
        if len == 0 {
            return Ok(None);
        }
        let mut frame = vec![0u8; len];
        self.read_payload(&mut frame)?;
        Ok(Some(frame))
    }

    /// Wait until the current frame's presentation time and return it in
    /// `clock_rate` units.
    ///
    /// Presentation time is `(cluster timecode + block timecode) *
    /// timecode_scale` nanoseconds after the first
    /// [`read_frame_header`](Self::read_frame_header), at 100 ns
    /// resolution. Consumes the current block header; with no current
    /// block, returns 0 without waiting.
    pub fn wait_for_frame_timestamp(&mut self, clock_rate: u32) -> u64 {
        let Some(block) = self.block.take() else {
            return 0;
        };

        let ticks_in_scale = i128::from(block.cluster_timecode) + i128::from(block.timecode);
        let nanos = (ticks_in_scale * i128::from(self.segment_info.timecode_scale)).max(0);
        let ticks = nanos / NANOS_PER_TICK;

        let target = Duration::from_nanos(
            u64::try_from(ticks * NANOS_PER_TICK).unwrap_or(u64::MAX),
        );
        self.pacer.wait_until(target);

        let timestamp = u128::from(clock_rate) * ticks as u128 / TICKS_PER_SECOND;
        u64::try_from(timestamp).unwrap_or(u64::MAX)
    }

    fn in_segment(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<()> {
        match id {
            ids::SEGMENT_INFO => {
                let data_start = self.position;
                let data = self.read_element_data(id, size, start)?;
                self.parse_segment_info(&data, data_start)
            }
            ids::TRACKS => {
                let data_start = self.position;
                let data = self.read_element_data(id, size, start)?;
                self.parse_tracks(&data, data_start)
            }
            ids::TRACK_ENTRY => {
                let data_start = self.position;
                let data = self.read_element_data(id, size, start)?;
                self.parse_track_entry(&data, data_start)
            }
            ids::CLUSTER => {
                self.open_cluster(size);
                Ok(())
            }
            ids::SEEK_HEAD
            | ids::CUES
            | ids::TAGS
            | ids::CHAPTERS
            | ids::ATTACHMENTS
            | ids::CRC32
            | ids::VOID => self.skip_element(id, size, start),
            _ => Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
        }
    }

    fn in_cluster(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<Option<usize>> {
        let unbounded = self.cluster.is_some_and(|c| c.end.is_none());
        if unbounded && is_segment_child(id) {
            tracing::trace!(offset = start, "unknown-size cluster ended");
            self.cluster = None;
            self.in_segment(id, size, start)?;
            return Ok(None);
        }

        match id {
            ids::TIMECODE => {
                let value = self.read_uint_element(id, size, start)?;
                self.update_cluster(|c| c.timecode = Some(value));
            }
            ids::POSITION => {
                let value = self.read_uint_element(id, size, start)?;
                self.update_cluster(|c| c.position = Some(value));
            }
            ids::PREV_SIZE => {
                let value = self.read_uint_element(id, size, start)?;
                self.update_cluster(|c| c.prev_size = Some(value));
            }
            ids::BLOCK_GROUP => {
                let end = self.required_end(id, size, start)?;
                self.block_group = Some(OpenBlockGroup {
                    end,
                    info: BlockGroupInfo::default(),
                });
            }
            ids::SIMPLE_BLOCK => return self.read_block(id, size, start, true),
            ids::CUES | ids::TAGS | ids::CRC32 | ids::VOID => {
                self.skip_element(id, size, start)?
            }
            _ => return Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
        }
        Ok(None)
    }

    fn in_block_group(
        &mut self,
        id: u32,
        size: Option<u64>,
        start: u64,
    ) -> Result<Option<usize>> {
        match id {
            ids::BLOCK => return self.read_block(id, size, start, false),
            ids::REFERENCE_BLOCK => {
                let data = self.read_element_data(id, size, start)?;
                let value = ebml::read_int(&data).ok_or_else(|| {
                    self.error(invalid_number(id, data.len()), start)
                })?;
                if let Some(group) = &mut self.block_group {
                    group.info.reference_block = Some(value);
                }
            }
            ids::BLOCK_DURATION => {
                let value = self.read_uint_element(id, size, start)?;
                if let Some(group) = &mut self.block_group {
                    group.info.duration = Some(value);
                }
            }
            ids::BLOCK_ADDITIONS | ids::TAGS | ids::CUES | ids::CRC32 | ids::VOID => {
                self.skip_element(id, size, start)?
            }
            _ => return Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
        }
        Ok(None)
    }

    fn at_top_level(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<()> {
        match id {
            ids::SEGMENT => {
                self.open_segment(size);
                Ok(())
            }
            ids::EBML | ids::CRC32 | ids::VOID => self.skip_element(id, size, start),
            _ => Err(self.error(MatroskaErrorKind::UnexpectedId(id), start)),
        }
    }

    /// Parse a Block/SimpleBlock header. Returns the payload length when
    /// the block belongs to the target track; otherwise skips it.
    fn read_block(
        &mut self,
        id: u32,
        size: Option<u64>,
        start: u64,
        simple: bool,
    ) -> Result<Option<usize>> {
        let size = size.ok_or_else(|| self.error(MatroskaErrorKind::UnknownSize(id), start))?;

        // Track vint, then 16-bit timecode and flags. The header must fit
        // in the block before anything past its first byte is read.
        if size == 0 {
            return Err(self.error(MatroskaErrorKind::TruncatedBlock, start));
        }
        let track_start = self.position;
        let first = self.read_byte()?;
        let track_len = ebml::vint_length(first)
            .ok_or_else(|| self.error(MatroskaErrorKind::InvalidSize(first), track_start))?;
        let header_len = track_len + 3;
        let remaining = size
            .checked_sub(header_len as u64)
            .ok_or_else(|| self.error(MatroskaErrorKind::TruncatedBlock, start))?;

        let mut header = [0u8; 11];
        header[0] = first;
        self.read_exact(&mut header[1..header_len])?;
        let track_number = ebml::decode_vint(&header[..track_len]);
        let timecode = i16::from_be_bytes([header[track_len], header[track_len + 1]]);
        let flags = header[track_len + 2];

        if track_number != self.target_track {
            tracing::trace!(track_number, offset = start, "skipping block for other track");
            self.skip(remaining)?;
            return Ok(None);
        }
        if flags & 0x06 != 0 {
            return Err(self.error(MatroskaErrorKind::LacedBlock, start));
        }

        let len = usize::try_from(remaining)
            .map_err(|_| self.error(MatroskaErrorKind::ElementTooLarge(id), start))?;
        let cluster_timecode = self.cluster.and_then(|c| c.info.timecode).unwrap_or(0);
        self.block = Some(BlockHeader {
            track_number,
            timecode,
            flags,
            cluster_timecode,
            simple,
        });
        self.pending_payload = remaining;
        Ok(Some(len))
    }

    fn parse_ebml_header(&mut self, data: &[u8], data_start: u64) -> Result<()> {
        for child in self.children(data, data_start)? {
            if child.id == ids::DOC_TYPE {
                self.doc_type = Some(ebml::read_string(child.data));
            }
        }
        let doc_type = self
            .doc_type
            .get_or_insert_with(|| "matroska".to_string())
            .clone();
        if !matches!(doc_type.as_str(), "matroska" | "webm") {
            return Err(self.error(MatroskaErrorKind::InvalidDocType(doc_type), data_start));
        }
        tracing::debug!(doc_type = self.doc_type.as_deref(), "EBML header");
        Ok(())
    }

    fn parse_segment_info(&mut self, data: &[u8], data_start: u64) -> Result<()> {
        for child in self.children(data, data_start)? {
            let offset = data_start + child.offset as u64;
            match child.id {
                ids::TIMECODE_SCALE => {
                    let scale = ebml::read_uint(child.data)
                        .filter(|&s| s > 0)
                        .ok_or_else(|| self.error(invalid_number(child.id, child.data.len()), offset))?;
                    self.segment_info.timecode_scale = scale;
                }
                ids::DURATION => {
                    let duration = ebml::read_float(child.data).ok_or_else(|| {
                        self.error(invalid_number(child.id, child.data.len()), offset)
                    })?;
                    self.segment_info.duration = Some(duration);
                }
                _ => {}
            }
        }
        tracing::debug!(
            timecode_scale = self.segment_info.timecode_scale,
            duration = self.segment_info.duration,
            "segment info"
        );
        Ok(())
    }

    fn parse_tracks(&mut self, data: &[u8], data_start: u64) -> Result<()> {
        for child in self.children(data, data_start)? {
            if child.id == ids::TRACK_ENTRY {
                self.parse_track_entry(child.data, data_start + child.offset as u64)?;
            }
        }
        Ok(())
    }

    fn parse_track_entry(&mut self, data: &[u8], data_start: u64) -> Result<()> {
        let mut number = None;
        let mut track_type = None;
        let mut codec_id = None;
        for child in self.children(data, data_start)? {
            let offset = data_start + child.offset as u64;
            match child.id {
                ids::TRACK_NUMBER | ids::TRACK_TYPE => {
                    let value = ebml::read_uint(child.data).ok_or_else(|| {
                        self.error(invalid_number(child.id, child.data.len()), offset)
                    })?;
                    if child.id == ids::TRACK_NUMBER {
                        number = Some(value);
                    } else {
                        track_type = Some(value);
                    }
                }
                ids::CODEC_ID => codec_id = Some(ebml::read_string(child.data)),
                _ => {}
            }
        }
        if let Some(number) = number {
            tracing::debug!(number, track_type, codec_id = codec_id.as_deref(), "track");
            self.tracks.push(TrackInfo {
                number,
                track_type,
                codec_id,
            });
        }
        Ok(())
    }

    fn children<'a>(&self, data: &'a [u8], data_start: u64) -> Result<Vec<ebml::Child<'a>>> {
        ebml::children(data).map_err(|(kind, offset)| self.error(kind, data_start + offset as u64))
    }

    fn open_segment(&mut self, size: Option<u64>) {
        let end = size.map(|s| self.position + s);
        tracing::debug!(offset = self.position, end, "segment");
        self.segment = Some(end);
        self.cluster = None;
        self.block_group = None;
    }

    fn open_cluster(&mut self, size: Option<u64>) {
        let end = size.map(|s| self.position + s);
        tracing::trace!(offset = self.position, end, "cluster");
        self.cluster = Some(OpenCluster {
            end,
            info: ClusterInfo::default(),
        });
        self.block_group = None;
    }

    fn update_cluster(&mut self, f: impl FnOnce(&mut ClusterInfo)) {
        if let Some(cluster) = &mut self.cluster {
            f(&mut cluster.info);
        }
    }

    /// Pop every state whose recorded end offset has been reached.
    fn close_finished(&mut self) {
        let position = self.position;
        if self.block_group.is_some_and(|g| position >= g.end) {
            self.block_group = None;
        }
        if self
            .cluster
            .is_some_and(|c| c.end.is_some_and(|end| position >= end))
        {
            self.cluster = None;
            self.block_group = None;
        }
        if self.segment.is_some_and(|s| s.is_some_and(|end| position >= end)) {
            tracing::debug!(position, "segment ended");
            self.segment = None;
            self.cluster = None;
            self.block_group = None;
        }
    }

    /// Tightest known end offset among the open states.
    fn parent_end(&self) -> Option<u64> {
        [
            self.block_group.map(|g| g.end),
            self.cluster.and_then(|c| c.end),
            self.segment.flatten(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Only Segment and Cluster may have an unknown size; nothing may
    /// extend past its parent.
    fn check_fits(&self, id: u32, size: Option<u64>, start: u64) -> Result<()> {
        let Some(size) = size else {
            let cluster_allowed = id == ids::CLUSTER && self.segment.is_some();
            if id == ids::SEGMENT || cluster_allowed {
                return Ok(());
            }
            return Err(self.error(MatroskaErrorKind::UnknownSize(id), start));
        };
        if let Some(end) = self.parent_end() {
            let fits = self
                .position
                .checked_add(size)
                .is_some_and(|element_end| element_end <= end);
            if !fits {
                return Err(self.error(MatroskaErrorKind::ElementOverflow(id), start));
            }
        }
        Ok(())
    }

    fn required_end(&self, id: u32, size: Option<u64>, start: u64) -> Result<u64> {
        size.map(|s| self.position + s)
            .ok_or_else(|| self.error(MatroskaErrorKind::UnknownSize(id), start))
    }

    fn read_uint_element(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<u64> {
        let data = self.read_element_data(id, size, start)?;
        ebml::read_uint(&data).ok_or_else(|| self.error(invalid_number(id, data.len()), start))
    }

    fn read_element_data(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<Vec<u8>> {
        let size = size.ok_or_else(|| self.error(MatroskaErrorKind::UnknownSize(id), start))?;
        if size > MAX_BUFFERED_ELEMENT_LEN {
            return Err(self.error(MatroskaErrorKind::ElementTooLarge(id), start));
        }
        let mut data = vec![0u8; size as usize];
        self.read_exact(&mut data)?;
        Ok(data)
    }

    fn skip_element(&mut self, id: u32, size: Option<u64>, start: u64) -> Result<()> {
        let size = size.ok_or_else(|| self.error(MatroskaErrorKind::UnknownSize(id), start))?;
        tracing::trace!(id = format_args!("0x{id:X}"), offset = start, size, "skipping element");
        self.skip(size)
    }

    /// Element ID, or `None` on a clean end of input before its first byte.
    fn read_id(&mut self) -> Result<Option<u32>> {
        let start = self.position;
        let Some(first) = self.read_byte_or_eof()? else {
            return Ok(None);
        };
        let len = ebml::id_length(first)
            .ok_or_else(|| self.error(MatroskaErrorKind::InvalidId(first), start))?;
        let mut id = u32::from(first);
        for _ in 1..len {
            id = (id << 8) | u32::from(self.read_byte()?);
        }
        Ok(Some(id))
    }

    fn read_required_id(&mut self) -> Result<u32> {
        self.read_id()?.ok_or_else(|| {
            io::Error::new(ErrorKind::UnexpectedEof, "stream ended before Segment").into()
        })
    }

    /// Element data size; `None` is unknown size.
    fn read_size(&mut self) -> Result<Option<u64>> {
        let (bytes, len) = self.read_vint_bytes()?;
        Ok(ebml::decode_size(&bytes[..len]))
    }

    fn read_vint_bytes(&mut self) -> Result<([u8; 8], usize)> {
        let start = self.position;
        let first = self.read_byte()?;
        let len = ebml::vint_length(first)
            .ok_or_else(|| self.error(MatroskaErrorKind::InvalidSize(first), start))?;
        let mut bytes = [0u8; 8];
        bytes[0] = first;
        self.read_exact(&mut bytes[1..len])?;
        Ok((bytes, len))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_byte_or_eof(&mut self) -> Result<Option<u8>> {
        let mut b = [0u8; 1];
        loop {
            match self.source.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.position += 1;
                    return Ok(Some(b[0]));
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.source.read_exact(buf)?;
        self.position += buf.len() as u64;
        Ok(())
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        let copied = io::copy(&mut (&mut self.source).take(len), &mut io::sink())?;
        self.position += copied;
        if copied < len {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "stream ended inside element").into());
        }
        Ok(())
    }

    fn error(&self, kind: MatroskaErrorKind, offset: u64) -> BridgeError {
        BridgeError::Matroska { kind, offset }
    }
}

fn invalid_number(id: u32, len: usize) -> MatroskaErrorKind {
    MatroskaErrorKind::InvalidNumber {
        id,
        len: len as u64,
    }
}

/// Elements that live directly under Segment; seeing one inside an
/// unknown-size Cluster ends that Cluster.
fn is_segment_child(id: u32) -> bool {
    matches!(
        id,
        ids::CLUSTER
            | ids::SEGMENT_INFO
            | ids::SEEK_HEAD
            | ids::TRACKS
            | ids::CUES
            | ids::TAGS
            | ids::CHAPTERS
            | ids::ATTACHMENTS
    )
}
