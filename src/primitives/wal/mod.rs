#![forbid(unsafe_code)]

use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::primitives::io::FileIo;
use crate::types::{entry_crc32, unix_nanos, GraphError, InternalError, Lsn, Result};

/// Bytes before the payload: LSN (8), op type (1), payload length (4).
pub const ENTRY_HEADER_LEN: usize = 13;
/// Bytes after the payload: checksum (4), timestamp (8).
pub const ENTRY_TRAILER_LEN: usize = 12;
/// Largest payload accepted on append or trusted during recovery.
pub const MAX_ENTRY_DATA_LEN: usize = 64 * 1024 * 1024;

/// Kind of mutation recorded by a WAL entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum OpType {
    /// A node was created.
    CreateNode = 0,
    /// Properties were merged into a node.
    UpdateNode = 1,
    /// A node was removed.
    DeleteNode = 2,
    /// An edge was created.
    CreateEdge = 3,
    /// Properties or weight of an edge changed.
    UpdateEdge = 4,
    /// An edge was removed.
    DeleteEdge = 5,
    /// A vector index was declared on a property.
    CreateVectorIndex = 6,
    /// A vector index was dropped.
    DropVectorIndex = 7,
}

impl TryFrom<u8> for OpType {
    type Error = GraphError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => OpType::CreateNode,
            1 => OpType::UpdateNode,
            2 => OpType::DeleteNode,
            3 => OpType::CreateEdge,
            4 => OpType::UpdateEdge,
            5 => OpType::DeleteEdge,
            6 => OpType::CreateVectorIndex,
            7 => OpType::DropVectorIndex,
            _ => return Err(InternalError::Corruption("unknown wal op type").into()),
        })
    }
}

/// One record of the log.
///
/// On disk, little-endian with no padding:
/// `lsn:u64 | op:u8 | len:u32 | data[len] | crc32(data):u32 | timestamp:i64`.
#[derive(Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Position in the log.
    pub lsn: Lsn,
    /// Mutation kind.
    pub op: OpType,
    /// Encoded mutation payload.
    pub data: Vec<u8>,
    /// CRC-32 (IEEE) over `data`.
    pub checksum: u32,
    /// Append time in Unix nanoseconds.
    pub timestamp: i64,
}

impl fmt::Debug for WalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalEntry")
            .field("lsn", &self.lsn)
            .field("op", &self.op)
            .field("data_len", &self.data.len())
            .field("checksum", &self.checksum)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl WalEntry {
    /// Builds an entry and computes its checksum.
    pub fn new(lsn: Lsn, op: OpType, data: Vec<u8>, timestamp: i64) -> Self {
        let checksum = entry_crc32(&data);
        Self {
            lsn,
            op,
            data,
            checksum,
            timestamp,
        }
    }

    /// Size of the encoded record.
    pub fn encoded_len(&self) -> usize {
        ENTRY_HEADER_LEN + self.data.len() + ENTRY_TRAILER_LEN
    }

    /// Encodes the record. Fails if the payload length does not fit in `u32`.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.data.len())
            .map_err(|_| GraphError::invalid("wal payload exceeds u32 length"))?;
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.lsn.0.to_le_bytes());
        buf.push(self.op as u8);
        buf.extend_from_slice(&len.to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        Ok(buf)
    }

    /// Decodes one record from the front of `src`, returning it with the
    /// number of bytes consumed. The checksum is verified.
    pub fn decode(src: &[u8]) -> Result<(WalEntry, usize)> {
        let header = decode_header(src)?;
        let total = ENTRY_HEADER_LEN + header.data_len + ENTRY_TRAILER_LEN;
        if src.len() < total {
            return Err(InternalError::Corruption("wal entry truncated").into());
        }
        let entry = decode_body(header, &src[ENTRY_HEADER_LEN..total])?;
        Ok((entry, total))
    }

    /// Whether the stored checksum matches the payload.
    pub fn is_intact(&self) -> bool {
        entry_crc32(&self.data) == self.checksum
    }
}

struct EntryHeader {
    lsn: Lsn,
    op: OpType,
    data_len: usize,
}

fn decode_header(src: &[u8]) -> Result<EntryHeader> {
    if src.len() < ENTRY_HEADER_LEN {
        return Err(InternalError::Corruption("wal entry header truncated").into());
    }
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&src[0..8]);
    let op = OpType::try_from(src[8])?;
    let mut len = [0u8; 4];
    len.copy_from_slice(&src[9..13]);
    let data_len = u32::from_le_bytes(len) as usize;
    if data_len > MAX_ENTRY_DATA_LEN {
        return Err(InternalError::Corruption("wal entry length exceeds limit").into());
    }
    Ok(EntryHeader {
        lsn: Lsn(u64::from_le_bytes(lsn)),
        op,
        data_len,
    })
}

/// `body` is the payload followed by the trailer.
fn decode_body(header: EntryHeader, body: &[u8]) -> Result<WalEntry> {
    let data = body[..header.data_len].to_vec();
    let trailer = &body[header.data_len..];
    let mut crc = [0u8; 4];
    crc.copy_from_slice(&trailer[0..4]);
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&trailer[4..12]);
    let entry = WalEntry {
        lsn: header.lsn,
        op: header.op,
        data,
        checksum: u32::from_le_bytes(crc),
        timestamp: i64::from_le_bytes(ts),
    };
    if !entry.is_intact() {
        return Err(InternalError::Corruption("wal entry checksum mismatch").into());
    }
    Ok(entry)
}

/// Synchronization mode for WAL appends.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WalSyncMode {
    /// fsync after every append before it returns.
    #[default]
    Immediate,
    /// fsync only on explicit `sync`, checkpoint and close.
    Deferred,
    /// Never fsync (tests and throwaway stores).
    Off,
}

/// Configuration options for opening a write-ahead log.
#[derive(Clone, Copy, Debug)]
pub struct WalOptions {
    /// When appends are forced to stable storage.
    pub sync_mode: WalSyncMode,
    /// LSN of the first append if the log holds nothing newer.
    pub start_lsn: Lsn,
}

impl Default for WalOptions {
    fn default() -> Self {
        Self {
            sync_mode: WalSyncMode::Immediate,
            start_lsn: Lsn(1),
        }
    }
}

/// Counters for one open WAL.
#[derive(Clone, Debug, Default)]
pub struct WalStats {
    /// Entries appended since open or the last reset.
    pub entries_appended: u64,
    /// Bytes appended since open or the last reset.
    pub bytes_appended: u64,
    /// fsyncs issued.
    pub syncs: u64,
}

/// What recovery found when the log was opened.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalRecovery {
    /// Valid entries kept.
    pub entries: u64,
    /// LSN of the last valid entry.
    pub last_lsn: Option<Lsn>,
    /// Length of the valid prefix.
    pub valid_bytes: u64,
    /// Bytes discarded after the valid prefix.
    pub truncated_bytes: u64,
}

struct WalState {
    append_offset: u64,
    /// `None` once the LSN space is used up.
    next_lsn: Option<Lsn>,
    last_lsn: Lsn,
    stats: WalStats,
}

/// Append-only, checksummed mutation log.
///
/// Appends are serialized by an internal mutex, so LSNs are assigned in the
/// order records reach the file. On open the log is scanned and everything
/// after the first torn, corrupt or out-of-sequence record is cut off.
pub struct Wal {
    io: Arc<dyn FileIo>,
    sync_mode: WalSyncMode,
    state: Mutex<WalState>,
    recovery: WalRecovery,
}

impl Wal {
    /// Opens a log, truncating any invalid tail.
    pub fn open(io: Arc<dyn FileIo>, options: WalOptions) -> Result<Self> {
        let start_lsn = if options.start_lsn.0 == 0 {
            Lsn(1)
        } else {
            options.start_lsn
        };
        let file_len = io.len()?;
        let mut iter = WalIterator::new(Arc::clone(&io), file_len);
        let mut entries = 0u64;
        let mut last_lsn = None;
        while let Some(entry) = iter.next_entry()? {
            entries += 1;
            last_lsn = Some(entry.lsn);
        }
        let valid_bytes = iter.valid_up_to();
        let truncated_bytes = file_len - valid_bytes;
        if truncated_bytes > 0 {
            warn!(
                valid_bytes,
                truncated_bytes,
                last_lsn = last_lsn.map(|lsn| lsn.0),
                "wal.recover.truncated_tail"
            );
            io.truncate(valid_bytes)?;
            io.sync_all()?;
        }
        let next_lsn = match last_lsn {
            Some(lsn) => lsn.next().map(|next| next.max(start_lsn)),
            None => Some(start_lsn),
        };
        let floor = start_lsn.0 - 1;
        let last = Lsn(last_lsn.map_or(floor, |lsn| lsn.0.max(floor)));
        debug!(entries, valid_bytes, "wal.open");
        Ok(Self {
            io,
            sync_mode: options.sync_mode,
            state: Mutex::new(WalState {
                append_offset: valid_bytes,
                next_lsn,
                last_lsn: last,
                stats: WalStats::default(),
            }),
            recovery: WalRecovery {
                entries,
                last_lsn,
                valid_bytes,
                truncated_bytes,
            },
        })
    }

    /// Appends one entry and returns its LSN.
    ///
    /// In [`WalSyncMode::Immediate`] the entry is fsynced before returning. If
    /// the write or fsync fails the file is cut back to where it was, the LSN
    /// is not consumed and the error is returned.
    pub fn append(&self, op: OpType, data: Vec<u8>) -> Result<Lsn> {
        if data.len() > MAX_ENTRY_DATA_LEN {
            return Err(GraphError::invalid(format!(
                "wal payload of {} bytes exceeds limit of {MAX_ENTRY_DATA_LEN}",
                data.len()
            )));
        }
        let mut state = self.state.lock();
        let lsn = state
            .next_lsn
            .ok_or(InternalError::Exhausted("log sequence number"))?;
        let entry = WalEntry::new(lsn, op, data, unix_nanos());
        let buf = entry.encode()?;
        let offset = state.append_offset;
        if let Err(err) = self.write_entry(offset, &buf) {
            error!(lsn = lsn.0, ?op, error = %err, "wal.append.failed");
            if let Err(rollback) = self.io.truncate(offset) {
                error!(offset, error = %rollback, "wal.append.rollback_failed");
            }
            return Err(err);
        }
        if self.sync_mode == WalSyncMode::Immediate {
            state.stats.syncs += 1;
        }
        state.append_offset = offset + buf.len() as u64;
        state.last_lsn = lsn;
        state.next_lsn = lsn.next();
        state.stats.entries_appended += 1;
        state.stats.bytes_appended += buf.len() as u64;
        debug!(lsn = lsn.0, ?op, bytes = buf.len(), "wal.append");
        Ok(lsn)
    }

    fn write_entry(&self, offset: u64, buf: &[u8]) -> Result<()> {
        self.io.write_at(offset, buf)?;
        if self.sync_mode == WalSyncMode::Immediate {
            self.io.sync_all()?;
        }
        Ok(())
    }

    /// Forces appended entries to stable storage. A no-op in [`WalSyncMode::Off`].
    pub fn sync(&self) -> Result<()> {
        if self.sync_mode == WalSyncMode::Off {
            return Ok(());
        }
        let mut state = self.state.lock();
        self.io.sync_all()?;
        state.stats.syncs += 1;
        Ok(())
    }

    /// Drops every entry. The next append gets `start_lsn`.
    pub fn reset(&self, start_lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        self.io.truncate(0)?;
        self.io.sync_all()?;
        state.append_offset = 0;
        state.last_lsn = Lsn(start_lsn.0.saturating_sub(1));
        state.next_lsn = Some(start_lsn);
        state.stats = WalStats::default();
        debug!(start_lsn = start_lsn.0, "wal.reset");
        Ok(())
    }

    /// Iterates over the entries currently in the file.
    pub fn iter(&self) -> Result<WalIterator> {
        let len = self.io.len()?;
        Ok(WalIterator::new(Arc::clone(&self.io), len))
    }

    /// LSN of the last appended entry, or the one before `start_lsn` if none.
    pub fn current_lsn(&self) -> Lsn {
        self.state.lock().last_lsn
    }

    /// Returns current statistics for this WAL instance.
    pub fn stats(&self) -> WalStats {
        self.state.lock().stats.clone()
    }

    /// What recovery found at open.
    pub fn recovery(&self) -> &WalRecovery {
        &self.recovery
    }

    /// Configured sync mode.
    pub fn sync_mode(&self) -> WalSyncMode {
        self.sync_mode
    }

    /// Total size of the log in bytes.
    pub fn len(&self) -> Result<u64> {
        self.io.len()
    }

    /// Returns true if the log holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Sequential reader over a log file.
///
/// Stops at the first record that is short, fails its checksum, carries an
/// unknown op type or oversized length, or breaks the LSN sequence.
pub struct WalIterator {
    io: Arc<dyn FileIo>,
    offset: u64,
    end: u64,
    valid_up_to: u64,
    expected_lsn: Option<Lsn>,
    done: bool,
}

impl WalIterator {
    fn new(io: Arc<dyn FileIo>, end: u64) -> Self {
        Self {
            io,
            offset: 0,
            end,
            valid_up_to: 0,
            expected_lsn: None,
            done: false,
        }
    }

    /// Reads the next valid entry, or `None` at the end of valid history.
    /// Only I/O faults other than a short read are returned as errors.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.done || self.offset >= self.end {
            return Ok(None);
        }
        match self.read_entry() {
            Ok(Some(entry)) => {
                self.offset += entry.encoded_len() as u64;
                self.valid_up_to = self.offset;
                self.expected_lsn = entry.lsn.next();
                Ok(Some(entry))
            }
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(GraphError::Internal(InternalError::Corruption(reason))) => {
                debug!(offset = self.offset, reason, "wal.iter.stop");
                self.done = true;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn read_entry(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.end - self.offset;
        if remaining < (ENTRY_HEADER_LEN + ENTRY_TRAILER_LEN) as u64 {
            return Ok(None);
        }
        let mut header_buf = [0u8; ENTRY_HEADER_LEN];
        if !read_or_eof(self.io.as_ref(), self.offset, &mut header_buf)? {
            return Ok(None);
        }
        let header = decode_header(&header_buf)?;
        match self.expected_lsn {
            Some(expected) if header.lsn != expected => {
                return Err(InternalError::Corruption("wal lsn sequence broken").into());
            }
            None if header.lsn.0 == 0 => {
                return Err(InternalError::Corruption("wal lsn zero").into());
            }
            _ => {}
        }
        let body_len = header.data_len + ENTRY_TRAILER_LEN;
        if remaining < (ENTRY_HEADER_LEN + body_len) as u64 {
            return Ok(None);
        }
        let mut body = vec![0u8; body_len];
        if !read_or_eof(
            self.io.as_ref(),
            self.offset + ENTRY_HEADER_LEN as u64,
            &mut body,
        )? {
            return Ok(None);
        }
        decode_body(header, &body).map(Some)
    }

    /// File offset up to which entries have been validated.
    pub fn valid_up_to(&self) -> u64 {
        self.valid_up_to
    }
}

fn read_or_eof(io: &dyn FileIo, off: u64, dst: &mut [u8]) -> Result<bool> {
    match io.read_at(off, dst) {
        Ok(()) => Ok(true),
        Err(GraphError::Internal(InternalError::Io(err)))
            if err.kind() == io::ErrorKind::UnexpectedEof =>
        {
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
