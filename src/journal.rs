use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::limits::JOURNAL_QUEUE_CAPACITY;
use crate::model::StoreRecord;
use crate::observability::{JOURNAL_BATCH_SIZE, JOURNAL_SYNC_DURATION_SECONDS};

const LEN_PREFIX: usize = 4;
const CRC_SUFFIX: usize = 4;

/// Frame `record` onto `buf` as `[u32 len][bincode][u32 crc32]`, little-endian.
fn frame_into(buf: &mut Vec<u8>, record: &StoreRecord) -> io::Result<()> {
    let payload =
        bincode::serialize(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "journal record exceeds u32 length"))?;
    buf.reserve(LEN_PREFIX + payload.len() + CRC_SUFFIX);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(&payload);
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    Ok(())
}

enum Frame {
    /// A decoded record and the number of bytes it spans.
    Intact(StoreRecord, usize),
    /// Fewer bytes left than the frame needs: a write cut short by a crash.
    Torn,
    /// Complete frame whose checksum or payload does not decode.
    Corrupt,
}

fn split_u32(bytes: &[u8]) -> Option<(u32, &[u8])> {
    let (head, rest) = bytes.split_first_chunk::<4>()?;
    Some((u32::from_le_bytes(*head), rest))
}

fn read_frame(bytes: &[u8]) -> Frame {
    let Some((len, rest)) = split_u32(bytes) else {
        return Frame::Torn;
    };
    let len = len as usize;
    if rest.len() < len + CRC_SUFFIX {
        return Frame::Torn;
    }
    let (payload, rest) = rest.split_at(len);
    let Some((crc, _)) = split_u32(rest) else {
        return Frame::Torn;
    };
    if crc != crc32fast::hash(payload) {
        return Frame::Corrupt;
    }
    match bincode::deserialize(payload) {
        Ok(record) => Frame::Intact(record, LEN_PREFIX + len + CRC_SUFFIX),
        Err(_) => Frame::Corrupt,
    }
}

/// What a scan of the journal file found.
#[derive(Debug)]
pub struct Recovered {
    pub records: Vec<StoreRecord>,
    /// Byte length of the intact prefix; everything past it is discarded.
    pub intact_len: u64,
    pub file_len: u64,
}

impl Recovered {
    pub fn discarded(&self) -> u64 {
        self.file_len - self.intact_len
    }
}

/// Append-only store journal.
///
/// Records are staged in memory and made durable together by `commit`, so a
/// batch of writers shares one fsync. A commit that fails is cut back off the
/// file, and `open` cuts off any torn or corrupt tail left by a crash before
/// new records are appended behind it.
pub struct Journal {
    file: File,
    path: PathBuf,
    staged: Vec<u8>,
    staged_records: u64,
    committed_len: u64,
    appends_since_compact: u64,
}

impl Journal {
    /// Open (or create) the journal at `path` and return the records it holds.
    pub fn open(path: &Path) -> io::Result<(Self, Vec<StoreRecord>)> {
        let recovered = Self::recover(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if recovered.discarded() > 0 {
            warn!(
                path = %path.display(),
                kept = recovered.records.len(),
                discarded_bytes = recovered.discarded(),
                "journal tail is torn or corrupt, truncating"
            );
            file.set_len(recovered.intact_len)?;
            file.sync_all()?;
        }
        let journal = Self {
            file,
            path: path.to_path_buf(),
            staged: Vec::new(),
            staged_records: 0,
            committed_len: recovered.intact_len,
            appends_since_compact: 0,
        };
        Ok((journal, recovered.records))
    }

    /// Decode the intact prefix of the file at `path`. A missing file is empty.
    pub fn recover(path: &Path) -> io::Result<Recovered> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        let mut records = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            match read_frame(&bytes[offset..]) {
                Frame::Intact(record, used) => {
                    records.push(record);
                    offset += used;
                }
                Frame::Torn => {
                    debug!(offset, "journal ends in a partial entry");
                    break;
                }
                Frame::Corrupt => {
                    warn!(path = %path.display(), offset, "journal entry failed checksum");
                    break;
                }
            }
        }
        Ok(Recovered {
            records,
            intact_len: offset as u64,
            file_len: bytes.len() as u64,
        })
    }

    /// Buffer one record for the next `commit`. Nothing reaches the file yet.
    pub fn stage(&mut self, record: &StoreRecord) -> io::Result<()> {
        frame_into(&mut self.staged, record)?;
        self.staged_records += 1;
        Ok(())
    }

    /// Write every staged record and fsync. On failure the partial write is
    /// truncated away and the staged records are dropped.
    pub fn commit(&mut self) -> io::Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        let result = self
            .file
            .write_all(&self.staged)
            .and_then(|()| self.file.sync_data());
        match result {
            Ok(()) => {
                self.committed_len += self.staged.len() as u64;
                self.appends_since_compact += self.staged_records;
            }
            Err(_) => {
                if let Err(e) = self.file.set_len(self.committed_len) {
                    warn!(error = %e, "could not cut failed journal write");
                }
            }
        }
        self.staged.clear();
        self.staged_records = 0;
        result
    }

    /// Stage and commit a single record.
    pub fn append(&mut self, record: &StoreRecord) -> io::Result<()> {
        self.stage(record)?;
        self.commit()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the journal with `records` (the minimal set recreating current
    /// state). Written to a sibling file, fsynced, then renamed over the journal.
    pub fn compact(&mut self, records: &[StoreRecord]) -> io::Result<()> {
        let mut image = Vec::new();
        for record in records {
            frame_into(&mut image, record)?;
        }
        let tmp_path = self.path.with_extension("journal.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(&image)?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.committed_len = image.len() as u64;
        self.appends_since_compact = 0;
        Ok(())
    }
}

// ── Group-commit writer ──────────────────────────────────────────

type Ack<T> = oneshot::Sender<io::Result<T>>;

enum WriterCommand {
    Append { record: StoreRecord, response: Ack<()> },
    Compact { records: Vec<StoreRecord>, response: Ack<()> },
    AppendsSinceCompact { response: oneshot::Sender<u64> },
}

/// Handle to the thread that owns the journal file.
///
/// Every append waits for its record to be fsynced. Appends that arrive while
/// a sync is in progress are committed together with a single fsync.
pub struct JournalWriter {
    tx: mpsc::Sender<WriterCommand>,
    path: PathBuf,
}

fn writer_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "journal writer stopped")
}

impl JournalWriter {
    /// Move `journal` onto a dedicated thread. The thread exits once every
    /// handle is dropped.
    pub fn spawn(journal: Journal) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel(JOURNAL_QUEUE_CAPACITY);
        let path = journal.path().to_path_buf();
        std::thread::Builder::new()
            .name("stayd-journal".into())
            .spawn(move || writer_loop(journal, rx))?;
        Ok(Self { tx, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns once `record` is durable.
    pub async fn append(&self, record: StoreRecord) -> io::Result<()> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Append { record, response })
            .await
            .map_err(|_| writer_stopped())?;
        rx.await.map_err(|_| writer_stopped())?
    }

    pub async fn compact(&self, records: Vec<StoreRecord>) -> io::Result<()> {
        let (response, rx) = oneshot::channel();
        self.tx
            .send(WriterCommand::Compact { records, response })
            .await
            .map_err(|_| writer_stopped())?;
        rx.await.map_err(|_| writer_stopped())?
    }

    /// Zero once the writer has stopped.
    pub async fn appends_since_compact(&self) -> u64 {
        let (response, rx) = oneshot::channel();
        if self.tx.send(WriterCommand::AppendsSinceCompact { response }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// 1. Block for the next command.
/// 2. For an append, also take every append already queued behind it.
/// 3. Stage the batch, commit once, answer every sender with the result.
/// 4. A non-append found while batching runs after the batch commits.
fn writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<WriterCommand>) {
    while let Some(cmd) = rx.blocking_recv() {
        let (record, response) = match cmd {
            WriterCommand::Append { record, response } => (record, response),
            other => {
                handle_maintenance(&mut journal, other);
                continue;
            }
        };
        let mut batch = vec![(record, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WriterCommand::Append { record, response } => batch.push((record, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut journal, batch);
        if let Some(cmd) = deferred {
            handle_maintenance(&mut journal, cmd);
        }
    }
    debug!(path = %journal.path().display(), "journal writer stopped");
}

fn commit_batch(journal: &mut Journal, batch: Vec<(StoreRecord, Ack<()>)>) {
    metrics::histogram!(JOURNAL_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();
    let staged = batch.iter().try_for_each(|(record, _)| journal.stage(record));
    // Commit even after a staging error so earlier records in the batch
    // are not left buffered for the next one.
    let committed = journal.commit();
    metrics::histogram!(JOURNAL_SYNC_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    let outcome = staged.and(committed);
    if let Err(e) = &outcome {
        warn!(error = %e, records = batch.len(), "journal commit failed");
    }
    for (_, response) in batch {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = response.send(reply);
    }
}

fn handle_maintenance(journal: &mut Journal, cmd: WriterCommand) {
    match cmd {
        WriterCommand::Compact { records, response } => {
            let _ = response.send(journal.compact(&records));
        }
        WriterCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
        WriterCommand::Append { record, response } => commit_batch(journal, vec![(record, response)]),
    }
}
