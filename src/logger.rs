//! Append-only binary event log.
//!
//! A log file is a 56-byte header followed by contiguous 64-byte
//! `EventMsg` records. The writer buffers through `BufWriter` so the
//! drain thread amortises syscalls; the reader validates the header
//! before yielding records and tolerates a truncated tail.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::events::EventMsg;

pub const LOG_MAGIC: u64 = 0x574F_4C46_5045_45;
pub const LOG_VERSION: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, FromZeroes, FromBytes, AsBytes)]
pub struct FileHeader {
    pub magic: u64,
    pub version: u32,
    pub msg_size: u32,
    pub timestamp_start: u64,
    pub reserved: [u64; 4],
}

const _: () = assert!(
    std::mem::size_of::<FileHeader>() == 56,
    "FileHeader must be 56 bytes"
);

impl FileHeader {
    pub fn new(timestamp_start: u64) -> Self {
        Self {
            magic: LOG_MAGIC,
            version: LOG_VERSION,
            msg_size: std::mem::size_of::<EventMsg>() as u32,
            timestamp_start,
            reserved: [0; 4],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == LOG_MAGIC
            && self.version == LOG_VERSION
            && self.msg_size == std::mem::size_of::<EventMsg>() as u32
    }
}

/// Buffered writer for the event log. The only fallible surface of the
/// crate: construction, appends and flush return `io::Result`.
pub struct EventLogWriter {
    out: BufWriter<File>,
    messages_logged: u64,
}

impl EventLogWriter {
    /// Create (truncating) a log file and write its header.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::with_start_timestamp(path, 0)
    }

    pub fn with_start_timestamp<P: AsRef<Path>>(path: P, timestamp_start: u64) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        out.write_all(FileHeader::new(timestamp_start).as_bytes())?;
        Ok(Self {
            out,
            messages_logged: 0,
        })
    }

    pub fn append(&mut self, msg: &EventMsg) -> io::Result<()> {
        self.out.write_all(msg.as_bytes())?;
        self.messages_logged += 1;
        Ok(())
    }

    pub fn append_batch(&mut self, msgs: &[EventMsg]) -> io::Result<()> {
        self.out.write_all(msgs.as_bytes())?;
        self.messages_logged += msgs.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    #[inline]
    pub fn messages_logged(&self) -> u64 {
        self.messages_logged
    }
}

/// Sequential reader over a log file.
#[derive(Debug)]
pub struct EventLogReader {
    input: BufReader<File>,
    header: FileHeader,
    messages_read: u64,
}

impl EventLogReader {
    /// Open a log and validate its header. A bad magic, version or
    /// record size is `InvalidData`.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut input = BufReader::new(file);

        let mut buf = [0u8; std::mem::size_of::<FileHeader>()];
        input.read_exact(&mut buf)?;
        let header = FileHeader::read_from(&buf[..])
            .filter(FileHeader::is_valid)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "not an event log"))?;

        Ok(Self {
            input,
            header,
            messages_read: 0,
        })
    }

    #[inline]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Next record, or `None` at end of file. A partial trailing
    /// record (interrupted writer) also ends the stream.
    pub fn read_next(&mut self) -> io::Result<Option<EventMsg>> {
        let mut buf = [0u8; std::mem::size_of::<EventMsg>()];
        match self.input.read_exact(&mut buf) {
            Ok(()) => {
                self.messages_read += 1;
                Ok(EventMsg::read_from(&buf[..]))
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Seek back to the first record.
    pub fn rewind(&mut self) -> io::Result<()> {
        self.input
            .seek(SeekFrom::Start(std::mem::size_of::<FileHeader>() as u64))?;
        self.messages_read = 0;
        Ok(())
    }

    #[inline]
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Side;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_log_path(tag: &str) -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "flux_lob_{}_{}_{}.evlog",
            tag,
            std::process::id(),
            n
        ))
    }

    #[test]
    fn test_header_round_trip() {
        let path = temp_log_path("header");
        {
            let mut writer = EventLogWriter::with_start_timestamp(&path, 777).unwrap();
            writer.flush().unwrap();
        }
        let reader = EventLogReader::open(&path).unwrap();
        assert!(reader.header().is_valid());
        assert_eq!(reader.header().timestamp_start, 777);
        assert_eq!(reader.header().msg_size, 64);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_write_read_records() {
        let path = temp_log_path("records");
        let events = [
            EventMsg::trade(1, 10, 20, 100, 5),
            EventMsg::accepted(2, 30, Side::Buy, 99, 7),
            EventMsg::cancelled(3, 30, 7),
        ];
        {
            let mut writer = EventLogWriter::create(&path).unwrap();
            writer.append(&events[0]).unwrap();
            writer.append_batch(&events[1..]).unwrap();
            assert_eq!(writer.messages_logged(), 3);
            writer.flush().unwrap();
        }

        let mut reader = EventLogReader::open(&path).unwrap();
        for expected in &events {
            let got = reader.read_next().unwrap().expect("record present");
            assert_eq!(&got, expected);
        }
        assert_eq!(reader.read_next().unwrap(), None);
        assert_eq!(reader.messages_read(), 3);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_rewind() {
        let path = temp_log_path("rewind");
        {
            let mut writer = EventLogWriter::create(&path).unwrap();
            writer.append(&EventMsg::trade(1, 1, 2, 100, 5)).unwrap();
            writer.flush().unwrap();
        }
        let mut reader = EventLogReader::open(&path).unwrap();
        let first = reader.read_next().unwrap().unwrap();
        assert_eq!(reader.read_next().unwrap(), None);

        reader.rewind().unwrap();
        assert_eq!(reader.messages_read(), 0);
        assert_eq!(reader.read_next().unwrap().unwrap(), first);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_rejects_garbage() {
        let path = temp_log_path("garbage");
        std::fs::write(&path, vec![0u8; 200]).unwrap();
        let err = EventLogReader::open(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_truncated_tail_ends_stream() {
        let path = temp_log_path("truncated");
        {
            let mut writer = EventLogWriter::create(&path).unwrap();
            writer.append(&EventMsg::trade(1, 1, 2, 100, 5)).unwrap();
            writer.flush().unwrap();
        }
        // Chop half a record off the end
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 32]).unwrap();

        let mut reader = EventLogReader::open(&path).unwrap();
        assert_eq!(reader.read_next().unwrap(), None);
        std::fs::remove_file(&path).ok();
    }
}
