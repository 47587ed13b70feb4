// Record encoder: each text line of the local file becomes one record with
// an empty key in a block-compressed container. Lines end at `\n`, `\r` or
// `\r\n`; the terminator is not part of the record.
//
// The line reader and the staging writer are owned by `encode` alone, so
// every return path (success, read error, write error) drops
// both. A failed encode leaves the container without its trailer; the next
// attempt recreates the staging object from scratch.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use log::warn;

use crate::container::{ContainerError, Record, RecordReader, RecordWriter};
use crate::store::{RemotePath, RemoteStore};

use super::{BUF_SIZE, EncodeError, EncodeStats, RecordOptions};

/// Counts bytes that make it to the staging sink.
struct CountingWriter<W> {
    inner: W,
    bytes: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.bytes += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Read one line into `line`, terminator excluded. A line ends at `\n`,
/// `\r` or `\r\n`. Returns the bytes consumed, 0 at end of input.
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<usize> {
    let mut consumed = 0;
    loop {
        let (end, used) = {
            let buf = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                return Ok(consumed);
            }
            match buf.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(i) => {
                    line.extend_from_slice(&buf[..i]);
                    (Some(buf[i]), i + 1)
                }
                None => {
                    line.extend_from_slice(buf);
                    (None, buf.len())
                }
            }
        };
        reader.consume(used);
        consumed += used;

        match end {
            Some(b'\r') => {
                // `\r\n` may straddle two buffer fills.
                if reader.fill_buf()?.first() == Some(&b'\n') {
                    reader.consume(1);
                    consumed += 1;
                }
                return Ok(consumed);
            }
            Some(_) => return Ok(consumed),
            None => {}
        }
    }
}

/// Encode `local` as one record per line into `staging`.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD, so any
/// readable file encodes.
pub fn encode(
    store: &dyn RemoteStore,
    local: &Path,
    staging: &RemotePath,
    opts: &RecordOptions,
) -> Result<EncodeStats, EncodeError> {
    let source_err = |source| EncodeError::Source {
        path: local.to_path_buf(),
        source,
    };
    let container_err = |source| EncodeError::Container {
        path: staging.clone(),
        source,
    };

    let file = File::open(local).map_err(source_err)?;
    let mut lines = BufReader::with_capacity(BUF_SIZE, file);

    let sink = store.create(staging).map_err(|source| EncodeError::Sink {
        path: staging.clone(),
        source,
    })?;
    let sink = CountingWriter {
        inner: sink,
        bytes: 0,
    };
    let mut writer = RecordWriter::new(sink, opts.writer_options()).map_err(container_err)?;

    let mut line = Vec::new();
    let mut bytes_read = 0u64;
    let mut replaced = 0u64;
    loop {
        line.clear();
        let n = read_line(&mut lines, &mut line).map_err(source_err)?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;
        let text = String::from_utf8_lossy(&line);
        if let Cow::Owned(_) = text {
            replaced += 1;
        }
        writer.append(&[], text.as_bytes()).map_err(container_err)?;
    }
    if replaced > 0 {
        warn!(
            "{}: {replaced} line(s) were not valid UTF-8 and were decoded lossily",
            local.display()
        );
    }

    let (sink, stats) = writer.finish().map_err(container_err)?;
    debug_assert_eq!(sink.bytes, stats.bytes_written);

    Ok(EncodeStats {
        bytes_read,
        bytes_written: sink.bytes,
        records: Some(stats.records),
        blocks: Some(stats.blocks),
    })
}

// ---------------------------------------------------------------------------
// Read-back
// ---------------------------------------------------------------------------

/// Open a record container stored at `path`.
pub fn open_records(
    store: &dyn RemoteStore,
    path: &RemotePath,
) -> Result<RecordReader<Box<dyn Read + Send>>, ContainerError> {
    RecordReader::new(store.open(path)?)
}

/// Read every record value at `path` as a text line.
pub fn read_lines(store: &dyn RemoteStore, path: &RemotePath) -> Result<Vec<String>, ContainerError> {
    open_records(store, path)?
        .map(|record| {
            let Record { value, .. } = record?;
            String::from_utf8(value)
                .map_err(|e| ContainerError::Corrupt(format!("record is not UTF-8: {e}")))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
