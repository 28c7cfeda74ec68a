//! Append-only JSON-lines journal file.
//!
//! On-disk format: one serde_json document per line, `\n` terminated. On open
//! the file is read front-to-back. An unterminated final line that fails to
//! parse is a torn write from a crash: it is logged and truncated away. Any
//! other malformed line fails the open.
//!
//! An append that fails part way is rolled back by truncating the file to its
//! length before the write. If that truncation fails too, the journal refuses
//! every later append.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use stockledger_core::{LedgerError, LedgerResult};

fn io_error(path: &Path, err: io::Error) -> LedgerError {
    LedgerError::storage(format!("journal {}: {err}", path.display()))
}

/// Byte sink a journal appends to.
pub trait JournalMedium: Write {
    fn sync_data(&mut self) -> io::Result<()>;
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl JournalMedium for File {
    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

/// Writer half of an open journal file.
///
/// Records go straight to the medium, unbuffered, so a failed append never
/// leaves bytes behind to be flushed by a later one.
#[derive(Debug)]
pub struct JournalFile<W = File> {
    path: PathBuf,
    medium: W,
    /// Length of the acknowledged prefix.
    len: u64,
    fsync: bool,
    failed: bool,
}

impl JournalFile {
    /// Open (or create) the journal at `path` and return every record in it.
    pub fn open<T: DeserializeOwned>(path: &Path, fsync: bool) -> LedgerResult<(Self, Vec<T>)> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(path, e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;

        let mut raw = Vec::new();
        file.read_to_end(&mut raw).map_err(|e| io_error(path, e))?;

        let (records, valid_len) = Self::parse(path, &raw)?;
        if valid_len < raw.len() {
            tracing::warn!(
                path = %path.display(),
                dropped_bytes = raw.len() - valid_len,
                "truncating torn journal tail"
            );
            file.set_len(valid_len as u64).map_err(|e| io_error(path, e))?;
        }

        Ok((
            Self {
                path: path.to_path_buf(),
                medium: file,
                len: valid_len as u64,
                fsync,
                failed: false,
            },
            records,
        ))
    }

    fn parse<T: DeserializeOwned>(path: &Path, raw: &[u8]) -> LedgerResult<(Vec<T>, usize)> {
        let mut records = Vec::new();
        let mut offset = 0usize;
        let mut line_no = 0usize;

        while offset < raw.len() {
            line_no += 1;
            let rest = &raw[offset..];
            let Some(newline) = rest.iter().position(|b| *b == b'\n') else {
                // Unterminated tail: a torn write, never acknowledged to a caller.
                return Ok((records, offset));
            };

            let line = &rest[..newline];
            if !line.iter().all(u8::is_ascii_whitespace) {
                let record = serde_json::from_slice(line).map_err(|e| {
                    LedgerError::storage(format!(
                        "journal {} line {line_no}: {e}",
                        path.display()
                    ))
                })?;
                records.push(record);
            }
            offset += newline + 1;
        }

        Ok((records, offset))
    }
}

impl<W: JournalMedium> JournalFile<W> {
    /// Append one record and flush it (and fsync, if configured).
    ///
    /// On error the file is truncated back to its previous length.
    pub fn append<T: Serialize>(&mut self, record: &T) -> LedgerResult<()> {
        if self.failed {
            return Err(LedgerError::storage(format!(
                "journal {}: unavailable after a failed rollback",
                self.path.display()
            )));
        }

        let mut line = serde_json::to_vec(record)
            .map_err(|e| LedgerError::storage(format!("journal serialization failed: {e}")))?;
        line.push(b'\n');

        match self.write_line(&line) {
            Ok(()) => {
                self.len += line.len() as u64;
                Ok(())
            }
            Err(err) => {
                match self.medium.set_len(self.len) {
                    Ok(()) => tracing::warn!(
                        path = %self.path.display(),
                        error = %err,
                        "journal append failed; rolled back"
                    ),
                    Err(rollback) => {
                        self.failed = true;
                        tracing::error!(
                            path = %self.path.display(),
                            error = %err,
                            rollback_error = %rollback,
                            "journal rollback failed; refusing further appends"
                        );
                    }
                }
                Err(io_error(&self.path, err))
            }
        }
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.medium.write_all(line)?;
        self.medium.flush()?;
        if self.fsync {
            self.medium.sync_data()?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
