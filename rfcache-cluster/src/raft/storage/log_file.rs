//! Append-only NDJSON log file.

use crate::types::ClusterEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// One log entry per line, appended and fsynced per batch.
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Open (or create) the log at `path` and return the entries it holds.
    ///
    /// A torn final line, left by a crash mid-append, is dropped and the file
    /// is rewritten without it. A corrupt line anywhere else is an error.
    pub fn open(path: PathBuf) -> io::Result<(Self, Vec<ClusterEntry>)> {
        let (entries, torn_tail) = if path.exists() {
            read_entries(&path)?
        } else {
            (Vec::new(), false)
        };

        let writer = open_append(&path)?;
        let mut log = Self { path, writer };

        if torn_tail {
            tracing::warn!(path = %log.path.display(), "dropping torn entry at end of raft log");
            log.rewrite(entries.iter())?;
        }

        Ok((log, entries))
    }

    /// Append `entries` and make them durable.
    pub fn append<'a>(&mut self, entries: impl IntoIterator<Item = &'a ClusterEntry>) -> io::Result<()> {
        for entry in entries {
            serde_json::to_writer(&mut self.writer, entry)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    /// Atomically replace the file contents with `entries`.
    pub fn rewrite<'a>(&mut self, entries: impl IntoIterator<Item = &'a ClusterEntry>) -> io::Result<()> {
        let temp_path = self.path.with_extension("ndjson.tmp");

        {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&temp_path)?;
            let mut writer = BufWriter::new(file);
            for entry in entries {
                serde_json::to_writer(&mut writer, entry)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&temp_path, &self.path)?;
        self.writer = open_append(&self.path)?;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn read_entries(path: &Path) -> io::Result<(Vec<ClusterEntry>, bool)> {
    let reader = BufReader::new(File::open(path)?);
    let lines: Vec<String> = reader.lines().collect::<io::Result<_>>()?;
    let last = lines.len().saturating_sub(1);

    let mut entries = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ClusterEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(_) if i == last => return Ok((entries, true)),
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        }
    }

    Ok((entries, false))
}
