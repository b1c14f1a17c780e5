//! The ballot log as a CSV file: a `code` column followed by one column per
//! position, one row per ballot.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use ballot_box::IoSnafu as StoreIoSnafu;
use csv::StringRecord;
use log::{debug, warn};

use crate::vote::*;

fn backend<E>(message: &str, e: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend {
        message: message.to_string(),
        source: Box::new(e),
    }
}

/// Ballots stored in a CSV file.
///
/// The header is written once, when the first ballot creates the file, and
/// never rewritten: a configured position missing from the header of an
/// existing file refuses the append instead.
#[derive(Debug, Clone)]
pub struct CsvBallotStore {
    path: PathBuf,
    positions: Vec<String>,
}

impl CsvBallotStore {
    pub fn new(path: &Path, positions: &[Position]) -> CsvBallotStore {
        CsvBallotStore {
            path: path.to_path_buf(),
            positions: positions.iter().map(|p| p.name.clone()).collect(),
        }
    }

    fn path_s(&self) -> String {
        self.path.display().to_string()
    }

    /// The length of the file, or None if there is no file.
    fn current_len(&self) -> StoreResult<Option<u64>> {
        match std::fs::metadata(&self.path) {
            Ok(m) => Ok(Some(m.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(StoreIoSnafu { path: self.path_s() }),
        }
    }

    /// The header and the rows. An absent or empty file has neither.
    fn read_records(&self) -> StoreResult<Option<(StringRecord, Vec<StringRecord>)>> {
        match self.current_len()? {
            None | Some(0) => return Ok(None),
            Some(_) => {}
        }
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| backend("Cannot open the ballot log", e))?;
        let header = rdr
            .headers()
            .map_err(|e| backend("Cannot read the header of the ballot log", e))?
            .clone();
        let rows = rdr
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()
            .map_err(|e| backend("Cannot read the ballot log", e))?;
        Ok(Some((header, rows)))
    }

    fn to_ballots(header: &StringRecord, rows: &[StringRecord]) -> Vec<Ballot> {
        let code_idx = header.iter().position(|h| h.trim() == CODE_COLUMN);
        rows.iter()
            .filter_map(|row| {
                let code = VoterCode::parse(row.get(code_idx?)?)?;
                let choices = header
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| Some(*idx) != code_idx)
                    .map(|(idx, h)| {
                        (
                            h.trim().to_string(),
                            row.get(idx).unwrap_or("").trim().to_string(),
                        )
                    })
                    .collect();
                Some(Ballot { code, choices })
            })
            .collect()
    }

    fn serialize(records: &[Vec<&str>]) -> StoreResult<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for rec in records.iter() {
            wtr.write_record(rec)
                .map_err(|e| backend("Cannot serialize the ballot", e))?;
        }
        wtr.into_inner()
            .map_err(|e| e.into_error())
            .map_err(|e| backend("Cannot serialize the ballot", e))
    }

    /// Puts the file back the way it was before a failed append.
    fn restore(&self, previous_len: Option<u64>) -> std::io::Result<()> {
        match previous_len {
            None => std::fs::remove_file(&self.path),
            Some(len) => OpenOptions::new()
                .write(true)
                .open(&self.path)
                .and_then(|f| f.set_len(len)),
        }
    }

    /// True when the file holds bytes but its last line is not terminated.
    fn missing_line_break(&self, previous_len: Option<u64>) -> std::io::Result<bool> {
        match previous_len {
            None | Some(0) => Ok(false),
            Some(len) => {
                let mut file = File::open(&self.path)?;
                file.seek(SeekFrom::Start(len - 1))?;
                let mut last = [0u8; 1];
                file.read_exact(&mut last)?;
                Ok(last[0] != b'\n' && last[0] != b'\r')
            }
        }
    }

    fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.sync_data()
    }
}

impl BallotStore for CsvBallotStore {
    fn has_voted(&self, code: &VoterCode) -> StoreResult<bool> {
        Ok(self.all()?.iter().any(|b| b.code == *code))
    }

    fn append(&mut self, ballot: &Ballot) -> StoreResult<()> {
        let previous_len = self.current_len()?;
        let existing = self.read_records()?;
        let header: Vec<String> = match existing.as_ref() {
            Some((header, _)) => {
                let columns: Vec<&str> = header.iter().map(|h| h.trim()).collect();
                let missing: Vec<String> = std::iter::once(CODE_COLUMN)
                    .chain(self.positions.iter().map(|p| p.as_str()))
                    .filter(|p| !columns.contains(p))
                    .map(|p| p.to_string())
                    .collect();
                ensure!(missing.is_empty(), SchemaMismatchSnafu { missing });
                columns.iter().map(|c| c.to_string()).collect()
            }
            None => std::iter::once(CODE_COLUMN.to_string())
                .chain(self.positions.iter().cloned())
                .collect(),
        };
        let row: Vec<&str> = header
            .iter()
            .map(|col| {
                if col == CODE_COLUMN {
                    ballot.code.as_str()
                } else {
                    ballot.choice(col).unwrap_or("")
                }
            })
            .collect();
        let mut records: Vec<Vec<&str>> = Vec::new();
        if existing.is_none() {
            records.push(header.iter().map(|h| h.as_str()).collect());
        }
        records.push(row);
        let mut bytes = CsvBallotStore::serialize(&records)?;
        // The new row starts on its own line, even after a hand-edited file.
        if self
            .missing_line_break(previous_len)
            .context(StoreIoSnafu { path: self.path_s() })?
        {
            debug!("CsvBallotStore: the last row of {:?} is not terminated", self.path);
            bytes.insert(0, b'\n');
        }

        if let Err(e) = self.write_bytes(&bytes) {
            warn!("CsvBallotStore: append failed, restoring the ballot log: {}", e);
            if let Err(e2) = self.restore(previous_len) {
                warn!("CsvBallotStore: could not restore the ballot log: {}", e2);
            }
            return Err(e).context(StoreIoSnafu { path: self.path_s() });
        }
        Ok(())
    }

    fn all(&self) -> StoreResult<Vec<Ballot>> {
        match self.read_records()? {
            None => Ok(Vec::new()),
            Some((header, rows)) => Ok(CsvBallotStore::to_ballots(&header, &rows)),
        }
    }

    fn erase(&mut self) -> StoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context(StoreIoSnafu { path: self.path_s() }),
        }
    }

    fn export(&self) -> StoreResult<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).context(StoreIoSnafu { path: self.path_s() }),
        }
    }
}
