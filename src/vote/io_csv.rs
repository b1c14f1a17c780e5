// Primitives for reading CSV files.

use std::fs::File;

use crate::vote::io_common::simplify_file_name;
use crate::vote::*;

fn get_records(path: &Path) -> VoteResult<csv::StringRecordsIntoIter<File>> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: path.display().to_string(),
        })?;
    Ok(rdr.into_records())
}

/// The values of the first column, without header. Blank cells are skipped.
pub fn read_first_column(path: &Path) -> VoteResult<Vec<String>> {
    let mut res: Vec<String> = Vec::new();
    for (idx, line_r) in get_records(path)?.enumerate() {
        let line = line_r.context(CsvLineParseSnafu {
            path: path.display().to_string(),
            lineno: idx + 1,
        })?;
        if let Some(v) = line.get(0).map(|s| s.trim()).filter(|s| !s.is_empty()) {
            res.push(v.to_string());
        }
    }
    debug!(
        "read_first_column: {}: {} values",
        simplify_file_name(path),
        res.len()
    );
    Ok(res)
}

/// The columns of the file, labelled by the first line. Short lines are
/// padded with blanks.
pub fn read_columns(path: &Path) -> VoteResult<Vec<(String, Vec<String>)>> {
    let mut records = get_records(path)?;
    let mut columns: Vec<(String, Vec<String>)> = match records.next() {
        None => Vec::new(),
        Some(header_r) => header_r
            .context(CsvLineParseSnafu {
                path: path.display().to_string(),
                lineno: 1_usize,
            })?
            .iter()
            .map(|label| (label.trim().to_string(), Vec::new()))
            .collect(),
    };
    for (idx, line_r) in records.enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {
            path: path.display().to_string(),
            lineno,
        })?;
        debug!("read_columns: lineno: {:?} row: {:?}", lineno, &line);
        for (col, (_, cands)) in columns.iter_mut().enumerate() {
            cands.push(line.get(col).unwrap_or("").to_string());
        }
    }
    Ok(columns)
}
