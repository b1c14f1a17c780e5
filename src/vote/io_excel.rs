// Primitives for reading Excel files.

use calamine::{open_workbook, DataType, Range, Reader, Xlsx};

use crate::vote::io_common::{cell_to_string, simplify_file_name};
use crate::vote::*;

fn get_range(path: &Path, worksheet_name: Option<&str>) -> VoteResult<Range<DataType>> {
    let path_s = path.display().to_string();
    debug!("get_range: path: {:?} worksheet: {:?}", &path_s, &worksheet_name);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu {
        path: path_s.clone(),
    })?;

    // A worksheet name was provided, use it. Otherwise the first one.
    let wrange = match worksheet_name {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu {
                path: path_s.clone(),
                name,
            })?
            .context(OpeningExcelSnafu { path: path_s })?,
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {
                path: path_s.clone(),
            })?
            .context(OpeningExcelSnafu { path: path_s })?,
    };
    Ok(wrange)
}

/// The values of the first column, without header. Blank cells are skipped.
pub fn read_first_column(path: &Path, worksheet_name: Option<&str>) -> VoteResult<Vec<String>> {
    let wrange = get_range(path, worksheet_name)?;
    let res: Vec<String> = wrange
        .rows()
        .filter_map(|row| row.get(0).and_then(cell_to_string))
        .collect();
    debug!(
        "read_first_column: {}: {} values",
        simplify_file_name(path),
        res.len()
    );
    Ok(res)
}

/// The columns of the sheet, labelled by the first row. Blank cells are
/// kept; the caller decides what to drop.
pub fn read_columns(
    path: &Path,
    worksheet_name: Option<&str>,
) -> VoteResult<Vec<(String, Vec<String>)>> {
    let wrange = get_range(path, worksheet_name)?;
    let mut rows = wrange.rows();
    let header = rows.next().context(EmptyExcelSnafu {
        path: path.display().to_string(),
    })?;
    debug!("read_columns: header: {:?}", header);
    let mut columns: Vec<(String, Vec<String>)> = header
        .iter()
        .map(|cell| (cell_to_string(cell).unwrap_or_default(), Vec::new()))
        .collect();
    for row in rows {
        for (idx, (_, cands)) in columns.iter_mut().enumerate() {
            cands.push(row.get(idx).and_then(cell_to_string).unwrap_or_default());
        }
    }
    Ok(columns)
}
