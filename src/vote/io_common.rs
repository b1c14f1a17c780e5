use std::path::{Path, PathBuf};

use calamine::DataType;

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Relative paths are taken from the directory of the configuration file.
pub fn resolve_path(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

pub fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// The text of a spreadsheet cell, trimmed. Whole numbers lose their
/// decimal part, so that a numeric code 12345 reads "12345" and not "12345.0".
pub fn cell_to_string(cell: &DataType) -> Option<String> {
    let s = match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Removes the blank entries of each column and the columns left without
/// any entry. The columns keep their order.
pub fn clean_columns(columns: Vec<(String, Vec<String>)>) -> Vec<(String, Vec<String>)> {
    columns
        .into_iter()
        .map(|(label, cands)| {
            let cands: Vec<String> = cands
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            (label.trim().to_string(), cands)
        })
        .filter(|(_, cands)| !cands.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(cell_to_string(&DataType::Float(12345.0)), Some("12345".to_string()));
        assert_eq!(cell_to_string(&DataType::Float(1.5)), Some("1.5".to_string()));
        assert_eq!(cell_to_string(&DataType::Int(7)), Some("7".to_string()));
        assert_eq!(
            cell_to_string(&DataType::String("  AB12C ".to_string())),
            Some("AB12C".to_string())
        );
        assert_eq!(cell_to_string(&DataType::String("   ".to_string())), None);
        assert_eq!(cell_to_string(&DataType::Empty), None);
    }

    #[test]
    fn paths() {
        let root = Path::new("/srv/election");
        assert_eq!(
            resolve_path(root, "codes.xlsx"),
            PathBuf::from("/srv/election/codes.xlsx")
        );
        assert_eq!(resolve_path(root, "/tmp/x.csv"), PathBuf::from("/tmp/x.csv"));
        assert!(is_csv(Path::new("a/b/Votes.CSV")));
        assert!(!is_csv(Path::new("a/b/codes.xlsx")));
        assert_eq!(simplify_file_name(Path::new("/a/b/codes.xlsx")), "codes.xlsx");
    }

    #[test]
    fn columns() {
        let cols = clean_columns(vec![
            (
                " Team1 ".to_string(),
                vec!["Alice".to_string(), "".to_string(), "Bob".to_string()],
            ),
            ("Empty".to_string(), vec!["".to_string(), " ".to_string()]),
        ]);
        assert_eq!(
            cols,
            vec![(
                "Team1".to_string(),
                vec!["Alice".to_string(), "Bob".to_string()]
            )]
        );
    }
}
