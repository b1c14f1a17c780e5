//! The code list and candidate lists of the configuration, read from
//! spreadsheets or CSV files.

use std::collections::HashMap;

use crate::vote::io_common::{clean_columns, is_csv, resolve_path};
use crate::vote::*;

#[derive(Eq, PartialEq, Debug, Clone)]
enum CandidateOrigin {
    File {
        path: PathBuf,
        worksheet: Option<String>,
    },
    Inline(Catalog),
}

/// Reads the candidates of each position from the file named in its
/// configuration, every time a snapshot is taken.
#[derive(Debug, Clone)]
pub struct FileCandidateSource {
    origins: HashMap<String, CandidateOrigin>,
}

impl FileCandidateSource {
    pub fn new(positions: &[PositionConfig], root: &Path) -> FileCandidateSource {
        let origins = positions
            .iter()
            .map(|pc| {
                let origin = match (&pc.file_path, &pc.subcategories) {
                    (Some(p), _) => CandidateOrigin::File {
                        path: resolve_path(root, p),
                        worksheet: pc.excel_worksheet_name.clone(),
                    },
                    (None, subs) => CandidateOrigin::Inline(Catalog::new(
                        subs.iter()
                            .flatten()
                            .map(|s| (s.name.clone(), s.candidates.clone()))
                            .collect(),
                    )),
                };
                (pc.name.trim().to_string(), origin)
            })
            .collect();
        FileCandidateSource { origins }
    }
}

fn read_catalog(path: &Path, worksheet: Option<&str>) -> VoteResult<Catalog> {
    let columns = if is_csv(path) {
        io_csv::read_columns(path)?
    } else {
        io_excel::read_columns(path, worksheet)?
    };
    Ok(Catalog::new(clean_columns(columns)))
}

impl CandidateSource for FileCandidateSource {
    fn load(&self, position: &Position) -> Result<Catalog, CatalogError> {
        let origin = self
            .origins
            .get(&position.name)
            .context(NotConfiguredSnafu {
                position: &position.name,
            })?;
        match origin {
            CandidateOrigin::Inline(catalog) => Ok(catalog.clone()),
            CandidateOrigin::File { path, worksheet } => {
                debug!("load: {}: reading {:?}", position.name, path);
                read_catalog(path, worksheet.as_deref())
                    .map_err(|e| BoxedError::from(e.to_string()))
                    .context(UnavailableSnafu {
                        position: &position.name,
                    })
            }
        }
    }
}

fn read_codes(source: &CodeSourceConfig, root: &Path) -> VoteResult<Vec<String>> {
    match (&source.codes, &source.file_path) {
        (Some(codes), _) => Ok(codes.clone()),
        (None, Some(p)) => {
            let path = resolve_path(root, p);
            info!("read_codes: reading voter codes from {:?}", path);
            if is_csv(&path) {
                io_csv::read_first_column(&path)
            } else {
                io_excel::read_first_column(&path, source.excel_worksheet_name.as_deref())
            }
        }
        (None, None) => whatever!("codeSource: either codes or filePath must be provided"),
    }
}

/// The voter codes. A source that cannot be read gives an unavailable code
/// set: voters cannot log in, the admin can.
pub fn load_codes(source: &CodeSourceConfig, root: &Path) -> CodeSet {
    match read_codes(source, root) {
        Ok(codes) => CodeSet::from_codes(&codes),
        Err(e) => CodeSet::Unavailable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(name: &str, file: Option<&str>) -> PositionConfig {
        PositionConfig {
            name: name.to_string(),
            file_path: file.map(|s| s.to_string()),
            mode: None,
            excel_worksheet_name: None,
            subcategories: None,
        }
    }

    #[test]
    fn codes_from_csv_and_inline() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("codes.csv"), "AB12C\n\nXY34Z\n").unwrap();
        let from_file = load_codes(
            &CodeSourceConfig {
                file_path: Some("codes.csv".to_string()),
                excel_worksheet_name: None,
                codes: None,
            },
            dir.path(),
        );
        assert_eq!(from_file, CodeSet::from_codes(&["AB12C", "XY34Z"]));
        let inline = load_codes(
            &CodeSourceConfig {
                file_path: None,
                excel_worksheet_name: None,
                codes: Some(vec![" AB12C ".to_string()]),
            },
            dir.path(),
        );
        assert_eq!(inline, CodeSet::from_codes(&["AB12C"]));
    }

    #[test]
    fn unreadable_codes_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let codes = load_codes(
            &CodeSourceConfig {
                file_path: Some("codes.xlsx".to_string()),
                excel_worksheet_name: None,
                codes: None,
            },
            dir.path(),
        );
        assert!(matches!(codes, CodeSet::Unavailable(_)));
        let none = load_codes(
            &CodeSourceConfig {
                file_path: None,
                excel_worksheet_name: None,
                codes: None,
            },
            dir.path(),
        );
        assert!(matches!(none, CodeSet::Unavailable(_)));
    }

    #[test]
    fn candidates_are_read_at_every_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("pozA.csv");
        fs::write(&file, "Team1,Team2\nAlice,\nBob,\n").unwrap();
        let source =
            FileCandidateSource::new(&[position("pozA", Some("pozA.csv"))], dir.path());
        let pos = Position::two_step("pozA");
        let catalog = source.load(&pos).unwrap();
        // Team2 has no candidate at all.
        assert_eq!(catalog.subcategories(), vec!["Team1"]);

        fs::write(&file, "Team1,Team2\nAlice,Carol\n").unwrap();
        let catalog = source.load(&pos).unwrap();
        assert_eq!(catalog.subcategories(), vec!["Team1", "Team2"]);

        fs::remove_file(&file).unwrap();
        assert!(matches!(
            source.load(&pos),
            Err(CatalogError::Unavailable { .. })
        ));
        assert!(matches!(
            source.load(&Position::flat("pozB")),
            Err(CatalogError::NotConfigured { .. })
        ));
    }

    #[test]
    fn inline_candidates() {
        let mut pc = position("pozB", None);
        pc.subcategories = Some(vec![SubcategoryConfig {
            name: "all".to_string(),
            candidates: vec!["Dan".to_string(), " ".to_string(), "Eve".to_string()],
        }]);
        let source = FileCandidateSource::new(&[pc], Path::new("."));
        let catalog = source.load(&Position::flat("pozB")).unwrap();
        assert_eq!(catalog.pooled(), vec!["Dan", "Eve"]);
    }
}
