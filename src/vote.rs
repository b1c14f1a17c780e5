use log::{debug, info};

use ballot_box::builder::Builder;
use ballot_box::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;

use crate::vote::config_reader::*;
use crate::vote::io_ballot_log::CsvBallotStore;
use crate::vote::sources::{load_codes, FileCandidateSource};

pub mod config_reader;
pub mod io_ballot_log;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod sources;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VoteError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The spreadsheet {path} is empty"))]
    EmptyExcel { path: String },
    #[snafu(display("The spreadsheet {path} has no worksheet named {name}"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Error reading file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error writing to {path}"))]
    Io {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Invalid election: {source}"))]
    InvalidElection { source: BuildError },
    #[snafu(display("Ballot log error: {source}"))]
    BallotLogAccess { source: StoreError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

pub type VoteResult<T> = Result<T, VoteError>;

/// Reads the configuration file. Also returns the directory against which
/// the relative paths of the configuration resolve.
pub fn read_config(config_path: &str) -> VoteResult<(ElectionConfig, PathBuf)> {
    let config_str = fs::read_to_string(config_path).context(OpeningJsonSnafu { path: config_path })?;
    let config: ElectionConfig = serde_json::from_str(&config_str).context(ParsingJsonSnafu {})?;
    let root = Path::new(config_path)
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    Ok((config, root))
}

/// Builds the election described by a configuration file: voter codes,
/// candidate files and the CSV ballot log.
///
/// A missing code or candidate file is not an error here: it shows up as
/// unavailable at login time.
pub fn build_election(config_path: &str, top_override: Option<usize>) -> VoteResult<Election> {
    let (config, root) = read_config(config_path)?;
    let mut settings = validate_settings(&config)?;
    if let Some(top) = top_override {
        settings.top_n = top;
    }
    // Secrets are redacted in the debug output.
    info!("build_election: settings: {:?}", settings);

    let codes = load_codes(&config.code_source, &root);
    let candidates = FileCandidateSource::new(&config.positions, &root);
    let log_path = io_common::resolve_path(&root, &config.ballot_log_path);
    debug!("build_election: ballot log at {:?}", log_path);
    let store = CsvBallotStore::new(&log_path, &settings.positions);

    Builder::new(settings)
        .context(InvalidElectionSnafu {})?
        .codes(codes)
        .candidates(Box::new(candidates))
        .store(Box::new(store))
        .build()
        .context(InvalidElectionSnafu {})
}

fn standing_to_json(pt: &PositionTally) -> JSValue {
    let (status, rows) = match &pt.standing {
        Standing::NoCandidates => ("noCandidates", Vec::new()),
        Standing::NoVotes => ("noVotes", Vec::new()),
        Standing::Ranked(rows) => ("ranked", rows.clone()),
    };
    let tally: Vec<JSValue> = rows
        .iter()
        .map(|(name, votes)| json!({"candidate": name, "votes": votes}))
        .collect();
    json!({"position": pt.position, "status": status, "tally": tally})
}

/// The summary of the election, as printed by `--tally`.
pub fn tally_to_json(election: &Election) -> VoteResult<JSValue> {
    let standings = election.tally().context(BallotLogAccessSnafu {})?;
    let ballots = election.log().all().context(BallotLogAccessSnafu {})?.len();
    let results: Vec<JSValue> = standings.iter().map(standing_to_json).collect();
    Ok(json!({ "results": results, "ballots": ballots }))
}

/// Writes the tally summary to the given file, or to the standard output
/// for `None` or `stdout`.
pub fn run_tally(election: &Election, out: Option<String>) -> VoteResult<()> {
    let js = tally_to_json(election)?;
    let pretty_js = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
    match out.as_deref() {
        None | Some("stdout") => {
            println!("{}", pretty_js);
        }
        Some(path) => {
            info!("run_tally: writing summary to {:?}", path);
            fs::write(path, pretty_js).context(IoSnafu { path })?;
        }
    }
    Ok(())
}

/// Copies the raw ballot log to the given path.
pub fn run_export(election: &Election, dest: &str) -> VoteResult<()> {
    let bytes = election.log().export().context(BallotLogAccessSnafu {})?;
    info!("run_export: {} bytes to {:?}", bytes.len(), dest);
    fs::write(dest, bytes).context(IoSnafu { path: dest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, extra: &str) -> String {
        fs::write(dir.join("codes.csv"), "AB12C\nXY34Z\n  \nQQ77K\n").unwrap();
        fs::write(
            dir.join("pozA.csv"),
            "Team1,Team2\nAlice,Carol\nBob,\n",
        )
        .unwrap();
        let config = format!(
            r#"{{
                "adminSecret": "ADMIN1",
                "positions": [
                    {{"name": "pozA", "filePath": "pozA.csv", "mode": "twoStep"}},
                    {{"name": "pozB", "mode": "flat",
                      "subcategories": [{{"name": "all", "candidates": ["Dan", "Eve"]}}]}}
                ],
                "codeSource": {{"filePath": "codes.csv"}},
                "ballotLogPath": "votes.csv"
                {}
            }}"#,
            extra
        );
        let path = dir.join("election.json");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(config.as_bytes()).unwrap();
        path.display().to_string()
    }

    fn cast(election: &Election, code: &str, a: (&str, &str), b: &str) {
        let mut s = Session::new(election);
        s.login(election, code).unwrap();
        s.choose_subcategory(election, "pozA", a.0).unwrap();
        s.choose_candidate(election, "pozA", a.1).unwrap();
        s.choose_candidate(election, "pozB", b).unwrap();
        s.submit(election).unwrap();
    }

    #[test]
    fn builds_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), "");
        let election = build_election(&config_path, None).unwrap();
        assert_eq!(election.credentials().code_count(), 3);
        assert_eq!(election.settings().top_n, 7);
        let snap = election.snapshot();
        assert_eq!(
            snap.catalog("pozA").unwrap().subcategories(),
            vec!["Team1", "Team2"]
        );
        assert_eq!(snap.catalog("pozB").unwrap().pooled(), vec!["Dan", "Eve"]);

        cast(&election, "AB12C", ("Team1", "Bob"), "Eve");
        let raw = fs::read_to_string(dir.path().join("votes.csv")).unwrap();
        assert_eq!(raw, "code,pozA,pozB\nAB12C,Bob,Eve\n");
    }

    #[test]
    fn tally_summary() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), r#", "topN": 1"#);
        let election = build_election(&config_path, None).unwrap();
        let js = tally_to_json(&election).unwrap();
        assert_eq!(
            js,
            json!({"results": [
                {"position": "pozA", "status": "noVotes", "tally": []},
                {"position": "pozB", "status": "noVotes", "tally": []},
            ], "ballots": 0})
        );
        cast(&election, "AB12C", ("Team1", "Bob"), "Eve");
        cast(&election, "XY34Z", ("Team2", "Carol"), "Eve");
        cast(&election, "QQ77K", ("Team1", "Bob"), "Dan");
        let js = tally_to_json(&election).unwrap();
        assert_eq!(
            js,
            json!({"results": [
                {"position": "pozA", "status": "ranked", "tally": [{"candidate": "Bob", "votes": 2}]},
                {"position": "pozB", "status": "ranked", "tally": [{"candidate": "Eve", "votes": 2}]},
            ], "ballots": 3})
        );
        let election = build_election(&config_path, Some(5)).unwrap();
        let js = tally_to_json(&election).unwrap();
        assert_eq!(js["results"][0]["tally"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn missing_candidate_file_is_no_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), "");
        fs::remove_file(dir.path().join("pozA.csv")).unwrap();
        let election = build_election(&config_path, None).unwrap();
        let js = tally_to_json(&election).unwrap();
        assert_eq!(js["results"][0]["status"], json!("noCandidates"));
        assert_eq!(js["results"][1]["status"], json!("noVotes"));
    }

    #[test]
    fn export_copies_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_config(dir.path(), "");
        let election = build_election(&config_path, None).unwrap();
        let dest = dir.path().join("export.csv").display().to_string();
        run_export(&election, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), Vec::<u8>::new());
        cast(&election, "AB12C", ("Team2", "Carol"), "Dan");
        run_export(&election, &dest).unwrap();
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "code,pozA,pozB\nAB12C,Carol,Dan\n"
        );
    }

    #[test]
    fn bad_configurations() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            build_election(&dir.path().join("nope.json").display().to_string(), None),
            Err(VoteError::OpeningJson { .. })
        ));
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            build_election(&path.display().to_string(), None),
            Err(VoteError::ParsingJson { .. })
        ));
        let config_path = write_config(dir.path(), r#", "topN": 0"#);
        assert!(build_election(&config_path, None).is_err());
    }
}
