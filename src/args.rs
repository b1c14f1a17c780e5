use clap::Parser;

/// A ballot box for a single election: voting terminal, tally and export.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON file describing the election: secrets, positions, candidate files,
    /// voter codes and the location of the ballot log.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// If passed as an argument, prints the current tally in JSON format and exits instead of
    /// starting the voting terminal.
    #[clap(long, takes_value = false)]
    pub tally: bool,

    /// (file path, 'stdout' or empty) With --tally, the summary of the election will be written
    /// in JSON format to the given location. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) If specified, copies the raw ballot log (CSV) to the given location and exits.
    #[clap(long, value_parser)]
    pub export: Option<String>,

    /// (number) Overrides the number of leading candidates shown per position (topN in the
    /// configuration).
    #[clap(long, value_parser)]
    pub top: Option<usize>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard error.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
