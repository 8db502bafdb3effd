
/// Custom error type for the sedtune crate.
#[derive(Debug)]
pub enum CalError {
    /// Error type from csv crate.
    CsvError,
    /// Error type from std::io.
    IoError,
    /// Root solve or tail enumeration failed to converge.
    SolveError,
    /// Distribution name outside the set accepted by the engine.
    NameError,
    /// Simulation engine reported failure.  Fatal, never retried.
    EngineError,
    /// A region group produced no fires, so mean fire size is undefined.
    NoFires,
}

impl std::error::Error for CalError {}

impl std::fmt::Display for CalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CalError::CsvError => write!(f, "Could not serialize/deserialize csv file."),
            CalError::IoError => write!(f, "Could not read file from path provided."),
            CalError::SolveError => write!(
                f,
                "Could not fit a zero-truncated distribution to the mean provided."
            ),
            CalError::NameError => write!(f, "Distribution name must be either SED or Igns."),
            CalError::EngineError => write!(f, "Simulation engine run failed."),
            CalError::NoFires => write!(f, "No fires simulated for the region group."),
        }
    }
}

impl From<csv::Error> for CalError {
    fn from(_: csv::Error) -> Self {
        CalError::CsvError
    }
}

impl From<std::io::Error> for CalError {
    fn from(_: std::io::Error) -> Self {
        CalError::IoError
    }
}
