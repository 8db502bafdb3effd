/*!
* # Sedtune - A library for tuning spread-event durations in burn probability models.
* A burn probability engine simulates thousands of fire seasons on a landscape tile,
* drawing the number of ignitions and the number of days each fire actively spreads
* (the spread-event duration, or SED) from discrete distributions.  The SED
* distribution is the knob that controls simulated fire sizes: this crate fits a
* zero-truncated Poisson table to a candidate mean, runs the engine over a group of
* National Topographic System (NTS) sheets, and nudges the candidate until the
* modeled mean fire size matches the observed mean for the ecozone.  The tuned mean
* per ecozone is written to a csv after every ecozone, so a crashed sweep resumes
* with its progress intact.
*
* The engine itself is a third-party desktop package driven through its console
* executable; [engine::ConsoleSession] opens a scenario inside one of its libraries
* and [engine::SyntheticScenario] stands in for it when no install is available.
*
*  - Please direct questions, comments or insults to the [github repository](https://github.com/crumplecup/sedtune).
*
*  ## Quick Start
*
* To use sedtune, add it to your `Cargo.toml`
* ```toml
* [dependencies]
* sedtune = "^0.1.0"
* ```
*
*  - Load the crate prelude in the preamble of your `main.rs`.
*  - Fit a distribution and calibrate against a synthetic landscape:
* ```rust
* use sedtune::prelude::*;
*
* fn main() -> Result<(), CalError> {
*     // zero-truncated Poisson table with mean 3 days of spread
*     let sed = ztp_dist("SED", 3.0)?;
*     assert!(sed.last().unwrap().value >= 3.0);
*     Ok(())
* }
* ```
*
* Against a real install, open a scenario by library path and id and hand it to
* the sweep:
* ```no_run
* use sedtune::prelude::*;
* use std::path::Path;
*
* fn main() -> Result<(), CalError> {
*     let session = ConsoleSession::new(Path::new("C:/Program Files/SyncroSim"));
*     let mut scen = session.scenario(Path::new("NTS_template.ssim"), 1)?;
*     let store = RegionStore::new(Path::new("Y:/Working_data"));
*     let results = ResultsStore::new(Path::new("results"))?;
*     let tuned = run_ezs(&store, &results, &mut scen)?;
*     for t in tuned {
*         println!("ecozone {}: SED {}", t.ecozone, t.sed);
*     }
*     Ok(())
* }
* ```
*/

#![warn(missing_docs)]
pub mod calibrate;
pub mod dist;
pub mod engine;
pub mod errors;
pub mod plot;
pub mod scenario;
pub mod utils;

/// Common imports for calibration workflows.
pub mod prelude {
    pub use crate::calibrate::{
        ecozones, run_ezs, run_test_nts, CalibrationResult, CalibrationStep, Outcome, TunedSed,
    };
    pub use crate::dist::{ztp, ztp_dist, ztp_mean, DistName, DistRow};
    pub use crate::engine::{
        ConsoleScenario, ConsoleSession, FireStat, RunOutput, Scenario, SyntheticScenario,
    };
    pub use crate::errors::CalError;
    pub use crate::plot;
    pub use crate::scenario::{
        init_run, setup_scen, RegionStore, ResultsStore, RunArtifacts, Setup, SkipReason,
    };
}
