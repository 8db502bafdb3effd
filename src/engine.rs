//! Session and scenario handles for the burn probability engine.
//!
//! The engine is a third-party desktop package driven through its console
//! executable.  Configuration travels as named datasheets; the crate only
//! ever touches the five sheets the calibration flow rewrites, plus the two
//! output sheets it reads back.  [SyntheticScenario] is an in-process
//! stand-in with the same seam, used for dry runs and benchmarks.
use crate::dist::DistRow;
use crate::errors::CalError;
use crate::utils;
use rand::thread_rng;
use rand_distr::{Distribution, LogNormal, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Landscape raster sheet: one row naming the fuel and elevation grids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandscapeRasters {
    /// Path to the elevation grid for the region.
    #[serde(rename = "ElevationGridFileName")]
    pub elevation: PathBuf,
    /// Path to the fuel grid for the region.
    #[serde(rename = "FuelGridFileName")]
    pub fuel: PathBuf,
}

/// Ignition cause recognized by the probabilistic ignition sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cause {
    /// Human-caused ignitions.
    Human,
    /// Lightning-caused ignitions.
    Lightning,
}

/// One row of the probabilistic ignition location sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnitionGrid {
    /// Fire season, 1 for spring and 2 for summer.
    #[serde(rename = "Season")]
    pub season: u32,
    /// Ignition cause.
    #[serde(rename = "Cause")]
    pub cause: Cause,
    /// Path to the ignition probability grid.
    #[serde(rename = "IgnitionGridFileName")]
    pub path: PathBuf,
}

/// One day of the weather stream, in the engine's recognized field names.
/// Reference csvs must carry these headers exactly; a mismatched column is
/// a load failure, not an invitation to rename.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Fire season, 1 for spring and 2 for summer.
    #[serde(rename = "Season")]
    pub season: u32,
    /// Noon temperature in degrees Celsius.
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    /// Noon relative humidity in percent.
    #[serde(rename = "RelativeHumidity")]
    pub relative_humidity: f64,
    /// Noon wind speed in km/h.
    #[serde(rename = "WindSpeed")]
    pub wind_speed: f64,
    /// Wind direction in degrees.
    #[serde(rename = "WindDirection")]
    pub wind_direction: f64,
    /// Daily precipitation in mm.
    #[serde(rename = "Precipitation")]
    pub precipitation: f64,
    /// Fine fuel moisture code.
    #[serde(rename = "FineFuelMoistureCode")]
    pub ffmc: f64,
    /// Duff moisture code.
    #[serde(rename = "DuffMoistureCode")]
    pub dmc: f64,
    /// Drought code.
    #[serde(rename = "DroughtCode")]
    pub dc: f64,
    /// Initial spread index.
    #[serde(rename = "InitialSpreadIndex")]
    pub isi: f64,
    /// Buildup index.
    #[serde(rename = "BuildupIndex")]
    pub bui: f64,
    /// Fire weather index.
    #[serde(rename = "FireWeatherIndex")]
    pub fwi: f64,
}

/// One simulated fire from the output statistics sheet.  The engine writes
/// more columns; only the burned area feeds the calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireStat {
    /// Burned area in hectares.
    #[serde(rename = "Area")]
    pub area: f64,
}

/// Run control sheet: one row holding the iteration count.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunControl {
    #[serde(rename = "MaximumIteration")]
    maximum_iteration: u32,
}

/// Reference row of the burn probability output sheet.
#[derive(Debug, Deserialize)]
struct BurnProbabilityRef {
    #[serde(rename = "FileName")]
    file_name: String,
}

/// Harvest of one engine run.
#[derive(Debug)]
pub struct RunOutput {
    /// Burn probability raster produced by the run, when the engine
    /// materializes one.
    pub burn_probability: Option<PathBuf>,
    /// Per-fire statistics for the run.
    pub fire_stats: Vec<FireStat>,
}

/// A configurable, runnable scenario.  The calibration flow rewrites every
/// table it sets on each pass, so implementations may treat setters as
/// whole-sheet replacement.
pub trait Scenario {
    /// Replace the landscape raster sheet.
    fn set_landscape(&mut self, rasters: &LandscapeRasters) -> Result<(), CalError>;
    /// Replace the probabilistic ignition location sheet.  An empty slice
    /// clears the sheet and the engine falls back to non-spatial ignition.
    fn set_ignition_grids(&mut self, grids: &[IgnitionGrid]) -> Result<(), CalError>;
    /// Replace the weather stream sheet.
    fn set_weather(&mut self, stream: &[WeatherRecord]) -> Result<(), CalError>;
    /// Replace the shared distribution value sheet (SED and Igns rows).
    fn set_distributions(&mut self, rows: &[DistRow]) -> Result<(), CalError>;
    /// Set the run control iteration count.
    fn set_iterations(&mut self, iterations: u32) -> Result<(), CalError>;
    /// Execute the scenario, blocking until the engine finishes.  `jobs` is
    /// passed through to the engine's internal worker pool.
    fn run(&mut self, jobs: usize) -> Result<RunOutput, CalError>;
}

/// Connection to an installed engine, addressed through its console
/// executable.  Passed explicitly to whoever needs a scenario; there is no
/// process-wide session.
#[derive(Debug, Clone)]
pub struct ConsoleSession {
    console: PathBuf,
}

impl ConsoleSession {
    /// Point the session at an engine install directory.
    pub fn new(install: &Path) -> Self {
        ConsoleSession {
            console: install.join("SyncroSim.Console.exe"),
        }
    }

    /// Open a scenario by library path and scenario id.
    pub fn scenario(&self, library: &Path, sid: u32) -> Result<ConsoleScenario, CalError> {
        let work = std::env::temp_dir().join(format!("sedtune_sid{}", sid));
        std::fs::create_dir_all(&work)?;
        Ok(ConsoleScenario {
            console: self.console.clone(),
            library: library.to_path_buf(),
            sid,
            work,
        })
    }
}

/// A scenario inside an engine library, driven over the console interface.
/// Datasheets round-trip through csv files in a scratch directory.
#[derive(Debug, Clone)]
pub struct ConsoleScenario {
    console: PathBuf,
    library: PathBuf,
    sid: u32,
    work: PathBuf,
}

impl ConsoleScenario {
    fn invoke(&self, args: &[String]) -> Result<(), CalError> {
        let out = Command::new(&self.console).args(args).output()?;
        if !out.status.success() {
            log::error!(
                "engine console {:?} failed: {}",
                args.first(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
            return Err(CalError::EngineError);
        }
        Ok(())
    }

    fn import_file(&self, sheet: &str, file: &Path) -> Result<(), CalError> {
        self.invoke(&[
            "--import".to_string(),
            format!("--lib={}", self.library.display()),
            format!("--sid={}", self.sid),
            format!("--sheet={}", sheet),
            format!("--file={}", file.display()),
        ])
    }

    fn import<T: Serialize>(&self, sheet: &str, rows: &[T]) -> Result<(), CalError> {
        let file = self.work.join(format!("{}.csv", sheet));
        utils::record(rows, &file)?;
        self.import_file(sheet, &file)
    }

    fn export(&self, sheet: &str) -> Result<PathBuf, CalError> {
        let file = self.work.join(format!("{}_out.csv", sheet));
        self.invoke(&[
            "--export".to_string(),
            format!("--lib={}", self.library.display()),
            format!("--sid={}", self.sid),
            format!("--sheet={}", sheet),
            format!("--file={}", file.display()),
        ])?;
        Ok(file)
    }

    /// Engine output lands under `<library>.temp/summary`.
    fn summary_path(&self, file_name: &str) -> PathBuf {
        PathBuf::from(format!("{}.temp", self.library.display()))
            .join("summary")
            .join(file_name)
    }
}

impl Scenario for ConsoleScenario {
    fn set_landscape(&mut self, rasters: &LandscapeRasters) -> Result<(), CalError> {
        self.import("burnP3Plus_LandscapeRasters", &[rasters.clone()])
    }

    fn set_ignition_grids(&mut self, grids: &[IgnitionGrid]) -> Result<(), CalError> {
        let sheet = "burnP3Plus_ProbabilisticIgnitionLocation";
        if grids.is_empty() {
            // header-only csv clears the sheet
            let file = self.work.join(format!("{}.csv", sheet));
            let mut wtr = csv::Writer::from_path(&file)?;
            wtr.write_record(&["Season", "Cause", "IgnitionGridFileName"])?;
            wtr.flush()?;
            self.import_file(sheet, &file)
        } else {
            self.import(sheet, grids)
        }
    }

    fn set_weather(&mut self, stream: &[WeatherRecord]) -> Result<(), CalError> {
        self.import("burnP3Plus_WeatherStream", stream)
    }

    fn set_distributions(&mut self, rows: &[DistRow]) -> Result<(), CalError> {
        self.import("burnP3Plus_DistributionValue", rows)
    }

    fn set_iterations(&mut self, iterations: u32) -> Result<(), CalError> {
        let rc = RunControl {
            maximum_iteration: iterations,
        };
        self.import("burnP3Plus_RunControl", &[rc])
    }

    fn run(&mut self, jobs: usize) -> Result<RunOutput, CalError> {
        self.invoke(&[
            "--run".to_string(),
            format!("--lib={}", self.library.display()),
            format!("--sid={}", self.sid),
            format!("--jobs={}", jobs),
        ])?;
        let stats_file = self.export("burnP3Plus_OutputFireStatistic")?;
        let fire_stats: Vec<FireStat> = utils::read_csv(&stats_file)?;
        let bp_file = self.export("burnP3Plus_OutputBurnProbability")?;
        let refs: Vec<BurnProbabilityRef> = utils::read_csv(&bp_file)?;
        let burn_probability = refs.first().map(|r| self.summary_path(&r.file_name));
        Ok(RunOutput {
            burn_probability,
            fire_stats,
        })
    }
}

/// In-process stand-in for the engine.  Mean fire size responds
/// monotonically to the configured SED mean, which is all the calibration
/// loop needs: per iteration the ignition count is Poisson and each fire
/// size is log-normal with mean `hectares_per_day * sed_mean`.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    hectares_per_day: f64,
    dispersion: f64,
    dists: Vec<DistRow>,
    iterations: u32,
}

impl SyntheticScenario {
    /// A synthetic landscape where one spread day burns `hectares_per_day`
    /// on average and fire sizes scatter with log-sd `dispersion`.
    pub fn new(hectares_per_day: f64, dispersion: f64) -> Self {
        SyntheticScenario {
            hectares_per_day,
            dispersion,
            dists: Vec::new(),
            iterations: 1,
        }
    }

    fn dist_mean(&self, name: &str) -> Option<f64> {
        let pairs: Vec<(f64, f64)> = self
            .dists
            .iter()
            .filter(|r| r.name == name)
            .map(|r| (r.value, r.relative_frequency))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(utils::weighted_mean(&pairs))
        }
    }
}

impl Scenario for SyntheticScenario {
    fn set_landscape(&mut self, _rasters: &LandscapeRasters) -> Result<(), CalError> {
        Ok(())
    }

    fn set_ignition_grids(&mut self, _grids: &[IgnitionGrid]) -> Result<(), CalError> {
        Ok(())
    }

    fn set_weather(&mut self, _stream: &[WeatherRecord]) -> Result<(), CalError> {
        Ok(())
    }

    fn set_distributions(&mut self, rows: &[DistRow]) -> Result<(), CalError> {
        self.dists = rows.to_vec();
        Ok(())
    }

    fn set_iterations(&mut self, iterations: u32) -> Result<(), CalError> {
        self.iterations = iterations;
        Ok(())
    }

    fn run(&mut self, _jobs: usize) -> Result<RunOutput, CalError> {
        let sed_mu = self.dist_mean("SED").ok_or(CalError::EngineError)?;
        let ign_mu = self.dist_mean("Igns").ok_or(CalError::EngineError)?;
        let mean_size = self.hectares_per_day * sed_mu;
        let sigma = self.dispersion;
        let sizes = LogNormal::new(mean_size.ln() - sigma * sigma / 2.0, sigma)
            .map_err(|_| CalError::EngineError)?;
        let starts = Poisson::new(ign_mu).map_err(|_| CalError::EngineError)?;
        let fire_stats: Vec<FireStat> = (0..self.iterations)
            .into_par_iter()
            .flat_map(|_| {
                let mut rng = thread_rng();
                let n = starts.sample(&mut rng) as usize;
                (0..n)
                    .map(|_| FireStat {
                        area: sizes.sample(&mut rng),
                    })
                    .collect::<Vec<FireStat>>()
            })
            .collect();
        Ok(RunOutput {
            burn_probability: None,
            fire_stats,
        })
    }
}
