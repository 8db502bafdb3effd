//! Per-region scenario setup and execution.
//!
//! The reference store is a read-only share of per-region inputs laid out by
//! NTS sheet code; the results store is a local directory the runner writes
//! burn probability copies and fire statistics into.  [setup_scen] rewrites
//! the five configuration sheets on a scenario, [init_run] executes it and
//! harvests the outputs.
use crate::dist::{DistName, DistRow};
use crate::engine::{Cause, IgnitionGrid, LandscapeRasters, Scenario, WeatherRecord};
use crate::errors::CalError;
use crate::utils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One row of a per-region ignition distribution csv.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnRow {
    /// Fire starts per simulated iteration.
    pub ign_per_it: f64,
    /// Percent of iterations with this count.
    pub pct: f64,
}

/// One row of a per-region baseline SED distribution csv.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SedRow {
    /// Days of active spread.
    pub sp_ev_days: f64,
    /// Percent of fires with this duration.
    pub pct: f64,
}

/// Mean fire starts per iteration implied by an ignition table.
pub fn mean_ignitions(rows: &[IgnRow]) -> f64 {
    rows.iter().map(|x| x.ign_per_it * x.pct / 100.0).sum()
}

/// Convert an ignition table to engine distribution rows.
pub fn ignition_rows(rows: &[IgnRow]) -> Vec<DistRow> {
    rows.iter()
        .map(|x| DistRow::new(DistName::Igns, x.ign_per_it, x.pct))
        .collect()
}

/// Convert a baseline SED table to engine distribution rows.
pub fn sed_rows(rows: &[SedRow]) -> Vec<DistRow> {
    rows.iter()
        .map(|x| DistRow::new(DistName::Sed, x.sp_ev_days, x.pct))
        .collect()
}

/// Read-only store of per-region reference inputs, mounted from the network
/// share.
#[derive(Debug, Clone)]
pub struct RegionStore {
    root: PathBuf,
}

impl RegionStore {
    /// Root of the working-data directory on the share.
    pub fn new(root: &Path) -> Self {
        RegionStore {
            root: root.to_path_buf(),
        }
    }

    fn sheet_dir(&self, code: &str) -> PathBuf {
        self.root.join(format!("NTS_SNRC_{}", code))
    }

    /// Path to the fuel raster for a region.  May not exist when the sheet
    /// is open water or Arctic.
    pub fn fuel_raster(&self, code: &str) -> PathBuf {
        self.sheet_dir(code)
            .join(format!("Fuel_NTS_SNRC_{}.tif", code))
    }

    /// Path to the elevation raster for a region.
    pub fn dem_raster(&self, code: &str) -> PathBuf {
        self.sheet_dir(code)
            .join(format!("DEM_NTS_SNRC_{}.tif", code))
    }

    /// The four probabilistic ignition grids for a region, keyed by season
    /// and cause.  Paths are returned whether or not the files exist.
    pub fn ignition_grids(&self, code: &str) -> Vec<IgnitionGrid> {
        let keys = [
            ("H_Spring_", 1, Cause::Human),
            ("H_Summer_", 2, Cause::Human),
            ("L_Spring_", 1, Cause::Lightning),
            ("L_Summer_", 2, Cause::Lightning),
        ];
        keys.iter()
            .map(|(pre, season, cause)| IgnitionGrid {
                season: *season,
                cause: *cause,
                path: self
                    .sheet_dir(code)
                    .join(format!("{}NTS_SNRC_{}.tif", pre, code)),
            })
            .collect()
    }

    /// Load the weather stream for a region.  Headers must match the
    /// engine's recognized field names.
    pub fn weather(&self, code: &str) -> Result<Vec<WeatherRecord>, CalError> {
        utils::read_csv(
            &self
                .sheet_dir(code)
                .join(format!("FWI_NTS_SNRC_{}.csv", code)),
        )
    }

    /// Load the ignition distribution for a region.
    pub fn ignition_dist(&self, code: &str) -> Result<Vec<IgnRow>, CalError> {
        utils::read_csv(&self.root.join("ign_dist").join(format!("ign_dist_{}.csv", code)))
    }

    /// Load the baseline SED distribution for a region.
    pub fn sed_dist(&self, code: &str) -> Result<Vec<SedRow>, CalError> {
        utils::read_csv(&self.root.join("sed_dist").join(format!("sed_dist_{}.csv", code)))
    }
}

/// Local directory the runner writes outputs into.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    root: PathBuf,
}

impl ResultsStore {
    /// Create the results layout under `root`.
    pub fn new(root: &Path) -> Result<Self, CalError> {
        std::fs::create_dir_all(root.join("BP_maps"))?;
        std::fs::create_dir_all(root.join("Stats"))?;
        Ok(ResultsStore {
            root: root.to_path_buf(),
        })
    }

    /// Destination for the burn probability copy of an `it_num` run.
    pub fn bp_path(&self, it_num: u32) -> PathBuf {
        self.root.join("BP_maps").join(format!("BP_it{}.tif", it_num))
    }

    /// Destination for the fire statistics of a region run.
    pub fn stats_path(&self, code: &str, it_num: u32) -> PathBuf {
        self.root
            .join("Stats")
            .join(format!("FireStats_{}_it{}.csv", code, it_num))
    }

    /// Destination for the tuned SED table written by the ecozone sweep.
    pub fn tuned_path(&self) -> PathBuf {
        self.root.join("tuned_sed.csv")
    }
}

/// Why a region was skipped rather than configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No fuel raster on the share; the sheet has no burnable land.
    NoFuelMap,
    /// Mean ignition count is zero; no fire activity expected.
    NoIgnitions,
}

/// Outcome of configuring a scenario for a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setup {
    /// Region cannot run; the sweep moves on.
    Skip(SkipReason),
    /// Scenario is ready to run.
    Configured {
        /// Factor to apply to burn probability outputs after the run.  Equal
        /// to the true mean ignition count when that mean is below one (the
        /// engine cannot accept sub-unit ignition counts natively), and
        /// exactly one otherwise.
        ign_rescaling: f64,
    },
}

/// Rewrite the five configuration sheets on `scen` from the region's
/// reference files.
///
/// The ignition distribution drives three cases: a mean count of zero skips
/// the region, a mean in (0, 1) substitutes a degenerate single-start
/// distribution and reports the true mean as the rescaling factor, and a
/// mean of one or more loads the table as-is with a factor of one.
pub fn setup_scen<S: Scenario>(
    store: &RegionStore,
    scen: &mut S,
    code: &str,
) -> Result<Setup, CalError> {
    let fuel = store.fuel_raster(code);
    if !fuel.is_file() {
        log::info!("No fuel map for sheet {}. Moving to next NTS sheet.", code);
        return Ok(Setup::Skip(SkipReason::NoFuelMap));
    }
    scen.set_landscape(&LandscapeRasters {
        elevation: store.dem_raster(code),
        fuel,
    })?;

    let ign_table = store.ignition_dist(code)?;
    let ign_num = mean_ignitions(&ign_table);
    let (ign_dist, ign_rescaling) = if ign_num == 0.0 {
        log::info!("No ignitions for sheet {}.", code);
        return Ok(Setup::Skip(SkipReason::NoIgnitions));
    } else if ign_num >= 1.0 {
        (ignition_rows(&ign_table), 1.0)
    } else {
        // run with a single start every iteration, rescale afterwards
        (vec![DistRow::new(DistName::Igns, 1.0, 100.0)], ign_num)
    };

    let grids = store.ignition_grids(code);
    if grids.iter().all(|g| g.path.is_file()) {
        scen.set_ignition_grids(&grids)?;
    } else {
        // engine falls back to non-spatial ignition
        scen.set_ignition_grids(&[])?;
    }

    let weather = store.weather(code)?;
    scen.set_weather(&weather)?;

    // SED and Igns share one sheet, keyed by the Name column
    let mut dist = sed_rows(&store.sed_dist(code)?);
    dist.extend(ign_dist);
    scen.set_distributions(&dist)?;
    log::info!("Setup complete for NTS sheet {}.", code);

    Ok(Setup::Configured { ign_rescaling })
}

/// Artifacts of one engine run.
#[derive(Debug)]
pub struct RunArtifacts {
    /// Local copy of the burn probability raster, when the engine produced
    /// one.
    pub burn_probability: Option<PathBuf>,
    /// Fire statistics csv for the run.
    pub stats_path: PathBuf,
    /// Iteration count actually run.
    pub iterations: u32,
}

fn jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .saturating_sub(1)
        .max(1)
}

/// Run `scen` for `it_num` iterations and harvest the outputs into the
/// results store.  Engine failure is fatal to the call; the runner never
/// retries.
pub fn init_run<S: Scenario>(
    scen: &mut S,
    code: &str,
    it_num: u32,
    results: &ResultsStore,
) -> Result<RunArtifacts, CalError> {
    scen.set_iterations(it_num)?;
    log::info!("Running NTS sheet {} for {} iterations.", code, it_num);
    let start = Instant::now();
    let out = scen.run(jobs())?;
    let mut burn_probability = None;
    if let Some(src) = out.burn_probability {
        let dst = results.bp_path(it_num);
        std::fs::copy(&src, &dst)?;
        burn_probability = Some(dst);
    }
    let stats_path = results.stats_path(code, it_num);
    utils::record(&out.fire_stats, &stats_path)?;
    log::info!(
        "Done running {} iterations in {:.1} min.",
        it_num,
        start.elapsed().as_secs_f64() / 60.0
    );
    Ok(RunArtifacts {
        burn_probability,
        stats_path,
        iterations: it_num,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FireStat, RunOutput};

    /// Recording stub for the engine seam.
    #[derive(Debug, Default)]
    struct RecordingScenario {
        landscape: Option<LandscapeRasters>,
        grids: Option<Vec<IgnitionGrid>>,
        weather: usize,
        dists: Vec<DistRow>,
        iterations: u32,
    }

    impl Scenario for RecordingScenario {
        fn set_landscape(&mut self, rasters: &LandscapeRasters) -> Result<(), CalError> {
            self.landscape = Some(rasters.clone());
            Ok(())
        }

        fn set_ignition_grids(&mut self, grids: &[IgnitionGrid]) -> Result<(), CalError> {
            self.grids = Some(grids.to_vec());
            Ok(())
        }

        fn set_weather(&mut self, stream: &[WeatherRecord]) -> Result<(), CalError> {
            self.weather = stream.len();
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
            Ok(RunOutput {
                burn_probability: None,
                fire_stats: vec![FireStat { area: 100.0 }, FireStat { area: 300.0 }],
            })
        }
    }

    const WEATHER_HEADER: &str = "Season,Temperature,RelativeHumidity,WindSpeed,WindDirection,\
Precipitation,FineFuelMoistureCode,DuffMoistureCode,DroughtCode,InitialSpreadIndex,\
BuildupIndex,FireWeatherIndex";

    /// Lay out a minimal reference store for one region.
    fn fixture(name: &str, code: &str, igns: &[(f64, f64)], fuel: bool, grids: bool) -> RegionStore {
        let root = std::env::temp_dir().join(format!("sedtune_scen_{}", name));
        let _ = std::fs::remove_dir_all(&root);
        let sheet = root.join(format!("NTS_SNRC_{}", code));
        std::fs::create_dir_all(&sheet).unwrap();
        std::fs::create_dir_all(root.join("ign_dist")).unwrap();
        std::fs::create_dir_all(root.join("sed_dist")).unwrap();
        if fuel {
            std::fs::write(sheet.join(format!("Fuel_NTS_SNRC_{}.tif", code)), b"").unwrap();
        }
        std::fs::write(sheet.join(format!("DEM_NTS_SNRC_{}.tif", code)), b"").unwrap();
        if grids {
            for pre in &["H_Spring_", "H_Summer_", "L_Spring_", "L_Summer_"] {
                std::fs::write(sheet.join(format!("{}NTS_SNRC_{}.tif", pre, code)), b"").unwrap();
            }
        }
        std::fs::write(
            sheet.join(format!("FWI_NTS_SNRC_{}.csv", code)),
            format!("{}\n1,21.5,40.0,12.0,270.0,0.0,88.0,40.0,300.0,8.0,60.0,19.0\n", WEATHER_HEADER),
        )
        .unwrap();
        let mut ign = String::from("ign_per_it,pct\n");
        for (v, p) in igns {
            ign.push_str(&format!("{},{}\n", v, p));
        }
        std::fs::write(root.join("ign_dist").join(format!("ign_dist_{}.csv", code)), ign).unwrap();
        std::fs::write(
            root.join("sed_dist").join(format!("sed_dist_{}.csv", code)),
            "sp_ev_days,pct\n1,60\n2,40\n",
        )
        .unwrap();
        RegionStore::new(&root)
    }

    #[test]
    fn missing_fuel_map_skips_region() {
        let store = fixture("nofuel", "092K", &[(1.0, 100.0)], false, false);
        let mut scen = RecordingScenario::default();
        let setup = setup_scen(&store, &mut scen, "092K").unwrap();
        assert_eq!(setup, Setup::Skip(SkipReason::NoFuelMap));
        assert!(scen.landscape.is_none());
    }

    #[test]
    fn zero_ignitions_skips_region() {
        let store = fixture("zeroign", "092K", &[(0.0, 100.0)], true, false);
        let mut scen = RecordingScenario::default();
        let setup = setup_scen(&store, &mut scen, "092K").unwrap();
        assert_eq!(setup, Setup::Skip(SkipReason::NoIgnitions));
    }

    #[test]
    fn sub_unit_ignitions_rescale() {
        // mean = 1 * 40% = 0.4
        let store = fixture("subunit", "092K", &[(1.0, 40.0), (0.0, 60.0)], true, false);
        let mut scen = RecordingScenario::default();
        let setup = setup_scen(&store, &mut scen, "092K").unwrap();
        match setup {
            Setup::Configured { ign_rescaling } => assert!((ign_rescaling - 0.4).abs() < 1e-12),
            _ => panic!("expected configured"),
        }
        let igns: Vec<&DistRow> = scen.dists.iter().filter(|r| r.name == "Igns").collect();
        assert_eq!(igns.len(), 1);
        assert_eq!(igns[0].value, 1.0);
        assert_eq!(igns[0].relative_frequency, 100.0);
    }

    #[test]
    fn unit_or_more_ignitions_pass_through() {
        let store = fixture("normal", "092K", &[(1.0, 50.0), (3.0, 50.0)], true, false);
        let mut scen = RecordingScenario::default();
        let setup = setup_scen(&store, &mut scen, "092K").unwrap();
        assert_eq!(setup, Setup::Configured { ign_rescaling: 1.0 });
        let igns: Vec<&DistRow> = scen.dists.iter().filter(|r| r.name == "Igns").collect();
        assert_eq!(igns.len(), 2);
        // SED baseline rows ride along in the same sheet
        assert!(scen.dists.iter().any(|r| r.name == "SED"));
        assert_eq!(scen.weather, 1);
    }

    #[test]
    fn incomplete_grids_clear_the_sheet() {
        let store = fixture("nogrids", "092K", &[(2.0, 100.0)], true, false);
        let mut scen = RecordingScenario::default();
        setup_scen(&store, &mut scen, "092K").unwrap();
        assert_eq!(scen.grids.as_ref().map(|g| g.len()), Some(0));

        let store = fixture("grids", "103I", &[(2.0, 100.0)], true, true);
        let mut scen = RecordingScenario::default();
        setup_scen(&store, &mut scen, "103I").unwrap();
        assert_eq!(scen.grids.as_ref().map(|g| g.len()), Some(4));
    }

    #[test]
    fn weather_schema_mismatch_fails() {
        let store = fixture("badweather", "092K", &[(2.0, 100.0)], true, false);
        // clobber the weather stream with legacy column names
        let sheet = store.sheet_dir("092K");
        std::fs::write(
            sheet.join("FWI_NTS_SNRC_092K.csv"),
            "season,temp,rh,ws,wd,prec,ffmc,dmc,dc,isi,bui,fwi\n1,21.5,40,12,270,0,88,40,300,8,60,19\n",
        )
        .unwrap();
        let mut scen = RecordingScenario::default();
        assert!(setup_scen(&store, &mut scen, "092K").is_err());
    }

    #[test]
    fn run_saves_statistics() {
        let root = std::env::temp_dir().join("sedtune_scen_run");
        let _ = std::fs::remove_dir_all(&root);
        let results = ResultsStore::new(&root).unwrap();
        let mut scen = RecordingScenario::default();
        let art = init_run(&mut scen, "092K", 500, &results).unwrap();
        assert_eq!(art.iterations, 500);
        assert_eq!(scen.iterations, 500);
        assert!(art.burn_probability.is_none());
        let stats: Vec<FireStat> = utils::read_csv(&art.stats_path).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[1].area, 300.0);
    }
}
