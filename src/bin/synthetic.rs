//! Dry-run calibration against the in-process synthetic engine.
//!
//! Scaffolds a scratch reference store, calibrates one region group and
//! writes the convergence trajectory to `convergence.png`.  Useful for
//! checking the loop without an engine install or the network share.
use sedtune::prelude::*;
use std::path::Path;

const WEATHER_HEADER: &str = "Season,Temperature,RelativeHumidity,WindSpeed,WindDirection,\
Precipitation,FineFuelMoistureCode,DuffMoistureCode,DroughtCode,InitialSpreadIndex,\
BuildupIndex,FireWeatherIndex";

/// Lay out reference files for the scratch regions.
fn scaffold(root: &Path, codes: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(root.join("ign_dist"))?;
    std::fs::create_dir_all(root.join("sed_dist"))?;
    for code in codes {
        let sheet = root.join(format!("NTS_SNRC_{}", code));
        std::fs::create_dir_all(&sheet)?;
        std::fs::write(sheet.join(format!("Fuel_NTS_SNRC_{}.tif", code)), b"")?;
        std::fs::write(sheet.join(format!("DEM_NTS_SNRC_{}.tif", code)), b"")?;
        std::fs::write(
            sheet.join(format!("FWI_NTS_SNRC_{}.csv", code)),
            format!(
                "{}\n1,21.5,40.0,12.0,270.0,0.0,88.0,40.0,300.0,8.0,60.0,19.0\n",
                WEATHER_HEADER
            ),
        )?;
        std::fs::write(
            root.join("ign_dist").join(format!("ign_dist_{}.csv", code)),
            "ign_per_it,pct\n1,50\n3,50\n",
        )?;
        std::fs::write(
            root.join("sed_dist").join(format!("sed_dist_{}.csv", code)),
            "sp_ev_days,pct\n1,60\n2,40\n",
        )?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let root = std::env::temp_dir().join("sedtune_synthetic");
    let _ = std::fs::remove_dir_all(&root);
    let codes = ["A", "B"];
    scaffold(&root.join("data"), &codes)?;
    let store = RegionStore::new(&root.join("data"));
    let results = ResultsStore::new(&root.join("results"))?;

    // 900 ha per spread day puts a 2800 ha target near a mean SED of 3
    let mut scen = SyntheticScenario::new(900.0, 0.4);
    let target = 2800.0;
    let fit = run_test_nts(&store, &results, &mut scen, &codes, 2.0, target)?;

    match fit.outcome {
        Outcome::Converged => log::info!(
            "Converged to SED {:.4} in {} rounds.",
            fit.sed_mu,
            fit.steps.len()
        ),
        Outcome::FloorHalted => log::warn!("Halted at the SED floor after {} rounds.", fit.steps.len()),
    }
    plot::convergence(&fit.steps, target, "convergence.png")?;
    log::info!("Trajectory written to convergence.png.");
    Ok(())
}
