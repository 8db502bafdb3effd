//! Entry point for the full ecozone sweep against an installed engine.
//!
//! No flags: paths come from the environment (`SEDTUNE_DATA`,
//! `SEDTUNE_RESULTS`, `SEDTUNE_ENGINE`, `SEDTUNE_LIB`, `SEDTUNE_SHARE`)
//! with defaults matching the production layout.
use sedtune::prelude::*;
use std::path::PathBuf;

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Mount the reference share before touching the region store.
#[cfg(windows)]
fn mount_share() {
    if let Ok(unc) = std::env::var("SEDTUNE_SHARE") {
        let status = std::process::Command::new("net")
            .args(&["use", "y:", &unc])
            .status();
        match status {
            Ok(s) if s.success() => log::info!("Mounted {} as y:.", unc),
            _ => log::warn!("Could not mount {}; continuing with existing drives.", unc),
        }
    }
}

#[cfg(not(windows))]
fn mount_share() {
    log::info!("Assuming the reference share is already mounted.");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    mount_share();

    let store = RegionStore::new(&env_path("SEDTUNE_DATA", "Y:/Working_data"));
    let results = ResultsStore::new(&env_path("SEDTUNE_RESULTS", "results"))?;
    let session = ConsoleSession::new(&env_path("SEDTUNE_ENGINE", "C:/Program Files/SyncroSim"));
    let mut scen = session.scenario(&env_path("SEDTUNE_LIB", "NTS_template.ssim"), 1)?;

    let tuned = run_ezs(&store, &results, &mut scen)?;
    for t in &tuned {
        match t.outcome {
            Outcome::Converged => log::info!("Ecozone {}: SED {:.4}.", t.ecozone, t.sed),
            Outcome::FloorHalted => log::warn!(
                "Ecozone {}: halted at the SED floor ({:.1}); target unreachable.",
                t.ecozone,
                t.sed
            ),
        }
    }
    log::info!("Tuned SEDs written to {}.", results.tuned_path().display());
    Ok(())
}
