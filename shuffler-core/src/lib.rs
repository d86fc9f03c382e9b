use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod catalog;
mod error;
pub mod guarantees;
pub mod lines;
pub mod ranking;
pub mod regions;
pub mod rewrite;
pub mod shuffle;
pub mod versions;

pub use catalog::{Catalog, RankedRegion, RegionAmounts, ResourceDefinition};
pub use error::{Result, ShufflerError};
pub use regions::{RegionIndex, RegionInfo};
pub use shuffle::ShuffleReport;

/// Position of a region in the index; every per-region array uses it.
pub type RegionId = usize;

pub const DEFAULT_CATALOG_FILE: &str = "resources.ini";

/// The three data directories the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePaths {
    pub state_regions: PathBuf,
    pub history_buildings: PathBuf,
    pub company_types: PathBuf,
}

impl GamePaths {
    /// Standard layout below a game or mod folder.
    pub fn from_game_root(root: &Path) -> Self {
        let game = root.join("game");
        Self {
            state_regions: game.join("map_data").join("state_regions"),
            history_buildings: game.join("common").join("history").join("buildings"),
            company_types: game.join("common").join("company_types"),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = [
            &self.state_regions,
            &self.history_buildings,
            &self.company_types,
        ]
        .into_iter()
        .filter(|dir| !dir.is_dir())
        .map(|dir| dir.display().to_string())
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ShufflerError::Config(format!(
                "not a game folder, missing: {}",
                missing.join(", ")
            )))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShufflerSettings {
    pub game_path: PathBuf,
    pub state_regions_path: Option<PathBuf>,
    pub history_buildings_path: Option<PathBuf>,
    pub company_types_path: Option<PathBuf>,
    pub catalog_path: PathBuf,
    pub seed: Option<u64>,
    pub enabled_resources: Vec<String>,
    pub shuffle_all: bool,
    pub dry_run: bool,
    pub versions_dir: Option<PathBuf>,
    pub version_name: Option<String>,
}

impl Default for ShufflerSettings {
    fn default() -> Self {
        Self {
            game_path: PathBuf::new(),
            state_regions_path: None,
            history_buildings_path: None,
            company_types_path: None,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_FILE),
            seed: None,
            enabled_resources: Vec::new(),
            shuffle_all: false,
            dry_run: false,
            versions_dir: None,
            version_name: None,
        }
    }
}

impl ShufflerSettings {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Game-root layout, with any explicit directory taking precedence.
    pub fn game_paths(&self) -> GamePaths {
        let defaults = GamePaths::from_game_root(&self.game_path);
        GamePaths {
            state_regions: self
                .state_regions_path
                .clone()
                .unwrap_or(defaults.state_regions),
            history_buildings: self
                .history_buildings_path
                .clone()
                .unwrap_or(defaults.history_buildings),
            company_types: self
                .company_types_path
                .clone()
                .unwrap_or(defaults.company_types),
        }
    }
}

/// Everything the pipeline knows about one data folder. Rebuilt from scratch
/// on every load.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub catalog: Catalog,
    pub index: RegionIndex,
    pub regions: Vec<RegionInfo>,
}

impl Dataset {
    /// Index and extract the region files, then rank.
    pub fn load(paths: &GamePaths, mut catalog: Catalog) -> Result<Self> {
        let index = RegionIndex::build(&paths.state_regions)?;
        if index.is_empty() {
            return Err(ShufflerError::NoRegions(paths.state_regions.clone()));
        }

        catalog.reset(index.len());
        let regions = regions::extract_regions(&paths.state_regions, &index, &mut catalog)?;
        ranking::rank_regions(&mut catalog);

        Ok(Self {
            catalog,
            index,
            regions,
        })
    }

    pub fn collect_guarantees(&mut self, paths: &GamePaths) -> Result<()> {
        guarantees::collect_history(&paths.history_buildings, &self.index, &mut self.catalog)?;
        guarantees::collect_companies(&paths.company_types, &self.index, &mut self.catalog)?;
        Ok(())
    }

    /// Shuffle in memory, then bring totals and rankings up to date.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ShuffleReport {
        let report = shuffle::shuffle_resources(&mut self.catalog, &self.index, rng);
        shuffle::refresh_totals(&mut self.catalog, &mut self.regions);
        ranking::rank_regions(&mut self.catalog);
        report
    }

    /// Trim the region files and write this dataset's blocks back into them.
    pub fn apply(&self, paths: &GamePaths) -> Result<usize> {
        rewrite::rewrite_region_files(&paths.state_regions, &self.catalog, &self.index, &self.regions)
    }

    pub fn region_name(&self, id: RegionId) -> Option<&str> {
        self.index.name(id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    pub region_count: usize,
    pub report: ShuffleReport,
    /// Lines in the rewritten region files; zero on a dry run.
    pub lines_written: usize,
    pub version_artifact: Option<PathBuf>,
}

/// Load, shuffle and (unless `dry_run`) rewrite the region files.
///
/// Every check that can fail the run happens before the first file is
/// modified.
pub fn run(settings: ShufflerSettings) -> Result<RunSummary> {
    let paths = settings.game_paths();
    paths.validate()?;

    let mut catalog = Catalog::load(&settings.catalog_path)?;
    if settings.shuffle_all {
        catalog.enable_all();
    } else {
        for name in catalog.set_enabled(&settings.enabled_resources) {
            warn!("Unknown resource '{name}' ignored");
        }
    }

    let mut dataset = Dataset::load(&paths, catalog)?;
    dataset.collect_guarantees(&paths)?;

    let enabled = dataset.catalog.enabled_names();
    if enabled.is_empty() {
        warn!("No resources enabled, region files will keep their distribution");
    } else {
        info!("Shuffling: {}", enabled.join(" "));
    }

    let seed = settings.seed.unwrap_or_else(|| rand::thread_rng().gen());
    info!("Shuffle seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    let report = dataset.shuffle(&mut rng);

    if settings.dry_run {
        info!("Dry run, region files left untouched");
        return Ok(RunSummary {
            seed,
            region_count: dataset.index.len(),
            report,
            lines_written: 0,
            version_artifact: None,
        });
    }

    let lines_written = dataset.apply(&paths)?;

    let version_artifact = match (&settings.versions_dir, &settings.version_name) {
        (Some(dir), Some(name)) => Some(versions::save_enabled_resources(dir, name, &dataset.catalog)?),
        _ => None,
    };

    Ok(RunSummary {
        seed,
        region_count: dataset.index.len(),
        report,
        lines_written,
        version_artifact,
    })
}
