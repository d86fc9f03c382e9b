use clap::{Args, Parser, Subcommand};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shuffler_core::{
    ranking::format_region_name, run, versions, Catalog, Dataset, ShufflerSettings,
    DEFAULT_CATALOG_FILE,
};

#[derive(Debug, Parser)]
#[command(name = "resource-shuffler", version, about = "Victoria 3 state-region resource shuffler")]
struct Cli {
    /// Also log per-region and per-company detail.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Shuffle resources between regions and rewrite the region files.
    Shuffle(ShuffleArgs),
    /// Show the regions holding the most of each resource.
    Rank(RankArgs),
    /// List saved versions.
    Versions {
        #[arg(long)]
        versions_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct ShuffleArgs {
    /// Game or mod folder; remembered for later runs.
    #[arg(long)]
    game: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    catalog: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Resource to shuffle; repeat for more.
    #[arg(long = "resource", value_name = "NAME")]
    resources: Vec<String>,

    /// Shuffle every resource in the catalog.
    #[arg(long, conflicts_with_all = ["resources", "from_version"])]
    all: bool,

    /// Reuse the resource selection saved with a version.
    #[arg(long, value_name = "VERSION", conflicts_with = "resources")]
    from_version: Option<String>,

    /// Save the resource selection under this version name.
    #[arg(long)]
    version_name: Option<String>,

    #[arg(long)]
    versions_dir: Option<PathBuf>,

    /// Shuffle and report without touching any file.
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Read every option from a JSON settings file instead.
    #[arg(long, value_name = "JSON", conflicts_with_all = ["game", "resources", "all", "from_version"])]
    settings: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RankArgs {
    #[arg(long)]
    game: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    catalog: PathBuf,

    /// Print JSON instead of text.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CliConfig {
    game_path: String,
    versions_dir: String,
}

fn config_path() -> Option<PathBuf> {
    let mut base = dirs::config_dir().or_else(dirs::data_dir)?;
    base.push("resource-shuffler");
    base.push("cli_config.json");
    Some(base)
}

fn load_config() -> CliConfig {
    if let Some(path) = config_path() {
        if let Ok(data) = fs::read_to_string(&path) {
            if let Ok(cfg) = serde_json::from_str::<CliConfig>(&data) {
                return cfg;
            }
        }
    }
    CliConfig::default()
}

fn save_config(cfg: &CliConfig) {
    if let Some(path) = config_path() {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(data) = serde_json::to_string_pretty(cfg) {
            let _ = fs::write(path, data);
        }
    }
}

fn default_versions_dir(cfg: &CliConfig) -> Option<PathBuf> {
    if !cfg.versions_dir.is_empty() {
        return Some(PathBuf::from(&cfg.versions_dir));
    }
    let mut base = dirs::data_dir()?;
    base.push("resource-shuffler");
    base.push("versions");
    Some(base)
}

fn resolve_game(arg: Option<PathBuf>, cfg: &CliConfig) -> Result<PathBuf, String> {
    match arg {
        Some(path) => Ok(path),
        None if !cfg.game_path.is_empty() => Ok(PathBuf::from(&cfg.game_path)),
        None => Err("no game folder given; pass --game once and it will be remembered".to_string()),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn shuffle_settings(args: ShuffleArgs, cfg: &CliConfig) -> Result<ShufflerSettings, String> {
    if let Some(path) = &args.settings {
        return ShufflerSettings::from_json_file(path).map_err(|e| e.to_string());
    }

    let game_path = resolve_game(args.game, cfg)?;
    let versions_dir = args.versions_dir.or_else(|| default_versions_dir(cfg));

    let enabled_resources = match &args.from_version {
        Some(name) => {
            let dir = versions_dir
                .as_ref()
                .ok_or_else(|| "no versions folder available".to_string())?;
            versions::load_enabled_resources(dir, name).map_err(|e| e.to_string())?
        }
        None => args.resources,
    };

    Ok(ShufflerSettings {
        game_path,
        catalog_path: args.catalog,
        seed: args.seed,
        enabled_resources,
        shuffle_all: args.all,
        dry_run: args.dry_run,
        versions_dir,
        version_name: args.version_name,
        ..Default::default()
    })
}

fn run_shuffle(args: ShuffleArgs, cfg: &mut CliConfig) -> Result<(), String> {
    let mut settings = shuffle_settings(args, cfg)?;
    let seed = settings
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen::<u64>());
    settings.seed = Some(seed);

    cfg.game_path = settings.game_path.display().to_string();
    if let Some(dir) = &settings.versions_dir {
        cfg.versions_dir = dir.display().to_string();
    }

    let summary = run(settings).map_err(|e| e.to_string())?;
    save_config(cfg);

    println!("Seed: {}", summary.seed);
    println!("Regions: {}", summary.region_count);
    println!("Resources shuffled: {}", summary.report.shuffled);
    if summary.report.pre_existing_shortfalls > 0 {
        println!(
            "Regions already short of their protected amount: {}",
            summary.report.pre_existing_shortfalls
        );
    }
    if summary.report.violations > 0 {
        println!(
            "Regions left below their protected amount: {}",
            summary.report.violations
        );
    }
    if summary.lines_written > 0 {
        println!("Region files rewritten ({} lines)", summary.lines_written);
    }
    if let Some(path) = &summary.version_artifact {
        println!("Version saved: {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct RankingRow {
    resource: String,
    regions: Vec<(String, u64)>,
}

fn run_rank(args: RankArgs, cfg: &CliConfig) -> Result<(), String> {
    let game_path = resolve_game(args.game, cfg)?;
    let settings = ShufflerSettings {
        game_path,
        ..Default::default()
    };
    let paths = settings.game_paths();
    paths.validate().map_err(|e| e.to_string())?;

    let catalog = Catalog::load(&args.catalog).map_err(|e| e.to_string())?;
    let dataset = Dataset::load(&paths, catalog).map_err(|e| e.to_string())?;

    let rows: Vec<RankingRow> = dataset
        .catalog
        .iter()
        .filter(|r| !r.is_ignored())
        .map(|r| RankingRow {
            resource: r.name.clone(),
            regions: r
                .top_regions
                .iter()
                .map(|top| {
                    let name = dataset.region_name(top.region).unwrap_or_default();
                    (format_region_name(name), top.amount)
                })
                .collect(),
        })
        .collect();

    if args.json {
        let out = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
        println!("{out}");
        return Ok(());
    }

    for row in rows {
        let regions: Vec<String> = row
            .regions
            .iter()
            .map(|(name, amount)| format!("{name} ({amount})"))
            .collect();
        println!("{:<12} {}", row.resource, regions.join(", "));
    }
    Ok(())
}

fn run_versions(versions_dir: Option<PathBuf>, cfg: &CliConfig) -> Result<(), String> {
    let dir = versions_dir
        .or_else(|| default_versions_dir(cfg))
        .ok_or_else(|| "no versions folder available".to_string())?;
    for name in versions::list_versions(&dir).map_err(|e| e.to_string())? {
        match versions::load_enabled_resources(&dir, &name) {
            Ok(resources) => println!("{name}: {}", resources.join(" ")),
            Err(_) => println!("{name}"),
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = load_config();
    let result = match cli.command {
        Command::Shuffle(args) => run_shuffle(args, &mut cfg),
        Command::Rank(args) => run_rank(args, &cfg),
        Command::Versions { versions_dir } => run_versions(versions_dir, &cfg),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repeated_resources_are_collected() {
        let cli = Cli::parse_from([
            "resource-shuffler",
            "shuffle",
            "--game",
            "/games/v3",
            "--resource",
            "gold",
            "--resource",
            "oil",
            "--seed",
            "7",
        ]);
        let Command::Shuffle(args) = cli.command else {
            panic!("expected shuffle");
        };
        let settings = shuffle_settings(args, &CliConfig::default()).unwrap();
        assert_eq!(settings.enabled_resources, ["gold", "oil"]);
        assert_eq!(settings.seed, Some(7));
        assert!(!settings.shuffle_all);
    }

    #[test]
    fn all_conflicts_with_explicit_resources() {
        let result = Cli::try_parse_from([
            "resource-shuffler",
            "shuffle",
            "--all",
            "--resource",
            "gold",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn game_falls_back_to_remembered_path() {
        let cfg = CliConfig {
            game_path: "/remembered".into(),
            versions_dir: String::new(),
        };
        assert_eq!(resolve_game(None, &cfg).unwrap(), PathBuf::from("/remembered"));
        assert!(resolve_game(None, &CliConfig::default()).is_err());
    }
}
