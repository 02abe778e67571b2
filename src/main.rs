mod avalanche;
mod config;
mod error;
mod grid;
mod output;
mod presets;
mod relax;
mod settings;
mod simulation;
mod snapshot;
mod worklist;

use clap::Parser;
use config::RunConfig;
use error::SandpileError;
use output::{AreaTail, AvalancheSink, CsvSink, LegacySink};
use presets::PresetManager;
use settings::{OutputFormat, WorklistDiscipline};
use simulation::Sandpile;
use std::io;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sandpile-simulation")]
#[command(about = "Abelian sandpile simulation recording avalanche area and volume")]
struct Args {
    // === Run Source ===
    /// Start from a named preset (see --list-presets)
    #[arg(long)]
    preset: Option<String>,

    /// Load run configuration from a JSON file
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Continue from a full-grid snapshot instead of a fresh grid
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Save the resolved configuration to a JSON file before running
    #[arg(long = "export-config")]
    export_config: Option<PathBuf>,

    /// Save the resolved settings as a user preset with this name
    #[arg(long = "save-preset")]
    save_preset: Option<String>,

    /// List built-in and user presets, then exit
    #[arg(long = "list-presets", default_value = "false")]
    list_presets: bool,

    /// Delete a user preset, then exit
    #[arg(long = "delete-preset")]
    delete_preset: Option<String>,

    // === Simulation Parameters ===
    /// Grid side length (at least 3)
    #[arg(short = 'n', long)]
    side: Option<usize>,

    /// Initial grains per cell (0-3)
    #[arg(short = 'b', long)]
    backphone: Option<u32>,

    /// Number of grains to drop
    #[arg(short = 'k', long)]
    injections: Option<u64>,

    /// Random seed
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Worklist order during relaxation (stack, queue, shuffled)
    #[arg(long)]
    discipline: Option<String>,

    /// Never schedule a site twice in the same wave
    #[arg(long, default_value = "false")]
    dedup: bool,

    /// Schedule duplicates even if the preset or config deduplicates
    #[arg(long = "no-dedup", default_value = "false", conflicts_with = "dedup")]
    no_dedup: bool,

    /// Set this many random sites critical and relax them before driving
    #[arg(long)]
    burst: Option<usize>,

    // === Output ===
    /// Avalanche record file (stdout when omitted; a file stem for legacy)
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Record format (csv, legacy)
    #[arg(long)]
    format: Option<String>,

    /// Write a full-grid snapshot here after the run
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write the sites toppled by the last avalanche here
    #[arg(long)]
    active: Option<PathBuf>,

    /// Write the area distribution (area,ccdf) of all non-trivial avalanches here
    #[arg(long)]
    ccdf: Option<PathBuf>,

    /// Print a summary of a full-grid snapshot, then exit
    #[arg(long = "inspect-grid")]
    inspect_grid: Option<PathBuf>,

    /// Print the entries of an active-site snapshot, then exit
    #[arg(long = "inspect-active")]
    inspect_active: Option<PathBuf>,
}

fn parse_discipline(s: &str) -> WorklistDiscipline {
    match s.to_lowercase().as_str() {
        "queue" | "fifo" => WorklistDiscipline::Queue,
        "shuffled" | "shuffle" | "random" => WorklistDiscipline::Shuffled,
        _ => WorklistDiscipline::Stack,
    }
}

fn parse_format(s: &str) -> OutputFormat {
    match s.to_lowercase().as_str() {
        "legacy" | "lists" => OutputFormat::Legacy,
        _ => OutputFormat::Csv,
    }
}

/// Preset or config file first, then explicit flags on top
fn resolve_config(args: &Args, presets: &PresetManager) -> Result<RunConfig, SandpileError> {
    let mut config = if let Some(path) = &args.config {
        RunConfig::load_from_file(path)?
    } else if let Some(name) = &args.preset {
        presets
            .find(name)
            .map(|p| p.to_config())
            .ok_or_else(|| SandpileError::Config(format!("unknown preset '{}'", name)))?
    } else {
        RunConfig::default()
    };

    let settings = &mut config.settings;
    if let Some(side) = args.side {
        settings.side = side;
    }
    if let Some(backphone) = args.backphone {
        settings.backphone = backphone;
    }
    if let Some(injections) = args.injections {
        settings.injections = injections;
    }
    if let Some(seed) = args.seed {
        settings.seed = seed;
    }
    if let Some(discipline) = &args.discipline {
        settings.discipline = parse_discipline(discipline);
    }
    if args.dedup {
        settings.dedup_pending = true;
    }
    if args.no_dedup {
        settings.dedup_pending = false;
    }
    if let Some(burst) = args.burst {
        config.burst = burst;
    }
    if let Some(format) = &args.format {
        config.format = parse_format(format);
    }

    config.settings.validate()?;
    if config.format == OutputFormat::Legacy && args.output.is_none() {
        return Err(SandpileError::Config(
            "legacy output needs --output to name the list files".into(),
        ));
    }
    Ok(config)
}

fn inspect(args: &Args) -> Result<bool, SandpileError> {
    if let Some(path) = &args.inspect_grid {
        let snap = snapshot::load_grid(path)?;
        let mass: u64 = snap.cells.iter().map(|&c| c as u64).sum();
        let max = snap.cells.iter().copied().max().unwrap_or(0);
        println!("side: {}", snap.side);
        println!("total grains: {}", mass);
        println!("largest cell: {}", max);
        println!("unstable sites: {}", snap.unstable.len());
        for site in &snap.unstable {
            println!("  ({}, {})", site.row, site.col);
        }
        return Ok(true);
    }
    if let Some(path) = &args.inspect_active {
        let sites = snapshot::load_active(path)?;
        println!("{}", sites.len());
        for s in &sites {
            println!("{} {} {}", s.row, s.col, s.value);
        }
        return Ok(true);
    }
    Ok(false)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if inspect(&args)? {
        return Ok(());
    }

    let mut presets = PresetManager::new();
    if args.list_presets {
        for preset in presets.all_presets() {
            println!("{:<16} {}", preset.name, preset.description);
        }
        return Ok(());
    }
    if let Some(name) = &args.delete_preset {
        presets.delete_preset(name)?;
        log::info!("preset '{}' deleted", name);
        return Ok(());
    }

    let config = resolve_config(&args, &presets)?;
    let mut sim = match &args.resume {
        Some(path) => {
            let grid = snapshot::load_grid(path)?.into_grid()?;
            log::info!("resuming from {} (side {})", path.display(), grid.side());
            Sandpile::with_grid(config.settings.clone(), grid)?
        }
        None => Sandpile::new(config.settings.clone())?,
    };
    let settings = &sim.settings;

    let mut sink: Box<dyn AvalancheSink> = match (config.format, &args.output) {
        (OutputFormat::Csv, Some(path)) => Box::new(CsvSink::create(path)?),
        (OutputFormat::Csv, None) => {
            Box::new(CsvSink::new(io::BufWriter::new(io::stdout().lock())))
        }
        (OutputFormat::Legacy, Some(stem)) => {
            Box::new(LegacySink::create(stem, settings.side, settings.injections)?)
        }
        (OutputFormat::Legacy, None) => {
            return Err(SandpileError::Config(
                "legacy output needs --output to name the list files".into(),
            )
            .into())
        }
    };

    if let Some(path) = &args.export_config {
        config.save_to_file(path)?;
        log::info!("configuration written to {}", path.display());
    }
    if let Some(name) = &args.save_preset {
        let preset = presets::Preset::new(
            name.as_str(),
            "saved from the command line",
            config.settings.clone(),
            config.burst,
        );
        let path = presets.save_preset(preset)?;
        log::info!("preset '{}' saved to {}", name, path.display());
    }

    log::info!(
        "side {}, backphone {}, {} injections, seed {}, {} worklist{}",
        settings.side,
        settings.backphone,
        settings.injections,
        settings.seed,
        settings.discipline.name(),
        if settings.dedup_pending { " (dedup)" } else { "" }
    );

    if config.burst > 0 {
        let avalanche = sim.seed_burst(config.burst)?;
        log::info!(
            "burst of {} sites relaxed: area {}, volume {}",
            config.burst,
            avalanche.area,
            avalanche.volume
        );
    }

    let summary = match &args.ccdf {
        Some(path) => {
            let mut tail = AreaTail::new(sink.as_mut());
            let summary = sim.run(&mut tail)?;
            let points = avalanche::ccdf(tail.areas());
            output::save_ccdf(path, &points)?;
            log::info!("{} distinct areas written to {}", points.len(), path.display());
            summary
        }
        None => sim.run(sink.as_mut())?,
    };
    drop(sink);
    debug_assert!(sim.grid().is_stable());

    log::info!(
        "{} grains dropped, {} records ({} {})",
        sim.injected(),
        summary.records,
        config.format.name(),
        args.output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string()),
    );
    log::info!(
        "{} avalanches, max area {}, max volume {}, mean volume {:.2}, {} grains dissipated",
        summary.nontrivial,
        summary.max_area,
        summary.max_volume,
        summary.mean_volume(),
        summary.total_dissipated
    );

    if let Some(path) = &args.snapshot {
        snapshot::save_grid(path, sim.grid(), sim.burst_sites())?;
        log::info!("grid snapshot written to {}", path.display());
    }
    if let Some(path) = &args.active {
        snapshot::save_active(path, &sim.last_active_sites())?;
        log::info!("active sites written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["sandpile-simulation"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_flags_override_defaults() {
        let presets = PresetManager::with_dir(None);
        let argv = [
            "-n",
            "40",
            "-k",
            "500",
            "--discipline",
            "fifo",
            "--dedup",
            "--format",
            "legacy",
            "-o",
            "run",
        ];
        let config = resolve_config(&args(&argv), &presets).unwrap();
        assert_eq!(config.settings.side, 40);
        assert_eq!(config.settings.injections, 500);
        assert_eq!(config.settings.backphone, 3);
        assert_eq!(config.settings.discipline, WorklistDiscipline::Queue);
        assert!(config.settings.dedup_pending);
        assert_eq!(config.format, OutputFormat::Legacy);
    }

    #[test]
    fn test_preset_then_flags() {
        let presets = PresetManager::with_dir(None);
        let argv = ["--preset", "burst", "--burst", "3"];
        let config = resolve_config(&args(&argv), &presets).unwrap();
        assert_eq!(config.settings.side, 1000);
        assert_eq!(config.burst, 3);
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let presets = PresetManager::with_dir(None);
        assert!(matches!(
            resolve_config(&args(&["--preset", "missing"]), &presets),
            Err(SandpileError::Config(_))
        ));
        assert!(matches!(
            resolve_config(&args(&["-b", "4"]), &presets),
            Err(SandpileError::Config(_))
        ));
        assert!(matches!(
            resolve_config(&args(&["-n", "2"]), &presets),
            Err(SandpileError::Config(_))
        ));
        // Caught before any burst or file write happens
        assert!(matches!(
            resolve_config(&args(&["--preset", "burst", "--format", "legacy"]), &presets),
            Err(SandpileError::Config(_))
        ));
    }

    #[test]
    fn test_no_dedup_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        let mut config = RunConfig::default();
        config.settings.dedup_pending = true;
        config.save_to_file(&path).unwrap();

        let presets = PresetManager::with_dir(None);
        let path_arg = path.to_str().unwrap();
        let kept = resolve_config(&args(&["--config", path_arg]), &presets).unwrap();
        assert!(kept.settings.dedup_pending);
        let cleared =
            resolve_config(&args(&["--config", path_arg, "--no-dedup"]), &presets).unwrap();
        assert!(!cleared.settings.dedup_pending);

        let both = ["sandpile-simulation", "--dedup", "--no-dedup"];
        assert!(Args::try_parse_from(both).is_err());
    }

    #[test]
    fn test_config_and_preset_conflict() {
        let argv = ["sandpile-simulation", "--config", "run.json", "--preset", "quick"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn test_parse_helpers_fall_back() {
        assert_eq!(parse_discipline("Shuffle"), WorklistDiscipline::Shuffled);
        assert_eq!(parse_discipline("whatever"), WorklistDiscipline::Stack);
        assert_eq!(parse_format("CSV"), OutputFormat::Csv);
    }
}
