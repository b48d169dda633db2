//! MB-014: CLI subcommands: run, validate, prompt, init.

use crate::core::config::{self, SimConfig};
use crate::core::error::{Result, SimError};
use crate::core::executor::Interpreter;
use crate::core::recipe::{self, Recipe};
use crate::core::types::{AbortReason, RunOutcome, RunStatus};
use crate::history::series::{self, ChartStyle};
use crate::history::{hasher, log};
use clap::Subcommand;
use indexmap::IndexMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Simulate a recipe and chart the result
    Run {
        /// Recipe file (the .txt extension is optional)
        file: String,

        /// Simulation config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the full run log as JSONL
        #[arg(long)]
        history: Option<PathBuf>,

        /// Write the chart series as CSV
        #[arg(long)]
        series: Option<PathBuf>,

        /// Draw charts with ASCII only
        #[arg(long)]
        ascii: bool,

        /// Skip the terminal chart
        #[arg(long)]
        no_chart: bool,

        /// Chart width in columns
        #[arg(long, default_value_t = 60)]
        width: usize,
    },

    /// Parse a recipe without simulating it
    Validate {
        /// Recipe file (the .txt extension is optional)
        file: String,
    },

    /// Ask for a recipe name, simulate it, chart it
    Prompt {
        /// Simulation config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Draw charts with ASCII only
        #[arg(long)]
        ascii: bool,
    },

    /// Write a sample recipe and config
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Output choices shared by `run` and `prompt`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub history: Option<PathBuf>,
    pub series: Option<PathBuf>,
    pub style: ChartStyle,
    pub chart: bool,
    pub width: usize,
}

impl RunOptions {
    fn chart_only(ascii: bool) -> Self {
        Self {
            history: None,
            series: None,
            style: pick_style(ascii),
            chart: true,
            width: 60,
        }
    }
}

fn pick_style(ascii: bool) -> ChartStyle {
    if ascii {
        ChartStyle::Ascii
    } else {
        ChartStyle::detect()
    }
}

/// Dispatch a CLI command. The status carries the process exit code.
pub fn dispatch(cmd: Commands) -> Result<RunStatus> {
    match cmd {
        Commands::Run {
            file,
            config,
            history,
            series,
            ascii,
            no_chart,
            width,
        } => {
            let opts = RunOptions {
                history,
                series,
                style: pick_style(ascii),
                chart: !no_chart,
                width,
            };
            cmd_run(&file, config.as_deref(), &opts)
        }
        Commands::Validate { file } => cmd_validate(&recipe::resolve_recipe_path(&file)),
        Commands::Prompt { config, ascii } => {
            let config = config::load_or_default(config.as_deref())?;
            let stdin = std::io::stdin();
            let stdout = std::io::stdout();
            cmd_prompt(
                &mut stdin.lock(),
                &mut stdout.lock(),
                &config,
                &RunOptions::chart_only(ascii),
            )
        }
        Commands::Init { path } => cmd_init(&path),
    }
}

fn terminal(e: std::io::Error) -> SimError {
    SimError::Output(format!("cannot write to terminal: {}", e))
}

fn cmd_run(file: &str, config_path: Option<&Path>, opts: &RunOptions) -> Result<RunStatus> {
    let config = config::load_or_default(config_path)?;
    let recipe = recipe::load_recipe(&recipe::resolve_recipe_path(file))?;
    let stdout = std::io::stdout();
    run_recipe(&recipe, &config, opts, &mut stdout.lock())
}

/// Parse and simulate a loaded recipe, then report to `out`.
fn run_recipe(
    recipe: &Recipe,
    config: &SimConfig,
    opts: &RunOptions,
    out: &mut impl Write,
) -> Result<RunStatus> {
    let program = recipe.parse()?;
    info!(recipe = %recipe.name, commands = program.len(), "loaded recipe");
    writeln!(out, "Simulating {} ({} commands)", recipe.name, program.len()).map_err(terminal)?;

    let mut interpreter = Interpreter::new(&program, config);
    if let Err(e) = interpreter.run() {
        warn!(
            recipe = %recipe.name,
            steps = interpreter.history().len(),
            "run stopped by error"
        );
        return Err(e);
    }
    let outcome = interpreter
        .into_outcome()
        .ok_or_else(|| SimError::Output(format!("{} stopped before halting", recipe.name)))?;

    if let Some(path) = &opts.history {
        log::write_run_log(path, &recipe.name, program.len(), &outcome)?;
    }
    if let Some(path) = &opts.series {
        series::write_csv(path, &outcome.history)?;
    }
    report(recipe, &outcome, config, opts, out).map_err(terminal)?;
    Ok(outcome.status)
}

/// Human-readable bound, e.g. "12 Hours".
fn bound_label(seconds: f64) -> String {
    let hours = seconds / 3600.0;
    let (count, unit) = if hours >= 1.0 && hours.fract() == 0.0 {
        (hours, "Hour")
    } else {
        (seconds, "Second")
    };
    let plural = if count == 1.0 { "" } else { "s" };
    format!("{} {}{}", count, unit, plural)
}

fn report(
    recipe: &Recipe,
    outcome: &RunOutcome,
    config: &SimConfig,
    opts: &RunOptions,
    out: &mut impl Write,
) -> std::io::Result<()> {
    if outcome.status == RunStatus::Aborted(AbortReason::InfiniteLoop) {
        writeln!(
            out,
            "Infinite Loop Detected! Aborted Recipe after {}.",
            bound_label(config.simulation.max_seconds)
        )?;
    }

    let steps = outcome.history.len();
    writeln!(
        out,
        "{}: {}, {} s simulated ({:.1} min)",
        recipe.name,
        outcome.status,
        steps,
        steps as f64 / 60.0
    )?;
    writeln!(out, "  Fingerprint: {}", hasher::fingerprint(&outcome.history))?;
    if let Some(path) = &opts.history {
        writeln!(out, "  History: {}", path.display())?;
    }
    if let Some(path) = &opts.series {
        writeln!(out, "  Series:  {}", path.display())?;
    }

    if opts.chart {
        writeln!(out)?;
        writeln!(out, "Plotting recipe...")?;
        write!(
            out,
            "{}",
            series::render(&outcome.history, opts.style, opts.width)
        )?;
    }
    out.flush()
}

fn cmd_validate(file: &Path) -> Result<RunStatus> {
    let recipe = recipe::load_recipe(file)?;
    let program = recipe.parse()?;

    let mut counts: IndexMap<&'static str, usize> = IndexMap::new();
    for parsed in &program {
        *counts.entry(parsed.command.keyword()).or_insert(0) += 1;
    }

    println!("OK: {} ({} commands)", recipe.name, program.len());
    for (keyword, n) in &counts {
        println!("  {:<10} {}", keyword, n);
    }
    Ok(RunStatus::Completed)
}

/// Interactive loop: re-ask until a recipe loads or the user types `exit`.
fn cmd_prompt(
    input: &mut impl BufRead,
    out: &mut impl Write,
    config: &SimConfig,
    opts: &RunOptions,
) -> Result<RunStatus> {
    let recipe = loop {
        writeln!(
            out,
            "Please input the recipe file name (extension is optional, type \"exit\" to quit):"
        )
        .and_then(|()| out.flush())
        .map_err(terminal)?;

        let mut line = String::new();
        let read = input.read_line(&mut line).map_err(terminal)?;
        let name = line.trim();
        if read == 0 || name.eq_ignore_ascii_case("exit") {
            writeln!(out, "Exiting...").map_err(terminal)?;
            return Ok(RunStatus::Completed);
        }
        if name.is_empty() {
            continue;
        }

        let path = recipe::resolve_recipe_path(name);
        match recipe::load_recipe(&path) {
            Ok(recipe) => break recipe,
            Err(e) if e.is_not_found() => {
                writeln!(
                    out,
                    "Error - could not load recipe \"{}\". Please try again.",
                    path.display()
                )
                .map_err(terminal)?;
            }
            Err(e) => return Err(e),
        }
    };

    let status = run_recipe(&recipe, config, opts, out)?;

    write!(out, "Press Enter to continue...")
        .and_then(|()| out.flush())
        .map_err(terminal)?;
    let mut line = String::new();
    input.read_line(&mut line).map_err(terminal)?;
    Ok(status)
}

const SAMPLE_RECIPE: &str = r#"# Sample GaAs buffer layer
Define GrowthTime = 2 min

# Bring the cells up to growth temperature
Set As.PV.TSP = 390
Set Ga.PV.TSP = 560
Wait Until As.PV >= 390 and Ga.PV >= 560

Open As, Ga
Wait Until Time >= waitStartTime + GrowthTime
Close Ga

# Cool Ga back to idle under As flux
Set Ga.PV.TSP = 550
Wait 30 s
Close As
"#;

const SAMPLE_CONFIG: &str = r#"simulation:
  max_seconds: 43200   # abort any wait still running after 12 hours

# Overrides applied over the built-in chamber defaults
variables:
  Manip.RS.RPM: 10
"#;

fn cmd_init(path: &Path) -> Result<RunStatus> {
    let recipe_path = path.join("recipe.txt");
    let config_path = path.join("mbesim.yaml");
    for existing in [&recipe_path, &config_path] {
        if existing.exists() {
            return Err(SimError::Config(format!(
                "{} already exists",
                existing.display()
            )));
        }
    }

    std::fs::create_dir_all(path).map_err(|e| SimError::io(path, e))?;
    std::fs::write(&recipe_path, SAMPLE_RECIPE).map_err(|e| SimError::io(&recipe_path, e))?;
    std::fs::write(&config_path, SAMPLE_CONFIG).map_err(|e| SimError::io(&config_path, e))?;

    println!("Initialized mbesim project at {}", path.display());
    println!("  Created: {}", recipe_path.display());
    println!("  Created: {}", config_path.display());
    Ok(RunStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet() -> RunOptions {
        RunOptions {
            history: None,
            series: None,
            style: ChartStyle::Ascii,
            chart: true,
            width: 40,
        }
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_mb014_init() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("project");
        cmd_init(&sub).unwrap();
        assert!(sub.join("recipe.txt").is_file());
        assert!(sub.join("mbesim.yaml").is_file());
    }

    #[test]
    fn test_mb014_init_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mbesim.yaml"), "exists").unwrap();
        let err = cmd_init(dir.path()).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
        assert!(!dir.path().join("recipe.txt").exists());
    }

    #[test]
    fn test_mb014_sample_runs() {
        let dir = tempfile::tempdir().unwrap();
        cmd_init(dir.path()).unwrap();
        let config = config::load_config(&dir.path().join("mbesim.yaml")).unwrap();
        let recipe = recipe::load_recipe(&dir.path().join("recipe.txt")).unwrap();

        let mut out = Vec::new();
        let status = run_recipe(&recipe, &config, &quiet(), &mut out).unwrap();
        assert_eq!(status, RunStatus::Completed);
        let text = output(out);
        // 32 s ramp (As is slowest), 120 s growth, 30 s cool-down
        assert!(text.contains("recipe: completed, 182 s simulated"), "{text}");
        assert!(text.contains("Fingerprint: blake3:"));
        assert!(text.contains("Plotting recipe..."));
        assert!(!text.contains("Infinite Loop"));
    }

    #[test]
    fn test_mb014_run_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let recipe = recipe::parse_recipe_text("outputs", "Open Ga\nWait 5 s\nClose Ga\n");
        let opts = RunOptions {
            history: Some(dir.path().join("out/run.jsonl")),
            series: Some(dir.path().join("series.csv")),
            chart: false,
            ..quiet()
        };
        let mut out = Vec::new();
        run_recipe(&recipe, &SimConfig::default(), &opts, &mut out).unwrap();

        let events = log::read_run_log(&dir.path().join("out/run.jsonl")).unwrap();
        assert_eq!(events.len(), 7);
        let csv = std::fs::read_to_string(dir.path().join("series.csv")).unwrap();
        assert_eq!(csv.lines().count(), 6);
        let text = output(out);
        assert!(text.contains("History: "));
        assert!(!text.contains("Plotting"));
    }

    #[test]
    fn test_mb014_run_abort_message() {
        let recipe = recipe::parse_recipe_text("stuck", "Wait Until Ga.PV > 1000\n");
        let config = config::parse_config("simulation:\n  max_seconds: 7200\n").unwrap();
        let mut out = Vec::new();
        let status = run_recipe(&recipe, &config, &quiet(), &mut out).unwrap();
        assert_eq!(status, RunStatus::Aborted(AbortReason::InfiniteLoop));
        assert_eq!(status.exit_code(), 7);
        let text = output(out);
        assert!(text.contains("Infinite Loop Detected! Aborted Recipe after 2 Hours."));
        assert!(text.contains("7200 s simulated"));
    }

    #[test]
    fn test_mb014_run_error_propagates() {
        let recipe = recipe::parse_recipe_text("bad", "Set Ga.PV.TSP = $Nope$\n");
        let mut out = Vec::new();
        let err = run_recipe(&recipe, &SimConfig::default(), &quiet(), &mut out).unwrap_err();
        assert!(matches!(err, SimError::UndefinedVariable(ref k) if k == "Nope"));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_mb014_bound_label() {
        assert_eq!(bound_label(43200.0), "12 Hours");
        assert_eq!(bound_label(3600.0), "1 Hour");
        assert_eq!(bound_label(1.0), "1 Second");
        assert_eq!(bound_label(30.0), "30 Seconds");
        assert_eq!(bound_label(5400.0), "5400 Seconds");
    }

    #[test]
    fn test_mb014_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.txt");
        std::fs::write(&path, "Open Ga\nWait 1 s\nClose Ga\n").unwrap();
        assert_eq!(cmd_validate(&path).unwrap(), RunStatus::Completed);

        std::fs::write(&path, "Open Ga\nWait 3 fortnights\n").unwrap();
        let err = cmd_validate(&path).unwrap_err();
        assert!(matches!(err, SimError::Unit(_)), "{err:?}");
    }

    #[test]
    fn test_mb014_validate_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "Open Ga\nFrobnicate\n").unwrap();
        let err = cmd_validate(&path).unwrap_err();
        assert!(matches!(err, SimError::Parse { line: 2, .. }));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_mb014_prompt_reprompts_then_exits() {
        let mut input = "no-such-recipe\n\nEXIT\n".as_bytes();
        let mut out = Vec::new();
        let status = cmd_prompt(&mut input, &mut out, &SimConfig::default(), &quiet()).unwrap();
        assert_eq!(status, RunStatus::Completed);
        let text = output(out);
        assert!(text.contains("could not load recipe \"no-such-recipe.txt\". Please try again."));
        assert!(text.contains("Exiting..."));
        assert!(!text.contains("Simulating"));
    }

    #[test]
    fn test_mb014_prompt_runs_recipe() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("growth.txt"), "Open In\nWait 10 s\n").unwrap();
        let name = dir.path().join("growth");
        let input = format!("{}\n\n", name.display());
        let mut reader = input.as_bytes();
        let mut out = Vec::new();
        let status = cmd_prompt(&mut reader, &mut out, &SimConfig::default(), &quiet()).unwrap();
        assert_eq!(status, RunStatus::Completed);
        let text = output(out);
        assert!(text.contains("growth: completed, 10 s simulated"));
        assert!(text.trim_end().ends_with("Press Enter to continue..."));
    }

    #[test]
    fn test_mb014_prompt_eof() {
        let mut input = "".as_bytes();
        let mut out = Vec::new();
        let status = cmd_prompt(&mut input, &mut out, &SimConfig::default(), &quiet()).unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert!(output(out).contains("Exiting..."));
    }

    #[test]
    fn test_mb014_dispatch_init_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        dispatch(Commands::Init {
            path: dir.path().to_path_buf(),
        })
        .unwrap();
        let name = dir.path().join("recipe");
        let status = dispatch(Commands::Validate {
            file: name.display().to_string(),
        })
        .unwrap();
        assert_eq!(status, RunStatus::Completed);
    }

    #[test]
    fn test_mb014_dispatch_run_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = dispatch(Commands::Run {
            file: dir.path().join("absent").display().to_string(),
            config: None,
            history: None,
            series: None,
            ascii: true,
            no_chart: true,
            width: 60,
        })
        .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.exit_code(), 1);
    }
}
