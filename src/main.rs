//! Scenario test runner CLI
//!
//! Usage:
//!   ticktest                         # Run all scenarios
//!   ticktest signals/                # Run one suite
//!   ticktest items/lands_in_hopper   # Run a single scenario
//!   ticktest --tag smoke --parallel 4 --output results/report.json
//!   ticktest --verbose               # Show failure details and debug logs

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ticktest::report::{format_summary, print_load_error, print_results};
use ticktest::scenario::discover::relative;
use ticktest::{
    FixtureLibrary, ResultDatabase, RunReport, RunSummary, RunnerSettings, TestResult,
    build_registry, init_parallel, load_dir,
};

#[derive(Parser, Debug)]
#[command(name = "ticktest")]
#[command(about = "Run tick-driven scenario tests against the sandbox world")]
struct Cli {
    /// Only run scenario files whose path contains this text
    filter: Option<String>,

    /// Only run tests carrying this tag (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Skip tests carrying this tag (repeatable)
    #[arg(long = "exclude")]
    exclude: Vec<String>,

    /// Worker threads (0 = sequential)
    #[arg(long)]
    parallel: Option<usize>,

    /// Write a JSON report here
    #[arg(long)]
    output: Option<PathBuf>,

    /// Store results in this SQLite database
    #[arg(long)]
    db: Option<PathBuf>,

    /// Settings file replacing config/runner_settings.json
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Scenario directory
    #[arg(long)]
    scenarios: Option<PathBuf>,

    /// Fixture library
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Deadline in ticks for scenarios without their own timeout
    #[arg(long)]
    timeout: Option<u64>,

    /// Show failure details and debug logs
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// CLI flags override file settings
    fn apply_overrides(&self, settings: &mut RunnerSettings) {
        // Asking for a tag un-excludes it
        settings.include_tags.extend(self.tags.iter().cloned());
        settings.exclude_tags.retain(|tag| !self.tags.contains(tag));
        settings.exclude_tags.extend(self.exclude.iter().cloned());
        if let Some(parallel) = self.parallel {
            settings.parallel = parallel;
        }
        if let Some(output) = &self.output {
            settings.output_file = Some(output.to_string_lossy().to_string());
        }
        if let Some(db) = &self.db {
            settings.db_path = Some(db.to_string_lossy().to_string());
        }
        if let Some(scenarios) = &self.scenarios {
            settings.scenarios_dir = scenarios.to_string_lossy().to_string();
        }
        if let Some(fixtures) = &self.fixtures {
            settings.fixtures_file = fixtures.to_string_lossy().to_string();
        }
        if let Some(timeout) = self.timeout {
            settings.default_timeout = timeout;
        }
        settings.verbose |= self.verbose;
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "ticktest=debug"
    } else {
        "ticktest=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => match RunnerSettings::from_file(path) {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("{}", e);
                process::exit(2);
            }
        },
        None => RunnerSettings::load(),
    };
    cli.apply_overrides(&mut settings);
    // `verbose` may come from the settings file
    init_logging(settings.verbose);

    process::exit(run(&settings, cli.filter.as_deref()));
}

/// Load, run and report; returns the process exit code
fn run(settings: &RunnerSettings, filter: Option<&str>) -> i32 {
    println!("Scenario Tests");
    println!("==============\n");

    let scenarios_path = Path::new(&settings.scenarios_dir);
    if !scenarios_path.exists() {
        println!("No scenarios directory found at {}", settings.scenarios_dir);
        println!("Create test files in {}/<suite>/<name>.toml", settings.scenarios_dir);
        return 1;
    }

    let fixtures = match FixtureLibrary::load_or_default(Path::new(&settings.fixtures_file)) {
        Ok(fixtures) => fixtures,
        Err(e) => {
            println!("{}", e);
            return 1;
        }
    };

    let loaded = load_dir(scenarios_path, filter, settings.scenario_defaults());
    if loaded.scenarios.is_empty() && loaded.failures.is_empty() {
        println!("No test files found.");
        if let Some(f) = filter {
            println!("Filter: {}", f);
        }
        return 1;
    }

    let (mut registry, rejected) = build_registry(fixtures, loaded.scenarios);
    let load_failures: Vec<_> = loaded.failures.into_iter().chain(rejected).collect();

    let tag_filter = settings.tag_filter();
    let results = if settings.parallel > 0 {
        if let Err(e) = init_parallel(settings.parallel) {
            warn!("Could not size thread pool: {}", e);
        }
        registry.run_all_parallel(&tag_filter)
    } else {
        registry.run_all(&tag_filter)
    };

    print_results(&results, settings.verbose);

    if !load_failures.is_empty() {
        println!("\nFailed to load:");
        for failure in &load_failures {
            print_load_error(&relative(scenarios_path, &failure.path), &failure.error.to_string());
        }
    }

    let summary = RunSummary::from_results(&results);
    println!("\n==============");
    println!("{}", format_summary(&summary, load_failures.len()));

    let session_id = RunReport::new_session_id();
    if let Some(output) = &settings.output_file {
        write_report(Path::new(output), &session_id, &results);
    }
    if let Some(db_path) = &settings.db_path {
        store_results(Path::new(db_path), &session_id, settings, &results);
    }

    if summary.all_passed() && load_failures.is_empty() {
        0
    } else {
        1
    }
}

fn write_report(path: &Path, session_id: &str, results: &[TestResult]) {
    let report = RunReport::new(session_id, results.to_vec());
    match report.write_to_file(path) {
        Ok(()) => println!("Report written to: {}", path.display()),
        Err(e) => println!("Failed to write report {}: {}", path.display(), e),
    }
}

fn store_results(path: &Path, session_id: &str, settings: &RunnerSettings, results: &[TestResult]) {
    let stored = ResultDatabase::open(path).and_then(|mut db| {
        let settings_json = settings.to_json().ok();
        db.create_session_with_id(session_id, "ticktest", settings_json.as_deref())?;
        db.insert_results(session_id, results)
    });
    match stored {
        Ok(()) => println!("Results stored in: {} (session {})", path.display(), session_id),
        Err(e) => println!("Failed to store results in {}: {}", path.display(), e),
    }
}
