//! Kujua - learning core for the Kujua360 community-led monitoring course
//!
//! CLI entry point with global panic handler.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use kujua::config::{kujua_home, project_progress_log_path, Config};
use kujua::core::{ActivityDefinition, QualityPreset};
use kujua::error::exit_codes;
use kujua::progress::ProgressLogger;
use kujua::util::read_to_string_limited;

// =============================================================================
// CLI Definition
// =============================================================================

/// Kujua - learning activities for community-led monitoring
#[derive(Parser)]
#[command(name = "kujua")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [Learner] Play an activity file interactively
    Play {
        /// Path to the activity TOML file
        file: PathBuf,
        /// Output the result as JSON (prompts move to stderr)
        #[arg(long, short)]
        json: bool,
        /// Suppress the final result
        #[arg(long, short)]
        quiet: bool,
        /// Show options in their authored order
        #[arg(long)]
        no_shuffle: bool,
        /// Do not record the run in the progress log
        #[arg(long)]
        no_record: bool,
    },

    /// [Learner] Show completed segments and certificates
    Progress {
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
        /// Only show this module
        #[arg(long, short)]
        module: Option<String>,
    },

    /// [Learner] Issue the certificate for a completed module
    Certificate {
        /// Module identifier
        module: String,
        /// Directory of activity files that make up the module
        #[arg(long, short)]
        activities: Option<PathBuf>,
        /// Required segment (repeatable)
        #[arg(long = "segment", short)]
        segments: Vec<String>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Author] Run a response through the quality gate
    Check {
        /// Response text (read from stdin when omitted)
        text: Option<String>,
        /// Threshold preset
        #[arg(long, short, value_enum, default_value_t = PresetArg::Reflection)]
        preset: PresetArg,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [Author] Score a scenario answer against a model answer
    Score {
        /// Answer text (read from stdin when omitted)
        answer: Option<String>,
        /// Model answer
        #[arg(long, short, conflicts_with = "reference_file")]
        reference: Option<String>,
        /// File holding the model answer
        #[arg(long)]
        reference_file: Option<PathBuf>,
        /// Output as JSON
        #[arg(long, short)]
        json: bool,
        /// Suppress output
        #[arg(long, short)]
        quiet: bool,
    },

    /// [User] Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
        /// Output as JSON
        #[arg(long, short, global = true)]
        json: bool,
        /// Suppress output
        #[arg(long, short, global = true)]
        quiet: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetArg {
    Reflection,
    Scenario,
    Strict,
}

impl From<PresetArg> for QualityPreset {
    fn from(preset: PresetArg) -> Self {
        match preset {
            PresetArg::Reflection => QualityPreset::Reflection,
            PresetArg::Scenario => QualityPreset::Scenario,
            PresetArg::Strict => QualityPreset::Strict,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write the effective configuration to .kujua/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();
    kujua::telemetry::init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("kujua error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.kujua/crash.log and exits with the error code.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("kujua panic: {}", info);

        if let Some(home) = kujua_home() {
            let _ = std::fs::create_dir_all(&home);
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::ERROR);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Play {
            file,
            json,
            quiet,
            no_shuffle,
            no_record,
        } => run_play(&file, json, quiet, !no_shuffle, !no_record, &cwd),
        Commands::Progress {
            json,
            quiet,
            module,
        } => run_progress(json, quiet, module, &cwd),
        Commands::Certificate {
            module,
            activities,
            segments,
            json,
            quiet,
        } => run_certificate(&module, activities.as_deref(), segments, json, quiet, &cwd),
        Commands::Check {
            text,
            preset,
            json,
            quiet,
        } => run_check(text, preset.into(), json, quiet, &cwd),
        Commands::Score {
            answer,
            reference,
            reference_file,
            json,
            quiet,
        } => run_score(answer, reference, reference_file.as_deref(), json, quiet, &cwd),
        Commands::Config {
            action,
            json,
            quiet,
        } => run_config(action, json, quiet, &cwd),
    }
}

/// Convert success boolean to exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

/// Convert an accept/reject verdict to exit code.
fn verdict_to_exit_code(accepted: bool) -> ExitCode {
    if accepted {
        ExitCode::from(exit_codes::OK as u8)
    } else {
        ExitCode::from(exit_codes::REJECTED as u8)
    }
}

fn print_output(formatted: &str) {
    if !formatted.is_empty() {
        print!("{}", formatted);
        if !formatted.ends_with('\n') {
            println!();
        }
    }
}

/// Use the argument if given, otherwise read all of stdin.
fn text_or_stdin(text: Option<String>) -> std::io::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
    }
}

fn run_play(
    file: &Path,
    json: bool,
    quiet: bool,
    shuffle: bool,
    record: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::play::{PlayCommand, PlayOptions};

    let options = PlayOptions {
        json,
        quiet,
        shuffle,
    };

    let activity = ActivityDefinition::load(file)?;
    let config = Config::load_from_cwd(cwd);
    let mut cmd = PlayCommand::new(config, activity);
    if record {
        cmd = cmd.with_logger(ProgressLogger::new(project_progress_log_path(cwd)));
    }

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut rng = rand::thread_rng();

    // Keep stdout clean for the JSON result.
    let output = if json {
        cmd.run(&mut input, &mut std::io::stderr(), &mut rng, &options)
    } else {
        cmd.run(&mut input, &mut std::io::stdout(), &mut rng, &options)
    };

    print_output(&cmd.format_output(&output, &options));

    let code = if output.passed {
        exit_codes::OK
    } else if output.completed {
        exit_codes::REJECTED
    } else {
        exit_codes::ERROR
    };
    Ok(ExitCode::from(code as u8))
}

fn run_progress(
    json: bool,
    quiet: bool,
    module: Option<String>,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::progress::{ProgressCommand, ProgressOptions};

    let cmd = ProgressCommand::new(ProgressLogger::new(project_progress_log_path(cwd)));
    let options = ProgressOptions {
        json,
        quiet,
        module,
    };

    let output = cmd.run(&options);
    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_certificate(
    module: &str,
    activities: Option<&Path>,
    mut segments: Vec<String>,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::certificate::{CertificateCommand, CertificateOptions};

    if let Some(dir) = activities {
        let definitions = ActivityDefinition::load_dir(dir)?;
        segments.extend(ActivityDefinition::segments_of(&definitions, module));
    }
    segments.sort();
    segments.dedup();

    let cmd = CertificateCommand::new(ProgressLogger::new(project_progress_log_path(cwd)));
    let options = CertificateOptions { json, quiet };

    let output = cmd.run(module, &segments);
    print_output(&cmd.format_output(&output, &options));

    if !output.success {
        return Ok(success_to_exit_code(false));
    }
    Ok(verdict_to_exit_code(output.certified()))
}

fn run_check(
    text: Option<String>,
    preset: QualityPreset,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::check::{CheckCommand, CheckOptions};

    let text = text_or_stdin(text)?;
    let cmd = CheckCommand::new(Config::load_from_cwd(cwd));
    let options = CheckOptions {
        json,
        quiet,
        preset,
    };

    let output = cmd.run(&text, &options);
    print_output(&cmd.format_output(&output, &options));

    Ok(verdict_to_exit_code(output.accepted))
}

fn run_score(
    answer: Option<String>,
    reference: Option<String>,
    reference_file: Option<&Path>,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::score::{ScoreCommand, ScoreOptions};

    let reference = match reference_file {
        Some(path) => Some(read_to_string_limited(path)?),
        None => reference,
    };
    let answer = text_or_stdin(answer)?;

    let cmd = ScoreCommand::new(Config::load_from_cwd(cwd));
    let options = ScoreOptions { json, quiet };

    let output = cmd.run(&answer, reference.as_deref());
    print_output(&cmd.format_output(&output, &options));

    Ok(verdict_to_exit_code(output.completes))
}

fn run_config(
    action: ConfigAction,
    json: bool,
    quiet: bool,
    cwd: &Path,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    use kujua::cli::config_cmd::{ConfigCommand, ConfigOptions};

    let cmd = ConfigCommand::new(Config::load_from_cwd(cwd));

    let (output, options) = match action {
        ConfigAction::Show => {
            let options = ConfigOptions {
                json,
                quiet,
                force: false,
            };
            (cmd.show(), options)
        }
        ConfigAction::Init { force } => {
            let options = ConfigOptions { json, quiet, force };
            (cmd.init(cwd, &options), options)
        }
    };

    print_output(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

// =============================================================================
// Tests
// =============================================================================
