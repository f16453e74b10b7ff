//! Jadwal - command-line host for the schedule orchestrator

use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use jadwal::cli::{Cli, Commands, SettingsCommands};
use jadwal::engine::runner::{OutputEvent, Stream};
use jadwal::sanity::{render_report, verify_environment};
use jadwal::shell::{DesktopShell, FileFilter, HeadlessShell, default_shell};
use jadwal::{
    EngineSettings, GenerationRequest, GenerationResult, Orchestrator, OrchestratorOptions,
    ProcessGuard, SettingsPatch, process_guard,
};

/// Initialize the tracing subscriber; `RUST_LOG` overrides the default level
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();
    debug!("Jadwal starting up");

    // Engines must not outlive an interrupted host
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let _guard = ProcessGuard::new();

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    let mut options = OrchestratorOptions::from_env();
    if let Some(mode) = cli.mode {
        options.mode = mode;
    }

    match cli.command {
        Commands::Generate {
            month,
            year,
            day,
            extra,
            protocol,
            data_file,
            reveal,
        } => {
            let request = GenerationRequest::parse(&month, &year, day.as_deref(), extra.as_deref())?;
            options.protocol = protocol;
            let orchestrator = Orchestrator::discover(options, shell_for(data_file));

            if cli.dry_run {
                let invocation = orchestrator.plan(&request)?;
                if cli.json {
                    print_json(&invocation)?;
                } else {
                    println!("[DRY RUN] cwd: {}", invocation.working_dir.display());
                    println!("[DRY RUN] {}", invocation);
                }
                return Ok(());
            }

            run_generate(&orchestrator, &request, cli.json, reveal)?;
        }
        Commands::Settings { action } => {
            let orchestrator = Orchestrator::discover(options, Box::new(HeadlessShell::default()));
            run_settings(&orchestrator, action, cli.json, cli.dry_run)?;
        }
        Commands::Reveal { path } => {
            let orchestrator = Orchestrator::discover(options, default_shell());
            let folder = orchestrator.reveal_output(path.as_deref())?;
            println!("{}", folder.display());
        }
        Commands::PickFolder => {
            let orchestrator = Orchestrator::discover(options, default_shell());
            match orchestrator.pick_folder() {
                Some(folder) => println!("{}", folder.display()),
                None => debug!("Folder selection cancelled"),
            }
        }
        Commands::PickFile { extensions } => {
            let orchestrator = Orchestrator::discover(options, default_shell());
            let filters = if extensions.is_empty() {
                Vec::new()
            } else {
                let exts: Vec<&str> = extensions.iter().map(String::as_str).collect();
                vec![FileFilter::new("Allowed files", &exts)]
            };
            match orchestrator.pick_file(&filters) {
                Some(file) => println!("{}", file.display()),
                None => debug!("File selection cancelled"),
            }
        }
        Commands::Doctor => {
            let orchestrator = Orchestrator::discover(options, Box::new(HeadlessShell::default()));
            let report = verify_environment(&orchestrator);
            if cli.json {
                print_json(&report)?;
            } else {
                print!("{}", render_report(&report));
            }
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Shell for a generation run: a preselected workbook skips the picker
fn shell_for(data_file: Option<PathBuf>) -> Box<dyn DesktopShell> {
    match data_file {
        Some(file) => Box::new(HeadlessShell::with_file(file)),
        None => default_shell(),
    }
}

fn run_generate(
    orchestrator: &Orchestrator,
    request: &GenerationRequest,
    json: bool,
    reveal: bool,
) -> anyhow::Result<()> {
    let echo = |event: &OutputEvent| match event.stream {
        Stream::Stdout => println!("{}", event.line),
        Stream::Stderr => eprintln!("{}", event.line),
    };
    // JSON output carries the captured streams; don't interleave them
    let observer: Option<&dyn Fn(&OutputEvent)> = if json { None } else { Some(&echo) };

    let result: GenerationResult = orchestrator.generate_with(request, observer)?;

    if json {
        print_json(&result)?;
    } else {
        match &result.output_path {
            Some(path) => println!("✓ Schedule written to {}", path.display()),
            None => println!("✓ Engine finished; it did not report an output file"),
        }
    }

    if reveal {
        let target = result.output_path.as_deref();
        match orchestrator.reveal_output(target) {
            Ok(folder) => info!("Opened {}", folder.display()),
            Err(e) => warn!("Could not open the output folder: {}", e),
        }
    }
    Ok(())
}

fn run_settings(
    orchestrator: &Orchestrator,
    action: SettingsCommands,
    json: bool,
    dry_run: bool,
) -> anyhow::Result<()> {
    let settings = match action {
        SettingsCommands::Show => orchestrator.load_settings(),
        SettingsCommands::Set {
            verbose,
            outdir,
            template,
            master,
        } => {
            let current = orchestrator.load_settings();
            let mut patch = SettingsPatch::from(&current);
            if verbose.is_some() {
                patch.verbose = verbose;
            }
            if outdir.is_some() {
                patch.output_dir = outdir;
            }
            if template.is_some() {
                patch.template_name = template;
            }
            if master.is_some() {
                patch.master_override = master;
            }
            if dry_run {
                EngineSettings::from_patch(patch)
            } else {
                orchestrator.save_settings(patch).with_context(|| {
                    format!(
                        "Could not save settings to {}",
                        orchestrator.config_store().path().display()
                    )
                })?
            }
        }
        SettingsCommands::Reset => {
            if dry_run {
                EngineSettings::default()
            } else {
                orchestrator
                    .save_settings(SettingsPatch::default())
                    .context("Could not reset settings")?
            }
        }
    };

    if json {
        print_json(&settings)?;
    } else {
        println!("verbose:   {}", settings.verbose);
        println!("outdir:    {}", display_opt(&settings.output_dir));
        println!("template:  {}", settings.template_name);
        println!("master:    {}", display_opt(&settings.master_override));
        println!("(stored in {})", orchestrator.config_store().path().display());
    }
    Ok(())
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(default)".to_string())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
