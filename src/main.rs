mod cli;

use dvfix::config::{self, Config};
use dvfix::pipeline::{
    Outcome, PipelineContext, PipelineExecutor, PipelineOptions, TracingReporter,
};
use dvfix_av::probe::probe_with_ffprobe;
use dvfix_av::tools::FFPROBE;
use dvfix_av::{MediaInfo, SystemRunner, ToolResolver, Workspace};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

struct FixArgs {
    working: PathBuf,
    original: PathBuf,
    output: Option<PathBuf>,
    temp_dir: Option<PathBuf>,
    remove_hdr10plus: bool,
    backup: Option<String>,
}

/// Exit code for failures before or after the pipeline runs (bad config,
/// unreadable input, refused destination). Kept apart from the pipeline's
/// own outcome codes.
const SETUP_FAILURE: u8 = 4;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(SETUP_FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "dvfix=trace,dvfix_av=debug".to_string()
        } else {
            "dvfix=info,dvfix_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(SETUP_FAILURE)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Fix {
            working,
            original,
            output,
            temp_dir,
            remove_hdr10plus,
            backup,
        } => {
            let args = FixArgs {
                working,
                original,
                output,
                temp_dir,
                remove_hdr10plus,
                backup,
            };
            let outcome = fix_file(args, cli.config.as_deref())?;
            Ok(ExitCode::from(outcome.exit_code() as u8))
        }
        Commands::Probe { file, json } => {
            probe_file(&file, json, cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::CheckTools => {
            check_tools(cli.config.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolver_for(config: &Config) -> ToolResolver {
    ToolResolver::new(config.tools.environment.resolve(), config.tools.registry())
}

fn probe(config: &Config, file: &Path) -> Result<std::result::Result<MediaInfo, Outcome>> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }
    let ffprobe = match resolver_for(config).resolve(FFPROBE) {
        Ok(path) => path,
        Err(err) => {
            tracing::error!("{}", err);
            return Ok(Err(Outcome::ConfigurationError));
        }
    };
    let info = probe_with_ffprobe(&ffprobe, file)
        .with_context(|| format!("Failed to probe {:?}", file))?;
    Ok(Ok(info))
}

fn fix_file(args: FixArgs, config_path: Option<&Path>) -> Result<Outcome> {
    let config = config::load_config_or_default(config_path)?;

    if !args.working.exists() {
        anyhow::bail!("Working file does not exist: {:?}", args.working);
    }
    check_destination(&args)?;

    // The Dolby Vision layer is what the original still has and the
    // transcode lost, so the descriptors come from the original.
    let info = match probe(&config, &args.original)? {
        Ok(info) => info,
        Err(outcome) => return Ok(outcome),
    };
    tracing::debug!("Original media info: {:?}", info);

    let workspace = match &args.temp_dir {
        Some(dir) => Workspace::in_dir(&args.working, dir)?,
        None => Workspace::new(&args.working)?,
    };

    let mut ctx = PipelineContext::new(&args.original, &args.working, workspace.temp_dir())
        .with_duration(info.duration_secs())
        .with_video_streams(info.video_streams)
        .with_remove_hdr10plus(args.remove_hdr10plus || config.fix.remove_hdr10plus);

    let options = PipelineOptions {
        platform: config.platform.resolve(),
        timeout: config.tools.timeout(),
        accept_mkvmerge_warnings: config.fix.accept_mkvmerge_warnings,
    };

    let mut executor = PipelineExecutor::new(SystemRunner, resolver_for(&config)).with_options(options);
    let outcome = executor.run(&mut ctx, &mut TracingReporter::new());

    match outcome {
        Outcome::Fixed => {
            let produced = ctx.working().to_path_buf();
            let final_path = finalize(workspace, &produced, &args)?;
            println!("Fixed: {}", final_path.display());
        }
        Outcome::NotApplicable => println!("No fix required: {}", args.working.display()),
        Outcome::ConfigurationError => eprintln!("Configuration error, see log for details"),
        Outcome::ProcessingFailure => eprintln!("Processing failed, see log for details"),
    }

    Ok(outcome)
}

/// Refuse destinations that would overwrite an input the run still needs,
/// before any work is done.
fn check_destination(args: &FixArgs) -> Result<()> {
    let destination = destination_for(args);
    if same_path(&destination, &args.original) {
        anyhow::bail!(
            "Refusing to overwrite the original source {:?}; pass --output",
            args.original
        );
    }

    if let Some(ext) = &args.backup {
        let backup = match &args.output {
            Some(output) => output.with_extension(ext),
            None => args.working.with_extension(ext),
        };
        if same_path(&backup, &destination) {
            anyhow::bail!(
                "Backup {:?} would be overwritten by the repaired file; choose another extension",
                backup
            );
        }
        if same_path(&backup, &args.original) {
            anyhow::bail!(
                "Backup {:?} would overwrite the original source",
                backup
            );
        }
    }

    Ok(())
}

fn destination_for(args: &FixArgs) -> PathBuf {
    match &args.output {
        Some(output) => output.clone(),
        None => args.working.with_extension("mkv"),
    }
}

/// Compare two paths that may not exist yet.
fn same_path(a: &Path, b: &Path) -> bool {
    a == b || resolved(a) == resolved(b)
}

fn resolved(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Move the repaired container into place.
///
/// With `--output` the container goes there (backing up whatever is in the
/// way). Otherwise it replaces the working file, which is renamed to the
/// backup extension or removed.
fn finalize(workspace: Workspace, produced: &Path, args: &FixArgs) -> Result<PathBuf> {
    if let Some(output) = &args.output {
        return Ok(workspace.finalize(produced, output, args.backup.as_deref())?);
    }

    let destination = destination_for(args);
    if let Some(ext) = &args.backup {
        let backup = args.working.with_extension(ext);
        std::fs::rename(&args.working, &backup)
            .with_context(|| format!("Failed to back up {:?}", args.working))?;
    }

    let final_path = workspace.finalize(produced, &destination, None)?;

    if args.backup.is_none() && args.working != destination {
        std::fs::remove_file(&args.working)
            .with_context(|| format!("Failed to remove {:?}", args.working))?;
    }

    Ok(final_path)
}

fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let media_info = match probe(&config, file)? {
        Ok(info) => info,
        Err(_) => anyhow::bail!("ffprobe is not available"),
    };

    if json {
        let json_str = serde_json::to_string_pretty(&media_info)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", media_info.file_path.display());
    println!("Container: {}", media_info.container);
    if let Some(ref duration) = media_info.duration {
        let secs = duration.as_secs();
        let mins = secs / 60;
        let hours = mins / 60;
        println!("Duration: {:02}:{:02}:{:02}", hours, mins % 60, secs % 60);
    }

    println!("\nVideo Streams: {}", media_info.video_streams.len());
    for (i, stream) in media_info.video_streams.iter().enumerate() {
        print!("  [{}] {} {}x{}", i, stream.codec, stream.width, stream.height);
        if let Some(fps) = stream.frame_rate {
            print!(", {:.3} fps", fps);
        }
        println!();
        if stream.dolby_vision {
            match stream.dv_profile {
                Some(profile) => println!("      Dolby Vision: Profile {}", profile),
                None => println!("      Dolby Vision"),
            }
        }
    }

    let fixable = media_info
        .primary_video()
        .is_some_and(|v| v.dolby_vision && v.has_supported_codec());
    println!("\nFixable: {}", if fixable { "yes" } else { "no" });

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let resolver = resolver_for(&config);

    println!(
        "Checking external tools ({:?} environment)...\n",
        resolver.environment()
    );

    let tools = resolver.check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        if let Some(ref problem) = tool.problem {
            print!(": {}", problem);
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them or set their paths in [tools].");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            print_config(&config);
        }
        None => {
            println!("No config file specified, using defaults");
            print_config(&Config::default());
        }
    }

    Ok(())
}

fn print_config(config: &Config) {
    println!("  Environment: {:?}", config.tools.environment);
    println!("  Configured tools: {}", config.tools.registry().len());
    match config.tools.timeout() {
        Some(timeout) => println!("  Timeout: {}s", timeout.as_secs()),
        None => println!("  Timeout: none"),
    }
    println!("  PTY wrapper: {}", config.platform.pty_wrapper.display());
    println!("  Remove HDR10+: {}", config.fix.remove_hdr10plus);
    println!(
        "  Accept mkvmerge warnings: {}",
        config.fix.accept_mkvmerge_warnings
    );
}
