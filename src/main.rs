use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video2audio::cli::{AudioArgs, Cli, Commands};
use video2audio::config::Config;
use video2audio::convert::{
    check_source, BatchRequest, ConversionRequest, Converter, NoProgress, ProgressSink,
};
use video2audio::output::{self, ConsoleProgress};
use video2audio::paths::resolve_output_path;
use video2audio::transcoder::{FfmpegTranscoder, Transcoder};
use video2audio::utils;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };
    let config = Config::load(Some(&config_path)).await?;

    init_tracing(cli.verbose, &config.app.log_file);

    match cli.command {
        Commands::Convert {
            input,
            output,
            output_dir,
            audio,
            overwrite,
        } => {
            let transcoder = FfmpegTranscoder::new(config.tools.clone());
            warn_missing_dependencies(&transcoder).await;

            convert_file(
                transcoder,
                &config,
                input,
                output,
                output_dir,
                &audio,
                overwrite,
                cli.quiet,
            )
            .await
        }
        Commands::Batch {
            directory,
            output_dir,
            audio,
            overwrite,
        } => {
            let transcoder = FfmpegTranscoder::new(config.tools.clone());
            warn_missing_dependencies(&transcoder).await;

            let params = audio.apply(config.encoding_parameters());
            let mut request = BatchRequest::new(&directory, params)
                .with_overwrite(overwrite || config.app.overwrite);
            if let Some(output_dir) = output_dir {
                request = request.with_output_dir(output_dir);
            }

            println!("Converting directory: {}", directory.display());
            let converter = Arc::new(Converter::new(transcoder));
            let stop = stop_on_ctrl_c(Arc::clone(&converter));

            let summary = {
                let progress = progress_sink(cli.quiet);
                converter.convert_batch(&request, progress.as_ref()).await
            };
            stop.abort();

            output::print_batch_summary(&summary);
            Ok(exit_code(summary.all_succeeded()))
        }
        Commands::Info { input } => {
            let transcoder = FfmpegTranscoder::new(config.tools.clone());
            warn_missing_dependencies(&transcoder).await;

            check_source(&input)?;
            let info = transcoder
                .probe(&input)
                .await
                .with_context(|| format!("Failed to read media info for {}", input.display()))?;
            output::print_media_info(&info);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Formats => {
            output::print_formats();
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { show } => {
            if show {
                config.display(&config_path);
            } else {
                println!("Configuration file: {}", config_path.display());
                println!("Edit it to change the default encoding settings and tool paths.");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn convert_file(
    transcoder: FfmpegTranscoder,
    config: &Config,
    input: PathBuf,
    output: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    audio: &AudioArgs,
    overwrite: bool,
    quiet: bool,
) -> Result<ExitCode> {
    let params = audio.apply(config.encoding_parameters());
    let mut overwrite = overwrite || config.app.overwrite;

    let destination = match output {
        Some(path) => path,
        None => resolve_output_path(&input, output_dir.as_deref(), params.format)?,
    };

    if destination.exists() && !overwrite {
        if !confirm_overwrite(&destination)? {
            println!("Conversion cancelled");
            return Ok(ExitCode::SUCCESS);
        }
        overwrite = true;
    }

    let request = ConversionRequest::new(&input, params)
        .with_destination(&destination)
        .with_overwrite(overwrite);

    println!("Converting file: {}", input.display());
    let converter = Arc::new(Converter::new(transcoder));
    let stop = stop_on_ctrl_c(Arc::clone(&converter));

    let result = {
        let progress = progress_sink(quiet);
        converter.convert_one(&request, progress.as_ref()).await
    };
    stop.abort();

    output::print_conversion_result(&result);
    Ok(exit_code(result.is_success()))
}

/// Install console and log-file output
fn init_tracing(verbose: bool, log_file: &Path) {
    let default_filter = if verbose {
        "video2audio=debug"
    } else {
        "video2audio=info"
    };

    let file_layer = match fs_err::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
    {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("⚠️  Logging to file disabled: {}", e);
            None
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
}

/// Warn (non-fatally) about missing external tools
async fn warn_missing_dependencies<T: Transcoder>(transcoder: &T) {
    let missing = utils::check_dependencies(transcoder).await;
    if !missing.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}

fn progress_sink(quiet: bool) -> Box<dyn ProgressSink> {
    if quiet {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::new())
    }
}

/// Ask on the terminal whether an existing output may be replaced
fn confirm_overwrite(destination: &Path) -> Result<bool> {
    let term = console::Term::stdout();
    term.write_str(&format!(
        "Output file already exists: {}\nOverwrite? (y/N): ",
        destination.display()
    ))?;
    let answer = term.read_line().context("Failed to read answer")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Stop the in-flight conversion on Ctrl-C
fn stop_on_ctrl_c<T: Transcoder + 'static>(converter: Arc<Converter<T>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n⚠️  Interrupted, stopping conversion...");
            converter.stop_in_flight();
        }
    })
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
