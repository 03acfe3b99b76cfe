mod cli;

use remuxcode::{
    arr::{ArrRegistry, RenameProtocol},
    config,
    conversion::{Analysis, ConversionService},
    processor::JobProcessor,
    server::{self, AppContext},
    state::{JobQueue, SubsystemResult},
};
use remuxcode_av::{cleanup_orphans, ContentType};
use remuxcode_common::{JobId, JobKind};
use remuxcode_db::pool::{init_pool, DbPool};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn open_store(config: &config::Config, config_path: Option<&Path>) -> Result<DbPool> {
    let resolved = config::find_config(config_path);
    let data_dir = config::data_dir(config, resolved.as_deref());
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let db_path = data_dir.join("remuxcode.db");
    let db_path_str = db_path.to_string_lossy();
    tracing::info!("Opening job store at {}", db_path_str);
    Ok(init_pool(&db_path_str)?)
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting remuxcode {}", env!("CARGO_PKG_VERSION"));

    let pool = open_store(&config, config_path)?;
    let config = Arc::new(config);
    let arrs = ArrRegistry::from_config(&config.arrs);
    let service = Arc::new(ConversionService::from_config(config.clone(), arrs.clone()));

    // Temp directories left behind by a previous run
    let mut roots = service.paths().host_roots();
    roots.extend(config.processing.temp_dir.iter().cloned());
    let removed = cleanup_orphans(&roots);
    if removed > 0 {
        tracing::info!("Removed {} orphaned temp file(s)", removed);
    }

    let queue = Arc::new(JobQueue::new(pool));
    if let Err(e) = queue.purge(config.processing.retention_days) {
        tracing::warn!("Retention sweep failed: {}", e);
    }
    queue.resume_pending()?;

    let shutdown = CancellationToken::new();
    let processor = Arc::new(JobProcessor::new(
        queue.clone(),
        service.clone(),
        arrs.clone(),
    ));
    let workers = processor.start(config.processing.workers, shutdown.clone());

    let server_result = server::start_server(AppContext::new(queue, service, arrs)).await;

    // Workers finish the job they are on, then exit
    tracing::info!("Shutting down...");
    shutdown.cancel();
    futures::future::join_all(workers).await;

    server_result
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "remuxcode=debug,remuxcode_av=debug,remuxcode_db=debug,tower_http=debug".to_string()
        } else {
            "remuxcode=info,remuxcode_av=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, config_path))
        }
        Commands::Run {
            input,
            kind,
            content_type,
            dry_run,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_file(
                &input,
                kind.into(),
                content_type.map(Into::into),
                dry_run,
                config_path,
            ))
        }
        Commands::Analyze {
            file,
            content_type,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(analyze_file(
                &file,
                content_type.map(Into::into),
                json,
                config_path,
            ))
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate => validate_config(config_path),
        Commands::Purge { days } => purge(days, config_path),
        Commands::Version => {
            println!("remuxcode {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_service(config_path: Option<&Path>) -> Result<(ConversionService, ArrRegistry)> {
    let config = Arc::new(config::load_config_or_default(config_path)?);
    let arrs = ArrRegistry::from_config(&config.arrs);
    Ok((ConversionService::from_config(config, arrs.clone()), arrs))
}

async fn run_file(
    input: &Path,
    kind: JobKind,
    content_type: Option<ContentType>,
    dry_run: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let (service, arrs) = build_service(config_path)?;

    if dry_run {
        let analysis = service.analyze(input, content_type).await?;
        print_analysis(&analysis);
        print_commands(&analysis, kind, input);
        println!("\n[DRY RUN] Nothing was changed");
        return Ok(());
    }

    let job_id = JobId::new();
    tracing::info!("Processing {:?} as {} (job {})", input, kind, job_id);
    let result = service
        .process(input, kind, job_id.as_str(), content_type)
        .await?;

    for (step, outcome) in [
        ("Audio", &result.audio),
        ("Video", &result.video),
        ("Cleanup", &result.cleanup),
    ] {
        if let Some(outcome) = outcome {
            println!("{:<8} {}", step, describe(outcome));
        }
    }

    if result.any_success() {
        RenameProtocol::default().trigger(&arrs, input).await;
    }

    match result.first_error() {
        Some(error) => anyhow::bail!(error),
        None => Ok(()),
    }
}

fn describe(outcome: &SubsystemResult) -> String {
    if outcome.skipped {
        "skipped (nothing to do)".to_string()
    } else if outcome.success {
        format!("✓ {}", outcome.detail)
    } else {
        format!("✗ {}", outcome.error.as_deref().unwrap_or("failed"))
    }
}

async fn analyze_file(
    file: &Path,
    content_type: Option<ContentType>,
    json: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let (service, _) = build_service(config_path)?;
    let analysis = service.analyze(file, content_type).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn print_analysis(analysis: &Analysis) {
    let media = &analysis.media;
    println!("File: {}", media.file_path.display());
    println!("Container: {}", media.container);
    println!("Size: {} bytes", media.size);
    if let Some(duration) = media.duration {
        let secs = duration as u64;
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    }
    if let Some(video) = media.primary_video() {
        println!(
            "Video: {} {}x{} {}-bit",
            video.codec, video.width, video.height, video.bit_depth
        );
    }
    println!("Content type: {}", analysis.content_type.as_str());
    println!("Original language: {}", analysis.original_language);

    println!("\nAudio Tracks: {}", media.audio_streams.len());
    for stream in &media.audio_streams {
        print!("  [{}] {} {}ch", stream.index, stream.codec, stream.channels);
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        println!();
    }

    println!("\nSubtitle Tracks: {}", media.subtitle_streams.len());
    for stream in &media.subtitle_streams {
        print!("  [{}] {}", stream.index, stream.codec);
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        if stream.forced {
            print!(" [forced]");
        }
        println!();
    }

    println!();
    match &analysis.audio {
        Some(plan) => {
            println!("Audio: convert {} stream(s)", plan.conversions().len());
            for c in plan.conversions() {
                println!(
                    "  [{}] {} {}ch -> {} {}k",
                    c.stream_index,
                    c.source_codec,
                    c.channels,
                    c.target.codec.ffmpeg_name(),
                    c.target.bitrate_kbps
                );
            }
        }
        None => println!("Audio: no conversion needed"),
    }
    match &analysis.video {
        Some(plan) => println!(
            "Video: {} -> {} (crf {}, preset {})",
            plan.source_codec, plan.target_codec, plan.profile.crf, plan.profile.preset
        ),
        None => println!("Video: no conversion needed"),
    }
    match &analysis.cleanup {
        Some(plan) => println!(
            "Cleanup: remove audio {:?}, subtitles {:?}",
            plan.audio_removed, plan.subtitle_removed
        ),
        None => println!("Cleanup: nothing to remove"),
    }
}

fn print_commands(analysis: &Analysis, kind: JobKind, input: &Path) {
    let output = Path::new("<output>");
    println!("\nCommands:");
    if kind.includes_audio() {
        if let Some(plan) = &analysis.audio {
            println!("  {}", plan.command(input, output));
        }
    }
    if kind.includes_video() {
        if let Some(plan) = &analysis.video {
            println!("  {}", plan.command(input, output));
        }
    }
    if kind.includes_cleanup() {
        if let Some(plan) = &analysis.cleanup {
            println!("  {}", plan.command(input, output));
        }
    }
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = remuxcode_av::check_tools(
        config.tools.ffmpeg_path.as_deref(),
        config.tools.ffprobe_path.as_deref(),
    );
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

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are required")
    }
}

fn validate_config(config_path: Option<&Path>) -> Result<()> {
    match config::find_config(config_path) {
        Some(p) => println!("Validating config: {:?}", p),
        None => println!("No config file found, using defaults"),
    }

    let config = config::load_config_or_default(config_path)?;
    println!("✓ Configuration is valid");
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!(
        "  Auth enabled: {}",
        config.server.api_key().is_some()
    );
    println!("  Workers: {}", config.processing.workers);
    println!("  Retention: {} days", config.processing.retention_days);
    println!(
        "  Audio: {}  Video: {}  Cleanup: {}",
        config.audio.enabled, config.video.enabled, config.cleanup.enabled
    );
    println!(
        "  Arr integrations: {} ({} enabled)",
        config.arrs.len(),
        config.arrs.iter().filter(|a| a.enabled).count()
    );
    for arr in &config.arrs {
        println!("    {} ({}) {}", arr.name, arr.arr_type, arr.url);
    }
    println!("  Path mappings: {}", config.path_mappings.len());
    for mapping in &config.path_mappings {
        println!("    {} -> {}", mapping.container, mapping.host);
    }

    Ok(())
}

fn purge(days: Option<u32>, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let days = days.unwrap_or(config.processing.retention_days);
    let queue = JobQueue::new(open_store(&config, config_path)?);
    let removed = queue.purge(days)?;
    println!("Purged {} job(s) older than {} days", removed, days);
    Ok(())
}
