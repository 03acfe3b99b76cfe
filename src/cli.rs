use clap::{Parser, Subcommand, ValueEnum};
use remuxcode_av::ContentType;
use remuxcode_common::JobKind;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remuxcode")]
#[command(author, version, about = "Automatic audio, video and stream cleanup for Radarr/Sonarr libraries")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the job workers and the HTTP API
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Convert a single file now, without the queue
    Run {
        /// Input file to process
        #[arg(required = true)]
        input: PathBuf,

        /// Which steps to run
        #[arg(long, value_enum, default_value_t = KindArg::Full)]
        kind: KindArg,

        /// Force a content type instead of detecting it
        #[arg(long, value_enum)]
        content_type: Option<ContentArg>,

        /// Show what would be done without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show what each pipeline would do to a file
    Analyze {
        /// File to analyze
        #[arg(required = true)]
        file: PathBuf,

        /// Force a content type instead of detecting it
        #[arg(long, value_enum)]
        content_type: Option<ContentArg>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available
    CheckTools,

    /// Validate configuration file
    Validate,

    /// Delete finished jobs older than the retention window
    Purge {
        /// Age in days (defaults to processing.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Display version information
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Audio,
    Video,
    Cleanup,
    Full,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Audio => JobKind::Audio,
            KindArg::Video => JobKind::Video,
            KindArg::Cleanup => JobKind::Cleanup,
            KindArg::Full => JobKind::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContentArg {
    Anime,
    LiveAction,
}

impl From<ContentArg> for ContentType {
    fn from(content: ContentArg) -> Self {
        match content {
            ContentArg::Anime => ContentType::Anime,
            ContentArg::LiveAction => ContentType::LiveAction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "remuxcode",
            "-v",
            "run",
            "/m/a.mkv",
            "--kind",
            "audio",
            "--content-type",
            "live-action",
            "--dry-run",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                input,
                kind,
                content_type,
                dry_run,
            } => {
                assert_eq!(input, PathBuf::from("/m/a.mkv"));
                assert_eq!(JobKind::from(kind), JobKind::Audio);
                assert_eq!(content_type.map(ContentType::from), Some(ContentType::LiveAction));
                assert!(dry_run);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_start_defaults() {
        let cli = Cli::parse_from(["remuxcode", "start", "--config", "/etc/remuxcode.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/remuxcode.toml")));
        assert!(matches!(
            cli.command,
            Commands::Start {
                host: None,
                port: None
            }
        ));
    }
}
