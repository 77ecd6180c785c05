use clap::Parser;
use std::path::PathBuf;

/// Define CLI arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Media search, resolution and streaming relay",
    long_about = "Searches and resolves media through yt-dlp, caches the short-lived\n\
                  media locations, and re-streams the bytes to clients over HTTP.\n\
                  \n\
                  Settings are read from a TOML file; flags and environment variables\n\
                  override the file."
)]
pub struct CliArgs {
    /// Configuration file (defaults to ./cadence.toml when present)
    #[arg(short, long, env = "CADENCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "CADENCE_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "CADENCE_PORT")]
    pub port: Option<u16>,

    /// Path or name of the yt-dlp executable
    #[arg(long, env = "CADENCE_YTDLP")]
    pub ytdlp: Option<PathBuf>,

    /// Outbound proxy for upstream media fetches (http, https or socks5 URL)
    #[arg(long, env = "CADENCE_PROXY")]
    pub proxy: Option<String>,

    /// Disable background prefetching of search hits
    #[arg(long)]
    pub no_prefetch: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable detailed debug logging")]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, env = "CADENCE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_overrides() {
        let args =
            CliArgs::try_parse_from(["cadence", "--port", "8080", "--no-prefetch", "-v"]).unwrap();
        assert_eq!(args.port, Some(8080));
        assert!(args.no_prefetch);
        assert!(args.verbose);
    }
}
