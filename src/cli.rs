// src/cli.rs
use clap::Parser;

/// cname-sentry: dangling CNAME monitor
///
/// Periodically resolves a list of subdomains, flags canonical names that point
/// at takeover-prone cloud providers, and alerts once per new finding.
#[derive(Parser, Debug, Clone)]
#[command(name = "cname-sentry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Input & Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config", default_value = "config.toml")]
    pub config: String,

    /// Scan a single domain and exit (repeatable)
    #[arg(short = 'd', long = "domain")]
    pub domains: Vec<String>,

    /// Scan every domain in this file once and exit
    #[arg(short = 'f', long = "file")]
    pub file: Option<String>,

    /// Run one sweep over the configured target list, then exit
    #[arg(long = "once")]
    pub once: bool,

    /// Print the last exported snapshot and exit
    #[arg(long = "export-snapshot")]
    pub export_snapshot: bool,

    /// Print the N most recent stored results as JSONL and exit
    #[arg(long = "history", value_name = "N")]
    pub history: Option<usize>,

    // ===== Output Format =====
    /// Output results in JSONL format to stdout
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Output results in CSV format to stdout
    #[arg(long = "csv")]
    pub csv: bool,

    // ===== Output Destination =====
    /// Write output to file instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,

    /// Disable alert notifications even if configured
    #[arg(long = "no-notify")]
    pub no_notify: bool,

    // ===== Performance =====
    /// Override sweep interval in seconds
    #[arg(long = "interval")]
    pub interval: Option<u64>,

    /// Override maximum concurrent lookups
    #[arg(long = "concurrency")]
    pub concurrency: Option<usize>,

    // ===== Display & Statistics =====
    /// Print statistics on exit
    #[arg(long = "stats")]
    pub stats: bool,

    /// Disable progress indicator
    #[arg(long = "no-progress")]
    pub no_progress: bool,

    // ===== Logging =====
    /// Verbose logging (set log level to debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    /// Validate flag combinations and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.json && self.csv {
            anyhow::bail!(
                "Cannot specify multiple output formats. \
                Choose one of: --json or --csv"
            );
        }

        let mode_count = [
            !self.domains.is_empty(),
            self.file.is_some(),
            self.once,
            self.export_snapshot,
            self.history.is_some(),
        ]
        .iter()
        .filter(|&&x| x)
        .count();

        if mode_count > 1 {
            anyhow::bail!(
                "Cannot combine run modes. \
                Choose one of: --domain, --file, --once, --export-snapshot, or --history"
            );
        }

        if self.domains.iter().any(|d| d.trim().is_empty()) {
            anyhow::bail!("--domain must not be empty");
        }

        if self.interval == Some(0) {
            anyhow::bail!("--interval must be greater than 0");
        }

        if self.concurrency == Some(0) {
            anyhow::bail!("--concurrency must be greater than 0");
        }

        // Verbose and quiet are mutually exclusive
        if self.verbose && self.quiet {
            anyhow::bail!("Cannot specify both --verbose and --quiet");
        }

        Ok(())
    }

    /// Determine the run mode based on flags
    pub fn run_mode(&self) -> RunMode {
        if self.export_snapshot {
            RunMode::ExportSnapshot
        } else if let Some(limit) = self.history {
            RunMode::History(limit)
        } else if !self.domains.is_empty() {
            RunMode::Domains(self.domains.clone())
        } else if let Some(ref file) = self.file {
            RunMode::File(file.clone())
        } else if self.once {
            RunMode::Once
        } else {
            RunMode::Scheduled
        }
    }

    /// Determine the output format based on flags
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Human
        }
    }

    /// Check if progress indicator should be enabled
    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.json && !self.csv
    }

    /// Determine log level based on verbose/quiet flags, falling back to `configured`
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            configured
        }
    }
}

/// What the binary does after startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Sweep the configured list at startup and on every interval (default)
    Scheduled,
    /// One sweep over the configured list
    Once,
    /// One sweep over the given domains
    Domains(Vec<String>),
    /// One sweep over the domains listed in a file
    File(String),
    /// Print the last snapshot
    ExportSnapshot,
    /// Print recent stored results
    History(usize),
}

impl RunMode {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, RunMode::Scheduled)
    }
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text output (default)
    Human,
    /// JSON Lines format (one JSON object per line)
    Json,
    /// CSV format
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["cname-sentry"]);
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_default_mode_is_scheduled() {
        let cli = Cli::parse_from(["cname-sentry"]);
        assert_eq!(cli.run_mode(), RunMode::Scheduled);
        assert!(cli.run_mode().is_scheduled());
    }

    #[test]
    fn test_domain_mode() {
        let cli = Cli::parse_from(["cname-sentry", "-d", "a.example.com", "--domain", "b.example.com"]);
        assert!(cli.validate().is_ok());
        assert_eq!(
            cli.run_mode(),
            RunMode::Domains(vec!["a.example.com".to_string(), "b.example.com".to_string()])
        );
    }

    #[test]
    fn test_file_and_once_modes() {
        let cli = Cli::parse_from(["cname-sentry", "--file", "subs.txt"]);
        assert_eq!(cli.run_mode(), RunMode::File("subs.txt".to_string()));

        let cli = Cli::parse_from(["cname-sentry", "--once"]);
        assert_eq!(cli.run_mode(), RunMode::Once);

        let cli = Cli::parse_from(["cname-sentry", "--export-snapshot"]);
        assert_eq!(cli.run_mode(), RunMode::ExportSnapshot);

        let cli = Cli::parse_from(["cname-sentry", "--history", "20"]);
        assert_eq!(cli.run_mode(), RunMode::History(20));
    }

    #[test]
    fn test_multiple_modes_invalid() {
        let cli = Cli::parse_from(["cname-sentry", "--once", "--domain", "a.example.com"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_empty_domain_invalid() {
        let cli = Cli::parse_from(["cname-sentry", "--domain", " "]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_output_formats() {
        let cli = Cli::parse_from(["cname-sentry", "--json"]);
        assert_eq!(cli.output_format(), OutputFormat::Json);

        let cli = Cli::parse_from(["cname-sentry", "--csv"]);
        assert_eq!(cli.output_format(), OutputFormat::Csv);

        let cli = Cli::parse_from(["cname-sentry"]);
        assert_eq!(cli.output_format(), OutputFormat::Human);
    }

    #[test]
    fn test_multiple_formats_invalid() {
        let cli = Cli::parse_from(["cname-sentry", "--json", "--csv"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_zero_overrides_invalid() {
        let cli = Cli::parse_from(["cname-sentry", "--interval", "0"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["cname-sentry", "--concurrency", "0"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_verbose_and_quiet_invalid() {
        let cli = Cli::parse_from(["cname-sentry", "--verbose", "--quiet"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_progress_disabled_for_json() {
        let cli = Cli::parse_from(["cname-sentry", "--json"]);
        assert!(!cli.should_show_progress());

        let cli = Cli::parse_from(["cname-sentry"]);
        assert!(cli.should_show_progress());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::parse_from(["cname-sentry", "--verbose"]);
        assert_eq!(cli.log_level("info"), "debug");

        let cli = Cli::parse_from(["cname-sentry", "-q"]);
        assert_eq!(cli.log_level("info"), "warn");

        let cli = Cli::parse_from(["cname-sentry"]);
        assert_eq!(cli.log_level("trace"), "trace");
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from([
            "cname-sentry",
            "-c", "test.toml",
            "-j",
            "-o", "out.jsonl",
            "-f", "subs.txt",
        ]);
        assert_eq!(cli.config, "test.toml");
        assert!(cli.json);
        assert_eq!(cli.output, Some("out.jsonl".to_string()));
        assert_eq!(cli.file, Some("subs.txt".to_string()));
    }
}
