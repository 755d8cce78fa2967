use ats_checker::config::{
    Config, PrometheusConfig, DEFAULT_CONFIG_FILE, TRANSPORT_FAILURE_EXIT_CODE,
};
use ats_checker::report::Report;
use ats_checker::{AtsError, Response};
use clap::Parser;
use std::path::Path;
use std::process::exit;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod metrics;

const USAGE: &str = "Usage: ats_checker https://path/to/url";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// URL to check, exactly one
    urls: Vec<String>,

    /// Allow connecting to TLS sites without verifying their certificate
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Only check protocol version and cipher suite
    #[arg(long)]
    skip_signature_check: bool,

    /// Connect, read and write timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// PEM bundle of CA certificates used to verify the server
    #[arg(long)]
    ca_file: Option<String>,

    /// Output format: text, json or summary
    #[arg(short, long)]
    output: Option<String>,

    /// Exit code when the URL is not acceptable for ATS
    #[arg(long)]
    exit_code: Option<i32>,

    /// Push the verdict to a Prometheus Push Gateway
    #[arg(long)]
    prometheus: bool,

    /// Prometheus Push Gateway address
    #[arg(long)]
    prometheus_address: Option<String>,

    /// Configuration file (defaults to ats_checker.toml when present)
    #[arg(short, long)]
    config: Option<String>,

    /// Print an example configuration file and exit
    #[arg(long)]
    example_config: bool,

    /// Log debug information to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// The single URL to check, or `None` when usage should be printed.
    ///
    /// A wrong argument count is not a failure: usage is printed and the
    /// process exits 0.
    fn target(&self) -> Option<&str> {
        match self.urls.as_slice() {
            [url] => Some(url.as_str()),
            _ => None,
        }
    }

    fn to_config(&self) -> Config {
        Config {
            insecure: if self.insecure { Some(true) } else { None },
            check_signature: if self.skip_signature_check {
                Some(false)
            } else {
                None
            },
            timeout_secs: self.timeout,
            ca_file: self.ca_file.clone(),
            output: self.output.clone(),
            exit_code: self.exit_code,
            prometheus: Some(PrometheusConfig {
                enabled: if self.prometheus { Some(true) } else { None },
                address: self.prometheus_address.clone(),
            }),
        }
    }
}

/// The single stderr report of a failed request: message, then the error dump.
fn transport_failure_message(error: &AtsError) -> String {
    format!("{}: {:#?}", error, error)
}

fn initialize_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Config {
    let file_config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                exit(TRANSPORT_FAILURE_EXIT_CODE);
            }
        },
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => match Config::from_file(DEFAULT_CONFIG_FILE) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Failed to load config {}: {}", DEFAULT_CONFIG_FILE, e);
                exit(TRANSPORT_FAILURE_EXIT_CODE);
            }
        },
        None => None,
    };

    let mut config = Config::default();
    if let Some(file_config) = file_config {
        config = config.merge_with(file_config);
    }
    let config = config.merge_with(args.to_config());

    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        exit(TRANSPORT_FAILURE_EXIT_CODE);
    }
    config
}

fn main() {
    let args = Args::parse();
    initialize_logging(args.verbose);

    if args.example_config {
        println!("{}", Config::example_toml());
        exit(0);
    }

    let url = match args.target() {
        Some(url) => url,
        None => {
            println!("{}", USAGE);
            exit(0);
        }
    };

    let config = load_config(&args);
    debug!("effective configuration: {:?}", config);

    let response = match Response::fetch(url, &config.fetch_options()) {
        Ok(response) => response,
        Err(e) => {
            eprintln!("{}", transport_failure_message(&e));
            exit(TRANSPORT_FAILURE_EXIT_CODE);
        }
    };

    let report = Report::new(response, &config.checker());
    println!("{}", report.render(config.output_format()));

    if config.prometheus_enabled() {
        if let Some(address) = config.prometheus_address() {
            if let Err(e) = metrics::prom::prometheus_metrics(&report, address) {
                eprintln!("\nFailed to push metrics to prometheus: {}", e);
            }
        }
    }

    if report.acceptable {
        exit(0);
    }
    exit(config.failure_exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_single_url() {
        let args = Args::parse_from(["ats_checker", "https://example.com"]);
        assert_eq!(args.urls, vec!["https://example.com".to_string()]);
        assert!(!args.insecure);
    }

    #[test]
    fn test_wrong_url_count_prints_usage() {
        let none = Args::parse_from(["ats_checker"]);
        assert_eq!(none.target(), None);
        let two = Args::parse_from(["ats_checker", "https://a.example", "https://b.example"]);
        assert_eq!(two.target(), None);
        let one = Args::parse_from(["ats_checker", "-k", "https://a.example"]);
        assert_eq!(one.target(), Some("https://a.example"));
    }

    #[test]
    fn test_transport_failure_reported_once() {
        let err = AtsError::HandshakeFailed {
            details: "certificate verify failed".to_string(),
        };
        let message = transport_failure_message(&err);
        assert!(message.starts_with("TLS handshake failed: certificate verify failed: HandshakeFailed {"));
        assert_eq!(message.matches("TLS handshake failed").count(), 1);
    }

    #[test]
    fn test_args_to_config_only_sets_given_flags() {
        let args = Args::parse_from(["ats_checker", "-k", "--skip-signature-check", "https://example.com"]);
        let config = args.to_config();
        assert_eq!(config.insecure, Some(true));
        assert_eq!(config.check_signature, Some(false));
        assert_eq!(config.output, None);
        assert_eq!(config.exit_code, None);

        let merged = Config::default().merge_with(config);
        assert!(merged.fetch_options().insecure);
        assert!(!merged.checker().check_signature);
        assert_eq!(merged.failure_exit_code(), 1);
    }

    #[test]
    fn test_args_without_flags_keep_defaults() {
        let args = Args::parse_from(["ats_checker", "https://example.com"]);
        let merged = Config::default().merge_with(args.to_config());
        assert_eq!(merged, Config::default());
    }
}
