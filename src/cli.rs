//! CLI: self-check contracts, validate payloads against a contract.
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;

use crate::api::{ApiDefinition, SchemaCoverage};
use crate::path_de::{from_str_with_path, load_api_config};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check JSON API contracts and validate request/response payloads against them
#[derive(Parser, Debug)]
#[command(name = "json-contract", version)]
pub struct CommandLineInterface {
    /// print every payload and log at info level
    #[arg(long, short, global = true, env = "JSON_CONTRACT_VERBOSE", conflicts_with = "quiet")]
    verbose: bool,

    /// only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run the definition self-check on one or more contract files
    Check(CheckOut),
    /// validate payload files against one contract
    Validate(ValidateOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    /// contract files (literal paths or quoted glob patterns)
    #[arg(num_args = 1.., required = true)]
    contracts: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Side {
    Request,
    Response,
}

#[derive(clap::Parser, Debug)]
struct ValidateOut {
    /// contract file the payloads are checked against
    #[arg(long, short)]
    contract: PathBuf,

    #[command(flatten)]
    input_settings: InputSettings,

    /// which schema of the contract the payloads belong to
    #[arg(long, value_enum, default_value_t = Side::Response)]
    side: Side,

    /// response status code
    #[arg(long, default_value_t = 200)]
    status: u16,

    /// response Content-Type header (defaults to the contract's)
    #[arg(long)]
    content_type: Option<String>,

    /// request params file handed to derived rules when validating responses
    #[arg(long)]
    request_params: Option<PathBuf>,

    /// skip the contract self-check
    #[arg(long, env = "JSON_CONTRACT_SKIP_CHECK")]
    skip_check: bool,

    /// fail unless at least this share of schema fields was exercised (0..=1)
    #[arg(long)]
    require_coverage: Option<f64>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_process(&self, mut apply: impl FnMut(&str, Value)) -> anyhow::Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;
            let documents: Vec<(String, &str)> = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(n, line)| (format!("{source_path_str}:{}", n + 1), line))
                    .collect()
            } else {
                vec![(source_path_str.clone(), source.as_str())]
            };
            for (label, text) in documents {
                let json_value = serde_json::from_str::<Value>(text)
                    .with_context(|| format!("failed to parse JSON source file ({label})"))?;
                let json_value = match self.json_pointer.as_deref() {
                    None => json_value,
                    Some(pointer) => json_value
                        .pointer(pointer)
                        .cloned()
                        .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {label}"))?,
                };
                apply(&label, json_value);
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Default log filter implied by `--verbose` / `--quiet`.
    pub fn log_level(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (true, _) => "info",
            (_, true) => "error",
            _ => "warn",
        }
    }

    /// Returns `true` when every contract or payload passed.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Validate(target) => target.run(self.verbose),
        }
    }
}

impl CheckOut {
    fn run(&self) -> anyhow::Result<bool> {
        let paths = resolve_file_path_patterns(&self.contracts).context("failed to resolve contract file paths")?;
        let mut passed = true;
        for path in paths {
            match check_contract(&path) {
                Ok(api) => println!("{} {} ({} {})", "ok".green(), path.display(), api.method(), api.endpoint()),
                Err(error) => {
                    passed = false;
                    println!("{} {}: {error:#}", "FAIL".red().bold(), path.display());
                }
            }
        }
        Ok(passed)
    }
}

impl ValidateOut {
    fn run(&self, verbose: bool) -> anyhow::Result<bool> {
        let config = load_api_config(&self.contract)?;
        let mut api = ApiDefinition::new(config)
            .with_context(|| format!("failed to build contract {}", self.contract.display()))?;
        if !self.skip_check {
            api.test().with_context(|| format!("contract {} failed its self-check", self.contract.display()))?;
        }
        let request_params = self.request_params.as_deref().map(read_json).transpose()?;
        let content_type = match &self.content_type {
            Some(ct) => Some(ct.clone()),
            None => api.response().map(|r| r.content_type.clone()),
        };

        let mut passed = true;
        let mut count = 0usize;
        self.input_settings.load_process(|label, payload| {
            count += 1;
            if verbose {
                eprintln!("{label}: {}", serde_json::to_string_pretty(&payload).unwrap_or_default());
            }
            let result = match self.side {
                Side::Request => api.validate_request(&payload),
                Side::Response => {
                    api.validate_response(self.status, content_type.as_deref(), &payload, request_params.as_ref())
                }
            };
            match result {
                Ok(()) => {
                    tracing::info!(payload = label, "valid");
                    println!("{} {label}", "ok".green());
                }
                Err(error) => {
                    passed = false;
                    println!("{} {label}: [{}] {error}", "FAIL".red().bold(), error.kind().as_str());
                }
            }
        })?;

        let report = api.coverage_report();
        let coverage = match self.side {
            Side::Request => report.request,
            Side::Response => report.response,
        };
        if let Some(coverage) = coverage.as_ref() {
            print_coverage(api.name(), coverage);
        }
        if let Some(required) = self.require_coverage {
            let ratio = coverage.map(|c| c.ratio).unwrap_or(1.0);
            if ratio < required {
                println!(
                    "{} coverage {:.1}% is below the required {:.1}%",
                    "FAIL".red().bold(),
                    ratio * 100.0,
                    required * 100.0
                );
                passed = false;
            }
        }
        println!("{count} payload(s) checked");
        Ok(passed)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_contract(path: &Path) -> anyhow::Result<ApiDefinition> {
    let api = ApiDefinition::new(load_api_config(path)?)?;
    api.test()?;
    Ok(api)
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let src = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    from_str_with_path(&src).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_coverage(name: &str, coverage: &SchemaCoverage) {
    let percent = format!("{:.1}%", coverage.ratio * 100.0);
    let percent = if coverage.uncovered.is_empty() { percent.green() } else { percent.yellow() };
    println!("coverage {name}: {percent}");
    for field in &coverage.uncovered {
        println!("  {} {field}", "uncovered".dimmed());
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validate_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "json-contract",
            "validate",
            "--contract",
            "api.json",
            "--input",
            "a.json",
            "b.json",
            "--side",
            "request",
            "--require-coverage",
            "0.8",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "info");
        let Command::Validate(v) = &cli.cmd else {
            panic!("expected validate");
        };
        assert_eq!(v.side, Side::Request);
        assert_eq!(v.input_settings.input, vec!["a.json", "b.json"]);
        assert_eq!(v.require_coverage, Some(0.8));
        assert_eq!(v.status, 200);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(CommandLineInterface::try_parse_from(["json-contract", "-v", "-q", "check", "a.json"]).is_err());
        let cli = CommandLineInterface::try_parse_from(["json-contract", "check", "a.json", "-q"]).unwrap();
        assert_eq!(cli.log_level(), "error");
    }

    #[test]
    fn literal_paths_pass_through_and_empty_globs_fail() {
        assert_eq!(resolve_file_path_patterns(["x.json"]).unwrap(), vec![PathBuf::from("x.json")]);
        assert!(resolve_file_path_patterns(["no-such-dir-*/*.json"]).is_err());
    }
}
