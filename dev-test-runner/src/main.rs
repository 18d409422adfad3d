//! End-to-end fixture runner: each fixture pairs a contract with payload cases,
//! the error each case should raise (kind + message regex) and the coverage
//! the whole run should reach.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, anyhow, bail};
use colored::Colorize;
use json_contract::{ApiConfig, ApiDefinition, ContractError};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Fixture {
    name: String,
    contract: ApiConfig,
    /// expected self-check failure; `None` means the contract must pass
    #[serde(default)]
    self_check: Option<ExpectedError>,
    #[serde(default)]
    cases: Vec<Case>,
    #[serde(default)]
    coverage: Option<ExpectedCoverage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Case {
    name: String,
    #[serde(default)]
    side: Side,
    #[serde(default = "default_status")]
    status: u16,
    content_type: Option<String>,
    payload: Value,
    request: Option<Value>,
    error: Option<ExpectedError>,
}

#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Side {
    Request,
    #[default]
    Response,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectedError {
    kind: String,
    /// regex matched against the rendered error message
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectedCoverage {
    request: Option<f64>,
    response: Option<f64>,
    #[serde(default)]
    uncovered: Vec<String>,
}

fn default_status() -> u16 {
    200
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ExpectedError {
    fn check(&self, error: &ContractError) -> anyhow::Result<()> {
        if error.kind().as_str() != self.kind {
            bail!("expected {} error, got {}: {error}", self.kind, error.kind().as_str());
        }
        if let Some(pattern) = self.message.as_deref() {
            let re = Regex::new(pattern).with_context(|| format!("invalid message regex: {pattern}"))?;
            if !re.is_match(&error.to_string()) {
                bail!("error message {:?} does not match /{pattern}/", error.to_string());
            }
        }
        Ok(())
    }
}

impl Fixture {
    fn load(path: &Path) -> anyhow::Result<Self> {
        let src = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let de = &mut serde_json::Deserializer::from_str(&src);
        serde_path_to_error::deserialize(de).map_err(|err| {
            let at = err.path().to_string();
            anyhow!("{}: at JSON path {at} → {}", path.display(), err.into_inner())
        })
    }

    /// Runs every case; returns the names of failed cases with their reasons.
    fn run(self) -> anyhow::Result<Vec<String>> {
        let mut failures = Vec::new();
        let mut api = ApiDefinition::new(self.contract).context("contract construction failed")?;

        match (api.test(), &self.self_check) {
            (Ok(()), None) => {}
            (Ok(()), Some(expected)) => failures.push(format!("self-check: expected {} error, passed", expected.kind)),
            (Err(error), Some(expected)) => {
                if let Err(reason) = expected.check(&error) {
                    failures.push(format!("self-check: {reason}"));
                }
                return Ok(failures);
            }
            (Err(error), None) => {
                failures.push(format!("self-check: {error}"));
                return Ok(failures);
            }
        }

        for case in &self.cases {
            let result = match case.side {
                Side::Request => api.validate_request(&case.payload),
                Side::Response => {
                    let content_type = case
                        .content_type
                        .clone()
                        .or_else(|| api.response().map(|r| r.content_type.clone()));
                    api.validate_response(case.status, content_type.as_deref(), &case.payload, case.request.as_ref())
                }
            };
            let outcome = match (result, &case.error) {
                (Ok(()), None) => Ok(()),
                (Ok(()), Some(expected)) => Err(anyhow!("expected {} error, passed", expected.kind)),
                (Err(error), Some(expected)) => expected.check(&error),
                (Err(error), None) => Err(anyhow!("unexpected error: {error}")),
            };
            if let Err(reason) = outcome {
                failures.push(format!("{}: {reason}", case.name));
            }
        }

        if let Some(expected) = &self.coverage {
            let report = api.coverage_report();
            let sides = [("request", expected.request, &report.request), ("response", expected.response, &report.response)];
            for (side, want, got) in sides {
                let Some(want) = want else { continue };
                let got = got.as_ref().map(|c| c.ratio).unwrap_or(1.0);
                if (got - want).abs() > 1e-9 {
                    failures.push(format!("{side} coverage: expected {want}, got {got}"));
                }
            }
            let mut uncovered: Vec<String> = report
                .request
                .iter()
                .chain(report.response.iter())
                .flat_map(|c| c.uncovered.iter().cloned())
                .collect();
            uncovered.sort();
            let mut want = expected.uncovered.clone();
            want.sort();
            if uncovered != want {
                failures.push(format!("uncovered fields: expected {want:?}, got {uncovered:?}"));
            }
        }
        Ok(failures)
    }
}

fn fixture_paths(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "json") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn main() -> ExitCode {
    let dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures"));
    let paths = match fixture_paths(&dir) {
        Ok(paths) => paths,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            return ExitCode::from(2);
        }
    };

    let mut failed = 0usize;
    for path in &paths {
        let result = Fixture::load(path).and_then(|fixture| {
            let name = fixture.name.clone();
            fixture.run().map(|failures| (name, failures))
        });
        match result {
            Ok((name, failures)) if failures.is_empty() => eprintln!("✅ {name}"),
            Ok((name, failures)) => {
                failed += 1;
                eprintln!("❌ {}", name.red());
                for failure in failures {
                    eprintln!("   {failure}");
                }
            }
            Err(error) => {
                failed += 1;
                eprintln!("❌ {}: {error:#}", path.display().to_string().red());
            }
        }
    }

    eprintln!("{} fixture(s), {} failed", paths.len(), failed);
    if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
