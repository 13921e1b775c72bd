//! Execution strategy chain for the usage-reporting command.
//!
//! The external command can be unreachable for environment-dependent
//! reasons: launchd strips `PATH`, some launch mechanisms restrict forking
//! through wrapper shims, node installs move around. Instead of encoding
//! one invocation style, the reader keeps an ordered list of
//! [`InvocationStrategy`] implementations and walks it until one produces a
//! well-formed report.
//!
//! Strategy selection is adaptive: a strategy that failed on recent calls is
//! deprioritized (stable sort by consecutive failures) but never removed —
//! the environment can change between ticks. When every strategy fails the
//! reader returns an explicit degraded [`UsageReport`] with no blocks, and
//! the tick proceeds on empty input.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::schema::CollectorConfig;
use crate::config::xdg;
use crate::daemon::pool::{CommandSpec, SubprocessPool};

/// Token counts reported per usage block, split by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCounts {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens written to the prompt cache.
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    /// Tokens served from the prompt cache.
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenCounts {
    /// Cache creation + cache read tokens.
    pub fn cache_total(&self) -> u64 {
        self.cache_creation_input_tokens + self.cache_read_input_tokens
    }
}

/// One raw usage block from the external command. Immutable once read;
/// the source of truth for a tick.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBlock {
    /// Session identifier.
    pub id: String,
    /// Session start (UTC).
    pub start_time: DateTime<Utc>,
    /// Session window end, when reported.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Whether the session is still accumulating usage.
    #[serde(default)]
    pub is_active: bool,
    /// Token counts by category.
    pub token_counts: TokenCounts,
    /// Session cost in USD.
    #[serde(rename = "costUSD")]
    pub cost_usd: f64,
}

/// Parsed output of one collection call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageReport {
    /// Usage blocks; empty on a degraded result.
    pub blocks: Vec<UsageBlock>,
}

/// One way of invoking the usage-reporting command.
pub trait InvocationStrategy: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Build the command to run, or `None` when this strategy's
    /// prerequisites are missing (counted as a failure so the strategy is
    /// deprioritized, but re-checked on later calls).
    fn command(&self, since: Option<NaiveDate>) -> Option<CommandSpec>;
}

fn since_args(since: Option<NaiveDate>) -> Vec<String> {
    match since {
        Some(date) => vec!["--since".to_string(), date.format("%Y%m%d").to_string()],
        None => Vec::new(),
    }
}

/// Invokes a wrapper script installed next to the config. The wrapper can
/// set up whatever environment the direct command needs (nvm, PATH).
pub struct WrapperScriptStrategy {
    path: PathBuf,
    args: Vec<String>,
}

impl WrapperScriptStrategy {
    /// Wrapper at an explicit path.
    pub fn new(path: PathBuf, args: Vec<String>) -> Self {
        Self { path, args }
    }
}

impl InvocationStrategy for WrapperScriptStrategy {
    fn name(&self) -> &'static str {
        "wrapper-script"
    }

    fn command(&self, since: Option<NaiveDate>) -> Option<CommandSpec> {
        if !self.path.is_file() {
            return None;
        }
        let mut args = self.args.clone();
        args.extend(since_args(since));
        Some(CommandSpec::new(self.path.display().to_string(), args))
    }
}

/// Invokes the command directly, resolved through the pool's augmented PATH.
pub struct DirectCommandStrategy {
    program: String,
    args: Vec<String>,
}

impl DirectCommandStrategy {
    /// Direct invocation of `program`.
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl InvocationStrategy for DirectCommandStrategy {
    fn name(&self) -> &'static str {
        "direct-command"
    }

    fn command(&self, since: Option<NaiveDate>) -> Option<CommandSpec> {
        let mut args = self.args.clone();
        args.extend(since_args(since));
        Some(CommandSpec::new(self.program.clone(), args))
    }
}

/// Runs the command through `/bin/sh -c`, sidestepping launch environments
/// that restrict direct process forks.
pub struct ShellFallbackStrategy {
    program: String,
    args: Vec<String>,
}

impl ShellFallbackStrategy {
    /// Shell invocation of `program`.
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl InvocationStrategy for ShellFallbackStrategy {
    fn name(&self) -> &'static str {
        "shell-fallback"
    }

    fn command(&self, since: Option<NaiveDate>) -> Option<CommandSpec> {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.clone());
        parts.extend(since_args(since));
        Some(CommandSpec::new(
            "/bin/sh",
            vec!["-c".to_string(), parts.join(" ")],
        ))
    }
}

/// Runs the strategy chain against the subprocess pool.
pub struct UsageReader {
    strategies: Vec<Box<dyn InvocationStrategy>>,
    failures: Vec<u32>,
    pool: SubprocessPool,
    wait_timeout: Duration,
    consecutive_chain_failures: u32,
}

impl UsageReader {
    /// Build the default chain from configuration: wrapper script, direct
    /// command, shell fallback, in that order.
    pub fn new(cfg: &CollectorConfig, pool: SubprocessPool) -> Self {
        let wrapper_path = cfg
            .wrapper_path
            .as_deref()
            .map(xdg::expand_tilde)
            .unwrap_or_else(|| xdg::config_dir().join("ccusage-wrapper.sh"));

        let strategies: Vec<Box<dyn InvocationStrategy>> = vec![
            Box::new(WrapperScriptStrategy::new(wrapper_path, cfg.args.clone())),
            Box::new(DirectCommandStrategy::new(cfg.command.clone(), cfg.args.clone())),
            Box::new(ShellFallbackStrategy::new(cfg.command.clone(), cfg.args.clone())),
        ];
        Self::with_strategies(strategies, pool, cfg.wait_timeout())
    }

    /// Build a reader over an explicit strategy list.
    pub fn with_strategies(
        strategies: Vec<Box<dyn InvocationStrategy>>,
        pool: SubprocessPool,
        wait_timeout: Duration,
    ) -> Self {
        let failures = vec![0; strategies.len()];
        Self {
            strategies,
            failures,
            pool,
            wait_timeout,
            consecutive_chain_failures: 0,
        }
    }

    /// Number of consecutive calls on which every strategy failed. Reset
    /// to zero by any successful collection.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_chain_failures
    }

    /// Strategy indices ordered for the next attempt: fewest recent
    /// failures first, configured order among ties.
    fn attempt_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.strategies.len()).collect();
        order.sort_by_key(|&i| self.failures[i]);
        order
    }

    /// Run the chain once. The first strategy producing a well-formed
    /// report wins; if all fail, returns the degraded empty report.
    pub async fn collect(&mut self, since: Option<NaiveDate>) -> UsageReport {
        for idx in self.attempt_order() {
            let name = self.strategies[idx].name();
            let Some(spec) = self.strategies[idx].command(since) else {
                debug!(strategy = name, "strategy prerequisites missing, skipping");
                self.failures[idx] = self.failures[idx].saturating_add(1);
                continue;
            };

            debug!(strategy = name, program = %spec.program, "attempting usage collection");
            match self.pool.submit(spec).wait(self.wait_timeout).await {
                Ok(outcome) if outcome.success() => match parse_report(&outcome.stdout) {
                    Some(blocks) => {
                        debug!(strategy = name, blocks = blocks.len(), "usage collection succeeded");
                        self.failures[idx] = 0;
                        self.consecutive_chain_failures = 0;
                        return UsageReport { blocks };
                    }
                    None => {
                        warn!(strategy = name, "strategy produced malformed output");
                        self.failures[idx] = self.failures[idx].saturating_add(1);
                    }
                },
                Ok(outcome) => {
                    warn!(
                        strategy = name,
                        status = ?outcome.status,
                        stderr = %outcome.stderr.trim(),
                        "strategy exited with failure"
                    );
                    self.failures[idx] = self.failures[idx].saturating_add(1);
                }
                Err(e) => {
                    warn!(strategy = name, error = %e, "strategy execution failed");
                    self.failures[idx] = self.failures[idx].saturating_add(1);
                }
            }
        }

        self.consecutive_chain_failures = self.consecutive_chain_failures.saturating_add(1);
        warn!(
            consecutive_failures = self.consecutive_chain_failures,
            "all execution strategies failed, returning degraded empty result"
        );
        UsageReport::default()
    }
}

/// Parse command stdout into usage blocks.
///
/// Returns `None` when the document is not JSON or has no `blocks` list
/// (a strategy failure). Individual blocks that fail to deserialize are
/// skipped with a warning — one bad record must not poison the batch.
fn parse_report(stdout: &str) -> Option<Vec<UsageBlock>> {
    let value: serde_json::Value = serde_json::from_str(stdout).ok()?;
    let raw_blocks = value.get("blocks")?.as_array()?;

    let mut blocks = Vec::with_capacity(raw_blocks.len());
    for raw in raw_blocks {
        match serde_json::from_value::<UsageBlock>(raw.clone()) {
            Ok(block) => blocks.push(block),
            Err(e) => {
                warn!(error = %e, "skipping malformed usage block");
            }
        }
    }
    Some(blocks)
}
