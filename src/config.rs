use crate::pipeline::{AggregatorConfig, MaxLen, Metric, RateUnit};
use std::env;

/// Output format of the plain-text viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(String),
    UnknownFlag(String),
    MissingValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
            ConfigError::UnknownFlag(flag) => write!(f, "Unknown flag: {}", flag),
            ConfigError::MissingValue(flag) => write!(f, "Missing value for flag: {}", flag),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime configuration
///
/// Loaded from environment variables (`.env` is honoured), then overridden by
/// command line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Metrics to display, in column order
    pub metrics: Vec<Metric>,
    /// Seconds between screen updates (and purge passes)
    pub interval_secs: u64,
    /// Metric used to pick purge victims
    pub purge: Metric,
    /// Table size bound
    pub keep: MaxLen,
    /// Input lines carry only a label
    pub only_element: bool,
    /// Abort on malformed input lines
    pub strict: bool,
    pub rate_unit: RateUnit,
    /// Explicit sort metric (defaults to the first displayed metric)
    pub sort_order: Option<Metric>,
    /// Use the plain stdout viewer instead of the terminal UI
    pub stdout: bool,
    /// Stdout viewer prints once, after the input closes
    pub stdout_once: bool,
    pub format: OutputFormat,
    /// Capacity of the line channel between reader and ingestion
    pub channel_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            metrics: vec![Metric::Sum, Metric::Average],
            interval_secs: 2,
            purge: Metric::Decay,
            keep: MaxLen::Bounded(1000),
            only_element: false,
            strict: false,
            rate_unit: RateUnit::Minute,
            sort_order: None,
            stdout: false,
            stdout_once: false,
            format: OutputFormat::Text,
            channel_buffer: 10_000,
        }
    }
}

fn parse_metric(raw: &str) -> Result<Metric, ConfigError> {
    raw.parse::<Metric>()
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))
}

fn parse_metric_list(raw: &str) -> Result<Vec<Metric>, ConfigError> {
    let metrics = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(parse_metric)
        .collect::<Result<Vec<_>, _>>()?;

    if metrics.is_empty() {
        return Err(ConfigError::InvalidValue("metric list is empty".to_string()));
    }
    Ok(metrics)
}

fn parse_interval(raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidValue(format!(
            "interval must be a positive number of seconds, got '{}'",
            raw
        ))),
        Ok(secs) => Ok(secs),
    }
}

fn parse_channel_buffer(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidValue(format!(
            "channel buffer must be a positive integer, got '{}'",
            raw
        ))),
        Ok(n) => Ok(n),
    }
}

fn parse_bool(raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue(format!("expected a boolean, got '{}'", other))),
    }
}

fn parse_format(raw: &str) -> Result<OutputFormat, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(ConfigError::InvalidValue(format!("unknown output format '{}'", other))),
    }
}

impl Config {
    /// Load configuration from the process environment and arguments
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env()?;
        config.apply_args(env::args().skip(1))?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `TOPSTAT_METRICS` comma separated (default: sum,average)
    /// - `TOPSTAT_INTERVAL` seconds (default: 2)
    /// - `TOPSTAT_PURGE` (default: decay)
    /// - `TOPSTAT_KEEP` positive integer, `unbounded` or -1 (default: 1000)
    /// - `TOPSTAT_ONLY_ELEMENT` (default: false)
    /// - `TOPSTAT_STRICT` (default: false)
    /// - `TOPSTAT_RATE_UNIT` second|minute|hour (default: minute)
    /// - `TOPSTAT_SORT_ORDER` (default: first metric)
    /// - `TOPSTAT_STDOUT` (default: false)
    /// - `TOPSTAT_STDOUT_ONCE` (default: false)
    /// - `TOPSTAT_FORMAT` text|json (default: text)
    /// - `TOPSTAT_CHANNEL_BUFFER` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(raw) = env::var("TOPSTAT_METRICS") {
            config.metrics = parse_metric_list(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_INTERVAL") {
            config.interval_secs = parse_interval(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_PURGE") {
            config.purge = parse_metric(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_KEEP") {
            config.keep = raw.parse().map_err(ConfigError::InvalidValue)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_ONLY_ELEMENT") {
            config.only_element = parse_bool(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_STRICT") {
            config.strict = parse_bool(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_RATE_UNIT") {
            config.rate_unit = raw.parse().map_err(ConfigError::InvalidValue)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_SORT_ORDER") {
            config.sort_order = Some(parse_metric(&raw)?);
        }
        if let Ok(raw) = env::var("TOPSTAT_STDOUT") {
            config.stdout = parse_bool(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_STDOUT_ONCE") {
            config.stdout_once = parse_bool(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_FORMAT") {
            config.format = parse_format(&raw)?;
        }
        if let Ok(raw) = env::var("TOPSTAT_CHANNEL_BUFFER") {
            config.channel_buffer = parse_channel_buffer(&raw)?;
        }

        Ok(config)
    }

    /// Override settings from command line flags
    ///
    /// `-m/--metric` may be repeated; the first occurrence replaces the
    /// configured list and later ones append to it.
    pub fn apply_args<I, S>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let mut metrics_from_args: Vec<Metric> = Vec::new();

        while let Some(arg) = args.next() {
            // Accept both "--flag value" and "--flag=value"
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = |flag: &str| -> Result<String, ConfigError> {
                match inline.clone() {
                    Some(v) => Ok(v),
                    None => args
                        .next()
                        .ok_or_else(|| ConfigError::MissingValue(flag.to_string())),
                }
            };

            match flag.as_str() {
                "-m" | "--metric" => metrics_from_args.push(parse_metric(&value(&flag)?)?),
                "-i" | "--interval" => self.interval_secs = parse_interval(&value(&flag)?)?,
                "-p" | "--purge" => self.purge = parse_metric(&value(&flag)?)?,
                "-k" | "--keep" => {
                    self.keep = value(&flag)?.parse().map_err(ConfigError::InvalidValue)?
                }
                "-R" | "--rate-unit" => {
                    self.rate_unit = value(&flag)?.parse().map_err(ConfigError::InvalidValue)?
                }
                "-O" | "--sort-order" => self.sort_order = Some(parse_metric(&value(&flag)?)?),
                "--format" => self.format = parse_format(&value(&flag)?)?,
                "-E" | "--only-element" => self.only_element = true,
                "-S" | "--strict" => self.strict = true,
                "-1" | "--stdout" => self.stdout = true,
                "--stdout-once" => self.stdout_once = true,
                other => return Err(ConfigError::UnknownFlag(other.to_string())),
            }
        }

        if !metrics_from_args.is_empty() {
            self.metrics = metrics_from_args;
        }
        Ok(())
    }

    /// Metric the display sorts by
    pub fn effective_sort_order(&self) -> Metric {
        self.sort_order
            .or_else(|| self.metrics.first().copied())
            .unwrap_or(Metric::Sum)
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            sort_order: self.effective_sort_order(),
            purge_method: self.purge,
            max_len: self.keep,
            top_n: AggregatorConfig::default().top_n,
        }
    }
}
