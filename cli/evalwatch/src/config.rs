//! Command-line flags and environment configuration.
//!
//! Every flag falls back to an environment variable, then to a default.
//! There is no configuration file.

use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::{Args, Parser};
use thiserror::Error;

/// Default scheduler address.
pub const DEFAULT_NOMAD_ADDR: &str = "http://127.0.0.1:4646";

/// Default service-discovery agent address.
pub const DEFAULT_CONSUL_ADDR: &str = "http://127.0.0.1:8500";

/// evalwatch - wait for a Nomad evaluation's allocations to run and pass
/// their Consul health checks.
#[derive(Debug, Clone, Parser)]
#[command(name = "evalwatch")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Evaluation ID to watch.
    #[arg(long)]
    pub id: String,

    /// How long to wait before assuming the rollout failed (e.g. 30s, 1m30s, 45).
    #[arg(long, env = "EVALWATCH_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Delay between two polls of the same allocation or service.
    #[arg(long, env = "EVALWATCH_POLL_INTERVAL", default_value = "500ms", value_parser = parse_duration)]
    pub poll_interval: Duration,

    #[command(flatten)]
    pub nomad: NomadArgs,

    #[command(flatten)]
    pub consul: ConsulArgs,

    /// Log level when RUST_LOG is not set.
    #[arg(long, env = "EVALWATCH_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Disable colored output. Any non-empty NO_COLOR value other than a
    /// falsey one (`0`, `false`, `no`, `off`) counts.
    #[arg(long, env = "NO_COLOR", value_parser = FalseyValueParser::new())]
    pub no_color: bool,
}

/// Scheduler connection.
#[derive(Debug, Clone, Args)]
pub struct NomadArgs {
    /// Scheduler HTTP API address.
    #[arg(
        id = "nomad_addr",
        long = "nomad-addr",
        env = "NOMAD_ADDR",
        default_value = DEFAULT_NOMAD_ADDR,
        value_parser = parse_addr
    )]
    pub addr: String,

    /// ACL token sent as X-Nomad-Token.
    #[arg(id = "nomad_token", long = "nomad-token", env = "NOMAD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long = "nomad-region", env = "NOMAD_REGION")]
    pub region: Option<String>,

    #[arg(long = "nomad-namespace", env = "NOMAD_NAMESPACE")]
    pub namespace: Option<String>,
}

impl NomadArgs {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: None,
            region: None,
            namespace: None,
        }
    }
}

/// Service-discovery agent connection.
#[derive(Debug, Clone, Args)]
pub struct ConsulArgs {
    /// Service-discovery agent HTTP API address.
    #[arg(
        id = "consul_addr",
        long = "consul-addr",
        env = "CONSUL_HTTP_ADDR",
        default_value = DEFAULT_CONSUL_ADDR,
        value_parser = parse_addr
    )]
    pub addr: String,

    /// ACL token sent as X-Consul-Token.
    #[arg(id = "consul_token", long = "consul-token", env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[arg(long = "consul-datacenter", env = "CONSUL_DATACENTER")]
    pub datacenter: Option<String>,
}

impl ConsulArgs {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: None,
            datacenter: None,
        }
    }
}

/// Invalid duration flag.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid number in duration {0:?}")]
    Number(String),

    #[error("missing unit in duration {0:?}")]
    MissingUnit(String),

    #[error("unknown unit {unit:?} in duration {input:?}")]
    Unit { unit: String, input: String },

    #[error("duration {0:?} is too large")]
    TooLarge(String),
}

/// Parse `<n><unit>` segments (`ns`, `us`, `ms`, `s`, `m`, `h`), e.g.
/// `1m30s` or `1.5s`. A bare integer is seconds.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| DurationError::MissingUnit(input.to_string()))?;
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos: u64 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => {
                return Err(DurationError::Unit {
                    unit: unit.to_string(),
                    input: input.to_string(),
                })
            }
        };

        let too_large = || DurationError::TooLarge(input.to_string());
        let nanos = if let Ok(whole) = number.parse::<u64>() {
            whole.checked_mul(unit_nanos).ok_or_else(too_large)?
        } else {
            let value: f64 = number
                .parse()
                .map_err(|_| DurationError::Number(input.to_string()))?;
            let nanos = (value * unit_nanos as f64).round();
            if nanos >= u64::MAX as f64 {
                return Err(too_large());
            }
            nanos as u64
        };
        total = total
            .checked_add(Duration::from_nanos(nanos))
            .ok_or_else(too_large)?;
        rest = tail;
    }

    Ok(total)
}

/// Prefix `http://` to addresses given without a scheme.
pub fn parse_addr(input: &str) -> Result<String, String> {
    let trimmed = input.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("empty address".to_string());
    }

    if trimmed.contains("://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("http://{trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("10s", Duration::from_secs(10))]
    #[case("45", Duration::from_secs(45))]
    #[case("500ms", Duration::from_millis(500))]
    #[case("1m30s", Duration::from_secs(90))]
    #[case("1h", Duration::from_secs(3600))]
    #[case("1.5s", Duration::from_millis(1500))]
    #[case("250us", Duration::from_micros(250))]
    #[case("0", Duration::ZERO)]
    fn test_parse_duration(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration("  "), Err(DurationError::Empty));
        assert!(matches!(
            parse_duration("10d"),
            Err(DurationError::Unit { unit, .. }) if unit == "d"
        ));
        assert!(matches!(
            parse_duration("1.2.3s"),
            Err(DurationError::Number(_))
        ));
        assert!(matches!(
            parse_duration("1m30"),
            Err(DurationError::MissingUnit(_))
        ));
    }

    #[test]
    fn test_oversized_duration_is_an_error() {
        assert_eq!(
            parse_duration("99999999999999999999h"),
            Err(DurationError::TooLarge("99999999999999999999h".into()))
        );
        assert!(matches!(
            parse_duration("18446744073709551615s1s"),
            Err(DurationError::TooLarge(_))
        ));
    }

    #[rstest]
    #[case("127.0.0.1:4646", "http://127.0.0.1:4646")]
    #[case("https://nomad.service.consul:4646/", "https://nomad.service.consul:4646")]
    #[case("http://localhost:8500", "http://localhost:8500")]
    fn test_parse_addr(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(parse_addr(input).unwrap(), expected);
    }

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["evalwatch", "--id", "8f2c"]).unwrap();
        assert_eq!(config.id, "8f2c");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.nomad.addr.starts_with("http"));
        assert!(config.consul.addr.starts_with("http"));
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let err = Config::try_parse_from(["evalwatch"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "evalwatch",
            "--id",
            "8f2c",
            "--timeout",
            "1m",
            "--nomad-addr",
            "nomad.example:4646",
            "--nomad-region",
            "eu",
        ])
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.nomad.addr, "http://nomad.example:4646");
        assert_eq!(config.nomad.region.as_deref(), Some("eu"));
    }

    #[test]
    fn test_both_endpoints_and_tokens() {
        let config = Config::try_parse_from([
            "evalwatch",
            "--id",
            "8f2c",
            "--nomad-addr",
            "nomad.example:4646",
            "--nomad-token",
            "nomad-secret",
            "--consul-addr",
            "consul.example:8500",
            "--consul-token",
            "consul-secret",
        ])
        .unwrap();

        assert_eq!(config.nomad.addr, "http://nomad.example:4646");
        assert_eq!(config.nomad.token.as_deref(), Some("nomad-secret"));
        assert_eq!(config.consul.addr, "http://consul.example:8500");
        assert_eq!(config.consul.token.as_deref(), Some("consul-secret"));
    }

    #[test]
    fn test_no_color_from_env() {
        std::env::set_var("NO_COLOR", "1");
        let enabled = Config::try_parse_from(["evalwatch", "--id", "8f2c"]).map(|c| c.no_color);
        std::env::set_var("NO_COLOR", "0");
        let falsey = Config::try_parse_from(["evalwatch", "--id", "8f2c"]).map(|c| c.no_color);
        std::env::remove_var("NO_COLOR");

        assert!(enabled.unwrap());
        assert!(!falsey.unwrap());
    }
}
