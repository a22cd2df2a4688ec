use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use lvc_engine::{BrokerOptions, DrainPolicy};

use crate::error::LvcBrokerError;

#[derive(Parser)]
#[command(name = "lvc-broker", about = "Broker с last-value cache для pub/sub бенчмарка")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить broker
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "lvc-broker.toml", env = "LVC_BROKER_CONFIG")]
    pub config: String,

    /// Адрес SUB-сокета для publisher'ов
    #[arg(long, env = "LVC_FRONTEND")]
    pub frontend: Option<String>,

    /// Адрес XPUB-сокета для subscriber'ов
    #[arg(long, env = "LVC_BACKEND")]
    pub backend: Option<String>,

    /// Максимальное ожидание poll, мс
    #[arg(long)]
    pub poll_ms: Option<u64>,

    /// Сколько событий забирать с готовой стороны за проход
    #[arg(long, value_enum)]
    pub drain: Option<DrainArg>,

    /// Сколько закрываемый сокет досылает очередь, мс
    #[arg(long)]
    pub linger_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DrainArg {
    OnePerPass,
    Exhaust,
}

impl From<DrainArg> for DrainPolicy {
    fn from(arg: DrainArg) -> Self {
        match arg {
            DrainArg::OnePerPass => DrainPolicy::OnePerPass,
            DrainArg::Exhaust => DrainPolicy::Exhaust,
        }
    }
}

// ---- TOML Config ----

#[derive(Debug, Deserialize, PartialEq)]
pub struct BrokerConfig {
    #[serde(default = "default_frontend")]
    pub frontend: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default)]
    pub drain: DrainPolicy,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

fn default_frontend() -> String {
    "tcp://*:5555".into()
}
fn default_backend() -> String {
    "tcp://*:5556".into()
}
fn default_poll_ms() -> u64 {
    500
}
fn default_linger_ms() -> u64 {
    1_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            frontend: default_frontend(),
            backend: default_backend(),
            poll_ms: default_poll_ms(),
            drain: DrainPolicy::default(),
            linger_ms: default_linger_ms(),
        }
    }
}

impl BrokerConfig {
    pub fn load(path: &str) -> Result<Self, LvcBrokerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LvcBrokerError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| LvcBrokerError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// ---- Effective ----

/// Итоговая конфигурация: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub frontend: String,
    pub backend: String,
    pub options: BrokerOptions,
    pub linger: Duration,
}

impl Effective {
    pub fn new(args: &ServeArgs) -> Result<Self, LvcBrokerError> {
        // файла по умолчанию может не быть, явно битый файл: ошибка
        let cfg = if std::path::Path::new(&args.config).exists() {
            BrokerConfig::load(&args.config)?
        } else {
            tracing::info!(config = %args.config, "config not found, using defaults");
            BrokerConfig::default()
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &ServeArgs, cfg: BrokerConfig) -> Result<Self, LvcBrokerError> {
        let poll_ms = args.poll_ms.unwrap_or(cfg.poll_ms);
        if poll_ms == 0 {
            return Err(LvcBrokerError::Config { context: "validate", detail: "poll_ms must be > 0".into() });
        }
        Ok(Self {
            frontend: args.frontend.clone().unwrap_or(cfg.frontend),
            backend: args.backend.clone().unwrap_or(cfg.backend),
            options: BrokerOptions {
                poll_interval: Duration::from_millis(poll_ms),
                drain: args.drain.map(DrainPolicy::from).unwrap_or(cfg.drain),
            },
            linger: Duration::from_millis(args.linger_ms.unwrap_or(cfg.linger_ms)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["lvc-broker", "serve", "--config", "/nonexistent/lvc-broker.toml"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Serve(args) => args,
        }
    }

    #[test]
    fn empty_file_gives_reference_endpoints() {
        let cfg = BrokerConfig::parse("").unwrap();
        assert_eq!(cfg, BrokerConfig::default());
        assert_eq!(cfg.frontend, "tcp://*:5555");
        assert_eq!(cfg.backend, "tcp://*:5556");
        assert_eq!(cfg.poll_ms, 500);
        assert_eq!(cfg.drain, DrainPolicy::OnePerPass);
    }

    #[test]
    fn file_values_parse() {
        let cfg = BrokerConfig::parse(
            r#"
            frontend = "tcp://127.0.0.1:7000"
            drain = "exhaust"
            linger_ms = 0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.frontend, "tcp://127.0.0.1:7000");
        assert_eq!(cfg.backend, "tcp://*:5556");
        assert_eq!(cfg.drain, DrainPolicy::Exhaust);
        assert_eq!(cfg.linger_ms, 0);
    }

    #[test]
    fn unknown_drain_policy_is_rejected() {
        assert!(BrokerConfig::parse(r#"drain = "sometimes""#).is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let cfg = BrokerConfig::parse(r#"poll_ms = 250"#).unwrap();
        let eff = Effective::merge(&args(&["--poll-ms", "50", "--drain", "exhaust"]), cfg).unwrap();
        assert_eq!(eff.options.poll_interval, Duration::from_millis(50));
        assert_eq!(eff.options.drain, DrainPolicy::Exhaust);
        assert_eq!(eff.frontend, "tcp://*:5555");
    }

    #[test]
    fn missing_default_file_falls_back() {
        let eff = Effective::new(&args(&[])).unwrap();
        assert_eq!(eff.options.poll_interval, Duration::from_millis(500));
        assert_eq!(eff.linger, Duration::from_millis(1_000));
    }

    #[test]
    fn zero_poll_is_rejected() {
        let err = Effective::merge(&args(&["--poll-ms", "0"]), BrokerConfig::default()).unwrap_err();
        assert!(matches!(err, LvcBrokerError::Config { context: "validate", .. }));
    }
}
