use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use bench_api::{EntitySize, RunConfig, TopicMode, WaitStrategy};

use crate::error::LvcBenchError;

#[derive(Parser)]
#[command(name = "lvc-bench", about = "Нагрузочный стенд single-topic vs sub-topic через LVC broker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Публиковать entity sets с ramp-up частоты
    Publish(BenchArgs),
    /// Принимать entity sets и мерить latency
    Subscribe(BenchArgs),
}

#[derive(Args, Clone, Debug)]
pub struct BenchArgs {
    /// Путь к TOML конфиг файлу
    #[arg(long, default_value = "lvc-bench.toml", env = "LVC_BENCH_CONFIG")]
    pub config: String,

    /// Режим адресации
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Стартовая частота, entity sets/s
    #[arg(long)]
    pub frequency: Option<f64>,

    /// Прирост частоты после каждой итерации
    #[arg(long)]
    pub step: Option<f64>,

    /// Entity sets на итерацию
    #[arg(long)]
    pub sets: Option<usize>,

    /// Entity в одном set'е
    #[arg(long)]
    pub entities: Option<usize>,

    /// Порог actual/programmed throughput для остановки
    #[arg(long)]
    pub cutoff: Option<f64>,

    /// Класс размера entity
    #[arg(long, value_enum)]
    pub size: Option<SizeArg>,

    /// Окно тишины subscriber'а, мс
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Пауза publisher'а перед итерацией, мс
    #[arg(long)]
    pub pause_ms: Option<u64>,

    /// Способ ожидания между unit'ами
    #[arg(long, value_enum)]
    pub wait: Option<WaitArg>,

    /// Печатать результаты в stdout вместо CSV
    #[arg(long)]
    pub print: bool,

    /// Корень папок с CSV
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Адрес frontend'а broker'а (publisher)
    #[arg(long, env = "LVC_FRONTEND")]
    pub frontend: Option<String>,

    /// Адрес backend'а broker'а (subscriber)
    #[arg(long, env = "LVC_BACKEND")]
    pub backend: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Single,
    Sub,
}

impl From<ModeArg> for TopicMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Single => TopicMode::Single,
            ModeArg::Sub => TopicMode::Sub,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SizeArg {
    Small,
    Large,
}

impl From<SizeArg> for EntitySize {
    fn from(arg: SizeArg) -> Self {
        match arg {
            SizeArg::Small => EntitySize::Small,
            SizeArg::Large => EntitySize::Large,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum WaitArg {
    Spin,
    SleepThenSpin,
}

// ---- TOML Config ----

#[derive(Debug, Default, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub mode: TopicMode,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_frontend")]
    pub frontend: String,
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_linger_ms")]
    pub linger_ms: u64,
}

fn default_frontend() -> String {
    "tcp://localhost:5555".into()
}
fn default_backend() -> String {
    "tcp://localhost:5556".into()
}
fn default_linger_ms() -> u64 {
    1_000
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            frontend: default_frontend(),
            backend: default_backend(),
            linger_ms: default_linger_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub print: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { print: false, log_dir: default_log_dir() }
    }
}

impl BenchConfig {
    pub fn load(path: &str) -> Result<Self, LvcBenchError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LvcBenchError::Config { context: "read", detail: format!("'{path}': {e}") })?;
        Self::parse(&content)
            .map_err(|e| LvcBenchError::Config { context: "parse", detail: format!("'{path}': {e}") })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

// ---- Effective ----

/// Итоговая конфигурация прогона: config.toml < env/CLI
#[derive(Debug)]
pub struct Effective {
    pub mode: TopicMode,
    pub run: RunConfig,
    pub frontend: String,
    pub backend: String,
    pub linger: Duration,
    pub print: bool,
    pub log_dir: PathBuf,
}

impl Effective {
    pub fn new(args: &BenchArgs) -> Result<Self, LvcBenchError> {
        let cfg = if std::path::Path::new(&args.config).exists() {
            BenchConfig::load(&args.config)?
        } else {
            tracing::info!(config = %args.config, "config not found, using defaults");
            BenchConfig::default()
        };
        Self::merge(args, cfg)
    }

    fn merge(args: &BenchArgs, cfg: BenchConfig) -> Result<Self, LvcBenchError> {
        let mut run = cfg.run;
        if let Some(v) = args.frequency {
            run.frequency = v;
        }
        if let Some(v) = args.step {
            run.frequency_step = v;
        }
        if let Some(v) = args.sets {
            run.iteration_entity_sets = v;
        }
        if let Some(v) = args.entities {
            run.entities_in_set = v;
        }
        if let Some(v) = args.cutoff {
            run.throughput_ratio_cutoff = v;
        }
        if let Some(v) = args.size {
            run.entity_size = v.into();
        }
        if let Some(v) = args.timeout_ms {
            run.timeout_ms = v;
        }
        if let Some(v) = args.pause_ms {
            run.iteration_pause_ms = v;
        }
        match (args.wait, run.wait) {
            (Some(WaitArg::Spin), _) => run.wait = WaitStrategy::Spin,
            // margin из файла сохраняется
            (Some(WaitArg::SleepThenSpin), WaitStrategy::SleepThenSpin { .. }) => {}
            (Some(WaitArg::SleepThenSpin), WaitStrategy::Spin) => {
                run.wait = WaitStrategy::sleep_then_spin()
            }
            (None, _) => {}
        }
        run.validate()?;

        Ok(Self {
            mode: args.mode.map(TopicMode::from).unwrap_or(cfg.mode),
            run,
            frontend: args.frontend.clone().unwrap_or(cfg.endpoints.frontend),
            backend: args.backend.clone().unwrap_or(cfg.endpoints.backend),
            linger: Duration::from_millis(cfg.endpoints.linger_ms),
            print: args.print || cfg.report.print,
            log_dir: args.log_dir.clone().unwrap_or(cfg.report.log_dir),
        })
    }
}
