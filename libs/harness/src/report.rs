use std::path::{Path, PathBuf};

use bench_api::TopicMode;
use chrono::NaiveDateTime;

use crate::error::HarnessError;
use crate::publisher::PublisherIteration;
use crate::sampler::SubscriberIteration;

// ═══════════════════════════════════════════════════════════════
//  CSV
// ═══════════════════════════════════════════════════════════════

pub fn publisher_csv(results: &[PublisherIteration]) -> String {
    let mut csv = String::new();
    csv.push_str("iteration,duration_milliseconds,entity_sets_sent,programmed_frequency,actual_frequency,programmed_throughput_kB/s,actual_throughput_kB/s,drift_microseconds\n");

    for r in results {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            r.iteration,
            r.duration_ms,
            r.entity_sets_sent,
            r.programmed_frequency,
            r.actual_frequency,
            r.programmed_throughput_kbps,
            r.actual_throughput_kbps,
            r.drift_us,
        ));
    }
    csv
}

pub fn subscriber_csv(results: &[SubscriberIteration]) -> String {
    let mut csv = String::new();
    csv.push_str("iteration,avg_latency_ms,entity_sets_received,throughput_sets/s,throughput_kB/s,delta_milliseconds\n");

    for r in results {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            r.iteration,
            r.avg_latency_ms,
            r.entity_sets_received,
            r.throughput_sets_per_s,
            r.throughput_kbps,
            r.delta_ms,
        ));
    }
    csv
}

/// Одна строка на entity set: номер итерации, номер set'а с 1, latency.
pub fn latency_csv(results: &[SubscriberIteration]) -> String {
    let mut csv = String::new();
    csv.push_str("iteration,entity_set_nr,entity_set_latency_milliseconds\n");

    for r in results {
        for (nr, latency) in (1..).zip(&r.latencies_ms) {
            csv.push_str(&format!("{},{},{}\n", r.iteration, nr, latency));
        }
    }
    csv
}

// ═══════════════════════════════════════════════════════════════
//  Stdout
// ═══════════════════════════════════════════════════════════════

pub fn publisher_text(results: &[PublisherIteration]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(&format!("-------- Iteration {} ------------\n", r.iteration));
        out.push_str(&format!(
            "Published {} entity sets in {} milliseconds.\n",
            r.entity_sets_sent, r.duration_ms
        ));
        out.push_str(&format!(
            "Frequency: {} programmed, {} actual sets/s\n",
            r.programmed_frequency, r.actual_frequency
        ));
        out.push_str(&format!("Programmed throughput: {} kB/s\n", r.programmed_throughput_kbps));
        out.push_str(&format!("Actual throughput: {} kB/s\n", r.actual_throughput_kbps));
        out.push_str(&format!("Drift after timing compensation: {} µs\n", r.drift_us));
    }
    out
}

pub fn subscriber_text(results: &[SubscriberIteration]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(&format!("-------- Iteration {} ------------\n", r.iteration));
        out.push_str(&format!("Average latency: {} ms\n", r.avg_latency_ms));
        out.push_str(&format!(
            "Received {} entity sets in {} s.\n",
            r.entity_sets_received,
            r.delta_ms / 1_000.0
        ));
        out.push_str(&format!("Throughput: {} sets/s\n", r.throughput_sets_per_s));
        out.push_str(&format!("Throughput: {} kB/s\n", r.throughput_kbps));
    }
    out
}

// ═══════════════════════════════════════════════════════════════
//  Log files
// ═══════════════════════════════════════════════════════════════

/// Пути CSV-файлов одного прогона: `<log_dir>/<YYYY-MM-DD>/<ROLE>_<MODE>_TEST_<HHMMSS>.csv`.
#[derive(Debug, Clone)]
pub struct LogPaths {
    dir: PathBuf,
    stamp: String,
}

impl LogPaths {
    pub fn new(log_dir: &Path, started: NaiveDateTime) -> Self {
        Self {
            dir: log_dir.join(started.format("%Y-%m-%d").to_string()),
            stamp: started.format("%H%M%S").to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn publisher(&self, mode: TopicMode) -> PathBuf {
        self.dir.join(format!("PUB_{}_TEST_{}.csv", mode.label(), self.stamp))
    }

    pub fn subscriber(&self, mode: TopicMode) -> PathBuf {
        self.dir.join(format!("SUB_{}_TEST_{}.csv", mode.label(), self.stamp))
    }

    pub fn latency(&self, mode: TopicMode) -> PathBuf {
        self.dir.join(format!("SUB_{}_TEST_LATENCY_{}.csv", mode.label(), self.stamp))
    }
}

/// Записать отчёт, создав папки по пути.
pub fn write_report(path: &Path, contents: &str) -> Result<(), HarnessError> {
    let report_err = |source: std::io::Error| HarnessError::Report { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(report_err)?;
    }
    std::fs::write(path, contents).map_err(report_err)?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}
