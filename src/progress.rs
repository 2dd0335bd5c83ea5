//! Terminal progress display for the client
//!
//! A byte bar when the total is known, a spinner with a byte count when it
//! is not, and a coloured completion line either way.

use crossterm::style::{Color, Stylize};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};

pub struct TransferBar {
    bar: ProgressBar,
    start_time: Instant,
}

impl TransferBar {
    pub fn new(label: &str, total: Option<u64>) -> Self {
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg} [{bar:30.green}] {bytes}/{total_bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {msg} {bytes} ({bytes_per_sec})")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner())
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
                );
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        bar.set_message(label.to_string());
        Self {
            bar,
            start_time: Instant::now(),
        }
    }

    pub fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    pub fn finish_success(&self, bytes: u64) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let throughput = if elapsed > 0.0 {
            bytes as f64 / elapsed / 1_048_576.0
        } else {
            0.0
        };
        self.bar.finish_with_message(format!(
            "{} {} bytes in {:.1}s ({:.1} MB/s)",
            "Completed".with(Color::Green).bold(),
            bytes,
            elapsed,
            throughput
        ));
    }

    pub fn finish_error(&self, msg: &str) {
        self.bar
            .abandon_with_message(format!("{} {}", "Failed".with(Color::Red).bold(), msg));
    }
}
