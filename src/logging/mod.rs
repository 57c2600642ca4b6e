//! Logging and output control
//!
//! [`Logger`] is the handle every component receives for user-visible output.
//! Messages are emitted as `tracing` events so they land in CloudWatch (or the
//! terminal) through the subscriber installed by [`init`].

use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `info` (or `debug` when verbose).
/// ANSI colors are disabled inside Lambda, where output goes to CloudWatch.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "chain_mirror=debug,info"
    } else {
        "info"
    };
    let in_lambda = std::env::var_os("AWS_LAMBDA_FUNCTION_NAME").is_some();

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(!in_lambda)
                .with_target(false),
        )
        .try_init();
}

/// Logger responsible for all user-visible output
#[derive(Debug, Clone)]
pub struct Logger {
    pub verbose: bool,
    pub quiet: bool,
    pub start_time: Option<Instant>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Logger {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            quiet: false,
            start_time: Some(Instant::now()),
        }
    }

    pub fn new_quiet() -> Self {
        Self {
            verbose: false,
            quiet: true,
            start_time: Some(Instant::now()),
        }
    }

    /// Main section heading
    pub fn section(&self, title: &str) {
        if !self.quiet {
            tracing::info!("=== {} ===", title);
        }
    }

    /// Shown only in verbose mode
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            tracing::info!("{}", message);
        } else if !self.quiet {
            tracing::debug!("{}", message);
        }
    }

    /// Information message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            tracing::info!("{}", message);
        }
    }

    /// Success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            tracing::info!(outcome = "success", "{}", message);
        }
    }

    /// Warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            tracing::warn!("{}", message);
        }
    }

    /// Errors are always emitted, even in quiet mode
    pub fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }

    /// Step information
    pub fn step(&self, message: &str) {
        if !self.quiet {
            tracing::info!(step = true, "{}", message);
        }
    }

    /// Detailed information (trace level unless verbose)
    pub fn detail(&self, message: &str) {
        if self.quiet {
            return;
        }
        if self.verbose {
            tracing::debug!("{}", message);
        } else {
            tracing::trace!("{}", message);
        }
    }

    /// Summary method for displaying structured information
    pub fn summary(&self, title: &str, items: &[String]) {
        if self.quiet {
            return;
        }
        if items.is_empty() {
            tracing::info!("{}: (no items)", title);
        } else {
            tracing::info!("{}: {}", title, items.join(", "));
        }
    }

    /// Elapsed time since the logger was created
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }

    /// Format file size in human-readable units
    pub fn format_size(&self, bytes: u64) -> String {
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else if bytes < 1024 * 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Format duration in human-readable format
    pub fn format_duration(&self, duration: Duration) -> String {
        let secs = duration.as_secs();
        if secs < 60 {
            format!("{}.{:01}s", secs, duration.subsec_millis() / 100)
        } else if secs < 3600 {
            format!("{}m{}s", secs / 60, secs % 60)
        } else {
            format!("{}h{}m{}s", secs / 3600, (secs % 3600) / 60, secs % 60)
        }
    }
}
