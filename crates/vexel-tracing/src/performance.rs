//! Timing helpers for kernel generation and module registration.
//!
//! ```rust
//! use vexel_tracing::performance::{record_module_build, PerformanceSettings, PerformanceSpan};
//!
//! let settings = PerformanceSettings { enabled: true, threshold_us: Some(100) };
//! let span = PerformanceSpan::with_settings("float_vector", settings);
//! // ... generate and register ...
//! drop(span); // logged only if the build took at least 100us
//!
//! record_module_build("float_vector", 48, 65_536, 1_250);
//! ```

use crate::TracingConfig;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::Level;

/// Whether performance spans report, and from what duration on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PerformanceSettings {
    pub enabled: bool,
    /// `None` reports every span.
    pub threshold_us: Option<u64>,
}

impl From<&TracingConfig> for PerformanceSettings {
    fn from(config: &TracingConfig) -> Self {
        Self {
            enabled: config.enable_performance_tracing,
            threshold_us: config.performance_threshold_us,
        }
    }
}

static SETTINGS: OnceLock<PerformanceSettings> = OnceLock::new();

/// Settings [`perf_span!`](crate::perf_span) uses.
///
/// Those of the subscriber installed by [`crate::init_global_tracing`];
/// read from the environment when nothing was installed first.
pub fn performance_settings() -> PerformanceSettings {
    *SETTINGS.get_or_init(|| PerformanceSettings::from(&TracingConfig::from_env()))
}

/// Fix the process settings; the first call wins.
pub(crate) fn install_settings(settings: PerformanceSettings) {
    let _ = SETTINGS.set(settings);
}

/// RAII guard that measures span duration and conditionally logs based on threshold.
pub struct PerformanceSpan {
    span_name: String,
    settings: PerformanceSettings,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a new performance span; `threshold_us = None` always logs.
    pub fn new(span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        Self::with_level(Level::DEBUG, span_name, threshold_us)
    }

    /// Create a new performance span at the specified tracing level.
    pub fn with_level(level: Level, span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let span_name = span_name.into();
        let span = match level {
            Level::TRACE => tracing::trace_span!("perf", name = %span_name),
            Level::DEBUG => tracing::debug_span!("perf", name = %span_name),
            Level::INFO => tracing::info_span!("perf", name = %span_name),
            Level::WARN => tracing::warn_span!("perf", name = %span_name),
            Level::ERROR => tracing::error_span!("perf", name = %span_name),
        };
        let settings = PerformanceSettings {
            enabled: true,
            threshold_us,
        };
        Self::from_parts(span_name, settings, span)
    }

    /// Span governed by explicit settings instead of the process ones.
    pub fn with_settings(span_name: impl Into<String>, settings: PerformanceSettings) -> Self {
        let span_name = span_name.into();
        let span = tracing::debug_span!("perf", name = %span_name);
        Self::from_parts(span_name, settings, span)
    }

    /// Wrap an existing `span` (carrying caller fields) with timing.
    pub fn from_parts(span_name: impl Into<String>, settings: PerformanceSettings, span: tracing::Span) -> Self {
        Self {
            span_name: span_name.into(),
            settings,
            start_time: Instant::now(),
            span,
        }
    }

    /// Name the span was created with.
    pub fn name(&self) -> &str {
        &self.span_name
    }

    pub fn settings(&self) -> PerformanceSettings {
        self.settings
    }

    /// The tracing span the completion event is recorded in.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Get the elapsed time since span creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    fn should_report(&self, elapsed_us: u64) -> bool {
        self.settings.enabled && self.settings.threshold_us.is_none_or(|t| elapsed_us >= t)
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        if self.should_report(elapsed_us) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record one module build: how many kernels went into it, how large the
/// concatenated source was and how long generation plus registration took.
pub fn record_module_build(module: &str, kernel_count: usize, source_bytes: usize, duration_us: u64) {
    let kernels_per_ms = if duration_us > 0 {
        kernel_count as f64 / (duration_us as f64 / 1000.0)
    } else {
        0.0
    };

    tracing::debug!(
        event = "module_build",
        module = module,
        kernel_count = kernel_count,
        source_bytes = source_bytes,
        source_kb = source_bytes as f64 / 1024.0,
        duration_us = duration_us,
        duration_ms = duration_us as f64 / 1000.0,
        kernels_per_ms = kernels_per_ms,
        "module_build_complete"
    );
}

/// Record the text generation of a single kernel.
pub fn record_kernel_generated(kernel: &str, entry_points: usize, source_bytes: usize) {
    tracing::trace!(
        event = "kernel_generated",
        kernel = kernel,
        entry_points = entry_points,
        source_bytes = source_bytes,
        "kernel_generated"
    );
}
