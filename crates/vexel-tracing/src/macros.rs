//! Convenience macros for performance tracing.

/// Create a [`crate::performance::PerformanceSpan`] with optional fields.
///
/// Reporting follows [`crate::performance::performance_settings`]; fields
/// are recorded on the span the completion event is emitted in.
///
/// ```rust
/// use vexel_tracing::perf_span;
///
/// {
///     let _span = perf_span!("float_vector", kernels = 48);
///     // ... build the module ...
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::with_settings($name, $crate::performance::performance_settings())
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let name = $name;
        let span = tracing::debug_span!("perf", name = %name, $($field = $value),+);
        $crate::performance::PerformanceSpan::from_parts(name, $crate::performance::performance_settings(), span)
    }};
}

/// Run a block and return `(result, duration_us)`.
///
/// ```rust
/// use vexel_tracing::timed_block;
///
/// let (len, duration_us) = timed_block!("concat", { "__kernel".len() });
/// assert_eq!(len, 8);
/// # let _ = duration_us;
/// ```
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        tracing::debug!(
            operation = $name,
            duration_us = duration_us,
            duration_ms = duration_us as f64 / 1000.0,
            "timed_block_complete"
        );
        (result, duration_us)
    }};
}
