/// Emits a trace-level event for per-request cache and gophermap details.
///
/// These fire on every hit, so they only exist with the `trace-more` feature.
/// Arguments are not evaluated otherwise.
#[cfg(feature = "trace-more")]
macro_rules! trace {
    ($($arg:tt)+) => (::tracing::trace!($($arg)+));
}
#[cfg(not(feature = "trace-more"))]
macro_rules! trace {
    ($($arg:tt)+) => {};
}
pub(crate) use trace;
