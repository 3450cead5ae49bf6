/// Compile a regex literal once and hand out a `&'static Regex`.
///
/// Every condition matcher in the crate goes through this so the pattern
/// used for display and the pattern used for evaluation are literally the
/// same compiled object.
#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}
