/// Returns the intended release for the SDK as an `Option<Cow<'static, str>>`.
///
/// This can be used with `ClientOptions` to set the release name.  It uses
/// the information supplied by cargo to calculate a release.
///
/// # Examples
///
/// ```
/// # use faultline_core as faultline;
/// let _options = faultline::ClientOptions {
///     release: faultline::release_name!(),
///     ..Default::default()
/// };
/// ```
#[macro_export]
macro_rules! release_name {
    () => {{
        static RELEASE: ::std::sync::OnceLock<Option<String>> = ::std::sync::OnceLock::new();
        RELEASE
            .get_or_init(|| {
                option_env!("CARGO_PKG_NAME").and_then(|name| {
                    option_env!("CARGO_PKG_VERSION").map(|version| format!("{name}@{version}"))
                })
            })
            .as_ref()
            .map(|release| ::std::borrow::Cow::Borrowed(release.as_str()))
    }};
}

/// Logs a message on the SDK's internal debug channel.
///
/// With the `debug-logs` feature this goes through the `log` crate,
/// otherwise it prints to stderr when `ClientOptions::debug` is set.
/// This is the only place swallowed pipeline failures become visible.
#[macro_export]
#[doc(hidden)]
macro_rules! faultline_debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "debug-logs")]
        {
            ::log::debug!(target: "faultline", $($arg)*);
        }
        #[cfg(not(feature = "debug-logs"))]
        {
            if $crate::debug_enabled() {
                eprint!("[faultline] ");
                eprintln!($($arg)*);
            }
        }
    }};
}
