use backtrace::Backtrace;

use crate::trim::{is_well_known_not_in_app, trim_stacktrace};
use crate::utils::{demangle_symbol, filename, function_starts_with, parse_crate_name, strip_symbol};
use faultline_core::protocol::{Frame, Stacktrace};
use faultline_core::ClientOptions;

/// Converts a captured backtrace into a faultline stacktrace.
pub fn backtrace_to_stacktrace(backtrace: &Backtrace) -> Option<Stacktrace> {
    let frames = backtrace
        .frames()
        .iter()
        .flat_map(|frame| {
            let instruction_addr = frame.ip() as usize as u64;
            frame.symbols().iter().map(move |symbol| {
                let abs_path = symbol
                    .filename()
                    .map(|path| path.to_string_lossy().into_owned());
                let fname = abs_path.as_ref().map(|path| filename(path).to_string());
                let raw_symbol = symbol.name().map(|name| name.to_string());
                let function = raw_symbol
                    .as_ref()
                    .map(|sym| demangle_symbol(&strip_symbol(sym)));
                Frame {
                    module: function.as_deref().and_then(parse_crate_name),
                    function,
                    symbol: raw_symbol,
                    instruction_addr: Some(instruction_addr),
                    abs_path,
                    filename: fname,
                    lineno: symbol.lineno().map(u64::from),
                    colno: symbol.colno().map(u64::from),
                    ..Default::default()
                }
            })
        })
        .collect();
    Stacktrace::from_frames_reversed(frames)
}

/// Processes a stacktrace for transmission.
///
/// This trims scaffolding frames, classifies each frame as in-app or
/// not based on the configured includes/excludes and project roots, and
/// rewrites frame filenames relative to the longest matching project
/// root.
pub fn process_event_stacktrace(stacktrace: &mut Stacktrace, options: &ClientOptions) {
    trim_stacktrace(stacktrace, |_, _| false);

    for frame in &mut stacktrace.frames {
        if frame.in_app.is_none() {
            frame.in_app = Some(is_frame_in_app(frame, options));
        }
        if let Some(abs_path) = frame.abs_path.as_deref() {
            if let Some(relative) = strip_project_root(abs_path, options) {
                frame.filename = Some(relative);
            }
        }
    }
}

fn is_frame_in_app(frame: &Frame, options: &ClientOptions) -> bool {
    if let Some(function) = frame.function.as_deref() {
        if options
            .in_app_include
            .iter()
            .any(|pattern| function_starts_with(function, pattern))
        {
            return true;
        }
        if options
            .in_app_exclude
            .iter()
            .any(|pattern| function_starts_with(function, pattern))
        {
            return false;
        }
        if is_well_known_not_in_app(function) {
            return false;
        }
    }

    if let Some(path) = frame.abs_path.as_deref() {
        if longest_matching_root(path, options).is_some() {
            return true;
        }
        // registry and toolchain sources are library code
        if path.contains(".cargo") || path.starts_with("/rustc/") {
            return false;
        }
    }

    true
}

fn longest_matching_root<'o>(path: &str, options: &'o ClientOptions) -> Option<&'o str> {
    options
        .project_roots
        .iter()
        .map(|root| root.as_ref())
        .filter(|root| !root.is_empty() && path.starts_with(root))
        .max_by_key(|root| root.len())
}

fn strip_project_root(path: &str, options: &ClientOptions) -> Option<String> {
    let root = longest_matching_root(path, options)?;
    Some(path[root.len()..].trim_start_matches('/').to_string())
}
