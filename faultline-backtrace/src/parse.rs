use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::{demangle_symbol, filename, parse_crate_name, strip_symbol};
use faultline_core::protocol::{Frame, Stacktrace};

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?xm)
        ^
            \s*(?:\d+:)?\s*                      # leading frame number
            (?:
                (?P<addr>0x[a-f0-9]+)            # addr
                \s-\s
            )?
            (?P<symbol>[^\r\n\(]+)               # symbol name
            (?:
                \r?\n
                \s+at\s                          # at line
                (?P<path>[^\r\n]+?)              # path
                (?::(?P<lineno>\d+))?            # line number
            )?
        $
    "#,
    )
    .unwrap()
});

/// Parses a textual backtrace (the `N: symbol` / `at file:line` format)
/// into structured frames.
pub fn parse_stacktrace(backtrace: &str) -> Option<Stacktrace> {
    let mut last_address = None;

    let frames = FRAME_RE
        .captures_iter(backtrace)
        .map(|captures| {
            let abs_path = captures.name("path").map(|m| m.as_str().to_string());
            let fname = abs_path.as_ref().map(|p| filename(p).to_string());
            let symbol = captures["symbol"].trim_end().to_string();
            let function = demangle_symbol(&strip_symbol(&symbol));

            // inline frames do not repeat the address of their caller
            let address = captures
                .name("addr")
                .and_then(|m| u64::from_str_radix(m.as_str().trim_start_matches("0x"), 16).ok())
                .or(last_address);
            last_address = address;

            Frame {
                symbol: Some(symbol.clone()),
                module: parse_crate_name(&function),
                function: Some(function),
                instruction_addr: address,
                abs_path,
                filename: fname,
                lineno: captures
                    .name("lineno")
                    .map(|x| x.as_str().parse::<u64>().unwrap()),
                ..Default::default()
            }
        })
        .collect();

    Stacktrace::from_frames_reversed(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKTRACE: &str = r"   0: failure::backtrace::Backtrace::new::h89416f2b10028541
             at /root/.cargo/registry/src/failure-0.1.5/src/backtrace/mod.rs:111
   1: <failure::error::Error as core::convert::From<F>>::from::h3bae66c036570137
             at /root/.cargo/registry/src/failure-0.1.5/src/error/mod.rs:36
   2: app::main::h07f387434d0cd543
             at src/main.rs:8";

    #[test]
    fn test_parse_backtrace_lines() {
        let stacktrace = parse_stacktrace(BACKTRACE).unwrap();
        // reversed: oldest caller first
        assert_eq!(stacktrace.frames.len(), 3);

        let main = &stacktrace.frames[0];
        assert_eq!(main.function.as_deref(), Some("app::main"));
        assert_eq!(main.module.as_deref(), Some("app"));
        assert_eq!(main.filename.as_deref(), Some("main.rs"));
        assert_eq!(main.lineno, Some(8));

        let newest = &stacktrace.frames[2];
        assert_eq!(
            newest.function.as_deref(),
            Some("failure::backtrace::Backtrace::new")
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(parse_stacktrace("").is_none());
    }
}
