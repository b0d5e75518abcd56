//! Parser execution tracing.
//!
//! Mirrors `winnow`'s `src/trace/mod.rs`: a depth-indented log of every
//! node the evaluator visits, written to stderr, compiled away entirely
//! unless the `debug` feature is enabled. Uses `anstream`/`anstyle` for
//! colored output, the same pair winnow's own `debug` feature uses for its
//! colored trace rendering, rather than pulling in a general-purpose
//! logging crate the teacher doesn't carry. Unlike winnow's trace, this
//! output is plain depth-indented lines with no wrapped-width layout, so
//! it has no use for winnow's `is_terminal_polyfill`/`terminal_size` pair.

#[cfg(feature = "debug")]
mod enabled {
    use std::io::Write as _;
    use std::sync::atomic::{AtomicU32, Ordering};

    use anstyle::{AnsiColor, Style};

    static DEPTH: AtomicU32 = AtomicU32::new(0);

    fn indent(depth: u32) -> String {
        "  ".repeat(depth as usize)
    }

    pub(crate) fn enter(name: &str) -> u32 {
        let depth = DEPTH.fetch_add(1, Ordering::Relaxed);
        let style = Style::new().fg_color(Some(AnsiColor::Blue.into()));
        let mut out = anstream::stderr();
        let _ = writeln!(out, "{}{style}> {name}{style:#}", indent(depth));
        depth
    }

    pub(crate) fn exit(name: &str, depth: u32, success: bool) {
        DEPTH.store(depth, Ordering::Relaxed);
        let color = if success { AnsiColor::Green } else { AnsiColor::Red };
        let style = Style::new().fg_color(Some(color.into()));
        let mut out = anstream::stderr();
        let verdict = if success { "ok" } else { "fail" };
        let _ = writeln!(out, "{}{style}< {name} ({verdict}){style:#}", indent(depth));
    }
}

/// Log that evaluation of a node named `name` is starting. Returns an
/// opaque token to pass back to [`exit`]. A no-op returning `0` unless the
/// `debug` feature is enabled.
#[cfg_attr(not(feature = "debug"), allow(unused_variables))]
pub(crate) fn enter(name: &str) -> u32 {
    #[cfg(feature = "debug")]
    {
        enabled::enter(name)
    }
    #[cfg(not(feature = "debug"))]
    {
        0
    }
}

/// Log that evaluation of the node `enter` was called for has finished.
#[cfg_attr(not(feature = "debug"), allow(unused_variables))]
pub(crate) fn exit(name: &str, token: u32, success: bool) {
    #[cfg(feature = "debug")]
    {
        enabled::exit(name, token, success);
    }
}
