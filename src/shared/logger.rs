use core::fmt;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Once,
};

use env_logger::fmt::{Color, Style, StyledValue};
use log::Level;

use crate::config::CARGO_PKG_NAME;

static MAX_TARGET_WIDTH: AtomicUsize = AtomicUsize::new(0);

static SETUP_LOGS: Once = Once::new();

/// Installs the global logger once. Later calls are no-ops.
///
/// The level defaults to `info` and can be overridden with `RUST_LOG`, e.g.
/// `RUST_LOG=framedb::storage::buffer=trace` to follow every pin and eviction.
pub fn setup_logger() {
    SETUP_LOGS.call_once(|| {
        // Tests run with captured output, and may race with another logger
        let _ = build_logger().is_test(cfg!(test)).try_init();
    });
}

fn build_logger() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();

    builder.format(move |f, record| {
        use std::io::Write;
        let target = short_target(record.target());
        let width = max_target_width(target);

        let mut style = f.style();
        let level = colored_level(&mut style, record.level());

        let mut style = f.style();
        let target = style.set_bold(true).value(Padded {
            value: target,
            width,
        });

        let time = format!("{t}", t = f.timestamp_micros());
        let time = time.get(11..).unwrap_or(&time); // skip date
        writeln!(f, "{time} {level} {target} > {}", record.args())
    });

    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(log::LevelFilter::Info);
    }

    builder.parse_env("RUST_LOG");

    builder
}

/// Strips the crate name from our own targets: `framedb::storage::buffer::guard`
/// becomes `buffer::guard`. Foreign targets are kept as they are.
fn short_target(target: &str) -> &str {
    let Some(rest) = target.strip_prefix(CARGO_PKG_NAME) else {
        return target;
    };
    match rest.strip_prefix("::") {
        Some(path) => path.strip_prefix("storage::").unwrap_or(path),
        None if rest.is_empty() => "db",
        None => target,
    }
}

struct Padded<T> {
    value: T,
    width: usize,
}

impl<T: fmt::Display> fmt::Display for Padded<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{: <width$}", self.value, width = self.width)
    }
}

fn max_target_width(target: &str) -> usize {
    MAX_TARGET_WIDTH
        .fetch_max(target.len(), Ordering::Relaxed)
        .max(target.len())
}

fn colored_level<'a>(style: &'a mut Style, level: Level) -> StyledValue<'a, &'static str> {
    match level {
        Level::Trace => style.set_color(Color::Magenta).value("TRACE"),
        Level::Debug => style.set_color(Color::Blue).value("DEBUG"),
        Level::Info => style.set_color(Color::Green).value("INFO "),
        Level::Warn => style.set_color(Color::Yellow).value("WARN "),
        Level::Error => style.set_color(Color::Red).value("ERROR"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_short_target() {
        assert_eq!(short_target("framedb"), "db");
        assert_eq!(short_target("framedb::storage::buffer::guard"), "buffer::guard");
        assert_eq!(short_target("framedb::dbms::database"), "dbms::database");
        assert_eq!(short_target("framedbx::other"), "framedbx::other");
        assert_eq!(short_target("env_logger"), "env_logger");
    }

    #[test]
    fn test_setup_logger_twice() {
        setup_logger();
        setup_logger();
        log::info!("logger is installed");
    }
}
