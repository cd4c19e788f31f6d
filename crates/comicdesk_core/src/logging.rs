//! Process-wide logging for the catalog core.
//!
//! # Responsibility
//! - Start one rolling file logger per process (`init_logging`).
//! - Keep user-entered catalog text out of log lines. Form events log field
//!   names and value shapes (`value_shape`); error messages and panic
//!   payloads have their quoted values redacted (`redact_quoted`).
//!
//! # Invariants
//! - Init is idempotent for the same level and directory; any other
//!   configuration is rejected once a logger is running.
//! - Init never panics.
//! - Every error `Display` in this crate quotes user-supplied values in
//!   backticks, so redacting backtick spans removes them.

use crate::form::state::FieldValue;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "comicdesk";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_MAX_CHARS: usize = 160;
const REDACTED: &str = "`<redacted>`";

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Validated `init_logging` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogConfig {
    level: &'static str,
    log_dir: PathBuf,
}

impl LogConfig {
    fn parse(level: &str, log_dir: &str) -> Result<Self, String> {
        let level = match level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" | "warning" => "warn",
            "error" => "error",
            other => {
                return Err(format!(
                    "unsupported log level `{other}`; expected trace|debug|info|warn|error"
                ))
            }
        };

        let dir = log_dir.trim();
        if dir.is_empty() {
            return Err("log_dir cannot be empty".to_string());
        }
        let log_dir = Path::new(dir);
        if !log_dir.is_absolute() {
            return Err(format!("log_dir must be an absolute path, got `{dir}`"));
        }

        Ok(Self {
            level,
            log_dir: log_dir.to_path_buf(),
        })
    }

    /// Explains why `requested` cannot replace this running configuration.
    fn conflict_with(&self, requested: &LogConfig) -> Option<String> {
        if self.log_dir != requested.log_dir {
            return Some(format!(
                "logging already writes to `{}`; refusing to switch to `{}`",
                self.log_dir.display(),
                requested.log_dir.display()
            ));
        }
        if self.level != requested.level {
            return Some(format!(
                "logging already runs at level `{}`; refusing to switch to `{}`",
                self.level, requested.level
            ));
        }
        None
    }
}

struct ActiveLogger {
    config: LogConfig,
    _handle: LoggerHandle,
}

/// Initializes core logging with level and directory.
///
/// # Errors
/// - `level` is not one of `trace|debug|info|warn|error`.
/// - `log_dir` is empty, relative, or cannot be created.
/// - A logger is already running with a different level or directory.
/// - The logger backend fails to start.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let requested = LogConfig::parse(level, log_dir)?;
    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(&requested))?;
    match active.config.conflict_with(&requested) {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

fn start_logger(config: &LogConfig) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&config.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            config.log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(config.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", config.level))?
        .log_to_file(
            FileSpec::default()
                .directory(config.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();
    info!(
        "event=core_start module=core status=ok version={} platform={} build_mode={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        if cfg!(debug_assertions) { "debug" } else { "release" },
        config.level,
        config.log_dir.display()
    );

    Ok(ActiveLogger {
        config: config.clone(),
        _handle: handle,
    })
}

/// Returns `(level, log_dir)` of the running logger, or `None` before init.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_LOGGER
        .get()
        .map(|active| (active.config.level, active.config.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Loggable summary of a form value: its shape, never its content.
///
/// `text(len=5)`, `text(blank)`, `id(set)`, `id(unset)`, `ids(count=2)`.
pub(crate) fn value_shape(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) if text.trim().is_empty() => "text(blank)".to_string(),
        FieldValue::Text(text) => format!("text(len={})", text.chars().count()),
        FieldValue::Id(Some(_)) => "id(set)".to_string(),
        FieldValue::Id(None) => "id(unset)".to_string(),
        FieldValue::IdSet(ids) => format!("ids(count={})", ids.len()),
    }
}

/// Replaces every backtick-quoted span with a placeholder.
///
/// An unterminated span is redacted to the end of the message.
pub(crate) fn redact_quoted(message: &str) -> String {
    let mut redacted = String::with_capacity(message.len());
    let mut rest = message;
    while let Some(open) = rest.find('`') {
        redacted.push_str(&rest[..open]);
        redacted.push_str(REDACTED);
        match rest[open + 1..].find('`') {
            Some(close) => rest = &rest[open + 1 + close + 1..],
            None => return redacted,
        }
    }
    redacted.push_str(rest);
    redacted
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            sanitize_panic_payload(message)
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            sanitize_panic_payload(message)
        } else {
            "non-string panic payload".to_string()
        };
        error!("event=panic_captured module=core status=error location={location} payload={payload}");
        previous_hook(panic_info);
    }));
}

/// One line, quoted values redacted, capped length.
fn sanitize_panic_payload(payload: &str) -> String {
    let flat = redact_quoted(&payload.replace(['\n', '\r'], " "));
    if flat.chars().count() <= PANIC_PAYLOAD_MAX_CHARS {
        return flat;
    }
    let mut truncated = flat
        .chars()
        .take(PANIC_PAYLOAD_MAX_CHARS)
        .collect::<String>();
    truncated.push_str("...");
    truncated
}
