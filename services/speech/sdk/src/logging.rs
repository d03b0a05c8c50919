//! Console log format and subscriber setup.
//!
//! Lines look like `[timestamp] [trx] [level] message key=value`, where the
//! second column is the session trx when the event carries one and the
//! service name otherwise.

use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, LoggingConfig};

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_CYAN: &str = "\x1b[36m";
const COLOR_GREEN: &str = "\x1b[32m";
const COLOR_BRIGHT_YELLOW: &str = "\x1b[93m";
const COLOR_BRIGHT_RED: &str = "\x1b[91m";
const COLOR_BRIGHT_GRAY: &str = "\x1b[90m";

/// Wide enough for a hyphenated UUID
const TRX_WIDTH: usize = 36;
const LOG_LEVEL_WIDTH: usize = 7;

/// Service name shown for events outside a session
pub const SERVICE_NAME: &str = "vrex-speech";

/// Crates whose events the configured level applies to
const SDK_TARGETS: [&str; 4] = ["vrex_speech", "speech_session", "speech_auth", "speech_wire"];

/// Formatter for speech client log lines
pub struct SpeechLogFormatter {
    service_name: String,
    color_enabled: bool,
}

impl SpeechLogFormatter {
    /// Formatter with colors when a terminal is detected
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            color_enabled: is_terminal(),
        }
    }

    /// Override color detection
    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.color_enabled = enabled;
        self
    }

    fn format_trx(&self, trx: Option<&str>) -> String {
        let name = trx.unwrap_or(&self.service_name);
        if name.chars().count() > TRX_WIDTH {
            let truncated: String = name.chars().take(TRX_WIDTH - 1).collect();
            format!("{}…", truncated)
        } else {
            format!("{:<width$}", name, width = TRX_WIDTH)
        }
    }

    fn format_log_level(&self, level: &Level) -> String {
        format!("{:<width$}", level.as_str(), width = LOG_LEVEL_WIDTH)
    }

    fn color_for_level(&self, level: &Level) -> &'static str {
        if !self.color_enabled {
            return "";
        }

        match *level {
            Level::ERROR => COLOR_BRIGHT_RED,
            Level::WARN => COLOR_BRIGHT_YELLOW,
            Level::INFO => COLOR_GREEN,
            Level::DEBUG | Level::TRACE => COLOR_BRIGHT_GRAY,
        }
    }
}

impl<S, N> FormatEvent<S, N> for SpeechLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let color = self.color_for_level(level);
        let reset_color = if self.color_enabled { COLOR_RESET } else { "" };
        let cyan_color = if self.color_enabled { COLOR_CYAN } else { "" };

        write!(
            writer,
            "{}[{}] [{}] [{}{}{}] {}",
            cyan_color,
            timestamp,
            self.format_trx(visitor.trx.as_deref()),
            color,
            self.format_log_level(level),
            reset_color,
            visitor.message
        )?;
        for (name, value) in &visitor.fields {
            write!(writer, " {}={}", name, value)?;
        }
        writeln!(writer, "{}", reset_color)
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    trx: Option<String>,
    fields: Vec<(&'static str, String)>,
}

impl FieldVisitor {
    fn record_value(&mut self, name: &'static str, value: String) {
        match name {
            "message" => self.message = value,
            "trx" => self.trx = Some(value),
            _ => self.fields.push((name, value)),
        }
    }
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        let mut rendered = format!("{:?}", value);
        if rendered.len() >= 2 && rendered.starts_with('"') && rendered.ends_with('"') {
            rendered = rendered[1..rendered.len() - 1].to_string();
        }
        self.record_value(field.name(), rendered);
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.record_value(field.name(), value.to_string());
    }
}

fn is_terminal() -> bool {
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

/// Parse a configured level name, ignoring case
pub fn parse_level(name: &str) -> Result<Level, ConfigError> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        other => Err(ConfigError::Invalid(format!("unknown log level {:?}", other))),
    }
}

/// Filter applying `level` to the SDK crates and `warn` to everything else
pub fn build_filter(level: Level) -> Result<EnvFilter, ConfigError> {
    let mut filter = EnvFilter::new("warn");
    for target in SDK_TARGETS {
        let directive = format!("{}={}", target, level.as_str().to_ascii_lowercase())
            .parse::<Directive>()
            .map_err(|e| ConfigError::Invalid(format!("log directive for {}: {}", target, e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

/// Install the global subscriber described by `config`
///
/// Returns `Ok(false)` when logging is disabled or a global subscriber is
/// already installed. An unknown level is an error even when disabled.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let level = parse_level(&config.log_level)?;
    if !config.enabled {
        return Ok(false);
    }

    let installed = tracing_subscriber::fmt()
        .with_env_filter(build_filter(level)?)
        .with_target(false)
        .event_format(SpeechLogFormatter::new(SERVICE_NAME))
        .try_init()
        .is_ok();
    if installed {
        tracing::info!("Logging initialized at level {}", level);
    }
    Ok(installed)
}
