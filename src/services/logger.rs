use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
    }

    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Installs the global subscriber. Output goes to stderr; stdout belongs to the protocol.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_env("RUST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("rest_probe={}", level.as_filter())));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

/// Context-carrying logging handle. Cheap to clone; children extend the context path.
#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self { context }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    fn render_meta(meta: Option<&Value>) -> String {
        meta.filter(|m| !m.is_null())
            .map(|m| m.to_string())
            .unwrap_or_default()
    }

    pub fn error(&self, message: &str, meta: Option<&Value>) {
        tracing::error!(context = %self.context, meta = %Self::render_meta(meta), "{}", message);
    }

    pub fn warn(&self, message: &str, meta: Option<&Value>) {
        tracing::warn!(context = %self.context, meta = %Self::render_meta(meta), "{}", message);
    }

    pub fn info(&self, message: &str, meta: Option<&Value>) {
        tracing::info!(context = %self.context, meta = %Self::render_meta(meta), "{}", message);
    }

    pub fn debug(&self, message: &str, meta: Option<&Value>) {
        tracing::debug!(context = %self.context, meta = %Self::render_meta(meta), "{}", message);
    }
}
