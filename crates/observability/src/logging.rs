//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Konfiguration):
//! - `PLAUDER_LOG_LEVEL`: Filter-Direktive, z.B. `debug` oder
//!   `info,plauder_signaling=trace`. Standard: info
//! - `PLAUDER_LOG_FORMAT`: `text` oder `json`. Standard: text

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LEVEL: &str = "PLAUDER_LOG_LEVEL";
pub const ENV_FORMAT: &str = "PLAUDER_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Darf pro Prozess nur einmal aufgerufen werden.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(ENV_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = std::env::var(ENV_FORMAT).unwrap_or_else(|_| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Logging fuer Kommandozeilen-Clients: nur nach stderr, ohne Zeitstempel
pub fn logging_initialisieren_stderr(level: &str) {
    let filter = EnvFilter::try_from_env(ENV_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
