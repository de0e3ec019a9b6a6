//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist. Der Token-Schluessel kann per `SECRET_KEY`
//! ueberschrieben werden.

use plauder_observability::logging::{log_format_gueltig, log_level_gueltig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Umgebungsvariable fuer den Token-Schluessel (64 Hex-Zeichen)
pub const ENV_SECRET_KEY: &str = "SECRET_KEY";

/// Eingebauter Entwicklungsschluessel
pub const STANDARD_SCHLUESSEL: &str =
    "3e367a60ddc0699ea2f486717d5dcd174c4dee0bcf1855065ab74c348e550b78";

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Token-Schluessel und Passwort-Hashing
    pub sicherheit: SicherheitsEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Nachrichten-Warteschlange
    pub nachrichten: NachrichtenEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer TCP
    pub bind_adresse: String,
    /// Port fuer TCP
    pub tcp_port: u16,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: u32,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 8888,
            max_clients: 512,
            max_frame_groesse: plauder_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Sicherheits-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SicherheitsEinstellungen {
    /// AES-256-Schluessel fuer Sitzungs-Token als Hex
    pub secret_key: String,
    /// bcrypt-Kostenfaktor
    pub bcrypt_kosten: u32,
}

impl Default for SicherheitsEinstellungen {
    fn default() -> Self {
        Self {
            secret_key: STANDARD_SCHLUESSEL.into(),
            bcrypt_kosten: plauder_auth::BCRYPT_COST,
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus
    pub wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://plauder.db".into(),
            max_verbindungen: 5,
            wal: true,
        }
    }
}

/// Einstellungen der Nachrichten-Warteschlange
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NachrichtenEinstellungen {
    /// Abfrageintervall je angemeldeter Sitzung in Millisekunden
    pub poll_ms: u64,
    /// Aufbewahrung nicht zugestellter Nachrichten in Tagen (0 = unbegrenzt)
    pub aufbewahrung_tage: u32,
}

impl Default for NachrichtenEinstellungen {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            aufbewahrung_tage: 0,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Port fuer `/metrics` und `/health` (0 = deaktiviert)
    pub port: u16,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let mut config: Self = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.umgebung_anwenden(|name| std::env::var(name).ok());
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die erst beim Start auffallen wuerden
    pub fn pruefen(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Unbekannter Log-Level '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Unbekanntes Log-Format '{}'", self.logging.format);
        }
        if self.sicherheit.secret_key.trim().len() != 64 {
            anyhow::bail!("secret_key muss aus 64 Hex-Zeichen bestehen");
        }
        if !(4..=31).contains(&self.sicherheit.bcrypt_kosten) {
            anyhow::bail!(
                "bcrypt_kosten {} ausserhalb von 4..=31",
                self.sicherheit.bcrypt_kosten
            );
        }
        Ok(())
    }

    /// Ueberschreibt Werte aus der Umgebung; `lesen` liefert den Wert
    /// einer Variablen
    pub fn umgebung_anwenden(&mut self, lesen: impl Fn(&str) -> Option<String>) {
        if let Some(schluessel) = lesen(ENV_SECRET_KEY).filter(|s| !s.is_empty()) {
            self.sicherheit.secret_key = schluessel;
        }
    }

    /// Ob noch der eingebaute Entwicklungsschluessel verwendet wird
    pub fn standard_schluessel(&self) -> bool {
        self.sicherheit.secret_key.eq_ignore_ascii_case(STANDARD_SCHLUESSEL)
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port)
    }

    /// Bind-Adresse fuer den Observability-Server, falls aktiviert
    pub fn observability_bind_adresse(&self) -> Option<String> {
        (self.observability.port != 0)
            .then(|| format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port))
    }

    /// Abfrageintervall der Zustellung
    pub fn poll_intervall(&self) -> Duration {
        Duration::from_millis(self.nachrichten.poll_ms.max(1))
    }

    /// Aufbewahrungsdauer, falls begrenzt
    pub fn aufbewahrung(&self) -> Option<chrono::Duration> {
        (self.nachrichten.aufbewahrung_tage > 0)
            .then(|| chrono::Duration::days(i64::from(self.nachrichten.aufbewahrung_tage)))
    }
}
