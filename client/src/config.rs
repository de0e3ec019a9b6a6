//! Client-Konfiguration
//!
//! Optional aus einer TOML-Datei geladen, danach durch Umgebungsvariablen
//! ueberschrieben (`SVR_ADDR`, `DB_NAME`). Ohne Datei gelten die
//! Standardwerte.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Umgebungsvariable fuer die Server-Adresse
pub const ENV_SERVER_ADRESSE: &str = "SVR_ADDR";
/// Umgebungsvariable fuer den Dateinamen des lokalen Speichers
pub const ENV_DB_NAME: &str = "DB_NAME";

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub verbindung: VerbindungsEinstellungen,
    pub speicher: SpeicherEinstellungen,
    pub logging: LoggingEinstellungen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerbindungsEinstellungen {
    /// `host:port` des Servers
    pub server_adresse: String,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for VerbindungsEinstellungen {
    fn default() -> Self {
        Self {
            server_adresse: "127.0.0.1:8888".into(),
            max_frame_groesse: plauder_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Lokaler Speicher unter `~/.plauder`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    /// Arbeitsverzeichnis (leer = `~/.plauder`)
    pub verzeichnis: Option<PathBuf>,
    /// Dateiname der SQLite-Datei
    pub db_name: String,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            verzeichnis: None,
            db_name: "client.db".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level; der Client loggt nach stderr
    pub level: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus `pfad` (falls angegeben und vorhanden)
    /// und wendet anschliessend die Umgebungsvariablen an
    pub fn laden(pfad: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match pfad {
            Some(pfad) => match std::fs::read_to_string(pfad) {
                Ok(inhalt) => toml::from_str(&inhalt).map_err(|e| {
                    anyhow::anyhow!("Konfigurationsfehler in '{}': {e}", pfad.display())
                })?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(e) => {
                    return Err(anyhow::anyhow!(
                        "Konfigurationsdatei '{}' nicht lesbar: {e}",
                        pfad.display()
                    ))
                }
            },
            None => Self::default(),
        };
        config.umgebung_anwenden(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Ueberschreibt Werte aus der Umgebung; `lesen` liefert den Wert
    /// einer Variablen
    pub fn umgebung_anwenden(&mut self, lesen: impl Fn(&str) -> Option<String>) {
        if let Some(adresse) = lesen(ENV_SERVER_ADRESSE).filter(|a| !a.is_empty()) {
            self.verbindung.server_adresse = adresse;
        }
        if let Some(name) = lesen(ENV_DB_NAME).filter(|n| !n.is_empty()) {
            self.speicher.db_name = name;
        }
    }

    /// Arbeitsverzeichnis des Clients
    pub fn arbeitsverzeichnis(&self) -> PathBuf {
        match &self.speicher.verzeichnis {
            Some(v) => v.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".plauder"),
        }
    }

    /// Vollstaendiger Pfad der SQLite-Datei
    pub fn db_pfad(&self) -> PathBuf {
        self.arbeitsverzeichnis().join(&self.speicher.db_name)
    }
}
