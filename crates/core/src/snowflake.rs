//! Snowflake-ID-Generator fuer gespeicherte Nachrichten
//!
//! Layout (63 Bit nutzbar):
//!
//! ```text
//! | 41 Bit Millisekunden seit EPOCH | 10 Bit Knoten | 12 Bit Sequenz |
//! ```
//!
//! IDs sind pro Generator streng monoton steigend und damit zeitlich
//! sortierbar.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Eigene Epoche (2020-01-01T00:00:00Z in ms)
pub const EPOCH_MS: u64 = 1_577_836_800_000;

const KNOTEN_BITS: u64 = 10;
const SEQUENZ_BITS: u64 = 12;
const SEQUENZ_MASKE: u64 = (1 << SEQUENZ_BITS) - 1;

/// Erzeugt eindeutige, zeitlich geordnete 64-Bit-IDs
#[derive(Debug)]
pub struct SnowflakeGenerator {
    knoten: u64,
    /// (letzter Zeitstempel, Sequenz)
    zustand: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    /// Erstellt einen Generator fuer den gegebenen Knoten (10 Bit)
    pub fn neu(knoten: u16) -> Self {
        Self {
            knoten: u64::from(knoten) & ((1 << KNOTEN_BITS) - 1),
            zustand: Mutex::new((0, 0)),
        }
    }

    /// Erzeugt die naechste ID
    pub fn erzeugen(&self) -> i64 {
        let mut zustand = self
            .zustand
            .lock()
            .unwrap_or_else(|vergiftet| vergiftet.into_inner());
        let (letzter, sequenz) = *zustand;

        let mut jetzt = aktuelle_ms().max(letzter);
        let sequenz = if jetzt == letzter {
            let naechste = (sequenz + 1) & SEQUENZ_MASKE;
            if naechste == 0 {
                // Sequenz erschoepft: auf die naechste Millisekunde ausweichen
                jetzt = letzter + 1;
            }
            naechste
        } else {
            0
        };
        *zustand = (jetzt, sequenz);

        (((jetzt - EPOCH_MS) << (KNOTEN_BITS + SEQUENZ_BITS))
            | (self.knoten << SEQUENZ_BITS)
            | sequenz) as i64
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::neu(1)
    }
}

/// Extrahiert den Unix-Zeitstempel (ms) aus einer Snowflake-ID
pub fn zeitstempel_ms(id: i64) -> u64 {
    ((id as u64) >> (KNOTEN_BITS + SEQUENZ_BITS)) + EPOCH_MS
}

fn aktuelle_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
