//! Presence-Manager – Offene Verbindungen und angemeldete Sitzungen
//!
//! Ephemerer Zustand aller Verbindungen dieses Prozesses. Dient dem
//! Client-Limit und den Metriken. Der persistente Online-Status steht in
//! `accounts.online`, die Zustellung von Praesenz-Pushes uebernimmt der
//! `PushBus`.

use dashmap::DashMap;
use plauder_core::{AccountId, SessionId};
use std::net::SocketAddr;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// VerbindungsEintrag
// ---------------------------------------------------------------------------

/// Presence-Info einer Verbindung
#[derive(Debug, Clone)]
pub struct VerbindungsEintrag {
    pub session_id: SessionId,
    pub peer_addr: SocketAddr,
    /// `None` solange die Verbindung anonym ist
    pub konto: Option<(AccountId, String)>,
}

// ---------------------------------------------------------------------------
// PresenceManager
// ---------------------------------------------------------------------------

/// Verwaltet alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct PresenceManager {
    inner: Arc<DashMap<SessionId, VerbindungsEintrag>>,
}

impl PresenceManager {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Neue, noch anonyme Verbindung
    pub fn verbunden(&self, session_id: SessionId, peer_addr: SocketAddr) {
        self.inner.insert(
            session_id,
            VerbindungsEintrag {
                session_id,
                peer_addr,
                konto: None,
            },
        );
    }

    /// Verbindung hat sich angemeldet (auch erneut als anderes Konto)
    pub fn angemeldet(&self, session_id: SessionId, account_id: AccountId, username: &str) {
        if let Some(mut eintrag) = self.inner.get_mut(&session_id) {
            eintrag.konto = Some((account_id, username.to_string()));
            tracing::debug!(session_id = %session_id, username = %username, "Sitzung angemeldet");
        }
    }

    /// Verbindung hat sich abgemeldet, bleibt aber offen
    pub fn abgemeldet(&self, session_id: SessionId) {
        if let Some(mut eintrag) = self.inner.get_mut(&session_id) {
            eintrag.konto = None;
        }
    }

    /// Verbindung geschlossen
    pub fn getrennt(&self, session_id: SessionId) -> Option<VerbindungsEintrag> {
        self.inner.remove(&session_id).map(|(_, e)| e)
    }

    pub fn verbindungen(&self) -> usize {
        self.inner.len()
    }

    pub fn angemeldete_sitzungen(&self) -> usize {
        self.inner.iter().filter(|e| e.konto.is_some()).count()
    }

    /// Prueft ob irgendeine Verbindung als `username` angemeldet ist
    pub fn ist_online(&self, username: &str) -> bool {
        self.inner.iter().any(|e| {
            e.konto
                .as_ref()
                .map(|(_, name)| name == username)
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn verbinden_anmelden_trennen() {
        let pm = PresenceManager::neu();
        let sid = SessionId(1);

        pm.verbunden(sid, addr());
        assert_eq!(pm.verbindungen(), 1);
        assert_eq!(pm.angemeldete_sitzungen(), 0);

        pm.angemeldet(sid, AccountId(7), "alice");
        assert_eq!(pm.angemeldete_sitzungen(), 1);
        assert!(pm.ist_online("alice"));

        let eintrag = pm.getrennt(sid).expect("Eintrag muss existieren");
        assert_eq!(eintrag.konto, Some((AccountId(7), "alice".to_string())));
        assert_eq!(pm.verbindungen(), 0);
        assert!(!pm.ist_online("alice"));
    }

    #[test]
    fn abmelden_laesst_verbindung_offen() {
        let pm = PresenceManager::neu();
        pm.verbunden(SessionId(1), addr());
        pm.angemeldet(SessionId(1), AccountId(1), "bob");
        pm.abgemeldet(SessionId(1));

        assert_eq!(pm.verbindungen(), 1);
        assert_eq!(pm.angemeldete_sitzungen(), 0);
    }

    #[test]
    fn anmelden_ohne_verbindung_wird_ignoriert() {
        let pm = PresenceManager::neu();
        pm.angemeldet(SessionId(9), AccountId(1), "geist");
        assert_eq!(pm.verbindungen(), 0);
        assert!(!pm.ist_online("geist"));
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let pm1 = PresenceManager::neu();
        let pm2 = pm1.clone();
        pm1.verbunden(SessionId(3), addr());
        assert_eq!(pm2.verbindungen(), 1);
    }
}
