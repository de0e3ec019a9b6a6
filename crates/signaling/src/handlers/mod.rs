//! Fachlogik je Paketart
//!
//! Die Handler sind freie Funktionen ohne Verbindungszustand. Sie erhalten
//! die dekodierte Anfrage und einen Schnappschuss der Sitzung; Aenderungen
//! an der Sitzung nimmt ausschliesslich der Dispatcher vor.

pub mod auth_handler;
pub mod chat_handler;
pub mod user_handler;
