//! Prometheus-kompatible Metriken fuer Plauder
//!
//! Registrierte Metriken:
//! - `plauder_connected_clients` – Gauge: offene TCP-Verbindungen
//! - `plauder_authenticated_sessions` – Gauge: angemeldete Sitzungen
//! - `plauder_frames_received_total` – Counter: empfangene Frames (nach Art)
//! - `plauder_protocol_faults_total` – Counter: wegen Protokollfehler getrennt
//! - `plauder_messages_queued_total` – Counter: gespeicherte Direktnachrichten
//! - `plauder_messages_delivered_total` – Counter: zugestellte Direktnachrichten
//! - `plauder_pushes_dropped_total` – Counter: verworfene Praesenz-Pushes

use anyhow::Result;
use axum::{extract::State, http, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Plauder-Prometheus-Metriken
#[derive(Clone)]
pub struct PlauderMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub authenticated_sessions: IntGauge,
    pub frames_received_total: IntCounterVec,
    pub protocol_faults_total: IntCounter,
    pub messages_queued_total: IntCounter,
    pub messages_delivered_total: IntCounter,
    pub pushes_dropped_total: IntCounter,
}

impl PlauderMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "plauder_connected_clients",
            "Anzahl offener TCP-Verbindungen",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let authenticated_sessions = IntGauge::with_opts(Opts::new(
            "plauder_authenticated_sessions",
            "Anzahl angemeldeter Sitzungen",
        ))?;
        registry.register(Box::new(authenticated_sessions.clone()))?;

        let frames_received_total = IntCounterVec::new(
            Opts::new(
                "plauder_frames_received_total",
                "Empfangene Frames nach Paketart",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(frames_received_total.clone()))?;

        let protocol_faults_total = IntCounter::with_opts(Opts::new(
            "plauder_protocol_faults_total",
            "Wegen Protokollfehler getrennte Verbindungen",
        ))?;
        registry.register(Box::new(protocol_faults_total.clone()))?;

        let messages_queued_total = IntCounter::with_opts(Opts::new(
            "plauder_messages_queued_total",
            "Gespeicherte Direktnachrichten",
        ))?;
        registry.register(Box::new(messages_queued_total.clone()))?;

        let messages_delivered_total = IntCounter::with_opts(Opts::new(
            "plauder_messages_delivered_total",
            "Zugestellte Direktnachrichten",
        ))?;
        registry.register(Box::new(messages_delivered_total.clone()))?;

        let pushes_dropped_total = IntCounter::with_opts(Opts::new(
            "plauder_pushes_dropped_total",
            "Wegen voller Queue verworfene Praesenz-Pushes",
        ))?;
        registry.register(Box::new(pushes_dropped_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            authenticated_sessions,
            frames_received_total,
            protocol_faults_total,
            messages_queued_total,
            messages_delivered_total,
            pushes_dropped_total,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: PlauderMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<PlauderMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            http::StatusCode::OK,
            [(http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauges_setzen() {
        let m = PlauderMetrics::neu().unwrap();
        m.connected_clients.inc();
        m.connected_clients.inc();
        m.connected_clients.dec();
        m.authenticated_sessions.set(4);
        assert_eq!(m.connected_clients.get(), 1);
        assert_eq!(m.authenticated_sessions.get(), 4);
    }

    #[test]
    fn frames_nach_art() {
        let m = PlauderMetrics::neu().unwrap();
        m.frames_received_total.with_label_values(&["MSG"]).inc();
        m.frames_received_total.with_label_values(&["MSG"]).inc();
        m.frames_received_total.with_label_values(&["PING"]).inc();
        assert_eq!(m.frames_received_total.with_label_values(&["MSG"]).get(), 2);
    }

    #[test]
    fn export_prometheus_format() {
        let m = PlauderMetrics::neu().unwrap();
        m.messages_queued_total.inc();
        m.pushes_dropped_total.inc_by(3);

        let output = m.exportieren().unwrap();
        assert!(output.contains("plauder_messages_queued_total 1"));
        assert!(output.contains("plauder_pushes_dropped_total 3"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn zwei_instanzen_sind_unabhaengig() {
        // Eigene Registry je Instanz: keine Doppelregistrierung
        let a = PlauderMetrics::neu().unwrap();
        let b = PlauderMetrics::neu().unwrap();
        a.messages_delivered_total.inc();
        assert_eq!(b.messages_delivered_total.get(), 0);
    }
}
