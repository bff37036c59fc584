//! Prometheus-kompatible Metriken fuer Hafenfunk
//!
//! Registrierte Metriken:
//! - `hafenfunk_zuweisungen_total` – Counter: Erfolgreiche Kanalzuweisungen
//! - `hafenfunk_zuweisungen_fehlgeschlagen_total` – Counter: Anfragen ohne freien Kanal
//! - `hafenfunk_freigaben_total` – Counter: Kanalfreigaben
//! - `hafenfunk_zuruecksetzungen_total` – Counter: Zuruecksetzen aller Kanaele
//! - `hafenfunk_kanaele_zugewiesen` – Gauge: Aktuell zugewiesene Kanaele
//! - `hafenfunk_speicher_fehler_total` – Counter: Fehlgeschlagene Schreibvorgaenge
//! - `hafenfunk_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `hafenfunk_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Hafenfunk-Prometheus-Metriken
#[derive(Clone)]
pub struct HafenfunkMetriken {
    pub registry: Arc<Registry>,

    // Kanal-Metriken
    pub zuweisungen_total: IntCounter,
    pub zuweisungen_fehlgeschlagen_total: IntCounter,
    pub freigaben_total: IntCounter,
    pub zuruecksetzungen_total: IntCounter,
    pub kanaele_zugewiesen: IntGauge,
    pub speicher_fehler_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

fn zaehler(registry: &Registry, name: &str, hilfe: &str) -> Result<IntCounter> {
    let c = IntCounter::with_opts(Opts::new(name, hilfe))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

impl HafenfunkMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Kanal-Metriken ---
        let zuweisungen_total = zaehler(
            &registry,
            "hafenfunk_zuweisungen_total",
            "Anzahl erfolgreicher Kanalzuweisungen",
        )?;
        let zuweisungen_fehlgeschlagen_total = zaehler(
            &registry,
            "hafenfunk_zuweisungen_fehlgeschlagen_total",
            "Anzahl Zuweisungsanfragen ohne freien Kanal",
        )?;
        let freigaben_total = zaehler(
            &registry,
            "hafenfunk_freigaben_total",
            "Anzahl Kanalfreigaben",
        )?;
        let zuruecksetzungen_total = zaehler(
            &registry,
            "hafenfunk_zuruecksetzungen_total",
            "Anzahl Zuruecksetzungen aller Kanaele",
        )?;
        let speicher_fehler_total = zaehler(
            &registry,
            "hafenfunk_speicher_fehler_total",
            "Anzahl fehlgeschlagener Schreibvorgaenge des Kanalregisters",
        )?;

        let kanaele_zugewiesen = IntGauge::with_opts(Opts::new(
            "hafenfunk_kanaele_zugewiesen",
            "Anzahl aktuell zugewiesener Kanaele",
        ))?;
        registry.register(Box::new(kanaele_zugewiesen.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("hafenfunk_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "hafenfunk_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            zuweisungen_total,
            zuweisungen_fehlgeschlagen_total,
            freigaben_total,
            zuruecksetzungen_total,
            kanaele_zugewiesen,
            speicher_fehler_total,
            http_requests_total,
            http_request_duration_seconds,
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
pub fn metrics_router(metriken: HafenfunkMetriken) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(
    axum::extract::State(metriken): axum::extract::State<HafenfunkMetriken>,
) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = HafenfunkMetriken::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn kanal_zaehler_und_gauge() {
        let metriken = HafenfunkMetriken::neu().unwrap();
        metriken.zuweisungen_total.inc();
        metriken.zuweisungen_total.inc();
        metriken.kanaele_zugewiesen.set(2);
        metriken.kanaele_zugewiesen.dec();

        assert_eq!(metriken.zuweisungen_total.get(), 2);
        assert_eq!(metriken.kanaele_zugewiesen.get(), 1);
    }

    #[test]
    fn http_counter_mit_labels() {
        let metriken = HafenfunkMetriken::neu().unwrap();
        metriken
            .http_requests_total
            .with_label_values(&["GET", "/v1/kanaele", "200"])
            .inc();
        let wert = metriken
            .http_requests_total
            .with_label_values(&["GET", "/v1/kanaele", "200"])
            .get();
        assert_eq!(wert, 1);
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = HafenfunkMetriken::neu().unwrap();
        metriken.freigaben_total.inc();
        metriken.speicher_fehler_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("hafenfunk_freigaben_total 1"));
        assert!(output.contains("hafenfunk_speicher_fehler_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE hafenfunk_kanaele_zugewiesen gauge"));
    }

    #[test]
    fn zwei_instanzen_unabhaengig() {
        let a = HafenfunkMetriken::neu().unwrap();
        let b = HafenfunkMetriken::neu().unwrap();
        a.zuruecksetzungen_total.inc();
        assert_eq!(b.zuruecksetzungen_total.get(), 0);
    }
}
