//! hafenfunk-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod rest;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::{ServerConfig, SpeicherTyp};
use hafenfunk_core::KanalEreignis;
use hafenfunk_funk::KanalWerkzeuge;
use hafenfunk_kanal::{ArbeitsSpeicher, KanalRegister, SchluesselWertSpeicher, SqliteSpeicher};
use hafenfunk_observability::{observability_server_starten, HafenfunkMetriken, HealthState};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Speicher oeffnen und Kanalregister laden
    /// 2. Metriken an die Registerereignisse koppeln
    /// 3. Observability-Server starten (optional)
    /// 4. Betreiber-API starten
    /// 5. Auf Ctrl-C warten
    pub async fn starten(self) -> Result<()> {
        tracing::info!(
            server_name = %self.config.server.name,
            rest = %self.config.rest_bind_adresse(),
            "Server startet"
        );

        let register = Arc::new(register_starten(&self.config).await?);

        let metriken = HafenfunkMetriken::neu()?;
        let health = HealthState::neu();
        let beobachter = ereignisse_verfolgen(
            Arc::clone(&register),
            metriken.clone(),
            health.clone(),
        )
        .await;

        if self.config.observability.aktiviert {
            let addr: SocketAddr = self
                .config
                .observability_bind_adresse()
                .parse()
                .context("Ungueltige Observability-Adresse")?;
            let m = metriken.clone();
            let h = health.clone();
            tokio::spawn(async move {
                if let Err(e) = observability_server_starten(addr, m, h).await {
                    tracing::error!(fehler = %e, "Observability-Server beendet");
                }
            });
        }

        let werkzeuge = KanalWerkzeuge::neu(Arc::clone(&register));
        let funk = self.config.funk_konfig(&werkzeuge);
        tracing::info!(
            modell = %funk.modell,
            stimme = %funk.agent.stimme,
            werkzeuge = funk.agent.werkzeuge.len(),
            "Lotsen-Agent konfiguriert"
        );

        let state = rest::ApiState::neu(Arc::clone(&register), funk);
        let app = rest::app(state, metriken, &self.config.server.cors_origins);

        let listener = tokio::net::TcpListener::bind(self.config.rest_bind_adresse())
            .await
            .with_context(|| {
                format!("REST-Adresse {} nicht bindbar", self.config.rest_bind_adresse())
            })?;
        tracing::info!(addr = %self.config.rest_bind_adresse(), "Betreiber-API gestartet");

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(fehler = %e, "Shutdown-Signal nicht empfangbar");
                }
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            })
            .await?;

        beobachter.abort();
        Ok(())
    }
}

/// Oeffnet den konfigurierten Speicher und laedt das Kanalregister
pub async fn register_starten(config: &ServerConfig) -> Result<KanalRegister> {
    let s = &config.speicher;
    let speicher: Arc<dyn SchluesselWertSpeicher> = match s.typ {
        SpeicherTyp::Sqlite => {
            tracing::info!(url = %s.url, "Datenbankverbindung wird hergestellt");
            Arc::new(
                SqliteSpeicher::oeffnen(&s.url, s.max_verbindungen)
                    .await
                    .with_context(|| format!("SQLite-Speicher '{}' nicht oeffenbar", s.url))?,
            )
        }
        SpeicherTyp::Speicher => {
            tracing::info!(kontingent = ?s.kontingent, "Fluechtiger Speicher aktiv");
            match s.kontingent {
                Some(bytes) => Arc::new(ArbeitsSpeicher::mit_kontingent(bytes)),
                None => Arc::new(ArbeitsSpeicher::neu()),
            }
        }
    };

    let register =
        KanalRegister::starten(speicher, &s.schluessel, config.kanaele.liste.clone()).await?;
    Ok(register)
}

/// Koppelt Registerereignisse an Metriken und Health-Status.
///
/// Der Gauge der zugewiesenen Kanaele wird vor der Rueckkehr gesetzt und
/// danach nach jedem Ereignis aus dem Register nachgelesen.
pub async fn ereignisse_verfolgen(
    register: Arc<KanalRegister>,
    metriken: HafenfunkMetriken,
    health: HealthState,
) -> JoinHandle<()> {
    let mut rx = register.abonnieren();
    metriken
        .kanaele_zugewiesen
        .set(register.zugewiesene_anzahl().await as i64);
    health.speicher_status_setzen(register.speicher_ok());

    tokio::spawn(async move {
        loop {
            let ereignis = match rx.recv().await {
                Ok(e) => e,
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(verpasst = n, "Registerereignisse verpasst");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            match &ereignis {
                KanalEreignis::Zugewiesen { .. } => metriken.zuweisungen_total.inc(),
                KanalEreignis::ZuweisungFehlgeschlagen { .. } => {
                    metriken.zuweisungen_fehlgeschlagen_total.inc()
                }
                KanalEreignis::Freigegeben { .. } => metriken.freigaben_total.inc(),
                KanalEreignis::Zurueckgesetzt => metriken.zuruecksetzungen_total.inc(),
                KanalEreignis::SpeichernFehlgeschlagen { .. } => {
                    metriken.speicher_fehler_total.inc()
                }
            }

            metriken
                .kanaele_zugewiesen
                .set(register.zugewiesene_anzahl().await as i64);
            health.speicher_status_setzen(register.speicher_ok());
        }
    })
}
