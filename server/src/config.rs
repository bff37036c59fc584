//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::collections::HashSet;

use anyhow::bail;
use hafenfunk_funk::{AgentDefinition, FunkKonfig, SperrKonfig, WerkzeugAusfuehrer};
use hafenfunk_kanal::{standard_definitionen, KanalDefinition, STANDARD_SCHLUESSEL};
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Persistenz des Kanalregisters
    pub speicher: SpeicherEinstellungen,
    /// Statisch konfigurierte Kanaele
    pub kanaele: KanalEinstellungen,
    /// Zeitkonstanten der Antwortsperre
    pub sperre: SperrEinstellungen,
    /// Lotsen-Agent der Sprachsitzung
    pub agent: AgentEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Bind-Adresse fuer REST und Observability
    pub bind_adresse: String,
    /// Port fuer die Betreiber-API
    pub rest_port: u16,
    /// CORS-Origins fuer REST (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "博多ポートラジオ".into(),
            bind_adresse: "0.0.0.0".into(),
            rest_port: 8080,
            cors_origins: vec![],
        }
    }
}

/// Speicher-Backend des Kanalregisters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeicherTyp {
    /// Dauerhaft in einer SQLite-Datenbank
    Sqlite,
    /// Fluechtig im Arbeitsspeicher
    Speicher,
}

/// Persistenz-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeicherEinstellungen {
    pub typ: SpeicherTyp,
    /// Verbindungs-URL (nur `sqlite`)
    pub url: String,
    /// Schluessel, unter dem der Schnappschuss liegt
    pub schluessel: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// Byte-Kontingent (nur `speicher`, leer = unbegrenzt)
    pub kontingent: Option<usize>,
}

impl Default for SpeicherEinstellungen {
    fn default() -> Self {
        Self {
            typ: SpeicherTyp::Sqlite,
            url: "sqlite://hafenfunk.db".into(),
            schluessel: STANDARD_SCHLUESSEL.into(),
            max_verbindungen: 5,
            kontingent: None,
        }
    }
}

/// Kanalliste
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KanalEinstellungen {
    pub liste: Vec<KanalDefinition>,
}

impl Default for KanalEinstellungen {
    fn default() -> Self {
        Self {
            liste: standard_definitionen(),
        }
    }
}

/// Antwortsperre in Millisekunden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SperrEinstellungen {
    pub unterdrueckung_ms: u64,
    pub zwangs_timeout_ms: u64,
    pub nachlauf_ms: u64,
}

impl Default for SperrEinstellungen {
    fn default() -> Self {
        Self {
            unterdrueckung_ms: 3_000,
            zwangs_timeout_ms: 10_000,
            nachlauf_ms: 1_000,
        }
    }
}

impl SperrEinstellungen {
    pub fn sperr_konfig(&self) -> SperrKonfig {
        SperrKonfig::aus_millis(
            self.unterdrueckung_ms,
            self.zwangs_timeout_ms,
            self.nachlauf_ms,
        )
    }
}

/// Lotsen-Agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEinstellungen {
    /// Modell der Echtzeit-Sprachsitzung
    pub modell: String,
    pub stimme: String,
    /// Eigene Anweisungen (leer = Standard-Anweisungen des Lotsen)
    pub anweisungen: Option<String>,
}

impl Default for AgentEinstellungen {
    fn default() -> Self {
        Self {
            modell: "gpt-realtime".into(),
            stimme: "alloy".into(),
            anweisungen: None,
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
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config: Self = match std::fs::read_to_string(pfad) {
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
        config.validieren()?;
        Ok(config)
    }

    /// Prueft Kanalliste und Zeitkonstanten
    pub fn validieren(&self) -> anyhow::Result<()> {
        if self.kanaele.liste.is_empty() {
            bail!("Kanalliste darf nicht leer sein");
        }
        let mut gesehen = HashSet::new();
        for def in &self.kanaele.liste {
            if !gesehen.insert(def.nummer) {
                bail!("Kanal {} ist mehrfach konfiguriert", def.nummer.inner());
            }
        }
        let s = &self.sperre;
        if s.unterdrueckung_ms == 0 || s.zwangs_timeout_ms == 0 || s.nachlauf_ms == 0 {
            bail!("Zeitkonstanten der Antwortsperre muessen groesser als 0 sein");
        }
        if self.speicher.schluessel.trim().is_empty() {
            bail!("Speicherschluessel darf nicht leer sein");
        }
        Ok(())
    }

    /// Laufzeitparameter fuer eine Funkstelle mit den gegebenen Werkzeugen
    pub fn funk_konfig(&self, werkzeuge: &dyn WerkzeugAusfuehrer) -> FunkKonfig {
        let mut agent = AgentDefinition::hafenfunk(&self.agent.stimme, werkzeuge);
        if let Some(anweisungen) = &self.agent.anweisungen {
            agent = agent.mit_anweisungen(anweisungen);
        }
        FunkKonfig {
            modell: self.agent.modell.clone(),
            agent,
            sperre: self.sperre.sperr_konfig(),
        }
    }

    /// Gibt die Bind-Adresse fuer die Betreiber-API zurueck
    pub fn rest_bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.server.rest_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> String {
        format!("{}:{}", self.server.bind_adresse, self.observability.port)
    }
}
