//! Ereignis-Definitionen
//!
//! Zwei geschlossene Ereignisfamilien:
//! - `SitzungsEreignis`: Lebenszyklus-Ereignisse der Sprachsitzung
//!   (Agent-Antwort, Audio, Werkzeugaufrufe, Fehler)
//! - `KanalEreignis`: Zustandsaenderungen des Kanalregisters fuer die Anzeige

use crate::types::{KanalNummer, Prioritaet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ereignisse, die eine Sprachsitzung an ihre Abonnenten liefert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "typ", rename_all = "snake_case")]
pub enum SitzungsEreignis {
    /// Der Agent beginnt eine Antwort
    AgentStart { agent: String },
    /// Der Agent hat seine Antwort abgeschlossen
    AgentEnde { ausgabe: String },
    /// Audio-Wiedergabe der Antwort beginnt
    AudioStart,
    /// Audio-Wiedergabe ist beendet
    AudioGestoppt,
    /// Sitzungsfehler
    Fehler { meldung: String },
    /// Ein Werkzeug wird ausgefuehrt
    WerkzeugStart {
        werkzeug: String,
        argumente: serde_json::Value,
    },
    /// Werkzeugausfuehrung abgeschlossen, `ergebnis` ist serialisiertes JSON
    WerkzeugEnde { werkzeug: String, ergebnis: String },
    /// Gespraechsverlauf wurde aktualisiert
    VerlaufAktualisiert { eintraege: usize },
}

impl SitzungsEreignis {
    /// Gibt den Ereignisnamen zurueck (fuer Logging)
    pub fn name(&self) -> &'static str {
        match self {
            Self::AgentStart { .. } => "agent_start",
            Self::AgentEnde { .. } => "agent_end",
            Self::AudioStart => "audio_start",
            Self::AudioGestoppt => "audio_stopped",
            Self::Fehler { .. } => "error",
            Self::WerkzeugStart { .. } => "tool_start",
            Self::WerkzeugEnde { .. } => "tool_end",
            Self::VerlaufAktualisiert { .. } => "history_updated",
        }
    }
}

/// Zustandsaenderungen des Kanalregisters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KanalEreignis {
    /// Ein Kanal wurde einem Schiff zugewiesen
    Zugewiesen {
        kanal: KanalNummer,
        schiff: String,
        prioritaet: Prioritaet,
        zeitpunkt: DateTime<Utc>,
    },
    /// Kein freier Kanal fuer das Schiff
    ZuweisungFehlgeschlagen { schiff: String },
    /// Ein Kanal wurde freigegeben
    Freigegeben {
        kanal: KanalNummer,
        schiff: Option<String>,
    },
    /// Alle Kanaele wurden auf Standardwerte zurueckgesetzt
    Zurueckgesetzt,
    /// Persistenz-Schreibvorgang fehlgeschlagen (In-Memory-Zustand bleibt gueltig)
    SpeichernFehlgeschlagen { grund: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitzungs_ereignis_ist_serde_kompatibel() {
        let e = SitzungsEreignis::WerkzeugStart {
            werkzeug: "assignVHFChannel".into(),
            argumente: serde_json::json!({ "vesselName": "さくら丸" }),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"typ\":\"werkzeug_start\""));
        let zurueck: SitzungsEreignis = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck, e);
    }

    #[test]
    fn ereignis_namen() {
        assert_eq!(SitzungsEreignis::AudioGestoppt.name(), "audio_stopped");
        assert_eq!(
            SitzungsEreignis::AgentEnde { ausgabe: String::new() }.name(),
            "agent_end"
        );
    }
}
