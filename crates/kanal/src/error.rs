//! Fehlertypen fuer das Kanalregister

use hafenfunk_core::{HafenfunkError, KanalNummer};
use thiserror::Error;

/// Fachliche Ergebnisse einer Registeroperation, die keine Zuweisung/Freigabe
/// ergeben. Aufrufer verzweigen darauf, es sind keine Ausnahmezustaende.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KanalFehler {
    #[error("Kein freier Kanal verfuegbar")]
    KeinKanalVerfuegbar,

    #[error("Kein Kanal fuer Schiff '{schiff}' zugewiesen")]
    KanalNichtGefunden { schiff: String },

    #[error("Unbekannter Kanal: {0}")]
    UnbekannterKanal(KanalNummer),

    #[error("Schiffsname darf nicht leer sein")]
    UngueltigerSchiffsname,

    #[error("Ungueltige Kanalkonfiguration: {0}")]
    Konfiguration(String),
}

impl KanalFehler {
    /// Fehlertext im JSON-Ergebnis der Werkzeuge
    pub fn wire_text(&self) -> &'static str {
        match self {
            Self::KeinKanalVerfuegbar => "no channel available",
            Self::KanalNichtGefunden { .. } => "channel not found",
            Self::UnbekannterKanal(_) => "unknown channel",
            Self::UngueltigerSchiffsname => "invalid vessel name",
            Self::Konfiguration(_) => "invalid configuration",
        }
    }
}

/// Fehler des Persistenz-Kollaborateurs
#[derive(Debug, Error)]
pub enum SpeicherFehler {
    #[error("Speicherkontingent ueberschritten: {benoetigt} Bytes benoetigt, {verfuegbar} Bytes verfuegbar")]
    KontingentUeberschritten { benoetigt: usize, verfuegbar: usize },

    #[error("Gespeicherter Zustand ungueltig: {0}")]
    Ungueltig(String),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLx-Fehler: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration-Fehler: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl SpeicherFehler {
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::Ungueltig(msg.into())
    }

    /// Gibt true zurueck wenn der gelesene Inhalt nicht verwertbar war
    /// (im Gegensatz zu einem Fehler des Speichers selbst)
    pub fn ist_beschaedigt(&self) -> bool {
        matches!(self, Self::Ungueltig(_) | Self::Json(_))
    }
}

impl From<SpeicherFehler> for HafenfunkError {
    fn from(e: SpeicherFehler) -> Self {
        HafenfunkError::Speicher(e.to_string())
    }
}

impl From<KanalFehler> for HafenfunkError {
    fn from(e: KanalFehler) -> Self {
        match e {
            KanalFehler::Konfiguration(m) => HafenfunkError::Konfiguration(m),
            andere => HafenfunkError::Intern(andere.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_texte() {
        assert_eq!(
            KanalFehler::KeinKanalVerfuegbar.wire_text(),
            "no channel available"
        );
        assert_eq!(
            KanalFehler::KanalNichtGefunden { schiff: "x".into() }.wire_text(),
            "channel not found"
        );
    }

    #[test]
    fn beschaedigt_erkennung() {
        assert!(SpeicherFehler::ungueltig("kaputt").ist_beschaedigt());
        assert!(!SpeicherFehler::KontingentUeberschritten {
            benoetigt: 10,
            verfuegbar: 0
        }
        .ist_beschaedigt());
    }

    #[test]
    fn konvertierung_in_hafenfunk_fehler() {
        let e: HafenfunkError = KanalFehler::Konfiguration("leer".into()).into();
        assert!(matches!(e, HafenfunkError::Konfiguration(m) if m == "leer"));

        let e: HafenfunkError = SpeicherFehler::ungueltig("kaputt").into();
        assert!(matches!(e, HafenfunkError::Speicher(_)));
    }
}
