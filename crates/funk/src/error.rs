//! Fehlertypen der Funkstelle

use hafenfunk_core::HafenfunkError;
use thiserror::Error;

/// Fehler der Funkstelle und ihrer Kollaborateure
#[derive(Debug, Error)]
pub enum FunkFehler {
    #[error("Verbindung ist nicht hergestellt")]
    NichtVerbunden,

    #[error("Bereits verbunden")]
    BereitsVerbunden,

    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Zugangsdaten nicht erhalten: {0}")]
    Zugangsdaten(String),

    #[error("Stummschaltung fehlgeschlagen: {0}")]
    Stummschaltung(String),

    #[error("Unbekanntes Werkzeug: {0}")]
    UnbekanntesWerkzeug(String),

    #[error("Ungueltige Werkzeugargumente: {0}")]
    UngueltigeArgumente(String),

    #[error("JSON-Fehler: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<FunkFehler> for HafenfunkError {
    fn from(e: FunkFehler) -> Self {
        match e {
            FunkFehler::NichtVerbunden => HafenfunkError::NichtVerbunden,
            FunkFehler::Verbindung(m) => HafenfunkError::Verbindung(m),
            FunkFehler::Zugangsdaten(m) => HafenfunkError::Zugangsdaten(m),
            andere => HafenfunkError::Intern(andere.to_string()),
        }
    }
}
