//! Fehlertypen fuer Hafenfunk
//!
//! Zentraler Fehler-Enum fuer Fehler, die ueber Crate-Grenzen gereicht
//! werden. Die Fach-Crates definieren eigene Fehler und konvertieren bei
//! Bedarf via `From`.

use thiserror::Error;

/// Globaler Result-Alias fuer Hafenfunk
pub type Result<T> = std::result::Result<T, HafenfunkError>;

/// Systemweite Fehler
#[derive(Debug, Error)]
pub enum HafenfunkError {
    // --- Verbindung & Kollaborateure ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Zugangsdaten nicht erhalten: {0}")]
    Zugangsdaten(String),

    #[error("Nicht verbunden")]
    NichtVerbunden,

    // --- Persistenz ---
    #[error("Speicherfehler: {0}")]
    Speicher(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl HafenfunkError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Fehler von Kollaborateuren (Sitzung, Zugangsdaten) werden angezeigt,
    /// aber nie automatisch wiederholt
    pub fn ist_kollaborateur_fehler(&self) -> bool {
        matches!(self, Self::Verbindung(_) | Self::Zugangsdaten(_))
    }
}
