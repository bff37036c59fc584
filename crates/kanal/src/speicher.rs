//! Persistenz-Kollaborateur: dauerhafter Schluessel-Wert-Speicher
//!
//! Das `SchluesselWertSpeicher`-Trait abstrahiert den konkreten Speicher
//! (In-Memory, SQLite). Ein Schreibvorgang ersetzt den Wert unter dem
//! Schluessel vollstaendig; der Speicher darf Schreibvorgaenge ablehnen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SpeicherFehler;

/// Abstrakter Schluessel-Wert-Speicher
#[async_trait]
pub trait SchluesselWertSpeicher: Send + Sync {
    /// Wert unter dem Schluessel lesen, `None` wenn nicht vorhanden
    async fn lesen(&self, schluessel: &str) -> Result<Option<String>, SpeicherFehler>;

    /// Wert unter dem Schluessel vollstaendig ersetzen
    async fn schreiben(&self, schluessel: &str, wert: &str) -> Result<(), SpeicherFehler>;

    /// Wert entfernen (kein Fehler wenn nicht vorhanden)
    async fn entfernen(&self, schluessel: &str) -> Result<(), SpeicherFehler>;
}

/// In-Memory-Speicher mit optionalem Byte-Kontingent
///
/// Mit Kontingent verhaelt er sich wie ein Browser-Speicher, der bei
/// Ueberschreitung den Schreibvorgang ablehnt.
#[derive(Debug, Default)]
pub struct ArbeitsSpeicher {
    werte: Mutex<HashMap<String, String>>,
    kontingent: Option<usize>,
    schreibvorgaenge: AtomicUsize,
}

impl ArbeitsSpeicher {
    /// Neuer Speicher ohne Kontingent
    pub fn neu() -> Self {
        Self::default()
    }

    /// Neuer Speicher, der insgesamt hoechstens `bytes` Bytes an Werten haelt
    pub fn mit_kontingent(bytes: usize) -> Self {
        Self {
            kontingent: Some(bytes),
            ..Self::default()
        }
    }

    /// Anzahl erfolgreicher Schreibvorgaenge
    pub fn schreibvorgaenge(&self) -> usize {
        self.schreibvorgaenge.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SchluesselWertSpeicher for ArbeitsSpeicher {
    async fn lesen(&self, schluessel: &str) -> Result<Option<String>, SpeicherFehler> {
        Ok(self.werte.lock().get(schluessel).cloned())
    }

    async fn schreiben(&self, schluessel: &str, wert: &str) -> Result<(), SpeicherFehler> {
        let mut werte = self.werte.lock();

        if let Some(max) = self.kontingent {
            let belegt: usize = werte
                .iter()
                .filter(|(k, _)| k.as_str() != schluessel)
                .map(|(_, v)| v.len())
                .sum();
            let verfuegbar = max.saturating_sub(belegt);
            if wert.len() > verfuegbar {
                return Err(SpeicherFehler::KontingentUeberschritten {
                    benoetigt: wert.len(),
                    verfuegbar,
                });
            }
        }

        werte.insert(schluessel.to_string(), wert.to_string());
        self.schreibvorgaenge.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(schluessel, bytes = wert.len(), "Wert gespeichert");
        Ok(())
    }

    async fn entfernen(&self, schluessel: &str) -> Result<(), SpeicherFehler> {
        self.werte.lock().remove(schluessel);
        Ok(())
    }
}
