//! Kanalregister – autoritative Kanalmenge mit fairer Zuweisung
//!
//! Jede Operation (Zuweisen, Freigeben, Zuruecksetzen) laeuft als eine
//! atomare Einheit unter dem Zustands-Lock:
//! Zustand lesen -> Uebergang anwenden -> Ergebnis persistieren.
//! Der Lock wird ueber den asynchronen Schreibvorgang gehalten, damit zwei
//! nebenlaeufige Aufrufe nie dieselbe Ausgangslage sehen und der
//! Schreibvorgang immer aus dem gerade erzeugten Zustand stammt.
//!
//! Persistenzfehler verlassen das Register nie: sie werden geloggt, als
//! `KanalEreignis::SpeichernFehlgeschlagen` gemeldet, und der
//! In-Memory-Zustand bleibt massgeblich.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hafenfunk_core::{KanalEreignis, KanalNummer, KanalStatus, KanalZweck, Prioritaet};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};

use crate::error::{KanalFehler, SpeicherFehler};
use crate::modell::{
    freigabe_nach_nummer, freigabe_nach_schiff, schnappschuss_parsen,
    schnappschuss_serialisieren, standard_kanaele, zuweisung_anwenden, Kanal, KanalAnsicht,
    KanalDefinition,
};
use crate::speicher::SchluesselWertSpeicher;

/// Fester Schluessel des Kanal-Schnappschusses im Speicher
pub const STANDARD_SCHLUESSEL: &str = "hakata-port-radio-channels";

/// Groesse des Broadcast-Kanals fuer Registerereignisse
const EREIGNIS_KANAL_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// Ein- und Ausgabetypen
// ---------------------------------------------------------------------------

/// Anfrage eines Schiffs nach einem Kanal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZuweisungsAnfrage {
    pub schiff: String,
    /// Freitext, z.B. "入港", "出港", "緊急"
    pub anfrageart: String,
    #[serde(default)]
    pub prioritaet: Prioritaet,
}

impl ZuweisungsAnfrage {
    pub fn neu(schiff: impl Into<String>, anfrageart: impl Into<String>) -> Self {
        Self {
            schiff: schiff.into(),
            anfrageart: anfrageart.into(),
            prioritaet: Prioritaet::Normal,
        }
    }

    pub fn mit_prioritaet(mut self, prioritaet: Prioritaet) -> Self {
        self.prioritaet = prioritaet;
        self
    }
}

/// Erfolgreiche Zuweisung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zuweisung {
    pub kanal: KanalNummer,
    pub schiff: String,
    pub anfrageart: String,
    pub prioritaet: Prioritaet,
    pub zeitpunkt: DateTime<Utc>,
}

/// Erfolgreiche Freigabe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freigabe {
    pub kanal: KanalNummer,
    /// Schiff, das den Kanal belegt hatte (None bei bereits freiem Kanal)
    pub schiff: Option<String>,
    pub zeitpunkt: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// KanalRegister
// ---------------------------------------------------------------------------

/// Haelt die Kanalmenge und fuehrt alle Zustandsuebergaenge aus.
///
/// Wird typischerweise als `Arc<KanalRegister>` zwischen REST-Handlern und
/// der Funkstelle geteilt.
pub struct KanalRegister {
    speicher: Arc<dyn SchluesselWertSpeicher>,
    schluessel: String,
    /// Aufsteigend nach Kanalnummer sortiert (bestimmt den Gleichstand)
    definitionen: Vec<KanalDefinition>,
    zustand: Mutex<Vec<Kanal>>,
    /// false nach einem fehlgeschlagenen Schreibvorgang, bis zum naechsten Erfolg
    speicher_ok: AtomicBool,
    ereignis_tx: broadcast::Sender<KanalEreignis>,
}

impl KanalRegister {
    /// Erstellt das Register und laedt den Zustand aus dem Speicher.
    ///
    /// Fehlt der Schnappschuss oder ist er unbrauchbar, startet das Register
    /// mit den Standardwerten. Nur eine ungueltige Kanalkonfiguration
    /// (leer, doppelte Nummern) ist ein Fehler.
    pub async fn starten(
        speicher: Arc<dyn SchluesselWertSpeicher>,
        schluessel: impl Into<String>,
        mut definitionen: Vec<KanalDefinition>,
    ) -> Result<Self, KanalFehler> {
        if definitionen.is_empty() {
            return Err(KanalFehler::Konfiguration(
                "mindestens ein Kanal erforderlich".into(),
            ));
        }
        let mut gesehen = HashSet::new();
        if let Some(doppelt) = definitionen.iter().find(|d| !gesehen.insert(d.nummer)) {
            return Err(KanalFehler::Konfiguration(format!(
                "Kanal {} mehrfach konfiguriert",
                doppelt.nummer
            )));
        }
        definitionen.sort_by_key(|d| d.nummer);

        let (ereignis_tx, _) = broadcast::channel(EREIGNIS_KANAL_GROESSE);
        let register = Self {
            speicher,
            schluessel: schluessel.into(),
            zustand: Mutex::new(standard_kanaele(&definitionen)),
            definitionen,
            speicher_ok: AtomicBool::new(true),
            ereignis_tx,
        };

        let geladen = register.laden().await;
        *register.zustand.lock().await = geladen;

        tracing::info!(
            schluessel = %register.schluessel,
            kanaele = register.definitionen.len(),
            "Kanalregister gestartet"
        );
        Ok(register)
    }

    // -----------------------------------------------------------------------
    // Persistenz (Load / Save)
    // -----------------------------------------------------------------------

    /// Liest den Schnappschuss aus dem Speicher.
    ///
    /// Fehlender Schluessel, unlesbarer oder inkonsistenter Inhalt und
    /// Lesefehler ergeben den Standard-Schnappschuss; es wird nie ein Fehler
    /// an den Aufrufer weitergegeben.
    pub async fn laden(&self) -> Vec<Kanal> {
        match self.speicher_lesen().await {
            Ok(Some(kanaele)) => kanaele,
            Ok(None) => {
                tracing::debug!(schluessel = %self.schluessel, "Kein Schnappschuss, Standardkanaele");
                standard_kanaele(&self.definitionen)
            }
            Err(e) => {
                tracing::warn!(fehler = %e, "Schnappschuss unbrauchbar, Standardkanaele");
                standard_kanaele(&self.definitionen)
            }
        }
    }

    /// Schreibt den Schnappschuss vollstaendig unter den festen Schluessel
    pub async fn speichern(&self, schnappschuss: &[Kanal]) -> Result<(), SpeicherFehler> {
        let json = schnappschuss_serialisieren(schnappschuss)?;
        self.speicher.schreiben(&self.schluessel, &json).await
    }

    async fn speicher_lesen(&self) -> Result<Option<Vec<Kanal>>, SpeicherFehler> {
        match self.speicher.lesen(&self.schluessel).await? {
            Some(roh) => schnappschuss_parsen(&roh, &self.definitionen).map(Some),
            None => Ok(None),
        }
    }

    /// Persistiert innerhalb einer atomaren Einheit; Fehler werden nur gemeldet
    async fn persistieren(&self, kanaele: &[Kanal]) {
        match self.speichern(kanaele).await {
            Ok(()) => {
                self.speicher_ok.store(true, Ordering::Relaxed);
            }
            Err(e) => {
                self.speicher_ok.store(false, Ordering::Relaxed);
                tracing::error!(fehler = %e, "Kanalzustand konnte nicht gespeichert werden");
                self.senden(KanalEreignis::SpeichernFehlgeschlagen {
                    grund: e.to_string(),
                });
            }
        }
    }

    /// Frischer Stand fuer Freigaben: der Speicher ist die Quelle der Wahrheit,
    /// solange er einen gueltigen Schnappschuss liefert.
    ///
    /// Nach einem fehlgeschlagenen Schreibvorgang ist der In-Memory-Zustand
    /// neuer als der Speicher und bleibt massgeblich, bis ein Schreibvorgang
    /// wieder gelingt.
    async fn frischer_stand(&self, cache: &[Kanal]) -> Vec<Kanal> {
        if !self.speicher_ok() {
            tracing::debug!("Letzter Schreibvorgang fehlgeschlagen, nutze In-Memory-Zustand");
            return cache.to_vec();
        }
        match self.speicher_lesen().await {
            Ok(Some(kanaele)) => kanaele,
            Ok(None) => cache.to_vec(),
            Err(e) => {
                tracing::warn!(fehler = %e, "Frischer Stand nicht lesbar, nutze In-Memory-Zustand");
                cache.to_vec()
            }
        }
    }

    // -----------------------------------------------------------------------
    // Operationen
    // -----------------------------------------------------------------------

    /// Weist dem Schiff den freien Kanal mit der geringsten Nutzung zu.
    ///
    /// Die Prioritaet wird uebernommen, aendert aber die Auswahl nicht.
    pub async fn zuweisen(&self, anfrage: ZuweisungsAnfrage) -> Result<Zuweisung, KanalFehler> {
        let schiff = anfrage.schiff.trim();
        if schiff.is_empty() {
            return Err(KanalFehler::UngueltigerSchiffsname);
        }

        let mut zustand = self.zustand.lock().await;
        let jetzt = Utc::now();

        let Some(kanal) = zuweisung_anwenden(&mut zustand, schiff, jetzt) else {
            drop(zustand);
            tracing::warn!(schiff = %schiff, "Kein freier Kanal verfuegbar");
            self.senden(KanalEreignis::ZuweisungFehlgeschlagen {
                schiff: schiff.to_string(),
            });
            return Err(KanalFehler::KeinKanalVerfuegbar);
        };

        self.persistieren(&zustand).await;
        drop(zustand);

        tracing::info!(
            kanal = %kanal,
            schiff = %schiff,
            anfrage = %anfrage.anfrageart,
            prioritaet = %anfrage.prioritaet,
            "Kanal zugewiesen"
        );
        self.senden(KanalEreignis::Zugewiesen {
            kanal,
            schiff: schiff.to_string(),
            prioritaet: anfrage.prioritaet,
            zeitpunkt: jetzt,
        });

        Ok(Zuweisung {
            kanal,
            schiff: schiff.to_string(),
            anfrageart: anfrage.anfrageart,
            prioritaet: anfrage.prioritaet,
            zeitpunkt: jetzt,
        })
    }

    /// Gibt den Kanal des Schiffs frei. `nachricht` ist reiner Freitext.
    pub async fn freigeben(&self, schiff: &str, nachricht: &str) -> Result<Freigabe, KanalFehler> {
        let schiff = schiff.trim();
        let mut zustand = self.zustand.lock().await;
        let jetzt = Utc::now();
        let mut aktuell = self.frischer_stand(&zustand).await;

        let Some(kanal) = freigabe_nach_schiff(&mut aktuell, schiff) else {
            drop(zustand);
            tracing::info!(schiff = %schiff, "Freigabe: kein Kanal fuer Schiff zugewiesen");
            return Err(KanalFehler::KanalNichtGefunden {
                schiff: schiff.to_string(),
            });
        };

        *zustand = aktuell;
        self.persistieren(&zustand).await;
        drop(zustand);

        tracing::info!(kanal = %kanal, schiff = %schiff, nachricht = %nachricht, "Kanal freigegeben");
        self.senden(KanalEreignis::Freigegeben {
            kanal,
            schiff: Some(schiff.to_string()),
        });

        Ok(Freigabe {
            kanal,
            schiff: Some(schiff.to_string()),
            zeitpunkt: jetzt,
        })
    }

    /// Manuelle Freigabe durch den Bediener (idempotent)
    pub async fn kanal_freigeben(&self, nummer: KanalNummer) -> Result<Freigabe, KanalFehler> {
        let mut zustand = self.zustand.lock().await;
        let jetzt = Utc::now();
        let mut aktuell = self.frischer_stand(&zustand).await;

        let Some(vorheriges_schiff) = freigabe_nach_nummer(&mut aktuell, nummer) else {
            return Err(KanalFehler::UnbekannterKanal(nummer));
        };

        *zustand = aktuell;
        self.persistieren(&zustand).await;
        drop(zustand);

        tracing::info!(kanal = %nummer, schiff = ?vorheriges_schiff, "Kanal manuell freigegeben");
        self.senden(KanalEreignis::Freigegeben {
            kanal: nummer,
            schiff: vorheriges_schiff.clone(),
        });

        Ok(Freigabe {
            kanal: nummer,
            schiff: vorheriges_schiff,
            zeitpunkt: jetzt,
        })
    }

    /// Setzt alle Kanaele inklusive Nutzungszaehler zurueck und persistiert
    /// die komplette Menge in einem Schreibvorgang
    pub async fn alle_zuruecksetzen(&self) -> Vec<Kanal> {
        let mut zustand = self.zustand.lock().await;
        *zustand = standard_kanaele(&self.definitionen);
        self.persistieren(&zustand).await;
        let schnappschuss = zustand.clone();
        drop(zustand);

        tracing::info!("Alle Kanaele zurueckgesetzt");
        self.senden(KanalEreignis::Zurueckgesetzt);
        schnappschuss
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    /// Kopie des aktuellen In-Memory-Zustands
    pub async fn schnappschuss(&self) -> Vec<Kanal> {
        self.zustand.lock().await.clone()
    }

    /// View-Models fuer die Statusanzeige
    pub async fn ansichten(&self) -> Vec<KanalAnsicht> {
        let zustand = self.zustand.lock().await;
        zustand
            .iter()
            .map(|k| KanalAnsicht::aus(k, self.zweck(k.nummer)))
            .collect()
    }

    /// Anzahl der aktuell zugewiesenen Kanaele
    pub async fn zugewiesene_anzahl(&self) -> usize {
        self.zustand
            .lock()
            .await
            .iter()
            .filter(|k| k.status == KanalStatus::Zugewiesen)
            .count()
    }

    pub fn definitionen(&self) -> &[KanalDefinition] {
        &self.definitionen
    }

    /// false wenn der letzte Schreibvorgang fehlgeschlagen ist
    pub fn speicher_ok(&self) -> bool {
        self.speicher_ok.load(Ordering::Relaxed)
    }

    /// Abonniert alle zukuenftigen Registerereignisse
    pub fn abonnieren(&self) -> broadcast::Receiver<KanalEreignis> {
        self.ereignis_tx.subscribe()
    }

    fn zweck(&self, nummer: KanalNummer) -> KanalZweck {
        self.definitionen
            .iter()
            .find(|d| d.nummer == nummer)
            .map(|d| d.zweck)
            .unwrap_or(KanalZweck::Schiffsverkehr)
    }

    fn senden(&self, ereignis: KanalEreignis) {
        // Keine Abonnenten ist kein Fehler
        let _ = self.ereignis_tx.send(ereignis);
    }
}
