//! Funkstelle – Lebenszyklus der Sprachsitzung mit Push-to-Talk
//!
//! Ablauf:
//! 1. `verbinden`: Zugangsdaten holen, Sitzung verbinden, stumm schalten,
//!    Ereignisschleife starten (Sperre wird zurueckgesetzt)
//! 2. `senden_beginnen` / `senden_beenden`: Mikrofon freigeben bzw. wieder
//!    stumm schalten
//! 3. `trennen`: Ereignisschleife stoppen, Sperre abbauen, Sitzung schliessen
//!
//! Fehler der Kollaborateure landen als Anzeige im Verbindungsstatus und
//! werden nicht automatisch wiederholt.

use std::sync::Arc;

use hafenfunk_core::SitzungsEreignis;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::FunkFehler;
use crate::sitzung::{AgentDefinition, SprachSitzung, ZugangsAnfrage, ZugangsQuelle};
use crate::sperre::{AntwortSperre, SperrKonfig, SperrStatus};
use crate::werkzeuge::{WerkzeugAusfuehrer, FREIGEBEN, ZUWEISEN};

// ---------------------------------------------------------------------------
// Verbindungsstatus
// ---------------------------------------------------------------------------

/// Verbindungszustand der Funkstelle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "zustand", content = "meldung", rename_all = "snake_case")]
pub enum Verbindungsstatus {
    #[default]
    Wartend,
    Verbindet,
    /// Verbunden und stumm (PTT losgelassen)
    Bereit,
    /// Verbunden, PTT gedrueckt
    Sendet,
    Getrennt,
    Fehler(String),
}

impl Verbindungsstatus {
    /// Statuszeile fuer die Anzeige
    pub fn anzeige(&self) -> String {
        match self {
            Self::Wartend => "待機中".into(),
            Self::Verbindet => "OpenAI接続中...".into(),
            Self::Bereit => "接続済み - PTT待機中（ミュート）".into(),
            Self::Sendet => "送信中 - PTT ON".into(),
            Self::Getrennt => "切断完了".into(),
            Self::Fehler(m) => format!("エラー: {m}"),
        }
    }
}

impl std::fmt::Display for Verbindungsstatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.anzeige())
    }
}

/// Momentaufnahme der Funkstelle fuer die Anzeige
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationsStatus {
    pub verbindung: Verbindungsstatus,
    pub statuszeile: String,
    pub verbunden: bool,
    pub sendet: bool,
    pub letzte_nachricht: String,
    pub sperre: SperrStatus,
}

#[derive(Debug, Default)]
struct StationsZustand {
    status: Verbindungsstatus,
    verbunden: bool,
    sendet: bool,
    letzte_nachricht: String,
    verbindungs_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Funkstelle
// ---------------------------------------------------------------------------

/// Laufzeitparameter der Funkstelle
#[derive(Debug, Clone)]
pub struct FunkKonfig {
    pub modell: String,
    pub agent: AgentDefinition,
    pub sperre: SperrKonfig,
}

/// Verbindet Sprachsitzung, Werkzeuge und Antwortsperre
pub struct Funkstelle {
    sitzung: Arc<dyn SprachSitzung>,
    zugang: Arc<dyn ZugangsQuelle>,
    werkzeuge: Arc<dyn WerkzeugAusfuehrer>,
    konfig: FunkKonfig,
    sperre: Arc<AntwortSperre>,
    zustand: Arc<Mutex<StationsZustand>>,
    ereignis_task: Mutex<Option<JoinHandle<()>>>,
}

impl Funkstelle {
    pub fn neu(
        sitzung: Arc<dyn SprachSitzung>,
        zugang: Arc<dyn ZugangsQuelle>,
        werkzeuge: Arc<dyn WerkzeugAusfuehrer>,
        konfig: FunkKonfig,
    ) -> Self {
        Self {
            sitzung,
            zugang,
            werkzeuge,
            sperre: Arc::new(AntwortSperre::neu(konfig.sperre)),
            konfig,
            zustand: Arc::new(Mutex::new(StationsZustand::default())),
            ereignis_task: Mutex::new(None),
        }
    }

    /// Stellt die Verbindung her; die Sitzung ist danach stumm geschaltet
    pub async fn verbinden(&self) -> Result<(), FunkFehler> {
        {
            let mut z = self.zustand.lock();
            if z.verbunden || z.status == Verbindungsstatus::Verbindet {
                return Err(FunkFehler::BereitsVerbunden);
            }
            z.status = Verbindungsstatus::Verbindet;
        }
        self.sperre.zuruecksetzen();

        let verbindungs_id = Uuid::new_v4();
        info!(%verbindungs_id, modell = %self.konfig.modell, "Verbinde Funkstelle");

        let anfrage = ZugangsAnfrage {
            instructions: Some(self.konfig.agent.anweisungen.clone()),
            voice: Some(self.konfig.agent.stimme.clone()),
            ablauf_sekunden: None,
        };
        let zugang = match self.zugang.zugang_holen(&anfrage).await {
            Ok(z) => z,
            Err(e) => return Err(self.fehlgeschlagen(e)),
        };

        let rx = self.sitzung.ereignisse_abonnieren();
        if let Err(e) = self
            .sitzung
            .verbinden(&zugang, &self.konfig.modell, &self.konfig.agent, self.werkzeuge.clone())
            .await
        {
            return Err(self.fehlgeschlagen(e));
        }

        if let Err(e) = self.sitzung.stummschalten(true) {
            // Sitzung, die sich nicht stumm schalten laesst, wird sofort geschlossen
            if let Err(e) = self.sitzung.schliessen().await {
                warn!(fehler = %e, "Sitzung konnte nicht geschlossen werden");
            }
            return Err(self.fehlgeschlagen(e));
        }

        {
            let mut z = self.zustand.lock();
            z.verbunden = true;
            z.sendet = false;
            z.status = Verbindungsstatus::Bereit;
            z.verbindungs_id = Some(verbindungs_id);
        }

        let task = tokio::spawn(ereignisschleife(
            rx,
            Arc::clone(&self.sperre),
            Arc::clone(&self.zustand),
        ));
        if let Some(alt) = self.ereignis_task.lock().replace(task) {
            alt.abort();
        }

        info!(%verbindungs_id, "Funkstelle verbunden (PTT-Modus, stumm)");
        Ok(())
    }

    /// PTT gedrueckt: Mikrofon freigeben
    pub fn senden_beginnen(&self) -> Result<(), FunkFehler> {
        if !self.zustand.lock().verbunden {
            return Err(FunkFehler::NichtVerbunden);
        }

        match self.sitzung.stummschalten(false) {
            Ok(()) => {
                let mut z = self.zustand.lock();
                z.sendet = true;
                z.status = Verbindungsstatus::Sendet;
                debug!("PTT ON");
                Ok(())
            }
            Err(e) => {
                error!(fehler = %e, "Senden konnte nicht beginnen");
                if let Err(e) = self.sitzung.stummschalten(true) {
                    warn!(fehler = %e, "Erneute Stummschaltung fehlgeschlagen");
                }
                let mut z = self.zustand.lock();
                z.sendet = false;
                z.status = Verbindungsstatus::Bereit;
                Err(e)
            }
        }
    }

    /// PTT losgelassen: wieder stumm schalten
    pub fn senden_beenden(&self) -> Result<(), FunkFehler> {
        if !self.zustand.lock().verbunden {
            return Ok(());
        }

        // Bei Fehler bleibt das Mikrofon offen, der Status also `Sendet`
        self.sitzung.stummschalten(true).map_err(|e| {
            error!(fehler = %e, "Senden konnte nicht beendet werden");
            e
        })?;
        let mut z = self.zustand.lock();
        z.sendet = false;
        z.status = Verbindungsstatus::Bereit;
        debug!("PTT OFF");
        Ok(())
    }

    /// Trennt die Sitzung und baut Timer und Ereignisschleife ab
    pub async fn trennen(&self) -> Result<(), FunkFehler> {
        let verbindungs_id = {
            let z = self.zustand.lock();
            if !z.verbunden {
                return Ok(());
            }
            z.verbindungs_id
        };

        if let Some(task) = self.ereignis_task.lock().take() {
            task.abort();
        }
        self.sperre.abbauen();

        let ergebnis = self.sitzung.schliessen().await;
        {
            let mut z = self.zustand.lock();
            z.verbunden = false;
            z.sendet = false;
            z.verbindungs_id = None;
            z.status = Verbindungsstatus::Getrennt;
        }

        match &ergebnis {
            Ok(()) => info!(verbindungs_id = ?verbindungs_id, "Funkstelle getrennt"),
            Err(e) => warn!(verbindungs_id = ?verbindungs_id, fehler = %e, "Fehler beim Trennen"),
        }
        ergebnis
    }

    pub fn status(&self) -> StationsStatus {
        let z = self.zustand.lock();
        StationsStatus {
            statuszeile: z.status.anzeige(),
            verbindung: z.status.clone(),
            verbunden: z.verbunden,
            sendet: z.sendet,
            letzte_nachricht: z.letzte_nachricht.clone(),
            sperre: self.sperre.status(),
        }
    }

    pub fn sperre(&self) -> &AntwortSperre {
        &self.sperre
    }

    fn fehlgeschlagen(&self, e: FunkFehler) -> FunkFehler {
        error!(fehler = %e, "Verbindung fehlgeschlagen");
        let mut z = self.zustand.lock();
        z.verbunden = false;
        z.status = Verbindungsstatus::Fehler(e.to_string());
        e
    }
}

impl Drop for Funkstelle {
    fn drop(&mut self) {
        if let Some(task) = self.ereignis_task.lock().take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Ereignisschleife
// ---------------------------------------------------------------------------

async fn ereignisschleife(
    mut rx: broadcast::Receiver<SitzungsEreignis>,
    sperre: Arc<AntwortSperre>,
    zustand: Arc<Mutex<StationsZustand>>,
) {
    loop {
        match rx.recv().await {
            Ok(ereignis) => ereignis_anwenden(&ereignis, &sperre, &zustand),
            Err(RecvError::Lagged(n)) => {
                warn!(verpasst = n, "Sitzungsereignisse verpasst");
            }
            Err(RecvError::Closed) => {
                debug!("Ereigniskanal der Sitzung geschlossen");
                break;
            }
        }
    }
}

fn ereignis_anwenden(
    ereignis: &SitzungsEreignis,
    sperre: &AntwortSperre,
    zustand: &Mutex<StationsZustand>,
) {
    debug!(ereignis = ereignis.name(), "Sitzungsereignis");
    sperre.ereignis_verarbeiten(ereignis);

    match ereignis {
        SitzungsEreignis::AgentEnde { ausgabe } if !ausgabe.trim().is_empty() => {
            zustand.lock().letzte_nachricht = format!("応答: {ausgabe}");
        }
        SitzungsEreignis::WerkzeugStart { werkzeug, argumente } => {
            info!(werkzeug = %werkzeug, argumente = %argumente, "Werkzeugaufruf beginnt");
        }
        SitzungsEreignis::WerkzeugEnde { werkzeug, ergebnis } => {
            info!(werkzeug = %werkzeug, "Werkzeugaufruf abgeschlossen");
            if let Some(nachricht) = werkzeug_nachricht(werkzeug, ergebnis) {
                zustand.lock().letzte_nachricht = nachricht;
            }
        }
        SitzungsEreignis::Fehler { meldung } => {
            error!(meldung = %meldung, "Sitzungsfehler");
            zustand.lock().status = Verbindungsstatus::Fehler(meldung.clone());
        }
        SitzungsEreignis::VerlaufAktualisiert { eintraege } => {
            debug!(eintraege, "Gespraechsverlauf aktualisiert");
        }
        _ => {}
    }
}

/// Anzeigetext fuer ein Werkzeugergebnis
fn werkzeug_nachricht(werkzeug: &str, ergebnis: &str) -> Option<String> {
    let json: serde_json::Value = match serde_json::from_str(ergebnis) {
        Ok(j) => j,
        Err(e) => {
            warn!(werkzeug, fehler = %e, "Werkzeugergebnis nicht lesbar");
            return None;
        }
    };
    let erfolg = json["success"].as_bool().unwrap_or(false);
    let schiff = json["vesselName"].as_str().unwrap_or_default();
    let fehler = json["error"].as_str().unwrap_or_default();

    match (werkzeug, erfolg) {
        (ZUWEISEN, true) => Some(format!(
            "✅ チャンネル割り当て成功: {schiff} → チャンネル{}",
            json["assignedChannel"]
        )),
        (ZUWEISEN, false) => Some(format!("❌ チャンネル割り当て失敗: {fehler}")),
        (FREIGEBEN, true) => Some(format!(
            "✅ チャンネル解放: {schiff} → チャンネル{}",
            json["releasedChannel"]
        )),
        (FREIGEBEN, false) => Some(format!("❌ チャンネル解放失敗: {fehler}")),
        _ => None,
    }
}
