//! Antwortsperre – hoechstens eine Agent-Antwort pro Funkdurchgang
//!
//! Die Sprachsitzung meldet fuer einen Durchgang unter Umstaenden mehrere
//! `agent_start`-Ereignisse. Die Sperre verwandelt diesen Strom in einen
//! sauberen Ablauf:
//!
//! - `agent_start` innerhalb des Unterdrueckungsfensters (3 s) nach dem
//!   letzten angenommenen Start wird ignoriert
//! - ein angenommener Start armiert einen Zwangs-Timeout (10 s)
//! - `agent_end` mit Text beendet die Antwort nach einer Nachlaufzeit (1 s),
//!   ohne Text sofort
//! - laeuft der Zwangs-Timeout ab, ist die Antwort beendet und das
//!   Audio-Flag geloescht
//!
//! Beide Timer sind einmalig und werden vor jedem Neuarmieren abgebrochen.
//! Jeder Timer traegt eine Generationsnummer; ein abgelaufener Timer, dessen
//! Generation nicht mehr eingetragen ist, aendert nichts.

use std::sync::Arc;
use std::time::Duration;

use hafenfunk_core::SitzungsEreignis;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Zeitkonstanten der Sperre
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SperrKonfig {
    /// Starts innerhalb dieses Fensters nach dem letzten Start werden ignoriert
    pub unterdrueckung: Duration,
    /// Spaetestens nach dieser Zeit gilt eine Antwort als beendet
    pub zwangs_timeout: Duration,
    /// Nachlauf nach `agent_end` mit Text (Audio klingt aus)
    pub nachlauf: Duration,
}

impl Default for SperrKonfig {
    fn default() -> Self {
        Self {
            unterdrueckung: Duration::from_millis(3_000),
            zwangs_timeout: Duration::from_millis(10_000),
            nachlauf: Duration::from_millis(1_000),
        }
    }
}

impl SperrKonfig {
    pub fn aus_millis(unterdrueckung: u64, zwangs_timeout: u64, nachlauf: u64) -> Self {
        Self {
            unterdrueckung: Duration::from_millis(unterdrueckung),
            zwangs_timeout: Duration::from_millis(zwangs_timeout),
            nachlauf: Duration::from_millis(nachlauf),
        }
    }
}

// ---------------------------------------------------------------------------
// Zustand
// ---------------------------------------------------------------------------

/// Phase des Antwortfensters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SperrPhase {
    /// Keine Antwort aktiv
    #[default]
    Leerlauf,
    /// Agent antwortet
    Antwortet,
    /// Antwort wurde durch den Zwangs-Timeout beendet
    Zwangsbeendet,
}

/// Ergebnis der Verarbeitung eines Sitzungsereignisses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaktion {
    /// Ereignis hat den Zustand veraendert
    Angenommen,
    /// `agent_start` innerhalb des Unterdrueckungsfensters
    Unterdrueckt,
    /// Ereignis betrifft die Sperre nicht
    NichtRelevant,
}

/// Momentaufnahme fuer Anzeige und Tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SperrStatus {
    pub phase: SperrPhase,
    pub antwortet: bool,
    pub audio_laeuft: bool,
    pub timeout_aktiv: bool,
    pub nachlauf_aktiv: bool,
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

impl Timer {
    fn abbrechen(self) {
        self.handle.abort();
    }
}

#[derive(Default)]
struct SperrZustand {
    phase: SperrPhase,
    letzter_start: Option<Instant>,
    audio_laeuft: bool,
    zwangs_timer: Option<Timer>,
    nachlauf_timer: Option<Timer>,
    generation: u64,
}

impl SperrZustand {
    fn zwangs_timer_abbrechen(&mut self) {
        if let Some(t) = self.zwangs_timer.take() {
            t.abbrechen();
        }
    }

    fn nachlauf_abbrechen(&mut self) {
        if let Some(t) = self.nachlauf_timer.take() {
            t.abbrechen();
        }
    }

    fn naechste_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

// ---------------------------------------------------------------------------
// AntwortSperre
// ---------------------------------------------------------------------------

/// Zustandsautomat des Antwortfensters.
///
/// Muss innerhalb einer Tokio-Runtime benutzt werden (Timer laufen als Tasks).
pub struct AntwortSperre {
    konfig: SperrKonfig,
    zustand: Arc<Mutex<SperrZustand>>,
}

impl AntwortSperre {
    pub fn neu(konfig: SperrKonfig) -> Self {
        Self {
            konfig,
            zustand: Arc::new(Mutex::new(SperrZustand::default())),
        }
    }

    pub fn konfig(&self) -> SperrKonfig {
        self.konfig
    }

    /// Verteilt ein Sitzungsereignis auf die passende Transition
    pub fn ereignis_verarbeiten(&self, ereignis: &SitzungsEreignis) -> Reaktion {
        match ereignis {
            SitzungsEreignis::AgentStart { .. } => self.agent_start(),
            SitzungsEreignis::AgentEnde { ausgabe } => self.agent_ende(ausgabe),
            SitzungsEreignis::AudioStart => self.audio_setzen(true),
            SitzungsEreignis::AudioGestoppt => self.audio_setzen(false),
            _ => Reaktion::NichtRelevant,
        }
    }

    /// Beginn einer Agent-Antwort
    pub fn agent_start(&self) -> Reaktion {
        let jetzt = Instant::now();
        let mut z = self.zustand.lock();

        if let Some(letzter) = z.letzter_start {
            let vergangen = jetzt.saturating_duration_since(letzter);
            if vergangen < self.konfig.unterdrueckung {
                debug!(
                    seit_letztem_ms = vergangen.as_millis() as u64,
                    "Agent-Start unterdrueckt"
                );
                return Reaktion::Unterdrueckt;
            }
        }

        z.letzter_start = Some(jetzt);
        z.phase = SperrPhase::Antwortet;
        z.nachlauf_abbrechen();
        self.zwangs_timer_armieren(&mut z);

        info!("Agent-Antwort beginnt");
        Reaktion::Angenommen
    }

    /// Ende einer Agent-Antwort mit der ausgegebenen Antwort
    pub fn agent_ende(&self, ausgabe: &str) -> Reaktion {
        let mut z = self.zustand.lock();
        z.zwangs_timer_abbrechen();

        if ausgabe.trim().is_empty() {
            z.nachlauf_abbrechen();
            if z.phase == SperrPhase::Antwortet {
                z.phase = SperrPhase::Leerlauf;
            }
            debug!("Leere Antwort, Antwortfenster sofort geschlossen");
        } else if z.phase == SperrPhase::Antwortet {
            self.nachlauf_armieren(&mut z);
        }

        Reaktion::Angenommen
    }

    fn audio_setzen(&self, laeuft: bool) -> Reaktion {
        self.zustand.lock().audio_laeuft = laeuft;
        Reaktion::Angenommen
    }

    /// Zustand beim Verbinden: Leerlauf, kein letzter Start, keine Timer
    pub fn zuruecksetzen(&self) {
        let mut z = self.zustand.lock();
        z.zwangs_timer_abbrechen();
        z.nachlauf_abbrechen();
        z.phase = SperrPhase::Leerlauf;
        z.letzter_start = None;
        z.audio_laeuft = false;
    }

    /// Abbau beim Trennen: alle Timer abbrechen
    pub fn abbauen(&self) {
        let mut z = self.zustand.lock();
        z.zwangs_timer_abbrechen();
        z.nachlauf_abbrechen();
        z.phase = SperrPhase::Leerlauf;
        z.audio_laeuft = false;
    }

    pub fn status(&self) -> SperrStatus {
        let z = self.zustand.lock();
        SperrStatus {
            phase: z.phase,
            antwortet: z.phase == SperrPhase::Antwortet,
            audio_laeuft: z.audio_laeuft,
            timeout_aktiv: z.zwangs_timer.is_some(),
            nachlauf_aktiv: z.nachlauf_timer.is_some(),
        }
    }

    pub fn antwortet(&self) -> bool {
        self.zustand.lock().phase == SperrPhase::Antwortet
    }

    // -----------------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------------

    fn zwangs_timer_armieren(&self, z: &mut SperrZustand) {
        z.zwangs_timer_abbrechen();
        let generation = z.naechste_generation();
        let zustand = Arc::clone(&self.zustand);
        let dauer = self.konfig.zwangs_timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(dauer).await;
            let mut z = zustand.lock();
            if z.zwangs_timer.as_ref().map(|t| t.generation) != Some(generation) {
                return;
            }
            z.zwangs_timer = None;
            z.phase = SperrPhase::Zwangsbeendet;
            z.audio_laeuft = false;
            warn!(timeout_ms = dauer.as_millis() as u64, "Antwort-Timeout, Antwort zwangsweise beendet");
        });

        z.zwangs_timer = Some(Timer { generation, handle });
    }

    fn nachlauf_armieren(&self, z: &mut SperrZustand) {
        z.nachlauf_abbrechen();
        let generation = z.naechste_generation();
        let zustand = Arc::clone(&self.zustand);
        let dauer = self.konfig.nachlauf;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(dauer).await;
            let mut z = zustand.lock();
            if z.nachlauf_timer.as_ref().map(|t| t.generation) != Some(generation) {
                return;
            }
            z.nachlauf_timer = None;
            if z.phase == SperrPhase::Antwortet {
                z.phase = SperrPhase::Leerlauf;
            }
            debug!("Nachlauf beendet, Antwortfenster geschlossen");
        });

        z.nachlauf_timer = Some(Timer { generation, handle });
    }
}

impl Drop for AntwortSperre {
    fn drop(&mut self) {
        let mut z = self.zustand.lock();
        z.zwangs_timer_abbrechen();
        z.nachlauf_abbrechen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spult die pausierte Zeit vor und laesst faellige Timer-Tasks laufen
    async fn vorspulen(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    fn start() -> SitzungsEreignis {
        SitzungsEreignis::AgentStart {
            agent: "博多ポートラジオ管制官".into(),
        }
    }

    fn ende(ausgabe: &str) -> SitzungsEreignis {
        SitzungsEreignis::AgentEnde {
            ausgabe: ausgabe.into(),
        }
    }

    #[tokio::test]
    async fn erster_start_wird_angenommen() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());

        assert_eq!(sperre.ereignis_verarbeiten(&start()), Reaktion::Angenommen);
        let status = sperre.status();
        assert!(status.antwortet);
        assert!(status.timeout_aktiv);
    }

    #[tokio::test]
    async fn start_innerhalb_fenster_wird_ignoriert() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        vorspulen(1_000).await;
        assert_eq!(sperre.ereignis_verarbeiten(&start()), Reaktion::Unterdrueckt);

        // Kein zweiter Timer: der Timeout laeuft ab dem ersten Start
        vorspulen(9_001).await;
        assert_eq!(sperre.status().phase, SperrPhase::Zwangsbeendet);
    }

    #[tokio::test]
    async fn start_nach_fenster_wird_angenommen() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        vorspulen(3_500).await;
        assert_eq!(sperre.ereignis_verarbeiten(&start()), Reaktion::Angenommen);

        // Der neue Timer ersetzt den alten: 10 s nach dem ersten Start noch aktiv
        vorspulen(6_600).await;
        assert!(sperre.antwortet());
        vorspulen(3_500).await;
        assert_eq!(sperre.status().phase, SperrPhase::Zwangsbeendet);
    }

    #[tokio::test]
    async fn unterdrueckter_start_veraendert_nichts() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());
        sperre.ereignis_verarbeiten(&ende(""));
        assert!(!sperre.antwortet());

        vorspulen(500).await;
        assert_eq!(sperre.agent_start(), Reaktion::Unterdrueckt);
        let status = sperre.status();
        assert_eq!(status.phase, SperrPhase::Leerlauf);
        assert!(!status.timeout_aktiv);
    }

    #[tokio::test]
    async fn zwangs_timeout_beendet_antwort_und_audio() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());
        sperre.ereignis_verarbeiten(&SitzungsEreignis::AudioStart);
        assert!(sperre.status().audio_laeuft);

        vorspulen(9_999).await;
        assert!(sperre.antwortet());

        vorspulen(2).await;
        let status = sperre.status();
        assert_eq!(status.phase, SperrPhase::Zwangsbeendet);
        assert!(!status.antwortet);
        assert!(!status.audio_laeuft);
        assert!(!status.timeout_aktiv);
    }

    #[tokio::test]
    async fn leere_antwort_beendet_sofort() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        sperre.ereignis_verarbeiten(&ende("   "));

        let status = sperre.status();
        assert_eq!(status.phase, SperrPhase::Leerlauf);
        assert!(!status.timeout_aktiv);
        assert!(!status.nachlauf_aktiv);
    }

    #[tokio::test]
    async fn antwort_mit_text_endet_nach_nachlauf() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        sperre.ereignis_verarbeiten(&ende("こちら博多ポートラジオ、どうぞ"));
        let status = sperre.status();
        assert!(status.antwortet);
        assert!(!status.timeout_aktiv);
        assert!(status.nachlauf_aktiv);

        vorspulen(999).await;
        assert!(sperre.antwortet());
        vorspulen(2).await;
        assert_eq!(sperre.status().phase, SperrPhase::Leerlauf);

        // Der abgebrochene Zwangs-Timeout feuert nicht mehr
        vorspulen(10_000).await;
        assert_eq!(sperre.status().phase, SperrPhase::Leerlauf);
    }

    #[tokio::test]
    async fn neuer_start_bricht_nachlauf_ab() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());
        vorspulen(3_000).await;
        sperre.ereignis_verarbeiten(&ende("了解"));

        vorspulen(500).await;
        assert_eq!(sperre.agent_start(), Reaktion::Angenommen);

        // Der alte Nachlauf haette jetzt geendet
        vorspulen(600).await;
        assert!(sperre.antwortet());
        assert!(!sperre.status().nachlauf_aktiv);
    }

    #[tokio::test]
    async fn audio_flags_unabhaengig_von_phase() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());

        sperre.ereignis_verarbeiten(&SitzungsEreignis::AudioStart);
        assert!(sperre.status().audio_laeuft);
        assert_eq!(sperre.status().phase, SperrPhase::Leerlauf);

        sperre.ereignis_verarbeiten(&SitzungsEreignis::AudioGestoppt);
        assert!(!sperre.status().audio_laeuft);
    }

    #[tokio::test]
    async fn andere_ereignisse_nicht_relevant() {
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        let e = SitzungsEreignis::Fehler {
            meldung: "x".into(),
        };
        assert_eq!(sperre.ereignis_verarbeiten(&e), Reaktion::NichtRelevant);
    }

    #[tokio::test]
    async fn abbauen_bricht_timer_ab() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        sperre.abbauen();
        assert!(!sperre.status().timeout_aktiv);

        vorspulen(11_000).await;
        assert_eq!(sperre.status().phase, SperrPhase::Leerlauf);
    }

    #[tokio::test]
    async fn zuruecksetzen_erlaubt_sofortigen_start() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::default());
        sperre.ereignis_verarbeiten(&start());

        sperre.zuruecksetzen();
        assert_eq!(sperre.agent_start(), Reaktion::Angenommen);
    }

    #[tokio::test]
    async fn konfigurierbare_zeiten() {
        tokio::time::pause();
        let sperre = AntwortSperre::neu(SperrKonfig::aus_millis(100, 500, 50));
        sperre.agent_start();

        vorspulen(150).await;
        assert_eq!(sperre.agent_start(), Reaktion::Angenommen);
        vorspulen(501).await;
        assert_eq!(sperre.status().phase, SperrPhase::Zwangsbeendet);
    }
}
