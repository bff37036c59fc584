//! Kollaborateure der Funkstelle: Sprachsitzung und Zugangsdaten
//!
//! Der Sprachanbieter selbst ist nicht Teil dieses Crates. Die Funkstelle
//! spricht ihn ueber `SprachSitzung` an und bezieht Zugangsdaten ueber
//! `ZugangsQuelle`.

use std::sync::Arc;

use async_trait::async_trait;
use hafenfunk_core::SitzungsEreignis;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::FunkFehler;
use crate::werkzeuge::{WerkzeugAusfuehrer, WerkzeugDefinition};

/// Umgebungsvariable fuer einen statischen API-Schluessel
pub const API_SCHLUESSEL_ENV: &str = "OPENAI_API_KEY";

// ---------------------------------------------------------------------------
// Zugangsdaten
// ---------------------------------------------------------------------------

/// Kurzlebige Zugangsdaten fuer eine Sitzung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zugang {
    pub client_secret: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Ablaufzeitpunkt in Unix-Sekunden
    #[serde(default)]
    pub expires_at: Option<i64>,
    /// Vom Anbieter gelieferte Sitzungsbeschreibung (opak)
    #[serde(default)]
    pub session: Option<serde_json::Value>,
}

impl Zugang {
    pub fn nur_schluessel(schluessel: impl Into<String>) -> Self {
        Self {
            client_secret: schluessel.into(),
            session_id: None,
            expires_at: None,
            session: None,
        }
    }
}

/// Optionale Ueberschreibungen beim Anfordern von Zugangsdaten
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZugangsAnfrage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(rename = "expires_seconds", skip_serializing_if = "Option::is_none")]
    pub ablauf_sekunden: Option<u64>,
}

/// Liefert Zugangsdaten fuer die Sprachsitzung
#[async_trait]
pub trait ZugangsQuelle: Send + Sync {
    async fn zugang_holen(&self, anfrage: &ZugangsAnfrage) -> Result<Zugang, FunkFehler>;
}

/// Bevorzugt einen statischen Schluessel, sonst den Austausch-Kollaborateur
pub struct ZugangsKette {
    statisch: Option<String>,
    austausch: Option<Arc<dyn ZugangsQuelle>>,
}

impl ZugangsKette {
    pub fn neu(statisch: Option<String>, austausch: Option<Arc<dyn ZugangsQuelle>>) -> Self {
        Self {
            statisch: statisch.filter(|s| !s.trim().is_empty()),
            austausch,
        }
    }

    /// Statischer Schluessel aus `OPENAI_API_KEY`, falls gesetzt
    pub fn aus_umgebung(austausch: Option<Arc<dyn ZugangsQuelle>>) -> Self {
        Self::neu(std::env::var(API_SCHLUESSEL_ENV).ok(), austausch)
    }

    pub fn hat_statischen_schluessel(&self) -> bool {
        self.statisch.is_some()
    }
}

#[async_trait]
impl ZugangsQuelle for ZugangsKette {
    async fn zugang_holen(&self, anfrage: &ZugangsAnfrage) -> Result<Zugang, FunkFehler> {
        if let Some(schluessel) = &self.statisch {
            return Ok(Zugang::nur_schluessel(schluessel.clone()));
        }
        match &self.austausch {
            Some(quelle) => quelle.zugang_holen(anfrage).await,
            None => Err(FunkFehler::Zugangsdaten(
                "kein API-Schluessel und kein Zugangsdienst konfiguriert".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Name des Lotsen-Agenten
pub const AGENT_NAME: &str = "博多ポートラジオ管制官";

/// Standard-Anweisungen fuer den Agenten
pub const STANDARD_ANWEISUNGEN: &str = "\
あなたは博多ポートラジオの熟練した管制官AIです。PTT（Push-to-Talk）システムで船舶からの通信に応答してください。

# 基本的な応答プロトコル
1. 船舶からの呼びかけ形式: \"博多ポートラジオ、こちら[船舶名]\"
2. 標準応答: \"こちら博多ポートラジオ、[船舶名]どうぞ\"
3. 入港/出港要求時は必ずassignVHFChannelツールを使用してチャンネルを割り当ててください
4. チャンネル割り当て後: \"チャンネル[番号]でお願いいたします。準備ができましたらどうぞ\"
5. 通信終了時はreleaseVHFChannelツールでチャンネルを解放してください

# 使用可能なVHFチャンネル
- Channel 8: 船舶間通信用
- Channel 10: 港内作業連絡用
- Channel 12: 港務通信用

# 重要な行動原則
- 1回のPTT送信には1回のみ応答する
- 応答は簡潔かつ明確にする
- 安全を最優先に判断する
";

/// Alles, was die Sitzung ueber den Agenten wissen muss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub anweisungen: String,
    pub stimme: String,
    pub werkzeuge: Vec<WerkzeugDefinition>,
}

impl AgentDefinition {
    /// Agent mit Standardname und -anweisungen und den Werkzeugen des Ausfuehrers
    pub fn hafenfunk(stimme: impl Into<String>, werkzeuge: &dyn WerkzeugAusfuehrer) -> Self {
        Self {
            name: AGENT_NAME.into(),
            anweisungen: STANDARD_ANWEISUNGEN.into(),
            stimme: stimme.into(),
            werkzeuge: werkzeuge.definitionen(),
        }
    }

    pub fn mit_anweisungen(mut self, anweisungen: impl Into<String>) -> Self {
        self.anweisungen = anweisungen.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Sprachsitzung
// ---------------------------------------------------------------------------

/// Echtzeit-Sprachsitzung eines Anbieters.
///
/// Werkzeugaufrufe des Agenten fuehrt die Sitzung ueber den beim Verbinden
/// uebergebenen `WerkzeugAusfuehrer` aus und meldet sie als
/// `WerkzeugStart`/`WerkzeugEnde`.
#[async_trait]
pub trait SprachSitzung: Send + Sync {
    async fn verbinden(
        &self,
        zugang: &Zugang,
        modell: &str,
        agent: &AgentDefinition,
        werkzeuge: Arc<dyn WerkzeugAusfuehrer>,
    ) -> Result<(), FunkFehler>;

    /// Mikrofon stumm schalten (`true`) oder freigeben (`false`)
    fn stummschalten(&self, stumm: bool) -> Result<(), FunkFehler>;

    async fn schliessen(&self) -> Result<(), FunkFehler>;

    /// Abonniert alle zukuenftigen Sitzungsereignisse
    fn ereignisse_abonnieren(&self) -> broadcast::Receiver<SitzungsEreignis>;
}
