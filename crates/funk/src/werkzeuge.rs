//! Werkzeuge der Sprachsitzung
//!
//! Der Agent ruft die Kanaloperationen ueber zwei benannte Werkzeuge auf:
//! `assignVHFChannel` und `releaseVHFChannel`. Jedes Werkzeug liefert ein
//! serialisiertes JSON-Objekt mit `success`-Flag; fachliche Misserfolge
//! (kein freier Kanal, Kanal nicht gefunden) sind regulaere Ergebnisse.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hafenfunk_core::Prioritaet;
use hafenfunk_kanal::{KanalRegister, ZuweisungsAnfrage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::FunkFehler;

pub const ZUWEISEN: &str = "assignVHFChannel";
pub const FREIGEBEN: &str = "releaseVHFChannel";

/// Beschreibung eines Werkzeugs fuer die Sprachsitzung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WerkzeugDefinition {
    pub name: String,
    pub beschreibung: String,
    /// JSON-Schema der Argumente
    pub parameter: Value,
}

/// Fuehrt Werkzeugaufrufe der Sprachsitzung aus
#[async_trait]
pub trait WerkzeugAusfuehrer: Send + Sync {
    /// Alle angebotenen Werkzeuge
    fn definitionen(&self) -> Vec<WerkzeugDefinition>;

    /// Fuehrt das Werkzeug aus und gibt das Ergebnis als JSON-String zurueck
    async fn ausfuehren(&self, name: &str, argumente: Value) -> Result<String, FunkFehler>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ZuweisungsArgumente {
    vessel_name: String,
    request_type: String,
    #[serde(default)]
    priority: Prioritaet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreigabeArgumente {
    vessel_name: String,
    #[serde(default)]
    message: String,
}

/// Werkzeuge ueber dem Kanalregister
pub struct KanalWerkzeuge {
    register: Arc<KanalRegister>,
}

impl KanalWerkzeuge {
    pub fn neu(register: Arc<KanalRegister>) -> Self {
        Self { register }
    }

    async fn zuweisen(&self, args: ZuweisungsArgumente) -> Value {
        let anfrage = ZuweisungsAnfrage::neu(&args.vessel_name, &args.request_type)
            .mit_prioritaet(args.priority);

        match self.register.zuweisen(anfrage).await {
            Ok(z) => json!({
                "success": true,
                "vesselName": z.schiff,
                "assignedChannel": z.kanal.inner(),
                "requestType": z.anfrageart,
                "priority": z.prioritaet,
                "timestamp": zeitstempel(z.zeitpunkt),
                "message": format!("チャンネル{}を{}に割り当てました", z.kanal.inner(), z.schiff),
            }),
            Err(e) => json!({
                "success": false,
                "error": e.wire_text(),
                "vesselName": args.vessel_name,
                "requestType": args.request_type,
            }),
        }
    }

    async fn freigeben(&self, args: FreigabeArgumente) -> Value {
        match self.register.freigeben(&args.vessel_name, &args.message).await {
            Ok(f) => json!({
                "success": true,
                "vesselName": args.vessel_name,
                "releasedChannel": f.kanal.inner(),
                "message": format!("チャンネル{}を解放しました", f.kanal.inner()),
                "timestamp": zeitstempel(f.zeitpunkt),
            }),
            Err(e) => json!({
                "success": false,
                "error": e.wire_text(),
                "vesselName": args.vessel_name,
            }),
        }
    }
}

#[async_trait]
impl WerkzeugAusfuehrer for KanalWerkzeuge {
    fn definitionen(&self) -> Vec<WerkzeugDefinition> {
        vec![
            WerkzeugDefinition {
                name: ZUWEISEN.into(),
                beschreibung: "VHFチャンネルを船舶に割り当てる関数。入港・出港要求があった際に利用可能なチャンネルを自動割り当てします。".into(),
                parameter: json!({
                    "type": "object",
                    "properties": {
                        "vesselName": { "type": "string", "description": "船舶名（例：さくら丸、はやぶさ号）" },
                        "requestType": { "type": "string", "description": "要求種別（入港、出港、緊急等）" },
                        "priority": {
                            "type": "string",
                            "enum": ["normal", "urgent", "emergency"],
                            "default": "normal",
                            "description": "優先度"
                        }
                    },
                    "required": ["vesselName", "requestType"]
                }),
            },
            WerkzeugDefinition {
                name: FREIGEBEN.into(),
                beschreibung: "船舶に割り当てたVHFチャンネルを解放する関数。通信終了時に利用します。".into(),
                parameter: json!({
                    "type": "object",
                    "properties": {
                        "vesselName": { "type": "string", "description": "船舶名" },
                        "message": { "type": "string", "description": "解放理由" }
                    },
                    "required": ["vesselName"]
                }),
            },
        ]
    }

    async fn ausfuehren(&self, name: &str, argumente: Value) -> Result<String, FunkFehler> {
        tracing::debug!(werkzeug = name, argumente = %argumente, "Werkzeugaufruf");

        let ergebnis = match name {
            ZUWEISEN => {
                let args = serde_json::from_value(argumente)
                    .map_err(|e| FunkFehler::UngueltigeArgumente(e.to_string()))?;
                self.zuweisen(args).await
            }
            FREIGEBEN => {
                let args = serde_json::from_value(argumente)
                    .map_err(|e| FunkFehler::UngueltigeArgumente(e.to_string()))?;
                self.freigeben(args).await
            }
            andere => return Err(FunkFehler::UnbekanntesWerkzeug(andere.to_string())),
        };

        Ok(serde_json::to_string(&ergebnis)?)
    }
}

fn zeitstempel(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
