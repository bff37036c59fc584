//! REST-Handler fuer Kanal-Endpunkte

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hafenfunk_core::KanalNummer;
use hafenfunk_kanal::ZuweisungsAnfrage;
use serde::Deserialize;
use serde_json::json;

use crate::rest::{ApiFehler, ApiState};

/// Anzeige aller Kanaele mit Statuszeile
pub async fn liste(State(state): State<ApiState>) -> Response {
    let kanaele = state.register.ansichten().await;
    let belegt = kanaele
        .iter()
        .filter(|k| k.schiff.is_some())
        .count();
    let statuszeile = format!("使用中 {}/{} チャンネル", belegt, kanaele.len());

    (
        StatusCode::OK,
        Json(json!({
            "kanaele": kanaele,
            "statuszeile": statuszeile,
            "speicher_ok": state.register.speicher_ok(),
        })),
    )
        .into_response()
}

pub async fn zuweisen(
    State(state): State<ApiState>,
    Json(anfrage): Json<ZuweisungsAnfrage>,
) -> Result<Response, ApiFehler> {
    let zuweisung = state.register.zuweisen(anfrage).await?;
    Ok((StatusCode::CREATED, Json(zuweisung)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct FreigabeBody {
    pub schiff: String,
    #[serde(default)]
    pub nachricht: String,
}

pub async fn freigeben(
    State(state): State<ApiState>,
    Json(body): Json<FreigabeBody>,
) -> Result<Response, ApiFehler> {
    let freigabe = state
        .register
        .freigeben(&body.schiff, &body.nachricht)
        .await?;
    Ok((StatusCode::OK, Json(freigabe)).into_response())
}

/// Manuelle Freigabe durch den Betreiber
pub async fn kanal_freigeben(
    State(state): State<ApiState>,
    Path(nummer): Path<u16>,
) -> Result<Response, ApiFehler> {
    let freigabe = state.register.kanal_freigeben(KanalNummer(nummer)).await?;
    Ok((StatusCode::OK, Json(freigabe)).into_response())
}

pub async fn zuruecksetzen(State(state): State<ApiState>) -> Response {
    let kanaele = state.register.alle_zuruecksetzen().await;
    (StatusCode::OK, Json(json!({ "kanaele": kanaele }))).into_response()
}
