//! REST-Handler fuer die Lotsen-Werkzeuge

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hafenfunk_funk::WerkzeugAusfuehrer;
use serde_json::{json, Value};

use crate::rest::{ApiFehler, ApiState};

/// Agent-Definition und Sperrzeiten, mit denen die Funkstelle eine Sitzung eroeffnet
pub async fn agent(State(state): State<ApiState>) -> Response {
    let funk = &state.funk;
    (
        StatusCode::OK,
        Json(json!({
            "modell": funk.modell,
            "agent": funk.agent,
            "sperre": {
                "unterdrueckung_ms": funk.sperre.unterdrueckung.as_millis() as u64,
                "zwangs_timeout_ms": funk.sperre.zwangs_timeout.as_millis() as u64,
                "nachlauf_ms": funk.sperre.nachlauf.as_millis() as u64,
            },
        })),
    )
        .into_response()
}

/// Fuehrt ein Werkzeug aus; der Body ist das Ergebnis-JSON des Werkzeugs
pub async fn ausfuehren(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(argumente): Json<Value>,
) -> Result<Response, ApiFehler> {
    let ergebnis = state.werkzeuge.ausfuehren(&name, argumente).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        ergebnis,
    )
        .into_response())
}
