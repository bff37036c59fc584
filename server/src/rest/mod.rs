//! Betreiber-API (/v1/...)
//!
//! Anzeige und Bedienung des Kanalregisters ueber HTTP sowie direkter
//! Aufruf der Lotsen-Werkzeuge.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    Router,
};
use hafenfunk_funk::{FunkFehler, FunkKonfig, KanalWerkzeuge};
use hafenfunk_kanal::{KanalFehler, KanalRegister};
use hafenfunk_observability::{request_timing_layer, timing_middleware, HafenfunkMetriken};
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;

pub use routes::v1_router;

/// Geteilter Zustand aller Handler
#[derive(Clone)]
pub struct ApiState {
    pub register: Arc<KanalRegister>,
    pub werkzeuge: Arc<KanalWerkzeuge>,
    pub funk: Arc<FunkKonfig>,
}

impl ApiState {
    pub fn neu(register: Arc<KanalRegister>, funk: FunkKonfig) -> Self {
        Self {
            werkzeuge: Arc::new(KanalWerkzeuge::neu(Arc::clone(&register))),
            register,
            funk: Arc::new(funk),
        }
    }
}

/// Fehler der Betreiber-API
#[derive(Debug, Error)]
pub enum ApiFehler {
    #[error(transparent)]
    Kanal(#[from] KanalFehler),

    #[error(transparent)]
    Funk(#[from] FunkFehler),
}

impl ApiFehler {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Kanal(KanalFehler::KeinKanalVerfuegbar) => StatusCode::CONFLICT,
            Self::Kanal(KanalFehler::KanalNichtGefunden { .. })
            | Self::Kanal(KanalFehler::UnbekannterKanal(_)) => StatusCode::NOT_FOUND,
            Self::Kanal(KanalFehler::UngueltigerSchiffsname) => StatusCode::BAD_REQUEST,
            Self::Kanal(KanalFehler::Konfiguration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Funk(FunkFehler::UnbekanntesWerkzeug(_)) => StatusCode::NOT_FOUND,
            Self::Funk(FunkFehler::UngueltigeArgumente(_)) => StatusCode::BAD_REQUEST,
            Self::Funk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiFehler {
    fn into_response(self) -> Response {
        let mut body = json!({ "success": false, "error": self.to_string() });
        if let Self::Kanal(e) = &self {
            body["code"] = json!(e.wire_text());
        }
        (self.http_status(), Json(body)).into_response()
    }
}

/// Vollstaendige App mit CORS, Tracing und Timing-Middleware
pub fn app(state: ApiState, metriken: HafenfunkMetriken, cors_origins: &[String]) -> Router {
    // CORS konfigurieren: entweder spezifische Origins oder Any
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    };

    v1_router()
        .layer(axum::middleware::from_fn_with_state(
            metriken,
            timing_middleware,
        ))
        .layer(request_timing_layer())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hafenfunk_core::KanalNummer;

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiFehler::from(KanalFehler::KeinKanalVerfuegbar).http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiFehler::from(KanalFehler::UnbekannterKanal(KanalNummer(16))).http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiFehler::from(FunkFehler::UngueltigeArgumente("x".into())).http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiFehler::from(FunkFehler::NichtVerbunden).http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
