//! Route-Definitionen fuer die Betreiber-API (/v1/...)

use axum::{
    routing::{get, post},
    Router,
};

use crate::rest::{handlers, ApiState};

/// Erstellt den vollstaendigen /v1/-Router
pub fn v1_router() -> Router<ApiState> {
    Router::new()
        // Kanaele
        .route("/v1/kanaele", get(handlers::kanaele::liste))
        .route("/v1/kanaele/zuweisen", post(handlers::kanaele::zuweisen))
        .route("/v1/kanaele/freigeben", post(handlers::kanaele::freigeben))
        .route(
            "/v1/kanaele/zuruecksetzen",
            post(handlers::kanaele::zuruecksetzen),
        )
        .route(
            "/v1/kanaele/:nummer/freigeben",
            post(handlers::kanaele::kanal_freigeben),
        )
        // Lotse
        .route("/v1/agent", get(handlers::werkzeuge::agent))
        .route("/v1/werkzeuge/:name", post(handlers::werkzeuge::ausfuehren))
}
