//! Integrationstests fuer die Betreiber-API und die Metrik-Kopplung

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hafenfunk_kanal::{ArbeitsSpeicher, KanalRegister, SchluesselWertSpeicher};
use hafenfunk_funk::KanalWerkzeuge;
use hafenfunk_observability::{HafenfunkMetriken, HealthState};
use hafenfunk_server::config::{ServerConfig, SpeicherTyp};
use hafenfunk_server::{ereignisse_verfolgen, register_starten, rest};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn aufbauen() -> (Router, Arc<KanalRegister>, HafenfunkMetriken) {
    let mut config = ServerConfig::default();
    config.speicher.typ = SpeicherTyp::Speicher;
    let register = Arc::new(register_starten(&config).await.unwrap());
    let funk = config.funk_konfig(&KanalWerkzeuge::neu(Arc::clone(&register)));
    let metriken = HafenfunkMetriken::neu().unwrap();
    let app = rest::app(
        rest::ApiState::neu(Arc::clone(&register), funk),
        metriken.clone(),
        &[],
    );
    (app, register, metriken)
}

async fn senden(app: &Router, methode: &str, pfad: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(methode).uri(pfad);
    let anfrage = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let antwort = app.clone().oneshot(anfrage).await.unwrap();
    let status = antwort.status();
    let bytes = axum::body::to_bytes(antwort.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn warten_bis(bedingung: impl Fn() -> bool) {
    for _ in 0..200 {
        if bedingung() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("Bedingung nicht erreicht");
}

#[tokio::test]
async fn kanalliste_mit_statuszeile() {
    let (app, _, _) = aufbauen().await;
    let (status, json) = senden(&app, "GET", "/v1/kanaele", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["statuszeile"], "使用中 0/3 チャンネル");
    assert_eq!(json["speicher_ok"], true);
    let kanaele = json["kanaele"].as_array().unwrap();
    assert_eq!(kanaele.len(), 3);
    assert_eq!(kanaele[0]["nummer"], 8);
    assert_eq!(kanaele[0]["bezeichnung"], "船舶間通信");
    assert_eq!(kanaele[2]["bezeichnung"], "港務通信");
}

#[tokio::test]
async fn zuweisen_freigeben_ueber_rest() {
    let (app, register, _) = aufbauen().await;

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/kanaele/zuweisen",
        Some(json!({ "schiff": "さくら丸", "anfrageart": "入港" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["kanal"], 8);
    assert_eq!(json["prioritaet"], "normal");

    let (_, json) = senden(&app, "GET", "/v1/kanaele", None).await;
    assert_eq!(json["statuszeile"], "使用中 1/3 チャンネル");
    assert_eq!(json["kanaele"][0]["schiff"], "さくら丸");

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/kanaele/freigeben",
        Some(json!({ "schiff": "さくら丸", "nachricht": "通信終了" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kanal"], 8);
    assert_eq!(register.zugewiesene_anzahl().await, 0);

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/kanaele/freigeben",
        Some(json!({ "schiff": "さくら丸" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "channel not found");
}

#[tokio::test]
async fn kein_freier_kanal_ist_konflikt() {
    let (app, _, _) = aufbauen().await;
    for schiff in ["a丸", "b丸", "c丸"] {
        let (status, _) = senden(
            &app,
            "POST",
            "/v1/kanaele/zuweisen",
            Some(json!({ "schiff": schiff, "anfrageart": "入港" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/kanaele/zuweisen",
        Some(json!({ "schiff": "d丸", "anfrageart": "緊急", "prioritaet": "emergency" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], "no channel available");
}

#[tokio::test]
async fn leerer_schiffsname_abgelehnt() {
    let (app, _, _) = aufbauen().await;
    let (status, json) = senden(
        &app,
        "POST",
        "/v1/kanaele/zuweisen",
        Some(json!({ "schiff": "   ", "anfrageart": "入港" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "invalid vessel name");
}

#[tokio::test]
async fn manuelle_freigabe_und_zuruecksetzen() {
    let (app, register, _) = aufbauen().await;
    senden(
        &app,
        "POST",
        "/v1/kanaele/zuweisen",
        Some(json!({ "schiff": "はやぶさ号", "anfrageart": "出港" })),
    )
    .await;

    let (status, json) = senden(&app, "POST", "/v1/kanaele/8/freigeben", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["schiff"], "はやぶさ号");

    // Bereits frei: erneut erfolgreich, ohne Schiff
    let (status, json) = senden(&app, "POST", "/v1/kanaele/8/freigeben", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["schiff"].is_null());

    let (status, _) = senden(&app, "POST", "/v1/kanaele/16/freigeben", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    senden(
        &app,
        "POST",
        "/v1/kanaele/zuweisen",
        Some(json!({ "schiff": "x丸", "anfrageart": "入港" })),
    )
    .await;
    let (status, json) = senden(&app, "POST", "/v1/kanaele/zuruecksetzen", None).await;
    assert_eq!(status, StatusCode::OK);
    for k in json["kanaele"].as_array().unwrap() {
        assert_eq!(k["status"], "available");
        assert_eq!(k["usageCount"], 0);
    }
    assert_eq!(register.zugewiesene_anzahl().await, 0);
}

#[tokio::test]
async fn werkzeug_ueber_rest() {
    let (app, _, _) = aufbauen().await;

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/werkzeuge/assignVHFChannel",
        Some(json!({ "vesselName": "さくら丸", "requestType": "入港" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["assignedChannel"], 8);
    assert_eq!(json["message"], "チャンネル8をさくら丸に割り当てました");

    let (status, json) = senden(
        &app,
        "POST",
        "/v1/werkzeuge/releaseVHFChannel",
        Some(json!({ "vesselName": "不明丸" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "channel not found");

    let (status, _) = senden(&app, "POST", "/v1/werkzeuge/sinkShip", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = senden(
        &app,
        "POST",
        "/v1/werkzeuge/assignVHFChannel",
        Some(json!({ "vesselName": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agent_konfiguration() {
    let (app, _, _) = aufbauen().await;
    let (status, json) = senden(&app, "GET", "/v1/agent", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["modell"], "gpt-realtime");
    assert_eq!(json["agent"]["name"], "博多ポートラジオ管制官");
    assert_eq!(json["agent"]["stimme"], "alloy");
    assert_eq!(json["agent"]["werkzeuge"].as_array().unwrap().len(), 2);
    assert_eq!(json["sperre"]["unterdrueckung_ms"], 3000);
    assert_eq!(json["sperre"]["zwangs_timeout_ms"], 10000);
    assert_eq!(json["sperre"]["nachlauf_ms"], 1000);
}

#[tokio::test]
async fn http_metriken_gezaehlt() {
    let (app, _, metriken) = aufbauen().await;
    senden(&app, "POST", "/v1/kanaele/12/freigeben", None).await;

    let wert = metriken
        .http_requests_total
        .with_label_values(&["POST", "/v1/kanaele/:nummer/freigeben", "200"])
        .get();
    assert_eq!(wert, 1);
}

#[tokio::test]
async fn registerereignisse_in_metriken() {
    let speicher = Arc::new(ArbeitsSpeicher::neu());
    let register = Arc::new(
        KanalRegister::starten(
            speicher as Arc<dyn SchluesselWertSpeicher>,
            "test",
            hafenfunk_kanal::standard_definitionen(),
        )
        .await
        .unwrap(),
    );
    let metriken = HafenfunkMetriken::neu().unwrap();
    let health = HealthState::neu();
    let beobachter =
        ereignisse_verfolgen(Arc::clone(&register), metriken.clone(), health.clone()).await;

    register
        .zuweisen(hafenfunk_kanal::ZuweisungsAnfrage::neu("a丸", "入港"))
        .await
        .unwrap();
    register
        .zuweisen(hafenfunk_kanal::ZuweisungsAnfrage::neu("b丸", "入港"))
        .await
        .unwrap();
    warten_bis(|| metriken.kanaele_zugewiesen.get() == 2).await;
    assert_eq!(metriken.zuweisungen_total.get(), 2);

    register.freigeben("a丸", "").await.unwrap();
    warten_bis(|| metriken.freigaben_total.get() == 1).await;
    warten_bis(|| metriken.kanaele_zugewiesen.get() == 1).await;

    register.alle_zuruecksetzen().await;
    warten_bis(|| metriken.zuruecksetzungen_total.get() == 1).await;
    warten_bis(|| metriken.kanaele_zugewiesen.get() == 0).await;
    assert!(health.speicher_ok());

    beobachter.abort();
}

#[tokio::test]
async fn speicherfehler_setzt_health_degradiert() {
    let register = Arc::new(
        KanalRegister::starten(
            Arc::new(ArbeitsSpeicher::mit_kontingent(160)),
            hafenfunk_kanal::STANDARD_SCHLUESSEL,
            hafenfunk_kanal::standard_definitionen(),
        )
        .await
        .unwrap(),
    );
    let metriken = HafenfunkMetriken::neu().unwrap();
    let health = HealthState::neu();
    let beobachter =
        ereignisse_verfolgen(Arc::clone(&register), metriken.clone(), health.clone()).await;

    register
        .zuweisen(hafenfunk_kanal::ZuweisungsAnfrage::neu("長い名前の貨物船", "入港"))
        .await
        .unwrap();

    warten_bis(|| metriken.speicher_fehler_total.get() == 1).await;
    warten_bis(|| !health.speicher_ok()).await;
    assert_eq!(metriken.zuweisungen_total.get(), 1);

    beobachter.abort();
}
