//! Datenmodell des Kanalregisters
//!
//! Ein `Kanal` ist genau ein Datensatz des persistierten Schnappschusses
//! `{channel, status, vesselName?, assignedAt?, usageCount}`. Die
//! Zustandsuebergaenge sind reine Funktionen auf einer Kanalliste, damit
//! das Register sie innerhalb eines einzigen Locks anwenden kann.

use chrono::{DateTime, Utc};
use hafenfunk_core::{KanalNummer, KanalStatus, KanalZweck};
use serde::{Deserialize, Serialize};

use crate::error::SpeicherFehler;

// ---------------------------------------------------------------------------
// KanalDefinition
// ---------------------------------------------------------------------------

/// Statisch konfigurierter Kanal (Nummer + fester Zweck)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanalDefinition {
    pub nummer: KanalNummer,
    pub zweck: KanalZweck,
}

/// Standardkanaele des Hafens: 8, 10, 12
pub fn standard_definitionen() -> Vec<KanalDefinition> {
    vec![
        KanalDefinition {
            nummer: KanalNummer(8),
            zweck: KanalZweck::Schiffsverkehr,
        },
        KanalDefinition {
            nummer: KanalNummer(10),
            zweck: KanalZweck::Hafenbetrieb,
        },
        KanalDefinition {
            nummer: KanalNummer(12),
            zweck: KanalZweck::Hafenbehoerde,
        },
    ]
}

// ---------------------------------------------------------------------------
// Kanal
// ---------------------------------------------------------------------------

/// Zustand eines einzelnen Kanals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kanal {
    #[serde(rename = "channel")]
    pub nummer: KanalNummer,
    pub status: KanalStatus,
    #[serde(rename = "vesselName", default, skip_serializing_if = "Option::is_none")]
    pub schiff: Option<String>,
    #[serde(rename = "assignedAt", default, skip_serializing_if = "Option::is_none")]
    pub zugewiesen_um: Option<DateTime<Utc>>,
    /// Wie oft der Kanal insgesamt zugewiesen wurde (wird bei Freigabe nicht zurueckgesetzt)
    #[serde(rename = "usageCount", default)]
    pub nutzungen: u64,
}

impl Kanal {
    /// Erstellt einen freien Kanal mit Nutzungszaehler 0
    pub fn neu(nummer: KanalNummer) -> Self {
        Self {
            nummer,
            status: KanalStatus::Verfuegbar,
            schiff: None,
            zugewiesen_um: None,
            nutzungen: 0,
        }
    }

    pub fn ist_verfuegbar(&self) -> bool {
        self.status == KanalStatus::Verfuegbar
    }

    pub fn ist_zugewiesen_an(&self, schiff: &str) -> bool {
        self.status == KanalStatus::Zugewiesen && self.schiff.as_deref() == Some(schiff)
    }

    /// `assigned` genau dann wenn ein Schiff eingetragen ist.
    /// Ein freier Kanal darf keinen Zuweisungszeitpunkt tragen.
    pub fn ist_konsistent(&self) -> bool {
        let zugewiesen = self.status == KanalStatus::Zugewiesen;
        zugewiesen == self.schiff.is_some() && (zugewiesen || self.zugewiesen_um.is_none())
    }

    fn zuweisen(&mut self, schiff: &str, jetzt: DateTime<Utc>) {
        self.status = KanalStatus::Zugewiesen;
        self.schiff = Some(schiff.to_string());
        self.zugewiesen_um = Some(jetzt);
        self.nutzungen += 1;
    }

    fn freigeben(&mut self) -> Option<String> {
        self.status = KanalStatus::Verfuegbar;
        self.zugewiesen_um = None;
        self.schiff.take()
    }
}

/// Vollstaendiger Standard-Schnappschuss (alles frei, Zaehler 0)
pub fn standard_kanaele(definitionen: &[KanalDefinition]) -> Vec<Kanal> {
    definitionen.iter().map(|d| Kanal::neu(d.nummer)).collect()
}

// ---------------------------------------------------------------------------
// Zustandsuebergaenge
// ---------------------------------------------------------------------------

/// Waehlt unter den freien Kanaelen den mit der kleinsten Nutzung.
///
/// Bei Gleichstand gewinnt der erste in Listenreihenfolge; die Liste ist
/// aufsteigend nach Kanalnummer sortiert.
pub fn kanal_auswaehlen(kanaele: &[Kanal]) -> Option<usize> {
    kanaele
        .iter()
        .enumerate()
        .filter(|(_, k)| k.ist_verfuegbar())
        .min_by_key(|(_, k)| k.nutzungen)
        .map(|(i, _)| i)
}

/// Weist dem Schiff den fairsten freien Kanal zu.
/// Gibt `None` zurueck und laesst die Liste unveraendert wenn keiner frei ist.
pub fn zuweisung_anwenden(
    kanaele: &mut [Kanal],
    schiff: &str,
    jetzt: DateTime<Utc>,
) -> Option<KanalNummer> {
    let idx = kanal_auswaehlen(kanaele)?;
    let kanal = &mut kanaele[idx];
    kanal.zuweisen(schiff, jetzt);
    Some(kanal.nummer)
}

/// Gibt den Kanal frei, der dem Schiff zugewiesen ist (erster Treffer)
pub fn freigabe_nach_schiff(kanaele: &mut [Kanal], schiff: &str) -> Option<KanalNummer> {
    let kanal = kanaele.iter_mut().find(|k| k.ist_zugewiesen_an(schiff))?;
    kanal.freigeben();
    Some(kanal.nummer)
}

/// Gibt einen Kanal anhand der Nummer frei (idempotent).
///
/// Gibt `None` zurueck wenn die Nummer nicht existiert, sonst das zuvor
/// eingetragene Schiff (falls vorhanden).
pub fn freigabe_nach_nummer(
    kanaele: &mut [Kanal],
    nummer: KanalNummer,
) -> Option<Option<String>> {
    let kanal = kanaele.iter_mut().find(|k| k.nummer == nummer)?;
    Some(kanal.freigeben())
}

// ---------------------------------------------------------------------------
// Serialisierung
// ---------------------------------------------------------------------------

/// Serialisiert den Schnappschuss als geordnete JSON-Liste
pub fn schnappschuss_serialisieren(kanaele: &[Kanal]) -> Result<String, SpeicherFehler> {
    Ok(serde_json::to_string(kanaele)?)
}

/// Parst und validiert einen gespeicherten Schnappschuss.
///
/// Der Schnappschuss muss genau die konfigurierten Kanaele enthalten und
/// jeder Datensatz muss konsistent sein. Das Ergebnis ist in
/// Konfigurationsreihenfolge sortiert.
pub fn schnappschuss_parsen(
    roh: &str,
    definitionen: &[KanalDefinition],
) -> Result<Vec<Kanal>, SpeicherFehler> {
    let mut gelesen: Vec<Kanal> = serde_json::from_str(roh)?;

    if gelesen.len() != definitionen.len() {
        return Err(SpeicherFehler::ungueltig(format!(
            "{} Kanaele gespeichert, {} konfiguriert",
            gelesen.len(),
            definitionen.len()
        )));
    }

    if let Some(k) = gelesen.iter().find(|k| !k.ist_konsistent()) {
        return Err(SpeicherFehler::ungueltig(format!(
            "Datensatz fuer {} ist inkonsistent",
            k.nummer
        )));
    }

    let mut sortiert = Vec::with_capacity(definitionen.len());
    for def in definitionen {
        let pos = gelesen
            .iter()
            .position(|k| k.nummer == def.nummer)
            .ok_or_else(|| SpeicherFehler::ungueltig(format!("{} fehlt", def.nummer)))?;
        sortiert.push(gelesen.swap_remove(pos));
    }

    Ok(sortiert)
}

// ---------------------------------------------------------------------------
// Anzeige
// ---------------------------------------------------------------------------

/// View-Model eines Kanals fuer die Statusanzeige
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KanalAnsicht {
    pub nummer: KanalNummer,
    pub bezeichnung: String,
    pub status: KanalStatus,
    pub status_text: String,
    pub schiff: Option<String>,
    pub zugewiesen_um: Option<DateTime<Utc>>,
    pub nutzungen: u64,
}

impl KanalAnsicht {
    pub fn aus(kanal: &Kanal, zweck: KanalZweck) -> Self {
        Self {
            nummer: kanal.nummer,
            bezeichnung: zweck.bezeichnung().to_string(),
            status: kanal.status,
            status_text: kanal.status.anzeige().to_string(),
            schiff: kanal.schiff.clone(),
            zugewiesen_um: kanal.zugewiesen_um,
            nutzungen: kanal.nutzungen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kanaele_mit_nutzung(nutzungen: &[u64]) -> Vec<Kanal> {
        standard_definitionen()
            .iter()
            .zip(nutzungen)
            .map(|(d, n)| Kanal {
                nutzungen: *n,
                ..Kanal::neu(d.nummer)
            })
            .collect()
    }

    #[test]
    fn auswahl_bevorzugt_geringste_nutzung() {
        let mut kanaele = kanaele_mit_nutzung(&[5, 2, 3]);
        let nr = zuweisung_anwenden(&mut kanaele, "さくら丸", Utc::now());
        assert_eq!(nr, Some(KanalNummer(10)));
        assert_eq!(kanaele[1].nutzungen, 3);
        assert_eq!(kanaele[1].schiff.as_deref(), Some("さくら丸"));
    }

    #[test]
    fn gleichstand_waehlt_kleinste_nummer() {
        let mut kanaele = kanaele_mit_nutzung(&[1, 0, 0]);
        assert_eq!(
            zuweisung_anwenden(&mut kanaele, "a", Utc::now()),
            Some(KanalNummer(10))
        );
        assert_eq!(
            zuweisung_anwenden(&mut kanaele, "b", Utc::now()),
            Some(KanalNummer(12))
        );
    }

    #[test]
    fn belegte_kanaele_werden_uebersprungen() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 9, 9]);
        kanaele[0].status = KanalStatus::Belegt;
        assert_eq!(
            zuweisung_anwenden(&mut kanaele, "a", Utc::now()),
            Some(KanalNummer(10))
        );
    }

    #[test]
    fn keine_zuweisung_ohne_freien_kanal() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 0, 0]);
        for s in ["a", "b", "c"] {
            zuweisung_anwenden(&mut kanaele, s, Utc::now()).unwrap();
        }
        let vorher = kanaele.clone();
        assert_eq!(zuweisung_anwenden(&mut kanaele, "d", Utc::now()), None);
        assert_eq!(kanaele, vorher);
    }

    #[test]
    fn freigabe_behaelt_nutzung() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 0, 0]);
        zuweisung_anwenden(&mut kanaele, "はやぶさ号", Utc::now());
        assert_eq!(
            freigabe_nach_schiff(&mut kanaele, "はやぶさ号"),
            Some(KanalNummer(8))
        );
        assert!(kanaele[0].ist_verfuegbar());
        assert!(kanaele[0].schiff.is_none());
        assert!(kanaele[0].zugewiesen_um.is_none());
        assert_eq!(kanaele[0].nutzungen, 1);
    }

    #[test]
    fn freigabe_unbekanntes_schiff() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 0, 0]);
        assert_eq!(freigabe_nach_schiff(&mut kanaele, "gibtsnicht"), None);
    }

    #[test]
    fn freigabe_nach_nummer_idempotent() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 0, 0]);
        assert_eq!(
            freigabe_nach_nummer(&mut kanaele, KanalNummer(8)),
            Some(None)
        );
        assert_eq!(freigabe_nach_nummer(&mut kanaele, KanalNummer(16)), None);
    }

    #[test]
    fn schnappschuss_format() {
        let mut kanaele = kanaele_mit_nutzung(&[0, 0, 0]);
        zuweisung_anwenden(&mut kanaele, "テスト丸", Utc::now());
        let json = schnappschuss_serialisieren(&kanaele).unwrap();
        assert!(json.contains("\"channel\":8"));
        assert!(json.contains("\"status\":\"assigned\""));
        assert!(json.contains("\"vesselName\":\"テスト丸\""));
        assert!(json.contains("\"usageCount\":1"));
        // freie Kanaele ohne optionale Felder
        assert!(json.contains("{\"channel\":10,\"status\":\"available\",\"usageCount\":0}"));
    }

    #[test]
    fn schnappschuss_parsen_sortiert() {
        let roh = r#"[
            {"channel":12,"status":"available","usageCount":3},
            {"channel":8,"status":"available","usageCount":5},
            {"channel":10,"status":"available","usageCount":2}
        ]"#;
        let kanaele = schnappschuss_parsen(roh, &standard_definitionen()).unwrap();
        let nummern: Vec<u16> = kanaele.iter().map(|k| k.nummer.inner()).collect();
        assert_eq!(nummern, vec![8, 10, 12]);
        assert_eq!(kanaele[0].nutzungen, 5);
    }

    #[test]
    fn schnappschuss_ohne_nutzung_hat_zaehler_null() {
        let roh = r#"[{"channel":8,"status":"available"},{"channel":10,"status":"available"},{"channel":12,"status":"available"}]"#;
        let kanaele = schnappschuss_parsen(roh, &standard_definitionen()).unwrap();
        assert!(kanaele.iter().all(|k| k.nutzungen == 0));
    }

    #[test]
    fn schnappschuss_kaputtes_json() {
        let e = schnappschuss_parsen("invalid-json", &standard_definitionen()).unwrap_err();
        assert!(e.ist_beschaedigt());
        let e = schnappschuss_parsen(r#"{"invalid": "json""#, &standard_definitionen())
            .unwrap_err();
        assert!(e.ist_beschaedigt());
    }

    #[test]
    fn schnappschuss_falsche_kanalmenge() {
        let roh = r#"[{"channel":8,"status":"available","usageCount":0}]"#;
        assert!(schnappschuss_parsen(roh, &standard_definitionen()).is_err());

        let roh = r#"[
            {"channel":8,"status":"available","usageCount":0},
            {"channel":8,"status":"available","usageCount":0},
            {"channel":12,"status":"available","usageCount":0}
        ]"#;
        assert!(schnappschuss_parsen(roh, &standard_definitionen()).is_err());
    }

    #[test]
    fn schnappschuss_inkonsistenter_datensatz() {
        // zugewiesen ohne Schiff
        let roh = r#"[
            {"channel":8,"status":"assigned","usageCount":1},
            {"channel":10,"status":"available","usageCount":0},
            {"channel":12,"status":"available","usageCount":0}
        ]"#;
        assert!(schnappschuss_parsen(roh, &standard_definitionen()).is_err());
    }

    #[test]
    fn ansicht_enthaelt_bezeichnung() {
        let kanal = Kanal::neu(KanalNummer(10));
        let ansicht = KanalAnsicht::aus(&kanal, KanalZweck::Hafenbetrieb);
        assert_eq!(ansicht.bezeichnung, "港内作業");
        assert_eq!(ansicht.status_text, "空き");
    }
}
