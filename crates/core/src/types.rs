//! Gemeinsame Typen fuer Hafenfunk
//!
//! Kanalnummern verwenden das Newtype-Pattern, damit eine VHF-Kanalnummer
//! nicht mit beliebigen Zahlen (z.B. Nutzungszaehlern) verwechselt wird.

use serde::{Deserialize, Serialize};

/// VHF-Kanalnummer (z.B. 8, 10, 12)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KanalNummer(pub u16);

impl KanalNummer {
    /// Gibt die rohe Kanalnummer zurueck
    pub fn inner(&self) -> u16 {
        self.0
    }
}

impl From<u16> for KanalNummer {
    fn from(nr: u16) -> Self {
        Self(nr)
    }
}

impl std::fmt::Display for KanalNummer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Belegungsstatus eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum KanalStatus {
    /// Frei und zuweisbar
    #[default]
    #[serde(rename = "available")]
    Verfuegbar,
    /// Reserviert, wird von keiner Transition gesetzt
    #[serde(rename = "busy")]
    Belegt,
    /// Einem Schiff zugewiesen
    #[serde(rename = "assigned")]
    Zugewiesen,
}

impl KanalStatus {
    /// Anzeigetext fuer die Statusanzeige
    pub fn anzeige(&self) -> &'static str {
        match self {
            Self::Verfuegbar => "空き",
            Self::Belegt | Self::Zugewiesen => "使用中",
        }
    }
}

/// Fester Verwendungszweck eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KanalZweck {
    /// Verkehr zwischen Schiffen (Kanal 8)
    Schiffsverkehr,
    /// Hafenbetrieb / Arbeiten im Hafen (Kanal 10)
    Hafenbetrieb,
    /// Hafenbehoerde (Kanal 12)
    Hafenbehoerde,
}

impl KanalZweck {
    /// Bezeichnung wie sie auf der Anzeige erscheint
    pub fn bezeichnung(&self) -> &'static str {
        match self {
            Self::Schiffsverkehr => "船舶間通信",
            Self::Hafenbetrieb => "港内作業",
            Self::Hafenbehoerde => "港務通信",
        }
    }
}

/// Prioritaet einer Kanalanfrage
///
/// Wird angenommen und in Ergebnissen zurueckgegeben, beeinflusst die
/// Kanalauswahl aber nicht.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Prioritaet {
    #[default]
    Normal,
    #[serde(rename = "urgent")]
    Dringend,
    #[serde(rename = "emergency")]
    Notfall,
}

impl std::fmt::Display for Prioritaet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Normal => "normal",
            Self::Dringend => "urgent",
            Self::Notfall => "emergency",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanal_nummer_display() {
        assert_eq!(KanalNummer(8).to_string(), "ch8");
    }

    #[test]
    fn kanal_nummer_transparent_serialisiert() {
        let json = serde_json::to_string(&KanalNummer(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn status_wire_namen() {
        assert_eq!(
            serde_json::to_string(&KanalStatus::Verfuegbar).unwrap(),
            "\"available\""
        );
        assert_eq!(
            serde_json::to_string(&KanalStatus::Zugewiesen).unwrap(),
            "\"assigned\""
        );
        let s: KanalStatus = serde_json::from_str("\"busy\"").unwrap();
        assert_eq!(s, KanalStatus::Belegt);
    }

    #[test]
    fn prioritaet_standard_und_wire_namen() {
        assert_eq!(Prioritaet::default(), Prioritaet::Normal);
        let p: Prioritaet = serde_json::from_str("\"emergency\"").unwrap();
        assert_eq!(p, Prioritaet::Notfall);
        assert_eq!(Prioritaet::Dringend.to_string(), "urgent");
    }

    #[test]
    fn zweck_bezeichnungen() {
        assert_eq!(KanalZweck::Schiffsverkehr.bezeichnung(), "船舶間通信");
        assert_eq!(KanalZweck::Hafenbehoerde.bezeichnung(), "港務通信");
    }
}
