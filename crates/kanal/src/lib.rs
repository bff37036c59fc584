//! hafenfunk-kanal – VHF-Kanalregister
//!
//! Verwaltet die feste Menge der Hafenfunkkanaele: faire Zuweisung an
//! Schiffe (geringste Nutzung zuerst), Freigabe nach Schiff oder Nummer,
//! Zuruecksetzen und die Persistenz als JSON-Schnappschuss in einem
//! Schluessel-Wert-Speicher.

pub mod error;
pub mod modell;
pub mod register;
pub mod speicher;
pub mod sqlite;

pub use error::{KanalFehler, SpeicherFehler};
pub use modell::{standard_definitionen, Kanal, KanalAnsicht, KanalDefinition};
pub use register::{Freigabe, KanalRegister, Zuweisung, ZuweisungsAnfrage, STANDARD_SCHLUESSEL};
pub use speicher::{ArbeitsSpeicher, SchluesselWertSpeicher};
pub use sqlite::SqliteSpeicher;
