//! hafenfunk-funk – Funkstelle fuer den Hafenfunk-Lotsen
//!
//! - `sperre`: Antwortsperre (Unterdrueckungsfenster, Zwangs-Timeout, Nachlauf)
//! - `sitzung`: Traits fuer Sprachsitzung und Zugangsdaten, Agent-Definition
//! - `werkzeuge`: `assignVHFChannel` / `releaseVHFChannel` ueber dem Kanalregister
//! - `station`: Verbindungslebenszyklus mit Push-to-Talk

pub mod error;
pub mod sitzung;
pub mod sperre;
pub mod station;
pub mod werkzeuge;

pub use error::FunkFehler;
pub use sitzung::{
    AgentDefinition, SprachSitzung, Zugang, ZugangsAnfrage, ZugangsKette, ZugangsQuelle,
};
pub use sperre::{AntwortSperre, Reaktion, SperrKonfig, SperrPhase, SperrStatus};
pub use station::{FunkKonfig, Funkstelle, StationsStatus, Verbindungsstatus};
pub use werkzeuge::{KanalWerkzeuge, WerkzeugAusfuehrer, WerkzeugDefinition};
