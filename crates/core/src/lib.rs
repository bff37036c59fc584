//! hafenfunk-core – Gemeinsame Typen, Ereignisse und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die Kanalregister,
//! Funkstelle und Server gemeinsam nutzen.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{HafenfunkError, Result};
pub use event::{KanalEreignis, SitzungsEreignis};
pub use types::{KanalNummer, KanalStatus, KanalZweck, Prioritaet};
