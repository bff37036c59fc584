//! SQLite-Schluessel-Wert-Speicher mit WAL-Modus

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::SpeicherFehler;
use crate::speicher::SchluesselWertSpeicher;

/// Wrapper um den SQLite Connection Pool
#[derive(Debug, Clone)]
pub struct SqliteSpeicher {
    pool: SqlitePool,
}

impl SqliteSpeicher {
    /// Oeffnet (oder erstellt) die Datenbank und fuehrt Migrationen aus
    pub async fn oeffnen(url: &str, max_verbindungen: u32) -> Result<Self, SpeicherFehler> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_verbindungen)
            .connect_with(opts)
            .await?;

        info!(url = %url, "SQLite-Speicher geoeffnet");

        let speicher = Self { pool };
        speicher.migrationen_ausfuehren().await?;
        Ok(speicher)
    }

    /// Erstellt eine In-Memory-Datenbank fuer Tests
    pub async fn in_memory() -> Result<Self, SpeicherFehler> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // In-Memory benoetigt mindestens 1 persistente Verbindung
            .min_connections(1)
            .connect_with(opts)
            .await?;

        let speicher = Self { pool };
        speicher.migrationen_ausfuehren().await?;
        Ok(speicher)
    }

    async fn migrationen_ausfuehren(&self) -> Result<(), SpeicherFehler> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Speicher-Migrationen abgeschlossen");
        Ok(())
    }

    /// Schliesst den Pool (alle Verbindungen)
    pub async fn schliessen(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SchluesselWertSpeicher for SqliteSpeicher {
    async fn lesen(&self, schluessel: &str) -> Result<Option<String>, SpeicherFehler> {
        let wert = sqlx::query_scalar::<_, String>(
            "SELECT wert FROM schluessel_werte WHERE schluessel = ?",
        )
        .bind(schluessel)
        .fetch_optional(&self.pool)
        .await?;
        Ok(wert)
    }

    async fn schreiben(&self, schluessel: &str, wert: &str) -> Result<(), SpeicherFehler> {
        let jetzt = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO schluessel_werte (schluessel, wert, aktualisiert_am) VALUES (?, ?, ?)
             ON CONFLICT(schluessel) DO UPDATE SET wert = excluded.wert,
                                                   aktualisiert_am = excluded.aktualisiert_am",
        )
        .bind(schluessel)
        .bind(wert)
        .bind(jetzt)
        .execute(&self.pool)
        .await?;
        tracing::trace!(schluessel, bytes = wert.len(), "Wert in SQLite gespeichert");
        Ok(())
    }

    async fn entfernen(&self, schluessel: &str) -> Result<(), SpeicherFehler> {
        sqlx::query("DELETE FROM schluessel_werte WHERE schluessel = ?")
            .bind(schluessel)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
