//! SQLite-Implementierung der Audit-Senke

use sqlx::Row;

use seance_core::types::{ClientId, SessionId};

use crate::audit::{AuditLog, VerbindungsEvent};
use crate::error::{DbError, DbResult};
use crate::models::{CaptureRecord, VerbindungsRecord};
use crate::sqlite::pool::SqliteDb;

impl AuditLog for SqliteDb {
    async fn verbindung_protokollieren(
        &self,
        zeitpunkt_ms: i64,
        session_id: SessionId,
        client_id: ClientId,
        event: VerbindungsEvent,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO connections (ts_ms, session_id, client_id, event)
             VALUES (?, ?, ?, ?)",
        )
        .bind(zeitpunkt_ms)
        .bind(session_id.inner())
        .bind(client_id.inner())
        .bind(event.als_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn capture_start_protokollieren(
        &self,
        capture_id: &str,
        session_id: SessionId,
        start_ms: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO captures (capture_id, session_id, start_ms)
             VALUES (?, ?, ?)",
        )
        .bind(capture_id)
        .bind(session_id.inner())
        .bind(start_ms)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn capture_ende_protokollieren(&self, capture_id: &str, ende_ms: i64) -> DbResult<()> {
        let ergebnis = sqlx::query("UPDATE captures SET end_ms = ? WHERE capture_id = ?")
            .bind(ende_ms)
            .bind(capture_id)
            .execute(&self.pool)
            .await?;

        if ergebnis.rows_affected() == 0 {
            return Err(DbError::nicht_gefunden(format!(
                "Capture '{capture_id}' ist nicht registriert"
            )));
        }

        Ok(())
    }
}

impl SqliteDb {
    /// Listet alle Verbindungsereignisse einer Session in Eintreffreihenfolge
    pub async fn verbindungen_auflisten(
        &self,
        session_id: SessionId,
    ) -> DbResult<Vec<VerbindungsRecord>> {
        let rows = sqlx::query(
            "SELECT id, ts_ms, session_id, client_id, event
             FROM connections
             WHERE session_id = ?
             ORDER BY id ASC",
        )
        .bind(session_id.inner())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_zu_verbindung).collect()
    }

    /// Laedt einen Capture-Datensatz anhand seiner ID
    pub async fn capture_laden(&self, capture_id: &str) -> DbResult<Option<CaptureRecord>> {
        let row = sqlx::query(
            "SELECT capture_id, session_id, start_ms, end_ms
             FROM captures
             WHERE capture_id = ?",
        )
        .bind(capture_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_zu_capture).transpose()
    }
}

fn row_zu_verbindung(row: &sqlx::sqlite::SqliteRow) -> DbResult<VerbindungsRecord> {
    Ok(VerbindungsRecord {
        id: row.try_get("id")?,
        ts_ms: row.try_get("ts_ms")?,
        session_id: SessionId(row.try_get("session_id")?),
        client_id: ClientId(row.try_get("client_id")?),
        event: row.try_get("event")?,
    })
}

fn row_zu_capture(row: &sqlx::sqlite::SqliteRow) -> DbResult<CaptureRecord> {
    Ok(CaptureRecord {
        capture_id: row.try_get("capture_id")?,
        session_id: SessionId(row.try_get("session_id")?),
        start_ms: row.try_get("start_ms")?,
        end_ms: row.try_get("end_ms")?,
    })
}
