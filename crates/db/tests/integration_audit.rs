//! Integration-Tests fuer die Audit-Senke (In-Memory SQLite)

use seance_core::types::{ClientId, SessionId};
use seance_db::{AuditLog, DbError, SqliteDb, VerbindungsEvent};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

#[tokio::test]
async fn verbindung_protokollieren() {
    let db = db().await;

    db.verbindung_protokollieren(1000, SessionId(5), ClientId(9), VerbindungsEvent::Verbunden)
        .await
        .unwrap();

    let ereignisse = db.verbindungen_auflisten(SessionId(5)).await.unwrap();
    assert_eq!(ereignisse.len(), 1);
    assert_eq!(ereignisse[0].ts_ms, 1000);
    assert_eq!(ereignisse[0].client_id, ClientId(9));
    assert_eq!(ereignisse[0].event, "connect");
    assert_eq!(
        ereignisse[0].event_typ(),
        Some(VerbindungsEvent::Verbunden)
    );
}

#[tokio::test]
async fn verbindungen_in_eintreffreihenfolge() {
    let db = db().await;

    db.verbindung_protokollieren(1000, SessionId(1), ClientId(7), VerbindungsEvent::Verbunden)
        .await
        .unwrap();
    db.verbindung_protokollieren(2000, SessionId(1), ClientId(7), VerbindungsEvent::Getrennt)
        .await
        .unwrap();
    db.verbindung_protokollieren(
        2500,
        SessionId(1),
        ClientId(7),
        VerbindungsEvent::Wiederverbunden,
    )
    .await
    .unwrap();

    let ereignisse = db.verbindungen_auflisten(SessionId(1)).await.unwrap();
    let arten: Vec<&str> = ereignisse.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(arten, vec!["connect", "disconnect", "reconnect"]);
}

#[tokio::test]
async fn verbindungen_nach_session_getrennt() {
    let db = db().await;

    db.verbindung_protokollieren(1, SessionId(1), ClientId(1), VerbindungsEvent::Verbunden)
        .await
        .unwrap();
    db.verbindung_protokollieren(2, SessionId(2), ClientId(1), VerbindungsEvent::Verbunden)
        .await
        .unwrap();

    assert_eq!(db.verbindungen_auflisten(SessionId(1)).await.unwrap().len(), 1);
    assert_eq!(db.verbindungen_auflisten(SessionId(2)).await.unwrap().len(), 1);
    assert!(db.verbindungen_auflisten(SessionId(3)).await.unwrap().is_empty());
}

#[tokio::test]
async fn capture_lebenslauf() {
    let db = db().await;

    db.capture_start_protokollieren("5_1000", SessionId(5), 1000)
        .await
        .unwrap();

    let offen = db.capture_laden("5_1000").await.unwrap().unwrap();
    assert_eq!(offen.session_id, SessionId(5));
    assert_eq!(offen.start_ms, 1000);
    assert!(!offen.ist_abgeschlossen());

    db.capture_ende_protokollieren("5_1000", 4500).await.unwrap();

    let fertig = db.capture_laden("5_1000").await.unwrap().unwrap();
    assert_eq!(fertig.end_ms, Some(4500));
    assert!(fertig.ist_abgeschlossen());
}

#[tokio::test]
async fn capture_ende_ohne_start_ist_fehler() {
    let db = db().await;

    let ergebnis = db.capture_ende_protokollieren("99_123", 500).await;
    assert!(matches!(ergebnis, Err(DbError::NichtGefunden(_))));
}

#[tokio::test]
async fn capture_unbekannt_ist_none() {
    let db = db().await;
    assert!(db.capture_laden("gibtsnicht").await.unwrap().is_none());
}

#[tokio::test]
async fn mehrere_captures_pro_session() {
    let db = db().await;

    db.capture_start_protokollieren("7_100", SessionId(7), 100)
        .await
        .unwrap();
    db.capture_ende_protokollieren("7_100", 200).await.unwrap();
    db.capture_start_protokollieren("7_300", SessionId(7), 300)
        .await
        .unwrap();

    let erste = db.capture_laden("7_100").await.unwrap().unwrap();
    let zweite = db.capture_laden("7_300").await.unwrap().unwrap();
    assert!(erste.ist_abgeschlossen());
    assert!(!zweite.ist_abgeschlossen());
}
