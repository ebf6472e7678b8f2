//! Router – Weitergabe, Projektion und Zustandsauskunft

use super::*;
use crate::router;
use seance_protocol::events::{ZustandsAnfrage, ZustandsAntwort};

#[tokio::test]
async fn nachricht_geht_nur_an_die_uebrigen_mitglieder() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::nachricht_verarbeiten(&state, socket_a, interaktions_umschlag(5, 100, 7, 0));

    let events_b = alle_events(&mut rx_b);
    assert_eq!(events_b.len(), 1);
    match &events_b[0] {
        ServerEvent::Message(umschlag) => {
            assert_eq!(umschlag.client_id, Some(ClientId(100)));
            assert_eq!(umschlag.typ.as_deref(), Some("interaction"));
        }
        anderes => panic!("message erwartet, war {anderes:?}"),
    }
    assert!(alle_events(&mut rx_a).is_empty());
}

#[tokio::test]
async fn nachricht_ohne_pflichtfelder_wird_verworfen() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    let mut ohne_client = interaktions_umschlag(5, 100, 7, 0);
    ohne_client.client_id = None;
    router::nachricht_verarbeiten(&state, socket_a, ohne_client);

    let mut ohne_typ = interaktions_umschlag(5, 100, 7, 0);
    ohne_typ.typ = None;
    router::nachricht_verarbeiten(&state, socket_a, ohne_typ);

    let mut leer = interaktions_umschlag(5, 100, 7, 0);
    leer.message = None;
    router::nachricht_verarbeiten(&state, socket_a, leer);

    assert!(alle_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn fremde_absender_werden_abgewiesen() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    // Client 999 steht nicht im Roster
    router::nachricht_verarbeiten(&state, socket_a, interaktions_umschlag(5, 999, 7, 0));
    // Session 99 existiert nicht
    router::nachricht_verarbeiten(&state, socket_a, interaktions_umschlag(99, 100, 7, 0));

    assert!(alle_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn interaktionstabelle_wirkt_auf_den_entity_zustand() {
    let (state, _ablage) = test_state();
    let (socket, mut rx) = mitglied_anmelden(&state, 5, 100).await;
    alle_events(&mut rx);

    // render (2) legt sichtbar an
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 7, 2));
    assert!(entity_holen(&state, 5, 7).unwrap().render);

    // renderEnd (3) blendet aus
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 7, 3));
    assert!(!entity_holen(&state, 5, 7).unwrap().render);

    // lock (8) sperrt, ohne sichtbar zu machen
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 42, 8));
    let gesperrt = entity_holen(&state, 5, 42).unwrap();
    assert!(gesperrt.locked);
    assert!(!gesperrt.render);

    // lockEnd (9) entsperrt
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 42, 9));
    assert!(!entity_holen(&state, 5, 42).unwrap().locked);

    // sceneChange (6) setzt die Szene der Session
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 3, 6));
    let szene = state
        .registry
        .mit_session(&SessionId(5), |s| s.scene)
        .unwrap();
    assert_eq!(szene, Some(3));

    // look (0) und grab (4) lassen den Zustand unberuehrt
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 77, 0));
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 77, 4));
    assert!(entity_holen(&state, 5, 77).is_none());
}

#[tokio::test]
async fn sync_ersetzt_nur_objekt_zustaende() {
    let (state, _ablage) = test_state();
    let (socket, mut rx) = mitglied_anmelden(&state, 5, 100).await;
    alle_events(&mut rx);

    let mut sync = RelayEnvelope {
        session_id: Some(SessionId(5)),
        client_id: Some(ClientId(100)),
        typ: Some("sync".into()),
        message: Some(json!([0, 5, 100, 77, 3])),
        ts: None,
        seq: None,
        capture_id: None,
    };
    router::nachricht_verarbeiten(&state, socket, sync.clone());

    let entity = entity_holen(&state, 5, 77).unwrap();
    assert_eq!(entity.latest, json!([0, 5, 100, 77, 3]));
    assert!(entity.render);

    // Andere Entitaetstypen werden nicht uebernommen
    sync.message = Some(json!([0, 5, 100, 78, 1]));
    router::nachricht_verarbeiten(&state, socket, sync);
    assert!(entity_holen(&state, 5, 78).is_none());
}

#[tokio::test]
async fn string_payload_wird_erst_nach_der_weitergabe_geparst() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    let umschlag = RelayEnvelope {
        session_id: Some(SessionId(5)),
        client_id: Some(ClientId(100)),
        typ: Some("sync".into()),
        message: Some(json!("[0,5,100,77,3]")),
        ts: None,
        seq: None,
        capture_id: None,
    };
    router::nachricht_verarbeiten(&state, socket_a, umschlag);

    // Weitergereicht wird die Originalform
    let events_b = alle_events(&mut rx_b);
    assert_eq!(events_b.len(), 1);
    match &events_b[0] {
        ServerEvent::Message(m) => assert_eq!(m.message, Some(json!("[0,5,100,77,3]"))),
        anderes => panic!("message erwartet, war {anderes:?}"),
    }
    // Projiziert wird die geparste Form
    assert!(entity_holen(&state, 5, 77).is_some());

    // Unlesbare String-Payloads werden weitergereicht, aber nicht projiziert
    let kaputt = RelayEnvelope {
        session_id: Some(SessionId(5)),
        client_id: Some(ClientId(100)),
        typ: Some("sync".into()),
        message: Some(json!("{kein json")),
        ts: None,
        seq: None,
        capture_id: None,
    };
    router::nachricht_verarbeiten(&state, socket_a, kaputt);
    assert_eq!(alle_events(&mut rx_b).len(), 1);
}

#[tokio::test]
async fn update_projiziert_nur_objekt_typen() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::update_verarbeiten(&state, socket_a, vec![0.0, 5.0, 100.0, 9.0, 3.0]).await;

    let events_b = alle_events(&mut rx_b);
    assert_eq!(events_b.len(), 1);
    assert!(matches!(&events_b[0], ServerEvent::RelayUpdate(liste) if liste.len() == 5));
    let entity = entity_holen(&state, 5, 9).unwrap();
    assert_eq!(entity.latest, json!([0.0, 5.0, 100.0, 9.0, 3.0]));
    assert!(entity.render);

    // Avatar-Eintraege (Typ 1) werden weitergereicht, aber nicht gespeichert
    router::update_verarbeiten(&state, socket_a, vec![0.0, 5.0, 100.0, 10.0, 1.0]).await;
    assert_eq!(alle_events(&mut rx_b).len(), 1);
    assert!(entity_holen(&state, 5, 10).is_none());
}

#[tokio::test]
async fn update_zu_kurz_oder_von_fremden_wird_verworfen() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::update_verarbeiten(&state, socket_a, vec![0.0, 5.0]).await;
    router::update_verarbeiten(&state, socket_a, vec![0.0, 5.0, 999.0, 1.0, 3.0]).await;
    router::update_verarbeiten(&state, socket_a, vec![0.0, 99.0, 100.0, 1.0, 3.0]).await;

    assert!(alle_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn interact_reicht_weiter_ohne_projektion() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::interaktion_verarbeiten(&state, socket_a, vec![0, 5, 100, 1, 42, 8, 0]).await;

    let events_b = alle_events(&mut rx_b);
    assert_eq!(events_b.len(), 1);
    assert!(matches!(&events_b[0], ServerEvent::InteractionUpdate(liste) if liste[4] == 42));
    // Der schnelle Pfad wirkt nicht auf den Entity-Zustand
    assert!(entity_holen(&state, 5, 42).is_none());
}

#[tokio::test]
async fn draw_wird_ohne_registry_pruefung_weitergereicht() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::draw_weiterleiten(
        &state,
        socket_a,
        vec![json!(0), json!(5), json!(100), json!([1, 2])],
    );

    let events_b = alle_events(&mut rx_b);
    assert_eq!(events_b.len(), 1);
    assert!(matches!(events_b[0], ServerEvent::Draw(_)));

    // Fehlende Kennungen brechen ab
    router::draw_weiterleiten(&state, socket_a, vec![json!(0)]);
    router::draw_weiterleiten(&state, socket_a, vec![json!(0), json!(5)]);
    assert!(alle_events(&mut rx_b).is_empty());
}

#[tokio::test]
async fn zustandsanfrage_liefert_beide_versionen() {
    let (state, _ablage) = test_state();
    let (socket, mut rx) = mitglied_anmelden(&state, 5, 100).await;
    alle_events(&mut rx);

    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 42, 8));
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 7, 2));
    router::nachricht_verarbeiten(&state, socket, interaktions_umschlag(5, 100, 3, 6));

    router::zustand_senden(
        &state,
        socket,
        ZustandsAnfrage {
            session_id: Some(SessionId(5)),
            client_id: Some(ClientId(100)),
            version: None,
        },
    );
    let events = alle_events(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::State(ZustandsAntwort::V1(z)) => {
            assert_eq!(z.clients, vec![ClientId(100)]);
            assert_eq!(z.entities, vec![EntityId(42), EntityId(7)]);
            assert_eq!(z.locked, vec![EntityId(42)]);
            assert_eq!(z.scene, Some(3));
            assert!(!z.is_recording);
        }
        anderes => panic!("V1-Zustand erwartet, war {anderes:?}"),
    }

    router::zustand_senden(
        &state,
        socket,
        ZustandsAnfrage {
            session_id: Some(SessionId(5)),
            client_id: Some(ClientId(100)),
            version: Some(2),
        },
    );
    let events = alle_events(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerEvent::State(ZustandsAntwort::V2(z)) => {
            assert_eq!(z.entities.len(), 2);
            assert!(z.entities.iter().any(|e| e.id == EntityId(42) && e.locked));
        }
        anderes => panic!("V2-Zustand erwartet, war {anderes:?}"),
    }
}

#[tokio::test]
async fn zustandsanfrage_verlangt_keine_mitgliedschaft() {
    let (state, _ablage) = test_state();
    let (_socket, mut rx_mitglied) = mitglied_anmelden(&state, 5, 100).await;
    alle_events(&mut rx_mitglied);

    let beobachter = SocketId::new();
    let mut rx = state.broadcaster.client_registrieren(beobachter);
    router::zustand_senden(
        &state,
        beobachter,
        ZustandsAnfrage {
            session_id: Some(SessionId(5)),
            client_id: Some(ClientId(999)),
            version: None,
        },
    );

    let events = alle_events(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ServerEvent::State(_)));
}

#[tokio::test]
async fn zustandsanfrage_meldet_fehler_an_den_anfragenden() {
    let (state, _ablage) = test_state();
    let socket = SocketId::new();
    let mut rx = state.broadcaster.client_registrieren(socket);

    router::zustand_senden(
        &state,
        socket,
        ZustandsAnfrage {
            session_id: None,
            client_id: Some(ClientId(1)),
            version: None,
        },
    );
    router::zustand_senden(
        &state,
        socket,
        ZustandsAnfrage {
            session_id: Some(SessionId(99)),
            client_id: Some(ClientId(1)),
            version: None,
        },
    );

    let events = alle_events(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| matches!(e, ServerEvent::ConnectionError(_))));
}

#[tokio::test]
async fn session_info_geht_nur_an_den_anfragenden() {
    let (state, _ablage) = test_state();
    let (socket_a, mut rx_a) = mitglied_anmelden(&state, 5, 100).await;
    let (_socket_b, mut rx_b) = mitglied_anmelden(&state, 5, 200).await;
    alle_events(&mut rx_a);
    alle_events(&mut rx_b);

    router::session_info_senden(&state, socket_a, SessionId(5));

    let events_a = alle_events(&mut rx_a);
    assert_eq!(events_a.len(), 1);
    match &events_a[0] {
        ServerEvent::SessionInfo(details) => {
            assert_eq!(details.id, SessionId(5));
            assert_eq!(details.clients, vec![ClientId(100), ClientId(200)]);
        }
        anderes => panic!("sessionInfo erwartet, war {anderes:?}"),
    }
    assert!(alle_events(&mut rx_b).is_empty());

    // Unbekannte Sessions bleiben unbeantwortet
    router::session_info_senden(&state, socket_a, SessionId(99));
    assert!(alle_events(&mut rx_a).is_empty());
}
