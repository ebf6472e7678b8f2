//! Session-Protokoll (TCP)
//!
//! Definiert alle Ereignisse die zwischen Client und Relay ausgetauscht
//! werden, den Nachrichtenumschlag fuer Session-Nachrichten sowie die
//! Zustands-Snapshots.
//!
//! ## Design
//! - Tagged Enums: jeder Frame traegt `event` (Name) und `data` (Payload)
//! - Event-Namen sind Teil des Wire-Formats und aendern sich nicht
//! - Pflichtfelder sind bewusst `Option`: Validierung und Fehlermeldung
//!   passieren im Relay, nicht beim Deserialisieren
//! - Kontinuierliche Updates (`update`, `interact`, `draw`) sind positionale
//!   Listen, keine Objekte (Feld-Offsets siehe Konstanten unten)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use seance_core::types::{ClientId, EntityId, SessionId};

// ---------------------------------------------------------------------------
// Feld-Offsets der positionalen Listen
// ---------------------------------------------------------------------------

/// Session-ID in `update`-, `interact`- und `draw`-Listen
pub const LISTE_SESSION: usize = 1;
/// Client-ID in `update`-, `interact`- und `draw`-Listen
pub const LISTE_CLIENT: usize = 2;

/// Entity-ID in `update`-Listen
pub const UPDATE_ENTITY: usize = 3;
/// Entity-Typ in `update`-Listen
pub const UPDATE_ENTITAETSTYP: usize = 4;
/// Mindestlaenge einer `update`-Liste fuer die Zustandsprojektion
pub const UPDATE_MINDEST_ARITAET: usize = 5;

/// Quell-Entity in `interact`-Listen
pub const INTERACT_QUELLE: usize = 3;
/// Ziel-Entity in `interact`-Listen
pub const INTERACT_ZIEL: usize = 4;
/// Interaktionstyp in `interact`-Listen
pub const INTERACT_TYP: usize = 5;

/// Quell-Entity in Interaction-Payloads einer Session-Nachricht
pub const NACHRICHT_QUELLE: usize = 3;
/// Ziel-Entity in Interaction-Payloads einer Session-Nachricht
pub const NACHRICHT_ZIEL: usize = 4;
/// Interaktionstyp in Interaction-Payloads einer Session-Nachricht
pub const NACHRICHT_TYP: usize = 5;
/// Exakte Aritaet eines Interaction-Payloads
pub const INTERAKTION_ARITAET: usize = 6;

/// Entity-ID in Sync-Payloads einer Session-Nachricht
pub const SYNC_ENTITY: usize = 3;
/// Entity-Typ in Sync-Payloads einer Session-Nachricht
pub const SYNC_TYP: usize = 4;
/// Mindest-Aritaet eines Sync-Payloads
pub const SYNC_MINDEST_ARITAET: usize = 5;

/// Entity-Typ-Code fuer Objekt-Updates (ersetzt `latest` wholesale)
pub const ENTITAETSTYP_OBJEKTE: i64 = 3;

// ---------------------------------------------------------------------------
// Nachrichtentyp & Interaktionstyp
// ---------------------------------------------------------------------------

/// Typ einer Session-Nachricht (`type`-Feld im Umschlag)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NachrichtTyp {
    /// Diskrete Interaktion (Payload: Liste mit Aritaet 6)
    Interaction,
    /// Zustandsabgleich einer Entity (Payload: Liste, Aritaet >= 5)
    Sync,
    /// Alles andere: wird weitergeleitet, aber nicht projiziert
    Unbekannt,
}

impl NachrichtTyp {
    /// Ordnet den Wire-String dem Nachrichtentyp zu
    pub fn aus_str(s: &str) -> Self {
        match s {
            "interaction" => Self::Interaction,
            "sync" => Self::Sync,
            _ => Self::Unbekannt,
        }
    }
}

/// Interaktionstyp-Codes der Clients
///
/// Die Codes sind Teil des Wire-Formats. Nur ein Teil der Codes veraendert
/// serverseitigen Zustand; der Rest wird lediglich weitergeleitet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteraktionsTyp {
    Look,
    LookEnd,
    Render,
    RenderEnd,
    Grab,
    GrabEnd,
    SceneChange,
    Unset,
    Lock,
    LockEnd,
    /// Unbekannter Code: kein Zustandseffekt, wird protokolliert
    Unbekannt(i64),
}

impl InteraktionsTyp {
    /// Konvertiert einen numerischen Code in einen `InteraktionsTyp`
    pub fn aus_code(code: i64) -> Self {
        match code {
            0 => Self::Look,
            1 => Self::LookEnd,
            2 => Self::Render,
            3 => Self::RenderEnd,
            4 => Self::Grab,
            5 => Self::GrabEnd,
            6 => Self::SceneChange,
            7 => Self::Unset,
            8 => Self::Lock,
            9 => Self::LockEnd,
            andere => Self::Unbekannt(andere),
        }
    }

    /// Gibt den numerischen Wire-Code zurueck
    pub fn code(&self) -> i64 {
        match self {
            Self::Look => 0,
            Self::LookEnd => 1,
            Self::Render => 2,
            Self::RenderEnd => 3,
            Self::Grab => 4,
            Self::GrabEnd => 5,
            Self::SceneChange => 6,
            Self::Unset => 7,
            Self::Lock => 8,
            Self::LockEnd => 9,
            Self::Unbekannt(code) => *code,
        }
    }
}

// ---------------------------------------------------------------------------
// Nachrichtenumschlag
// ---------------------------------------------------------------------------

/// Umschlag einer Session-Nachricht (`message`-Event)
///
/// `seq` und `capture_id` werden nur waehrend einer Aufzeichnung vom Relay
/// gestempelt; Clients senden sie nicht.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Nachrichtentyp als Wire-String (siehe `NachrichtTyp`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Payload: Liste, Objekt oder JSON-in-String
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
    /// Client-Zeitstempel in Unix-Millisekunden
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Sessionrelative Sequenznummer (ts - Aufzeichnungsbeginn)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_id: Option<String>,
}

impl RelayEnvelope {
    /// Gibt den Nachrichtentyp zurueck (`Unbekannt` wenn das Feld fehlt)
    pub fn nachricht_typ(&self) -> NachrichtTyp {
        self.typ
            .as_deref()
            .map(NachrichtTyp::aus_str)
            .unwrap_or(NachrichtTyp::Unbekannt)
    }

    /// Prueft ob der Payload fehlt oder leer ist (leere Liste, leerer String)
    pub fn payload_leer(&self) -> bool {
        match &self.message {
            None => true,
            Some(Value::Array(liste)) => liste.is_empty(),
            Some(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// Ersetzt einen JSON-in-String-Payload durch das geparste Dokument
    ///
    /// Payloads die bereits strukturiert ankommen bleiben unveraendert.
    pub fn nachricht_parsen(&mut self) -> Result<(), serde_json::Error> {
        if let Some(Value::String(roh)) = &self.message {
            let geparst: Value = serde_json::from_str(roh)?;
            self.message = Some(geparst);
        }
        Ok(())
    }

    /// Gibt den Payload als positionale Liste zurueck, falls er eine ist
    pub fn payload_liste(&self) -> Option<&Vec<Value>> {
        match &self.message {
            Some(Value::Array(liste)) => Some(liste),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Anfrage-Payloads (Client -> Relay)
// ---------------------------------------------------------------------------

/// Beitrittsanfrage (`join`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeitrittsAnfrage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

/// Zustandsanfrage (`state`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZustandsAnfrage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Snapshot-Version; alles ausser 2 liefert die Version-1-Form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Wiedergabeanfrage (`playback`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiedergabeAnfrage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
}

// ---------------------------------------------------------------------------
// Antwort-Payloads (Relay -> Client)
// ---------------------------------------------------------------------------

/// Mitgliedsmeldung fuer `joined` und `disconnected`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMitglied {
    pub session_id: SessionId,
    pub client_id: ClientId,
}

/// Entity-Record einer Session
///
/// `latest` ist ein opakes Produzenten-Payload und wird serverseitig nur
/// ersetzt, nie interpretiert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    pub latest: Value,
    pub render: bool,
    pub locked: bool,
}

impl Entity {
    /// Erstellt eine Entity mit den Standardwerten (nicht gerendert,
    /// nicht gesperrt, leerer Zustand)
    pub fn neu(id: EntityId) -> Self {
        Self {
            id,
            latest: Value::Null,
            render: false,
            locked: false,
        }
    }
}

/// Zustands-Snapshot Version 1: Entity-IDs plus Liste der gesperrten IDs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZustandV1 {
    pub clients: Vec<ClientId>,
    pub entities: Vec<EntityId>,
    pub locked: Vec<EntityId>,
    pub scene: Option<i64>,
    pub is_recording: bool,
}

/// Zustands-Snapshot Version 2: vollstaendige Entity-Records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZustandV2 {
    pub clients: Vec<ClientId>,
    pub entities: Vec<Entity>,
    pub scene: Option<i64>,
    pub is_recording: bool,
}

/// Antwort auf eine Zustandsanfrage
///
/// Untagged: die Form unterscheidet sich durch das `locked`-Feld (nur V1)
/// und die Entity-Repraesentation. V1 steht vorn, damit leere Snapshots
/// eindeutig deserialisieren.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ZustandsAntwort {
    V1(ZustandV1),
    V2(ZustandV2),
}

/// Session-Uebersicht fuer `sessionInfo`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetails {
    pub id: SessionId,
    pub clients: Vec<ClientId>,
    pub entities: Vec<Entity>,
    pub scene: Option<i64>,
    pub is_recording: bool,
    /// Unix-Millisekunden der Session-Erstellung
    pub session_start: i64,
}

// ---------------------------------------------------------------------------
// Haupt-Enums: ClientEvent / ServerEvent
// ---------------------------------------------------------------------------

/// Alle Ereignisse die ein Client an das Relay sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join")]
    Join(BeitrittsAnfrage),
    #[serde(rename = "state")]
    State(ZustandsAnfrage),
    #[serde(rename = "draw")]
    Draw(Vec<Value>),
    #[serde(rename = "message")]
    Message(RelayEnvelope),
    #[serde(rename = "update")]
    Update(Vec<f64>),
    #[serde(rename = "interact")]
    Interact(Vec<i64>),
    #[serde(rename = "start_recording")]
    StartRecording(SessionId),
    #[serde(rename = "end_recording")]
    EndRecording(SessionId),
    #[serde(rename = "playback")]
    Playback(WiedergabeAnfrage),
    #[serde(rename = "sessionInfo")]
    SessionInfo(SessionId),
    /// Sauberer Abschied des Clients
    #[serde(rename = "disconnect")]
    Disconnect,
}

/// Alle Ereignisse die das Relay an Clients sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "joined")]
    Joined(SessionMitglied),
    #[serde(rename = "disconnected")]
    Disconnected(SessionMitglied),
    #[serde(rename = "state")]
    State(ZustandsAntwort),
    #[serde(rename = "draw")]
    Draw(Vec<Value>),
    #[serde(rename = "message")]
    Message(RelayEnvelope),
    #[serde(rename = "relayUpdate")]
    RelayUpdate(Vec<f64>),
    #[serde(rename = "interactionUpdate")]
    InteractionUpdate(Vec<i64>),
    #[serde(rename = "connectionError")]
    ConnectionError(String),
    #[serde(rename = "sessionInfo")]
    SessionInfo(SessionDetails),
    /// Ende des Positions-Stroms einer Wiedergabe
    #[serde(rename = "playbackEnd")]
    PlaybackEnd,
    /// Ende des Interaktions-Stroms einer Wiedergabe
    #[serde(rename = "interactionPlaybackEnd")]
    InteractionPlaybackEnd,
}

impl ServerEvent {
    /// Erstellt eine `connectionError`-Meldung
    pub fn fehler(nachricht: impl Into<String>) -> Self {
        Self::ConnectionError(nachricht.into())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
