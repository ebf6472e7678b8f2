//! Capture-Codec (Legacy-Binaerformat)
//!
//! Definiert die fixen Record-Layouts der beiden Capture-Stroeme. Externe
//! Auswertungswerkzeuge haengen am exakten Byte-Layout; direkte
//! Byte-Serialisierung, kein serde.
//!
//! ## Record-Formate (little-endian)
//!
//! ```text
//! Positions-Record (56 Bytes, 14 x f32)
//! Index  Beschreibung
//! -----  -----------
//!  0     Nachrichten-Kennung
//!  1     Session-ID
//!  2     Client-ID
//!  3     Entity-ID
//!  4     Entity-Typ
//!  5-12  Transformdaten (Skalierung, Rotation, Position)
//! 13     Sequenznummer (wird beim Kodieren ueberschrieben)
//!
//! Interaktions-Record (28 Bytes, 7 x i32)
//! Index  Beschreibung
//! -----  -----------
//!  0     Nachrichten-Kennung
//!  1     Session-ID
//!  2     Client-ID
//!  3     Quell-Entity
//!  4     Ziel-Entity
//!  5     Interaktionstyp
//!  6     Sequenznummer (wird beim Kodieren ueberschrieben)
//! ```
//!
//! Die Sequenznummer ist die sessionrelative Ereigniszeit
//! (Ereignis-Zeitstempel minus Aufzeichnungsbeginn in Millisekunden).

use bytes::{Bytes, BytesMut};
use std::io;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Felder pro Positions-Record
pub const POS_FELDER: usize = 14;
/// Groesse eines Positions-Records in Bytes
pub const POS_RECORD_GROESSE: usize = POS_FELDER * 4;
/// Index des Client-ID-Felds im Positions-Record
pub const POS_CLIENT: usize = 2;
/// Index des Entity-ID-Felds im Positions-Record
pub const POS_ENTITY: usize = 3;
/// Index des Entity-Typ-Felds im Positions-Record
pub const POS_ENTITAETSTYP: usize = 4;
/// Index des Sequenz-Felds im Positions-Record
pub const POS_SEQ: usize = POS_FELDER - 1;

/// Felder pro Interaktions-Record
pub const INT_FELDER: usize = 7;
/// Groesse eines Interaktions-Records in Bytes
pub const INT_RECORD_GROESSE: usize = INT_FELDER * 4;
/// Index des Sequenz-Felds im Interaktions-Record
pub const INT_SEQ: usize = INT_FELDER - 1;

/// Kapazitaet des Positions-Schreibpuffers in Records
pub const POS_PUFFER_RECORDS: usize = 1024;
/// Kapazitaet des Interaktions-Schreibpuffers in Records
pub const INT_PUFFER_RECORDS: usize = 128;

// ---------------------------------------------------------------------------
// Kodieren
// ---------------------------------------------------------------------------

/// Kodiert eine `update`-Liste als Positions-Record
///
/// Das letzte Feld der Eingabe wird verworfen und durch `seq` ersetzt.
/// Gibt `None` zurueck wenn die Aritaet nicht stimmt.
pub fn position_kodieren(felder: &[f64], seq: f32) -> Option<[u8; POS_RECORD_GROESSE]> {
    if felder.len() != POS_FELDER {
        return None;
    }
    let mut record = [0u8; POS_RECORD_GROESSE];
    for (i, feld) in felder.iter().enumerate().take(POS_SEQ) {
        record[i * 4..i * 4 + 4].copy_from_slice(&(*feld as f32).to_le_bytes());
    }
    record[POS_SEQ * 4..].copy_from_slice(&seq.to_le_bytes());
    Some(record)
}

/// Kodiert eine `interact`-Liste als Interaktions-Record
///
/// Das letzte Feld der Eingabe wird verworfen und durch `seq` ersetzt.
/// Gibt `None` zurueck wenn die Aritaet nicht stimmt.
pub fn interaktion_kodieren(felder: &[i64], seq: i32) -> Option<[u8; INT_RECORD_GROESSE]> {
    if felder.len() != INT_FELDER {
        return None;
    }
    let mut record = [0u8; INT_RECORD_GROESSE];
    for (i, feld) in felder.iter().enumerate().take(INT_SEQ) {
        record[i * 4..i * 4 + 4].copy_from_slice(&(*feld as i32).to_le_bytes());
    }
    record[INT_SEQ * 4..].copy_from_slice(&seq.to_le_bytes());
    Some(record)
}

// ---------------------------------------------------------------------------
// Dekodieren
// ---------------------------------------------------------------------------

/// Dekodiert einen vollstaendigen Positions-Strom
///
/// # Fehler
/// - `InvalidData` wenn die Stromlaenge kein Vielfaches der Record-Groesse ist
pub fn positionen_dekodieren(daten: &[u8]) -> io::Result<Vec<[f32; POS_FELDER]>> {
    if daten.len() % POS_RECORD_GROESSE != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Positions-Strom beschaedigt: {} Bytes sind kein Vielfaches von {}",
                daten.len(),
                POS_RECORD_GROESSE
            ),
        ));
    }
    let mut records = Vec::with_capacity(daten.len() / POS_RECORD_GROESSE);
    for roh in daten.chunks_exact(POS_RECORD_GROESSE) {
        let mut record = [0f32; POS_FELDER];
        for (i, feld) in record.iter_mut().enumerate() {
            *feld = f32::from_le_bytes([roh[i * 4], roh[i * 4 + 1], roh[i * 4 + 2], roh[i * 4 + 3]]);
        }
        records.push(record);
    }
    Ok(records)
}

/// Dekodiert einen vollstaendigen Interaktions-Strom
///
/// # Fehler
/// - `InvalidData` wenn die Stromlaenge kein Vielfaches der Record-Groesse ist
pub fn interaktionen_dekodieren(daten: &[u8]) -> io::Result<Vec<[i32; INT_FELDER]>> {
    if daten.len() % INT_RECORD_GROESSE != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Interaktions-Strom beschaedigt: {} Bytes sind kein Vielfaches von {}",
                daten.len(),
                INT_RECORD_GROESSE
            ),
        ));
    }
    let mut records = Vec::with_capacity(daten.len() / INT_RECORD_GROESSE);
    for roh in daten.chunks_exact(INT_RECORD_GROESSE) {
        let mut record = [0i32; INT_FELDER];
        for (i, feld) in record.iter_mut().enumerate() {
            *feld = i32::from_le_bytes([roh[i * 4], roh[i * 4 + 1], roh[i * 4 + 2], roh[i * 4 + 3]]);
        }
        records.push(record);
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// SchreibPuffer
// ---------------------------------------------------------------------------

/// Begrenzter Schreibpuffer fuer einen Capture-Strom
///
/// Records sammeln sich im Speicher; erst wenn das naechste Record die
/// Kapazitaet ueberschreiten wuerde, gibt `anhaengen` den gesammelten Inhalt
/// zur Persistierung zurueck und faengt leer wieder an. Ueber
/// Flush-Grenzen hinweg geht kein Record verloren.
#[derive(Debug)]
pub struct SchreibPuffer {
    kapazitaet: usize,
    puffer: BytesMut,
}

impl SchreibPuffer {
    /// Erstellt einen Puffer fuer `record_anzahl` Records der gegebenen Groesse
    pub fn neu(record_groesse: usize, record_anzahl: usize) -> Self {
        let kapazitaet = record_groesse * record_anzahl;
        Self {
            kapazitaet,
            puffer: BytesMut::with_capacity(kapazitaet),
        }
    }

    /// Haengt ein kodiertes Record an
    ///
    /// Gibt `Some(inhalt)` zurueck wenn der bisherige Pufferinhalt wegen
    /// drohendem Ueberlauf rausgeschrieben werden muss; das neue Record
    /// liegt danach bereits im geleerten Puffer.
    pub fn anhaengen(&mut self, record: &[u8]) -> Option<Bytes> {
        let voll = if self.puffer.len() + record.len() > self.kapazitaet && !self.puffer.is_empty()
        {
            Some(self.puffer.split().freeze())
        } else {
            None
        };
        self.puffer.extend_from_slice(record);
        voll
    }

    /// Entnimmt den Restinhalt (None wenn der Puffer leer ist)
    pub fn leeren(&mut self) -> Option<Bytes> {
        if self.puffer.is_empty() {
            None
        } else {
            Some(self.puffer.split().freeze())
        }
    }

    /// Aktuelle Fuellung in Bytes
    pub fn laenge(&self) -> usize {
        self.puffer.len()
    }

    /// Prueft ob der Puffer leer ist
    pub fn ist_leer(&self) -> bool {
        self.puffer.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
