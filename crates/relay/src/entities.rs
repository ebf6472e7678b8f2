//! Entity-Zustandsspeicher einer Session
//!
//! Haelt pro Session die zuletzt bekannten Entity-Zustaende. Entities
//! entstehen faul beim ersten Verweis (Update, Interaktion oder Sync) und
//! leben bis ihre Session aus der Registry faellt.
//!
//! Zwei Schreiboperationen mit unterschiedlichen Anlege-Standards:
//! - `anwenden` setzt nur die im Patch belegten Felder; fehlt die Entity,
//!   wird sie mit den Grundwerten erstellt und der Patch darauf angewandt.
//! - `latest_ersetzen` tauscht den Zustand komplett aus; eine dabei neu
//!   erstellte Entity gilt als sichtbar (render=true).

use seance_core::types::EntityId;
use seance_protocol::events::Entity;
use serde_json::Value;

/// Teil-Aenderung an einer Entity
///
/// Nur belegte Felder werden geschrieben, der Rest bleibt unveraendert.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub latest: Option<Value>,
    pub render: Option<bool>,
    pub locked: Option<bool>,
}

impl EntityPatch {
    /// Patch der nur das Render-Flag setzt
    pub fn render(wert: bool) -> Self {
        Self {
            render: Some(wert),
            ..Self::default()
        }
    }

    /// Patch der nur das Lock-Flag setzt
    pub fn gesperrt(wert: bool) -> Self {
        Self {
            locked: Some(wert),
            ..Self::default()
        }
    }
}

/// Entity-Speicher einer Session in Einfuege-Reihenfolge
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: Vec<Entity>,
}

impl EntityStore {
    /// Erstellt einen leeren Speicher
    pub fn neu() -> Self {
        Self::default()
    }

    /// Wendet einen Patch an, legt die Entity bei Bedarf an
    pub fn anwenden(&mut self, id: EntityId, patch: EntityPatch) {
        let entity = self.holen_oder_anlegen(id);
        if let Some(latest) = patch.latest {
            entity.latest = latest;
        }
        if let Some(render) = patch.render {
            entity.render = render;
        }
        if let Some(locked) = patch.locked {
            entity.locked = locked;
        }
    }

    /// Ersetzt den Zustand einer Entity komplett
    ///
    /// Eine dabei neu angelegte Entity startet mit render=true, locked=false.
    pub fn latest_ersetzen(&mut self, id: EntityId, wert: Value) {
        match self.entities.iter_mut().find(|e| e.id == id) {
            Some(entity) => entity.latest = wert,
            None => {
                let mut entity = Entity::neu(id);
                entity.latest = wert;
                entity.render = true;
                self.entities.push(entity);
            }
        }
    }

    /// Gibt die Entity mit der angegebenen ID zurueck
    pub fn holen(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Alle Entities in Einfuege-Reihenfolge
    pub fn alle(&self) -> &[Entity] {
        &self.entities
    }

    /// Alle Entity-IDs in Einfuege-Reihenfolge
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.iter().map(|e| e.id).collect()
    }

    /// IDs der aktuell gesperrten Entities
    pub fn gesperrte_ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|e| e.locked)
            .map(|e| e.id)
            .collect()
    }

    /// Anzahl der Entities
    pub fn anzahl(&self) -> usize {
        self.entities.len()
    }

    fn holen_oder_anlegen(&mut self, id: EntityId) -> &mut Entity {
        if let Some(pos) = self.entities.iter().position(|e| e.id == id) {
            &mut self.entities[pos]
        } else {
            self.entities.push(Entity::neu(id));
            let letzte = self.entities.len() - 1;
            &mut self.entities[letzte]
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
