//! Typed persistence for saved places
//!
//! Owns every `Place` in the system. Home and work are singletons
//! overwritten on re-save; custom places keep their creation order
//! through an index entry. Writes are serialized so a reader never
//! observes partial state; unreadable entries are treated as absent so
//! a partially corrupted store keeps the engine usable.

use crate::domain::place::{Place, PlaceKind, PlaceRef, CUSTOM_INDEX_KEY};
use crate::infra::error::Result;
use crate::io::storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PlaceStore {
    store: Arc<dyn KeyValueStore>,
    /// Serializes save/delete so index updates never race
    write_lock: tokio::sync::Mutex<()>,
}

impl PlaceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, write_lock: tokio::sync::Mutex::new(()) }
    }

    /// Read one place. Absent entries return `Ok(None)`; corrupt
    /// entries are logged and also read as absent.
    pub async fn get(&self, place_ref: &PlaceRef) -> Result<Option<Place>> {
        let key = place_ref.key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match Place::from_json(&raw) {
            Some(place) => Ok(Some(place)),
            None => {
                warn!(key = %key, "stored_place_unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    /// Save a place, overwriting any existing place of the same kind
    /// (home/work) or id (custom)
    pub async fn save(&self, place: &Place) -> Result<()> {
        let Some(place_ref) = place.place_ref() else {
            return Err(crate::infra::error::EngineError::storage(
                "custom place is missing an id",
            ));
        };

        let _guard = self.write_lock.lock().await;
        let json = place.to_json()?;
        self.store.set(&place_ref.key(), &json).await?;

        if let (PlaceKind::Custom, Some(id)) = (place.kind, &place.id) {
            let mut index = self.read_index().await?;
            if !index.iter().any(|existing| existing == id) {
                index.push(id.clone());
                self.write_index(&index).await?;
            }
        }

        debug!(kind = %place.kind.as_str(), label = %place.label, "place_saved");
        Ok(())
    }

    /// Delete a place. Deleting an absent place is a no-op.
    pub async fn delete(&self, place_ref: &PlaceRef) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(&place_ref.key()).await?;

        if let PlaceRef::Custom(id) = place_ref {
            let mut index = self.read_index().await?;
            let before = index.len();
            index.retain(|existing| existing != id);
            if index.len() != before {
                self.write_index(&index).await?;
            }
        }
        Ok(())
    }

    /// All saved places: home, then work (when present), then custom
    /// places in creation order
    pub async fn list(&self) -> Result<Vec<Place>> {
        let mut places = Vec::new();
        if let Some(home) = self.get(&PlaceRef::Home).await? {
            places.push(home);
        }
        if let Some(work) = self.get(&PlaceRef::Work).await? {
            places.push(work);
        }
        for id in self.read_index().await? {
            if let Some(place) = self.get(&PlaceRef::Custom(id.clone())).await? {
                places.push(place);
            } else {
                warn!(id = %id, "indexed_custom_place_missing");
            }
        }
        Ok(places)
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        let Some(raw) = self.store.get(CUSTOM_INDEX_KEY).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(index) => Ok(index),
            Err(e) => {
                warn!(error = %e, "custom_place_index_unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn write_index(&self, index: &[String]) -> Result<()> {
        let json = serde_json::to_string(index)?;
        self.store.set(CUSTOM_INDEX_KEY, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinate;
    use crate::io::storage::MemoryStore;

    fn store() -> PlaceStore {
        PlaceStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_save_get_round_trip() {
        let places = store();
        let home = Place::home(Coordinate::new(14.60, 120.98));

        places.save(&home).await.unwrap();
        let loaded = places.get(&PlaceRef::Home).await.unwrap().unwrap();
        assert_eq!(loaded, home);
    }

    #[tokio::test]
    async fn test_get_absent_is_none_not_error() {
        let places = store();
        assert!(places.get(&PlaceRef::Home).await.unwrap().is_none());
        assert!(places.get(&PlaceRef::Custom("nope".to_string())).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resave_overwrites_home() {
        let places = store();
        places.save(&Place::home(Coordinate::new(14.60, 120.98))).await.unwrap();
        places.save(&Place::home(Coordinate::new(14.61, 120.99))).await.unwrap();

        let loaded = places.get(&PlaceRef::Home).await.unwrap().unwrap();
        assert_eq!(loaded.coordinate, Coordinate::new(14.61, 120.99));

        // Still exactly one home entry
        let all = places.list().await.unwrap();
        assert_eq!(all.iter().filter(|p| p.kind == PlaceKind::Home).count(), 1);
    }

    #[tokio::test]
    async fn test_delete_then_get_is_absent() {
        let places = store();
        places.save(&Place::work(Coordinate::new(14.55, 121.0))).await.unwrap();

        places.delete(&PlaceRef::Work).await.unwrap();
        assert!(places.get(&PlaceRef::Work).await.unwrap().is_none());

        // Deleting an absent place is a no-op
        places.delete(&PlaceRef::Work).await.unwrap();
    }

    #[tokio::test]
    async fn test_custom_places_keep_creation_order() {
        let places = store();
        let first = Place::custom("Clinic", Coordinate::new(14.50, 120.95));
        let second = Place::custom("Market", Coordinate::new(14.51, 120.96));
        let third = Place::custom("Terminal", Coordinate::new(14.52, 120.97));

        places.save(&first).await.unwrap();
        places.save(&second).await.unwrap();
        places.save(&third).await.unwrap();

        let labels: Vec<String> =
            places.list().await.unwrap().into_iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["Clinic", "Market", "Terminal"]);
    }

    #[tokio::test]
    async fn test_custom_resave_does_not_duplicate_index() {
        let places = store();
        let mut custom = Place::custom("Clinic", Coordinate::new(14.50, 120.95));
        places.save(&custom).await.unwrap();

        custom.coordinate = Coordinate::new(14.55, 120.99);
        places.save(&custom).await.unwrap();

        let all = places.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].coordinate, Coordinate::new(14.55, 120.99));
    }

    #[tokio::test]
    async fn test_delete_custom_removes_from_listing() {
        let places = store();
        let keep = Place::custom("Clinic", Coordinate::new(14.50, 120.95));
        let drop = Place::custom("Market", Coordinate::new(14.51, 120.96));
        places.save(&keep).await.unwrap();
        places.save(&drop).await.unwrap();

        places.delete(&PlaceRef::Custom(drop.id.clone().unwrap())).await.unwrap();

        let labels: Vec<String> =
            places.list().await.unwrap().into_iter().map(|p| p.label).collect();
        assert_eq!(labels, vec!["Clinic"]);
    }

    #[tokio::test]
    async fn test_corrupt_entry_reads_as_absent() {
        let raw = Arc::new(MemoryStore::new());
        raw.set("homeLocation", "{{not json").await.unwrap();
        let places = PlaceStore::new(raw);

        assert!(places.get(&PlaceRef::Home).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_mixes_kinds_in_order() {
        let places = store();
        places.save(&Place::custom("Clinic", Coordinate::new(14.50, 120.95))).await.unwrap();
        places.save(&Place::home(Coordinate::new(14.60, 120.98))).await.unwrap();
        places.save(&Place::work(Coordinate::new(14.55, 121.0))).await.unwrap();

        let kinds: Vec<PlaceKind> =
            places.list().await.unwrap().into_iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![PlaceKind::Home, PlaceKind::Work, PlaceKind::Custom]);
    }
}
