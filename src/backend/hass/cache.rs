use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::backend::hass::client::HubApi;
use crate::backend::hass::search;
use crate::error::ApiResult;
use crate::model::EnhancedEntityState;

/// Single-writer/multi-reader snapshot cell. Readers take a cheap clone of
/// the current `Arc`; the writer publishes a whole new snapshot with one
/// reference swap. A published snapshot is never mutated.
struct SnapshotCell<T>(RwLock<Arc<T>>);

impl<T> SnapshotCell<T> {
    fn new(value: T) -> Self {
        Self(RwLock::new(Arc::new(value)))
    }

    fn load(&self) -> Arc<T> {
        match self.0.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, value: T) {
        let value = Arc::new(value);
        match self.0.write() {
            Ok(mut guard) => *guard = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
    }
}

/// In-memory snapshot of every hub entity and area, refreshed by the
/// background poller. All consumers (dashboard, chat tools, MCP) read from
/// here; only service calls go to the hub directly.
pub struct EntityCache {
    hub: Arc<dyn HubApi>,
    entities: SnapshotCell<HashMap<String, EnhancedEntityState>>,
    areas: SnapshotCell<Vec<String>>,
}

impl EntityCache {
    #[must_use]
    pub fn new(hub: Arc<dyn HubApi>) -> Self {
        Self {
            hub,
            entities: SnapshotCell::new(HashMap::new()),
            areas: SnapshotCell::new(Vec::new()),
        }
    }

    /// Best-effort refresh: gateway failures are logged and swallowed, and
    /// the previous snapshots stay published untouched.
    pub async fn refresh(&self) {
        if let Err(err) = self.try_refresh().await {
            log::error!("Failed to refresh Home Assistant cache: {err}");
        }
    }

    async fn try_refresh(&self) -> ApiResult<()> {
        // Areas are replaced with whatever came back, even an empty list.
        let areas = self.hub.fetch_areas().await?;
        self.areas.store(areas);

        // An empty entity batch never evicts a populated snapshot; the hub
        // degrades to empty responses on read errors.
        let entities = self.hub.fetch_enhanced_entities(None, None).await?;
        if !entities.is_empty() {
            let map: HashMap<String, EnhancedEntityState> = entities
                .into_iter()
                .map(|e| (e.entity_id.clone(), e))
                .collect();
            log::debug!("Entity cache refreshed with {} entities", map.len());
            self.entities.store(map);
        }

        Ok(())
    }

    #[must_use]
    pub fn areas(&self) -> Vec<String> {
        self.areas.load().as_ref().clone()
    }

    #[must_use]
    pub fn all(&self) -> Vec<EnhancedEntityState> {
        self.entities.load().values().cloned().collect()
    }

    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<EnhancedEntityState> {
        self.entities.load().get(entity_id).cloned()
    }

    /// Filter the snapshot by domain prefix and/or area. The area query
    /// matches either the resolved area name or the raw area id, with both
    /// sides normalized (lowercase, underscores as spaces). An entity with
    /// no area never matches an area filter.
    #[must_use]
    pub fn filter(&self, domain: Option<&str>, area: Option<&str>) -> Vec<EnhancedEntityState> {
        let snapshot = self.entities.load();
        let area_query = area.map(search::normalize);

        let mut matches: Vec<EnhancedEntityState> = snapshot
            .values()
            .filter(|entity| {
                let domain_ok = domain
                    .is_none_or(|d| entity.entity_id.starts_with(&format!("{d}.")));

                let area_ok = area_query.as_deref().is_none_or(|query| {
                    let name_match = entity
                        .area
                        .as_deref()
                        .is_some_and(|a| search::normalize(a) == query);
                    let id_match = entity
                        .area_id
                        .as_deref()
                        .is_some_and(|a| search::normalize(a) == query);
                    name_match || id_match
                });

                domain_ok && area_ok
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        matches
    }

    /// Ranked free-text search over the current snapshot.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<EnhancedEntityState> {
        let snapshot = self.entities.load();
        search::rank(snapshot.values(), query)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Map;

    use super::*;
    use crate::error::ApiError;
    use crate::model::EntityState;

    /// Scripted hub fake: a queue of refresh outcomes.
    struct FakeHub {
        batches: Mutex<Vec<ApiResult<Vec<EnhancedEntityState>>>>,
        areas: Vec<String>,
    }

    impl FakeHub {
        fn new(batches: Vec<ApiResult<Vec<EnhancedEntityState>>>, areas: Vec<&str>) -> Self {
            Self {
                batches: Mutex::new(batches),
                areas: areas.into_iter().map(ToString::to_string).collect(),
            }
        }
    }

    #[async_trait]
    impl HubApi for FakeHub {
        async fn fetch_all_states(&self) -> ApiResult<Vec<EntityState>> {
            Ok(Vec::new())
        }

        async fn fetch_areas(&self) -> ApiResult<Vec<String>> {
            Ok(self.areas.clone())
        }

        async fn fetch_enhanced_entities(
            &self,
            _domain: Option<&str>,
            _area: Option<&str>,
        ) -> ApiResult<Vec<EnhancedEntityState>> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                return Ok(Vec::new());
            }
            batches.remove(0)
        }

        async fn invoke_service(
            &self,
            _domain: &str,
            _service: &str,
            _entity_id: &str,
            _payload: Map<String, serde_json::Value>,
        ) -> ApiResult<()> {
            Ok(())
        }
    }

    fn entity(id: &str, name: &str, area_id: Option<&str>, area: Option<&str>) -> EnhancedEntityState {
        EnhancedEntityState {
            entity_id: id.to_string(),
            friendly_name: name.to_string(),
            area_id: area_id.map(ToString::to_string),
            area: area.map(ToString::to_string),
            floor: Some("First Floor".to_string()),
            state: "on".to_string(),
            attributes: Map::new(),
        }
    }

    fn cache_with(batches: Vec<ApiResult<Vec<EnhancedEntityState>>>, areas: Vec<&str>) -> EntityCache {
        EntityCache::new(Arc::new(FakeHub::new(batches, areas)))
    }

    #[tokio::test]
    async fn refresh_populates_entities_and_areas() {
        let cache = cache_with(
            vec![Ok(vec![
                entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
                entity("switch.living", "Living Switch", Some("living_room"), Some("Living Room")),
            ])],
            vec!["Kitchen", "Living Room"],
        );

        cache.refresh().await;

        assert_eq!(cache.all().len(), 2);
        assert_eq!(cache.areas(), vec!["Kitchen", "Living Room"]);
        assert_eq!(
            cache.get("light.kitchen").map(|e| e.friendly_name),
            Some("Kitchen Light".to_string())
        );
        assert!(cache.get("light.nope").is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let cache = cache_with(
            vec![
                Ok(vec![entity(
                    "light.kitchen",
                    "Kitchen Light",
                    Some("kitchen"),
                    Some("Kitchen"),
                )]),
                Err(ApiError::service_error("Connection failed")),
            ],
            vec!["Kitchen"],
        );

        cache.refresh().await;
        assert_eq!(cache.all().len(), 1);

        cache.refresh().await;

        assert_eq!(cache.all().len(), 1);
        assert_eq!(
            cache.get("light.kitchen").map(|e| e.entity_id),
            Some("light.kitchen".to_string())
        );
    }

    #[tokio::test]
    async fn empty_entity_batch_does_not_clear_cache() {
        let cache = cache_with(
            vec![
                Ok(vec![entity(
                    "light.kitchen",
                    "Kitchen Light",
                    Some("kitchen"),
                    Some("Kitchen"),
                )]),
                Ok(Vec::new()),
            ],
            vec!["Kitchen"],
        );

        cache.refresh().await;
        cache.refresh().await;

        assert_eq!(cache.all().len(), 1);
    }

    #[tokio::test]
    async fn filter_by_domain() {
        let cache = cache_with(
            vec![Ok(vec![
                entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
                entity("switch.kitchen", "Kitchen Switch", Some("kitchen"), Some("Kitchen")),
            ])],
            vec![],
        );
        cache.refresh().await;

        let lights = cache.filter(Some("light"), None);
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].entity_id, "light.kitchen");

        assert!(cache.filter(Some("cover"), None).is_empty());
    }

    #[tokio::test]
    async fn filter_by_area_name_and_id() {
        let cache = cache_with(
            vec![Ok(vec![
                entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
                entity("light.living", "Living Light", Some("living_room"), Some("Living Room")),
            ])],
            vec![],
        );
        cache.refresh().await;

        let by_name = cache.filter(None, Some("Kitchen"));
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].entity_id, "light.kitchen");

        let by_id = cache.filter(None, Some("living_room"));
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].entity_id, "light.living");
    }

    #[tokio::test]
    async fn area_filter_normalizes_spaces_and_underscores() {
        let cache = cache_with(
            vec![Ok(vec![entity(
                "light.living",
                "Living Light",
                Some("living_room"),
                Some("Living Room"),
            )])],
            vec![],
        );
        cache.refresh().await;

        let spaced = cache.filter(None, Some("living room"));
        let underscored = cache.filter(None, Some("living_room"));
        assert_eq!(spaced.len(), 1);
        let spaced_ids: Vec<&str> = spaced.iter().map(|e| e.entity_id.as_str()).collect();
        let underscored_ids: Vec<&str> =
            underscored.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(spaced_ids, underscored_ids);
    }

    #[tokio::test]
    async fn entity_without_area_never_matches_area_filter() {
        let cache = cache_with(
            vec![Ok(vec![entity("light.orphan", "Orphan", None, None)])],
            vec![],
        );
        cache.refresh().await;

        assert!(cache.filter(None, Some("kitchen")).is_empty());
        assert_eq!(cache.filter(None, None).len(), 1);
    }

    #[tokio::test]
    async fn search_runs_over_snapshot() {
        let cache = cache_with(
            vec![Ok(vec![
                entity(
                    "light.living_room_ceiling",
                    "Living Ceiling",
                    Some("living_room"),
                    Some("Living Room"),
                ),
                entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
            ])],
            vec![],
        );
        cache.refresh().await;

        let results = cache.search("stua");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "light.living_room_ceiling");

        assert!(cache.search("").is_empty());
    }
}
