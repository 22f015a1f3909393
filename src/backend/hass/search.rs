//! Free-text entity ranking: queries are normalized, tokenized and run
//! through a small Norwegian→English synonym table so that "slå på lyset
//! i stua" style requests resolve against English entity ids and area
//! names.

use std::collections::BTreeSet;

use crate::model::EnhancedEntityState;

const MAX_RESULTS: usize = 15;

/// Exact-token synonym expansions. Raw query terms are always kept; the
/// expansions are added on top.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("stua", &["living room", "living"]),
    ("kjøkken", &["kitchen"]),
    ("soverom", &["bedroom"]),
    ("bad", &["bathroom"]),
    ("gang", &["hallway", "entrance"]),
    ("lys", &["light", "switch", "dimmer"]),
    ("varme", &["climate", "thermostat", "temperature"]),
    ("gardiner", &["cover", "blind"]),
];

const SCORE_ID_EXACT: i64 = 200;
const SCORE_NAME_EXACT: i64 = 150;
const SCORE_AREA_EXACT: i64 = 80;
const SCORE_AREA_CONTAINS: i64 = 40;
const SCORE_ID_CONTAINS: i64 = 50;
const SCORE_NAME_CONTAINS: i64 = 50;
const SCORE_DOMAIN_PREFIX: i64 = 20;

/// Lowercase, underscores to spaces, trimmed. Applied to queries and to
/// every entity field that takes part in matching, so `living_room` and
/// "Living Room" compare equal.
#[must_use]
pub fn normalize(value: &str) -> String {
    value.to_lowercase().replace('_', " ").trim().to_string()
}

fn expand_terms(query: &str) -> BTreeSet<String> {
    let mut terms = BTreeSet::new();
    for raw in query.split_whitespace() {
        for (key, expansions) in SYNONYMS {
            if raw == *key {
                terms.extend(expansions.iter().map(ToString::to_string));
            }
        }
        terms.insert(raw.to_string());
    }
    terms
}

fn score_entity(entity: &EnhancedEntityState, query: &str, terms: &BTreeSet<String>) -> i64 {
    let id_norm = normalize(&entity.entity_id);
    let name_lower = entity.friendly_name.to_lowercase();
    let area_id_norm = entity.area_id.as_deref().map(normalize);
    let area_norm = entity.area.as_deref().map(normalize);

    let mut score = 0;

    if id_norm == query {
        score += SCORE_ID_EXACT;
    }
    if name_lower == query {
        score += SCORE_NAME_EXACT;
    }

    for term in terms {
        let area_exact = area_id_norm.as_deref() == Some(term.as_str())
            || area_norm.as_deref() == Some(term.as_str());
        let area_contains = area_id_norm.as_deref().is_some_and(|a| a.contains(term))
            || area_norm.as_deref().is_some_and(|a| a.contains(term));
        if area_exact {
            score += SCORE_AREA_EXACT;
        } else if area_contains {
            score += SCORE_AREA_CONTAINS;
        }

        if id_norm.contains(term) {
            score += SCORE_ID_CONTAINS;
        }
        if name_lower.contains(term) {
            score += SCORE_NAME_CONTAINS;
        }
        // Domain-type boost: a term like "light" lifts every light.* id.
        if entity.entity_id.starts_with(term) {
            score += SCORE_DOMAIN_PREFIX;
        }
    }

    score
}

/// Rank `entities` against a free-text query. Returns at most 15 results,
/// best first; ties break on entity id so identical input always produces
/// identical output.
#[must_use]
pub fn rank<'a, I>(entities: I, query: &str) -> Vec<EnhancedEntityState>
where
    I: IntoIterator<Item = &'a EnhancedEntityState>,
{
    let query = normalize(query);
    if query.is_empty() {
        return Vec::new();
    }
    let terms = expand_terms(&query);

    let mut scored: Vec<(i64, &EnhancedEntityState)> = entities
        .into_iter()
        .filter_map(|entity| {
            let score = score_entity(entity, &query, &terms);
            (score > 0).then_some((score, entity))
        })
        .collect();

    scored.sort_by(|(sa, ea), (sb, eb)| sb.cmp(sa).then_with(|| ea.entity_id.cmp(&eb.entity_id)));

    scored
        .into_iter()
        .take(MAX_RESULTS)
        .map(|(_, entity)| entity.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn entity(id: &str, name: &str, area_id: Option<&str>, area: Option<&str>) -> EnhancedEntityState {
        EnhancedEntityState {
            entity_id: id.to_string(),
            friendly_name: name.to_string(),
            area_id: area_id.map(ToString::to_string),
            area: area.map(ToString::to_string),
            floor: None,
            state: "on".to_string(),
            attributes: Map::new(),
        }
    }

    #[test]
    fn empty_query_yields_nothing() {
        let pool = vec![entity("light.kitchen", "Kitchen Light", None, None)];
        assert!(rank(&pool, "").is_empty());
        assert!(rank(&pool, "   ").is_empty());
    }

    #[test]
    fn synonym_expansion_matches_area() {
        let pool = vec![
            entity(
                "light.living_room_ceiling",
                "Living Ceiling",
                Some("living_room"),
                Some("Living Room"),
            ),
            entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
        ];

        let results = rank(&pool, "stua");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "light.living_room_ceiling");
    }

    #[test]
    fn area_and_domain_boost_outranks_domain_alone() {
        let pool = vec![
            entity(
                "light.living_room_ceiling",
                "Living Ceiling",
                Some("living_room"),
                Some("Living Room"),
            ),
            entity("light.kitchen", "Kitchen Light", Some("kitchen"), Some("Kitchen")),
        ];

        let results = rank(&pool, "stua lys");
        assert!(results.len() >= 2);
        assert_eq!(results[0].entity_id, "light.living_room_ceiling");
    }

    #[test]
    fn exact_id_match_scores_highest() {
        let pool = vec![
            entity("light.desk", "Desk", None, None),
            entity("light.desk_lamp", "Desk Lamp", None, None),
        ];

        let results = rank(&pool, "light.desk");
        assert_eq!(results[0].entity_id, "light.desk");
    }

    #[test]
    fn results_cap_at_fifteen_in_descending_order() {
        let pool: Vec<EnhancedEntityState> = (0..20)
            .map(|i| entity(&format!("light.lamp_{i:02}"), &format!("Lamp {i}"), None, None))
            .collect();

        let results = rank(&pool, "lamp");
        assert_eq!(results.len(), 15);
    }

    #[test]
    fn ranking_is_deterministic_for_equal_scores() {
        let pool = vec![
            entity("light.b_lamp", "Lamp", None, None),
            entity("light.a_lamp", "Lamp", None, None),
        ];

        let first = rank(&pool, "lamp");
        let second = rank(&pool, "lamp");
        let ids: Vec<&str> = first.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["light.a_lamp", "light.b_lamp"]);
        assert_eq!(
            ids,
            second.iter().map(|e| e.entity_id.as_str()).collect::<Vec<_>>()
        );
    }
}
