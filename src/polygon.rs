//! Polygon-vs-line classification.
//!
//! Whether a tagged element denotes an area is decided by an ordered rule
//! table (the osm-polygon-features format) with a per-tag exception table
//! (the iD editor's areaKeys format) layered on top. Both tables are plain
//! data, defaulted from files embedded at build time and overridable per
//! call.

use crate::osm::Tags;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const DEFAULT_POLYGON_FEATURES: &str = include_str!("../data/polygon-features.json");
const DEFAULT_AREA_KEYS: &str = include_str!("../data/area-keys.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleMode {
    All,
    Whitelist,
    Blacklist,
}

/// One entry of the rule table: `{key, polygon, values}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolygonRule {
    pub key: String,
    #[serde(rename = "polygon")]
    pub mode: RuleMode,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Exception table: tag key -> value -> "is really a line". Ordered maps
/// so the first-matching-tag lookup is deterministic.
pub type AreaKeys = BTreeMap<String, BTreeMap<String, bool>>;

static POLYGON_FEATURES: LazyLock<Vec<PolygonRule>> = LazyLock::new(|| {
    serde_json::from_str(DEFAULT_POLYGON_FEATURES).expect("embedded polygon-features.json")
});

static AREA_KEYS: LazyLock<AreaKeys> =
    LazyLock::new(|| parse_area_keys(DEFAULT_AREA_KEYS).expect("embedded area-keys.json"));

pub fn default_polygon_features() -> &'static [PolygonRule] {
    &POLYGON_FEATURES
}

pub fn default_area_keys() -> &'static AreaKeys {
    &AREA_KEYS
}

pub fn parse_polygon_features(data: &str) -> Result<Vec<PolygonRule>, serde_json::Error> {
    serde_json::from_str(data)
}

/// Accepts both the bare table and the `{"areaKeys": {...}}` wrapper the
/// iD project ships.
pub fn parse_area_keys(data: &str) -> Result<AreaKeys, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MaybeWrapped {
        Wrapped {
            #[serde(rename = "areaKeys")]
            area_keys: AreaKeys,
        },
        Bare(AreaKeys),
    }

    match serde_json::from_str(data)? {
        MaybeWrapped::Wrapped { area_keys } => Ok(area_keys),
        MaybeWrapped::Bare(keys) => Ok(keys),
    }
}

/// Decide whether an element with `tags` denotes an area.
///
/// `closure` reports whether the element's own coordinate list is closed:
/// `Some(false)` for an open ring (which can never be a polygon, whatever
/// the tags say), `None` when the element carries no coordinate list of
/// its own (nodes, relations, ref stubs).
pub fn is_area(
    tags: &Tags,
    closure: Option<bool>,
    rules: &[PolygonRule],
    area_keys: &AreaKeys,
) -> bool {
    if tags.is_empty() {
        return false;
    }

    match tags.get("area").map(String::as_str) {
        Some("no") => return false,
        Some("yes") => return true,
        _ => {}
    }

    if tags.get("type").is_some_and(|value| value == "multipolygon") {
        return true;
    }

    if closure == Some(false) {
        return false;
    }

    matches_polygon_rules(tags, rules) && !is_area_exception(tags, area_keys)
}

/// Rule-table evaluation. The first key (in table order) present in the
/// tags governs; only that key's entries are consulted, so a blacklist
/// entry never asserts "polygon" for a value another whitelist entry of
/// the same key was supposed to govern.
pub fn matches_polygon_rules(tags: &Tags, rules: &[PolygonRule]) -> bool {
    let Some(key) = rules
        .iter()
        .map(|rule| rule.key.as_str())
        .find(|key| tags.contains_key(*key))
    else {
        return false;
    };
    let Some(value) = tags.get(key) else {
        return false;
    };

    let mut has_whitelist = false;
    let mut has_blacklist = false;
    for rule in rules.iter().filter(|rule| rule.key == key) {
        match rule.mode {
            RuleMode::All => return true,
            RuleMode::Whitelist => {
                if rule.values.contains(value) {
                    return true;
                }
                has_whitelist = true;
            }
            RuleMode::Blacklist => {
                if rule.values.contains(value) {
                    return false;
                }
                has_blacklist = true;
            }
        }
    }

    // Absence from a blacklist is itself a polygon signal, but only when
    // no whitelist claimed the key.
    has_blacklist && !has_whitelist
}

/// Exception lookup: the first tag present in the table decides, and an
/// explicit `true` there demotes the element back to a line.
fn is_area_exception(tags: &Tags, area_keys: &AreaKeys) -> bool {
    for (key, values) in area_keys {
        if let Some(value) = tags.get(key) {
            return values.get(value).copied().unwrap_or(false);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_tables_parse() {
        assert!(!default_polygon_features().is_empty());
        assert!(!default_area_keys().is_empty());
    }

    #[test]
    fn blacklist_does_not_leak_across_modes_of_same_key() {
        // highway has a whitelist rule; add a blacklist for the same key.
        // A value outside both lists must stay a line: the whitelist
        // governs it, not the blacklist fallthrough.
        let rules = vec![
            PolygonRule {
                key: "highway".to_string(),
                mode: RuleMode::Whitelist,
                values: vec!["services".to_string()],
            },
            PolygonRule {
                key: "highway".to_string(),
                mode: RuleMode::Blacklist,
                values: vec!["steps".to_string()],
            },
        ];
        assert!(!matches_polygon_rules(
            &tags(&[("highway", "residential")]),
            &rules
        ));
        assert!(matches_polygon_rules(
            &tags(&[("highway", "services")]),
            &rules
        ));
        assert!(!matches_polygon_rules(&tags(&[("highway", "steps")]), &rules));
    }

    #[test]
    fn lone_blacklist_still_signals_polygon() {
        let rules = vec![PolygonRule {
            key: "natural".to_string(),
            mode: RuleMode::Blacklist,
            values: vec!["coastline".to_string()],
        }];
        assert!(matches_polygon_rules(&tags(&[("natural", "water")]), &rules));
        assert!(!matches_polygon_rules(
            &tags(&[("natural", "coastline")]),
            &rules
        ));
    }
}
