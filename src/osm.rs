use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type Tags = HashMap<String, String>;

/// A coordinate pair as Overpass emits it (`{"lat": .., "lon": ..}`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// Optional metadata attributes carried by any element (`out meta` form).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(type, id)` identity every element is addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId {
    pub kind: ElementKind,
    pub id: i64,
}

impl ElementId {
    pub fn new(kind: ElementKind, id: i64) -> Self {
        ElementId { kind, id }
    }

    pub fn node(id: i64) -> Self {
        Self::new(ElementKind::Node, id)
    }

    pub fn way(id: i64) -> Self {
        Self::new(ElementKind::Way, id)
    }

    pub fn relation(id: i64) -> Self {
        Self::new(ElementKind::Relation, id)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: Tags,
    #[serde(flatten)]
    pub meta: Meta,
}

/// The single coordinate source of a way. Overpass `out geom` emits both
/// `nodes` and `geometry`; inline geometry wins because it needs no lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum WaySource {
    NodeIds(Vec<i64>),
    Geometry(Vec<LatLon>),
    Ref(i64),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawWay")]
pub struct OsmWay {
    pub id: i64,
    pub tags: Tags,
    pub source: WaySource,
    pub center: Option<LatLon>,
    pub meta: Meta,
}

impl OsmWay {
    /// Node-id list, when that is the coordinate source. Forwarded into
    /// feature properties like the other element attributes.
    pub fn node_ids(&self) -> Option<&[i64]> {
        match &self.source {
            WaySource::NodeIds(ids) => Some(ids),
            _ => None,
        }
    }

    /// Whether first and last coordinate coincide. `None` when the way is
    /// a `ref` indirection and carries no coordinates of its own.
    pub fn closure(&self) -> Option<bool> {
        match &self.source {
            WaySource::NodeIds(ids) => Some(!ids.is_empty() && ids.first() == ids.last()),
            WaySource::Geometry(coords) => {
                Some(!coords.is_empty() && coords.first() == coords.last())
            }
            WaySource::Ref(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RawWay {
    id: Option<i64>,
    #[serde(default)]
    tags: Tags,
    nodes: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "sparse_coords")]
    geometry: Option<Vec<LatLon>>,
    #[serde(rename = "ref")]
    way_ref: Option<i64>,
    center: Option<LatLon>,
    #[serde(flatten)]
    meta: Meta,
}

impl TryFrom<RawWay> for OsmWay {
    type Error = String;

    fn try_from(raw: RawWay) -> Result<Self, Self::Error> {
        let id = raw.id.ok_or("way without id")?;
        let source = match (raw.geometry, raw.nodes, raw.way_ref) {
            (Some(coords), _, _) if !coords.is_empty() => WaySource::Geometry(coords),
            (_, Some(nodes), _) if !nodes.is_empty() => WaySource::NodeIds(nodes),
            (_, _, Some(target)) => WaySource::Ref(target),
            _ => return Err(format!("way/{} has no nodes, geometry or ref", id)),
        };
        Ok(OsmWay {
            id,
            tags: raw.tags,
            source,
            center: raw.center,
            meta: raw.meta,
        })
    }
}

/// Overpass fills clipped-away positions with `null`; drop them.
fn sparse_coords<'de, D>(deserializer: D) -> Result<Option<Vec<LatLon>>, D::Error>
where
    D: Deserializer<'de>,
{
    let coords: Option<Vec<Option<LatLon>>> = Option::deserialize(deserializer)?;
    Ok(coords.map(|c| c.into_iter().flatten().collect()))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmRelationMember {
    #[serde(rename = "type")]
    pub member_type: ElementKind,
    #[serde(rename = "ref")]
    pub member_id: i64,
    #[serde(default)]
    pub role: String,
    /// Inline member geometry from `out geom` responses.
    #[serde(default, deserialize_with = "sparse_coords")]
    pub geometry: Option<Vec<LatLon>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OsmRelation {
    pub id: i64,
    #[serde(default)]
    pub members: Vec<OsmRelationMember>,
    /// Indirection to another relation whose members stand in for ours.
    #[serde(rename = "ref")]
    pub relation_ref: Option<i64>,
    #[serde(default)]
    pub tags: Tags,
    pub center: Option<LatLon>,
    #[serde(flatten)]
    pub meta: Meta,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OsmElement {
    Node(OsmNode),
    Way(OsmWay),
    Relation(OsmRelation),
}

impl OsmElement {
    pub fn id(&self) -> i64 {
        match self {
            OsmElement::Node(node) => node.id,
            OsmElement::Way(way) => way.id,
            OsmElement::Relation(relation) => relation.id,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            OsmElement::Node(_) => ElementKind::Node,
            OsmElement::Way(_) => ElementKind::Way,
            OsmElement::Relation(_) => ElementKind::Relation,
        }
    }

    pub fn element_id(&self) -> ElementId {
        ElementId::new(self.kind(), self.id())
    }

    pub fn tags(&self) -> &Tags {
        match self {
            OsmElement::Node(node) => &node.tags,
            OsmElement::Way(way) => &way.tags,
            OsmElement::Relation(relation) => &relation.tags,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            OsmElement::Node(node) => &node.meta,
            OsmElement::Way(way) => &way.meta,
            OsmElement::Relation(relation) => &relation.meta,
        }
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags().contains_key(key)
    }

    pub fn get_tag(&self, key: &str) -> Option<&String> {
        self.tags().get(key)
    }
}

/// One input document: the element graph a conversion runs over.
#[derive(Debug, Clone, Default)]
pub struct OsmDocument {
    pub elements: Vec<OsmElement>,
}

impl OsmDocument {
    pub fn new(elements: Vec<OsmElement>) -> Self {
        OsmDocument { elements }
    }

    /// Parse an Overpass JSON document. Elements of unknown type (`count`
    /// output, remarks) and malformed entries are skipped with a warning.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        struct RawDocument {
            #[serde(default)]
            elements: Vec<serde_json::Value>,
        }

        let raw: RawDocument = serde_json::from_str(data)?;
        let mut elements = Vec::with_capacity(raw.elements.len());
        for value in raw.elements {
            match serde_json::from_value::<OsmElement>(value.clone()) {
                Ok(element) => elements.push(element),
                Err(err) => {
                    let kind = value
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or("unknown");
                    log::warn!("skipping {} element: {}", kind, err);
                }
            }
        }
        Ok(OsmDocument { elements })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn way_prefers_inline_geometry_over_node_ids() {
        let way: OsmWay = serde_json::from_value(serde_json::json!({
            "id": 7,
            "nodes": [1, 2, 3],
            "geometry": [
                {"lat": 1.0, "lon": 2.0},
                null,
                {"lat": 3.0, "lon": 4.0}
            ]
        }))
        .unwrap();
        assert_eq!(
            way.source,
            WaySource::Geometry(vec![
                LatLon { lat: 1.0, lon: 2.0 },
                LatLon { lat: 3.0, lon: 4.0 },
            ])
        );
    }

    #[test]
    fn way_without_coordinate_source_is_rejected() {
        let way: Result<OsmWay, _> =
            serde_json::from_value(serde_json::json!({"id": 7, "tags": {"building": "yes"}}));
        assert!(way.is_err());
    }

    #[test]
    fn element_id_formats_as_type_slash_id() {
        assert_eq!(ElementId::way(42).to_string(), "way/42");
        assert_eq!(ElementId::node(1).to_string(), "node/1");
    }
}
