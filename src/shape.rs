use crate::osm::{ElementKind, Meta, OsmNode, OsmRelation, OsmWay, Tags};
use geo::Geometry;
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use std::collections::HashMap;

/// The properties record attached to every output feature: identity, tags
/// and whichever optional source attributes were present on the element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Properties {
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub id: i64,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub tags: Tags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl Properties {
    fn new(kind: ElementKind, id: i64, tags: &Tags, nodes: Option<Vec<i64>>, meta: &Meta) -> Self {
        Properties {
            kind,
            id,
            tags: tags.clone(),
            nodes,
            timestamp: meta.timestamp.clone(),
            user: meta.user.clone(),
            uid: meta.uid,
            version: meta.version,
        }
    }

    pub fn from_node(node: &OsmNode) -> Self {
        Self::new(ElementKind::Node, node.id, &node.tags, None, &node.meta)
    }

    pub fn from_way(way: &OsmWay) -> Self {
        Self::new(
            ElementKind::Way,
            way.id,
            &way.tags,
            way.node_ids().map(<[i64]>::to_vec),
            &way.meta,
        )
    }

    pub fn from_relation(relation: &OsmRelation) -> Self {
        Self::new(
            ElementKind::Relation,
            relation.id,
            &relation.tags,
            None,
            &relation.meta,
        )
    }
}

/// One converted element: planar geometry plus its properties record.
/// Built once per element and not touched again after winding
/// normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl Shape {
    pub fn new(geometry: Geometry<f64>, properties: Properties) -> Self {
        Shape {
            geometry,
            properties,
        }
    }

    /// Render as a GeoJSON feature. The geojson crate emits coordinates as
    /// plain `[lon, lat]` number arrays.
    pub fn to_feature(&self) -> Feature {
        let properties = match serde_json::to_value(&self.properties) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &self.geometry,
            ))),
            id: None,
            properties,
            foreign_members: None,
        }
    }
}

pub fn to_feature_collection(shapes: &[Shape]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: shapes.iter().map(Shape::to_feature).collect(),
        foreign_members: None,
    }
}
