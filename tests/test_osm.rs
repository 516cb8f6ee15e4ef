use osm2geojson::osm::*;
use std::collections::HashMap;

#[test]
fn test_osm_node_creation() {
    let mut tags = HashMap::new();
    tags.insert("name".to_string(), "Test Node".to_string());
    tags.insert("amenity".to_string(), "restaurant".to_string());

    let node = OsmNode {
        id: 12345,
        lat: 40.7128,
        lon: -74.0060,
        tags,
        meta: Meta::default(),
    };

    assert_eq!(node.id, 12345);
    assert_eq!(node.lat, 40.7128);
    assert_eq!(node.lon, -74.0060);
    assert_eq!(node.tags.get("name"), Some(&"Test Node".to_string()));
    assert_eq!(node.tags.get("amenity"), Some(&"restaurant".to_string()));
}

#[test]
fn test_way_closure() {
    let closed_way = OsmWay {
        id: 1,
        tags: HashMap::new(),
        source: WaySource::NodeIds(vec![1, 2, 3, 4, 1]),
        center: None,
        meta: Meta::default(),
    };
    let open_way = OsmWay {
        id: 2,
        tags: HashMap::new(),
        source: WaySource::NodeIds(vec![1, 2, 3, 4]),
        center: None,
        meta: Meta::default(),
    };
    let ref_way = OsmWay {
        id: 3,
        tags: HashMap::new(),
        source: WaySource::Ref(1),
        center: None,
        meta: Meta::default(),
    };

    assert_eq!(closed_way.closure(), Some(true));
    assert_eq!(open_way.closure(), Some(false));
    assert_eq!(ref_way.closure(), None);
    assert_eq!(closed_way.node_ids(), Some(&[1, 2, 3, 4, 1][..]));
    assert_eq!(ref_way.node_ids(), None);
}

#[test]
fn test_element_accessors() {
    let mut tags = HashMap::new();
    tags.insert("type".to_string(), "multipolygon".to_string());

    let relation = OsmElement::Relation(OsmRelation {
        id: 99999,
        members: vec![
            OsmRelationMember {
                member_type: ElementKind::Way,
                member_id: 123,
                role: "outer".to_string(),
                geometry: None,
            },
            OsmRelationMember {
                member_type: ElementKind::Way,
                member_id: 456,
                role: "inner".to_string(),
                geometry: None,
            },
        ],
        relation_ref: None,
        tags,
        center: None,
        meta: Meta::default(),
    });

    assert_eq!(relation.id(), 99999);
    assert_eq!(relation.kind(), ElementKind::Relation);
    assert_eq!(relation.element_id(), ElementId::relation(99999));
    assert!(relation.has_tag("type"));
    assert_eq!(
        relation.get_tag("type"),
        Some(&"multipolygon".to_string())
    );
}

#[test]
fn test_overpass_json_document_parsing() {
    let data = r#"{
        "version": 0.6,
        "generator": "Overpass API",
        "osm3s": {"timestamp_osm_base": "2020-01-01T00:00:00Z"},
        "elements": [
            {"type": "node", "id": 1, "lat": 1.0, "lon": 2.0},
            {"type": "way", "id": 2, "nodes": [1],
             "tags": {"highway": "service"}},
            {"type": "relation", "id": 3, "members": [
                {"type": "way", "ref": 2, "role": "outer"}
             ], "tags": {"type": "multipolygon"}},
            {"type": "count", "id": 0}
        ]
    }"#;

    let document = OsmDocument::from_json(data).unwrap();
    assert_eq!(document.elements.len(), 3, "count element is skipped");
    assert_eq!(document.elements[0].kind(), ElementKind::Node);
    assert_eq!(document.elements[1].kind(), ElementKind::Way);
    assert_eq!(document.elements[2].kind(), ElementKind::Relation);
}

#[test]
fn test_way_meta_attributes_deserialize() {
    let way: OsmWay = serde_json::from_value(serde_json::json!({
        "id": 7,
        "nodes": [1, 2],
        "timestamp": "2017-04-13T13:24:30Z",
        "version": 3,
        "changeset": 47908603,
        "user": "someone",
        "uid": 12345
    }))
    .unwrap();
    assert_eq!(way.meta.timestamp.as_deref(), Some("2017-04-13T13:24:30Z"));
    assert_eq!(way.meta.version, Some(3));
    assert_eq!(way.meta.changeset, Some(47908603));
    assert_eq!(way.meta.user.as_deref(), Some("someone"));
    assert_eq!(way.meta.uid, Some(12345));
}
