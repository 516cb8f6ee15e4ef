//! OSM XML input: maps raw OSM or Overpass XML onto the element model.
//! Handles plain `<nd ref>` ways, inline `out geom` coordinates on ways
//! and relation members, `out center` summaries and optional metadata
//! attributes. Unknown elements (`note`, `meta`, `count`, `remark`) are
//! skipped.

use crate::osm::{
    ElementKind, LatLon, Meta, OsmDocument, OsmElement, OsmNode, OsmRelation, OsmRelationMember,
    OsmWay, Tags, WaySource,
};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("bad xml attribute: {0}")]
    Attribute(#[from] AttrError),

    #[error("invalid number {value:?} in attribute {attribute:?}")]
    InvalidNumber { attribute: String, value: String },

    #[error("root element is not <osm>")]
    MissingRoot,
}

/// Attributes of one XML element, unescaped and owned.
struct Attrs(Vec<(String, String)>);

impl Attrs {
    fn read(element: &BytesStart) -> Result<Self, XmlError> {
        let mut attrs = Vec::new();
        for attr in element.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            attrs.push((key, value));
        }
        Ok(Attrs(attrs))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn int(&self, key: &str) -> Result<Option<i64>, XmlError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| XmlError::InvalidNumber {
                    attribute: key.to_string(),
                    value: value.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn float(&self, key: &str) -> Result<Option<f64>, XmlError> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| XmlError::InvalidNumber {
                    attribute: key.to_string(),
                    value: value.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn lat_lon(&self) -> Result<Option<LatLon>, XmlError> {
        match (self.float("lat")?, self.float("lon")?) {
            (Some(lat), Some(lon)) => Ok(Some(LatLon { lat, lon })),
            _ => Ok(None),
        }
    }

    fn meta(&self) -> Result<Meta, XmlError> {
        Ok(Meta {
            timestamp: self.get("timestamp").map(str::to_string),
            version: self.int("version")?,
            changeset: self.int("changeset")?,
            user: self.get("user").map(str::to_string),
            uid: self.int("uid")?,
        })
    }
}

/// Parse an OSM XML document into the element model.
pub fn parse(xml: &str) -> Result<OsmDocument, XmlError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut elements = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(el) | Event::Empty(el) if el.name().as_ref() == b"osm" => {
                saw_root = true;
            }
            Event::Start(el) => match el.name().as_ref() {
                b"node" => {
                    if let Some(node) = parse_node(&el, &mut reader, false)? {
                        elements.push(OsmElement::Node(node));
                    }
                }
                b"way" => {
                    if let Some(way) = parse_way(&el, &mut reader, false)? {
                        elements.push(OsmElement::Way(way));
                    }
                }
                b"relation" => {
                    if let Some(relation) = parse_relation(&el, &mut reader, false)? {
                        elements.push(OsmElement::Relation(relation));
                    }
                }
                b"bounds" | b"note" | b"meta" | b"remark" => {
                    let end = el.to_end().into_owned();
                    reader.read_to_end(end.name())?;
                }
                name => {
                    log::warn!(
                        "skipping <{}> element",
                        String::from_utf8_lossy(name).into_owned()
                    );
                    let end = el.to_end().into_owned();
                    reader.read_to_end(end.name())?;
                }
            },
            Event::Empty(el) => match el.name().as_ref() {
                b"node" => {
                    if let Some(node) = parse_node(&el, &mut reader, true)? {
                        elements.push(OsmElement::Node(node));
                    }
                }
                b"way" => {
                    // still usable when it is a bare ref stub
                    if let Some(way) = parse_way(&el, &mut reader, true)? {
                        elements.push(OsmElement::Way(way));
                    }
                }
                b"relation" => {
                    if let Some(relation) = parse_relation(&el, &mut reader, true)? {
                        elements.push(OsmElement::Relation(relation));
                    }
                }
                b"bounds" | b"note" | b"meta" | b"remark" => {}
                name => {
                    log::warn!(
                        "skipping <{}> element",
                        String::from_utf8_lossy(name).into_owned()
                    );
                }
            },
            _ => {}
        }
    }

    if !saw_root {
        return Err(XmlError::MissingRoot);
    }
    Ok(OsmDocument::new(elements))
}

fn parse_node(
    el: &BytesStart,
    reader: &mut Reader<&[u8]>,
    empty: bool,
) -> Result<Option<OsmNode>, XmlError> {
    let attrs = Attrs::read(el)?;
    let mut tags = Tags::new();
    if !empty {
        collect_children(reader, b"node", |child, child_attrs| {
            if child == b"tag" {
                insert_tag(&mut tags, child_attrs);
            }
            Ok(())
        })?;
    }

    let (Some(id), Some(position)) = (attrs.int("id")?, attrs.lat_lon()?) else {
        log::warn!("skipping node without id or coordinates");
        return Ok(None);
    };
    Ok(Some(OsmNode {
        id,
        lat: position.lat,
        lon: position.lon,
        tags,
        meta: attrs.meta()?,
    }))
}

fn parse_way(
    el: &BytesStart,
    reader: &mut Reader<&[u8]>,
    empty: bool,
) -> Result<Option<OsmWay>, XmlError> {
    let attrs = Attrs::read(el)?;
    let mut tags = Tags::new();
    let mut node_ids = Vec::new();
    let mut coords = Vec::new();
    let mut center = None;

    if !empty {
        collect_children(reader, b"way", |child, child_attrs| {
            match child {
                b"nd" => {
                    // `<nd ref>` references a node; `<nd lat lon>` is
                    // inline out-geom geometry
                    if let Some(id) = child_attrs.int("ref")? {
                        node_ids.push(id);
                    } else if let Some(position) = child_attrs.lat_lon()? {
                        coords.push(position);
                    }
                }
                b"tag" => insert_tag(&mut tags, child_attrs),
                b"center" => center = child_attrs.lat_lon()?,
                _ => {}
            }
            Ok(())
        })?;
    }

    let Some(id) = attrs.int("id")? else {
        log::warn!("skipping way without id");
        return Ok(None);
    };
    let source = if !coords.is_empty() {
        WaySource::Geometry(coords)
    } else if !node_ids.is_empty() {
        WaySource::NodeIds(node_ids)
    } else if let Some(target) = attrs.int("ref")? {
        WaySource::Ref(target)
    } else {
        log::warn!("skipping way/{} without nodes, geometry or ref", id);
        return Ok(None);
    };

    Ok(Some(OsmWay {
        id,
        tags,
        source,
        center,
        meta: attrs.meta()?,
    }))
}

fn parse_relation(
    el: &BytesStart,
    reader: &mut Reader<&[u8]>,
    empty: bool,
) -> Result<Option<OsmRelation>, XmlError> {
    let attrs = Attrs::read(el)?;
    let mut tags = Tags::new();
    let mut members = Vec::new();
    let mut center = None;

    if !empty {
        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::End(end) if end.name().as_ref() == b"relation" => break,
                Event::Start(child) => {
                    let child_attrs = Attrs::read(&child)?;
                    if child.name().as_ref() == b"member" {
                        members.extend(parse_member(&child_attrs, reader, false)?);
                    } else {
                        let end = child.to_end().into_owned();
                        reader.read_to_end(end.name())?;
                    }
                }
                Event::Empty(child) => {
                    let child_attrs = Attrs::read(&child)?;
                    match child.name().as_ref() {
                        b"member" => members.extend(parse_member(&child_attrs, reader, true)?),
                        b"tag" => insert_tag(&mut tags, child_attrs),
                        b"center" => center = child_attrs.lat_lon()?,
                        _ => {}
                    }
                }
                _ => {}
            }
        }
    }

    let Some(id) = attrs.int("id")? else {
        log::warn!("skipping relation without id");
        return Ok(None);
    };
    Ok(Some(OsmRelation {
        id,
        members,
        relation_ref: attrs.int("ref")?,
        tags,
        center,
        meta: attrs.meta()?,
    }))
}

fn parse_member(
    attrs: &Attrs,
    reader: &mut Reader<&[u8]>,
    empty: bool,
) -> Result<Option<OsmRelationMember>, XmlError> {
    let mut coords = Vec::new();
    if !empty {
        collect_children(reader, b"member", |child, child_attrs| {
            if child == b"nd" {
                if let Some(position) = child_attrs.lat_lon()? {
                    coords.push(position);
                }
            }
            Ok(())
        })?;
    }

    let member_type = match attrs.get("type") {
        Some("node") => ElementKind::Node,
        Some("way") => ElementKind::Way,
        Some("relation") => ElementKind::Relation,
        other => {
            log::warn!("skipping relation member of type {:?}", other);
            return Ok(None);
        }
    };
    let Some(member_id) = attrs.int("ref")? else {
        log::warn!("skipping relation member without ref");
        return Ok(None);
    };

    Ok(Some(OsmRelationMember {
        member_type,
        member_id,
        role: attrs.get("role").unwrap_or_default().to_string(),
        geometry: if coords.is_empty() { None } else { Some(coords) },
    }))
}

/// Walk the children of `parent` until its end tag, handing each child's
/// name and attributes to `handle`. Children with their own subtrees are
/// consumed whole.
fn collect_children(
    reader: &mut Reader<&[u8]>,
    parent: &[u8],
    mut handle: impl FnMut(&[u8], Attrs) -> Result<(), XmlError>,
) -> Result<(), XmlError> {
    loop {
        match reader.read_event()? {
            Event::Eof => return Ok(()),
            Event::End(end) if end.name().as_ref() == parent => return Ok(()),
            Event::Start(child) => {
                let attrs = Attrs::read(&child)?;
                handle(child.name().as_ref(), attrs)?;
                let end = child.to_end().into_owned();
                reader.read_to_end(end.name())?;
            }
            Event::Empty(child) => {
                let attrs = Attrs::read(&child)?;
                handle(child.name().as_ref(), attrs)?;
            }
            _ => {}
        }
    }
}

fn insert_tag(tags: &mut Tags, attrs: Attrs) {
    if let (Some(k), Some(v)) = (attrs.get("k"), attrs.get("v")) {
        tags.insert(k.to_string(), v.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nodes_ways_and_relations() {
        let doc = parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <osm version="0.6" generator="Overpass API">
              <note>The data included in this document is from www.openstreetmap.org.</note>
              <node id="1" lat="1.0" lon="2.0"/>
              <node id="2" lat="1.5" lon="2.5">
                <tag k="amenity" v="cafe"/>
              </node>
              <way id="10" version="3" user="someone">
                <nd ref="1"/>
                <nd ref="2"/>
                <tag k="highway" v="service"/>
              </way>
              <relation id="20">
                <member type="way" ref="10" role="outer"/>
                <tag k="type" v="multipolygon"/>
              </relation>
            </osm>"#,
        )
        .unwrap();

        assert_eq!(doc.elements.len(), 4);
        let OsmElement::Way(way) = &doc.elements[2] else {
            panic!("expected way");
        };
        assert_eq!(way.source, WaySource::NodeIds(vec![1, 2]));
        assert_eq!(way.meta.version, Some(3));
        assert_eq!(way.meta.user.as_deref(), Some("someone"));
        let OsmElement::Relation(relation) = &doc.elements[3] else {
            panic!("expected relation");
        };
        assert_eq!(relation.members.len(), 1);
        assert_eq!(relation.members[0].role, "outer");
    }

    #[test]
    fn parses_inline_member_geometry() {
        let doc = parse(
            r#"<osm>
              <relation id="5">
                <member type="way" ref="7" role="outer">
                  <nd lat="0.0" lon="0.0"/>
                  <nd lat="0.0" lon="1.0"/>
                </member>
              </relation>
            </osm>"#,
        )
        .unwrap();
        let OsmElement::Relation(relation) = &doc.elements[0] else {
            panic!("expected relation");
        };
        let geometry = relation.members[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.len(), 2);
    }

    #[test]
    fn rejects_non_osm_root() {
        assert!(matches!(
            parse("<html></html>"),
            Err(XmlError::MissingRoot)
        ));
    }
}
