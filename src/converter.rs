//! The conversion engine: walks an element graph top to bottom, builds a
//! shape per element and filters out references consumed along the way.

use crate::diagnostics::{Diagnostic, Severity};
use crate::error::{ConvertError, Error};
use crate::geometry;
use crate::index::{RefIndex, UsageMap};
use crate::osm::{
    ElementId, ElementKind, LatLon, OsmDocument, OsmElement, OsmNode, OsmRelation,
    OsmRelationMember, OsmWay, WaySource,
};
use crate::polygon::{self, AreaKeys, PolygonRule};
use crate::shape::{Properties, Shape, to_feature_collection};
use crate::xml;
use geo::{BooleanOps, Coord, Geometry, LineString, MultiLineString, Point, Polygon, Validation};
use geojson::FeatureCollection;
use std::collections::HashSet;

/// Immutable configuration of one conversion, constructed by the caller
/// and threaded through every recursive call via the run.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Keep shapes that were consumed as members of another element
    /// instead of filtering them from the top-level output.
    pub keep_used: bool,
    /// Abort on the first per-element failure instead of skipping the
    /// element and continuing with a diagnostic.
    pub strict: bool,
    /// Override for the built-in polygon rule table.
    pub polygon_features: Option<Vec<PolygonRule>>,
    /// Override for the built-in area exception table.
    pub area_keys: Option<AreaKeys>,
}

/// Result of one conversion run: the shapes that survived plus every
/// diagnostic the run emitted.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub shapes: Vec<Shape>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Conversion {
    pub fn to_feature_collection(&self) -> FeatureCollection {
        to_feature_collection(&self.shapes)
    }
}

/// Convert an Overpass JSON document to GeoJSON.
pub fn json_to_geojson(data: &str, options: &ConvertOptions) -> Result<FeatureCollection, Error> {
    Ok(json_to_shapes(data, options)?.to_feature_collection())
}

/// Convert an Overpass JSON document to the intermediate shape form.
pub fn json_to_shapes(data: &str, options: &ConvertOptions) -> Result<Conversion, Error> {
    let document = OsmDocument::from_json(data)?;
    document_to_shapes(&document, options).map_err(Error::from)
}

/// Convert an OSM XML document to GeoJSON.
pub fn xml_to_geojson(data: &str, options: &ConvertOptions) -> Result<FeatureCollection, Error> {
    Ok(xml_to_shapes(data, options)?.to_feature_collection())
}

/// Convert an OSM XML document to the intermediate shape form.
pub fn xml_to_shapes(data: &str, options: &ConvertOptions) -> Result<Conversion, Error> {
    let document = xml::parse(data)?;
    document_to_shapes(&document, options).map_err(Error::from)
}

/// Convert an already-parsed element graph. This is the whole core: one
/// pass over the elements, shape per element, then the used-reference
/// filter.
pub fn document_to_shapes(
    document: &OsmDocument,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    let rules = options
        .polygon_features
        .as_deref()
        .unwrap_or_else(|| polygon::default_polygon_features());
    let area_keys = options
        .area_keys
        .as_ref()
        .unwrap_or_else(|| polygon::default_area_keys());

    let mut run = ConversionRun {
        index: RefIndex::build(&document.elements),
        usage: UsageMap::new(),
        rules,
        area_keys,
        strict: options.strict,
        diagnostics: Vec::new(),
        in_progress: HashSet::new(),
    };

    let mut shapes = Vec::new();
    for element in &document.elements {
        match run.element_to_shape(element) {
            Ok(shape) => shapes.push(shape),
            Err(err) => run.report(err)?,
        }
    }

    let shapes = filter_used(shapes, &run.usage, options.keep_used);
    Ok(Conversion {
        shapes,
        diagnostics: run.diagnostics,
    })
}

/// Drop every shape whose element was consumed as a member of another
/// element, so a way does not appear both standalone and inside its
/// relation's polygon. `keep_used` disables the filter.
pub fn filter_used(shapes: Vec<Shape>, usage: &UsageMap, keep_used: bool) -> Vec<Shape> {
    if keep_used {
        return shapes;
    }
    shapes
        .into_iter()
        .filter(|shape| {
            !usage.is_used(ElementId::new(
                shape.properties.kind,
                shape.properties.id,
            ))
        })
        .collect()
}

/// Role grouping of multipolygon members: everything that is not
/// explicitly `inner` counts as outer, empty roles included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RingRole {
    Outer,
    Inner,
}

impl RingRole {
    fn of(role: &str) -> Self {
        if role == "inner" {
            RingRole::Inner
        } else {
            RingRole::Outer
        }
    }
}

struct ConversionRun<'a> {
    index: RefIndex<'a>,
    usage: UsageMap,
    rules: &'a [PolygonRule],
    area_keys: &'a AreaKeys,
    strict: bool,
    diagnostics: Vec<Diagnostic>,
    /// Elements currently being assembled, to cut reference cycles.
    in_progress: HashSet<ElementId>,
}

impl<'a> ConversionRun<'a> {
    /// Record a per-element failure. Lenient mode keeps going; strict
    /// mode surfaces the error to the caller.
    fn report(&mut self, err: ConvertError) -> Result<(), ConvertError> {
        let severity = match err {
            ConvertError::AssemblyFailure { .. }
            | ConvertError::InvalidGeometryUnrepairable { .. } => Severity::Error,
            _ => Severity::Warning,
        };
        let diagnostic = Diagnostic::from_error(&err, severity);
        diagnostic.log();
        self.diagnostics.push(diagnostic);
        if self.strict { Err(err) } else { Ok(()) }
    }

    fn is_area(&self, tags: &crate::osm::Tags, closure: Option<bool>) -> bool {
        polygon::is_area(tags, closure, self.rules, self.area_keys)
    }

    fn element_to_shape(&mut self, element: &'a OsmElement) -> Result<Shape, ConvertError> {
        match element {
            OsmElement::Node(node) => Ok(node_to_shape(node)),
            OsmElement::Way(way) => self.way_to_shape(way),
            OsmElement::Relation(relation) => self.relation_to_shape(relation),
        }
    }

    fn way_to_shape(&mut self, way: &'a OsmWay) -> Result<Shape, ConvertError> {
        let properties = Properties::from_way(way);

        // Overpass "out center" summaries carry no ring to assemble.
        if let Some(center) = way.center {
            return Ok(Shape::new(point_geometry(center), properties));
        }

        let mut visited = HashSet::new();
        let coords = self.way_coords(way, way.id, &mut visited)?;
        if coords.len() < 2 {
            return Err(ConvertError::DegenerateGeometry {
                element: ElementId::way(way.id),
                reason: format!("{} coordinates", coords.len()),
            });
        }

        if self.is_area(&way.tags, way.closure()) {
            let mut ring = geometry::fix_polygon(Polygon::new(LineString::new(coords), vec![]));
            if !ring.is_valid() || ring.0.is_empty() {
                return Err(ConvertError::InvalidGeometryUnrepairable {
                    element: ElementId::way(way.id),
                });
            }
            let geom = if ring.0.len() == 1 {
                Geometry::Polygon(ring.0.remove(0))
            } else {
                Geometry::MultiPolygon(ring)
            };
            Ok(Shape::new(geom, properties))
        } else {
            Ok(Shape::new(
                Geometry::LineString(LineString::new(coords)),
                properties,
            ))
        }
    }

    /// Resolve a way's single coordinate source to a coordinate list.
    /// `consumer` is the id recorded against a `ref` target: normally the
    /// way's own id, but a reference stub standing in for a relation
    /// member propagates the id it was given.
    fn way_coords(
        &mut self,
        way: &'a OsmWay,
        consumer: i64,
        visited: &mut HashSet<i64>,
    ) -> Result<Vec<Coord<f64>>, ConvertError> {
        match &way.source {
            WaySource::Geometry(coords) => Ok(coords.iter().map(to_coord).collect()),
            WaySource::NodeIds(ids) => {
                let mut coords = Vec::with_capacity(ids.len());
                for &id in ids {
                    let Some(node) = self.index.node(id) else {
                        return Err(ConvertError::UnresolvedReference {
                            element: ElementId::way(way.id),
                            reference: ElementId::node(id),
                        });
                    };
                    self.usage.mark(ElementId::node(id), way.id);
                    coords.push(Coord {
                        x: node.lon,
                        y: node.lat,
                    });
                }
                Ok(coords)
            }
            WaySource::Ref(target) => {
                if !visited.insert(way.id) {
                    return Err(ConvertError::ReferenceCycle {
                        element: ElementId::way(way.id),
                    });
                }
                let Some(referent) = self.index.way(*target) else {
                    return Err(ConvertError::UnresolvedReference {
                        element: ElementId::way(way.id),
                        reference: ElementId::way(*target),
                    });
                };
                self.usage.mark(ElementId::way(*target), consumer);
                self.way_coords(referent, consumer, visited)
            }
        }
    }

    fn relation_to_shape(&mut self, relation: &'a OsmRelation) -> Result<Shape, ConvertError> {
        let properties = Properties::from_relation(relation);
        if let Some(center) = relation.center {
            return Ok(Shape::new(point_geometry(center), properties));
        }

        let id = ElementId::relation(relation.id);
        if !self.in_progress.insert(id) {
            return Err(ConvertError::ReferenceCycle { element: id });
        }
        let result = self.assemble_relation(relation, properties);
        self.in_progress.remove(&id);
        result
    }

    fn assemble_relation(
        &mut self,
        relation: &'a OsmRelation,
        properties: Properties,
    ) -> Result<Shape, ConvertError> {
        let id = ElementId::relation(relation.id);
        let members: &'a [OsmRelationMember] = if !relation.members.is_empty() {
            &relation.members
        } else if let Some(target) = relation.relation_ref {
            match self.index.relation(target) {
                Some(referent) => &referent.members,
                None => {
                    return Err(ConvertError::UnresolvedReference {
                        element: id,
                        reference: ElementId::relation(target),
                    });
                }
            }
        } else {
            return Err(ConvertError::AssemblyFailure {
                element: id,
                reason: "relation has no members".to_string(),
            });
        };

        if self.is_area(&relation.tags, None) {
            self.multipolygon_relation(relation, members, properties)
        } else {
            self.multiline_relation(relation, members, properties)
        }
    }

    /// Non-area relation: one merged multiline over all member ways,
    /// recursing into nested relations.
    fn multiline_relation(
        &mut self,
        relation: &'a OsmRelation,
        members: &'a [OsmRelationMember],
        properties: Properties,
    ) -> Result<Shape, ConvertError> {
        let id = ElementId::relation(relation.id);
        let mut lines: Vec<LineString<f64>> = Vec::new();

        for member in members {
            match member.member_type {
                ElementKind::Way => match self.member_line(member, relation.id) {
                    Ok(line) => lines.push(line),
                    Err(err) => self.report(err)?,
                },
                ElementKind::Relation => {
                    let Some(child) = self.index.relation(member.member_id) else {
                        self.report(ConvertError::UnresolvedReference {
                            element: id,
                            reference: ElementId::relation(member.member_id),
                        })?;
                        continue;
                    };
                    self.usage
                        .mark(ElementId::relation(member.member_id), relation.id);
                    match self.relation_to_shape(child) {
                        Ok(shape) => collect_lines(shape.geometry, &mut lines),
                        Err(err) => self.report(err)?,
                    }
                }
                ElementKind::Node => {
                    self.report(ConvertError::UnsupportedMemberType {
                        element: id,
                        member: ElementId::node(member.member_id),
                        role: member.role.clone(),
                    })?;
                }
            }
        }

        if lines.is_empty() {
            return Err(ConvertError::AssemblyFailure {
                element: id,
                reason: "no usable member lines".to_string(),
            });
        }

        let merged = geometry::merge_lines(lines);
        Ok(Shape::new(
            Geometry::MultiLineString(MultiLineString::new(merged)),
            properties,
        ))
    }

    /// Area relation: assemble one multipolygon from the member rings.
    ///
    /// Members are grouped into maximal runs of consecutive same-role
    /// members, because real relations interleave outer and inner members
    /// freely. The first outer run is the base; every other run is folded
    /// into it by union or difference in source order, so a single true
    /// boundary split across non-contiguous outer runs still assembles
    /// into one shell.
    fn multipolygon_relation(
        &mut self,
        relation: &'a OsmRelation,
        members: &'a [OsmRelationMember],
        properties: Properties,
    ) -> Result<Shape, ConvertError> {
        let id = ElementId::relation(relation.id);
        let mut runs: Vec<(RingRole, Vec<LineString<f64>>)> = Vec::new();

        for member in members {
            if member.member_type != ElementKind::Way {
                self.report(ConvertError::UnsupportedMemberType {
                    element: id,
                    member: ElementId::new(member.member_type, member.member_id),
                    role: member.role.clone(),
                })?;
                continue;
            }
            self.usage
                .mark(ElementId::way(member.member_id), relation.id);

            let line = match self.member_line(member, relation.id) {
                Ok(line) => line,
                Err(err) => {
                    self.report(err)?;
                    continue;
                }
            };
            let role = RingRole::of(&member.role);
            match runs.last_mut() {
                Some((last_role, lines)) if *last_role == role => lines.push(line),
                _ => runs.push((role, vec![line])),
            }
        }

        let Some(base_index) = runs.iter().position(|(role, _)| *role == RingRole::Outer) else {
            return Err(ConvertError::AssemblyFailure {
                element: id,
                reason: "no outer ring members".to_string(),
            });
        };

        let mut assembled: Vec<(RingRole, Option<geo::MultiPolygon<f64>>)> = runs
            .into_iter()
            .map(|(role, lines)| (role, geometry::lines_to_multipolygon(lines)))
            .collect();

        // An unusable outer base is fatal to the relation; any other run
        // merely degrades.
        let Some(base) = assembled[base_index].1.take() else {
            return Err(ConvertError::AssemblyFailure {
                element: id,
                reason: "outer ring did not assemble".to_string(),
            });
        };
        if !base.is_valid() {
            return Err(ConvertError::AssemblyFailure {
                element: id,
                reason: "outer ring base is invalid".to_string(),
            });
        }

        let mut multipolygon = base;
        for (index, (role, assembled_run)) in assembled.into_iter().enumerate() {
            if index == base_index {
                continue;
            }
            let Some(run_polygon) = assembled_run else {
                self.report(ConvertError::DegenerateGeometry {
                    element: id,
                    reason: format!("{:?} ring group did not assemble", role).to_lowercase(),
                })?;
                continue;
            };
            multipolygon = match role {
                RingRole::Outer => multipolygon.union(&run_polygon),
                RingRole::Inner => multipolygon.difference(&run_polygon),
            };
        }

        let multipolygon = geometry::fix_multipolygon(multipolygon);
        if !multipolygon.is_valid() {
            return Err(ConvertError::InvalidGeometryUnrepairable { element: id });
        }
        let multipolygon = geometry::orient_multipolygon(multipolygon);

        Ok(Shape::new(Geometry::MultiPolygon(multipolygon), properties))
    }

    /// Build one member way as a line segment for ring or multiline
    /// assembly. Polygon-shaped members collapse to their exterior ring;
    /// that should not occur on well-formed data but role-less closed
    /// ways classify as areas on their own tags.
    fn member_line(
        &mut self,
        member: &'a OsmRelationMember,
        relation_id: i64,
    ) -> Result<LineString<f64>, ConvertError> {
        let member_id = ElementId::way(member.member_id);

        if let Some(coords) = &member.geometry {
            if coords.len() < 2 {
                return Err(ConvertError::DegenerateGeometry {
                    element: member_id,
                    reason: format!("{} coordinates", coords.len()),
                });
            }
            return Ok(LineString::new(coords.iter().map(to_coord).collect()));
        }

        let Some(way) = self.index.way(member.member_id) else {
            return Err(ConvertError::UnresolvedReference {
                element: ElementId::relation(relation_id),
                reference: member_id,
            });
        };
        let shape = self.way_to_shape(way)?;
        match shape.geometry {
            Geometry::LineString(line) => Ok(line),
            Geometry::Polygon(polygon) => Ok(polygon.into_inner().0),
            Geometry::MultiPolygon(mut multipolygon) if !multipolygon.0.is_empty() => {
                Ok(multipolygon.0.remove(0).into_inner().0)
            }
            _ => Err(ConvertError::DegenerateGeometry {
                element: member_id,
                reason: "member did not produce a line".to_string(),
            }),
        }
    }
}

fn node_to_shape(node: &OsmNode) -> Shape {
    Shape::new(
        Geometry::Point(Point::new(node.lon, node.lat)),
        Properties::from_node(node),
    )
}

fn point_geometry(center: LatLon) -> Geometry<f64> {
    Geometry::Point(Point::new(center.lon, center.lat))
}

fn to_coord(position: &LatLon) -> Coord<f64> {
    Coord {
        x: position.lon,
        y: position.lat,
    }
}

/// Flatten whatever a nested relation produced into plain lines; polygon
/// members are demoted to their exterior rings.
fn collect_lines(geometry: Geometry<f64>, lines: &mut Vec<LineString<f64>>) {
    match geometry {
        Geometry::LineString(line) => lines.push(line),
        Geometry::MultiLineString(multiline) => lines.extend(multiline.0),
        Geometry::Polygon(polygon) => lines.push(polygon.into_inner().0),
        Geometry::MultiPolygon(multipolygon) => {
            lines.extend(multipolygon.0.into_iter().map(|p| p.into_inner().0));
        }
        _ => {}
    }
}
