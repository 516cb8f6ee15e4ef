use crate::osm::{ElementId, OsmElement, OsmNode, OsmRelation, OsmWay};
use std::collections::HashMap;

/// Lookup from `(type, id)` to element, built once per conversion run and
/// owned by it. Read-only after construction; the "used" annotation lives
/// in the separate [`UsageMap`] so input elements are never mutated.
pub struct RefIndex<'a> {
    elements: HashMap<ElementId, &'a OsmElement>,
}

impl<'a> RefIndex<'a> {
    pub fn build(elements: &'a [OsmElement]) -> Self {
        let mut index = HashMap::with_capacity(elements.len());
        for element in elements {
            index.insert(element.element_id(), element);
        }
        RefIndex { elements: index }
    }

    pub fn get(&self, id: ElementId) -> Option<&'a OsmElement> {
        self.elements.get(&id).copied()
    }

    pub fn node(&self, id: i64) -> Option<&'a OsmNode> {
        match self.get(ElementId::node(id)) {
            Some(OsmElement::Node(node)) => Some(node),
            _ => None,
        }
    }

    pub fn way(&self, id: i64) -> Option<&'a OsmWay> {
        match self.get(ElementId::way(id)) {
            Some(OsmElement::Way(way)) => Some(way),
            _ => None,
        }
    }

    pub fn relation(&self, id: i64) -> Option<&'a OsmRelation> {
        match self.get(ElementId::relation(id)) {
            Some(OsmElement::Relation(relation)) => Some(relation),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Which element consumed which. Keyed by full `(type, id)` identity since
/// node and way id spaces overlap. Populated while shapes are built and
/// consulted by the used-reference filter afterwards.
#[derive(Debug, Clone, Default)]
pub struct UsageMap {
    consumers: HashMap<ElementId, i64>,
}

impl UsageMap {
    pub fn new() -> Self {
        UsageMap::default()
    }

    /// Record `id` as consumed. The first consumer wins, matching the
    /// first-pass-marks semantics of the element walk.
    pub fn mark(&mut self, id: ElementId, consumer: i64) {
        self.consumers.entry(id).or_insert(consumer);
    }

    pub fn is_used(&self, id: ElementId) -> bool {
        self.consumers.contains_key(&id)
    }

    pub fn consumer(&self, id: ElementId) -> Option<i64> {
        self.consumers.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}
