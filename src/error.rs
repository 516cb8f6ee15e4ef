use crate::osm::ElementId;
use thiserror::Error;

/// Per-element conversion failures. All of these are local to the element
/// being processed: in the default lenient mode they degrade to a skipped
/// element plus a diagnostic, and only strict mode surfaces them as `Err`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("unresolved reference {reference} in {element}")]
    UnresolvedReference {
        element: ElementId,
        reference: ElementId,
    },

    #[error("reference cycle at {element}")]
    ReferenceCycle { element: ElementId },

    #[error("degenerate geometry for {element}: {reason}")]
    DegenerateGeometry { element: ElementId, reason: String },

    #[error("geometry of {element} is invalid and could not be repaired")]
    InvalidGeometryUnrepairable { element: ElementId },

    #[error("failed to assemble {element}: {reason}")]
    AssemblyFailure { element: ElementId, reason: String },

    #[error("unsupported member type in {element}: {member} with role {role:?}")]
    UnsupportedMemberType {
        element: ElementId,
        member: ElementId,
        role: String,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid OSM XML input: {0}")]
    Xml(#[from] crate::xml::XmlError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}
