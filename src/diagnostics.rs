use crate::error::ConvertError;
use crate::osm::ElementId;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One structured event emitted during a conversion. Collected on the run
/// and handed to the caller; also mirrored to the `log` facade. Nothing
/// downstream branches on whether a diagnostic was emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub element: Option<ElementId>,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>, element: Option<ElementId>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
            element,
        }
    }

    pub fn error(message: impl Into<String>, element: Option<ElementId>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: message.into(),
            element,
        }
    }

    pub fn from_error(err: &ConvertError, severity: Severity) -> Self {
        let element = match err {
            ConvertError::UnresolvedReference { element, .. }
            | ConvertError::ReferenceCycle { element }
            | ConvertError::DegenerateGeometry { element, .. }
            | ConvertError::InvalidGeometryUnrepairable { element }
            | ConvertError::AssemblyFailure { element, .. }
            | ConvertError::UnsupportedMemberType { element, .. } => Some(*element),
        };
        Diagnostic {
            severity,
            message: err.to_string(),
            element,
        }
    }

    pub(crate) fn log(&self) {
        match self.severity {
            Severity::Warning => log::warn!("{}", self.message),
            Severity::Error => log::error!("{}", self.message),
        }
    }
}
