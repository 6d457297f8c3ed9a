//! Entity kinds handled by the pipeline.

use std::fmt;

/// The two entity kinds synchronized from the legacy store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A v1 survey row (`itx-surveys.*` keys).
    Survey,
    /// A v1 survey response row (`itx-survey-responses.*` keys).
    SurveyResponse,
}

impl EntityKind {
    /// The object type tag used in mapping-store keys and access-control
    /// messages.
    #[must_use]
    pub const fn object_type(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::SurveyResponse => "survey_response",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.object_type())
    }
}
