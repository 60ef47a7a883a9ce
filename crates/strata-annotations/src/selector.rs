//! Choosing between candidate merged annotations of the same type

use crate::merged::TypeMappedAnnotation;

/// Strategy picking one annotation when several candidates are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergedAnnotationSelector {
    /// Lowest distance wins; the first found wins ties
    #[default]
    Nearest,
    /// The first directly declared candidate wins, else the first found
    FirstDirectlyDeclared,
}

impl MergedAnnotationSelector {
    /// Whether a candidate cannot be beaten, ending the search early
    pub fn is_best_candidate(&self, candidate: &TypeMappedAnnotation) -> bool {
        candidate.distance() == 0
    }

    /// Keep `existing` or replace it with `candidate`
    pub fn select(&self, existing: TypeMappedAnnotation, candidate: TypeMappedAnnotation) -> TypeMappedAnnotation {
        let replace = match self {
            MergedAnnotationSelector::Nearest => candidate.distance() < existing.distance(),
            MergedAnnotationSelector::FirstDirectlyDeclared => existing.distance() > 0 && candidate.distance() == 0,
        };
        if replace {
            candidate
        } else {
            existing
        }
    }
}
