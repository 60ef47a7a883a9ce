//! Annotation type filters
//!
//! A filter decides which annotation types are skipped while collecting
//! annotations and walking meta-annotation hierarchies.

use std::sync::Arc;

use strata_types::Annotation;

const PLAIN_PACKAGES: &[&str] = &["java.lang", "strata.lang"];
const JAVA_PACKAGES: &[&str] = &["java", "javax"];

/// Predicate over annotation type names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AnnotationFilter {
    /// Language and framework internals (`java.lang.*`, `strata.lang.*`)
    #[default]
    Plain,
    /// Everything in the `java` and `javax` namespaces
    Java,
    /// Matches every type, so nothing is collected
    All,
    /// Matches no type
    None,
    /// Types in any of the given packages
    Packages(Arc<[String]>),
}

impl AnnotationFilter {
    /// Filter for types in the given packages
    pub fn packages<'a>(packages: impl IntoIterator<Item = &'a str>) -> Self {
        AnnotationFilter::Packages(packages.into_iter().map(str::to_string).collect())
    }

    /// Whether the type name is filtered out
    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            AnnotationFilter::Plain => in_packages(type_name, PLAIN_PACKAGES.iter().copied()),
            AnnotationFilter::Java => in_packages(type_name, JAVA_PACKAGES.iter().copied()),
            AnnotationFilter::All => true,
            AnnotationFilter::None => false,
            AnnotationFilter::Packages(packages) => {
                in_packages(type_name, packages.iter().map(String::as_str))
            }
        }
    }

    /// Whether the annotation's type is filtered out
    pub fn matches_annotation(&self, annotation: &Annotation) -> bool {
        self.matches(annotation.annotation_type())
    }
}

fn in_packages<'a>(type_name: &str, mut packages: impl Iterator<Item = &'a str>) -> bool {
    packages.any(|package| {
        type_name.len() > package.len()
            && type_name.starts_with(package)
            && type_name.as_bytes()[package.len()] == b'.'
    })
}
