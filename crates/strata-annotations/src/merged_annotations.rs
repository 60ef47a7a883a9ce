//! Merged annotations of an element
//!
//! [`MergedAnnotations`] scans an element's hierarchy on demand and
//! exposes every annotation (direct or meta) as a [`MergedAnnotation`].
//! Lookups stop scanning as soon as the answer is known; iteration collects
//! the hierarchy once into aggregates and walks them lazily.

use std::fmt;
use std::sync::{Arc, OnceLock};

use strata_types::{AnnotatedElement, Annotation, ClassType, TypeRegistry};

use crate::error::{AnnotationError, AnnotationResult};
use crate::filter::AnnotationFilter;
use crate::merged::{MergedAnnotation, TypeMappedAnnotation};
use crate::repeatable::RepeatableContainers;
use crate::scanner::{self, is_known_empty, AnnotationsProcessor, SearchStrategy};
use crate::selector::MergedAnnotationSelector;
use crate::type_mapping::AnnotationTypeMapping;
use crate::type_mappings::AnnotationTypeMappings;

type EnclosingClassPredicate = Arc<dyn Fn(&ClassType) -> bool + Send + Sync>;

/// Candidate filter for [`MergedAnnotations::get_with`]
pub type MergedAnnotationPredicate<'a> = &'a dyn Fn(&MergedAnnotation) -> bool;

/// Builder configuring how an element's hierarchy is searched
#[derive(Clone)]
pub struct Search {
    strategy: SearchStrategy,
    search_enclosing_class: EnclosingClassPredicate,
    repeatable_containers: RepeatableContainers,
    annotation_filter: AnnotationFilter,
}

impl Search {
    fn new(strategy: SearchStrategy) -> Self {
        Self {
            strategy,
            search_enclosing_class: Arc::new(|_| false),
            repeatable_containers: RepeatableContainers::standard_repeatables(),
            annotation_filter: AnnotationFilter::Plain,
        }
    }

    /// Also search enclosing classes accepted by `predicate`
    ///
    /// Only valid with [`SearchStrategy::TypeHierarchy`].
    pub fn with_enclosing_classes(
        mut self,
        predicate: impl Fn(&ClassType) -> bool + Send + Sync + 'static,
    ) -> AnnotationResult<Self> {
        if self.strategy != SearchStrategy::TypeHierarchy {
            return Err(AnnotationError::IllegalState {
                message: "A custom 'search_enclosing_class' predicate can only be combined with SearchStrategy::TypeHierarchy"
                    .to_string(),
            });
        }
        self.search_enclosing_class = Arc::new(predicate);
        Ok(self)
    }

    /// Use a different repeatable container strategy
    pub fn with_repeatable_containers(mut self, repeatable_containers: RepeatableContainers) -> Self {
        self.repeatable_containers = repeatable_containers;
        self
    }

    /// Use a different annotation filter
    pub fn with_annotation_filter(mut self, annotation_filter: AnnotationFilter) -> Self {
        self.annotation_filter = annotation_filter;
        self
    }

    /// Merged annotations of `element` under this configuration
    pub fn from(self, registry: &Arc<TypeRegistry>, element: AnnotatedElement) -> MergedAnnotations {
        let origin = if is_known_empty(registry, &element, self.strategy, &*self.search_enclosing_class) {
            Origin::Empty
        } else {
            Origin::Element {
                element,
                strategy: self.strategy,
                search_enclosing_class: self.search_enclosing_class,
            }
        };
        MergedAnnotations::new(registry, origin, self.repeatable_containers, self.annotation_filter)
    }
}

impl fmt::Debug for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("strategy", &self.strategy)
            .field("repeatable_containers", &self.repeatable_containers)
            .field("annotation_filter", &self.annotation_filter)
            .finish()
    }
}

enum Origin {
    Element {
        element: AnnotatedElement,
        strategy: SearchStrategy,
        search_enclosing_class: EnclosingClassPredicate,
    },
    Annotations {
        source: AnnotatedElement,
        annotations: Arc<[Annotation]>,
    },
    Empty,
}

/// Directly declared annotations of one hierarchy level, flattened
struct Aggregate {
    aggregate_index: usize,
    source: AnnotatedElement,
    annotations: Vec<Annotation>,
    mappings: Vec<Arc<AnnotationTypeMappings>>,
}

impl Aggregate {
    fn create_if_possible(
        &self,
        registry: &Arc<TypeRegistry>,
        annotation_index: usize,
        mapping_index: usize,
    ) -> AnnotationResult<Option<TypeMappedAnnotation>> {
        TypeMappedAnnotation::create_if_possible(
            registry,
            self.mappings[annotation_index].clone(),
            mapping_index,
            Some(self.source.clone()),
            &self.annotations[annotation_index],
            self.aggregate_index,
        )
    }
}

/// Every merged annotation reachable from an element
pub struct MergedAnnotations {
    registry: Arc<TypeRegistry>,
    origin: Origin,
    repeatable_containers: RepeatableContainers,
    annotation_filter: AnnotationFilter,
    aggregates: OnceLock<AnnotationResult<Vec<Aggregate>>>,
}

impl MergedAnnotations {
    fn new(
        registry: &Arc<TypeRegistry>,
        origin: Origin,
        repeatable_containers: RepeatableContainers,
        annotation_filter: AnnotationFilter,
    ) -> Self {
        Self {
            registry: registry.clone(),
            origin,
            repeatable_containers,
            annotation_filter,
            aggregates: OnceLock::new(),
        }
    }

    /// Directly declared annotations of `element` and their meta-annotations
    pub fn from(registry: &Arc<TypeRegistry>, element: AnnotatedElement) -> Self {
        Self::search(SearchStrategy::Direct).from(registry, element)
    }

    /// Start configuring a search with the given strategy
    pub fn search(strategy: SearchStrategy) -> Search {
        Search::new(strategy)
    }

    /// Merged annotations over an explicit set of annotations
    pub fn from_annotations(registry: &Arc<TypeRegistry>, annotations: impl IntoIterator<Item = Annotation>) -> Self {
        let annotations: Arc<[Annotation]> = annotations.into_iter().collect();
        let source = AnnotatedElement::Annotations(annotations.clone());
        Self::from_annotations_with(
            registry,
            source,
            annotations,
            RepeatableContainers::standard_repeatables(),
            AnnotationFilter::Plain,
        )
    }

    /// Explicit annotations attributed to `source`, with custom strategies
    pub fn from_annotations_with(
        registry: &Arc<TypeRegistry>,
        source: AnnotatedElement,
        annotations: Arc<[Annotation]>,
        repeatable_containers: RepeatableContainers,
        annotation_filter: AnnotationFilter,
    ) -> Self {
        let origin = if annotations.is_empty() {
            Origin::Empty
        } else {
            Origin::Annotations { source, annotations }
        };
        Self::new(registry, origin, repeatable_containers, annotation_filter)
    }

    fn scan<P: AnnotationsProcessor<()>>(&self, processor: &mut P) -> Option<P::Output> {
        match &self.origin {
            Origin::Element {
                element,
                strategy,
                search_enclosing_class,
            } => scanner::scan(
                &self.registry,
                &(),
                element,
                *strategy,
                &**search_enclosing_class,
                processor,
            ),
            Origin::Annotations { source, annotations } => {
                let result = processor.do_with_annotations(&(), 0, source, annotations);
                processor.finish(result)
            }
            Origin::Empty => None,
        }
    }

    /// Whether an annotation of the type is present directly or as a
    /// meta-annotation
    pub fn is_present(&self, annotation_type: &str) -> AnnotationResult<bool> {
        self.is_present_with(annotation_type, false)
    }

    /// Whether an annotation of the type is directly declared
    pub fn is_directly_present(&self, annotation_type: &str) -> AnnotationResult<bool> {
        self.is_present_with(annotation_type, true)
    }

    fn is_present_with(&self, annotation_type: &str, direct_only: bool) -> AnnotationResult<bool> {
        if self.annotation_filter.matches(annotation_type) {
            return Ok(false);
        }
        let mut processor = IsPresent {
            registry: &self.registry,
            required_type: annotation_type,
            repeatable_containers: &self.repeatable_containers,
            annotation_filter: &self.annotation_filter,
            direct_only,
        };
        Ok(self.scan(&mut processor).transpose()?.is_some())
    }

    /// Nearest annotation of the type, or [`MergedAnnotation::Missing`]
    pub fn get(&self, annotation_type: &str) -> AnnotationResult<MergedAnnotation> {
        self.get_with(annotation_type, None, MergedAnnotationSelector::Nearest)
    }

    /// Annotation of the type accepted by `predicate`, chosen by `selector`
    pub fn get_with(
        &self,
        annotation_type: &str,
        predicate: Option<MergedAnnotationPredicate<'_>>,
        selector: MergedAnnotationSelector,
    ) -> AnnotationResult<MergedAnnotation> {
        if self.annotation_filter.matches(annotation_type) {
            return Ok(MergedAnnotation::Missing);
        }
        let mut finder = MergedAnnotationFinder {
            registry: &self.registry,
            required_type: annotation_type,
            predicate,
            selector,
            repeatable_containers: &self.repeatable_containers,
            annotation_filter: &self.annotation_filter,
            result: None,
        };
        match self.scan(&mut finder).transpose()? {
            Some(found) => Ok(MergedAnnotation::Mapped(found)),
            None => Ok(MergedAnnotation::Missing),
        }
    }

    /// Every annotation of the type, in aggregate then distance order
    pub fn stream<'a>(&'a self, annotation_type: &'a str) -> MergedAnnotationIter<'a> {
        if self.annotation_filter == AnnotationFilter::All {
            return MergedAnnotationIter::empty(self);
        }
        MergedAnnotationIter::new(self, Some(annotation_type))
    }

    /// Every annotation, in aggregate then distance order
    pub fn stream_all(&self) -> MergedAnnotationIter<'_> {
        MergedAnnotationIter::new(self, None)
    }

    /// Same as [`Self::stream_all`]
    pub fn iter(&self) -> MergedAnnotationIter<'_> {
        self.stream_all()
    }

    fn aggregates(&self) -> AnnotationResult<&[Aggregate]> {
        self.aggregates
            .get_or_init(|| {
                let mut collector = AggregatesCollector {
                    registry: &self.registry,
                    repeatable_containers: &self.repeatable_containers,
                    annotation_filter: &self.annotation_filter,
                    aggregates: Vec::new(),
                };
                self.scan(&mut collector).unwrap_or_else(|| Ok(Vec::new()))
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }
}

impl fmt::Debug for MergedAnnotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = match &self.origin {
            Origin::Element { element, strategy, .. } => format!("{} ({:?})", element, strategy),
            Origin::Annotations { source, .. } => source.to_string(),
            Origin::Empty => "empty".to_string(),
        };
        f.debug_struct("MergedAnnotations")
            .field("origin", &origin)
            .field("repeatable_containers", &self.repeatable_containers)
            .field("annotation_filter", &self.annotation_filter)
            .finish()
    }
}

impl<'a> IntoIterator for &'a MergedAnnotations {
    type Item = AnnotationResult<MergedAnnotation>;
    type IntoIter = MergedAnnotationIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.stream_all()
    }
}

fn is_mapping_for_type(mapping: &AnnotationTypeMapping, filter: &AnnotationFilter, required_type: Option<&str>) -> bool {
    let actual = mapping.annotation_type();
    !filter.matches(actual) && required_type.map_or(true, |required| &**actual == required)
}

struct IsPresent<'a> {
    registry: &'a Arc<TypeRegistry>,
    required_type: &'a str,
    repeatable_containers: &'a RepeatableContainers,
    annotation_filter: &'a AnnotationFilter,
    direct_only: bool,
}

impl AnnotationsProcessor<()> for IsPresent<'_> {
    type Output = AnnotationResult<()>;

    fn do_with_annotations(
        &mut self,
        context: &(),
        aggregate_index: usize,
        source: &AnnotatedElement,
        annotations: &[Annotation],
    ) -> Option<Self::Output> {
        for annotation in annotations {
            let annotation_type = annotation.annotation_type();
            if self.annotation_filter.matches(annotation_type) {
                continue;
            }
            if &**annotation_type == self.required_type {
                return Some(Ok(()));
            }
            if let Some(repeated) = self
                .repeatable_containers
                .find_repeated_annotations(self.registry, annotation)
            {
                if let Some(result) = self.do_with_annotations(context, aggregate_index, source, &repeated) {
                    return Some(result);
                }
            }
            if self.direct_only || self.registry.annotation_type(annotation_type).is_none() {
                continue;
            }
            let mappings = match AnnotationTypeMappings::for_annotation_type_with(
                self.registry,
                annotation_type,
                self.repeatable_containers,
                self.annotation_filter,
            ) {
                Ok(mappings) => mappings,
                Err(err) => return Some(Err(err)),
            };
            if mappings
                .iter()
                .any(|mapping| is_mapping_for_type(mapping, self.annotation_filter, Some(self.required_type)))
            {
                return Some(Ok(()));
            }
        }
        None
    }
}

struct MergedAnnotationFinder<'a> {
    registry: &'a Arc<TypeRegistry>,
    required_type: &'a str,
    predicate: Option<MergedAnnotationPredicate<'a>>,
    selector: MergedAnnotationSelector,
    repeatable_containers: &'a RepeatableContainers,
    annotation_filter: &'a AnnotationFilter,
    result: Option<TypeMappedAnnotation>,
}

impl MergedAnnotationFinder<'_> {
    fn process(
        &mut self,
        aggregate_index: usize,
        source: &AnnotatedElement,
        annotation: &Annotation,
    ) -> Option<AnnotationResult<TypeMappedAnnotation>> {
        if let Some(repeated) = self
            .repeatable_containers
            .find_repeated_annotations(self.registry, annotation)
        {
            return self.do_with_annotations(&(), aggregate_index, source, &repeated);
        }
        if self.registry.annotation_type(annotation.annotation_type()).is_none() {
            return None;
        }
        let mappings = match AnnotationTypeMappings::for_annotation_type_with(
            self.registry,
            annotation.annotation_type(),
            self.repeatable_containers,
            self.annotation_filter,
        ) {
            Ok(mappings) => mappings,
            Err(err) => return Some(Err(err)),
        };

        for index in 0..mappings.len() {
            if !is_mapping_for_type(mappings.get(index), self.annotation_filter, Some(self.required_type)) {
                continue;
            }
            let candidate = match TypeMappedAnnotation::create_if_possible(
                self.registry,
                mappings.clone(),
                index,
                Some(source.clone()),
                annotation,
                aggregate_index,
            ) {
                Ok(Some(candidate)) => candidate,
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            };
            if let Some(predicate) = self.predicate {
                let merged = MergedAnnotation::Mapped(candidate.clone());
                if !predicate(&merged) {
                    continue;
                }
            }
            if self.selector.is_best_candidate(&candidate) {
                return Some(Ok(candidate));
            }
            self.result = Some(match self.result.take() {
                Some(existing) => self.selector.select(existing, candidate),
                None => candidate,
            });
        }
        None
    }
}

impl AnnotationsProcessor<()> for MergedAnnotationFinder<'_> {
    type Output = AnnotationResult<TypeMappedAnnotation>;

    fn do_with_aggregate(&mut self, _context: &(), _aggregate_index: usize) -> Option<Self::Output> {
        self.result.take().map(Ok)
    }

    fn do_with_annotations(
        &mut self,
        _context: &(),
        aggregate_index: usize,
        source: &AnnotatedElement,
        annotations: &[Annotation],
    ) -> Option<Self::Output> {
        for annotation in annotations {
            if self.annotation_filter.matches_annotation(annotation) {
                continue;
            }
            if let Some(result) = self.process(aggregate_index, source, annotation) {
                return Some(result);
            }
        }
        None
    }

    fn finish(&mut self, result: Option<Self::Output>) -> Option<Self::Output> {
        result.or_else(|| self.result.take().map(Ok))
    }
}

struct AggregatesCollector<'a> {
    registry: &'a Arc<TypeRegistry>,
    repeatable_containers: &'a RepeatableContainers,
    annotation_filter: &'a AnnotationFilter,
    aggregates: Vec<Aggregate>,
}

impl AggregatesCollector<'_> {
    fn add_aggregate_annotations(&self, collected: &mut Vec<Annotation>, annotations: &[Annotation]) {
        for annotation in annotations {
            if self.annotation_filter.matches_annotation(annotation) {
                continue;
            }
            match self
                .repeatable_containers
                .find_repeated_annotations(self.registry, annotation)
            {
                Some(repeated) => self.add_aggregate_annotations(collected, &repeated),
                None => {
                    if self.registry.annotation_type(annotation.annotation_type()).is_some() {
                        collected.push(annotation.clone());
                    }
                }
            }
        }
    }
}

impl AnnotationsProcessor<()> for AggregatesCollector<'_> {
    type Output = AnnotationResult<Vec<Aggregate>>;

    fn do_with_annotations(
        &mut self,
        _context: &(),
        aggregate_index: usize,
        source: &AnnotatedElement,
        annotations: &[Annotation],
    ) -> Option<Self::Output> {
        let mut collected = Vec::new();
        self.add_aggregate_annotations(&mut collected, annotations);
        let mut mappings = Vec::with_capacity(collected.len());
        for annotation in &collected {
            match AnnotationTypeMappings::for_annotation_type_with(
                self.registry,
                annotation.annotation_type(),
                self.repeatable_containers,
                self.annotation_filter,
            ) {
                Ok(found) => mappings.push(found),
                Err(err) => return Some(Err(err)),
            }
        }
        self.aggregates.push(Aggregate {
            aggregate_index,
            source: source.clone(),
            annotations: collected,
            mappings,
        });
        None
    }

    fn finish(&mut self, result: Option<Self::Output>) -> Option<Self::Output> {
        Some(result.unwrap_or_else(|| Ok(std::mem::take(&mut self.aggregates))))
    }
}

/// Lazy iterator over merged annotations
///
/// Within an aggregate, the candidate with the lowest distance comes
/// first; ties go to the earlier declared annotation.
pub struct MergedAnnotationIter<'a> {
    owner: &'a MergedAnnotations,
    required_type: Option<&'a str>,
    aggregates: &'a [Aggregate],
    error: Option<AnnotationError>,
    aggregate_cursor: usize,
    mapping_cursors: Option<Vec<usize>>,
}

impl<'a> MergedAnnotationIter<'a> {
    fn new(owner: &'a MergedAnnotations, required_type: Option<&'a str>) -> Self {
        let (aggregates, error) = match owner.aggregates() {
            Ok(aggregates) => (aggregates, None),
            Err(err) => (&[][..], Some(err)),
        };
        Self {
            owner,
            required_type,
            aggregates,
            error,
            aggregate_cursor: 0,
            mapping_cursors: None,
        }
    }

    fn empty(owner: &'a MergedAnnotations) -> Self {
        Self {
            owner,
            required_type: None,
            aggregates: &[],
            error: None,
            aggregate_cursor: 0,
            mapping_cursors: None,
        }
    }

    fn advance(&mut self, aggregate: &'a Aggregate) -> Option<AnnotationResult<MergedAnnotation>> {
        let owner = self.owner;
        loop {
            let cursors = self
                .mapping_cursors
                .get_or_insert_with(|| vec![0; aggregate.annotations.len()]);
            let mut lowest_distance = usize::MAX;
            let mut chosen = None;
            for annotation_index in 0..aggregate.annotations.len() {
                let mapping = next_suitable_mapping(
                    aggregate,
                    annotation_index,
                    cursors,
                    &owner.annotation_filter,
                    self.required_type,
                );
                if let Some(mapping) = mapping {
                    if mapping.distance() < lowest_distance {
                        chosen = Some(annotation_index);
                        lowest_distance = mapping.distance();
                    }
                }
                if lowest_distance == 0 {
                    break;
                }
            }

            let annotation_index = chosen?;
            let mapping_index = cursors[annotation_index];
            cursors[annotation_index] += 1;
            match aggregate.create_if_possible(&owner.registry, annotation_index, mapping_index) {
                Ok(Some(mapped)) => return Some(Ok(MergedAnnotation::Mapped(mapped))),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn next_suitable_mapping<'m>(
    aggregate: &'m Aggregate,
    annotation_index: usize,
    cursors: &mut [usize],
    filter: &AnnotationFilter,
    required_type: Option<&str>,
) -> Option<&'m AnnotationTypeMapping> {
    let mappings = &aggregate.mappings[annotation_index];
    while cursors[annotation_index] < mappings.len() {
        let mapping = mappings.get(cursors[annotation_index]);
        if is_mapping_for_type(mapping, filter, required_type) {
            return Some(mapping);
        }
        cursors[annotation_index] += 1;
    }
    None
}

impl Iterator for MergedAnnotationIter<'_> {
    type Item = AnnotationResult<MergedAnnotation>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }
        let aggregates = self.aggregates;
        while let Some(aggregate) = aggregates.get(self.aggregate_cursor) {
            if let Some(result) = self.advance(aggregate) {
                return Some(result);
            }
            self.aggregate_cursor += 1;
            self.mapping_cursors = None;
        }
        None
    }
}
