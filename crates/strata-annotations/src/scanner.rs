//! Annotation scanning over class and method hierarchies
//!
//! The scanner walks the levels of a hierarchy according to a
//! [`SearchStrategy`] and hands each level's declared annotations to an
//! [`AnnotationsProcessor`]. Processing stops as soon as the processor
//! returns a result.
//!
//! Levels that cannot be introspected (an unregistered superclass,
//! interface or enclosing class) are reported through
//! [`crate::failure`] and skipped; the remaining branches are still
//! visited.

use std::sync::{Arc, LazyLock};

use rustc_hash::{FxHashMap, FxHashSet};
use strata_types::{
    AnnotatedElement, Annotation, AnnotationType, ClassType, MethodDecl, MethodRef, RegistryId, TypeName, TypeRef,
    TypeRegistry, OBJECT,
};

use crate::attribute_methods::AttributeMethods;
use crate::cache::ConcurrentCache;
use crate::failure::{handle_introspection_failure, IntrospectionFailure};
use crate::filter::AnnotationFilter;

/// Ordering marker whose declarations never carry annotations of interest
const ORDERED: &str = "strata.core.Ordered";

static DECLARED_ANNOTATIONS_CACHE: LazyLock<ConcurrentCache<(RegistryId, AnnotatedElement), Arc<[Annotation]>>> =
    LazyLock::new(ConcurrentCache::new);

type Bindings = FxHashMap<Arc<str>, TypeRef>;

/// Which levels of a hierarchy are searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// Only the element's own declared annotations
    Direct,
    /// Declared annotations plus `inherited` ones from superclasses
    InheritedAnnotations,
    /// The superclass chain, without interfaces or enclosing classes
    Superclass,
    /// Superclasses, interfaces and (per predicate) enclosing classes
    TypeHierarchy,
}

/// Callback interface driven by [`scan`]
pub trait AnnotationsProcessor<C> {
    /// Result type; any `Some` stops the scan
    type Output;

    /// Called before each hierarchy level
    fn do_with_aggregate(&mut self, _context: &C, _aggregate_index: usize) -> Option<Self::Output> {
        None
    }

    /// Called with the declared annotations of one source at one level
    fn do_with_annotations(
        &mut self,
        context: &C,
        aggregate_index: usize,
        source: &AnnotatedElement,
        annotations: &[Annotation],
    ) -> Option<Self::Output>;

    /// Post-process the final result
    fn finish(&mut self, result: Option<Self::Output>) -> Option<Self::Output> {
        result
    }
}

/// Scan the element's hierarchy, feeding each level to the processor
pub fn scan<C, P>(
    registry: &TypeRegistry,
    context: &C,
    element: &AnnotatedElement,
    strategy: SearchStrategy,
    search_enclosing_class: &dyn Fn(&ClassType) -> bool,
    processor: &mut P,
) -> Option<P::Output>
where
    P: AnnotationsProcessor<C>,
{
    let result = {
        let mut scanner = Scanner {
            registry,
            context,
            processor: &mut *processor,
            search_enclosing_class,
            aggregate_index: 0,
            path: Vec::new(),
        };
        scanner.process(element, strategy)
    };
    processor.finish(result)
}

struct Scanner<'a, 'p, C, P> {
    registry: &'a TypeRegistry,
    context: &'a C,
    processor: &'p mut P,
    search_enclosing_class: &'a dyn Fn(&ClassType) -> bool,
    aggregate_index: usize,
    /// Classes on the current traversal path
    path: Vec<TypeName>,
}

impl<'a, 'p, C, P> Scanner<'a, 'p, C, P>
where
    P: AnnotationsProcessor<C>,
{
    fn process(&mut self, element: &AnnotatedElement, strategy: SearchStrategy) -> Option<P::Output> {
        match element {
            AnnotatedElement::Class(name) => self.process_class(name, strategy),
            AnnotatedElement::Method(method) => self.process_method(method, strategy),
            AnnotatedElement::Annotations(annotations) => self.process_element(element, annotations),
        }
    }

    fn process_element(&mut self, element: &AnnotatedElement, raw: &[Annotation]) -> Option<P::Output> {
        if let Some(result) = self.processor.do_with_aggregate(self.context, 0) {
            return Some(result);
        }
        let declared = declared_annotations(self.registry, element, raw);
        self.processor.do_with_annotations(self.context, 0, element, &declared)
    }

    fn process_class(&mut self, name: &TypeName, strategy: SearchStrategy) -> Option<P::Output> {
        let registry = self.registry;
        let element = AnnotatedElement::Class(name.clone());
        let Some(class) = registry.class(name) else {
            class_not_present(&element, name);
            return None;
        };
        match strategy {
            SearchStrategy::Direct => self.process_element(&element, &class.annotations),
            SearchStrategy::InheritedAnnotations => self.process_class_inherited(class),
            SearchStrategy::Superclass => self.process_class_hierarchy(name, false, &|_| false),
            SearchStrategy::TypeHierarchy => {
                let search_enclosing_class = self.search_enclosing_class;
                self.process_class_hierarchy(name, true, search_enclosing_class)
            }
        }
    }

    fn process_class_inherited(&mut self, root: &'a ClassType) -> Option<P::Output> {
        let registry = self.registry;
        if class_without_hierarchy(root, &|_| false) {
            return self.process_element(&AnnotatedElement::Class(root.name.clone()), &root.annotations);
        }

        let mut relevant: Option<Vec<Option<TypeName>>> = None;
        let mut remaining = usize::MAX;
        let mut visited = FxHashSet::default();
        let mut aggregate_index = 0;
        let mut current = Some(root);

        while let Some(class) = current {
            if remaining == 0 || has_plain_java_annotations_only(&class.name) || !visited.insert(class.name.clone()) {
                break;
            }
            if let Some(result) = self.processor.do_with_aggregate(self.context, aggregate_index) {
                return Some(result);
            }

            let element = AnnotatedElement::Class(class.name.clone());
            let declared = declared_annotations(registry, &element, &class.annotations);
            let mut kept = Vec::new();
            if !declared.is_empty() {
                let relevant = relevant.get_or_insert_with(|| {
                    let types = inherited_annotation_types(registry, root);
                    remaining = types.len();
                    types.into_iter().map(Some).collect()
                });
                for annotation in declared.iter() {
                    let slot = relevant
                        .iter_mut()
                        .find(|slot| slot.as_ref() == Some(annotation.annotation_type()));
                    if let Some(slot) = slot {
                        *slot = None;
                        remaining -= 1;
                        kept.push(annotation.clone());
                    }
                }
            }
            if let Some(result) = self.processor.do_with_annotations(self.context, aggregate_index, &element, &kept) {
                return Some(result);
            }

            current = match class.superclass_name() {
                Some(superclass) => {
                    let found = registry.class(superclass);
                    if found.is_none() {
                        class_not_present(&element, superclass);
                    }
                    found
                }
                None => None,
            };
            aggregate_index += 1;
        }
        None
    }

    fn process_class_hierarchy(
        &mut self,
        name: &TypeName,
        include_interfaces: bool,
        search_enclosing_class: &dyn Fn(&ClassType) -> bool,
    ) -> Option<P::Output> {
        let registry = self.registry;
        let Some(class) = registry.class(name) else {
            class_not_present(&AnnotatedElement::Class(name.clone()), name);
            return None;
        };
        if self.path.contains(name) {
            return None;
        }
        self.path.push(name.clone());
        let result = self.visit_class_level(class, include_interfaces, search_enclosing_class);
        self.path.pop();
        result
    }

    fn visit_class_level(
        &mut self,
        class: &'a ClassType,
        include_interfaces: bool,
        search_enclosing_class: &dyn Fn(&ClassType) -> bool,
    ) -> Option<P::Output> {
        if let Some(result) = self.processor.do_with_aggregate(self.context, self.aggregate_index) {
            return Some(result);
        }
        if has_plain_java_annotations_only(&class.name) {
            return None;
        }

        let element = AnnotatedElement::Class(class.name.clone());
        let declared = declared_annotations(self.registry, &element, &class.annotations);
        if let Some(result) = self
            .processor
            .do_with_annotations(self.context, self.aggregate_index, &element, &declared)
        {
            return Some(result);
        }
        self.aggregate_index += 1;

        if include_interfaces {
            for interface in class.interfaces.iter().filter_map(TypeRef::class_name) {
                if let Some(result) = self.process_class_hierarchy(interface, true, search_enclosing_class) {
                    return Some(result);
                }
            }
        }
        if let Some(superclass) = class.superclass_name() {
            if let Some(result) = self.process_class_hierarchy(superclass, include_interfaces, search_enclosing_class) {
                return Some(result);
            }
        }
        if search_enclosing_class(class) {
            if let Some(enclosing) = &class.enclosing_class {
                if let Some(result) = self.process_class_hierarchy(enclosing, include_interfaces, search_enclosing_class) {
                    return Some(result);
                }
            }
        }
        None
    }

    fn process_method(&mut self, method: &MethodRef, strategy: SearchStrategy) -> Option<P::Output> {
        let registry = self.registry;
        let Ok(root) = registry.method(method) else {
            method_not_present(method);
            return None;
        };
        match strategy {
            SearchStrategy::Direct | SearchStrategy::InheritedAnnotations => {
                if let Some(result) = self.processor.do_with_aggregate(self.context, 0) {
                    return Some(result);
                }
                self.process_method_annotations(0, method, root)
            }
            SearchStrategy::Superclass => self.process_method_hierarchy(&method.declaring_class, method, root, false),
            SearchStrategy::TypeHierarchy => self.process_method_hierarchy(&method.declaring_class, method, root, true),
        }
    }

    fn process_method_hierarchy(
        &mut self,
        class_name: &TypeName,
        root_ref: &MethodRef,
        root: &'a MethodDecl,
        include_interfaces: bool,
    ) -> Option<P::Output> {
        let registry = self.registry;
        let Some(class) = registry.class(class_name) else {
            class_not_present(&AnnotatedElement::Method(root_ref.clone()), class_name);
            return None;
        };
        if self.path.contains(class_name) {
            return None;
        }
        self.path.push(class_name.clone());
        let result = self.visit_method_level(class, root_ref, root, include_interfaces);
        self.path.pop();
        result
    }

    fn visit_method_level(
        &mut self,
        class: &'a ClassType,
        root_ref: &MethodRef,
        root: &'a MethodDecl,
        include_interfaces: bool,
    ) -> Option<P::Output> {
        let aggregate_index = self.aggregate_index;
        if let Some(result) = self.processor.do_with_aggregate(self.context, aggregate_index) {
            return Some(result);
        }
        if has_plain_java_annotations_only(&class.name) {
            return None;
        }

        let mut called_processor = false;
        if class.name == root_ref.declaring_class {
            called_processor = true;
            if let Some(result) = self.process_method_annotations(aggregate_index, root_ref, root) {
                return Some(result);
            }
        } else {
            for (index, candidate) in class.methods.iter().enumerate() {
                if is_override(self.registry, root_ref, root, class, candidate) {
                    called_processor = true;
                    let candidate_ref = MethodRef {
                        declaring_class: class.name.clone(),
                        index,
                    };
                    if let Some(result) = self.process_method_annotations(aggregate_index, &candidate_ref, candidate) {
                        return Some(result);
                    }
                }
            }
        }
        if root.is_private {
            return None;
        }
        if called_processor {
            self.aggregate_index += 1;
        }

        if include_interfaces {
            for interface in class.interfaces.iter().filter_map(TypeRef::class_name) {
                if let Some(result) = self.process_method_hierarchy(interface, root_ref, root, true) {
                    return Some(result);
                }
            }
        }
        if let Some(superclass) = class.superclass_name() {
            if let Some(result) = self.process_method_hierarchy(superclass, root_ref, root, include_interfaces) {
                return Some(result);
            }
        }
        None
    }

    fn process_method_annotations(
        &mut self,
        aggregate_index: usize,
        method_ref: &MethodRef,
        method: &MethodDecl,
    ) -> Option<P::Output> {
        let registry = self.registry;
        let element = AnnotatedElement::Method(method_ref.clone());
        let declared = declared_annotations(registry, &element, &method.annotations);
        if let Some(result) = self
            .processor
            .do_with_annotations(self.context, aggregate_index, &element, &declared)
        {
            return Some(result);
        }

        let (bridged_ref, bridged) = find_bridged_method(registry, method_ref, method)?;
        let bridged_element = AnnotatedElement::Method(bridged_ref);
        let additional: Vec<Annotation> = declared_annotations(registry, &bridged_element, &bridged.annotations)
            .iter()
            .filter(|annotation| !declared.contains(*annotation))
            .cloned()
            .collect();
        self.processor
            .do_with_annotations(self.context, aggregate_index, &bridged_element, &additional)
    }
}

/// Declared annotations of an element with plain, unregistered and
/// unreadable entries removed
///
/// Class and method results are cached per registry.
pub fn get_declared_annotations(registry: &TypeRegistry, element: &AnnotatedElement) -> Arc<[Annotation]> {
    match element {
        AnnotatedElement::Class(name) => match registry.class(name) {
            Some(class) => declared_annotations(registry, element, &class.annotations),
            None => Arc::from([]),
        },
        AnnotatedElement::Method(method) => match registry.method(method) {
            Ok(decl) => declared_annotations(registry, element, &decl.annotations),
            Err(_) => Arc::from([]),
        },
        AnnotatedElement::Annotations(annotations) => declared_annotations(registry, element, annotations),
    }
}

/// Filtered meta-annotations declared on an annotation type
pub(crate) fn meta_annotations(registry: &TypeRegistry, annotation_type: &AnnotationType) -> Arc<[Annotation]> {
    // Type names are unique across kinds, so the class key cannot collide.
    let element = AnnotatedElement::Class(annotation_type.name.clone());
    declared_annotations(registry, &element, &annotation_type.annotations)
}

fn declared_annotations(registry: &TypeRegistry, element: &AnnotatedElement, raw: &[Annotation]) -> Arc<[Annotation]> {
    if raw.is_empty() {
        return Arc::from([]);
    }
    match element {
        AnnotatedElement::Class(_) | AnnotatedElement::Method(_) => {
            DECLARED_ANNOTATIONS_CACHE.get_or_compute((registry.id(), element.clone()), || {
                tracing::trace!(%element, "caching declared annotations");
                filter_declared(registry, element, raw)
            })
        }
        AnnotatedElement::Annotations(_) => filter_declared(registry, element, raw),
    }
}

fn filter_declared(registry: &TypeRegistry, element: &AnnotatedElement, raw: &[Annotation]) -> Arc<[Annotation]> {
    raw.iter()
        .filter(|annotation| {
            let annotation_type = annotation.annotation_type();
            if AnnotationFilter::Plain.matches(annotation_type) {
                return false;
            }
            match AttributeMethods::for_annotation_type(registry, annotation_type) {
                Ok(methods) if methods.is_valid(registry, annotation) => true,
                Ok(_) => {
                    tracing::debug!(%element, %annotation_type, "skipping annotation with unreadable attributes");
                    false
                }
                Err(_) => {
                    tracing::debug!(%element, %annotation_type, "skipping annotation of unregistered type");
                    false
                }
            }
        })
        .cloned()
        .collect()
}

/// Whether a class can only carry annotations the engine ignores
pub fn has_plain_java_annotations_only(class_name: &str) -> bool {
    class_name.starts_with("java.") || class_name == ORDERED
}

fn element_has_plain_java_annotations_only(element: &AnnotatedElement) -> bool {
    match element {
        AnnotatedElement::Class(name) => has_plain_java_annotations_only(name),
        AnnotatedElement::Method(method) => has_plain_java_annotations_only(&method.declaring_class),
        AnnotatedElement::Annotations(_) => false,
    }
}

/// Whether a scan of the element can be skipped because it finds nothing
pub(crate) fn is_known_empty(
    registry: &TypeRegistry,
    element: &AnnotatedElement,
    strategy: SearchStrategy,
    search_enclosing_class: &dyn Fn(&ClassType) -> bool,
) -> bool {
    if element_has_plain_java_annotations_only(element) {
        return true;
    }
    if strategy == SearchStrategy::Direct || is_without_hierarchy(registry, element, search_enclosing_class) {
        if let AnnotatedElement::Method(method) = element {
            if registry.method(method).is_ok_and(|m| m.is_bridge) {
                return false;
            }
        }
        return get_declared_annotations(registry, element).is_empty();
    }
    false
}

pub(crate) fn is_without_hierarchy(
    registry: &TypeRegistry,
    element: &AnnotatedElement,
    search_enclosing_class: &dyn Fn(&ClassType) -> bool,
) -> bool {
    match element {
        AnnotatedElement::Class(name) => match registry.class(name) {
            Some(class) => class_without_hierarchy(class, search_enclosing_class),
            None => &**name == OBJECT,
        },
        AnnotatedElement::Method(method) => match registry.method(method) {
            Ok(decl) => {
                decl.is_private
                    || is_without_hierarchy(
                        registry,
                        &AnnotatedElement::Class(method.declaring_class.clone()),
                        search_enclosing_class,
                    )
            }
            Err(_) => true,
        },
        AnnotatedElement::Annotations(_) => true,
    }
}

fn class_without_hierarchy(class: &ClassType, search_enclosing_class: &dyn Fn(&ClassType) -> bool) -> bool {
    let no_super_types = class.superclass_name().is_none() && class.interfaces.is_empty();
    if search_enclosing_class(class) {
        no_super_types && class.enclosing_class.is_none()
    } else {
        no_super_types
    }
}

/// Annotation types visible on a class: its own plus `inherited` ones
/// from superclasses that it does not redeclare
fn inherited_annotation_types(registry: &TypeRegistry, root: &ClassType) -> Vec<TypeName> {
    let mut types: Vec<TypeName> = root.annotations.iter().map(|a| a.annotation_type().clone()).collect();
    let mut visited = FxHashSet::default();
    visited.insert(root.name.clone());
    let mut current = root.superclass_name().and_then(|name| registry.class(name));
    while let Some(class) = current {
        if !visited.insert(class.name.clone()) {
            break;
        }
        for annotation in &class.annotations {
            let annotation_type = annotation.annotation_type();
            let inherited = registry.annotation_type(annotation_type).is_some_and(|t| t.inherited);
            if inherited && !types.contains(annotation_type) {
                types.push(annotation_type.clone());
            }
        }
        current = class.superclass_name().and_then(|name| registry.class(name));
    }
    types
}

fn is_override(
    registry: &TypeRegistry,
    root_ref: &MethodRef,
    root: &MethodDecl,
    candidate_class: &ClassType,
    candidate: &MethodDecl,
) -> bool {
    !candidate.is_private
        && candidate.name == root.name
        && has_same_parameter_types(registry, root_ref, root, candidate_class, candidate)
}

fn has_same_parameter_types(
    registry: &TypeRegistry,
    root_ref: &MethodRef,
    root: &MethodDecl,
    candidate_class: &ClassType,
    candidate: &MethodDecl,
) -> bool {
    if candidate.parameter_types.len() != root.parameter_types.len() {
        return false;
    }
    let root_types: Vec<String> = root.parameter_types.iter().map(TypeRef::erasure).collect();
    if candidate.parameter_types.iter().map(TypeRef::erasure).eq(root_types.iter().cloned()) {
        return true;
    }
    has_same_generic_type_parameters(registry, root_ref, candidate_class, candidate, &root_types)
}

/// Resolve the candidate's type variables against the root method's
/// declaring class before comparing
fn has_same_generic_type_parameters(
    registry: &TypeRegistry,
    root_ref: &MethodRef,
    candidate_class: &ClassType,
    candidate: &MethodDecl,
    root_types: &[String],
) -> bool {
    let Some(root_class) = registry.class(&root_ref.declaring_class) else {
        return false;
    };
    let Some(bindings) = supertype_bindings(registry, root_class, &candidate_class.name) else {
        return false;
    };
    candidate
        .parameter_types
        .iter()
        .zip(root_types)
        .all(|(parameter, root_type)| parameter.substitute(&bindings).erasure() == *root_type)
}

/// Type variable bindings of `target` as seen from `from`
fn supertype_bindings(registry: &TypeRegistry, from: &ClassType, target: &str) -> Option<Bindings> {
    let mut visited = FxHashSet::default();
    find_bindings(registry, from, &Bindings::default(), target, &mut visited)
}

fn find_bindings(
    registry: &TypeRegistry,
    class: &ClassType,
    bindings: &Bindings,
    target: &str,
    visited: &mut FxHashSet<TypeName>,
) -> Option<Bindings> {
    if !visited.insert(class.name.clone()) {
        return None;
    }
    for supertype in class.superclass.iter().chain(&class.interfaces) {
        let TypeRef::Named { name, args } = supertype else {
            continue;
        };
        let Some(super_class) = registry.class(name) else {
            continue;
        };
        let super_bindings: Bindings = super_class
            .type_params
            .iter()
            .cloned()
            .zip(args.iter().map(|arg| arg.substitute(bindings)))
            .collect();
        if &**name == target {
            return Some(super_bindings);
        }
        if let Some(found) = find_bindings(registry, super_class, &super_bindings, target, visited) {
            return Some(found);
        }
    }
    None
}

/// The method a bridge method delegates to
fn find_bridged_method<'r>(
    registry: &'r TypeRegistry,
    bridge_ref: &MethodRef,
    bridge: &MethodDecl,
) -> Option<(MethodRef, &'r MethodDecl)> {
    if !bridge.is_bridge {
        return None;
    }
    let class = registry.class(&bridge_ref.declaring_class)?;
    class
        .methods
        .iter()
        .enumerate()
        .find(|(index, candidate)| {
            *index != bridge_ref.index
                && !candidate.is_bridge
                && candidate.name == bridge.name
                && candidate.parameter_types.len() == bridge.parameter_types.len()
                && candidate
                    .parameter_types
                    .iter()
                    .zip(&bridge.parameter_types)
                    .all(|(c, b)| is_assignable(registry, &c.erasure(), &b.erasure()))
        })
        .map(|(index, candidate)| {
            (
                MethodRef {
                    declaring_class: class.name.clone(),
                    index,
                },
                candidate,
            )
        })
}

/// Whether a value of type `from` can be passed where `to` is expected
fn is_assignable(registry: &TypeRegistry, from: &str, to: &str) -> bool {
    let mut visited = FxHashSet::default();
    assignable(registry, from, to, &mut visited)
}

fn assignable<'r>(registry: &'r TypeRegistry, from: &'r str, to: &str, visited: &mut FxHashSet<&'r str>) -> bool {
    if from == to || to == OBJECT {
        return true;
    }
    if !visited.insert(from) {
        return false;
    }
    let Some(class) = registry.class(from) else {
        return false;
    };
    class
        .superclass
        .iter()
        .chain(&class.interfaces)
        .filter_map(TypeRef::class_name)
        .any(|name| assignable(registry, name, to, visited))
}

fn class_not_present(element: &AnnotatedElement, name: &str) {
    handle_introspection_failure(
        element,
        &IntrospectionFailure::ClassNotPresent {
            name: name.to_string(),
        },
    );
}

fn method_not_present(method: &MethodRef) {
    let element = AnnotatedElement::Method(method.clone());
    handle_introspection_failure(
        &element,
        &IntrospectionFailure::MethodNotPresent {
            method: element.to_string(),
        },
    );
}

pub(crate) fn clear_cache() {
    DECLARED_ANNOTATIONS_CACHE.clear();
}
