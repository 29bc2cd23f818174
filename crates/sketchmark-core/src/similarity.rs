//! Structural similarity detection.
//!
//! Every element of a newly registered model is compared against the
//! prototypes of all similarity classes minted so far. The best-scoring
//! prototype above the configured threshold wins its class id; otherwise a
//! fresh id is minted and the element becomes the prototype. Matching is
//! deterministic for a fixed registry state: scores are compared strictly,
//! so ties fall to the oldest (lowest) class id.
//!
//! Names are normalized (lowercased, whitespace stripped) and compared by
//! Levenshtein ratio. Members only ever match within the similarity class of
//! their owning class, and relationships require exact endpoint agreement.

use std::collections::HashMap;

use crate::model::{ClassKind, Context, ElementData, Model, RelationshipKind, SimilarityClass};

const CLASS_NAME_WEIGHT: f64 = 0.8;
const CLASS_KIND_WEIGHT: f64 = 0.2;
const MEMBER_NAME_WEIGHT: f64 = 0.7;
const MEMBER_TYPE_WEIGHT: f64 = 0.3;
const METHOD_NAME_WEIGHT: f64 = 0.6;
const METHOD_RETURN_WEIGHT: f64 = 0.2;
const METHOD_PARAMS_WEIGHT: f64 = 0.2;

/// Canonical shape of the element that minted a similarity class.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Descriptor {
    Class {
        name: String,
        kind: ClassKind,
    },
    Attribute {
        name: String,
        data_type: String,
        owner: SimilarityClass,
    },
    Method {
        name: String,
        return_type: String,
        parameters: Vec<String>,
        owner: SimilarityClass,
    },
    Relationship {
        kind: RelationshipKind,
        source: SimilarityClass,
        target: SimilarityClass,
    },
    Package {
        name: String,
    },
}

/// Registry of all similarity classes observed by one engine, with the
/// prototype descriptor that minted each of them.
#[derive(Debug, Default)]
pub struct SimilarityRegistry {
    prototypes: Vec<(SimilarityClass, Descriptor)>,
    next_id: u64,
}

impl SimilarityRegistry {
    /// Number of distinct similarity classes minted so far.
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Find the best matching class for `descriptor`, or mint a new one.
    fn classify(&mut self, descriptor: Descriptor, threshold: f64) -> SimilarityClass {
        let mut best: Option<(f64, SimilarityClass)> = None;
        for (class, prototype) in &self.prototypes {
            let score = similarity(prototype, &descriptor);
            if score < threshold {
                continue;
            }
            // strict comparison keeps the oldest class on ties
            if best.is_none_or(|(best_score, _)| score > best_score) {
                best = Some((score, *class));
            }
        }
        if let Some((_, class)) = best {
            return class;
        }

        let class = SimilarityClass(self.next_id);
        self.next_id += 1;
        self.prototypes.push((class, descriptor));
        class
    }
}

/// Assign a similarity class to every element of `model`, registering new
/// prototypes in `registry` as a side effect.
///
/// Classes and packages are classified first so that members and
/// relationships can refer to their owners' class ids; members additionally
/// receive their owner's class as [`Context`].
pub fn assign_similarity(model: &mut Model, registry: &mut SimilarityRegistry, threshold: f64) {
    let mut class_of: HashMap<String, SimilarityClass> = HashMap::new();

    // pass 1: classes and packages
    for position in 0..model.elements().len() {
        let element = &model.elements()[position];
        let descriptor = match &element.data {
            ElementData::Class { kind, .. } => Descriptor::Class {
                name: normalize(&element.name),
                kind: *kind,
            },
            ElementData::Package => Descriptor::Package {
                name: normalize(&element.name),
            },
            _ => continue,
        };
        let class = registry.classify(descriptor, threshold);
        let element = &mut model.elements_mut()[position];
        element.similarity_class = Some(class);
        if matches!(element.data, ElementData::Class { .. }) {
            class_of.insert(element.local_id.clone(), class);
        }
    }

    // pass 2: attributes and methods, contextualized by their owner
    for position in 0..model.elements().len() {
        let element = &model.elements()[position];
        let (descriptor, owner) = match &element.data {
            ElementData::Attribute { data_type, owner } => {
                let Some(owner_class) = class_of.get(owner).copied() else {
                    tracing::warn!(
                        submission_id = model.submission_id,
                        element_id = %element.local_id,
                        "member references unclassified owner, leaving unmatched"
                    );
                    continue;
                };
                (
                    Descriptor::Attribute {
                        name: normalize(&element.name),
                        data_type: normalize(data_type),
                        owner: owner_class,
                    },
                    owner_class,
                )
            }
            ElementData::Method {
                return_type,
                parameters,
                owner,
            } => {
                let Some(owner_class) = class_of.get(owner).copied() else {
                    tracing::warn!(
                        submission_id = model.submission_id,
                        element_id = %element.local_id,
                        "member references unclassified owner, leaving unmatched"
                    );
                    continue;
                };
                (
                    Descriptor::Method {
                        name: normalize(&element.name),
                        return_type: normalize(return_type),
                        parameters: parameters.iter().map(|p| normalize(p)).collect(),
                        owner: owner_class,
                    },
                    owner_class,
                )
            }
            _ => continue,
        };
        let class = registry.classify(descriptor, threshold);
        let element = &mut model.elements_mut()[position];
        element.similarity_class = Some(class);
        element.context = Context::Owner(owner);
    }

    // pass 3: relationships, identified by their endpoints' classes
    for position in 0..model.elements().len() {
        let element = &model.elements()[position];
        let ElementData::Relationship { kind, source, target } = &element.data else {
            continue;
        };
        let (Some(source_class), Some(target_class)) =
            (class_of.get(source).copied(), class_of.get(target).copied())
        else {
            tracing::warn!(
                submission_id = model.submission_id,
                element_id = %element.local_id,
                "relationship references unclassified endpoint, leaving unmatched"
            );
            continue;
        };
        let descriptor = Descriptor::Relationship {
            kind: *kind,
            source: source_class,
            target: target_class,
        };
        let class = registry.classify(descriptor, threshold);
        model.elements_mut()[position].similarity_class = Some(class);
    }
}

/// Similarity in `[0, 1]` between two descriptors. Cross-kind comparisons
/// are always 0.
pub(crate) fn similarity(a: &Descriptor, b: &Descriptor) -> f64 {
    match (a, b) {
        (
            Descriptor::Class { name: a_name, kind: a_kind },
            Descriptor::Class { name: b_name, kind: b_kind },
        ) => {
            let kind_score = if a_kind == b_kind { CLASS_KIND_WEIGHT } else { 0.0 };
            CLASS_NAME_WEIGHT * name_similarity(a_name, b_name) + kind_score
        }
        (
            Descriptor::Attribute { name: a_name, data_type: a_type, owner: a_owner },
            Descriptor::Attribute { name: b_name, data_type: b_type, owner: b_owner },
        ) => {
            if a_owner != b_owner {
                return 0.0;
            }
            MEMBER_NAME_WEIGHT * name_similarity(a_name, b_name)
                + MEMBER_TYPE_WEIGHT * name_similarity(a_type, b_type)
        }
        (
            Descriptor::Method {
                name: a_name,
                return_type: a_return,
                parameters: a_params,
                owner: a_owner,
            },
            Descriptor::Method {
                name: b_name,
                return_type: b_return,
                parameters: b_params,
                owner: b_owner,
            },
        ) => {
            if a_owner != b_owner {
                return 0.0;
            }
            METHOD_NAME_WEIGHT * name_similarity(a_name, b_name)
                + METHOD_RETURN_WEIGHT * name_similarity(a_return, b_return)
                + METHOD_PARAMS_WEIGHT * parameter_similarity(a_params, b_params)
        }
        (
            Descriptor::Relationship { kind: a_kind, source: a_source, target: a_target },
            Descriptor::Relationship { kind: b_kind, source: b_source, target: b_target },
        ) => {
            if a_kind != b_kind {
                return 0.0;
            }
            let exact = a_source == b_source && a_target == b_target;
            let flipped =
                !a_kind.is_directed() && a_source == b_target && a_target == b_source;
            if exact || flipped {
                1.0
            } else {
                0.0
            }
        }
        (Descriptor::Package { name: a_name }, Descriptor::Package { name: b_name }) => {
            name_similarity(a_name, b_name)
        }
        _ => 0.0,
    }
}

/// Lowercase and strip all whitespace, the canonical form for matching.
pub(crate) fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Levenshtein ratio between two already-normalized names.
pub(crate) fn name_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn parameter_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matching = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matching as f64 / a.len().max(b.len()) as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, char_a) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, char_b) in b.iter().enumerate() {
            let substitution = if char_a == char_b { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + substitution);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}
