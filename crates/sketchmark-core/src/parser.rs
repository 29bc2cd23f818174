//! Submission document parser.
//!
//! A submission arrives as a JSON object with a `type`, an `elements` array
//! and a `relationships` array. Classes list the ids of their attributes and
//! methods, which appear as separate entries in the elements array; owners
//! link classes into packages. The raw structures below are converted into
//! the validated [`Model`] domain type.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ParseError;
use crate::model::{
    ClassKind, DiagramKind, Element, ElementData, Model, RelationshipKind, SubmissionId,
};

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(rename = "type")]
    diagram_type: String,
    #[serde(default)]
    elements: Vec<RawElement>,
    #[serde(default)]
    relationships: Vec<RawRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    id: String,
    #[serde(rename = "type")]
    element_type: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    attributes: Vec<String>,
    #[serde(default)]
    methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRelationship {
    id: String,
    #[serde(rename = "type")]
    relationship_type: String,
    source: RawEndpoint,
    target: RawEndpoint,
}

#[derive(Debug, Deserialize)]
struct RawEndpoint {
    element: String,
}

/// Parse a submission document into a [`Model`].
///
/// Only class diagrams are supported; any other declared diagram type is an
/// error. Unknown element types are skipped with a warning so that a single
/// exotic element cannot sink the whole submission.
pub fn parse_submission(document: &str, submission_id: SubmissionId) -> Result<Model, ParseError> {
    let raw: RawDocument = serde_json::from_str(document)?;

    let kind: DiagramKind = raw
        .diagram_type
        .parse()
        .map_err(|_| ParseError::UnknownDiagramType(raw.diagram_type.clone()))?;
    if !kind.is_supported() {
        return Err(ParseError::UnsupportedDiagramType(kind));
    }

    build_class_diagram(raw, submission_id)
}

fn build_class_diagram(raw: RawDocument, submission_id: SubmissionId) -> Result<Model, ParseError> {
    let by_id: HashMap<&str, &RawElement> = raw
        .elements
        .iter()
        .map(|element| (element.id.as_str(), element))
        .collect();

    let mut elements = Vec::new();
    let mut package_ids = Vec::new();
    let mut class_ids = Vec::new();

    // packages first so classes can resolve their owner
    for element in &raw.elements {
        if element.element_type == "Package" {
            elements.push(Element::new(&element.id, element.name.trim(), ElementData::Package));
            package_ids.push(element.id.as_str());
        }
    }

    for element in &raw.elements {
        let Some(class_kind) = ClassKind::from_wire(&element.element_type) else {
            continue;
        };
        let package = element
            .owner
            .as_deref()
            .filter(|owner| package_ids.contains(owner))
            .map(str::to_owned);
        elements.push(Element::new(
            &element.id,
            element.name.trim(),
            ElementData::Class {
                kind: class_kind,
                package,
            },
        ));
        class_ids.push(element.id.as_str());

        for attribute_id in &element.attributes {
            let Some(attribute) = by_id.get(attribute_id.as_str()) else {
                tracing::warn!(submission_id, %attribute_id, "class lists missing attribute");
                continue;
            };
            let (name, data_type) = split_typed_name(&attribute.name);
            elements.push(Element::new(
                &attribute.id,
                name,
                ElementData::Attribute {
                    data_type,
                    owner: element.id.clone(),
                },
            ));
        }

        for method_id in &element.methods {
            let Some(method) = by_id.get(method_id.as_str()) else {
                tracing::warn!(submission_id, %method_id, "class lists missing method");
                continue;
            };
            let (name, parameters, return_type) = split_method_name(&method.name);
            elements.push(Element::new(
                &method.id,
                name,
                ElementData::Method {
                    return_type,
                    parameters,
                    owner: element.id.clone(),
                },
            ));
        }
    }

    for element in &raw.elements {
        if element.element_type != "Package"
            && ClassKind::from_wire(&element.element_type).is_none()
            && element.element_type != "ClassAttribute"
            && element.element_type != "ClassMethod"
        {
            tracing::warn!(
                submission_id,
                element_type = %element.element_type,
                "skipping element of unknown type"
            );
        }
    }

    for relationship in &raw.relationships {
        let Some(kind) = RelationshipKind::from_wire(&relationship.relationship_type) else {
            tracing::warn!(
                submission_id,
                relationship_type = %relationship.relationship_type,
                "skipping relationship of unknown type"
            );
            continue;
        };
        let source = relationship.source.element.as_str();
        let target = relationship.target.element.as_str();
        if package_ids.contains(&source) || package_ids.contains(&target) {
            // drawing tools allow packages as relationship endpoints; those
            // carry no assessable structure
            continue;
        }
        for endpoint in [source, target] {
            if !class_ids.contains(&endpoint) {
                return Err(ParseError::DanglingEndpoint {
                    relationship_id: relationship.id.clone(),
                    element_id: endpoint.to_owned(),
                });
            }
        }
        elements.push(Element::new(
            &relationship.id,
            "",
            ElementData::Relationship {
                kind,
                source: source.to_owned(),
                target: target.to_owned(),
            },
        ));
    }

    Ok(Model::new(submission_id, elements))
}

/// Split `name: Type` member declarations, stripping all whitespace.
fn split_typed_name(raw: &str) -> (String, String) {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.split_once(':') {
        Some((name, data_type)) => (name.to_owned(), data_type.to_owned()),
        None => (compact, String::new()),
    }
}

/// Split `name(p1, p2): Ret` method declarations into name, parameters and
/// return type. Missing pieces come back empty.
fn split_method_name(raw: &str) -> (String, Vec<String>, String) {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (signature, return_type) = match compact.split_once(':') {
        Some((signature, return_type)) => (signature, return_type),
        None => (compact.as_str(), ""),
    };
    let (name, parameters) = match signature.split_once('(') {
        Some((name, rest)) => {
            let inner = rest.trim_end_matches(')');
            let parameters = if inner.is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(str::to_owned).collect()
            };
            (name, parameters)
        }
        None => (signature, Vec::new()),
    };
    (name.to_owned(), parameters, return_type.to_owned())
}
