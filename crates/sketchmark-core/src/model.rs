//! In-memory representation of one submitted class diagram.
//!
//! Elements are closed tagged variants (class, attribute, method,
//! relationship, package) so that every consumer matches exhaustively
//! instead of probing dynamic kinds.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::grading::Grade;

/// Database id of a submission, assigned by the surrounding application.
pub type SubmissionId = i64;

/// Equivalence-class id shared by structurally matching elements drawn in
/// different submissions. Stable for the lifetime of one engine instance,
/// not across rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimilarityClass(pub u64);

impl fmt::Display for SimilarityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Diagram types the wire format can declare. Only class diagrams are
/// analyzable; the rest exist so rejections can name what was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagramKind {
    ClassDiagram,
    ActivityDiagram,
    UseCaseDiagram,
    CommunicationDiagram,
    ComponentDiagram,
    DeploymentDiagram,
    ObjectDiagram,
    PetriNet,
    SyntaxTree,
    Flowchart,
}

impl DiagramKind {
    pub fn is_supported(&self) -> bool {
        matches!(self, DiagramKind::ClassDiagram)
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagramKind::ClassDiagram => "ClassDiagram",
            DiagramKind::ActivityDiagram => "ActivityDiagram",
            DiagramKind::UseCaseDiagram => "UseCaseDiagram",
            DiagramKind::CommunicationDiagram => "CommunicationDiagram",
            DiagramKind::ComponentDiagram => "ComponentDiagram",
            DiagramKind::DeploymentDiagram => "DeploymentDiagram",
            DiagramKind::ObjectDiagram => "ObjectDiagram",
            DiagramKind::PetriNet => "PetriNet",
            DiagramKind::SyntaxTree => "SyntaxTree",
            DiagramKind::Flowchart => "Flowchart",
        };
        write!(f, "{name}")
    }
}

impl FromStr for DiagramKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ClassDiagram" => Ok(DiagramKind::ClassDiagram),
            "ActivityDiagram" => Ok(DiagramKind::ActivityDiagram),
            "UseCaseDiagram" => Ok(DiagramKind::UseCaseDiagram),
            "CommunicationDiagram" => Ok(DiagramKind::CommunicationDiagram),
            "ComponentDiagram" => Ok(DiagramKind::ComponentDiagram),
            "DeploymentDiagram" => Ok(DiagramKind::DeploymentDiagram),
            "ObjectDiagram" => Ok(DiagramKind::ObjectDiagram),
            "PetriNet" => Ok(DiagramKind::PetriNet),
            "SyntaxTree" => Ok(DiagramKind::SyntaxTree),
            "Flowchart" => Ok(DiagramKind::Flowchart),
            other => Err(format!("unknown diagram type: {other}")),
        }
    }
}

/// Flavor of a class-like element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    Class,
    AbstractClass,
    Interface,
    Enumeration,
}

impl ClassKind {
    /// Maps the wire-format element type string, if it denotes a class.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Class" => Some(ClassKind::Class),
            "AbstractClass" => Some(ClassKind::AbstractClass),
            "Interface" => Some(ClassKind::Interface),
            "Enumeration" => Some(ClassKind::Enumeration),
            _ => None,
        }
    }
}

/// Kind of a relationship between two classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    Aggregation,
    Bidirectional,
    Composition,
    Dependency,
    Inheritance,
    Realization,
    Unidirectional,
}

impl RelationshipKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "ClassAggregation" => Some(RelationshipKind::Aggregation),
            "ClassBidirectional" => Some(RelationshipKind::Bidirectional),
            "ClassComposition" => Some(RelationshipKind::Composition),
            "ClassDependency" => Some(RelationshipKind::Dependency),
            "ClassInheritance" => Some(RelationshipKind::Inheritance),
            "ClassRealization" => Some(RelationshipKind::Realization),
            "ClassUnidirectional" => Some(RelationshipKind::Unidirectional),
            _ => None,
        }
    }

    /// Whether source and target are distinguishable for matching purposes.
    pub fn is_directed(&self) -> bool {
        !matches!(self, RelationshipKind::Bidirectional)
    }
}

/// The five element kinds a class diagram can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Class,
    Attribute,
    Method,
    Relationship,
    Package,
}

/// Kind-specific payload of an element. Owner fields reference the local id
/// of the containing element within the same document.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementData {
    Class {
        kind: ClassKind,
        package: Option<String>,
    },
    Attribute {
        data_type: String,
        owner: String,
    },
    Method {
        return_type: String,
        parameters: Vec<String>,
        owner: String,
    },
    Relationship {
        kind: RelationshipKind,
        source: String,
        target: String,
    },
    Package,
}

impl ElementData {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementData::Class { .. } => ElementKind::Class,
            ElementData::Attribute { .. } => ElementKind::Attribute,
            ElementData::Method { .. } => ElementKind::Method,
            ElementData::Relationship { .. } => ElementKind::Relationship,
            ElementData::Package => ElementKind::Package,
        }
    }
}

/// Structural location of an element within its diagram. Feedback for the
/// same similarity class is aggregated per context, so that an attribute
/// `name` inside `Animal` is never conflated with `name` inside `Invoice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Context {
    /// Top-level elements: classes, packages, relationships.
    None,
    /// Members: the similarity class of the owning class.
    Owner(SimilarityClass),
}

/// One element of a parsed diagram. The similarity class starts out
/// unassigned and is filled in exactly once when the model is registered
/// with an engine.
#[derive(Debug, Clone)]
pub struct Element {
    pub local_id: String,
    pub name: String,
    pub data: ElementData,
    pub context: Context,
    pub similarity_class: Option<SimilarityClass>,
}

impl Element {
    pub fn new(local_id: impl Into<String>, name: impl Into<String>, data: ElementData) -> Self {
        Self {
            local_id: local_id.into(),
            name: name.into(),
            data,
            context: Context::None,
            similarity_class: None,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.data.kind()
    }
}

/// One submission's parsed diagram plus its most recently computed grade.
/// Created once per submission and kept for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct Model {
    pub submission_id: SubmissionId,
    elements: Vec<Element>,
    by_local_id: HashMap<String, usize>,
    pub last_grade: Option<Grade>,
}

impl Model {
    pub fn new(submission_id: SubmissionId, elements: Vec<Element>) -> Self {
        let by_local_id = elements
            .iter()
            .enumerate()
            .map(|(position, element)| (element.local_id.clone(), position))
            .collect();
        Self {
            submission_id,
            elements,
            by_local_id,
            last_grade: None,
        }
    }

    pub fn element(&self, local_id: &str) -> Option<&Element> {
        self.by_local_id
            .get(local_id)
            .map(|&position| &self.elements[position])
    }

    /// Elements in parse order (packages, classes, members, relationships).
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub(crate) fn elements_mut(&mut self) -> &mut [Element] {
        &mut self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
