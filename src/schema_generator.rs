use crate::type_resolver::InferredType;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

/// Schema generator - converts inferred Go types to Swagger schemas.
///
/// Composite types become `object` schemas whose properties keep field declaration
/// order, array types wrap their element schema in `items`, and unresolved types fall
/// back to a property-less `object`.
pub struct SchemaGenerator;

/// Swagger schema node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// The type of the schema (string, number, boolean, object, array, file)
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,
    /// Properties for object types, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, SchemaNode>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
}

impl SchemaNode {
    /// A schema with only a type.
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: schema_type.to_string(),
            items: None,
            properties: None,
            required: None,
        }
    }

    pub fn array(items: SchemaNode) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of_type("array")
        }
    }
}

impl SchemaGenerator {
    /// Generate a schema for an inferred type
    pub fn generate_schema(inferred: &InferredType) -> SchemaNode {
        debug!("Generating schema for: {}", inferred.name);

        let element = Self::element_schema(inferred);
        if inferred.is_array {
            SchemaNode::array(element)
        } else {
            element
        }
    }

    /// Schema of the value itself, ignoring the array marker.
    fn element_schema(inferred: &InferredType) -> SchemaNode {
        if inferred.children.is_empty() {
            return SchemaNode::of_type(inferred.schema_type.as_deref().unwrap_or("object"));
        }

        let mut properties = IndexMap::new();
        let mut required = Vec::new();
        for child in &inferred.children {
            if child.required && !required.contains(&child.name) {
                required.push(child.name.clone());
            }
            // Two fields with the same JSON name: the later declaration wins
            properties.insert(child.name.clone(), Self::generate_schema(child));
        }

        SchemaNode {
            properties: Some(properties),
            required: (!required.is_empty()).then_some(required),
            ..SchemaNode::of_type("object")
        }
    }
}
