use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Type and id pair referencing a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Resource type
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id
    pub id: String,
    /// Non-standard information about the reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResourceIdentifier {
    /// Creates an identifier without meta information
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            meta: None,
        }
    }
}

/// Linkage of a relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    /// To-one relationship
    One(ResourceIdentifier),
    /// To-many relationship
    Many(Vec<ResourceIdentifier>),
}

/// Relationship of a resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Linkage, absent or null when not loaded or empty
    #[serde(default)]
    pub data: Option<RelationshipData>,
}

impl Relationship {
    /// Creates a to-one relationship
    pub fn one(identifier: ResourceIdentifier) -> Self {
        Self {
            data: Some(RelationshipData::One(identifier)),
        }
    }
}

/// Single resource object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type
    #[serde(rename = "type")]
    pub kind: String,
    /// Resource id, absent on creation requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Attribute object
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Relationships by name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub relationships: HashMap<String, Relationship>,
}

impl Resource {
    /// Decodes the attribute object into a typed structure
    pub fn attributes<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.attributes.clone()))
    }

    /// Target of a to-one relationship
    pub fn related(&self, name: &str) -> Option<&ResourceIdentifier> {
        match self.relationships.get(name)?.data.as_ref()? {
            RelationshipData::One(identifier) => Some(identifier),
            RelationshipData::Many(_) => None,
        }
    }

    /// Targets of a relationship, regardless of its cardinality
    pub fn related_all(&self, name: &str) -> Vec<&ResourceIdentifier> {
        match self.relationships.get(name).and_then(|r| r.data.as_ref()) {
            Some(RelationshipData::One(identifier)) => vec![identifier],
            Some(RelationshipData::Many(identifiers)) => identifiers.iter().collect(),
            None => Vec::new(),
        }
    }
}

/// Pagination links
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    /// Next page, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Top-level document carrying primary data of type `T`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<T> {
    /// Primary data
    pub data: T,
    /// Related resources requested through `include`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Resource>,
    /// Pagination links
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl<T> Document<T> {
    /// Wraps primary data into a document without included resources
    pub fn new(data: T) -> Self {
        Self {
            data,
            included: Vec::new(),
            links: None,
        }
    }

    /// Looks up an included resource
    pub fn find_included(&self, identifier: &ResourceIdentifier) -> Option<&Resource> {
        self.included.iter().find(|resource| {
            resource.kind == identifier.kind && resource.id.as_deref() == Some(identifier.id.as_str())
        })
    }

    /// Link to the next page of a collection
    pub fn next_page(&self) -> Option<&str> {
        self.links.as_ref()?.next.as_deref()
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolve_included_relationships() {
        let document: Document<Resource> = serde_json::from_value(json!({
            "data": {
                "type": "groups", "id": "g1",
                "attributes": { "code": "GRP1" },
                "relationships": {
                    "admins": { "data": [{ "type": "users", "id": "u1" }] },
                    "currency": { "data": null }
                }
            },
            "included": [
                { "type": "users", "id": "u1", "attributes": { "email": "a@b.c" } }
            ],
            "links": { "next": null }
        }))
        .unwrap();

        let admins = document.data.related_all("admins");
        assert_eq!(admins.len(), 1);

        let admin = document.find_included(admins[0]).unwrap();
        assert_eq!(admin.attributes["email"], "a@b.c");

        assert_eq!(document.data.related("currency"), None);
        assert_eq!(document.next_page(), None);
    }
}
