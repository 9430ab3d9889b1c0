//! Redis database keys used by the store

/// Key of the value of an object
pub fn object_key(class: &str, id: &str) -> String {
    format!("object:{}:{}", class, id)
}

/// Key of the set of object ids sharing an index value
pub fn index_key(class: &str, field: &str, value: &str) -> String {
    format!("index:{}:{}:{}", class, field, value)
}
