//! Cache key scheme.
//!
//! Three shapes:
//!
//! - entity: `<kind>:<id>`
//! - collection: `<kinds>:{"filter":...,"page":N,"limit":N[,"sort":"..."]}`
//! - per-user: `user:<id>:<resource>[:<page>:<limit>]`
//!
//! Collection keys serialize the filter canonically (object keys sorted at
//! every depth) so logically identical queries share one entry. Every
//! function here is pure.

use std::fmt::{self, Display, Write as _};

use serde_json::Value;

use super::glob::escape_glob;

pub const PROPERTY: &str = "property";
pub const PROPERTIES: &str = "properties";

/// Sub-resources cached per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserResource {
    Favorites,
    Recommendations,
}

impl UserResource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Recommendations => "recommendations",
        }
    }
}

impl Display for UserResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn entity_key(kind: &str, id: impl Display) -> String {
    format!("{kind}:{id}")
}

pub fn collection_key(
    kind_plural: &str,
    filter: &Value,
    page: u32,
    limit: u32,
    sort: Option<&str>,
) -> String {
    let mut key = String::with_capacity(kind_plural.len() + 64);
    key.push_str(kind_plural);
    key.push_str(":{\"filter\":");
    write_canonical(filter, &mut key);
    let _ = write!(key, ",\"page\":{page},\"limit\":{limit}");
    if let Some(sort) = sort {
        key.push_str(",\"sort\":");
        key.push_str(&Value::String(sort.to_string()).to_string());
    }
    key.push('}');
    key
}

/// `(page, limit)` is appended only for paged sub-resources.
pub fn user_scoped_key(
    user_id: impl Display,
    resource: UserResource,
    page: Option<(u32, u32)>,
) -> String {
    match page {
        Some((page, limit)) => format!("user:{user_id}:{resource}:{page}:{limit}"),
        None => format!("user:{user_id}:{resource}"),
    }
}

/// Pattern matching exactly one entity key.
pub fn entity_pattern(kind: &str, id: impl Display) -> String {
    format!("{kind}:{}", escape_glob(&id.to_string()))
}

/// Pattern matching every collection key of a kind.
pub fn collection_pattern(kind_plural: &str) -> String {
    format!("{kind_plural}:*")
}

/// Pattern matching the paged and unpaged keys of a user sub-resource.
pub fn user_scoped_pattern(user_id: impl Display, resource: UserResource) -> String {
    format!("user:{}:{resource}*", escape_glob(&user_id.to_string()))
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
