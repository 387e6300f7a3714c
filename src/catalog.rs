//! Type catalog boundary.
//!
//! The builder asks the catalog for the declared members of a named type and
//! treats the answer as authoritative. `StaticCatalog` is the in-memory
//! implementation backed by the setup file's `types` section.
use indexmap::IndexMap;

/// A declared member (struct field or contract method) as raw catalog text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub signature: String,
    /// Struct-tag analogue: tag key -> tag value.
    pub tags: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDecl {
    /// Nominal composite; members are expanded into child fields.
    Struct(Vec<Member>),
    /// Interface type; methods become unexpanded pseudo-fields.
    Contract(Vec<Member>),
    /// Known but never expanded (named scalars, external types).
    Opaque,
}

pub trait TypeCatalog {
    /// `None` means the type is unknown to the catalog.
    fn resolve_members(&self, namespace: &str, name: &str) -> Option<TypeDecl>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    types: IndexMap<(String, String), TypeDecl>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, namespace: &str, name: &str, decl: TypeDecl) {
        self.types.insert((namespace.to_string(), name.to_string()), decl);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }
}

impl TypeCatalog for StaticCatalog {
    fn resolve_members(&self, namespace: &str, name: &str) -> Option<TypeDecl> {
        self.types
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[cfg(test)]
impl Member {
    pub fn new(name: &str, signature: &str) -> Self {
        Member {
            name: name.to_string(),
            signature: signature.to_string(),
            tags: IndexMap::new(),
        }
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }
}

#[cfg(test)]
impl StaticCatalog {
    pub fn with_struct(mut self, namespace: &str, name: &str, members: Vec<Member>) -> Self {
        self.insert(namespace, name, TypeDecl::Struct(members));
        self
    }

    pub fn with_contract(mut self, namespace: &str, name: &str, methods: Vec<Member>) -> Self {
        self.insert(namespace, name, TypeDecl::Contract(methods));
        self
    }
}
