//! Declarative setup file.
//!
//! ```yaml
//! generated: { depth: 0, contract: Copygen }
//! types:
//!   - { namespace: models, name: User, kind: struct, members: [ { name: ID, type: int, tags: { api: id } } ] }
//! contracts:
//!   - name: Copygen
//!     options: [ "custom-key value" ]
//!     functions:
//!       - name: ModelsToDomain
//!         options: [ "map models.User.ID domain.Account.ID" ]
//!         params: [ { name: u, type: "*models.User" } ]
//!         results: [ { type: "*domain.Account" } ]
//! converters:
//!   - { name: c.Itoa, options: [ "convert .* models.User.ID" ] }
//! ```
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::catalog::{Member, StaticCatalog, TypeDecl};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Setup {
    #[serde(default)]
    pub generated: Generated,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub contracts: Vec<ContractSpec>,
    #[serde(default)]
    pub converters: Vec<ConverterSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generated {
    /// Ambient depth budget; 0 means unlimited.
    #[serde(default)]
    pub depth: u32,
    /// Name of the root contract declaring the functions.
    #[serde(default = "default_contract")]
    pub contract: String,
}

impl Default for Generated {
    fn default() -> Self {
        Generated { depth: 0, contract: default_contract() }
    }
}

fn default_contract() -> String {
    "Copygen".to_string()
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Struct,
    Interface,
    Opaque,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeSpec {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
    #[serde(default)]
    pub methods: Vec<MemberSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub tags: IndexMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractSpec {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub functions: Vec<FunctionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub params: Vec<ParamSpec>,
    #[serde(default)]
    pub results: Vec<ParamSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConverterSpec {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl Setup {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::Setup(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&source)
    }

    /// Deserialize with the YAML path of the offending node in error messages.
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let de = serde_yaml::Deserializer::from_str(source);
        serde_path_to_error::deserialize::<_, Setup>(de).map_err(|err| {
            let path = err.path().to_string();
            Error::Setup(format!("at {path} → {}", err.into_inner()))
        })
    }

    pub fn catalog(&self) -> StaticCatalog {
        let mut catalog = StaticCatalog::new();
        for ty in &self.types {
            let decl = match ty.kind {
                TypeKind::Struct => TypeDecl::Struct(ty.members.iter().map(MemberSpec::to_member).collect()),
                TypeKind::Interface => {
                    TypeDecl::Contract(ty.methods.iter().map(MemberSpec::to_member).collect())
                }
                TypeKind::Opaque => TypeDecl::Opaque,
            };
            catalog.insert(&ty.namespace, &ty.name, decl);
        }
        catalog
    }
}

impl MemberSpec {
    fn to_member(&self) -> Member {
        Member {
            name: self.name.clone(),
            signature: self.ty.clone(),
            tags: self.tags.clone(),
        }
    }
}
