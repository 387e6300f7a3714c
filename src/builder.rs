//! Field graph builder.
//!
//! Expands a root signature into a field tree by asking the catalog for the
//! members of every nominal composite it meets. Descent is bounded by the
//! depth budget and by a cycle cache keyed on `(owning type, member)`: the
//! first visit of a pair is built normally, every later visit becomes a
//! childless alias of the first one.
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::catalog::{Member, TypeCatalog, TypeDecl};
use crate::error::{Error, Result};
use crate::field::{Field, FieldArena, FieldId};
use crate::options::{depth_for, Depth, Rule};
use crate::signature::TypeSignature;

/// `(qualified owning type, member name) -> first built field`.
///
/// Scoped to a single root build; callers never share one across roots.
pub type CycleCache = HashMap<(String, String), FieldId>;

pub struct FieldBuilder<'a> {
    catalog: &'a dyn TypeCatalog,
    rules: &'a [Rule],
}

impl<'a> FieldBuilder<'a> {
    /// `rules` are consulted for `depth` overrides only.
    pub fn new(catalog: &'a dyn TypeCatalog, rules: &'a [Rule]) -> Self {
        FieldBuilder { catalog, rules }
    }

    /// Build the tree for one parameter or result.
    ///
    /// Unlike nested members, an unresolvable root type is fatal.
    pub fn build_root(
        &self,
        arena: &mut FieldArena,
        signature: &str,
        variable: &str,
        budget: Depth,
        location: &str,
    ) -> Result<FieldId> {
        let signature = TypeSignature::parse(signature).map_err(|e| e.at(location))?;
        let base = signature.base();
        if base.is_nominal() && self.catalog.resolve_members(&base.namespace, &base.name).is_none() {
            return Err(Error::Resolution {
                type_name: signature.to_string(),
                location: location.to_string(),
            });
        }

        let mut cache = CycleCache::new();
        let root = self.build_field(arena, "", signature, IndexMap::new(), None, budget, &mut cache)?;
        arena[root].variable = variable.to_string();
        debug!(root = %arena.path(root), nodes = arena.len(), "built field tree");
        Ok(root)
    }

    pub fn build_field(
        &self,
        arena: &mut FieldArena,
        name: &str,
        signature: TypeSignature,
        tags: IndexMap<String, String>,
        parent: Option<FieldId>,
        budget: Depth,
        cache: &mut CycleCache,
    ) -> Result<FieldId> {
        let decl = if signature.is_nominal() {
            let decl = self.catalog.resolve_members(&signature.namespace, &signature.name);
            if decl.is_none() {
                warn!(
                    member = name,
                    ty = %signature,
                    "cannot resolve member type; keeping it as an opaque leaf"
                );
            }
            decl
        } else {
            None
        };

        let signature = if matches!(decl, Some(TypeDecl::Contract(_))) {
            signature.into_contract()
        } else {
            signature
        };

        let mut field = Field::new(name, signature);
        field.tags = tags;
        field.parent = parent;
        let id = arena.add(field);

        let path = arena.path(id);
        let override_depth = depth_for(self.rules, &path, &arena[id].signature.to_string());
        arena[id].options.depth = override_depth;
        let Some(child_budget) = override_depth.unwrap_or(budget).descend() else {
            return Ok(id);
        };

        match decl {
            Some(TypeDecl::Struct(members)) => {
                let owner = arena[id].signature.qualified_name();
                for member in members {
                    self.build_member(arena, id, &owner, member, child_budget, cache)?;
                }
            }
            Some(TypeDecl::Contract(methods)) => {
                let owner = arena[id].signature.qualified_name();
                for method in methods {
                    let signature = TypeSignature::parse(&method.signature)
                        .map_err(|e| e.at(&format!("method `{}` of `{owner}`", method.name)))?;
                    let mut pseudo = Field::new(&method.name, signature);
                    pseudo.parent = Some(id);
                    arena.add(pseudo);
                }
            }
            Some(TypeDecl::Opaque) | None => {}
        }
        Ok(id)
    }

    fn build_member(
        &self,
        arena: &mut FieldArena,
        parent: FieldId,
        owner: &str,
        member: Member,
        budget: Depth,
        cache: &mut CycleCache,
    ) -> Result<FieldId> {
        let signature = TypeSignature::parse(&member.signature)
            .map_err(|e| e.at(&format!("member `{}` of `{owner}`", member.name)))?;
        let key = (owner.to_string(), member.name.clone());

        if let Some(&original) = cache.get(&key) {
            let mut alias = Field::new(&member.name, signature);
            alias.tags = member.tags;
            alias.parent = Some(parent);
            let id = arena.add_alias(alias, original);
            debug!(owner, member = %member.name, "repeated member; added alias");
            return Ok(id);
        }

        // Record the id this member is about to get so a recursive visit of
        // the same pair turns into an alias.
        cache.insert(key, arena.next_id());
        self.build_field(arena, &member.name, signature, member.tags, Some(parent), budget, cache)
    }
}
