//! Matching engine.
//!
//! Destination fields are scanned in pre-order (outer loop) against the
//! current pre-order of each source tree (inner loop). The first source that
//! satisfies the destination's method wins; both fields are then frozen, so
//! nothing beneath a matched field is matched on its own. A source field is
//! not consumed by a match and may satisfy later destinations too.
use tracing::debug;

use crate::field::{Field, FieldArena, FieldId};
use crate::generator::Function;

pub fn match_function(function: &mut Function) {
    let manual = function.manual;
    for &to in &function.to {
        for &from in &function.from {
            match_roots(&mut function.arena, to, from, manual);
        }
    }
}

fn match_roots(arena: &mut FieldArena, to: FieldId, from: FieldId, manual: bool) {
    let mut stack = vec![to];
    while let Some(dest) = stack.pop() {
        if arena[dest].matched_from.is_none() {
            let found = {
                let view: &FieldArena = arena;
                view.flatten(from).into_iter().find(|&src| is_match(view, dest, src, manual))
            };
            if let Some(src) = found {
                debug!(to = %arena.path(dest), from = %arena.path(src), "matched");
                arena.link(dest, src);
                arena.clear_children(dest);
                arena.clear_children(src);
            }
        }
        stack.extend(arena[dest].children.iter().rev().copied());
    }
}

fn is_match(arena: &FieldArena, dest: FieldId, src: FieldId, manual: bool) -> bool {
    let (d, s) = (&arena[dest], &arena[src]);
    if !manual {
        return same_name_and_type(d, s);
    }
    if d.options.is_automatch() {
        return s.options.is_automatch() && same_name_and_type(d, s);
    }
    if let Some(tag) = d.options.tag() {
        return s.options.tag() == Some(tag);
    }
    s.options.map_target() == Some(arena.path(dest).as_str())
}

/// Identical names, and either identical signatures or a destination option
/// that licenses a type-changing assignment.
fn same_name_and_type(d: &Field, s: &Field) -> bool {
    if d.name != s.name {
        return false;
    }
    if d.signature == s.signature || d.options.convert.is_some() {
        return true;
    }
    d.options.cast.is_some() && d.signature.is_basic() && s.signature.is_basic()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Member, StaticCatalog};
    use crate::options::Rule;
    use pretty_assertions::assert_eq;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new()
            .with_struct(
                "domain",
                "Account",
                vec![
                    Member::new("ID", "int").with_tag("api", "id"),
                    Member::new("Name", "string"),
                    Member::new("Owner", "*domain.Owner"),
                ],
            )
            .with_struct("domain", "Owner", vec![Member::new("Email", "string")])
            .with_struct(
                "models",
                "User",
                vec![
                    Member::new("UserID", "int").with_tag("api", "id"),
                    Member::new("ID", "int64"),
                    Member::new("Name", "string"),
                    Member::new("Owner", "*domain.Owner"),
                ],
            )
            .with_struct(
                "models",
                "Other",
                vec![Member::new("Key", "int").with_tag("db", "id"), Member::new("Name", "string")],
            )
    }

    fn pairs(function: &Function) -> Vec<(String, String)> {
        let arena = &function.arena;
        let mut out = Vec::new();
        for &to in &function.to {
            for id in arena.flatten(to) {
                if let Some(src) = arena[id].matched_from {
                    out.push((arena.path(id), arena.path(src)));
                }
            }
        }
        out
    }

    fn run_many(lines: &[&str], to: &[&str], from: &[&str]) -> Function {
        let rules: Vec<Rule> = lines.iter().map(|l| Rule::parse(l, Some("c.Conv")).unwrap()).collect();
        let catalog = catalog();
        let to: Vec<(&str, &str)> = to.iter().map(|t| ("a", *t)).collect();
        let from: Vec<(&str, &str)> = from.iter().map(|t| ("u", *t)).collect();
        let mut function = Function::build("F", &catalog, rules, &to, &from, 0).unwrap();
        match_function(&mut function);
        function
    }

    fn run(lines: &[&str], from: &[&str]) -> Function {
        run_many(lines, &["*domain.Account"], from)
    }

    #[test]
    fn default_matching_needs_name_and_type() {
        let f = run(&[], &["*models.User"]);
        assert_eq!(
            pairs(&f),
            vec![
                ("domain.Account.Name".to_string(), "models.User.Name".to_string()),
                ("domain.Account.Owner".to_string(), "models.User.Owner".to_string()),
            ]
        );
        // matched composites are frozen as a whole
        let owner = f.arena.flatten(f.to[0])[3];
        assert!(f.arena[owner].children.is_empty());
    }

    #[test]
    fn convert_licenses_type_change() {
        let f = run(&["convert F domain.Account.ID"], &["*models.User"]);
        assert!(pairs(&f).contains(&("domain.Account.ID".to_string(), "models.User.ID".to_string())));
        // convert alone keeps plain automatch
        assert!(!f.manual);
    }

    #[test]
    fn cast_licenses_basic_conversions() {
        let f = run(&["cast domain.Account.ID"], &["*models.User"]);
        assert!(pairs(&f).contains(&("domain.Account.ID".to_string(), "models.User.ID".to_string())));
    }

    #[test]
    fn map_is_exact() {
        let f = run(&["map models.User.UserID domain.Account.ID"], &["*models.User"]);
        assert!(f.manual);
        // Name/Owner coincide by name but manual mode needs an explicit method
        assert_eq!(
            pairs(&f),
            vec![("domain.Account.ID".to_string(), "models.User.UserID".to_string())]
        );
    }

    #[test]
    fn tag_requires_the_same_key_and_value() {
        let f = run(&["tag .* api"], &["*models.Other", "*models.User"]);
        assert_eq!(
            pairs(&f),
            vec![("domain.Account.ID".to_string(), "models.User.UserID".to_string())]
        );
    }

    #[test]
    fn automatch_option_in_manual_mode() {
        let f = run(
            &["automatch domain.Account.Name", "automatch models.User.Name", "map models.User.UserID domain.Account.ID"],
            &["*models.User"],
        );
        assert_eq!(
            pairs(&f),
            vec![
                ("domain.Account.ID".to_string(), "models.User.UserID".to_string()),
                ("domain.Account.Name".to_string(), "models.User.Name".to_string()),
            ]
        );
    }

    #[test]
    fn last_declared_map_wins_for_a_source() {
        let f = run(
            &["map models.User.Name domain.Account.Name", "map models.User.Name domain.Account.Owner.Email"],
            &["*models.User"],
        );
        assert_eq!(
            pairs(&f),
            vec![("domain.Account.Owner.Email".to_string(), "models.User.Name".to_string())]
        );
    }

    #[test]
    fn a_source_may_feed_several_destinations() {
        let f = run_many(&[], &["*domain.Account", "*domain.Account"], &["*models.User"]);
        let name_pairs: Vec<_> = pairs(&f).into_iter().filter(|(to, _)| to.ends_with(".Name")).collect();
        assert_eq!(name_pairs.len(), 2);

        let first_name = f.arena.flatten(f.to[0])[2];
        let second_name = f.arena.flatten(f.to[1])[2];
        let source = f.arena[second_name].matched_from.unwrap();
        assert_eq!(f.arena[first_name].matched_from, Some(source));
        // the source keeps its first partner
        assert_eq!(f.arena[source].matched_to, Some(first_name));
    }
}
