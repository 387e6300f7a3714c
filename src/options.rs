//! Option engine: rule parsing and per-field resolution.
//!
//! A rule line is `<category> <args...>`. Path arguments compile to anchored
//! regexes (`^pattern$`) matched against a field's dotted path (and, for
//! `deepcopy`/`depth`, its signature text). Rules are kept in declaration
//! order and walked in reverse, so the last declared matching rule wins.
use std::fmt;

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{Error, Result};
use crate::field::{FieldArena, FieldId};

// ------------------------------- Patterns -------------------------------- //

#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn compile(source: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Pattern { regex })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

// --------------------------------- Rules ---------------------------------- //

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Automatch,
    Map,
    Tag,
    Convert,
    Cast,
    Deepcopy,
    Depth,
    Custom,
}

impl Category {
    pub fn from_token(token: &str) -> Self {
        match token {
            "automatch" => Category::Automatch,
            "map" => Category::Map,
            "tag" => Category::Tag,
            "convert" => Category::Convert,
            "cast" => Category::Cast,
            "deepcopy" => Category::Deepcopy,
            "depth" => Category::Depth,
            _ => Category::Custom,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Automatch => "automatch",
            Category::Map => "map",
            Category::Tag => "tag",
            Category::Convert => "convert",
            Category::Cast => "cast",
            Category::Deepcopy => "deepcopy",
            Category::Depth => "depth",
            Category::Custom => "custom",
        })
    }
}

/// Payload of a parsed rule, one variant per category.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Automatch { field: Pattern },
    Map { field: Pattern, target: String },
    Tag { field: Pattern, key: String },
    Convert { function: Pattern, field: Pattern, converter: String },
    Cast { field: Pattern, expr: String },
    Deepcopy { field: Pattern },
    Depth { field: Pattern, level: i64 },
    Custom { key: String, value: String },
}

/// A parsed option rule together with its source text.
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: RuleKind,
    pub text: String,
}

impl Rule {
    /// Parse a full rule line. `converter` is the name of the enclosing
    /// converter function, required by `convert` rules.
    pub fn parse(line: &str, converter: Option<&str>) -> Result<Self> {
        let line = line.trim();
        let (token, args) = match line.split_once(char::is_whitespace) {
            Some((token, args)) => (token, args),
            None => (line, ""),
        };
        if token.is_empty() {
            return Err(Error::option_format("custom", line, "empty rule"));
        }
        parse_option(token, args, converter)
    }

    pub fn category(&self) -> Category {
        match self.kind {
            RuleKind::Automatch { .. } => Category::Automatch,
            RuleKind::Map { .. } => Category::Map,
            RuleKind::Tag { .. } => Category::Tag,
            RuleKind::Convert { .. } => Category::Convert,
            RuleKind::Cast { .. } => Category::Cast,
            RuleKind::Deepcopy { .. } => Category::Deepcopy,
            RuleKind::Depth { .. } => Category::Depth,
            RuleKind::Custom { .. } => Category::Custom,
        }
    }

    /// Rules that replace plain automatch with explicit per-field matching.
    pub fn is_match_method(&self) -> bool {
        matches!(
            self.kind,
            RuleKind::Automatch { .. } | RuleKind::Map { .. } | RuleKind::Tag { .. }
        )
    }

    pub fn custom(&self) -> Option<(&str, &str)> {
        match &self.kind {
            RuleKind::Custom { key, value } => Some((key, value)),
            _ => None,
        }
    }
}

/// Custom annotations: every value declared under a key, in order.
pub type Custom = IndexMap<String, Vec<String>>;

/// Append a custom rule to `custom`; other categories are left alone and
/// reported with `false`.
pub fn collect_custom(custom: &mut Custom, rule: &Rule) -> bool {
    match rule.custom() {
        Some((key, value)) => {
            custom.entry(key.to_string()).or_default().push(value.to_string());
            true
        }
        None => false,
    }
}

pub fn parse_option(token: &str, args_text: &str, converter: Option<&str>) -> Result<Rule> {
    let category = Category::from_token(token);
    let text = format!("{token} {args_text}").trim().to_string();
    let args: Vec<&str> = args_text.split_whitespace().collect();

    let pattern = |source: &str| -> Result<Pattern> {
        Pattern::compile(source)
            .map_err(|e| Error::option_format(category.to_string(), text.clone(), e.to_string()))
    };

    let kind = match category {
        Category::Automatch => {
            check_arity(category, &text, args.len(), &[1])?;
            RuleKind::Automatch { field: pattern(args[0])? }
        }
        Category::Map => {
            check_arity(category, &text, args.len(), &[2])?;
            RuleKind::Map { field: pattern(args[0])?, target: args[1].to_string() }
        }
        Category::Tag => {
            check_arity(category, &text, args.len(), &[2])?;
            RuleKind::Tag { field: pattern(args[0])?, key: args[1].to_string() }
        }
        Category::Convert => {
            check_arity(category, &text, args.len(), &[2])?;
            let converter = converter.ok_or_else(|| {
                Error::option_format("convert", text.clone(), "declared outside a converter")
            })?;
            RuleKind::Convert {
                function: pattern(args[0])?,
                field: pattern(args[1])?,
                converter: converter.to_string(),
            }
        }
        Category::Cast => {
            check_arity(category, &text, args.len(), &[1, 2])?;
            RuleKind::Cast {
                field: pattern(args[0])?,
                expr: args.get(1).map(|s| s.to_string()).unwrap_or_default(),
            }
        }
        Category::Deepcopy => {
            check_arity(category, &text, args.len(), &[1])?;
            RuleKind::Deepcopy { field: pattern(args[0])? }
        }
        Category::Depth => {
            check_arity(category, &text, args.len(), &[2])?;
            let level = args[1].parse::<i64>().map_err(|_| {
                Error::option_format("depth", text.clone(), format!("`{}` is not an integer", args[1]))
            })?;
            RuleKind::Depth { field: pattern(args[0])?, level }
        }
        Category::Custom => {
            if args.is_empty() {
                return Err(Error::option_format(token, text, "custom option needs a value"));
            }
            RuleKind::Custom { key: token.to_string(), value: args.join(" ") }
        }
    };

    Ok(Rule { kind, text })
}

fn check_arity(category: Category, text: &str, found: usize, expected: &[usize]) -> Result<()> {
    if expected.contains(&found) {
        return Ok(());
    }
    let want = expected.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(" or ");
    Err(Error::option_format(
        category.to_string(),
        text,
        format!("expected {want} argument(s), found {found}"),
    ))
}

// ----------------------------- Field options ------------------------------ //

/// Descent budget for field building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    Unlimited,
    Limited(u32),
}

impl Depth {
    /// Ambient budget from configuration: 0 means unlimited.
    pub fn from_budget(budget: u32) -> Self {
        if budget == 0 { Depth::Unlimited } else { Depth::Limited(budget) }
    }

    /// Level from a `depth` rule: 0 and below mean "never descend".
    pub fn from_level(level: i64) -> Self {
        if level <= 0 {
            Depth::Limited(0)
        } else {
            Depth::Limited(u32::try_from(level).unwrap_or(u32::MAX))
        }
    }

    /// Budget for the children, or `None` when descent is exhausted.
    pub fn descend(self) -> Option<Depth> {
        match self {
            Depth::Unlimited => Some(Depth::Unlimited),
            Depth::Limited(0) => None,
            Depth::Limited(n) => Some(Depth::Limited(n - 1)),
        }
    }
}

/// Explicit matching method; a field carries at most one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchMethod {
    Automatch,
    /// Qualified destination path this field maps to.
    Map(String),
    /// Tag key and this field's value under it.
    Tag { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub method: Option<MatchMethod>,
    pub convert: Option<String>,
    pub cast: Option<String>,
    pub deepcopy: bool,
    pub depth: Option<Depth>,
    /// Custom annotations declared on the parameter or result this field
    /// roots.
    pub custom: Custom,
}

impl FieldOptions {
    pub fn is_automatch(&self) -> bool {
        matches!(self.method, Some(MatchMethod::Automatch))
    }

    pub fn map_target(&self) -> Option<&str> {
        match &self.method {
            Some(MatchMethod::Map(target)) => Some(target),
            _ => None,
        }
    }

    pub fn tag(&self) -> Option<(&str, &str)> {
        match &self.method {
            Some(MatchMethod::Tag { key, value }) => Some((key, value)),
            _ => None,
        }
    }
}

// ------------------------------- Resolution ------------------------------- //

/// Depth override declared for a field, if any.
pub fn depth_for(rules: &[Rule], path: &str, signature: &str) -> Option<Depth> {
    rules.iter().rev().find_map(|rule| match &rule.kind {
        RuleKind::Depth { field, level } if field.is_match(path) || field.is_match(signature) => {
            Some(Depth::from_level(*level))
        }
        _ => None,
    })
}

/// Resolve options for every field under `root`, in place.
pub fn resolve(arena: &mut FieldArena, root: FieldId, function: &str, rules: &[Rule]) {
    for id in arena.flatten(root) {
        let options = resolve_field(arena, id, function, rules);
        arena[id].options = options;
    }
}

fn resolve_field(arena: &FieldArena, id: FieldId, function: &str, rules: &[Rule]) -> FieldOptions {
    let field = &arena[id];
    let path = arena.path(id);
    let signature = field.signature.to_string();
    let alias = arena.is_alias(id);

    let mut out = FieldOptions::default();
    let mut deepcopy_decided = false;

    for rule in rules.iter().rev() {
        match &rule.kind {
            RuleKind::Automatch { field: p } => {
                if out.method.is_none() && p.is_match(&path) {
                    out.method = Some(MatchMethod::Automatch);
                }
            }
            RuleKind::Map { field: p, target } => {
                if out.method.is_none() && p.is_match(&path) {
                    out.method = Some(MatchMethod::Map(target.clone()));
                }
            }
            RuleKind::Tag { field: p, key } => {
                if out.method.is_none() && p.is_match(&path) {
                    if let Some(value) = field.tags.get(key) {
                        out.method = Some(MatchMethod::Tag { key: key.clone(), value: value.clone() });
                    }
                }
            }
            RuleKind::Convert { function: f, field: p, converter } => {
                if out.convert.is_none() && f.is_match(function) && p.is_match(&path) {
                    out.convert = Some(converter.clone());
                }
            }
            RuleKind::Cast { field: p, expr } => {
                if out.cast.is_none() && p.is_match(&path) {
                    out.cast = Some(expr.clone());
                }
            }
            RuleKind::Deepcopy { field: p } => {
                if !deepcopy_decided && !alias && (p.is_match(&path) || p.is_match(&signature)) {
                    out.deepcopy = true;
                    deepcopy_decided = true;
                }
            }
            RuleKind::Depth { field: p, level } => {
                if out.depth.is_none() && (p.is_match(&path) || p.is_match(&signature)) {
                    out.depth = Some(Depth::from_level(*level));
                }
            }
            RuleKind::Custom { .. } => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::signature::TypeSignature;
    use pretty_assertions::assert_eq;

    fn rules(lines: &[&str]) -> Vec<Rule> {
        lines.iter().map(|l| Rule::parse(l, Some("c.Itoa")).unwrap()).collect()
    }

    fn user_tree() -> (FieldArena, FieldId, FieldId, FieldId) {
        let mut arena = FieldArena::new();
        let root = arena.add(Field::new("", TypeSignature::parse("*models.User").unwrap()));
        let mut id = Field::new("ID", TypeSignature::parse("int").unwrap());
        id.parent = Some(root);
        id.tags.insert("api".into(), "user_id".into());
        let id = arena.add(id);
        let mut name = Field::new("Name", TypeSignature::parse("string").unwrap());
        name.parent = Some(root);
        let name = arena.add(name);
        (arena, root, id, name)
    }

    #[test]
    fn parses_each_category() {
        let parsed = rules(&[
            "automatch models.User.*",
            "map models.User.ID domain.Account.ID",
            "tag .* api",
            "convert .* models.User.ID",
            "cast models.User.ID",
            "deepcopy .*",
            "depth .* 2",
            "fmt strict lower",
        ]);
        let categories: Vec<Category> = parsed.iter().map(Rule::category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Automatch,
                Category::Map,
                Category::Tag,
                Category::Convert,
                Category::Cast,
                Category::Deepcopy,
                Category::Depth,
                Category::Custom,
            ]
        );
        assert_eq!(parsed[7].custom(), Some(("fmt", "strict lower")));
    }

    #[test]
    fn repeated_custom_keys_accumulate() {
        let mut custom = Custom::new();
        for rule in rules(&["emit a", "cast .*", "emit b", "fmt x"]) {
            collect_custom(&mut custom, &rule);
        }
        assert_eq!(custom.get("emit"), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(custom.keys().collect::<Vec<_>>(), vec!["emit", "fmt"]);
    }

    #[test]
    fn format_errors_name_the_category() {
        for line in ["map onlyone", "depth .* x", "automatch (", "tag a b c", "deepcopy"] {
            match Rule::parse(line, None) {
                Err(Error::OptionFormat { category, text, .. }) => {
                    assert_eq!(text, line);
                    assert!(line.starts_with(&category));
                }
                other => panic!("expected format error for `{line}`, got {other:?}"),
            }
        }
        assert!(Rule::parse("convert .* .*", None).is_err());
    }

    #[test]
    fn patterns_are_anchored() {
        let p = Pattern::compile("models.User").unwrap();
        assert!(p.is_match("models.User"));
        assert!(!p.is_match("models.User.ID"));
        let p = Pattern::compile("a|b").unwrap();
        assert!(!p.is_match("ab"));
    }

    #[test]
    fn last_declared_rule_wins() {
        let (mut arena, root, id, _) = user_tree();
        let rs = rules(&["cast .* first", "cast models.User.ID second", "cast models.Nope last"]);
        resolve(&mut arena, root, "F", &rs);
        assert_eq!(arena[id].options.cast.as_deref(), Some("second"));
        assert_eq!(arena[root].options.cast.as_deref(), Some("first"));
    }

    #[test]
    fn match_methods_are_exclusive() {
        let (mut arena, root, id, name) = user_tree();
        let rs = rules(&["map models.User.Name domain.Account.Name", "automatch models.User.ID", "tag .* api"]);
        resolve(&mut arena, root, "F", &rs);
        // tag is declared last but only `ID` carries the `api` key
        assert_eq!(
            arena[id].options.method,
            Some(MatchMethod::Tag { key: "api".into(), value: "user_id".into() })
        );
        assert_eq!(arena[name].options.map_target(), Some("domain.Account.Name"));
        assert_eq!(arena[root].options.method, None);
    }

    #[test]
    fn convert_is_scoped_by_function() {
        let (mut arena, root, id, _) = user_tree();
        let rs = rules(&["convert ModelsTo.* models.User.ID"]);
        resolve(&mut arena, root, "DomainToModels", &rs);
        assert_eq!(arena[id].options.convert, None);
        resolve(&mut arena, root, "ModelsToDomain", &rs);
        assert_eq!(arena[id].options.convert.as_deref(), Some("c.Itoa"));
    }

    #[test]
    fn depth_zero_is_never_descend() {
        assert_eq!(Depth::from_level(0), Depth::Limited(0));
        assert_eq!(Depth::from_level(-1), Depth::from_level(0));
        assert_eq!(Depth::from_budget(0), Depth::Unlimited);
        assert_eq!(Depth::Limited(0).descend(), None);
        assert_eq!(Depth::Limited(2).descend(), Some(Depth::Limited(1)));

        let rs = rules(&["depth models.User 0"]);
        assert_eq!(depth_for(&rs, "models.User", "*models.User"), Some(Depth::Limited(0)));
        let rs = rules(&["depth \\*models\\.User 3"]);
        assert_eq!(depth_for(&rs, "models.User", "*models.User"), Some(Depth::Limited(3)));
    }
}
