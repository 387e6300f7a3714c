//! Generator aggregate and the generation pipeline.
//!
//! setup -> build field trees -> resolve options -> match -> prune
//!
//! A `Generator` owns every function and every field tree of one run and is
//! not mutated once `Generator::run` returns.
use tracing::{debug, info};

use crate::builder::FieldBuilder;
use crate::catalog::TypeCatalog;
use crate::error::{Error, Result};
use crate::field::{FieldArena, FieldId};
use crate::matcher::match_function;
use crate::options::{collect_custom, resolve, Custom, Depth, Rule};
use crate::prune::prune;
use crate::setup::{FunctionSpec, ParamSpec, Setup};

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    /// Destination roots (results).
    pub to: Vec<FieldId>,
    /// Source roots (parameters).
    pub from: Vec<FieldId>,
    pub arena: FieldArena,
    /// Every rule in effect, in declaration order.
    pub rules: Vec<Rule>,
    pub custom: Custom,
    /// Set when any rule asks for explicit per-field matching.
    pub manual: bool,
}

impl Function {
    /// Build and annotate the field trees for one function. Each root gets
    /// its own cycle cache.
    pub fn build(
        name: &str,
        catalog: &dyn TypeCatalog,
        rules: Vec<Rule>,
        to: &[(&str, &str)],
        from: &[(&str, &str)],
        depth: u32,
    ) -> Result<Self> {
        let budget = Depth::from_budget(depth);
        let mut arena = FieldArena::new();
        let builder = FieldBuilder::new(catalog, &rules);

        let mut build = |roots: &[(&str, &str)], side: &str| -> Result<Vec<FieldId>> {
            roots
                .iter()
                .enumerate()
                .map(|(i, (variable, signature))| {
                    let location = format!("function `{name}` {side} #{i}");
                    builder.build_root(&mut arena, signature, variable, budget, &location)
                })
                .collect()
        };
        let to = build(to, "result")?;
        let from = build(from, "parameter")?;

        for &root in to.iter().chain(&from) {
            resolve(&mut arena, root, name, &rules);
        }

        let mut custom = Custom::new();
        for rule in &rules {
            collect_custom(&mut custom, rule);
        }
        let manual = rules.iter().any(Rule::is_match_method);

        Ok(Function {
            name: name.to_string(),
            to,
            from,
            arena,
            rules,
            custom,
            manual,
        })
    }

    /// `(destination, source)` pairs in destination pre-order.
    pub fn matched_pairs(&self) -> Vec<(FieldId, FieldId)> {
        self.to
            .iter()
            .flat_map(|&root| self.arena.flatten(root))
            .filter_map(|id| self.arena[id].matched_from.map(|src| (id, src)))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Generator {
    pub functions: Vec<Function>,
    pub custom: Custom,
}

impl Generator {
    /// Run the whole pipeline for a setup. Any error aborts the run; no
    /// partially matched generator is returned.
    pub fn run(setup: &Setup, catalog: &dyn TypeCatalog) -> Result<Self> {
        let contract_name = &setup.generated.contract;
        let contract = setup
            .contracts
            .iter()
            .find(|c| &c.name == contract_name)
            .ok_or_else(|| Error::Structural(contract_name.clone()))?;

        let mut converter_rules = Vec::new();
        for converter in &setup.converters {
            let location = format!("converter `{}`", converter.name);
            for line in &converter.options {
                converter_rules.push(parse_at(line, Some(converter.name.as_str()), &location)?);
            }
        }

        let mut generator = Generator::default();
        let mut inherited = Vec::new();
        for line in &contract.options {
            let rule = parse_at(line, None, &format!("contract `{contract_name}`"))?;
            if !collect_custom(&mut generator.custom, &rule) {
                debug!(category = %rule.category(), rule = %rule.text, "contract rule applies to every function");
                inherited.push(rule);
            }
        }

        for spec in &contract.functions {
            let mut rules = inherited.clone();
            rules.extend(converter_rules.iter().cloned());
            let own = function_rules(spec)?;
            rules.extend(own.rules);

            let to: Vec<(&str, &str)> = spec.results.iter().map(|p| (p.name.as_str(), p.ty.as_str())).collect();
            let from: Vec<(&str, &str)> = spec.params.iter().map(|p| (p.name.as_str(), p.ty.as_str())).collect();
            let mut function = Function::build(&spec.name, catalog, rules, &to, &from, setup.generated.depth)?;
            let roots = function.to.iter().zip(own.results).chain(function.from.iter().zip(own.params));
            for (&root, custom) in roots {
                function.arena[root].options.custom = custom;
            }
            debug!(function = %function.name, manual = function.manual, nodes = function.arena.len(), "built");

            match_function(&mut function);
            prune(&mut function);
            info!(function = %function.name, pairs = function.matched_pairs().len(), "matched");
            generator.functions.push(function);
        }

        Ok(generator)
    }
}

/// Rules declared by one function. Custom options on a parameter or result
/// stay with that root instead of joining the function's rules.
struct FunctionRules {
    rules: Vec<Rule>,
    params: Vec<Custom>,
    results: Vec<Custom>,
}

/// Function options first, then parameter and result options, in order.
fn function_rules(spec: &FunctionSpec) -> Result<FunctionRules> {
    let location = format!("function `{}`", spec.name);
    let mut rules = spec
        .options
        .iter()
        .map(|line| parse_at(line, None, &location))
        .collect::<Result<Vec<_>>>()?;

    let mut roots = |side: &[ParamSpec], kind: &str| -> Result<Vec<Custom>> {
        let mut out = Vec::with_capacity(side.len());
        for (i, root) in side.iter().enumerate() {
            let location = format!("function `{}` {kind} #{i}", spec.name);
            let mut custom = Custom::new();
            for line in &root.options {
                let rule = parse_at(line, None, &location)?;
                if !collect_custom(&mut custom, &rule) {
                    rules.push(rule);
                }
            }
            out.push(custom);
        }
        Ok(out)
    };
    let params = roots(&spec.params, "parameter")?;
    let results = roots(&spec.results, "result")?;

    Ok(FunctionRules { rules, params, results })
}

fn parse_at(line: &str, converter: Option<&str>, location: &str) -> Result<Rule> {
    Rule::parse(line, converter).map_err(|e| e.at(location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use pretty_assertions::assert_eq;

    const SETUP: &str = r#"
generated:
  depth: 0
types:
  - { namespace: domain, name: User, kind: struct, members: [ { name: ID, type: int }, { name: Name, type: string } ] }
  - namespace: models
    name: User
    kind: struct
    members:
      - { name: ID, type: int }
      - { name: Identifier, type: int }
      - { name: Name, type: string }
      - { name: Password, type: string }
contracts:
  - name: Copygen
    options: [ "emit pointers" ]
    functions:
      - name: ModelsToDomain
        params: [ { name: u, type: "*models.User" } ]
        results: [ { type: "*domain.User" } ]
"#;

    fn run(src: &str) -> Result<Generator> {
        let setup = Setup::from_yaml_str(src)?;
        let catalog: StaticCatalog = setup.catalog();
        Generator::run(&setup, &catalog)
    }

    fn describe(generator: &Generator) -> Vec<(String, Vec<(String, String)>, Vec<String>)> {
        generator
            .functions
            .iter()
            .map(|f| {
                let pairs = f
                    .matched_pairs()
                    .into_iter()
                    .map(|(d, s)| (f.arena.path(d), f.arena.path(s)))
                    .collect();
                let kept = f
                    .to
                    .iter()
                    .chain(&f.from)
                    .flat_map(|&r| f.arena.flatten(r))
                    .map(|id| f.arena.path(id))
                    .collect();
                (f.name.clone(), pairs, kept)
            })
            .collect()
    }

    #[test]
    fn prunes_unmatched_members() {
        let generator = run(SETUP).unwrap();
        assert_eq!(generator.custom.get("emit"), Some(&vec!["pointers".to_string()]));
        let described = describe(&generator);
        assert_eq!(
            described[0].1,
            vec![
                ("domain.User.ID".to_string(), "models.User.ID".to_string()),
                ("domain.User.Name".to_string(), "models.User.Name".to_string()),
            ]
        );
        assert!(!described[0].2.contains(&"models.User.Password".to_string()));
        assert!(!described[0].2.contains(&"models.User.Identifier".to_string()));
    }

    #[test]
    fn runs_are_deterministic() {
        let a = describe(&run(SETUP).unwrap());
        let b = describe(&run(SETUP).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn missing_contract_is_structural() {
        let src = SETUP.replace("name: Copygen", "name: Other");
        assert!(matches!(run(&src), Err(Error::Structural(name)) if name == "Copygen"));
    }

    #[test]
    fn unknown_root_type_is_fatal() {
        let src = SETUP.replace("\"*domain.User\"", "\"*domain.Missing\"");
        match run(&src) {
            Err(Error::Resolution { type_name, location }) => {
                assert_eq!(type_name, "*domain.Missing");
                assert!(location.contains("ModelsToDomain"));
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
    }

    #[test]
    fn bad_rule_reports_its_location() {
        let src = SETUP.replace(
            "        params:",
            "        options: [ \"depth models.User\" ]\n        params:",
        );
        match run(&src) {
            Err(Error::OptionFormat { category, location, .. }) => {
                assert_eq!(category, "depth");
                assert_eq!(location, "function `ModelsToDomain`");
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn root_custom_options_stay_on_their_field() {
        let src = SETUP
            .replace(
                "params: [ { name: u, type: \"*models.User\" } ]",
                "options: [ \"emit a\", \"emit b\" ]\n        params: [ { name: u, type: \"*models.User\", options: [ \"skipnil u\", \"skipnil v\" ] } ]",
            );
        let generator = run(&src).unwrap();
        let function = &generator.functions[0];
        assert_eq!(function.custom.get("emit"), Some(&vec!["a".to_string(), "b".to_string()]));
        assert_eq!(function.custom.get("skipnil"), None);

        let root = &function.arena[function.from[0]];
        assert_eq!(root.options.custom.get("skipnil"), Some(&vec!["u".to_string(), "v".to_string()]));
        assert!(function.arena[function.to[0]].options.custom.is_empty());
    }

    #[test]
    fn malformed_parameter_type_reports_its_location() {
        let src = SETUP.replace("\"*models.User\"", "\"*models.\"");
        match run(&src) {
            Err(Error::Signature { location, .. }) => {
                assert_eq!(location, "function `ModelsToDomain` parameter #0");
            }
            other => panic!("expected signature error, got {other:?}"),
        }
    }

    #[test]
    fn contract_rules_reach_every_function() {
        let src = SETUP
            .replace("options: [ \"emit pointers\" ]", "options: [ \"emit pointers\", \"map models.User.Identifier domain.User.ID\" ]");
        let generator = run(&src).unwrap();
        assert!(generator.functions[0].manual);
        assert_eq!(
            describe(&generator)[0].1,
            vec![("domain.User.ID".to_string(), "models.User.Identifier".to_string())]
        );
    }
}
