//! Minimal CLI: setup → (correspondence graph | field tree)
use std::path::PathBuf;
use anyhow::Context;
use clap::{Parser, Subcommand, Args};
use colored::Colorize;

use crate::builder::FieldBuilder;
use crate::field::{FieldArena, FieldId};
use crate::generator::Generator;
use crate::options::Depth;
use crate::setup::Setup;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// match destination and source field trees declared in a setup file and export the correspondence graph
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run the full pipeline and print the correspondence graph as JSON
    Graph(GraphOut),
    /// print the field tree built for a single type
    Fields(FieldsOut),
}

#[derive(Args, Debug, Clone)]
struct SetupSettings {
    /// YAML setup file declaring types, contracts and converters
    #[arg(long, short)]
    setup: PathBuf,
}

#[derive(clap::Parser, Debug)]
struct GraphOut {
    #[command(flatten)]
    setup_settings: SetupSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct FieldsOut {
    #[command(flatten)]
    setup_settings: SetupSettings,

    /// type signature to expand, e.g. `*models.User`
    #[arg(long = "type")]
    ty: String,

    /// depth budget (0 = unlimited; defaults to the setup's)
    #[arg(long)]
    depth: Option<u32>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SetupSettings {
    fn load(&self) -> anyhow::Result<Setup> {
        Setup::load(&self.setup)
            .with_context(|| format!("failed to load setup {}", self.setup.display()))
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Graph(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(())
                }

                let setup = target.setup_settings.load()?;
                let catalog = setup.catalog();
                tracing::debug!(types = catalog.len(), "catalog loaded");
                let generator = Generator::run(&setup, &catalog)?;
                let graph = crate::emit::graph_to_json(&generator);
                let graph_src = serde_json::to_string_pretty(&graph)?;
                write_output(target.out.as_ref(), &graph_src)
            }
            Command::Fields(target) => {
                let setup = target.setup_settings.load()?;
                let catalog = setup.catalog();
                let budget = Depth::from_budget(target.depth.unwrap_or(setup.generated.depth));
                let mut arena = FieldArena::new();
                let root = FieldBuilder::new(&catalog, &[])
                    .build_root(&mut arena, &target.ty, "", budget, "command line")?;
                let mut out = String::new();
                render_tree(&arena, root, 0, &mut out);
                print!("{out}");
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_output(out: Option<&PathBuf>, source: &str) -> anyhow::Result<()> {
    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(out, source)
            .with_context(|| format!("failed to write {}", out.display()))?;
    } else {
        println!("{source}");
    }
    Ok(())
}

fn render_tree(arena: &FieldArena, id: FieldId, indent: usize, out: &mut String) {
    let field = &arena[id];
    let name = if field.is_root() { arena.path(id) } else { field.name.clone() };
    let alias = match arena.alias_of(id) {
        Some(original) => format!(" ↺ {}", arena.path(original)).dimmed().to_string(),
        None => String::new(),
    };
    out.push_str(&format!(
        "{}{} {}{}\n",
        "  ".repeat(indent),
        name.bold(),
        field.signature.to_string().cyan(),
        alias,
    ));
    for &child in &field.children {
        render_tree(arena, child, indent + 1, out);
    }
}
