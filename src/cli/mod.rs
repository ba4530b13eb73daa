//! CLI subcommands: generate, validate, templates, order.

use crate::codegen::{CodeGenerator, GeneratedPackage, MAIN_MODULE};
use crate::core::graph::Pipeline;
use crate::core::registry::TemplateRegistry;
use crate::core::{loader, parser, types};
use clap::{Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate step modules, main and the parameter table
    Generate {
        /// Node template feed (JSON or YAML)
        #[arg(short, long)]
        templates: PathBuf,

        /// Normalized pipeline graph (JSON or YAML)
        #[arg(short, long)]
        graph: PathBuf,

        /// Generator settings (YAML); defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// Load a graph and report structural problems
    Validate {
        #[arg(short, long)]
        templates: PathBuf,

        #[arg(short, long)]
        graph: PathBuf,
    },

    /// List registered node templates
    Templates {
        #[arg(short, long)]
        templates: PathBuf,
    },

    /// Show the emission order of every step and of main
    Order {
        #[arg(short, long)]
        templates: PathBuf,

        #[arg(short, long)]
        graph: PathBuf,
    },
}

/// How `generate` prints its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `{modules, params}` document
    Json,
    /// One line per module: name, line count, digest
    Summary,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Generate {
            templates,
            graph,
            config,
            format,
        } => cmd_generate(&templates, &graph, config.as_deref(), format),
        Commands::Validate { templates, graph } => cmd_validate(&templates, &graph),
        Commands::Templates { templates } => cmd_templates(&templates),
        Commands::Order { templates, graph } => cmd_order(&templates, &graph),
    }
}

fn load_registry(templates: &Path) -> Result<TemplateRegistry, String> {
    let records = parser::parse_template_feed_file(templates).map_err(|e| e.to_string())?;
    TemplateRegistry::load(&records).map_err(|e| e.to_string())
}

/// Parse both inputs and build the pipeline.
fn load_inputs(templates: &Path, graph: &Path) -> Result<Pipeline, String> {
    let registry = load_registry(templates)?;
    let doc = parser::parse_graph_file(graph).map_err(|e| e.to_string())?;
    loader::load_pipeline(&doc, &registry).map_err(|e| e.to_string())
}

fn load_config(config: Option<&Path>) -> Result<types::GeneratorConfig, String> {
    match config {
        Some(path) => parser::parse_generator_config_file(path).map_err(|e| e.to_string()),
        None => Ok(types::GeneratorConfig::default()),
    }
}

fn run_generate(
    templates: &Path,
    graph: &Path,
    config: Option<&Path>,
) -> Result<GeneratedPackage, String> {
    let config = load_config(config)?;
    let mut pipeline = load_inputs(templates, graph)?;
    CodeGenerator::new(config)
        .generate(&mut pipeline)
        .map_err(|e| e.to_string())
}

fn cmd_generate(
    templates: &Path,
    graph: &Path,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<(), String> {
    let package = run_generate(templates, graph, config)?;
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&package)
                .map_err(|e| format!("JSON serialize error: {}", e))?;
            println!("{}", json);
        }
        OutputFormat::Summary => print!("{}", summary(&package)),
    }
    Ok(())
}

/// Module table plus the package digest.
fn summary(package: &GeneratedPackage) -> String {
    let digests = package.module_digests();
    let mut out = String::new();
    for (name, text) in &package.modules {
        out.push_str(&format!(
            "  {:<24} {:>5} lines  {}\n",
            name,
            text.lines().count(),
            digests[name]
        ));
    }
    out.push_str(&format!(
        "{} module(s), {} step(s) with parameters, package {}\n",
        package.modules.len(),
        package.params.len(),
        package.digest()
    ));
    out
}

fn cmd_validate(templates: &Path, graph: &Path) -> Result<(), String> {
    let pipeline = load_inputs(templates, graph)?;
    let errors = parser::validate_pipeline(&pipeline);

    if errors.is_empty() {
        println!(
            "OK: {} steps, {} nodes",
            pipeline.steps.len() - 1,
            pipeline.nodes.len()
        );
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

fn cmd_templates(templates: &Path) -> Result<(), String> {
    let registry = load_registry(templates)?;
    print!("{}", template_listing(&registry));
    Ok(())
}

fn template_listing(registry: &TemplateRegistry) -> String {
    let ports = |decls: &[types::PortDecl]| {
        decls
            .iter()
            .map(|p| p.port_label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut out = format!("{} template(s)\n", registry.len());
    for t in registry.iter() {
        out.push_str(&format!(
            "  {}  in: [{}]  out: [{}]\n",
            t.name,
            ports(&t.inputs),
            ports(&t.outputs)
        ));
    }
    out
}

fn cmd_order(templates: &Path, graph: &Path) -> Result<(), String> {
    let package = run_generate(templates, graph, None)?;
    print!("{}", order_listing(&package));
    Ok(())
}

fn order_listing(package: &GeneratedPackage) -> String {
    let mut out = String::new();
    for (module, nodes) in &package.order {
        out.push_str(&format!("{}:\n", module));
        for (i, n) in nodes.iter().enumerate() {
            let what = if module == MAIN_MODULE { "step" } else { n.kind.as_str() };
            out.push_str(&format!("  {:>3}. {} ({}) -> {}\n", i + 1, n.id, what, n.variable));
        }
    }
    out
}
