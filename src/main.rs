mod cli;

use clap::Parser;
use color_eyre::eyre::{Result, bail, eyre};
use tabled::{Table, Tabled};
use termtree::Tree;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use cloudstack_tf::provider::{CloudStackProvider, provider_schema};
use cloudstack_tf::schema::{Attribute, Element, Schema};
use cloudstack_tf::terraform::{self, Action, Configuration, Engine, PlannedChange};

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Changed")]
    changed: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Schema(args) => {
            let provider = CloudStackProvider::new();
            print_schema(&provider, args.r#type.as_deref(), args.json)?;
        }
        Command::Validate(args) => {
            let config = Configuration::load(&args.config_file)?;
            let problems = terraform::plan::validate(&config, &CloudStackProvider::new());
            if !problems.is_empty() {
                for problem in &problems {
                    eprintln!("Error: {}", problem);
                }
                bail!("{} problem(s) in {}", problems.len(), args.config_file.display());
            }
            println!("The configuration is valid.");
        }
        Command::Plan(args) => {
            let provider = CloudStackProvider::new();
            let engine = Engine::new(&provider, &args.state.state)?;
            let changes = engine.plan(&Configuration::load(&args.config.config_file)?)?;
            print_plan(&changes);
        }
        Command::Apply(args) => {
            let config = Configuration::load(&args.config.config_file)?;
            let provider = CloudStackProvider::configure(&cli.provider.to_config())?;
            let mut engine = Engine::new(&provider, &args.state.state)?;
            let changes = engine.plan(&config)?;
            print_plan(&changes);

            let summary = engine.apply(&changes).await?;
            println!(
                "Apply complete! Resources: {} added, {} changed, {} destroyed.",
                summary.added, summary.changed, summary.destroyed
            );
        }
        Command::Refresh(args) => {
            let provider = CloudStackProvider::configure(&cli.provider.to_config())?;
            let mut engine = Engine::new(&provider, &args.state)?;
            let dropped = engine.refresh().await?;
            println!(
                "Refreshed {} object(s); {} no longer exist.",
                engine.state().resources.len(),
                dropped
            );
        }
        Command::Import(args) => {
            let provider = CloudStackProvider::configure(&cli.provider.to_config())?;
            let mut engine = Engine::new(&provider, &args.state.state)?;
            engine.import(&args.address, &args.id).await?;
            println!("Import successful: {} ({})", args.address, args.id);
        }
        Command::Destroy(args) => {
            let provider = CloudStackProvider::configure(&cli.provider.to_config())?;
            let mut engine = Engine::new(&provider, &args.state)?;
            let destroyed = engine.destroy().await?;
            println!("Destroy complete! Resources: {} destroyed.", destroyed);
        }
        Command::ReadData(args) => {
            let config = Configuration::load(&args.config_file)?;
            let provider = CloudStackProvider::configure(&cli.provider.to_config())?;
            for result in terraform::read_data(&provider, &config).await? {
                println!("{} (id: {})", result.address, result.id);
                println!("{}", serde_json::to_string_pretty(&result.attributes)?);
            }
        }
    }

    Ok(())
}

fn print_plan(changes: &[PlannedChange]) {
    let rows: Vec<PlanRow> = changes
        .iter()
        .filter(|c| c.action != Action::NoOp)
        .map(|c| PlanRow {
            action: c.action.to_string(),
            address: c.address(),
            id: c.id.clone(),
            changed: c.changed.join(", "),
        })
        .collect();

    if rows.is_empty() {
        println!("No changes. Infrastructure matches the configuration.");
        return;
    }
    println!("{}", Table::new(&rows));

    let count = |action: Action| changes.iter().filter(|c| c.action == action).count();
    let replaced = count(Action::Replace);
    println!(
        "Plan: {} to add, {} to change, {} to destroy.",
        count(Action::Create) + replaced,
        count(Action::Update),
        count(Action::Delete) + replaced
    );
}

fn print_schema(provider: &CloudStackProvider, type_name: Option<&str>, json: bool) -> Result<()> {
    let Some(type_name) = type_name else {
        if json {
            println!("{}", serde_json::to_string_pretty(&provider.schema()?)?);
            return Ok(());
        }
        let mut root = Tree::new("cloudstack".to_string());
        root.push(schema_tree("provider", &provider_schema()));

        let mut resources = Tree::new("resources".to_string());
        for name in provider.resource_types() {
            resources.push(schema_tree(name, &provider.resource(name)?.schema()));
        }
        let mut data_sources = Tree::new("data sources".to_string());
        for name in provider.data_source_types() {
            data_sources.push(schema_tree(name, &provider.data_source(name)?.schema()));
        }
        root.push(resources);
        root.push(data_sources);
        println!("{}", root);
        return Ok(());
    };

    let schema = provider
        .resource(type_name)
        .map(|r| r.schema())
        .or_else(|_| provider.data_source(type_name).map(|d| d.schema()))
        .map_err(|_| eyre!("unknown resource or data source type: {}", type_name))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        println!("{}", schema_tree(type_name, &schema));
    }
    Ok(())
}

fn schema_tree(name: &str, schema: &Schema) -> Tree<String> {
    let mut tree = Tree::new(name.to_string());
    for (key, attr) in &schema.attributes {
        let label = format!("{} ({})", key, describe(attr));
        match &attr.elem {
            Some(Element::Block(block)) => tree.push(schema_tree(&label, block)),
            _ => tree.push(Tree::new(label)),
        };
    }
    tree
}

fn describe(attr: &Attribute) -> String {
    let mut parts = vec![format!("{:?}", attr.attr_type).to_lowercase()];
    if attr.required {
        parts.push("required".to_string());
    }
    if attr.optional {
        parts.push("optional".to_string());
    }
    if attr.computed {
        parts.push("computed".to_string());
    }
    if attr.force_new {
        parts.push("forces replacement".to_string());
    }
    if attr.sensitive {
        parts.push("sensitive".to_string());
    }
    parts.join(", ")
}
