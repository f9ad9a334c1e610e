mod cli;
mod settings;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use ks_schema::{compile_directory, CompileError, CompilerOptions, Project};
use serde::Serialize;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use cli::{Cli, OutputFormat};
use settings::{validate_version, ProjectSettings};

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command line values win over the settings file, which wins over the defaults.
fn compiler_options(cli: &Cli, settings: Option<&ProjectSettings>) -> Result<CompilerOptions> {
    let mut options = CompilerOptions::default();
    if let Some(settings) = settings {
        options.name = settings.name.clone();
        options.version = settings.version.clone();
    }
    if let Some(name) = &cli.name {
        options.name = name.clone();
    }
    if let Some(version) = &cli.project_version {
        validate_version(version)?;
        options.version = version.clone();
    }
    Ok(options)
}

#[derive(Debug, Serialize)]
struct ServiceSummary {
    id: u32,
    identifier: String,
    input: String,
    output: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    name: String,
    version: String,
    content_hash: String,
    models: Vec<String>,
    services: Vec<ServiceSummary>,
}

impl Summary {
    fn new(project: &Project) -> Self {
        let table = project.table();
        Self {
            name: project.name().to_string(),
            version: project.version().to_string(),
            content_hash: project.content_hash().to_string(),
            models: project
                .models()
                .iter()
                .map(|&model| {
                    let definition = project.definition(model);
                    format!("{} {}", definition.kind_name(), definition.identifier())
                })
                .collect(),
            services: project
                .services()
                .iter()
                .map(|service| ServiceSummary {
                    id: service.id,
                    identifier: service.identifier.to_string(),
                    input: table.describe(service.input),
                    output: table.describe(service.output),
                })
                .collect(),
        }
    }

    fn render_text(&self) -> String {
        let mut text = format!(
            "{} {}\ncontent hash: {}\n",
            self.name, self.version, self.content_hash
        );
        text.push_str(&format!("models ({}):\n", self.models.len()));
        for model in &self.models {
            text.push_str(&format!("  {model}\n"));
        }
        text.push_str(&format!("services ({}):\n", self.services.len()));
        for service in &self.services {
            text.push_str(&format!(
                "  #{} {}: {} -> {}\n",
                service.id, service.identifier, service.input, service.output
            ));
        }
        text
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let settings = ProjectSettings::discover(&cli.root, cli.settings.as_deref())?;
    let options = compiler_options(cli, settings.as_ref())?;
    debug!(root = %cli.root.display(), ?options, "compiling project");

    let project = match compile_directory(&cli.root, &options) {
        Ok(project) => project,
        Err(CompileError::Syntax(diagnostics)) => {
            for diagnostic in &diagnostics {
                eprintln!("{diagnostic}");
            }
            return Ok(false);
        }
        Err(error) => {
            return Err(error)
                .with_context(|| format!("Could not compile {}", cli.root.display()))
        }
    };

    let summary = Summary::new(&project);
    match cli.format {
        OutputFormat::Text => print!("{}", summary.render_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(true)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("kestrel").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn command_line_overrides_settings() {
        let settings = ProjectSettings::parse("name: shop\nversion: 1.0.0\n").unwrap();
        let options = compiler_options(&cli(&["root", "--name", "cli"]), Some(&settings)).unwrap();
        assert_eq!(options.name, "cli");
        assert_eq!(options.version, "1.0.0");

        assert!(compiler_options(&cli(&["root", "--project-version", "one"]), None).is_err());
        assert_eq!(
            compiler_options(&cli(&["root"]), None).unwrap(),
            CompilerOptions::default()
        );
    }

    #[test]
    fn summarizes_compiled_project() {
        let root = tempfile::tempdir().unwrap();
        fs::write(
            root.path().join("shop.ks"),
            "namespace shop;\n\
             message Order { uuid id = 1; }\n\
             service GetOrder { @input = uuid; @output = Order; @id = 1; }",
        )
        .unwrap();
        fs::write(root.path().join("kestrel.yaml"), "name: shop\nversion: 2.1.0\n").unwrap();

        let root_arg = root.path().to_string_lossy().into_owned();
        let cli = cli(&[root_arg.as_str()]);
        let settings = ProjectSettings::discover(&cli.root, None).unwrap();
        let options = compiler_options(&cli, settings.as_ref()).unwrap();
        let project = compile_directory(&cli.root, &options).unwrap();

        let summary = Summary::new(&project);
        assert_eq!(summary.name, "shop");
        assert_eq!(summary.models, vec!["message shop.Order"]);
        let text = summary.render_text();
        assert!(text.contains("#1 shop.GetOrder: ks.uuid -> shop.Order"));

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&summary).unwrap()).unwrap();
        assert_eq!(json["version"], "2.1.0");
        assert_eq!(json["services"][0]["output"], "shop.Order");
    }

    #[test]
    fn syntax_errors_fail_without_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("bad.ks"), "message {").unwrap();
        let root_arg = root.path().to_string_lossy().into_owned();
        assert!(!run(&cli(&[root_arg.as_str()])).unwrap());
    }
}
