use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use appboot::config::schema::{KEY_MIDDLEWARE, KEY_PLUGINS};
use appboot::config::{build_config, ConfigHandle, OverlayStore};
use appboot::modules::{DependencySet, ModuleResolver};
use appboot::observability::logging;
use appboot::{Environment, ProjectLayout};

#[derive(Parser)]
#[command(name = "appboot-ctl")]
#[command(about = "Management CLI for appboot applications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a running server to reload its environment config
    Reload {
        /// Server base URL (must be reached over loopback)
        #[arg(short, long, default_value = "http://127.0.0.1:3009")]
        url: String,
    },
    /// Print the merged configuration and module resolution of a project
    Inspect {
        #[arg(short, long, env = "APP_DIR", default_value = ".")]
        project_dir: PathBuf,

        #[arg(short, long, env = "APP_ENV", default_value = "development")]
        env: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("appboot=warn");
    let cli = Cli::parse();

    match cli.command {
        Commands::Reload { url } => {
            let res = reqwest::Client::new()
                .get(format!("{}/__reload", url.trim_end_matches('/')))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            if status.is_success() {
                print!("{body}");
            } else {
                eprintln!("Error: reload returned status {status} (is the server reached over loopback?)");
            }
        }
        Commands::Inspect { project_dir, env } => {
            let report = inspect(&ProjectLayout::new(project_dir), &Environment::new(env))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn inspect(layout: &ProjectLayout, env: &Environment) -> Result<Value, Box<dyn std::error::Error>> {
    let dependencies = DependencySet::from_manifest(&layout.manifest)?;
    let overlays = OverlayStore::new(&layout.config_dir);
    let config = ConfigHandle::new(build_config(&overlays, env));
    let resolver = ModuleResolver::new(dependencies, config.clone());

    let describe = |key: &str, dir: &std::path::Path| -> Result<Value, Box<dyn std::error::Error>> {
        let modules = resolver
            .resolve_list(key, dir)?
            .into_iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "locator": m.locator.to_string(),
                    "installed": m.locator.is_external(),
                    "options": m.options,
                })
            })
            .collect::<Vec<_>>();
        Ok(Value::Array(modules))
    };

    Ok(json!({
        "env": env.name(),
        "config": *config.load(),
        "plugins": describe(KEY_PLUGINS, &layout.plugin_dir)?,
        "middleware": describe(KEY_MIDDLEWARE, &layout.middleware_dir)?,
    }))
}
