use clap::{Parser, Subcommand};

use basalt_core::config::{resolve_config_path, BasaltConfig};

mod app;
mod run;
mod status;

#[derive(Parser)]
#[command(name = "basalt-gateway", about = "Personal-assistant chat bot runtime")]
struct Cli {
    /// Config file path. Defaults to `BASALT_CONFIG` env, then `~/.basalt/basalt.toml`.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the runtime's last-written status snapshot (§7).
    Status,
    /// Manage credentials stored in the config file.
    Secret {
        #[command(subcommand)]
        action: SecretCommand,
    },
}

#[derive(Subcommand)]
enum SecretCommand {
    /// Set a credential: `llm-api-key` or `telegram-bot-token`.
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "basalt_gateway=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        None => {
            let config = BasaltConfig::load(Some(&config_path))?;
            run::run(config).await
        }
        Some(Command::Status) => {
            let config = BasaltConfig::load(Some(&config_path))?;
            let workspace_root = std::path::PathBuf::from(&config.workspace.root);
            let snapshot = status::read_status(&workspace_root)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        Some(Command::Secret { action }) => {
            let mut config = BasaltConfig::load(Some(&config_path))?;
            match action {
                SecretCommand::Set { key, value } => {
                    match key.as_str() {
                        "llm-api-key" => config.agent.api_key = Some(value),
                        "telegram-bot-token" => config.channel.telegram_bot_token = Some(value),
                        other => anyhow::bail!("unknown secret key `{other}` (expected `llm-api-key` or `telegram-bot-token`)"),
                    }
                    config.save(&config_path)?;
                    println!("saved to {config_path}");
                    Ok(())
                }
            }
        }
    }
}
