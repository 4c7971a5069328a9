use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = visionforge::cli::Cli::parse();

    let log_format = visionforge::config::log_format_from_env()?;
    visionforge::logging::init(log_format).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        visionforge::cli::Command::Generate(args) => {
            let settings =
                visionforge::config::Settings::from_env().context("load settings")?;
            visionforge::generate::run(args, &settings)
                .await
                .context("generate")?;
        }
        visionforge::cli::Command::Dna {
            command: visionforge::cli::DnaCommand::Flatten(args),
        } => {
            visionforge::inspect::flatten(args).context("dna flatten")?;
        }
        visionforge::cli::Command::Dna {
            command: visionforge::cli::DnaCommand::Fields,
        } => {
            visionforge::inspect::fields();
        }
    }

    Ok(())
}
