use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Generate(GenerateArgs),
    Dna {
        #[command(subcommand)]
        command: DnaCommand,
    },
}

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// Visual style: anime, realistic, sci-fi or fantasy (unknown values use anime).
    #[arg(long, default_value = "anime")]
    pub style: String,

    /// Story text file.
    #[arg(long, required_unless_present = "example", conflicts_with = "example")]
    pub story: Option<String>,

    /// Use the built-in sample story for the chosen style.
    #[arg(long)]
    pub example: bool,

    /// Output path for the snapshot JSON.
    #[arg(long)]
    pub out: String,

    /// Also write dialog overlays (`manga` or `manhwa`).
    #[arg(long)]
    pub dialogs: Option<String>,

    /// Overwrite an existing output file.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Debug, Subcommand)]
pub enum DnaCommand {
    Flatten(DnaFlattenArgs),
    Fields,
}

#[derive(Debug, Args)]
pub struct DnaFlattenArgs {
    /// Character DNA JSON file.
    #[arg(long)]
    pub dna: String,
}
