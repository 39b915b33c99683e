use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mamba")]
#[command(about = "Mamba semantic analyzer: lex, parse, and type-check a module")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lex, parse, and semantically analyze a Mamba source file
    Check(FileArgs),
}

#[derive(clap::Args)]
pub struct FileArgs {
    /// Input file path
    pub file: String,
}
