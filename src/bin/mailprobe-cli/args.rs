use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mailprobe-cli", version, about = "Vérifie la délivrabilité d'adresses e-mail (MX, SMTP, catch-all)")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,

    /// fichier de configuration TOML
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// format: human|json|ndjson|csv
    #[arg(long, value_enum, default_value_t = Format::Human, global = true)]
    pub format: Format,

    /// write report to file (écriture atomique)
    #[arg(long, global = true)]
    pub out: Option<String>,

    /// logs de debug sur stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// valide une ou plusieurs adresses
    Validate {
        emails: Vec<String>,
        /// lit des adresses depuis stdin (une par ligne)
        #[arg(long)]
        stdin: bool,
    },
    /// résout les enregistrements MX du domaine
    Mx { domain: String },
    /// détecte si le domaine accepte toutes les adresses
    #[command(name = "catch-all")]
    CatchAll { domain: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
    Ndjson,
    Csv,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
