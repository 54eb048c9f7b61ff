use clap::{Args, Parser, Subcommand, ValueEnum};

use tagwatch::dto::check::ComponentChangedReqDto;

/// Cli interface to tagwatch
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct TagCtlArgs {
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    pub url: String,
    #[arg(short, long, default_value = "plain")]
    pub out_format: OutFormat,
    #[clap(subcommand)]
    pub subcommand: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutFormat {
    Plain,
    Json
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Trigger a check of the whole catalog or of a single component
    Check(CheckArgs),
    /// Notify the fleet loop that a component changed
    Changed(ChangedArgs),
    /// Resolve a version locally using the configured resolvers
    Resolve(ResolveArgs),
    /// Show the desired state record of a component
    Desired(DesiredArgs),
    /// Show the desired image timeline of a component
    Timeline(TimelineArgs),
    /// Print the DesiredVersion custom resource definition
    Crd,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct ChangedArgs {
    #[arg(short, long)]
    pub name: String,
    #[arg(short, long)]
    pub repository: Option<String>,
}

impl From<ChangedArgs> for ComponentChangedReqDto {
    fn from(value: ChangedArgs) -> Self {
        Self {
            name: value.name,
            repository: value.repository,
        }
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    #[arg(short, long)]
    pub source: String,
    #[arg(short, long)]
    pub repository: String,
    #[arg(short, long)]
    pub name: String,
    #[arg(short, long, default_value = "")]
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct DesiredArgs {
    #[arg(long)]
    pub namespace: String,
    #[arg(short, long)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct TimelineArgs {
    #[arg(short, long)]
    pub team: String,
    #[arg(short, long)]
    pub name: String,
}
