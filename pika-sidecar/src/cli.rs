use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "pika-sidecar",
    version,
    about = "Offline audio analysis sidecar for Pika! Desktop"
)]
pub struct Cli {
    /// Port for the HTTP endpoint (0 picks a free port)
    #[arg(short, long, required_unless_present = "analyze")]
    pub port: Option<u16>,

    /// Address to bind; overrides `server.host` from the config file
    #[arg(long)]
    pub host: Option<String>,

    /// Config file (defaults to <config dir>/pika/sidecar.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Analyze one file, print its JSON record, and exit
    #[arg(long, value_name = "FILE", conflicts_with = "port")]
    pub analyze: Option<PathBuf>,
}
