// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging and settings, log in,
//   then hand everything to the UI loop.
// - Returns `anyhow::Result`; only terminal failures end up here.

use clap::Parser;
use onedrive_cli::{
    api::GraphConnector,
    config::Settings,
    logging,
    ui::{self, App, Prompter, TerminalPrompter},
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "odl", version, about = "OneDrive interactive client")]
struct Cli {
    /// Access token (prompted for when absent)
    #[arg(short = 'a', long = "accesstoken", env = "ONEDRIVE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Directory to put downloaded files (overrides the saved setting)
    #[arg(short = 'o', long = "outputdir")]
    output_dir: Option<PathBuf>,

    /// Do not write `_metadata.json` sidecars next to downloads
    #[arg(long)]
    no_metadata: bool,

    /// Directory for the run log
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_path = logging::init(&cli.log_dir)?;
    info!(log = %log_path.display(), "starting");
    // Ctrl-C cancels the open prompt instead of killing the process.
    ui::install_interrupt_handler()?;

    let settings_path = Settings::default_path();
    let mut settings = Settings::load(&settings_path);
    if let Some(dir) = cli.output_dir {
        settings.output_dir = Some(dir);
    }
    if cli.no_metadata {
        settings.store_metadata = false;
    }

    // Connector configured by `ONEDRIVE_API_URL` or the public Graph endpoint.
    let connector = GraphConnector::from_env();
    let mut prompter = TerminalPrompter;

    let token = match cli.access_token {
        Some(token) => Some(token),
        None => prompter.secret("Enter access token")?,
    };

    let mut app = App::new(connector, prompter, settings).with_settings_path(settings_path);
    match token {
        Some(token) => {
            if !app.login(&token) {
                warn!("could not establish a drive session, use replace_token to retry");
            }
        }
        None => warn!("no access token given, use replace_token to log in"),
    }

    // Blocks until the user picks "exit".
    app.run()?;
    Ok(())
}
