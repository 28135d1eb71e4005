use clap::Parser;
use livechat::Backend;
use livechat::core::config;
use livechat::core::state::App;
use livechat::{logging, tui};
use std::path::Path;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "livechat", about = "Real-time group chat in the terminal")]
struct Args {
    /// Backend to use (overrides LIVECHAT_BACKEND and the config file)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Display name for the local backend
    #[arg(short, long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenv::dotenv().ok();

    // Logger first so config warnings land in the file; stdout belongs to the TUI
    if let Err(e) = logging::init(Path::new("livechat.log")) {
        eprintln!("livechat: logging disabled: {e}");
    }

    let file_config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Ignoring config file: {}", e);
            config::LiveChatConfig::default()
        }
    };
    let resolved = config::resolve(
        &file_config,
        args.backend.map(|b| b.as_str()),
        args.name.as_deref(),
    );
    logging::apply_level(resolved.log_level);

    log::info!("LiveChat starting up with backend: {}", resolved.backend);

    let backends = match tui::build_backends(&resolved) {
        Ok(b) => b,
        Err(e) => {
            log::error!("Cannot start: {}", e);
            eprintln!("livechat: {e}");
            eprintln!("Set it in ~/.livechat/config.toml or .env, or run with --backend local.");
            return ExitCode::from(2);
        }
    };

    let app = App::new(backends.identity, backends.store, resolved.window_size);
    match tui::run(app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Terminal error: {}", e);
            eprintln!("livechat: {e}");
            ExitCode::FAILURE
        }
    }
}
