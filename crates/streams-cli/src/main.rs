mod config;
mod output;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, EnvFilter};

use streams_core::{
    inject, inject_error, render_error_page, render_page, FailurePolicy, HttpSource, ListError,
    Lister, ListerConfig, Listing, StreamSource,
};

/// List peershare streams and resolve their playback links.
#[derive(Parser)]
#[command(name = "stream-lister", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ListerArgs {
    /// Base URL of the peershare server (serves /streams).
    server_url: String,

    /// What to do with streams that fail to resolve: mark or skip.
    #[arg(long, default_value_t = FailurePolicy::Mark)]
    failure_policy: FailurePolicy,

    /// Maximum number of streams resolved at once.
    #[arg(long, default_value_t = 8)]
    concurrency: usize,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Prefix for rendered links (e.g. https://share.example.com).
    #[arg(long)]
    link_prefix: Option<String>,
}

impl ListerArgs {
    fn to_lister_config(&self) -> ListerConfig {
        let mut c = ListerConfig::default()
            .with_failure_policy(self.failure_policy)
            .with_max_concurrent_fetches(self.concurrency)
            .with_request_timeout(self.timeout_ms);
        if let Some(ref prefix) = self.link_prefix {
            c = c.with_link_prefix(prefix.as_str());
        }
        c
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Html,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the stream list and print it.
    List {
        #[command(flatten)]
        lister: ListerArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Render the listing as an HTML page, or into the #streams element of a template.
    Render {
        #[command(flatten)]
        lister: ListerArgs,

        /// HTML file containing an element with id="streams".
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Start the HTTP server that renders the listing on demand.
    Serve {
        /// Listen address (e.g. 0.0.0.0:8080). Overrides config file.
        #[arg(short, long)]
        listen: Option<SocketAddr>,

        /// Path to TOML config file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Peershare server URL. Overrides config file.
        #[arg(long)]
        server_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List { lister, format } => {
            init_tracing("pretty", "warn");
            run_list(lister, format).await
        }
        Commands::Render {
            lister,
            template,
            output,
        } => {
            init_tracing("pretty", "warn");
            run_render(lister, template, output).await
        }
        Commands::Serve {
            listen,
            config,
            server_url,
        } => run_serve(listen, config, server_url).await,
    };

    if let Err(e) = result {
        tracing::error!("{}", e);
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn build_lister(server_url: &str, config: ListerConfig) -> Result<Lister, String> {
    config::validate_server_url(server_url)?;
    let source = HttpSource::from_config(server_url, &config).map_err(|e| e.to_string())?;
    Ok(Lister::new(Arc::new(source) as Arc<dyn StreamSource>, config))
}

async fn fetch_with_spinner(lister: &Lister, server_url: &str) -> Result<Listing, ListError> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(format!("Fetching streams from {}", server_url));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = lister.list().await;
    spinner.finish_and_clear();
    result
}

async fn run_list(args: ListerArgs, format: OutputFormat) -> Result<(), String> {
    let lister = build_lister(&args.server_url, args.to_lister_config())?;
    let listing = fetch_with_spinner(&lister, &args.server_url)
        .await
        .map_err(|e| e.to_string())?;

    match format {
        OutputFormat::Table => output::print_table(&listing),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&listing).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        OutputFormat::Html => print!("{}", render_page(&listing)),
    }
    Ok(())
}

async fn run_render(
    args: ListerArgs,
    template_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
) -> Result<(), String> {
    let template = match template_path {
        Some(ref path) => Some(std::fs::read_to_string(path).map_err(|e| {
            format!("Failed to read template {}: {}", path.display(), e)
        })?),
        None => None,
    };

    let lister = build_lister(&args.server_url, args.to_lister_config())?;
    let result = fetch_with_spinner(&lister, &args.server_url).await;

    let html = match (&template, &result) {
        (Some(t), Ok(listing)) => inject(t, &listing.streams).map_err(|e| e.to_string())?,
        (Some(t), Err(e)) => inject_error(t, &e.to_string()).map_err(|e| e.to_string())?,
        (None, Ok(listing)) => render_page(listing),
        (None, Err(e)) => render_error_page(e),
    };

    match output_path {
        Some(ref path) => {
            std::fs::write(path, &html)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            tracing::info!(path = %path.display(), "Wrote stream listing");
        }
        None => print!("{}", html),
    }

    // The error state was rendered; still report the failure.
    result.map(|_| ()).map_err(|e| e.to_string())
}

async fn run_serve(
    listen_override: Option<SocketAddr>,
    config_path: Option<PathBuf>,
    server_url_override: Option<String>,
) -> Result<(), String> {
    let app_config = match config_path {
        Some(ref path) => {
            let c = config::AppConfig::load(path).inspect_err(|_| init_tracing("pretty", "info"))?;
            init_tracing(&c.server.log_format, "info");
            tracing::info!(path = %path.display(), "Loaded config file");
            Some(c)
        }
        None => {
            init_tracing("pretty", "info");
            None
        }
    };

    let listen = listen_override
        .or(app_config.as_ref().map(|c| c.server.listen))
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080)));

    let section = app_config.map(|c| c.lister).unwrap_or_default();
    let server_url = server_url_override.unwrap_or_else(|| section.server_url.clone());
    let lister = build_lister(&server_url, section.to_lister_config())?;

    let state = streams_api::state::AppState::new(lister);

    tracing::info!(%listen, server_url = %server_url, "Starting stream lister server");
    streams_api::serve_with_state(listen, state, streams_api::shutdown_signal())
        .await
        .map_err(|e| format!("Server failed: {}", e))?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(log_format: &str, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_format {
        "json" => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
