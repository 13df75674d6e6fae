use clap::{Parser, Subcommand};
use std::path::PathBuf;
use studio_gallery::config::{self, GalleryConfig};
use studio_gallery::image_host::HostEndpoint;
use studio_gallery::loader::{GalleryLoader, GallerySource};
use studio_gallery::publish::{PublishOutcome, Publisher, UploadTarget, host_for};
use studio_gallery::render::{GalleryView, RenderOptions, render_html};
use studio_gallery::snapshot::SnapshotSource;
use studio_gallery::staging::{StagingSession, parse_stage_input};
use studio_gallery::types::{LoadMode, UploadMode};
use studio_gallery::{output, server, store};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn version_string() -> &'static str {
    let build = env!("GIT_BUILD");
    if build.is_empty() {
        env!("CARGO_PKG_VERSION")
    } else {
        // Leaked once at startup
        Box::leak(format!("{}+{build}", env!("CARGO_PKG_VERSION")).into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "studio-gallery")]
#[command(about = "Publish and serve a photography studio's portfolio gallery")]
#[command(long_about = "\
Publish and serve a photography studio's portfolio gallery

Images are staged locally (ordered, categorized), uploaded to an
ImgBB-compatible image host, and recorded in a document store. The site
reads the gallery back from the store, or from a local galeria.json.

Staging inputs are files or directories. Directories are walked
recursively and ordered by NNN- prefix. Append =category to an input to
categorize everything it adds:

  studio-gallery publish shoots/wedding=wedding portraits/001-anna.jpg=portrait

Upload modes (--mode or upload_mode in config.toml):
  auto     server proxy if configured, else direct key, else local export
  server   POST {server_url}/imgbb/upload with a base64 data URL
  direct   POST to the image host API with IMGBB_KEY
  local    write the staged set to a JSON file instead of publishing

Run 'studio-gallery gen-config' to generate a documented config.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Configuration file (stock defaults apply when absent)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Image host API key for direct uploads
    #[arg(long, env = "IMGBB_KEY", hide_env_values = true, global = true)]
    imgbb_key: Option<String>,

    /// Server exposing /imgbb/upload
    #[arg(long, env = "IMGBB_SERVER_URL", global = true)]
    imgbb_server_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Shared flags for commands that stage images.
#[derive(clap::Args, Clone)]
struct StageArgs {
    /// Files or directories to stage, optionally suffixed with =category
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Category for inputs without their own =category
    #[arg(long)]
    category: Option<String>,

    /// Use at most this many staged images
    #[arg(long)]
    max: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the public directory and the health endpoint
    Serve {
        /// Listen port
        #[arg(long, env = "PORT")]
        port: Option<u16>,
        /// Listen address
        #[arg(long)]
        host: Option<String>,
        /// Directory of static files
        #[arg(long)]
        public_dir: Option<String>,
    },
    /// Load the gallery the way the site does and print it
    Gallery {
        /// Read only the snapshot file; never contact the store
        #[arg(long)]
        local: bool,
        /// Snapshot path or URL (overrides gallery.snapshot)
        #[arg(long)]
        snapshot: Option<String>,
        /// Also write the grid markup to this file
        #[arg(long)]
        html: Option<PathBuf>,
        /// Keep running and re-render on every store update
        #[arg(long)]
        watch: bool,
    },
    /// Stage images and publish them, replacing the current gallery
    Publish {
        #[command(flatten)]
        stage: StageArgs,
        /// Upload mode: auto, server, direct or local
        #[arg(long)]
        mode: Option<UploadMode>,
        /// Export file used when no image host is available
        #[arg(long, default_value = "galeria_export.json")]
        export: PathBuf,
    },
    /// Stage images and write them to a portable JSON file
    Export {
        #[command(flatten)]
        stage: StageArgs,
        /// Output file
        #[arg(long, short, default_value = "galeria_export.json")]
        output: PathBuf,
    },
    /// Check configuration and reachability of every service
    Check,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    match &cli.command {
        Command::Serve {
            port,
            host,
            public_dir,
        } => {
            let mut settings = load_settings(&cli)?.server;
            if let Some(port) = port {
                settings.port = *port;
            }
            if let Some(host) = host {
                settings.host = host.clone();
            }
            if let Some(dir) = public_dir {
                settings.public_dir = dir.clone();
            }
            server::serve(&settings).await?;
        }
        Command::Gallery {
            local,
            snapshot,
            html,
            watch,
        } => {
            let settings = load_settings(&cli)?;
            let http = reqwest::Client::new();
            let store = store::from_config(&settings.store, &http, None)?;
            let mode = if *local {
                LoadMode::Local
            } else {
                settings.gallery.mode
            };
            let source = SnapshotSource::parse(snapshot.as_deref().unwrap_or(&settings.gallery.snapshot));
            let loader = GalleryLoader::new(source, http)
                .with_store(store)
                .with_options(RenderOptions {
                    placeholder_title: settings.gallery.placeholder_title.clone(),
                });

            let loaded = loader.load(mode).await?;
            show_gallery(loaded.source, &loaded.view, html.as_ref()).await?;

            if *watch {
                let Some(mut subscription) = loaded.subscription else {
                    println!("No live store to watch");
                    return Ok(());
                };
                loop {
                    tokio::select! {
                        snapshot = subscription.next_snapshot() => match snapshot {
                            Some(records) => {
                                println!();
                                show_gallery(GallerySource::Store, &loader.render(&records), html.as_ref()).await?;
                            }
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
                subscription.close();
            }
        }
        Command::Publish {
            stage,
            mode,
            export,
        } => {
            let settings = load_settings(&cli)?;
            let session = stage_inputs(stage).await?;
            let selection = session.selection(stage.max);
            output::print_staging(selection);

            let target = UploadTarget::resolve(mode.unwrap_or(settings.upload_mode), &settings.image_host)?;
            let http = reqwest::Client::new();
            let host = host_for(&target, &http);
            let store = store::from_config(&settings.store, &http, host.clone())?;

            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    for line in output::format_publish_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = Publisher::new(host, store)
                .with_events(tx)
                .publish(selection)
                .await;
            printer.await?;
            let outcome = result?;

            output::print_publish_outcome(&outcome);
            if let PublishOutcome::Exported(_) = outcome {
                let written = session.write_export(export, stage.max).await?;
                println!("Wrote {} entries to {}", written, export.display());
            }
        }
        Command::Export { stage, output: path } => {
            let session = stage_inputs(stage).await?;
            output::print_staging(session.selection(stage.max));
            let written = session.write_export(path, stage.max).await?;
            println!("Wrote {} entries to {}", written, path.display());
        }
        Command::Check => {
            let settings = load_settings(&cli)?;
            let results = run_checks(&settings).await;
            output::print_check(&results);
            if results.iter().any(|(_, r)| r.is_err()) {
                return Err("one or more checks failed".into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file over stock defaults, then command-line and environment secrets.
fn load_settings(cli: &Cli) -> Result<GalleryConfig, config::ConfigError> {
    let mut settings = config::load_config(&cli.config)?;
    if let Some(key) = &cli.imgbb_key {
        settings.image_host.api_key = Some(key.clone());
    }
    if let Some(url) = &cli.imgbb_server_url {
        settings.image_host.server_url = Some(url.clone());
    }
    settings.validate()?;
    Ok(settings)
}

async fn stage_inputs(args: &StageArgs) -> Result<StagingSession, Box<dyn std::error::Error>> {
    let mut session = StagingSession::new();
    for input in &args.inputs {
        let (path, category) = parse_stage_input(input);
        let category = category.or_else(|| args.category.clone());
        session.stage_path(&path, category.as_deref()).await?;
    }
    if session.is_empty() {
        return Err("no images staged".into());
    }
    Ok(session)
}

async fn show_gallery(
    source: GallerySource,
    view: &GalleryView,
    html: Option<&PathBuf>,
) -> Result<(), std::io::Error> {
    output::print_gallery(source, view);
    if let Some(path) = html {
        tokio::fs::write(path, render_html(view).into_string()).await?;
    }
    Ok(())
}

async fn run_checks(settings: &GalleryConfig) -> Vec<(String, Result<String, String>)> {
    let http = reqwest::Client::new();
    let mut results = Vec::new();

    let host = match UploadTarget::resolve(settings.upload_mode, &settings.image_host) {
        Ok(UploadTarget::Host(HostEndpoint::ServerProxy { server_url })) => {
            Ok(format!("server proxy {server_url}"))
        }
        Ok(UploadTarget::Host(HostEndpoint::Direct { api_base, .. })) => {
            Ok(format!("direct upload to {api_base}"))
        }
        Ok(UploadTarget::LocalExport) => Ok("none configured, publish exports locally".to_string()),
        Err(e) => Err(e.to_string()),
    };
    results.push(("image host".to_string(), host));

    let store = match store::from_config(&settings.store, &http, None) {
        Ok(Some(store)) => match store.check_access().await {
            Ok(()) => Ok(store.describe()),
            Err(e) => Err(e.to_string()),
        },
        Ok(None) => Ok("none configured".to_string()),
        Err(e) => Err(e.to_string()),
    };
    results.push(("store".to_string(), store));

    let source = SnapshotSource::parse(&settings.gallery.snapshot);
    let snapshot = match source.read(&http).await {
        Ok(records) => Ok(format!("{source} ({} records)", records.len())),
        Err(e) => Err(e.to_string()),
    };
    results.push(("snapshot".to_string(), snapshot));

    results
}
