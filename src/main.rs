//! Binary entrypoint for the photo dashboard.
//!
//! Wires the service client, the state file and the frame sink to the library
//! widgets and turns stdin lines into widget clicks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use photo_dashboard::config::Configuration;
use photo_dashboard::events::{RenderImage, WidgetCommand};
use photo_dashboard::notes::NotesWidget;
use photo_dashboard::render::presenter::Presentation;
use photo_dashboard::service::{PhotoService, PhotosLibraryClient};
use photo_dashboard::storage::{JsonFileStore, KeyValueStore, UserStorage};
use photo_dashboard::tasks::renderer::{self, PngFrameSink, RendererOptions};
use photo_dashboard::tasks::widget::{PhotosWidget, WidgetView};

#[derive(Debug, Parser)]
#[command(
    name = "photo-dashboard",
    version,
    about = "Headless dashboard: album slideshow and notes"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(value_name = "CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the rotation interval (e.g. "30s", "5m")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Start signed out even when a token is available
    #[arg(long)]
    signed_out: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("photo_dashboard={level}").parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Input {
    Widget(WidgetCommand),
    ShowNote(String),
    WriteNote { key: String, text: String },
    Help,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let input = match word {
        "select" => Input::Widget(WidgetCommand::SelectAlbum(rest.parse().ok()?)),
        "other" => Input::Widget(WidgetCommand::SelectOther),
        "next" => Input::Widget(WidgetCommand::NextPhoto),
        "click" => Input::Widget(WidgetCommand::ClickVideo),
        "collapse" => Input::Widget(WidgetCommand::ToggleCollapsed),
        "signin" => Input::Widget(WidgetCommand::SetSignedIn(true)),
        "signout" => Input::Widget(WidgetCommand::SetSignedIn(false)),
        "note" if !rest.is_empty() => match rest.split_once(char::is_whitespace) {
            Some((key, text)) => Input::WriteNote {
                key: key.to_string(),
                text: text.trim().to_string(),
            },
            None => Input::ShowNote(rest.to_string()),
        },
        "help" | "?" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => return None,
    };
    Some(input)
}

const HELP: &str = "commands: select <n> | other | next | click | collapse | signin | signout | note <key> [text] | quit";

fn print_view(view: &WidgetView) {
    println!("== {}{}", view.title, if view.collapsed { " (collapsed)" } else { "" });
    if view.collapsed {
        return;
    }
    match &view.selected_album {
        None => {
            println!("choose an album for the slideshow:");
            for (index, album) in view.albums.iter().enumerate() {
                println!("  [{index}] {} ({:?})", album.title, album.source);
            }
        }
        Some(_) => match &view.presentation {
            Presentation::Empty => println!("  (nothing to show)"),
            Presentation::Still { image_url } => println!("  photo: {image_url}"),
            Presentation::InlineVideo { src, poster } => println!(
                "  video: {src} (poster {poster}){}",
                if view.video_clicked { " playing" } else { " - click to play" }
            ),
            Presentation::ExternalLink { product_url } => println!("  open video: {product_url}"),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    if let Some(interval) = cli.interval {
        cfg.rotation_interval = Some(interval);
    }
    let cfg = cfg.validated().context("validating configuration")?;

    let token = std::env::var(&cfg.service.token_env)
        .ok()
        .filter(|t| !t.trim().is_empty());
    let signed_in = token.is_some() && !cli.signed_out;
    info!(signed_in, "starting photo dashboard");

    let client = PhotosLibraryClient::new(&cfg.service.base_url, token, cfg.service.request_timeout)
        .context("building photo service client")?;
    let service: Arc<dyn PhotoService> = Arc::new(client);
    let store: Arc<dyn KeyValueStore> = Arc::new(
        JsonFileStore::open(&cfg.storage.path).context("opening dashboard state")?,
    );
    let photos_storage = UserStorage::new(Arc::clone(&store), &cfg.storage.user, &cfg.storage.photos_prefix);
    let notes_storage = UserStorage::new(Arc::clone(&store), &cfg.storage.user, &cfg.storage.notes_prefix);

    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    let render_tx = match cfg.frame_output.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<RenderImage>(4);
            tasks.spawn(renderer::run(
                rx,
                Arc::clone(&service),
                PngFrameSink::new(path),
                RendererOptions::from(&cfg),
                cancel.clone(),
            ));
            Some(tx)
        }
        None => None,
    };

    let (widget, channels) = PhotosWidget::new(service, photos_storage, &cfg, signed_in, render_tx);
    let (command_tx, command_rx) = mpsc::channel::<WidgetCommand>(16);
    tasks.spawn(widget.run(channels.service_events, command_rx, cancel.clone()));
    tasks.spawn(show_views(channels.view, cancel.clone()));

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("interrupt received; shutting down"),
                Err(err) => warn!("failed to listen for ctrl-c: {err}"),
            }
            cancel.cancel();
        });
    }

    read_commands(command_tx, notes_storage, cancel.clone()).await?;
    cancel.cancel();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("task failed: {err:#}"),
            Err(err) => warn!("task panicked: {err}"),
        }
    }
    Ok(())
}

async fn show_views(mut view: watch::Receiver<WidgetView>, cancel: CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                print_view(&view.borrow_and_update());
            }
        }
    }
    Ok(())
}

async fn read_commands(
    commands: mpsc::Sender<WidgetCommand>,
    notes: UserStorage,
    cancel: CancellationToken,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{HELP}");
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line.context("reading stdin")?,
        };
        let Some(line) = line else {
            info!("stdin closed; shutting down");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_input(&line) {
            Some(Input::Widget(cmd)) => {
                if commands.send(cmd).await.is_err() {
                    break;
                }
            }
            Some(Input::ShowNote(key)) => {
                let note = NotesWidget::mount(notes.clone(), key);
                println!("{}", note.text());
            }
            Some(Input::WriteNote { key, text }) => {
                NotesWidget::mount(notes.clone(), key).on_change(text);
            }
            Some(Input::Help) => println!("{HELP}"),
            Some(Input::Quit) => break,
            None => println!("unrecognized input; {HELP}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_widget_clicks() {
        assert_eq!(
            parse_input("select 3"),
            Some(Input::Widget(WidgetCommand::SelectAlbum(3)))
        );
        assert_eq!(parse_input(" next "), Some(Input::Widget(WidgetCommand::NextPhoto)));
        assert_eq!(parse_input("select x"), None);
    }

    #[test]
    fn parses_notes() {
        assert_eq!(parse_input("note todo"), Some(Input::ShowNote("todo".into())));
        assert_eq!(
            parse_input("note todo buy milk"),
            Some(Input::WriteNote {
                key: "todo".into(),
                text: "buy milk".into()
            })
        );
        assert_eq!(parse_input("note"), None);
    }
}
