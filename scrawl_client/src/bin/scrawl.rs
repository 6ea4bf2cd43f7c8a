use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::Table;
use scrawl_client::handler::MessageHandler;
use scrawl_client::net::WsClient;
use scrawl_client::pen::{LocalPen, run_send_loop};
use scrawl_client::state::PartyState;
use scrawl_client::strokes::{FadeConfig, StrokeStore, spawn_fade_ticker};
use scrawl_common::geom::{Point, SurfaceSize};
use scrawl_common::proto::{ClientMessage, DEFAULT_COLOR, ServerMessage};
use spinners::{Spinner, Spinners};
use tokio::sync::{Mutex, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A headless client for scrawl drawing sessions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay websocket URL.
    #[arg(long, default_value = "ws://127.0.0.1:8765/ws")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new session and stay in it, printing room events.
    Create {
        /// Display name of the session creator.
        #[arg(long, default_value = "host")]
        name: String,
        /// Draw one scripted stroke after connecting.
        #[arg(long)]
        demo: bool,
    },
    /// Join an existing session by its 6-character code.
    Join {
        /// The session code, e.g. AB12CD.
        code: String,
        #[arg(long, default_value = "guest")]
        name: String,
        #[arg(long)]
        demo: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scrawl_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut sp = Spinner::new(Spinners::Dots9, "Connecting to the relay...".into());
    let mut client = match WsClient::connect(&cli.url).await {
        Ok(client) => {
            sp.stop_with_message("✓ Connected.".into());
            client
        }
        Err(e) => {
            sp.stop_with_message("✗ Connection failed.".into());
            eprintln!("Error: Could not connect to {}: {}", cli.url, e);
            return Ok(());
        }
    };

    let (response, demo) = match &cli.command {
        Commands::Create { name, demo } => (client.create_session(name).await?, *demo),
        Commands::Join { code, name, demo } => (client.join_session(code, name).await?, *demo),
    };

    if let ServerMessage::Error { message } = &response {
        eprintln!("Error: {message}");
        return Ok(());
    }

    let state = Arc::new(Mutex::new(PartyState::new()));
    let strokes = Arc::new(Mutex::new(StrokeStore::new(FadeConfig::default())));
    let handler = MessageHandler::new(state.clone(), strokes.clone());

    // The setup reply flows through the same handler as everything else.
    handler.handle(response).await;
    print_session(&state).await;

    let ticker = spawn_fade_ticker(strokes.clone());

    if demo {
        let user_id = state.lock().await.user_id.clone().unwrap_or_default();
        let pen = Arc::new(Mutex::new(LocalPen::new(
            user_id,
            DEFAULT_COLOR.to_string(),
            SurfaceSize::new(1280.0, 720.0),
        )));
        tokio::spawn(run_send_loop(pen.clone(), client.sender()));
        tokio::spawn(run_demo_stroke(pen, client.sender()));
    }

    println!("Listening for room events; press Ctrl-C to leave.");
    tokio::select! {
        _ = client.listen(&handler) => {
            println!("Connection closed by the relay.");
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Leaving the session.");
        }
    }

    ticker.abort();
    Ok(())
}

async fn print_session(state: &Arc<Mutex<PartyState>>) {
    let state = state.lock().await;

    println!("\n--- Scrawl session ---");
    if let Some(session_id) = &state.session_id {
        println!("Code: {session_id}");
    }

    let mut table = Table::new();
    table.set_header(vec!["participant", "color", "alpha"]);
    for style in state.participants.values() {
        table.add_row(vec![
            style.name.clone(),
            style.color.clone(),
            format!("{:.2}", style.alpha),
        ]);
    }
    println!("{table}");
}

/// Draws one sine-wave stroke through the pen, letting the 50 ms send loop
/// flush deltas while samples arrive.
async fn run_demo_stroke(
    pen: Arc<Mutex<LocalPen>>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
) {
    let start = Point::new(200.0, 360.0);
    let begin = pen.lock().await.begin(start);
    if outgoing.send(begin).is_err() {
        return;
    }

    for i in 1..=80 {
        tokio::time::sleep(std::time::Duration::from_millis(8)).await;
        let x = 200.0 + i as f64 * 10.0;
        let y = 360.0 + 120.0 * (i as f64 * 0.12).sin();
        pen.lock().await.sample(Point::new(x, y));
    }

    for message in pen.lock().await.finish() {
        if outgoing.send(message).is_err() {
            return;
        }
    }
    println!("Demo stroke sent.");
}
