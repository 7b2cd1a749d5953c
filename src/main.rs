#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use jumpjump_server::config;
use jumpjump_server::logging;
use jumpjump_server::server::GameServer;
use jumpjump_server::websocket;
use std::net::SocketAddr;
use std::sync::Arc;

/// JumpJump -- authoritative WebSocket room server for 2-player co-op
#[derive(Parser, Debug)]
#[command(name = "jumpjump-server")]
#[command(about = "Authoritative in-memory WebSocket room server for a co-op platformer")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json / environment; defaults otherwise.
    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  CORS origins: {}", cfg.cors_origins);
                println!("  Max players per room: {}", cfg.server.max_players_per_room);
                println!(
                    "  Reconnect window: {}s",
                    cfg.server.reconnect_window_secs
                );
                println!(
                    "  Game start delay: {}ms",
                    cfg.server.game_start_delay_ms
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result.map_err(|e| anyhow::anyhow!("invalid configuration:\n{e}"))?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting JumpJump server");

    let game_server = GameServer::new(Arc::clone(&cfg));

    // Background sweep of abandoned rooms and expired reconnect slots
    let cleanup_server = Arc::clone(&game_server);
    tokio::spawn(async move {
        cleanup_server.cleanup_task().await;
    });

    let app = websocket::create_router(&cfg.cors_origins)
        .fallback(|| async {
            "JumpJump server. Use /ws/room/{room_id} for the game protocol, /api/rooms for the lobby listing."
        })
        .with_state(game_server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.cors_origins,
        "Server started - WebSocket: /ws/room/{{room_id}}, Lobby: /api/rooms"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
