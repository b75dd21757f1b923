//! Two-player co-op demo.
//!
//! ```text
//! coop-server host --bind 0.0.0.0:7878 --config level.json
//! coop-server join ws://192.168.1.20:7878 --token 7
//! ```
//!
//! `host` runs the authoritative world and plays as the host participant.
//! `join` connects as a guest, walks right for a second, then requests a
//! reset.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tandem::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "coop-server", about = "Tandem co-op demo")]
struct Args {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Host the world and play as the host.
    Host {
        #[arg(long, default_value = "0.0.0.0:7878")]
        bind: String,

        /// JSON world config; omitted fields keep their defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Overrides the world tick rate (0 = event-driven).
        #[arg(long)]
        tick_rate: Option<u32>,
    },
    /// Join a running host as a guest.
    Join {
        url: String,

        #[arg(long, default_value = "1")]
        token: String,
    },
}

/// Uses the token itself as the numeric client id. Development only.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn authenticate(&self, token: &str) -> Result<ClientId, SessionError> {
        token
            .parse()
            .map(ClientId)
            .map_err(|_| SessionError::AuthFailed("token must be a number".into()))
    }
}

fn load_world_config(path: Option<&Path>) -> Result<WorldConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(WorldConfig::default()),
    }
}

async fn host(
    bind: &str,
    config: Option<&Path>,
    tick_rate: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut world_config = load_world_config(config)?;
    if let Some(rate) = tick_rate {
        world_config.tick_rate = rate;
    }
    info!(
        %bind,
        tick_rate = world_config.tick_rate,
        solids = world_config.solids.len(),
        gates = world_config.gates.len(),
        reentry_points = world_config.reentry_points.len(),
        "starting co-op host"
    );

    let mut server = TandemServerBuilder::new()
        .bind(bind)
        .world_config(world_config)
        .build(TokenAuth)
        .await?;
    let mut host = server.take_host().ok_or("host participant already taken")?;
    let world = server.world();

    tokio::spawn(async move {
        while let Some(event) = host.next_event().await {
            match event {
                ServerEvent::EntitySpawned { owner, entity, position, .. } => {
                    info!(%owner, %entity, x = position.x, y = position.y, "spawned");
                }
                ServerEvent::EntityDespawned { owner, entity } => {
                    info!(%owner, %entity, "despawned");
                }
                ServerEvent::CameraMoved { position } => {
                    info!(y = position.y, "camera moved");
                }
                ServerEvent::GateChanged { gate, open } => {
                    info!(%gate, open, "gate changed");
                }
                ServerEvent::WorldReset { initiator } => {
                    info!(%initiator, "world reset");
                }
                ServerEvent::TransformChanged(_) => {}
            }
        }
    });

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            world.shutdown().await?;
        }
    }
    Ok(())
}

async fn join(url: &str, token: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut guest = RemoteParticipant::connect(url, Some(token), WorldConfig::default().move_speed).await?;
    info!(client = %guest.client_id(), role = %guest.role(), "joined");

    let dt = Duration::from_millis(100);
    while guest.view().own_entity().is_none() {
        if guest.next_event_within(Duration::from_secs(2)).await?.is_none() {
            return Err("no player spawned for us".into());
        }
    }

    for _ in 0..10 {
        guest.sample_input(InputAxes::new(1.0, 0.0), dt).await?;
        tokio::time::sleep(dt).await;
        while guest.next_event_within(Duration::from_millis(5)).await?.is_some() {}
    }
    if let Some(position) = guest.view().own_position() {
        info!(x = position.x, y = position.y, "walked");
    }

    guest.request(ClientRequest::RequestReset).await?;
    while let Some(event) = guest.next_event_within(Duration::from_secs(2)).await? {
        if matches!(event, ServerEvent::WorldReset { .. }) {
            break;
        }
    }
    if let Some(position) = guest.view().own_position() {
        info!(x = position.x, y = position.y, "back at the start");
    }

    guest.close("demo finished").await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log)?;

    match args.mode {
        Mode::Host {
            bind,
            config,
            tick_rate,
        } => host(&bind, config.as_deref(), tick_rate).await,
        Mode::Join { url, token } => join(&url, &token).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_args_parse_with_defaults() {
        let args = Args::parse_from(["coop-server", "host"]);

        match args.mode {
            Mode::Host { bind, config, tick_rate } => {
                assert_eq!(bind, "0.0.0.0:7878");
                assert!(config.is_none());
                assert!(tick_rate.is_none());
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(args.log, "info");
    }

    #[test]
    fn test_join_args_parse() {
        let args = Args::parse_from(["coop-server", "join", "ws://host:7878", "--token", "7"]);

        assert!(matches!(args.mode, Mode::Join { ref token, .. } if token == "7"));
    }

    #[test]
    fn test_missing_config_path_uses_defaults() {
        let config = load_world_config(None).unwrap();
        assert_eq!(config, WorldConfig::default());
    }

    #[tokio::test]
    async fn test_token_auth_rejects_non_numeric() {
        assert_eq!(TokenAuth.authenticate("7").await.unwrap(), ClientId(7));
        assert!(TokenAuth.authenticate("seven").await.is_err());
    }
}
