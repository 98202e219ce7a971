//! WiFi Link Manager - Main Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wifi_link_manager::{
    AccessPoint, ConnectRequest, WifiManager,
    backend::WifiCtrlBackend,
    config::{CliArgs, Command, Settings},
    core::{listener::NetStateListener, service::LINK_SPEED_UNITS, types::NetworkId},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wifi_link_manager=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Parse CLI arguments
    let args = CliArgs::parse();
    // args may carry a password, do not log them whole
    info!(interface = %args.interface, "Starting WiFi link manager");
    let command = args.command.clone();
    let settings = Settings::from(args);

    // Create WiFi backend
    let backend = Arc::new(
        WifiCtrlBackend::new(
            settings.interface.clone(),
            settings.ethernet_interface.clone(),
        )
        .await?,
    );
    info!("WiFi backend initialized for interface: {}", settings.interface);

    let manager = WifiManager::new(backend, settings.timeouts);

    match command {
        Command::Scan { json } => {
            let access_points = manager.search().await?.await?;
            print_access_points(&access_points, json)?;
        }
        Command::Connect {
            ssid,
            security,
            password,
            username,
            persist,
        } => {
            let mut request = ConnectRequest::new(ssid, security.into(), password).persist(persist);
            if let Some(username) = username {
                request = request.with_username(username);
            }
            let id = manager.connect(request).await?.await?;
            println!("connected, network {}", id);
        }
        Command::Disconnect => {
            manager.disconnect_wifi().await?;
            println!("disconnected");
        }
        Command::Saved { json } => {
            let access_points = manager.configured_networks().await?;
            print_access_points(&access_points, json)?;
        }
        Command::Forget { network_id } => {
            manager.remove_network(NetworkId(network_id)).await?;
            println!("removed network {}", network_id);
        }
        Command::Status => {
            manager.refresh().await?;
            println!("type:     {:?}", manager.active_network_type().await?);
            println!("ssid:     {}", manager.ssid().await);
            println!("bssid:    {}", manager.bssid().await);
            match manager.network_id().await {
                Some(id) => println!("network:  {}", id),
                None => println!("network:  -"),
            }
            println!("ip:       {}", manager.ip_address().await);
            println!("mac:      {}", manager.mac_address().await);
            println!(
                "speed:    {} {}",
                manager.link_speed().await,
                LINK_SPEED_UNITS
            );
            println!("rssi:     {} dBm", manager.rssi().await);
            println!("gateway:  {}", manager.gateway().await);
            println!("dns:      {} {}", manager.dns1().await, manager.dns2().await);
        }
        Command::Watch => {
            manager.register_net_state_listener(PrintListener).await;
            info!("Watching connectivity");

            // Wait for shutdown signal
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                }
                result = shutdown_signal() => {
                    if let Err(e) = result {
                        error!("Failed to register SIGTERM handler: {}", e);
                    } else {
                        info!("Received SIGTERM, shutting down gracefully");
                    }
                }
            }

            manager.unregister_net_state_listener().await;
        }
    }

    Ok(())
}

struct PrintListener;

impl NetStateListener for PrintListener {
    fn on_connect(&self) {
        println!("connected");
    }

    fn on_disconnect(&self) {
        println!("disconnected");
    }
}

fn print_access_points(
    access_points: &[AccessPoint],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(access_points)?);
        return Ok(());
    }

    for ap in access_points {
        let signal = ap
            .level()
            .map(|level| format!("{} dBm", level))
            .unwrap_or_default();
        let id = ap
            .network_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        println!(
            "{:>3} {:<32} {:<14} {:<9} {}",
            id,
            ap.ssid,
            ap.security_label,
            format!("{:?}", ap.status),
            signal
        );
    }
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    sigterm.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    // On non-Unix platforms, just wait forever
    std::future::pending::<()>().await;
    Ok(())
}
