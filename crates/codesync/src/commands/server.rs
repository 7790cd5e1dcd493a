//! Server command

use anyhow::Result;
use clap::Args;
use codesync_core::{
    resolve_roots, ConfigRoot, PathContext, Platform, SyncConfig, SyncError, DEFAULT_PORT,
    EXTENSIONS_LABEL,
};
use codesync_transfer::{detect_lan_ip, is_private_lan, ServerOptions, SyncServer};
use std::net::{IpAddr, SocketAddr};

use crate::output;

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Do not transfer installed extensions
    #[arg(long)]
    pub no_extensions: bool,

    /// Additional exclude patterns (glob, relative to each settings root)
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Address to bind (default from config: 0.0.0.0)
    #[arg(long)]
    pub bind: Option<String>,
}

pub async fn run(args: ServerArgs, config: SyncConfig) -> Result<()> {
    output::header("Settings Sync Server");

    let include_extensions = config.transfer.include_extensions && !args.no_extensions;
    let roots = resolve_roots(&Platform::current(), &PathContext::from_env(), include_extensions)?;
    let roots = existing_roots(roots)?;

    for root in &roots {
        output::kv(root.label().unwrap_or("Settings"), &root.path().display().to_string());
    }

    let mut options = ServerOptions::from_config(&config);
    options.exclude.extend(args.exclude);
    if let Some(bind) = args.bind {
        options.bind_address = bind;
    }

    let server = SyncServer::new(roots, options)?;
    let listener = server.bind().await?;
    let port = listener.local_addr()?.port();

    println!();
    output::success("Server started");
    match detect_lan_ip() {
        Some(ip) => {
            output::info("On the other machine run:");
            output::command(&client_command(ip, port));
            if let Some(notice) = address_notice(ip) {
                output::warning(notice);
            }
        }
        None => {
            output::warning("Could not determine this machine's LAN address");
            output::command(&format!(
                "codesync client <address-of-this-machine> --port {}",
                port
            ));
        }
    }
    output::info("Waiting for connections (Ctrl-C to stop)...");

    server.serve(listener, shutdown_signal()).await?;

    output::success("Server stopped");
    Ok(())
}

/// Drops roots that do not exist. The settings root itself is required.
fn existing_roots(roots: Vec<ConfigRoot>) -> Result<Vec<ConfigRoot>> {
    let mut kept = Vec::with_capacity(roots.len());

    for root in roots {
        if root.path().is_dir() {
            kept.push(root);
        } else if root.label() == Some(EXTENSIONS_LABEL) {
            output::warning(&format!(
                "Extensions directory not found, skipping: {}",
                root.path().display()
            ));
        } else {
            return Err(SyncError::config_not_found(format!(
                "{} does not exist",
                root.path().display()
            ))
            .into());
        }
    }

    Ok(kept)
}

/// Command line a client runs to reach this server.
fn client_command(ip: IpAddr, port: u16) -> String {
    if port == DEFAULT_PORT {
        match ip {
            IpAddr::V4(v4) => format!("codesync client {}", v4),
            IpAddr::V6(v6) => format!("codesync client [{}]", v6),
        }
    } else {
        format!("codesync client {}", SocketAddr::new(ip, port))
    }
}

/// Caveat shown under the client command for addresses outside LAN ranges.
fn address_notice(ip: IpAddr) -> Option<&'static str> {
    if is_private_lan(ip) {
        None
    } else {
        Some(
            "This address is outside the private LAN ranges and may belong to a VPN tunnel. \
             If the client cannot connect, use this machine's LAN address instead.",
        )
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    println!();
    output::info("Stop requested, waiting for transfers in progress to finish...");
}
