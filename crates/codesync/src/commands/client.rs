//! Client command

use anyhow::Result;
use clap::Args;
use codesync_core::{resolve_roots, PathContext, Platform, SyncConfig};
use codesync_transfer::{ClientOptions, SyncClient};

use crate::output;
use crate::utils::format_bytes;

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Server address: host, host:port, or an IPv6 literal
    pub address: String,

    /// Do not replace installed extensions
    #[arg(long)]
    pub no_extensions: bool,
}

pub async fn run(args: ClientArgs, config: SyncConfig, quiet: bool) -> Result<()> {
    output::header("Settings Sync Client");

    let include_extensions = config.transfer.include_extensions && !args.no_extensions;
    let roots = resolve_roots(&Platform::current(), &PathContext::from_env(), include_extensions)?;

    output::kv("Server", &args.address);
    for root in &roots {
        output::kv(root.label().unwrap_or("Settings"), &root.path().display().to_string());
    }
    println!();

    let options = ClientOptions::from_config(&config).with_progress(!quiet);
    let client = SyncClient::new(options)?;

    let report = match client.sync(&args.address, &roots).await {
        Ok(report) => report,
        Err(err) => {
            output::error(&format!("Sync failed: {}", err));
            if err.touched_destination() {
                output::warning(
                    "Settings may be partially overwritten. Restore them from the backup logged above.",
                );
            } else {
                output::info("Local settings were not changed");
            }
            return Err(err.into());
        }
    };

    println!();
    output::success("Sync completed");
    println!();
    for snapshot in &report.backups {
        output::kv("Backup", &snapshot.backup().display().to_string());
    }
    output::kv("Files", &report.stats.files_written.to_string());
    output::kv("Received", &format_bytes(report.bytes_received));
    if report.stats.skipped > 0 {
        output::kv("Skipped", &report.stats.skipped.to_string());
    }
    println!();

    output::info("Restart VS Code to apply the new settings");
    Ok(())
}
