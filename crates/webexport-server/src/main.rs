//! WebExport — background server and popup client in one binary.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;
use webexport_browser::{Browser, CdpDebugger, CdpTabHost};
use webexport_core::{ExportAction, WebExportConfig};
use webexport_runtime::{BackgroundController, DirectoryPrompt, FileDownloads, PopupController};
use webexport_server::{build_router, AppState, HttpBackground};
use webexport_snapshot::{AltChunkConverter, BlobStore, HttpFetcher};

fn print_help() {
    println!("WebExport — save the active browser tab as Word or PDF");
    println!();
    println!("Usage: webexport [command]");
    println!();
    println!("Commands:");
    println!("  (none) | serve   Start the background server");
    println!("  word             Export the active tab as webpage.docx");
    println!("  pdf              Export the active tab as webpage.pdf");
    println!("  tabs             List open tabs");
    println!("  help             Show this help message");
    println!();
    println!("The browser must run with --remote-debugging-port (see WEBEXPORT_CDP_URL).");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = WebExportConfig::from_env()?;
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None | Some("serve") => serve(config).await,
        Some("word") => popup(&config, ExportAction::Word).await,
        Some("pdf") => popup(&config, ExportAction::Pdf).await,
        Some("tabs") => {
            let tabs = HttpBackground::new(&config.server_url).list_tabs().await?;
            for tab in tabs {
                let marker = if tab.active { "*" } else { " " };
                println!("{} {:>3}  {}  {}", marker, tab.id, tab.title, tab.url);
            }
            Ok(())
        }
        Some("--help" | "-h" | "help") => {
            print_help();
            Ok(())
        }
        Some(other) => {
            eprintln!("Unknown command: {}. Use 'webexport help' for usage.", other);
            std::process::exit(1);
        }
    }
}

/// One popup click: a single round trip, then print the status line.
async fn popup(config: &WebExportConfig, action: ExportAction) -> anyhow::Result<()> {
    let controller = PopupController::new(HttpBackground::new(&config.server_url));
    let status = controller.export(action).await;
    println!("{}", status.message);
    for warning in &status.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

async fn serve(config: WebExportConfig) -> anyhow::Result<()> {
    config.ensure_dirs()?;
    info!("Download directory: {}", config.download_dir.display());
    info!("DevTools endpoint: {}", config.cdp_url);

    let browser = Arc::new(Browser::new(&config.cdp_url, config.fetch_timeout)?);
    let blobs = Arc::new(BlobStore::new());

    let tab_host = Arc::new(CdpTabHost::new(
        browser.clone(),
        Arc::new(HttpFetcher::new(config.fetch_timeout)?),
        Arc::new(AltChunkConverter::default()),
        blobs.clone(),
    ));
    let debugger = Arc::new(CdpDebugger::new(browser.clone()));
    let downloads = Arc::new(FileDownloads::new(
        blobs,
        Arc::new(DirectoryPrompt::new(&config.download_dir)),
    ));
    let controller = BackgroundController::new(tab_host, debugger, downloads);

    let port = config.port;
    let state = Arc::new(AppState::new(config, controller, browser));
    let app = build_router(state.clone());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("WebExport server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Blob handles still waiting for their timer are released now.
    state.controller.revocations().flush().await;
    info!("WebExport server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
