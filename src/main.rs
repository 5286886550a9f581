//! CorView - correlative micro-CT and histology viewer.
//!
//! This binary drives the library: exports artifacts, lists and inspects
//! sessions, and runs the live server.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use corview::{
    config::{Cli, Command, ExportConfig, InspectConfig, ListConfig, ServeConfig, SessionArgs},
    export::{Artifact, ArtifactExporter},
    server::{create_router_with_state, RouterConfig},
    Session,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Export(config) => run_export(config),
        Command::List(config) => run_list(config),
        Command::Inspect(config) => run_inspect(config),
        Command::Serve(config) => run_serve(config).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "corview=debug,tower_http=debug"
    } else {
        "corview=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the session described by a manifest and/or command-line arguments.
fn open_session(session: &SessionArgs) -> Result<(Session, Option<String>), String> {
    let manifest = session.to_manifest().map_err(|e| e.to_string())?;
    let opened = Session::from_manifest(&manifest).map_err(|e| e.to_string())?;
    Ok((opened, manifest.title))
}

// =============================================================================
// Export Command
// =============================================================================

fn run_export(config: ExportConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (session, manifest_title) = match open_session(&config.session) {
        Ok(opened) => opened,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut exporter = ArtifactExporter::new()
        .policy(config.policy)
        .max_bytes(config.max_artifact_bytes());
    if let Some(title) = config.title.clone().or(manifest_title) {
        exporter = exporter.title(title);
    }

    match exporter.export(session.volume(), session.registrations(), &config.output) {
        Ok(summary) => {
            println!("Wrote {}", summary.path.display());
            println!(
                "  {} slices, {} registered images, {:.2} MB",
                summary.slice_count,
                summary.image_count,
                summary.bytes as f64 / (1024.0 * 1024.0)
            );
            println!("  Policy: {}", summary.policy);
            println!("  Mapping: {}", summary.fingerprint);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Export failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// List Command
// =============================================================================

fn run_list(config: ListConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (session, _) = match open_session(&config.session) {
        Ok(opened) => opened,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let listing = session.registrations().list_all();

    if config.json {
        match serde_json::to_string_pretty(&listing) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize listing: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    let volume = session.volume();
    println!(
        "{} ({} slices, {} × {} px)",
        volume.filename(),
        volume.slice_count(),
        volume.width(),
        volume.height()
    );
    println!();

    if listing.is_empty() {
        println!("  (no registrations)");
        return ExitCode::SUCCESS;
    }

    let id_width = listing
        .iter()
        .map(|l| l.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    println!("  {:<id_width$}  {:>8}  FILENAME", "ID", "POSITION");
    for row in &listing {
        println!(
            "  {:<id_width$}  {:>8}  {}",
            row.id.to_string(),
            row.position,
            row.filename
        );
    }
    println!();
    println!("Total: {} registration(s)", listing.len());

    ExitCode::SUCCESS
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let artifact = match Artifact::read(&config.artifact) {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("Failed to read {}: {}", config.artifact.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let payload = &artifact.payload;

    if let Some(slice) = config.slice {
        if slice as usize >= payload.slice_count {
            error!(
                "Slice {} out of range: artifact has {} slices",
                slice, payload.slice_count
            );
            return ExitCode::FAILURE;
        }
        match payload.resolve(slice) {
            Some(image) => println!("{}\t{}\t{}", slice, image.id, image.filename),
            None => println!("{}\t-\t-", slice),
        }
        return ExitCode::SUCCESS;
    }

    println!("{}", payload.title);
    println!(
        "  Volume: {} ({} slices, {} × {} px)",
        payload.volume, payload.slice_count, payload.width, payload.height
    );
    println!("  Policy: {}", payload.policy);
    println!("  Images: {}", payload.images.len());
    println!("  Mapping: {}", payload.fingerprint());
    println!();

    for index in 0..payload.slice_count {
        match payload.resolve(index as i64) {
            Some(image) => println!("  {:>5}  {}  {}", index, image.id, image.filename),
            None => println!("  {:>5}  -", index),
        }
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let router_config = build_router_config(&config);
    let state = router_config.app_state();

    info!("Configuration:");
    info!("  Policy: {:?}", config.policy);
    info!("  Export directory: {}", config.export_dir.display());
    info!(
        "  Cache: {}MB slices, max-age {}s",
        config.cache_mb, config.cache_max_age
    );
    if config.no_tracing {
        warn!("  Request tracing: disabled");
    }

    if let Some(ref volume) = config.volume {
        let path = volume.clone();
        let opened = tokio::task::spawn_blocking(move || Session::open(&path)).await;
        match opened {
            Ok(Ok(session)) => {
                let id = state.sessions.insert(session).await;
                info!("  Preloaded {} as {}", volume.display(), id);
            }
            Ok(Err(e)) => {
                error!("Failed to load {}: {}", volume.display(), e);
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!("Failed to load {}: {}", volume.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let router = create_router_with_state(state, &router_config);
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Open a session:");
    info!(
        "    curl -X POST http://{}/sessions -H 'content-type: application/json' \\",
        addr
    );
    info!("         -d '{{\"volume\": \"/path/to/stack.tif\"}}'");
    info!("");
    info!("  View it in your browser:");
    info!("    open http://{}/sessions/<id>/view", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_policy(config.policy)
        .with_export_dir(config.export_dir.clone())
        .with_max_artifact_bytes(config.max_artifact_bytes())
        .with_slice_cache_bytes(config.cache_bytes())
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
