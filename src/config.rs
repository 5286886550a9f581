//! Configuration management for CorView.
//!
//! This module provides the command-line interface:
//! - Subcommands via clap derive (`export`, `list`, `inspect`, `serve`)
//! - Environment variables with the `CORVIEW_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use corview::config::{Cli, Command};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Command::Export(config) => println!("Writing {}", config.output.display()),
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CORVIEW_VOLUME` - Volume path (TIFF stack or slice directory)
//! - `CORVIEW_MANIFEST` - Session manifest
//! - `CORVIEW_POLICY` - Resolution policy: `exact` or `nearest-below`
//! - `CORVIEW_OUTPUT` - Export path (default: 3DXRH-Vis.html)
//! - `CORVIEW_MAX_ARTIFACT_MB` - Largest artifact to write (default: 512)
//! - `CORVIEW_HOST` / `CORVIEW_PORT` - Server bind address (default: 0.0.0.0:3000)
//! - `CORVIEW_CACHE_MB` - Slice cache budget (default: 256)
//! - `CORVIEW_EXPORT_DIR` - Directory server exports are written into
//! - `CORVIEW_CORS_ORIGINS` - Allowed CORS origins, comma separated

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::ManifestError;
use crate::export::DEFAULT_OUTPUT_FILE;
use crate::manifest::{Manifest, ManifestRegistration};
use crate::registration::ResolutionPolicy;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default slice cache budget in megabytes.
pub const DEFAULT_CACHE_MB: usize = 256;

/// Default artifact size limit in megabytes.
pub const DEFAULT_MAX_ARTIFACT_MB: u64 = 512;

const MB: u64 = 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// CorView - correlative micro-CT and histology viewer.
///
/// Registers 2D images against slices of a 3D volume and exports a
/// self-contained HTML dual view, or serves it live.
#[derive(Parser, Debug, Clone)]
#[command(name = "corview")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Export a volume and its registrations as a standalone HTML file.
    Export(ExportConfig),

    /// List the registrations of a session.
    List(ListConfig),

    /// Print the slice → image mapping embedded in an exported artifact.
    Inspect(InspectConfig),

    /// Run the live dual view server.
    Serve(ServeConfig),
}

// =============================================================================
// Session Arguments
// =============================================================================

/// One `--register <image>:<position>` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterArg {
    pub image: PathBuf,
    pub position: i64,
}

/// Parse `<image>:<position>`, splitting at the last `:`.
pub fn parse_register(s: &str) -> Result<RegisterArg, String> {
    let (image, position) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <image>:<position>, got '{}'", s))?;
    if image.is_empty() {
        return Err(format!("missing image path in '{}'", s));
    }
    let position = position
        .trim()
        .parse()
        .map_err(|_| format!("invalid slice position '{}' in '{}'", position, s))?;

    Ok(RegisterArg {
        image: PathBuf::from(image),
        position,
    })
}

/// Where a session comes from: a volume, a manifest, or both.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Volume to load: a multi-page TIFF or a directory of slice images.
    ///
    /// Overrides the manifest's volume when both are given.
    #[arg(long, env = "CORVIEW_VOLUME")]
    pub volume: Option<PathBuf>,

    /// Register an image at a slice position, as `<image>:<position>`.
    ///
    /// Repeatable. Applied after the manifest's registrations.
    #[arg(long = "register", value_parser = parse_register)]
    pub registrations: Vec<RegisterArg>,

    /// JSON manifest with the volume, title and registrations.
    #[arg(long, env = "CORVIEW_MANIFEST")]
    pub manifest: Option<PathBuf>,
}

impl SessionArgs {
    pub fn validate(&self) -> Result<(), String> {
        if self.volume.is_none() && self.manifest.is_none() {
            return Err(
                "No volume given. Set --volume or CORVIEW_VOLUME, or pass --manifest".to_string(),
            );
        }
        Ok(())
    }

    /// Merge the manifest (if any) with the command-line arguments.
    pub fn to_manifest(&self) -> Result<Manifest, ManifestError> {
        let mut manifest = match &self.manifest {
            Some(path) => Manifest::load(path)?,
            None => Manifest {
                volume: PathBuf::new(),
                title: None,
                registrations: Vec::new(),
            },
        };

        if let Some(volume) = &self.volume {
            manifest.volume = volume.clone();
        }
        manifest
            .registrations
            .extend(self.registrations.iter().map(|r| ManifestRegistration {
                image: r.image.clone(),
                position: r.position,
            }));
        Ok(manifest)
    }
}

// =============================================================================
// Export Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ExportConfig {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Output file; `.html` is appended when missing.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE, env = "CORVIEW_OUTPUT")]
    pub output: PathBuf,

    /// Document title. Defaults to the manifest's title.
    #[arg(long, env = "CORVIEW_TITLE")]
    pub title: Option<String>,

    /// How slices without an exact registration are resolved.
    #[arg(long, value_enum, default_value_t = ResolutionPolicy::Exact, env = "CORVIEW_POLICY")]
    pub policy: ResolutionPolicy,

    /// Largest artifact to write, in megabytes.
    #[arg(long, default_value_t = DEFAULT_MAX_ARTIFACT_MB, env = "CORVIEW_MAX_ARTIFACT_MB")]
    pub max_artifact_mb: u64,
}

impl ExportConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()?;

        if self.output.as_os_str().is_empty() {
            return Err("output path must not be empty".to_string());
        }
        if self.max_artifact_mb == 0 {
            return Err("max_artifact_mb must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn max_artifact_bytes(&self) -> u64 {
        self.max_artifact_mb.saturating_mul(MB)
    }
}

// =============================================================================
// List Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ListConfig {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Print JSON instead of a table.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl ListConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.session.validate()
    }
}

// =============================================================================
// Inspect Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Exported artifact to read.
    pub artifact: PathBuf,

    /// Only print the image resolved for this slice.
    #[arg(long)]
    pub slice: Option<i64>,
}

impl InspectConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.artifact.as_os_str().is_empty() {
            return Err("artifact path must not be empty".to_string());
        }
        if let Some(slice) = self.slice {
            if slice < 0 {
                return Err(format!("slice must not be negative, got {}", slice));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "CORVIEW_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "CORVIEW_PORT")]
    pub port: u16,

    /// Budget of the encoded slice cache, in megabytes.
    #[arg(long, default_value_t = DEFAULT_CACHE_MB, env = "CORVIEW_CACHE_MB")]
    pub cache_mb: usize,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "CORVIEW_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORVIEW_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// How slices without an exact registration are resolved.
    #[arg(long, value_enum, default_value_t = ResolutionPolicy::Exact, env = "CORVIEW_POLICY")]
    pub policy: ResolutionPolicy,

    /// Directory exports are written into.
    #[arg(long, default_value = ".", env = "CORVIEW_EXPORT_DIR")]
    pub export_dir: PathBuf,

    /// Largest artifact an export may produce, in megabytes.
    #[arg(long, default_value_t = DEFAULT_MAX_ARTIFACT_MB, env = "CORVIEW_MAX_ARTIFACT_MB")]
    pub max_artifact_mb: u64,

    /// Open a session for this volume at startup.
    #[arg(long, env = "CORVIEW_VOLUME")]
    pub volume: Option<PathBuf>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }
        if self.cache_mb == 0 {
            return Err("cache_mb must be greater than 0".to_string());
        }
        if self.max_artifact_mb == 0 {
            return Err("max_artifact_mb must be greater than 0".to_string());
        }
        if !self.export_dir.is_dir() {
            return Err(format!(
                "export directory does not exist: {}",
                self.export_dir.display()
            ));
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_bytes(&self) -> usize {
        self.cache_mb.saturating_mul(MB as usize)
    }

    pub fn max_artifact_bytes(&self) -> u64 {
        self.max_artifact_mb.saturating_mul(MB)
    }
}

// =============================================================================
// Tests
// =============================================================================
