//! Command-line surface over the tile service.
//!
//! # Responsibility
//! - Merge flags over `HEXGLOBE_*` configuration and open the store.
//! - Attach the caching Nominatim geocoder only for address lookups.
//! - Print every result as pretty JSON.

use clap::{ArgGroup, Args, Parser, Subcommand};
use hexglobe_core::{
    core_version, init_logging, seed_sample_tiles, ConfigError, GeocodeError, H3Grid,
    HexGlobeConfig, LogLevel, LoggingError, StorageBackend, StorageError, TileRepository,
    TileService, TileServiceError, TileStore, TileUpdate, VisualProperties,
};
use log::info;
use serde_json::json;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

const DEFAULT_NAMESPACE: &str = "default";

#[derive(Parser, Debug)]
#[command(name = "hexglobe")]
#[command(author, version, about = "Query and edit hexagonal globe tiles")]
pub struct Cli {
    /// Data directory (overrides HEXGLOBE_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend: files | sqlite (overrides HEXGLOBE_STORAGE)
    #[arg(long, global = true)]
    pub storage: Option<String>,

    /// Namespace owning content and visual overrides
    #[arg(short, long, global = true, default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Log level (overrides HEXGLOBE_LOG_LEVEL)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Absolute log directory; file logging is off when unset
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show one tile
    Tile { id: String },
    /// Show the neighbor tiles, clockwise from top_middle
    Neighbors { id: String },
    /// Show the parent tile (null at resolution 0)
    Parent { id: String },
    /// Show the child tiles
    Children { id: String },
    /// Show the tile outline
    Geometry { id: String },
    /// Lay out tiles around a focal tile
    Grid {
        id: String,
        #[arg(long, default_value_t = 5)]
        width: u32,
        #[arg(long, default_value_t = 5)]
        height: u32,
    },
    /// Find the tile containing a coordinate or an address
    Locate(LocateArgs),
    /// Set the content of a tile
    SetContent { id: String, content: String },
    /// Remove the content of a tile
    ClearContent { id: String },
    /// Override visual properties of a tile
    SetVisual {
        id: String,
        #[command(flatten)]
        visual: VisualArgs,
    },
    /// Drop every visual override of a tile
    ResetVisual { id: String },
    /// Move content to a neighboring tile
    Move { from: String, to: String },
    /// Fill a region with sample content
    Seed {
        #[command(flatten)]
        at: Coordinate,
        #[arg(long, default_value_t = 2)]
        radius: u32,
    },
    /// Print the core version
    Version,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct Coordinate {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,
    #[arg(long, default_value_t = 9)]
    pub resolution: i64,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["lat", "address"])))]
pub struct LocateArgs {
    #[arg(long, allow_hyphen_values = true, requires = "lng")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lng: Option<f64>,
    /// Free-text address resolved through the geocoder (HEXGLOBE_GEOCODER_URL)
    #[arg(long, conflicts_with_all = ["lat", "lng"])]
    pub address: Option<String>,
    #[arg(long, default_value_t = 9)]
    pub resolution: i64,
}

#[derive(Args, Debug, Clone, Default)]
pub struct VisualArgs {
    #[arg(long)]
    pub border_color: Option<String>,
    #[arg(long)]
    pub border_thickness: Option<u32>,
    #[arg(long)]
    pub border_style: Option<String>,
    #[arg(long)]
    pub fill_color: Option<String>,
    #[arg(long)]
    pub fill_opacity: Option<f64>,
}

impl From<VisualArgs> for VisualProperties {
    fn from(value: VisualArgs) -> Self {
        Self {
            border_color: value.border_color,
            border_thickness: value.border_thickness,
            border_style: value.border_style,
            fill_color: value.fill_color,
            fill_opacity: value.fill_opacity,
        }
    }
}

/// Failures surfaced to the user on stderr.
#[derive(Debug)]
pub enum CliError {
    Config(ConfigError),
    Logging(LoggingError),
    Geocoder(GeocodeError),
    Storage(StorageError),
    Service(TileServiceError),
    Output(serde_json::Error),
    Usage(&'static str),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration: {err}"),
            Self::Logging(err) => write!(f, "logging: {err}"),
            Self::Geocoder(err) => write!(f, "geocoder: {err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Output(err) => write!(f, "failed to encode output: {err}"),
            Self::Usage(message) => write!(f, "{message}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Geocoder(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Output(err) => Some(err),
            Self::Usage(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<GeocodeError> for CliError {
    fn from(value: GeocodeError) -> Self {
        Self::Geocoder(value)
    }
}

impl From<StorageError> for CliError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<TileServiceError> for CliError {
    fn from(value: TileServiceError) -> Self {
        Self::Service(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value)
    }
}

type Service = TileService<H3Grid, Box<dyn TileStore>>;

/// Runs one command and returns its JSON output.
pub fn run(cli: Cli) -> Result<String, CliError> {
    if matches!(cli.command, Command::Version) {
        return render(&json!({ "version": core_version() }));
    }

    let config = resolve_config(&cli, HexGlobeConfig::from_env()?)?;
    init_logging(&config)?;

    let store = config.open_store()?;
    info!(
        "event=cli_start module=cli status=ok backend={} data_dir={}",
        store.backend_name(),
        config.data_dir.display()
    );
    let mut service = TileService::new(TileRepository::new(H3Grid::new(), store));
    if matches!(&cli.command, Command::Locate(at) if at.address.is_some()) {
        service = service.with_geocoder(config.open_geocoder()?);
    }
    execute(&service, &cli.namespace, cli.command)
}

/// Applies flag overrides on top of `base` and validates the result.
pub fn resolve_config(cli: &Cli, base: HexGlobeConfig) -> Result<HexGlobeConfig, CliError> {
    let mut config = base;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(storage) = &cli.storage {
        config.backend = storage.parse::<StorageBackend>()?;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.parse::<LogLevel>().map_err(ConfigError::from)?;
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn execute(service: &Service, namespace: &str, command: Command) -> Result<String, CliError> {
    match command {
        Command::Tile { id } => render(&service.tile(&id, namespace)?),
        Command::Neighbors { id } => render(&service.neighbors(&id, namespace)?),
        Command::Parent { id } => render(&service.parent(&id, namespace)?),
        Command::Children { id } => render(&service.children(&id, namespace)?),
        Command::Geometry { id } => render(&service.geometry(&id)?),
        Command::Grid { id, width, height } => {
            render(&service.grid(&id, width, height, namespace)?)
        }
        Command::Locate(at) => match (at.address, at.lat, at.lng) {
            (Some(address), _, _) => render(&service.locate_address(&address, at.resolution)?),
            (None, Some(lat), Some(lng)) => {
                let id = service.locate(lat, lng, at.resolution)?;
                render(&json!({
                    "id": id,
                    "coordinates": { "lat": lat, "lng": lng },
                    "resolution": at.resolution,
                }))
            }
            _ => Err(CliError::Usage("locate needs --address or both --lat and --lng")),
        },
        Command::SetContent { id, content } => render(&service.update_tile(
            &id,
            namespace,
            TileUpdate {
                content: Some(Some(content)),
                visual_properties: None,
            },
        )?),
        Command::ClearContent { id } => render(&service.update_tile(
            &id,
            namespace,
            TileUpdate {
                content: Some(None),
                visual_properties: None,
            },
        )?),
        Command::SetVisual { id, visual } => {
            render(&service.update_visual(&id, namespace, visual.into())?)
        }
        Command::ResetVisual { id } => render(&service.reset_visual(&id, namespace)?),
        Command::Move { from, to } => {
            let (source, target) = service.move_content(&from, &to, namespace)?;
            render(&json!({ "from": source, "to": target }))
        }
        Command::Seed { at, radius } => {
            let seeded =
                seed_sample_tiles(service, namespace, at.lat, at.lng, at.resolution, radius)?;
            render(&json!({ "count": seeded.len(), "ids": seeded }))
        }
        Command::Version => render(&json!({ "version": core_version() })),
    }
}

fn render<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}
