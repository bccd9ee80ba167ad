#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the waypoint location engine.
//!
//! ```text
//! waypoint route --from 52.3731,4.8926 --to 52.3600,4.8852 [--mode walking]
//! waypoint zones add-circle <id> <name> --center <lat,lng> --radius <m>
//! waypoint zones add-polygon <id> <name> --vertex <lat,lng> --vertex ...
//! waypoint zones list | remove <id>
//! waypoint offline download <region> --south-west <lat,lng> --north-east <lat,lng>
//! waypoint offline check <lat,lng> | list | remove <region>
//! waypoint replay <fixes.json> [--navigate-to <lat,lng>]
//! waypoint weather <lat,lng>
//! waypoint pois <lat,lng> [--category cafe] [--radius 500]
//! ```
//!
//! Zones and offline regions persist under the configured data directory
//! (`WAYPOINT_DATA_DIR`, default `data/`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use waypoint_discovery_models::PoiFilters;
use waypoint_engine::{EngineConfig, LocationEngine};
use waypoint_geo_models::{Bounds, Coordinate, Position};
use waypoint_geofence_models::{GeofenceTrigger, GeofenceZone, TriggerAction, TriggerEvent};
use waypoint_location::{PositionSource, ReplaySource};
use waypoint_notification::{MemorySink, NotificationSink};
use waypoint_routing_models::{OptimizeFor, RouteData, RouteOptions, TravelMode};

#[derive(Parser)]
#[command(name = "waypoint", about = "Location intelligence from the command line")]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a route between two points
    Route {
        /// Origin as lat,lng
        #[arg(long, value_parser = parse_coordinate)]
        from: Coordinate,
        /// Destination as lat,lng or a place name
        #[arg(long)]
        to: String,
        #[command(flatten)]
        options: RouteArgs,
        /// Print the route as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage geofence zones
    #[command(subcommand)]
    Zones(ZoneCommands),
    /// Manage offline map regions
    #[command(subcommand)]
    Offline(OfflineCommands),
    /// Replay recorded fixes through geofencing and navigation
    Replay {
        /// JSON array of positions and error markers
        file: PathBuf,
        /// Delay between fixes in milliseconds
        #[arg(long, default_value = "0")]
        interval_ms: u64,
        /// Navigate from the first fix to this destination while replaying
        #[arg(long)]
        navigate_to: Option<String>,
        #[command(flatten)]
        options: RouteArgs,
    },
    /// Current weather at a location
    Weather {
        #[arg(value_parser = parse_coordinate)]
        location: Coordinate,
    },
    /// Places near a location
    Pois {
        #[arg(value_parser = parse_coordinate)]
        location: Coordinate,
        /// Category to include (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Search radius in meters
        #[arg(long, default_value = "1000")]
        radius: f64,
        #[arg(long, default_value = "20")]
        limit: usize,
        #[arg(long)]
        min_rating: Option<f64>,
    },
}

#[derive(Args)]
struct RouteArgs {
    /// driving, walking, cycling, or transit
    #[arg(long, default_value = "driving")]
    mode: TravelMode,
    /// Instruction language (en, pl); defaults to the configured language
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    avoid_traffic: bool,
    #[arg(long)]
    alternatives: bool,
    /// time or distance
    #[arg(long, default_value = "time")]
    optimize_for: OptimizeFor,
}

impl RouteArgs {
    fn options(&self, engine: &LocationEngine) -> RouteOptions {
        let defaults = engine.route_options();
        RouteOptions {
            mode: self.mode,
            language: self.language.clone().unwrap_or(defaults.language),
            avoid_traffic: self.avoid_traffic,
            alternatives: self.alternatives,
            optimize_for: self.optimize_for,
        }
    }
}

#[derive(Args)]
struct TriggerArgs {
    /// Events that notify the user
    #[arg(long = "on", value_delimiter = ',', default_value = "enter,exit")]
    events: Vec<TriggerEvent>,
    /// Dwell threshold in seconds; adds a dwell notification
    #[arg(long)]
    dwell_secs: Option<u64>,
    /// POST every event to this URL
    #[arg(long)]
    webhook: Option<String>,
    /// Record every event as a visit
    #[arg(long)]
    analytics: bool,
    /// Notification text
    #[arg(long)]
    message: Option<String>,
    #[arg(long, default_value = "general")]
    category: String,
}

impl TriggerArgs {
    fn apply(self, mut zone: GeofenceZone) -> GeofenceZone {
        for event in &self.events {
            zone = zone.with_trigger(GeofenceTrigger::new(*event, TriggerAction::Notification));
        }
        if let Some(secs) = self.dwell_secs {
            zone = zone.with_trigger(GeofenceTrigger::dwell(TriggerAction::Notification, secs));
        }
        if let Some(url) = &self.webhook {
            for event in &self.events {
                zone = zone.with_trigger(GeofenceTrigger::webhook(*event, url.clone()));
            }
        }
        if self.analytics {
            for event in &self.events {
                zone = zone.with_trigger(GeofenceTrigger::new(*event, TriggerAction::Analytics));
            }
        }
        zone.custom_message = self.message;
        zone.category = self.category;
        zone
    }
}

#[derive(Subcommand)]
enum ZoneCommands {
    /// Add a circular zone
    AddCircle {
        id: String,
        name: String,
        #[arg(long, value_parser = parse_coordinate)]
        center: Coordinate,
        /// Radius in meters
        #[arg(long)]
        radius: f64,
        #[command(flatten)]
        triggers: TriggerArgs,
    },
    /// Add a polygon zone
    AddPolygon {
        id: String,
        name: String,
        /// Vertex as lat,lng (at least three)
        #[arg(long = "vertex", value_parser = parse_coordinate)]
        vertices: Vec<Coordinate>,
        #[command(flatten)]
        triggers: TriggerArgs,
    },
    /// List zones
    List,
    /// Remove a zone
    Remove { id: String },
}

#[derive(Subcommand)]
enum OfflineCommands {
    /// Download a region
    Download {
        region: String,
        #[arg(long, value_parser = parse_coordinate)]
        south_west: Coordinate,
        #[arg(long, value_parser = parse_coordinate)]
        north_east: Coordinate,
    },
    /// Check whether a point is covered by a downloaded region
    Check {
        #[arg(value_parser = parse_coordinate)]
        location: Coordinate,
    },
    /// List downloaded regions
    List,
    /// Delete a region
    Remove { region: String },
}

fn parse_coordinate(text: &str) -> Result<Coordinate, String> {
    Coordinate::parse(text)
        .filter(Coordinate::is_valid)
        .ok_or_else(|| format!("expected lat,lng but got {text:?}"))
}

/// Commands other than `replay` have no live position source.
fn no_gps() -> Arc<dyn PositionSource> {
    Arc::new(ReplaySource::new(Vec::new(), Duration::ZERO))
}

fn print_route(route: &RouteData) {
    println!(
        "{:.0} m, {:.0} min, {} step(s)",
        route.total_distance,
        route.total_duration / 60.0,
        route.steps.len()
    );
    for (i, step) in route.steps.iter().enumerate() {
        println!(
            "{:>3}. {:<40} {:>8.0} m  {}",
            i + 1,
            step.instruction,
            step.distance,
            step.coordinates
        );
    }
    if let Some(traffic) = &route.traffic {
        println!(
            "Traffic: {} (+{:.0} s, {} incident(s))",
            traffic.congestion_level,
            traffic.estimated_delay,
            traffic.incidents.len()
        );
    }
    if !route.alternatives.is_empty() {
        println!("{} alternative route(s)", route.alternatives.len());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let config = EngineConfig::load(cli.config.as_deref()).await?;

    let command = match cli.command {
        Commands::Replay {
            file,
            interval_ms,
            navigate_to,
            options,
        } => {
            return replay(&config, &file, interval_ms, navigate_to.as_deref(), &options).await;
        }
        command => command,
    };

    let sink: Arc<dyn NotificationSink> = Arc::new(MemorySink::new());
    let engine = LocationEngine::open(&config, no_gps(), sink).await?;

    match command {
        Commands::Route {
            from,
            to,
            options,
            json,
        } => {
            let route = engine
                .calculate_route(from, &to, &options.options(&engine))
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(route.as_ref())?);
            } else {
                print_route(&route);
            }
        }
        Commands::Zones(command) => zones(&engine, command).await?,
        Commands::Offline(command) => offline(&engine, command).await?,
        Commands::Weather { location } => {
            let weather = engine.get_weather_info(location).await?;
            println!("{:.1} °C, {}", weather.temperature, weather.condition);
            if let Some(humidity) = weather.humidity {
                println!("Humidity: {humidity:.0}%");
            }
            if let Some(wind) = weather.wind_speed {
                println!("Wind: {wind:.1} m/s");
            }
        }
        Commands::Pois {
            location,
            categories,
            radius,
            limit,
            min_rating,
        } => {
            let filters = PoiFilters {
                categories,
                radius_m: radius,
                limit,
                min_rating,
            };
            let pois = engine.find_nearby_pois(location, &filters).await;
            if pois.is_empty() {
                println!("No places found.");
            }
            for poi in pois.iter() {
                println!(
                    "{:>6.0} m  {:<30} {:<12} {}",
                    poi.distance.unwrap_or_default(),
                    poi.name,
                    poi.category,
                    poi.rating.map_or_else(String::new, |r| format!("★ {r:.1}"))
                );
            }
        }
        Commands::Replay { .. } => {}
    }

    Ok(())
}

async fn zones(
    engine: &LocationEngine,
    command: ZoneCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ZoneCommands::AddCircle {
            id,
            name,
            center,
            radius,
            triggers,
        } => {
            let zone = triggers.apply(GeofenceZone::circle(id, name, center, radius));
            let id = zone.id.clone();
            engine.add_geofence(zone).await?;
            println!("Added zone {id}");
        }
        ZoneCommands::AddPolygon {
            id,
            name,
            vertices,
            triggers,
        } => {
            let zone = triggers.apply(GeofenceZone::polygon(id, name, vertices));
            let id = zone.id.clone();
            engine.add_geofence(zone).await?;
            println!("Added zone {id}");
        }
        ZoneCommands::List => {
            let zones = engine.geofences().await;
            if zones.is_empty() {
                println!("No zones.");
            }
            for zone in &zones {
                let shape = match (&zone.circular, &zone.polygon) {
                    (Some(circle), _) => format!("circle {} r={:.0} m", circle.center, circle.radius),
                    (None, Some(vertices)) => format!("polygon ({} vertices)", vertices.len()),
                    (None, None) => "no shape".to_string(),
                };
                println!(
                    "{:<20} {:<24} {:<12} {} trigger(s)  {shape}",
                    zone.id,
                    zone.name,
                    zone.category,
                    zone.triggers.len()
                );
            }
        }
        ZoneCommands::Remove { id } => {
            if engine.remove_geofence(&id).await {
                println!("Removed zone {id}");
            } else {
                eprintln!("Zone not found: {id}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn offline(
    engine: &LocationEngine,
    command: OfflineCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        OfflineCommands::Download {
            region,
            south_west,
            north_east,
        } => {
            let bounds = Bounds {
                south_west,
                north_east,
            };
            let data = engine.download_offline_map(&region, bounds).await?;
            println!(
                "Downloaded {} ({} tiles, {} places, {} routes)",
                data.region_id,
                data.tiles.len(),
                data.pois.len(),
                data.routes.len()
            );
        }
        OfflineCommands::Check { location } => {
            if engine.is_offline_data_available(location) {
                println!("Offline data available at {location}");
            } else {
                println!("No offline data at {location}");
                std::process::exit(1);
            }
        }
        OfflineCommands::List => {
            let regions = engine.offline_regions();
            if regions.is_empty() {
                println!("No offline regions.");
            }
            for region in &regions {
                println!(
                    "{:<24} {} .. {}  updated {}",
                    region.region_id,
                    region.bounds.south_west,
                    region.bounds.north_east,
                    region.last_updated.format("%Y-%m-%d %H:%M")
                );
            }
        }
        OfflineCommands::Remove { region } => {
            if engine.remove_offline_region(&region).await? {
                println!("Removed region {region}");
            } else {
                eprintln!("Region not found: {region}");
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

async fn replay(
    config: &EngineConfig,
    file: &std::path::Path,
    interval_ms: u64,
    navigate_to: Option<&str>,
    route_args: &RouteArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = tokio::fs::read_to_string(file).await?;
    let source = ReplaySource::from_json(&text, Duration::from_millis(interval_ms))?;
    log::info!("Replaying {} recorded entries from {}", source.len(), file.display());

    let sink = Arc::new(MemorySink::new());
    let engine = LocationEngine::open(config, Arc::new(source), sink.clone()).await?;

    if let Some(destination) = navigate_to {
        let origin = engine.get_current_position().await?.coordinate();
        let route = engine
            .calculate_route(origin, destination, &route_args.options(&engine))
            .await?;
        print_route(&route);
        engine.start_navigation(route);
    }

    let handle = engine.start_tracking(|position: &Position| {
        println!(
            "{}  {}",
            position.timestamp.format("%H:%M:%S"),
            position.coordinate()
        );
    });
    handle.finished().await;

    for notification in sink.delivered() {
        println!("[{}] {}: {}", notification.kind, notification.title, notification.body);
    }
    for visit in engine.visits() {
        println!("visit {} {} at {}", visit.zone_id, visit.event, visit.timestamp);
    }

    let state = engine.get_navigation_state();
    if state.is_navigating {
        println!(
            "Navigation: step {}, {:.0} m / {:.0} s remaining{}",
            state.current_step + 1,
            state.remaining_distance,
            state.remaining_time,
            if state.arrived { ", arrived" } else { "" }
        );
    }

    Ok(())
}
