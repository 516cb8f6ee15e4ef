use anyhow::{Context, Result};
use clap::{Arg, Command};
use osm2geojson::converter::{ConvertOptions, json_to_geojson, xml_to_geojson};
use osm2geojson::polygon;
use std::io;
use std::path::Path;
use structured_logger::{Builder, json::new_writer};

fn main() -> Result<()> {
    let matches = Command::new("osm2geojson")
        .version("0.1.0")
        .about("Convert OSM XML or Overpass JSON to GeoJSON")
        .arg(
            Arg::new("input")
                .help("OSM XML or Overpass JSON file to convert")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .help("Output file ('-' for stdout)")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("reader")
                .long("reader")
                .value_name("FORMAT")
                .help("Input format; auto detects by file extension")
                .value_parser(["json", "xml", "auto"])
                .default_value("auto"),
        )
        .arg(
            Arg::new("pretty")
                .short('p')
                .long("pretty")
                .action(clap::ArgAction::SetTrue)
                .help("Pretty-print the GeoJSON output"),
        )
        .arg(
            Arg::new("force")
                .short('f')
                .long("force")
                .action(clap::ArgAction::SetTrue)
                .help("Allow overwriting an existing output file"),
        )
        .arg(
            Arg::new("keep-used")
                .long("keep-used")
                .action(clap::ArgAction::SetTrue)
                .help("Keep features whose elements were consumed as members of other elements"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(clap::ArgAction::SetTrue)
                .help("Abort on the first element that fails to convert"),
        )
        .arg(
            Arg::new("areas")
                .long("areas")
                .value_name("FILE")
                .help("JSON file overriding the built-in area exception table"),
        )
        .arg(
            Arg::new("polygons")
                .long("polygons")
                .value_name("FILE")
                .help("JSON file overriding the built-in polygon rule table"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(clap::ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("Suppress warning output"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::SetTrue)
                .help("Enable verbose logging output"),
        )
        .get_matches();

    let level = if matches.get_flag("quiet") {
        "error"
    } else if matches.get_flag("verbose") {
        "debug"
    } else {
        "warn"
    };
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stderr()))
        .init();

    let input_path = matches.get_one::<String>("input").unwrap();
    let output_path = matches.get_one::<String>("output").unwrap();

    if !Path::new(input_path).exists() {
        anyhow::bail!("Input file does not exist: {}", input_path);
    }
    if output_path != "-" && Path::new(output_path).exists() && !matches.get_flag("force") {
        anyhow::bail!(
            "Output file '{}' already exists; use --force to overwrite",
            output_path
        );
    }

    let use_xml = match matches.get_one::<String>("reader").unwrap().as_str() {
        "xml" => true,
        "json" => false,
        _ => {
            if input_path.ends_with(".osm") || input_path.ends_with(".xml") {
                true
            } else if input_path.ends_with(".json") {
                false
            } else {
                anyhow::bail!("Could not detect the input format; use --reader");
            }
        }
    };

    let mut options = ConvertOptions {
        keep_used: matches.get_flag("keep-used"),
        strict: matches.get_flag("strict"),
        ..ConvertOptions::default()
    };
    if let Some(path) = matches.get_one::<String>("areas") {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read area keys from {}", path))?;
        options.area_keys = Some(
            polygon::parse_area_keys(&raw)
                .with_context(|| format!("Invalid area keys in {}", path))?,
        );
    }
    if let Some(path) = matches.get_one::<String>("polygons") {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read polygon rules from {}", path))?;
        options.polygon_features = Some(
            polygon::parse_polygon_features(&raw)
                .with_context(|| format!("Invalid polygon rules in {}", path))?,
        );
    }

    let data = std::fs::read_to_string(input_path)
        .with_context(|| format!("Failed to read {}", input_path))?;

    let collection = if use_xml {
        xml_to_geojson(&data, &options)?
    } else {
        json_to_geojson(&data, &options)?
    };

    let serialized = if matches.get_flag("pretty") {
        serde_json::to_string_pretty(&collection)?
    } else {
        serde_json::to_string(&collection)?
    };

    if output_path == "-" {
        println!("{}", serialized);
    } else {
        std::fs::write(output_path, serialized + "\n")
            .with_context(|| format!("Failed to write {}", output_path))?;
    }

    Ok(())
}
