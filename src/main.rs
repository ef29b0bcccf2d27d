use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::{error, info, Level};

use motec_ld::utils::conf_helper::load_metadata;
use motec_ld::{convert, ConversionRequest, LogMetadata, LogType};

const DESCRIPTION: &str = "\
Generates MoTeC .ld files from external log files generated by: CAN bus dumps, CSV
files, or COBB Accessport CSV files";

const EPILOG: &str = "\
CSV files must have time as their first column, a header line with channel names
and a second line with channel units. A MoTeC channel is generated for every
remaining column.

CAN (with --dbc) and ACCESSPORT log types are accepted but not supported yet.";

fn print_usage() {
    println!("{}\n", DESCRIPTION);
    println!("Usage: motec-log-generator <log> <log_type> [options]");
    println!("Log types: CAN, CSV, ACCESSPORT\n");
    println!("Options:");
    println!("  --output <file>           Output filename");
    println!("  --frequency <hz>          Resample channels to a fixed frequency");
    println!("  --dbc <file>              DBC file (required for CAN logs)");
    println!("  --config <file>           JSON file with log metadata");
    println!("  --driver <str>            Driver name");
    println!("  --vehicle_id <str>        Vehicle ID");
    println!("  --vehicle_weight <n>      Vehicle weight");
    println!("  --vehicle_type <str>      Vehicle type");
    println!("  --vehicle_comment <str>   Vehicle comment");
    println!("  --venue_name <str>        Venue name");
    println!("  --event_name <str>        Event name");
    println!("  --event_session <str>     Event session");
    println!("  --long_comment <str>      Long comment");
    println!("  --short_comment <str>     Short comment");
    println!("  -v, --verbose             Debug logging\n");
    println!("{}", EPILOG);
}

#[derive(Default)]
struct Args {
    positional: Vec<String>,
    options: Vec<(String, String)>,
    verbose: bool,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = raw.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            flag if flag.starts_with("--") => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("missing value for {}", flag))?;
                args.options.push((flag.trim_start_matches("--").to_string(), value.clone()));
            }
            _ => args.positional.push(arg.clone()),
        }
    }

    Ok(args)
}

fn build_request(args: &Args) -> Result<ConversionRequest> {
    if args.positional.len() < 2 {
        bail!("expected <log> and <log_type>");
    }

    let log_type: LogType = args.positional[1].parse()?;
    let mut request = ConversionRequest {
        log_path: PathBuf::from(&args.positional[0]),
        log_type,
        output: None,
        frequency: None,
        dbc_path: None,
        metadata: LogMetadata::default(),
    };

    // Config file first so individual flags override it.
    if let Some((_, path)) = args.options.iter().find(|(k, _)| k == "config") {
        request.metadata = load_metadata(path)?;
    }

    for (key, value) in &args.options {
        let meta = &mut request.metadata;
        match key.as_str() {
            "config" => {}
            "output" => request.output = Some(PathBuf::from(value)),
            "dbc" => request.dbc_path = Some(PathBuf::from(value)),
            "frequency" => {
                let hz: f64 = value
                    .parse()
                    .with_context(|| format!("invalid frequency: {}", value))?;
                if !(hz > 0.0 && hz.is_finite()) {
                    bail!("frequency must be a positive finite number, got {}", value);
                }
                request.frequency = Some(hz);
            }
            "driver" => meta.driver = value.clone(),
            "vehicle_id" => meta.vehicle_id = value.clone(),
            "vehicle_weight" => {
                meta.vehicle_weight = value
                    .parse()
                    .with_context(|| format!("invalid vehicle weight: {}", value))?
            }
            "vehicle_type" => meta.vehicle_type = value.clone(),
            "vehicle_comment" => meta.vehicle_comment = value.clone(),
            "venue_name" => meta.venue_name = value.clone(),
            "event_name" => meta.event_name = value.clone(),
            "event_session" => meta.event_session = value.clone(),
            "long_comment" => meta.long_comment = value.clone(),
            "short_comment" => meta.short_comment = value.clone(),
            other => bail!("unknown option --{}", other),
        }
    }

    if request.log_type == LogType::Can && request.dbc_path.is_none() {
        bail!("DBC file required for CAN log type");
    }

    Ok(request)
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();

    let args = match parse_args(&raw) {
        Ok(args) if args.positional.len() >= 2 => args,
        Ok(_) => {
            print_usage();
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let result = build_request(&args).and_then(|request| {
        convert(&request).with_context(|| format!("failed to convert {}", request.log_path.display()))
    });

    match result {
        Ok(summary) => info!("Done! Wrote {} channels to {}", summary.channel_count, summary.output.display()),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
