// Timed capture example
//
// Configures smoothing and thresholds, runs one digital capture and prints
// the raw text the BBTK streamed back, followed by a short summary.

use bbtk_rs::{Bbtk, BbtkConfig, CaptureReport, DrainLimits};
use clap::Parser;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "capture")]
#[command(version = "0.1")]
#[command(about = "Capture events with a Black Box ToolKit v2")]
struct Args {
    /// Serial device of the BBTK
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Baud rate in bps
    #[arg(short, long, default_value_t = 57600)]
    baud: u32,

    /// Duration of the capture in seconds
    #[arg(short, long, default_value_t = 30)]
    duration: u64,

    /// Clear the timing memory before capturing
    #[arg(long)]
    clear: bool,

    /// Run the keypad threshold calibration instead of sending defaults
    #[arg(long)]
    adjust: bool,

    /// Give up if the device sends nothing for this many seconds while draining
    #[arg(long, default_value_t = 30)]
    idle_timeout: u32,

    /// Enable verbose logging
    #[arg(short, long, help = "Show the wire traffic and debug information")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }

    let config = BbtkConfig::new(&args.port, args.baud)
        .with_capture_duration(Duration::from_secs(args.duration))
        .with_verbose(args.verbose)
        .with_drain_limits(DrainLimits {
            max_idle_reads: Some(args.idle_timeout),
            ..DrainLimits::default()
        });

    println!("Trying to connect to {} at {}...", config.port, config.baud_rate);
    let mut bbtk = Bbtk::open(&config)?;

    bbtk.send_break()?;
    if let Err(e) = bbtk.reset_buffers() {
        eprintln!("Could not reset serial buffers: {}", e);
    }
    bbtk.connect()?;
    println!("...Ok");

    if let Err(e) = bbtk.check_liveness() {
        eprintln!("Liveness check failed: {}", e);
    }

    bbtk.display_info()?;
    println!("Firmware version: {}", bbtk.firmware_version());

    println!("Setting smoothing mask to {}", bbtk_rs::SmoothingMask::default());
    bbtk.set_default_smoothing()?;

    if args.adjust {
        println!("Adjust the thresholds on the BBTK keypad...");
        bbtk.adjust_thresholds()?;
    } else {
        println!("Setting thresholds: {:?}", bbtk_rs::ThresholdSet::default());
        bbtk.set_default_thresholds()?;
    }

    if args.clear {
        print!("Clearing timing data... ");
        let clear = bbtk.clear_timing_data()?;
        println!("Ok ({:?})", clear.kind);
    }

    println!("Capturing events for {}s...", args.duration);
    let capture = bbtk.capture(config.capture_duration)?;
    println!("{}", capture.text());

    match CaptureReport::parse(&capture) {
        Ok(report) => {
            println!("Total number of events = {}", report.events.len());
            println!("Capture time = {}", report.capture_time);
            println!("{}", report.to_frame()?);
        }
        Err(e) => eprintln!("Could not parse capture: {}", e),
    }

    bbtk.disconnect()?;
    Ok(())
}
