// Calibrated sweep example
//
// This example measures a baseline with the oscilloscope on the generator, then
// the system under test, and saves the gain table and plot.

use clap::Parser;
use std::path::PathBuf;
use sweep_rs::{
    CalibratedOutcome, CalibrationOptions, ConsoleOperator, InstrumentConnector,
    InstrumentHandles, RigolScope, ScpiGenerator, SweepController, SweepParameters,
    DEFAULT_DATAFILE,
};

#[derive(Parser)]
#[command(name = "calibrated_sweep")]
#[command(version = "1.0")]
#[command(about = "Measure the gain of a system under test against a baseline sweep")]
struct Args {
    #[arg(long, help = "Oscilloscope port, auto-detected if omitted")]
    scope_port: Option<String>,

    #[arg(long, help = "Generator port, auto-detected if omitted")]
    generator_port: Option<String>,

    #[arg(long, default_value_t = 1e3, help = "First frequency in Hz")]
    fstart: f64,

    #[arg(long, default_value_t = 6e7, help = "Last frequency in Hz")]
    fend: f64,

    #[arg(long, default_value_t = 10f64.powf(0.1), help = "Ratio between neighbouring frequencies")]
    ratio: f64,

    #[arg(short, long, default_value_t = 64, help = "Hardware averages (1 or a power of two up to 256)")]
    averages: u32,

    #[arg(long, default_value = DEFAULT_DATAFILE, help = "File offered when the filename prompt is left empty")]
    datafile: PathBuf,

    #[arg(long, help = "Skip rendering the gain plot")]
    no_plot: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    println!("Calibrated Frequency Sweep");
    println!("==========================\n");

    let scope = RigolScope::new(
        InstrumentConnector::serial_adapter("oscilloscope").connect(args.scope_port.as_deref())?,
    );
    let generator = ScpiGenerator::new(
        InstrumentConnector::serial_adapter("function generator")
            .connect(args.generator_port.as_deref())?,
    );
    let mut controller = SweepController::new(InstrumentHandles::new(generator, scope));

    let params = SweepParameters::log(args.fstart, args.fend)
        .with_ratio(args.ratio)
        .with_averages(args.averages);
    let options = CalibrationOptions {
        default_datafile: args.datafile,
        render_plot: !args.no_plot,
    };

    match controller.calibrated_sweep(&params, &mut ConsoleOperator, &options)? {
        CalibratedOutcome::Completed {
            record,
            data_path,
            plot_path,
        } => {
            let hazards = record.division_hazards();
            if !hazards.is_empty() {
                println!("⚠ {} points had no baseline signal", hazards.len());
            }
            println!("✓ Data saved to {}", data_path.display());
            if let Some(plot_path) = plot_path {
                println!("✓ Plot saved to {}", plot_path.display());
            }
        }
        CalibratedOutcome::Cancelled => println!("Sweep cancelled"),
    }

    Ok(())
}
