// Single sweep example
//
// This example drives the generator across a frequency axis and records the
// auto-ranged peak-to-peak voltage at each point. Press enter to stop early.

use clap::Parser;
use std::path::PathBuf;
use sweep_rs::{
    write_sweep_csv, FrequencyAxis, InstrumentConnector, InstrumentHandles, RigolScope,
    ScpiGenerator, Spacing, SweepController, SweepOutcome, SweepParameters,
};

#[derive(Parser)]
#[command(name = "sweep")]
#[command(version = "1.0")]
#[command(about = "Measure peak-to-peak voltage across a frequency sweep")]
struct Args {
    /// Serial port of the oscilloscope
    #[arg(long, help = "Oscilloscope port, auto-detected if omitted")]
    scope_port: Option<String>,

    /// Serial port of the function generator
    #[arg(long, help = "Generator port, auto-detected if omitted")]
    generator_port: Option<String>,

    #[arg(long, default_value_t = 1e3, help = "First frequency in Hz")]
    fstart: f64,

    #[arg(long, default_value_t = 6e7, help = "Last frequency in Hz")]
    fend: f64,

    #[arg(long, default_value = "log", help = "Frequency spacing (log or linear)")]
    spacing: Spacing,

    /// Ratio for log spacing, step in Hz for linear spacing
    #[arg(long, help = "Increment between points")]
    inc: Option<f64>,

    #[arg(short, long, help = "Number of points, endpoints included")]
    points: Option<usize>,

    #[arg(long, default_value_t = 2.5, help = "Drive amplitude in V")]
    amplitude: f64,

    #[arg(short, long, default_value_t = 64, help = "Hardware averages (1 or a power of two up to 256)")]
    averages: u32,

    #[arg(short, long, default_value_t = 1.0, help = "Settle time scale in seconds")]
    dwell: f64,

    #[arg(short, long, help = "Save frequencies and readings to this CSV file")]
    output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Show debug information and detailed logs")]
    verbose: bool,
}

impl Args {
    fn parameters(&self) -> SweepParameters {
        let mut params = match self.spacing {
            Spacing::Log => SweepParameters::log(self.fstart, self.fend),
            Spacing::Linear => SweepParameters::linear(self.fstart, self.fend),
        };
        if let Some(inc) = self.inc {
            params.inc = Some(inc);
        }
        if let Some(points) = self.points {
            params = params.with_points(points);
        }
        params
            .with_amplitude(self.amplitude)
            .with_averages(self.averages)
            .with_dwell(self.dwell)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    let params = args.parameters();
    let axis = FrequencyAxis::from_parameters(&params)?;
    println!(
        "Sweeping {} points from {} Hz to {} Hz ({})",
        axis.len(),
        args.fstart,
        args.fend,
        params.spacing()
    );

    let scope = RigolScope::new(
        InstrumentConnector::serial_adapter("oscilloscope").connect(args.scope_port.as_deref())?,
    );
    let generator = ScpiGenerator::new(
        InstrumentConnector::serial_adapter("function generator")
            .connect(args.generator_port.as_deref())?,
    );
    let mut controller = SweepController::new(InstrumentHandles::new(generator, scope));

    let stop = controller.stop_handle();
    std::thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_ok() {
            stop.stop();
        }
    });
    println!("Press enter to stop the sweep\n");

    let result = match controller.sweep(&params)? {
        SweepOutcome::Completed(result) => result,
        SweepOutcome::Cancelled => {
            println!("Sweep stopped");
            return Ok(());
        }
    };

    println!("{:>16} {:>16}", "Frequency [Hz]", "Vpp [V]");
    for (frequency, vpp) in axis.iter().zip(result.iter()) {
        println!("{:>16.1} {:>16.6}", frequency, vpp);
    }

    if let Some(path) = &args.output {
        write_sweep_csv(path, &axis, &result)?;
        println!("\nSaved to {}", path.display());
    }

    Ok(())
}
