// Port discovery example
//
// This example lists serial ports behind USB adapters that the instruments are
// usually connected through.

use sweep_rs::InstrumentConnector;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("Available Instrument Ports");
    println!("==========================\n");

    let devices = InstrumentConnector::serial_adapter("instrument").get_available_devices()?;
    if devices.is_empty() {
        println!("No USB serial adapters found");
        return Ok(());
    }

    for device in &devices {
        println!("{:<24} {}", device.port, device.name);
    }

    Ok(())
}
