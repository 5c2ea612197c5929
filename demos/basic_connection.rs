// Basic connection example
//
// This example opens a BBTK, performs the handshake and prints what the
// device reports about itself.

use bbtk_rs::{Bbtk, BbtkConfig, Liveness};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (optional)
    env_logger::init();

    let port = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyACM0".to_string());

    println!("BBTK Connection Example");
    println!("=======================\n");

    println!("1. Opening {}...", port);
    let mut bbtk = Bbtk::open(&BbtkConfig::new(&port, 57600))?;

    println!("2. Waking the device with a serial break...");
    bbtk.send_break()?;
    bbtk.reset_buffers()?;

    println!("3. Connecting...");
    bbtk.connect()?;
    println!("   Connected!");

    println!("4. Checking liveness...");
    match bbtk.check_liveness() {
        Ok(()) => println!("   BBTK is alive"),
        Err(e) if bbtk.liveness() == Liveness::Garbled => {
            println!("   BBTK answered, but not with ECHO: {}", e);
        }
        Err(e) => println!("   BBTK not responding to ECHO: {}", e),
    }

    println!("5. Device information:");
    bbtk.display_info()?;
    println!("   Firmware version: {}", bbtk.firmware_version());

    bbtk.disconnect()?;
    println!("\nDisconnected.");
    Ok(())
}
