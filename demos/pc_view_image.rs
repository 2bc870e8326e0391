use std::{cell::RefCell, env, time::Duration};

use serialport::{available_ports, open, SerialPort};
use zfm20::{ImageRaster, RawImageBuffer, Session, SessionConfig, Zfm20, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{write_pgm, ConsoleSink, SerialReader, SerialWriter, StdDelay};

const DEFAULT_BAUD_RATE: u32 = 57600;

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => capture_to(args[1].as_str(), "fingerprint.pgm"),
        3 => capture_to(args[1].as_str(), args[2].as_str()),
        _ => panic!("Usage: pc_view_image [port_name] [output.pgm]"),
    };
}

fn print_ports() {
    let ports = available_ports().unwrap();
    for port in ports {
        println!("Available port: {} ({:#?})", port.port_name, port.port_type);
    }
}

fn capture_to(port_name: &str, path: &str) {
    println!("Using port {}", port_name);
    let mut port = open(port_name).unwrap();
    port.set_baud_rate(DEFAULT_BAUD_RATE).unwrap();
    port.set_timeout(Duration::from_secs(1)).unwrap();

    let port_cell = RefCell::new(port);
    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let driver = Zfm20::new(writer, reader, DEFAULT_ADDRESS);

    let mut session = Session::open(driver, StdDelay, SessionConfig::default())
        .unwrap_or_else(|e| panic!("Could not open a session: {}", e));

    println!("Place your finger on the sensor");
    let mut sink = ConsoleSink;
    let mut raw = RawImageBuffer::new();
    if let Err(e) = session.capture_raw_image(&mut raw, &mut sink) {
        panic!("Capture failed: {}", e);
    }
    println!("Transferred {} bytes", raw.len());

    match ImageRaster::decode(raw.as_bytes()) {
        Ok(image) => match write_pgm(path, &image) {
            Ok(()) => println!("Wrote {}", path),
            Err(e) => panic!("Could not write {}: {}", path, e),
        },
        Err(e) => panic!("Image could not be decoded: {}", e),
    }
}
