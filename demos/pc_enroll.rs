use std::{cell::RefCell, env, time::Duration};

use serialport::{available_ports, open, SerialPort};
use zfm20::{Session, SessionConfig, TemplateSlot, Zfm20, DEFAULT_ADDRESS};

mod pc_utils;
use pc_utils::{ConsoleSink, SerialReader, SerialWriter, StdDelay};

const DEFAULT_BAUD_RATE: u32 = 57600;

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => print_next_free_slot(args[1].as_str()),
        3 => enroll_to_slot(args[1].as_str(), args[2].parse::<u16>().unwrap()),
        _ => panic!("Usage: pc_enroll [port_name] [slot]"),
    };
}

fn print_ports() {
    let ports = available_ports().unwrap();
    for port in ports {
        println!("Available port: {} ({:#?})", port.port_name, port.port_type);
    }
}

fn print_next_free_slot(port_name: &str) {
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
    let directory = session
        .refresh_directory()
        .unwrap_or_else(|e| panic!("Could not read the template directory: {}", e));
    println!("Templates stored: {}", directory.len());
    match directory.next_slot() {
        Some(slot) => println!("Next free slot: {}", slot),
        None => println!("The template library is full"),
    }
}

fn enroll_to_slot(port_name: &str, raw_slot: u16) {
    let slot = TemplateSlot::new(raw_slot).unwrap_or_else(|e| panic!("{}", e));

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

    let mut sink = ConsoleSink;
    match session.enroll(slot, &mut sink) {
        Ok(()) => println!("Enrolled slot {}", slot),
        Err(e) => println!("Enrollment failed: {}", e),
    }
}
