use std::{cell::RefCell, env, time::Duration};

use serialport::{available_ports, open, SerialPort};
use zfm20::{
    ImageRaster, MatchOutcome, RawImageBuffer, Session, SessionConfig, TemplateDirectory,
    Zfm20, DEFAULT_ADDRESS,
};

mod pc_utils;
use pc_utils::{prompt_line, prompt_slot, write_pgm, ConsoleSink, SerialReader, SerialWriter, StdDelay};

const DEFAULT_BAUD_RATE: u32 = 57600;

type PcSession<'a> = Session<SerialWriter<'a>, SerialReader<'a>, StdDelay>;

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => print_ports(),
        2 => run_menu(args[1].as_str()),
        _ => panic!("Usage: pc_menu [port_name]"),
    };
}

fn print_ports() {
    let ports = available_ports().unwrap();
    for port in ports {
        println!("Available port: {} ({:#?})", port.port_name, port.port_type);
    }
}

fn run_menu(port_name: &str) {
    println!("Using port {}", port_name);
    let mut port = open(port_name).unwrap();
    port.set_baud_rate(DEFAULT_BAUD_RATE).unwrap();
    port.set_timeout(Duration::from_secs(1)).unwrap();

    let port_cell = RefCell::new(port);
    let reader = SerialReader(&port_cell);
    let writer = SerialWriter(&port_cell);
    let driver = Zfm20::new(writer, reader, DEFAULT_ADDRESS);

    let mut session = match Session::open(driver, StdDelay, SessionConfig::default()) {
        Ok(session) => session,
        Err(e) => panic!("Could not open a session: {}", e),
    };
    println!(
        "Connected; the library holds up to {} templates",
        session.parameters().finger_library_size
    );

    let mut sink = ConsoleSink;
    loop {
        // a stale or unreadable directory makes every menu option a lie
        match session.refresh_directory() {
            Ok(directory) => print_directory(directory),
            Err(e) => panic!("Could not read the template directory: {}", e),
        }

        println!("----------------");
        println!("e) enroll print");
        println!("b) batch enroll");
        println!("f) find print");
        println!("d) delete print");
        println!("v) view image");
        println!("p) preview print");
        println!("q) quit");
        println!("----------------");
        match prompt_line("> ").as_str() {
            "e" => enroll(&mut session, &mut sink),
            "b" => batch_enroll(&mut session, &mut sink),
            "f" => find(&mut session, &mut sink),
            "d" => delete(&mut session),
            "v" => view_image(&mut session, &mut sink),
            "p" => preview(&mut session, &mut sink),
            "q" => break,
            other => println!("Unknown option: {:?}", other),
        }
    }
}

fn print_directory(directory: &TemplateDirectory) {
    if directory.is_empty() {
        println!("The template library is empty");
        return;
    }
    print!("Stored templates ({}):", directory.len());
    for slot in directory.iter() {
        print!(" {}", slot);
    }
    println!();
    match directory.next_slot() {
        Some(slot) => println!("Next free slot: {}", slot),
        None => println!("No free slot for a new enrollment"),
    }
}

fn enroll(session: &mut PcSession<'_>, sink: &mut ConsoleSink) {
    let slot = prompt_slot("Enroll into which slot? ");
    match session.enroll(slot, sink) {
        Ok(()) => println!("Enrolled slot {}", slot),
        Err(e) => println!("Enrollment failed: {}", e),
    }
}

fn batch_enroll(session: &mut PcSession<'_>, sink: &mut ConsoleSink) {
    match session.enroll_batch(sink) {
        Ok(batch) => {
            let last = batch.first.get() + batch.count - 1;
            println!("Enrolled slots {} through #{}", batch.first, last);
        }
        Err(e) => println!("Batch enrollment failed: {}", e),
    }
}

fn find(session: &mut PcSession<'_>, sink: &mut ConsoleSink) {
    println!("Waiting for a finger...");
    match session.identify(sink) {
        Ok(MatchOutcome::Found { slot, confidence }) => {
            println!("Found fingerprint in slot {} (confidence {})", slot, confidence)
        }
        Ok(MatchOutcome::NoMatch) => println!("No match found"),
        Err(e) => println!("Identification failed: {}", e),
    }
}

fn delete(session: &mut PcSession<'_>) {
    let slot = prompt_slot("Delete which slot? ");
    match session.delete(slot) {
        Ok(()) => println!("Deleted slot {}", slot),
        Err(e) => println!("Delete failed: {}", e),
    }
}

fn view_image(session: &mut PcSession<'_>, sink: &mut ConsoleSink) {
    let path = match prompt_line("Write image to [fingerprint.pgm]: ").as_str() {
        "" => "fingerprint.pgm".to_string(),
        other => other.to_string(),
    };
    println!("Waiting for a finger...");
    let mut raw = RawImageBuffer::new();
    if let Err(e) = session.capture_raw_image(&mut raw, sink) {
        println!("Capture failed: {}", e);
        return;
    }
    match ImageRaster::decode(raw.as_bytes()) {
        Ok(image) => match write_pgm(&path, &image) {
            Ok(()) => println!("Wrote {}", path),
            Err(e) => println!("Could not write {}: {}", path, e),
        },
        Err(e) => println!("Image could not be decoded: {}", e),
    }
}

fn preview(session: &mut PcSession<'_>, sink: &mut ConsoleSink) {
    println!("Waiting for a finger...");
    let mut raw = RawImageBuffer::new();
    match session.preview(&mut raw, sink) {
        Ok(outcome) => {
            match outcome.image {
                Ok(image) => match write_pgm("preview.pgm", &image) {
                    Ok(()) => println!("Wrote preview.pgm"),
                    Err(e) => println!("Could not write preview.pgm: {}", e),
                },
                Err(e) => println!("Image could not be decoded: {}", e),
            }
            match outcome.search {
                MatchOutcome::Found { slot, confidence } => {
                    println!("That finger is enrolled in slot {} (confidence {})", slot, confidence)
                }
                MatchOutcome::NoMatch => println!("That finger is not enrolled"),
            }
        }
        Err(e) => println!("Preview failed: {}", e),
    }
}
