// Shared glue for the PC demos; not every demo uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Write as IoWrite};
use std::thread;
use std::time::Duration;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};
use serialport::prelude::*;

use zfm20::{EventSink, ImageRaster, TemplateSlot, WorkflowEvent, IMAGE_HEIGHT, IMAGE_WIDTH};

// We're cheating here and will use the host OS's serial port as our UART,
// and for that we have to implement the read/write interfaces from
// embedded-hal.

pub struct SerialReader<'a>(pub &'a RefCell<Box<dyn SerialPort>>);
pub struct SerialWriter<'a>(pub &'a RefCell<Box<dyn SerialPort>>);

impl Read<u8> for SerialReader<'_> {
    type Error = std::io::Error;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        let mut buf: [u8; 1] = [0u8];
        loop {
            match self.0.borrow_mut().read(&mut buf) {
                Ok(n) => {
                    if n == 1 {
                        return Ok(buf[0]);
                    }
                }
                Err(e) => return Err(nb::Error::from(e)),
            };
        }
    }
}

impl Write<u8> for SerialWriter<'_> {
    type Error = std::io::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        let buf: [u8; 1] = [word];
        loop {
            match self.0.borrow_mut().write(&buf) {
                Ok(n) => {
                    if n == 1 {
                        return Ok(());
                    }
                }
                Err(e) => return Err(nb::Error::from(e)),
            }
        }
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        match self.0.borrow_mut().flush() {
            Ok(_) => Ok(()),
            Err(e) => Err(nb::Error::from(e)),
        }
    }
}

/// Millisecond delays via the OS scheduler.
pub struct StdDelay;

impl DelayMs<u16> for StdDelay {
    fn delay_ms(&mut self, ms: u16) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Narrates workflow progress on stdout.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::PlaceFinger { pass } => {
                println!("Place your finger on the sensor (capture {} of 2)", pass)
            }
            WorkflowEvent::NoFingerYet { attempt } => {
                // one dot every half second at the default 50ms poll
                if attempt % 10 == 0 {
                    print!(".");
                    io::stdout().flush().unwrap();
                }
            }
            WorkflowEvent::ImageCaptured => println!("Image taken"),
            WorkflowEvent::RemoveFinger => println!("Remove your finger"),
            WorkflowEvent::IdentifyAttempt { attempt } => {
                if *attempt > 1 {
                    println!("Trying again ({})", attempt);
                }
            }
            WorkflowEvent::EnrollAttempt { slot, attempt } => {
                if *attempt > 1 {
                    println!("Retrying slot {} (attempt {})", slot, attempt);
                }
            }
            WorkflowEvent::AttemptFailed { status } => println!("Attempt failed: {}", status),
            WorkflowEvent::SlotEnrolled { slot } => println!("Stored in slot {}", slot),
        }
    }
}

pub fn prompt_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().unwrap();
    let mut line = String::new();
    io::stdin().read_line(&mut line).unwrap();
    line.trim().to_string()
}

/// Asks until the operator types a slot id the library can hold.
pub fn prompt_slot(prompt: &str) -> TemplateSlot {
    loop {
        let line = prompt_line(prompt);
        match line.parse::<u16>() {
            Ok(id) => match TemplateSlot::new(id) {
                Ok(slot) => return slot,
                Err(e) => println!("{}", e),
            },
            Err(_) => println!("Enter a number between 1 and 127"),
        }
    }
}

/// Writes a decoded raster as a binary PGM file.
pub fn write_pgm(path: &str, image: &ImageRaster) -> io::Result<()> {
    let mut file = File::create(path)?;
    write!(file, "P5\n{} {}\n255\n", IMAGE_WIDTH, IMAGE_HEIGHT)?;
    file.write_all(image.as_bytes())?;
    Ok(())
}
