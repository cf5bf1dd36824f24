use std::{
    process,
    time::{Duration, Instant},
};

use failure::{Error, ResultExt, format_err};
use minifb::{Key, Window, WindowOptions};
use structopt::StructOpt;

use sm166::{
    SCREEN_WIDTH, SCREEN_HEIGHT, Emulator, Disruption,
    log::*,
    program::Program,
};
use crate::{
    args::Args,
    env::{DesktopPeripherals, sample_keys},
};


mod args;
mod env;
mod logger;


/// The screen refreshes every 70,224 dots at ~4.19 MHz.
const FRAME_TIME: Duration = Duration::from_nanos(16_742_000);

/// Headless runs give up after this many frames if the program never
/// executes STOP.
const HEADLESS_FRAME_CAP: u64 = 10_000;


fn main() {
    if let Err(e) = run() {
        eprintln!("ERROR: {}", e);

        for cause in e.iter_causes() {
            eprintln!("  ... caused by: {}", cause);
        }

        process::exit(1);
    }
}

/// The actual main function.
fn run() -> Result<(), Error> {
    let args = Args::from_args();
    logger::init(args.debug);

    // Load and validate the program ROM (and its SRAM sidecar).
    let program = Program::load_file(&args.program_file)
        .context("failed to load the program file")?;
    info!("[desktop] Loaded: {:#?}", program);

    let mut emulator = Emulator::new(program);
    let mut peripherals = DesktopPeripherals::new(SCREEN_WIDTH * SCREEN_HEIGHT);

    let result = if args.headless {
        run_headless(&mut emulator, &mut peripherals)
    } else {
        run_windowed(&args, &mut emulator, &mut peripherals)
    };

    // Whatever happened, give the save RAM a chance to hit the disk.
    emulator.save_sram().context("failed to write the SRAM sidecar")?;

    result
}

/// Drives the emulator without any host window, until the program stops on
/// its own or the frame cap is reached.
fn run_headless(
    emulator: &mut Emulator,
    peripherals: &mut DesktopPeripherals,
) -> Result<(), Error> {
    for _ in 0..HEADLESS_FRAME_CAP {
        match emulator.execute_frame(peripherals, |_| false) {
            Ok(_) => {}
            Err(Disruption::Stopped) => {
                info!("[desktop] Program stopped");
                return Ok(());
            }
            Err(Disruption::Paused) => {}
            Err(e @ Disruption::Terminated { .. }) => {
                return Err(format_err!("emulation terminated: {}", e));
            }
        }
    }

    info!("[desktop] Headless frame cap reached");
    Ok(())
}

/// Opens the window and drives the emulator at the handheld's frame rate.
fn run_windowed(
    args: &Args,
    emulator: &mut Emulator,
    peripherals: &mut DesktopPeripherals,
) -> Result<(), Error> {
    let title = emulator.machine().program.title().to_string();
    let mut window = open_window(args, &title)?;
    info!("[desktop] Opened window");

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let frame_start = Instant::now();

        // Sample input once per frame, then run the emulator until it has
        // produced the next frame.
        peripherals.keys = sample_keys(&window);
        match emulator.execute_frame(peripherals, |_| false) {
            Ok(_) => {}
            Err(Disruption::Paused) => {}
            Err(Disruption::Stopped) => {
                info!("[desktop] Program stopped");
                break;
            }
            Err(e @ Disruption::Terminated { .. }) => {
                window.update();
                return Err(format_err!("emulation terminated: {}", e));
            }
        }

        window
            .update_with_buffer(&peripherals.buffer, SCREEN_WIDTH, SCREEN_HEIGHT)
            .map_err(|e| format_err!("could not present the frame: {}", e))?;

        // Pace the loop to the handheld's refresh rate.
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_TIME {
            spin_sleep::sleep(FRAME_TIME - elapsed);
        }
    }

    Ok(())
}

/// Opens a `minifb` window configured by `args`.
fn open_window(args: &Args, title: &str) -> Result<Window, Error> {
    let options = WindowOptions {
        scale: args.scale,
        ..WindowOptions::default()
    };

    Window::new(title, SCREEN_WIDTH, SCREEN_HEIGHT, options)
        .map_err(|e| format_err!("failed to open window: {}", e))
}
