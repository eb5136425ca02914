//! Drive forward and stop as soon as a "bump" arrives from another thread.
//!
//! Run with:
//!   cargo run --example bump-stop -- /dev/ttyS0
//!
//! Press Enter to simulate the bump switch. The main loop keeps renewing the
//! drive command and reports positions until the collision flag is raised.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use roverlink::rover::{DriveDirection, Event, RoverConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyS0".to_string());

    let config = RoverConfig {
        reply_timeout: Some(Duration::from_secs(2)),
        ..RoverConfig::default()
    };
    let mut rover = roverlink::open(&port, roverlink::transport::DEFAULT_BAUD_RATE, config)?;
    rover.wake()?;
    rover.start_stream(100)?;

    let halt = rover.halt_handle()?;
    thread::spawn(move || {
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_ok() {
            if let Err(err) = halt.force_stop() {
                eprintln!("force stop failed: {err}");
            }
        }
    });

    eprintln!("Driving on {port}; press Enter to bump");
    while !rover.collision_pending() {
        rover.drive(48, 0, DriveDirection::Forward)?;
        for _ in 0..5 {
            if let Some(Event::Position(pose)) = rover.poll()? {
                eprintln!("x={:.1} y={:.1}", pose.x, pose.y);
            }
        }
    }

    rover.take_collision();
    rover.stop_stream()?;
    rover.halt()?;
    eprintln!("Stopped after bump");
    Ok(())
}
