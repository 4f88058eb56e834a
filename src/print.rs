//! ## Printing Module
//!
//! This module is only here to make logging in the terminal easier to read.
//! It prints in appropriate colors depending on the situation, and provides a table
//! format for the [ElevatorMap].
//!
//! Every printer is gated by a switch in [config], so noisy parts can be turned off at runtime.
use std::sync::Mutex;

use ansi_term::Colour::{self, Green, Purple, Red, Yellow};
use prettytable::{format, Cell, Row, Table};
use unicode_width::UnicodeWidthStr;

use crate::config;
use crate::network::peers::PeerDelta;
use crate::world_view::{Dirn, ElevatorBehaviour, ElevatorMap};


fn enabled(flag: &Mutex<bool>) -> bool {
    // A poisoned flag still holds a usable bool
    match flag.lock() {
        Ok(on) => *on,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Turns one print switch on or off.
///
/// ## Example
/// ```
/// use elevatorpeers::{config, print};
///
/// print::set_enabled(&config::PRINT_DEBUG_ON, true);
/// print::debug("Now you see me".to_string());
/// ```
pub fn set_enabled(flag: &Mutex<bool>, on: bool) {
    match flag.lock() {
        Ok(mut guard) => *guard = on,
        Err(poisoned) => *poisoned.into_inner() = on,
    }
}

/// Prints an error message in red to the terminal.
///
/// ## Terminal output
/// - "\[ERROR\]:   {}", msg
///
/// ## Example
/// ```
/// use elevatorpeers::print;
///
/// print::err("Something went wrong!".to_string());
/// ```
pub fn err(msg: String) {
    if enabled(&config::PRINT_ERR_ON) {
        println!("{}{}\n", Red.paint("[ERROR]:   "), Red.paint(msg));
    }
}

/// Prints a warning message in yellow to the terminal.
///
/// ## Terminal output
/// - "\[WARNING\]: {}", msg
pub fn warn(msg: String) {
    if enabled(&config::PRINT_WARN_ON) {
        println!("{}{}\n", Yellow.paint("[WARNING]: "), Yellow.paint(msg));
    }
}

/// Prints a success message in green to the terminal.
///
/// ## Terminal output
/// - "\[OK\]:      {}", msg
pub fn ok(msg: String) {
    if enabled(&config::PRINT_OK_ON) {
        println!("{}{}\n", Green.paint("[OK]:      "), Green.paint(msg));
    }
}

/// Prints an informational message in light blue to the terminal.
///
/// ## Terminal output
/// - "\[INFO\]:    {}", msg
pub fn info(msg: String) {
    if enabled(&config::PRINT_INFO_ON) {
        let light_blue = Colour::RGB(102, 178, 255);
        println!("{}{}\n", light_blue.paint("[INFO]:    "), light_blue.paint(msg));
    }
}

/// Prints a debug message in grey. Off by default, see [config::PRINT_DEBUG_ON].
///
/// ## Terminal output
/// - "\[DEBUG\]:   {}", msg
pub fn debug(msg: String) {
    if enabled(&config::PRINT_DEBUG_ON) {
        let grey = Colour::RGB(150, 150, 150);
        println!("{}{}\n", grey.paint("[DEBUG]:   "), grey.paint(msg));
    }
}

/// Prints what a heartbeat receiver saw change on `port`.
///
/// Uses the debug switch, a busy installation produces a lot of these.
pub fn peer_delta(port: u16, delta: &PeerDelta) {
    if !enabled(&config::PRINT_DEBUG_ON) {
        return;
    }
    let new = delta.new.as_deref().unwrap_or("-");
    println!(
        "{}port {:<5} | peers: {} | new: {} | lost: {:?}\n",
        Purple.paint("[PEERS]:   "),
        port,
        pad_text(&delta.peers.join(", "), 30),
        pad_text(new, 14),
        delta.lost
    );
}

/// Pads the input text to a fixed display width using spaces.
///
/// Uses the display width, so wide characters line up in a monospaced terminal.
pub fn pad_text(text: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(text);
    let padding = width.saturating_sub(visible_width);
    format!("{}{}", text, " ".repeat(padding))
}

/// Builds the table printed by [elevator_map].
pub fn elevator_map_table(map: &ElevatorMap) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.set_titles(Row::new(vec![
        Cell::new("Slot").style_spec("b"),
        Cell::new("Status").style_spec("b"),
        Cell::new("Direction").style_spec("b"),
        Cell::new("Last floor").style_spec("b"),
    ]));

    for slot in map.iter() {
        let status = match slot.behaviour {
            ElevatorBehaviour::Idle => Cell::new("Idle").style_spec("Fg"),
            ElevatorBehaviour::Moving => Cell::new("Moving").style_spec("Fy"),
            ElevatorBehaviour::DoorOpen => Cell::new("Door Open").style_spec("Fm"),
            ElevatorBehaviour::Dead => Cell::new("Dead").style_spec("Fr"),
        };
        let dirn = match slot.dirn {
            Dirn::Up => "Up",
            Dirn::Down => "Down",
            Dirn::Stop => "Stop",
        };
        let floor = slot
            .last_floor
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(Row::new(vec![
            Cell::new(&slot.id.to_string()),
            status,
            Cell::new(dirn),
            Cell::new(&floor),
        ]));
    }
    table
}

/// Logs the elevator map to the terminal as a table, with the reason it changed.
///
/// # Behavior
/// - If printing is disabled (`config::PRINT_MAP_ON` is false), the function exits early.
pub fn elevator_map(map: &ElevatorMap, reason: &str) {
    if !enabled(&config::PRINT_MAP_ON) {
        return;
    }
    println!("{}", Purple.bold().paint(format!("┌{}┐", "─".repeat(32))));
    println!("{}", Purple.bold().paint(format!("│ {} │", pad_text(&format!("ELEVATOR MAP: {}", reason), 30))));
    println!("{}", Purple.bold().paint(format!("└{}┘", "─".repeat(32))));
    elevator_map_table(map).printstd();
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_text_uses_display_width() {
        assert_eq!(pad_text("abc", 5), "abc  ");
        assert_eq!(pad_text("abcdef", 3), "abcdef");
        // Wide characters take two columns
        assert_eq!(UnicodeWidthStr::width(pad_text("中", 4).as_str()), 4);
    }

    #[test]
    fn table_has_one_row_per_slot() {
        let mut map = ElevatorMap::new(3);
        map.set_behaviour(0, ElevatorBehaviour::Idle).unwrap();
        let table = elevator_map_table(&map);
        assert_eq!(table.len(), 3);

        let rendered = table.to_string();
        assert!(rendered.contains("Idle"));
        assert!(rendered.contains("Dead"));
    }
}
