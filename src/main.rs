#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

fn main() {
    dropship_console_lib::run();
}
