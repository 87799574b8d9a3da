//! Status display backed by the log.
//!
//! Keeps the text of every row so the host runner and tests can read the
//! screen back.  While disabled, rows are still updated but nothing is
//! echoed.

use std::collections::HashMap;
use std::string::String;

use log::info;

use crate::app::ports::{DisplayPort, DisplayRow};

#[derive(Debug)]
pub struct LogDisplay {
    rows: HashMap<DisplayRow, String>,
    enabled: bool,
    refreshes: u32,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            enabled: true,
            refreshes: 0,
        }
    }

    /// Current text of `row`, empty if never printed.
    pub fn row(&self, row: DisplayRow) -> &str {
        self.rows.get(&row).map_or("", String::as_str)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayPort for LogDisplay {
    fn print(&mut self, row: DisplayRow, text: &str) {
        if self.enabled && !text.is_empty() && self.row(row) != text {
            info!("[display {:?}] {}", row, text);
        }
        self.rows.insert(row, String::from(text));
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled != self.enabled {
            info!("[display] {}", if enabled { "on" } else { "off" });
        }
        self.enabled = enabled;
    }

    fn refresh(&mut self) {
        self.refreshes = self.refreshes.wrapping_add(1);
    }
}
