//! Per-terminal statistics
//!
//! Four monotonic counters per terminal, plus a serializable snapshot of
//! every terminal for tooling and tests. A terminal that has not been
//! initialized appears as `None` (`null` in JSON).

use serde::{Deserialize, Serialize};

/// Counters for one initialized terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStats {
    /// Characters received from the keyboard register
    pub tty_in: u64,
    /// Characters written to the display register
    pub tty_out: u64,
    /// Bytes of application writes accepted by the device
    pub user_in: u64,
    /// Bytes handed to application readers
    pub user_out: u64,
}

/// Statistics for every terminal slot of a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub terminals: Vec<Option<TerminalStats>>,
}

impl StatisticsSnapshot {
    /// Counters of one terminal, `None` if out of range or uninitialized
    pub fn get(&self, term: usize) -> Option<&TerminalStats> {
        self.terminals.get(term)?.as_ref()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// One line per terminal, `-` for uninitialized slots
    pub fn to_text(&self) -> String {
        let mut out = String::from("term   tty_in  tty_out  user_in user_out\n");
        for (i, slot) in self.terminals.iter().enumerate() {
            match slot {
                Some(s) => out.push_str(&format!(
                    "{:>4} {:>8} {:>8} {:>8} {:>8}\n",
                    i, s.tty_in, s.tty_out, s.user_in, s.user_out
                )),
                None => out.push_str(&format!(
                    "{:>4} {:>8} {:>8} {:>8} {:>8}\n",
                    i, "-", "-", "-", "-"
                )),
            }
        }
        out
    }
}
