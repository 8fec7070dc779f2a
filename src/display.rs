//! Terminal rendering: status colouring, tables and JSON output.

use crate::error::Result;
use crate::models::{LogLevel, PaymentStatus, ServerStatus};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::IsTerminal;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Good,
    Warn,
    Bad,
    Muted,
}

fn colors_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal())
}

fn paint(text: &str, tone: Tone) -> String {
    if !colors_enabled() {
        return text.to_string();
    }
    match tone {
        Tone::Good => text.green().to_string(),
        Tone::Warn => text.yellow().to_string(),
        Tone::Bad => text.red().to_string(),
        Tone::Muted => text.dimmed().to_string(),
    }
}

pub fn bold(text: &str) -> String {
    if colors_enabled() {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

pub fn muted(text: &str) -> String {
    paint(text, Tone::Muted)
}

pub fn server_status(status: Option<ServerStatus>) -> String {
    match status {
        Some(ServerStatus::Online) => paint("online", Tone::Good),
        Some(ServerStatus::Degraded) => paint("degraded", Tone::Warn),
        Some(ServerStatus::Offline) => paint("offline", Tone::Bad),
        Some(ServerStatus::Unknown) | None => paint("unknown", Tone::Muted),
    }
}

pub fn payment_status(status: Option<PaymentStatus>) -> String {
    match status {
        Some(PaymentStatus::Paid) => paint("paid", Tone::Good),
        Some(PaymentStatus::Pending) => paint("pending", Tone::Warn),
        Some(PaymentStatus::Overdue) => paint("overdue", Tone::Bad),
        Some(PaymentStatus::Cancelled) => paint("cancelled", Tone::Muted),
        None => paint("-", Tone::Muted),
    }
}

pub fn log_level(level: LogLevel) -> String {
    let tone = match level {
        LogLevel::Debug => Tone::Muted,
        LogLevel::Info => Tone::Good,
        LogLevel::Warn => Tone::Warn,
        LogLevel::Error | LogLevel::Fatal => Tone::Bad,
    };
    paint(level.as_str(), tone)
}

/// PM2 process status (`online`, `stopped`, `errored`, ...)
pub fn process_status(status: Option<&str>) -> String {
    match status {
        Some("online") => paint("online", Tone::Good),
        Some(s @ ("stopping" | "launching")) => paint(s, Tone::Warn),
        Some(s @ ("errored" | "stopped")) => paint(s, Tone::Bad),
        Some(other) => other.to_string(),
        None => paint("-", Tone::Muted),
    }
}

pub fn money(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", amount, currency)
}

pub fn date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", size)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Left-aligned columns sized to their widest cell
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) -> &mut Self {
        self.rows.push(cells);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| visible_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = visible_width(cell);
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }

        let mut out = String::new();
        let header: Vec<String> = self.headers.iter().map(|h| bold(h)).collect();
        push_line(&mut out, &header, &widths);
        for row in &self.rows {
            push_line(&mut out, row, &widths);
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        out.push_str(cell);
        if i < last {
            let pad = widths[i].saturating_sub(visible_width(cell)) + 2;
            out.extend(std::iter::repeat(' ').take(pad));
        }
    }
    out.push('\n');
}

/// Character count without ANSI escape sequences
fn visible_width(text: &str) -> usize {
    let mut width = 0;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ansi_sequences_do_not_count() {
        assert_eq!(visible_width("\x1b[32monline\x1b[39m"), 6);
        assert_eq!(visible_width("plain"), 5);
    }

    #[test]
    fn table_aligns_columns() {
        let mut table = Table::new(&["ID", "NAME"]);
        table
            .row(vec!["s1".into(), "web".into()])
            .row(vec!["server-2".into(), "db".into()]);
        let rendered = table.render();
        let lines: Vec<&str> = rendered.lines().collect();
        // Headers may be bold; compare the data rows
        assert_eq!(lines[1], "s1        web");
        assert_eq!(lines[2], "server-2  db");
    }

    #[test]
    fn formats_sizes_and_money() {
        assert_eq!(bytes(512), "512 B");
        assert_eq!(bytes(2048), "2.0 KB");
        assert_eq!(money(12.5, "USD"), "12.50 USD");
        assert_eq!(date(None), "-");
    }
}
