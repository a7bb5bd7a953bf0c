//! Terminal rendering for the `status` and `stop` commands.

use courier_core::{LogEntry, Severity, TaskDetails};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Log lines shown under a single task's status.
pub const STATUS_LOG_LINES: usize = 10;

pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn paint(color: &str, text: &str, enabled: bool) -> String {
    if enabled {
        format!("{color}{text}{RESET}")
    } else {
        text.to_string()
    }
}

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

pub enum Align {
    Left,
    Right,
}

pub struct Column {
    pub header: String,
    pub align: Align,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Left }
    }
    pub fn right(header: impl Into<String>) -> Self {
        Self { header: header.into(), align: Align::Right }
    }
}

/// Render a table with given columns and rows. Widths ignore ANSI codes.
pub fn render_table(columns: &[Column], rows: &[Vec<String>], color: bool) -> String {
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| strip_ansi(&c.header).chars().count())
        .collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns.len()) {
            widths[i] = widths[i].max(strip_ansi(cell).chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    let header = format!("  {}", header.join("  "));
    out.push_str(&paint(BOLD, header.trim_end(), color));
    out.push('\n');

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                pad_cell(cell, widths[i], &col.align)
            })
            .collect();
        out.push_str(format!("  {}", cells.join("  ")).trim_end());
        out.push('\n');
    }
    out
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let pad = width.saturating_sub(strip_ansi(s).chars().count());
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}

fn state_label(task: &TaskDetails, color: bool) -> String {
    if task.running {
        paint(GREEN, &task.phase.to_string(), color)
    } else {
        paint(DIM, &task.phase.to_string(), color)
    }
}

fn idle_label(idle_ms: i64) -> String {
    let secs = idle_ms.max(0) / 1000;
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// One row per task.
pub fn render_task_table(tasks: &[TaskDetails], color: bool) -> String {
    let columns = [
        Column::left("TASK"),
        Column::left("STATE"),
        Column::right("SENT"),
        Column::right("FAILED"),
        Column::right("LOOPS"),
        Column::right("RESTARTS"),
        Column::right("IDLE"),
    ];
    let rows: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            vec![
                task.task_id.to_string(),
                state_label(task, color),
                task.sent.to_string(),
                task.failed.to_string(),
                task.loops.to_string(),
                format!("{}", task.restart_count),
                idle_label(task.idle_ms),
            ]
        })
        .collect();
    render_table(&columns, &rows, color)
}

pub fn render_log_line(entry: &LogEntry, color: bool) -> String {
    let time = entry.time.format("%H:%M:%S");
    let tag = match entry.severity {
        Severity::Info => paint(CYAN, "info", color),
        Severity::Success => paint(GREEN, "ok", color),
        Severity::Warning => paint(YELLOW, "warn", color),
        Severity::Error => paint(RED, "error", color),
    };
    format!("{time} [{tag}] {}", entry.message)
}

/// Counters followed by the most recent log lines, oldest of them first.
pub fn render_task(task: &TaskDetails, color: bool) -> String {
    let mut out = render_task_table(std::slice::from_ref(task), color);
    if task.logs.is_empty() {
        return out;
    }
    out.push('\n');
    for entry in task.logs.iter().take(STATUS_LOG_LINES).rev() {
        out.push_str("  ");
        out.push_str(&render_log_line(entry, color));
        out.push('\n');
    }
    out
}
