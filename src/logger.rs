// src/logger.rs
// Console logging with colored output and timestamps

use chrono::{DateTime, Local};
use colored::*;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub enum LogLevel {
    Http,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LogLevel::Http => write!(f, "{}", " HTTP ".on_blue().bold().white()),
            LogLevel::Info => write!(f, "{}", " INFO ".on_magenta().bold().white()),
            LogLevel::Warn => write!(f, "{}", " WARN ".on_yellow().bold().black()),
            LogLevel::Error => write!(f, "{}", " ERROR ".on_red().bold().white()),
        }
    }
}

pub struct Logger {
    pub enable_request_logging: bool,
    pub enable_timestamps: bool,
}

impl Logger {
    pub const fn new() -> Self {
        Self {
            enable_request_logging: true,
            enable_timestamps: true,
        }
    }

    pub fn with_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = enable;
        self
    }

    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.enable_timestamps = enable;
        self
    }

    fn format_timestamp(&self) -> String {
        if self.enable_timestamps {
            let now: DateTime<Local> = Local::now();
            format!("{} ", now.format("%Y-%m-%d %H:%M:%S").to_string().dimmed())
        } else {
            String::new()
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let timestamp = self.format_timestamp();
        println!("{}{} {}", timestamp, level, message);
    }

    pub fn http(&self, ip: &str, method: &str, path: &str, status: u16, response_time: u128) {
        if !self.enable_request_logging {
            return;
        }

        let request = format!("{} {}", method, path).cyan();
        let status_colored = if status < 400 {
            status.to_string().green()
        } else {
            status.to_string().red()
        };

        println!(
            "{}{} {} {} - {} in {} ms",
            self.format_timestamp(),
            LogLevel::Http,
            ip.yellow(),
            request,
            status_colored,
            response_time
        );
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn startup_info(&self, name: &str, version: &str) {
        self.info(&format!("Starting {} v{}", name.bold(), version.bold()));
    }

    /// Where requests go: the static root and the proxied prefix.
    pub fn routing_info(&self, static_dir: &str, upstream: &str, prefix: &str, strip_prefix: bool) {
        self.info(&format!("Static directory: {}", static_dir.bold()));
        let rewrite = if strip_prefix { " (prefix stripped)" } else { "" };
        self.info(&format!(
            "Proxying GET/POST {}* to {}{}",
            prefix.bold(),
            upstream.bold(),
            rewrite
        ));
    }

    pub fn server_info(&self, signature: &str, local_url: &str, network_url: Option<&str>) {
        self.info(&format!("Server: {}", signature.bold()));

        if !atty::is(atty::Stream::Stdout) {
            self.info(&format!("Accepting connections at {}", local_url));
            return;
        }

        let mut message = format!("{}", "Serving!".green().bold());
        let prefix = if network_url.is_some() { "- " } else { "" };
        let space = if network_url.is_some() { "    " } else { "  " };
        message += &format!(
            "\n\n{}{}{}{}",
            "Local:".bold(),
            space,
            prefix,
            local_url.bright_cyan()
        );

        if let Some(network) = network_url {
            message += &format!("\n{}  {}", "- Network:".bold(), network.bright_cyan());
        }

        self.print_boxed(&message);
    }

    pub fn print_boxed(&self, message: &str) {
        let lines: Vec<&str> = message.lines().collect();
        if lines.is_empty() {
            return;
        }

        let max_width = lines
            .iter()
            .map(|line| strip_ansi_codes(line).chars().count())
            .max()
            .unwrap_or(0);

        let box_width = max_width + 4;

        println!("┌{}┐", "─".repeat(box_width));
        println!("│{}│", " ".repeat(box_width));

        for line in lines {
            let stripped_len = strip_ansi_codes(line).chars().count();
            let padding = " ".repeat((box_width - stripped_len) / 2);
            let right_padding = " ".repeat(box_width - stripped_len - padding.len());
            println!("│{}{}{}│", padding, line, right_padding);
        }

        println!("│{}│", " ".repeat(box_width));
        println!("└{}┘", "─".repeat(box_width));
        println!();
    }

    pub fn shutdown_message(&self) {
        println!();
        self.info("Gracefully shutting down. Please wait...");
    }

    pub fn force_shutdown_message(&self) {
        println!();
        self.warn("Force-closing all open sockets...");
    }
}

// Strip ANSI color codes for width calculation
fn strip_ansi_codes(s: &str) -> String {
    let mut result = String::new();
    let mut in_escape = false;
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            in_escape = true;
            continue;
        }

        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }

        result.push(ch);
    }

    result
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

static DEFAULT_LOGGER: Logger = Logger::new();

pub fn init_logger(enable_request_logging: bool, enable_timestamps: bool) {
    let _ = GLOBAL_LOGGER.set(
        Logger::new()
            .with_request_logging(enable_request_logging)
            .with_timestamps(enable_timestamps),
    );
}

pub fn get_logger() -> &'static Logger {
    GLOBAL_LOGGER.get().unwrap_or(&DEFAULT_LOGGER)
}
