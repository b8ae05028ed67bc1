//! Terminal styling for `chall` output
//!
//! Status lines share one shape: a colored marker, then the message.
//! Errors go to stderr so they never mix with a printed result payload.

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

/// Kind of status line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tone {
    Success,
    Error,
    Warning,
    Info,
}

impl Tone {
    fn color(self) -> &'static str {
        match self {
            Tone::Success => "\x1b[32m",
            Tone::Error => "\x1b[31m",
            Tone::Warning => "\x1b[33m",
            Tone::Info => "\x1b[34m",
        }
    }

    fn marker(self) -> char {
        match self {
            Tone::Success => '✓',
            Tone::Error => '✗',
            Tone::Warning => '⚠',
            Tone::Info => 'ℹ',
        }
    }

    /// Failures and warnings color the whole message, not just the marker.
    fn tints_message(self) -> bool {
        matches!(self, Tone::Error | Tone::Warning)
    }
}

fn status_line(tone: Tone, msg: &str) -> String {
    let color = tone.color();
    if tone.tints_message() {
        format!("{color}{}{RESET} {color}{msg}{RESET}", tone.marker())
    } else {
        format!("{color}{}{RESET} {msg}", tone.marker())
    }
}

pub fn style_bold(s: &str) -> String {
    format!("{BOLD}{s}{RESET}")
}

pub fn style_dim(s: &str) -> String {
    format!("{DIM}{s}{RESET}")
}

pub fn print_success(msg: &str) {
    println!("{}", status_line(Tone::Success, msg));
}

pub fn print_error(msg: &str) {
    eprintln!("{}", status_line(Tone::Error, msg));
}

pub fn print_warning(msg: &str) {
    println!("{}", status_line(Tone::Warning, msg));
}

pub fn print_info(msg: &str) {
    println!("{}", status_line(Tone::Info, msg));
}

/// `→ 3/8 assembling build context`
pub fn print_step(step: u32, total: u32, msg: &str) {
    println!("{CYAN}→{RESET} {CYAN}{step}/{total}{RESET} {msg}");
}

fn header_line(title: &str) -> String {
    let rule = "─".repeat(50usize.saturating_sub(title.chars().count()));
    format!("{BOLD}{CYAN} {title} {rule}{RESET}")
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", header_line(title));
    println!();
}

pub fn print_key_value(key: &str, value: &str) {
    println!("  {GRAY}{key}:{RESET} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_tints_whole_message() {
        let line = status_line(Tone::Warning, "stack left running");
        assert_eq!(line, "\x1b[33m⚠\x1b[0m \x1b[33mstack left running\x1b[0m");
    }

    #[test]
    fn test_success_leaves_message_plain() {
        let line = status_line(Tone::Success, "Result received");
        assert!(line.ends_with(" Result received"));
        assert!(line.starts_with(Tone::Success.color()));
    }

    #[test]
    fn test_header_rule_never_underflows() {
        let long = "x".repeat(80);
        assert!(header_line(&long).contains(&long));
        assert!(header_line("Verifying web-basics").contains(&"─".repeat(30)));
    }
}
