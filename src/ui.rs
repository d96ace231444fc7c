//! Terminal output for ccrotate: styling, color detection, tables, spinners,
//! confirmation prompts.
//!
//! # No-color detection (in priority order):
//! 1. `--no-color` CLI flag (highest priority)
//! 2. `NO_COLOR` environment variable (any value)
//! 3. `TERM=dumb` environment variable
//! 4. Non-TTY stdout (detected via anstream)

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use comfy_table::{Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;
use tracing::debug;

use crate::refresh::{AccountReport, AccountStatus, RefreshReporter};

/// Yes/no gate in front of destructive operations
pub trait Confirmer {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers yes without asking (`--force`, `--yes`)
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Color mode for output
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    /// Always emit ANSI colors
    Always,
    /// Emit colors only if TTY and not disabled
    #[default]
    Auto,
    /// Never emit ANSI colors
    Never,
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            _ => Err(format!("invalid color mode: {}", s)),
        }
    }
}

/// UI context holding resolved display settings
#[derive(Debug, Clone)]
pub struct Ui {
    pub color_enabled: bool,
    /// Requires TTY + color
    pub spinner_enabled: bool,
}

impl Ui {
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = Self::resolve_color(mode, force_no_color);
        let is_tty = std::io::stdout().is_terminal();
        let spinner_enabled = color_enabled && is_tty;

        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled,
        }
    }

    fn resolve_color(mode: ColorMode, force_no_color: bool) -> bool {
        if force_no_color {
            return false;
        }

        if std::env::var("NO_COLOR").is_ok() {
            return false;
        }

        if std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false) {
            return false;
        }

        match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    // -------------------------------------------------------------------------
    // Styled label helpers
    // -------------------------------------------------------------------------

    fn style_label(&self, color: AnsiColor) -> Style {
        if self.color_enabled {
            Style::new().fg_color(Some(Color::Ansi(color))).bold()
        } else {
            Style::new()
        }
    }

    /// Print OK label (green) with message to stdout
    pub fn ok(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Green);
        println!("{label}OK{label:#} {}", msg.as_ref());
    }

    /// Print WARN label (yellow) with message to stdout
    pub fn warn(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Yellow);
        println!("{label}WARN{label:#} {}", msg.as_ref());
    }

    /// Print ERROR label (red) with message to stderr
    pub fn err(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Red);
        eprintln!("{label}ERROR{label:#} {}", msg.as_ref());
    }

    /// Print INFO label (cyan) with message to stdout
    pub fn info(&self, msg: impl AsRef<str>) {
        let label = self.style_label(AnsiColor::Cyan);
        println!("{label}INFO{label:#} {}", msg.as_ref());
    }

    pub fn dim(&self, s: impl AsRef<str>) -> String {
        if self.color_enabled {
            let st = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));
            format!("{st}{}{st:#}", s.as_ref())
        } else {
            s.as_ref().to_string()
        }
    }

    pub fn bold(&self, s: impl AsRef<str>) -> String {
        if self.color_enabled {
            let st = Style::new().bold();
            format!("{st}{}{st:#}", s.as_ref())
        } else {
            s.as_ref().to_string()
        }
    }

    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        if self.color_enabled {
            let st = Style::new().fg_color(Some(Color::Ansi(color)));
            format!("{st}{}{st:#}", s.as_ref())
        } else {
            s.as_ref().to_string()
        }
    }

    // -------------------------------------------------------------------------
    // Status icons (with fallback for no-color)
    // -------------------------------------------------------------------------

    pub fn icon_ok(&self) -> &'static str {
        if self.color_enabled { "✓" } else { "[OK]" }
    }

    pub fn icon_warn(&self) -> &'static str {
        if self.color_enabled { "⚠" } else { "[!]" }
    }

    pub fn icon_err(&self) -> &'static str {
        if self.color_enabled { "✗" } else { "[X]" }
    }

    pub fn icon_info(&self) -> &'static str {
        if self.color_enabled { "•" } else { "-" }
    }

    // -------------------------------------------------------------------------
    // Tables (comfy-table)
    // -------------------------------------------------------------------------

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);

        if self.color_enabled {
            table.load_preset(presets::UTF8_FULL_CONDENSED);
        } else {
            table.load_preset(presets::ASCII_MARKDOWN);
        }

        table
    }

    /// Borderless, for plain listings
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(presets::NOTHING);
        table
    }

    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    /// Bold when color is enabled
    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.add_attribute(comfy_table::Attribute::Bold)
        } else {
            cell
        }
    }

    /// Colored via comfy-table so column widths stay right
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.fg(ansi_to_comfy_color(color))
        } else {
            cell
        }
    }

    // -------------------------------------------------------------------------
    // Spinners (indicatif)
    // -------------------------------------------------------------------------

    /// Hidden when spinners are disabled
    pub fn spinner(&self, message: impl Into<std::borrow::Cow<'static, str>>) -> ProgressBar {
        if self.spinner_enabled {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                    .template("{spinner:.cyan} {msg}")
                    .expect("valid template"),
            );
            pb.set_message(message);
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            let pb = ProgressBar::hidden();
            pb.set_message(message);
            pb
        }
    }

    pub fn spinner_finish_ok(
        &self,
        pb: &ProgressBar,
        msg: impl Into<std::borrow::Cow<'static, str>>,
    ) {
        if self.spinner_enabled {
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg}")
                    .expect("valid template"),
            );
            let icon = self.colored("✓", AnsiColor::Green);
            pb.finish_with_message(format!("{} {}", icon, msg.into()));
        } else {
            pb.finish_and_clear();
            self.ok(msg.into());
        }
    }

    pub fn spinner_finish_err(
        &self,
        pb: &ProgressBar,
        msg: impl Into<std::borrow::Cow<'static, str>>,
    ) {
        if self.spinner_enabled {
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{msg}")
                    .expect("valid template"),
            );
            let icon = self.colored("✗", AnsiColor::Red);
            pb.finish_with_message(format!("{} {}", icon, msg.into()));
        } else {
            pb.finish_and_clear();
            self.err(msg.into());
        }
    }

    // -------------------------------------------------------------------------
    // Println helpers (using anstream for proper tty handling)
    // -------------------------------------------------------------------------

    pub fn println(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    pub fn newline(&self) {
        println!();
    }

    /// Dimmed line on stderr, keeping stdout for machine-readable output
    pub fn note(&self, msg: impl AsRef<str>) {
        eprintln!("{}", self.dim(msg));
    }

    pub fn section(&self, title: impl AsRef<str>) {
        println!("{}", self.bold(title));
    }
}

/// Interactive prompt, defaulting to no. A cancelled or impossible prompt
/// (e.g. stdin is not a terminal) counts as no.
impl Confirmer for Ui {
    fn confirm(&self, prompt: &str) -> bool {
        match inquire::Confirm::new(prompt).with_default(false).prompt() {
            Ok(answer) => answer,
            Err(e) => {
                debug!(error = %e, "confirmation not given");
                false
            }
        }
    }
}

/// Spinner per account while probing, then a summary table
pub struct RefreshProgress<'a> {
    ui: &'a Ui,
    spinner: Option<ProgressBar>,
}

impl<'a> RefreshProgress<'a> {
    pub fn new(ui: &'a Ui) -> Self {
        Self { ui, spinner: None }
    }

    pub fn summary_table(&self, reports: &[AccountReport]) -> Table {
        let ui = self.ui;
        let mut table = ui.table();
        table.set_header(vec![
            ui.header_cell("#"),
            ui.header_cell("Email"),
            ui.header_cell("Status"),
            ui.header_cell("Result"),
            ui.header_cell("Updated"),
        ]);

        for (index, report) in reports.iter().enumerate() {
            let status = match report.status {
                AccountStatus::Success => ui.colored_cell("success", AnsiColor::Green),
                AccountStatus::Error => ui.colored_cell("error", AnsiColor::Red),
                AccountStatus::Testing => ui.colored_cell("testing", AnsiColor::Cyan),
                AccountStatus::Pending => ui.colored_cell("pending", AnsiColor::BrightBlack),
            };
            let updated = if report.credentials_updated {
                ui.colored_cell("yes", AnsiColor::Yellow)
            } else {
                ui.cell("")
            };
            table.add_row(vec![
                ui.cell((index + 1).to_string()),
                ui.cell(&report.email),
                status,
                ui.cell(report.response.replace('\n', " ")),
                updated,
            ]);
        }
        table
    }
}

impl RefreshReporter for RefreshProgress<'_> {
    fn begin(&mut self, reports: &[AccountReport]) {
        self.ui
            .info(format!("Testing {} saved accounts one at a time", reports.len()));
    }

    fn update(&mut self, index: usize, report: &AccountReport) {
        let label = format!("[{}] {}", index + 1, report.email);
        match report.status {
            AccountStatus::Pending => {}
            AccountStatus::Testing => {
                self.spinner = Some(self.ui.spinner(format!("{label}: testing...")));
            }
            AccountStatus::Success | AccountStatus::Error => {
                let mut msg = label;
                if report.credentials_updated {
                    msg.push_str(" (credentials updated)");
                }
                let ok = report.status == AccountStatus::Success;
                match (self.spinner.take(), ok) {
                    (Some(pb), true) => self.ui.spinner_finish_ok(&pb, msg),
                    (Some(pb), false) => self.ui.spinner_finish_err(&pb, msg),
                    (None, true) => self.ui.ok(msg),
                    (None, false) => self.ui.err(msg),
                }
            }
        }
    }

    fn finish(&mut self, reports: &[AccountReport]) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        self.ui.newline();
        self.ui.println(self.summary_table(reports).to_string());
    }
}

fn ansi_to_comfy_color(color: AnsiColor) -> comfy_table::Color {
    match color {
        AnsiColor::Black => comfy_table::Color::Black,
        AnsiColor::Red => comfy_table::Color::Red,
        AnsiColor::Green => comfy_table::Color::Green,
        AnsiColor::Yellow => comfy_table::Color::Yellow,
        AnsiColor::Blue => comfy_table::Color::Blue,
        AnsiColor::Magenta => comfy_table::Color::Magenta,
        AnsiColor::Cyan => comfy_table::Color::Cyan,
        AnsiColor::White => comfy_table::Color::White,
        AnsiColor::BrightBlack => comfy_table::Color::DarkGrey,
        AnsiColor::BrightRed => comfy_table::Color::Red,
        AnsiColor::BrightGreen => comfy_table::Color::Green,
        AnsiColor::BrightYellow => comfy_table::Color::Yellow,
        AnsiColor::BrightBlue => comfy_table::Color::Blue,
        AnsiColor::BrightMagenta => comfy_table::Color::Magenta,
        AnsiColor::BrightCyan => comfy_table::Color::Cyan,
        AnsiColor::BrightWhite => comfy_table::Color::White,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(email: &str, status: AccountStatus, updated: bool) -> AccountReport {
        AccountReport {
            email: email.to_string(),
            status,
            response: "OK".to_string(),
            credentials_updated: updated,
        }
    }

    #[test]
    fn test_color_mode_parse() {
        assert_eq!("always".parse::<ColorMode>().unwrap(), ColorMode::Always);
        assert_eq!("auto".parse::<ColorMode>().unwrap(), ColorMode::Auto);
        assert_eq!("never".parse::<ColorMode>().unwrap(), ColorMode::Never);
        assert!("invalid".parse::<ColorMode>().is_err());
    }

    #[test]
    fn test_ui_force_no_color() {
        let ui = Ui::new(ColorMode::Always, true);
        assert!(!ui.color_enabled);
    }

    #[test]
    fn test_icons_no_color() {
        let ui = Ui::new(ColorMode::Never, false);
        assert_eq!(ui.icon_ok(), "[OK]");
        assert_eq!(ui.icon_err(), "[X]");
        assert_eq!(ui.icon_warn(), "[!]");
        assert_eq!(ui.dim("test"), "test");
    }

    #[test]
    fn test_spinner_disabled() {
        let ui = Ui::new(ColorMode::Never, false);
        assert!(!ui.spinner_enabled);
        let pb = ui.spinner("test");
        pb.finish();
    }

    #[test]
    fn test_assume_yes() {
        assert!(AssumeYes.confirm("Delete everything?"));
    }

    #[test]
    fn test_summary_table_rows() {
        let ui = Ui::new(ColorMode::Never, false);
        let progress = RefreshProgress::new(&ui);
        let rendered = progress
            .summary_table(&[
                report("a@x.io", AccountStatus::Success, true),
                report("b@x.io", AccountStatus::Error, false),
            ])
            .to_string();

        assert!(rendered.contains("a@x.io"));
        assert!(rendered.contains("success"));
        assert!(rendered.contains("error"));
        assert!(rendered.contains("yes"));
    }

    #[test]
    fn test_progress_handles_error_without_spinner() {
        let ui = Ui::new(ColorMode::Never, false);
        let mut progress = RefreshProgress::new(&ui);
        let reports = vec![report("a@x.io", AccountStatus::Error, false)];

        progress.update(0, &reports[0]);
        progress.finish(&reports);
        assert!(progress.spinner.is_none());
    }
}
