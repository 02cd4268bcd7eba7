use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::annotation::{AnnotationSource, DateAnnotation};
use crate::config::Config;
use crate::engine::{DayCell, RenderModel};
use crate::migrate::MigrationReport;
use crate::notice::{Notice, NoticeLevel};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, model), fields(rows = model.rows.len()))]
    pub fn print_model(&self, model: &RenderModel) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_model(&mut out, model)
    }

    /// Grid of the model followed by one line per annotated day.
    pub fn write_model<W: Write>(&self, mut writer: W, model: &RenderModel) -> anyhow::Result<()> {
        writeln!(writer, "{}", self.paint(&model.title, "1"))?;
        writeln!(writer)?;

        let mut headers = vec!["Week".to_string()];
        headers.extend(model.weekday_headers.iter().cloned());

        let mut rows = Vec::with_capacity(model.rows.len());
        for row in &model.rows {
            let link = match &row.page_name {
                Some(name) if row.page_exists => self.paint(name, "4"),
                Some(name) => name.clone(),
                None => "-".to_string(),
            };
            let mut cells = vec![link];
            cells.extend(row.days.iter().map(|cell| self.day_cell(cell)));
            rows.push(cells);
        }
        write_table(&mut writer, headers, rows)?;

        let annotated = model
            .rows
            .iter()
            .flat_map(|row| row.days.iter())
            .filter(|cell| !cell.annotation.is_empty())
            .collect::<Vec<_>>();
        if !annotated.is_empty() {
            writeln!(writer)?;
            for cell in annotated {
                self.write_annotation_line(&mut writer, &cell.annotation)?;
            }
        }
        Ok(())
    }

    pub fn write_annotation_line<W: Write>(
        &self,
        mut writer: W,
        annotation: &DateAnnotation,
    ) -> anyhow::Result<()> {
        let labels = annotation
            .labels()
            .into_iter()
            .map(|(source, label)| match source {
                AnnotationSource::User => label,
                AnnotationSource::Holiday => format!("{label} (holiday)"),
                AnnotationSource::Ics => format!("{label} (calendar)"),
            })
            .collect::<Vec<_>>()
            .join("; ");
        writeln!(writer, "{}  {labels}", annotation.date)?;
        Ok(())
    }

    pub fn print_annotation(&self, annotation: &DateAnnotation) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        if annotation.is_empty() {
            writeln!(out, "{}  (nothing)", annotation.date)?;
            return Ok(());
        }
        self.write_annotation_line(&mut out, annotation)
    }

    pub fn print_report(&self, report: &MigrationReport) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        for (old, new) in &report.renamed {
            writeln!(out, "{old} -> {new}")?;
        }
        for (page, error) in &report.failed {
            writeln!(out, "{} {page}: {error}", self.paint("failed", "31"))?;
        }
        writeln!(out, "{}", report.summary())?;
        Ok(())
    }

    pub fn print_notices(&self, notices: &[Notice]) -> anyhow::Result<()> {
        let mut err = io::stderr().lock();
        for notice in notices {
            let label = match notice.level {
                NoticeLevel::Info => self.paint("info", "36"),
                NoticeLevel::Warning => self.paint("warning", "33"),
                NoticeLevel::Error => self.paint("error", "31"),
            };
            writeln!(err, "{label}: {}", notice.message)?;
        }
        Ok(())
    }

    fn day_cell(&self, cell: &DayCell) -> String {
        let mut text = format!("{:>2}", cell.day);
        if cell.journal_exists {
            text.push('*');
        }
        if !cell.annotation.is_empty() {
            text.push('!');
        }

        if cell.is_today {
            return self.paint(&text, "7");
        }
        if !cell.in_focus {
            return self.paint(&text, "2");
        }
        if let Some(code) = cell
            .annotation
            .user_style()
            .and_then(|style| style_code(style.color.as_deref(), style.bold))
        {
            return self.paint(&text, &code);
        }
        match cell.annotation.primary_source() {
            Some(AnnotationSource::Holiday) => self.paint(&text, "31"),
            Some(AnnotationSource::Ics) => self.paint(&text, "34"),
            _ => text,
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// SGR code for a `#rrggbb` color and/or bold flag.
fn style_code(color: Option<&str>, bold: bool) -> Option<String> {
    let mut parts = Vec::new();
    if bold {
        parts.push("1".to_string());
    }
    if let Some(hex) = color.and_then(|raw| raw.strip_prefix('#'))
        && hex.len() == 6
        && let Ok(rgb) = u32::from_str_radix(hex, 16)
    {
        parts.push(format!(
            "38;2;{};{};{}",
            (rgb >> 16) & 0xff,
            (rgb >> 8) & 0xff,
            rgb & 0xff
        ));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(";"))
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (idx, header) in headers.iter().enumerate() {
        let padding = widths[idx].saturating_sub(UnicodeWidthStr::width(header.as_str()));
        write!(writer, "{}{} ", header, " ".repeat(padding))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
