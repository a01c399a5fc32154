use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::dashboard::{DashboardView, WidgetState};
use crate::rotation::Assignment;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color_setting: Option<&str>) -> anyhow::Result<Self> {
        let color = match color_setting
            .unwrap_or("on")
            .to_ascii_lowercase()
            .as_str()
        {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "always" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, view))]
    pub fn print_dashboard(&mut self, view: &DashboardView) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_dashboard(out, view)
    }

    pub fn write_dashboard<W: Write>(&self, mut out: W, view: &DashboardView) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&view.today_display, "1"))?;
        writeln!(out)?;

        if !view.duties.is_empty() {
            let headers = vec!["Duty".to_string(), "Today".to_string(), "".to_string()];
            let mut rows = Vec::with_capacity(view.duties.len());

            for duty in &view.duties {
                let who = match &duty.assigned {
                    WidgetState::Ready(candidates) => candidates
                        .iter()
                        .map(|c| c.display_name().to_string())
                        .collect::<Vec<_>>()
                        .join(" + "),
                    WidgetState::Error { message } => self.paint(&format!("unavailable: {message}"), "31"),
                };
                rows.push(vec![
                    duty.title.clone(),
                    self.paint(&who, "33"),
                    duty.tooltip.clone().unwrap_or_default(),
                ]);
            }

            write_table(&mut out, headers, rows)?;
            writeln!(out)?;
        }

        if view.countdowns.is_empty() {
            writeln!(out, "No upcoming countdowns")?;
            return Ok(());
        }

        let headers = vec![
            "".to_string(),
            "Date".to_string(),
            "Countdown".to_string(),
            "Who".to_string(),
            "".to_string(),
        ];
        let mut rows = Vec::with_capacity(view.countdowns.len());

        for row in &view.countdowns {
            let label = match row.days_remaining {
                d if d < 0 => self.paint(&row.label, "2"),
                0 => self.paint(&row.label, "32"),
                d if d <= 7 => self.paint(&row.label, "33"),
                _ => row.label.clone(),
            };
            let who = row.image.clone().unwrap_or_default();
            let note = match (row.turning, &row.tooltip) {
                (Some(n), Some(tip)) => format!("turns {n}, {tip}"),
                (Some(n), None) => format!("turns {n}"),
                (None, Some(tip)) => tip.clone(),
                (None, None) => String::new(),
            };
            rows.push(vec![row.title.clone(), row.date.to_string(), label, who, note]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self, assignments))]
    pub fn print_schedule(&mut self, title: &str, assignments: &[Assignment<'_>]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", self.paint(title, "1"))?;
        let headers = vec!["Date".to_string(), "Day".to_string(), "On duty".to_string()];
        let rows = assignments
            .iter()
            .map(|a| {
                vec![
                    a.date.to_string(),
                    crate::datetime::day_of_year(a.date).to_string(),
                    a.group.members().join(" + "),
                ]
            })
            .collect();

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
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

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
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
