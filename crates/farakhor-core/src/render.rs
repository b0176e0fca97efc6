use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::calendar::PersianDate;
use crate::clock::{CLOCK_LABEL, ClockReading, ClockSize};
use crate::config::Config;
use crate::controller::ViewState;
use crate::format::{persian_date_label, persian_year_label, to_persian_digits};
use crate::occasion::Occasion;

const LEAP_YEAR_NOTICE: &str = "امسال کبیسه (انباشته) است";
const LOADING_TEXT: &str = "... در حال بارگزاری فراخور های پیش رو";
const EMPTY_MONTH_TEXT: &str = "فراخوری برای این ماه نیست";
const MORE_INFO_TEXT: &str = "برای اطلاعات بیشتر";
const TODAY_MARKER: &str = "●";
const DETAIL_MARKER: &str = "+";
const CLOCK_PIXELS_PER_COLUMN: u32 = 8;

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

        Ok(Self { color })
    }

    #[tracing::instrument(skip_all)]
    pub fn print_month(&mut self, state: &ViewState) -> anyhow::Result<()> {
        self.write_month(io::stdout().lock(), state)
    }

    pub fn write_month<W: Write>(&self, mut out: W, state: &ViewState) -> anyhow::Result<()> {
        let mut heading = persian_year_label(state.current_year);
        if state.is_leap {
            heading.push_str("   ");
            heading.push_str(LEAP_YEAR_NOTICE);
        }
        writeln!(out, "{heading}")?;
        writeln!(out, "{}", persian_date_label(&state.today))?;
        writeln!(out, "فراخورهای ماه {}", state.current_month)?;
        writeln!(out)?;

        if state.loading() {
            writeln!(out, "{LOADING_TEXT}")?;
            return Ok(());
        }
        if state.events.is_empty() {
            writeln!(out, "{EMPTY_MONTH_TEXT}")?;
            return Ok(());
        }

        let headers = vec![
            String::new(),
            "روز".to_string(),
            "ماه".to_string(),
            "Date".to_string(),
            "Occasion".to_string(),
            String::new(),
        ];

        let mut rows = Vec::with_capacity(state.events.len());
        for occasion in &state.events {
            let is_today = state.is_today(occasion);
            let day = to_persian_digits(state.display_day(occasion).to_string());
            let gregorian = occasion
                .gregorian_label(state.is_leap)
                .unwrap_or_else(|_| occasion.gregorian(state.is_leap).to_string());
            let detail = if occasion.modal_status {
                DETAIL_MARKER
            } else {
                ""
            };

            let (marker, day, title) = if is_today {
                (
                    self.paint(TODAY_MARKER, "33"),
                    self.paint(&day, "1;33"),
                    self.paint(&occasion.short_title, "1;33"),
                )
            } else {
                (String::new(), day, occasion.short_title.clone())
            };

            rows.push(vec![
                marker,
                day,
                occasion.month.name().to_string(),
                gregorian,
                title,
                detail.to_string(),
            ]);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip_all)]
    pub fn print_occasion(&mut self, occasion: &Occasion, is_leap: bool) -> anyhow::Result<()> {
        self.write_occasion(io::stdout().lock(), occasion, is_leap)
    }

    pub fn write_occasion<W: Write>(
        &self,
        mut out: W,
        occasion: &Occasion,
        is_leap: bool,
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&occasion.event_title, "1"))?;
        writeln!(
            out,
            "{} {}  ({})",
            to_persian_digits(occasion.display_day(is_leap).to_string()),
            occasion.month,
            occasion
                .gregorian_label(is_leap)
                .unwrap_or_else(|_| occasion.gregorian(is_leap).to_string())
        )?;
        writeln!(out, "image     {}", occasion.modal_image())?;
        if !occasion.text.trim().is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", occasion.text.trim())?;
        }
        if let Some(link) = occasion.ref_link.as_deref() {
            writeln!(out)?;
            writeln!(out, "{MORE_INFO_TEXT}: {link}")?;
        }
        Ok(())
    }

    pub fn print_today(
        &mut self,
        today: &PersianDate,
        gregorian: NaiveDate,
        is_leap: bool,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "{} {}  {}",
            persian_date_label(today),
            to_persian_digits(today.year.to_string()),
            today
        )?;
        writeln!(out, "{}", gregorian.format("%A %Y-%m-%d"))?;
        if is_leap {
            writeln!(out, "{LEAP_YEAR_NOTICE}")?;
        }
        Ok(())
    }

    pub fn clock_face(&self, reading: &ClockReading, size: ClockSize) -> String {
        let time = reading.time_label();
        let inner = ((size.container / CLOCK_PIXELS_PER_COLUMN) as usize)
            .saturating_sub(2)
            .max(time.len() + 2);

        let mut face = String::new();
        face.push('╭');
        face.push_str(&"─".repeat(inner));
        face.push_str("╮\n");
        face.push('│');
        face.push_str(&center(&self.paint(&time, "1"), inner));
        face.push_str("│\n");
        face.push('╰');
        face.push_str(&"─".repeat(inner));
        face.push_str("╯\n");
        face.push_str(&center(CLOCK_LABEL, inner + 2));
        face.push('\n');
        face
    }

    pub fn print_clock(&mut self, reading: &ClockReading, size: ClockSize) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "{}", self.clock_face(reading, size))?;
        Ok(())
    }

    /// Rewrites the current terminal line with the time.
    pub fn print_clock_tick(&mut self, reading: &ClockReading) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "\r{}  {CLOCK_LABEL}", self.paint(&reading.time_label(), "1"))?;
        out.flush()?;
        Ok(())
    }

    pub fn print_config(&mut self, cfg: &Config) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        let rows = cfg
            .iter()
            .map(|(key, value)| vec![key.clone(), value.clone()])
            .collect();
        write_table(out, vec!["Key".to_string(), "Value".to_string()], rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn center(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(strip_ansi(text).as_str());
    let total = width.saturating_sub(visible);
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(total - left))
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
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{}{} ", header, pad(header, *width))?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, width) in row.iter().zip(&widths) {
            write!(writer, "{}{} ", cell, pad(cell, *width))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn pad(cell: &str, width: usize) -> String {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    " ".repeat(width.saturating_sub(visible_width))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::PersianMonth;
    use crate::catalog::decode_envelope;
    use crate::clock::clock_size_for_width;
    use crate::controller::LoadPhase;

    const CATALOG: &str = r#"{"occasions": [
        {"ShortTitle": "مهرگان", "EventTitle": "جشن مهرگان", "Georgian": "8,10", "GeorgianK": "7,10",
         "PersianDayNumber": 16, "PersianDayNumberK": 16, "Month": "مهر", "ModalStatus": true,
         "Text": "جشن مهر و دوستی", "RefLink": "https://example.org/mehregan"}
    ]}"#;

    fn state(phase: LoadPhase) -> ViewState {
        ViewState {
            current_year: 1405,
            current_month: PersianMonth::Mehr,
            events: decode_envelope(CATALOG).expect("decode"),
            phase,
            is_leap: false,
            modal: None,
            last_load: None,
            today: PersianDate {
                year: 1405,
                month: PersianMonth::Mehr,
                day: 16,
            },
        }
    }

    fn renderer() -> Renderer {
        Renderer::new(&Config::defaults()).expect("renderer")
    }

    fn render_month(state: &ViewState) -> String {
        let mut buf = Vec::new();
        renderer().write_month(&mut buf, state).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn month_view_lists_cards() {
        let text = render_month(&state(LoadPhase::Loaded));
        assert!(text.contains("سال ۱۴۰۵"));
        assert!(text.contains("(۱۶ مهر)"));
        assert!(text.contains("فراخورهای ماه مهر"));
        assert!(text.contains("۱۶"));
        assert!(text.contains("8 Oct"));
        assert!(text.contains(TODAY_MARKER));
        assert!(!text.contains(LEAP_YEAR_NOTICE));
    }

    #[test]
    fn day_column_uses_persian_digits_of_display_day() {
        let mut leap = state(LoadPhase::Loaded);
        leap.is_leap = true;
        leap.events[0].persian_day_number_k = 17;
        let text = render_month(&leap);
        assert!(text.contains("۱۷"));
        assert!(!text.contains(TODAY_MARKER));
    }

    #[test]
    fn loading_hides_cards() {
        let text = render_month(&state(LoadPhase::Loading));
        assert!(text.contains(LOADING_TEXT));
        assert!(!text.contains("8 Oct"));
    }

    #[test]
    fn empty_month_has_placeholder() {
        let mut empty = state(LoadPhase::Loaded);
        empty.events.clear();
        empty.is_leap = true;
        let text = render_month(&empty);
        assert!(text.contains(EMPTY_MONTH_TEXT));
        assert!(text.contains(LEAP_YEAR_NOTICE));
    }

    #[test]
    fn detail_panel_shows_fallback_image_and_link() {
        let view = state(LoadPhase::Loaded);
        let mut buf = Vec::new();
        renderer()
            .write_occasion(&mut buf, &view.events[0], false)
            .expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("جشن مهرگان"));
        assert!(text.contains(crate::occasion::DEFAULT_LOGO_URL));
        assert!(text.contains("https://example.org/mehregan"));
    }

    #[test]
    fn clock_face_scales_with_viewport() {
        let reading = ClockReading::now();
        let small = renderer().clock_face(&reading, clock_size_for_width(400));
        let large = renderer().clock_face(&reading, clock_size_for_width(2000));
        assert!(small.contains(CLOCK_LABEL));
        let width = |face: &str| face.lines().next().map(|line| line.chars().count());
        assert!(width(&large) > width(&small));
    }

    #[test]
    fn table_pads_wide_cells() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["A".to_string(), "B".to_string()],
            vec![vec!["۱۲".to_string(), "x".to_string()]],
        )
        .expect("table");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.lines().count(), 3);
    }
}
