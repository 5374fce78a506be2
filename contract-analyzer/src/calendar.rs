//! Calendar export for contract due dates
//!
//! Turns `analise.datas_vencimento` into all-day events: Google Calendar and
//! Outlook compose links, and an iCalendar (`.ics`) document.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded::byte_serialize;

pub const DEFAULT_TITLE: &str = "Vencimento de contrato";
pub const DEFAULT_DETAILS: &str = "Gerado pelo Analisador de Contratos";
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// A due date with a known calendar day
#[derive(Debug, Clone, PartialEq)]
pub struct DueDate {
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl DueDate {
    /// Description, or the ISO date when there is none
    pub fn label(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.date.format("%Y-%m-%d").to_string())
    }

    fn title(&self, title_base: &str) -> String {
        match &self.description {
            Some(description) => format!("{title_base} - {description}"),
            None => title_base.to_string(),
        }
    }

    /// Exclusive end of the all-day event; `None` at the end of the calendar
    fn next_day(&self) -> Option<NaiveDate> {
        self.date.checked_add_days(Days::new(1))
    }
}

/// Due dates in `analysis` that carry a valid `data_iso`
pub fn due_dates(analysis: &Value) -> Vec<DueDate> {
    let Some(entries) = analysis.get("datas_vencimento").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let iso = entry.get("data_iso").and_then(Value::as_str)?;
            let date = match NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
                Ok(date) => date,
                Err(e) => {
                    debug!(data_iso = iso, error = %e, "Skipping malformed due date");
                    return None;
                }
            };
            if date.checked_add_days(Days::new(1)).is_none() {
                debug!(data_iso = iso, "Skipping due date at the end of the calendar");
                return None;
            }
            let description = entry
                .get("descricao")
                .and_then(Value::as_str)
                .filter(|d| !d.is_empty())
                .map(str::to_string);
            Some(DueDate { description, date })
        })
        .collect()
}

/// Compose links for one due date
#[derive(Debug, Clone, Serialize)]
pub struct CalendarLinks {
    pub description: String,
    pub date_iso: String,
    pub google: String,
    pub outlook_live: String,
    pub outlook_office: String,
}

fn quote_plus(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}

/// Google and Outlook links for every date
pub fn links(dates: &[DueDate], title_base: &str, details: &str, timezone: &str) -> Vec<CalendarLinks> {
    dates
        .iter()
        .filter_map(|due| {
            let end = due.next_day()?;
            let title = quote_plus(&due.title(title_base));
            let body = quote_plus(details);
            let tz = quote_plus(timezone);

            let google = format!(
                "https://calendar.google.com/calendar/render?action=TEMPLATE&text={title}&dates={}/{}&details={body}",
                due.date.format("%Y%m%d"),
                end.format("%Y%m%d"),
            );

            let query = format!(
                "allday=true&subject={title}&body={body}&startdt={}&enddt={}&ctz={tz}",
                due.date.format("%Y-%m-%d"),
                end.format("%Y-%m-%d"),
            );

            Some(CalendarLinks {
                description: due.label(),
                date_iso: due.date.format("%Y-%m-%d").to_string(),
                google,
                outlook_live: format!("https://outlook.live.com/calendar/0/deeplink/compose?{query}"),
                outlook_office: format!("https://outlook.office.com/calendar/0/deeplink/compose?{query}"),
            })
        })
        .collect()
}

/// iCalendar document with one all-day VEVENT per date, CRLF line endings
pub fn to_ics(dates: &[DueDate], title_base: &str, details: &str, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let description = details.replace('\n', "\\n");

    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        "PRODID:-//AnalisadorContrato//PT-BR//EN".to_string(),
        "CALSCALE:GREGORIAN".to_string(),
        "METHOD:PUBLISH".to_string(),
    ];

    for due in dates {
        let Some(end) = due.next_day() else {
            continue;
        };
        lines.extend([
            "BEGIN:VEVENT".to_string(),
            format!("UID:{}", uuid::Uuid::new_v4()),
            format!("DTSTAMP:{stamp}"),
            format!("SUMMARY:{}", due.title(title_base)),
            format!("DESCRIPTION:{description}"),
            format!("DTSTART;VALUE=DATE:{}", due.date.format("%Y%m%d")),
            format!("DTEND;VALUE=DATE:{}", end.format("%Y%m%d")),
            "END:VEVENT".to_string(),
        ]);
    }

    lines.push("END:VCALENDAR".to_string());
    lines.join("\r\n")
}
