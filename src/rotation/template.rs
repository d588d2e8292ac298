/// Path template substitution for history file names
///
/// Tokens:
/// - `%Y` year (4 digits), `%M` month, `%D` day
/// - `%h` hour (24h), `%m` minute, `%s` second
/// - `%Z` zone marker: `Z` for UTC, otherwise `+hhmm` / `-hhmm`
///
/// A template without `%Z` is always rendered in UTC, so names do not depend
/// on the zone of the caller's time value. Unknown tokens are kept verbatim.
use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike, Utc};

/// Timestamp segment embedded in every history file name
pub const TIMESTAMP_TEMPLATE: &str = "%Y%M%DT%h%m%sZ";

/// Default directory layout inside the history root
pub const DEFAULT_HISTORY_PATH: &str = "%Y/%M";

/// Length of a rendered [`TIMESTAMP_TEMPLATE`]
pub const TIMESTAMP_LEN: usize = 15;

/// File name template for one history entry: `<stem>_<timestamp><ext>`
pub fn entry_name_template(stem: &str, ext: &str) -> String {
    format!("{}_{}{}", stem, TIMESTAMP_TEMPLATE, ext)
}

/// Render `template` against `t`
pub fn format<Tz: TimeZone>(t: &DateTime<Tz>, template: &str) -> String {
    if template.contains("%Z") {
        let offset = t.offset().fix().local_minus_utc();
        render(t, template, offset)
    } else {
        render(&t.with_timezone(&Utc), template, 0)
    }
}

fn render<Tz: TimeZone>(t: &DateTime<Tz>, template: &str, offset_secs: i32) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let token = match chars.peek() {
            Some(&next) => next,
            None => {
                out.push(c);
                break;
            }
        };

        let rendered = match token {
            'Y' => format!("{:04}", t.year()),
            'M' => format!("{:02}", t.month()),
            'D' => format!("{:02}", t.day()),
            'h' => format!("{:02}", t.hour()),
            'm' => format!("{:02}", t.minute()),
            's' => format!("{:02}", t.second()),
            'Z' => zone_marker(offset_secs),
            _ => {
                out.push(c);
                continue;
            }
        };
        chars.next();
        out.push_str(&rendered);
    }

    out
}

fn zone_marker(offset_secs: i32) -> String {
    if offset_secs == 0 {
        return "Z".to_string();
    }
    let sign = if offset_secs < 0 { '-' } else { '+' };
    let abs = offset_secs.unsigned_abs();
    format!("{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
}
