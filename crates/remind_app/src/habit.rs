use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use remind_core::occurrence::Occurrence;
use serde::{Deserialize, Serialize};

use crate::document::OrgDocument;

const TODO_KEYWORDS: &[&str] = &["TODO", "NEXT", "DONE", "WAITING"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub title: String,
    pub scheduled: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub description: String,
    pub repeater: Option<HabitRepeater>,
    pub duration_minutes: Option<u32>,
    pub skippable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitRepeater {
    pub raw: String,
    pub frequency: Option<HabitFrequency>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HabitFrequency {
    Daily(u32),
    Weekly(u32),
    Monthly(u32),
    Yearly(u32),
}

impl HabitRepeater {
    fn from_token(token: &str) -> Self {
        let frequency = parse_frequency(token);
        Self {
            raw: token.to_string(),
            frequency,
        }
    }
}

impl Habit {
    /// Whether the habit's schedule or repeater lands on `date`.
    pub fn occurs_on(&self, date: NaiveDate) -> bool {
        let Some(scheduled) = self.scheduled else {
            return false;
        };
        if scheduled == date {
            return true;
        }
        if date < scheduled {
            return false;
        }
        let Some(frequency) = self.repeater.as_ref().and_then(|rep| rep.frequency) else {
            return false;
        };
        match frequency {
            HabitFrequency::Daily(n) => (date - scheduled).num_days() % i64::from(n) == 0,
            HabitFrequency::Weekly(n) => (date - scheduled).num_days() % (7 * i64::from(n)) == 0,
            HabitFrequency::Monthly(n) => {
                let months = (date.year() - scheduled.year()) * 12 + date.month() as i32
                    - scheduled.month() as i32;
                date.day() == scheduled.day() && months % n as i32 == 0
            }
            HabitFrequency::Yearly(n) => {
                date.month() == scheduled.month()
                    && date.day() == scheduled.day()
                    && (date.year() - scheduled.year()) % n as i32 == 0
            }
        }
    }

    /// Occurrence of this habit on `date`, in local time. Habits without an
    /// explicit time use `default_time`.
    pub fn occurrence_on(&self, date: NaiveDate, default_time: NaiveTime) -> Option<Occurrence> {
        if !self.occurs_on(date) {
            return None;
        }
        let naive = date.and_time(self.time.unwrap_or(default_time));
        let scheduled_at: DateTime<Utc> = Local
            .from_local_datetime(&naive)
            .earliest()?
            .with_timezone(&Utc);
        Some(Occurrence {
            id: format!("{}@{}", slug(&self.title), date),
            title: self.title.clone(),
            scheduled_at,
            duration_minutes: self.duration_minutes,
            skippable: self.skippable,
        })
    }
}

#[derive(Default)]
struct HabitBuilder {
    title: String,
    scheduled: Option<NaiveDate>,
    time: Option<NaiveTime>,
    description_lines: Vec<String>,
    is_habit: bool,
    repeater: Option<HabitRepeater>,
    duration_minutes: Option<u32>,
    skippable: bool,
}

impl HabitBuilder {
    fn new(title: String) -> Self {
        Self {
            title,
            ..Self::default()
        }
    }

    fn into_habit(self) -> Option<Habit> {
        if !self.is_habit {
            return None;
        }
        let description = self.description_lines.join("\n").trim().to_string();
        Some(Habit {
            title: self.title,
            scheduled: self.scheduled,
            time: self.time,
            description,
            repeater: self.repeater,
            duration_minutes: self.duration_minutes,
            skippable: self.skippable,
        })
    }
}

/// Extract org-habit headings with their schedule, duration and skip flag.
pub fn extract_habits(doc: &OrgDocument) -> Vec<Habit> {
    let mut habits = Vec::new();
    let mut builder = HabitBuilder::default();
    let mut drawer_name: Option<String> = None;

    for line in doc.raw().lines() {
        if line.starts_with('*') {
            if let Some(habit) = std::mem::take(&mut builder).into_habit() {
                habits.push(habit);
            }
            builder = HabitBuilder::new(heading_title(line));
            drawer_name = None;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case(":PROPERTIES:") || trimmed.eq_ignore_ascii_case(":LOGBOOK:")
        {
            drawer_name = Some(trimmed.trim_matches(':').to_ascii_uppercase());
            continue;
        }
        if trimmed.eq_ignore_ascii_case(":END:") && drawer_name.is_some() {
            drawer_name = None;
            continue;
        }

        if let Some(name) = &drawer_name {
            if name == "PROPERTIES" {
                apply_property(&mut builder, trimmed);
            }
            continue;
        }

        if trimmed.starts_with("SCHEDULED:") {
            if let Some(info) = parse_scheduled(trimmed) {
                builder.scheduled = Some(info.date);
                builder.time = info.time;
                builder.repeater = info.repeater;
            }
            continue;
        }

        if !trimmed.is_empty() {
            builder.description_lines.push(line.to_string());
        }
    }

    if let Some(habit) = builder.into_habit() {
        habits.push(habit);
    }

    habits
}

fn apply_property(builder: &mut HabitBuilder, line: &str) {
    let Some((key, value)) = line.strip_prefix(':').and_then(|rest| rest.split_once(':')) else {
        return;
    };
    let value = value.trim();
    match key.trim().to_ascii_uppercase().as_str() {
        "STYLE" if value.eq_ignore_ascii_case("habit") => builder.is_habit = true,
        "DURATION" | "EFFORT" => builder.duration_minutes = parse_minutes(value),
        "SKIPPABLE" => {
            builder.skippable = matches!(value.to_ascii_lowercase().as_str(), "t" | "true" | "yes")
        }
        _ => {}
    }
}

fn heading_title(line: &str) -> String {
    let title = line.trim_start_matches('*').trim();
    match title.split_once(' ') {
        Some((keyword, rest)) if TODO_KEYWORDS.contains(&keyword) => rest.trim().to_string(),
        _ => title.to_string(),
    }
}

struct ScheduledInfo {
    date: NaiveDate,
    time: Option<NaiveTime>,
    repeater: Option<HabitRepeater>,
}

fn parse_scheduled(line: &str) -> Option<ScheduledInfo> {
    let rest = line.trim_start_matches("SCHEDULED:").trim();
    let bracket = rest.strip_prefix('<')?;
    let bracket = &bracket[..bracket.find('>')?];
    let mut parts = bracket.split_whitespace();
    let date = NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
    let mut time = None;
    let mut repeater = None;
    for part in parts {
        if part.starts_with('+') || part.starts_with('.') {
            repeater = Some(HabitRepeater::from_token(part));
        } else if part.as_bytes().first().is_some_and(u8::is_ascii_digit) {
            // `09:00` or a range like `09:00-09:30`.
            let start = part.split('-').next().unwrap_or(part);
            time = NaiveTime::parse_from_str(start, "%H:%M").ok();
        }
    }
    Some(ScheduledInfo {
        date,
        time,
        repeater,
    })
}

/// Minutes from `30` or an org effort value such as `1:15`.
fn parse_minutes(value: &str) -> Option<u32> {
    match value.split_once(':') {
        Some((hours, minutes)) => {
            let hours: u32 = hours.trim().parse().ok()?;
            let minutes: u32 = minutes.trim().parse().ok()?;
            hours.checked_mul(60)?.checked_add(minutes)
        }
        None => value.trim_end_matches("min").trim().parse().ok(),
    }
}

fn parse_frequency(token: &str) -> Option<HabitFrequency> {
    let normalized = token.trim_start_matches(|c: char| c == '+' || c == '.');
    // `.+1d/3d` habit ranges: only the lower bound matters here.
    let normalized = normalized.split('/').next().unwrap_or(normalized);
    if normalized.is_empty() {
        return None;
    }
    let unit = normalized.chars().last()?;
    let value_part = &normalized[..normalized.len() - unit.len_utf8()];
    let quantity: u32 = value_part.parse().ok()?;
    match unit {
        'd' | 'D' => Some(HabitFrequency::Daily(quantity.max(1))),
        'w' | 'W' => Some(HabitFrequency::Weekly(quantity.max(1))),
        'm' | 'M' => Some(HabitFrequency::Monthly(quantity.max(1))),
        'y' | 'Y' => Some(HabitFrequency::Yearly(quantity.max(1))),
        _ => None,
    }
}

fn slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
