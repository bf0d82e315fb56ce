use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::types::Schedule;

/// Parse an IANA timezone name, defaulting to UTC for an empty or unknown
/// value rather than failing the whole schedule computation.
fn resolve_tz(tz: &str) -> Tz {
    tz.parse().unwrap_or(chrono_tz::UTC)
}

/// Compute the next UTC execution time for `schedule` starting *after* `from`,
/// evaluating wall-clock fields (`Daily`/`Weekly`/`Cron`) in `tz` per spec
/// §4.5 ("evaluation honours a per-job timezone"). `Once`/`Interval` are
/// absolute-instant schedules and ignore `tz`.
///
/// Returns `None` when the schedule is exhausted (e.g. a `Once` job whose
/// time has already passed) or malformed (e.g. an unparseable cron expression).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>, tz: &str) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            // Fire only if the instant is still in the future.
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => Some(from + Duration::seconds(*every_secs as i64)),

        Schedule::Daily { hour, minute } => {
            let zone = resolve_tz(tz);
            let local_from = from.with_timezone(&zone);
            let candidate = zone
                .with_ymd_and_hms(
                    local_from.year(),
                    local_from.month(),
                    local_from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            let candidate = if candidate > local_from {
                candidate
            } else {
                candidate + Duration::days(1)
            };
            Some(candidate.with_timezone(&Utc))
        }

        Schedule::Weekly { day, hour, minute } => {
            let zone = resolve_tz(tz);
            let local_from = from.with_timezone(&zone);
            // `day` follows ISO weekday numbering: 0=Monday … 6=Sunday,
            // which matches chrono's `num_days_from_monday`.
            let today_dow = local_from.weekday().num_days_from_monday() as i64;
            let target_dow = (*day as i64).clamp(0, 6);
            let mut days_ahead = target_dow - today_dow;

            // Normalise: negative means the target day already passed this week.
            let candidate_day = if days_ahead < 0 {
                local_from + Duration::days(7 + days_ahead)
            } else {
                local_from + Duration::days(days_ahead)
            };

            let candidate = zone
                .with_ymd_and_hms(
                    candidate_day.year(),
                    candidate_day.month(),
                    candidate_day.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;

            let candidate = if candidate > local_from {
                candidate
            } else {
                // The time on the target weekday has already passed — push 7 days.
                days_ahead = if days_ahead <= 0 { 7 } else { 7 - days_ahead };
                candidate + Duration::days(days_ahead)
            };
            Some(candidate.with_timezone(&Utc))
        }

        Schedule::Cron { expression } => {
            let zone = resolve_tz(tz);
            let local_from = from.with_timezone(&zone);
            let next_local = next_cron_run(expression, local_from)?;
            Some(next_local.with_timezone(&Utc))
        }
    }
}

/// One field of a 5-field cron expression, expanded to the concrete values it matches.
struct CronField {
    values: Vec<u32>,
}

impl CronField {
    fn parse(field: &str, min: u32, max: u32) -> Option<Self> {
        let mut values = Vec::new();
        for part in field.split(',') {
            let (range_part, step) = match part.split_once('/') {
                Some((r, s)) => (r, s.parse::<u32>().ok()?),
                None => (part, 1),
            };
            if step == 0 {
                return None;
            }
            let (lo, hi) = if range_part == "*" {
                (min, max)
            } else if let Some((a, b)) = range_part.split_once('-') {
                (a.parse::<u32>().ok()?, b.parse::<u32>().ok()?)
            } else {
                let v = range_part.parse::<u32>().ok()?;
                (v, v)
            };
            if lo > hi || hi > max || lo < min {
                return None;
            }
            let mut v = lo;
            while v <= hi {
                values.push(v);
                v += step;
            }
        }
        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            None
        } else {
            Some(Self { values })
        }
    }

    fn matches(&self, v: u32) -> bool {
        self.values.contains(&v)
    }
}

/// Standard 5-field cron: `minute hour day-of-month month day-of-week`.
///
/// Supports `*`, single values, ranges (`a-b`), comma lists, and `*/N` or
/// `a-b/N` steps — no named months/weekdays and no `L`/`W`/`#` extensions.
/// Scans forward minute by minute, capped at two years out, so an
/// unsatisfiable expression degrades to `None` rather than looping forever.
fn next_cron_run<Z: TimeZone>(expr: &str, from: DateTime<Z>) -> Option<DateTime<Z>> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }
    let minute = CronField::parse(fields[0], 0, 59)?;
    let hour = CronField::parse(fields[1], 0, 23)?;
    let dom = CronField::parse(fields[2], 1, 31)?;
    let month = CronField::parse(fields[3], 1, 12)?;
    // chrono's Monday=0 .. Sunday=6; cron's Sunday=0 .. Saturday=6 (7 also accepted as Sunday).
    let dow_field = fields[4].replace('7', "0");
    let dow = CronField::parse(&dow_field, 0, 6)?;

    let mut candidate = (from.clone() + Duration::minutes(1))
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))?;
    let limit = from + Duration::days(365 * 2);

    while candidate < limit {
        let cron_dow = candidate.weekday().num_days_from_sunday();
        if month.matches(candidate.month())
            && dom.matches(candidate.day())
            && dow.matches(cron_dow)
            && hour.matches(candidate.hour())
            && minute.matches(candidate.minute())
        {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    #[test]
    fn cron_every_minute() {
        let from = at(2026, 1, 1, 10, 30);
        let next = next_cron_run("* * * * *", from).unwrap();
        assert_eq!(next, at(2026, 1, 1, 10, 31));
    }

    #[test]
    fn cron_daily_at_hour() {
        let from = at(2026, 1, 1, 10, 30);
        let next = next_cron_run("0 9 * * *", from).unwrap();
        assert_eq!(next, at(2026, 1, 2, 9, 0));
    }

    #[test]
    fn cron_step_minutes() {
        let from = at(2026, 1, 1, 10, 31);
        let next = next_cron_run("*/15 * * * *", from).unwrap();
        assert_eq!(next, at(2026, 1, 1, 10, 45));
    }

    #[test]
    fn cron_weekday_only() {
        // 2026-01-03 is a Saturday; next weekday 9am should be Monday 2026-01-05.
        let from = at(2026, 1, 3, 10, 0);
        let next = next_cron_run("0 9 * * 1-5", from).unwrap();
        assert_eq!(next, at(2026, 1, 5, 9, 0));
    }

    #[test]
    fn cron_malformed_expression_returns_none() {
        assert!(next_cron_run("not a cron", at(2026, 1, 1, 0, 0)).is_none());
        assert!(next_cron_run("60 * * * *", at(2026, 1, 1, 0, 0)).is_none());
    }

    #[test]
    fn daily_rolls_to_tomorrow_once_past() {
        let schedule = Schedule::Daily { hour: 9, minute: 0 };
        let from = at(2026, 1, 1, 10, 0);
        assert_eq!(compute_next_run(&schedule, from, "UTC"), Some(at(2026, 1, 2, 9, 0)));
    }

    #[test]
    fn once_in_the_past_never_fires() {
        let schedule = Schedule::Once { at: at(2020, 1, 1, 0, 0) };
        assert_eq!(compute_next_run(&schedule, at(2026, 1, 1, 0, 0), "UTC"), None);
    }

    #[test]
    fn daily_honours_job_timezone() {
        // 09:00 Asia/Seoul (UTC+9) is 00:00 UTC the same day.
        let schedule = Schedule::Daily { hour: 9, minute: 0 };
        let from = at(2026, 1, 1, 20, 0); // 05:00 KST on Jan 2
        let next = compute_next_run(&schedule, from, "Asia/Seoul").unwrap();
        assert_eq!(next, at(2026, 1, 2, 0, 0));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        let schedule = Schedule::Daily { hour: 9, minute: 0 };
        let from = at(2026, 1, 1, 10, 0);
        assert_eq!(
            compute_next_run(&schedule, from, "Not/AZone"),
            Some(at(2026, 1, 2, 9, 0))
        );
    }
}
