//! Per-day task counts over a period, laid out the way the calendar view prints them.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use std::collections::HashMap;

use crate::database::{Database, DatabaseError};
use crate::models::TimePeriod;
use crate::period;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub is_today: bool,
    /// Tasks created on this day, any period
    pub tasks: usize,
    pub completed: usize,
}

/// One month of a calendar, as rows of seven cells starting on the configured week day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[Option<CalendarDay>; 7]>,
}

/// Every day of `period` around `now` with the tasks created on it
pub fn days_in_period<Tz: TimeZone>(
    db: &Database,
    period: TimePeriod,
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> Result<Vec<CalendarDay>, DatabaseError>
where
    Tz::Offset: std::fmt::Display,
{
    let today = now.date_naive();
    let (start, end) = period::period_dates(period, today, week_start);

    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for task in db.get_all_tasks()? {
        let Some(key) = utils::date_key_of_millis(task.created_at, now) else {
            continue;
        };
        let entry = counts.entry(key).or_default();
        entry.0 += 1;
        if task.is_completed {
            entry.1 += 1;
        }
    }

    Ok(start
        .iter_days()
        .take_while(|date| *date < end)
        .map(|date| {
            let (tasks, completed) = counts
                .get(&date.format(utils::DATE_KEY_FORMAT).to_string())
                .copied()
                .unwrap_or_default();
            CalendarDay {
                date,
                is_today: date == today,
                tasks,
                completed,
            }
        })
        .collect())
}

fn column(date: NaiveDate, week_start: Weekday) -> usize {
    let offset = (date.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    offset as usize
}

/// Group consecutive days by month; leading and trailing cells of each month are empty
pub fn month_grids(days: &[CalendarDay], week_start: Weekday) -> Vec<MonthGrid> {
    let mut grids: Vec<MonthGrid> = Vec::new();
    for day in days {
        let (year, month) = (day.date.year(), day.date.month());
        let col = column(day.date, week_start);
        let starts_month = grids.last().is_none_or(|g| (g.year, g.month) != (year, month));
        if starts_month {
            grids.push(MonthGrid {
                year,
                month,
                weeks: vec![[None; 7]],
            });
        }
        let Some(grid) = grids.last_mut() else {
            continue;
        };
        if col == 0 && !starts_month {
            grid.weeks.push([None; 7]);
        }
        if let Some(week) = grid.weeks.last_mut() {
            week[col] = Some(*day);
        }
    }
    grids
}

/// Seven weekday names beginning at `week_start`
pub fn weekday_names(week_start: Weekday) -> [Weekday; 7] {
    let mut names = [week_start; 7];
    for i in 1..7 {
        names[i] = names[i - 1].succ();
    }
    names
}

fn cell(day: &Option<CalendarDay>) -> String {
    match day {
        None => " ".repeat(7),
        Some(day) => {
            let marker = if day.is_today { '>' } else { ' ' };
            let count = if day.tasks > 0 { format!("({})", day.tasks) } else { String::new() };
            format!("{}{:>2}{:<4}", marker, day.date.day(), count)
        }
    }
}

/// Text lines for one month: title, weekday header, then one line per week
pub fn format_month(grid: &MonthGrid, week_start: Weekday) -> Vec<String> {
    let title = NaiveDate::from_ymd_opt(grid.year, grid.month, 1)
        .map(|d| d.format("%B %Y").to_string())
        .unwrap_or_default();
    let header: String = weekday_names(week_start)
        .iter()
        .map(|w| format!(" {:<6}", w.to_string()))
        .collect();

    let mut lines = vec![title, header.trim_end().to_string()];
    for week in &grid.weeks {
        let row: String = week.iter().map(cell).collect();
        lines.push(row.trim_end().to_string());
    }
    lines
}

/// One line per day, for periods short enough to list
pub fn format_day(day: &CalendarDay) -> String {
    let mut line = format!(
        "{} {}",
        if day.is_today { '>' } else { ' ' },
        day.date.format("%a %d %b")
    );
    match day.tasks {
        0 => line.push_str("  -"),
        n => line.push_str(&format!("  {} task(s), {} done", n, day.completed)),
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use chrono::Utc;

    // 2026-10-19 is a Monday
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap()
    }

    fn task_on(db: &Database, day: u32, done: bool) {
        let created = Utc.with_ymd_and_hms(2026, 10, day, 8, 0, 0).unwrap().timestamp_millis();
        let mut task = Task::new("t".into(), String::new(), TimePeriod::ThisMonth, created);
        task.is_completed = done;
        db.save_task(&task).unwrap();
    }

    #[test]
    fn week_counts_tasks_per_creation_day() {
        let db = Database::in_memory().unwrap();
        task_on(&db, 19, true);
        task_on(&db, 19, false);
        task_on(&db, 21, false);
        task_on(&db, 1, false);

        let days = days_in_period(&db, TimePeriod::ThisWeek, &now(), Weekday::Sat).unwrap();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        let monday = days[2];
        assert!(monday.is_today);
        assert_eq!((monday.tasks, monday.completed), (2, 1));
        assert_eq!(days[4].tasks, 1);
        assert_eq!(days.iter().map(|d| d.tasks).sum::<usize>(), 3);
        assert_eq!(format_day(&monday), "> Mon 19 Oct  2 task(s), 1 done");
        assert_eq!(format_day(&days[0]), "  Sat 17 Oct  -");
    }

    #[test]
    fn month_grid_pads_to_the_week_start() {
        let db = Database::in_memory().unwrap();
        task_on(&db, 1, false);
        let days = days_in_period(&db, TimePeriod::ThisMonth, &now(), Weekday::Mon).unwrap();
        assert_eq!(days.len(), 31);

        let grids = month_grids(&days, Weekday::Mon);
        assert_eq!(grids.len(), 1);
        let weeks = &grids[0].weeks;
        // 1 October 2026 is a Thursday
        assert!(weeks[0][..3].iter().all(Option::is_none));
        assert_eq!(weeks[0][3].map(|d| d.date.day()), Some(1));
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[4][5].map(|d| d.date.day()), Some(31));

        let lines = format_month(&grids[0], Weekday::Mon);
        assert_eq!(lines[0], "October 2026");
        assert_eq!(lines[1], " Mon    Tue    Wed    Thu    Fri    Sat    Sun");
        assert!(lines[2].ends_with(" 1(1)   2      3      4"));
    }

    #[test]
    fn season_and_year_split_into_months() {
        let db = Database::in_memory().unwrap();
        let season = days_in_period(&db, TimePeriod::ThisSeason, &now(), Weekday::Sat).unwrap();
        let months: Vec<u32> = month_grids(&season, Weekday::Sat).iter().map(|g| g.month).collect();
        assert_eq!(months, vec![9, 10, 11]);

        let winter = Utc.with_ymd_and_hms(2027, 1, 5, 9, 0, 0).unwrap();
        let days = days_in_period(&db, TimePeriod::ThisSeason, &winter, Weekday::Sat).unwrap();
        let grids = month_grids(&days, Weekday::Sat);
        assert_eq!(grids.iter().map(|g| (g.year, g.month)).collect::<Vec<_>>(), vec![(2026, 12), (2027, 1), (2027, 2)]);

        let year = days_in_period(&db, TimePeriod::ThisYear, &now(), Weekday::Sat).unwrap();
        assert_eq!(year.len(), 365);
        assert_eq!(month_grids(&year, Weekday::Sat).len(), 12);
    }

    #[test]
    fn weekday_names_wrap_around() {
        let names = weekday_names(Weekday::Sat);
        assert_eq!(names[0], Weekday::Sat);
        assert_eq!(names[1], Weekday::Sun);
        assert_eq!(names[6], Weekday::Fri);
    }
}
