use std::io::{BufRead, Write};

use anyhow::Result;

use crate::config::CityCatalog;
use crate::data::loader::load_data;
use crate::data::model::TripTable;
use crate::prompt::Console;
use crate::report::{self, Report};
use crate::stats;
use crate::viewer::RawPager;

/// Drives filter collection → load → reports → raw viewer, then offers a
/// restart.  Each pass starts from scratch.
pub struct Session<'a> {
    catalog: &'a CityCatalog,
    page_size: usize,
}

impl<'a> Session<'a> {
    pub fn new(catalog: &'a CityCatalog, page_size: usize) -> Self {
        Session { catalog, page_size }
    }

    pub fn run<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<()> {
        let mut pass = 0usize;
        loop {
            pass += 1;
            self.run_once(console)?;
            if !console.confirm("\nWould you like to restart? (yes/no): ")? {
                log::info!("Finished after {pass} session(s)");
                console.say("Thank you 🌟")?;
                return Ok(());
            }
        }
    }

    fn run_once<R: BufRead, W: Write>(&self, console: &mut Console<R, W>) -> Result<()> {
        let selection = console.collect_selection()?;
        log::info!("Selected {selection}");

        let path = self.catalog.path_for(selection.city);
        let table = load_data(&path, &selection)?;
        if table.is_empty() {
            log::warn!("No trips match {selection}");
        }

        for report in reports(&table) {
            console.say(&report.render()?)?;
        }
        self.view_raw(console, &table)
    }

    fn view_raw<R: BufRead, W: Write>(
        &self,
        console: &mut Console<R, W>,
        table: &TripTable,
    ) -> Result<()> {
        let prompt = format!(
            "\nWould you like to view {} rows of raw data? (yes/no): ",
            self.page_size
        );
        let mut pager = RawPager::new(table, self.page_size);
        while console.confirm(&prompt)? {
            let page = pager.next_page();
            if page.is_empty() {
                console.say("No more rows to display.")?;
            } else {
                console.say(&report::render_rows(table, page)?)?;
            }
        }
        log::debug!("Raw viewer stopped at row {}", pager.cursor());
        Ok(())
    }
}

/// Time, station, trip-duration and user reports, in display order.
pub fn reports(table: &TripTable) -> [Report; 4] {
    [
        report::time_report(&stats::time_stats(table)),
        report::station_report(&stats::station_stats(table)),
        report::duration_report(&stats::duration_stats(table)),
        report::user_report(&stats::user_stats(table)),
    ]
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::report::NOT_AVAILABLE;

    const CHICAGO_CSV: &str = "\
,Start Time,End Time,Trip Duration,Start Station,End Station,User Type,Gender,Birth Year
1,2017-06-05 08:00:00,2017-06-05 08:10:00,600,Canal St & Adams St,Clinton St & Madison St,Subscriber,Male,1985.0
2,2017-06-06 08:30:00,2017-06-06 08:40:00,600,Canal St & Adams St,Clinton St & Madison St,Subscriber,Female,1990.0
3,2017-06-07 17:00:00,2017-06-07 17:20:00,1200,Streeter Dr & Grand Ave,Lake Shore Dr & Monroe St,Customer,,
4,2017-06-08 08:05:00,2017-06-08 08:15:00,600,Canal St & Adams St,Clinton St & Madison St,Subscriber,Male,1985.0
5,2017-06-09 12:00:00,2017-06-09 12:30:00,1800,Streeter Dr & Grand Ave,Streeter Dr & Grand Ave,Customer,,
6,2017-06-10 09:00:00,2017-06-10 09:05:00,300,Canal St & Adams St,Clinton St & Madison St,Subscriber,Male,1971.0
7,2017-03-02 08:00:00,2017-03-02 08:10:00,600,Canal St & Adams St,Wells St & Concord Ln,Subscriber,Female,1999.0
";

    const WASHINGTON_CSV: &str = "\
,Start Time,End Time,Trip Duration,Start Station,End Station,User Type
1,2017-06-21 08:36:34,2017-06-21 08:44:43,489.066,14th & Belmont St NW,15th & K St NW,Subscriber
2,2017-03-11 10:40:00,2017-03-11 10:46:00,402.549,Yuma St & Tenley Circle NW,Connecticut Ave & Yuma St NW,Customer
";

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chicago.csv"), CHICAGO_CSV).unwrap();
        std::fs::write(dir.path().join("washington.csv"), WASHINGTON_CSV).unwrap();
        dir
    }

    fn run(dir: &tempfile::TempDir, script: &str) -> (Result<()>, String) {
        let catalog = CityCatalog::builtin(dir.path());
        let session = Session::new(&catalog, 5);
        let mut console = Console::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        let result = session.run(&mut console);
        (result, String::from_utf8(console.into_output()).unwrap())
    }

    #[test]
    fn june_filter_reports_june_everywhere() {
        let dir = fixture_dir();
        let catalog = CityCatalog::builtin(dir.path());
        let selection = crate::data::filter::Selection {
            city: crate::data::filter::City::Chicago,
            month: "june".parse().unwrap(),
            day: "all".parse().unwrap(),
        };
        let table = load_data(&catalog.path_for(selection.city), &selection).unwrap();
        assert_eq!(table.len(), 6);

        let [time, station, duration, users] = reports(&table);
        assert_eq!(time.get("Most common month"), Some("June"));
        assert_eq!(time.get("Most common hour"), Some("8"));
        assert_eq!(station.get("Most common start station"), Some("Canal St & Adams St"));
        assert_eq!(
            station.get("Most common trip"),
            Some("Canal St & Adams St → Clinton St & Madison St")
        );
        assert_eq!(duration.get("Total duration (seconds)"), Some("5100"));
        assert_eq!(duration.get("Average duration (seconds)"), Some("850.00"));
        assert_eq!(users.get("Number of Subscriber"), Some("4"));
        assert_eq!(users.get("Number of Customer"), Some("2"));
        assert_eq!(users.get("Number of Male"), Some("3"));
        assert_eq!(users.get("Earliest birth year"), Some("1971"));
        assert_eq!(users.get("Most recent birth year"), Some("1990"));
        assert_eq!(users.get("Most common birth year"), Some("1985"));
    }

    #[test]
    fn full_session_then_decline_restart() {
        let dir = fixture_dir();
        let (result, out) = run(&dir, "Chicago\njune\nall\nno\nno\n");
        result.unwrap();
        assert!(out.contains("📊 Time Statistics:"));
        assert!(out.contains("📍 Station Statistics:"));
        assert!(out.contains("⏱ Trip Duration Statistics:"));
        assert!(out.contains("🧑‍💼 User Statistics:"));
        assert!(out.contains("| Most common month "));
        assert!(out.ends_with("Thank you 🌟\n"));
    }

    #[test]
    fn washington_reports_missing_demographics() {
        let dir = fixture_dir();
        let (result, out) = run(&dir, "washington\nall\nall\nno\nno\n");
        result.unwrap();
        assert_eq!(out.matches(NOT_AVAILABLE).count(), 2);
    }

    #[test]
    fn washington_demographics_unavailable_under_any_filter() {
        let dir = fixture_dir();
        for script in [
            "washington\njune\nall\nno\nno\n",
            "washington\nall\nsaturday\nno\nno\n",
            // Nothing matches: the time rows say "No data", demographics
            // still say "Not available".
            "washington\nmay\nall\nno\nno\n",
        ] {
            let (result, out) = run(&dir, script);
            result.unwrap();
            assert_eq!(out.matches(NOT_AVAILABLE).count(), 2, "{script:?}");
        }

        let (_, out) = run(&dir, "washington\nmay\nall\nno\nno\n");
        assert!(out.contains(report::NO_DATA));
        assert!(!out.contains("Number of"));
    }

    #[test]
    fn raw_viewer_pages_then_stops() {
        let dir = fixture_dir();
        let (result, out) = run(&dir, "chicago\nall\nall\nyes\nyes\nyes\nno\nno\n");
        result.unwrap();
        // 7 rows: a full page, a two-row page, then nothing left.
        assert!(out.contains("2017-06-05 08:00:00"));
        assert!(out.contains("2017-03-02 08:00:00"));
        assert_eq!(out.matches("No more rows to display.").count(), 1);
        assert_eq!(out.matches("rows of raw data?").count(), 4);
    }

    #[test]
    fn restart_runs_a_fresh_session() {
        let dir = fixture_dir();
        let (result, out) = run(
            &dir,
            "washington\nall\nall\nyes\nno\nyes\nchicago\nmarch\nthursday\nyes\nno\nno\n",
        );
        result.unwrap();
        assert_eq!(out.matches("Welcome to the Bike Data Analysis Project!").count(), 2);
        // The second session's pager starts over at the first matching row.
        assert!(out.contains("2017-03-02 08:00:00"));
        assert_eq!(out.matches("Thank you").count(), 1);
    }

    #[test]
    fn empty_selection_reports_no_data() {
        let dir = fixture_dir();
        let (result, out) = run(&dir, "chicago\nmay\nall\nyes\nno\nno\n");
        result.unwrap();
        assert!(out.contains(report::NO_DATA));
        assert!(out.contains("No more rows to display."));
    }

    #[test]
    fn missing_city_file_is_fatal() {
        let dir = fixture_dir();
        let (result, _) = run(&dir, "new york\nall\nall\n");
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("new_york_city.csv"));
    }
}
