use std::thread;

use chrono::{Datelike, NaiveDate};
use ftp_listing::{parse_listing, Condition, InterpretationContext, ServerTypeSet};
use slog::{o, Discard, Logger};

const LISTING: &str = "\
total 8
-rw-r--r--  1 ftp ftp  100 Jun 15 12:00 a.txt
-rw-r--r--  1 ftp ftp  200 Jun 15 12:00 b.txt
";

#[test]
fn one_rule_set_serves_many_interpretations() {
    let set = ServerTypeSet::stock().unwrap();
    let unix = &set.get("UNIX1").unwrap().rules;
    let logger = Logger::root(Discard, o!());

    // each thread reads the same listing with its own notion of today
    let years: Vec<i32> = thread::scope(|s| {
        let handles: Vec<_> = [(2024, 7, 1), (2024, 6, 1), (2030, 1, 1), (2024, 6, 15)]
            .into_iter()
            .map(|(y, m, d)| {
                let logger = logger.new(o!("today" => format!("{}-{}-{}", y, m, d)));
                s.spawn(move || {
                    let today = NaiveDate::from_ymd_opt(y, m, d).unwrap();
                    let records =
                        parse_listing(&logger, unix, LISTING, InterpretationContext::new(today))
                            .unwrap();
                    assert_eq!(records.len(), 2);
                    records[0].modified.unwrap().year()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(years, [2024, 2023, 2029, 2024]);
}

#[test]
fn conditions_are_shared_between_threads() {
    let condition = Condition::compile(
        "reg_exp_in_syst(\"unix|linux\") and not welcome_contains(\"windows\")",
    )
    .unwrap();
    let inputs = [
        ("220 ProFTPD", "215 UNIX Type: L8", true),
        ("220 Microsoft FTP Service (Windows)", "215 UNIX", false),
        ("220 vsftpd", "215 Linux", true),
        ("220 ready", "215 Windows_NT", false),
    ];
    thread::scope(|s| {
        for (welcome, syst, expected) in inputs {
            let condition = &condition;
            s.spawn(move || assert_eq!(condition.evaluate(welcome, syst), expected));
        }
    });
}
