//! End-to-end integration tests for the report pipeline.
//!
//! Tests the full flow: rules file → log parsing → categorized report,
//! including the soft-error batch that must fail the run.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

fn daylog_binary() -> String {
    env!("CARGO_BIN_EXE_daylog").to_string()
}

const RULES: &str = "\
[general]
name = test
mode = count

[counters]
.*v\u{e9}lo.* = 1 = V\u{e9}lo

[rules]
Travail.* = Travail
Guitare = 50% Musique 50% Loisir
Divers.* = Divers
";

const LOG: &str = "\
2021-06-01
0900 Travail
1100 Guitare
1200 Divers v\u{e9}lo
1300 Travail encore
1800 Zzz
";

fn write_fixtures(temp: &Path) {
    std::fs::write(temp.join("rules.grc"), RULES).expect("write rules");
    std::fs::write(temp.join("journal.log"), LOG).expect("write log");
}

fn run_daylog(temp: &Path, args: &[&str]) -> std::process::Output {
    Command::new(daylog_binary())
        .env("HOME", temp)
        .current_dir(temp)
        .args(args)
        .output()
        .expect("failed to run daylog")
}

#[test]
fn report_prints_category_totals() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());

    let output = run_daylog(
        temp.path(),
        &["report", "-r", "rules.grc", "journal.log"],
    );
    assert!(
        output.status.success(),
        "report should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    // 2021-06-01 is a Tuesday.
    assert!(stdout.contains("Total days : 1 (1 work + 0 holidays)"));
    // Travail 09:00-11:00 plus 13:00-18:00 = 7 h.
    assert!(stdout.contains("Travail"));
    assert!(stdout.contains("07:00"));
    // The weighted split shows up under both categories, 1 h at 50% each.
    assert!(stdout.contains("Musique"));
    assert!(stdout.contains("Loisir"));
    assert!(stdout.contains("00:30"));
}

#[test]
fn report_includes_counter_listings() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());

    let output = run_daylog(
        temp.path(),
        &["report", "-r", "rules.grc", "journal.log"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);

    // One matching line at 12:00, closed by the next at 13:00.
    assert!(stdout.contains("Counters by"));
    assert!(stdout.contains("V\u{e9}lo"));
    assert!(stdout.contains("01:00"));
}

#[test]
fn unknown_labels_fail_after_reporting_all_of_them() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());
    std::fs::write(
        temp.path().join("journal.log"),
        "2021-06-01\n0900 Mystère (a?)\n1000 Autre mystère\n1800 Zzz\n",
    )
    .expect("write log");

    let output = run_daylog(
        temp.path(),
        &["report", "-r", "rules.grc", "journal.log"],
    );
    assert!(!output.status.success(), "soft errors must fail the run");
    let stdout = String::from_utf8_lossy(&output.stdout);

    // Both offending labels surface in one run.
    assert!(stdout.contains("Mystère (a?)"));
    assert!(stdout.contains("Autre mystère"));
    // The suggestion escapes regex metacharacters.
    assert!(stdout.contains(r"\("));
    // No report after errors.
    assert!(!stdout.contains("Total days"));
}

#[test]
fn json_report_is_machine_readable() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());

    let output = run_daylog(
        temp.path(),
        &["report", "--json", "-r", "rules.grc", "journal.log"],
    );
    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON report");

    assert_eq!(report["name"], "test");
    assert_eq!(report["mode"], "count");
    assert_eq!(report["totals"]["work_days"], 1);
    let travail = &report["totals"]["times"]["Travail"];
    assert!((travail["weekday"].as_f64().unwrap() - 420.0).abs() < 1e-9);
}

#[test]
fn collapse_override_merges_categories() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());

    let output = run_daylog(
        temp.path(),
        &[
            "report",
            "-r",
            "rules.grc",
            "-s",
            "Musique = Loisir",
            "journal.log",
        ],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Musique rolled up into Loisir; only the target remains in the table.
    assert!(stdout.contains("Loisir"));
    assert!(!stdout.contains("Musique :"));
}

#[test]
fn count_command_totals_matching_activities() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());

    let output = run_daylog(
        temp.path(),
        &["count", "travail", "-r", "rules.grc", "journal.log"],
    );
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Total : 2 times over 1 days and 07:00"));
}

#[test]
fn sleep_command_emits_tab_separated_periods() {
    let temp = TempDir::new().unwrap();
    write_fixtures(temp.path());
    // A full Monday-to-Sunday week plus surrounding days.
    let mut log = String::new();
    for d in 6..=15 {
        log.push_str(&format!("2021-06-{d:02}\n0700 Travail\n2300 Zzz\n"));
    }
    std::fs::write(temp.path().join("journal.log"), log).expect("write log");

    let output = run_daylog(
        temp.path(),
        &["sleep", "-l", "7", "-r", "rules.grc", "journal.log"],
    );
    assert!(
        output.status.success(),
        "sleep should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(stderr.contains("latest sleep hour 23:00"));
    // One averaged record for the retained week, starting on the Monday.
    assert_eq!(stdout.lines().count(), 1);
    let line = stdout.lines().next().unwrap();
    let fields: Vec<&str> = line.split('\t').collect();
    assert_eq!(fields[0], "2021-06-07");
    assert_eq!(fields[1], "1380");
    assert_eq!(fields[2], "8");
}

#[test]
fn missing_rules_file_is_a_clear_error() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("journal.log"), LOG).expect("write log");

    let output = run_daylog(temp.path(), &["report", "-r", "nope", "journal.log"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope"));
}
