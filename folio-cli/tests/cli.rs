use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

const BOOK: &str = "# The Storm\n\nAuthor: Jane Doe\n\n## Arrival\n\nThe storm came in fast over the hills.\n\n## Departure\n\nShe ran home through the rain.\n";

struct Fixture {
    dir: TempDir,
    book: PathBuf,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let book = dir.path().join("storm.txt");
    fs::write(&book, BOOK).unwrap();
    Fixture { dir, book }
}

fn folio(fixture: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg(&fixture.book)
        .arg("--data-dir")
        .arg(fixture.dir.path().join("data"))
        .arg("--config")
        .arg(fixture.dir.path().join("missing.toml"));
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn info_reports_metadata() {
    let fixture = fixture();
    let out = stdout_of(folio(&fixture).arg("info"));
    assert!(out.contains("Title: The Storm"), "{out}");
    assert!(out.contains("Author: Jane Doe"), "{out}");
    assert!(out.contains("Chapters: 3"), "{out}");
    assert!(out.contains("Reading time: 1 min"), "{out}");
}

#[test]
fn toc_lists_chapters_in_order() {
    let fixture = fixture();
    let out = stdout_of(folio(&fixture).arg("toc"));
    let arrival = out.find("Arrival").expect("arrival listed");
    let departure = out.find("Departure").expect("departure listed");
    assert!(arrival < departure);
    assert!(out.lines().next().unwrap().trim_start().starts_with('1'));
}

#[test]
fn page_prints_raw_or_formatted_text() {
    let fixture = fixture();
    let raw = stdout_of(folio(&fixture).args(["page", "1"]));
    assert!(raw.starts_with("# The Storm"), "{raw}");

    let html = stdout_of(folio(&fixture).args(["page", "1", "--html"]));
    assert!(html.starts_with("<h1>The Storm</h1>"), "{html}");
}

#[test]
fn page_out_of_range_fails() {
    let fixture = fixture();
    let output = folio(&fixture).args(["page", "99"]).assert().failure();
    let stderr = String::from_utf8(output.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("out of range"), "{stderr}");
}

#[test]
fn search_lists_matching_pages() {
    let fixture = fixture();
    let out = stdout_of(folio(&fixture).args(["search", "RAIN"]));
    assert!(out.contains("rain"), "{out}");

    let none = stdout_of(folio(&fixture).args(["search", "zebra"]));
    assert_eq!(none.trim(), "no matches");
}

#[test]
fn invalid_config_is_reported() {
    let fixture = fixture();
    let config = fixture.dir.path().join("bad.toml");
    fs::write(&config, "reading_speed_wpm = \"fast\"").unwrap();
    let output = Command::cargo_bin("folio")
        .unwrap()
        .arg(&fixture.book)
        .arg("--data-dir")
        .arg(fixture.dir.path().join("data"))
        .arg("--config")
        .arg(&config)
        .arg("info")
        .assert()
        .failure();
    let stderr = String::from_utf8(output.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("invalid config file"), "{stderr}");
}

#[test]
fn out_of_range_settings_are_clamped_not_rejected() {
    let fixture = fixture();
    let config = fixture.dir.path().join("wild.toml");
    fs::write(
        &config,
        "[settings]\nfontSizeLevel = 300\nmarginLevel = -1\ntheme = \"neon\"\n",
    )
    .unwrap();
    let mut cmd = Command::cargo_bin("folio").unwrap();
    cmd.arg(&fixture.book)
        .arg("--data-dir")
        .arg(fixture.dir.path().join("data"))
        .arg("--config")
        .arg(&config)
        .args(["--font-size", "300", "--margin", "-1", "info"]);
    let out = stdout_of(&mut cmd);
    assert!(out.contains("Title: The Storm"), "{out}");
}
