use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new(prefix: &str) -> Self {
        let mut dir = std::env::temp_dir();
        let unique = format!(
            "{prefix}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );
        dir.push(unique);
        fs::create_dir_all(&dir).expect("create temp dir");
        Self { path: dir }
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, contents).expect("write file");
}

fn evergreen(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_evergreen"))
        .current_dir(dir)
        .env_remove("EVERGREEN_LOG")
        .args(args)
        .output()
        .expect("run evergreen")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn reports_without_touching_files() {
    let tmp = TempDir::new("evergreen-report");
    let page = tmp.path.join("site/index.html");
    let html = "<html><body><p>What a crazy day.</p></body></html>";
    write_file(&page, html);
    write_file(&tmp.path.join("site/notes.txt"), "crazy");

    let output = evergreen(&tmp.path, &["site"]);
    assert!(output.status.success(), "{output:?}");
    let text = stdout(&output);
    assert!(text.contains("site/index.html"), "{text}");
    assert!(text.contains("1 files, 1 replacements found"), "{text}");
    assert_eq!(fs::read_to_string(&page).unwrap(), html);
}

#[test]
fn write_rewrites_in_place_and_is_stable() {
    let tmp = TempDir::new("evergreen-write");
    let page = tmp.path.join("page.htm");
    write_file(&page, "<p>Hey guys, that was lame.</p>");

    let output = evergreen(&tmp.path, &["--write", "page.htm"]);
    assert!(output.status.success(), "{output:?}");
    let first = fs::read_to_string(&page).unwrap();
    assert_eq!(first.matches(r#"class="haramContainer""#).count(), 2);

    let output = evergreen(&tmp.path, &["--write", "--check", "page.htm"]);
    assert!(output.status.success(), "{output:?}");
    assert_eq!(fs::read_to_string(&page).unwrap(), first);
}

#[test]
fn check_fails_when_terms_are_found() {
    let tmp = TempDir::new("evergreen-check");
    write_file(&tmp.path.join("a.html"), "<p>insane</p>");
    write_file(&tmp.path.join("b.html"), "<p>fine</p>");

    let output = evergreen(&tmp.path, &["--check", "."]);
    assert_eq!(output.status.code(), Some(1));

    let output = evergreen(&tmp.path, &["--check", "--ignore", "**/a.html", "."]);
    assert!(output.status.success(), "{output:?}");
}

#[test]
fn custom_rules_and_config() {
    let tmp = TempDir::new("evergreen-config");
    write_file(
        &tmp.path.join("evergreen.yml"),
        "builtin_rules: false\nrules_file: words.yml\nwidget:\n  container_class: eg\n",
    );
    write_file(
        &tmp.path.join("words.yml"),
        "- pattern: synergy\n  alternative: cooperation\n  note: jargon\n",
    );
    write_file(&tmp.path.join("p.html"), "<p>crazy synergy</p>");

    let output = evergreen(&tmp.path, &["--json", "p.html"]);
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_replacements"], 1);
    assert_eq!(report["rules_loaded"], 1);
    assert_eq!(report["files"][0]["rules"][0]["pattern"], "synergy");
    assert_eq!(report["files"][0]["rules"][0]["alternative"], "cooperation");
}

#[test]
fn set_overrides_and_stdin() {
    let tmp = TempDir::new("evergreen-stdin");
    let mut child = Command::new(env!("CARGO_BIN_EXE_evergreen"))
        .current_dir(&tmp.path)
        .args(["--set", "widget.container_class=eg", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn evergreen");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"<p>an addict</p>")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{output:?}");
    let html = stdout(&output);
    assert!(html.contains(r#"original="addict" class="eg""#), "{html}");

    let output = evergreen(&tmp.path, &["--set", "enabled=false", "--no-builtin", "."]);
    assert!(output.status.success(), "{output:?}");
}

#[test]
fn stdin_json_reports_rejected_rules() {
    let tmp = TempDir::new("evergreen-stdin-rejected");
    write_file(
        &tmp.path.join("words.json"),
        r#"[{"word": "synergy", "alt": "cooperation", "context": "jargon"}, {"word": "lame"}]"#,
    );
    let mut child = Command::new(env!("CARGO_BIN_EXE_evergreen"))
        .current_dir(&tmp.path)
        .args(["--no-builtin", "--rules", "words.json", "--json", "-"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("spawn evergreen");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"<p>synergy</p>")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{output:?}");
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total_replacements"], 1);
    assert_eq!(report["rules_loaded"], 1);
    assert_eq!(report["rejected_rules"].as_array().map(Vec::len), Some(1));
}
