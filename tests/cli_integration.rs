use std::process::Command;
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_filebus").to_string()
}

#[test]
fn cli_deliver_raw_then_cat() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    let input = spool.path().join("report.csv");
    std::fs::write(&input, b"id,value\n1,42\n").unwrap();

    let st = Command::new(bin())
        .args(["deliver", "--store-root"])
        .arg(root.path())
        .args(["--dest", "/incoming"])
        .arg(&input)
        .status()
        .unwrap();
    assert!(st.success());
    assert!(!input.exists());
    assert_eq!(
        std::fs::read(root.path().join("incoming/report.csv")).unwrap(),
        b"id,value\n1,42\n"
    );

    let out = Command::new(bin())
        .args(["cat", "--store-root"])
        .arg(root.path())
        .arg("/incoming/report.csv")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"id,value\n1,42\n");
}

#[test]
fn cli_deliver_records_then_cat() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    let a = spool.path().join("a.log");
    let b = spool.path().join("b.log");
    std::fs::write(&a, b"one\r\ntwo\r\n").unwrap();
    std::fs::write(&b, b"three").unwrap();

    let out = Command::new(bin())
        .args(["--json", "deliver", "--encoding", "records", "--block-size", "1K", "--store-root"])
        .arg(root.path())
        .args(["--dest", "/logs"])
        .arg(&a)
        .arg(&b)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(stats["delivered"], 2);
    assert_eq!(stats["failed"], 0);
    assert_eq!(stats["encoder"], "records/lz4");

    let out = Command::new(bin())
        .args(["cat", "--records", "--store-root"])
        .arg(root.path())
        .arg("/logs/a.log")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(out.stdout, b"one\ntwo\n");
}

#[test]
fn cli_partial_failure_exits_nonzero() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    let good = spool.path().join("good.txt");
    std::fs::write(&good, b"ok").unwrap();
    let missing = spool.path().join("missing.txt");

    let out = Command::new(bin())
        .args(["deliver", "--store-root"])
        .arg(root.path())
        .arg(&good)
        .arg(&missing)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(root.path().join("good.txt").exists());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("missing.txt"), "stderr: {stderr}");
}

#[test]
fn cli_occupied_target_fails() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    std::fs::write(root.path().join("dup.txt"), b"first").unwrap();
    let input = spool.path().join("dup.txt");
    std::fs::write(&input, b"second").unwrap();

    let st = Command::new(bin())
        .args(["-q", "deliver", "--store-root"])
        .arg(root.path())
        .arg(&input)
        .status()
        .unwrap();
    assert!(!st.success());
    assert!(input.exists());
    assert_eq!(std::fs::read(root.path().join("dup.txt")).unwrap(), b"first");
    assert!(!root.path().join("dup.txt.tmp").exists());
}

#[test]
fn cli_compression_flag_selects_records() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    let input = spool.path().join("x");
    std::fs::write(&input, b"x").unwrap();

    // An explicit codec switches to record encoding, so this succeeds.
    let st = Command::new(bin())
        .args(["deliver", "--compression", "none", "--store-root"])
        .arg(root.path())
        .arg(&input)
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .args(["deliver", "--compression", "bogus", "--store-root"])
        .arg(root.path())
        .arg(&input)
        .status()
        .unwrap();
    assert!(!st.success());
}

#[test]
fn cli_level_without_zlib_fails_before_delivery() {
    let spool = tempdir().unwrap();
    let root = tempdir().unwrap();
    let input = spool.path().join("app.log");
    std::fs::write(&input, b"line\n").unwrap();

    let out = Command::new(bin())
        .args(["deliver", "--compression", "lz4", "--level", "9", "--store-root"])
        .arg(root.path())
        .arg(&input)
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--level"), "stderr: {stderr}");
    assert!(input.exists());
    assert!(!root.path().join("app.log").exists());
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("lz4"));
}
