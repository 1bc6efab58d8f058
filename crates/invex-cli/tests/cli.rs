//! Command-line behaviour of the `invex` binary.

use std::fs;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;

const INVOICE: &str = "\
Sprzedawca:
Hurtownia Zefir Sp. z o.o.
Nabywca:
Biuro Kowalski
RAZEM 1 234,56 283,95
";

fn invex(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invex").unwrap();
    cmd.arg("--config").arg(config).env_remove("OPENAI_API_KEY");
    cmd
}

/// Answer one chat-completions request with `content`; the thread returns the raw request.
fn serve_one_completion(content: &str) -> (String, thread::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}/v1/chat/completions", listener.local_addr().unwrap());
    let body = serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
    .to_string();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request(&mut stream);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).unwrap();
        request
    });

    (endpoint, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(end) = text.find("\r\n\r\n") {
            let length = text[..end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.json");
    fs::write(&path, "{}").unwrap();
    path
}

#[test]
fn test_batch_writes_csv_with_fixed_columns() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let scans = dir.path().join("txt");
    fs::create_dir(&scans).unwrap();
    fs::write(scans.join("FV-1-2024_WX123.txt"), INVOICE).unwrap();
    fs::write(scans.join("(00)PP1_AB1.txt"), "Potwierdzenie\n").unwrap();
    fs::write(scans.join("notes.txt"), INVOICE).unwrap();
    let output = dir.path().join("out.csv");

    invex(&config)
        .arg("batch")
        .arg(&scans)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 rows"));

    let csv = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Invoice Number,Issue Date,Net,VAT,Currency,Gross,Registration Number"
    );
    assert_eq!(lines[1], "(00)PP1,,,0.00,PLN,,AB1");
    assert_eq!(lines[2], "FV/1/2024,,1234.56,283.95,,1234.56,WX123");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_batch_default_output_name() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let scans = dir.path().join("txt");
    fs::create_dir(&scans).unwrap();
    fs::write(scans.join("FV-1_A.txt"), INVOICE).unwrap();

    invex(&config)
        .args(["batch", "--format", "json"])
        .arg(&scans)
        .assert()
        .success();

    let exported: Vec<PathBuf> = fs::read_dir(&scans)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            let name = p.file_name().unwrap().to_string_lossy();
            name.starts_with("wynik_") && name.ends_with(".json")
        })
        .collect();
    assert_eq!(exported.len(), 1);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&exported[0]).unwrap()).unwrap();
    assert_eq!(json[0]["invoice_number"], "FV/1");
    assert_eq!(json[0]["metadata"]["amount_source"], "totals_line");
}

#[test]
fn test_missing_directory_fails_with_clear_message() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());

    invex(&config)
        .arg("batch")
        .arg(dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("source directory not found"));
}

#[test]
fn test_no_records_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let scans = dir.path().join("txt");
    fs::create_dir(&scans).unwrap();
    fs::write(scans.join("invoice.txt"), INVOICE).unwrap();

    invex(&config)
        .arg("batch")
        .arg(&scans)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no records produced"));
}

#[test]
fn test_ai_without_credential_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let scans = dir.path().join("txt");
    fs::create_dir(&scans).unwrap();
    // No seller anywhere, so escalation is attempted.
    fs::write(scans.join("FV-1_A.txt"), "12\nRazem do zapłaty 50,00\n").unwrap();

    invex(&config)
        .args(["--ai", "batch"])
        .arg(&scans)
        .assert()
        .failure()
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
}

#[test]
fn test_ai_fills_missing_seller() {
    let dir = tempfile::tempdir().unwrap();
    let answer = serde_json::json!({
        "sellerName": "Hurtownia Zefir",
        "net": 1.0,
        "vat": null,
        "currency": "PLN",
        "confidence": 0.9,
        "evidence": ["Razem do zapłaty 50,00"]
    })
    .to_string();
    let (endpoint, server) = serve_one_completion(&answer);

    let config = dir.path().join("config.json");
    let settings = serde_json::json!({
        "escalation": { "endpoint": endpoint, "max_attempts": 1, "timeout_secs": 10 }
    });
    fs::write(&config, settings.to_string()).unwrap();

    let scans = dir.path().join("txt");
    fs::create_dir(&scans).unwrap();
    fs::write(scans.join("FV-1_A.txt"), "12\nRazem do zapłaty 50,00\n").unwrap();
    let output = dir.path().join("out.json");

    invex(&config)
        .env("OPENAI_API_KEY", "test-key")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .args(["--ai", "batch", "--format", "json", "--output"])
        .arg(&output)
        .arg(&scans)
        .assert()
        .success();

    let request = server.join().unwrap();
    assert!(request.contains("Bearer test-key"));
    assert!(request.contains("json_schema"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(json[0]["seller_name"], "HURTOWNIA ZEFIR");
    assert_eq!(json[0]["metadata"]["escalated"], true);
    // Amounts found locally are kept.
    assert_eq!(json[0]["net"], "40.65");
}

#[test]
fn test_process_single_file_text() {
    let dir = tempfile::tempdir().unwrap();
    let config = empty_config(dir.path());
    let file = dir.path().join("FV-9-2024_KR1.txt");
    fs::write(&file, INVOICE).unwrap();

    invex(&config)
        .args(["process", "--format", "text"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Invoice: FV/9/2024"))
        .stdout(predicate::str::contains("Seller: HURTOWNIA ZEFIR SP. Z O.O."))
        .stdout(predicate::str::contains("Net:   1234.56"));
}

#[test]
fn test_config_set_and_get() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("cfg").join("config.json");

    invex(&config).args(["config", "init"]).assert().success();
    invex(&config)
        .args(["config", "set", "batch.jobs", "3"])
        .assert()
        .success();
    invex(&config)
        .args(["config", "get", "batch.jobs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3"));
    invex(&config)
        .args(["config", "set", "batch.nonexistent", "1"])
        .assert()
        .failure();
}
