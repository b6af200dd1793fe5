//! Integration tests for the blocking reqwest transport against a loopback server.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use egg_scan_upload::{ImageUpload, ReqwestTransport, ScanClient, UploadError};

/// Accepts one connection, answers it with `status_line` and `body`, and
/// returns the lowercased request text.
fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind should work");
    let addr = listener.local_addr().expect("addr should resolve");
    let base = format!("http://{addr}");

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("client should connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("read timeout should apply");
        let request = read_request(&mut stream);
        let reply = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream
            .write_all(reply.as_bytes())
            .expect("reply should be written");
        request.to_lowercase()
    });
    (base, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).expect("request should be readable");
        if read == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..read]);
        if request_complete(&data) {
            break;
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn request_complete(data: &[u8]) -> bool {
    let Some(head_end) = data.windows(4).position(|window| window == b"\r\n\r\n") else {
        return false;
    };
    let head = String::from_utf8_lossy(&data[..head_end]).to_lowercase();
    let body_len = data.len() - head_end - 4;

    if let Some(length) = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
    {
        let expected = length.trim().parse::<usize>().unwrap_or(0);
        return body_len >= expected;
    }
    if head.contains("transfer-encoding: chunked") {
        return data.ends_with(b"0\r\n\r\n");
    }
    true
}

fn client_for(base: &str) -> ScanClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).expect("transport should build");
    ScanClient::new(
        &format!("{base}/api/predict"),
        &format!("{base}/api/history"),
        Arc::new(transport),
    )
    .expect("client should build")
}

fn egg_upload() -> ImageUpload {
    ImageUpload {
        file_name: "egg.jpg".to_string(),
        mime: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3, 4],
    }
}

#[test]
fn reqwest_transport_tests_posts_multipart_file_and_surfaces_plain_error() {
    let (base, server) = serve_once("500 Internal Server Error", "model unavailable");
    let client = client_for(&base);

    let error = client
        .predict(&egg_upload())
        .expect_err("500 reply should fail");
    let request = server.join().expect("server thread should finish");

    assert!(request.starts_with("post /api/predict http/1.1"));
    assert!(request.contains("multipart/form-data"));
    assert!(request.contains(r#"name="file"; filename="egg.jpg""#));
    assert!(request.contains("image/jpeg"));
    match error {
        UploadError::RequestFailed { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "model unavailable");
        }
        other => panic!("expected request failure, got {other}"),
    }
}

#[test]
fn reqwest_transport_tests_gets_history_batch() {
    let (base, server) = serve_once(
        "200 OK",
        r#"[{"result":"Fresh","confidence":97.5,"timestamp":"2026-10-14T12:00:00Z","filename":"a.jpg"}]"#,
    );
    let client = client_for(&base);

    let records = client.fetch_history().expect("history should load");
    let request = server.join().expect("server thread should finish");

    assert!(request.starts_with("get /api/history http/1.1"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].result, "Fresh");
}

#[test]
fn reqwest_transport_tests_refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind should work");
    let addr = listener.local_addr().expect("addr should resolve");
    let base = format!("http://{addr}");
    drop(listener);

    let client = client_for(&base);
    assert!(matches!(
        client.predict(&egg_upload()),
        Err(UploadError::Transport(_))
    ));
}
