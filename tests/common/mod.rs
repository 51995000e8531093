#![allow(dead_code)]

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use tempfile::{TempDir, tempdir};

pub const TEST_KEY: &str = "test-key";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Local stand-in for the geocoding endpoint.
///
/// Answers `OK` for addresses mentioning "Amphitheatre", `REQUEST_DENIED` for
/// "forbidden" or any key other than [`TEST_KEY`], `ZERO_RESULTS` otherwise.
pub struct StubGeocodingServer {
    endpoint: String,
    requests: Arc<AtomicUsize>,
}

impl StubGeocodingServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let endpoint = format!(
            "http://{}/maps/api/geocode/json",
            listener.local_addr().expect("local addr")
        );
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = respond(stream);
            }
        });
        Self { endpoint, requests }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn respond(mut stream: TcpStream) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 || header == "\r\n" {
            break;
        }
    }

    let body = if !request_line.contains(&format!("key={TEST_KEY}")) {
        r#"{"error_message": "The provided API key is invalid.", "results": [], "status": "REQUEST_DENIED"}"#
    } else if request_line.contains("Amphitheatre") {
        r#"{"results": [{"formatted_address": "1600 Amphitheatre Pkwy, Mountain View, CA 94043, USA", "geometry": {"location": {"lat": 37.4224764, "lng": -122.0842499}}}], "status": "OK"}"#
    } else if request_line.contains("forbidden") {
        r#"{"results": [], "status": "REQUEST_DENIED"}"#
    } else {
        r#"{"results": [], "status": "ZERO_RESULTS"}"#
    };

    write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )?;
    stream.flush()
}
