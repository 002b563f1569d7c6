//! Minimal HTTP/1.1 server speaking the handful of Kubo RPC calls the driver uses.
//!
//! Serves one file object (at `/ipfs/<cid>` and at `alias`) and one manifest. Unknown
//! arguments get a 500 with a Kubo-style error object.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
pub struct KuboFixture {
    pub cid: String,
    /// A second content path that resolves to the same object.
    pub alias: String,
    pub content: Vec<u8>,
    pub pin_progress: Vec<u64>,
    pub providers: Vec<String>,
    pub manifest_cid: String,
    pub manifest_json: String,
}

/// Starts the server on a background thread. Returns its base URL
/// (e.g. "http://127.0.0.1:12345"). The server runs until the process exits.
pub fn start(fixture: KuboFixture) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let fixture = Arc::new(fixture);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let fixture = Arc::clone(&fixture);
            thread::spawn(move || handle(stream, &fixture));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: std::net::TcpStream, fx: &KuboFixture) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = String::from_utf8_lossy(&buf[..n]).to_string();
    let target = request
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let url = url::Url::parse(&format!("http://localhost{}", target)).unwrap();
    let arg = url
        .query_pairs()
        .find(|(k, _)| k == "arg")
        .map(|(_, v)| v.to_string())
        .unwrap_or_default();
    let is_object = arg == format!("/ipfs/{}", fx.cid) || arg == fx.alias;

    let (status, body): (&str, Vec<u8>) = match url.path() {
        "/api/v0/files/stat" if is_object => (
            "200 OK",
            format!(
                r#"{{"Hash":"{}","Size":{},"CumulativeSize":{},"Blocks":1,"Type":"file"}}"#,
                fx.cid,
                fx.content.len(),
                fx.content.len() + 11
            )
            .into_bytes(),
        ),
        "/api/v0/pin/add" if is_object => {
            let mut out = String::new();
            for n in &fx.pin_progress {
                out.push_str(&format!("{{\"Progress\":{}}}\n", n));
            }
            out.push_str(&format!("{{\"Pins\":[\"{}\"]}}\n", fx.cid));
            ("200 OK", out.into_bytes())
        }
        "/api/v0/cat" if is_object => ("200 OK", fx.content.clone()),
        "/api/v0/routing/findprovs" if arg == fx.cid => {
            let mut out = String::from("{\"ID\":\"QmQuery\",\"Type\":0,\"Responses\":null}\n");
            for id in &fx.providers {
                out.push_str(&format!(
                    "{{\"ID\":\"\",\"Type\":4,\"Responses\":[{{\"ID\":\"{}\",\"Addrs\":[]}}]}}\n",
                    id
                ));
            }
            ("200 OK", out.into_bytes())
        }
        "/api/v0/dag/get" if arg == fx.manifest_cid => ("200 OK", fx.manifest_json.clone().into_bytes()),
        _ => (
            "500 Internal Server Error",
            br#"{"Message":"merkledag: not found","Code":0,"Type":"error"}"#.to_vec(),
        ),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
}
