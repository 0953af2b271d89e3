// tests/notify_discord.rs
// Discord forum notifier against a throwaway local HTTP endpoint.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use uma_monitor::notify::{DiscordForumNotifier, Notifier};

/// Answers each request with the next status in `statuses` (last one repeats)
/// and keeps the request bodies.
async fn spawn_server(statuses: Vec<&'static str>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let seen = bodies.clone();

    tokio::spawn(async move {
        let mut n = 0usize;
        loop {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let (head_end, content_len) = loop {
                let read = sock.read(&mut chunk).await.unwrap_or(0);
                if read == 0 {
                    break (buf.len(), 0);
                }
                buf.extend_from_slice(&chunk[..read]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let len = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    break (pos + 4, len);
                }
            };
            while buf.len() < head_end + content_len {
                let read = sock.read(&mut chunk).await.unwrap_or(0);
                if read == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..read]);
            }
            let end = buf.len().min(head_end + content_len);
            seen.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf[head_end..end]).to_string());

            let status = statuses[n.min(statuses.len() - 1)];
            n += 1;
            let rsp = format!(
                "HTTP/1.1 {status}\r\nRetry-After: 0\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
            let _ = sock.write_all(rsp.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });

    (format!("http://{addr}/webhook"), bodies)
}

#[tokio::test]
async fn posts_forum_thread_payload() {
    let (url, bodies) = spawn_server(vec!["204 No Content"]).await;
    let n = DiscordForumNotifier::new(url).with_timeout(5);
    n.send("133102601857 — White 15 | G1 13", "Blue:   x").await.unwrap();

    let bodies = bodies.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    let v: serde_json::Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(v["thread_name"], "133102601857 — White 15 | G1 13");
    assert_eq!(v["content"], "Blue:   x");
    assert!(v.get("applied_tags").is_none());
}

#[tokio::test]
async fn retries_once_after_rate_limit() {
    let (url, bodies) = spawn_server(vec!["429 Too Many Requests", "204 No Content"]).await;
    let n = DiscordForumNotifier::new(url).with_timeout(5);
    n.send("t", "b").await.unwrap();
    assert_eq!(bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn gives_up_after_second_rate_limit() {
    let (url, bodies) = spawn_server(vec!["429 Too Many Requests"]).await;
    let n = DiscordForumNotifier::new(url).with_timeout(5);
    assert!(n.send("t", "b").await.is_err());
    assert_eq!(bodies.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn server_error_is_reported() {
    let (url, _bodies) = spawn_server(vec!["500 Internal Server Error"]).await;
    let n = DiscordForumNotifier::new(url).with_timeout(5);
    let err = n.send("t", "b").await.unwrap_err();
    assert!(format!("{err:#}").contains("discord webhook HTTP error"));
}
