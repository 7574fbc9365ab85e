use std::io;
use std::time::{Duration, Instant};
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, warn};
use url::Url;

use crate::OAuthError;

pub const CALLBACK_PATHS: [&str; 2] = ["/auth/callback", "/callback"];
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const SUCCESS_TITLE: &str = "Signed in";
const SUCCESS_DETAIL: &str = "You can close this window and return to the terminal.";
const FAILURE_TITLE: &str = "Sign-in failed";

pub struct CallbackListener {
    server: Server,
    expected_state: String,
    port: u16,
}

impl CallbackListener {
    pub fn start(expected_state: &str, port: u16) -> Result<Self, OAuthError> {
        let bind_address = format!("127.0.0.1:{port}");
        let server = Server::http(&bind_address).map_err(|err| {
            let in_use = err
                .downcast_ref::<io::Error>()
                .map(|io_err| io_err.kind() == io::ErrorKind::AddrInUse)
                .unwrap_or(false);
            if in_use {
                OAuthError::PortInUse(port)
            } else {
                OAuthError::Listener(err.to_string())
            }
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        debug!(port, "callback listener bound");
        Ok(CallbackListener {
            server,
            expected_state: expected_state.to_string(),
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn wait_for_code(&self, timeout: Duration) -> Result<String, OAuthError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(OAuthError::AuthorizationTimeout(timeout.as_secs()));
            }
            let request = match self.server.recv_timeout(remaining) {
                Ok(Some(request)) => request,
                Ok(None) => return Err(OAuthError::AuthorizationTimeout(timeout.as_secs())),
                Err(err) => return Err(OAuthError::Listener(err.to_string())),
            };
            match decide(request.url(), &self.expected_state) {
                Decision::Ignore { status, body } => {
                    debug!(status, "ignoring request outside the callback path");
                    respond(request, status, body.to_string(), "text/plain; charset=utf-8");
                }
                Decision::Resolve {
                    status,
                    page,
                    outcome,
                } => {
                    if let Err(err) = &outcome {
                        debug!(error = %err, "authorization callback rejected");
                    }
                    respond(request, status, page, "text/html; charset=utf-8");
                    return outcome;
                }
            }
        }
    }
}

enum Decision {
    Ignore {
        status: u16,
        body: &'static str,
    },
    Resolve {
        status: u16,
        page: String,
        outcome: Result<String, OAuthError>,
    },
}

fn decide(raw_url: &str, expected_state: &str) -> Decision {
    let Ok(url) = Url::parse(&format!("http://127.0.0.1{raw_url}")) else {
        return Decision::Ignore {
            status: 400,
            body: "Bad Request",
        };
    };
    if !CALLBACK_PATHS.contains(&url.path()) {
        return Decision::Ignore {
            status: 404,
            body: "Not Found",
        };
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    };

    if let Some(error) = param("error") {
        let description = param("error_description").unwrap_or(error);
        return failure(200, OAuthError::ProviderError(description));
    }
    let Some(code) = param("code") else {
        return failure(400, OAuthError::MissingCode);
    };
    let Some(state) = param("state") else {
        return failure(400, OAuthError::MissingState);
    };
    if state != expected_state {
        return failure(400, OAuthError::StateMismatch);
    }
    Decision::Resolve {
        status: 200,
        page: html_page(SUCCESS_TITLE, SUCCESS_DETAIL),
        outcome: Ok(code),
    }
}

fn failure(status: u16, error: OAuthError) -> Decision {
    Decision::Resolve {
        status,
        page: html_page(FAILURE_TITLE, &error.to_string()),
        outcome: Err(error),
    }
}

fn respond(request: Request, status: u16, body: String, content_type: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        response = response.with_header(header);
    }
    if let Ok(header) = Header::from_bytes(&b"Connection"[..], &b"close"[..]) {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        warn!(error = %err, "could not answer callback request");
    }
}

fn html_page(title: &str, detail: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body style=\"font-family: sans-serif; margin: 3em;\"><h1>{title}</h1><p>{detail}</p></body></html>\n",
        title = escape_html(title),
        detail = escape_html(detail),
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    const STATE: &str = "expected-state";

    fn get(port: u16, path: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).expect("connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("timeout");
        let request = format!("GET {path} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).expect("write");
        let mut raw = String::new();
        let _ = stream.read_to_string(&mut raw);
        let status = raw
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        let body = raw
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }

    fn run_callback(paths: &[&str]) -> (Result<String, OAuthError>, Vec<(u16, String)>) {
        let listener = CallbackListener::start(STATE, 0).expect("start");
        let port = listener.port();
        let paths: Vec<String> = paths.iter().map(|path| path.to_string()).collect();
        let client = thread::spawn(move || {
            paths
                .iter()
                .map(|path| get(port, path))
                .collect::<Vec<_>>()
        });
        let outcome = listener.wait_for_code(Duration::from_secs(10));
        let responses = client.join().expect("client");
        (outcome, responses)
    }

    #[test]
    fn resolves_with_code_on_matching_state() {
        let (outcome, responses) =
            run_callback(&["/auth/callback?code=abc123&state=expected-state"]);
        assert_eq!(outcome.unwrap(), "abc123");
        assert_eq!(responses[0].0, 200);
        assert!(responses[0].1.contains(SUCCESS_TITLE));
    }

    #[test]
    fn accepts_short_callback_path() {
        let (outcome, _) = run_callback(&["/callback?code=xyz&state=expected-state"]);
        assert_eq!(outcome.unwrap(), "xyz");
    }

    #[test]
    fn rejects_state_mismatch_even_with_code() {
        let (outcome, responses) = run_callback(&["/auth/callback?code=valid&state=forged"]);
        assert!(matches!(outcome, Err(OAuthError::StateMismatch)));
        assert_eq!(responses[0].0, 400);
        assert!(responses[0].1.contains(FAILURE_TITLE));
    }

    #[test]
    fn reports_provider_error_first() {
        let (outcome, responses) = run_callback(&[
            "/auth/callback?error=access_denied&error_description=User%20cancelled&code=abc&state=expected-state",
        ]);
        match outcome {
            Err(OAuthError::ProviderError(description)) => {
                assert_eq!(description, "User cancelled")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(responses[0].0, 200);
        assert!(responses[0].1.contains("User cancelled"));
    }

    #[test]
    fn reports_missing_code_before_missing_state() {
        let (outcome, responses) = run_callback(&["/auth/callback"]);
        assert!(matches!(outcome, Err(OAuthError::MissingCode)));
        assert_eq!(responses[0].0, 400);

        let (outcome, _) = run_callback(&["/auth/callback?code=abc"]);
        assert!(matches!(outcome, Err(OAuthError::MissingState)));
    }

    #[test]
    fn other_paths_get_404_and_wait_continues() {
        let (outcome, responses) = run_callback(&[
            "/favicon.ico",
            "/auth/callback?code=later&state=expected-state",
        ]);
        assert_eq!(outcome.unwrap(), "later");
        assert_eq!(responses[0], (404, "Not Found".to_string()));
        assert_eq!(responses[1].0, 200);
    }

    #[test]
    fn times_out_without_callback() {
        let listener = CallbackListener::start(STATE, 0).expect("start");
        let started = Instant::now();
        let outcome = listener.wait_for_code(Duration::from_millis(200));
        assert!(matches!(outcome, Err(OAuthError::AuthorizationTimeout(_))));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[test]
    fn busy_port_is_reported_without_fallback() {
        let blocker = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = blocker.local_addr().unwrap().port();
        let err = CallbackListener::start(STATE, port).err().expect("port in use");
        assert!(matches!(err, OAuthError::PortInUse(p) if p == port));
    }

    #[test]
    fn dropping_listener_releases_port() {
        let listener = CallbackListener::start(STATE, 0).expect("start");
        let port = listener.port();
        drop(listener);
        TcpListener::bind(("127.0.0.1", port)).expect("port released");
    }

    #[test]
    fn binds_loopback_only() {
        let listener = CallbackListener::start(STATE, 0).expect("start");
        let addr = listener.server.server_addr().to_ip().expect("ip addr");
        assert!(addr.ip().is_loopback());
    }

    #[test]
    fn failure_pages_escape_markup() {
        let page = html_page(FAILURE_TITLE, "<script>alert('x')</script>");
        assert!(!page.contains("<script>"));
        assert!(page.contains("&lt;script&gt;"));
    }
}
