//! A scripted HTTP service for behavioural tests.
//!
//! Serves one canned response per connection on an ephemeral TCP port and
//! records each request as `METHOD target` followed by the body, if any.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// One canned reply.
#[derive(Debug, Clone)]
pub(in crate::tests) struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_owned(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_owned(),
        }
    }
}

pub(in crate::tests) struct FakeService {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    result: Arc<Mutex<Option<Result<()>>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl FakeService {
    /// Starts serving `responses` in order, one connection each.
    ///
    /// The service stops after the last response or once no client has
    /// connected for a few seconds.
    pub fn spawn(responses: Vec<CannedResponse>) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).context("bind fake service")?;
        listener
            .set_nonblocking(true)
            .context("fake service nonblocking")?;
        let port = listener.local_addr().context("local addr")?.port();
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let result: Arc<Mutex<Option<Result<()>>>> = Arc::new(Mutex::new(None));
        let requests_clone = Arc::clone(&requests);
        let result_clone = Arc::clone(&result);
        let handle = thread::spawn(move || {
            let outcome = Self::serve(&listener, responses, &requests_clone);
            if let Ok(mut guard) = result_clone.lock() {
                *guard = Some(outcome);
            }
        });
        Ok(Self {
            port,
            requests,
            result,
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Waits for the service thread and returns every recorded request.
    pub fn take_requests(&mut self) -> Result<Vec<String>> {
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| anyhow!("fake service thread panicked"))?;
        }
        if let Some(outcome) = self
            .result
            .lock()
            .map_err(|error| anyhow!("lock fake service result: {error}"))?
            .take()
        {
            outcome.context("fake service failed")?;
        }
        let requests = self
            .requests
            .lock()
            .map_err(|error| anyhow!("lock requests: {error}"))?;
        Ok(requests.clone())
    }

    fn serve(
        listener: &TcpListener,
        responses: Vec<CannedResponse>,
        requests: &Mutex<Vec<String>>,
    ) -> Result<()> {
        for response in responses {
            let Some(stream) = accept(listener)? else {
                return Ok(());
            };
            let request = Self::respond(stream, &response)?;
            requests
                .lock()
                .map_err(|error| anyhow!("lock requests: {error}"))?
                .push(request);
        }
        Ok(())
    }

    fn respond(stream: TcpStream, response: &CannedResponse) -> Result<String> {
        stream
            .set_nonblocking(false)
            .context("blocking client stream")?;
        let mut reader = BufReader::new(stream.try_clone().context("clone stream")?);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("read request line")?;
        let mut content_length = 0usize;
        loop {
            let mut header = String::new();
            reader.read_line(&mut header).context("read header")?;
            let trimmed = header.trim_end();
            if trimmed.is_empty() {
                break;
            }
            if let Some((name, value)) = trimmed.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().context("content length")?;
                }
            }
        }
        let mut body = vec![0_u8; content_length];
        reader.read_exact(&mut body).context("read body")?;

        let target = request_line
            .split_whitespace()
            .take(2)
            .collect::<Vec<_>>()
            .join(" ");
        let mut recorded = target;
        if !body.is_empty() {
            recorded.push('\n');
            recorded.push_str(&String::from_utf8_lossy(&body));
        }

        let mut writer = stream;
        write!(
            writer,
            "HTTP/1.1 {} Canned\r\nContent-Type: application/edn\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            response.status,
            response.body.len(),
            response.body
        )
        .context("write response")?;
        writer.flush().context("flush response")?;
        Ok(recorded)
    }
}

fn accept(listener: &TcpListener) -> Result<Option<TcpStream>> {
    let deadline = Instant::now() + ACCEPT_TIMEOUT;
    loop {
        match listener.accept() {
            Ok((stream, _)) => return Ok(Some(stream)),
            Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
                thread::sleep(Duration::from_millis(10));
            }
            Err(error) => return Err(error).context("accept client"),
        }
    }
}
