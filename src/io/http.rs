use reqwest::Client;
use std::io::{self, Read, Write};
use std::time::Duration;
use tokio::runtime::Handle;

use super::{DocumentHandle, DocumentStore};
use anyhow::{Result, bail};

/// Read-only store for documents behind `http://` and `https://` URLs.
///
/// The completion sink runs on a plain thread and wants a blocking
/// [`Read`], so requests are driven on a tokio runtime through its
/// [`Handle`]. Must not be used from inside that runtime's async tasks.
pub struct HttpDocumentStore {
    client: Client,
    runtime: Handle,
    max_retry: u32,
}

impl HttpDocumentStore {
    pub fn new(runtime: Handle) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            runtime,
            max_retry: 10,
        })
    }

    /// Attempts made on connect errors and timeouts before giving up.
    pub fn with_max_retry(mut self, max_retry: u32) -> Self {
        self.max_retry = max_retry.max(1);
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let mut retry_count = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    if !resp.status().is_success() {
                        bail!("HTTP request failed with status: {}", resp.status());
                    }
                    return Ok(resp);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        bail!("Max retries exceeded");
                    }
                    tracing::warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl DocumentStore for HttpDocumentStore {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>> {
        let response = self.runtime.block_on(self.get(handle.as_str()))?;
        Ok(Box::new(ChunkReader::new(self.runtime.clone(), response)))
    }

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>> {
        bail!("cannot write to remote document {handle}")
    }
}

/// Blocking reader over a streamed response body, one chunk at a time.
struct ChunkReader {
    runtime: Handle,
    response: reqwest::Response,
    pending: Vec<u8>,
    offset: usize,
    done: bool,
}

impl ChunkReader {
    fn new(runtime: Handle, response: reqwest::Response) -> Self {
        Self {
            runtime,
            response,
            pending: Vec::new(),
            offset: 0,
            done: false,
        }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset == self.pending.len() {
            if self.done {
                return Ok(0);
            }
            let chunk = self
                .runtime
                .block_on(self.response.chunk())
                .map_err(io::Error::other)?;
            match chunk {
                Some(bytes) => {
                    self.pending = bytes.to_vec();
                    self.offset = 0;
                }
                None => self.done = true,
            }
        }

        let n = buf.len().min(self.pending.len() - self.offset);
        buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}
