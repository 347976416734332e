#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;

use docbridge::{
    BridgeConfig, CompletionSink, DocumentHandle, DocumentPicker, DocumentStore, Notifier, PickerRequest,
    RequestBridge,
};

pub const STORED: u16 = 0;
pub const DEFLATE: u16 = 8;
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// Builds ZIP archives in memory, local headers first, then a central
/// directory the streaming reader stops at.
#[derive(Default)]
pub struct ZipBuilder {
    out: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dir(self, name: &str) -> Self {
        assert!(name.ends_with('/'));
        self.entry(name, b"", STORED, 0)
    }

    /// Deflated file with sizes in the local header.
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, DEFLATE, 0)
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, STORED, 0)
    }

    /// Deflated file whose CRC and sizes follow the data, as written by
    /// streaming zip tools.
    pub fn streamed(self, name: &str, data: &[u8]) -> Self {
        self.entry(name, data, DEFLATE, FLAG_DATA_DESCRIPTOR)
    }

    /// Stored file announcing a wrong CRC.
    pub fn bad_crc(mut self, name: &str, data: &[u8]) -> Self {
        let crc = crc32(data) ^ 0xFFFF_FFFF;
        self.push(name, data.to_vec(), data.len() as u64, crc, STORED, 0);
        self
    }

    pub fn entry(mut self, name: &str, data: &[u8], method: u16, flags: u16) -> Self {
        let body = match method {
            DEFLATE => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            _ => data.to_vec(),
        };
        self.push(name, body, data.len() as u64, crc32(data), method, flags);
        self
    }

    fn push(&mut self, name: &str, body: Vec<u8>, size: u64, crc: u32, method: u16, flags: u16) {
        let offset = self.out.len() as u32;
        let deferred = flags & FLAG_DATA_DESCRIPTOR != 0;
        let (header_crc, header_csize, header_size) = if deferred {
            (0, 0, 0)
        } else {
            (crc, body.len() as u32, size as u32)
        };

        let out = &mut self.out;
        out.extend_from_slice(b"PK\x03\x04");
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(flags).unwrap();
        out.write_u16::<LittleEndian>(method).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0x0021).unwrap();
        out.write_u32::<LittleEndian>(header_crc).unwrap();
        out.write_u32::<LittleEndian>(header_csize).unwrap();
        out.write_u32::<LittleEndian>(header_size).unwrap();
        out.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&body);
        if deferred {
            out.extend_from_slice(b"PK\x07\x08");
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(size as u32).unwrap();
        }

        let cd = &mut self.central;
        cd.extend_from_slice(b"PK\x01\x02");
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(20).unwrap();
        cd.write_u16::<LittleEndian>(flags).unwrap();
        cd.write_u16::<LittleEndian>(method).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0x0021).unwrap();
        cd.write_u32::<LittleEndian>(crc).unwrap();
        cd.write_u32::<LittleEndian>(body.len() as u32).unwrap();
        cd.write_u32::<LittleEndian>(size as u32).unwrap();
        cd.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u16::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(0).unwrap();
        cd.write_u32::<LittleEndian>(offset).unwrap();
        cd.extend_from_slice(name.as_bytes());

        self.count += 1;
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.out.len() as u32;
        let cd_size = self.central.len() as u32;
        self.out.extend_from_slice(&self.central);

        let out = &mut self.out;
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u16::<LittleEndian>(self.count).unwrap();
        out.write_u32::<LittleEndian>(cd_size).unwrap();
        out.write_u32::<LittleEndian>(cd_offset).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        self.out
    }
}

pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

/// Document store kept in memory. Handles marked broken fail to open.
#[derive(Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: &str, bytes: impl Into<Vec<u8>>) {
        self.docs.lock().unwrap().insert(handle.to_string(), bytes.into());
    }

    pub fn get(&self, handle: &str) -> Option<Vec<u8>> {
        self.docs.lock().unwrap().get(handle).cloned()
    }

    pub fn break_handle(&self, handle: &str) {
        self.broken.lock().unwrap().insert(handle.to_string());
    }

    fn check(&self, handle: &DocumentHandle) -> Result<()> {
        if self.broken.lock().unwrap().contains(handle.as_str()) {
            bail!("permission denied: {handle}");
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>> {
        self.check(handle)?;
        match self.get(handle.as_str()) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes))),
            None => bail!("no such document: {handle}"),
        }
    }

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>> {
        self.check(handle)?;
        self.insert(handle.as_str(), Vec::new());
        Ok(Box::new(MemoryWriter {
            key: handle.as_str().to_string(),
            docs: Arc::clone(&self.docs),
        }))
    }
}

struct MemoryWriter {
    key: String,
    docs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.docs
            .lock()
            .unwrap()
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Store over a [`MemoryStore`] whose readers block on their first read
/// until the test releases them.
pub struct StallingStore {
    inner: MemoryStore,
    entered: Mutex<Sender<()>>,
    release: Arc<Mutex<Receiver<()>>>,
}

/// Test side of a [`StallingStore`].
pub struct Stall {
    entered: Receiver<()>,
    release: Sender<()>,
}

impl StallingStore {
    pub fn new(inner: MemoryStore) -> (Self, Stall) {
        let (entered_tx, entered) = mpsc::channel();
        let (release, release_rx) = mpsc::channel();
        let store = Self {
            inner,
            entered: Mutex::new(entered_tx),
            release: Arc::new(Mutex::new(release_rx)),
        };
        (store, Stall { entered, release })
    }
}

impl Stall {
    /// Wait until a reader is blocked inside its first read.
    pub fn wait_until_reading(&self) {
        self.entered
            .recv_timeout(Duration::from_secs(5))
            .expect("completion never started reading");
    }

    /// Let one blocked reader continue.
    pub fn release(&self) {
        self.release.send(()).unwrap();
    }
}

impl DocumentStore for StallingStore {
    fn open_read(&self, handle: &DocumentHandle) -> Result<Box<dyn Read + Send>> {
        let inner = self.inner.open_read(handle)?;
        Ok(Box::new(StallingReader {
            inner,
            entered: Some(self.entered.lock().unwrap().clone()),
            release: Arc::clone(&self.release),
        }))
    }

    fn open_write(&self, handle: &DocumentHandle) -> Result<Box<dyn Write + Send>> {
        self.inner.open_write(handle)
    }
}

struct StallingReader {
    inner: Box<dyn Read + Send>,
    entered: Option<Sender<()>>,
    release: Arc<Mutex<Receiver<()>>>,
}

impl Read for StallingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(entered) = self.entered.take() {
            let _ = entered.send(());
            let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(10));
        }
        self.inner.read(buf)
    }
}

/// Picker that hands every launched request to the test thread.
pub struct ScriptedPicker {
    requests: Mutex<Sender<PickerRequest>>,
}

impl DocumentPicker for ScriptedPicker {
    fn launch(&self, request: PickerRequest) -> Result<()> {
        self.requests.lock().unwrap().send(request)?;
        Ok(())
    }
}

/// Picker whose host is gone.
pub struct RefusingPicker;

impl DocumentPicker for RefusingPicker {
    fn launch(&self, _request: PickerRequest) -> Result<()> {
        bail!("activity destroyed")
    }
}

pub struct Harness {
    pub bridge: RequestBridge,
    pub sink: CompletionSink,
    pub requests: Receiver<PickerRequest>,
    pub store: MemoryStore,
    pub notifier: RecordingNotifier,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let store = MemoryStore::new();
        Self::build(config, Arc::new(store.clone()), store)
    }

    /// Harness whose document reads hang until the returned [`Stall`]
    /// releases them.
    pub fn stalling() -> (Self, Stall) {
        let store = MemoryStore::new();
        let (stalling, stall) = StallingStore::new(store.clone());
        (Self::build(BridgeConfig::default(), Arc::new(stalling), store), stall)
    }

    fn build(config: BridgeConfig, backend: Arc<dyn DocumentStore>, store: MemoryStore) -> Self {
        let (sender, requests) = mpsc::channel();
        let notifier = RecordingNotifier::default();
        let bridge = RequestBridge::new(
            config,
            Arc::new(ScriptedPicker {
                requests: Mutex::new(sender),
            }),
            backend,
            Arc::new(notifier.clone()),
        );
        let sink = bridge.completion_sink();
        Self {
            bridge,
            sink,
            requests,
            store,
            notifier,
        }
    }

    /// The next request the bridge launched.
    pub fn next_request(&self) -> PickerRequest {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("bridge did not launch a picker request")
    }
}
