//! HTTP transport implementation.
//!
//! The transport is generic over an `HttpClient`, so any blocking HTTP
//! library can be plugged in. `LoopbackClient` routes requests straight
//! into an in-process store handler.

use crate::error::{SyncError, SyncResult};
use crate::transport::StoreTransport;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use sleeplab_protocol::{
    from_json, CalculatedData, CpapPressure, HttpHandler, HttpMethod, HttpResponse, ImagePayload,
    PatientInfo, PatientUpsert, PressureReading, PressureUpdate, PressureUpdated, RoomList,
    StoreRequest, Timestamp, TimestampList, UpsertAck,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Trait for HTTP client implementations.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the status and body.
    ///
    /// `Err` means no response was received at all.
    fn send(&self, method: HttpMethod, url: &str, body: Vec<u8>) -> Result<HttpResponse, String>;

    /// Checks if the client is healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based store transport with JSON bodies.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the store (e.g., "http://127.0.0.1:5000").
    base_url: String,
    client: C,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn execute<Res: DeserializeOwned>(&self, request: StoreRequest) -> SyncResult<Res> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let body = request.body()?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), request.path());
        debug!(operation = request.operation(), %url, "store request");

        // A lost request leaves the transport open; the next poll tries again.
        let response = self.client.send(request.method(), &url, body).map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;
        *self.last_error.write() = None;

        if !response.is_success() {
            return Err(SyncError::from_response(response.status, &response.body));
        }
        from_json(&response.body)
            .map_err(|e| SyncError::Protocol(format!("failed to decode response: {}", e)))
    }
}

impl<C: HttpClient> StoreTransport for HttpTransport<C> {
    fn upsert_patient(&self, request: &PatientUpsert) -> SyncResult<UpsertAck> {
        self.execute(StoreRequest::UpsertPatient(request.clone()))
    }

    fn cpap_pressure(&self, room: u32) -> SyncResult<CpapPressure> {
        let reading: PressureReading = self.execute(StoreRequest::GetCpapPressure { room })?;
        Ok(reading.cpap_pressure)
    }

    fn rooms(&self) -> SyncResult<Vec<u32>> {
        let list: RoomList = self.execute(StoreRequest::GetRooms)?;
        Ok(list.rooms)
    }

    fn patient_info(&self, room: u32) -> SyncResult<PatientInfo> {
        self.execute(StoreRequest::GetPatientInfo { room })
    }

    fn latest_data(&self, room: u32) -> SyncResult<CalculatedData> {
        self.execute(StoreRequest::GetLatestData { room })
    }

    fn timestamps(&self, room: u32) -> SyncResult<Vec<Timestamp>> {
        let list: TimestampList = self.execute(StoreRequest::GetTimestamps { room })?;
        Ok(list.timestamps)
    }

    fn image(&self, room: u32, timestamp: Timestamp) -> SyncResult<String> {
        let payload: ImagePayload = self.execute(StoreRequest::GetImage { room, timestamp })?;
        Ok(payload.flow_image_base64)
    }

    fn update_cpap_pressure(&self, room: u32, cpap_pressure: i64) -> SyncResult<CpapPressure> {
        let updated: PressureUpdated = self.execute(StoreRequest::UpdateCpapPressure {
            room,
            update: PressureUpdate { cpap_pressure },
        })?;
        Ok(updated.cpap_pressure)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A loopback HTTP client that routes requests directly to a store handler.
///
/// Useful for testing without actual network overhead. Taking the client
/// offline makes every request fail as if the network were down.
pub struct LoopbackClient<S: HttpHandler> {
    handler: S,
    online: AtomicBool,
}

impl<S: HttpHandler> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given handler.
    pub fn new(handler: S) -> Self {
        Self {
            handler,
            online: AtomicBool::new(true),
        }
    }

    /// Simulates the network going down or coming back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Returns the wrapped handler.
    pub fn handler(&self) -> &S {
        &self.handler
    }
}

fn path_of(url: &str) -> &str {
    let rest = url.find("://").map_or(url, |i| &url[i + 3..]);
    rest.find('/').map_or("/", |i| &rest[i..])
}

impl<S: HttpHandler> HttpClient for LoopbackClient<S> {
    fn send(&self, method: HttpMethod, url: &str, body: Vec<u8>) -> Result<HttpResponse, String> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(format!("connection refused: {}", url));
        }
        Ok(self.handler.handle(method, path_of(url), &body))
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleeplab_protocol::{to_json, ErrorBody, ErrorKind};

    struct TestClient {
        response: RwLock<Option<HttpResponse>>,
        urls: RwLock<Vec<String>>,
        healthy: AtomicBool,
    }

    impl TestClient {
        fn new() -> Self {
            Self {
                response: RwLock::new(None),
                urls: RwLock::new(Vec::new()),
                healthy: AtomicBool::new(true),
            }
        }

        fn set_response(&self, status: u16, body: Vec<u8>) {
            *self.response.write() = Some(HttpResponse::new(status, body));
        }

        fn set_healthy(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
        }
    }

    impl HttpClient for TestClient {
        fn send(&self, _method: HttpMethod, url: &str, _body: Vec<u8>) -> Result<HttpResponse, String> {
            self.urls.write().push(url.to_string());
            self.response
                .read()
                .clone()
                .ok_or_else(|| "no response set".into())
        }

        fn is_healthy(&self) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn transport_creation() {
        let transport = HttpTransport::new("http://127.0.0.1:5000", TestClient::new());
        assert_eq!(transport.base_url(), "http://127.0.0.1:5000");
        assert!(transport.is_connected());
    }

    #[test]
    fn transport_not_connected_error() {
        let transport = HttpTransport::new("http://127.0.0.1:5000", TestClient::new());
        transport.close().unwrap();
        assert!(matches!(transport.rooms(), Err(SyncError::NotConnected)));
    }

    #[test]
    fn transport_unhealthy_client() {
        let client = TestClient::new();
        client.set_healthy(false);
        let transport = HttpTransport::new("http://127.0.0.1:5000", client);
        assert!(!transport.is_connected());
    }

    #[test]
    fn transport_builds_urls() {
        let client = TestClient::new();
        client.set_response(200, to_json(&RoomList { rooms: vec![101, 102] }).unwrap());
        let transport = HttpTransport::new("http://lab:5000/", client);

        assert_eq!(transport.rooms().unwrap(), vec![101, 102]);
        assert_eq!(transport.client().urls.read()[0], "http://lab:5000/rooms");
    }

    #[test]
    fn transport_failure_keeps_connection() {
        let transport = HttpTransport::new("http://127.0.0.1:5000", TestClient::new());
        let err = transport.rooms().unwrap_err();
        assert!(err.is_retryable());
        assert!(transport.last_error().is_some());
        assert!(transport.is_connected());
    }

    #[test]
    fn transport_maps_error_bodies() {
        let client = TestClient::new();
        client.set_response(
            404,
            to_json(&ErrorBody::new(ErrorKind::NotFound, "room 9 is empty")).unwrap(),
        );
        let transport = HttpTransport::new("http://127.0.0.1:5000", client);
        assert_eq!(
            transport.patient_info(9).unwrap_err(),
            SyncError::NotFound("room 9 is empty".into())
        );
    }

    #[test]
    fn transport_rejects_garbage() {
        let client = TestClient::new();
        client.set_response(200, b"not json".to_vec());
        let transport = HttpTransport::new("http://127.0.0.1:5000", client);
        assert!(matches!(transport.rooms(), Err(SyncError::Protocol(_))));
    }

    #[test]
    fn loopback_path_extraction() {
        assert_eq!(path_of("http://127.0.0.1:5000/rooms"), "/rooms");
        assert_eq!(path_of("http://lab/room/4/timestamps"), "/room/4/timestamps");
        assert_eq!(path_of("/rooms"), "/rooms");
        assert_eq!(path_of("http://lab"), "/");
    }
}
