//! Mock recording backend.
//!
//! A [`RecordingBackend`] that succeeds or fails on demand and counts calls,
//! so dispatcher tests can check that a request never reached the backend.

use async_trait::async_trait;
use rc_service::errors::RcError;
use rc_service::recording::RecordingBackend;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub struct MockRecordingBackend {
    stream_url: Option<String>,
    return_error: bool,
    start_count: AtomicUsize,
    stop_count: AtomicUsize,
    rooms: Mutex<Vec<String>>,
}

impl MockRecordingBackend {
    /// Create a mock that always succeeds without a stream URL.
    pub fn accepting() -> Self {
        Self::build(None, false)
    }

    /// Create a mock whose `start` returns the given stream URL.
    pub fn with_url(url: &str) -> Self {
        Self::build(Some(url.to_string()), false)
    }

    /// Create a mock that returns upstream errors.
    pub fn failing() -> Self {
        Self::build(None, true)
    }

    fn build(stream_url: Option<String>, return_error: bool) -> Self {
        Self {
            stream_url,
            return_error,
            start_count: AtomicUsize::new(0),
            stop_count: AtomicUsize::new(0),
            rooms: Mutex::new(Vec::new()),
        }
    }

    /// Number of `start` calls made.
    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls made.
    pub fn stop_count(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }

    /// Total calls made.
    pub fn call_count(&self) -> usize {
        self.start_count() + self.stop_count()
    }

    /// Rooms passed to the backend, in call order.
    pub fn rooms(&self) -> Vec<String> {
        self.rooms.lock().unwrap().clone()
    }

    fn record_call(&self, room_id: &str) -> Result<(), RcError> {
        self.rooms.lock().unwrap().push(room_id.to_string());
        if self.return_error {
            return Err(RcError::Upstream("Mock recording backend error".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordingBackend for MockRecordingBackend {
    async fn start(&self, room_id: &str) -> Result<Option<String>, RcError> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        self.record_call(room_id)?;
        Ok(self.stream_url.clone())
    }

    async fn stop(&self, room_id: &str) -> Result<(), RcError> {
        self.stop_count.fetch_add(1, Ordering::SeqCst);
        self.record_call(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_accepting() {
        let mock = MockRecordingBackend::accepting();
        assert_eq!(mock.start("r1").await.unwrap(), None);
        mock.stop("r1").await.unwrap();

        assert_eq!(mock.start_count(), 1);
        assert_eq!(mock.stop_count(), 1);
        assert_eq!(mock.rooms(), vec!["r1", "r1"]);
    }

    #[tokio::test]
    async fn test_mock_with_url() {
        let mock = MockRecordingBackend::with_url("rtmp://media/r1");
        assert_eq!(
            mock.start("r1").await.unwrap().as_deref(),
            Some("rtmp://media/r1")
        );
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let mock = MockRecordingBackend::failing();
        assert!(matches!(mock.start("r1").await, Err(RcError::Upstream(_))));
        assert!(mock.stop("r1").await.is_err());
        assert_eq!(mock.call_count(), 2);
    }
}
