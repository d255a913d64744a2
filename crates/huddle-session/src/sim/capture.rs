use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::capture::{AudioCapture, CaptureConstraints, CaptureStream};
use crate::error::CaptureError;

use super::lock;

/// Simulated microphone.
#[derive(Default)]
pub struct SimCapture {
    failure: Option<CaptureError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_constraints: Mutex<Option<CaptureConstraints>>,
}

impl SimCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A microphone that always fails with `err`.
    pub fn failing(err: CaptureError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<CaptureConstraints> {
        *lock(&self.last_constraints)
    }
}

#[async_trait]
impl AudioCapture for SimCapture {
    async fn acquire(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<CaptureStream, CaptureError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_constraints) = Some(*constraints);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(err) => Err(err.clone()),
            None => Ok(CaptureStream {
                device_id: "sim-default".into(),
                constraints: *constraints,
            }),
        }
    }
}
