use super::RoiService;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Test double that echoes a fixed transformation of its input.
#[derive(Clone)]
pub struct MockRoiProcessor {
    process_count: Arc<Mutex<usize>>,
    output_prefix: Vec<u8>,
    fail_on_call: Arc<Mutex<Option<usize>>>,
}

impl MockRoiProcessor {
    pub fn new() -> Self {
        Self {
            process_count: Arc::new(Mutex::new(0)),
            output_prefix: b"roi:".to_vec(),
            fail_on_call: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_output_prefix(mut self, prefix: &[u8]) -> Self {
        self.output_prefix = prefix.to_vec();
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.fail_on_call.lock().unwrap() = should_fail.then_some(1);
        self
    }

    /// Fail the `call`-th invocation (1-based) and every one after it.
    pub fn with_failure_on_call(self, call: usize) -> Self {
        *self.fail_on_call.lock().unwrap() = Some(call);
        self
    }

    pub fn get_process_count(&self) -> usize {
        *self.process_count.lock().unwrap()
    }
}

impl Default for MockRoiProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoiService for MockRoiProcessor {
    async fn detect_and_crop(&self, image_data: &[u8], _media_type: &str) -> Result<Vec<u8>> {
        let call = {
            let mut count = self.process_count.lock().unwrap();
            *count += 1;
            *count
        };

        if let Some(fail_from) = *self.fail_on_call.lock().unwrap() {
            if call >= fail_from {
                return Err(crate::Error::Image(image::ImageError::IoError(
                    std::io::Error::other("Mock failure"),
                )));
            }
        }

        let mut output = self.output_prefix.clone();
        output.extend_from_slice(image_data);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_roi_processor() {
        let processor = MockRoiProcessor::new();

        let result = processor
            .detect_and_crop(b"fake image data", "image/png")
            .await
            .unwrap();

        assert_eq!(result, b"roi:fake image data".to_vec());
        assert_eq!(processor.get_process_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let processor = MockRoiProcessor::new().with_failure(true);

        let result = processor.detect_and_crop(b"data", "image/png").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_fails_from_given_call() {
        let processor = MockRoiProcessor::new()
            .with_output_prefix(b"")
            .with_failure_on_call(2);

        assert_eq!(
            processor.detect_and_crop(b"one", "image/png").await.unwrap(),
            b"one".to_vec()
        );
        assert!(processor.detect_and_crop(b"two", "image/png").await.is_err());
        assert_eq!(processor.get_process_count(), 2);
    }
}
