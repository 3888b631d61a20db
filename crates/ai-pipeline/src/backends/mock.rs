use super::{GenerationError, ImageGenerator, ImageModel, ImageSize};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub prompt: String,
    pub size: ImageSize,
    pub model: ImageModel,
}

#[derive(Default)]
struct MockState {
    scripted: VecDeque<Result<String, GenerationError>>,
    calls: Vec<MockCall>,
}

/// Scripted generator. Replies are consumed in order; once exhausted, every
/// call succeeds with a URL derived from the call count.
#[derive(Clone, Default)]
pub struct MockImageGenerator {
    state: Arc<Mutex<MockState>>,
}

impl MockImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeding(url: impl Into<String>) -> Self {
        Self::new().then_ok(url)
    }

    pub fn failing(err: GenerationError) -> Self {
        Self::new().then_err(err)
    }

    pub fn then_ok(self, url: impl Into<String>) -> Self {
        self.state.lock().scripted.push_back(Ok(url.into()));
        self
    }

    pub fn then_err(self, err: GenerationError) -> Self {
        self.state.lock().scripted.push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.state.lock().calls.last().map(|c| c.prompt.clone())
    }
}

#[async_trait::async_trait]
impl ImageGenerator for MockImageGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        size: ImageSize,
        model: ImageModel,
    ) -> Result<String, GenerationError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall {
            prompt: prompt.to_string(),
            size,
            model,
        });
        let n = state.calls.len();
        state
            .scripted
            .pop_front()
            .unwrap_or_else(|| Ok(format!("https://mock.invalid/generated/{n}.png")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_defaults() {
        let mock = MockImageGenerator::succeeding("https://a")
            .then_err(GenerationError::transport("boom"));
        let a = mock.generate("p1", ImageSize::Small, ImageModel::Standard).await;
        let b = mock.generate("p2", ImageSize::Small, ImageModel::Standard).await;
        let c = mock.generate("p3", ImageSize::Large, ImageModel::HighFidelity).await;
        assert_eq!(a.unwrap(), "https://a");
        assert_eq!(b.unwrap_err(), GenerationError::transport("boom"));
        assert_eq!(c.unwrap(), "https://mock.invalid/generated/3.png");
        assert_eq!(mock.calls().len(), 3);
        assert_eq!(mock.last_prompt().as_deref(), Some("p3"));
    }
}
