//! Resolver backed by a chat-completions endpoint

use crate::error::TransportError;
use crate::payload::parse_payload;
use crate::retry::RetryPolicy;
use crate::transport::{ChatMessage, ChatRequest, ChatTransport, ResponseFormat};
use async_trait::async_trait;
use chirality_algebra::{RawGrid, RequestPayload, ResolutionError, ResolveRequest, Resolver};
use chirality_core::{canonicalize, BackendDescriptor, Dimensions, Grid, GridKind, OperationKind};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default completion token ceiling
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Sampling temperature used for `kind`
#[must_use]
pub fn temperature(kind: OperationKind) -> f32 {
    match kind {
        OperationKind::Merge | OperationKind::Interpret => 0.5,
        OperationKind::Combine | OperationKind::Elementwise | OperationKind::Expand => 0.7,
    }
}

#[derive(Serialize)]
struct InputValues<'a> {
    kind: GridKind,
    shape: Dimensions,
    cells: Vec<Vec<&'a str>>,
}

/// User message: the hashed request payload plus the input values
#[derive(Serialize)]
struct UserMessage<'a> {
    request: &'a RequestPayload,
    inputs: Vec<InputValues<'a>>,
}

/// Resolves operations by asking a chat model for a JSON grid
pub struct RemoteResolver {
    transport: Arc<dyn ChatTransport>,
    vendor: String,
    model: String,
    version: Option<String>,
    max_tokens: u32,
    policy: RetryPolicy,
}

impl fmt::Debug for RemoteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteResolver")
            .field("vendor", &self.vendor)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RemoteResolver {
    pub fn new(transport: Arc<dyn ChatTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            vendor: "openai".into(),
            model: model.into(),
            version: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn chat_request(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<ChatRequest, ResolutionError> {
        let message = UserMessage {
            request: &request.user,
            inputs: inputs
                .iter()
                .map(|g| InputValues {
                    kind: g.kind(),
                    shape: g.dimensions(),
                    cells: (0..g.rows())
                        .filter_map(|r| g.row(r))
                        .map(|row| row.iter().map(|cell| cell.text()).collect())
                        .collect(),
                })
                .collect(),
        };
        Ok(ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(request.system.clone()),
                ChatMessage::user(canonicalize(&message)?),
            ],
            temperature: temperature(kind),
            max_tokens: self.max_tokens,
            response_format: ResponseFormat::json_object(),
        })
    }

    async fn attempt(&self, chat: &ChatRequest) -> Result<String, TransportError> {
        tokio::time::timeout(self.policy.timeout, self.transport.complete(chat))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }
}

#[async_trait]
impl Resolver for RemoteResolver {
    async fn resolve(
        &self,
        kind: OperationKind,
        inputs: &[&Grid],
        request: &ResolveRequest,
    ) -> Result<RawGrid, ResolutionError> {
        let chat = self.chat_request(kind, inputs, request)?;
        let expected = request.user.target_shape;
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();

        for attempt in 0..max_attempts {
            match self.attempt(&chat).await {
                Ok(content) => {
                    debug!(%kind, model = %self.model, attempt = attempt + 1, "completion received");
                    // Malformed or mis-shaped payloads are final
                    return parse_payload(&content, expected);
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        %kind,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %err,
                        "resolver attempt failed - retrying"
                    );
                    last = err.to_string();
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                    }
                }
                Err(err) => return Err(ResolutionError::Rejected(err.to_string())),
            }
        }

        Err(ResolutionError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }

    fn backend(&self) -> BackendDescriptor {
        let backend = BackendDescriptor::new(self.vendor.clone(), self.model.clone());
        match &self.version {
            Some(version) => backend.with_version(version.clone()),
            None => backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockChatTransport;
    use chirality_algebra::{Algebra, AlgebraError, OperationContext};
    use chirality_test_utils::{fixed_timestamp, grid, test_thread};
    use mockall::predicate::function;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(5))
    }

    fn resolver(mock: MockChatTransport) -> RemoteResolver {
        RemoteResolver::new(Arc::new(mock), "gpt-4o").with_policy(fast_policy())
    }

    fn inputs() -> (Grid, Grid) {
        let thread = test_thread("remote");
        (
            grid(GridKind::A, &thread, &[&["x"]]),
            grid(GridKind::B, &thread, &[&["y"]]),
        )
    }

    #[tokio::test]
    async fn sends_json_request_and_parses_reply() {
        let mut mock = MockChatTransport::new();
        mock.expect_complete()
            .with(function(|req: &ChatRequest| {
                req.model == "gpt-4o"
                    && req.response_format == ResponseFormat::json_object()
                    && (req.temperature - 0.7).abs() < f32::EPSILON
                    && req.messages.len() == 2
                    && req.messages[0].role == "system"
                    && req.messages[1].content.contains("\"x\"")
                    && req.messages[1].content.contains("C = A * B")
            }))
            .times(1)
            .returning(|_| Ok(r#"{"shape":[1,1],"cells":[["x and y"]]}"#.to_string()));

        let (a, b) = inputs();
        let algebra = Algebra::new(Arc::new(resolver(mock)));
        let ctx = OperationContext::new(test_thread("remote"), fixed_timestamp());
        let (c, op) = algebra.combine(&a, &b, &ctx).await.unwrap();

        assert_eq!(c.values(), vec![vec!["x and y".to_string()]]);
        assert_eq!(op.backend().to_string(), "openai/gpt-4o");
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut mock = MockChatTransport::new();
        mock.expect_complete().times(3).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(TransportError::Status {
                    status: 503,
                    body: "busy".into(),
                })
            } else {
                Ok(r#"{"text":"ok"}"#.to_string())
            }
        });

        let (a, b) = inputs();
        let algebra = Algebra::new(Arc::new(resolver(mock)));
        let ctx = OperationContext::new(test_thread("remote"), fixed_timestamp());
        let (m, _) = algebra.merge(&a, &b, &ctx).await.unwrap();
        assert_eq!(m.get(0, 0).unwrap().text(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_is_transient_at_the_algebra_level() {
        let mut mock = MockChatTransport::new();
        mock.expect_complete()
            .times(3)
            .returning(|_| Err(TransportError::Connect("refused".into())));

        let (a, b) = inputs();
        let algebra = Algebra::new(Arc::new(resolver(mock)));
        let ctx = OperationContext::new(test_thread("remote"), fixed_timestamp());
        let err = algebra.merge(&a, &b, &ctx).await.unwrap_err();

        assert!(matches!(
            err,
            AlgebraError::Resolution(ResolutionError::Exhausted { attempts: 3, .. })
        ));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let mut mock = MockChatTransport::new();
        mock.expect_complete().times(1).returning(|_| {
            Err(TransportError::Status {
                status: 401,
                body: "bad key".into(),
            })
        });

        let (a, b) = inputs();
        let request = ResolveRequest::build(
            OperationKind::Merge,
            &[&a, &b],
            Dimensions::new(1, 1),
            GridKind::D,
            &test_thread("remote"),
            "objectives",
        );
        let err = resolver(mock)
            .resolve(OperationKind::Merge, &[&a, &b], &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::Rejected(_)));
    }

    #[tokio::test]
    async fn malformed_payload_is_not_retried() {
        let mut mock = MockChatTransport::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok(r#"{"shape":[2,2],"cells":[["a","b"],["c","d"]]}"#.to_string()));

        let (a, _) = inputs();
        let request = ResolveRequest::build(
            OperationKind::Interpret,
            &[&a],
            Dimensions::new(1, 1),
            GridKind::J,
            &test_thread("remote"),
            "objectives",
        );
        let err = resolver(mock)
            .resolve(OperationKind::Interpret, &[&a], &request)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ShapeMismatch { .. }));
    }

    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait]
    impl ChatTransport for StalledTransport {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, TransportError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(r#"{"text":"late"}"#.to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn each_attempt_is_bounded_by_the_timeout() {
        let remote = RemoteResolver::new(Arc::new(StalledTransport), "gpt-4o").with_policy(
            RetryPolicy::new(2, Duration::from_secs(1), Duration::from_secs(10)),
        );
        let (a, _) = inputs();
        let request = ResolveRequest::build(
            OperationKind::Interpret,
            &[&a],
            Dimensions::new(1, 1),
            GridKind::J,
            &test_thread("remote"),
            "objectives",
        );
        let err = remote
            .resolve(OperationKind::Interpret, &[&a], &request)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Exhausted {
                attempts: 2,
                last: TransportError::Timeout.to_string(),
            }
        );
    }

    #[test]
    fn temperatures_per_kind() {
        assert!((temperature(OperationKind::Merge) - 0.5).abs() < f32::EPSILON);
        assert!((temperature(OperationKind::Interpret) - 0.5).abs() < f32::EPSILON);
        assert!((temperature(OperationKind::Elementwise) - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn backend_includes_version() {
        let remote = RemoteResolver::new(Arc::new(StalledTransport), "gpt-4o")
            .with_vendor("local")
            .with_version("2024-08");
        assert_eq!(remote.backend().to_string(), "local/gpt-4o@2024-08");
    }
}
