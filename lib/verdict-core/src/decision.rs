//! Response decisions.
//!
//! A [`Decision`] looks at a complete response and either passes, or turns it
//! into a [`DecisionAction`]. Decisions are kept in an immutable [`Decisions`]
//! list; evaluating one never mutates the list a resend will start from.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use derive_more::Display;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{AuthScheme, Error, Request, Response, TokenRefresher, from_json};

/// Status that triggers a token refresh.
const UNAUTHORIZED: u16 = 401;

/// Predicate of a [`DataMapping`].
pub type MappingCondition = Arc<dyn Fn(&Response<Bytes>) -> bool + Send + Sync>;

/// Body rewrite of a [`DataMapping`].
pub type MappingTransform = Arc<dyn Fn(&Response<Bytes>) -> Bytes + Send + Sync>;

/// A conditional body rewrite, applied before parsing.
#[derive(Clone)]
pub struct DataMapping {
    condition: MappingCondition,
    transform: MappingTransform,
}

impl DataMapping {
    /// Rewrite the body with `transform` when `condition` holds.
    pub fn new<C, T>(condition: C, transform: T) -> Self
    where
        C: Fn(&Response<Bytes>) -> bool + Send + Sync + 'static,
        T: Fn(&Response<Bytes>) -> Bytes + Send + Sync + 'static,
    {
        Self {
            condition: Arc::new(condition),
            transform: Arc::new(transform),
        }
    }

    /// Replace an empty body with `{}`.
    ///
    /// Lets a success type whose fields are all optional parse from a
    /// `204 No Content` style response.
    #[must_use]
    pub fn empty_as_object() -> Self {
        Self::new(
            |response| response.body().is_empty(),
            |_| Bytes::from_static(b"{}"),
        )
    }

    fn matches(&self, response: &Response<Bytes>) -> bool {
        (self.condition)(response)
    }

    fn rewrite(&self, response: &Response<Bytes>) -> Response<Bytes> {
        let body = (self.transform)(response);
        Response::new(response.status(), response.headers().clone(), body)
    }
}

impl fmt::Debug for DataMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMapping").finish_non_exhaustive()
    }
}

/// One step of the response-processing pipeline.
#[derive(Debug, Clone, Display)]
pub enum Decision {
    /// On `401`, refresh the token and resend with the remaining decisions.
    ///
    /// Descriptors without OAuth2 have no token to refresh, so the `401` is
    /// final and surfaces as [`Error::Api`].
    #[display("refresh-token")]
    RefreshToken,
    /// On a non-2xx status, resend while budget remains.
    #[display("retry({remaining})")]
    Retry {
        /// Resends left.
        remaining: u32,
    },
    /// On a non-2xx status, decode the failure payload and stop with
    /// [`Error::Api`].
    #[display("bad-response-status-code")]
    BadResponseStatusCode,
    /// Rewrite the body when a condition holds.
    #[display("data-mapping")]
    DataMapping(DataMapping),
    /// Decode the success payload. Always applies.
    #[display("parse-result")]
    ParseResult,
}

/// What a decision wants to happen next.
#[derive(Debug)]
pub enum DecisionAction<S> {
    /// Keep evaluating the rest of the list against this response.
    ContinueWith(Response<Bytes>),
    /// Resend the request, then evaluate this list.
    RestartWith(Decisions),
    /// Stop with an error.
    Errored(Error),
    /// Stop with a value.
    Done(S),
}

/// What decisions may look at besides the response.
#[derive(Clone, Copy)]
pub struct DecisionContext<'a> {
    /// The request that produced the response.
    pub request: &'a Request<Bytes>,
    /// Authorization scheme of the descriptor.
    pub authorization: &'a AuthScheme,
    /// OAuth2 access token the request was built with.
    pub access_token: Option<&'a str>,
    /// Token refresh hook for [`Decision::RefreshToken`].
    pub refresher: &'a dyn TokenRefresher,
}

impl fmt::Debug for DecisionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionContext")
            .field("method", &self.request.method())
            .field("url", &self.request.url().as_str())
            .finish_non_exhaustive()
    }
}

impl Decision {
    /// Whether this decision handles `response`.
    #[must_use]
    pub fn should_apply(&self, context: &DecisionContext<'_>, response: &Response<Bytes>) -> bool {
        match self {
            Self::RefreshToken => response.status() == UNAUTHORIZED,
            Self::Retry { remaining } => !response.is_success() && *remaining > 0,
            Self::BadResponseStatusCode => !response.is_success(),
            Self::DataMapping(mapping) => mapping.matches(response),
            Self::ParseResult => true,
        }
    }

    /// Handle `response`; `rest` is the list that follows this decision.
    ///
    /// `S` is the success payload type, `F` the failure payload type.
    pub async fn apply<S, F>(
        &self,
        context: &DecisionContext<'_>,
        response: &Response<Bytes>,
        rest: Decisions,
    ) -> DecisionAction<S>
    where
        S: DeserializeOwned,
        F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::RefreshToken => {
                let Some(service) = context.authorization.oauth2_service() else {
                    // nothing to refresh, the rejection is final
                    return DecisionAction::Errored(decode_failure::<F>(response));
                };
                debug!(service, "access token rejected, refreshing");
                match context
                    .refresher
                    .refresh(service, context.access_token)
                    .await
                {
                    Ok(()) => DecisionAction::RestartWith(rest),
                    Err(error) => DecisionAction::Errored(error),
                }
            }
            Self::Retry { remaining } => {
                let remaining = remaining.saturating_sub(1);
                debug!(status = response.status(), remaining, "retrying request");
                DecisionAction::RestartWith(rest.prepend(Self::Retry { remaining }))
            }
            Self::BadResponseStatusCode => DecisionAction::Errored(decode_failure::<F>(response)),
            Self::DataMapping(mapping) => DecisionAction::ContinueWith(mapping.rewrite(response)),
            Self::ParseResult => match from_json::<S>(response.body()) {
                Ok(value) => DecisionAction::Done(value),
                Err(error) => DecisionAction::Errored(error),
            },
        }
    }
}

/// [`Error::Api`] with the decoded failure payload, or the decode error.
fn decode_failure<F>(response: &Response<Bytes>) -> Error
where
    F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    match from_json::<F>(response.body()) {
        Ok(payload) => Error::api(response.status(), payload),
        Err(error) => {
            warn!(status = response.status(), %error, "failed to decode error payload");
            error
        }
    }
}

/// Immutable ordered list of decisions.
///
/// Cloning is cheap; [`Decisions::split_first`] and [`Decisions::prepend`]
/// return new lists and leave `self` untouched.
#[derive(Clone)]
pub struct Decisions {
    items: Arc<[Decision]>,
    start: usize,
}

impl Decisions {
    /// Build a list from decisions, in evaluation order.
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            items: decisions.into_iter().collect(),
            start: 0,
        }
    }

    /// The default pipeline: refresh, retry, bad status, empty body mapping,
    /// parse.
    #[must_use]
    pub fn default_pipeline(retry_budget: u32) -> Self {
        Self::new([
            Decision::RefreshToken,
            Decision::Retry {
                remaining: retry_budget,
            },
            Decision::BadResponseStatusCode,
            Decision::DataMapping(DataMapping::empty_as_object()),
            Decision::ParseResult,
        ])
    }

    /// Remaining decisions, in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Decision> {
        self.as_slice().iter()
    }

    /// Number of remaining decisions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// No decisions remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    /// The head decision and the list after it.
    #[must_use]
    pub fn split_first(&self) -> Option<(&Decision, Self)> {
        let head = self.items.get(self.start)?;
        let tail = Self {
            items: Arc::clone(&self.items),
            start: self.start + 1,
        };
        Some((head, tail))
    }

    /// A new list with `decision` in front of this one.
    #[must_use]
    pub fn prepend(&self, decision: Decision) -> Self {
        Self::new(std::iter::once(decision).chain(self.iter().cloned()))
    }

    fn as_slice(&self) -> &[Decision] {
        self.items.get(self.start..).unwrap_or_default()
    }
}

impl From<Vec<Decision>> for Decisions {
    fn from(decisions: Vec<Decision>) -> Self {
        Self::new(decisions)
    }
}

impl FromIterator<Decision> for Decisions {
    fn from_iter<I: IntoIterator<Item = Decision>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a Decisions {
    type Item = &'a Decision;
    type IntoIter = std::slice::Iter<'a, Decision>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for Decisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for Decisions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, decision) in self.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{decision}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use assert2::{check, let_assert};
    use serde::Deserialize;
    use serde_json::Value;

    use super::*;
    use crate::{BoxFuture, Method, Result};

    #[derive(Debug, Default)]
    struct RecordingRefresher {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail: bool,
    }

    impl TokenRefresher for RecordingRefresher {
        fn refresh<'a>(
            &'a self,
            service: &'a str,
            stale_token: Option<&'a str>,
        ) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .expect("lock")
                    .push((service.to_string(), stale_token.map(str::to_string)));
                if self.fail {
                    Err(Error::MissingRefreshToken {
                        service: service.to_string(),
                    })
                } else {
                    Ok(())
                }
            })
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Failure {
        message: String,
    }

    fn request(authorization: Option<&str>) -> Request<Bytes> {
        let url = url::Url::parse("https://api.example.com/me").expect("url");
        let builder = Request::builder(Method::Get, url);
        match authorization {
            Some(value) => builder.header("Authorization", value).build(),
            None => builder.build(),
        }
    }

    fn response(status: u16, body: &'static str) -> Response<Bytes> {
        Response::new(status, HashMap::new(), Bytes::from_static(body.as_bytes()))
    }

    fn names(decisions: &Decisions) -> Vec<String> {
        decisions.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn refresh_applies_to_any_401() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let oauth = AuthScheme::oauth2("svc");
        let context = DecisionContext {
            request: &request,
            authorization: &oauth,
            access_token: None,
            refresher: &refresher,
        };

        check!(Decision::RefreshToken.should_apply(&context, &response(401, "")));
        check!(!Decision::RefreshToken.should_apply(&context, &response(403, "")));

        let context = DecisionContext {
            authorization: &AuthScheme::NoAuth,
            ..context
        };
        check!(Decision::RefreshToken.should_apply(&context, &response(401, "")));
    }

    #[tokio::test]
    async fn refresh_without_oauth2_is_terminal() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let api_key = AuthScheme::api_key_header("X-Api-Key", "k");
        let context = DecisionContext {
            request: &request,
            authorization: &api_key,
            access_token: None,
            refresher: &refresher,
        };

        let action = Decision::RefreshToken
            .apply::<Value, Failure>(
                &context,
                &response(401, r#"{"message":"bad key"}"#),
                Decisions::default_pipeline(2),
            )
            .await;

        let_assert!(DecisionAction::Errored(error) = action);
        check!(error.status() == Some(401));
        let_assert!(Some(failure) = error.api_payload::<Failure>());
        check!(failure.message == "bad key");
        check!(refresher.calls.lock().expect("lock").is_empty());
    }

    #[test]
    fn retry_needs_budget_and_failure() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let context = DecisionContext {
            request: &request,
            authorization: &AuthScheme::NoAuth,
            access_token: None,
            refresher: &refresher,
        };

        check!((Decision::Retry { remaining: 1 }).should_apply(&context, &response(500, "")));
        check!(!(Decision::Retry { remaining: 0 }).should_apply(&context, &response(500, "")));
        check!(!(Decision::Retry { remaining: 3 }).should_apply(&context, &response(204, "")));
        check!(Decision::ParseResult.should_apply(&context, &response(500, "")));
    }

    #[tokio::test]
    async fn retry_reinserts_itself_with_smaller_budget() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let context = DecisionContext {
            request: &request,
            authorization: &AuthScheme::NoAuth,
            access_token: None,
            refresher: &refresher,
        };
        let pipeline = Decisions::default_pipeline(2);
        let_assert!(Some((_, after_refresh)) = pipeline.split_first());
        let_assert!(Some((retry, rest)) = after_refresh.split_first());

        let action = retry
            .apply::<Value, Value>(&context, &response(500, "{}"), rest)
            .await;

        let_assert!(DecisionAction::RestartWith(next) = action);
        check!(
            names(&next)
                == [
                    "retry(1)",
                    "bad-response-status-code",
                    "data-mapping",
                    "parse-result"
                ]
        );
        // the evaluated list is untouched
        check!(pipeline.len() == 5);
    }

    #[tokio::test]
    async fn refresh_restarts_with_remaining_list() {
        let refresher = RecordingRefresher::default();
        let request = request(Some("Bearer stale"));
        let oauth = AuthScheme::oauth2("svc");
        let context = DecisionContext {
            request: &request,
            authorization: &oauth,
            access_token: Some("stale"),
            refresher: &refresher,
        };
        let pipeline = Decisions::default_pipeline(2);
        let_assert!(Some((refresh, rest)) = pipeline.split_first());

        let action = refresh
            .apply::<Value, Value>(&context, &response(401, ""), rest)
            .await;

        let_assert!(DecisionAction::RestartWith(next) = action);
        check!(
            names(&next)
                == [
                    "retry(2)",
                    "bad-response-status-code",
                    "data-mapping",
                    "parse-result"
                ]
        );
        let calls = refresher.calls.lock().expect("lock");
        check!(*calls == [("svc".to_string(), Some("stale".to_string()))]);
    }

    #[tokio::test]
    async fn refresh_failure_is_terminal() {
        let refresher = RecordingRefresher {
            fail: true,
            ..RecordingRefresher::default()
        };
        let request = request(None);
        let oauth = AuthScheme::oauth2("svc");
        let context = DecisionContext {
            request: &request,
            authorization: &oauth,
            access_token: None,
            refresher: &refresher,
        };

        let action = Decision::RefreshToken
            .apply::<Value, Value>(&context, &response(401, ""), Decisions::new([]))
            .await;

        let_assert!(DecisionAction::Errored(Error::MissingRefreshToken { .. }) = action);
    }

    #[tokio::test]
    async fn bad_status_decodes_failure_payload() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let context = DecisionContext {
            request: &request,
            authorization: &AuthScheme::NoAuth,
            access_token: None,
            refresher: &refresher,
        };

        let action = Decision::BadResponseStatusCode
            .apply::<Value, Failure>(
                &context,
                &response(404, r#"{"message":"not found"}"#),
                Decisions::new([]),
            )
            .await;

        let_assert!(DecisionAction::Errored(error) = action);
        check!(error.status() == Some(404));
        check!(
            error.api_payload::<Failure>()
                == Some(&Failure {
                    message: "not found".to_string()
                })
        );
    }

    #[tokio::test]
    async fn bad_status_with_undecodable_payload_is_decode_error() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let context = DecisionContext {
            request: &request,
            authorization: &AuthScheme::NoAuth,
            access_token: None,
            refresher: &refresher,
        };

        let action = Decision::BadResponseStatusCode
            .apply::<Value, Failure>(&context, &response(500, "oops"), Decisions::new([]))
            .await;

        let_assert!(DecisionAction::Errored(error) = action);
        check!(error.is_decode());
    }

    #[tokio::test]
    async fn empty_body_maps_to_object() {
        let refresher = RecordingRefresher::default();
        let request = request(None);
        let context = DecisionContext {
            request: &request,
            authorization: &AuthScheme::NoAuth,
            access_token: None,
            refresher: &refresher,
        };
        let mapping = Decision::DataMapping(DataMapping::empty_as_object());

        check!(mapping.should_apply(&context, &response(204, "")));
        check!(!mapping.should_apply(&context, &response(200, "[]")));

        let action = mapping
            .apply::<Value, Value>(&context, &response(204, ""), Decisions::new([]))
            .await;
        let_assert!(DecisionAction::ContinueWith(mapped) = action);
        check!(mapped.status() == 204);
        check!(mapped.body().as_ref() == b"{}");
    }

    #[test]
    fn split_and_prepend_do_not_alias() {
        let list = Decisions::from(vec![Decision::BadResponseStatusCode, Decision::ParseResult]);
        let_assert!(Some((head, tail)) = list.split_first());
        check!(head.to_string() == "bad-response-status-code");
        check!(names(&tail) == ["parse-result"]);

        let extended = tail.prepend(Decision::Retry { remaining: 1 });
        check!(names(&extended) == ["retry(1)", "parse-result"]);
        check!(names(&tail) == ["parse-result"]);
        check!(list.len() == 2);

        let_assert!(Some((_, empty)) = tail.split_first());
        check!(empty.is_empty());
        check!(empty.split_first().is_none());
    }

    #[test]
    fn display_lists_names() {
        check!(Decisions::default_pipeline(1).to_string()
            == "[refresh-token, retry(1), bad-response-status-code, data-mapping, parse-result]");
    }
}
