//! Decision chain evaluation.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::{DecisionAction, DecisionContext, Decisions, Error, Response};

/// Outcome of evaluating a decision list against one response.
#[derive(Debug)]
pub enum Verdict<S> {
    /// A decision produced the success value.
    Done(S),
    /// A decision produced an error.
    Errored(Error),
    /// The request must be sent again, then evaluated with this list.
    Restart(Decisions),
}

/// Run `decisions` against `response`.
///
/// The head decision is skipped when it does not apply. Otherwise its action
/// either continues with the tail (possibly with a rewritten response) or ends
/// this pass. Running out of decisions is [`Error::DecisionsExhausted`].
pub async fn evaluate<S, F>(
    context: &DecisionContext<'_>,
    response: Response<Bytes>,
    decisions: Decisions,
) -> Verdict<S>
where
    S: DeserializeOwned,
    F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    let mut response = response;
    let mut decisions = decisions;

    loop {
        let Some((decision, rest)) = decisions.split_first() else {
            return Verdict::Errored(Error::DecisionsExhausted);
        };

        if !decision.should_apply(context, &response) {
            trace!(%decision, status = response.status(), "decision skipped");
            decisions = rest;
            continue;
        }

        debug!(%decision, status = response.status(), "decision applies");
        match decision.apply::<S, F>(context, &response, rest.clone()).await {
            DecisionAction::ContinueWith(next) => {
                response = next;
                decisions = rest;
            }
            DecisionAction::RestartWith(next) => return Verdict::Restart(next),
            DecisionAction::Errored(error) => return Verdict::Errored(error),
            DecisionAction::Done(value) => return Verdict::Done(value),
        }
    }
}
