use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, FetchError};
use crate::result::{Outcome, RuleResult};

/// The callback signature an action stores.
///
/// Receives the node's final outcome, the fetch error when the outcome is
/// FAILED, and the node's result mirror.
pub type ActionCallback =
    dyn Fn(Outcome, Option<&FetchError>, &RuleResult) -> Result<(), BoxError> + Send + Sync;

/// A post-evaluation callback attached to a rule node.
///
/// The evaluator invokes it exactly once, after the node's outcome is final
/// and before the parent's outcome is reported. Actions are runtime-only:
/// the codec neither encodes nor decodes them.
#[derive(Clone)]
pub struct Action {
    description: String,
    callback: Arc<ActionCallback>,
}

impl Action {
    /// Creates an action from a description and a callback.
    pub fn new<F>(description: impl Into<String>, callback: F) -> Action
    where
        F: Fn(Outcome, Option<&FetchError>, &RuleResult) -> Result<(), BoxError>
            + Send
            + Sync
            + 'static,
    {
        Action {
            description: description.into(),
            callback: Arc::new(callback),
        }
    }

    /// The action's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Runs the callback; a callback error is logged and swallowed.
    pub(crate) fn invoke(&self, outcome: Outcome, error: Option<&FetchError>, result: &RuleResult) {
        if let Err(err) = (self.callback)(outcome, error, result) {
            tracing::warn!(
                action = self.description.as_str(),
                error = %err,
                "action callback failed"
            );
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Action {
    /// Callbacks have no useful notion of equality; actions compare by
    /// description, keeping rule equality structural.
    fn eq(&self, other: &Action) -> bool {
        self.description == other.description
    }
}
