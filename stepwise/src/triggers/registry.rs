//! Registry of manual steps waiting to be fired.

use crate::core::{BuildId, ParameterSchema, Parameters, StepPath, TriggerId};
use crate::errors::TriggerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::oneshot;

/// What a trigger ID stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRegistration {
    /// The token callers fire.
    pub trigger_id: TriggerId,
    /// The build the waiting step belongs to.
    pub build_id: BuildId,
    /// The waiting step.
    pub path: StepPath,
    /// Parameters the step requires.
    pub parameters: ParameterSchema,
    /// When the step started waiting.
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
struct PendingTrigger {
    registration: TriggerRegistration,
    sender: oneshot::Sender<Parameters>,
}

/// Maps trigger IDs to suspended manual steps.
///
/// Each registration is consumed by exactly one successful [`fire`]. A fire
/// that fails parameter validation leaves the registration in place so the
/// caller can try again.
///
/// [`fire`]: TriggerRegistry::fire
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    pending: DashMap<TriggerId, PendingTrigger>,
}

impl TriggerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiting step under a fresh trigger ID.
    ///
    /// The returned receiver resolves with the parameters once the trigger
    /// is fired, or errors if the registration is cancelled.
    pub fn register(
        &self,
        build_id: BuildId,
        path: StepPath,
        parameters: ParameterSchema,
    ) -> (TriggerRegistration, oneshot::Receiver<Parameters>) {
        let (sender, receiver) = oneshot::channel();
        let registration = TriggerRegistration {
            trigger_id: TriggerId::generate(),
            build_id,
            path,
            parameters,
            registered_at: Utc::now(),
        };

        tracing::debug!(
            trigger_id = %registration.trigger_id,
            build_id = %registration.build_id,
            step_id = %registration.path,
            "Registered trigger"
        );

        self.pending.insert(
            registration.trigger_id.clone(),
            PendingTrigger {
                registration: registration.clone(),
                sender,
            },
        );

        (registration, receiver)
    }

    /// Delivers `parameters` to the step waiting on `trigger_id`.
    ///
    /// Every parameter named in the step's schema must be present and
    /// non-null. Extra parameters are passed through untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError::ParameterMismatch`] without consuming the
    /// registration if a required parameter is missing, and
    /// [`TriggerError::UnknownTrigger`] if the ID was never registered, was
    /// already fired, or its step is no longer waiting.
    pub fn fire(
        &self,
        trigger_id: &TriggerId,
        parameters: Parameters,
    ) -> Result<TriggerRegistration, TriggerError> {
        {
            let pending = self
                .pending
                .get(trigger_id)
                .ok_or_else(|| TriggerError::unknown(trigger_id))?;

            let missing = missing_parameters(&pending.registration.parameters, &parameters);
            if !missing.is_empty() {
                return Err(TriggerError::ParameterMismatch {
                    trigger_id: trigger_id.clone(),
                    missing,
                });
            }
        }

        let (_, pending) = self
            .pending
            .remove(trigger_id)
            .ok_or_else(|| TriggerError::unknown(trigger_id))?;

        pending
            .sender
            .send(parameters)
            .map_err(|_| TriggerError::unknown(trigger_id))?;

        tracing::debug!(
            trigger_id = %trigger_id,
            build_id = %pending.registration.build_id,
            step_id = %pending.registration.path,
            "Trigger fired"
        );

        Ok(pending.registration)
    }

    /// Drops a registration. The waiting step's receiver errors.
    pub fn cancel(&self, trigger_id: &TriggerId) -> bool {
        self.pending.remove(trigger_id).is_some()
    }

    /// Drops every registration of a build. Returns how many were dropped.
    pub fn abandon_build(&self, build_id: &BuildId) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|_, pending| &pending.registration.build_id != build_id);
        before.saturating_sub(self.pending.len())
    }

    /// Returns the registration behind `trigger_id`, if still pending.
    #[must_use]
    pub fn lookup(&self, trigger_id: &TriggerId) -> Option<TriggerRegistration> {
        self.pending
            .get(trigger_id)
            .map(|pending| pending.registration.clone())
    }

    /// Lists every pending registration, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<TriggerRegistration> {
        let mut all: Vec<_> = self
            .pending
            .iter()
            .map(|entry| entry.registration.clone())
            .collect();
        all.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        all
    }

    /// Returns the number of pending registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true if nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn missing_parameters(schema: &ParameterSchema, supplied: &Parameters) -> Vec<String> {
    schema
        .keys()
        .filter(|name| supplied.get(*name).map_or(true, serde_json::Value::is_null))
        .cloned()
        .collect()
}
