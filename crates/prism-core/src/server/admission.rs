//! `POST /process`: validate a transformation request and enqueue it.
//!
//! The handler never waits for a queue slot. A request is either admitted
//! immediately or rejected with a status code, and processing happens later
//! on a worker.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, QueryRejection};
use axum::extract::{Form, Query, State};

use crate::convert::Profile;
use crate::error::AdmissionError;
use crate::pipeline::JobSubmitter;
use crate::types::TransformRequest;

/// State shared by every admission call, built once before the server starts.
#[derive(Debug, Clone)]
pub struct AdmissionState {
    submitter: JobSubmitter,
    hostname: String,
    default_profile: Profile,
    default_destination: Option<String>,
}

impl AdmissionState {
    pub fn new(submitter: JobSubmitter, hostname: impl Into<String>) -> Self {
        Self {
            submitter,
            hostname: hostname.into(),
            default_profile: Profile::default(),
            default_destination: None,
        }
    }

    /// Profile used when a request does not name one.
    pub fn with_default_profile(mut self, profile: Profile) -> Self {
        self.default_profile = profile;
        self
    }

    /// Bucket used when a request has no `save-to` field.
    pub fn with_default_destination(mut self, bucket: Option<String>) -> Self {
        self.default_destination = bucket.filter(|b| !b.trim().is_empty());
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn submitter(&self) -> &JobSubmitter {
        &self.submitter
    }

    /// Turn the submitted form fields into a [`TransformRequest`].
    pub fn build_request(&self, form: &ProcessForm) -> Result<TransformRequest, AdmissionError> {
        let id = form
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AdmissionError::MalformedRequest("missing id".into()))?;

        let profile = match form.profile.as_deref().map(str::trim) {
            None | Some("") => self.default_profile,
            Some(name) => name.parse().map_err(AdmissionError::MalformedRequest)?,
        };

        let destination = form
            .save_to
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .or(self.default_destination.as_deref())
            .unwrap_or_default();

        TransformRequest::new(id, destination, profile)
    }
}

/// Fields accepted by `POST /process`.
#[derive(Debug, Default)]
pub struct ProcessForm {
    /// Source object as `bucket/object-name`
    pub id: Option<String>,
    /// The `save-to` field
    pub save_to: Option<String>,
    pub profile: Option<String>,
}

type Pairs = Vec<(String, String)>;

impl ProcessForm {
    /// Collect fields from a urlencoded body and the query string.
    ///
    /// Body values come before query values, and the first value of a
    /// repeated key is the one used.
    pub fn from_pairs(body: &[(String, String)], query: &[(String, String)]) -> Self {
        let first = |key: &str| {
            body.iter()
                .chain(query)
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        Self {
            id: first("id"),
            save_to: first("save-to"),
            profile: first("profile"),
        }
    }
}

pub(crate) async fn process(
    State(state): State<Arc<AdmissionState>>,
    query: Result<Query<Pairs>, QueryRejection>,
    body: Result<Form<Pairs>, FormRejection>,
) -> Result<String, AdmissionError> {
    let query = query.map(|Query(pairs)| pairs).unwrap_or_else(|rejection| {
        tracing::debug!("Unreadable query string: {rejection}");
        Vec::new()
    });
    let body = body.map(|Form(pairs)| pairs).unwrap_or_else(|rejection| {
        tracing::debug!("Unreadable form body: {rejection}");
        Vec::new()
    });
    let form = ProcessForm::from_pairs(&body, &query);

    let result = state
        .build_request(&form)
        .and_then(|request| admit(&state, request));
    if let Err(e) = &result {
        tracing::warn!("Rejected request for {:?}: {e}", form.id.as_deref().unwrap_or(""));
    }
    result?;
    Ok(format!("hostname={}", state.hostname))
}

fn admit(state: &AdmissionState, request: TransformRequest) -> Result<(), AdmissionError> {
    let (id, source, destination) = (
        request.id(),
        request.source().clone(),
        request.destination().clone(),
    );
    state.submitter.try_submit(request)?;
    tracing::debug!(
        "Accepted request {id}: {source} -> {destination} ({}/{} queued)",
        state.submitter.len(),
        state.submitter.capacity()
    );
    Ok(())
}
