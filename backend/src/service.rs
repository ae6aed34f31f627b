use std::sync::Arc;

use shared::{parse_vote_form, validate_vote_label, PageView, Tally, VoteAction, VoteForm, VoteOptions};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::ApiError;
use crate::store::{CounterStore, StoreError};
use crate::metrics;
use crate::telemetry::{attributes, Telemetry, TraceContext};
use crate::utils::vote_event_name;

/// Read, vote and reset logic behind `/`. Holds no counter state of its own;
/// the store is the source of truth.
pub struct VoteService {
    store: Arc<dyn CounterStore>,
    telemetry: Telemetry,
    options: VoteOptions,
    title: String,
    strict_votes: bool,
}

impl VoteService {
    pub fn new(settings: &Settings, store: Arc<dyn CounterStore>, telemetry: Telemetry) -> Self {
        Self {
            store,
            telemetry,
            options: settings.options.clone(),
            title: settings.title.clone(),
            strict_votes: settings.strict_votes,
        }
    }

    /// Current counts, one trace span per option under `trace`.
    pub async fn current(&self, trace: &TraceContext) -> Result<PageView, ApiError> {
        let mut counts = [0i64; 2];
        for (slot, label) in counts.iter_mut().zip(self.options.labels()) {
            let mut span = self.telemetry.start_span(vote_event_name(label), Some(trace));
            span.set_attribute("option", label);
            *slot = self.store.get_count(label).await?;
            span.set_attribute("count", *slot);
            span.end();
        }
        Ok(self.page(Tally { value1: counts[0], value2: counts[1] }))
    }

    pub async fn submit(&self, form: &VoteForm, trace: &TraceContext) -> Result<PageView, ApiError> {
        match parse_vote_form(form)? {
            VoteAction::Reset => self.reset(trace).await,
            VoteAction::Vote(label) => self.vote(&label, trace).await,
        }
    }

    /// Two independent writes, not atomic as a pair: a vote that lands between
    /// them can be lost.
    pub async fn reset(&self, trace: &TraceContext) -> Result<PageView, ApiError> {
        for label in self.options.labels() {
            self.store.set_count(label, 0).await?;
        }
        metrics::record_reset();
        info!(trace_id = %trace.trace_id, "Counters reset");

        let tally = self.read_tally().await?;
        self.log_tally(tally, trace);
        Ok(self.page(tally))
    }

    /// Unknown labels are written through to the store unless strict mode is
    /// on, in which case they are rejected before touching it.
    pub async fn vote(&self, label: &str, trace: &TraceContext) -> Result<PageView, ApiError> {
        if self.strict_votes {
            validate_vote_label(label, &self.options)?;
        } else if !self.options.contains(label) {
            warn!(label, "Vote for an unconfigured option");
        }

        let count = self.store.increment_count(label, 1).await?;
        metrics::record_vote(label);
        debug!(label, count, trace_id = %trace.trace_id, "Vote recorded");

        let tally = self.read_tally().await?;
        self.log_tally(tally, trace);
        self.telemetry
            .custom_event(trace, vote_event_name(label), attributes([("vote", label)]));
        Ok(self.page(tally))
    }

    async fn read_tally(&self) -> Result<Tally, StoreError> {
        Ok(Tally {
            value1: self.store.get_count(&self.options.first).await?,
            value2: self.store.get_count(&self.options.second).await?,
        })
    }

    fn log_tally(&self, tally: Tally, trace: &TraceContext) {
        for (label, count) in self.options.labels().into_iter().zip([tally.value1, tally.value2]) {
            let name = vote_event_name(label);
            info!(option = label, count, trace_id = %trace.trace_id, "{}", name);
            self.telemetry.log_event(trace, name.clone(), attributes([(name, count)]));
        }
    }

    fn page(&self, tally: Tally) -> PageView {
        PageView::new(&self.title, &self.options, tally)
    }
}
