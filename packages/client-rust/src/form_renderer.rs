//! Async driver for one form instance.
//!
//! [`FormRenderer`] owns a [`FormState`] and performs the I/O its transitions
//! ask for: the schema load, the edit-mode record load, autocomplete lookups
//! and the final create or update. State sits behind a `parking_lot::Mutex`
//! that is never held across an `.await`, so several operations may be in
//! progress on one instance at once (e.g. two overlapping lookups).
//!
//! Every operation captures the mount epoch before awaiting. A result that
//! comes back after [`FormRenderer::unmount`] finds a newer epoch and is
//! dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use schemaform_core::{
    suggestions_from_lookup, table_name_from_path, ChangeEffect, EntityGateway, FetchPhase,
    FetchState, FormError, FormState, FormView, GatewayError, LookupOrdering, LookupRequest,
    Record, Schema, SchemaSource, Submission, SubmitKind, SubmitOutcome, Suggestion,
};

struct FormInner {
    schema: FetchState<Schema>,
    record: FetchState<()>,
    form: FormState,
    mounted: bool,
    epoch: u64,
}

pub struct FormRenderer {
    gateway: Arc<dyn EntityGateway>,
    schemas: Arc<dyn SchemaSource>,
    schema_path: String,
    table: String,
    editing_id: Option<String>,
    ordering: LookupOrdering,
    inner: Mutex<FormInner>,
}

impl FormRenderer {
    /// Creates an unmounted form for `schema_path`. `editing_id` selects edit
    /// mode; `None` creates a new record.
    pub fn new(
        gateway: Arc<dyn EntityGateway>,
        schemas: Arc<dyn SchemaSource>,
        schema_path: impl Into<String>,
        editing_id: Option<String>,
        ordering: LookupOrdering,
    ) -> Self {
        let schema_path = schema_path.into();
        Self {
            gateway,
            schemas,
            table: table_name_from_path(&schema_path),
            schema_path,
            inner: Mutex::new(FormInner {
                schema: FetchState::Idle,
                record: FetchState::Idle,
                form: FormState::new(editing_id.clone(), ordering),
                mounted: false,
                epoch: 0,
            }),
            editing_id,
            ordering,
        }
    }

    #[must_use]
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn editing_id(&self) -> Option<&str> {
        self.editing_id.as_deref()
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    #[must_use]
    pub fn schema_phase(&self) -> FetchPhase {
        self.inner.lock().schema.phase()
    }

    #[must_use]
    pub fn record_phase(&self) -> FetchPhase {
        self.inner.lock().record.phase()
    }

    /// Snapshot of the draft.
    #[must_use]
    pub fn draft(&self) -> Record {
        self.inner.lock().form.draft().clone()
    }

    #[must_use]
    pub fn errors(&self) -> BTreeMap<String, String> {
        self.inner.lock().form.errors().clone()
    }

    /// Candidates currently shown, with the field they belong to.
    #[must_use]
    pub fn suggestions(&self) -> Option<(String, Vec<Suggestion>)> {
        let inner = self.inner.lock();
        let suggestions = inner.form.suggestions();
        suggestions
            .active_field()
            .map(|field| (field.to_string(), suggestions.visible_for(field).to_vec()))
    }

    /// Loads the schema and, in edit mode, the record.
    ///
    /// The schema is fetched at most once per instance; mounting again after
    /// [`Self::unmount`] reuses it and hydrates a fresh draft. Failures leave
    /// the form empty; they are logged and also returned.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaLoad`] or [`FormError::RecordLoad`].
    pub async fn mount(&self) -> Result<(), FormError> {
        let claimed = {
            let mut inner = self.inner.lock();
            inner.mounted = true;
            match inner.schema.begin_once() {
                Ok(()) => Some(inner.epoch),
                Err(reason) => {
                    debug!(path = %self.schema_path, %reason, "schema fetch skipped");
                    if inner.schema.loaded().is_none() {
                        return Ok(());
                    }
                    None
                }
            }
        };

        if let Some(epoch) = claimed {
            if !self.load_schema(epoch).await? {
                return Ok(());
            }
        }
        self.load_record().await
    }

    /// Settles the claimed schema fetch. Returns `false` when the result was
    /// dropped because the form was unmounted meanwhile.
    async fn load_schema(&self, epoch: u64) -> Result<bool, FormError> {
        let result = self.schemas.load_schema(&self.schema_path).await;

        let mut inner = self.inner.lock();
        if !Self::is_current(&inner, epoch) {
            debug!(path = %self.schema_path, "discarding schema loaded after unmount");
            return Ok(false);
        }
        match result {
            Ok(schema) => {
                info!(path = %self.schema_path, table = %self.table, "form schema loaded");
                inner.schema.finish(Ok(schema));
                Ok(true)
            }
            Err(e) => {
                error!(path = %self.schema_path, error = %e, "failed to load form schema");
                let reason = e.to_string();
                inner.schema.finish(Err(reason.clone()));
                Err(FormError::SchemaLoad {
                    path: self.schema_path.clone(),
                    reason,
                })
            }
        }
    }

    /// Hydrates the draft from storage when editing. No-op in create mode.
    ///
    /// Runs once per mount, so a second call keeps the user's edits.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaNotLoaded`] before the schema arrived, or
    /// [`FormError::RecordLoad`] when the gateway fails.
    pub async fn load_record(&self) -> Result<(), FormError> {
        let Some(id) = self.editing_id.as_deref() else {
            return Ok(());
        };

        let epoch = {
            let mut inner = self.inner.lock();
            if inner.schema.loaded().is_none() {
                return Err(FormError::SchemaNotLoaded);
            }
            if let Err(reason) = inner.record.begin_once() {
                debug!(table = %self.table, record_id = id, %reason, "record fetch skipped");
                return Ok(());
            }
            inner.epoch
        };

        let result = self.gateway.get_by_id(&self.table, id).await;

        let mut guard = self.inner.lock();
        if !Self::is_current(&guard, epoch) {
            debug!(table = %self.table, record_id = id, "discarding record loaded after unmount");
            return Ok(());
        }
        let FormInner {
            schema,
            record,
            form,
            ..
        } = &mut *guard;
        match result {
            Ok(response) => {
                if let Some(schema) = schema.loaded() {
                    form.hydrate(schema, &response);
                }
                record.finish(Ok(()));
                info!(table = %self.table, record_id = id, "record loaded for editing");
                Ok(())
            }
            Err(source) => {
                error!(table = %self.table, record_id = id, error = %source, "failed to load record");
                record.finish(Err(source.to_string()));
                Err(FormError::RecordLoad {
                    table: self.table.clone(),
                    id: id.to_string(),
                    source,
                })
            }
        }
    }

    /// Applies a change to field `name` without performing the lookup it may
    /// request. Pair with [`Self::resolve_lookup`], or use [`Self::input`].
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaNotLoaded`] before the schema arrived.
    pub fn change(&self, name: &str, value: impl Into<Value>) -> Result<ChangeEffect, FormError> {
        let mut guard = self.inner.lock();
        let FormInner { schema, form, .. } = &mut *guard;
        let schema = schema.loaded().ok_or(FormError::SchemaNotLoaded)?;
        Ok(form.apply_change(schema, name, value))
    }

    /// Runs `request` against the gateway and publishes the candidates.
    ///
    /// A failed lookup is logged and publishes nothing for the field.
    /// Returns whether the response was applied.
    pub async fn resolve_lookup(&self, request: &LookupRequest) -> bool {
        let epoch = self.inner.lock().epoch;

        let candidates = match self
            .gateway
            .lookup_by_name(&request.source, &request.text)
            .await
        {
            Ok(response) => suggestions_from_lookup(&response),
            Err(e) => {
                warn!(field = %request.field, source = %request.source, error = %e, "autocomplete lookup failed");
                Vec::new()
            }
        };

        let mut inner = self.inner.lock();
        if !Self::is_current(&inner, epoch) {
            debug!(field = %request.field, "discarding lookup resolved after unmount");
            return false;
        }
        inner.form.apply_lookup_response(request, candidates)
    }

    /// Applies a change and, for foreign-key text, runs the lookup it asks for.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaNotLoaded`] before the schema arrived.
    pub async fn input(&self, name: &str, value: impl Into<Value>) -> Result<(), FormError> {
        if let ChangeEffect::Lookup(request) = self.change(name, value)? {
            self.resolve_lookup(&request).await;
        }
        Ok(())
    }

    /// Accepts the visible candidate at `index` for the active field.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaNotLoaded`] before the schema arrived.
    pub fn select(&self, index: usize) -> Result<bool, FormError> {
        let mut guard = self.inner.lock();
        let FormInner { schema, form, .. } = &mut *guard;
        let schema = schema.loaded().ok_or(FormError::SchemaNotLoaded)?;
        Ok(form.select_suggestion(schema, index))
    }

    /// Validates, normalizes and dispatches the draft.
    ///
    /// Validation failures never reach the gateway. A rejected write keeps
    /// the draft so the user can resubmit.
    ///
    /// # Errors
    ///
    /// [`FormError::Validation`] with the empty required fields,
    /// [`FormError::Submit`] when storage rejects the write, or
    /// [`FormError::SchemaNotLoaded`].
    pub async fn submit(&self) -> Result<SubmitOutcome, FormError> {
        let (submission, epoch) = {
            let mut guard = self.inner.lock();
            let epoch = guard.epoch;
            let FormInner { schema, form, .. } = &mut *guard;
            let schema = schema.loaded().ok_or(FormError::SchemaNotLoaded)?;
            match form.begin_submit(schema) {
                Ok(submission) => (submission, epoch),
                Err(e) => {
                    info!(table = %self.table, error = %e, "submission blocked by validation");
                    return Err(e);
                }
            }
        };

        let result = self.dispatch(&submission).await;

        let mut inner = self.inner.lock();
        let current = Self::is_current(&inner, epoch);
        match result {
            Ok(()) => {
                info!(table = %self.table, record_id = ?self.editing_id, "record saved");
                if current {
                    inner.form.apply_submit_result(Ok(()));
                }
                Ok(SubmitOutcome::Saved)
            }
            Err(source) => {
                error!(table = %self.table, record_id = ?self.editing_id, error = %source, "failed to save record");
                if current {
                    inner.form.apply_submit_result(Err(source.to_string()));
                }
                Err(FormError::Submit {
                    table: self.table.clone(),
                    source,
                })
            }
        }
    }

    async fn dispatch(&self, submission: &Submission) -> Result<(), GatewayError> {
        match &submission.kind {
            SubmitKind::Create => self.gateway.create(&self.table, &submission.payload).await,
            SubmitKind::Update { id } => {
                self.gateway
                    .update(&self.table, id, &submission.payload)
                    .await
            }
        }
        .map(|_| ())
    }

    /// Detaches the form. The draft is discarded and any result still in
    /// flight is dropped when it arrives. A loaded schema is kept; a schema
    /// fetch cut short is released so the next mount issues it again.
    pub fn unmount(&self) {
        let mut inner = self.inner.lock();
        inner.mounted = false;
        inner.epoch += 1;
        if inner.schema.is_in_flight() {
            inner.schema.reset();
        }
        inner.record.reset();
        inner.form = FormState::new(self.editing_id.clone(), self.ordering);
        debug!(path = %self.schema_path, "form unmounted");
    }

    /// Renders the form. Without a loaded schema the section list is empty.
    #[must_use]
    pub fn view(&self) -> FormView {
        let inner = self.inner.lock();
        match inner.schema.loaded() {
            Some(schema) => inner.form.view(schema),
            None => inner.form.view(&Schema::default()),
        }
    }

    fn is_current(inner: &FormInner, epoch: u64) -> bool {
        inner.epoch == epoch
    }
}
