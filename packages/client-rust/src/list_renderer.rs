//! Async driver for one list instance and the form embedded over it.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use schemaform_core::view::DELETE_QUESTION;
use schemaform_core::{
    ConfirmPrompt, EntityGateway, FetchPhase, FormError, FormTarget, GatewayError, ListState,
    ListView, LookupOrdering, PageRequest, Record, SchemaSource, SubmitOutcome, WindowTarget,
};

use crate::form_renderer::FormRenderer;

/// Result of [`ListRenderer::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The prompt was declined; nothing was sent.
    Declined,
}

struct ListInner {
    list: ListState,
    form: Option<Arc<FormRenderer>>,
    mounted: bool,
    epoch: u64,
}

pub struct ListRenderer {
    gateway: Arc<dyn EntityGateway>,
    schemas: Arc<dyn SchemaSource>,
    schema_path: String,
    table: String,
    ordering: LookupOrdering,
    inner: Mutex<ListInner>,
}

impl ListRenderer {
    pub fn new(
        gateway: Arc<dyn EntityGateway>,
        schemas: Arc<dyn SchemaSource>,
        schema_path: impl Into<String>,
        page_size: u32,
        ordering: LookupOrdering,
    ) -> Self {
        let list = ListState::new(schema_path, page_size);
        Self {
            gateway,
            schemas,
            schema_path: list.schema_path().to_string(),
            table: list.table().to_string(),
            ordering,
            inner: Mutex::new(ListInner {
                list,
                form: None,
                mounted: false,
                epoch: 0,
            }),
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
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }

    #[must_use]
    pub fn schema_phase(&self) -> FetchPhase {
        self.inner.lock().list.schema_phase()
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.inner.lock().list.pagination().current_page()
    }

    #[must_use]
    pub fn total_pages(&self) -> u32 {
        self.inner.lock().list.pagination().total_pages()
    }

    /// Records of the displayed page.
    #[must_use]
    pub fn records(&self) -> Vec<Record> {
        self.inner.lock().list.records().to_vec()
    }

    #[must_use]
    pub fn form_target(&self) -> Option<FormTarget> {
        self.inner.lock().list.form_target().cloned()
    }

    /// The form currently open over the list.
    #[must_use]
    pub fn form(&self) -> Option<Arc<FormRenderer>> {
        self.inner.lock().form.clone()
    }

    /// Loads the columns and the first page concurrently.
    ///
    /// A page failure is logged and leaves the page empty; only a schema
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaLoad`] when the schema cannot be loaded.
    pub async fn mount(&self) -> Result<(), FormError> {
        self.inner.lock().mounted = true;
        let (columns, page) = tokio::join!(self.load_columns(), self.fetch_page(1));
        if let Err(e) = page {
            debug!(table = %self.table, error = %e, "first page unavailable");
        }
        columns
    }

    /// Derives the columns from the schema. Runs at most once per instance.
    ///
    /// # Errors
    ///
    /// [`FormError::SchemaLoad`] when the schema cannot be loaded.
    pub async fn load_columns(&self) -> Result<(), FormError> {
        let epoch = {
            let mut inner = self.inner.lock();
            if !inner.list.begin_schema_load() {
                return Ok(());
            }
            inner.epoch
        };

        let result = self.schemas.load_schema(&self.schema_path).await;

        let mut inner = self.inner.lock();
        if !Self::is_current(&inner, epoch) {
            debug!(path = %self.schema_path, "discarding columns loaded after unmount");
            return Ok(());
        }
        match result {
            Ok(schema) => {
                inner.list.finish_schema_load(Ok(&schema));
                info!(path = %self.schema_path, columns = inner.list.columns().map_or(0, <[_]>::len), "list columns loaded");
                Ok(())
            }
            Err(e) => {
                error!(path = %self.schema_path, error = %e, "failed to load list schema");
                let reason = e.to_string();
                inner.list.finish_schema_load(Err(reason.clone()));
                Err(FormError::SchemaLoad {
                    path: self.schema_path.clone(),
                    reason,
                })
            }
        }
    }

    /// Fetches `page` unless another page fetch is in flight.
    ///
    /// Returns whether a request was issued. A failure empties the page.
    ///
    /// # Errors
    ///
    /// The gateway error of a failed fetch.
    pub async fn fetch_page(&self, page: u32) -> Result<bool, GatewayError> {
        let claimed = {
            let mut inner = self.inner.lock();
            let epoch = inner.epoch;
            inner.list.begin_page_fetch(page).map(|request| (request, epoch))
        };
        self.run_page_fetch(claimed).await
    }

    /// Navigates to `page`. Out-of-range pages, the current page and calls
    /// made while a fetch is in flight are ignored.
    ///
    /// # Errors
    ///
    /// The gateway error of a failed fetch.
    pub async fn go_to_page(&self, page: u32) -> Result<bool, GatewayError> {
        let claimed = {
            let mut inner = self.inner.lock();
            let epoch = inner.epoch;
            inner.list.go_to_page(page).map(|request| (request, epoch))
        };
        self.run_page_fetch(claimed).await
    }

    /// Re-fetches the current page.
    ///
    /// # Errors
    ///
    /// The gateway error of a failed fetch.
    pub async fn refresh(&self) -> Result<bool, GatewayError> {
        let claimed = {
            let mut inner = self.inner.lock();
            let epoch = inner.epoch;
            inner.list.begin_refresh().map(|request| (request, epoch))
        };
        self.run_page_fetch(claimed).await
    }

    async fn run_page_fetch(
        &self,
        claimed: Option<(PageRequest, u64)>,
    ) -> Result<bool, GatewayError> {
        let Some((request, epoch)) = claimed else {
            return Ok(false);
        };

        let result = self
            .gateway
            .list(&self.table, request.page, request.page_size)
            .await;

        let mut inner = self.inner.lock();
        if !Self::is_current(&inner, epoch) {
            debug!(table = %self.table, page = request.page, "discarding page fetched after unmount");
            return Ok(true);
        }
        match result {
            Ok(page) => {
                debug!(table = %self.table, page = request.page, records = page.records.len(), total = page.total_records, "page loaded");
                inner.list.finish_page_fetch(request, Ok(page));
                Ok(true)
            }
            Err(e) => {
                warn!(table = %self.table, page = request.page, error = %e, "failed to fetch page");
                inner.list.finish_page_fetch(request, Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Opens a blank create form over the list and mounts it.
    ///
    /// # Errors
    ///
    /// Propagates the form's mount failure; the form stays open, empty.
    pub async fn open_create(&self) -> Result<Arc<FormRenderer>, FormError> {
        self.open_form(FormTarget::Create).await
    }

    /// Opens the edit form for `record_id` and mounts it.
    ///
    /// # Errors
    ///
    /// Propagates the form's mount failure; the form stays open, empty.
    pub async fn open_edit(&self, record_id: &str) -> Result<Arc<FormRenderer>, FormError> {
        self.open_form(FormTarget::Edit {
            record_id: record_id.to_string(),
        })
        .await
    }

    async fn open_form(&self, target: FormTarget) -> Result<Arc<FormRenderer>, FormError> {
        let form = Arc::new(FormRenderer::new(
            self.gateway.clone(),
            self.schemas.clone(),
            self.schema_path.clone(),
            target.record_id().map(str::to_string),
            self.ordering,
        ));

        let previous = {
            let mut inner = self.inner.lock();
            match &target {
                FormTarget::Create => inner.list.open_create(),
                FormTarget::Edit { record_id } => inner.list.open_edit(record_id.clone()),
            }
            inner.form.replace(form.clone())
        };
        if let Some(previous) = previous {
            previous.unmount();
        }

        form.mount().await?;
        Ok(form)
    }

    /// Submits the open form. On success the current page is re-fetched and
    /// then the form is dismissed.
    ///
    /// # Errors
    ///
    /// [`FormError::NoOpenForm`], or whatever the form's submit returned.
    pub async fn submit_form(&self) -> Result<SubmitOutcome, FormError> {
        let form = self.form().ok_or(FormError::NoOpenForm)?;
        let outcome = form.submit().await?;

        if outcome == SubmitOutcome::Saved {
            if let Err(e) = self.refresh().await {
                warn!(table = %self.table, error = %e, "refresh after save failed");
            }
            self.dismiss_form_if(&form);
        }
        Ok(outcome)
    }

    /// Closes the open form, discarding its draft.
    pub fn dismiss_form(&self) {
        let form = {
            let mut inner = self.inner.lock();
            inner.list.dismiss_form();
            inner.form.take()
        };
        if let Some(form) = form {
            form.unmount();
        }
    }

    fn dismiss_form_if(&self, submitted: &Arc<FormRenderer>) {
        let still_open = self
            .inner
            .lock()
            .form
            .as_ref()
            .is_some_and(|open| Arc::ptr_eq(open, submitted));
        if still_open {
            self.dismiss_form();
        }
    }

    /// Address of `record_id`'s edit form as an independent surface.
    #[must_use]
    pub fn open_in_window(&self, record_id: &str) -> WindowTarget {
        self.inner.lock().list.window_target(record_id)
    }

    /// Deletes `record_id` after `prompt` confirms.
    ///
    /// On success the row is removed from the displayed page without a
    /// re-fetch. A declined prompt sends nothing.
    ///
    /// # Errors
    ///
    /// [`FormError::Delete`] when storage rejects the delete; the row stays.
    pub async fn delete(
        &self,
        record_id: &str,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<DeleteOutcome, FormError> {
        if !prompt.confirm(DELETE_QUESTION) {
            debug!(table = %self.table, record_id, "delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let epoch = self.inner.lock().epoch;
        if let Err(source) = self.gateway.delete(&self.table, record_id).await {
            error!(table = %self.table, record_id, error = %source, "failed to delete record");
            return Err(FormError::Delete {
                table: self.table.clone(),
                id: record_id.to_string(),
                source,
            });
        }

        info!(table = %self.table, record_id, "record deleted");
        let mut inner = self.inner.lock();
        if Self::is_current(&inner, epoch) {
            inner.list.remove_record(record_id);
        }
        Ok(DeleteOutcome::Deleted)
    }

    /// Detaches the list and its form; late results are dropped. The loaded
    /// columns survive, so a later [`Self::mount`] only fetches the first page.
    pub fn unmount(&self) {
        {
            let mut inner = self.inner.lock();
            inner.mounted = false;
            inner.epoch += 1;
            inner.list.detach();
        }
        self.dismiss_form();
        debug!(path = %self.schema_path, "list unmounted");
    }

    #[must_use]
    pub fn view(&self) -> ListView {
        self.inner.lock().list.view()
    }

    fn is_current(inner: &ListInner, epoch: u64) -> bool {
        inner.epoch == epoch
    }
}
