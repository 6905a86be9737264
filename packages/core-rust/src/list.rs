//! List view state: columns derived from the schema, one page of records,
//! pagination, and which form (if any) is open over the list.

use tracing::debug;

use crate::lifecycle::{FetchPhase, FetchState};
use crate::pagination::{PageRequest, PaginationState};
use crate::record::Record;
use crate::schema::{table_name_from_path, FieldOption, Schema};
use crate::traits::PageResult;
use crate::view::{
    CellView, ListView, RowView, TableView, WindowTarget, ACTIONS_HEADER, NO_RECORDS_TEXT,
};

/// Key of the column rendered as the edit link.
pub const LINK_COLUMN: &str = "name";

/// Table column derived from one schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub label: String,
    /// Field name; the record key shown in this column.
    pub key: String,
    /// Options copied from the field, used to show labels instead of values.
    pub options: Option<Vec<FieldOption>>,
}

impl Column {
    /// Text shown for `record` in this column.
    ///
    /// Option-valued columns show the option label; values matching no
    /// option are shown raw.
    #[must_use]
    pub fn cell_text(&self, record: &Record) -> String {
        let raw = record.text(&self.key);
        self.options
            .as_deref()
            .and_then(|options| options.iter().find(|opt| opt.value == raw))
            .map_or(raw.clone(), |opt| opt.label.clone())
    }
}

/// Flattens every section's fields into columns, in document order.
#[must_use]
pub fn columns_from_schema(schema: &Schema) -> Vec<Column> {
    schema
        .fields()
        .map(|field| Column {
            label: field.label.clone(),
            key: field.name.clone(),
            options: field.options.clone(),
        })
        .collect()
}

/// Form currently opened over the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormTarget {
    Create,
    Edit { record_id: String },
}

impl FormTarget {
    #[must_use]
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::Create => None,
            Self::Edit { record_id } => Some(record_id),
        }
    }
}

/// State of one list instance.
#[derive(Debug, Clone)]
pub struct ListState {
    schema_path: String,
    table: String,
    columns: FetchState<Vec<Column>>,
    pagination: PaginationState,
    records: Vec<Record>,
    page_loaded: bool,
    form: Option<FormTarget>,
}

impl ListState {
    pub fn new(schema_path: impl Into<String>, page_size: u32) -> Self {
        let schema_path = schema_path.into();
        Self {
            table: table_name_from_path(&schema_path),
            schema_path,
            columns: FetchState::Idle,
            pagination: PaginationState::new(page_size),
            records: Vec::new(),
            page_loaded: false,
            form: None,
        }
    }

    #[must_use]
    pub fn schema_path(&self) -> &str {
        &self.schema_path
    }

    /// Table name derived from the schema path.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn columns(&self) -> Option<&[Column]> {
        self.columns.loaded().map(Vec::as_slice)
    }

    #[must_use]
    pub fn schema_phase(&self) -> FetchPhase {
        self.columns.phase()
    }

    #[must_use]
    pub fn pagination(&self) -> &PaginationState {
        &self.pagination
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn form_target(&self) -> Option<&FormTarget> {
        self.form.as_ref()
    }

    // ---- schema ----

    /// Claims the once-per-instance schema fetch. Returns `false` when the
    /// fetch is running or already happened.
    pub fn begin_schema_load(&mut self) -> bool {
        match self.columns.begin_once() {
            Ok(()) => true,
            Err(reason) => {
                debug!(path = %self.schema_path, %reason, "schema fetch skipped");
                false
            }
        }
    }

    pub fn finish_schema_load(&mut self, result: Result<&Schema, String>) {
        self.columns.finish(result.map(columns_from_schema));
    }

    // ---- records ----

    /// Claims the in-flight slot for `page`; `None` means the trigger was dropped.
    pub fn begin_page_fetch(&mut self, page: u32) -> Option<PageRequest> {
        self.pagination.begin_fetch(page)
    }

    /// Re-fetch of the current page, e.g. after a create or update.
    pub fn begin_refresh(&mut self) -> Option<PageRequest> {
        self.begin_page_fetch(self.pagination.current_page())
    }

    /// Settles a page fetch. A failure empties the displayed page.
    pub fn finish_page_fetch(&mut self, request: PageRequest, result: Result<PageResult, String>) {
        match result {
            Ok(page) => {
                self.records = page.records;
                self.pagination.finish_fetch(request, Ok(page.total_records));
            }
            Err(reason) => {
                self.records.clear();
                self.pagination.finish_fetch(request, Err(reason));
            }
        }
        self.page_loaded = true;
    }

    /// Navigates to `page`. Returns the fetch to issue, or `None` when the page
    /// is out of range, already current, or another fetch is outstanding.
    pub fn go_to_page(&mut self, page: u32) -> Option<PageRequest> {
        if self.pagination.fetch().is_in_flight() {
            debug!(page, "page fetch already in flight, skipping");
            return None;
        }
        if !self.pagination.go_to(page) {
            return None;
        }
        self.begin_page_fetch(page)
    }

    /// Drops a record from the displayed page after a confirmed delete.
    pub fn remove_record(&mut self, record_id: &str) -> bool {
        let before = self.records.len();
        self.records
            .retain(|record| record.id().as_deref() != Some(record_id));
        self.records.len() != before
    }

    /// Forgets the displayed page and releases the guards of fetches that an
    /// unmount cut short. Loaded columns are kept for the next mount.
    pub fn detach(&mut self) {
        if self.columns.is_in_flight() {
            self.columns.reset();
        }
        self.pagination = PaginationState::new(self.pagination.page_size());
        self.records.clear();
        self.page_loaded = false;
    }

    // ---- forms ----

    pub fn open_create(&mut self) {
        self.form = Some(FormTarget::Create);
    }

    pub fn open_edit(&mut self, record_id: impl Into<String>) {
        self.form = Some(FormTarget::Edit {
            record_id: record_id.into(),
        });
    }

    pub fn dismiss_form(&mut self) {
        self.form = None;
    }

    /// Where the record's edit form opens as an independent surface.
    #[must_use]
    pub fn window_target(&self, record_id: &str) -> WindowTarget {
        WindowTarget {
            record_id: record_id.to_string(),
            schema_path: self.schema_path.clone(),
        }
    }

    // ---- rendering ----

    #[must_use]
    pub fn view(&self) -> ListView {
        let columns = match &self.columns {
            FetchState::Idle | FetchState::InFlight => return ListView::Loading,
            FetchState::Failed(_) => return ListView::NoColumns,
            FetchState::Loaded(columns) => columns,
        };
        if !self.page_loaded && self.pagination.fetch().is_in_flight() {
            return ListView::Loading;
        }
        if columns.is_empty() {
            return ListView::NoColumns;
        }

        let headers = columns
            .iter()
            .map(|c| c.label.clone())
            .chain(std::iter::once(ACTIONS_HEADER.to_string()))
            .collect();

        let rows: Vec<RowView> = self
            .records
            .iter()
            .map(|record| self.row(columns, record))
            .collect();

        ListView::Table(TableView {
            headers,
            empty_message: rows.is_empty().then_some(NO_RECORDS_TEXT),
            rows,
            pages: self.pagination.controls(),
        })
    }

    fn row(&self, columns: &[Column], record: &Record) -> RowView {
        let record_id = record.id();
        let cells = columns
            .iter()
            .map(|column| {
                let text = column.cell_text(record);
                match (&record_id, column.key == LINK_COLUMN) {
                    (Some(id), true) => CellView::EditLink {
                        label: text,
                        record_id: id.clone(),
                        window: self.window_target(id),
                    },
                    _ => CellView::Text(text),
                }
            })
            .collect();
        RowView { record_id, cells }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Section};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new(vec![
            Section::new(
                "General",
                vec![
                    Field::new("name", "Name").required(),
                    Field::new("email", "Email"),
                ],
            ),
            Section::new(
                "State",
                vec![Field::new("status", "Status").with_options(vec![FieldOption {
                    label: "Active".into(),
                    value: "A".into(),
                }])],
            ),
        ])
    }

    fn record(value: serde_json::Value) -> Record {
        Record::from_value(value).expect("object")
    }

    fn loaded_state(records: Vec<Record>, total: u64) -> ListState {
        let mut state = ListState::new("schemas/customer.json", 2);
        assert!(state.begin_schema_load());
        state.finish_schema_load(Ok(&schema()));
        let req = state.begin_page_fetch(1).expect("fetch");
        state.finish_page_fetch(
            req,
            Ok(PageResult {
                records,
                total_records: total,
            }),
        );
        state
    }

    #[test]
    fn derives_table_and_columns() {
        let state = loaded_state(Vec::new(), 0);
        assert_eq!(state.table(), "customer");
        let keys: Vec<&str> = state
            .columns()
            .expect("columns")
            .iter()
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(keys, vec!["name", "email", "status"]);
    }

    #[test]
    fn schema_load_is_single_flight() {
        let mut state = ListState::new("schemas/customer.json", 2);
        assert!(state.begin_schema_load());
        assert!(!state.begin_schema_load());
        state.finish_schema_load(Ok(&schema()));
        assert!(!state.begin_schema_load());
    }

    #[test]
    fn loading_until_schema_and_first_page_arrive() {
        let mut state = ListState::new("schemas/customer.json", 2);
        assert_eq!(state.view(), ListView::Loading);
        state.begin_schema_load();
        let req = state.begin_page_fetch(1).expect("fetch");
        state.finish_schema_load(Ok(&schema()));
        assert_eq!(state.view(), ListView::Loading);
        state.finish_page_fetch(req, Ok(PageResult::default()));
        assert!(matches!(state.view(), ListView::Table(_)));
    }

    #[test]
    fn zero_columns_or_failed_schema_render_no_columns() {
        let mut empty = ListState::new("schemas/empty.json", 2);
        empty.begin_schema_load();
        empty.finish_schema_load(Ok(&Schema::default()));
        assert_eq!(empty.view(), ListView::NoColumns);

        let mut failed = ListState::new("schemas/missing.json", 2);
        failed.begin_schema_load();
        failed.finish_schema_load(Err("404".into()));
        assert_eq!(failed.view(), ListView::NoColumns);
    }

    #[test]
    fn rows_resolve_option_labels_and_link_name() {
        let state = loaded_state(
            vec![record(json!({ "id": 9, "name": "Bob", "email": "b@x.com", "status": "A" }))],
            1,
        );
        let ListView::Table(table) = state.view() else {
            panic!("expected table");
        };
        assert_eq!(table.headers, vec!["Name", "Email", "Status", ACTIONS_HEADER]);
        assert_eq!(table.empty_message, None);

        let row = &table.rows[0];
        assert_eq!(row.record_id.as_deref(), Some("9"));
        match &row.cells[0] {
            CellView::EditLink {
                label,
                record_id,
                window,
            } => {
                assert_eq!(label, "Bob");
                assert_eq!(record_id, "9");
                assert_eq!(window.schema_path, "schemas/customer.json");
            }
            other => panic!("name column should link, got {other:?}"),
        }
        assert_eq!(row.cells[1], CellView::Text("b@x.com".into()));
        assert_eq!(row.cells[2], CellView::Text("Active".into()));
    }

    #[test]
    fn unknown_option_value_is_shown_raw() {
        let state = loaded_state(vec![record(json!({ "id": 1, "status": "Z" }))], 1);
        let ListView::Table(table) = state.view() else {
            panic!("expected table");
        };
        assert_eq!(table.rows[0].cells[2].text(), "Z");
    }

    #[test]
    fn empty_page_shows_message() {
        let state = loaded_state(Vec::new(), 0);
        let ListView::Table(table) = state.view() else {
            panic!("expected table");
        };
        assert!(table.rows.is_empty());
        assert_eq!(table.empty_message, Some(NO_RECORDS_TEXT));
        assert_eq!(table.pages.len(), 1);
    }

    #[test]
    fn navigation_and_refresh() {
        let mut state = loaded_state(vec![record(json!({ "id": 1 }))], 7);
        assert_eq!(state.pagination().total_pages(), 4);
        assert_eq!(state.go_to_page(5), None);

        let req = state.go_to_page(3).expect("page 3");
        assert_eq!(req.page, 3);
        assert_eq!(state.go_to_page(4), None, "in flight");
        state.finish_page_fetch(req, Ok(PageResult { records: Vec::new(), total_records: 7 }));

        let refresh = state.begin_refresh().expect("refresh");
        assert_eq!(refresh.page, 3);
    }

    #[test]
    fn failed_page_fetch_empties_records() {
        let mut state = loaded_state(vec![record(json!({ "id": 1 }))], 1);
        let req = state.begin_refresh().expect("refresh");
        state.finish_page_fetch(req, Err("down".into()));
        assert!(state.records().is_empty());
    }

    #[test]
    fn detach_releases_cut_short_fetches() {
        let mut state = ListState::new("schemas/customer.json", 2);
        state.begin_schema_load();
        state.begin_page_fetch(1).expect("fetch");
        state.detach();

        assert_eq!(state.schema_phase(), FetchPhase::Idle);
        assert!(state.begin_schema_load());
        assert!(state.begin_page_fetch(1).is_some());
    }

    #[test]
    fn detach_keeps_columns_and_resets_page() {
        let mut state = loaded_state(vec![record(json!({ "id": 1, "name": "Ann" }))], 5);
        state.go_to_page(2).expect("navigate");
        state.detach();

        assert_eq!(state.schema_phase(), FetchPhase::Loaded);
        assert!(state.records().is_empty());
        assert_eq!(state.pagination().current_page(), 1);
        assert_eq!(state.pagination().total_pages(), 1);
        assert!(state.begin_page_fetch(1).is_some());
    }

    #[test]
    fn remove_record_by_id() {
        let mut state = loaded_state(
            vec![record(json!({ "id": 9 })), record(json!({ "id": "10" }))],
            2,
        );
        assert!(state.remove_record("9"));
        assert!(!state.remove_record("9"));
        assert_eq!(state.records().len(), 1);
        assert_eq!(state.records()[0].id().as_deref(), Some("10"));
    }

    #[test]
    fn form_targets() {
        let mut state = ListState::new("schemas/customer.json", 2);
        state.open_create();
        assert_eq!(state.form_target(), Some(&FormTarget::Create));
        state.open_edit("9");
        assert_eq!(state.form_target().and_then(FormTarget::record_id), Some("9"));
        state.dismiss_form();
        assert_eq!(state.form_target(), None);
    }
}
