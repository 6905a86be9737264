//! Plain-text drawing of the view models for the terminal.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthStr;

use schemaform_core::view::{
    FieldView, FieldWidget, FormView, ListView, TableView, LOADING_TEXT, NO_COLUMNS_TEXT,
};
use schemaform_core::Menu;

const COLUMN_GAP: &str = "  ";
const ROW_ACTIONS: &str = "edit | delete";

/// Pads `text` with spaces to `width` display columns.
fn pad(text: &str, width: usize) -> String {
    let mut out = text.to_string();
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(text.width())));
    out
}

/// Draws the menu, marking the entry whose schema is shown.
#[must_use]
pub fn render_menu(menu: &Menu, active_schema_path: Option<&str>) -> String {
    let width = menu
        .entries()
        .iter()
        .map(|e| e.name.width())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for entry in menu.entries() {
        let marker = if Menu::is_active(entry, active_schema_path) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(
            out,
            "{marker} {}{COLUMN_GAP}{}",
            pad(&entry.name, width),
            entry.schema_path()
        );
    }
    out
}

#[must_use]
pub fn render_list(view: &ListView) -> String {
    match view {
        ListView::Loading => format!("{LOADING_TEXT}\n"),
        ListView::NoColumns => format!("{NO_COLUMNS_TEXT}\n"),
        ListView::Table(table) => render_table(table),
    }
}

fn render_table(table: &TableView) -> String {
    let mut widths: Vec<usize> = table.headers.iter().map(|h| h.width()).collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let actions = if row.record_id.is_some() {
                ROW_ACTIONS
            } else {
                ""
            };
            row.cells
                .iter()
                .map(|cell| cell.text().to_string())
                .chain(std::iter::once(actions.to_string()))
                .collect()
        })
        .collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let line = |cells: &[String]| -> String {
        let joined = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP);
        format!("{}\n", joined.trim_end())
    };

    let mut out = line(&table.headers);
    let rule_width = widths.iter().sum::<usize>() + COLUMN_GAP.len() * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');
    for row in &rows {
        out.push_str(&line(row));
    }
    if let Some(message) = table.empty_message {
        let _ = writeln!(out, "{message}");
    }

    let pages = table
        .pages
        .iter()
        .map(|p| {
            if p.active {
                format!("[{}]", p.number)
            } else {
                p.number.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "Pages: {pages}");
    out
}

#[must_use]
pub fn render_form(view: &FormView) -> String {
    let mut out = String::new();
    if let Some(id) = &view.editing_id {
        let _ = writeln!(out, "Editing record {id}");
    }
    for section in &view.sections {
        let _ = writeln!(out, "== {} ==", section.title);
        let width = section
            .fields
            .iter()
            .map(|f| f.label.width() + usize::from(f.required))
            .max()
            .unwrap_or(0);
        for field in &section.fields {
            render_field(&mut out, field, width);
        }
    }
    let _ = writeln!(out, "[{}]", view.submit_label);
    if let Some(error) = &view.submit_error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

fn render_field(out: &mut String, field: &FieldView, label_width: usize) {
    let label = if field.required {
        format!("{}*", field.label)
    } else {
        field.label.clone()
    };
    let value = if field.value.is_empty() {
        field.placeholder.as_deref().map_or(String::new(), |p| format!("<{p}>"))
    } else {
        field.value.clone()
    };
    let _ = writeln!(
        out,
        "  {}{COLUMN_GAP}{}{COLUMN_GAP}({})",
        pad(&label, label_width),
        value,
        field.kind
    );

    match &field.widget {
        FieldWidget::Input => {}
        FieldWidget::Select { options } => {
            for option in options {
                let mark = if option.selected { 'x' } else { ' ' };
                let _ = writeln!(out, "      ({mark}) {}", option.label);
            }
        }
        FieldWidget::Autocomplete { suggestions } => {
            for (index, suggestion) in suggestions.iter().enumerate() {
                let _ = writeln!(out, "      {index}. {} ({})", suggestion.label, suggestion.value);
            }
        }
    }
    if let Some(error) = &field.error {
        let _ = writeln!(out, "      ! {error}");
    }
}
