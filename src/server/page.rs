//! Server-rendered HTML page.
//!
//! The markup lives in `templates/index.html` and is rendered with
//! minijinja. Templates named `*.html` are auto-escaped, so uploaded zone
//! names and file names can never inject markup.

use crate::models::{
    AggregationRow, FilterOptions, FilterSelection, IngestReport, PendingRecord, SortKey,
};
use crate::report::format_average;
use minijinja::Environment;
use serde::Serialize;

const INDEX_TEMPLATE: &str = "index.html";

/// Everything the page shows for one request.
pub struct PageView<'a> {
    pub options: &'a FilterOptions,
    pub filter: &'a FilterSelection,
    pub rows: &'a [AggregationRow],
    pub sort: SortKey,
    pub pending: &'a [PendingRecord],
    pub last_upload: Option<&'a IngestReport>,
    pub record_count: usize,
    pub precision: usize,
}

#[derive(Serialize)]
struct Choice<'a> {
    value: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct RowContext<'a> {
    zone: &'a str,
    count: usize,
    average: String,
}

#[derive(Serialize)]
struct PendingContext<'a> {
    source: String,
    problems: String,
    vocation: &'a str,
    mode: &'a str,
    zone: &'a str,
}

#[derive(Serialize)]
struct PageContext<'a> {
    vocations: Vec<Choice<'a>>,
    modes: Vec<Choice<'a>>,
    sorts: Vec<Choice<'a>>,
    vocation: &'a str,
    mode: &'a str,
    sort: &'static str,
    rows: Vec<RowContext<'a>>,
    pending: Vec<PendingContext<'a>>,
    last_upload: Option<&'a IngestReport>,
    record_count: usize,
}

/// Options for a `<select>`. An explicit choice that no record carries is
/// kept at the top so it stays visible.
fn choices<'a>(options: &'a [String], selected: &'a str) -> Vec<Choice<'a>> {
    let mut out = Vec::with_capacity(options.len() + 1);

    if !selected.is_empty() && !options.iter().any(|o| o == selected) {
        out.push(Choice {
            value: selected,
            selected: true,
        });
    }
    out.extend(options.iter().map(|o| Choice {
        value: o,
        selected: o == selected,
    }));

    out
}

impl<'a> PageContext<'a> {
    fn new(view: &PageView<'a>) -> Self {
        let sorts = SortKey::ALL
            .into_iter()
            .map(|key| Choice {
                value: key.as_str(),
                selected: key == view.sort,
            })
            .collect();

        let rows = view
            .rows
            .iter()
            .map(|row| RowContext {
                zone: &row.zone,
                count: row.count,
                average: format_average(row.average, view.precision),
            })
            .collect();

        let pending = view
            .pending
            .iter()
            .map(|entry| PendingContext {
                source: entry.source.to_string(),
                problems: entry.problems(),
                vocation: entry.vocation.as_deref().unwrap_or(""),
                mode: entry.mode.as_deref().unwrap_or(""),
                zone: entry.zone.as_deref().unwrap_or(""),
            })
            .collect();

        Self {
            vocations: choices(&view.options.vocations, &view.filter.vocation),
            modes: choices(&view.options.modes, &view.filter.mode),
            sorts,
            vocation: &view.filter.vocation,
            mode: &view.filter.mode,
            sort: view.sort.as_str(),
            rows,
            pending,
            last_upload: view.last_upload,
            record_count: view.record_count,
        }
    }
}

/// Holds the compiled page template.
pub struct PageRenderer {
    env: Environment<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template(INDEX_TEMPLATE, include_str!("templates/index.html"))?;

        Ok(Self { env })
    }

    /// Render the full page.
    pub fn render(&self, view: &PageView<'_>) -> Result<String, minijinja::Error> {
        let template = self.env.get_template(INDEX_TEMPLATE)?;
        template.render(PageContext::new(view))
    }
}
