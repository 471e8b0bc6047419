//! Table snapshots and row expansion states

use std::fmt;

use serde::{Deserialize, Serialize};
use uiresolve_core_types::NodeHandle;

use action_locator::normalize_ws;

/// Header map and row handles of one table, read at a single point in time.
///
/// Never kept across renders: ask for a new model instead of reusing an old one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableModel {
    table: NodeHandle,
    headers: Vec<String>,
    rows: Vec<NodeHandle>,
}

impl TableModel {
    pub fn new(table: NodeHandle, headers: Vec<String>, rows: Vec<NodeHandle>) -> Self {
        Self {
            table,
            headers,
            rows,
        }
    }

    pub fn table(&self) -> &NodeHandle {
        &self.table
    }

    /// Header texts in column order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Column index for `name`; `None` for headers not rendered.
    pub fn column(&self, name: &str) -> Option<usize> {
        column_position(&self.headers, name)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// A fresh pass over the rows captured when the model was read.
    pub fn rows(&self) -> RowCursor<'_> {
        RowCursor {
            rows: &self.rows,
            next: 0,
        }
    }
}

/// Position of `name` among `headers`: exact match after whitespace normalisation, then a
/// case-insensitive one.
pub(crate) fn column_position(headers: &[String], name: &str) -> Option<usize> {
    let wanted = normalize_ws(name);
    if wanted.is_empty() {
        return None;
    }
    headers
        .iter()
        .position(|header| *header == wanted)
        .or_else(|| {
            let lowered = wanted.to_lowercase();
            headers
                .iter()
                .position(|header| header.to_lowercase() == lowered)
        })
}

/// Finite, restartable iteration over row handles.
#[derive(Clone, Debug)]
pub struct RowCursor<'a> {
    rows: &'a [NodeHandle],
    next: usize,
}

impl RowCursor<'_> {
    /// Back to the first row.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl<'a> Iterator for RowCursor<'a> {
    type Item = &'a NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.get(self.next)?;
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.rows.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for RowCursor<'_> {}

/// Which columns a table shows right now.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSnapshot {
    pub headers: Vec<String>,
    /// The UI replaced the table with its "no columns selected" message
    pub no_columns_message: bool,
}

impl ColumnSnapshot {
    pub fn count(&self) -> usize {
        self.headers.len()
    }

    pub fn contains(&self, header: &str) -> bool {
        column_position(&self.headers, header).is_some()
    }
}

/// Expandable-row lifecycle.
///
/// `Expanding` and `Collapsing` exist only between a toggle and the detail-row marker
/// appearing or disappearing; the UI exposes no loading flag of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowExpansion {
    Collapsed,
    Expanding,
    Expanded,
    Collapsing,
}

impl RowExpansion {
    /// Settled state implied by the marker alone.
    pub fn from_marker(marker_present: bool) -> Self {
        if marker_present {
            RowExpansion::Expanded
        } else {
            RowExpansion::Collapsed
        }
    }

    /// State right after the row's toggle was clicked.
    pub fn toggle(self) -> Self {
        match self {
            RowExpansion::Collapsed => RowExpansion::Expanding,
            RowExpansion::Expanded => RowExpansion::Collapsing,
            transient => transient,
        }
    }

    /// Folds one observation of the detail-row marker into the state.
    pub fn observe(self, marker_present: bool) -> Self {
        match (self, marker_present) {
            (RowExpansion::Expanding, false) => RowExpansion::Expanding,
            (RowExpansion::Collapsing, true) => RowExpansion::Collapsing,
            (_, present) => RowExpansion::from_marker(present),
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(self, RowExpansion::Expanding | RowExpansion::Collapsing)
    }
}

impl fmt::Display for RowExpansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RowExpansion::Collapsed => "collapsed",
            RowExpansion::Expanding => "expanding",
            RowExpansion::Expanded => "expanded",
            RowExpansion::Collapsing => "collapsing",
        })
    }
}
