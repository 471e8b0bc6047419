//! Table reading
//!
//! Locates the table a scope designates and reads its headers and data rows live, leaving
//! out nodes that belong to tables nested inside it.

use std::sync::Arc;

use action_gate::Engine;
use action_locator::{normalize_ws, Boundary, ScopeResolver};
use async_trait::async_trait;
use driver_adapter::{Driver, DriverError};
use tracing::{debug, trace};
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::api::StructuralPerceiver;
use crate::errors::PerceiverError;
use crate::model::{column_position, ColumnSnapshot, TableModel};
use crate::policy::TableSelectors;

/// Table extractor and widget driver over an [`Engine`].
#[derive(Clone)]
pub struct TablePerceiver {
    pub(crate) engine: Engine,
    pub(crate) selectors: TableSelectors,
}

impl TablePerceiver {
    pub fn new(engine: Engine, selectors: TableSelectors) -> Self {
        Self { engine, selectors }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn selectors(&self) -> &TableSelectors {
        &self.selectors
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        self.engine.driver()
    }

    pub(crate) fn scopes(&self) -> &ScopeResolver {
        self.engine.resolver().scopes()
    }

    /// The table `scope` designates: the boundary itself for `TableAt`, otherwise the first
    /// table inside the scope.
    pub async fn table_node(&self, scope: &ScopeContext) -> Result<Option<NodeHandle>, DriverError> {
        let boundary = self.scopes().boundary(scope).await?;
        match (scope, boundary) {
            (_, Boundary::Absent(reason)) => {
                trace!(scope = %scope, reason = %reason, "no table");
                Ok(None)
            }
            (ScopeContext::TableAt(_), Boundary::Node(table)) => Ok(Some(table)),
            (_, boundary) => {
                let tables = self.driver().query(&self.scopes().selectors().table).await?;
                let inside = self.scopes().filter(scope, &boundary, tables).await?;
                Ok(inside.and_then(|tables| tables.into_iter().next()))
            }
        }
    }

    /// Matches of `selector` under `root` that do not belong to a table nested inside it.
    pub(crate) async fn own(
        &self,
        root: &NodeHandle,
        selector: &str,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        let driver = self.driver();
        let nested = driver
            .query_within(root, &self.scopes().selectors().table)
            .await?;
        let mut out = Vec::new();
        'nodes: for node in driver.query_within(root, selector).await? {
            for table in &nested {
                if driver.contains(table, &node).await? {
                    continue 'nodes;
                }
            }
            out.push(node);
        }
        Ok(out)
    }

    /// Header texts of `table`, in column order, read live.
    pub(crate) async fn headers(&self, table: &NodeHandle) -> Result<Vec<String>, DriverError> {
        let mut headers = Vec::new();
        for cell in self.own(table, &self.selectors.header_cell).await? {
            headers.push(normalize_ws(&self.driver().text(&cell).await?.unwrap_or_default()));
        }
        Ok(headers)
    }

    /// Data rows of `table`: header rows and detail rows are skipped.
    pub(crate) async fn data_rows(&self, table: &NodeHandle) -> Result<Vec<NodeHandle>, DriverError> {
        let driver = self.driver();
        let details = driver
            .query_within(table, &self.scopes().selectors().detail_row)
            .await?;
        let mut rows = Vec::new();
        for row in self.own(table, &self.selectors.row).await? {
            if details.contains(&row) {
                continue;
            }
            if !driver
                .query_within(&row, &self.selectors.header_cell)
                .await?
                .is_empty()
            {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn message_shown(&self, scope: &ScopeContext, table_found: bool) -> Result<bool, DriverError> {
        let messages = self.driver().query(&self.selectors.empty_message).await?;
        // The message usually replaces the table, so an absent table means look page-wide.
        let messages = if table_found {
            self.scopes().resolve(scope, messages).await?
        } else {
            messages
        };
        for message in messages {
            if self.driver().is_visible(&message).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl StructuralPerceiver for TablePerceiver {
    async fn column_index_for(
        &self,
        header: &str,
        scope: &ScopeContext,
    ) -> Result<Option<usize>, PerceiverError> {
        let Some(table) = self.table_node(scope).await? else {
            return Ok(None);
        };
        let headers = self.headers(&table).await?;
        let index = column_position(&headers, header);
        debug!(header, scope = %scope, index = ?index, columns = headers.len(), "column lookup");
        Ok(index)
    }

    async fn cell_value(
        &self,
        row: &NodeHandle,
        index: usize,
    ) -> Result<Option<String>, PerceiverError> {
        let cells = self.own(row, &self.selectors.cell).await?;
        let Some(cell) = cells.get(index) else {
            return Ok(None);
        };
        let text = self.driver().text(cell).await?.unwrap_or_default();
        Ok(Some(normalize_ws(&text)))
    }

    async fn table_model(
        &self,
        scope: &ScopeContext,
    ) -> Result<Option<TableModel>, PerceiverError> {
        let Some(table) = self.table_node(scope).await? else {
            return Ok(None);
        };
        let headers = self.headers(&table).await?;
        let rows = self.data_rows(&table).await?;
        Ok(Some(TableModel::new(table, headers, rows)))
    }

    async fn visible_columns(&self, scope: &ScopeContext) -> Result<ColumnSnapshot, PerceiverError> {
        let table = self.table_node(scope).await?;
        let headers = match &table {
            Some(table) => self
                .headers(table)
                .await?
                .into_iter()
                .filter(|header| !header.is_empty())
                .collect(),
            None => Vec::new(),
        };
        let no_columns_message = self.message_shown(scope, table.is_some()).await?;
        Ok(ColumnSnapshot {
            headers,
            no_columns_message,
        })
    }
}
