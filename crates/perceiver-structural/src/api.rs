//! Caller-facing table contract

use async_trait::async_trait;
use uiresolve_core_types::{NodeHandle, ScopeContext};

use crate::errors::PerceiverError;
use crate::model::{ColumnSnapshot, TableModel};

/// Reads tables as they are rendered right now. Nothing is cached between calls.
#[async_trait]
pub trait StructuralPerceiver: Send + Sync {
    /// Index of the column headed `header` in the table `scope` designates.
    async fn column_index_for(
        &self,
        header: &str,
        scope: &ScopeContext,
    ) -> Result<Option<usize>, PerceiverError>;

    /// Text of the `index`-th cell of `row`; `None` past the last cell.
    async fn cell_value(
        &self,
        row: &NodeHandle,
        index: usize,
    ) -> Result<Option<String>, PerceiverError>;

    /// `None` when the table is not rendered.
    async fn table_model(&self, scope: &ScopeContext)
        -> Result<Option<TableModel>, PerceiverError>;

    async fn visible_columns(&self, scope: &ScopeContext) -> Result<ColumnSnapshot, PerceiverError>;

    /// Every row's value in the column headed `header`; `None` for an unknown column.
    async fn column_values(
        &self,
        header: &str,
        scope: &ScopeContext,
    ) -> Result<Option<Vec<String>>, PerceiverError> {
        let Some(model) = self.table_model(scope).await? else {
            return Ok(None);
        };
        let Some(index) = model.column(header) else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(model.row_count());
        for row in model.rows() {
            values.push(self.cell_value(row, index).await?.unwrap_or_default());
        }
        Ok(Some(values))
    }

    /// First row whose `header` cell reads `value`.
    async fn row_where(
        &self,
        header: &str,
        value: &str,
        scope: &ScopeContext,
    ) -> Result<Option<NodeHandle>, PerceiverError> {
        let Some(model) = self.table_model(scope).await? else {
            return Ok(None);
        };
        let Some(index) = model.column(header) else {
            return Ok(None);
        };
        let wanted = action_locator::normalize_ws(value);
        for row in model.rows() {
            if self.cell_value(row, index).await?.as_deref() == Some(wanted.as_str()) {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }
}
