//! Scope resolver
//!
//! Narrows a page-wide match set down to the nodes logically inside a [`ScopeContext`]. The
//! boundary node is looked up fresh on every call because tables, modals and detail rows
//! come and go between renders.

use std::sync::Arc;

use driver_adapter::{Driver, DriverError};
use serde::{Deserialize, Serialize};
use tracing::trace;
use uiresolve_core_types::{NodeHandle, ScopeContext};

/// Selector strings that define containers. Application data with framework defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeSelectors {
    pub table: String,
    pub modal: String,
    pub row: String,
    /// Attributes checked, in order, for an expanded row's anchor id.
    pub row_id_attributes: Vec<String>,
    /// Marker for the subtree rendered right after an expanded row.
    pub detail_row: String,
}

impl Default for ScopeSelectors {
    fn default() -> Self {
        Self {
            table: "table, mat-table, [role=\"table\"], [role=\"grid\"]".to_string(),
            modal: ".modal.show, mat-dialog-container, [role=\"dialog\"]".to_string(),
            row: "tr, mat-row, [role=\"row\"]".to_string(),
            row_id_attributes: vec![
                "data-row-id".to_string(),
                "data-id".to_string(),
                "id".to_string(),
            ],
            detail_row: ".detail-row, .expanded-detail, [data-detail-row]".to_string(),
        }
    }
}

/// Where a scope's matches must fall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    Document,
    Node(NodeHandle),
    /// The container is not rendered right now.
    Absent(String),
}

/// Resolves scope boundaries and filters match sets against them.
#[derive(Clone)]
pub struct ScopeResolver {
    driver: Arc<dyn Driver>,
    selectors: ScopeSelectors,
}

impl ScopeResolver {
    pub fn new(driver: Arc<dyn Driver>, selectors: ScopeSelectors) -> Self {
        Self { driver, selectors }
    }

    pub fn selectors(&self) -> &ScopeSelectors {
        &self.selectors
    }

    /// Current boundary node for `scope`.
    pub async fn boundary(&self, scope: &ScopeContext) -> Result<Boundary, DriverError> {
        match scope {
            ScopeContext::Page => Ok(Boundary::Document),
            ScopeContext::Modal => {
                let modals = self.driver.query(&self.selectors.modal).await?;
                // Later in document order stacks on top.
                for modal in modals.into_iter().rev() {
                    if self.driver.is_visible(&modal).await? {
                        return Ok(Boundary::Node(modal));
                    }
                }
                Ok(Boundary::Absent("no visible modal".to_string()))
            }
            ScopeContext::TableAt(index) => {
                let tables = self.driver.query(&self.selectors.table).await?;
                let count = tables.len();
                match tables.into_iter().nth(*index) {
                    Some(table) => Ok(Boundary::Node(table)),
                    None => Ok(Boundary::Absent(format!(
                        "table[{}] requested but {} table(s) rendered",
                        index, count
                    ))),
                }
            }
            ScopeContext::ExpandedRow(anchor_id) => {
                let Some(anchor) = self.find_row(anchor_id).await? else {
                    return Ok(Boundary::Absent(format!("row '{}' not rendered", anchor_id)));
                };
                match self.detail_row_after(&anchor).await? {
                    Some(detail) => Ok(Boundary::Node(detail)),
                    None => Ok(Boundary::Absent(format!(
                        "row '{}' is not expanded",
                        anchor_id
                    ))),
                }
            }
            ScopeContext::Row(row_id) => match self.find_row(row_id).await? {
                Some(row) => Ok(Boundary::Node(row)),
                None => Ok(Boundary::Absent(format!("row '{}' not rendered", row_id))),
            },
        }
    }

    /// Row whose id attribute equals `row_id`.
    pub async fn find_row(&self, row_id: &str) -> Result<Option<NodeHandle>, DriverError> {
        let rows = self.driver.query(&self.selectors.row).await?;
        for row in rows {
            for attr in &self.selectors.row_id_attributes {
                if self.driver.attribute(&row, attr).await?.as_deref() == Some(row_id) {
                    return Ok(Some(row));
                }
            }
        }
        Ok(None)
    }

    /// The detail row rendered directly after `row`, if it is there.
    pub async fn detail_row_after(
        &self,
        row: &NodeHandle,
    ) -> Result<Option<NodeHandle>, DriverError> {
        let Some(sibling) = self.driver.next_sibling(row).await? else {
            return Ok(None);
        };
        let details = self.driver.query(&self.selectors.detail_row).await?;
        Ok(details.into_iter().find(|detail| *detail == sibling))
    }

    /// `resolve(scope, raw_matches)`: the matches inside the scope, in their original order.
    /// An absent container yields an empty set.
    pub async fn resolve(
        &self,
        scope: &ScopeContext,
        raw: Vec<NodeHandle>,
    ) -> Result<Vec<NodeHandle>, DriverError> {
        let boundary = self.boundary(scope).await?;
        Ok(self.filter(scope, &boundary, raw).await?.unwrap_or_default())
    }

    /// Filters against an already computed boundary; `None` when the boundary is absent.
    pub async fn filter(
        &self,
        scope: &ScopeContext,
        boundary: &Boundary,
        raw: Vec<NodeHandle>,
    ) -> Result<Option<Vec<NodeHandle>>, DriverError> {
        let root = match boundary {
            Boundary::Document => return Ok(Some(raw)),
            Boundary::Absent(reason) => {
                trace!(scope = %scope, reason = %reason, "scope boundary absent");
                return Ok(None);
            }
            Boundary::Node(root) => root,
        };

        // Nested tables (a sub-table inside an expanded row) own their own nodes.
        let nested_tables = if matches!(scope, ScopeContext::TableAt(_)) {
            let mut nested = Vec::new();
            for table in self.driver.query(&self.selectors.table).await? {
                if table != *root && self.driver.contains(root, &table).await? {
                    nested.push(table);
                }
            }
            nested
        } else {
            Vec::new()
        };

        let mut inside = Vec::new();
        'candidates: for node in raw {
            if !self.driver.contains(root, &node).await? {
                continue;
            }
            for table in &nested_tables {
                if self.driver.contains(table, &node).await? {
                    continue 'candidates;
                }
            }
            inside.push(node);
        }
        Ok(Some(inside))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driver_adapter::{El, MemoryDriver};

    fn grid(label: &str) -> El {
        El::new("table")
            .class(label)
            .child(El::new("tr").attr("data-row-id", "r1").child(El::new("td").text("one")))
            .child(El::new("tr").attr("data-row-id", "r2").child(El::new("td").text("two")))
    }

    #[tokio::test]
    async fn table_at_filters_to_that_table() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(&root, grid("main"));
        driver.mount(&root, grid("other"));
        let scopes = ScopeResolver::new(Arc::new(driver.clone()), ScopeSelectors::default());

        let cells = driver.query("td").await.unwrap();
        let inside = scopes
            .resolve(&ScopeContext::TableAt(1), cells.clone())
            .await
            .unwrap();
        assert_eq!(inside, cells[2..].to_vec());

        let none = tokio_test::assert_ok!(scopes.resolve(&ScopeContext::TableAt(2), cells).await);
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn nested_table_nodes_belong_to_inner_table() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(
            &root,
            El::new("table")
                .child(El::new("tr").child(El::new("td").child(El::new("button").text("outer"))))
                .child(
                    El::new("tr").class("detail-row").child(
                        El::new("td").child(
                            El::new("table")
                                .child(El::new("tr").child(El::new("td").child(El::new("button").text("inner")))),
                        ),
                    ),
                ),
        );
        let scopes = ScopeResolver::new(Arc::new(driver.clone()), ScopeSelectors::default());
        let buttons = driver.query("button").await.unwrap();

        let outer = scopes
            .resolve(&ScopeContext::TableAt(0), buttons.clone())
            .await
            .unwrap();
        assert_eq!(outer, vec![buttons[0].clone()]);
        let inner = scopes
            .resolve(&ScopeContext::TableAt(1), buttons.clone())
            .await
            .unwrap();
        assert_eq!(inner, vec![buttons[1].clone()]);
    }

    #[tokio::test]
    async fn expanded_row_uses_following_detail_row() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(
            &root,
            El::new("table")
                .child(El::new("tr").attr("data-row-id", "a"))
                .child(El::new("tr").class("detail-row").child(El::new("td").text("details of a")))
                .child(El::new("tr").attr("data-row-id", "b")),
        );
        let scopes = ScopeResolver::new(Arc::new(driver.clone()), ScopeSelectors::default());
        let cells = driver.query("td").await.unwrap();

        let boundary = scopes
            .boundary(&ScopeContext::ExpandedRow("a".into()))
            .await
            .unwrap();
        assert!(matches!(boundary, Boundary::Node(_)));
        let inside = scopes
            .resolve(&ScopeContext::ExpandedRow("a".into()), cells.clone())
            .await
            .unwrap();
        assert_eq!(inside, cells);

        let collapsed = scopes
            .boundary(&ScopeContext::ExpandedRow("b".into()))
            .await
            .unwrap();
        assert_eq!(
            collapsed,
            Boundary::Absent("row 'b' is not expanded".to_string())
        );
    }

    #[tokio::test]
    async fn row_scope_stops_at_the_row() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(
            &root,
            El::new("table")
                .child(El::new("tr").attr("data-row-id", "a").child(El::new("td").child(El::new("button"))))
                .child(El::new("tr").class("detail-row").child(El::new("td").child(El::new("button"))))
                .child(El::new("tr").attr("data-row-id", "b").child(El::new("td").child(El::new("button")))),
        );
        let scopes = ScopeResolver::new(Arc::new(driver.clone()), ScopeSelectors::default());
        let buttons = driver.query("button").await.unwrap();

        let inside = scopes
            .resolve(&ScopeContext::Row("a".into()), buttons.clone())
            .await
            .unwrap();
        assert_eq!(inside, vec![buttons[0].clone()]);
        assert_eq!(
            scopes.boundary(&ScopeContext::Row("z".into())).await.unwrap(),
            Boundary::Absent("row 'z' not rendered".to_string())
        );
    }

    #[tokio::test]
    async fn modal_scope_picks_top_visible_dialog() {
        let driver = MemoryDriver::new();
        let root = driver.root();
        driver.mount(
            &root,
            El::new("div").attr("role", "dialog").hidden().child(El::new("button").text("Old")),
        );
        driver.mount(
            &root,
            El::new("div").attr("role", "dialog").child(El::new("button").text("Save")),
        );
        let outside = driver.mount(&root, El::new("button").text("Save"));
        let scopes = ScopeResolver::new(Arc::new(driver.clone()), ScopeSelectors::default());

        let buttons = driver.query("button").await.unwrap();
        let inside = scopes.resolve(&ScopeContext::Modal, buttons.clone()).await.unwrap();
        assert_eq!(inside, vec![buttons[1].clone()]);
        assert!(!inside.contains(&outside));
    }
}
