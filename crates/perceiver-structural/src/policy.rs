//! Selectors and strategy plans for table widgets

use action_locator::{CandidateStrategy, StrategyPlan};
use serde::{Deserialize, Serialize};

/// Selectors for the parts of a data table. Application data with Material/HTML defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSelectors {
    pub header_cell: String,
    pub row: String,
    pub cell: String,
    /// Shown in place of the table when every column has been deselected
    pub empty_message: String,
    /// Control inside a row that expands or collapses its detail row, resolved in row scope
    pub expand_toggle: StrategyPlan,
    pub column_chooser: ColumnChooserSelectors,
    pub paginator: PaginatorSelectors,
}

impl Default for TableSelectors {
    fn default() -> Self {
        Self {
            header_cell: "th, mat-header-cell, [role=\"columnheader\"]".to_string(),
            row: "tr, mat-row, [role=\"row\"]".to_string(),
            cell: "td, mat-cell, [role=\"cell\"], [role=\"gridcell\"]".to_string(),
            empty_message: ".no-columns-message, [data-no-columns]".to_string(),
            expand_toggle: StrategyPlan::new(
                "expand-toggle",
                vec![
                    CandidateStrategy::new("expand-class", 10, ".expand-toggle").visible_only(),
                    CandidateStrategy::new("expand-button", 20, "button.expand").visible_only(),
                    // Menu triggers carry aria-expanded too; last, so a marked toggle wins.
                    CandidateStrategy::new("aria-expanded", 30, "[aria-expanded]").visible_only(),
                ],
            ),
            column_chooser: ColumnChooserSelectors::default(),
            paginator: PaginatorSelectors::default(),
        }
    }
}

/// The "select headers" dropdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnChooserSelectors {
    /// Visible text of the button that opens the dropdown
    pub trigger_label: String,
    pub trigger: StrategyPlan,
    /// Open dropdown panel; usually rendered at page level, outside the table
    pub panel: String,
    /// One entry per column, labelled with the column header
    pub option: StrategyPlan,
}

impl Default for ColumnChooserSelectors {
    fn default() -> Self {
        Self {
            trigger_label: "Select Headers".to_string(),
            trigger: StrategyPlan::clickable(),
            panel: ".mat-select-panel, .dropdown-menu.show, [role=\"listbox\"]".to_string(),
            option: StrategyPlan::new(
                "column-option",
                vec![
                    CandidateStrategy::new("mat-option", 10, "mat-option").visible_only(),
                    CandidateStrategy::new("dropdown-item", 20, ".dropdown-item").visible_only(),
                    CandidateStrategy::new("role-option", 30, "[role=\"option\"]").visible_only(),
                ],
            ),
        }
    }
}

/// Pagination controls.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginatorSelectors {
    pub next: StrategyPlan,
    /// "1 - 10 of 42" style label that changes with the page
    pub range_label: String,
}

impl Default for PaginatorSelectors {
    fn default() -> Self {
        Self {
            next: StrategyPlan::new(
                "next-page",
                vec![
                    CandidateStrategy::new("mat-next", 10, "button.mat-paginator-navigation-next"),
                    CandidateStrategy::new("aria-next", 20, "[aria-label=\"Next page\"]"),
                    CandidateStrategy::new("bootstrap-next", 30, ".page-item.next .page-link"),
                ],
            ),
            range_label: ".mat-paginator-range-label, .pagination-info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let selectors: TableSelectors = action_locator::from_yaml_str(
            "header_cell: \"th.col\"\ncolumn_chooser:\n  trigger_label: Columns\n",
        )
        .unwrap();
        assert_eq!(selectors.header_cell, "th.col");
        assert_eq!(selectors.cell, TableSelectors::default().cell);
        assert_eq!(selectors.column_chooser.trigger_label, "Columns");
        assert_eq!(
            selectors.column_chooser.option,
            ColumnChooserSelectors::default().option
        );
        selectors.paginator.next.validate().unwrap();
        selectors.expand_toggle.validate().unwrap();
    }
}
