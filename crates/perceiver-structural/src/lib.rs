//! Structural perception of data tables
//!
//! Reads header maps, rows and cells from the live page without caching anything across
//! renders, and drives the widgets that change a table's shape: expandable rows, the
//! column chooser and the paginator.

pub mod api;
mod controls;
pub mod errors;
mod lifecycle;
pub mod model;
pub mod policy;
pub mod structural;

pub use api::StructuralPerceiver;
pub use errors::PerceiverError;
pub use model::{ColumnSnapshot, RowCursor, RowExpansion, TableModel};
pub use policy::{ColumnChooserSelectors, PaginatorSelectors, TableSelectors};
pub use structural::TablePerceiver;
