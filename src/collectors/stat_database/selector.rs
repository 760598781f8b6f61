use crate::collectors::{
    metric::{Catalog, Column},
    version::ServerVersion,
};

/// Ordered columns requested in one collection cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<Column>,
}

impl ColumnSet {
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn push(&mut self, column: Column) {
        if !self.contains(column.name) {
            self.columns.push(column);
        }
    }
}

/// Picks the columns to request from a server at `version`.
///
/// Identity columns come first, then every ungated column in catalog order, then
/// the gated columns the version satisfies, also in catalog order. With no version
/// only ungated columns are requested.
#[must_use]
pub fn select_columns(
    identity: &[Column],
    catalog: &Catalog,
    version: Option<&ServerVersion>,
) -> ColumnSet {
    let mut set = ColumnSet {
        columns: Vec::with_capacity(identity.len() + catalog.len()),
    };

    for column in identity {
        set.push(*column);
    }

    for def in catalog.iter().filter(|d| d.min_version().is_none()) {
        set.push(def.column());
    }

    for def in catalog
        .iter()
        .filter(|d| d.min_version().is_some() && d.available_for(version))
    {
        set.push(def.column());
    }

    set
}
