use crate::collectors::{
    metric::{Column, ColumnType},
    stat_database::selector::ColumnSet,
};

/// Builds the `SELECT` for `columns` against `view`.
///
/// Every column keeps its own name in the result. Numbers are read as
/// `double precision` and identities as `text` so each column decodes from a single
/// wire type regardless of the server's native column type. Column names come from
/// the catalog only and are not quoted.
#[must_use]
pub fn build_query(view: &str, columns: &ColumnSet) -> String {
    let projection = columns
        .columns()
        .iter()
        .map(project)
        .collect::<Vec<_>>()
        .join(", ");

    format!("SELECT {projection} FROM {view};")
}

fn project(column: &Column) -> String {
    match column.ty {
        ColumnType::Text => format!("{0}::text AS {0}", column.name),
        ColumnType::Number => format!("{0}::double precision AS {0}", column.name),
        ColumnType::Timestamp => column.name.to_string(),
    }
}
