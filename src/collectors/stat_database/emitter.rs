use crate::collectors::{
    error::ScrapeError,
    metric::{Catalog, MissingPolicy, Observation},
    stat_database::{decoder::StatRow, selector::ColumnSet},
};
use tracing::debug;

/// Turns a decoded row into observations, appending them to `out`.
///
/// Only definitions whose column was requested are considered. A definition whose
/// value is absent either emits its default or is skipped on its own, as is a
/// counter whose value is negative or not finite; the rest of the row is
/// unaffected. Returns the number of observations appended.
///
/// # Errors
///
/// Returns [`ScrapeError::LabelArity`] if a definition's label schema does not
/// match the row's label values.
pub fn emit_row(
    catalog: &Catalog,
    columns: &ColumnSet,
    row: &StatRow,
    out: &mut Vec<Observation>,
) -> Result<usize, ScrapeError> {
    let labels = row.label_values();
    let before = out.len();

    for def in catalog.iter().filter(|d| columns.contains(d.column().name)) {
        let column = def.column().name;

        let converted = row.value(column).and_then(|v| {
            let converted = def.conversion().apply(v);
            if converted.is_none() {
                debug!(metric = def.name(), column, "value has unexpected type");
            }
            converted
        });

        let value = match (converted, def.missing()) {
            (Some(value), _) => value,
            (None, MissingPolicy::Default(default)) => {
                debug!(
                    metric = def.name(),
                    datname = row.datname(),
                    default,
                    "no {column}, emitting default"
                );
                default
            }
            (None, MissingPolicy::Skip) => {
                debug!(
                    metric = def.name(),
                    datid = row.datid(),
                    datname = row.datname(),
                    "skipping metric because it has no {column}"
                );
                continue;
            }
        };

        if !def.kind().accepts(value) {
            debug!(
                metric = def.name(),
                datname = row.datname(),
                value,
                "skipping {} with out-of-range value",
                def.kind()
            );
            continue;
        }

        let observation =
            Observation::new(def, value, labels.clone()).ok_or_else(|| ScrapeError::LabelArity {
                metric: def.name().to_string(),
                expected: def.label_names().len(),
                got: labels.len(),
            })?;

        out.push(observation);
    }

    Ok(out.len() - before)
}
