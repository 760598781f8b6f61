//! Process-wide, read-only list of databases excluded from collection.
//! Set once at startup from the CLI/env.

use once_cell::sync::OnceCell;
use std::sync::Arc;

static EXCLUDED: OnceCell<Arc<[String]>> = OnceCell::new();

/// Set the excluded databases from CLI/env. Only the first call takes effect.
pub fn set_excluded_databases(list: Vec<String>) {
    let _ = EXCLUDED.set(Arc::from(normalize(list)));
}

// Trims names, drops empty ones and duplicates, keeping first-seen order.
fn normalize(list: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(list.len());
    for name in list.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if !cleaned.iter().any(|c| c == name) {
            cleaned.push(name.to_string());
        }
    }
    cleaned
}

/// Get the excluded databases, empty if never set.
#[inline]
pub fn get_excluded_databases() -> &'static [String] {
    match EXCLUDED.get() {
        Some(arc) => &arc[..],
        None => &[],
    }
}
