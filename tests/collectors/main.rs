//! Collector protocol tests against an in-memory `pg_stat_database`.
//! No database required.

mod memory;
mod registry;
mod stat_database;
