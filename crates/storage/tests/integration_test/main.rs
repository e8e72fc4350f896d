//! Integration tests for rota-storage.
//!
//! Everything runs against `MemoryBackend` except the `postgres` module,
//! whose tests are `#[ignore]`d and need a reachable server configured
//! through the usual `PG_*` variables.

mod bootstrap;
mod employees;
mod helpers;
mod postgres;
mod schedules;
