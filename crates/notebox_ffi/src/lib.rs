//! Flutter bridge surface for `notebox_core`.

pub mod api;
