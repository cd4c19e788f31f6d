//! Flutter bridge crate for ComicDesk.
//!
//! `api` holds every function exported to Dart.

pub mod api;
