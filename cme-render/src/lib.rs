//! Rendering for the census map explorer.
//!
//! This crate turns fetched datasets into surface-ready values:
//! - `choropleth`: the colored, clickable tract layer and its legend
//! - `chart`: the ordered percentage bars of one selected tract
//! - `color`, `format`: palette and number formatting shared by both

pub mod chart;
pub mod choropleth;
pub mod color;
pub mod format;
