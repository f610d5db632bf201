//! Satellite basemap viewer, GeoTIFF inspector and BigEarthNet explorer.
//!
//! The `rusty-earth` binary drives these modules; `generate_sample` reuses the
//! dataset layout and GeoTIFF writer to build offline fixtures.

pub mod app;
pub mod cli;
pub mod color;
pub mod data;
pub mod inspect;
pub mod map;
pub mod raster;
pub mod state;
pub mod ui;
