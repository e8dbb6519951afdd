//! Themed bitmap resolution engine
//!
//! This library decides, for every bitmap embedded in a host-managed binary,
//! which raster is currently "active": the original embedded pixels, a
//! theme-rendered replacement produced from a vector template, or a
//! user-uploaded replacement. It provides:
//! - A parser for the constrained single-level vector template format
//! - A rasterizer that substitutes a theme palette into named fill slots
//! - A per-image resolution cell with strict precedence (user > theme > original)
//! - A registry aggregating all cells into the replacement map consumed by
//!   the host image store

pub mod cell;
pub mod cli;
pub mod color;
pub mod models;
pub mod output;
pub mod palette;
pub mod raster;
pub mod registry;
pub mod store;
pub mod surface;
pub mod template;
