//! Foundational primitives for point-cloud metrology.
//!
//! ## Point Clouds
//! A [`PointCloud`] is an unordered sample set of millimetre coordinates.
//! It is a value type: every transform (rotate, translate, negate, filter)
//! returns a new cloud and never touches its input, so a cloud can be handed
//! to several worker threads without aliasing concerns.
//!
//! ## Named Axes
//! Windowing and projection always take [`Axis`] / [`Plane`] arguments
//! rather than column indices. Which physical direction an axis denotes is a
//! per-view convention of the caller.
//!
//! ## Rasters
//! Images use element stride (not byte stride). `stride` is the distance, in
//! elements, between adjacent row starts and may be greater than `width`.
//! Filters read outside a raster through [`reflect_101`], which mirrors around
//! edge pixels without repeating edge elements.

mod border;
mod cloud;
mod error;
mod geom;
mod image;
mod stats;

pub use border::reflect_101;
pub use cloud::{Bounds, PointCloud};
pub use error::Error;
pub use geom::{Axis, Plane, Point2, Point3, Vec2};
pub use image::{Image, ImageView};
pub use stats::{mean, median};
