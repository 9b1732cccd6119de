//! PicView — an image viewer with freehand annotation and rectangular
//! cropping. The editing core (`raster`, `viewport`) is independent of any
//! window or display object so it can be driven headless in tests; `app`
//! wires it to egui.

pub mod app;
pub mod io;
pub mod logger;
pub mod raster;
pub mod settings;
pub mod viewport;
