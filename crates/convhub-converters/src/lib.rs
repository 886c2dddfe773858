//! # convhub-converters
//!
//! Implementations of the [`Converter`](convhub_core::traits::Converter)
//! capability: an in-process raster image converter, an external-process
//! converter driving ffmpeg and LibreOffice, and a registry that routes each
//! request to the first converter able to handle it.

pub mod raster;
pub mod process;
pub mod registry;

pub use raster::ImageConverter;
pub use process::ProcessConverter;
pub use registry::ConverterRegistry;
