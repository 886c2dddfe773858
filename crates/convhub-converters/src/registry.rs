//! Converter dispatch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use convhub_core::config::ConvertersConfig;
use convhub_core::traits::{Converter, ConverterError};
use convhub_core::types::{ConversionOptions, Format};

use crate::process::ProcessConverter;
use crate::raster::ImageConverter;

/// A converter that forwards each request to the first registered
/// converter supporting the format pair.
#[derive(Debug, Default, Clone)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn Converter>>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in converters: raster images first, then external tools.
    pub fn with_defaults(config: &ConvertersConfig, timeout: Duration) -> Self {
        Self::new()
            .register(Arc::new(ImageConverter::new()))
            .register(Arc::new(ProcessConverter::new(config, timeout)))
    }

    /// Append a converter. Earlier registrations take precedence.
    pub fn register(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converters.push(converter);
        self
    }

    /// The converter that would handle `source -> target`.
    pub fn resolve(&self, source: &Format, target: &Format) -> Option<&Arc<dyn Converter>> {
        self.converters.iter().find(|c| c.supports(source, target))
    }

    /// Number of registered converters.
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Whether no converters are registered.
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

#[async_trait]
impl Converter for ConverterRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn supports(&self, source: &Format, target: &Format) -> bool {
        self.resolve(source, target).is_some()
    }

    async fn convert(
        &self,
        source: &Format,
        target: &Format,
        input: Bytes,
        options: &ConversionOptions,
    ) -> Result<Bytes, ConverterError> {
        let converter = self.resolve(source, target).ok_or_else(|| {
            ConverterError::Unsupported(format!("no converter registered for {source} -> {target}"))
        })?;
        debug!(converter = converter.name(), %source, %target, "Dispatching conversion");
        converter.convert(source, target, input, options).await
    }
}
