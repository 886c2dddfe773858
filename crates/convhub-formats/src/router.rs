//! Conversion routing.

use std::collections::BTreeSet;

use convhub_core::types::Format;
use convhub_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::catalog::{Category, FormatCatalog};

/// Category pairs convertible across categories. Membership is checked in
/// both directions.
const BRIDGES: &[(Category, Category)] = &[
    (Category::Image, Category::Document),
    (Category::Document, Category::Image),
    (Category::Video, Category::Audio),
    (Category::Video, Category::Image),
];

/// Category-level operation for a supported pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Conversion within one category.
    Transcode {
        /// Shared category.
        category: Category,
    },
    /// Conversion across a whitelisted category pair.
    Bridge {
        /// Source category.
        from: Category,
        /// Target category.
        to: Category,
    },
}

/// Outcome of routing a supported format pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Category of the source format.
    pub source_category: Category,
    /// Category of the target format.
    pub target_category: Category,
    /// Operation to perform.
    pub operation: Operation,
}

/// Decides whether a format pair is convertible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRouter {
    catalog: FormatCatalog,
}

impl ConversionRouter {
    /// Create a router over the static catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Category of `format`, if known.
    pub fn category_of(&self, format: &Format) -> Option<Category> {
        self.catalog.category_of(format)
    }

    /// Whether `source -> target` is supported.
    pub fn is_supported(&self, source: &Format, target: &Format) -> bool {
        match (self.category_of(source), self.category_of(target)) {
            (Some(s), Some(t)) => s == t || Self::bridged(s, t),
            _ => false,
        }
    }

    /// All formats `source` can be converted to, excluding itself, sorted.
    pub fn supported_targets(&self, source: &Format) -> BTreeSet<Format> {
        self.catalog
            .all_formats()
            .filter(|target| target != source && self.is_supported(source, target))
            .collect()
    }

    /// Route a pair, or fail with `UnsupportedConversion`.
    pub fn route(&self, source: &Format, target: &Format) -> AppResult<Route> {
        let unsupported =
            || AppError::unsupported_conversion(format!("Cannot convert {source} to {target}"));
        let source_category = self.category_of(source).ok_or_else(unsupported)?;
        let target_category = self.category_of(target).ok_or_else(unsupported)?;
        let operation = if source_category == target_category {
            Operation::Transcode {
                category: source_category,
            }
        } else if Self::bridged(source_category, target_category) {
            Operation::Bridge {
                from: source_category,
                to: target_category,
            }
        } else {
            return Err(unsupported());
        };
        Ok(Route {
            source_category,
            target_category,
            operation,
        })
    }

    fn bridged(a: Category, b: Category) -> bool {
        BRIDGES.contains(&(a, b)) || BRIDGES.contains(&(b, a))
    }
}
