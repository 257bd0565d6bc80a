use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_MAX_SCALE: i32 = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySpec {
    pub code: String,
    pub display_name: String,
    pub max_scale: i32,
}

/// Closed set of checklist categories, injected into the pipeline instead
/// of being hard-coded at each call site. The default set matches the
/// service's standard checklist; deployments can override it with a JSON
/// file of `CategorySpec` entries.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    categories: BTreeMap<String, CategorySpec>,
}

impl CategoryConfig {
    pub fn new(specs: Vec<CategorySpec>) -> Self {
        let categories = specs
            .into_iter()
            .map(|spec| (spec.code.clone(), spec))
            .collect();
        Self { categories }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read category config {}", path.display()))?;
        let specs: Vec<CategorySpec> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid category config {}", path.display()))?;
        anyhow::ensure!(!specs.is_empty(), "category config must list at least one category");
        for spec in &specs {
            anyhow::ensure!(
                spec.max_scale >= 1,
                "category {} has non-positive max_scale",
                spec.code
            );
        }
        Ok(Self::new(specs))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.categories.contains_key(code)
    }

    pub fn max_scale(&self, code: &str) -> i32 {
        self.categories
            .get(code)
            .map(|spec| spec.max_scale)
            .unwrap_or(DEFAULT_MAX_SCALE)
    }

    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.categories
            .get(code)
            .map(|spec| spec.display_name.as_str())
            .unwrap_or(code)
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self::new(vec![
            CategorySpec {
                code: "nutrition".to_string(),
                display_name: "Nutrition".to_string(),
                max_scale: DEFAULT_MAX_SCALE,
            },
            CategorySpec {
                code: "hypertension".to_string(),
                display_name: "Blood Pressure".to_string(),
                max_scale: DEFAULT_MAX_SCALE,
            },
            CategorySpec {
                code: "depression".to_string(),
                display_name: "Mood".to_string(),
                max_scale: DEFAULT_MAX_SCALE,
            },
        ])
    }
}
