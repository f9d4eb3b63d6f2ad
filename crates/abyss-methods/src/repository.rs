//! Method repository: finds `layer<L>_method<M>.<ext>` scripts in one directory

use abyss_core::{Error, LayerPlan, MethodDescriptor, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::MethodSource;

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^layer([0-9]+)_method([0-9]+)\.(.+)$").ok())
        .as_ref()
}

/// Parse `(layer, method)` out of a method file name.
///
/// Both numbers must be positive and the extension must match exactly.
/// Leading zeros are allowed, so `layer1_method01.sh` is method 1.
pub fn parse_method_name(file_name: &str, extension: &str) -> Option<(u32, u32)> {
    let caps = name_pattern()?.captures(file_name)?;
    if &caps[3] != extension {
        return None;
    }
    let layer: u32 = caps[1].parse().ok()?;
    let method: u32 = caps[2].parse().ok()?;
    if layer == 0 || method == 0 {
        return None;
    }
    Some((layer, method))
}

pub struct MethodRepository {
    root: PathBuf,
    extension: String,
}

impl MethodRepository {
    pub fn new(root: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Every layer in `1..=layer_count` that has at least one method, in
    /// ascending order. The directory is read once however many layers are
    /// asked for; layers without methods are left out.
    pub async fn catalog(&self, layer_count: u32) -> Result<Vec<LayerPlan>> {
        let found = self.scan(|layer| layer <= layer_count).await?;

        let mut by_layer: BTreeMap<u32, Vec<(u32, String, PathBuf)>> = BTreeMap::new();
        for (layer, method, name, path) in found {
            by_layer.entry(layer).or_default().push((method, name, path));
        }
        Ok(by_layer
            .into_iter()
            .map(|(layer, found)| build_plan(layer, found))
            .collect())
    }

    /// Method files whose layer passes `wanted`, as `(layer, method, name, path)`.
    async fn scan(
        &self,
        wanted: impl Fn(u32) -> bool + Send,
    ) -> Result<Vec<(u32, u32, String, PathBuf)>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::discovery(&self.root, e.to_string()))?;

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::discovery(&self.root, e.to_string()))?
        {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some((layer, method)) = parse_method_name(&name, &self.extension) else {
                if name.starts_with("layer") {
                    debug!("discover: skipping '{}' (not a method name)", name);
                }
                continue;
            };
            if !wanted(layer) {
                continue;
            }

            // Dangling symlinks stay in: running them fails like any other broken method.
            let path = entry.path();
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if meta.is_dir() {
                    debug!("discover: skipping directory '{}'", name);
                    continue;
                }
            }
            found.push((layer, method, name, path));
        }
        Ok(found)
    }
}

/// Sort by method number, then file name, and keep the first of any duplicates.
fn build_plan(layer: u32, mut found: Vec<(u32, String, PathBuf)>) -> LayerPlan {
    found.sort();

    let mut methods: Vec<MethodDescriptor> = Vec::with_capacity(found.len());
    for (method, name, path) in found {
        if methods.last().is_some_and(|prev| prev.method == method) {
            warn!(
                "Layer {} has more than one method {}; ignoring '{}'",
                layer, method, name
            );
            continue;
        }
        methods.push(MethodDescriptor::new(path, layer, method));
    }
    LayerPlan::new(layer, methods)
}

#[async_trait::async_trait]
impl MethodSource for MethodRepository {
    async fn discover(&self, layer: u32) -> Result<LayerPlan> {
        debug!("discover: layer {} in {}", layer, self.root.display());

        let found = self
            .scan(|l| l == layer)
            .await?
            .into_iter()
            .map(|(_, method, name, path)| (method, name, path))
            .collect();
        let plan = build_plan(layer, found);

        debug!("discover: layer {} → {} methods", layer, plan.len());
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_pattern_compiles() {
        assert!(name_pattern().is_some());
    }

    #[test]
    fn parses_simple_names() {
        assert_eq!(parse_method_name("layer1_method1.sh", "sh"), Some((1, 1)));
        assert_eq!(parse_method_name("layer12_method305.sh", "sh"), Some((12, 305)));
        assert_eq!(parse_method_name("layer2_method3.py", "py"), Some((2, 3)));
    }

    #[test]
    fn accepts_leading_zeros() {
        assert_eq!(parse_method_name("layer1_method01.sh", "sh"), Some((1, 1)));
        assert_eq!(parse_method_name("layer003_method2.sh", "sh"), Some((3, 2)));
    }

    #[test]
    fn rejects_missing_or_bad_method_number() {
        assert_eq!(parse_method_name("layer1_method.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_methodX.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_method2a.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_method-2.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_method 2.sh", "sh"), None);
    }

    #[test]
    fn rejects_zero_numbers() {
        assert_eq!(parse_method_name("layer0_method1.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_method0.sh", "sh"), None);
    }

    #[test]
    fn rejects_wrong_extension() {
        assert_eq!(parse_method_name("layer1_method1.py", "sh"), None);
        assert_eq!(parse_method_name("layer1_method1.sh.bak", "sh"), None);
        assert_eq!(parse_method_name("layer1_method1", "sh"), None);
    }

    #[test]
    fn rejects_prefix_and_suffix_noise() {
        assert_eq!(parse_method_name("xlayer1_method1.sh", "sh"), None);
        assert_eq!(parse_method_name("Layer1_method1.sh", "sh"), None);
        assert_eq!(parse_method_name("layer1_method1_old.sh", "sh"), None);
    }

    #[test]
    fn rejects_overflowing_numbers() {
        assert_eq!(parse_method_name("layer1_method99999999999.sh", "sh"), None);
    }
}
