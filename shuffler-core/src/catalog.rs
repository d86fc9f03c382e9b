use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::{RegionId, Result, ShufflerError};

/// Resources that must never move, whatever their enabled flag says.
pub const IGNORED_RESOURCES: &[&str] = &["monument", "fish", "whale"];

/// The one resource whose dynamic block carries a depleted type.
pub const DEPLETED_TYPE_RESOURCE: &str = "gold";
pub const DEPLETED_TYPE_VALUE: &str = "bg_gold_mining";

const MARKER_DYNAMIC: &str = "dynamic";
const MARKER_NO_INITIAL_BUILDINGS: &str = "noInitialBuildings";

/// Quantities of one resource in one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAmounts {
    pub available: u64,
    pub discovered: u64,
    pub undiscovered: u64,
    pub guaranteed_history: u64,
    pub guaranteed_companies: u64,
}

impl RegionAmounts {
    /// Quantity that has to stay in the region through a shuffle.
    pub fn protected(&self) -> u64 {
        self.guaranteed_history.max(self.guaranteed_companies)
    }

    /// Score used by the ranking.
    pub fn combined(&self) -> u64 {
        self.available + self.discovered + self.undiscovered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRegion {
    pub region: RegionId,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub name: String,
    pub color: String,
    pub building_group: String,
    pub building: String,
    pub is_dynamic: bool,
    pub no_initial_buildings: bool,
    pub shuffle_enabled: bool,

    /// One entry per region, indexed by `RegionId`.
    pub regions: Vec<RegionAmounts>,

    pub total: u64,
    pub total_discovered: u64,
    pub total_undiscovered: u64,
    pub guaranteed_history_total: u64,
    pub guaranteed_companies_total: u64,

    pub top_regions: Vec<RankedRegion>,
}

impl ResourceDefinition {
    pub fn new(
        name: impl Into<String>,
        color: impl Into<String>,
        building_group: impl Into<String>,
        building: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            building_group: building_group.into(),
            building: building.into(),
            is_dynamic: false,
            no_initial_buildings: false,
            shuffle_enabled: false,
            regions: Vec::new(),
            total: 0,
            total_discovered: 0,
            total_undiscovered: 0,
            guaranteed_history_total: 0,
            guaranteed_companies_total: 0,
            top_regions: Vec::new(),
        }
    }

    pub fn dynamic(mut self, is_dynamic: bool) -> Self {
        self.is_dynamic = is_dynamic;
        self
    }

    pub fn no_initial_buildings(mut self, no_initial_buildings: bool) -> Self {
        self.no_initial_buildings = no_initial_buildings;
        self
    }

    pub fn is_ignored(&self) -> bool {
        IGNORED_RESOURCES.contains(&self.name.as_str())
    }

    fn reset(&mut self, region_count: usize) {
        self.regions = vec![RegionAmounts::default(); region_count];
        self.total = 0;
        self.total_discovered = 0;
        self.total_undiscovered = 0;
        self.guaranteed_history_total = 0;
        self.guaranteed_companies_total = 0;
        self.top_regions.clear();
    }
}

/// Parse one catalog line. `Ok(None)` for blank lines and comments.
pub fn parse_catalog_line(line: &str) -> std::result::Result<Option<ResourceDefinition>, String> {
    let mut is_dynamic = false;
    let mut no_initial_buildings = false;
    let mut positional = Vec::with_capacity(4);

    for token in line.split_whitespace() {
        match token {
            MARKER_DYNAMIC => is_dynamic = true,
            MARKER_NO_INITIAL_BUILDINGS => no_initial_buildings = true,
            _ => positional.push(token),
        }
    }

    match positional.first() {
        None => return Ok(None),
        Some(first) if first.starts_with('#') || first.starts_with(';') => return Ok(None),
        _ => {}
    }

    let &[name, color, building_group, building, ..] = positional.as_slice() else {
        return Err(format!(
            "expected 'name color building_group building', got {} field(s)",
            positional.len()
        ));
    };

    Ok(Some(
        ResourceDefinition::new(name, color.trim_start_matches('#'), building_group, building)
            .dynamic(is_dynamic)
            .no_initial_buildings(no_initial_buildings),
    ))
}

/// Ordered table of resources. File order is kept because the rewriter emits
/// blocks in catalog order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    resources: Vec<ResourceDefinition>,
    #[serde(skip)]
    by_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resources(resources: impl IntoIterator<Item = ResourceDefinition>) -> Self {
        let mut catalog = Self::new();
        for resource in resources {
            catalog.insert(resource);
        }
        catalog
    }

    /// Returns false, leaving the catalog untouched, when the name is taken.
    pub fn insert(&mut self, resource: ResourceDefinition) -> bool {
        if self.by_name.contains_key(&resource.name) {
            return false;
        }
        self.by_name.insert(resource.name.clone(), self.resources.len());
        self.resources.push(resource);
        true
    }

    pub fn parse(text: &str, source: &str) -> Self {
        let mut catalog = Self::new();
        for (i, line) in text.lines().enumerate() {
            match parse_catalog_line(line) {
                Ok(Some(resource)) => {
                    let name = resource.name.clone();
                    if !catalog.insert(resource) {
                        warn!("{source}:{}: duplicate resource '{name}' skipped", i + 1);
                    }
                }
                Ok(None) => {}
                Err(reason) => warn!("{source}:{}: skipping line {line:?}: {reason}", i + 1),
            }
        }
        catalog
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ShufflerError::CatalogMissing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let catalog = Self::parse(&text, &path.display().to_string());

        let dynamic = catalog.iter().filter(|r| r.is_dynamic).count();
        info!(
            "Loaded {} static resources and {} dynamic resources",
            catalog.len() - dynamic,
            dynamic
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResourceDefinition> {
        self.resources.iter_mut()
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDefinition> {
        self.by_name.get(name).map(|&i| &self.resources[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ResourceDefinition> {
        self.by_name.get(name).map(|&i| &mut self.resources[i])
    }

    pub fn index_of_building(&self, building: &str) -> Option<usize> {
        self.resources.iter().position(|r| r.building == building)
    }

    pub fn index_of_building_group(&self, building_group: &str) -> Option<usize> {
        self.resources
            .iter()
            .position(|r| r.building_group == building_group)
    }

    pub(crate) fn by_index_mut(&mut self, index: usize) -> &mut ResourceDefinition {
        &mut self.resources[index]
    }

    /// Re-size every per-region array to `region_count` and zero all counters.
    pub fn reset(&mut self, region_count: usize) {
        for resource in &mut self.resources {
            resource.reset(region_count);
        }
    }

    /// Enable exactly the named resources. Returns the names that matched
    /// nothing.
    pub fn set_enabled<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        for resource in &mut self.resources {
            resource.shuffle_enabled = false;
        }
        let mut unknown = Vec::new();
        for name in names {
            match self.get_mut(name.as_ref()) {
                Some(resource) => resource.shuffle_enabled = true,
                None => unknown.push(name.as_ref().to_string()),
            }
        }
        unknown
    }

    pub fn enable_all(&mut self) {
        for resource in &mut self.resources {
            resource.shuffle_enabled = true;
        }
    }

    pub fn enabled_names(&self) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|r| r.shuffle_enabled)
            .map(|r| r.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_static_resource_line() {
        let resource = parse_catalog_line("iron #aaffaa bg_iron_mining building_iron_mine")
            .unwrap()
            .unwrap();
        assert_eq!(resource.name, "iron");
        assert_eq!(resource.color, "aaffaa");
        assert_eq!(resource.building_group, "bg_iron_mining");
        assert_eq!(resource.building, "building_iron_mine");
        assert!(!resource.is_dynamic);
        assert!(!resource.no_initial_buildings);
        assert!(!resource.shuffle_enabled);
    }

    #[test]
    fn markers_can_appear_anywhere() {
        let resource =
            parse_catalog_line("rubber dynamic 778833 bg_rubber building_rubber_plantation noInitialBuildings")
                .unwrap()
                .unwrap();
        assert_eq!(resource.name, "rubber");
        assert_eq!(resource.building_group, "bg_rubber");
        assert!(resource.is_dynamic);
        assert!(resource.no_initial_buildings);
    }

    #[test]
    fn short_lines_are_rejected_and_comments_ignored() {
        assert!(parse_catalog_line("iron aaffaa bg_iron_mining").is_err());
        assert!(parse_catalog_line("   ").unwrap().is_none());
        assert!(parse_catalog_line("# name color group building").unwrap().is_none());
    }

    #[test]
    fn parse_skips_bad_and_duplicate_lines() {
        let catalog = Catalog::parse(
            "iron aaffaa bg_iron_mining building_iron_mine\n\
             broken line\n\
             iron 000000 bg_other building_other\n\
             coal 333333 bg_coal_mining building_coal_mine\n",
            "test",
        );
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("iron").unwrap().building_group, "bg_iron_mining");
        let names: Vec<_> = catalog.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["iron", "coal"]);
    }

    #[test]
    fn missing_catalog_is_fatal() {
        let err = Catalog::load(Path::new("/definitely/not/here/resources.ini")).unwrap_err();
        assert!(matches!(err, ShufflerError::CatalogMissing(_)));
    }

    #[test]
    fn reset_sizes_arrays_and_clears_counters() {
        let mut catalog = Catalog::parse("iron aaffaa bg_iron_mining building_iron_mine", "test");
        catalog.reset(3);
        let iron = catalog.get_mut("iron").unwrap();
        iron.regions[1].available = 4;
        iron.total = 4;
        catalog.reset(2);
        let iron = catalog.get("iron").unwrap();
        assert_eq!(iron.regions, vec![RegionAmounts::default(); 2]);
        assert_eq!(iron.total, 0);
    }

    #[test]
    fn set_enabled_reports_unknown_names() {
        let mut catalog = Catalog::parse(
            "iron aaffaa bg_iron_mining building_iron_mine\ncoal 333333 bg_coal_mining building_coal_mine",
            "test",
        );
        catalog.enable_all();
        let unknown = catalog.set_enabled(&["coal", "unobtainium"]);
        assert_eq!(unknown, ["unobtainium"]);
        assert_eq!(catalog.enabled_names(), ["coal"]);
    }

    #[test]
    fn protected_is_the_larger_guarantee() {
        let amounts = RegionAmounts {
            guaranteed_history: 3,
            guaranteed_companies: 5,
            ..Default::default()
        };
        assert_eq!(amounts.protected(), 5);
    }
}
