use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::catalog::{Catalog, ResourceDefinition};
use crate::lines::{self, LineCursor};
use crate::{RegionId, Result, ShufflerError};

/// Region files starting with this prefix are placeholders, not gameplay data.
pub const REGION_SKIP_PREFIX: &str = "99";

const TEMP_SUFFIX: &str = ".tmp";

/// Regular files directly inside `dir` whose name passes `keep`, sorted by
/// name so region ids are stable between runs.
pub(crate) fn list_data_files(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(TEMP_SUFFIX) || !keep(&name) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

pub(crate) fn region_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list_data_files(dir, |name| !name.starts_with(REGION_SKIP_PREFIX))
}

/// Bidirectional `name <-> id` table. Ids are handed out in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionIndex {
    names: Vec<String>,
    ids: HashMap<String, RegionId>,
}

impl RegionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every region declared in the directory's region files.
    ///
    /// An empty result is logged but still returned; deciding whether that is
    /// fatal is up to the caller. A region declared twice is fatal, since its
    /// blocks would be merged and written back before both closers.
    pub fn build(dir: &Path) -> Result<Self> {
        let mut index = Self::new();
        for path in region_files(dir)? {
            let text = fs::read_to_string(&path)?;
            index.add_declarations(&text)?;
        }

        if index.is_empty() {
            error!("No regions found in {}", dir.display());
        } else {
            info!("Found {} regions in {}", index.len(), dir.display());
        }
        Ok(index)
    }

    /// Assign the next ids to the regions declared in `text`.
    pub fn add_declarations(&mut self, text: &str) -> Result<()> {
        for line in text.lines() {
            if let Some(name) = lines::region_declaration(line) {
                self.push(name)?;
            }
        }
        Ok(())
    }

    fn push(&mut self, name: &str) -> Result<RegionId> {
        if self.ids.contains_key(name) {
            return Err(ShufflerError::DuplicateRegion(name.to_string()));
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<RegionId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: RegionId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }
}

/// Per-region data that is not tied to a single catalog resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub naval_exit_id: u32,
    /// Sum of capped catalog resources.
    pub static_total: u64,
    /// Capped entries whose building group is not in the catalog, in file
    /// order. They never move but are written back.
    pub uncatalogued_capped: Vec<(String, u32)>,
    /// Discoverable blocks that belong to no dynamic catalog resource, kept
    /// verbatim with their terminators.
    pub uncatalogued_blocks: Vec<String>,
}

impl RegionInfo {
    /// Whether the rewriter emits a `capped_resources` block for the region.
    pub fn has_capped_block(&self) -> bool {
        self.static_total > 0 || !self.uncatalogued_capped.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Static,
    Dynamic,
}

#[derive(Debug, Default)]
struct ExtractTotals {
    lines: usize,
    static_found: u64,
    discovered: u64,
    undiscovered: u64,
}

/// Fill the catalog's per-region amounts from the region files.
///
/// The catalog must already be sized for `index.len()` regions. Finding no
/// capped resources, or no discoverable ones, means the directory is not a
/// usable data source and fails the run.
pub fn extract_regions(dir: &Path, index: &RegionIndex, catalog: &mut Catalog) -> Result<Vec<RegionInfo>> {
    info!("Reading region files from {}", dir.display());
    check_sized(index, catalog)?;

    let mut regions = vec![RegionInfo::default(); index.len()];
    let mut totals = ExtractTotals::default();
    for path in region_files(dir)? {
        let text = fs::read_to_string(&path)?;
        extract_text(&text, index, catalog, &mut regions, &mut totals);
    }

    if totals.static_found == 0 {
        return Err(ShufflerError::NoStaticResources(dir.to_path_buf()));
    }
    info!("Found {} static resources", totals.static_found);
    for resource in catalog.iter().filter(|r| r.total > 0) {
        info!("Static: {} {}", resource.total, resource.name);
    }

    if totals.discovered + totals.undiscovered == 0 {
        return Err(ShufflerError::NoDynamicResources(dir.to_path_buf()));
    }
    info!(
        "Found {} dynamic resources ({} discovered, {} undiscovered)",
        totals.discovered + totals.undiscovered,
        totals.discovered,
        totals.undiscovered
    );
    for resource in catalog.iter().filter(|r| r.is_dynamic) {
        info!(
            "Dynamic: {} discovered, {} undiscovered {}",
            resource.total_discovered, resource.total_undiscovered, resource.name
        );
    }

    info!("Total lines in region files: {}", totals.lines);
    Ok(regions)
}

fn check_sized(index: &RegionIndex, catalog: &Catalog) -> Result<()> {
    match catalog.iter().find(|r| r.regions.len() != index.len()) {
        Some(resource) => Err(ShufflerError::Config(format!(
            "resource '{}' is sized for {} regions, index has {}",
            resource.name,
            resource.regions.len(),
            index.len()
        ))),
        None => Ok(()),
    }
}

fn dynamic_resource(catalog: &Catalog, token: &str) -> Option<usize> {
    catalog
        .iter()
        .position(|r| r.is_dynamic && r.building_group == token)
}

fn extract_text(
    text: &str,
    index: &RegionIndex,
    catalog: &mut Catalog,
    regions: &mut [RegionInfo],
    totals: &mut ExtractTotals,
) {
    let mut cursor = LineCursor::new(text);
    totals.lines += text.lines().count();

    let mut current: Option<RegionId> = None;
    let mut block = Block::None;
    // Lines of the discoverable block being read, opener included.
    let mut pending: Vec<&str> = Vec::new();

    while let Some(line) = cursor.next() {
        if let Some(name) = lines::region_declaration(line) {
            current = index.id(name);
            block = Block::None;
            continue;
        }
        let Some(region) = current else {
            continue;
        };
        let region_name = index.name(region).unwrap_or("?");

        if lines::is_static_opener(line) {
            add_static_amounts(line, region, region_name, catalog, regions, totals);
            block = if lines::brace_delta(line) > 0 {
                Block::Static
            } else {
                Block::None
            };
            continue;
        }
        if lines::is_dynamic_opener(line) {
            if lines::brace_delta(line) > 0 {
                pending = vec![line];
                block = Block::Dynamic;
            } else {
                add_inline_dynamic(line, region, region_name, catalog, &mut regions[region], totals);
                block = Block::None;
            }
            continue;
        }

        if let Some(naval) = lines::naval_exit_id(line) {
            regions[region].naval_exit_id = naval;
        }

        match block {
            Block::None => {}
            Block::Static => {
                if lines::is_block_closer(line) {
                    block = Block::None;
                } else {
                    add_static_amounts(line, region, region_name, catalog, regions, totals);
                }
            }
            Block::Dynamic => {
                pending.push(line);
                if lines::is_block_closer(line) {
                    keep_uncatalogued_block(&pending, None, region_name, &mut regions[region]);
                    block = Block::None;
                } else if let Some(token) = lines::dynamic_type(line) {
                    match dynamic_resource(catalog, token) {
                        Some(i) => {
                            scan_dynamic_block(&mut cursor, catalog.by_index_mut(i), region, totals);
                        }
                        None => {
                            for rest in cursor.by_ref() {
                                pending.push(rest);
                                if lines::is_block_closer(rest) {
                                    break;
                                }
                            }
                            keep_uncatalogued_block(&pending, Some(token), region_name, &mut regions[region]);
                        }
                    }
                    block = Block::None;
                }
            }
        }
    }
}

fn add_static_amounts(
    line: &str,
    region: RegionId,
    region_name: &str,
    catalog: &mut Catalog,
    regions: &mut [RegionInfo],
    totals: &mut ExtractTotals,
) {
    for (token, amount) in lines::amount_pairs(line) {
        let Some(i) = catalog.index_of_building_group(token) else {
            warn!("{region_name}: {token} = {amount} is not in the catalog, kept as is");
            regions[region].uncatalogued_capped.push((token.to_string(), amount));
            continue;
        };
        let amount = u64::from(amount);
        let resource = catalog.by_index_mut(i);
        resource.regions[region].available += amount;
        resource.total += amount;
        regions[region].static_total += amount;
        totals.static_found += amount;
    }
}

fn add_discoverable(line: &str, resource: &mut ResourceDefinition, region: RegionId, totals: &mut ExtractTotals) {
    if let Some(amount) = lines::discovered_amount(line).map(u64::from) {
        resource.regions[region].discovered += amount;
        resource.total_discovered += amount;
        totals.discovered += amount;
    }
    if let Some(amount) = lines::undiscovered_amount(line).map(u64::from) {
        resource.regions[region].undiscovered += amount;
        resource.total_undiscovered += amount;
        totals.undiscovered += amount;
    }
}

/// `resource = { type = "..." discovered_amount = N }` on a single line.
fn add_inline_dynamic(
    line: &str,
    region: RegionId,
    region_name: &str,
    catalog: &mut Catalog,
    info: &mut RegionInfo,
    totals: &mut ExtractTotals,
) {
    let token = lines::dynamic_type(line);
    match token.and_then(|t| dynamic_resource(catalog, t)) {
        Some(i) => add_discoverable(line, catalog.by_index_mut(i), region, totals),
        None => keep_uncatalogued_block(&[line], token, region_name, info),
    }
}

fn keep_uncatalogued_block(block: &[&str], token: Option<&str>, region_name: &str, info: &mut RegionInfo) {
    warn!(
        "{region_name}: discoverable block of type {} is not in the catalog, kept as is",
        token.unwrap_or("<none>")
    );
    info.uncatalogued_blocks.push(block.concat());
}

/// Consume the rest of one `resource = { ... }` block, up to and including
/// its closer.
fn scan_dynamic_block(
    cursor: &mut LineCursor<'_>,
    resource: &mut ResourceDefinition,
    region: RegionId,
    totals: &mut ExtractTotals,
) {
    for line in cursor.by_ref() {
        if lines::is_block_closer(line) {
            break;
        }
        add_discoverable(line, resource, region, totals);
    }
    debug!(
        "{} in region {region}: {} discovered, {} undiscovered",
        resource.name, resource.regions[region].discovered, resource.regions[region].undiscovered
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use std::fs;
    use tempfile::tempdir;

    const CATALOG: &str = "iron aaffaa bg_iron_mining building_iron_mine\n\
                           coal 333333 bg_coal_mining building_coal_mine\n\
                           rubber 778833 bg_rubber building_rubber_plantation dynamic noInitialBuildings\n\
                           oil 111111 bg_oil_extraction building_oil_rig dynamic\n";

    const REGIONS: &str = "\
STATE_ALPHA = {
    id = 1
    capped_resources = {
        bg_iron_mining = 10
        bg_coal_mining = 4
    }
    resource = {
        type = \"bg_rubber\"
        undiscovered_amount = 7
    }
    naval_exit_id = 3001
}
STATE_BETA = {
    id = 2
    capped_resources = {
        bg_iron_mining = 5
    }
    resource = {
        type = \"bg_oil_extraction\"
        discovered_amount = 2
        undiscovered_amount = 9
    }
}
";

    fn catalog_for(index: &RegionIndex) -> Catalog {
        let mut catalog = Catalog::parse(CATALOG, "test");
        catalog.reset(index.len());
        catalog
    }

    #[test]
    fn indexing_is_stable_and_skips_placeholder_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01_north.txt"), REGIONS).unwrap();
        fs::write(dir.path().join("02_south.txt"), "STATE_GAMMA = {\n}\n").unwrap();
        fs::write(dir.path().join("99_seas.txt"), "STATE_SEA = {\n}\n").unwrap();

        let first = RegionIndex::build(dir.path()).unwrap();
        let second = RegionIndex::build(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert_eq!(first.id("STATE_BETA"), Some(1));
        assert_eq!(first.name(2), Some("STATE_GAMMA"));
        assert_eq!(first.id("STATE_SEA"), None);
    }

    #[test]
    fn only_placeholder_files_gives_empty_index() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("99_seas.txt"), "STATE_SEA = {\n}\n").unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn extracts_static_dynamic_and_naval_fields() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01_north.txt"), REGIONS).unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        let mut catalog = catalog_for(&index);

        let regions = extract_regions(dir.path(), &index, &mut catalog).unwrap();

        let iron = catalog.get("iron").unwrap();
        assert_eq!(iron.regions[0].available, 10);
        assert_eq!(iron.regions[1].available, 5);
        assert_eq!(iron.total, 15);

        let rubber = catalog.get("rubber").unwrap();
        assert_eq!(rubber.regions[0].undiscovered, 7);
        assert_eq!(rubber.total_undiscovered, 7);

        let oil = catalog.get("oil").unwrap();
        assert_eq!(oil.regions[1].discovered, 2);
        assert_eq!(oil.regions[1].undiscovered, 9);

        assert_eq!(regions[0].naval_exit_id, 3001);
        assert_eq!(regions[0].static_total, 14);
        assert_eq!(regions[1].naval_exit_id, 0);
        assert_eq!(regions[1].static_total, 5);
    }

    #[test]
    fn nested_scan_resumes_outer_loop_after_block() {
        // The naval line directly follows the nested block; it must still be
        // seen by the outer loop.
        let text = "\
STATE_ALPHA = {
    capped_resources = { bg_iron_mining = 3 }
    resource = {
        type = \"bg_oil_extraction\"
        discovered_amount = 1
    }
    naval_exit_id = 12
}
";
        let mut index = RegionIndex::new();
        index.add_declarations(text).unwrap();
        let mut catalog = catalog_for(&index);
        let mut regions = vec![RegionInfo::default(); 1];
        let mut totals = ExtractTotals::default();

        extract_text(text, &index, &mut catalog, &mut regions, &mut totals);

        assert_eq!(catalog.get("iron").unwrap().regions[0].available, 3);
        assert_eq!(catalog.get("oil").unwrap().regions[0].discovered, 1);
        assert_eq!(regions[0].naval_exit_id, 12);
        assert_eq!(totals.lines, 8);
    }

    #[test]
    fn region_declared_twice_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01_north.txt"), REGIONS).unwrap();
        fs::write(dir.path().join("02_south.txt"), "STATE_ALPHA = {\n}\n").unwrap();
        let err = RegionIndex::build(dir.path()).unwrap_err();
        assert!(matches!(err, ShufflerError::DuplicateRegion(name) if name == "STATE_ALPHA"));
    }

    #[test]
    fn uncatalogued_entries_are_kept_on_the_region() {
        let text = "\
STATE_ALPHA = {
    capped_resources = {
        bg_iron_mining = 10
        bg_lead_mining = 7
    }
    resource = {
        type = \"bg_sulfur\"
        undiscovered_amount = 4
    }
    resource = { type = \"bg_whaling\" discovered_amount = 2 }
    resource = {
        type = \"bg_oil_extraction\"
        discovered_amount = 1
    }
}
";
        let mut index = RegionIndex::new();
        index.add_declarations(text).unwrap();
        let mut catalog = catalog_for(&index);
        let mut regions = vec![RegionInfo::default(); 1];
        let mut totals = ExtractTotals::default();

        extract_text(text, &index, &mut catalog, &mut regions, &mut totals);

        assert_eq!(regions[0].static_total, 10);
        assert_eq!(regions[0].uncatalogued_capped, vec![("bg_lead_mining".to_string(), 7)]);
        assert_eq!(
            regions[0].uncatalogued_blocks,
            vec![
                "    resource = {\n        type = \"bg_sulfur\"\n        undiscovered_amount = 4\n    }\n".to_string(),
                "    resource = { type = \"bg_whaling\" discovered_amount = 2 }\n".to_string(),
            ]
        );
        assert_eq!(catalog.get("oil").unwrap().regions[0].discovered, 1);
        assert_eq!(totals.undiscovered, 0);
        assert_eq!(totals.discovered, 1);
    }

    #[test]
    fn amounts_beyond_u32_totals_do_not_overflow() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("01.txt"),
            "\
STATE_ALPHA = {
    capped_resources = {
        bg_iron_mining = 3000000000
    }
    resource = {
        type = \"bg_oil_extraction\"
        undiscovered_amount = 4000000000
    }
}
STATE_BETA = {
    capped_resources = {
        bg_iron_mining = 3000000000
    }
    resource = {
        type = \"bg_oil_extraction\"
        undiscovered_amount = 4000000000
    }
}
",
        )
        .unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        let mut catalog = catalog_for(&index);

        let regions = extract_regions(dir.path(), &index, &mut catalog).unwrap();

        assert_eq!(catalog.get("iron").unwrap().total, 6_000_000_000);
        assert_eq!(catalog.get("oil").unwrap().total_undiscovered, 8_000_000_000);
        assert_eq!(regions[1].static_total, 3_000_000_000);
    }

    #[test]
    fn no_dynamic_resources_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("01.txt"),
            "STATE_ALPHA = {\n    capped_resources = {\n        bg_iron_mining = 10\n    }\n}\n",
        )
        .unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        let mut catalog = catalog_for(&index);
        let err = extract_regions(dir.path(), &index, &mut catalog).unwrap_err();
        assert!(matches!(err, ShufflerError::NoDynamicResources(_)));
    }

    #[test]
    fn no_static_resources_is_fatal() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("01.txt"),
            "STATE_ALPHA = {\n    resource = {\n        type = \"bg_rubber\"\n        undiscovered_amount = 2\n    }\n}\n",
        )
        .unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        let mut catalog = catalog_for(&index);
        let err = extract_regions(dir.path(), &index, &mut catalog).unwrap_err();
        assert!(matches!(err, ShufflerError::NoStaticResources(_)));
    }

    #[test]
    fn unsized_catalog_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("01.txt"), REGIONS).unwrap();
        let index = RegionIndex::build(dir.path()).unwrap();
        let mut catalog = Catalog::parse(CATALOG, "test");
        assert!(matches!(
            extract_regions(dir.path(), &index, &mut catalog),
            Err(ShufflerError::Config(_))
        ));
    }
}
