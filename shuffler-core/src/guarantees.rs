//! Protected quantities: how much of a resource each region must keep because
//! existing buildings or company requirements depend on it.

use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::lines::{self, LineCursor};
use crate::regions::{list_data_files, RegionIndex};
use crate::{RegionId, Result, ShufflerError};

/// Only company files with this prefix are base-game definitions.
pub const COMPANY_FILE_PREFIX: &str = "00";

/// Record building levels from the history files into
/// `guaranteed_history`.
pub fn collect_history(dir: &Path, index: &RegionIndex, catalog: &mut Catalog) -> Result<()> {
    info!("Reading building history from {}", dir.display());
    for path in list_data_files(dir, |_| true)? {
        let text = fs::read_to_string(&path)?;
        collect_history_text(&text, &path, index, catalog)?;
    }

    for resource in catalog.iter() {
        info!(
            "Initial buildings related to {}: {}",
            resource.name, resource.guaranteed_history_total
        );
    }
    Ok(())
}

fn collect_history_text(text: &str, path: &Path, index: &RegionIndex, catalog: &mut Catalog) -> Result<()> {
    let mut cursor = LineCursor::new(text);
    let mut current: Option<RegionId> = None;

    while let Some(line) = cursor.next() {
        if let Some(name) = lines::region_declaration(line) {
            current = index.id(name);
            if current.is_none() {
                warn!("{}: unknown region {name}, skipping its buildings", path.display());
            }
            continue;
        }

        let Some(building) = lines::history_building(line) else {
            continue;
        };
        let Some(i) = catalog.index_of_building(building) else {
            continue;
        };

        let level = cursor.next().and_then(lines::history_level).map(u64::from);
        let Some(level) = level else {
            return Err(ShufflerError::MissingHistoryLevel {
                file: path.to_path_buf(),
                line: cursor.line_number(),
                building: building.to_string(),
            });
        };

        let Some(region) = current else {
            continue;
        };
        let resource = catalog.by_index_mut(i);
        resource.regions[region].guaranteed_history += level;
        resource.guaranteed_history_total += level;
    }
    Ok(())
}

/// Record company requirements into `guaranteed_companies`.
///
/// Each `possible = { ... }` block names candidate regions and building types
/// and ends on a level (or count) line. Every candidate resource is then
/// required at that level in every candidate region. A later block for the
/// same pair overwrites the earlier value.
pub fn collect_companies(dir: &Path, index: &RegionIndex, catalog: &mut Catalog) -> Result<()> {
    info!("Reading company definitions from {}", dir.display());
    for path in list_data_files(dir, |name| name.starts_with(COMPANY_FILE_PREFIX))? {
        let text = fs::read_to_string(&path)?;
        collect_companies_text(&text, &path, index, catalog)?;
    }

    for resource in catalog.iter().filter(|r| !r.is_ignored()) {
        info!(
            "{} {} required for companies",
            resource.guaranteed_companies_total, resource.name
        );
    }
    Ok(())
}

fn collect_companies_text(text: &str, path: &Path, index: &RegionIndex, catalog: &mut Catalog) -> Result<()> {
    let mut cursor = LineCursor::new(text);
    while let Some(line) = cursor.next() {
        if lines::is_possible_opener(line) {
            let start = cursor.line_number();
            scan_company_requirement(&mut cursor, start, path, index, catalog)?;
        }
    }
    Ok(())
}

fn scan_company_requirement(
    cursor: &mut LineCursor<'_>,
    start: usize,
    path: &Path,
    index: &RegionIndex,
    catalog: &mut Catalog,
) -> Result<()> {
    let mut candidate_regions: Vec<RegionId> = Vec::new();
    let mut candidate_resources: Vec<usize> = Vec::new();

    while let Some(line) = cursor.next() {
        if let Some(name) = lines::company_region(line) {
            match index.id(name) {
                Some(id) => candidate_regions.push(id),
                None => warn!(
                    "{}:{}: unknown region {name} in company requirement",
                    path.display(),
                    cursor.line_number()
                ),
            }
            continue;
        }

        if let Some(building) = lines::company_building(line) {
            if let Some(i) = catalog.index_of_building(building) {
                candidate_resources.push(i);
            }
        }

        let Some(level) = lines::company_level(line).map(u64::from) else {
            continue;
        };

        if candidate_resources.is_empty() {
            return Err(ShufflerError::CompanyWithoutResources {
                file: path.to_path_buf(),
                line: start,
            });
        }
        if candidate_regions.is_empty() {
            return Err(ShufflerError::CompanyWithoutRegions {
                file: path.to_path_buf(),
                line: start,
            });
        }

        for &i in &candidate_resources {
            let resource = catalog.by_index_mut(i);
            for &region in &candidate_regions {
                debug!(
                    "{level} {} required in region {}",
                    resource.name,
                    index.name(region).unwrap_or("?")
                );
                resource.regions[region].guaranteed_companies = level;
                resource.guaranteed_companies_total += level;
            }
        }
        return Ok(());
    }

    warn!(
        "{}:{start}: company requirement has no level line, ignored",
        path.display()
    );
    Ok(())
}
