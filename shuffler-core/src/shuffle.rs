use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::catalog::{Catalog, RegionAmounts, ResourceDefinition};
use crate::regions::{RegionIndex, RegionInfo};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShuffleReport {
    /// Resources that were permuted.
    pub shuffled: usize,
    /// Regions that already held less than their protected amount.
    pub pre_existing_shortfalls: usize,
    /// Regions left below their protected amount after restoring it.
    pub violations: usize,
}

/// Shuffle every enabled, non-ignored resource.
///
/// Protected amounts are taken out of each region, the rest is permuted
/// across regions, and the protected amounts are put back into the region
/// they came from. Files are not touched.
pub fn shuffle_resources<R: Rng + ?Sized>(
    catalog: &mut Catalog,
    index: &RegionIndex,
    rng: &mut R,
) -> ShuffleReport {
    let mut report = ShuffleReport::default();
    for resource in catalog.iter_mut() {
        if resource.is_ignored() || !resource.shuffle_enabled {
            continue;
        }
        shuffle_resource(resource, index, rng, &mut report);
        report.shuffled += 1;
    }

    info!(
        "Shuffled {} resources ({} pre-existing shortfalls, {} violations)",
        report.shuffled, report.pre_existing_shortfalls, report.violations
    );
    report
}

fn region_label(index: &RegionIndex, region: usize) -> String {
    index
        .name(region)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{region}"))
}

fn shuffle_resource<R: Rng + ?Sized>(
    resource: &mut ResourceDefinition,
    index: &RegionIndex,
    rng: &mut R,
    report: &mut ShuffleReport,
) {
    let protected: Vec<u64> = resource.regions.iter().map(RegionAmounts::protected).collect();

    for (region, amounts) in resource.regions.iter_mut().enumerate() {
        let keep = protected[region];
        if keep == 0 {
            continue;
        }
        if resource.no_initial_buildings {
            amounts.undiscovered = amounts.undiscovered.saturating_sub(keep);
        } else {
            if amounts.available < keep {
                info!(
                    "Not enough {} in {}: {} for initial buildings: {} + company: {}",
                    resource.name,
                    region_label(index, region),
                    amounts.available,
                    amounts.guaranteed_history,
                    amounts.guaranteed_companies
                );
                report.pre_existing_shortfalls += 1;
            }
            amounts.available = amounts.available.saturating_sub(keep);
        }
    }

    permute_column(&mut resource.regions, rng, |a| &mut a.available);
    if resource.total_discovered > 0 {
        permute_column(&mut resource.regions, rng, |a| &mut a.discovered);
    }
    if resource.total_undiscovered > 0 {
        permute_column(&mut resource.regions, rng, |a| &mut a.undiscovered);
    }

    for (region, amounts) in resource.regions.iter_mut().enumerate() {
        let keep = protected[region];
        if keep == 0 {
            continue;
        }
        let (pool, value) = if resource.no_initial_buildings {
            amounts.undiscovered += keep;
            ("undiscovered", amounts.undiscovered)
        } else {
            amounts.available += keep;
            ("available", amounts.available)
        };
        if value < keep {
            error!(
                "Not enough {pool} {} in {}: {value} for initial buildings: {} + company: {}",
                resource.name,
                region_label(index, region),
                amounts.guaranteed_history,
                amounts.guaranteed_companies
            );
            report.violations += 1;
        }
    }
}

/// Apply one uniform random permutation to a single field across regions.
fn permute_column<R: Rng + ?Sized>(
    regions: &mut [RegionAmounts],
    rng: &mut R,
    field: fn(&mut RegionAmounts) -> &mut u64,
) {
    let mut column: Vec<u64> = regions.iter_mut().map(|a| *field(a)).collect();
    column.shuffle(rng);
    for (amounts, value) in regions.iter_mut().zip(column) {
        *field(amounts) = value;
    }
}

/// Recompute the aggregate counters after amounts have moved between regions.
pub fn refresh_totals(catalog: &mut Catalog, regions: &mut [RegionInfo]) {
    for info in regions.iter_mut() {
        info.static_total = 0;
    }
    for resource in catalog.iter_mut() {
        resource.total = 0;
        resource.total_discovered = 0;
        resource.total_undiscovered = 0;
        for (region, amounts) in resource.regions.iter().enumerate() {
            resource.total += amounts.available;
            resource.total_discovered += amounts.discovered;
            resource.total_undiscovered += amounts.undiscovered;
            if let Some(info) = regions.get_mut(region) {
                info.static_total += amounts.available;
            }
        }
    }
}
