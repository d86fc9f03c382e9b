use crate::catalog::{Catalog, RankedRegion};

/// How many regions are kept per resource.
pub const TOP_REGION_COUNT: usize = 5;

/// Fill `top_regions` for every resource: the regions holding the most of it
/// (available + discovered + undiscovered), largest first, ties by region id.
pub fn rank_regions(catalog: &mut Catalog) {
    for resource in catalog.iter_mut() {
        let mut ranked: Vec<RankedRegion> = resource
            .regions
            .iter()
            .enumerate()
            .map(|(region, amounts)| RankedRegion {
                region,
                amount: amounts.combined(),
            })
            .filter(|r| r.amount > 0)
            .collect();
        ranked.sort_by(|a, b| b.amount.cmp(&a.amount).then(a.region.cmp(&b.region)));
        ranked.truncate(TOP_REGION_COUNT);
        resource.top_regions = ranked;
    }
}

/// `STATE_NEW_YORK` -> `New york`.
pub fn format_region_name(name: &str) -> String {
    let bare = name.strip_prefix("STATE_").unwrap_or(name).to_lowercase().replace('_', " ");
    let mut chars = bare.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
