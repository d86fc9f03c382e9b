use std::fs;
use std::path::Path;
use tracing::info;

use crate::catalog::{Catalog, DEPLETED_TYPE_RESOURCE, DEPLETED_TYPE_VALUE};
use crate::lines::{self, line_ending};
use crate::regions::{region_files, RegionIndex, RegionInfo};
use crate::{RegionId, Result};

const INDENT: &str = "    ";

/// Replace `path` through a sibling temporary file owned by this target only.
fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Drop every capped/discoverable resource block and the naval exit line,
/// keeping everything else byte for byte.
pub fn trim_region_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut skip_depth = 0;

    for line in text.split_inclusive('\n') {
        if skip_depth > 0 {
            // An unbalanced block must not swallow the rest of the file.
            if lines::is_region_closer(line) || lines::region_declaration(line).is_some() {
                skip_depth = 0;
            } else {
                skip_depth += lines::brace_delta(line);
                continue;
            }
        }

        if lines::is_static_opener(line) || lines::is_dynamic_opener(line) {
            skip_depth = lines::brace_delta(line).max(0);
            continue;
        }
        if lines::naval_exit_id(line).is_some() {
            continue;
        }
        out.push_str(line);
    }
    out
}

/// Insert the resource blocks of each region right before its closing brace.
pub fn rewrite_region_text(
    text: &str,
    catalog: &Catalog,
    index: &RegionIndex,
    regions: &[RegionInfo],
) -> String {
    let eol = line_ending(text);
    let mut out = String::with_capacity(text.len() * 2);
    let mut current: Option<RegionId> = None;

    for line in text.split_inclusive('\n') {
        if let Some(name) = lines::region_declaration(line) {
            current = index.id(name);
        }
        if lines::is_region_closer(line) {
            if let Some(region) = current.take() {
                if let Some(info) = regions.get(region) {
                    write_region_blocks(&mut out, region, info, catalog, eol);
                }
            }
        }
        out.push_str(line);
    }
    out
}

fn push_line(out: &mut String, depth: usize, content: &str, eol: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(content);
    out.push_str(eol);
}

fn write_region_blocks(out: &mut String, region: RegionId, info: &RegionInfo, catalog: &Catalog, eol: &str) {
    if info.has_capped_block() {
        push_line(out, 1, "capped_resources = {", eol);
        for resource in catalog.iter() {
            let available = resource.regions[region].available;
            if available > 0 {
                push_line(out, 2, &format!("{} = {available}", resource.building_group), eol);
            }
        }
        for (token, amount) in &info.uncatalogued_capped {
            push_line(out, 2, &format!("{token} = {amount}"), eol);
        }
        push_line(out, 1, "}", eol);
    }

    for resource in catalog.iter() {
        let amounts = &resource.regions[region];
        if amounts.discovered + amounts.undiscovered == 0 {
            continue;
        }
        push_line(out, 1, "resource = {", eol);
        push_line(out, 2, &format!("type = \"{}\"", resource.building_group), eol);
        if resource.name == DEPLETED_TYPE_RESOURCE {
            push_line(out, 2, &format!("depleted_type = \"{DEPLETED_TYPE_VALUE}\""), eol);
        }
        if amounts.discovered > 0 {
            push_line(out, 2, &format!("discovered_amount = {}", amounts.discovered), eol);
        }
        if amounts.undiscovered > 0 {
            push_line(out, 2, &format!("undiscovered_amount = {}", amounts.undiscovered), eol);
        }
        push_line(out, 1, "}", eol);
    }

    for block in &info.uncatalogued_blocks {
        out.push_str(block);
        if !block.ends_with('\n') {
            out.push_str(eol);
        }
    }

    if info.naval_exit_id > 0 {
        push_line(out, 1, &format!("naval_exit_id = {}", info.naval_exit_id), eol);
    }
}

/// Trim every region file and write the dataset's blocks back into it.
///
/// All files are read and rebuilt in memory before the first one is replaced,
/// so a failed read leaves the folder as it was.
pub fn rewrite_region_files(
    dir: &Path,
    catalog: &Catalog,
    index: &RegionIndex,
    regions: &[RegionInfo],
) -> Result<usize> {
    let mut rebuilt = Vec::new();
    let mut trimmed_lines = 0;
    let mut line_count = 0;
    for path in region_files(dir)? {
        let text = fs::read_to_string(&path)?;
        let trimmed = trim_region_text(&text);
        trimmed_lines += trimmed.lines().count();
        let rewritten = rewrite_region_text(&trimmed, catalog, index, regions);
        line_count += rewritten.lines().count();
        rebuilt.push((path, rewritten));
    }
    info!("Total lines in trimmed region files: {trimmed_lines}");

    for (path, contents) in &rebuilt {
        replace_file(path, contents)?;
    }
    info!("Total lines in rewritten region files: {line_count}");
    Ok(line_count)
}
