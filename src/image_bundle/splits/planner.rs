use tracing::{debug, info, instrument};

use crate::image_bundle::bundle::format;
use crate::image_bundle::common::error::Result;
use crate::image_bundle::splits::types::{BundleLayout, Split, StorageBlock};

/// Plans splits for every bundle in `layouts`, in order.
///
/// With `requested == 0` each bundle is cut near its storage block
/// boundaries; otherwise each bundle's images are spread over exactly
/// `requested` splits, earlier splits taking the remainder. A bundle with no
/// images always yields one zero-length split.
///
/// Splits are half-open and end on segment boundaries, so a reader opened on
/// `(split.start, split.end())` sees exactly the images assigned to it.
///
/// Fails with `BundleError::Format` if any layout's offsets do not grow by at
/// least one segment header per entry.
#[instrument(skip(layouts), fields(bundles = layouts.len()))]
pub fn compute_splits(layouts: &[BundleLayout], requested: usize) -> Result<Vec<Split>> {
    for layout in layouts {
        format::validate_offsets(&layout.offsets)?;
    }

    let mut splits = Vec::new();
    for layout in layouts {
        let planned = if layout.offsets.is_empty() {
            vec![(0, 0)]
        } else if requested == 0 {
            plan_by_blocks(&layout.offsets, &layout.blocks)
        } else {
            plan_by_count(&layout.offsets, requested)
        };

        for (start, end) in planned {
            let hosts = if end > start {
                hosts_for_range(&layout.blocks, start, end)
            } else {
                Vec::new()
            };
            debug!(
                "Split {} [{}, {}) hosts {:?}",
                layout.data_path.display(),
                start,
                end,
                hosts
            );
            splits.push(Split {
                path: layout.data_path.clone(),
                start,
                length: end - start,
                hosts,
            });
        }
    }
    info!("Planned {} splits", splits.len());
    Ok(splits)
}

/// Walks the blocks in offset order and closes a split at the first segment
/// end at or past each block end. Segments beyond the last block go into one
/// trailing split.
fn plan_by_blocks(offsets: &[u64], blocks: &[StorageBlock]) -> Vec<(u64, u64)> {
    let mut ordered: Vec<&StorageBlock> = blocks.iter().collect();
    ordered.sort_by_key(|block| block.offset);

    let mut ranges = Vec::new();
    let mut last = 0u64;
    let mut next = 0usize;
    for block in ordered {
        let block_end = block.end();
        let mut cur = last;
        while cur < block_end && next < offsets.len() {
            cur = offsets[next];
            next += 1;
        }
        // a segment that overshot this block may already cover it
        if cur > last {
            ranges.push((last, cur));
            last = cur;
        }
    }

    if next < offsets.len() {
        let end = offsets[offsets.len() - 1];
        ranges.push((last, end));
    }
    ranges
}

/// `requested` ranges; iteration `k` takes `ceil(remaining / (requested - k))`
/// images. Once the images run out the remaining ranges are empty and sit at
/// the end of the data.
fn plan_by_count(offsets: &[u64], requested: usize) -> Vec<(u64, u64)> {
    let mut ranges = Vec::with_capacity(requested);
    let mut first = 0usize;
    let mut start = 0u64;
    for k in 0..requested {
        let remaining_images = offsets.len() - first;
        let remaining_splits = requested - k;
        let take = remaining_images.div_ceil(remaining_splits);
        let end = if take == 0 {
            start
        } else {
            offsets[first + take - 1]
        };
        ranges.push((start, end));
        first += take;
        start = end;
    }
    ranges
}

/// Hosts of every block overlapping `[start, end)`, first occurrence first.
fn hosts_for_range(blocks: &[StorageBlock], start: u64, end: u64) -> Vec<String> {
    let mut ordered: Vec<&StorageBlock> = blocks
        .iter()
        .filter(|block| block.overlaps(start, end))
        .collect();
    ordered.sort_by_key(|block| block.offset);

    let mut hosts: Vec<String> = Vec::new();
    for host in ordered.into_iter().flat_map(|block| block.hosts.iter()) {
        if !hosts.contains(host) {
            hosts.push(host.clone());
        }
    }
    hosts
}
