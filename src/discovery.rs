//! Batch discovery of unique channel/marker mappings.
//!
//! Every file is parsed on its own blocking task with no shared state. A file that fails to
//! parse is logged and left out; it never aborts its siblings. Once all tasks finish the
//! mapping lists are deduplicated by their serialized JSON content.

use crate::error::{AppResult, CytoError};
use crate::fcs::{ChannelMapping, FcsFile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Keep FCS paths, optionally dropping compensation controls (`comp` in the file name).
pub fn filter_fcs_files<P: AsRef<Path>>(paths: &[P], exclude_comps: bool) -> Vec<PathBuf> {
    paths
        .iter()
        .map(AsRef::<Path>::as_ref)
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("fcs"))
        })
        .filter(|p| {
            !exclude_comps
                || !p
                    .file_name()
                    .is_some_and(|name| name.to_string_lossy().to_lowercase().contains("comp"))
        })
        .map(Path::to_path_buf)
        .collect()
}

/// Channel mappings of one file, `None` (logged) if it fails to load.
pub fn fcs_mappings(path: &Path) -> Option<Vec<ChannelMapping>> {
    match FcsFile::read_mappings(path) {
        Ok(mappings) => Some(mappings),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load file; skipping");
            None
        }
    }
}

/// Parse every file concurrently and return the distinct mapping lists.
///
/// At most `max_concurrency` files are parsed at once (at least one). The result is ordered
/// by serialized content, not by completion order.
pub async fn explore_channel_mappings(
    paths: Vec<PathBuf>,
    max_concurrency: usize,
) -> AppResult<Vec<Vec<ChannelMapping>>> {
    let permits = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let total = paths.len();
    let mut tasks = JoinSet::new();

    for path in paths {
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            let shown = path.display().to_string();
            match tokio::task::spawn_blocking(move || fcs_mappings(&path)).await {
                Ok(mappings) => mappings,
                Err(e) => {
                    warn!(path = %shown, error = %e, "Parser task failed; skipping");
                    None
                }
            }
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Some(mappings)) => results.push(mappings),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Mapping task failed"),
        }
    }

    let unique = deduplicate(results)?;
    info!(
        files = total,
        unique = unique.len(),
        "Channel mapping discovery complete"
    );
    Ok(unique)
}

/// Deduplicate mapping lists by serialized content.
pub fn deduplicate(all: Vec<Vec<ChannelMapping>>) -> AppResult<Vec<Vec<ChannelMapping>>> {
    let mut unique = BTreeMap::new();
    for mappings in all {
        let key = serde_json::to_string(&mappings).map_err(CytoError::Serialization)?;
        unique.entry(key).or_insert(mappings);
    }
    Ok(unique.into_values().collect())
}
