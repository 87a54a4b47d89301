//! `cache-clear` subcommand: invalidates the metadata/hash cache, entirely
//! or scoped to one folder.

use std::path::Path;

use crate::cache::Cache;
use crate::logging::Logger;

pub fn run(folder: Option<&Path>, cache: &Cache, log: &Logger) {
    match folder {
        Some(folder) => {
            cache.invalidate_prefix(folder, false);
            log.verbose(1, format!("Cleared cache entries under {}", folder.display()));
        }
        None => {
            cache.invalidate_prefix(Path::new(""), false);
            log.verbose(1, "Cleared the entire cache");
        }
    }
}
