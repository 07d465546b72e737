use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use policy_store::{AppCatalog, PolicyStore, ReportView};

/// Writes every report view into `dir`, one file per view named after it.
///
/// Each file is written to a temporary sibling first and renamed into place,
/// so readers never see a partial listing.
pub fn write_reports(dir: &Path, store: &PolicyStore, catalog: &dyn AppCatalog) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;

    for view in ReportView::ALL {
        let target = dir.join(view.file_name());
        let staging = dir.join(format!(".{}.tmp", view.file_name()));

        std::fs::write(&staging, view.render(store, catalog))
            .with_context(|| format!("failed to write {}", staging.display()))?;
        std::fs::rename(&staging, &target)
            .with_context(|| format!("failed to publish {}", target.display()))?;
    }

    debug!(dir = %dir.display(), "report views written");
    Ok(())
}
