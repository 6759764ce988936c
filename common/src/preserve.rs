use anyhow::{Context, Result};
use tracing::{Level, event, instrument};

/// Copy access and modification times from `metadata` (of the source) onto `dst`
#[instrument(skip(metadata))]
pub async fn set_file_times(metadata: &std::fs::Metadata, dst: &std::path::Path) -> Result<()> {
    let atime = filetime::FileTime::from_last_access_time(metadata);
    let mtime = filetime::FileTime::from_last_modification_time(metadata);
    let dst = dst.to_owned();
    tokio::task::spawn_blocking(move || -> Result<()> {
        event!(Level::DEBUG, "setting timestamps");
        filetime::set_file_times(&dst, atime, mtime)
            .with_context(|| format!("failed setting timestamps for {:?}", &dst))
    })
    .await?
}
