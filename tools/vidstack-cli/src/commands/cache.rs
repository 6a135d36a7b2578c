//! Manage the share-link download cache.

use std::time::Duration;

use vidstack_common::config::AppConfig;

use crate::job::open_cache;

pub fn clear(app: &AppConfig, older_than_hours: Option<u64>) -> anyhow::Result<()> {
    let mut cache = open_cache(app)?;
    let older_than = older_than_hours.map(|h| Duration::from_secs(h.saturating_mul(3600)));

    let removed = cache.clear(older_than)?;
    println!(
        "Cleared {removed} cached file(s) from {} ({} remaining)",
        cache.dir().display(),
        cache.len()
    );
    Ok(())
}

pub async fn resolve(app: &AppConfig, url: String) -> anyhow::Result<()> {
    let mut cache = open_cache(app)?;
    let path = cache.resolve(&url).await?;
    println!("{}", path.display());
    Ok(())
}
