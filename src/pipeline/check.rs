// src/pipeline/check.rs

//! Check cycle orchestration: fetch, extract, compare, notify, persist.

use crate::detector::ChangeDetector;
use crate::fetch::PageFetcher;
use crate::models::{Config, CycleStats, WatchTarget};
use crate::notify::Notify;
use crate::storage::FingerprintStore;

/// Run one sequential pass over the watchlist.
///
/// Targets are evaluated one at a time; the site's rate limits make
/// serialization desirable, not merely simpler. A failure for one
/// target never prevents evaluation of the rest. The store is saved
/// once at the end of the cycle; a save failure is logged and the
/// in-memory state stays authoritative for the current run.
pub async fn run_cycle(
    config: &Config,
    fetcher: &dyn PageFetcher,
    detector: &ChangeDetector,
    notifier: &dyn Notify,
    store: &mut FingerprintStore,
) -> CycleStats {
    let mut stats = CycleStats::begin();

    for target in &config.watch.targets {
        stats.checked += 1;
        check_target(config, fetcher, detector, notifier, store, target, &mut stats).await;
    }

    if let Err(e) = store.save().await {
        log::warn!(
            "Failed to save state file {}: {}",
            store.path().display(),
            e
        );
    }

    stats.finish();
    log::info!(
        "Cycle complete: {} checked, {} available, {} changed, {} notified, {} failed",
        stats.checked,
        stats.available,
        stats.changed,
        stats.notified,
        stats.failed
    );

    stats
}

/// Evaluate a single target and update stats and store in place.
async fn check_target(
    config: &Config,
    fetcher: &dyn PageFetcher,
    detector: &ChangeDetector,
    notifier: &dyn Notify,
    store: &mut FingerprintStore,
    target: &WatchTarget,
    stats: &mut CycleStats,
) {
    let html = match fetcher.fetch(&target.url).await {
        Ok(html) => html,
        Err(e) => {
            stats.failed += 1;
            log::error!("Error checking {}: {}", target.display(), e);
            return;
        }
    };

    let signal = detector.extract_signal(&html);
    if signal.available {
        stats.available += 1;
    }

    let previous = store.get(&target.url).map(str::to_string);
    if previous.as_deref() == Some(signal.fingerprint.as_str()) {
        log::info!("Unchanged: {}", target.display());
        return;
    }

    stats.changed += 1;
    if signal.available {
        log::info!("In stock and changed: {}", target.display());
        notifier
            .send(&format!("🎉 Product in stock! {}", target.url))
            .await;
        stats.notified += 1;
    } else if config.notify.on_unavailable_change && previous.is_some() {
        log::info!("Changed but still unavailable: {}", target.display());
        notifier
            .send(&format!(
                "Page changed but still unavailable: {}",
                target.url
            ))
            .await;
        stats.notified += 1;
    } else {
        log::info!("Not in stock: {}", target.display());
    }

    store.set(target.url.clone(), signal.fingerprint);
}
