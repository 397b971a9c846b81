use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::context::RepoContext;

/// Fires [`RepoContext::tick`] every configured interval until `shutdown`
/// resolves.
///
/// Task bodies already running when the driver stops are left to finish on
/// their own; only new ticks stop.
pub async fn run_periodic<F>(ctx: Arc<RepoContext>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let period = ctx.config().schedule().tick.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);
    info!(root = %ctx.config().repo_root().display(), "watching repository");
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = interval.tick() => {
                debug!("tick");
                drop(ctx.tick());
            }
        }
    }
    info!("periodic driver stopped");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use gamerepo_domain::{PackageRecord, DESCRIPTOR_FILE};

    use super::*;
    use crate::catalog::CatalogObserver;
    use crate::config::{Config, ScheduleConfig};

    #[derive(Default)]
    struct Added(Mutex<Vec<String>>);

    impl CatalogObserver for Added {
        fn package_added(&self, record: &PackageRecord) {
            self.0.lock().unwrap().push(record.id.clone());
        }

        fn package_removed(&self, _record: &PackageRecord) {}
    }

    #[tokio::test]
    async fn driver_reconciles_until_shutdown() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("GameA");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DESCRIPTOR_FILE), r#"{"uuid":"a","title":"Game A"}"#).unwrap();

        let observer = Arc::new(Added::default());
        let config = Config::for_root(temp.path()).with_schedule(ScheduleConfig {
            tick: Duration::from_millis(10),
            cooldown: Duration::from_millis(10),
        });
        let ctx = Arc::new(RepoContext::open(config, observer.clone()));

        run_periodic(Arc::clone(&ctx), tokio::time::sleep(Duration::from_millis(300))).await;

        assert_eq!(*observer.0.lock().unwrap(), ["a"]);
        assert!(temp.path().join("local_repo.json").is_file());
    }
}
