use std::sync::Arc;

use charter_booking::Reconciler;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

/// One reconciliation pass, logged.
pub async fn reconcile_once(reconciler: &Reconciler) {
    match reconciler.run_once().await {
        Ok(report) => {
            if report.audit_repaired > 0 || report.notifications_repaired > 0 {
                info!(
                    "Reconciliation repaired {} audit row(s) and {} notification(s) across {} booking(s)",
                    report.audit_repaired, report.notifications_repaired, report.scanned
                );
            } else {
                tracing::debug!("Reconciliation found nothing to repair in {} booking(s)", report.scanned);
            }
        }
        Err(e) => error!("Reconciliation pass failed: {}", e),
    }
}

/// Re-run reconciliation forever, `interval` apart. A failed pass is retried
/// on the next tick.
pub async fn start_reconciliation_worker(reconciler: Arc<Reconciler>, interval: Duration) {
    info!("Reconciliation worker started, every {:?}", interval);

    loop {
        sleep(interval).await;
        reconcile_once(&reconciler).await;
    }
}
