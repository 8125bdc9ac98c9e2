use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::gateway::Gateway;
use crate::geo::haversine_m;
use crate::models::driver::GeoPoint;
use crate::models::location::LocationFix;
use crate::observability::metrics::Metrics;

#[async_trait]
pub trait LocationSource: Send {
    async fn request_permission(&mut self) -> Result<(), AppError>;
    async fn current_fix(&mut self) -> Result<GeoPoint, AppError>;
    async fn next_fix(&mut self) -> Option<GeoPoint>;
}

// the device layer pushes raw fixes through a channel; permission state is
// whatever the platform prompt returned
pub struct ChannelSource {
    granted: bool,
    initial: GeoPoint,
    fixes: mpsc::Receiver<GeoPoint>,
}

impl ChannelSource {
    pub fn new(granted: bool, initial: GeoPoint, fixes: mpsc::Receiver<GeoPoint>) -> Self {
        Self {
            granted,
            initial,
            fixes,
        }
    }
}

#[async_trait]
impl LocationSource for ChannelSource {
    async fn request_permission(&mut self) -> Result<(), AppError> {
        if self.granted {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(
                "location permission refused".to_string(),
            ))
        }
    }

    async fn current_fix(&mut self) -> Result<GeoPoint, AppError> {
        Ok(self.initial.clone())
    }

    async fn next_fix(&mut self) -> Option<GeoPoint> {
        self.fixes.recv().await
    }
}

pub struct ReportPolicy {
    min_interval: Duration,
    min_distance_m: f64,
    last: Option<(GeoPoint, DateTime<Utc>)>,
}

impl ReportPolicy {
    pub fn new(interval_secs: u64, distance_m: f64) -> Self {
        Self {
            min_interval: Duration::seconds(interval_secs as i64),
            min_distance_m: distance_m,
            last: None,
        }
    }

    // a fix is reported when enough time passed OR the driver moved far
    // enough, whichever triggers first
    pub fn should_report(&mut self, at: DateTime<Utc>, fix: &GeoPoint) -> bool {
        let due = match &self.last {
            None => true,
            Some((point, reported_at)) => {
                at.signed_duration_since(*reported_at) >= self.min_interval
                    || haversine_m(point, fix) >= self.min_distance_m
            }
        };

        if due {
            self.last = Some((fix.clone(), at));
        }
        due
    }
}

#[derive(Debug)]
pub struct TrackerHandle {
    stopped: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TrackerHandle {
    // after stop() returns no further samples are reported
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub async fn start<S>(
    gateway: Arc<dyn Gateway>,
    metrics: Metrics,
    driver_id: Uuid,
    mut source: S,
    mut policy: ReportPolicy,
) -> Result<TrackerHandle, AppError>
where
    S: LocationSource + 'static,
{
    source.request_permission().await?;

    let first = source.current_fix().await?;
    let now = Utc::now();
    policy.should_report(now, &first);
    report(gateway.as_ref(), &metrics, driver_id, first, now).await;
    info!(driver_id = %driver_id, "location reporting started");

    let stopped = Arc::new(AtomicBool::new(false));
    let loop_stopped = stopped.clone();

    let task = tokio::spawn(async move {
        while let Some(fix) = source.next_fix().await {
            if loop_stopped.load(Ordering::SeqCst) {
                break;
            }

            let now = Utc::now();
            if !policy.should_report(now, &fix) {
                continue;
            }

            report(gateway.as_ref(), &metrics, driver_id, fix, now).await;
        }

        info!(driver_id = %driver_id, "location reporting stopped");
    });

    Ok(TrackerHandle { stopped, task })
}

// reporting is at-most-effort: a failed upload is logged and the loop moves on
async fn report(
    gateway: &dyn Gateway,
    metrics: &Metrics,
    driver_id: Uuid,
    fix: GeoPoint,
    at: DateTime<Utc>,
) {
    let overwrite = gateway
        .update_driver_position(driver_id, fix.clone(), at)
        .await;
    let append = gateway
        .append_location(LocationFix {
            driver_id,
            point: fix,
            recorded_at: at,
        })
        .await;

    match overwrite.and(append) {
        Ok(()) => {
            metrics
                .location_reports_total
                .with_label_values(&["success"])
                .inc();
        }
        Err(err) => {
            metrics
                .location_reports_total
                .with_label_values(&["error"])
                .inc();
            warn!(driver_id = %driver_id, error = %err, "location report failed");
        }
    }
}
