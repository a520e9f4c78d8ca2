use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use sentinel_core::check::findings_from;
use sentinel_core::{AuditCheck, CheckContext, CheckError, FindingStream};
use sentinel_domain::{RawFinding, Severity};
use tokio::time::Instant;

/// Failing finding about `resource`.
pub fn failing(resource: &str) -> RawFinding {
    RawFinding::new("AwsWidget", resource).failed(Severity::Medium).title("widget misconfigured")
}

/// Passing finding about `resource`.
pub fn passing(resource: &str) -> RawFinding {
    RawFinding::new("AwsWidget", resource).passed().title("widget configured")
}

/// Yields a fixed list of findings.
pub struct StaticCheck {
    pub name: &'static str,
    pub findings: Vec<RawFinding>,
}

impl AuditCheck for StaticCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        stream::iter(self.findings.clone().into_iter().map(Ok)).boxed()
    }
}

/// Yields two findings, then a pagination error, then a record that must
/// never be seen.
pub struct BreaksOnThirdRecord {
    pub name: &'static str,
}

impl AuditCheck for BreaksOnThirdRecord {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        stream::iter(vec![
            Ok(failing("widget-1")),
            Ok(failing("widget-2")),
            Err(CheckError::pagination("widgets:ListWidgets", "NextToken expired")),
            Ok(failing("widget-4")),
        ])
        .boxed()
    }
}

/// Panics while producing its `after`-th record.
pub struct PanicsMidStream {
    pub name: &'static str,
    pub after: usize,
}

impl AuditCheck for PanicsMidStream {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        let after = self.after;
        stream::iter(0..after + 1)
            .map(move |i| {
                if i == after {
                    panic!("describe_widget returned an unexpected shape");
                }
                Ok(failing(&format!("widget-{i}")))
            })
            .boxed()
    }
}

/// Panics before returning a stream at all.
pub struct PanicsOnStart {
    pub name: &'static str,
}

impl AuditCheck for PanicsOnStart {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        panic!("client construction failed")
    }
}

/// Sleeps before yielding one finding.
pub struct SlowCheck {
    pub name: &'static str,
    pub delay: Duration,
}

impl AuditCheck for SlowCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        let delay = self.delay;
        findings_from(async move {
            tokio::time::sleep(delay).await;
            Ok(vec![failing("slow-widget")])
        })
    }
}

/// Reads the shared `"list-widgets"` listing through the run cache and
/// reports each widget. `fetches` counts the underlying listing calls.
pub struct WidgetCheck {
    pub name: &'static str,
    pub fetches: Arc<AtomicUsize>,
}

impl AuditCheck for WidgetCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, ctx: CheckContext) -> FindingStream {
        let fetches = Arc::clone(&self.fetches);
        findings_from(async move {
            let widgets = ctx
                .cached("list-widgets", || async move {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CheckError>(vec!["widget-a".to_string(), "widget-b".to_string()])
                })
                .await?;
            Ok(widgets.iter().map(|id| passing(&format!("{}:{id}", ctx.region()))).collect())
        })
    }
}

/// Emits one finding per resource only when `shodan_api_key` resolved.
pub struct ShodanEnrichmentCheck {
    pub name: &'static str,
}

impl AuditCheck for ShodanEnrichmentCheck {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, ctx: CheckContext) -> FindingStream {
        findings_from(async move {
            if ctx.credential("shodan_api_key").is_none() {
                return Ok(Vec::new());
            }
            Ok(vec![failing("widget-a").title("widget indexed by Shodan")])
        })
    }
}

/// Tracks how many instances run at the same time.
pub struct ConcurrencyGauge {
    pub name: &'static str,
    pub in_flight: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
}

impl AuditCheck for ConcurrencyGauge {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, _ctx: CheckContext) -> FindingStream {
        let in_flight = Arc::clone(&self.in_flight);
        let peak = Arc::clone(&self.peak);
        findings_from(async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        })
    }
}

/// Records the target label and the time the check was first polled.
pub struct RecordsStart {
    pub name: &'static str,
    pub starts: Arc<Mutex<Vec<(String, Instant)>>>,
}

impl AuditCheck for RecordsStart {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, ctx: CheckContext) -> FindingStream {
        let starts = Arc::clone(&self.starts);
        findings_from(async move {
            starts.lock().push((ctx.target().label(), Instant::now()));
            Ok(Vec::new())
        })
    }
}
