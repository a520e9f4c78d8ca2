//! Audit orchestrator
//!
//! Drives one run across a [`TargetPlan`]:
//!
//! 1. Resolve every credential any registered check uses, once.
//! 2. Traverse targets concurrently, bounded by `max_concurrent_targets`.
//!    Each target gets a fresh [`RunCache`] and runs its checks one after
//!    another in registration order. With a `target_delay`, accounts are
//!    traversed one after another with the pause between them.
//! 3. Drain each check's stream as it is produced, normalizing every record
//!    and handing it to the sink before polling the next one.
//!
//! Every check runs inside a failure boundary. A stream error, a panic or
//! the run deadline ends only that check; findings it already yielded stay
//! delivered and the next check starts.

mod phase;
mod report;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use sentinel_common::cache::RunCache;
use sentinel_common::ErrorClassification;
use sentinel_domain::{AuditConfig, RawFinding, RunContext, SentinelError, TargetPlan};
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use self::phase::TargetPhase;
pub use self::report::{
    CheckFailure, CheckOutcome, CheckReport, RunReport, RunTotals, SkipReason, TargetReport,
};
use crate::availability::{AlwaysAvailable, ServiceAvailability};
use crate::check::{CheckContext, CheckError};
use crate::credentials::{CredentialResolver, ResolvedCredentials};
use crate::normalizer::FindingNormalizer;
use crate::registry::{CheckDescriptor, CheckRegistry};
use crate::sink::FindingSink;

/// Run-level knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub max_concurrent_targets: usize,
    /// Overall run deadline, measured from the start of `run`.
    pub deadline: Option<Duration>,
    /// Pause after each account before the next one starts. Bounded by the
    /// deadline.
    pub target_delay: Duration,
    /// Run only the check with this name.
    pub only_check: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

impl From<&AuditConfig> for OrchestratorConfig {
    fn from(audit: &AuditConfig) -> Self {
        Self {
            max_concurrent_targets: audit.max_concurrent_targets,
            deadline: audit.deadline(),
            target_delay: audit.target_delay(),
            only_check: audit.only_check.clone(),
        }
    }
}

/// Drives audit runs.
pub struct AuditOrchestrator {
    registry: Arc<CheckRegistry>,
    resolver: Arc<CredentialResolver>,
    sink: Arc<dyn FindingSink>,
    availability: Arc<dyn ServiceAvailability>,
    normalizer: FindingNormalizer,
    config: OrchestratorConfig,
}

/// Everything a target traversal shares with the rest of the run.
struct RunScope {
    credentials: Arc<ResolvedCredentials>,
    deadline: Option<Instant>,
}

/// Planned work for one target.
struct TargetJob {
    position: usize,
    target: RunContext,
    /// Global categories this target runs for its whole account.
    global_categories: HashSet<String>,
}

/// Targets of one account, in plan order.
struct AccountBatch {
    account_id: String,
    jobs: Vec<TargetJob>,
}

#[derive(Default)]
struct CheckTally {
    delivered: usize,
    rejected: usize,
    sink_failures: usize,
}

impl AuditOrchestrator {
    /// Create an orchestrator with default settings and every service
    /// treated as available.
    pub fn new(
        registry: Arc<CheckRegistry>,
        resolver: Arc<CredentialResolver>,
        sink: Arc<dyn FindingSink>,
    ) -> Self {
        Self {
            registry,
            resolver,
            sink,
            availability: Arc::new(AlwaysAvailable),
            normalizer: FindingNormalizer::new(),
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_availability(mut self, availability: Arc<dyn ServiceAvailability>) -> Self {
        self.availability = availability;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run every registered check against every target.
    ///
    /// # Errors
    /// Only configuration problems are returned, before any check runs:
    /// `max_concurrent_targets` of zero, or `only_check` naming a check that
    /// is not registered. Everything else is recorded in the report.
    pub async fn run(&self, targets: TargetPlan) -> Result<RunReport, SentinelError> {
        self.validate()?;

        let run_id = Uuid::now_v7();
        let span = info_span!("audit_run", run_id = %run_id);
        self.run_inner(run_id, targets).instrument(span).await
    }

    fn validate(&self) -> Result<(), SentinelError> {
        if self.config.max_concurrent_targets == 0 {
            return Err(SentinelError::Config("max_concurrent_targets must be at least 1".into()));
        }
        if let Some(name) = &self.config.only_check {
            if self.registry.find_by_name(name).is_none() {
                return Err(SentinelError::Config(format!("only_check names unknown check '{name}'")));
            }
        }
        Ok(())
    }

    async fn run_inner(&self, run_id: Uuid, targets: TargetPlan) -> Result<RunReport, SentinelError> {
        let started_at = Utc::now();
        let deadline = self.config.deadline.map(|limit| Instant::now() + limit);
        info!(
            targets = targets.len(),
            checks = self.registry.len(),
            max_concurrent_targets = self.config.max_concurrent_targets,
            "audit run starting"
        );

        let credentials = self.resolver.resolve_all(self.registry.required_credentials()).await;
        for name in credentials.unavailable() {
            warn!(credential = %name, "credential unavailable for this run");
        }
        let scope = RunScope { credentials: Arc::new(credentials), deadline };

        let global: Vec<&str> = self
            .registry
            .all_categories()
            .iter()
            .map(String::as_str)
            .filter(|category| self.registry.is_global(category))
            .collect();
        let batches = plan_batches(targets, &global, self.availability.as_ref());

        let mut reports = if self.config.target_delay.is_zero() {
            self.run_jobs(batches.into_iter().flat_map(|batch| batch.jobs), &scope).await
        } else {
            let last = batches.len().saturating_sub(1);
            let mut reports = Vec::new();
            for (index, AccountBatch { account_id, jobs }) in batches.into_iter().enumerate() {
                reports.extend(self.run_jobs(jobs, &scope).await);
                if index < last {
                    self.pause_after_account(&account_id, scope.deadline).await;
                }
            }
            reports
        };
        reports.sort_by_key(|(position, _)| *position);

        if let Err(err) = self.sink.flush().await {
            warn!(error = %err, "finding sink flush failed");
        }

        let report =
            RunReport::new(run_id, started_at, reports.into_iter().map(|(_, r)| r).collect());
        info!(
            succeeded = report.totals.checks_succeeded,
            failed = report.totals.checks_failed,
            skipped = report.totals.checks_skipped(),
            findings = report.totals.findings_delivered,
            rejected = report.totals.findings_rejected,
            "audit run finished"
        );
        Ok(report)
    }

    async fn run_jobs(
        &self,
        jobs: impl IntoIterator<Item = TargetJob>,
        scope: &RunScope,
    ) -> Vec<(usize, TargetReport)> {
        stream::iter(jobs)
            .map(|job| {
                let position = job.position;
                self.run_target(job, scope).map(move |report| (position, report))
            })
            .buffer_unordered(self.config.max_concurrent_targets)
            .collect()
            .await
    }

    /// Sleep `target_delay`, but never past the deadline.
    async fn pause_after_account(&self, account_id: &str, deadline: Option<Instant>) {
        let now = Instant::now();
        let mut wake = now + self.config.target_delay;
        if let Some(deadline) = deadline {
            if now >= deadline {
                debug!(account = account_id, "deadline passed, not pausing between accounts");
                return;
            }
            wake = wake.min(deadline);
        }
        debug!(account = account_id, pause = ?(wake - now), "pausing before next account");
        tokio::time::sleep_until(wake).await;
    }

    async fn run_target(&self, job: TargetJob, scope: &RunScope) -> TargetReport {
        let TargetJob { target, global_categories, .. } = job;
        let label = target.label();
        let span = info_span!("target", target_label = %label, partition = %target.partition());

        async move {
            let mut tracker = PhaseTracker::new(&label);
            tracker.advance(TargetPhase::EnumeratingChecks);

            let mut checks = Vec::new();
            let (planned, skipped) = self.enumerate(&target, &global_categories);
            checks.extend(skipped);

            let cache = RunCache::new(label.clone());
            let target = Arc::new(target);

            for (index, descriptor) in planned.into_iter().enumerate() {
                tracker.advance(TargetPhase::RunningCheck(index));
                let report = self.run_check(descriptor, &cache, &target, scope).await;
                checks.push(report);
            }

            tracker.advance(TargetPhase::Complete);
            let stats = cache.stats();
            debug!(hits = stats.hits, misses = stats.misses, "target cache released");

            TargetReport {
                target: label.clone(),
                account_id: target.account_id().to_string(),
                region: target.region().to_string(),
                partition: target.partition().to_string(),
                phase: tracker.current,
                transitions: tracker.history,
                checks,
                cache: stats,
            }
        }
        .instrument(span)
        .await
    }

    /// Select the checks to run for `target`, in registry order. Categories
    /// whose service is unavailable are returned as skipped reports. Global
    /// categories are only considered on the target that owns them.
    fn enumerate(
        &self,
        target: &RunContext,
        global_categories: &HashSet<String>,
    ) -> (Vec<&CheckDescriptor>, Vec<CheckReport>) {
        let mut planned = Vec::new();
        let mut skipped = Vec::new();

        for category in self.registry.all_categories() {
            if self.registry.is_global(category) && !global_categories.contains(category) {
                debug!(category = %category, "global category runs on another target of this account");
                continue;
            }

            let selected = self.registry.checks_for(category).filter(|descriptor| {
                self.config.only_check.as_deref().map_or(true, |only| descriptor.name == only)
            });

            if self.availability.is_available(category, target) {
                planned.extend(selected);
            } else {
                debug!(category = %category, "service unavailable for target");
                skipped.extend(selected.map(|descriptor| {
                    CheckReport::skipped(category, &descriptor.name, SkipReason::ServiceUnavailable)
                }));
            }
        }

        (planned, skipped)
    }

    async fn run_check(
        &self,
        descriptor: &CheckDescriptor,
        cache: &RunCache,
        target: &Arc<RunContext>,
        scope: &RunScope,
    ) -> CheckReport {
        let category = descriptor.category.as_str();
        let name = descriptor.name.as_str();

        if scope.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!(category, check = name, "deadline passed before check started");
            return CheckReport::skipped(category, name, SkipReason::DeadlineExceeded);
        }
        if let Some(missing) =
            descriptor.required_credentials().find(|cred| !scope.credentials.is_available(cred))
        {
            info!(category, check = name, credential = missing, "skipping check: credential unavailable");
            return CheckReport::skipped(
                category,
                name,
                SkipReason::MissingCredential { credential: missing.to_string() },
            );
        }

        let started = Instant::now();
        let ctx =
            CheckContext::new(cache.clone(), Arc::clone(target), Arc::clone(&scope.credentials));
        let mut tally = CheckTally::default();
        let result = self.drain_check(descriptor, ctx, target, scope.deadline, &mut tally).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let outcome = match result {
            Ok(()) => {
                debug!(category, check = name, findings = tally.delivered, "check succeeded");
                CheckOutcome::Succeeded
            }
            Err(err) => {
                let severity = err.severity();
                let retryable = err.is_retryable();
                let retry_after = err.retry_after();
                if err.is_critical() {
                    error!(
                        category,
                        check = name,
                        error = %err,
                        %severity,
                        findings_kept = tally.delivered,
                        "check failed"
                    );
                } else {
                    warn!(
                        category,
                        check = name,
                        error = %err,
                        %severity,
                        retryable,
                        retry_after = ?retry_after,
                        findings_kept = tally.delivered,
                        "check failed"
                    );
                }
                CheckOutcome::Failed { cause: err.to_string(), severity, retryable }
            }
        };

        CheckReport {
            category: category.to_string(),
            check: name.to_string(),
            outcome,
            findings_delivered: tally.delivered,
            findings_rejected: tally.rejected,
            sink_failures: tally.sink_failures,
            duration_ms,
        }
    }

    /// Failure boundary around one check invocation.
    async fn drain_check(
        &self,
        descriptor: &CheckDescriptor,
        ctx: CheckContext,
        target: &RunContext,
        deadline: Option<Instant>,
        tally: &mut CheckTally,
    ) -> Result<(), CheckError> {
        let check = Arc::clone(&descriptor.check);
        let mut findings = match std::panic::catch_unwind(AssertUnwindSafe(|| check.run(ctx))) {
            Ok(stream) => stream,
            Err(payload) => return Err(CheckError::Panicked(panic_message(payload.as_ref()))),
        };

        let drain = async {
            while let Some(item) = findings.next().await {
                self.forward(item?, descriptor, target, tally).await;
            }
            Ok::<(), CheckError>(())
        };
        let guarded = AssertUnwindSafe(drain).catch_unwind();

        let outcome = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(CheckError::DeadlineExceeded),
            },
            None => guarded.await,
        };

        outcome.unwrap_or_else(|payload| Err(CheckError::Panicked(panic_message(payload.as_ref()))))
    }

    async fn forward(
        &self,
        raw: RawFinding,
        descriptor: &CheckDescriptor,
        target: &RunContext,
        tally: &mut CheckTally,
    ) {
        let finding = match self.normalizer.normalize(raw, &descriptor.category, &descriptor.name, target)
        {
            Ok(finding) => finding,
            Err(err) => {
                warn!(check = %descriptor.name, error = %err, "finding rejected");
                tally.rejected += 1;
                return;
            }
        };

        let id = finding.id.clone();
        match self.sink.deliver(finding).await {
            Ok(()) => tally.delivered += 1,
            Err(err) => {
                warn!(check = %descriptor.name, finding = %id, error = %err, "sink delivery failed");
                tally.sink_failures += 1;
            }
        }
    }
}

/// Records and logs phase transitions of one target.
struct PhaseTracker<'a> {
    label: &'a str,
    current: TargetPhase,
    history: Vec<TargetPhase>,
}

impl<'a> PhaseTracker<'a> {
    fn new(label: &'a str) -> Self {
        debug!(target_label = label, phase = %TargetPhase::Pending, "target phase");
        Self { label, current: TargetPhase::Pending, history: vec![TargetPhase::Pending] }
    }

    fn advance(&mut self, next: TargetPhase) {
        debug_assert!(self.current.can_advance_to(next), "{} -> {next}", self.current);
        debug!(target_label = self.label, from = %self.current, to = %next, "target phase");
        self.current = next;
        self.history.push(next);
    }
}

/// Group targets by account, keeping plan order, and give each global
/// category to the account's first target where its service is available.
/// When no target has it, the first target owns it and reports the skip.
fn plan_batches(
    targets: TargetPlan,
    global: &[&str],
    availability: &dyn ServiceAvailability,
) -> Vec<AccountBatch> {
    let mut batches: Vec<AccountBatch> = Vec::new();
    let mut index_of: HashMap<String, usize> = HashMap::new();

    for (position, target) in targets.into_iter().enumerate() {
        let account = target.account_id().to_string();
        let index = *index_of.entry(account.clone()).or_insert_with(|| {
            batches.push(AccountBatch { account_id: account, jobs: Vec::new() });
            batches.len() - 1
        });
        batches[index].jobs.push(TargetJob { position, target, global_categories: HashSet::new() });
    }

    for batch in &mut batches {
        for category in global {
            let owner = batch
                .jobs
                .iter()
                .position(|job| availability.is_available(category, &job.target))
                .unwrap_or(0);
            if let Some(job) = batch.jobs.get_mut(owner) {
                job.global_categories.insert((*category).to_string());
            }
        }
    }

    batches
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
