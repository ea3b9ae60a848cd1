//! Orchestrator (C9): `INIT → DISCOVER_PAYER → FOR_EACH_FILE → STREAM →
//! FLUSH_TAIL → NEXT_PAYER → REPORT`.
//!
//! Grounded on `production_etl_pipeline.py`'s `process_all_payers`/
//! `process_payer`/`process_mrf_file` (per-payer parallelism, per-file
//! sequential streaming, stats folded into one final report) and on
//! `sources/united_health.rs`'s `stream::iter(...).buffer_unordered(...)`
//! concurrency idiom, used here for payer-level fan-out instead of
//! index-file fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};

use crate::config::Config;
use crate::emit::{BatchEmitter, Sink};
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::handlers::PayerHandler;
use crate::identity;
use crate::normalize::{self, SkipReason};
use crate::quality::{self, RateQualityInput};
use crate::report::RunReport;
use crate::streaming::{self, ProviderTable};
use crate::toc;
use crate::types::{ContractPeriod, DataLineage, MrfDescriptor, MrfKind, Organization, PlanDetails, Provider, ProviderNetwork, Rate};

/// Stats contributed by one payer's worker, folded into the run report by
/// the orchestrator task over a bounded channel.
#[derive(Debug, Default)]
struct PayerOutcome {
    payer: String,
    total_files_found: usize,
    files_processed: usize,
    files_succeeded: usize,
    files_failed: usize,
    records_extracted: usize,
    records_validated: usize,
    uploads: usize,
    errors: Vec<String>,
}

pub struct Orchestrator {
    config: Config,
    fetcher: Fetcher,
    sink: Arc<dyn Sink>,
}

impl Orchestrator {
    pub fn new(config: Config, fetcher: Fetcher, sink: Arc<dyn Sink>) -> Self {
        Self { config, fetcher, sink }
    }

    pub async fn run(&self, run_ts: &str) -> Result<RunReport, PipelineError> {
        let start = std::time::Instant::now();
        let mut report = RunReport::new(run_ts.to_string());

        let (tx, mut rx) = mpsc::channel::<PayerOutcome>(self.config.parallel_workers.max(1));

        let payers: Vec<(String, String)> =
            self.config.payer_endpoints.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let parallel_workers = self.config.parallel_workers;

        let collector = tokio::spawn(async move {
            let mut report = RunReport::default();
            while let Some(outcome) = rx.recv().await {
                report.payers_processed += 1;
                report.total_files_found += outcome.total_files_found;
                report.files_processed += outcome.files_processed;
                report.files_succeeded += outcome.files_succeeded;
                report.files_failed += outcome.files_failed;
                report.records_extracted += outcome.records_extracted;
                report.records_validated += outcome.records_validated;
                report.uploads += outcome.uploads;
                report.errors.extend(outcome.errors);
            }
            report
        });

        stream::iter(payers)
            .for_each_concurrent(parallel_workers.max(1), |(payer_name, index_url)| {
                let tx = tx.clone();
                let this = self;
                let run_ts = run_ts.to_string();
                async move {
                    let outcome = this.process_payer(&payer_name, &index_url, &run_ts).await;
                    let _ = tx.send(outcome).await;
                }
                .instrument(tracing::info_span!("payer", payer = %payer_name))
            })
            .await;

        drop(tx);
        let folded = collector.await.map_err(|e| PipelineError::Sink(crate::error::SinkError::UploadExhausted(e.to_string())))?;

        report.payers_processed = folded.payers_processed;
        report.total_files_found = folded.total_files_found;
        report.files_processed = folded.files_processed;
        report.files_succeeded = folded.files_succeeded;
        report.files_failed = folded.files_failed;
        report.records_extracted = folded.records_extracted;
        report.records_validated = folded.records_validated;
        report.uploads = folded.uploads;
        report.errors = folded.errors;

        let elapsed = start.elapsed().as_secs_f64();
        report.finalize(chrono::Utc::now().to_rfc3339(), elapsed);
        Ok(report)
    }

    /// DISCOVER_PAYER → FOR_EACH_FILE → STREAM → FLUSH_TAIL for one payer.
    /// Failures here are captured into the outcome, never propagated: a
    /// single payer's failure must not abort the run.
    async fn process_payer(&self, payer_name: &str, index_url: &str, run_ts: &str) -> PayerOutcome {
        let mut outcome = PayerOutcome { payer: payer_name.to_string(), ..Default::default() };

        let descriptors = match toc::resolve(&self.fetcher, index_url).await {
            Ok(d) => d,
            Err(e) => {
                warn!(payer = payer_name, error = %e, "payer discovery failed");
                outcome.errors.push(format!("{payer_name}: {e}"));
                return outcome;
            }
        };
        outcome.total_files_found = descriptors.len();

        let mut rate_files: Vec<MrfDescriptor> =
            descriptors.into_iter().filter(|d| d.kind == MrfKind::InNetworkRates).collect();
        if let Some(limit) = self.config.max_files_per_payer {
            rate_files.truncate(limit);
        }

        let handler = PayerHandler::for_payer(payer_name);
        let cpt_whitelist: HashSet<String> = self.config.cpt_whitelist.iter().cloned().collect();
        let payer_uuid = identity::payer_uuid(payer_name, "");

        let mut emitter = BatchEmitter::new(self.sink.clone(), payer_name, payer_name, run_ts);

        for descriptor in &rate_files {
            outcome.files_processed += 1;
            // Dedup sets are per-file: the same TIN or NPI in a later file of
            // this payer must still be emitted.
            let mut seen_organizations: HashSet<uuid::Uuid> = HashSet::new();
            let mut seen_providers: HashSet<uuid::Uuid> = HashSet::new();
            match self
                .process_file(payer_name, &payer_uuid, descriptor, handler, &cpt_whitelist, &mut emitter, &mut seen_organizations, &mut seen_providers)
                .await
            {
                Ok((extracted, validated)) => {
                    outcome.files_succeeded += 1;
                    outcome.records_extracted += extracted;
                    outcome.records_validated += validated;
                }
                Err(e) => {
                    outcome.files_failed += 1;
                    outcome.errors.push(format!("{payer_name}: {e}"));
                    error!(payer = payer_name, url = %descriptor.url, error = %e, "file processing failed");
                }
            }
        }

        if let Err(e) = emitter.flush_all().await {
            outcome.errors.push(format!("{payer_name}: flush_tail failed: {e}"));
        } else {
            outcome.uploads += 1;
        }

        info!(payer = payer_name, files = outcome.files_processed, records = outcome.records_validated, "completed payer");
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_file(
        &self,
        payer_name: &str,
        payer_uuid: &uuid::Uuid,
        descriptor: &MrfDescriptor,
        handler: PayerHandler,
        cpt_whitelist: &HashSet<String>,
        emitter: &mut BatchEmitter,
        seen_organizations: &mut HashSet<uuid::Uuid>,
        seen_providers: &mut HashSet<uuid::Uuid>,
    ) -> Result<(usize, usize), crate::error::ParseError> {
        let provider_table = self.load_provider_table(descriptor).await;

        let bytes = self
            .fetcher
            .get_bytes(&descriptor.url)
            .await
            .map_err(|e| crate::error::ParseError::Structural(e.to_string()))?;

        let mut extracted = 0usize;
        let mut validated = 0usize;
        let max_records = self.config.max_records_per_file;

        let plan = PlanDetails {
            plan_name: descriptor.plan_name.clone().unwrap_or_default(),
            plan_id: descriptor.plan_id.clone().unwrap_or_default(),
            plan_type: String::new(),
            market_type: descriptor.plan_market_type.clone().unwrap_or_default(),
        };

        let mut rows: Vec<Rate> = Vec::new();
        let mut orgs: Vec<Organization> = Vec::new();
        let mut providers: Vec<Provider> = Vec::new();
        let mut skip_counts: HashMap<&'static str, usize> = HashMap::new();

        let stream_stats = streaming::stream_in_network(bytes.as_slice(), handler, provider_table, |tuple| {
            extracted += 1;
            if let Some(limit) = max_records {
                if extracted > limit {
                    return;
                }
            }

            let normalized = match normalize::normalize(&tuple, cpt_whitelist) {
                Ok(n) => n,
                Err(reason) => {
                    *skip_counts.entry(skip_reason_label(reason)).or_insert(0) += 1;
                    return;
                }
            };

            let org_name = normalized.provider_name.clone().unwrap_or_default();
            let tin = normalized.provider_tin.clone().unwrap_or_default();
            let organization_uuid = identity::organization_uuid(&tin, &org_name);

            let rate_uuid = identity::rate_uuid(
                payer_uuid,
                &organization_uuid,
                &normalized.service_code,
                normalized.negotiated_rate,
                normalized.expiration_date.as_deref().unwrap_or(""),
            );

            let quality_flags = quality::validate_rate(&RateQualityInput {
                service_code: &normalized.service_code,
                negotiated_rate: Some(normalized.negotiated_rate),
                payer_uuid_present: true,
                organization_uuid_present: true,
                npi_list: &normalized.provider_npi,
            });

            rows.push(Rate {
                rate_uuid,
                payer_uuid: *payer_uuid,
                organization_uuid,
                service_code: normalized.service_code.clone(),
                service_description: normalized.description.clone(),
                billing_code_type: normalized.billing_code_type.clone(),
                negotiated_rate: normalized.negotiated_rate,
                billing_class: normalized.billing_class.clone(),
                rate_type: normalized.negotiated_type.clone(),
                service_codes: normalized.service_codes.clone(),
                plan_details: plan.clone(),
                contract_period: ContractPeriod { effective_date: None, expiration_date: normalized.expiration_date.clone() },
                provider_network: ProviderNetwork {
                    npi_list: normalized.provider_npi.clone(),
                    npi_count: normalized.provider_npi.len(),
                    coverage_type: normalized.billing_class.clone(),
                },
                data_lineage: DataLineage {
                    source_url: descriptor.url.clone(),
                    source_url_hash: short_hash(&descriptor.url),
                    extracted_at: String::new(),
                    processing_version: String::new(),
                },
                quality_flags,
            });
            validated += 1;

            if seen_organizations.insert(organization_uuid) {
                orgs.push(Organization {
                    organization_uuid,
                    tin: tin.clone(),
                    organization_name: if org_name.is_empty() { format!("Organization-{tin}") } else { org_name.clone() },
                });
            }

            for npi in &normalized.provider_npi {
                let provider_uuid = identity::provider_uuid(npi);
                if seen_providers.insert(provider_uuid) {
                    providers.push(Provider {
                        provider_uuid,
                        npi: npi.clone(),
                        organization_uuid,
                        provider_name: normalized.provider_name.clone(),
                    });
                }
            }
        })?;

        for (reason, count) in skip_counts {
            if count > 0 {
                info!(payer = payer_name, url = %descriptor.url, reason, count, "records skipped");
            }
        }
        if stream_stats.skipped_no_rate > 0 {
            info!(
                payer = payer_name,
                url = %descriptor.url,
                reason = "skipping_price_no_rate",
                count = stream_stats.skipped_no_rate,
                "records skipped"
            );
        }

        for org in orgs {
            emitter.push_organization(org);
        }
        for provider in providers {
            emitter.push_provider(provider);
        }
        for rate in rows {
            emitter
                .push_rate(rate)
                .await
                .map_err(|e| crate::error::ParseError::Structural(format!("emit failed: {e}")))?;
        }

        Ok((extracted, validated))
    }

    async fn load_provider_table(&self, descriptor: &MrfDescriptor) -> ProviderTable {
        let Some(url) = &descriptor.provider_reference_url else { return ProviderTable::new() };
        match self.fetcher.get_bytes(url).await {
            Ok(bytes) => parse_provider_table(&bytes).unwrap_or_default(),
            Err(e) => {
                warn!(url, error = %e, "provider reference fetch failed, proceeding unresolved");
                ProviderTable::new()
            }
        }
    }
}

fn parse_provider_table(bytes: &[u8]) -> Option<ProviderTable> {
    let doc: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let entries = doc.get("provider_references").and_then(serde_json::Value::as_array)?;
    let mut table = ProviderTable::new();
    for entry in entries {
        if let Some(id) = entry.get("provider_group_id").and_then(serde_json::Value::as_i64) {
            table.insert(id, entry.clone());
        }
    }
    Some(table)
}

fn skip_reason_label(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::NotWhitelisted => "not_whitelisted",
        SkipReason::MissingRate => "missing_rate",
        SkipReason::RateNotPositive => "rate_not_positive",
    }
}

fn short_hash(s: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}
