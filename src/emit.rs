//! Batch Emitter (C8).
//!
//! Generalizes `original_source/write/parquet_writer.py`'s
//! batch/flush/file-counter mechanics into three parallel in-memory batches
//! (rates, organizations, providers), each flushed to a Snappy-compressed
//! Parquet artifact through a pluggable `Sink`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, ListBuilder, StringArray, StringBuilder, StructArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::error::SinkError;
use crate::types::{ContractPeriod, DataLineage, Organization, PlanDetails, Provider, ProviderNetwork, Rate};

const RATE_BATCH_THRESHOLD: usize = 10_000;
const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Destination for flushed Parquet artifacts. `LocalSink` writes directly
/// under a local directory; `ObjectStoreSink` stages locally then uploads
/// and deletes the staging file, matching the "local unless a remote sink
/// is configured" rule as a runtime choice of sink rather than a fork in the
/// Emitter.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn put(&self, relative_path: &str, bytes: Vec<u8>) -> Result<(), SinkError>;
}

pub struct LocalSink {
    root: PathBuf,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn put(&self, relative_path: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        let path = self.root.join(relative_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

pub struct ObjectStoreSink {
    store: Arc<dyn object_store::ObjectStore>,
    prefix: String,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn object_store::ObjectStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }
}

#[async_trait]
impl Sink for ObjectStoreSink {
    async fn put(&self, relative_path: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
        let path = object_store::path::Path::from(format!("{}/{}", self.prefix, relative_path));
        let mut attempt = 0;
        loop {
            match self.store.put(&path, bytes.clone().into()).await {
                Ok(_) => return Ok(()),
                Err(e) if attempt < MAX_UPLOAD_ATTEMPTS => {
                    warn!(path = %path, error = %e, "upload failed, retrying");
                    attempt += 1;
                    sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
                Err(e) => return Err(SinkError::UploadExhausted(e.to_string())),
            }
        }
    }
}

/// Which logical table a batch belongs to, used in the flushed file's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Rates,
    Organizations,
    Providers,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Table::Rates => "rates",
            Table::Organizations => "organizations",
            Table::Providers => "providers",
        }
    }
}

/// Accumulates rows for one payer/run and flushes them through a `Sink`.
pub struct BatchEmitter {
    sink: Arc<dyn Sink>,
    payer: String,
    plan_safe: String,
    run_ts: String,
    rates: Vec<Rate>,
    organizations: Vec<Organization>,
    providers: Vec<Provider>,
    batch_index: HashMap<Table, u32>,
}

impl BatchEmitter {
    pub fn new(sink: Arc<dyn Sink>, payer: &str, plan_name: &str, run_ts: &str) -> Self {
        Self {
            sink,
            payer: payer.to_string(),
            plan_safe: sanitize_plan_name(plan_name),
            run_ts: run_ts.to_string(),
            rates: Vec::new(),
            organizations: Vec::new(),
            providers: Vec::new(),
            batch_index: HashMap::new(),
        }
    }

    pub async fn push_rate(&mut self, rate: Rate) -> Result<(), SinkError> {
        self.rates.push(rate);
        if self.rates.len() >= RATE_BATCH_THRESHOLD {
            self.flush_rates().await?;
        }
        Ok(())
    }

    pub fn push_organization(&mut self, org: Organization) {
        self.organizations.push(org);
    }

    pub fn push_provider(&mut self, provider: Provider) {
        self.providers.push(provider);
    }

    /// Flush every non-empty batch. Call at the end of each source file.
    pub async fn flush_all(&mut self) -> Result<(), SinkError> {
        self.flush_rates().await?;
        self.flush_organizations().await?;
        self.flush_providers().await?;
        Ok(())
    }

    async fn flush_rates(&mut self) -> Result<(), SinkError> {
        if self.rates.is_empty() {
            return Ok(());
        }
        let batch = rates_to_record_batch(&self.rates)?;
        self.flush_table(Table::Rates, batch, self.rates.len()).await?;
        self.rates.clear();
        Ok(())
    }

    async fn flush_organizations(&mut self) -> Result<(), SinkError> {
        if self.organizations.is_empty() {
            return Ok(());
        }
        let batch = organizations_to_record_batch(&self.organizations)?;
        self.flush_table(Table::Organizations, batch, self.organizations.len()).await?;
        self.organizations.clear();
        Ok(())
    }

    async fn flush_providers(&mut self) -> Result<(), SinkError> {
        if self.providers.is_empty() {
            return Ok(());
        }
        let batch = providers_to_record_batch(&self.providers)?;
        self.flush_table(Table::Providers, batch, self.providers.len()).await?;
        self.providers.clear();
        Ok(())
    }

    async fn flush_table(&mut self, table: Table, batch: RecordBatch, row_count: usize) -> Result<(), SinkError> {
        let idx = self.batch_index.entry(table).or_insert(0);
        let path = self.partitioned_path(table, *idx);
        *idx += 1;

        let bytes = encode_parquet(&batch)?;
        self.sink.put(&path, bytes).await?;

        info!(table = table.name(), path, rows = row_count, "flushed batch");
        Ok(())
    }

    fn partitioned_path(&self, table: Table, batch_idx: u32) -> String {
        let date = self.run_ts.split('T').next().unwrap_or(&self.run_ts);
        let hhmmss = self.run_ts.replace([':', '-'], "");
        format!(
            "{table}/payer={payer}/date={date}/{payer}_{plan}_{run_ts}_{table}_batch_{idx:04}_{hhmmss}.parquet",
            table = table.name(),
            payer = self.payer,
            plan = self.plan_safe,
            run_ts = self.run_ts,
            idx = batch_idx,
            hhmmss = hhmmss,
        )
    }
}

fn sanitize_plan_name(plan_name: &str) -> String {
    plan_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>, SinkError> {
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut buf = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))?;
        writer.write(batch)?;
        writer.close()?;
    }
    Ok(buf)
}

fn string_list_column(rows: impl Iterator<Item = impl IntoIterator<Item = impl AsRef<str>>>) -> ArrayRef {
    let mut builder = ListBuilder::new(StringBuilder::new());
    for values in rows {
        for v in values {
            builder.values().append_value(v);
        }
        builder.append(true);
    }
    Arc::new(builder.finish())
}

fn plan_details_fields() -> Fields {
    Fields::from(vec![
        Field::new("plan_name", DataType::Utf8, false),
        Field::new("plan_id", DataType::Utf8, false),
        Field::new("plan_type", DataType::Utf8, false),
        Field::new("market_type", DataType::Utf8, false),
    ])
}

fn plan_details_column(rates: &[Rate]) -> ArrayRef {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.plan_details.plan_name.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.plan_details.plan_id.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.plan_details.plan_type.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.plan_details.market_type.clone()))),
    ];
    Arc::new(StructArray::new(plan_details_fields(), arrays, None))
}

fn contract_period_fields() -> Fields {
    Fields::from(vec![
        Field::new("effective_date", DataType::Utf8, true),
        Field::new("expiration_date", DataType::Utf8, true),
    ])
}

fn contract_period_column(rates: &[Rate]) -> ArrayRef {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(rates.iter().map(|r| r.contract_period.effective_date.clone()).collect::<Vec<_>>())),
        Arc::new(StringArray::from(rates.iter().map(|r| r.contract_period.expiration_date.clone()).collect::<Vec<_>>())),
    ];
    Arc::new(StructArray::new(contract_period_fields(), arrays, None))
}

fn provider_network_fields() -> Fields {
    Fields::from(vec![
        Field::new("npi_list", DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))), false),
        Field::new("npi_count", DataType::UInt64, false),
        Field::new("coverage_type", DataType::Utf8, false),
    ])
}

fn provider_network_column(rates: &[Rate]) -> ArrayRef {
    let arrays: Vec<ArrayRef> = vec![
        string_list_column(rates.iter().map(|r| r.provider_network.npi_list.clone())),
        Arc::new(UInt64Array::from_iter_values(rates.iter().map(|r| r.provider_network.npi_count as u64))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.provider_network.coverage_type.clone()))),
    ];
    Arc::new(StructArray::new(provider_network_fields(), arrays, None))
}

fn data_lineage_fields() -> Fields {
    Fields::from(vec![
        Field::new("source_url", DataType::Utf8, false),
        Field::new("source_url_hash", DataType::Utf8, false),
        Field::new("extracted_at", DataType::Utf8, false),
        Field::new("processing_version", DataType::Utf8, false),
    ])
}

fn data_lineage_column(rates: &[Rate]) -> ArrayRef {
    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.data_lineage.source_url.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.data_lineage.source_url_hash.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.data_lineage.extracted_at.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.data_lineage.processing_version.clone()))),
    ];
    Arc::new(StructArray::new(data_lineage_fields(), arrays, None))
}

/// Schema mirrors the full §3 Rate entity: scalars as plain columns, arrays
/// (`service_codes`, `provider_network.npi_list`) as list columns, nested
/// objects (`plan_details`, `contract_period`, `provider_network`,
/// `data_lineage`) as struct columns.
fn rates_to_record_batch(rates: &[Rate]) -> Result<RecordBatch, SinkError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("rate_uuid", DataType::Utf8, false),
        Field::new("payer_uuid", DataType::Utf8, false),
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("service_code", DataType::Utf8, false),
        Field::new("service_description", DataType::Utf8, false),
        Field::new("billing_code_type", DataType::Utf8, false),
        Field::new("negotiated_rate", DataType::Float64, false),
        Field::new("billing_class", DataType::Utf8, false),
        Field::new("rate_type", DataType::Utf8, false),
        Field::new("service_codes", DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))), false),
        Field::new("plan_details", DataType::Struct(plan_details_fields()), false),
        Field::new("contract_period", DataType::Struct(contract_period_fields()), false),
        Field::new("provider_network", DataType::Struct(provider_network_fields()), false),
        Field::new("data_lineage", DataType::Struct(data_lineage_fields()), false),
        Field::new("confidence_score", DataType::Float64, false),
        Field::new("is_validated", DataType::Utf8, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.rate_uuid.to_string()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.payer_uuid.to_string()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.organization_uuid.to_string()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.service_code.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.service_description.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.billing_code_type.clone()))),
        Arc::new(Float64Array::from_iter_values(rates.iter().map(|r| r.negotiated_rate))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.billing_class.clone()))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.rate_type.clone()))),
        string_list_column(rates.iter().map(|r| r.service_codes.clone())),
        plan_details_column(rates),
        contract_period_column(rates),
        provider_network_column(rates),
        data_lineage_column(rates),
        Arc::new(Float64Array::from_iter_values(rates.iter().map(|r| r.quality_flags.confidence_score))),
        Arc::new(StringArray::from_iter_values(rates.iter().map(|r| r.quality_flags.is_validated.to_string()))),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn organizations_to_record_batch(orgs: &[Organization]) -> Result<RecordBatch, SinkError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("tin", DataType::Utf8, false),
        Field::new("organization_name", DataType::Utf8, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(orgs.iter().map(|o| o.organization_uuid.to_string()))),
        Arc::new(StringArray::from_iter_values(orgs.iter().map(|o| o.tin.clone()))),
        Arc::new(StringArray::from_iter_values(orgs.iter().map(|o| o.organization_name.clone()))),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

fn providers_to_record_batch(providers: &[Provider]) -> Result<RecordBatch, SinkError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("provider_uuid", DataType::Utf8, false),
        Field::new("npi", DataType::Utf8, false),
        Field::new("organization_uuid", DataType::Utf8, false),
        Field::new("provider_name", DataType::Utf8, true),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(providers.iter().map(|p| p.provider_uuid.to_string()))),
        Arc::new(StringArray::from_iter_values(providers.iter().map(|p| p.npi.clone()))),
        Arc::new(StringArray::from_iter_values(providers.iter().map(|p| p.organization_uuid.to_string()))),
        Arc::new(StringArray::from(providers.iter().map(|p| p.provider_name.clone()).collect::<Vec<_>>())),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MemSink {
        puts: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Sink for MemSink {
        async fn put(&self, relative_path: &str, bytes: Vec<u8>) -> Result<(), SinkError> {
            self.puts.lock().unwrap().push((relative_path.to_string(), bytes.len()));
            Ok(())
        }
    }

    #[test]
    fn sanitizes_plan_name_for_path() {
        assert_eq!(sanitize_plan_name("Gold PPO (2024)"), "Gold_PPO__2024_");
    }

    #[tokio::test]
    async fn flush_writes_partitioned_path_with_batch_index() {
        let sink = Arc::new(MemSink { puts: Mutex::new(Vec::new()) });
        let mut emitter = BatchEmitter::new(sink.clone(), "centene", "Gold PPO", "2025-01-15T10:20:30Z");

        emitter.push_organization(Organization {
            organization_uuid: uuid::Uuid::nil(),
            tin: "12-3456789".to_string(),
            organization_name: "Acme".to_string(),
        });
        emitter.flush_all().await.unwrap();

        let puts = sink.puts.lock().unwrap();
        assert_eq!(puts.len(), 1);
        assert!(puts[0].0.starts_with("organizations/payer=centene/date=2025-01-15/centene_Gold_PPO_"));
        assert!(puts[0].0.contains("_batch_0000_"));
    }

    fn sample_rate() -> Rate {
        Rate {
            rate_uuid: uuid::Uuid::nil(),
            payer_uuid: uuid::Uuid::nil(),
            organization_uuid: uuid::Uuid::nil(),
            service_code: "99213".to_string(),
            service_description: "Office visit".to_string(),
            billing_code_type: "CPT".to_string(),
            negotiated_rate: 75.0,
            billing_class: "professional".to_string(),
            rate_type: "negotiated".to_string(),
            service_codes: vec!["11".to_string(), "22".to_string()],
            plan_details: PlanDetails {
                plan_name: "Gold PPO".to_string(),
                plan_id: "P1".to_string(),
                plan_type: String::new(),
                market_type: "individual".to_string(),
            },
            contract_period: ContractPeriod { effective_date: None, expiration_date: Some("2025-12-31".to_string()) },
            provider_network: ProviderNetwork {
                npi_list: vec!["1111111111".to_string()],
                npi_count: 1,
                coverage_type: "professional".to_string(),
            },
            data_lineage: DataLineage {
                source_url: "https://x/rates.json".to_string(),
                source_url_hash: "abc123".to_string(),
                extracted_at: String::new(),
                processing_version: String::new(),
            },
            quality_flags: Default::default(),
        }
    }

    #[test]
    fn rates_batch_preserves_nested_and_list_columns() {
        let batch = rates_to_record_batch(&[sample_rate()]).unwrap();
        let schema = batch.schema();

        let service_codes = schema.field_with_name("service_codes").unwrap();
        assert!(matches!(service_codes.data_type(), DataType::List(_)));

        let provider_network = schema.field_with_name("provider_network").unwrap();
        let DataType::Struct(fields) = provider_network.data_type() else { panic!("expected struct") };
        assert!(fields.iter().any(|f| f.name() == "npi_list"));

        for name in ["plan_details", "contract_period", "data_lineage"] {
            assert!(matches!(schema.field_with_name(name).unwrap().data_type(), DataType::Struct(_)));
        }
    }

    #[tokio::test]
    async fn empty_batches_do_not_flush() {
        let sink = Arc::new(MemSink { puts: Mutex::new(Vec::new()) });
        let mut emitter = BatchEmitter::new(sink.clone(), "aetna", "Plan", "2025-01-15T10:20:30Z");
        emitter.flush_all().await.unwrap();
        assert!(sink.puts.lock().unwrap().is_empty());
    }
}
