//! # Record Catalog
//!
//! In-memory list of the user's live records, newest first, and the
//! discovery pass that rebuilds it from the signing service's store.

use futures::future::join_all;
use task_telemetry::{metric_inc, CATALOG_SIZE, DISCOVERY_FAILURES};
use tracing::{debug, warn};

use super::encryption::EncryptionAdapter;
use crate::algorithms::decode_record;
use crate::domain::{
    DiscoveryFailure, DiscoveryReport, DiscoveryStage, EvidenceBundle, Outpoint, TaskRecord,
    TaskTokenError,
};
use crate::ports::{ListOutputsArgs, SigningService, WalletOutput};

/// Ordered record list.
#[derive(Clone, Debug)]
pub struct RecordCatalog {
    records: Vec<TaskRecord>,
    loading: bool,
}

impl Default for RecordCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCatalog {
    /// Empty catalog, loading until the first discovery completes.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            loading: true,
        }
    }

    /// Records, newest first.
    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are listed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True until a discovery pass completes.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Look up by identity.
    pub fn find(&self, identity: &Outpoint) -> Option<&TaskRecord> {
        self.records.iter().find(|r| &r.identity == identity)
    }

    /// Replace the whole list with a discovery result.
    pub fn replace(&mut self, records: Vec<TaskRecord>) {
        self.records = records;
        self.loading = false;
        self.publish_size();
    }

    /// Prepend a freshly created record.
    pub fn insert(&mut self, record: TaskRecord) {
        self.records.retain(|r| r.identity != record.identity);
        self.records.insert(0, record);
        self.publish_size();
    }

    /// Remove a record by identity.
    pub fn remove(&mut self, identity: &Outpoint) -> Option<TaskRecord> {
        let index = self.records.iter().position(|r| &r.identity == identity)?;
        let removed = self.records.remove(index);
        self.publish_size();
        Some(removed)
    }

    fn publish_size(&self) {
        CATALOG_SIZE.set(self.records.len() as f64);
    }
}

/// Query the store and decrypt every candidate concurrently.
///
/// Candidates that fail to decode or decrypt are dropped and reported. The
/// store lists oldest first; the result is newest first. Errors from the
/// listing itself, and service unavailability during decryption, abort
/// the pass.
pub async fn discover<W: SigningService>(
    service: &W,
    encryption: &EncryptionAdapter<W>,
    args: ListOutputsArgs,
) -> Result<(Vec<TaskRecord>, DiscoveryReport), TaskTokenError> {
    let listed = service.list_outputs(args).await?;
    let evidence = listed.evidence.unwrap_or_default();

    let candidates: Vec<WalletOutput> = listed
        .outputs
        .into_iter()
        .filter(|output| output.spendable)
        .collect();
    let candidate_count = candidates.len();

    let results = join_all(
        candidates
            .into_iter()
            .map(|output| load_record(encryption, output, &evidence)),
    )
    .await;

    let mut records = Vec::with_capacity(candidate_count);
    let mut failures = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(failure) if failure.error.is_service_unavailable() => {
                return Err(failure.error);
            }
            Err(failure) => {
                metric_inc!(DISCOVERY_FAILURES, &[failure.stage.as_str()]);
                warn!(
                    identity = %failure.identity,
                    stage = failure.stage.as_str(),
                    error = %failure.error,
                    "Dropping undecodable record"
                );
                failures.push(failure);
            }
        }
    }

    records.reverse();
    debug!(
        candidates = candidate_count,
        discovered = records.len(),
        failed = failures.len(),
        "Discovery pass complete"
    );

    let report = DiscoveryReport {
        candidates: candidate_count,
        discovered: records.len(),
        failures,
    };
    Ok((records, report))
}

async fn load_record<W: SigningService>(
    encryption: &EncryptionAdapter<W>,
    output: WalletOutput,
    evidence: &EvidenceBundle,
) -> Result<TaskRecord, DiscoveryFailure> {
    let identity = output.outpoint;
    let failure = |stage, error| DiscoveryFailure {
        identity,
        stage,
        error,
    };

    let locking_script = output.locking_script.ok_or_else(|| {
        failure(
            DiscoveryStage::MissingScript,
            TaskTokenError::UnrecognizedScript("output listed without a script".to_string()),
        )
    })?;

    let decoded =
        decode_record(&locking_script).map_err(|e| failure(DiscoveryStage::Decode, e))?;

    let plaintext = encryption
        .decrypt_text(decoded.ciphertext())
        .await
        .map_err(|e| failure(DiscoveryStage::Decrypt, e))?;

    Ok(TaskRecord {
        identity,
        plaintext,
        value: output.satoshis,
        locking_script,
        evidence: evidence.clone(),
    })
}
