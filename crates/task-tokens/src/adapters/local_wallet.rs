//! # Local Signing Service
//!
//! In-process signing service holding a root secret, its own UTXO set and
//! the ledger of every transaction it finalised. Used by the runtime demo
//! and by tests in place of an external wallet.
//!
//! - Keys: HMAC-SHA256 child derivation from the root per invoice number
//! - Encryption: XChaCha20-Poly1305, sealed as `nonce || ciphertext`
//! - Spends: every outpoint is spent at most once; inputs are reserved
//!   while a signable action is pending
//! - Unlocking proofs supplied by callers are verified before finalising

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

use shared_crypto::{derive_child_secret, derive_symmetric_key, open, seal, Secp256k1KeyPair, Secp256k1PublicKey};

use crate::algorithms::{build_unlocking_script, decode_locking_script, parse_unlocking_script, sighash_digest};
use crate::domain::script::{write_push, ScriptChunk, OP_CHECKSIG};
use crate::domain::{
    Counterparty, DerivationContext, EvidenceBundle, Hash, LockingScript, Network, Outpoint,
    PublicKey, SighashType, TaskTokenError, Transaction, TxInput, TxOutput, UnlockingScript,
};
use crate::ports::{
    CreateActionArgs, CreateActionResult, ListOutputsArgs, ListOutputsResult, SignActionArgs,
    SignActionResult, SignableTransaction, SigningService, WalletOutput,
};

/// Message reported while the service is switched off.
const NO_IDENTITY: &str = "no identity configured";

/// Invoice number of the key locking the wallet's own change.
const CHANGE_INVOICE: &str = "wallet-change";

/// Funds given to a wallet built with `for_testing`.
const TEST_FUNDING: u64 = 100_000;

/// Output held by the wallet.
#[derive(Clone, Debug)]
struct StoredOutput {
    outpoint: Outpoint,
    satoshis: u64,
    locking_script: LockingScript,
    basket: Option<String>,
    tags: Vec<String>,
}

impl StoredOutput {
    fn is_change(&self) -> bool {
        self.basket.is_none()
    }
}

/// Skeleton waiting for the caller's unlocking proofs.
#[derive(Clone, Debug)]
struct PendingAction {
    transaction: Transaction,
    caller_inputs: Vec<usize>,
    wallet_inputs: Vec<usize>,
    placements: Vec<(Option<String>, Vec<String>)>,
}

#[derive(Debug, Default)]
struct WalletState {
    /// Unspent outputs in creation order.
    outputs: Vec<StoredOutput>,
    transactions: HashMap<Hash, Transaction>,
    spent: HashSet<Outpoint>,
    reserved: HashSet<Outpoint>,
    pending: HashMap<String, PendingAction>,
}

impl WalletState {
    fn output(&self, outpoint: &Outpoint) -> Option<&StoredOutput> {
        self.outputs.iter().find(|o| &o.outpoint == outpoint)
    }

    /// Bincode-encoded transaction plus every ancestor the ledger knows.
    fn evidence_for(&self, txids: &[Hash]) -> Result<EvidenceBundle, TaskTokenError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<Hash> = txids.to_vec();
        let mut bundle = Vec::new();

        while let Some(txid) = stack.pop() {
            if !seen.insert(txid) {
                continue;
            }
            if let Some(tx) = self.transactions.get(&txid) {
                stack.extend(tx.inputs.iter().map(|i| i.source.txid));
                bundle.push(tx.clone());
            }
        }

        bincode::serialize(&bundle)
            .map(EvidenceBundle::new)
            .map_err(|e| TaskTokenError::Wallet(format!("evidence encoding failed: {e}")))
    }
}

/// In-memory signing service.
pub struct LocalSigningService {
    root: [u8; 32],
    network: Network,
    fee: u64,
    available: AtomicBool,
    calls: AtomicUsize,
    state: Mutex<WalletState>,
}

impl LocalSigningService {
    /// Unfunded wallet for `root`.
    pub fn from_seed(root: [u8; 32]) -> Self {
        Self {
            root,
            network: Network::Testnet,
            fee: 0,
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Wallet with a random root.
    pub fn generate() -> Self {
        Self::from_seed(rand_root())
    }

    /// Fixed-seed wallet funded with 100 000 units.
    pub fn for_testing() -> Self {
        let wallet = Self::from_seed([7u8; 32]);
        wallet
            .fund(TEST_FUNDING)
            .expect("funding a fresh wallet succeeds");
        wallet
    }

    /// Charge a flat fee per transaction.
    pub fn with_fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Report a different network.
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// Switch the service on or off. While off every call reports
    /// `ServiceUnavailable("no identity configured")`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of port calls received.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Mint `satoshis` of change to the wallet.
    pub fn fund(&self, satoshis: u64) -> Result<Outpoint, TaskTokenError> {
        let script = self.change_script()?;
        let mut state = self.state.lock();
        // Lock time keeps repeated fundings distinct.
        let tx = Transaction {
            outputs: vec![TxOutput::new(satoshis, script)],
            lock_time: state.transactions.len() as u32,
            ..Default::default()
        };
        let txid = commit(&mut state, tx, &[(None, Vec::new())])?;
        info!(satoshis, "Wallet funded");
        Ok(Outpoint::new(txid, 0))
    }

    /// Store an output in `basket` as if received from elsewhere.
    pub fn store_external_output(
        &self,
        basket: &str,
        satoshis: u64,
        locking_script: LockingScript,
    ) -> Outpoint {
        let mut state = self.state.lock();
        let tx = Transaction {
            outputs: vec![TxOutput::new(satoshis, locking_script)],
            lock_time: state.transactions.len() as u32,
            ..Default::default()
        };
        let txid = tx.txid();
        let outpoint = Outpoint::new(txid, 0);
        state.outputs.push(StoredOutput {
            outpoint,
            satoshis,
            locking_script: tx.outputs[0].locking_script.clone(),
            basket: Some(basket.to_string()),
            tags: Vec::new(),
        });
        state.transactions.insert(txid, tx);
        outpoint
    }

    /// Unspent change value.
    pub fn balance(&self) -> u64 {
        let state = self.state.lock();
        state
            .outputs
            .iter()
            .filter(|o| o.is_change())
            .map(|o| o.satoshis)
            .sum()
    }

    /// Whether `outpoint` is an unspent output of this wallet.
    pub fn is_unspent(&self, outpoint: &Outpoint) -> bool {
        self.state.lock().output(outpoint).is_some()
    }

    /// Whether the ledger holds a transaction with this id.
    pub fn knows_transaction(&self, txid: &Hash) -> bool {
        self.state.lock().transactions.contains_key(txid)
    }

    /// Finalised transaction by id.
    pub fn transaction(&self, txid: &Hash) -> Option<Transaction> {
        self.state.lock().transactions.get(txid).cloned()
    }

    /// Signable actions not yet signed or aborted.
    pub fn pending_actions(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Check an unlocking proof for input `index` against the input's
    /// source script. Supports record scripts and plain pay-to-pubkey.
    pub fn verify_unlocking(
        &self,
        tx: &Transaction,
        index: usize,
        proof: &UnlockingScript,
    ) -> Result<bool, TaskTokenError> {
        verify_input(tx, index, proof)
    }

    fn guard(&self) -> Result<(), TaskTokenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return Err(TaskTokenError::ServiceUnavailable(NO_IDENTITY.to_string()));
        }
        Ok(())
    }

    fn key_for(&self, context: &DerivationContext) -> Result<Secp256k1KeyPair, TaskTokenError> {
        derive_child_secret(&self.root, &invoice(context)).map_err(wallet_error)
    }

    fn change_key(&self) -> Result<Secp256k1KeyPair, TaskTokenError> {
        derive_child_secret(&self.root, CHANGE_INVOICE).map_err(wallet_error)
    }

    fn change_script(&self) -> Result<LockingScript, TaskTokenError> {
        let key = self.change_key()?;
        let mut bytes = Vec::with_capacity(35);
        write_push(&mut bytes, key.public_key().as_bytes());
        bytes.push(OP_CHECKSIG);
        Ok(LockingScript::from_bytes(bytes))
    }

    fn sign_wallet_inputs(
        &self,
        tx: &mut Transaction,
        indices: &[usize],
    ) -> Result<(), TaskTokenError> {
        let key = self.change_key()?;
        let sighash = SighashType::all();
        for &index in indices {
            let digest = sighash_digest(tx, index, sighash)?;
            let der = key.sign_der(&digest).map_err(wallet_error)?;
            tx.inputs[index].unlocking_script = build_unlocking_script(&der, sighash.to_byte());
        }
        Ok(())
    }
}

#[async_trait]
impl SigningService for LocalSigningService {
    async fn encrypt(
        &self,
        plaintext: &[u8],
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError> {
        self.guard()?;
        let key = derive_symmetric_key(&self.root, &invoice(context)).map_err(wallet_error)?;
        seal(&key, plaintext).map_err(wallet_error)
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError> {
        self.guard()?;
        let key = derive_symmetric_key(&self.root, &invoice(context)).map_err(wallet_error)?;
        open(&key, ciphertext).map_err(|e| TaskTokenError::DecryptionFailed(e.to_string()))
    }

    async fn get_public_key(
        &self,
        context: &DerivationContext,
    ) -> Result<PublicKey, TaskTokenError> {
        self.guard()?;
        let key = self.key_for(context)?;
        Ok(PublicKey::from_bytes(*key.public_key().as_bytes()))
    }

    async fn create_signature(
        &self,
        digest: &Hash,
        context: &DerivationContext,
    ) -> Result<Vec<u8>, TaskTokenError> {
        self.guard()?;
        self.key_for(context)?.sign_der(digest).map_err(wallet_error)
    }

    async fn create_action(
        &self,
        args: CreateActionArgs,
    ) -> Result<CreateActionResult, TaskTokenError> {
        self.guard()?;
        let change_script = self.change_script()?;
        let mut state = self.state.lock();

        let mut tx = Transaction::default();
        let mut caller_inputs = Vec::with_capacity(args.inputs.len());
        let mut funded = 0u64;

        for input in &args.inputs {
            if state.spent.contains(&input.outpoint) {
                return Err(TaskTokenError::Wallet(format!(
                    "Input {} has already been spent",
                    input.outpoint
                )));
            }
            if state.reserved.contains(&input.outpoint) {
                return Err(TaskTokenError::Wallet(format!(
                    "Input {} is reserved by a pending action",
                    input.outpoint
                )));
            }
            let source = state.output(&input.outpoint).ok_or_else(|| {
                TaskTokenError::Wallet(format!(
                    "Input {} is not a spendable output of this wallet",
                    input.outpoint
                ))
            })?;

            funded = add_funds(funded, source.satoshis)?;
            caller_inputs.push(tx.inputs.len());
            tx.inputs.push(
                TxInput::new(input.outpoint)
                    .with_source_output(source.satoshis, source.locking_script.clone()),
            );
        }

        let needed = args
            .outputs
            .iter()
            .try_fold(self.fee, |total, o| total.checked_add(o.satoshis))
            .ok_or_else(|| {
                TaskTokenError::Wallet(format!(
                    "Insufficient funds: need more than {}, have {funded}",
                    u64::MAX
                ))
            })?;

        let mut wallet_inputs = Vec::new();
        if funded < needed {
            let spendable: Vec<StoredOutput> = state
                .outputs
                .iter()
                .filter(|o| o.is_change() && !state.reserved.contains(&o.outpoint))
                .cloned()
                .collect();
            for change in spendable {
                if funded >= needed {
                    break;
                }
                funded = add_funds(funded, change.satoshis)?;
                wallet_inputs.push(tx.inputs.len());
                tx.inputs.push(
                    TxInput::new(change.outpoint)
                        .with_source_output(change.satoshis, change.locking_script),
                );
            }
        }
        if funded < needed {
            return Err(TaskTokenError::Wallet(format!(
                "Insufficient funds: need {needed}, have {funded}"
            )));
        }

        let mut placements = Vec::with_capacity(args.outputs.len() + 1);
        for output in args.outputs {
            placements.push((output.basket, output.tags));
            tx.outputs
                .push(TxOutput::new(output.satoshis, output.locking_script));
        }
        let change = funded - needed;
        if change > 0 {
            placements.push((None, Vec::new()));
            tx.outputs.push(TxOutput::new(change, change_script));
        }

        if caller_inputs.is_empty() {
            drop(state);
            self.sign_wallet_inputs(&mut tx, &wallet_inputs)?;
            let mut state = self.state.lock();
            let txid = commit(&mut state, tx, &placements)?;
            let evidence = state.evidence_for(&[txid])?;
            debug!(txid = %hex::encode(txid), "Action finalised");
            return Ok(CreateActionResult {
                txid: Some(txid),
                evidence: Some(evidence),
                signable: None,
            });
        }

        for input in &tx.inputs {
            state.reserved.insert(input.source);
        }
        let reference = Uuid::new_v4().to_string();
        state.pending.insert(
            reference.clone(),
            PendingAction {
                transaction: tx.clone(),
                caller_inputs,
                wallet_inputs,
                placements,
            },
        );
        debug!(reference = %reference, "Signable action issued");

        Ok(CreateActionResult {
            txid: None,
            evidence: None,
            signable: Some(SignableTransaction {
                reference,
                transaction: tx,
            }),
        })
    }

    async fn sign_action(&self, args: SignActionArgs) -> Result<SignActionResult, TaskTokenError> {
        self.guard()?;

        let pending = self
            .state
            .lock()
            .pending
            .get(&args.reference)
            .cloned()
            .ok_or_else(|| {
                TaskTokenError::Wallet(format!("Unknown action reference {}", args.reference))
            })?;

        let mut tx = pending.transaction.clone();
        apply_spends(&mut tx, &pending.caller_inputs, &args.spends)?;
        self.sign_wallet_inputs(&mut tx, &pending.wallet_inputs)?;

        let mut state = self.state.lock();
        if state.pending.remove(&args.reference).is_none() {
            return Err(TaskTokenError::Wallet(format!(
                "Action {} was aborted",
                args.reference
            )));
        }
        for input in &tx.inputs {
            state.reserved.remove(&input.source);
        }
        let txid = commit(&mut state, tx, &pending.placements)?;
        let evidence = state.evidence_for(&[txid])?;
        debug!(txid = %hex::encode(txid), "Signable action finalised");

        Ok(SignActionResult {
            txid: Some(txid),
            evidence: Some(evidence),
        })
    }

    async fn abort_action(&self, reference: &str) -> Result<(), TaskTokenError> {
        self.guard()?;
        let mut state = self.state.lock();
        let pending = state.pending.remove(reference).ok_or_else(|| {
            TaskTokenError::Wallet(format!("Unknown action reference {reference}"))
        })?;
        for input in &pending.transaction.inputs {
            state.reserved.remove(&input.source);
        }
        debug!(reference = %reference, "Signable action aborted");
        Ok(())
    }

    async fn list_outputs(
        &self,
        args: ListOutputsArgs,
    ) -> Result<ListOutputsResult, TaskTokenError> {
        self.guard()?;
        let state = self.state.lock();

        let in_basket: Vec<&StoredOutput> = state
            .outputs
            .iter()
            .filter(|o| o.basket.as_deref() == Some(args.basket.as_str()))
            .collect();
        let total = in_basket.len();

        let outputs: Vec<WalletOutput> = in_basket
            .into_iter()
            .take(args.limit as usize)
            .map(|o| WalletOutput {
                outpoint: o.outpoint,
                satoshis: o.satoshis,
                locking_script: Some(o.locking_script.clone()),
                spendable: !state.reserved.contains(&o.outpoint),
                tags: o.tags.clone(),
            })
            .collect();

        let evidence = if args.include_evidence {
            let txids: Vec<Hash> = outputs.iter().map(|o| o.outpoint.txid).collect();
            Some(state.evidence_for(&txids)?)
        } else {
            None
        };

        Ok(ListOutputsResult {
            total,
            outputs,
            evidence,
        })
    }

    async fn get_network(&self) -> Result<Network, TaskTokenError> {
        self.guard()?;
        Ok(self.network)
    }
}

/// Record a finalised transaction: spend its inputs and store its outputs.
fn add_funds(funded: u64, satoshis: u64) -> Result<u64, TaskTokenError> {
    funded
        .checked_add(satoshis)
        .ok_or_else(|| TaskTokenError::Wallet("Input total overflows".to_string()))
}

fn commit(
    state: &mut WalletState,
    tx: Transaction,
    placements: &[(Option<String>, Vec<String>)],
) -> Result<Hash, TaskTokenError> {
    for input in &tx.inputs {
        if state.spent.contains(&input.source) || state.output(&input.source).is_none() {
            return Err(TaskTokenError::Wallet(format!(
                "Input {} has already been spent",
                input.source
            )));
        }
    }

    let txid = tx.txid();
    for input in &tx.inputs {
        state.spent.insert(input.source);
    }
    state
        .outputs
        .retain(|o| tx.inputs.iter().all(|i| i.source != o.outpoint));

    for (vout, (output, (basket, tags))) in tx.outputs.iter().zip(placements).enumerate() {
        state.outputs.push(StoredOutput {
            outpoint: Outpoint::new(txid, vout as u32),
            satoshis: output.satoshis,
            locking_script: output.locking_script.clone(),
            basket: basket.clone(),
            tags: tags.clone(),
        });
    }
    state.transactions.insert(txid, tx);
    Ok(txid)
}

/// Place caller proofs into `tx`, verifying each one.
fn apply_spends(
    tx: &mut Transaction,
    caller_inputs: &[usize],
    spends: &BTreeMap<u32, UnlockingScript>,
) -> Result<(), TaskTokenError> {
    for &index in caller_inputs {
        let proof = spends.get(&(index as u32)).ok_or_else(|| {
            TaskTokenError::Wallet(format!("Missing unlocking script for input {index}"))
        })?;
        if !verify_input(tx, index, proof)? {
            return Err(TaskTokenError::Wallet(format!(
                "Unlocking script for input {index} does not satisfy its locking script"
            )));
        }
        tx.inputs[index].unlocking_script = proof.clone();
    }
    Ok(())
}

fn verify_input(
    tx: &Transaction,
    index: usize,
    proof: &UnlockingScript,
) -> Result<bool, TaskTokenError> {
    let source = tx
        .inputs
        .get(index)
        .and_then(|i| i.source_locking_script.as_ref())
        .ok_or_else(|| {
            TaskTokenError::MalformedTransaction(format!("input {index} missing source script"))
        })?;

    let owner = match script_owner(source) {
        Some(owner) => owner,
        None => return Ok(false),
    };
    let (der, sighash_byte) = match parse_unlocking_script(proof) {
        Ok(parts) => parts,
        Err(_) => return Ok(false),
    };
    let sighash = match SighashType::from_byte(sighash_byte) {
        Some(sighash) => sighash,
        None => return Ok(false),
    };

    let digest = sighash_digest(tx, index, sighash)?;
    let key = match Secp256k1PublicKey::from_bytes(*owner.as_bytes()) {
        Ok(key) => key,
        Err(_) => return Ok(false),
    };
    Ok(key.verify_der(&digest, &der).is_ok())
}

/// Key a record or pay-to-pubkey script locks to.
fn script_owner(script: &LockingScript) -> Option<PublicKey> {
    if let Ok(decoded) = decode_locking_script(script) {
        return Some(decoded.owner);
    }
    match script.chunks().ok()?.as_slice() {
        [ScriptChunk::Push(key), ScriptChunk::Op(OP_CHECKSIG)] => PublicKey::from_slice(key),
        _ => None,
    }
}

fn invoice(context: &DerivationContext) -> String {
    match context.counterparty {
        Counterparty::Myself => context.invoice_number(),
        other => format!("{}-{}", context.invoice_number(), other),
    }
}

fn wallet_error(e: shared_crypto::CryptoError) -> TaskTokenError {
    TaskTokenError::Wallet(e.to_string())
}

fn rand_root() -> [u8; 32] {
    // A fresh symmetric key is 32 uniformly random bytes.
    *shared_crypto::SecretKey::generate().as_bytes()
}
