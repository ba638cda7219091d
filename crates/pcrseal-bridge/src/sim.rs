// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Software root of trust.
//
// Emulates the register banks, policy sessions and sealed storage of a TPM
// in process memory. Sealed objects are AES-256-GCM ciphertexts under a
// random per-parent key; creation tickets are HMAC-SHA256 tags under a
// proof key that never leaves this struct. Used by tests and by hosts
// without a hardware root.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use pcrseal_core::config::SealConfig;
use pcrseal_core::error::{Result, SealError};
use pcrseal_core::types::{HashAlgorithm, RegisterSelection, RegisterValues};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument, warn};

use crate::traits::{
    CreationData, KeyHandle, PolicySessions, RegisterBank, RootOfTrust, SealTemplate,
    SealedBlob, SealedStorage, SessionHandle,
};

/// TPM_CC_PolicyPCR, as hashed into the session digest.
const POLICY_PCR_COMMAND: u32 = 0x0000_017F;

/// First handle of each range, as a TPM would hand them out.
const SESSION_HANDLE_BASE: u32 = 0x0300_0000;
const KEY_HANDLE_BASE: u32 = 0x8000_0000;

const KEY_NAME_LEN: usize = 16;
const KEY_LEN: usize = 32;

#[derive(Debug)]
struct SimSession {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

struct SimKey {
    name: [u8; KEY_NAME_LEN],
    material: [u8; KEY_LEN],
}

#[derive(Default)]
struct SimState {
    banks: HashMap<HashAlgorithm, Vec<Vec<u8>>>,
    sessions: HashMap<u32, SimSession>,
    keys: HashMap<u32, SimKey>,
    next_session: u32,
    next_key: u32,
}

/// An in-memory root of trust.
pub struct SoftwareRoot {
    state: Mutex<SimState>,
    rng: SystemRandom,
    proof: hmac::Key,
    register_count: u16,
}

impl SoftwareRoot {
    /// A root with the default banks, every register at zero.
    pub fn new() -> Result<Self> {
        Self::with_config(&SealConfig::default())
    }

    /// A root exposing `config.banks`, each with `config.register_count`
    /// registers starting at zero.
    pub fn with_config(config: &SealConfig) -> Result<Self> {
        let rng = SystemRandom::new();
        let proof = hmac::Key::generate(hmac::HMAC_SHA256, &rng)
            .map_err(|_| SealError::Transport("failed to generate proof key".into()))?;

        let register_count = config.register_count.min(u16::from(u8::MAX) + 1);
        let banks = config
            .banks
            .iter()
            .map(|&alg| (alg, vec![alg.zero_digest(); register_count as usize]))
            .collect();

        debug!(banks = ?config.banks, register_count, "software root initialised");
        Ok(Self {
            state: Mutex::new(SimState {
                banks,
                ..SimState::default()
            }),
            rng,
            proof,
            register_count,
        })
    }

    fn state(&self) -> Result<MutexGuard<'_, SimState>> {
        self.state
            .lock()
            .map_err(|_| SealError::Transport("software root state poisoned".into()))
    }

    fn random<const N: usize>(&self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.rng
            .fill(&mut buf)
            .map_err(|_| SealError::Transport("random number generator failed".into()))?;
        Ok(buf)
    }

    /// Bytes a creation ticket signs: parent name, object name, creation data.
    fn ticket_message(parent_name: &[u8], blob: &SealedBlob) -> Vec<u8> {
        let mut msg = parent_name.to_vec();
        msg.extend_from_slice(&blob.object_name());
        msg.extend_from_slice(&blob.creation.to_bytes());
        msg
    }
}

impl SimState {
    fn read(&self, selection: &RegisterSelection, register_count: u16) -> Result<RegisterValues> {
        let mut values = RegisterValues::new(selection.algorithm);
        if selection.is_empty() {
            return Ok(values);
        }
        let bank = self.banks.get(&selection.algorithm).ok_or_else(|| {
            SealError::Transport(format!("no {} register bank", selection.algorithm))
        })?;
        for &index in &selection.registers {
            if u16::from(index) >= register_count {
                return Err(SealError::Transport(format!(
                    "register {index} out of range"
                )));
            }
            values.insert(index, bank[index as usize].clone());
        }
        Ok(values)
    }

    fn session(&mut self, handle: SessionHandle) -> Result<&mut SimSession> {
        self.sessions
            .get_mut(&handle.0)
            .ok_or_else(|| SealError::Transport(format!("unknown session {handle}")))
    }

    fn key(&self, handle: KeyHandle) -> Result<&SimKey> {
        self.keys
            .get(&handle.0)
            .ok_or_else(|| SealError::Transport(format!("unknown key {handle}")))
    }
}

/// TPML_PCR_SELECTION holding one selection.
fn marshal_selection(selection: &RegisterSelection) -> Vec<u8> {
    let highest = selection.registers.iter().next_back().copied().unwrap_or(0);
    let size_of_select = (highest as usize / 8 + 1).max(3);
    let mut select = vec![0u8; size_of_select];
    for &index in &selection.registers {
        select[index as usize / 8] |= 1 << (index % 8);
    }

    let mut out = Vec::with_capacity(7 + size_of_select);
    out.extend_from_slice(&1u32.to_be_bytes());
    out.extend_from_slice(&selection.algorithm.tpm_id().to_be_bytes());
    out.push(size_of_select as u8);
    out.extend_from_slice(&select);
    out
}

/// AAD binding a ciphertext to its parent and its unseal policy.
fn blob_aad(name: &[u8], auth_policy: &[u8]) -> Vec<u8> {
    let mut aad = name.to_vec();
    aad.extend_from_slice(&(auth_policy.len() as u16).to_be_bytes());
    aad.extend_from_slice(auth_policy);
    aad
}

fn aead_key(material: &[u8; KEY_LEN]) -> Result<LessSafeKey> {
    UnboundKey::new(&AES_256_GCM, material)
        .map(LessSafeKey::new)
        .map_err(|_| SealError::Transport("invalid storage key".into()))
}

impl RootOfTrust for SoftwareRoot {
    fn platform_name(&self) -> &str {
        "Software root of trust"
    }
}

impl RegisterBank for SoftwareRoot {
    fn read_registers(&self, selection: &RegisterSelection) -> Result<RegisterValues> {
        self.state()?.read(selection, self.register_count)
    }

    #[instrument(skip(self, digest))]
    fn extend_register(&self, index: u8, algorithm: HashAlgorithm, digest: &[u8]) -> Result<()> {
        algorithm.check_size(digest)?;
        let mut state = self.state()?;
        let bank = state
            .banks
            .get_mut(&algorithm)
            .ok_or_else(|| SealError::Transport(format!("no {algorithm} register bank")))?;
        let current = bank
            .get_mut(index as usize)
            .ok_or_else(|| SealError::Transport(format!("register {index} out of range")))?;
        *current = algorithm.digest_parts(&[current.as_slice(), digest]);
        Ok(())
    }
}

impl PolicySessions for SoftwareRoot {
    fn open_policy_session(&self, algorithm: HashAlgorithm) -> Result<SessionHandle> {
        let mut state = self.state()?;
        let handle = SessionHandle(SESSION_HANDLE_BASE + state.next_session);
        state.next_session += 1;
        state.sessions.insert(
            handle.0,
            SimSession {
                algorithm,
                digest: algorithm.zero_digest(),
            },
        );
        debug!(%handle, %algorithm, "policy session opened");
        Ok(handle)
    }

    #[instrument(skip(self, selection), fields(registers = ?selection.registers))]
    fn certify_registers(
        &self,
        session: SessionHandle,
        selection: &RegisterSelection,
    ) -> Result<Vec<u8>> {
        let mut state = self.state()?;
        let values = state.read(selection, self.register_count)?;
        let session = state.session(session)?;
        let alg = session.algorithm;

        let mut concatenated = Vec::new();
        for (_, value) in values.iter() {
            concatenated.extend_from_slice(value);
        }
        let pcr_digest = alg.digest(&concatenated);

        let mut hasher_input = session.digest.clone();
        hasher_input.extend_from_slice(&POLICY_PCR_COMMAND.to_be_bytes());
        hasher_input.extend_from_slice(&marshal_selection(selection));
        hasher_input.extend_from_slice(&pcr_digest);
        session.digest = alg.digest(&hasher_input);
        Ok(session.digest.clone())
    }

    fn policy_digest(&self, session: SessionHandle) -> Result<Vec<u8>> {
        Ok(self.state()?.session(session)?.digest.clone())
    }

    fn flush_session(&self, session: SessionHandle) -> Result<()> {
        self.state()?
            .sessions
            .remove(&session.0)
            .map(|_| ())
            .ok_or_else(|| SealError::Transport(format!("unknown session {session}")))
    }
}

impl SealedStorage for SoftwareRoot {
    fn create_parent_key(&self) -> Result<KeyHandle> {
        let key = SimKey {
            name: self.random()?,
            material: self.random()?,
        };
        let mut state = self.state()?;
        let handle = KeyHandle(KEY_HANDLE_BASE + state.next_key);
        state.next_key += 1;
        state.keys.insert(handle.0, key);
        debug!(%handle, "parent key created");
        Ok(handle)
    }

    fn flush_key(&self, key: KeyHandle) -> Result<()> {
        self.state()?
            .keys
            .remove(&key.0)
            .map(|_| ())
            .ok_or_else(|| SealError::Transport(format!("unknown key {key}")))
    }

    #[instrument(skip_all, fields(%parent, policy = !template.auth_policy.is_empty()))]
    fn encrypt_under_parent(
        &self,
        parent: KeyHandle,
        secret: &[u8],
        template: &SealTemplate,
    ) -> Result<SealedBlob> {
        let nonce_bytes: [u8; NONCE_LEN] = self.random()?;
        let state = self.state()?;
        let key = state.key(parent)?;

        let live = state.read(&template.creation_selection, self.register_count)?;
        let creation = CreationData {
            selection: template.creation_selection.clone(),
            registers_digest: template.name_algorithm.digest(&live.concatenated()),
        };

        let mut private = secret.to_vec();
        aead_key(&key.material)?
            .seal_in_place_append_tag(
                Nonce::assume_unique_for_key(nonce_bytes),
                Aad::from(blob_aad(&key.name, &template.auth_policy).as_slice()),
                &mut private,
            )
            .map_err(|_| SealError::Transport("seal operation failed".into()))?;
        let mut sealed = nonce_bytes.to_vec();
        sealed.append(&mut private);

        let mut blob = SealedBlob {
            name_algorithm: template.name_algorithm,
            private: sealed,
            auth_policy: template.auth_policy.clone(),
            policy_selection: template.policy_selection.clone(),
            creation,
            creation_ticket: Vec::new(),
        };
        let ticket = hmac::sign(&self.proof, &Self::ticket_message(&key.name, &blob));
        blob.creation_ticket = ticket.as_ref().to_vec();
        Ok(blob)
    }

    #[instrument(skip_all, fields(%parent, session = ?session))]
    fn decrypt_under_parent(
        &self,
        parent: KeyHandle,
        blob: &SealedBlob,
        session: Option<SessionHandle>,
    ) -> Result<Vec<u8>> {
        let mut state = self.state()?;

        if blob.has_register_policy() {
            let handle = session.ok_or_else(|| {
                SealError::Authorization("object requires a policy session".into())
            })?;
            if state.session(handle)?.digest != blob.auth_policy {
                warn!(%handle, "policy session digest does not match object policy");
                return Err(SealError::Authorization(
                    "policy check failed: session digest does not match".into(),
                ));
            }
        }

        let key = state.key(parent)?;
        if blob.private.len() < NONCE_LEN {
            return Err(SealError::Transport("sealed blob is too short".into()));
        }
        let (nonce, ciphertext) = blob.private.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce)
            .map_err(|_| SealError::Transport("sealed blob nonce is malformed".into()))?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = aead_key(&key.material)?
            .open_in_place(
                nonce,
                Aad::from(blob_aad(&key.name, &blob.auth_policy).as_slice()),
                &mut in_out,
            )
            .map_err(|_| SealError::Transport("sealed blob failed integrity check".into()))?;
        Ok(plaintext.to_vec())
    }

    fn certify_creation(&self, parent: KeyHandle, blob: &SealedBlob) -> Result<()> {
        let state = self.state()?;
        let key = state.key(parent)?;
        hmac::verify(
            &self.proof,
            &Self::ticket_message(&key.name, blob),
            &blob.creation_ticket,
        )
        .map_err(|_| SealError::Authorization("creation ticket does not verify".into()))
    }
}
