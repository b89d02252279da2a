//! Helpers for running whole protocols in-process

use crate::curves::Ciphersuite;
use crate::identity::{Ed25519AuthKey, Ed25519IdentityKey, IdentityKey};
use crate::keygen::{run_dkg, DkgRound1Broadcast, DkgRound1P2P, Participant};
use crate::mpc::MemoryRelay;
use crate::sign::{
    InteractiveCosigner, PreGenParticipant, PreGenRound1Broadcast, PreSignatureBatch, PrivateNoncePairs,
    SignRound1Broadcast,
};
use crate::types::{
    CohortConfig, IdentityHash, PartialSignature, PublicKeyShares, SessionId, Shard, Signature, SigningKeyShare,
};
use crate::Result;
use rand::rngs::OsRng;
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) type DkgOutput<C> = (SigningKeyShare<C>, PublicKeyShares<C>);

/// All `k`-element subsets of `0..n`, in lexicographic order
pub(crate) fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    fn extend(start: usize, n: usize, k: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if current.len() == k {
            out.push(current.clone());
            return;
        }
        for i in start..n {
            current.push(i);
            extend(i + 1, n, k, current, out);
            current.pop();
        }
    }

    let mut out = Vec::new();
    extend(0, n, k, &mut Vec::with_capacity(k), &mut out);
    out
}

/// `n` fresh identities, sorted the way the cohort assigns sharing ids
pub(crate) fn identities(n: usize, rng: &mut ChaCha20Rng) -> Vec<Ed25519AuthKey> {
    let mut keys: Vec<Ed25519AuthKey> = (0..n).map(|_| Ed25519AuthKey::generate(rng)).collect();
    keys.sort_by_key(|key| key.hash());
    keys
}

/// Cohort in which every member may aggregate
pub(crate) fn cohort_of<C: Ciphersuite>(threshold: usize, keys: &[Ed25519AuthKey]) -> CohortConfig<C> {
    CohortConfig::new(threshold, keys, keys).unwrap()
}

/// Run the DKG for every member, outputs in sharing id order
pub(crate) fn run_dkg_rounds<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    session_id: SessionId,
    rng: &mut ChaCha20Rng,
) -> Result<Vec<DkgOutput<C>>> {
    let mut participants = cohort
        .participants()
        .iter()
        .map(|identity| Participant::new(*identity, cohort.clone(), session_id))
        .collect::<Result<Vec<Participant<C>>>>()?;
    run_participants(&mut participants, rng)
}

pub(crate) fn run_participants<C: Ciphersuite>(
    participants: &mut [Participant<C>],
    rng: &mut ChaCha20Rng,
) -> Result<Vec<DkgOutput<C>>> {
    let mut broadcasts: HashMap<IdentityHash, DkgRound1Broadcast<C>> = HashMap::new();
    let mut inboxes: HashMap<IdentityHash, HashMap<IdentityHash, DkgRound1P2P<C>>> = HashMap::new();
    for participant in participants.iter_mut() {
        let sender = *participant.identity();
        let (broadcast, p2p) = participant.round1(rng)?;
        broadcasts.insert(sender, broadcast);
        for (recipient, message) in p2p {
            inboxes.entry(recipient).or_default().insert(sender, message);
        }
    }

    participants
        .iter_mut()
        .map(|participant| {
            let me = *participant.identity();
            let received: HashMap<IdentityHash, DkgRound1Broadcast<C>> = broadcasts
                .iter()
                .filter(|(sender, _)| **sender != me)
                .map(|(sender, broadcast)| (*sender, broadcast.clone()))
                .collect();
            participant.round2(&received, inboxes.remove(&me).unwrap_or_default())
        })
        .collect()
}

/// DKG output packaged as shards, in sharing id order
pub(crate) fn shards<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    session_id: SessionId,
    rng: &mut ChaCha20Rng,
) -> Vec<Shard<C>> {
    run_dkg_rounds(cohort, session_id, rng)
        .unwrap()
        .into_iter()
        .map(|(signing_key_share, public_key_shares)| Shard {
            signing_key_share,
            public_key_shares,
        })
        .collect()
}

pub(crate) fn public_keys(keys: &[Ed25519AuthKey]) -> Arc<Vec<Ed25519IdentityKey>> {
    Arc::new(keys.iter().map(|k| k.identity_key()).collect())
}

/// Every member runs [`run_dkg`] as its own task; shards in sharing id order
pub(crate) async fn dkg_over_relay<C: Ciphersuite>(
    keys: &[Ed25519AuthKey],
    cohort: &CohortConfig<C>,
    relay: &MemoryRelay,
    session_id: SessionId,
) -> Vec<Shard<C>> {
    let peers = public_keys(keys);
    let tasks: Vec<_> = keys
        .iter()
        .cloned()
        .map(|key| {
            let peers = Arc::clone(&peers);
            let cohort = cohort.clone();
            let relay = relay.clone();
            tokio::spawn(async move { run_dkg(&key, &peers, &cohort, session_id, &relay, &mut OsRng).await })
        })
        .collect();

    let mut shards = Vec::with_capacity(tasks.len());
    for task in tasks {
        shards.push(task.await.unwrap().unwrap());
    }
    shards
}

/// Interactive signing by the members at `signers` (indices in sharing id
/// order); returns the signature produced by each aggregator among them
pub(crate) fn sign_interactive<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    shards: &[Shard<C>],
    signers: &[usize],
    message: &[u8],
    rng: &mut ChaCha20Rng,
) -> Result<Vec<Signature<C>>> {
    let members: Vec<IdentityHash> = signers.iter().map(|&i| cohort.participants()[i]).collect();
    let mut cosigners = signers
        .iter()
        .map(|&i| InteractiveCosigner::new(cohort.participants()[i], cohort.clone(), shards[i].clone(), &members))
        .collect::<Result<Vec<InteractiveCosigner<C>>>>()?;

    let mut round1: HashMap<IdentityHash, SignRound1Broadcast<C>> = HashMap::new();
    for (cosigner, identity) in cosigners.iter_mut().zip(&members) {
        round1.insert(*identity, cosigner.round1(rng)?);
    }

    let mut partials: HashMap<IdentityHash, PartialSignature<C>> = HashMap::new();
    for (cosigner, identity) in cosigners.iter_mut().zip(&members) {
        let received = round1
            .iter()
            .filter(|(sender, _)| *sender != identity)
            .map(|(sender, commitment)| (*sender, *commitment))
            .collect();
        partials.insert(*identity, cosigner.round2(&received, message)?);
    }

    cosigners
        .iter_mut()
        .filter(|cosigner| cosigner.is_signature_aggregator())
        .map(|cosigner| cosigner.aggregate(message, &partials))
        .collect()
}

/// Nonce preprocessing for the whole cohort, outputs in sharing id order
pub(crate) fn pregen<C: Ciphersuite>(
    cohort: &CohortConfig<C>,
    tau: usize,
    rng: &mut ChaCha20Rng,
) -> Result<(Vec<PreSignatureBatch<C>>, Vec<PrivateNoncePairs<C>>)> {
    let mut participants = cohort
        .participants()
        .iter()
        .map(|identity| PreGenParticipant::new(*identity, cohort.clone(), tau))
        .collect::<Result<Vec<PreGenParticipant<C>>>>()?;

    let mut broadcasts: HashMap<IdentityHash, PreGenRound1Broadcast<C>> = HashMap::new();
    for (participant, identity) in participants.iter_mut().zip(cohort.participants()) {
        broadcasts.insert(*identity, participant.round1(rng)?);
    }

    let mut batches = Vec::with_capacity(participants.len());
    let mut nonces = Vec::with_capacity(participants.len());
    for participant in participants.iter_mut() {
        let (batch, pairs) = participant.round2(&broadcasts)?;
        batches.push(batch);
        nonces.push(pairs);
    }
    Ok((batches, nonces))
}

#[test]
fn test_subsets() {
    assert_eq!(subsets(4, 2).len(), 6);
    assert_eq!(subsets(3, 3), vec![vec![0, 1, 2]]);
    assert_eq!(subsets(3, 1), vec![vec![0], vec![1], vec![2]]);
}
