//! Authenticated messaging over an untrusted relay

use super::Relay;
use crate::identity::{AuthKey, IdentityKey};
use crate::types::{IdentityHash, SessionId};
use crate::{Error, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

/// How long a round waits for its peers by default
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const ENVELOPE_DOMAIN: &[u8] = b"frost-envelope-v1";

/// A protocol message signed by its sender
///
/// The signature covers the session, round, sender and recipient, so an
/// envelope cannot be replayed into another session or redirected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub from: IdentityHash,
    /// `None` for broadcasts
    pub to: Option<IdentityHash>,
    pub round: u32,
    /// JSON payload, hex encoded
    pub payload: String,
    pub signature: String,
}

fn signed_bytes(
    session_id: &SessionId,
    round: u32,
    from: &IdentityHash,
    to: Option<&IdentityHash>,
    payload: &[u8],
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ENVELOPE_DOMAIN.len() + 32 * 3 + 5 + payload.len());
    bytes.extend_from_slice(ENVELOPE_DOMAIN);
    bytes.extend_from_slice(session_id);
    bytes.extend_from_slice(&round.to_be_bytes());
    bytes.extend_from_slice(from.as_bytes());
    match to {
        Some(to) => {
            bytes.push(1);
            bytes.extend_from_slice(to.as_bytes());
        }
        None => bytes.push(0),
    }
    bytes.extend_from_slice(payload);
    bytes
}

impl Envelope {
    /// Serialize and sign `message`
    pub fn seal<A: AuthKey, T: Serialize>(
        auth: &A,
        session_id: &SessionId,
        round: u32,
        to: Option<IdentityHash>,
        message: &T,
    ) -> Result<Self> {
        let from = auth.hash();
        let payload = serde_json::to_vec(message)?;
        let signature = auth.sign(&signed_bytes(session_id, round, &from, to.as_ref(), &payload));
        Ok(Self {
            from,
            to,
            round,
            payload: hex::encode(payload),
            signature: hex::encode(signature),
        })
    }

    /// Check the envelope against the sender's key and the expected context
    pub fn open<K: IdentityKey, T: DeserializeOwned>(
        &self,
        sender: &K,
        session_id: &SessionId,
        round: u32,
        to: Option<&IdentityHash>,
    ) -> Result<T> {
        if sender.hash() != self.from {
            return Err(Error::VerificationFailed("envelope sender mismatch".into()));
        }
        if self.round != round || self.to.as_ref() != to {
            return Err(Error::VerificationFailed(format!(
                "envelope from {:?} is addressed to another round or recipient",
                self.from
            )));
        }
        let payload =
            hex::decode(&self.payload).map_err(|e| Error::Deserialization(e.to_string()))?;
        let signature =
            hex::decode(&self.signature).map_err(|e| Error::Deserialization(e.to_string()))?;
        sender.verify(
            &signed_bytes(session_id, round, &self.from, to, &payload),
            &signature,
        )?;
        serde_json::from_slice(&payload).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// One party's authenticated view of a relay within a session
pub struct Channel<'a, A: AuthKey, K: IdentityKey, R: Relay> {
    auth: &'a A,
    me: IdentityHash,
    peers: BTreeMap<IdentityHash, &'a K>,
    relay: &'a R,
    session_id: SessionId,
    timeout: Duration,
}

impl<'a, A: AuthKey, K: IdentityKey, R: Relay> Channel<'a, A, K, R> {
    /// `peers` holds the identity keys of everyone this party may hear from
    pub fn new(auth: &'a A, peers: &'a [K], relay: &'a R, session_id: SessionId) -> Self {
        Self {
            auth,
            me: auth.hash(),
            peers: peers.iter().map(|key| (key.hash(), key)).collect(),
            relay,
            session_id,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn me(&self) -> &IdentityHash {
        &self.me
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn broadcast<T: Serialize + Sync>(&self, round: u32, message: &T) -> Result<()> {
        let envelope = Envelope::seal(self.auth, &self.session_id, round, None, message)?;
        self.relay.broadcast(&self.session_id, round, &envelope).await
    }

    pub async fn send_direct<T: Serialize + Sync>(
        &self,
        round: u32,
        to: &IdentityHash,
        message: &T,
    ) -> Result<()> {
        let envelope = Envelope::seal(self.auth, &self.session_id, round, Some(*to), message)?;
        self.relay.send_direct(&self.session_id, round, to, &envelope).await
    }

    /// Wait for the round's broadcasts from every party in `senders`
    ///
    /// `senders` may include this party; its own broadcast is dropped.
    pub async fn collect_broadcasts<T: DeserializeOwned>(
        &self,
        round: u32,
        senders: &[IdentityHash],
    ) -> Result<HashMap<IdentityHash, T>> {
        let envelopes: Vec<Envelope> = tokio::time::timeout(
            self.timeout,
            self.relay
                .collect_broadcasts::<Envelope>(&self.session_id, round, senders.len()),
        )
        .await
        .map_err(|_| Error::Timeout(format!("round {} broadcasts", round)))??;

        self.open_all(round, None, senders, envelopes)
            .map(|mut messages| {
                messages.remove(&self.me);
                messages
            })
    }

    /// Wait for one direct message from every party in `senders`
    pub async fn collect_direct<T: DeserializeOwned>(
        &self,
        round: u32,
        senders: &[IdentityHash],
    ) -> Result<HashMap<IdentityHash, T>> {
        let envelopes: Vec<Envelope> = tokio::time::timeout(
            self.timeout,
            self.relay
                .collect_direct::<Envelope>(&self.session_id, round, &self.me, senders.len()),
        )
        .await
        .map_err(|_| Error::Timeout(format!("round {} direct messages", round)))??;

        self.open_all(round, Some(&self.me), senders, envelopes)
    }

    fn open_all<T: DeserializeOwned>(
        &self,
        round: u32,
        to: Option<&IdentityHash>,
        senders: &[IdentityHash],
        envelopes: Vec<Envelope>,
    ) -> Result<HashMap<IdentityHash, T>> {
        let mut messages = HashMap::with_capacity(envelopes.len());
        for envelope in envelopes {
            if !senders.contains(&envelope.from) {
                warn!(from = ?envelope.from, round, "unexpected sender");
                return Err(Error::Relay(format!(
                    "unexpected message from {:?} in round {}",
                    envelope.from, round
                )));
            }
            let key = self
                .peers
                .get(&envelope.from)
                .ok_or_else(|| Error::Missing(format!("identity key of {:?}", envelope.from)))?;
            let message = envelope.open(*key, &self.session_id, round, to)?;
            if messages.insert(envelope.from, message).is_some() {
                return Err(Error::Relay(format!(
                    "duplicate message from {:?} in round {}",
                    envelope.from, round
                )));
            }
        }
        debug!(round, count = messages.len(), "collected messages");
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{Ed25519AuthKey, Ed25519IdentityKey};
    use crate::mpc::MemoryRelay;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping(u32);

    fn keys(n: usize) -> (Vec<Ed25519AuthKey>, Vec<Ed25519IdentityKey>) {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let auth: Vec<Ed25519AuthKey> = (0..n).map(|_| Ed25519AuthKey::generate(&mut rng)).collect();
        let public = auth.iter().map(|k| k.identity_key()).collect();
        (auth, public)
    }

    #[test]
    fn test_envelope_binds_context() {
        let (auth, public) = keys(2);
        let session = [1u8; 32];
        let to = public[1].hash();
        let envelope = Envelope::seal(&auth[0], &session, 3, Some(to), &Ping(9)).unwrap();

        let ping: Ping = envelope.open(&public[0], &session, 3, Some(&to)).unwrap();
        assert_eq!(ping, Ping(9));

        assert!(envelope.open::<_, Ping>(&public[0], &[2u8; 32], 3, Some(&to)).is_err());
        assert!(envelope.open::<_, Ping>(&public[0], &session, 4, Some(&to)).is_err());
        assert!(envelope.open::<_, Ping>(&public[0], &session, 3, None).is_err());
        assert!(envelope.open::<_, Ping>(&public[1], &session, 3, Some(&to)).is_err());

        let mut forged = envelope.clone();
        forged.payload = hex::encode(serde_json::to_vec(&Ping(10)).unwrap());
        assert!(forged.open::<_, Ping>(&public[0], &session, 3, Some(&to)).is_err());
    }

    #[tokio::test]
    async fn test_broadcast_round_trip() {
        let (auth, public) = keys(3);
        let relay = MemoryRelay::new();
        let session = [2u8; 32];
        let everyone: Vec<IdentityHash> = public.iter().map(|k| k.hash()).collect();

        for (i, key) in auth.iter().enumerate() {
            Channel::new(key, &public, &relay, session)
                .broadcast(1, &Ping(i as u32))
                .await
                .unwrap();
        }

        let channel = Channel::new(&auth[0], &public, &relay, session);
        let received: HashMap<IdentityHash, Ping> =
            channel.collect_broadcasts(1, &everyone).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[&everyone[2]], Ping(2));
        assert!(!received.contains_key(channel.me()));
    }

    #[tokio::test]
    async fn test_missing_peer_times_out() {
        let (auth, public) = keys(2);
        let relay = MemoryRelay::new();
        let channel = Channel::new(&auth[0], &public, &relay, [3u8; 32])
            .with_timeout(Duration::from_millis(50));

        let result: Result<HashMap<IdentityHash, Ping>> =
            channel.collect_direct(1, &[public[1].hash()]).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }
}
