//! Persistent state behind the operations.
//!
//! The [`Ledger`] trait is what handlers talk to; [`MemoryLedger`] is the
//! in-process implementation. Read-then-write transitions
//! ([`Ledger::redeem_drop`], [`Ledger::submit_proof`]) are atomic per entity.
//! A fresh ledger is empty; demo nodes are seeded by the bootstrap.

mod memory;

use std::fmt;
use std::str::FromStr;

use rand::RngExt;
use rand::rng;
use serde::{Deserialize, Serialize};
use shadowgate::timestamp::EpochMillis;
use shadowgate::{MinorUnits, OperationError};

use crate::engine::AiModel;

pub use memory::MemoryLedger;

/// Overlay network a proxy node routes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyNetwork {
    /// The Tor network.
    Tor,
    /// The I2P network.
    I2p,
    /// Plain internet.
    Clearnet,
}

impl ProxyNetwork {
    /// All networks.
    pub const ALL: [Self; 3] = [Self::Tor, Self::I2p, Self::Clearnet];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tor => "tor",
            Self::I2p => "i2p",
            Self::Clearnet => "clearnet",
        }
    }
}

impl fmt::Display for ProxyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown proxy network `{s}`"))
    }
}

/// A relay or exit in the proxy network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyNode {
    /// Opaque id.
    pub id: String,
    /// Onion, I2P or clearnet address.
    pub address: String,
    /// Overlay network.
    pub network: ProxyNetwork,
    /// Trust score in `0.0..=1.0`.
    pub reputation: f64,
    /// Bytes relayed over the node's lifetime.
    pub total_bytes: u64,
    /// Sessions opened through the node.
    pub total_sessions: u64,
    /// Lifetime earnings in dollars.
    pub earnings: f64,
    /// Coarse location.
    pub region: Option<String>,
    /// Advertised features, such as `streaming`.
    pub capabilities: Vec<String>,
    /// Last time the node checked in.
    pub last_seen: EpochMillis,
}

/// A paid streaming session through one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxySession {
    /// Opaque id.
    pub id: String,
    /// Node carrying the session.
    pub node_id: String,
    /// Paying identity.
    pub user_id: String,
    /// Price paid.
    pub cost: MinorUnits,
    /// Bytes relayed so far.
    pub bytes_transferred: u64,
    /// Creation time.
    pub created_at: EpochMillis,
    /// Expiry time.
    pub expires_at: EpochMillis,
}

/// Descriptive data stored with a dead drop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropMetadata {
    /// Payload length in bytes.
    pub size: u64,
    /// MIME type of the decrypted payload.
    pub mime_type: String,
    /// Free-form description.
    pub description: String,
    /// Search tags.
    pub tags: Vec<String>,
}

/// An encrypted payload sold per download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadDrop {
    /// Opaque id.
    pub id: String,
    /// Ciphertext, opaque to the server.
    pub encrypted_data: String,
    /// Asking price set by the creator.
    pub price: MinorUnits,
    /// Identity that paid to create it.
    pub creator: String,
    /// Creation time.
    pub created_at: EpochMillis,
    /// Expiry time.
    pub expires_at: EpochMillis,
    /// Downloads consumed.
    pub downloads: u64,
    /// Download cap.
    pub max_downloads: u64,
    /// Descriptive data.
    pub metadata: DropMetadata,
}

impl DeadDrop {
    /// Whether the drop has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: EpochMillis) -> bool {
        self.expires_at <= now
    }

    /// Whether every download has been used.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.downloads >= self.max_downloads
    }
}

/// Lifecycle of a bounty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    #[default]
    /// Accepting submissions.
    Open,
    /// Someone is working on it.
    Claimed,
    /// Reward paid out.
    Completed,
    /// Past its deadline.
    Expired,
}

impl BountyStatus {
    /// All statuses.
    pub const ALL: [Self; 4] = [Self::Open, Self::Claimed, Self::Completed, Self::Expired];

    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BountyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown bounty status `{s}`"))
    }
}

/// A task with a reward for whoever proves completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounty {
    /// Opaque id.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Reward offered, in USDC minor units.
    pub reward: MinorUnits,
    /// Identity that paid to create it.
    pub creator: String,
    /// Creation time.
    pub created_at: EpochMillis,
    /// Expiry time.
    pub expires_at: EpochMillis,
    /// Lifecycle state.
    pub status: BountyStatus,
    /// What a submission must demonstrate.
    pub proof_required: String,
}

impl Bounty {
    /// Whether the bounty has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: EpochMillis) -> bool {
        self.expires_at <= now
    }
}

/// Review state of a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    #[default]
    /// Awaiting review.
    Pending,
    /// Accepted; bounty completed.
    Approved,
    /// Turned down.
    Rejected,
}

/// A claim of completion against a bounty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountySubmission {
    /// Opaque id.
    pub id: String,
    /// Bounty the submission is for.
    pub bounty_id: String,
    /// Identity claiming the reward.
    pub submitter: String,
    /// Evidence of completion.
    pub proof: String,
    /// Submission time.
    pub submitted_at: EpochMillis,
    /// Review state.
    pub status: SubmissionStatus,
}

/// A bounty together with how many submissions it has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BountyListing {
    /// The bounty.
    pub bounty: Bounty,
    /// Number of submissions recorded.
    pub submissions: usize,
}

/// A recorded AI deck query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiQuery {
    /// Opaque id.
    pub id: String,
    /// Query text.
    pub query: String,
    /// Model asked.
    pub model: AiModel,
    /// Token budget.
    pub max_tokens: u32,
    /// Paying identity.
    pub user_id: String,
    /// Price paid.
    pub cost: MinorUnits,
    /// Reply text.
    pub response: String,
    /// When the query was answered.
    pub timestamp: EpochMillis,
}

/// Which nodes [`Ledger::nodes`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeFilter {
    /// Only nodes on this network.
    pub network: Option<ProxyNetwork>,
    /// Only nodes with at least this reputation.
    pub min_reputation: f64,
}

/// A ledger state transition was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// No drop with that id.
    #[error("Dead drop not found")]
    DropNotFound,
    /// The drop is past its expiry.
    #[error("Dead drop expired")]
    DropExpired,
    /// Every download has been used.
    #[error("Maximum downloads reached")]
    DropExhausted,
    /// No bounty with that id.
    #[error("Bounty not found")]
    BountyNotFound,
    /// The bounty no longer accepts submissions.
    #[error("Bounty is {0}")]
    BountyNotOpen(BountyStatus),
    /// The bounty is past its deadline.
    #[error("Bounty has expired")]
    BountyExpired,
    /// The node disappeared.
    #[error("Proxy node `{0}` not found")]
    NodeNotFound(String),
}

impl From<LedgerError> for OperationError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::DropNotFound | LedgerError::BountyNotFound => Self::NotFound(message),
            LedgerError::DropExpired | LedgerError::DropExhausted | LedgerError::BountyExpired => {
                Self::Gone(message)
            }
            LedgerError::BountyNotOpen(_) => Self::InvalidState(message),
            LedgerError::NodeNotFound(_) => Self::Unavailable(message),
        }
    }
}

/// Storage for nodes, sessions, drops, bounties and queries.
///
/// Listing methods take `now` so expiry is decided by the caller's clock.
pub trait Ledger: Send + Sync {
    /// Inserts or replaces a node.
    fn upsert_node(&self, node: ProxyNode);

    /// The node with `id`.
    fn node(&self, id: &str) -> Option<ProxyNode>;

    /// Nodes matching `filter`, highest reputation first, then most sessions.
    fn nodes(&self, filter: NodeFilter) -> Vec<ProxyNode>;

    /// Records a session and counts it against its node.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NodeNotFound`] if the node is gone.
    fn open_session(&self, session: ProxySession) -> Result<(), LedgerError>;

    /// The session with `id`.
    fn session(&self, id: &str) -> Option<ProxySession>;

    /// Stores a new drop.
    fn create_drop(&self, drop: DeadDrop);

    /// The drop with `id`.
    fn drop_by_id(&self, id: &str) -> Option<DeadDrop>;

    /// Consumes one download of the drop and returns it as updated.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DropNotFound`], [`LedgerError::DropExpired`] or
    /// [`LedgerError::DropExhausted`]; the download count is left unchanged.
    fn redeem_drop(&self, id: &str, now: EpochMillis) -> Result<DeadDrop, LedgerError>;

    /// Drops neither expired nor exhausted, newest first.
    fn active_drops(&self, now: EpochMillis, limit: usize) -> Vec<DeadDrop>;

    /// Stores a new bounty.
    fn create_bounty(&self, bounty: Bounty);

    /// The bounty with `id`.
    fn bounty(&self, id: &str) -> Option<Bounty>;

    /// Records a submission against an open, unexpired bounty.
    ///
    /// # Errors
    ///
    /// [`LedgerError::BountyNotFound`], [`LedgerError::BountyNotOpen`] or
    /// [`LedgerError::BountyExpired`].
    fn submit_proof(
        &self,
        submission: BountySubmission,
        now: EpochMillis,
    ) -> Result<BountySubmission, LedgerError>;

    /// Submissions for a bounty, newest first.
    fn submissions(&self, bounty_id: &str) -> Vec<BountySubmission>;

    /// Unexpired bounties, optionally with one status, newest first.
    fn bounties(
        &self,
        now: EpochMillis,
        status: Option<BountyStatus>,
        limit: usize,
    ) -> Vec<BountyListing>;

    /// Stores a query record.
    fn record_query(&self, query: AiQuery);

    /// A user's queries, newest first.
    fn queries_by_user(&self, user_id: &str, limit: usize) -> Vec<AiQuery>;
}

/// A fresh id: `{prefix}_{millis}_{random hex}`.
#[must_use]
pub fn new_id(prefix: &str, now: EpochMillis) -> String {
    let suffix: u32 = rng().random();
    format!("{prefix}_{now}_{suffix:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id_shape() {
        let id = new_id("drop", EpochMillis::from_millis(42));
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts[0], "drop");
        assert_eq!(parts[1], "42");
        assert_eq!(parts[2].len(), 8);
        assert_ne!(id, new_id("drop", EpochMillis::from_millis(42)));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            OperationError::from(LedgerError::DropExhausted),
            OperationError::Gone("Maximum downloads reached".into())
        );
        assert_eq!(
            OperationError::from(LedgerError::BountyNotOpen(BountyStatus::Claimed)),
            OperationError::InvalidState("Bounty is claimed".into())
        );
        assert_eq!(
            OperationError::from(LedgerError::BountyNotFound),
            OperationError::NotFound("Bounty not found".into())
        );
    }

    #[test]
    fn test_enum_names() {
        assert_eq!("i2p".parse::<ProxyNetwork>().unwrap(), ProxyNetwork::I2p);
        assert_eq!("claimed".parse::<BountyStatus>().unwrap(), BountyStatus::Claimed);
        assert!("lost".parse::<BountyStatus>().is_err());
    }
}
