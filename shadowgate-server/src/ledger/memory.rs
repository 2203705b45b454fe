//! In-process [`Ledger`] backed by [`DashMap`].
//!
//! Each entity lives in its own map. Transitions that read then write go
//! through `get_mut`, which holds the entry's shard lock for the duration,
//! so two concurrent redemptions of the last download cannot both succeed.

use std::cmp::Reverse;

use dashmap::DashMap;
use shadowgate::timestamp::EpochMillis;

use super::{
    AiQuery, Bounty, BountyListing, BountyStatus, BountySubmission, DeadDrop, Ledger,
    LedgerError, NodeFilter, ProxyNode, ProxySession,
};

#[derive(Debug, Clone)]
struct BountyEntry {
    bounty: Bounty,
    submissions: Vec<BountySubmission>,
}

/// Ledger held entirely in memory. State is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    nodes: DashMap<String, ProxyNode>,
    sessions: DashMap<String, ProxySession>,
    drops: DashMap<String, DeadDrop>,
    bounties: DashMap<String, BountyEntry>,
    queries: DashMap<String, AiQuery>,
}

impl MemoryLedger {
    /// An empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ledger for MemoryLedger {
    fn upsert_node(&self, node: ProxyNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    fn node(&self, id: &str) -> Option<ProxyNode> {
        self.nodes.get(id).map(|n| n.clone())
    }

    fn nodes(&self, filter: NodeFilter) -> Vec<ProxyNode> {
        let mut nodes: Vec<ProxyNode> = self
            .nodes
            .iter()
            .filter(|n| n.reputation >= filter.min_reputation)
            .filter(|n| filter.network.is_none_or(|network| n.network == network))
            .map(|n| n.clone())
            .collect();
        nodes.sort_by(|a, b| {
            b.reputation
                .total_cmp(&a.reputation)
                .then_with(|| b.total_sessions.cmp(&a.total_sessions))
                .then_with(|| a.id.cmp(&b.id))
        });
        nodes
    }

    fn open_session(&self, session: ProxySession) -> Result<(), LedgerError> {
        {
            let mut node = self
                .nodes
                .get_mut(&session.node_id)
                .ok_or_else(|| LedgerError::NodeNotFound(session.node_id.clone()))?;
            node.total_sessions += 1;
            node.last_seen = session.created_at;
        }
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn session(&self, id: &str) -> Option<ProxySession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    fn create_drop(&self, drop: DeadDrop) {
        self.drops.insert(drop.id.clone(), drop);
    }

    fn drop_by_id(&self, id: &str) -> Option<DeadDrop> {
        self.drops.get(id).map(|d| d.clone())
    }

    fn redeem_drop(&self, id: &str, now: EpochMillis) -> Result<DeadDrop, LedgerError> {
        let mut drop = self.drops.get_mut(id).ok_or(LedgerError::DropNotFound)?;
        if drop.is_expired(now) {
            return Err(LedgerError::DropExpired);
        }
        if drop.is_exhausted() {
            return Err(LedgerError::DropExhausted);
        }
        drop.downloads += 1;
        Ok(drop.clone())
    }

    fn active_drops(&self, now: EpochMillis, limit: usize) -> Vec<DeadDrop> {
        let mut drops: Vec<DeadDrop> = self
            .drops
            .iter()
            .filter(|d| !d.is_expired(now) && !d.is_exhausted())
            .map(|d| d.clone())
            .collect();
        drops.sort_by_key(|d| Reverse((d.created_at, d.id.clone())));
        drops.truncate(limit);
        drops
    }

    fn create_bounty(&self, bounty: Bounty) {
        self.bounties.insert(
            bounty.id.clone(),
            BountyEntry {
                bounty,
                submissions: Vec::new(),
            },
        );
    }

    fn bounty(&self, id: &str) -> Option<Bounty> {
        self.bounties.get(id).map(|e| e.bounty.clone())
    }

    fn submit_proof(
        &self,
        submission: BountySubmission,
        now: EpochMillis,
    ) -> Result<BountySubmission, LedgerError> {
        let mut entry = self
            .bounties
            .get_mut(&submission.bounty_id)
            .ok_or(LedgerError::BountyNotFound)?;
        if entry.bounty.status != BountyStatus::Open {
            return Err(LedgerError::BountyNotOpen(entry.bounty.status));
        }
        if entry.bounty.is_expired(now) {
            return Err(LedgerError::BountyExpired);
        }
        entry.submissions.push(submission.clone());
        Ok(submission)
    }

    fn submissions(&self, bounty_id: &str) -> Vec<BountySubmission> {
        let mut submissions = self
            .bounties
            .get(bounty_id)
            .map(|e| e.submissions.clone())
            .unwrap_or_default();
        submissions.sort_by_key(|s| Reverse((s.submitted_at, s.id.clone())));
        submissions
    }

    fn bounties(
        &self,
        now: EpochMillis,
        status: Option<BountyStatus>,
        limit: usize,
    ) -> Vec<BountyListing> {
        let mut listings: Vec<BountyListing> = self
            .bounties
            .iter()
            .filter(|e| !e.bounty.is_expired(now))
            .filter(|e| status.is_none_or(|s| e.bounty.status == s))
            .map(|e| BountyListing {
                bounty: e.bounty.clone(),
                submissions: e.submissions.len(),
            })
            .collect();
        listings.sort_by_key(|l| Reverse((l.bounty.created_at, l.bounty.id.clone())));
        listings.truncate(limit);
        listings
    }

    fn record_query(&self, query: AiQuery) {
        self.queries.insert(query.id.clone(), query);
    }

    fn queries_by_user(&self, user_id: &str, limit: usize) -> Vec<AiQuery> {
        let mut queries: Vec<AiQuery> = self
            .queries
            .iter()
            .filter(|q| q.user_id == user_id)
            .map(|q| q.clone())
            .collect();
        queries.sort_by_key(|q| Reverse((q.timestamp, q.id.clone())));
        queries.truncate(limit);
        queries
    }
}
