//! Bounties and proof submissions.

use std::sync::Arc;

use serde_json::json;
use shadowgate::timestamp::EpochMillis;
use shadowgate::{
    FieldSpec, FieldType, InputContract, MinorUnits, OperationResult, OutputContract, PriceEntry,
};
use shadowgate_http::server::Operation;

use super::{Services, hours_field, identity, immediate, limit_field, money, money_field};
use crate::ledger::{Bounty, BountyStatus, BountySubmission, SubmissionStatus, new_id};

/// Key of the bounty posting operation.
pub const POST_BOUNTY: &str = "post-bounty";
/// Key of the proof submission operation.
pub const SUBMIT_BOUNTY_PROOF: &str = "submit-bounty-proof";
/// Key of the bounty listing operation.
pub const LIST_BOUNTIES: &str = "list-bounties";

const DEFAULT_REWARD: MinorUnits = MinorUnits::new(100_000_000);
const DEFAULT_BOUNTY_HOURS: f64 = 168.0;
const DEFAULT_PROOF_REQUIRED: &str = "Proof of completion";
const MAX_LISTED_BOUNTIES: usize = 50;

/// `post-bounty`: opens a bounty with a reward.
pub fn post_bounty(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let reward = money_field(ctx, "reward", DEFAULT_REWARD)?;
        let lifetime = hours_field(ctx, "expiresInHours", DEFAULT_BOUNTY_HOURS)?;
        let now = EpochMillis::now();
        let bounty = Bounty {
            id: new_id("bounty", now),
            title: ctx.str_field("title").unwrap_or_default().to_owned(),
            description: ctx.str_field("description").unwrap_or_default().to_owned(),
            reward,
            creator: ctx.payer_or_anon().to_owned(),
            created_at: now,
            expires_at: now + lifetime,
            status: BountyStatus::Open,
            proof_required: ctx
                .str_field("proofRequired")
                .unwrap_or(DEFAULT_PROOF_REQUIRED)
                .to_owned(),
        };
        let output = json!({
            "bountyId": bounty.id,
            "title": bounty.title,
            "description": bounty.description,
            "reward": money(bounty.reward),
            "proofRequired": bounty.proof_required,
            "expiresAt": bounty.expires_at,
            "message": "Bounty posted. Netrunners are mobilizing...",
        });
        services.ledger.create_bounty(bounty);
        Ok(OperationResult::applied(output))
    })
    .with_input(
        InputContract::new()
            .field("title", FieldSpec::string().required())
            .field("description", FieldSpec::string())
            .field(
                "reward",
                FieldSpec::number().describe("Reward in dollars, default 100"),
            )
            .field(
                "expiresInHours",
                FieldSpec::number().describe("Lifetime in hours, default 168"),
            )
            .field("proofRequired", FieldSpec::string()),
    )
    .with_output(
        OutputContract::new()
            .field("bountyId", FieldType::String)
            .field("title", FieldType::String)
            .field("reward", FieldType::String)
            .field("expiresAt", FieldType::Integer),
    )
}

/// `submit-bounty-proof`: records a pending submission on an open bounty.
pub fn submit_bounty_proof(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let now = EpochMillis::now();
        let submission = BountySubmission {
            id: new_id("sub", now),
            bounty_id: ctx.str_field("bountyId").unwrap_or_default().to_owned(),
            submitter: identity(ctx, "submitterAddress"),
            proof: ctx.str_field("proof").unwrap_or_default().to_owned(),
            submitted_at: now,
            status: SubmissionStatus::Pending,
        };
        let submission = services.ledger.submit_proof(submission, now)?;
        Ok(OperationResult::applied(json!({
            "submissionId": submission.id,
            "bountyId": submission.bounty_id,
            "status": submission.status,
            "message": "Proof submitted. Awaiting verification...",
        })))
    })
    .with_input(
        InputContract::new()
            .field("bountyId", FieldSpec::string().required())
            .field("proof", FieldSpec::string())
            .field(
                "submitterAddress",
                FieldSpec::string().describe("Payout address, default the payer"),
            ),
    )
    .with_output(
        OutputContract::new()
            .field("submissionId", FieldType::String)
            .field("bountyId", FieldType::String)
            .field("status", FieldType::String),
    )
}

/// `list-bounties`: unexpired bounties with their submission counts.
pub fn list_bounties(price: PriceEntry, services: &Arc<Services>) -> Operation {
    immediate(price, services, |services, ctx| {
        let status = ctx.str_field("status").and_then(|s| s.parse().ok());
        let limit = limit_field(ctx, MAX_LISTED_BOUNTIES, MAX_LISTED_BOUNTIES);
        let bounties: Vec<_> = services
            .ledger
            .bounties(EpochMillis::now(), status, limit)
            .into_iter()
            .map(|listing| {
                let b = listing.bounty;
                json!({
                    "bountyId": b.id,
                    "title": b.title,
                    "description": b.description,
                    "reward": money(b.reward),
                    "status": b.status,
                    "expiresAt": b.expires_at,
                    "submissions": listing.submissions,
                })
            })
            .collect();
        Ok(OperationResult::read_only(json!({
            "total": bounties.len(),
            "message": format!("Found {} bounties.", bounties.len()),
            "bounties": bounties,
        })))
    })
    .with_input(
        InputContract::new()
            .field(
                "status",
                FieldSpec::string().one_of(BountyStatus::ALL.map(BountyStatus::as_str)),
            )
            .field("limit", FieldSpec::integer().describe("Page size, at most 50")),
    )
    .with_output(
        OutputContract::new()
            .field("bounties", FieldType::Array)
            .field("total", FieldType::Integer),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shadowgate::timestamp::EpochMillis;
    use shadowgate::{MinorUnits, OperationError};
    use shadowgate_http::server::DispatchError;

    use crate::ledger::{Bounty, BountyStatus, Ledger};
    use crate::operations::testing::harness;

    fn stored(id: &str, created: u64, expires_at: EpochMillis, status: BountyStatus) -> Bounty {
        Bounty {
            id: id.into(),
            title: id.into(),
            description: String::new(),
            reward: MinorUnits::new(1_000_000),
            creator: "anon".into(),
            created_at: EpochMillis::from_millis(created),
            expires_at,
            status,
            proof_required: "Proof".into(),
        }
    }

    fn far_future() -> EpochMillis {
        EpochMillis::from_millis(u64::MAX)
    }

    #[tokio::test]
    async fn test_post_and_submit() {
        let h = harness();
        let posted = h
            .call("post-bounty", json!({ "title": "Find the leak" }))
            .await
            .unwrap();
        assert_eq!(posted["reward"], "$100.00");
        assert_eq!(posted["proofRequired"], "Proof of completion");
        let bounty_id = posted["bountyId"].as_str().unwrap().to_owned();
        assert_eq!(h.ledger.bounty(&bounty_id).unwrap().creator, "0xpayer");

        let submitted = h
            .call(
                "submit-bounty-proof",
                json!({ "bountyId": bounty_id, "proof": "ipfs://Qm..." }),
            )
            .await
            .unwrap();
        assert_eq!(submitted["status"], "pending");
        let submissions = h.ledger.submissions(&bounty_id);
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].submitter, "0xpayer");
        assert_eq!(submissions[0].proof, "ipfs://Qm...");
    }

    #[tokio::test]
    async fn test_submit_to_claimed_bounty_is_invalid_state() {
        let h = harness();
        h.ledger
            .create_bounty(stored("taken", 0, far_future(), BountyStatus::Claimed));
        let err = h
            .call("submit-bounty-proof", json!({ "bountyId": "taken" }))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Operation(OperationError::InvalidState(ref m)) if m == "Bounty is claimed"
        ));
        assert!(h.ledger.submissions("taken").is_empty());
    }

    #[tokio::test]
    async fn test_submit_to_expired_or_missing_bounty() {
        let h = harness();
        h.ledger.create_bounty(stored(
            "late",
            0,
            EpochMillis::from_millis(1),
            BountyStatus::Open,
        ));
        let err = h
            .call("submit-bounty-proof", json!({ "bountyId": "late" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Operation(OperationError::Gone(_))));

        let err = h
            .call("submit-bounty-proof", json!({ "bountyId": "ghost" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Operation(OperationError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_submitter_address_overrides_payer() {
        let h = harness();
        h.ledger
            .create_bounty(stored("open", 0, far_future(), BountyStatus::Open));
        h.call(
            "submit-bounty-proof",
            json!({ "bountyId": "open", "submitterAddress": "0xhunter" }),
        )
        .await
        .unwrap();
        assert_eq!(h.ledger.submissions("open")[0].submitter, "0xhunter");
    }

    #[tokio::test]
    async fn test_list_bounties() {
        let h = harness();
        h.ledger
            .create_bounty(stored("a", 1, far_future(), BountyStatus::Open));
        h.ledger
            .create_bounty(stored("b", 2, far_future(), BountyStatus::Completed));
        h.ledger.create_bounty(stored(
            "stale",
            3,
            EpochMillis::from_millis(1),
            BountyStatus::Open,
        ));
        h.call("submit-bounty-proof", json!({ "bountyId": "a" }))
            .await
            .unwrap();

        let all = h.call("list-bounties", json!({})).await.unwrap();
        assert_eq!(all["total"], 2);
        assert_eq!(all["bounties"][0]["bountyId"], "b");
        assert_eq!(all["bounties"][1]["submissions"], 1);
        assert_eq!(all["bounties"][1]["reward"], "$1.00");

        let open = h
            .call("list-bounties", json!({ "status": "open" }))
            .await
            .unwrap();
        assert_eq!(open["total"], 1);

        let err = h
            .call("list-bounties", json!({ "status": "lost" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
    }
}
