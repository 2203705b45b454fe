//! AI deck queries.

use std::sync::Arc;

use serde_json::json;
use shadowgate::timestamp::EpochMillis;
use shadowgate::{
    FieldSpec, FieldType, InputContract, OperationError, OperationResult, OutputContract,
    PriceEntry,
};
use shadowgate_http::server::{Operation, OperationContext};

use super::{Services, money};
use crate::engine::AiModel;
use crate::ledger::{AiQuery, new_id};

/// Key of the AI deck query operation.
pub const AI_DECK_QUERY: &str = "ai-deck-query";

const DEFAULT_MAX_TOKENS: u32 = 1000;

/// `ai-deck-query`: asks the query engine and records the exchange.
pub fn ai_deck_query(price: PriceEntry, services: &Arc<Services>) -> Operation {
    let cost = price.amount;
    let services = Arc::clone(services);
    Operation::new(price, move |ctx: OperationContext| {
        let services = Arc::clone(&services);
        async move {
            let query = ctx.str_field("query").unwrap_or_default();
            let model = ctx
                .str_field("model")
                .and_then(|m| m.parse().ok())
                .unwrap_or(AiModel::Claude);
            let max_tokens = ctx
                .u64_field("maxTokens")
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(DEFAULT_MAX_TOKENS);

            let answer = services
                .engine
                .answer(query, model, max_tokens)
                .await
                .map_err(|err| OperationError::Unavailable(err.to_string()))?;

            let now = EpochMillis::now();
            let record = AiQuery {
                id: new_id("query", now),
                query: query.to_owned(),
                model,
                max_tokens,
                user_id: ctx.payer_or_anon().to_owned(),
                cost,
                response: answer.text,
                timestamp: now,
            };
            let output = json!({
                "queryId": record.id,
                "model": model.as_str().to_uppercase(),
                "response": record.response,
                "tokensUsed": answer.tokens_used,
                "cost": money(cost),
                "message": "AI consulted. The oracle has spoken.",
            });
            services.ledger.record_query(record);
            Ok(OperationResult::applied(output))
        }
    })
    .with_input(
        InputContract::new()
            .field("query", FieldSpec::string().required())
            .field(
                "model",
                FieldSpec::string()
                    .one_of(AiModel::ALL.map(AiModel::as_str))
                    .describe("Model to consult, default claude"),
            )
            .field(
                "maxTokens",
                FieldSpec::integer().describe("Token budget, default 1000"),
            ),
    )
    .with_output(
        OutputContract::new()
            .field("queryId", FieldType::String)
            .field("model", FieldType::String)
            .field("response", FieldType::String)
            .field("tokensUsed", FieldType::Integer)
            .field("cost", FieldType::String),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use shadowgate::MinorUnits;
    use shadowgate_http::server::DispatchError;

    use crate::engine::AiModel;
    use crate::ledger::Ledger;
    use crate::operations::testing::harness;

    #[tokio::test]
    async fn test_query_is_answered_and_recorded() {
        let h = harness();
        let output = h
            .call(
                "ai-deck-query",
                json!({ "query": "who owns the tower?", "model": "gpt4", "maxTokens": 200 }),
            )
            .await
            .unwrap();
        assert_eq!(output["model"], "GPT4");
        assert_eq!(
            output["response"],
            "[GPT-4 DECK]: Neural pathways engaged. Query processed."
        );
        assert_eq!(output["tokensUsed"], 200);
        assert_eq!(output["cost"], "$0.10");

        let history = h.ledger.queries_by_user("0xpayer", 10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].model, AiModel::Gpt4);
        assert_eq!(history[0].cost, MinorUnits::new(100_000));
        assert_eq!(history[0].id, output["queryId"]);
    }

    #[tokio::test]
    async fn test_default_model_is_claude() {
        let h = harness();
        let output = h
            .call("ai-deck-query", json!({ "query": "status" }))
            .await
            .unwrap();
        assert_eq!(output["model"], "CLAUDE");
        assert_eq!(output["tokensUsed"], 500);
        assert!(
            output["response"]
                .as_str()
                .unwrap()
                .contains("Analysis: status...")
        );
    }

    #[tokio::test]
    async fn test_unknown_model_rejected_before_handler() {
        let h = harness();
        let err = h
            .call("ai-deck-query", json!({ "query": "x", "model": "llama" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidInput(_)));
        assert!(h.ledger.queries_by_user("0xpayer", 10).is_empty());
    }
}
