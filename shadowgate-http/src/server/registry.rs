//! Operation keys to price, contracts and handler.
//!
//! [`OperationRegistry::dispatch`] is the only way to run a handler, and it
//! always goes through the [`Paygate`]. The order of checks is fixed:
//!
//! 1. resolve the key ([`DispatchError::UnknownOperation`]);
//! 2. a priced call without any proof header is challenged at once, before
//!    the body is looked at;
//! 3. the body is checked against the input contract
//!    ([`DispatchError::InvalidInput`]), so a malformed call never spends a
//!    payment;
//! 4. the gate verifies the proof and either challenges or admits;
//! 5. the handler runs.
//!
//! The registry is built once at startup and shared read-only behind an
//! `Arc` afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use shadowgate::{
    Admission, BoxFuture, DuplicateOperation, InputContract, InvalidInput, OperationError,
    OperationResult, OutputContract, PaymentRequired, PriceEntry, UnknownOperation,
};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use super::error::DispatchError;
use super::paygate::{GateDecision, Offer, Paygate};
use crate::constants::ANONYMOUS_PAYER;
use crate::headers::extract_payer;

/// Future returned by an operation handler.
pub type OperationFuture = BoxFuture<'static, Result<OperationResult, OperationError>>;

type BoxedHandler = dyn Fn(OperationContext) -> OperationFuture + Send + Sync;

/// Everything a handler gets to see about an admitted call.
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Key the call was dispatched under.
    pub key: String,
    /// The validated request body.
    pub input: Map<String, Value>,
    /// Paying identity: the verifier's payer, else the `x-payment-payer`
    /// header.
    pub payer: Option<String>,
    /// How the call was admitted.
    pub admission: Admission,
    /// Absolute URL of the resource paid for.
    pub resource: String,
}

impl OperationContext {
    /// The payer, or `"anon"` when none is known.
    #[must_use]
    pub fn payer_or_anon(&self) -> &str {
        self.payer.as_deref().unwrap_or(ANONYMOUS_PAYER)
    }

    /// A string field of the input.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.input.get(name).and_then(Value::as_str)
    }

    /// A numeric field of the input.
    #[must_use]
    pub fn f64_field(&self, name: &str) -> Option<f64> {
        self.input.get(name).and_then(Value::as_f64)
    }

    /// A non-negative integer field of the input.
    #[must_use]
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.input.get(name).and_then(Value::as_u64)
    }

    /// A field holding an array of strings; other elements are skipped.
    #[must_use]
    pub fn strings_field(&self, name: &str) -> Vec<String> {
        self.input
            .get(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A priced, contract-checked operation.
#[derive(Clone)]
pub struct Operation {
    price: PriceEntry,
    input: InputContract,
    output: OutputContract,
    handler: Arc<BoxedHandler>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("price", &self.price)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// An operation with empty contracts, keyed by `price.operation_key`.
    pub fn new<F, Fut>(price: PriceEntry, handler: F) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<OperationResult, OperationError>> + Send + 'static,
    {
        Self {
            price,
            input: InputContract::new(),
            output: OutputContract::new(),
            handler: Arc::new(move |ctx| -> OperationFuture { Box::pin(handler(ctx)) }),
        }
    }

    /// Sets the input contract.
    #[must_use]
    pub fn with_input(mut self, input: InputContract) -> Self {
        self.input = input;
        self
    }

    /// Sets the output contract.
    #[must_use]
    pub fn with_output(mut self, output: OutputContract) -> Self {
        self.output = output;
        self
    }

    /// The operation key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.price.operation_key
    }

    /// The price.
    #[must_use]
    pub const fn price(&self) -> &PriceEntry {
        &self.price
    }

    /// The input contract.
    #[must_use]
    pub const fn input(&self) -> &InputContract {
        &self.input
    }

    /// The output contract.
    #[must_use]
    pub const fn output(&self) -> &OutputContract {
        &self.output
    }

    /// The price and contracts as seen by the gate.
    #[must_use]
    pub const fn offer(&self) -> Offer<'_> {
        Offer {
            price: &self.price,
            input: &self.input,
            output: &self.output,
        }
    }
}

/// Raw request body as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body, or only whitespace.
    Empty,
    /// Parsed JSON.
    Json(Value),
    /// Not JSON; carries the parser's message.
    Malformed(String),
}

impl RequestBody {
    /// Parses raw body bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }
        match serde_json::from_slice(bytes) {
            Ok(value) => Self::Json(value),
            Err(err) => Self::Malformed(err.to_string()),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A call to dispatch, independent of the HTTP framework.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Request method.
    pub method: Method,
    /// Request URI; only the path is used.
    pub uri: Uri,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: RequestBody,
}

impl OperationRequest {
    /// A request with no headers and no body.
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    /// Sets the headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// The body as an object satisfying `contract`. An empty body is `{}`, as
    /// is an unparsable body on a `GET`, which probes rather than submits.
    fn take_input(&mut self, contract: &InputContract) -> Result<Map<String, Value>, InvalidInput> {
        match std::mem::replace(&mut self.body, RequestBody::Empty) {
            RequestBody::Empty => contract.accept(Value::Null),
            RequestBody::Malformed(_) if self.method == Method::GET => contract.accept(Value::Null),
            RequestBody::Malformed(message) => Err(InvalidInput::MalformedJson(message)),
            RequestBody::Json(value) => contract.accept(value),
        }
    }
}

/// Successful outcome of [`OperationRegistry::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    /// The handler ran.
    Completed {
        /// What the handler produced.
        result: OperationResult,
        /// How the call was admitted.
        admission: Admission,
    },
    /// Payment is required; the handler did not run.
    Challenged(PaymentRequired),
}

/// Operations by key, all behind one gate.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    gate: Paygate,
    operations: BTreeMap<String, Operation>,
}

impl OperationRegistry {
    /// An empty registry behind `gate`.
    #[must_use]
    pub const fn new(gate: Paygate) -> Self {
        Self {
            gate,
            operations: BTreeMap::new(),
        }
    }

    /// Adds an operation.
    ///
    /// # Errors
    ///
    /// [`DuplicateOperation`] if the key is taken.
    pub fn register(&mut self, operation: Operation) -> Result<(), DuplicateOperation> {
        let key = operation.key().to_owned();
        if self.operations.contains_key(&key) {
            return Err(DuplicateOperation(key));
        }
        self.operations.insert(key, operation);
        Ok(())
    }

    /// The operation under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Operation> {
        self.operations.get(key)
    }

    /// All operations in key order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }

    /// The gate every dispatch goes through.
    #[must_use]
    pub const fn gate(&self) -> &Paygate {
        &self.gate
    }

    /// Runs the operation under `key` if the request has paid for it.
    ///
    /// # Errors
    ///
    /// [`DispatchError`] for an unknown key, a body that breaks the input
    /// contract, or a failing handler. A missing or unacceptable payment is
    /// not an error but [`Dispatched::Challenged`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.dispatch", skip(self, request), fields(method = %request.method))
    )]
    pub async fn dispatch(
        &self,
        key: &str,
        mut request: OperationRequest,
    ) -> Result<Dispatched, DispatchError> {
        let operation = self
            .operations
            .get(key)
            .ok_or_else(|| UnknownOperation(key.to_owned()))?;
        let offer = operation.offer();

        if self.gate.must_challenge(&operation.price, &request.headers) {
            #[cfg(feature = "telemetry")]
            tracing::debug!("no payment proof; challenging");
            let resource = self.gate.resource_url(&request.headers, &request.uri);
            return Ok(Dispatched::Challenged(offer.challenge(&resource)));
        }

        let input = request.take_input(&operation.input)?;

        let admission = match self
            .gate
            .evaluate(&offer, &request.headers, &request.uri)
            .await
        {
            GateDecision::Admitted(admission) => admission,
            GateDecision::Challenged(challenge) => return Ok(Dispatched::Challenged(challenge)),
        };

        let payer = admission
            .payer
            .clone()
            .or_else(|| extract_payer(&request.headers));
        let context = OperationContext {
            key: key.to_owned(),
            input,
            payer,
            admission: admission.clone(),
            resource: self.gate.resource_url(&request.headers, &request.uri),
        };
        let result = (operation.handler)(context).await?;

        #[cfg(feature = "telemetry")]
        tracing::info!(
            side_effects_applied = result.side_effects_applied,
            settled = admission.settlement.is_some(),
            "operation completed"
        );

        Ok(Dispatched::Completed { result, admission })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::HeaderValue;
    use serde_json::json;
    use shadowgate::{
        ChainNetwork, FieldSpec, MinorUnits, PaymentRequirements, PaymentVerifier, ProofToken,
        VerificationPolicy, Verdict, VerifierError,
    };

    use super::*;

    /// Counts verifier calls and rejects everything.
    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl PaymentVerifier for Counting {
        fn verify<'a>(
            &'a self,
            _token: &'a ProofToken,
            _requirements: &'a PaymentRequirements,
        ) -> BoxFuture<'a, Result<Verdict, VerifierError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async {
                Ok(Verdict::Invalid {
                    reason: "nope".into(),
                })
            })
        }

        fn policy(&self) -> VerificationPolicy {
            VerificationPolicy::Facilitator
        }
    }

    fn price(key: &str, amount: u64) -> PriceEntry {
        PriceEntry::new(key, MinorUnits::new(amount), ChainNetwork::Base, "0xPAYEE")
    }

    fn echo(key: &str, amount: u64, calls: Arc<AtomicUsize>) -> Operation {
        Operation::new(price(key, amount), move |ctx: OperationContext| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(OperationResult::read_only(json!({
                    "payer": ctx.payer_or_anon(),
                    "title": ctx.str_field("title"),
                })))
            }
        })
        .with_input(InputContract::new().field("title", FieldSpec::string().required()))
    }

    fn request(headers: &[(&'static str, &'static str)], body: Value) -> OperationRequest {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_static(*value));
        }
        OperationRequest::new(Method::POST, Uri::from_static("/service/post-bounty"))
            .with_headers(map)
            .with_body(body)
    }

    fn registry(gate: Paygate, calls: &Arc<AtomicUsize>) -> OperationRegistry {
        let mut registry = OperationRegistry::new(gate);
        registry
            .register(echo("post-bounty", 250_000, Arc::clone(calls)))
            .unwrap();
        registry
            .register(echo("system-info", 0, Arc::clone(calls)))
            .unwrap();
        registry
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = registry(Paygate::default(), &calls);
        let err = registry
            .register(echo("post-bounty", 1, Arc::clone(&calls)))
            .unwrap_err();
        assert_eq!(err, DuplicateOperation("post-bounty".into()));
        assert_eq!(registry.operations().count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = registry(Paygate::default(), &calls)
            .dispatch("nope", request(&[], json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnknownOperation(_)));
    }

    #[tokio::test]
    async fn test_unpaid_call_is_challenged_before_body_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Paygate::default(), &calls);
        let outcome = registry
            .dispatch("post-bounty", request(&[("host", "api.example")], json!([1, 2])))
            .await
            .unwrap();
        let Dispatched::Challenged(challenge) = outcome else {
            panic!("expected a challenge");
        };
        assert_eq!(challenge.accepts[0].max_amount_required.get(), 250_000);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_body_rejected_before_verification() {
        let verifier = Arc::new(Counting::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Paygate::new(verifier.clone()), &calls);
        let err = registry
            .dispatch("post-bounty", request(&[("x-payment-proof", "tok")], json!({})))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidInput(InvalidInput::MissingField(ref f)) if f == "title"
        ));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_payment_never_runs_handler() {
        let verifier = Arc::new(Counting::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Paygate::new(verifier.clone()), &calls);
        let outcome = registry
            .dispatch(
                "post-bounty",
                request(&[("x-payment-proof", "tok")], json!({ "title": "t" })),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, Dispatched::Challenged(_)));
        assert_eq!(verifier.0.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_paid_call_runs_handler_with_payer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Paygate::default(), &calls);
        let outcome = registry
            .dispatch(
                "post-bounty",
                request(
                    &[("x-payment-proof", "tok"), ("x-payment-payer", "0xabc")],
                    json!({ "title": "Find the leak" }),
                ),
            )
            .await
            .unwrap();
        let Dispatched::Completed { result, admission } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.output["payer"], "0xabc");
        assert_eq!(result.output["title"], "Find the leak");
        assert!(admission.settlement.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_free_call_needs_no_proof() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = registry(Paygate::new(Arc::new(Counting::default())), &calls);
        let outcome = registry
            .dispatch("system-info", request(&[], json!({ "title": "x" })))
            .await
            .unwrap();
        let Dispatched::Completed { result, .. } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(result.output["payer"], "anon");
    }

    #[tokio::test]
    async fn test_malformed_get_body_is_empty_object() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = OperationRegistry::new(Paygate::default());
        registry
            .register(
                Operation::new(price("list-bounties", 0), |_ctx| async {
                    Ok(OperationResult::read_only(json!({})))
                })
                .with_input(InputContract::new().field("status", FieldSpec::string())),
            )
            .unwrap();
        let get = OperationRequest::new(Method::GET, Uri::from_static("/service/list-bounties"))
            .with_body(RequestBody::from_bytes(b"not json"));
        assert!(registry.dispatch("list-bounties", get).await.is_ok());

        let post = OperationRequest::new(Method::POST, Uri::from_static("/service/list-bounties"))
            .with_body(RequestBody::from_bytes(b"not json"));
        assert!(matches!(
            registry.dispatch("list-bounties", post).await,
            Err(DispatchError::InvalidInput(InvalidInput::MalformedJson(_)))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_request_body_parsing() {
        assert_eq!(RequestBody::from_bytes(b""), RequestBody::Empty);
        assert_eq!(RequestBody::from_bytes(b"  \n"), RequestBody::Empty);
        assert_eq!(
            RequestBody::from_bytes(br#"{"a":1}"#),
            RequestBody::Json(json!({ "a": 1 }))
        );
        assert!(matches!(
            RequestBody::from_bytes(b"{"),
            RequestBody::Malformed(_)
        ));
    }
}
