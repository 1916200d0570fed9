// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit gate around upstream agent calls.
//!
//! Every call is checked against the tenant balance before the agent is
//! contacted, relayed event by event to the caller, and charged for the
//! last `usage` event once the stream has closed. Usage seen before a
//! cancellation or stream failure is still charged, flagged as partial.

use std::sync::Arc;

use serde_json::Value;
use tms_core::{
    AccountingError, AgentEvent, AgentStream, AgentTransport, ChatRequest, TmsError, TokenUsage,
};
use tms_credits::UsageAccountant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::settlement::{SettlementJob, UsageSettlement};

/// Metadata key carrying the per-call request id.
pub const REQUEST_ID_KEY: &str = "request_id";

const DEFAULT_EVENT_BUFFER: usize = 100;

/// Receiving side of a gated agent call.
///
/// `events` closes when the upstream stream ends. At most one error follows
/// on `errors`, and at most one settlement on `settlements` once the charge
/// has been attempted.
#[derive(Debug)]
pub struct GatedStream {
    pub request_id: String,
    pub events: mpsc::Receiver<AgentEvent>,
    pub errors: mpsc::Receiver<TmsError>,
    pub settlements: mpsc::Receiver<UsageSettlement>,
}

/// Wraps an [`AgentTransport`] with balance checks and usage settlement.
#[derive(Clone)]
pub struct CreditGate {
    transport: Arc<dyn AgentTransport>,
    accountant: UsageAccountant,
    preflight: bool,
    min_balance: i64,
    default_model: String,
    event_buffer: usize,
}

impl CreditGate {
    pub fn new(transport: Arc<dyn AgentTransport>, accountant: UsageAccountant) -> Self {
        Self {
            transport,
            accountant,
            preflight: true,
            min_balance: 1,
            default_model: "default".to_string(),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Enable or disable the pre-flight balance check.
    pub fn with_preflight(mut self, enabled: bool, min_balance: i64) -> Self {
        self.preflight = enabled;
        self.min_balance = min_balance;
        self
    }

    /// Model charged when the usage event does not name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Current balance, failing when it is below the configured minimum.
    pub async fn check_balance(&self, tenant_id: Uuid) -> Result<i64, TmsError> {
        let ledger = self
            .accountant
            .ledger()
            .ok_or(AccountingError::NotConfigured)?;
        let balance = ledger.balance(tenant_id).await?;
        if balance < self.min_balance {
            return Err(AccountingError::InsufficientCredits {
                balance,
                required: self.min_balance,
            }
            .into());
        }
        Ok(balance)
    }

    /// Open a gated stream for `request`.
    ///
    /// Fails before contacting the agent when the request is invalid or the
    /// pre-flight check rejects the tenant.
    pub async fn open(
        &self,
        mut request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<GatedStream, TmsError> {
        request.validate()?;

        if self.preflight {
            let balance = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TmsError::Cancelled),
                res = self.check_balance(request.tenant_id) => res?,
            };
            debug!(tenant_id = %request.tenant_id, balance, "pre-flight balance check passed");
        }

        let request_id = match request.metadata.get(REQUEST_ID_KEY).and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                let id = Uuid::new_v4().to_string();
                request
                    .metadata
                    .insert(REQUEST_ID_KEY.to_string(), Value::String(id.clone()));
                id
            }
        };

        let job = SettlementJob {
            accountant: self.accountant.clone(),
            tenant_id: request.tenant_id,
            project_id: request.project_id,
            session_id: request.session_id.clone(),
            request_id: request_id.clone(),
            default_model: self.default_model.clone(),
        };

        let span = info_span!(
            "credit_gate",
            tenant_id = %request.tenant_id,
            request_id = %request_id
        );

        let upstream_cancel = cancel.child_token();
        let upstream = self
            .transport
            .process_message_stream(request, upstream_cancel.clone());

        let (events_tx, events) = mpsc::channel(self.event_buffer);
        let (errors_tx, errors) = mpsc::channel(1);
        let (settlements_tx, settlements) = mpsc::channel(1);

        let relay = Relay {
            upstream,
            events_tx,
            errors_tx,
            settlements_tx,
            cancel,
            upstream_cancel,
        };
        tokio::spawn(relay.run(job).instrument(span));

        Ok(GatedStream {
            request_id,
            events,
            errors,
            settlements,
        })
    }
}

/// Per-call forwarding task state.
struct Relay {
    upstream: AgentStream,
    events_tx: mpsc::Sender<AgentEvent>,
    errors_tx: mpsc::Sender<TmsError>,
    settlements_tx: mpsc::Sender<UsageSettlement>,
    cancel: CancellationToken,
    upstream_cancel: CancellationToken,
}

impl Relay {
    async fn run(self, job: SettlementJob) {
        let Relay {
            mut upstream,
            events_tx,
            errors_tx,
            settlements_tx,
            cancel,
            upstream_cancel,
        } = self;

        let mut observed: Option<(TokenUsage, Option<String>)> = None;
        let mut interrupted = false;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                event = upstream.events.recv() => event,
            };
            let Some(event) = event else { break };

            if let Some(usage) = event.token_usage() {
                observed = Some((usage, event.model().map(str::to_string)));
            }

            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                res = events_tx.send(event) => res.is_ok(),
            };
            if !delivered {
                // Caller cancelled or dropped the receiver; stop the upstream read.
                upstream_cancel.cancel();
                interrupted = true;
                break;
            }
        }
        drop(events_tx);

        let upstream_error = if interrupted {
            upstream.errors.try_recv().ok()
        } else {
            upstream.errors.recv().await
        };
        let failed = upstream_error.is_some();
        if let Some(err) = upstream_error {
            let _ = errors_tx.try_send(err);
        }
        drop(errors_tx);

        let Some((usage, model)) = observed else {
            debug!(interrupted, "agent stream closed without usage");
            return;
        };

        let settlement = job.settle(usage, model, interrupted || failed).await;
        let _ = settlements_tx.send(settlement).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tms_core::{
        AgentEventKind, CreditsLedger, HealthStatus, LedgerTransaction, TransactionKind,
    };

    #[derive(Default)]
    struct ScriptedTransport {
        events: Vec<AgentEvent>,
        fail: bool,
        hang: bool,
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl AgentTransport for ScriptedTransport {
        fn process_message_stream(
            &self,
            request: ChatRequest,
            cancel: CancellationToken,
        ) -> AgentStream {
            self.requests.lock().unwrap().push(request);
            let (events_tx, events) = mpsc::channel(16);
            let (errors_tx, errors) = mpsc::channel(1);
            let script = self.events.clone();
            let (fail, hang) = (self.fail, self.hang);
            tokio::spawn(async move {
                for event in script {
                    if events_tx.send(event).await.is_err() {
                        return;
                    }
                }
                if hang {
                    cancel.cancelled().await;
                    return;
                }
                if fail {
                    let _ = errors_tx.try_send(TmsError::AgentStreamRead {
                        source: "connection reset".into(),
                    });
                }
            });
            AgentStream { events, errors }
        }

        async fn health_check(&self, _cancel: &CancellationToken) -> Result<HealthStatus, TmsError> {
            Ok(HealthStatus::Healthy)
        }
    }

    struct MemoryLedger {
        balance: Mutex<i64>,
        debits: Mutex<Vec<(i64, String)>>,
    }

    impl MemoryLedger {
        fn new(balance: i64) -> Arc<Self> {
            Arc::new(Self {
                balance: Mutex::new(balance),
                debits: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CreditsLedger for MemoryLedger {
        async fn deduct_credits(
            &self,
            _tenant_id: Uuid,
            amount: i64,
            kind: TransactionKind,
            description: &str,
        ) -> Result<LedgerTransaction, AccountingError> {
            assert_eq!(kind, TransactionKind::AiUsage);
            let mut balance = self.balance.lock().unwrap();
            if *balance < amount {
                return Err(AccountingError::InsufficientCredits {
                    balance: *balance,
                    required: amount,
                });
            }
            *balance -= amount;
            let mut debits = self.debits.lock().unwrap();
            debits.push((amount, description.to_string()));
            Ok(LedgerTransaction {
                id: format!("tx-{}", debits.len()),
                balance_after: *balance,
            })
        }

        async fn balance(&self, _tenant_id: Uuid) -> Result<i64, AccountingError> {
            Ok(*self.balance.lock().unwrap())
        }
    }

    fn message(text: &str) -> AgentEvent {
        AgentEvent::new(AgentEventKind::Message, Some(text.into()))
    }

    fn usage(prompt: i64, completion: i64, model: Option<&str>) -> AgentEvent {
        let mut metadata = json!({"prompt_tokens": prompt, "completion_tokens": completion});
        if let Some(model) = model {
            metadata["model"] = json!(model);
        }
        AgentEvent {
            kind: "usage".into(),
            content: None,
            metadata: metadata.as_object().cloned(),
        }
    }

    fn request() -> ChatRequest {
        ChatRequest::new("hello", Uuid::new_v4(), Uuid::new_v4(), "session-1")
    }

    fn gate(transport: Arc<ScriptedTransport>, ledger: Arc<MemoryLedger>) -> CreditGate {
        CreditGate::new(transport, UsageAccountant::new(Some(ledger)))
    }

    async fn drain(gated: &mut GatedStream) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = gated.events.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn relays_events_and_settles_usage() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![
                message("Hello"),
                usage(60, 40, Some("gpt-4")),
                AgentEvent::new(AgentEventKind::Done, None),
            ],
            ..Default::default()
        });
        let ledger = MemoryLedger::new(1000);
        let gate = gate(transport.clone(), ledger.clone());

        let mut gated = gate.open(request(), CancellationToken::new()).await.unwrap();
        let events = drain(&mut gated).await;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].content.as_deref(), Some("Hello"));
        assert_eq!(events[2].known_kind(), Some(AgentEventKind::Done));
        assert!(gated.errors.recv().await.is_none());

        let settlement = gated.settlements.recv().await.unwrap();
        assert!(!settlement.partial);
        assert_eq!(settlement.model, "gpt-4");
        assert_eq!(settlement.request_id, gated.request_id);
        let deduction = settlement.deduction.unwrap();
        assert_eq!(deduction.charged_credits, 121);
        assert_eq!(deduction.balance_after, 879);
        assert_eq!(deduction.usage.total_tokens, 100);

        let debits = ledger.debits.lock().unwrap();
        assert!(debits[0].1.contains(&format!("request={}", gated.request_id)));
        assert!(debits[0].1.contains("session=session-1"));
    }

    #[tokio::test]
    async fn request_id_is_added_to_metadata() {
        let transport = Arc::new(ScriptedTransport::default());
        let gate = gate(transport.clone(), MemoryLedger::new(10));
        let gated = gate.open(request(), CancellationToken::new()).await.unwrap();
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].metadata[REQUEST_ID_KEY], json!(gated.request_id));
    }

    #[tokio::test]
    async fn insufficient_balance_never_reaches_the_agent() {
        let transport = Arc::new(ScriptedTransport::default());
        let gate = gate(transport.clone(), MemoryLedger::new(0));
        let err = gate.open(request(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TmsError::Accounting(AccountingError::InsufficientCredits {
                balance: 0,
                required: 1
            })
        ));
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn preflight_needs_a_ledger() {
        let gate = CreditGate::new(Arc::new(ScriptedTransport::default()), UsageAccountant::new(None));
        let err = gate.open(request(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TmsError::Accounting(AccountingError::NotConfigured)));
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_preflight() {
        let transport = Arc::new(ScriptedTransport::default());
        let gate = gate(transport.clone(), MemoryLedger::new(0));
        let mut bad = request();
        bad.message = "   ".into();
        let err = gate.open(bad, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, TmsError::Validation(_)));
    }

    #[tokio::test]
    async fn stream_error_still_settles_partial_usage() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![usage(5, 5, None)],
            fail: true,
            ..Default::default()
        });
        let gate = gate(transport, MemoryLedger::new(100)).with_default_model("house-model");

        let mut gated = gate.open(request(), CancellationToken::new()).await.unwrap();
        assert_eq!(drain(&mut gated).await.len(), 1);
        let err = gated.errors.recv().await.unwrap();
        assert!(matches!(err, TmsError::AgentStreamRead { .. }));

        let settlement = gated.settlements.recv().await.unwrap();
        assert!(settlement.partial);
        assert_eq!(settlement.model, "house-model");
        // ceil(10 * 1.21) = 13
        assert_eq!(settlement.deduction.unwrap().charged_credits, 13);
    }

    #[tokio::test]
    async fn cancellation_settles_observed_usage() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![message("partial answer"), usage(20, 0, Some("gpt-4"))],
            hang: true,
            ..Default::default()
        });
        let gate = gate(transport, MemoryLedger::new(100));
        let cancel = CancellationToken::new();

        let mut gated = gate.open(request(), cancel.clone()).await.unwrap();
        gated.events.recv().await.unwrap();
        gated.events.recv().await.unwrap();
        cancel.cancel();

        let closed = tokio::time::timeout(Duration::from_secs(2), gated.events.recv())
            .await
            .unwrap();
        assert!(closed.is_none());

        let settlement = gated.settlements.recv().await.unwrap();
        assert!(settlement.partial);
        assert_eq!(settlement.deduction.unwrap().charged_credits, 25);
    }

    #[tokio::test]
    async fn stream_without_usage_has_no_settlement() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![message("Hello")],
            ..Default::default()
        });
        let ledger = MemoryLedger::new(100);
        let mut gated = gate(transport, ledger.clone())
            .open(request(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(drain(&mut gated).await.len(), 1);
        assert!(gated.settlements.recv().await.is_none());
        assert!(ledger.debits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_usage_is_reported_not_charged() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![usage(0, 0, Some("gpt-4"))],
            ..Default::default()
        });
        let ledger = MemoryLedger::new(100);
        let mut gated = gate(transport, ledger.clone())
            .open(request(), CancellationToken::new())
            .await
            .unwrap();
        drain(&mut gated).await;
        let settlement = gated.settlements.recv().await.unwrap();
        assert!(!settlement.is_settled());
        assert_eq!(settlement.error.as_deref(), Some("no token usage reported"));
        assert!(ledger.debits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_usage_event_wins() {
        let transport = Arc::new(ScriptedTransport {
            events: vec![usage(1, 1, Some("draft")), usage(50, 50, Some("final"))],
            ..Default::default()
        });
        let mut gated = gate(transport, MemoryLedger::new(1000))
            .open(request(), CancellationToken::new())
            .await
            .unwrap();
        drain(&mut gated).await;
        let settlement = gated.settlements.recv().await.unwrap();
        assert_eq!(settlement.model, "final");
        assert_eq!(settlement.deduction.unwrap().charged_credits, 121);
    }
}
