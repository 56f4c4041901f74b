//! Withdrawal submission dispatcher - builds method-specific payloads and routes them

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::MethodLimits;
use crate::domain::result::{Error, Result};
use crate::domain::withdrawal::{
    normalize_amount, round_amount, sanitize_routing_number, validate_amount,
};
use crate::domain::{
    CryptoWithdrawalPayload, Destination, FiatWithdrawalPayload, FundingRequest,
    SubmissionOutcome, TransferFlow, TransferMethod, WithdrawalRequest,
};
use crate::ports::{CacheInvalidator, CacheScope, WithdrawalMutations};
use crate::services::poller::{FundingListener, FundingPoller};

/// Currency of fiat withdrawals
const FIAT_CURRENCY: &str = "USD";

/// Routes a normalized request to the right remote call
///
/// Errors from the collaborators are returned untouched; deciding whether an
/// error means "authorization expired" is the gate's job.
pub struct WithdrawalDispatcher {
    mutations: Arc<dyn WithdrawalMutations>,
    poller: Arc<FundingPoller>,
    cache: Arc<dyn CacheInvalidator>,
    limits: MethodLimits,
}

impl WithdrawalDispatcher {
    pub fn new(
        mutations: Arc<dyn WithdrawalMutations>,
        poller: Arc<FundingPoller>,
        cache: Arc<dyn CacheInvalidator>,
        limits: MethodLimits,
    ) -> Self {
        Self {
            mutations,
            poller,
            cache,
            limits,
        }
    }

    /// Submit a request
    ///
    /// `listener` only matters for wallet funding, where it receives the
    /// poller's confirmation events.
    pub async fn submit(
        &self,
        request: &WithdrawalRequest,
        flow: TransferFlow,
        listener: Option<FundingListener>,
    ) -> Result<SubmissionOutcome> {
        let amount_usd = round_amount(request.amount_usd);
        validate_amount(amount_usd, self.limits.limit_for(request.method))?;
        let amount = normalize_amount(amount_usd);

        let outcome = match (request.method, flow) {
            (TransferMethod::Wallet(provider), TransferFlow::Fund) => {
                let recipient = expect_address(&request.destination)?;
                let receipt = self
                    .poller
                    .start_funding(
                        FundingRequest::new(provider, amount_usd, recipient),
                        listener,
                    )
                    .await?;
                SubmissionOutcome::FundingStarted {
                    signature: receipt.signature,
                }
            }
            (TransferMethod::Crypto, TransferFlow::Fund) => {
                return Err(Error::validation(
                    "Funding requires a wallet provider (phantom, solflare or backpack)",
                ));
            }
            (TransferMethod::Crypto | TransferMethod::Wallet(_), TransferFlow::Withdraw) => {
                let payload = CryptoWithdrawalPayload {
                    amount,
                    destination_address: expect_address(&request.destination)?.to_string(),
                    destination_chain: request.destination_chain.clone(),
                };
                debug!(method = %request.method, "initiating crypto withdrawal");
                let receipt = self.mutations.initiate_withdrawal(&payload).await?;
                SubmissionOutcome::Withdrawn { receipt }
            }
            (TransferMethod::Asset(side), _) => {
                let Destination::AssetSymbol(symbol) = &request.destination else {
                    return Err(Error::validation("Trades need an asset symbol"));
                };
                if symbol.trim().is_empty() {
                    return Err(Error::validation("Trades need an asset symbol"));
                }
                SubmissionOutcome::TradeRedirect {
                    side,
                    symbol: symbol.trim().to_uppercase(),
                    amount,
                }
            }
            (TransferMethod::Fiat, TransferFlow::Fund) => {
                return Err(Error::validation("Bank funding is not supported"));
            }
            (TransferMethod::Fiat, TransferFlow::Withdraw) => {
                let Destination::RoutingNumber(raw) = &request.destination else {
                    return Err(Error::validation("Bank withdrawals need a routing number"));
                };
                let routing_number = sanitize_routing_number(raw);
                if routing_number.is_empty() {
                    return Err(Error::validation("Routing number must contain digits"));
                }
                let payload = FiatWithdrawalPayload {
                    amount,
                    currency: FIAT_CURRENCY.to_string(),
                    routing_number,
                };
                debug!("initiating fiat withdrawal");
                let receipt = self.mutations.initiate_fiat_withdrawal(&payload).await?;
                SubmissionOutcome::Withdrawn { receipt }
            }
        };

        for scope in CacheScope::BALANCE_VIEWS {
            self.cache.invalidate(scope);
        }
        info!(method = %request.method, ?flow, "submission accepted");
        Ok(outcome)
    }
}

fn expect_address(destination: &Destination) -> Result<&str> {
    match destination {
        Destination::Address(address) if !address.trim().is_empty() => Ok(address.trim()),
        Destination::Address(_) => Err(Error::validation("Destination address is required")),
        _ => Err(Error::validation("This method needs a destination address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::{DemoBackend, RecordedWithdrawal};
    use crate::adapters::memory::{ManualClock, RecordingInvalidator};
    use crate::config::FundingSettings;
    use crate::domain::{FundingStatus, TradeSide, WalletProvider};
    use rust_decimal::Decimal;

    struct Fixture {
        backend: Arc<DemoBackend>,
        cache: Arc<RecordingInvalidator>,
        poller: Arc<FundingPoller>,
        dispatcher: WithdrawalDispatcher,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(DemoBackend::manual(Decimal::new(1000, 0)));
        let cache = Arc::new(RecordingInvalidator::new());
        let limits = MethodLimits {
            crypto: Some(Decimal::new(500, 0)),
            ..Default::default()
        };
        let poller = Arc::new(FundingPoller::new(
            backend.clone(),
            backend.clone(),
            cache.clone(),
            Arc::new(ManualClock::new(0)),
            FundingSettings::default(),
            limits.clone(),
        ));
        let dispatcher =
            WithdrawalDispatcher::new(backend.clone(), poller.clone(), cache.clone(), limits);
        Fixture {
            backend,
            cache,
            poller,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_crypto_withdrawal_normalizes_amount() {
        let f = fixture();
        let request = WithdrawalRequest::new(
            TransferMethod::Crypto,
            Decimal::new(121, 1),
            Destination::Address(" addr123 ".into()),
        )
        .with_chain("solana");

        let outcome = f
            .dispatcher
            .submit(&request, TransferFlow::Withdraw, None)
            .await
            .unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Withdrawn { .. }));
        assert_eq!(
            f.backend.withdrawals(),
            vec![RecordedWithdrawal::Crypto(CryptoWithdrawalPayload {
                amount: "12.10".into(),
                destination_address: "addr123".into(),
                destination_chain: Some("solana".into()),
            })]
        );
        assert_eq!(f.cache.scopes(), CacheScope::BALANCE_VIEWS.to_vec());
    }

    #[tokio::test]
    async fn test_fiat_withdrawal_sanitizes_routing_number() {
        let f = fixture();
        let request = WithdrawalRequest::new(
            TransferMethod::Fiat,
            Decimal::new(25, 0),
            Destination::RoutingNumber("021-000-021".into()),
        );
        f.dispatcher
            .submit(&request, TransferFlow::Withdraw, None)
            .await
            .unwrap();
        assert_eq!(
            f.backend.withdrawals(),
            vec![RecordedWithdrawal::Fiat(FiatWithdrawalPayload {
                amount: "25.00".into(),
                currency: "USD".into(),
                routing_number: "021000021".into(),
            })]
        );
    }

    #[tokio::test]
    async fn test_wallet_fund_flow_delegates_to_poller() {
        let f = fixture();
        let request = WithdrawalRequest::new(
            TransferMethod::Wallet(WalletProvider::Phantom),
            Decimal::new(50, 0),
            Destination::Address("deposit-addr".into()),
        );
        let outcome = f
            .dispatcher
            .submit(&request, TransferFlow::Fund, None)
            .await
            .unwrap();

        assert!(matches!(outcome, SubmissionOutcome::FundingStarted { .. }));
        assert!(f.backend.withdrawals().is_empty());
        assert_eq!(f.backend.handoff_count(), 1);
        assert_eq!(f.poller.session().status, FundingStatus::Pending);
    }

    #[tokio::test]
    async fn test_wallet_fund_flow_hands_off_rounded_amount() {
        let f = fixture();
        let request = WithdrawalRequest::new(
            TransferMethod::Wallet(WalletProvider::Solflare),
            Decimal::new(12345, 3),
            Destination::Address("deposit-addr".into()),
        );
        f.dispatcher
            .submit(&request, TransferFlow::Fund, None)
            .await
            .unwrap();

        let handoffs = f.backend.handoffs();
        assert_eq!(handoffs.len(), 1);
        assert_eq!(handoffs[0].amount_usd, Decimal::new(1235, 2));
        assert_eq!(handoffs[0].amount_usd.to_string(), "12.35");
        assert_eq!(handoffs[0].recipient_owner_address, "deposit-addr");
        assert_eq!(f.poller.session().amount_usd, Some(Decimal::new(1235, 2)));
    }

    #[tokio::test]
    async fn test_trade_redirect_makes_no_mutation() {
        let f = fixture();
        let request = WithdrawalRequest::new(
            TransferMethod::Asset(TradeSide::Buy),
            Decimal::new(10, 0),
            Destination::AssetSymbol("sol".into()),
        );
        let outcome = f
            .dispatcher
            .submit(&request, TransferFlow::Withdraw, None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SubmissionOutcome::TradeRedirect {
                side: TradeSide::Buy,
                symbol: "SOL".into(),
                amount: "10.00".into(),
            }
        );
        assert!(f.backend.withdrawals().is_empty());
    }

    #[tokio::test]
    async fn test_errors_pass_through_untouched() {
        let f = fixture();
        f.backend.expire_next_withdrawals(1);
        let request = WithdrawalRequest::new(
            TransferMethod::Crypto,
            Decimal::new(10, 0),
            Destination::Address("addr".into()),
        );
        let err = f
            .dispatcher
            .submit(&request, TransferFlow::Withdraw, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { status: 401, .. }));
        assert!(f.cache.scopes().is_empty());
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let f = fixture();
        let over_limit = WithdrawalRequest::new(
            TransferMethod::Crypto,
            Decimal::new(501, 0),
            Destination::Address("addr".into()),
        );
        let wrong_destination = WithdrawalRequest::new(
            TransferMethod::Fiat,
            Decimal::new(5, 0),
            Destination::Address("addr".into()),
        );
        let empty_routing = WithdrawalRequest::new(
            TransferMethod::Fiat,
            Decimal::new(5, 0),
            Destination::RoutingNumber("--".into()),
        );
        for request in [over_limit, wrong_destination, empty_routing] {
            let err = f
                .dispatcher
                .submit(&request, TransferFlow::Withdraw, None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{:?}", err);
        }
        assert!(f.backend.withdrawals().is_empty());
    }
}
