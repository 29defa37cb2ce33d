use color_eyre::eyre::{
    Result,
    WrapErr,
};
use fuels::{
    accounts::{
        ViewOnlyAccount,
        wallet::Wallet,
    },
    client::{
        PageDirection,
        PaginationRequest,
    },
    core::codec::LogDecoder,
    prelude::{
        AssetId,
        CallParameters,
        ContractDependency,
        ContractId,
        Provider,
        Receipt,
        VariableOutputPolicy,
    },
    types::transaction_response::TransactionResponse,
};
use generated_abi::higher_lower_types::{
    HigherLowerContract,
    RoundCompleteEvent,
};
use std::future::Future;

const HISTORY_PAGE_SIZE: i32 = 100;

/// A wagered guess, ready to submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayRequest {
    /// smallest units of the base asset
    pub wager: u64,
    pub display: u64,
    pub guess_higher: bool,
}

/// Callable handle to the game contract.
pub trait GameContract: Clone + Send + Sync + 'static {
    /// Whatever authorizes calls: an unlocked wallet for the real chain.
    type Signer: Clone + Send + Sync + 'static;

    /// `start_height` is the first block that can hold the contract's logs.
    fn bind(contract_id: ContractId, start_height: u32, signer: Self::Signer) -> Self;

    /// Every `RoundCompleteEvent` the contract ever logged, oldest first.
    fn round_history(
        &self,
    ) -> impl Future<Output = Result<Vec<RoundCompleteEvent>>> + Send;

    /// Submits the play and resolves once the transaction is committed.
    fn win_or_lose(&self, play: PlayRequest) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone, Debug)]
pub struct FuelSigner {
    pub wallet: Wallet,
    pub base_asset_id: AssetId,
}

#[derive(Clone)]
pub struct FuelGameContract {
    contract_id: ContractId,
    start_height: u32,
    instance: HigherLowerContract<Wallet>,
    provider: Provider,
    base_asset_id: AssetId,
}

impl GameContract for FuelGameContract {
    type Signer = FuelSigner;

    fn bind(contract_id: ContractId, start_height: u32, signer: FuelSigner) -> Self {
        let provider = signer.wallet.provider().clone();
        let instance = generated_abi::contract_instance(contract_id, signer.wallet);
        Self {
            contract_id,
            start_height,
            instance,
            provider,
            base_asset_id: signer.base_asset_id,
        }
    }

    async fn round_history(&self) -> Result<Vec<RoundCompleteEvent>> {
        let decoder = self.instance.log_decoder();
        let mut batches = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .provider
                .get_transactions(PaginationRequest {
                    cursor,
                    results: HISTORY_PAGE_SIZE,
                    direction: PageDirection::Backward,
                })
                .await
                .wrap_err("failed to query transaction history")?;
            let scan = scan_page(
                &decoder,
                self.contract_id,
                self.start_height,
                page.results.into_iter().map(TxLogs::from),
            )?;
            batches.extend(scan.batches);
            if scan.reached_start || !page.has_next_page {
                break;
            }
            cursor = page.cursor;
        }
        let events: Vec<RoundCompleteEvent> = batches.into_iter().rev().flatten().collect();
        tracing::debug!(
            count = events.len(),
            contract = %self.contract_id,
            from_block = self.start_height,
            "loaded round history"
        );
        Ok(events)
    }

    async fn win_or_lose(&self, play: PlayRequest) -> Result<()> {
        let call = CallParameters::default()
            .with_amount(play.wager)
            .with_asset_id(self.base_asset_id);
        self.instance
            .methods()
            .win_or_lose(play.display, play.guess_higher)
            .call_params(call)
            .wrap_err("win_or_lose rejected the attached wager")?
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .call()
            .await
            .wrap_err_with(|| {
                format!(
                    "win_or_lose failed (display {}, higher {}, sent {})",
                    play.display, play.guess_higher, play.wager
                )
            })?;
        Ok(())
    }
}

/// Receipts of one transaction from a history page.
#[derive(Debug)]
pub struct TxLogs {
    pub block_height: Option<u32>,
    /// `None` when the transaction did not succeed
    pub receipts: Option<Vec<Receipt>>,
}

impl From<TransactionResponse> for TxLogs {
    fn from(response: TransactionResponse) -> Self {
        Self {
            block_height: response.block_height.map(|height| *height),
            // reverted transactions keep their receipts but their logs never happened
            receipts: response.status.take_receipts_checked(None).ok(),
        }
    }
}

#[derive(Debug, Default)]
pub struct PageScan {
    /// Events grouped per transaction, newest transaction first.
    pub batches: Vec<Vec<RoundCompleteEvent>>,
    /// A transaction below the start height was seen; older pages hold nothing.
    pub reached_start: bool,
}

/// Decodes the game's round logs from one page of transactions ordered
/// newest first.
pub fn scan_page(
    decoder: &LogDecoder,
    contract_id: ContractId,
    start_height: u32,
    page: impl IntoIterator<Item = TxLogs>,
) -> Result<PageScan> {
    let mut scan = PageScan::default();
    for tx in page {
        if tx.block_height.is_some_and(|height| height < start_height) {
            scan.reached_start = true;
            break;
        }
        let Some(receipts) = tx.receipts else {
            continue;
        };
        let ours: Vec<Receipt> = receipts
            .into_iter()
            .filter(|receipt| receipt.id() == Some(&contract_id))
            .collect();
        if ours.is_empty() {
            continue;
        }
        let decoded = decoder
            .decode_logs_with_type::<RoundCompleteEvent>(&ours)
            .wrap_err("malformed RoundCompleteEvent log")?;
        if !decoded.is_empty() {
            scan.batches.push(decoded);
        }
    }
    Ok(scan)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::sessions::tests::round;
    use fuels::core::{
        codec::{
            ABIEncoder,
            LogFormatter,
            log_formatters_lookup,
        },
        traits::Tokenizable,
    };
    use std::collections::HashMap;

    const ROUND_LOG_ID: u64 = 4966281541390547989;

    fn game() -> ContractId {
        ContractId::from([7u8; 32])
    }

    fn decoder() -> LogDecoder {
        let formatters = vec![(
            ROUND_LOG_ID.to_string(),
            LogFormatter::new_log::<RoundCompleteEvent>(),
        )];
        LogDecoder::new(log_formatters_lookup(formatters, game()), HashMap::new())
    }

    fn round_log(contract_id: ContractId, event: RoundCompleteEvent) -> Receipt {
        let data = ABIEncoder::default()
            .encode(&[event.into_token()])
            .expect("event encodes");
        Receipt::log_data(contract_id, 0, ROUND_LOG_ID, 0, 0, 0, data)
    }

    fn committed(height: u32, receipts: Vec<Receipt>) -> TxLogs {
        TxLogs {
            block_height: Some(height),
            receipts: Some(receipts),
        }
    }

    #[test]
    fn scan_page__decodes_round_logs_of_the_game_contract() {
        // given
        let page = vec![committed(12, vec![
            round_log(game(), round(1, 10)),
            round_log(game(), round(2, 20)),
        ])];

        // when
        let scan = scan_page(&decoder(), game(), 0, page).unwrap();

        // then
        assert_eq!(scan.batches, vec![vec![round(1, 10), round(2, 20)]]);
        assert!(!scan.reached_start);
    }

    #[test]
    fn scan_page__skips_failed_transactions() {
        // given
        let page = vec![
            TxLogs {
                block_height: Some(13),
                receipts: None,
            },
            committed(12, vec![round_log(game(), round(1, 10))]),
        ];

        // when
        let scan = scan_page(&decoder(), game(), 0, page).unwrap();

        // then
        assert_eq!(scan.batches, vec![vec![round(1, 10)]]);
    }

    #[test]
    fn scan_page__ignores_logs_of_other_contracts() {
        // given
        let other = ContractId::from([8u8; 32]);
        let page = vec![committed(12, vec![
            round_log(other, round(3, 30)),
            round_log(game(), round(1, 10)),
        ])];

        // when
        let scan = scan_page(&decoder(), game(), 0, page).unwrap();

        // then
        assert_eq!(scan.batches, vec![vec![round(1, 10)]]);
    }

    #[test]
    fn scan_page__stops_below_start_height() {
        // given
        let page = vec![
            committed(21, vec![round_log(game(), round(2, 20))]),
            committed(20, vec![round_log(game(), round(1, 10))]),
            committed(19, vec![round_log(game(), round(9, 90))]),
        ];

        // when
        let scan = scan_page(&decoder(), game(), 20, page).unwrap();

        // then
        assert_eq!(scan.batches, vec![vec![round(2, 20)], vec![round(1, 10)]]);
        assert!(scan.reached_start);
    }

    #[test]
    fn scan_page__page_without_game_logs_is_empty() {
        // given
        let page = vec![committed(5, vec![])];

        // when
        let scan = scan_page(&decoder(), game(), 0, page).unwrap();

        // then
        assert!(scan.batches.is_empty());
        assert!(!scan.reached_start);
    }
}
