use crate::units::format_units;
use fuels::types::Identity;
use generated_abi::higher_lower_types::{
    RoundCompleteEvent,
    RoundOutcome,
};

/// One finished round, as logged by the contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub player: Identity,
    /// smallest units of the base asset
    pub wager: u64,
    pub player_number: u64,
    pub mystery_number: u64,
    pub guess_higher: bool,
    pub result: RoundOutcome,
}

impl From<RoundCompleteEvent> for SessionRecord {
    fn from(event: RoundCompleteEvent) -> Self {
        let RoundCompleteEvent {
            player,
            wager,
            player_number,
            mystery_number,
            guess_higher,
            result,
        } = event;
        Self {
            player,
            wager,
            player_number,
            mystery_number,
            guess_higher,
            result,
        }
    }
}

impl SessionRecord {
    pub fn player_label(&self) -> String {
        format_identity(&self.player)
    }

    pub fn wager_label(&self, decimals: u32) -> String {
        format_units(self.wager, decimals)
    }

    pub fn guess_label(&self) -> &'static str {
        guess_label(self.guess_higher)
    }

    pub fn result_label(&self) -> &'static str {
        match self.result {
            RoundOutcome::Win => "Win",
            RoundOutcome::Lose => "Lose",
        }
    }
}

pub fn guess_label(guess_higher: bool) -> &'static str {
    if guess_higher { "Higher" } else { "Lower" }
}

pub fn format_identity(identity: &Identity) -> String {
    match identity {
        Identity::Address(address) => format!("0x{}", hex::encode(address)),
        Identity::ContractId(id) => format!("contract 0x{}", hex::encode(id)),
    }
}

/// Maps log entries (oldest first) to records, most recent first.
pub fn sessions_from_events(events: Vec<RoundCompleteEvent>) -> Vec<SessionRecord> {
    events.into_iter().rev().map(SessionRecord::from).collect()
}
