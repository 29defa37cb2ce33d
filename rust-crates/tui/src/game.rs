//! Component state for one player session: connection, contract binding,
//! round history and the play form.
//!
//! Asynchronous work is split into jobs (`HistoryJob`, `PlayJob`) that own
//! everything they need, so the UI loop can spawn them and feed the outcome
//! back through `apply_history` / `finish_play`. `fetch_sessions` and `play`
//! run the same jobs inline.

use crate::{
    binding::{
        GameContract,
        PlayRequest,
    },
    connector::ConnectedWallet,
    sessions::{
        SessionRecord,
        sessions_from_events,
    },
    units::parse_units,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use fuels::types::{
    Address,
    ContractId,
};
use tracing::{
    debug,
    error,
    info,
};

const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub active: bool,
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormState {
    pub wager: String,
    pub display_number: String,
    pub guess_higher: bool,
    pub is_submitting: bool,
}

impl Default for FormState {
    fn default() -> Self {
        FormState {
            wager: String::new(),
            display_number: String::new(),
            guess_higher: true,
            is_submitting: false,
        }
    }
}

impl FormState {
    /// Accepts digits and a single decimal point.
    pub fn push_wager_char(&mut self, c: char) -> bool {
        let accepted = c.is_ascii_digit() || (c == '.' && !self.wager.contains('.'));
        if accepted {
            self.wager.push(c);
        }
        accepted
    }

    pub fn push_display_char(&mut self, c: char) -> bool {
        let accepted = c.is_ascii_digit();
        if accepted {
            self.display_number.push(c);
        }
        accepted
    }

    pub fn pop_wager_char(&mut self) {
        self.wager.pop();
    }

    pub fn pop_display_char(&mut self) {
        self.display_number.pop();
    }

    pub fn toggle_guess(&mut self) {
        self.guess_higher = !self.guess_higher;
    }
}

struct Binding<C> {
    generation: u64,
    contract_id: ContractId,
    account: Address,
    contract: C,
}

/// Loads the full round history from one binding.
pub struct HistoryJob<C> {
    generation: u64,
    load: u64,
    contract: C,
}

pub struct HistoryOutcome {
    generation: u64,
    /// issue order of the load; later loads supersede earlier ones
    load: u64,
    result: Result<Vec<SessionRecord>>,
}

impl<C: GameContract> HistoryJob<C> {
    pub async fn run(self) -> HistoryOutcome {
        let result = self
            .contract
            .round_history()
            .await
            .map(sessions_from_events);
        HistoryOutcome {
            generation: self.generation,
            load: self.load,
            result,
        }
    }
}

/// Submits one play and waits for it to be committed.
pub struct PlayJob<C> {
    contract: C,
    request: PlayRequest,
}

pub struct PlayOutcome {
    request: PlayRequest,
    result: Result<()>,
}

impl<C: GameContract> PlayJob<C> {
    pub async fn run(self) -> PlayOutcome {
        let result = self.contract.win_or_lose(self.request).await;
        PlayOutcome {
            request: self.request,
            result,
        }
    }
}

pub struct GameController<C: GameContract> {
    contract_id: Option<ContractId>,
    decimals: u32,
    connection: ConnectionState,
    signer: Option<C::Signer>,
    binding: Option<Binding<C>>,
    next_generation: u64,
    history_start: u32,
    next_load: u64,
    applied_load: u64,
    sessions: Vec<SessionRecord>,
    pub form: FormState,
    status: String,
    errors: Vec<String>,
}

impl<C: GameContract> GameController<C> {
    pub fn new(contract_id: Option<ContractId>, decimals: u32) -> Self {
        Self {
            contract_id,
            decimals,
            connection: ConnectionState::default(),
            signer: None,
            binding: None,
            next_generation: 0,
            history_start: 0,
            next_load: 0,
            applied_load: 0,
            sessions: Vec::new(),
            form: FormState::default(),
            status: String::from("Not connected"),
            errors: Vec::new(),
        }
    }

    /// First block that can hold the configured contract's rounds.
    pub fn with_history_start(mut self, height: u32) -> Self {
        self.history_start = height;
        self
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    pub fn contract_id(&self) -> Option<ContractId> {
        self.contract_id
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_error(&mut self, message: String) {
        self.errors.push(message);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    /// Applies the result of a wallet authorization attempt. A new binding, if
    /// one could be made, comes back as the history load it triggers.
    pub fn apply_connection(
        &mut self,
        result: Result<ConnectedWallet<C::Signer>>,
    ) -> Option<HistoryJob<C>> {
        match result {
            Ok(connected) => {
                self.connection = ConnectionState {
                    active: true,
                    account: Some(connected.account),
                    chain_id: Some(connected.chain_id),
                };
                self.signer = Some(connected.signer);
                // a fresh signer always means a fresh binding
                self.binding = None;
                self.set_status("Wallet connected");
                self.sync_binding()
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "error connecting wallet");
                self.push_error(format!("Wallet connection failed: {err:#}"));
                self.set_status("Not connected");
                None
            }
        }
    }

    pub fn set_contract_id(&mut self, contract_id: Option<ContractId>) -> Option<HistoryJob<C>> {
        if contract_id != self.contract_id {
            // nothing is known about where another contract was deployed
            self.history_start = 0;
        }
        self.contract_id = contract_id;
        self.sync_binding()
    }

    /// Recomputes the binding from the current inputs.
    pub fn sync_binding(&mut self) -> Option<HistoryJob<C>> {
        let inputs = match (
            self.connection.active,
            self.connection.account,
            self.contract_id,
            self.signer.as_ref(),
        ) {
            (true, Some(account), Some(contract_id), Some(signer)) => {
                Some((account, contract_id, signer.clone()))
            }
            _ => None,
        };

        let Some((account, contract_id, signer)) = inputs else {
            if self.binding.take().is_some() {
                debug!("contract binding dropped");
            }
            return None;
        };

        if let Some(binding) = &self.binding
            && binding.contract_id == contract_id
            && binding.account == account
        {
            return None;
        }

        self.next_generation += 1;
        self.binding = Some(Binding {
            generation: self.next_generation,
            contract_id,
            account,
            contract: C::bind(contract_id, self.history_start, signer),
        });
        info!(
            %contract_id,
            %account,
            generation = self.next_generation,
            from_block = self.history_start,
            "contract bound"
        );
        self.history_job()
    }

    /// `None` when there is nothing to load from.
    pub fn history_job(&mut self) -> Option<HistoryJob<C>> {
        let binding = self.binding.as_ref()?;
        self.next_load += 1;
        Some(HistoryJob {
            generation: binding.generation,
            load: self.next_load,
            contract: binding.contract.clone(),
        })
    }

    pub fn apply_history(&mut self, outcome: HistoryOutcome) {
        let current = self.binding.as_ref().map(|b| b.generation);
        if current != Some(outcome.generation) {
            debug!(
                generation = outcome.generation,
                "discarding history from a previous binding"
            );
            return;
        }
        if outcome.load < self.applied_load {
            debug!(
                load = outcome.load,
                applied = self.applied_load,
                "discarding history superseded by a newer load"
            );
            return;
        }
        self.applied_load = outcome.load;
        match outcome.result {
            Ok(sessions) => {
                info!(count = sessions.len(), "player sessions loaded");
                self.set_status(format!("Loaded {} session(s)", sessions.len()));
                self.sessions = sessions;
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "error fetching sessions");
                self.push_error(format!("Failed to load sessions: {err:#}"));
            }
        }
    }

    fn play_request(&self) -> Result<PlayRequest> {
        let wager = parse_units(&self.form.wager, self.decimals)?;
        let display = self
            .form
            .display_number
            .trim()
            .parse::<u64>()
            .wrap_err_with(|| format!("invalid number '{}'", self.form.display_number))?;
        Ok(PlayRequest {
            wager,
            display,
            guess_higher: self.form.guess_higher,
        })
    }

    /// Starts a play if one is allowed: bound, both fields filled, nothing in
    /// flight. Anything else is silently ignored.
    pub fn begin_play(&mut self) -> Option<PlayJob<C>> {
        if self.form.is_submitting {
            return None;
        }
        let contract = self.binding.as_ref()?.contract.clone();
        if self.form.wager.trim().is_empty() || self.form.display_number.trim().is_empty() {
            return None;
        }
        let request = match self.play_request() {
            Ok(request) => request,
            Err(err) => {
                error!(error = %format!("{err:#}"), "error playing game");
                self.push_error(format!("Play failed: {err:#}"));
                return None;
            }
        };
        self.form.is_submitting = true;
        self.set_status("Playing...");
        info!(?request, "submitting play");
        Some(PlayJob { contract, request })
    }

    /// Clears the submitting flag. A confirmed play hands back the history
    /// reload it requires.
    pub fn finish_play(&mut self, outcome: PlayOutcome) -> Option<HistoryJob<C>> {
        self.form.is_submitting = false;
        match outcome.result {
            Ok(()) => {
                info!(request = ?outcome.request, "play confirmed");
                self.set_status("Round confirmed; reloading sessions");
                self.history_job()
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "error playing game");
                self.push_error(format!("Play failed: {err:#}"));
                self.set_status("Play failed");
                None
            }
        }
    }

    pub async fn fetch_sessions(&mut self) {
        if let Some(job) = self.history_job() {
            let outcome = job.run().await;
            self.apply_history(outcome);
        }
    }

    pub async fn play(&mut self) {
        let Some(job) = self.begin_play() else {
            return;
        };
        let outcome = job.run().await;
        if let Some(reload) = self.finish_play(outcome) {
            let outcome = reload.run().await;
            self.apply_history(outcome);
        }
    }
}
