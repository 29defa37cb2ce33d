use crate::{
    binding::{
        FuelGameContract,
        GameContract,
    },
    config::AppConfig,
    connector::{
        ConnectedWallet,
        WalletAuthorizer,
        WalletConnector,
    },
    game::{
        GameController,
        HistoryJob,
        HistoryOutcome,
        PlayJob,
        PlayOutcome,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use tokio::sync::mpsc;
use tracing::{
    debug,
    warn,
};

/// Results of spawned work, applied on the UI loop.
pub enum JobEvent<S> {
    Connected(Result<ConnectedWallet<S>>),
    History(HistoryOutcome),
    PlayFinished(PlayOutcome),
}

pub struct App<C: GameContract, W> {
    controller: GameController<C>,
    authorizer: W,
    wallet_name: String,
    network_url: String,
    connecting: bool,
    jobs_tx: mpsc::UnboundedSender<JobEvent<C::Signer>>,
}

impl<C, W> App<C, W>
where
    C: GameContract,
    W: WalletAuthorizer<Signer = C::Signer>,
{
    pub fn new(
        controller: GameController<C>,
        authorizer: W,
        wallet_name: impl Into<String>,
        network_url: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent<C::Signer>>) {
        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let app = Self {
            controller,
            authorizer,
            wallet_name: wallet_name.into(),
            network_url: network_url.into(),
            connecting: false,
            jobs_tx,
        };
        (app, jobs_rx)
    }

    pub fn controller(&self) -> &GameController<C> {
        &self.controller
    }

    fn spawn_connect(&self, password: String) {
        let authorizer = self.authorizer.clone();
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            let result = authorizer.authorize(password).await;
            if tx.send(JobEvent::Connected(result)).is_err() {
                debug!("ui loop gone before wallet connected");
            }
        });
    }

    fn spawn_history(&mut self, job: Option<HistoryJob<C>>) {
        let Some(job) = job else {
            return;
        };
        self.controller.set_status("Loading sessions...");
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            let outcome = job.run().await;
            if tx.send(JobEvent::History(outcome)).is_err() {
                debug!("ui loop gone before history loaded");
            }
        });
    }

    fn spawn_play(&self, job: PlayJob<C>) {
        let tx = self.jobs_tx.clone();
        tokio::spawn(async move {
            let outcome = job.run().await;
            if tx.send(JobEvent::PlayFinished(outcome)).is_err() {
                debug!("ui loop gone before play finished");
            }
        });
    }

    pub fn handle_user_event(&mut self, event: ui::UserEvent) {
        match event {
            ui::UserEvent::Quit | ui::UserEvent::Redraw => {}
            ui::UserEvent::Connect { password } => {
                if self.connecting || self.controller.connection().active {
                    return;
                }
                self.connecting = true;
                self.controller.set_status("Connecting...");
                self.spawn_connect(password);
            }
            ui::UserEvent::Play => {
                if let Some(job) = self.controller.begin_play() {
                    self.spawn_play(job);
                }
            }
            ui::UserEvent::Reload => {
                let job = self.controller.history_job();
                self.spawn_history(job);
            }
        }
    }

    pub fn apply_job_event(&mut self, event: JobEvent<C::Signer>) {
        match event {
            JobEvent::Connected(result) => {
                self.connecting = false;
                let job = self.controller.apply_connection(result);
                self.spawn_history(job);
            }
            JobEvent::History(outcome) => self.controller.apply_history(outcome),
            JobEvent::PlayFinished(outcome) => {
                let job = self.controller.finish_play(outcome);
                self.spawn_history(job);
            }
        }
    }

    fn draw(&self, ui_state: &mut ui::UiState) -> Result<()> {
        let view = ui::ViewModel::new(
            &self.controller,
            &self.wallet_name,
            &self.network_url,
            self.connecting,
        );
        ui::draw(ui_state, &view)
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let AppConfig {
        network,
        wallet,
        contract,
        allowed_chain_ids,
        decimals,
    } = config;
    let wallet_name = wallet.name.clone();
    let connector = WalletConnector::new(network.url(), allowed_chain_ids, wallet);
    let controller = GameController::<FuelGameContract>::new(
        contract.map(|target| target.contract_id),
        decimals,
    )
    .with_history_start(contract.map_or(0, |target| target.start_height));
    let (app, jobs_rx) = App::new(controller, connector, wallet_name, network.url());

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!(network = network.url(), "Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(app, jobs_rx, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<C, W>(
    mut app: App<C, W>,
    mut jobs_rx: mpsc::UnboundedReceiver<JobEvent<C::Signer>>,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()>
where
    C: GameContract,
    W: WalletAuthorizer<Signer = C::Signer>,
{
    app.draw(ui_state).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            maybe_job = jobs_rx.recv() => {
                let Some(job) = maybe_job else {
                    warn!("job channel closed");
                    break;
                };
                app.apply_job_event(job);
                app.draw(ui_state).wrap_err("draw after job update failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let connected = app.controller.connection().active;
                let Some(ev) =
                    ui::interpret_event(ui_state, &mut app.controller.form, connected, event)
                else {
                    continue;
                };
                if matches!(ev, ui::UserEvent::Quit) {
                    break;
                }
                app.handle_user_event(ev);
                app.draw(ui_state).wrap_err("draw after input failed")?;
            }
        }
    }
    tracing::info!("Leaving UI");
    Ok(())
}
