use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use watcher_core::{update, Msg, SettingsStore, WatcherOptions, WatcherState};
use watcher_engine::{
    CacheStorage, DirectoryCacheStorage, Downloader, MemoryCacheStorage, MemoryTimeline,
    ReqwestDownloader,
};
use watcher_logging::{watcher_info, watcher_warn};

use super::commands::{parse_command, Command, HELP};
use super::config::WatcherConfig;
use super::effects::{ConsoleLine, EffectRunner};
use super::persistence::RonSettingsStore;
use super::render::{format_status, summary_line};

/// Throttles status logging, like a UI repaint tick.
const STATUS_TICK: Duration = Duration::from_millis(500);

/// Host capabilities the watcher runs against.
pub struct Hosts {
    pub timeline: Arc<MemoryTimeline>,
    pub storage: Arc<dyn CacheStorage>,
    pub downloader: Arc<dyn Downloader>,
    pub settings: Box<dyn SettingsStore>,
}

pub async fn run_app(config: WatcherConfig) -> anyhow::Result<()> {
    let storage: Arc<dyn CacheStorage> = match &config.cache_dir {
        Some(dir) => {
            watcher_info!("Polling cache manifests in {:?}", dir);
            Arc::new(DirectoryCacheStorage::new(dir.clone()))
        }
        None => Arc::new(MemoryCacheStorage::new()),
    };
    let downloader = ReqwestDownloader::new(config.download_settings())
        .context("could not build the HTTP client")?;
    let hosts = Hosts {
        timeline: Arc::new(MemoryTimeline::new()),
        storage,
        downloader: Arc::new(downloader),
        settings: Box::new(RonSettingsStore::open(config.settings_path.clone())),
    };

    let mut app = App::new(config.watcher_options(), hosts, std::io::stdout());
    app.controller.print_raw(HELP);
    app.run(BufReader::new(tokio::io::stdin())).await
}

/// Owns the watcher state and everything its effects touch. Runs on a
/// single task, so `update` always sees messages one at a time.
pub struct Controller<W: Write> {
    state: WatcherState,
    runner: EffectRunner,
    timeline: Arc<MemoryTimeline>,
    console: W,
}

impl<W: Write> Controller<W> {
    #[cfg(test)]
    fn state(&self) -> &WatcherState {
        &self.state
    }

    #[cfg(test)]
    fn runner(&self) -> &EffectRunner {
        &self.runner
    }

    #[cfg(test)]
    fn console(&self) -> &W {
        &self.console
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for line in self.runner.run(effects) {
            match line {
                ConsoleLine::Notice(text) => self.print_raw(&text),
                ConsoleLine::Error(text) => self.print_raw(&format!("error: {text}")),
            }
        }
    }

    /// Handles one input line. Returns `false` when the user asked to quit.
    pub fn handle_line(&mut self, line: &str) -> bool {
        match parse_command(line) {
            Ok(Some(command)) => self.handle_command(command),
            Ok(None) => true,
            Err(err) => {
                self.print_raw(&format!("error: {err}"));
                true
            }
        }
    }

    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Dispatch(msg) => self.dispatch(msg),
            Command::Load(url) => {
                self.timeline.record(url);
            }
            Command::Status => {
                let text = format_status(&self.state.view());
                self.print_raw(text.trim_end());
            }
            Command::Help => self.print_raw(HELP),
            Command::Quit => return false,
        }
        true
    }

    fn tick(&mut self) {
        self.dispatch(Msg::Tick);
        if self.state.consume_dirty() {
            watcher_info!("{}", summary_line(&self.state.view()));
        }
    }

    fn print_raw(&mut self, text: &str) {
        if let Err(err) = writeln!(self.console, "{text}").and_then(|()| self.console.flush()) {
            watcher_warn!("Console write failed: {}", err);
        }
    }
}

/// Controller plus the fan-in inbox every source and the engine report to.
pub struct App<W: Write> {
    controller: Controller<W>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
}

impl<W: Write> App<W> {
    /// Must be called inside a tokio runtime.
    pub fn new(options: WatcherOptions, hosts: Hosts, console: W) -> Self {
        let Hosts {
            timeline,
            storage,
            downloader,
            mut settings,
        } = hosts;
        let state = WatcherState::load(options, settings.as_mut());
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let runner = EffectRunner::new(timeline.clone(), storage, downloader, settings, msg_tx);
        Self {
            controller: Controller {
                state,
                runner,
                timeline,
                console,
            },
            msg_rx,
        }
    }

    #[cfg(test)]
    fn controller(&self) -> &Controller<W> {
        &self.controller
    }

    #[cfg(test)]
    fn controller_mut(&mut self) -> &mut Controller<W> {
        &mut self.controller
    }

    /// Serves input lines and inbox messages until `quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(self, input: R) -> anyhow::Result<()> {
        let App {
            mut controller,
            mut msg_rx,
        } = self;
        let mut lines = input.lines();
        let mut ticker = time::interval(STATUS_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line.context("could not read command input")? {
                        Some(line) => {
                            if !controller.handle_line(&line) {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                Some(msg) = msg_rx.recv() => controller.dispatch(msg),
                _ = ticker.tick() => controller.tick(),
            }
        }

        watcher_info!("Shutting down: {}", summary_line(&controller.state.view()));
        Ok(())
    }

    /// Dispatches inbox messages until `done` holds or `limit` passes.
    #[cfg(test)]
    async fn process_until<F>(&mut self, limit: Duration, done: F) -> bool
    where
        F: Fn(&WatcherState) -> bool,
    {
        let deadline = time::Instant::now() + limit;
        while !done(&self.controller.state) {
            match time::timeout_at(deadline, self.msg_rx.recv()).await {
                Ok(Some(msg)) => self.controller.dispatch(msg),
                Ok(None) | Err(_) => return false,
            }
        }
        true
    }
}
