//! Top-level wiring.
//!
//! [`Assistant`] owns the shared context, the speech pipeline and the
//! command dispatcher, and runs the background workers around the capture
//! loop: viewer event server, presence monitor and reminder check.

use crate::audio::capture::Microphone;
use crate::audio::listener::{Listener, UtteranceHandler};
use crate::audio::playback::CpalPlayback;
use crate::config::AssistantConfig;
use crate::context::AssistantContext;
use crate::error::Result;
use crate::events::{EventBus, EventServer};
use crate::gate::{CommandGate, GateDecision};
use crate::pipeline::Voice;
use crate::pipeline::messages::Utterance;
use crate::pipeline::speech::SpeechPipeline;
use crate::presence::PresenceMonitor;
use crate::reminders::{self, ReminderStore};
use crate::router::{CommandRouter, RouteOutcome};
use crate::services::{AudioSink, Services, Synthesizer, Transcriber};
use crate::settings::SettingsStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long shutdown waits for queued speech (e.g. "Goodbye!") to finish.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);
const OBSERVATION_QUEUE: usize = 64;

/// Gate in front of the router.
pub struct Dispatcher {
    context: Arc<AssistantContext>,
    gate: CommandGate,
    router: CommandRouter,
}

impl Dispatcher {
    pub fn new(context: Arc<AssistantContext>, gate: CommandGate, router: CommandRouter) -> Self {
        Self {
            context,
            gate,
            router,
        }
    }

    /// Gate `utterance` and route it if accepted.
    pub async fn dispatch(&self, utterance: Utterance) -> RouteOutcome {
        let require_wake_word = self.context.settings.require_wake_word();
        match self
            .gate
            .evaluate(&utterance, &self.context.window, require_wake_word)
        {
            GateDecision::Accept(command) => self.router.route(&command).await,
            GateDecision::Reject => RouteOutcome::Continue,
        }
    }
}

#[async_trait]
impl UtteranceHandler for Dispatcher {
    async fn handle(&self, utterance: Utterance) -> RouteOutcome {
        self.dispatch(utterance).await
    }
}

pub struct Assistant {
    config: AssistantConfig,
    context: Arc<AssistantContext>,
    pipeline: Arc<SpeechPipeline>,
    dispatcher: Arc<Dispatcher>,
    reminders: Arc<ReminderStore>,
    presence: Arc<PresenceMonitor>,
}

impl Assistant {
    /// Assemble the assistant from explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the speech stages cannot be started.
    pub fn build(
        config: AssistantConfig,
        synthesizer: Arc<dyn Synthesizer>,
        sink: Arc<dyn AudioSink>,
        services: Services,
    ) -> Result<Self> {
        let data_dir = config.resolved_data_dir();
        let settings = SettingsStore::open(&data_dir.join("settings.json"));
        let context = Arc::new(AssistantContext::new(
            settings,
            EventBus::new(config.events.capacity),
            Duration::from_secs(config.gate.window_secs),
        ));

        let pipeline = Arc::new(SpeechPipeline::new(
            Arc::clone(&context),
            synthesizer,
            sink,
            config.speech.clone(),
        ));
        pipeline.start()?;
        let voice: Arc<dyn Voice> = pipeline.clone();

        let reminders = Arc::new(ReminderStore::new(data_dir.join("reminders.json")));
        let router = CommandRouter::new(
            Arc::clone(&context),
            Arc::clone(&voice),
            services,
            Arc::clone(&reminders),
            &config.chat,
        );
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&context),
            CommandGate::new(&config.gate.wake_tokens),
            router,
        ));
        let presence = Arc::new(PresenceMonitor::new(
            Arc::clone(&context),
            voice,
            &config.presence,
        ));

        Ok(Self {
            config,
            context,
            pipeline,
            dispatcher,
            reminders,
            presence,
        })
    }

    /// Production collaborators: HTTP synthesizer, cpal speaker and the
    /// resolved service set.
    ///
    /// # Errors
    ///
    /// Returns an error if the output device cannot be opened.
    pub fn from_config(config: AssistantConfig) -> Result<Self> {
        let client = crate::services::http_client(config.services.timeout_secs);
        let synthesizer = Arc::new(crate::services::tts::HttpSynthesizer::new(
            &config.tts,
            client,
        ));
        let sink = Arc::new(CpalPlayback::new(&config.audio)?);
        let services = Services::resolve(&config);
        Self::build(config, synthesizer, sink, services)
    }

    pub fn context(&self) -> &Arc<AssistantContext> {
        &self.context
    }

    pub fn voice(&self) -> Arc<dyn Voice> {
        self.pipeline.clone()
    }

    pub fn presence(&self) -> &Arc<PresenceMonitor> {
        &self.presence
    }

    /// Gate and route one text command.
    pub async fn handle_text(&self, text: &str) -> RouteOutcome {
        self.dispatcher
            .dispatch(Utterance::now(text.to_lowercase()))
            .await
    }

    /// Wait until everything queued has been spoken, up to `timeout`.
    pub async fn wait_for_speech(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        // Give the generation stage a moment to pick up fresh requests.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while Instant::now() < deadline {
            if self.pipeline.is_idle() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.pipeline.is_idle()
    }

    /// Run until the user says an exit phrase or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the event server cannot bind.
    pub async fn run(
        &self,
        microphone: &dyn Microphone,
        transcriber: Arc<dyn Transcriber>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let (obs_tx, obs_rx) = mpsc::channel(OBSERVATION_QUEUE);
        let server = if self.config.events.enabled {
            Some(
                EventServer::start(
                    &self.config.events.bind,
                    self.context.events.clone(),
                    Some(obs_tx),
                )
                .await?,
            )
        } else {
            drop(obs_tx);
            None
        };

        let workers = CancellationToken::new();
        let presence = tokio::spawn(Arc::clone(&self.presence).run(obs_rx, workers.clone()));
        let reminder_check = tokio::spawn(reminder_loop(
            Arc::clone(&self.reminders),
            self.voice(),
            Duration::from_secs(self.config.presence.reminder_check_secs.max(1)),
            workers.clone(),
        ));

        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, shutting down");
                ctrl_c.cancel();
            }
        });

        let listener = Listener::new(
            self.config.listener.clone(),
            self.voice(),
            transcriber,
            self.context.events.clone(),
        );
        listener
            .run(microphone, self.dispatcher.as_ref(), cancel.clone())
            .await;

        workers.cancel();
        if !cancel.is_cancelled() && !self.wait_for_speech(DRAIN_TIMEOUT).await {
            warn!("speech still queued at shutdown");
        }
        cancel.cancel();
        let _ = presence.await;
        let _ = reminder_check.await;
        if let Some(server) = server {
            server.shutdown();
        }
        self.shutdown().await;
        Ok(())
    }

    /// Stop the speech stages.
    pub async fn shutdown(&self) {
        let pipeline = Arc::clone(&self.pipeline);
        if tokio::task::spawn_blocking(move || pipeline.shutdown())
            .await
            .is_err()
        {
            warn!("speech pipeline shutdown task failed");
        }
    }
}

/// Announce due reminders every `period` until cancelled.
pub async fn reminder_loop(
    store: Arc<ReminderStore>,
    voice: Arc<dyn Voice>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                let spoken = reminders::announce_due(&store, voice.as_ref(), now).await;
                if spoken > 0 {
                    debug!("announced {spoken} reminders");
                }
            }
        }
    }
}
