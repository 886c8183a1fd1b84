//! Command router: maps a gated command to exactly one handler.
//!
//! Predicates are checked top to bottom and the first match wins:
//!
//! 1. termination phrases
//! 2. "stop" (barge-in acknowledgment, silent)
//! 3. mood-based music
//! 4. app launching ("open ...")
//! 5. knowledge lookup (skipped for vision-style questions)
//! 6. time and date
//! 7. public IP, web search, news, Google
//! 8. downloads sorting and temp cleanup
//! 9. vision: held object, object list, scene
//! 10. location, weather, system status, screen and volume
//! 11. reminders
//! 12. conversation recall
//! 13. voice switching
//! 14. conversational fallback (or an acknowledgment for an empty command)
//!
//! Handlers speak for themselves through [`Voice`] and never return errors;
//! every collaborator failure becomes a spoken apology.

pub mod history;

use crate::config::ChatConfig;
use crate::context::AssistantContext;
use crate::error::AssistantError;
use crate::gate::strip_fillers;
use crate::pipeline::Voice;
use crate::reminders::{self, ReminderStore};
use crate::services::chat::keyword_reply;
use crate::services::search::summarize;
use crate::services::{Capabilities, Capability, Knowledge, Services, SystemAction};
use crate::settings::{VOICES, voice_by_key};
use crate::tasks::files;
use history::ConversationHistory;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex};
use tracing::{debug, info, warn};

/// Control signal returned to the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Continue,
    Exit,
}

const EXIT_PHRASES: [&str; 6] = ["exit", "quit", "shutdown", "terminate", "code 999", "999"];

/// Words that make a "what is ..." question about the camera, not the encyclopedia.
const VISION_HINTS: [&str; 5] = ["in my hand", "this", "in front", "holding", "see"];

const SEARCH_NOISE: [&str; 5] = ["i want you to", "can you", "please", "find", "ranking of"];

const SAD_SONG_URL: &str = "https://www.youtube.com/watch?v=hLQl3WQQoQ0";
const UPBEAT_SONG_URL: &str = "https://www.youtube.com/watch?v=09R8_2nJtjg";
const NEWS_QUERY: &str = "latest current events news world";

const NO_BROWSER: &str = "I can't open the browser on this machine.";
const NO_VISION: &str = "My vision system is not available.";
const VISION_TROUBLE: &str = "I'm having trouble with my vision right now.";
const CHAT_TROUBLE: &str = "I am having trouble thinking. Please ensure Ollama is running.";
const KNOWLEDGE_FAILED: &str = "Something went wrong with the search.";
const NO_APPS: &str = "I cannot open apps right now.";
const NO_SYSTEM_STATUS: &str = "I cannot check system status.";
const NO_SYSTEM_CONTROL: &str = "I don't have control over the system.";

#[allow(clippy::expect_used)]
static VOICE_CHOICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"voice.*?\b(one|two|three|four|five|six|\d)\b").expect("valid voice choice regex")
});

/// Filesystem locations used by the maintenance handlers.
#[derive(Debug, Clone, Default)]
pub struct RouterPaths {
    pub downloads: Option<PathBuf>,
    pub temp: Option<PathBuf>,
}

impl RouterPaths {
    /// Locations discovered from the environment.
    pub fn detect() -> Self {
        Self {
            downloads: crate::app_dirs::downloads_dir(),
            temp: files::temp_dir_from_env(),
        }
    }
}

pub struct CommandRouter {
    context: Arc<AssistantContext>,
    voice: Arc<dyn Voice>,
    services: Services,
    capabilities: Capabilities,
    reminders: Arc<ReminderStore>,
    history: Mutex<ConversationHistory>,
    system_prompt: String,
    paths: RouterPaths,
}

impl CommandRouter {
    pub fn new(
        context: Arc<AssistantContext>,
        voice: Arc<dyn Voice>,
        services: Services,
        reminders: Arc<ReminderStore>,
        chat: &ChatConfig,
    ) -> Self {
        Self {
            context,
            voice,
            capabilities: services.capabilities(),
            services,
            reminders,
            history: Mutex::new(ConversationHistory::new(chat.history_capacity)),
            system_prompt: chat.system_prompt.clone(),
            paths: RouterPaths::detect(),
        }
    }

    pub fn with_paths(mut self, paths: RouterPaths) -> Self {
        self.paths = paths;
        self
    }

    fn say(&self, text: &str) {
        self.voice.speak(text);
    }

    /// Speak the "not available" line when `capability` did not resolve.
    fn require(&self, capability: Capability) -> bool {
        if self.capabilities.has(capability) {
            return true;
        }
        debug!("{capability:?} is not available");
        self.say(match capability {
            Capability::Vision => NO_VISION,
            Capability::SystemStatus => NO_SYSTEM_STATUS,
            Capability::SystemControl => NO_SYSTEM_CONTROL,
            Capability::AppLaunch => NO_APPS,
            Capability::UrlOpen => NO_BROWSER,
            Capability::Chat => CHAT_TROUBLE,
        });
        false
    }

    /// Route one gated command.
    pub async fn route(&self, command: &str) -> RouteOutcome {
        let command = strip_fillers(&command.to_lowercase());
        let command = command.as_str();
        debug!("routing: {command}");

        if EXIT_PHRASES.iter().any(|p| command.contains(p)) {
            self.say("Goodbye!");
            return RouteOutcome::Exit;
        }
        if command.contains("stop") {
            // Playback was already cut by the capture loop.
            return RouteOutcome::Continue;
        }

        if command.contains("play music") || command.contains("play songs") {
            self.play_music();
        } else if command.contains("open") && self.open_app(command) {
            // launched, or fell back to a web search
        } else if is_knowledge_question(command) {
            self.knowledge(command).await;
        } else if command.contains("time") {
            let now = chrono::Local::now();
            self.say(&format!("The time is {}", now.format("%I:%M %p")));
        } else if command.contains("date") {
            let now = chrono::Local::now();
            self.say(&format!("Today's date is {}", now.format("%B %d, %Y")));
        } else if command.contains("my ip") || command.contains("my internet address") {
            self.public_ip().await;
        } else if command.contains("search web for") || command.contains("search online for") {
            self.web_search(command).await;
        } else if command.contains("current events") {
            self.say("Checking the latest news...");
            self.speak_search(NEWS_QUERY).await;
        } else if command.contains("google") {
            self.google(command);
        } else if command.contains("organize") && command.contains("downloads") {
            self.organize_downloads();
        } else if command.contains("clean") && command.contains("temp") {
            self.clean_temp().await;
        } else if is_held_object_question(command) {
            if self.require(Capability::Vision) {
                self.held_object().await;
            }
        } else if command.contains("what objects") || command.contains("list objects") {
            if self.require(Capability::Vision) {
                self.list_objects().await;
            }
        } else if command.contains("what do you see")
            || command.contains("look at this")
            || command.contains("identify")
        {
            if self.require(Capability::Vision) {
                self.describe_scene().await;
            }
        } else if command.contains("where am i") || command.contains("my location") {
            self.location().await;
        } else if command.contains("weather") {
            self.weather(command).await;
        } else if command.contains("system status")
            || command.contains("cpu")
            || command.contains("battery")
        {
            if self.require(Capability::SystemStatus) {
                self.system_status().await;
            }
        } else if command.contains("screenshot")
            || command.contains("volume")
            || command.contains("mute")
        {
            if self.require(Capability::SystemControl) {
                self.system_control(command);
            }
        } else if command.contains("remind me") || command.contains("set a reminder") {
            let now = chrono::Local::now().naive_local();
            for line in reminders::handle_command(&self.reminders, command, now) {
                self.say(&line);
            }
        } else if command.contains("what did i say") || command.contains("repeat me") {
            self.recall();
        } else if command.contains("change voice")
            || command.contains("switch voice")
            || command.contains("set voice")
        {
            self.switch_voice(command);
        } else if command.is_empty() {
            self.say("Yes? I am listening.");
        } else {
            self.converse(command).await;
        }
        RouteOutcome::Continue
    }

    fn play_music(&self) {
        let url = if self.context.emotion.is("sad") {
            self.say("I see you are feeling down. Playing something to match your mood.");
            SAD_SONG_URL
        } else {
            self.say("Playing some upbeat music for you!");
            UPBEAT_SONG_URL
        };
        self.open_url(url);
    }

    fn open_url(&self, url: &str) {
        if !self.require(Capability::UrlOpen) {
            return;
        }
        if let Some(opener) = &self.services.opener
            && let Err(e) = opener.open_url(url)
        {
            warn!("failed to open {url}: {e}");
            self.say(NO_BROWSER);
        }
    }

    /// Returns `false` when there is no usable app name, letting later
    /// predicates have a go at the command.
    fn open_app(&self, command: &str) -> bool {
        let app_name = command.rsplit("open").next().unwrap_or_default().trim();
        if app_name.chars().count() <= 1 {
            return false;
        }
        self.say(&format!("Opening {app_name}"));
        if !self.require(Capability::AppLaunch) {
            return true;
        }
        if let Some(launcher) = &self.services.launcher
            && let Err(e) = launcher.launch(app_name)
        {
            info!("launch failed ({e}), searching the web instead");
            self.open_url(&google_url(app_name));
        }
        true
    }

    async fn knowledge(&self, command: &str) {
        let query = command
            .replace("who is", "")
            .replace("what is", "")
            .replace("tell me about", "");
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        self.say(&format!("Searching for {query}..."));
        match self.services.knowledge.lookup(query).await {
            Ok(Knowledge::Summary(summary)) => self.say(&summary),
            Ok(Knowledge::Ambiguous) => {
                self.say("There are multiple results for that. Be more specific.");
            }
            Ok(Knowledge::NotFound) => self.say("I couldn't find anything on that."),
            Err(e) => {
                warn!("knowledge lookup failed: {e}");
                self.say(KNOWLEDGE_FAILED);
            }
        }
    }

    async fn public_ip(&self) {
        match self.services.network.public_ip().await {
            Ok(ip) => self.say(&format!("Your public IP address is {ip}")),
            Err(e) => {
                warn!("ip lookup failed: {e}");
                self.say("I couldn't enable your IP address retrieval.");
            }
        }
    }

    async fn web_search(&self, command: &str) {
        let mut query = command
            .replace("search web for", "")
            .replace("search online for", "");
        for noise in SEARCH_NOISE {
            query = query.replace(noise, "");
        }
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        self.say(&format!("Searching the web for {query}..."));
        self.speak_search(&query).await;
    }

    async fn speak_search(&self, query: &str) {
        match self.services.search.search(query, 2).await {
            Ok(snippets) => match summarize(&snippets) {
                Some(summary) => self.say(&summary),
                None => self.say("I couldn't find any information on that."),
            },
            Err(e) => {
                warn!("web search failed: {e}");
                self.say("I am having trouble connecting to the internet search.");
            }
        }
    }

    fn google(&self, command: &str) {
        let query = command
            .replace("google", "")
            .replace("search", "")
            .replace("for", "");
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        self.say(&format!("Opening Google for {query}"));
        self.open_url(&google_url(&query));
    }

    fn organize_downloads(&self) {
        let Some(downloads) = self.paths.downloads.as_deref().filter(|p| p.is_dir()) else {
            self.say("I couldn't find your Downloads folder.");
            return;
        };
        match files::organize_downloads(downloads) {
            Ok(count) => self.say(&format!(
                "I have organized {count} files in your Downloads folder."
            )),
            Err(e) => {
                warn!("organizing downloads failed: {e}");
                self.say("I couldn't find your Downloads folder.");
            }
        }
    }

    async fn clean_temp(&self) {
        let Some(temp) = self.paths.temp.clone() else {
            self.say("I couldn't locate the temp folder.");
            return;
        };
        let count = tokio::task::spawn_blocking(move || files::clean_temp(&temp))
            .await
            .unwrap_or_default();
        self.say(&format!(
            "I have deleted {count} temporary junk files. Your system should be faster now."
        ));
    }

    async fn held_object(&self) {
        let Some(vision) = &self.services.vision else {
            return;
        };
        match vision.center_object().await {
            Ok(Some(object)) => match object.color {
                Some(color) => self.say(&format!("That looks like a {color} {}.", object.label)),
                None => self.say(&format!("That looks like a {}.", object.label)),
            },
            Ok(None) => self.say("I don't see anything clearly in front of me."),
            Err(e) => self.vision_failed(&e, "I couldn't access the camera."),
        }
    }

    async fn list_objects(&self) {
        let Some(vision) = &self.services.vision else {
            return;
        };
        match vision.object_names().await {
            Ok(names) if names.is_empty() => self.say("I don't see any objects."),
            Ok(names) => self.say(&format!("I can detect: {}.", names.join(", "))),
            Err(e) => self.vision_failed(&e, "I couldn't access the camera."),
        }
    }

    async fn describe_scene(&self) {
        let Some(vision) = &self.services.vision else {
            return;
        };
        match vision.describe_scene().await {
            Ok(summary) => self.say(&summary),
            Err(e) => self.vision_failed(&e, "I couldn't access the camera feed."),
        }
    }

    fn vision_failed(&self, error: &AssistantError, no_camera: &str) {
        warn!("vision request failed: {error}");
        if matches!(error, AssistantError::Unavailable(_)) {
            self.say(no_camera);
        } else {
            self.say(VISION_TROUBLE);
        }
    }

    async fn location(&self) {
        match self.services.network.location().await {
            Ok(Some(location)) => self.say(&format!("You are currently in {location}")),
            Ok(None) => self.say("I couldn't determine your location."),
            Err(e) => {
                warn!("location lookup failed: {e}");
                self.say("I couldn't determine your location.");
            }
        }
    }

    async fn weather(&self, command: &str) {
        let mut city = weather_city(command).unwrap_or_default();
        if city.is_empty() {
            let location = self.services.network.location().await.unwrap_or_else(|e| {
                warn!("location lookup failed: {e}");
                None
            });
            match location.and_then(|l| l.split(',').next().map(|c| c.trim().to_owned())) {
                Some(c) if !c.is_empty() => city = c,
                _ => {
                    self.say("I need to know which city to check for.");
                    return;
                }
            }
        }
        match self.services.network.weather(&city).await {
            Ok(Some(report)) => self.say(&format!("The weather in {city} is {report}")),
            Ok(None) => self.say("I couldn't fetch the weather."),
            Err(e) => {
                warn!("weather lookup failed: {e}");
                self.say("Weather service is unreachable.");
            }
        }
    }

    async fn system_status(&self) {
        let Some(monitor) = self.services.system_monitor.clone() else {
            return;
        };
        let report = tokio::task::spawn_blocking(move || monitor.status_report()).await;
        match report {
            Ok(Ok(status)) => self.say(&status),
            Ok(Err(e)) => {
                warn!("system status failed: {e}");
                self.say(NO_SYSTEM_STATUS);
            }
            Err(e) => {
                warn!("system status task failed: {e}");
                self.say(NO_SYSTEM_STATUS);
            }
        }
    }

    fn system_control(&self, command: &str) {
        let Some(control) = &self.services.system_control else {
            return;
        };
        let action = if command.contains("screenshot") {
            SystemAction::Screenshot
        } else if command.contains("volume up") {
            SystemAction::VolumeUp
        } else if command.contains("volume down") {
            SystemAction::VolumeDown
        } else if command.contains("mute") {
            SystemAction::Mute
        } else {
            debug!("no system action in '{command}'");
            return;
        };
        match control.perform(action) {
            Ok(line) => self.say(&line),
            Err(e) => {
                warn!("system action {action:?} failed: {e}");
                self.say("I couldn't do that on this system.");
            }
        }
    }

    fn recall(&self) {
        let last = self
            .history
            .lock()
            .ok()
            .and_then(|h| h.last_user_text().map(str::to_owned));
        match last {
            Some(text) => self.say(&format!("You just said: {text}")),
            None => self.say("I don't remember you saying anything before this."),
        }
    }

    fn switch_voice(&self, command: &str) {
        let by_number = VOICE_CHOICE
            .captures(command)
            .and_then(|c| number_key(&c[1]))
            .and_then(voice_by_key);
        let by_gender = || {
            if ["female", "girl", "woman"].iter().any(|w| command.contains(w)) {
                voice_by_key("1")
            } else if command.contains("male") || command.contains("man") {
                voice_by_key("2")
            } else {
                None
            }
        };

        match by_number.or_else(by_gender) {
            Some(profile) => {
                if let Err(e) = self.context.settings.set_voice(profile.id) {
                    warn!("voice change not persisted: {e}");
                }
                info!("voice set to {}", profile.id);
                self.say(&format!("Voice changed to {}.", profile.name));
            }
            None => {
                let options = VOICES
                    .iter()
                    .map(|v| format!("{} for {}", v.key, v.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.say(&format!(
                    "Please say 'voice' followed by a number. Options are: {options}"
                ));
            }
        }
    }

    async fn converse(&self, text: &str) {
        let chat = self
            .services
            .chat
            .as_ref()
            .filter(|_| self.capabilities.has(Capability::Chat));
        let Some(chat) = chat else {
            let reply = keyword_reply(text);
            self.say(reply);
            self.remember(text, reply);
            return;
        };

        let messages = match self.history.lock() {
            Ok(h) => h.to_messages(&self.system_prompt, text),
            Err(poisoned) => poisoned.into_inner().to_messages(&self.system_prompt, text),
        };
        let voice = Arc::clone(&self.voice);
        let on_sentence = move |sentence: &str| voice.speak(sentence);

        match chat.chat(&messages, &on_sentence).await {
            Ok(full) => self.remember(text, &full),
            Err(e) => {
                warn!("chat failed: {e}");
                self.say(CHAT_TROUBLE);
            }
        }
    }

    fn remember(&self, user: &str, assistant: &str) {
        match self.history.lock() {
            Ok(mut h) => h.push(user, assistant),
            Err(poisoned) => poisoned.into_inner().push(user, assistant),
        }
    }
}

fn is_knowledge_question(command: &str) -> bool {
    let asks = command.contains("who is")
        || command.contains("what is")
        || command.contains("tell me about");
    asks && !VISION_HINTS.iter().any(|h| command.contains(h))
}

fn is_held_object_question(command: &str) -> bool {
    command.contains("in my hand")
        || command.contains("in hand")
        || command.contains("what am i holding")
        || command.contains("what's in my hand")
        || (command.contains("what is") && command.contains("this"))
}

/// City named after the last standalone "in".
fn weather_city(command: &str) -> Option<String> {
    let (_, city) = command.rsplit_once(" in ")?;
    let city = city.trim().trim_end_matches(['?', '.', '!']).trim();
    (!city.is_empty()).then(|| city.to_owned())
}

fn number_key(word: &str) -> Option<&'static str> {
    Some(match word {
        "one" | "1" => "1",
        "two" | "2" => "2",
        "three" | "3" => "3",
        "four" | "4" => "4",
        "five" | "5" => "5",
        "six" | "6" => "6",
        _ => return None,
    })
}

fn google_url(query: &str) -> String {
    format!(
        "https://www.google.com/search?q={}",
        urlencoding::encode(query)
    )
}
