//! Desktop integration through platform command-line tools.
//!
//! Each helper is probed once with [`which`] at startup. If the tool it needs
//! is missing, `detect` returns `None` and the capability is reported as
//! unavailable.

use super::{AppLauncher, SystemAction, SystemControl, UrlOpener};
use crate::error::{AssistantError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Spawn `program args` detached from our stdio.
fn spawn_detached(program: &Path, args: &[&str]) -> Result<()> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| AssistantError::Service(format!("{}: {e}", program.display())))
}

/// Run `program args` to completion, failing on non-zero exit.
fn run_checked(program: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| AssistantError::Service(format!("{}: {e}", program.display())))?;
    if status.success() {
        Ok(())
    } else {
        Err(AssistantError::Service(format!(
            "{} exited with {status}",
            program.display()
        )))
    }
}

fn first_available(candidates: &[&str]) -> Option<PathBuf> {
    candidates.iter().find_map(|c| which::which(c).ok())
}

/// Opens URLs with the platform's default handler.
pub struct SystemOpener {
    program: PathBuf,
}

impl SystemOpener {
    pub fn detect() -> Option<Self> {
        let candidates: &[&str] = if cfg!(target_os = "macos") {
            &["open"]
        } else if cfg!(target_os = "windows") {
            &["explorer"]
        } else {
            &["xdg-open", "gio"]
        };
        first_available(candidates).map(|program| Self { program })
    }
}

impl UrlOpener for SystemOpener {
    fn open_url(&self, url: &str) -> Result<()> {
        debug!("opening {url}");
        if self.program.ends_with("gio") {
            spawn_detached(&self.program, &["open", url])
        } else {
            spawn_detached(&self.program, &[url])
        }
    }
}

/// Launches applications found on `PATH` by their spoken name.
pub struct PathLauncher {
    mac_open: Option<PathBuf>,
}

impl PathLauncher {
    pub fn detect() -> Option<Self> {
        let mac_open = cfg!(target_os = "macos")
            .then(|| which::which("open").ok())
            .flatten();
        Some(Self { mac_open })
    }

    /// Executable names to try for a spoken app name, closest first.
    fn candidates(app_name: &str) -> Vec<String> {
        let name = app_name.trim().to_lowercase();
        let mut out = vec![
            name.clone(),
            name.replace(' ', "-"),
            name.replace(' ', ""),
            name.replace(' ', "_"),
        ];
        if let Some(first) = name.split_whitespace().next() {
            out.push(first.to_owned());
        }
        out.dedup();
        out
    }
}

impl AppLauncher for PathLauncher {
    fn launch(&self, app_name: &str) -> Result<()> {
        for candidate in Self::candidates(app_name) {
            if let Ok(path) = which::which(&candidate) {
                info!("launching {}", path.display());
                return spawn_detached(&path, &[]);
            }
        }
        if let Some(open) = &self.mac_open {
            return run_checked(open, &["-a", app_name]);
        }
        Err(AssistantError::Service(format!("no application named '{app_name}'")))
    }
}

enum VolumeBackend {
    Pactl(PathBuf),
    Amixer(PathBuf),
    Osascript(PathBuf),
}

/// Screenshots and volume keys.
pub struct CommandSystemControl {
    screenshot: Option<PathBuf>,
    volume: Option<VolumeBackend>,
    screenshots_dir: PathBuf,
}

impl CommandSystemControl {
    pub fn detect(screenshots_dir: PathBuf) -> Option<Self> {
        let screenshot = first_available(&[
            "screencapture",
            "grim",
            "gnome-screenshot",
            "scrot",
            "import",
        ]);
        let volume = if let Ok(p) = which::which("pactl") {
            Some(VolumeBackend::Pactl(p))
        } else if let Ok(p) = which::which("amixer") {
            Some(VolumeBackend::Amixer(p))
        } else if cfg!(target_os = "macos") {
            which::which("osascript").ok().map(VolumeBackend::Osascript)
        } else {
            None
        };
        if screenshot.is_none() && volume.is_none() {
            return None;
        }
        Some(Self {
            screenshot,
            volume,
            screenshots_dir,
        })
    }

    fn take_screenshot(&self) -> Result<String> {
        let tool = self
            .screenshot
            .as_ref()
            .ok_or_else(|| AssistantError::Unavailable("screenshot tool".into()))?;
        std::fs::create_dir_all(&self.screenshots_dir)?;
        let filename = format!(
            "screenshot_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let target = self.screenshots_dir.join(&filename);
        let target_lossy = target.to_string_lossy();
        let target_str: &str = &target_lossy;

        let tool_name = tool
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args: Vec<&str> = match tool_name.as_str() {
            "screencapture" => vec!["-x", target_str],
            "gnome-screenshot" => vec!["-f", target_str],
            "import" => vec!["-window", "root", target_str],
            _ => vec![target_str],
        };
        run_checked(tool, &args)?;
        Ok(format!("Screenshot taken and saved as {filename}"))
    }

    fn change_volume(&self, action: SystemAction) -> Result<()> {
        let backend = self
            .volume
            .as_ref()
            .ok_or_else(|| AssistantError::Unavailable("volume control".into()))?;
        match (backend, action) {
            (VolumeBackend::Pactl(p), SystemAction::VolumeUp) => {
                run_checked(p, &["set-sink-volume", "@DEFAULT_SINK@", "+10%"])
            }
            (VolumeBackend::Pactl(p), SystemAction::VolumeDown) => {
                run_checked(p, &["set-sink-volume", "@DEFAULT_SINK@", "-10%"])
            }
            (VolumeBackend::Pactl(p), _) => {
                run_checked(p, &["set-sink-mute", "@DEFAULT_SINK@", "toggle"])
            }
            (VolumeBackend::Amixer(p), SystemAction::VolumeUp) => {
                run_checked(p, &["-q", "sset", "Master", "10%+"])
            }
            (VolumeBackend::Amixer(p), SystemAction::VolumeDown) => {
                run_checked(p, &["-q", "sset", "Master", "10%-"])
            }
            (VolumeBackend::Amixer(p), _) => run_checked(p, &["-q", "sset", "Master", "toggle"]),
            (VolumeBackend::Osascript(p), SystemAction::VolumeUp) => run_checked(
                p,
                &["-e", "set volume output volume ((output volume of (get volume settings)) + 10)"],
            ),
            (VolumeBackend::Osascript(p), SystemAction::VolumeDown) => run_checked(
                p,
                &["-e", "set volume output volume ((output volume of (get volume settings)) - 10)"],
            ),
            (VolumeBackend::Osascript(p), _) => {
                run_checked(p, &["-e", "set volume with output muted"])
            }
        }
    }
}

impl SystemControl for CommandSystemControl {
    fn perform(&self, action: SystemAction) -> Result<String> {
        match action {
            SystemAction::Screenshot => self.take_screenshot(),
            SystemAction::VolumeUp => {
                self.change_volume(action)?;
                Ok("Volume increased.".to_owned())
            }
            SystemAction::VolumeDown => {
                self.change_volume(action)?;
                Ok("Volume decreased.".to_owned())
            }
            SystemAction::Mute => {
                self.change_volume(action)?;
                Ok("System muted.".to_owned())
            }
        }
    }
}
