//! Desktop notification sink
//!
//! Notifications are best-effort: the helper process runs on its own thread
//! and any failure is logged at debug level and otherwise dropped.

use std::process::Command;
use std::sync::Arc;

/// Something that can show an alert to the user
pub trait Notifier {
    fn notify(&self, title: &str, subtitle: &str, body: &str, play_sound: bool);
}

impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    fn notify(&self, title: &str, subtitle: &str, body: &str, play_sound: bool) {
        (**self).notify(title, subtitle, body, play_sound)
    }
}

/// OS notification center (`osascript` on macOS, `notify-send` elsewhere)
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, subtitle: &str, body: &str, play_sound: bool) {
        let commands = build_commands(title, subtitle, body, play_sound);

        std::thread::spawn(move || {
            for mut cmd in commands {
                match cmd.output() {
                    Ok(output) if !output.status.success() => {
                        tracing::debug!(
                            "Notification helper {:?} exited with {}",
                            cmd.get_program(),
                            output.status
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("Failed to run {:?}: {}", cmd.get_program(), e);
                    }
                }
            }
        });
    }
}

#[cfg(target_os = "macos")]
fn build_commands(title: &str, subtitle: &str, body: &str, play_sound: bool) -> Vec<Command> {
    let mut cmd = Command::new("osascript");
    cmd.arg("-e").arg(applescript(title, subtitle, body, play_sound));
    vec![cmd]
}

#[cfg(not(target_os = "macos"))]
fn build_commands(title: &str, subtitle: &str, body: &str, play_sound: bool) -> Vec<Command> {
    let text = if subtitle.is_empty() {
        body.to_string()
    } else {
        format!("{}\n{}", subtitle, body)
    };

    let mut notify = Command::new("notify-send");
    notify.arg("--app-name=Syncthing").arg(title).arg(text);

    let mut commands = vec![notify];
    if play_sound {
        let mut sound = Command::new("paplay");
        sound.arg("/usr/share/sounds/freedesktop/stereo/dialog-warning.oga");
        commands.push(sound);
    }
    commands
}

/// `display notification` script for `osascript -e`
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript(title: &str, subtitle: &str, body: &str, play_sound: bool) -> String {
    let mut script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape(body),
        escape(title)
    );
    if !subtitle.is_empty() {
        script.push_str(&format!(" subtitle \"{}\"", escape(subtitle)));
    }
    if play_sound {
        script.push_str(" sound name \"default\"");
    }
    script
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
