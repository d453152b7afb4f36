//! Alert sound playback through an external player process.

use sentinel_core::{AlertAudio, AudioError};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

/// Plays the alert sound with `<player> <sound>`.
///
/// Only one playback runs at a time: restarting kills the previous player,
/// which is how "rewind to zero" is expressed for a process.
pub struct CommandAudio {
    player: String,
    sound: PathBuf,
    mute_args: Vec<String>,
    playing: Mutex<Option<Child>>,
}

impl CommandAudio {
    pub fn new(player: String, sound: PathBuf, mute_args: Vec<String>) -> Self {
        Self {
            player,
            sound,
            mute_args,
            playing: Mutex::new(None),
        }
    }

    fn spawn(&self, extra_args: &[String]) -> std::io::Result<Child> {
        Command::new(&self.player)
            .args(extra_args)
            .arg(&self.sound)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }

    /// Whether a playback process is still running. A finished player is
    /// reaped here.
    pub fn is_playing(&self) -> bool {
        let mut playing = self.playing.lock().unwrap_or_else(|e| e.into_inner());
        reap_finished(&mut playing);
        playing.is_some()
    }
}

/// Clear the slot if its player already exited (collecting its status).
fn reap_finished(playing: &mut Option<Child>) {
    let finished = match playing.as_mut() {
        Some(child) => !matches!(child.try_wait(), Ok(None)),
        None => false,
    };
    if finished {
        *playing = None;
    }
}

fn stop(child: &mut Child) {
    // Only signal a player that is still running; an exited one is just reaped.
    if matches!(child.try_wait(), Ok(None)) {
        let _ = child.kill();
    }
    let _ = child.wait();
}

impl AlertAudio for CommandAudio {
    /// Muted play immediately followed by a stop. Proves the sound file and
    /// the player are usable before the first real alarm.
    fn prime(&self) -> Result<(), AudioError> {
        if !self.sound.is_file() {
            return Err(AudioError::Unavailable(format!(
                "{} does not exist",
                self.sound.display()
            )));
        }
        let mut child = self
            .spawn(&self.mute_args)
            .map_err(|e| AudioError::Blocked(format!("cannot run {}: {e}", self.player)))?;
        stop(&mut child);
        tracing::debug!(player = %self.player, sound = %self.sound.display(), "audio primed");
        Ok(())
    }

    fn restart(&self) -> Result<(), AudioError> {
        let mut playing = self.playing.lock().unwrap_or_else(|e| e.into_inner());
        reap_finished(&mut playing);
        if let Some(mut previous) = playing.take() {
            stop(&mut previous);
        }
        let child = self
            .spawn(&[])
            .map_err(|e| AudioError::Failed(format!("cannot run {}: {e}", self.player)))?;
        *playing = Some(child);
        Ok(())
    }
}

impl Drop for CommandAudio {
    fn drop(&mut self) {
        let playing = self.playing.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut child) = playing.take() {
            stop(&mut child);
        }
    }
}
