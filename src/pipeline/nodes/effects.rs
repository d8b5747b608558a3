//! Effector sinks: audible feedback and spoken input events.
//!
//! - [`Beeper`] plays the `Tap` / `Click` effect of every action.
//! - [`Announcer`] speaks the `Skip` / `Enter` event of every action.
//!
//! Both talk to the outside world through an [`Effector`]; the default
//! [`CommandEffector`] shells out to a configured player and speech
//! synthesizer and falls back to the terminal bell and the log.

use crate::config::EffectsConfig;
use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::{ElementError, ElementResult};
use crate::types::{Effect, InputAction, InputEvent};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Side effects the effector sinks trigger.
#[cfg_attr(test, mockall::automock)]
pub trait Effector: Send {
    /// Acquire whatever playback needs. Runs in the sink's `prepare`.
    fn prepare(&mut self) -> ElementResult<()> {
        Ok(())
    }

    fn play(&mut self, effect: Effect) -> ElementResult<()>;

    fn announce(&mut self, event: InputEvent) -> ElementResult<()>;
}

/// Runs external commands for sounds and speech.
#[derive(Debug, Clone)]
pub struct CommandEffector {
    player: Option<Vec<String>>,
    tap_sound: Option<PathBuf>,
    click_sound: Option<PathBuf>,
    speech: Option<Vec<String>>,
    skip_word: String,
    enter_word: String,
}

fn split_command(command: &Option<String>) -> Option<Vec<String>> {
    command
        .as_deref()
        .map(|c| c.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|parts| !parts.is_empty())
}

fn run(command: &[String], arg: &std::ffi::OsStr) -> ElementResult<()> {
    let Some((program, args)) = command.split_first() else {
        return Ok(());
    };
    let status = Command::new(program)
        .args(args)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .map_err(|e| ElementError::collaborator(format!("cannot run '{}': {}", program, e)))?;
    if !status.success() {
        return Err(ElementError::collaborator(format!(
            "'{}' exited with {}",
            program, status
        )));
    }
    Ok(())
}

impl CommandEffector {
    pub fn from_config(config: &EffectsConfig) -> Self {
        Self {
            player: split_command(&config.player_command),
            tap_sound: config.tap_sound.clone(),
            click_sound: config.click_sound.clone(),
            speech: split_command(&config.speech_command),
            skip_word: config.skip_word.clone(),
            enter_word: config.enter_word.clone(),
        }
    }

    fn sound_for(&self, effect: Effect) -> Option<&PathBuf> {
        match effect {
            Effect::Tap => self.tap_sound.as_ref(),
            Effect::Click => self.click_sound.as_ref(),
            Effect::None => None,
        }
    }

    pub fn word_for(&self, event: InputEvent) -> Option<&str> {
        match event {
            InputEvent::Skip => Some(&self.skip_word),
            InputEvent::Enter => Some(&self.enter_word),
            InputEvent::None => None,
        }
    }
}

impl Effector for CommandEffector {
    fn prepare(&mut self) -> ElementResult<()> {
        if self.player.is_some() {
            for sound in [&self.tap_sound, &self.click_sound].into_iter().flatten() {
                if !sound.is_file() {
                    return Err(ElementError::resource(format!(
                        "sound file {:?} not found",
                        sound
                    )));
                }
            }
        }
        Ok(())
    }

    fn play(&mut self, effect: Effect) -> ElementResult<()> {
        match (&self.player, self.sound_for(effect)) {
            (Some(player), Some(sound)) => run(player, sound.as_os_str()),
            _ => match effect {
                Effect::Tap => {
                    let mut err = std::io::stderr();
                    err.write_all(b"\x07")?;
                    err.flush()?;
                    tracing::info!("tap");
                    Ok(())
                }
                Effect::Click => {
                    tracing::info!("click");
                    Ok(())
                }
                Effect::None => Ok(()),
            },
        }
    }

    fn announce(&mut self, event: InputEvent) -> ElementResult<()> {
        let Some(word) = self.word_for(event) else {
            return Ok(());
        };
        tracing::info!("Input event: {} ({})", event, word);
        match &self.speech {
            Some(speech) => run(speech, std::ffi::OsStr::new(word)),
            None => Ok(()),
        }
    }
}

/// Sink that plays the effect of each action.
pub struct Beeper {
    effector: Box<dyn Effector>,
}

impl Beeper {
    pub fn new(effector: Box<dyn Effector>) -> Self {
        Self { effector }
    }
}

impl Element for Beeper {
    type Input = InputAction;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        self.effector.prepare()
    }

    fn consume(
        &mut self,
        action: InputAction,
        _ctx: &mut ElementContext<'_, ()>,
    ) -> ElementResult<()> {
        if action.effect == Effect::None {
            return Ok(());
        }
        self.effector.play(action.effect)
    }
}

/// Sink that speaks the event of each action.
pub struct Announcer {
    effector: Box<dyn Effector>,
}

impl Announcer {
    pub fn new(effector: Box<dyn Effector>) -> Self {
        Self { effector }
    }
}

impl Element for Announcer {
    type Input = InputAction;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        self.effector.prepare()
    }

    fn consume(
        &mut self,
        action: InputAction,
        _ctx: &mut ElementContext<'_, ()>,
    ) -> ElementResult<()> {
        if action.event == InputEvent::None {
            return Ok(());
        }
        self.effector.announce(action.event)
    }
}
