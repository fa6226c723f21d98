// src/actions/speech.rs

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::actions::SpeechOutput;
use crate::config::ActionConfig;
use crate::error::SinkError;

/// Speaks by running a synthesizer that writes an audio file, then a player
/// for that file. `{text}` and `{out}` in either command line are replaced.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    synth: Vec<String>,
    play: Vec<String>,
    out: PathBuf,
}

impl CommandSpeech {
    pub fn new(config: &ActionConfig) -> Self {
        Self {
            synth: config.synth_command.clone(),
            play: config.play_command.clone(),
            out: config.audio_file.clone(),
        }
    }

    fn expand(&self, template: &[String], text: &str) -> Vec<String> {
        let out = self.out.display().to_string();
        template
            .iter()
            .map(|arg| arg.replace("{out}", &out).replace("{text}", text))
            .collect()
    }
}

fn run(args: &[String]) -> Result<(), SinkError> {
    let Some((program, rest)) = args.split_first() else {
        return Err(SinkError::Command { program: String::new(), code: None });
    };
    debug!(%program, "running");
    let status = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()?;
    if !status.success() {
        return Err(SinkError::Command { program: program.clone(), code: status.code() });
    }
    Ok(())
}

impl SpeechOutput for CommandSpeech {
    fn say(&mut self, text: &str) -> Result<(), SinkError> {
        run(&self.expand(&self.synth, text))?;
        run(&self.expand(&self.play, text))
    }
}
