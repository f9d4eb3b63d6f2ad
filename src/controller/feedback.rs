//! Audio cues played around a run.
//!
//! Cues play on their own task. The controller never waits on them during the
//! descent; only the closing cues are awaited, and then only for
//! [`FINALE_TIMEOUT`]. A missing player or sound file is ignored.

use abyss_core::config::FeedbackConfig;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    /// Background track, looped for the whole run.
    Ambient,
    Descend,
    Attack,
    End,
    Kill,
}

impl SoundCue {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Ambient => "music.wav",
            Self::Descend => "descend.wav",
            Self::Attack => "attack.wav",
            Self::End => "end.wav",
            Self::Kill => "kill.wav",
        }
    }
}

const MIN_AMBIENT_TRACK: Duration = Duration::from_secs(1);

/// Longest the controller waits for the closing cues before returning.
pub const FINALE_TIMEOUT: Duration = Duration::from_secs(5);

/// A program plus its leading arguments; the sound path is appended.
type Invocation = (String, Vec<String>);

#[derive(Debug, Clone)]
pub struct FeedbackPlayer {
    sounds_dir: PathBuf,
    player: Option<String>,
}

impl FeedbackPlayer {
    pub fn new(sounds_dir: impl AsRef<Path>, player: Option<String>) -> Self {
        Self {
            sounds_dir: sounds_dir.as_ref().to_path_buf(),
            player: player.filter(|p| !p.trim().is_empty()),
        }
    }

    /// `None` when feedback is disabled.
    pub fn from_config(config: &FeedbackConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.sounds_dir, config.player.clone()))
    }

    pub fn sound_path(&self, cue: SoundCue) -> PathBuf {
        self.sounds_dir.join(cue.file_name())
    }

    /// Players to try, in order, for one sound file.
    pub fn invocations(&self, sound: &Path) -> Vec<Invocation> {
        if let Some(player) = &self.player {
            let mut parts = player.split_whitespace().map(str::to_string);
            return match parts.next() {
                Some(program) => {
                    let mut args: Vec<String> = parts.collect();
                    args.push(sound.display().to_string());
                    vec![(program, args)]
                }
                None => Vec::new(),
            };
        }
        default_invocations(sound)
    }

    /// Play cues one after another on a background task. Await the handle to
    /// wait for playback; drop it to let playback run on its own.
    pub fn cue(&self, cues: &[SoundCue]) -> JoinHandle<()> {
        let player = self.clone();
        let cues = cues.to_vec();
        tokio::spawn(async move {
            for cue in cues {
                player.play(cue).await;
            }
        })
    }

    /// Loop the ambient track until the returned guard is dropped.
    pub fn start_ambient(&self) -> DropGuard {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let player = self.clone();
        tokio::spawn(async move {
            loop {
                let started = Instant::now();
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    played = player.play(SoundCue::Ambient) => {
                        // A track that ends instantly would turn this into a spawn loop.
                        if !played || started.elapsed() < MIN_AMBIENT_TRACK {
                            break;
                        }
                    }
                }
            }
        });
        token.drop_guard()
    }

    /// Returns false when nothing could be played.
    async fn play(&self, cue: SoundCue) -> bool {
        let sound = self.sound_path(cue);
        if !sound.is_file() {
            debug!("feedback: {} missing, skipping", sound.display());
            return false;
        }
        for (program, args) in self.invocations(&sound) {
            let status = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status()
                .await;
            match status {
                Ok(s) => return s.success(),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("feedback: {} not installed", program);
                }
                Err(e) => {
                    debug!("feedback: {} failed: {}", program, e);
                    return false;
                }
            }
        }
        debug!("feedback: no sound player available");
        false
    }
}

#[cfg(target_os = "macos")]
fn default_invocations(sound: &Path) -> Vec<Invocation> {
    vec![("afplay".into(), vec![sound.display().to_string()])]
}

#[cfg(windows)]
fn default_invocations(sound: &Path) -> Vec<Invocation> {
    let script = format!(
        "(New-Object Media.SoundPlayer '{}').PlaySync();",
        sound.display()
    );
    vec![("powershell".into(), vec!["-c".into(), script])]
}

#[cfg(not(any(target_os = "macos", windows)))]
fn default_invocations(sound: &Path) -> Vec<Invocation> {
    let path = sound.display().to_string();
    vec![
        (
            "ffplay".into(),
            vec![
                "-nodisp".into(),
                "-autoexit".into(),
                "-loglevel".into(),
                "quiet".into(),
                path.clone(),
            ],
        ),
        ("aplay".into(), vec![path]),
    ]
}
