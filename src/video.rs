use crate::player::{
    LoadMetadata, MediaPlayer, PlaybackSignal, PlayerError, PlayerFactory, PlayerId, PlayerOptions,
    ResizeMode, VideoFrame,
};
use crate::types::BgEvent;
use parking_lot::Mutex;
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// ffmpeg-backed player rendering grayscale frames at terminal-cell size,
/// with ffplay providing audio.
pub struct VideoEngine {
    id: PlayerId,
    source: String,
    options: PlayerOptions,
    tx: SyncSender<BgEvent>,

    frame: Arc<Mutex<VideoFrame>>,
    last_frame_at: Arc<Mutex<Option<Instant>>>,

    current_stopper: Option<Arc<AtomicBool>>,
    pause_signal: Arc<AtomicBool>,

    audio_process: Option<Child>,
    ffmpeg_process: Option<Child>,

    viewport: (u16, u16),
    seek_time: f64,
    duration: f64,
    start_instant: Instant,
    session_id: u64,
    is_paused: bool,
    started: bool,

    retries: u32,
    retry_at: Option<Instant>,
    buffering: bool,
    rebuffered: bool,
    last_progress: Option<Instant>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum SessionKind {
    /// Fresh load: announced with load-start / load.
    Load,
    /// Restart at a new offset: announced as a buffer episode.
    Seek,
}

impl VideoEngine {
    pub fn new(
        id: PlayerId,
        source: String,
        options: PlayerOptions,
        tx: SyncSender<BgEvent>,
    ) -> Self {
        Self {
            id,
            source,
            options,
            tx,
            frame: Arc::new(Mutex::new(VideoFrame::default())),
            last_frame_at: Arc::new(Mutex::new(None)),
            current_stopper: None,
            pause_signal: Arc::new(AtomicBool::new(true)),
            audio_process: None,
            ffmpeg_process: None,
            viewport: (0, 0),
            seek_time: 0.0,
            duration: 0.0,
            start_instant: Instant::now(),
            session_id: 0,
            is_paused: true,
            started: false,
            retries: 0,
            retry_at: None,
            buffering: false,
            rebuffered: false,
            last_progress: None,
        }
    }

    fn emit(&self, signal: PlaybackSignal) {
        let event = BgEvent::Playback {
            player: self.id,
            session: self.session_id,
            signal,
        };
        if let Err(e) = self.tx.try_send(event) {
            warn!(player = self.id, error = %e, "dropping playback signal");
        }
    }

    fn has_frame(&self) -> bool {
        self.last_frame_at.lock().is_some()
    }

    fn start_session(&mut self, seek_seconds: f64, kind: SessionKind) {
        self.stop_processes();

        let (term_w, term_h) = (self.viewport.0 as usize, self.viewport.1 as usize);
        if term_w == 0 || term_h == 0 {
            return;
        }

        self.session_id += 1;
        self.started = true;
        let current_session_id = self.session_id;
        info!(
            player = self.id,
            session = current_session_id,
            seek = seek_seconds,
            "starting video"
        );

        let new_stopper = Arc::new(AtomicBool::new(false));
        self.current_stopper = Some(new_stopper.clone());

        self.seek_time = seek_seconds;
        self.start_instant = Instant::now();
        self.buffering = kind == SessionKind::Seek;
        self.last_progress = None;
        *self.last_frame_at.lock() = None;

        match kind {
            SessionKind::Load => self.emit(PlaybackSignal::LoadStart),
            SessionKind::Seek => self.emit(PlaybackSignal::Buffer { is_buffering: true }),
        }

        if !self.is_paused && !self.options.muted {
            self.spawn_audio(seek_seconds);
        }

        let args = ffmpeg_args(&self.source, seek_seconds, term_w, term_h, &self.options);
        let (child, mut stdout) = match spawn_decoder(&args) {
            Ok(spawned) => spawned,
            Err(e) => {
                self.emit(PlaybackSignal::Error(e.to_string()));
                return;
            }
        };
        debug!(player = self.id, "ffmpeg process spawned");
        self.ffmpeg_process = Some(child);

        let frame = self.frame.clone();
        let last_frame_at = self.last_frame_at.clone();
        let pause_sig = self.pause_signal.clone();
        let tx = self.tx.clone();
        let source = self.source.clone();
        let player = self.id;

        thread::spawn(move || {
            let meta = probe(&source).unwrap_or_else(|e| {
                debug!(player, error = %e, "probe failed");
                LoadMetadata {
                    duration: 0.0,
                    width: term_w,
                    height: term_h,
                }
            });
            let size = term_w * term_h;
            let mut pixels = vec![0u8; size];
            let stopper = new_stopper;
            let mut got_first = false;

            let send = |signal: PlaybackSignal| {
                let _ = tx.send(BgEvent::Playback {
                    player,
                    session: current_session_id,
                    signal,
                });
            };

            while !stopper.load(Ordering::Relaxed) {
                // The first frame is read even when paused so a paused player still shows a still.
                if got_first && pause_sig.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                    continue;
                }

                match stdout.read_exact(&mut pixels) {
                    Ok(()) => {
                        if stopper.load(Ordering::Relaxed) {
                            break;
                        }
                        {
                            let mut f = frame.lock();
                            f.width = term_w;
                            f.height = term_h;
                            f.pixels.clear();
                            f.pixels.extend_from_slice(&pixels);
                        }
                        *last_frame_at.lock() = Some(Instant::now());

                        if !got_first {
                            got_first = true;
                            send(match kind {
                                SessionKind::Load => PlaybackSignal::Load(meta),
                                SessionKind::Seek => PlaybackSignal::Buffer {
                                    is_buffering: false,
                                },
                            });
                        }
                    }
                    Err(e) => {
                        if !stopper.load(Ordering::Relaxed) {
                            send(if got_first {
                                PlaybackSignal::End
                            } else {
                                PlaybackSignal::Error(format!("no frames from {source}: {e}"))
                            });
                        }
                        break;
                    }
                }
            }
            debug!(player, session = current_session_id, "reader thread ended");
        });
    }

    fn restart_in_place(&mut self) {
        if self.started {
            let at = self.current_time();
            self.start_session(at, SessionKind::Seek);
        }
    }

    fn stop_processes(&mut self) {
        if let Some(stopper) = self.current_stopper.take() {
            stopper.store(true, Ordering::Relaxed);
        }
        if let Some(child) = self.audio_process.take() {
            kill_child(child);
        }
        if let Some(child) = self.ffmpeg_process.take() {
            kill_child(child);
        }
    }

    fn spawn_audio(&mut self, seek_seconds: f64) {
        if let Some(old) = self.audio_process.take() {
            kill_child(old);
        }

        let seek_str = format!("{seek_seconds:.2}");
        let child = Command::new("ffplay")
            .args([
                "-ss",
                &seek_str,
                "-nodisp",
                "-autoexit",
                "-hide_banner",
                "-loglevel",
                "panic",
                "-fflags",
                "nobuffer",
                "-flags",
                "low_delay",
                &self.source,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match child {
            Ok(child) => self.audio_process = Some(child),
            Err(e) => warn!(player = self.id, error = %e, "failed to spawn ffplay"),
        }
    }

    fn signal_audio(&self, signal: &str) -> bool {
        let Some(child) = &self.audio_process else {
            return false;
        };
        Command::new("kill")
            .arg(signal)
            .arg(child.id().to_string())
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    fn stall_threshold(&self) -> Duration {
        let buffer = &self.options.buffer;
        Duration::from_millis(if self.rebuffered {
            buffer.buffer_for_playback_after_rebuffer_ms
        } else {
            buffer.buffer_for_playback_ms
        })
    }
}

impl MediaPlayer for VideoEngine {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn session(&self) -> u64 {
        self.session_id
    }

    fn set_paused(&mut self, paused: bool) {
        if paused == self.is_paused {
            return;
        }
        self.is_paused = paused;
        self.pause_signal.store(paused, Ordering::Relaxed);

        if paused {
            if self.has_frame() {
                self.seek_time += self.start_instant.elapsed().as_secs_f64();
            }
            if !self.signal_audio("-STOP")
                && let Some(child) = self.audio_process.take()
            {
                kill_child(child);
            }
        } else {
            self.start_instant = Instant::now();
            if let Some(at) = self.last_frame_at.lock().as_mut() {
                *at = Instant::now();
            }
            if self.started && !self.options.muted && !self.signal_audio("-CONT") {
                self.spawn_audio(self.seek_time);
            }
        }
    }

    fn is_paused(&self) -> bool {
        self.is_paused
    }

    fn seek(&mut self, offset_seconds: f64) {
        let mut target = offset_seconds.max(0.0);
        if self.duration > 0.0 && target > self.duration {
            target = (self.duration - 1.0).max(0.0);
        }
        self.seek_time = target;
        if self.started {
            self.start_session(target, SessionKind::Seek);
        }
    }

    fn current_time(&self) -> f64 {
        if self.is_paused || !self.has_frame() {
            self.seek_time
        } else {
            self.seek_time + self.start_instant.elapsed().as_secs_f64()
        }
    }

    fn set_viewport(&mut self, width: u16, height: u16) {
        if self.viewport == (width, height) {
            return;
        }
        self.viewport = (width, height);
        self.restart_in_place();
    }

    fn set_resize_mode(&mut self, mode: ResizeMode) {
        if self.options.resize_mode == mode {
            return;
        }
        self.options.resize_mode = mode;
        self.restart_in_place();
    }

    fn frame(&self) -> Option<VideoFrame> {
        let frame = self.frame.lock();
        (!frame.is_empty()).then(|| frame.clone())
    }

    fn tick(&mut self, now: Instant) {
        if !self.started && self.retry_at.is_none() {
            self.start_session(self.seek_time, SessionKind::Load);
            return;
        }

        if let Some(at) = self.retry_at
            && now >= at
        {
            self.retry_at = None;
            self.start_session(self.seek_time, SessionKind::Load);
            return;
        }

        if self.is_paused {
            return;
        }
        let Some(last_frame) = *self.last_frame_at.lock() else {
            return;
        };

        let stalled = now.saturating_duration_since(last_frame) > self.stall_threshold();
        if stalled != self.buffering {
            self.buffering = stalled;
            if stalled {
                self.rebuffered = true;
            }
            self.emit(PlaybackSignal::Buffer {
                is_buffering: stalled,
            });
        }

        let due = self
            .last_progress
            .is_none_or(|t| now.saturating_duration_since(t) >= self.options.progress_interval);
        if due {
            self.last_progress = Some(now);
            self.emit(PlaybackSignal::Progress {
                current_time: self.current_time(),
            });
        }
    }

    fn handle_signal(&mut self, signal: PlaybackSignal, now: Instant) -> Option<PlaybackSignal> {
        match signal {
            PlaybackSignal::Load(meta) => {
                self.retries = 0;
                self.duration = meta.duration;
                Some(PlaybackSignal::Load(meta))
            }
            PlaybackSignal::Buffer { is_buffering } => {
                self.buffering = is_buffering;
                Some(PlaybackSignal::Buffer { is_buffering })
            }
            PlaybackSignal::Error(reason) if self.retries < self.options.retry.max_retries => {
                self.retries += 1;
                self.stop_processes();
                self.retry_at = Some(now + self.options.retry.delay);
                warn!(
                    player = self.id,
                    attempt = self.retries,
                    error = %reason,
                    "video load failed, retrying"
                );
                None
            }
            PlaybackSignal::End => {
                if self.options.repeat {
                    self.start_session(0.0, SessionKind::Seek);
                }
                Some(PlaybackSignal::End)
            }
            other => Some(other),
        }
    }

    fn stop(&mut self) {
        info!(player = self.id, "stopping video");
        self.stop_processes();
        self.started = false;
        self.retry_at = None;
    }
}

impl Drop for VideoEngine {
    fn drop(&mut self) {
        self.stop_processes();
    }
}

fn kill_child(mut child: Child) {
    let pid = child.id();
    let _ = child.kill();
    let _ = child.wait();
    // Ensure it's really dead
    let _ = Command::new("kill").arg("-9").arg(pid.to_string()).output();
}

/// Terminal cells are about twice as tall as wide, so rows are halved
/// before fitting the picture to the cell grid.
fn video_filter(width: usize, height: usize, mode: ResizeMode) -> String {
    let fit = match mode {
        ResizeMode::Cover => format!(
            "scale={width}:{height}:force_original_aspect_ratio=increase,crop={width}:{height}"
        ),
        ResizeMode::Contain => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,pad={width}:{height}:(ow-iw)/2:(oh-ih)/2"
        ),
    };
    format!("scale=iw:ih/2,{fit}")
}

fn ffmpeg_args(
    source: &str,
    seek_seconds: f64,
    width: usize,
    height: usize,
    options: &PlayerOptions,
) -> Vec<String> {
    let mut args = vec!["-ss".to_string(), format!("{seek_seconds:.2}"), "-re".to_string()];
    if source.starts_with("http://") || source.starts_with("https://") {
        args.extend([
            "-rw_timeout".to_string(),
            (options.buffer.max_buffer_ms * 1_000).to_string(),
        ]);
    }
    args.extend([
        "-analyzeduration".to_string(),
        (options.buffer.min_buffer_ms * 1_000).to_string(),
        "-i".to_string(),
        source.to_string(),
        "-an".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "gray".to_string(),
        "-vf".to_string(),
        video_filter(width, height, options.resize_mode),
        "-v".to_string(),
        "quiet".to_string(),
        "-".to_string(),
    ]);
    args
}

fn spawn_decoder(args: &[String]) -> Result<(Child, ChildStdout), PlayerError> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| PlayerError::Spawn {
            program: "ffmpeg",
            source,
        })?;
    match child.stdout.take() {
        Some(stdout) => Ok((child, stdout)),
        None => {
            kill_child(child);
            Err(PlayerError::NoStdout("ffmpeg"))
        }
    }
}

fn probe(path: &str) -> Result<LoadMetadata, PlayerError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "format=duration:stream=width,height",
            "-of",
            "default=noprint_wrappers=1",
            path,
        ])
        .output()
        .map_err(|source| PlayerError::Spawn {
            program: "ffprobe",
            source,
        })?;
    let s = String::from_utf8(output.stdout)
        .map_err(|_| PlayerError::Encoding { program: "ffprobe" })?;
    Ok(parse_probe_output(&s))
}

fn parse_probe_output(raw: &str) -> LoadMetadata {
    let mut meta = LoadMetadata::default();
    for line in raw.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "duration" => meta.duration = value.parse().unwrap_or(0.0),
            "width" => meta.width = value.parse().unwrap_or(0),
            "height" => meta.height = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    meta
}

/// Creates [`VideoEngine`]s with sequential ids.
#[derive(Default)]
pub struct FfmpegFactory {
    next_id: PlayerId,
}

impl PlayerFactory for FfmpegFactory {
    fn create(
        &mut self,
        source: &str,
        options: PlayerOptions,
        tx: SyncSender<BgEvent>,
    ) -> Box<dyn MediaPlayer> {
        self.next_id += 1;
        Box::new(VideoEngine::new(
            self.next_id,
            source.to_string(),
            options,
            tx,
        ))
    }
}
