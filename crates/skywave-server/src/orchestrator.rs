//! Pipeline orchestration (spec §4.F, §5): a reader task that owns the
//! rtl_tcp socket and feeds the bounded IQ queue, and a worker thread that
//! owns every piece of per-sample state (DSP engine, scanner, POCSAG
//! decoder) and is the only thing allowed to touch it, the same
//! single-owner-thread shape the teacher gives its GPU-bound `Engine`.

use crate::state::AppState;
use anyhow::Context;
use axum::extract::ws::Message;
use skywave_core::dsp::demod::Mode;
use skywave_core::dsp::DspEngine;
use skywave_core::pocsag::PocsagDecoder;
use skywave_core::protocol::{ClientCommand, ServerEvent};
use skywave_core::queue::IqQueue;
use skywave_core::recording::{IqWriter, WavWriter};
use skywave_core::scanner::{ScanEvent, Scanner};
use skywave_core::tuner::{TunerClient, READ_SIZE};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 20;
const TICK_PERIOD: Duration = Duration::from_millis(50);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// The tuner connection, shared between the reader thread (which owns the
/// connect/reconnect lifecycle) and the worker thread (which issues
/// control commands). `None` while disconnected (spec §4.F connection
/// supervisor).
type TunerHandle = Arc<Mutex<Option<TunerClient<TcpStream>>>>;

pub fn spawn(
    state: Arc<AppState>,
    mut command_rx: mpsc::UnboundedReceiver<(crate::state::ClientId, ClientCommand)>,
) -> anyhow::Result<()> {
    let tuner: TunerHandle = Arc::new(Mutex::new(None));
    let queue = Arc::new(IqQueue::new(QUEUE_CAPACITY));
    let stop = Arc::new(AtomicBool::new(false));

    spawn_reader(
        Arc::clone(&tuner),
        Arc::clone(&queue),
        Arc::clone(&stop),
        Arc::clone(&state),
    );

    // Drive the async command channel into a std channel the worker thread
    // can poll without an executor.
    let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<(crate::state::ClientId, ClientCommand)>();
    tokio::spawn(async move {
        while let Some(item) = command_rx.recv().await {
            if cmd_tx.send(item).is_err() {
                break;
            }
        }
    });

    std::thread::Builder::new()
        .name("skywave-worker".into())
        .spawn(move || worker_loop(state, tuner, queue, cmd_rx))?;

    Ok(())
}

fn connect_tuner(
    host: &str,
    port: u16,
    center_freq_hz: u64,
) -> anyhow::Result<TunerClient<TcpStream>> {
    let addr = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolve tuner address {host}:{port}"))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("no addresses for tuner {host}:{port}"))?;
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .with_context(|| format!("connect to tuner at {addr}"))?;
    TunerClient::handshake(stream, center_freq_hz)
}

/// Connect/reconnect loop with doubling backoff (spec §4.A/§7, "connect
/// timeout 5 s" / "reconnect with exponential backoff (2 s -> 30 s cap)"),
/// plus the steady-state read loop. Runs entirely on its own OS thread so a
/// wedged or absent tuner never blocks the worker thread or the HTTP/WS
/// surface (spec §4.F connection supervisor).
fn spawn_reader(
    tuner: TunerHandle,
    queue: Arc<IqQueue>,
    stop: Arc<AtomicBool>,
    state: Arc<AppState>,
) {
    std::thread::Builder::new()
        .name("skywave-reader".into())
        .spawn(move || {
            let mut buf = [0u8; READ_SIZE];
            let mut backoff = INITIAL_BACKOFF;
            while !stop.load(Ordering::Relaxed) && !crate::shutdown::is_shutdown_requested() {
                let connected = connect_tuner(&state.cfg.tuner.host, state.cfg.tuner.port, state.cfg.tuner.center_freq_hz);
                let client = match connected {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::warn!(error = ?e, backoff_secs = backoff.as_secs(), "tuner connect failed, retrying");
                        std::thread::sleep(backoff);
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        continue;
                    }
                };
                tracing::info!(tuner_type = %client.tuner_type.as_str(), "tuner connected");
                backoff = INITIAL_BACKOFF;
                let freq = client.center_freq;
                *tuner.lock().unwrap_or_else(|p| p.into_inner()) = Some(client);
                state.broadcast(Message::Text(
                    ServerEvent::ConnectionChanged { connected: true, freq: Some(freq) }.to_json(),
                ));

                loop {
                    if stop.load(Ordering::Relaxed) || crate::shutdown::is_shutdown_requested() {
                        return;
                    }
                    let read = {
                        let mut guard = tuner.lock().unwrap_or_else(|p| p.into_inner());
                        guard
                            .as_mut()
                            .expect("tuner installed before entering read loop")
                            .read_chunk(&mut buf)
                    };
                    match read {
                        Ok(()) => {
                            queue.try_push(bytes::Bytes::copy_from_slice(&buf));
                        }
                        Err(e) => {
                            tracing::error!(error = ?e, "tuner read failed, reconnecting");
                            *tuner.lock().unwrap_or_else(|p| p.into_inner()) = None;
                            state.broadcast(Message::Text(
                                ServerEvent::ConnectionChanged { connected: false, freq: None }.to_json(),
                            ));
                            break;
                        }
                    }
                }
            }
        })
        .expect("spawn reader thread");
}

struct Recorders {
    iq: Option<IqWriter>,
    wav: Option<WavWriter>,
}

fn worker_loop(
    state: Arc<AppState>,
    tuner: TunerHandle,
    queue: Arc<IqQueue>,
    cmd_rx: std::sync::mpsc::Receiver<(crate::state::ClientId, ClientCommand)>,
) {
    let initial_mode = Mode::from_str_upper(&state.cfg.dsp.mode).unwrap_or(Mode::Fm);
    let mut dsp = DspEngine::new(initial_mode, state.cfg.dsp.squelch_threshold_db);
    let mut pocsag = PocsagDecoder::new(48_000.0);
    let mut pocsag_enabled = false;
    let mut pocsag_seen = 0usize;
    let mut scanner: Option<Scanner> = None;
    let mut streaming = true;
    let mut recorders = Recorders {
        iq: None,
        wav: None,
    };

    let start = Instant::now();
    let mut last_tick = Instant::now();
    let mut chunk_count = 0u64;

    loop {
        if crate::shutdown::is_shutdown_requested() {
            break;
        }
        while let Ok((_client_id, cmd)) = cmd_rx.try_recv() {
            handle_command(
                cmd,
                &state,
                &tuner,
                &mut dsp,
                &mut pocsag,
                &mut pocsag_enabled,
                &mut scanner,
                &mut streaming,
                &mut recorders,
            );
        }

        match queue.pop() {
            Some(chunk) => {
                if let Some(iq_writer) = recorders.iq.as_mut() {
                    let _ = iq_writer.write_chunk(&chunk);
                }
                let iq = DspEngine::bytes_to_iq(&chunk);
                let spectrum = dsp.compute_spectrum(&iq);
                if streaming {
                    state.broadcast(Message::Binary(
                        skywave_core::protocol::BinaryFrame::Spectrum(spectrum.magnitudes).encode(),
                    ));
                }

                let audio = dsp.demodulate(&iq);
                if streaming || recorders.wav.is_some() || pocsag_enabled {
                    state.broadcast(Message::Binary(
                        skywave_core::protocol::BinaryFrame::Audio(audio.clone()).encode(),
                    ));
                }
                if let Some(wav) = recorders.wav.as_mut() {
                    let _ = wav.write_samples(&audio);
                }

                if pocsag_enabled {
                    pocsag.process_audio(&audio, start.elapsed().as_secs_f64());
                    let history = pocsag.get_history(pocsag_seen + 8);
                    for msg in history.into_iter().skip(pocsag_seen) {
                        pocsag_seen += 1;
                        state.broadcast(Message::Text(ServerEvent::Pocsag(msg).to_json()));
                    }
                }

                chunk_count += 1;
                if chunk_count.is_multiple_of(10) {
                    let s_units = skywave_core::dsp::fft::dbfs_to_s_units(dsp.signal_db());
                    state.broadcast(Message::Text(
                        ServerEvent::SignalLevel {
                            signal_db: dsp.signal_db(),
                            s_units: s_units.to_string(),
                        }
                        .to_json(),
                    ));
                }
            }
            None => std::thread::sleep(Duration::from_millis(5)),
        }

        if last_tick.elapsed() >= TICK_PERIOD {
            last_tick = Instant::now();
            if let Some(s) = scanner.as_mut() {
                let events = s.tick(
                    start.elapsed().as_secs_f64(),
                    dsp.signal_db(),
                    state.cfg.dsp.squelch_threshold_db,
                );
                for event in events {
                    apply_scan_event(event, &state, &tuner, &mut dsp);
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_command(
    cmd: ClientCommand,
    state: &Arc<AppState>,
    tuner: &TunerHandle,
    dsp: &mut DspEngine,
    pocsag: &mut PocsagDecoder,
    pocsag_enabled: &mut bool,
    scanner: &mut Option<Scanner>,
    streaming: &mut bool,
    recorders: &mut Recorders,
) {
    match cmd {
        ClientCommand::StartStream => {
            *streaming = true;
            state.broadcast(Message::Text(
                ServerEvent::StreamState { streaming: true }.to_json(),
            ));
        }
        ClientCommand::StopStream => {
            *streaming = false;
            state.broadcast(Message::Text(
                ServerEvent::StreamState { streaming: false }.to_json(),
            ));
        }
        ClientCommand::SetMode { mode } => {
            if let Some(parsed) = Mode::from_str_upper(&mode) {
                dsp.set_mode(parsed);
                state.broadcast(Message::Text(
                    ServerEvent::ModeChanged {
                        mode: parsed.as_str().to_string(),
                    }
                    .to_json(),
                ));
            }
        }
        ClientCommand::SetSquelch { value } => {
            dsp.set_squelch(value);
            state.broadcast(Message::Text(
                ServerEvent::SquelchChanged { value }.to_json(),
            ));
        }
        ClientCommand::SetFreq { value } => {
            if let Ok(mut guard) = tuner.lock() {
                if let Some(client) = guard.as_mut() {
                    let _ = client.set_center_freq(value);
                }
            }
            state.broadcast(Message::Text(ServerEvent::FreqChanged { value }.to_json()));
        }
        ClientCommand::SetGain { value } => {
            if let Ok(mut guard) = tuner.lock() {
                if let Some(client) = guard.as_mut() {
                    let _ = client.set_gain(value);
                }
            }
        }
        ClientCommand::SetAgc { value } => {
            if let Ok(mut guard) = tuner.lock() {
                if let Some(client) = guard.as_mut() {
                    let _ = client.set_agc(value);
                }
            }
        }
        ClientCommand::StartScan { category } => {
            if let Some(doc) = load_bookmarks(&state.cfg.bookmarks_path) {
                let entries = doc.to_scan_entries(category.as_deref());
                let mut s = Scanner::from_bookmarks(entries);
                s.start(0.0);
                *scanner = Some(s);
            }
        }
        ClientCommand::StartRangeScan {
            start,
            end,
            step,
            mode,
        } => {
            let mut s = Scanner::from_range(start, end, step, mode);
            s.start(0.0);
            *scanner = Some(s);
        }
        ClientCommand::StopScan => {
            if let Some(s) = scanner.as_mut() {
                s.stop();
            }
        }
        ClientCommand::SkipScan => {
            if let Some(s) = scanner.as_mut() {
                s.skip();
            }
        }
        ClientCommand::SetScanSpeed { value_ms } => {
            if let Some(s) = scanner.as_mut() {
                s.set_dwell_time_ms(value_ms);
            }
        }
        ClientCommand::SetScanDelay { value_s } => {
            if let Some(s) = scanner.as_mut() {
                s.set_resume_delay_secs(value_s);
            }
        }
        ClientCommand::TogglePocsag { value } => {
            *pocsag_enabled = value;
            if !value {
                pocsag.reset();
            }
        }
        ClientCommand::StartIqRecord => {
            let path = recording_path(&state.cfg.recording.dir, "iq", "raw");
            match IqWriter::create(&path) {
                Ok(w) => {
                    recorders.iq = Some(w);
                    state.broadcast(Message::Text(
                        ServerEvent::RecordStatus {
                            kind: "iq".into(),
                            active: true,
                            path: Some(path.display().to_string()),
                        }
                        .to_json(),
                    ));
                }
                Err(e) => tracing::error!(error = ?e, "failed to start iq recording"),
            }
        }
        ClientCommand::StopIqRecord => {
            if let Some(mut w) = recorders.iq.take() {
                let _ = w.flush();
            }
            state.broadcast(Message::Text(
                ServerEvent::RecordStatus {
                    kind: "iq".into(),
                    active: false,
                    path: None,
                }
                .to_json(),
            ));
        }
        ClientCommand::StartAudioRecord => {
            let path = recording_path(&state.cfg.recording.dir, "audio", "wav");
            match WavWriter::create(&path) {
                Ok(w) => {
                    recorders.wav = Some(w);
                    state.broadcast(Message::Text(
                        ServerEvent::RecordStatus {
                            kind: "audio".into(),
                            active: true,
                            path: Some(path.display().to_string()),
                        }
                        .to_json(),
                    ));
                }
                Err(e) => tracing::error!(error = ?e, "failed to start audio recording"),
            }
        }
        ClientCommand::StopAudioRecord => {
            if let Some(w) = recorders.wav.take() {
                let _ = w.finalize();
            }
            state.broadcast(Message::Text(
                ServerEvent::RecordStatus {
                    kind: "audio".into(),
                    active: false,
                    path: None,
                }
                .to_json(),
            ));
        }
    }
}

fn apply_scan_event(
    event: ScanEvent,
    state: &Arc<AppState>,
    tuner: &TunerHandle,
    dsp: &mut DspEngine,
) {
    match event {
        ScanEvent::Retune { freq_hz, mode } => {
            if let Ok(mut guard) = tuner.lock() {
                if let Some(client) = guard.as_mut() {
                    let _ = client.set_center_freq(freq_hz);
                }
            }
            if let Some(parsed) = Mode::from_str_upper(&mode) {
                dsp.set_mode(parsed);
            }
            state.broadcast(Message::Text(
                ServerEvent::FreqChanged { value: freq_hz }.to_json(),
            ));
        }
        ScanEvent::Status {
            state: scan_state,
            index,
            total,
            freq_hz,
            label,
            skipped,
            dwell_ms,
            resume_delay_secs,
        } => {
            state.broadcast(Message::Text(
                ServerEvent::ScanStatus {
                    state: format!("{scan_state:?}").to_uppercase(),
                    index,
                    total,
                    freq: freq_hz,
                    label,
                    skipped,
                    dwell_ms,
                    resume_delay: resume_delay_secs,
                }
                .to_json(),
            ));
        }
    }
}

fn load_bookmarks(path: &str) -> Option<skywave_core::bookmarks::BookmarkDocument> {
    let raw = std::fs::read_to_string(path).ok()?;
    skywave_core::bookmarks::BookmarkDocument::parse(&raw).ok()
}

fn recording_path(dir: &str, kind: &str, ext: &str) -> std::path::PathBuf {
    let _ = std::fs::create_dir_all(dir);
    let id = skywave_core::util::generate_unique_id();
    std::path::Path::new(dir).join(format!("{kind}-{id}.{ext}"))
}
