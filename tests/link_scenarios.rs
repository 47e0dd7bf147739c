//! End-to-end link scenarios over an in-memory wire
//!
//! Wires the device loop ([`DeckApp`]) and the host driver ([`HostLink`])
//! together through a cross-connected mock transport pair and drives both
//! with simulated time. Covers the full lifecycle:
//! - cold start through handshake, config, icon sync, ready
//! - steady-state session diffs reaching the device table
//! - device commands reaching the host audio backend
//! - device reboot mid-session re-syncing from scratch
//!
//! Run with: `cargo test --test link_scenarios`

use crossbeam_channel::{unbounded, Sender};
use mixlink::app::DeckApp;
use mixlink::config::AppConfig;
use mixlink::dispatch::InputEvent;
use mixlink::error::{Error, Result};
use mixlink::link::{AudioController, AudioEnumerator, HostLink, LinkState};
use mixlink::transport::{MockTransport, PacedWriter, Transport};
use mixlink::wire::{AppEntry, Decoded, FrameCodec, Message, ICON_BYTE_SIZE};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared in-memory audio backend so tests can mutate sessions while the
/// host link owns the handle
#[derive(Clone, Default)]
struct FakeAudio {
    inner: Arc<Mutex<AudioState>>,
}

#[derive(Default)]
struct AudioState {
    sessions: Vec<AppEntry>,
    icons: HashMap<String, Vec<u8>>,
}

impl FakeAudio {
    fn set_sessions(&self, sessions: Vec<AppEntry>) {
        self.inner.lock().unwrap().sessions = sessions;
    }

    fn push_session(&self, entry: AppEntry) {
        self.inner.lock().unwrap().sessions.push(entry);
    }

    fn add_icon(&self, app: &str, fill: u8) {
        self.inner
            .lock()
            .unwrap()
            .icons
            .insert(app.to_string(), vec![fill; ICON_BYTE_SIZE]);
    }

    fn volume_of(&self, app: &str) -> Option<u8> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|e| e.name == app)
            .map(|e| e.volume)
    }

    fn muted(&self, app: &str) -> Option<bool> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .find(|e| e.name == app)
            .map(|e| e.muted)
    }
}

impl AudioEnumerator for FakeAudio {
    fn snapshot(&mut self) -> Result<Vec<AppEntry>> {
        Ok(self.inner.lock().unwrap().sessions.clone())
    }

    fn icon(&mut self, app: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().unwrap().icons.get(app).cloned())
    }
}

impl AudioController for FakeAudio {
    fn set_volume(&mut self, app: &str, volume: u8) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let entry = state
            .sessions
            .iter_mut()
            .find(|e| e.name == app)
            .ok_or_else(|| Error::UnknownApp(app.to_string()))?;
        entry.volume = volume;
        Ok(())
    }

    fn toggle_mute(&mut self, app: &str) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let entry = state
            .sessions
            .iter_mut()
            .find(|e| e.name == app)
            .ok_or_else(|| Error::UnknownApp(app.to_string()))?;
        entry.muted = !entry.muted;
        Ok(())
    }
}

/// Host end of the wire: codec + link driver over a paced mock transport
struct HostHarness {
    link: HostLink<FakeAudio>,
    transport: PacedWriter<MockTransport>,
    codec: FrameCodec,
}

impl HostHarness {
    fn new(audio: FakeAudio, transport: MockTransport, config: &AppConfig) -> Self {
        let timings = config.protocol.timings();
        Self {
            link: HostLink::new(audio, timings),
            // Same chunking as a real deployment, no inter-chunk delay so
            // tests run fast.
            transport: PacedWriter::new(transport, timings.icon_chunk_len, Duration::ZERO),
            codec: FrameCodec::new(),
        }
    }

    fn tick(&mut self, now: Instant) {
        let mut buf = [0u8; 4096];
        while let Ok(n) = self.transport.read(&mut buf) {
            if n == 0 {
                break;
            }
            self.codec.feed(&buf[..n]);
        }

        let mut out = Vec::new();
        while let Some(decoded) = self.codec.poll() {
            if let Decoded::Message(msg) = decoded {
                out.extend(self.link.handle_message(&msg, now));
            }
        }
        out.extend(self.link.poll(now));

        for msg in out {
            let line = msg.to_line().expect("encode");
            self.transport.write_all(&line).expect("mock write");
        }
    }
}

struct Rig {
    device: DeckApp<MockTransport>,
    host: HostHarness,
    input_tx: Sender<InputEvent>,
    audio: FakeAudio,
    now: Instant,
    tick: Duration,
}

impl Rig {
    fn new(sessions: Vec<AppEntry>) -> Self {
        let config = AppConfig::default();
        let audio = FakeAudio::default();
        audio.set_sessions(sessions);

        let (dev_end, host_end) = MockTransport::pair();
        let (input_tx, input_rx) = unbounded();
        let device = DeckApp::new(&config, dev_end, input_rx);
        let host = HostHarness::new(audio.clone(), host_end, &config);

        Self {
            device,
            host,
            input_tx,
            audio,
            now: Instant::now(),
            tick: config.protocol.timings().tick,
        }
    }

    /// Advance both ends by `n` ticks of simulated time
    fn run_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.now += self.tick;
            self.device.tick(self.now).expect("device tick");
            self.host.tick(self.now);
        }
    }

    /// Jump simulated time forward without ticking
    fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    fn run_until_steady(&mut self) {
        for _ in 0..200 {
            self.run_ticks(1);
            if self.device.link_state() == LinkState::SteadyState
                && self.host.link.is_steady()
            {
                return;
            }
        }
        panic!(
            "link never reached steady state (device: {}, host: {})",
            self.device.link_state(),
            self.host.link.state()
        );
    }

    fn entry(name: &str, volume: u8, has_icon: bool) -> AppEntry {
        AppEntry {
            name: name.to_string(),
            volume,
            muted: false,
            has_icon,
        }
    }
}

#[test]
fn test_cold_start_full_sync_no_icons() {
    let mut rig = Rig::new(vec![
        Rig::entry("Chrome", 50, false),
        Rig::entry("Spotify", 30, false),
    ]);

    rig.run_until_steady();

    let table = rig.device.table();
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("Chrome").unwrap().volume, 50);
    assert_eq!(table.get("Spotify").unwrap().volume, 30);
}

#[test]
fn test_cold_start_with_icons() {
    let mut rig = Rig::new(vec![
        Rig::entry("Chrome", 50, true),
        Rig::entry("Spotify", 30, true),
    ]);
    rig.audio.add_icon("Chrome", 0xAA);
    rig.audio.add_icon("Spotify", 0xBB);

    rig.run_until_steady();

    let table = rig.device.table();
    assert_eq!(table.received_icons(), 2);
    assert_eq!(
        table.get("Chrome").unwrap().icon.as_deref(),
        Some(vec![0xAA; ICON_BYTE_SIZE].as_slice())
    );
    assert_eq!(
        table.get("Spotify").unwrap().icon.as_deref(),
        Some(vec![0xBB; ICON_BYTE_SIZE].as_slice())
    );
}

#[test]
fn test_steady_state_session_changes_reach_device() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, false)]);
    rig.run_until_steady();

    // Host-side volume change picked up by the next audio poll.
    rig.audio.set_sessions(vec![Rig::entry("Chrome", 85, false)]);
    rig.advance(Duration::from_millis(1100));
    rig.run_ticks(5);
    assert_eq!(rig.device.table().get("Chrome").unwrap().volume, 85);

    // New session appears.
    rig.audio.push_session(Rig::entry("Discord", 60, false));
    rig.advance(Duration::from_millis(1100));
    rig.run_ticks(5);
    assert!(rig.device.table().contains("Discord"));

    // Session disappears.
    rig.audio.set_sessions(vec![Rig::entry("Discord", 60, false)]);
    rig.advance(Duration::from_millis(1100));
    rig.run_ticks(5);
    assert!(!rig.device.table().contains("Chrome"));
    assert!(rig.device.table().contains("Discord"));
}

#[test]
fn test_new_app_icon_arrives_in_steady_state() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, false)]);
    rig.run_until_steady();

    rig.audio.add_icon("Discord", 0xCC);
    rig.audio.push_session(Rig::entry("Discord", 60, true));
    rig.advance(Duration::from_millis(1100));
    rig.run_ticks(20);

    let table = rig.device.table();
    assert_eq!(
        table.get("Discord").unwrap().icon.as_deref(),
        Some(vec![0xCC; ICON_BYTE_SIZE].as_slice())
    );
}

#[test]
fn test_device_volume_command_reaches_audio() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, false)]);
    rig.run_until_steady();

    rig.input_tx
        .send(InputEvent::VolumeChange {
            app: "Chrome".into(),
            volume: 20,
        })
        .unwrap();
    rig.run_ticks(3);

    assert_eq!(rig.audio.volume_of("Chrome"), Some(20));

    // The host must not echo the device's own change back as a diff.
    rig.advance(Duration::from_millis(1100));
    rig.run_ticks(5);
    assert_eq!(rig.device.table().get("Chrome").unwrap().volume, 50);
}

#[test]
fn test_device_mute_command_reaches_audio() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, false)]);
    rig.run_until_steady();

    rig.input_tx
        .send(InputEvent::ToggleMute {
            app: "Chrome".into(),
        })
        .unwrap();
    rig.run_ticks(3);

    assert_eq!(rig.audio.muted("Chrome"), Some(true));
}

#[test]
fn test_rapid_encoder_ticks_send_one_command() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, false)]);
    rig.run_until_steady();

    // First tick flushes immediately, the rest coalesce.
    for v in [55u8, 60, 65, 70] {
        rig.input_tx
            .send(InputEvent::VolumeChange {
                app: "Chrome".into(),
                volume: v,
            })
            .unwrap();
    }
    rig.run_ticks(1);
    assert_eq!(rig.audio.volume_of("Chrome"), Some(55));

    // After the debounce window only the latest value lands.
    rig.advance(Duration::from_millis(60));
    rig.run_ticks(3);
    assert_eq!(rig.audio.volume_of("Chrome"), Some(70));
}

#[test]
fn test_device_reboot_resyncs_from_scratch() {
    let mut rig = Rig::new(vec![Rig::entry("Chrome", 50, true)]);
    rig.audio.add_icon("Chrome", 0xDD);
    rig.run_until_steady();
    assert_eq!(rig.device.table().received_icons(), 1);

    // Simulate a device reboot: fresh device loop on the same wire. The
    // host sees a new probe and restarts, icon dedup included.
    let config = AppConfig::default();
    let (dev_end, host_end) = MockTransport::pair();
    let (input_tx, input_rx) = unbounded();
    rig.device = DeckApp::new(&config, dev_end, input_rx);
    rig.host.transport = PacedWriter::new(
        host_end,
        config.protocol.timings().icon_chunk_len,
        Duration::ZERO,
    );
    rig.host.codec.reset();
    rig.input_tx = input_tx;

    rig.run_until_steady();
    let table = rig.device.table();
    assert_eq!(table.len(), 1);
    assert_eq!(
        table.get("Chrome").unwrap().icon.as_deref(),
        Some(vec![0xDD; ICON_BYTE_SIZE].as_slice())
    );
}
