use std::sync::Arc;
use std::time::Duration;

use superears::{
    ContextState, DecodedAudio, EngineConfig, Error, KeyValueStore, MemoryElement, MemoryStore, OfflineHost,
    PlayState, Player, TrackTags, UnavailableStore, BLOCK_SIZE,
};

type TestPlayer<S> = Player<OfflineHost, S, MemoryElement>;

/// One second of stereo DC at `level`.
fn dc(level: f32) -> DecodedAudio {
    DecodedAudio {
        samples: vec![level; 48_000 * 2],
        channels: 2,
        sample_rate: 48_000,
    }
}

async fn player_with<S: KeyValueStore>(store: Arc<S>, host: OfflineHost) -> TestPlayer<S> {
    Player::start(&EngineConfig::default(), host, store, MemoryElement::new()).await
}

async fn player() -> (TestPlayer<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let player = player_with(Arc::clone(&store), OfflineHost::new(48_000, 2)).await;
    (player, store)
}

fn drain<S: KeyValueStore>(player: &mut TestPlayer<S>) -> Vec<f32> {
    player
        .graph_mut()
        .context_mut()
        .stream_mut()
        .map(|s| s.drain())
        .unwrap_or_default()
}

/// Tick and drain until at least `frames` stereo frames came out.
fn play_for<S: KeyValueStore>(player: &mut TestPlayer<S>, frames: usize) -> Vec<f32> {
    let mut out = Vec::new();
    while out.len() < frames * 2 {
        player.tick();
        out.extend(drain(player));
    }
    out
}

#[tokio::test(start_paused = true)]
async fn play_pause_play_builds_and_binds_once() {
    let (mut player, _store) = player().await;
    player.load(dc(0.25), "a.ogg", TrackTags::default()).unwrap();
    player.set_volume(2.0).unwrap();

    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));
    let nodes = player.graph().node_count();
    let edges = player.graph().edge_count();
    // sink, gain, analyser, tap
    assert_eq!((nodes, edges), (4, 3));

    assert_eq!(player.toggle_play(), Ok(PlayState::Paused));
    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));

    assert_eq!(player.graph().node_count(), nodes);
    assert_eq!(player.graph().edge_count(), edges);
    assert_eq!(player.graph().binding_count(), 1);
    assert_eq!(player.volume(), 2.0);
    assert_eq!(player.volume_percent(), 200);
    assert_eq!(player.context_state(), ContextState::Running);
}

#[tokio::test(start_paused = true)]
async fn play_without_file_asks_for_one() {
    let (mut player, _store) = player().await;
    let err = player.toggle_play().unwrap_err();

    assert_eq!(err, Error::NoSourceLoaded);
    assert_eq!(err.user_message(), "Select a music file first!");
    assert_eq!(player.context_state(), ContextState::Uninitialized);
    assert!(player.snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn startup_clamps_persisted_volume() {
    let store = Arc::new(MemoryStore::with_value("user_volume", 6.0));
    let player = player_with(store, OfflineHost::new(48_000, 2)).await;
    assert_eq!(player.volume(), 4.0);
    assert_eq!(player.volume_percent(), 400);
}

#[tokio::test(start_paused = true)]
async fn unavailable_store_falls_back_to_unity() {
    let mut player = player_with(Arc::new(UnavailableStore), OfflineHost::new(48_000, 2)).await;
    assert_eq!(player.volume(), 1.0);

    player.set_volume(3.0).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(player.volume(), 3.0);
}

#[tokio::test(start_paused = true)]
async fn output_is_amplified_and_ramps_without_jumps() {
    let (mut player, _store) = player().await;
    player.load(dc(0.25), "a.ogg", TrackTags::default()).unwrap();
    player.set_volume(2.0).unwrap();
    player.toggle_play().unwrap();

    let steady = play_for(&mut player, 4 * BLOCK_SIZE);
    assert!(steady.iter().all(|&s| s == 0.5));

    player.set_volume(4.0).unwrap();
    // 100 ms ramp plus slack
    let ramp = play_for(&mut player, 4_800 + 8 * BLOCK_SIZE);

    assert!(ramp.windows(2).all(|w| w[1] >= w[0] && w[1] - w[0] < 0.01));
    assert!(ramp.iter().all(|&s| (0.5..=1.0).contains(&s)));
    assert_eq!(ramp.last().copied(), Some(1.0));
    assert_eq!(player.gain().effective_gain(), 4.0);

    assert!(player.snapshot().iter().any(|&b| b > 0));
}

#[tokio::test(start_paused = true)]
async fn volume_drag_is_persisted_once() {
    let (mut player, store) = player().await;
    for v in [1.2, 1.8, 2.4, 3.0] {
        player.set_volume(v).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.writes(), 0);

    tokio::time::sleep(Duration::from_millis(500)).await;
    player.gain_mut().settle().await;
    assert_eq!(store.writes(), 1);
    assert_eq!(store.value("user_volume"), Some(3.0));
}

#[tokio::test(start_paused = true)]
async fn invalid_volume_is_ignored() {
    let (mut player, store) = player().await;
    player.set_volume(1.5).unwrap();
    assert!(matches!(player.set_volume(f64::NAN), Err(Error::InvalidGainValue(v)) if v.is_nan()));
    assert!(player.set_volume(9.0).is_err());
    assert_eq!(player.volume(), 1.5);

    player.gain_mut().settle().await;
    assert_eq!(store.value("user_volume"), Some(1.5));
}

#[tokio::test(start_paused = true)]
async fn unsupported_platform_is_fatal() {
    let mut player = player_with(Arc::new(MemoryStore::new()), OfflineHost::unavailable()).await;
    player.load(dc(0.25), "a.ogg", TrackTags::default()).unwrap();

    let err = player.toggle_play().unwrap_err();
    assert_eq!(err, Error::UnsupportedPlatform);
    assert!(!err.is_retryable());
    assert!(!err.user_message().is_empty());
    assert_eq!(player.state(), PlayState::Paused);

    // volume still works without audio
    player.set_volume(2.0).unwrap();
    assert_eq!(player.volume(), 2.0);
}

#[tokio::test(start_paused = true)]
async fn track_runs_out_and_replays_from_start() {
    let (mut player, _store) = player().await;
    let short = DecodedAudio {
        samples: vec![0.1; 300 * 2],
        channels: 2,
        sample_rate: 48_000,
    };
    player.load(short, "short.ogg", TrackTags::default()).unwrap();
    player.toggle_play().unwrap();

    let mut ended = false;
    for _ in 0..8 {
        ended |= player.tick();
        drain(&mut player);
    }
    assert!(ended);
    assert!(!player.is_playing());

    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));
    player.tick();
    let out = drain(&mut player);
    assert!(out.iter().take(2 * 64).all(|&s| (s - 0.1).abs() < 1e-6));
}

#[tokio::test(start_paused = true)]
async fn seeking_before_first_play_still_plays() {
    let (mut player, _store) = player().await;
    player.load(dc(0.25), "a.ogg", TrackTags::default()).unwrap();
    for i in 0..40 {
        player.seek(i as f64 * 0.02);
    }
    assert!((player.position_secs() - 0.78).abs() < 1e-3);

    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));
    assert_eq!(player.toggle_play(), Ok(PlayState::Paused));
    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));

    let out = play_for(&mut player, 4 * BLOCK_SIZE);
    assert!(out.iter().all(|&s| s == 0.25));
}

#[tokio::test(start_paused = true)]
async fn reloading_before_first_play_keeps_last_track() {
    let (mut player, _store) = player().await;
    for i in 0..17 {
        let mut audio = dc(0.01 * (i + 1) as f32);
        audio.samples.truncate(48_000 * 2 * (i + 1) / 17);
        player.load(audio, format!("{i}.ogg"), TrackTags::default()).unwrap();
    }
    assert_eq!(player.track().map(|t| t.name.as_str()), Some("16.ogg"));
    assert_eq!(player.duration_secs(), 1.0);

    assert_eq!(player.toggle_play(), Ok(PlayState::Playing));
    let out = play_for(&mut player, 2 * BLOCK_SIZE);
    assert!(out.iter().all(|&s| (s - 0.17).abs() < 1e-6));
}

#[tokio::test(start_paused = true)]
async fn transport_bursts_between_ticks_keep_latest_state() {
    let (mut player, _store) = player().await;
    player.load(dc(0.25), "a.ogg", TrackTags::default()).unwrap();
    player.toggle_play().unwrap();
    play_for(&mut player, BLOCK_SIZE);

    // no rendering in between, so the tap reads none of this yet
    for _ in 0..50 {
        player.seek(0.5);
        assert_eq!(player.toggle_play(), Ok(PlayState::Paused));
        assert_eq!(player.toggle_play(), Ok(PlayState::Playing));
    }
    assert_eq!(player.position_secs(), 0.5);

    // the first window plays out what fit in the queue, the next one the latest state
    let out = play_for(&mut player, 64 * BLOCK_SIZE);
    assert!(out.iter().any(|&s| s == 0.25));
    assert!(player.position_secs() > 0.5);
    assert_eq!(player.graph().binding_count(), 1);
}
