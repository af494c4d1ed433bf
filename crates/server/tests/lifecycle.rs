use server::entity::Player;
use server::gamemodes::ffa::Ffa;
use server::gamemodes::teams::Teams;
use server::{Config, GameMode, HeadlessListener, LeaderboardUpdate, Listener, Router, ServerHandle, World};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, event: impl Into<String>) {
    if let Ok(mut log) = log.lock() {
        log.push(event.into());
    }
}

fn events(log: &Log) -> Vec<String> {
    log.lock().map(|log| log.clone()).unwrap_or_default()
}

struct RecordingListener(Log);

impl Listener for RecordingListener {
    fn open(&mut self) -> bool {
        push(&self.0, "open");
        true
    }
    fn close(&mut self) {
        push(&self.0, "close");
    }
    fn update(&mut self) {
        push(&self.0, "flush");
    }
}

struct RecordingMode {
    inner: Ffa,
    log: Log,
}

impl GameMode for RecordingMode {
    fn name(&self) -> &str {
        "Recording"
    }
    fn id(&self) -> u32 {
        99
    }
    fn on_handle_start(&mut self) {
        push(&self.log, "handle start");
    }
    fn on_handle_stop(&mut self) {
        push(&self.log, "handle stop");
    }
    fn on_handle_tick(&mut self) {
        push(&self.log, "gamemode tick");
    }
    fn on_new_world(&mut self, world: &mut World) {
        push(&self.log, format!("new world {}", world.id));
    }
    fn on_world_destroy(&mut self, world: &mut World) {
        push(&self.log, format!("destroy world {} with {} players", world.id, world.players.len()));
    }
    fn on_new_player(&mut self, player: &mut Player) {
        push(&self.log, format!("new player {}", player.id));
    }
    fn on_player_destroy(&mut self, player: &mut Player) {
        push(&self.log, format!("destroy player {} in world {:?}", player.id, player.world()));
    }
    fn on_player_join_world(&mut self, player: &mut Player, world: &mut World) {
        push(&self.log, format!("join {} -> {}", player.id, world.id));
    }
    fn on_player_leave_world(&mut self, player: &mut Player, world: &mut World) {
        push(&self.log, format!("leave {} <- {}", player.id, world.id));
    }
    fn on_player_spawn_request(&mut self, player: &mut Player, world: Option<&mut World>, name: &str) -> bool {
        self.inner.on_player_spawn_request(player, world, name)
    }
    fn compile_leaderboard(&self, world: &mut World, players: &BTreeMap<u32, Player>) {
        push(&self.log, format!("compile {}", world.id));
        self.inner.compile_leaderboard(world, players);
    }
    fn leaderboard_for(&self, player: &Player, world: &World, players: &BTreeMap<u32, Player>) -> LeaderboardUpdate {
        self.inner.leaderboard_for(player, world, players)
    }
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.food.min_amount = 0;
    config
}

fn recording_handle() -> (ServerHandle, Log) {
    let log: Log = Arc::default();
    let handle = ServerHandle::with_gamemode(
        quiet_config(),
        Box::new(RecordingListener(log.clone())),
        Box::new(RecordingMode {
            inner: Ffa::new(),
            log: log.clone(),
        }),
    );
    (handle, log)
}

#[test]
fn ids_reuse_smallest_free_slot() {
    let mut handle = ServerHandle::new(quiet_config(), Box::new(HeadlessListener::new()));

    let worlds: Vec<u32> = (0..3).map(|_| handle.create_world()).collect();
    assert_eq!(worlds, vec![1, 2, 3]);
    assert!(handle.remove_world(2));
    assert!(!handle.remove_world(2));
    assert_eq!(handle.create_world(), 2);
    assert_eq!(handle.create_world(), 4);

    let players: Vec<u32> = (0..3).map(|_| handle.create_player(Router::bot())).collect();
    assert_eq!(players, vec![1, 2, 3]);
    assert!(handle.remove_player(2));
    assert!(!handle.remove_player(2));
    assert_eq!(handle.create_player(Router::connection()), 2);
}

#[test]
fn stop_when_idle_changes_nothing() {
    let mut handle = ServerHandle::new(quiet_config(), Box::new(HeadlessListener::new()));
    assert!(!handle.stop());
    assert_eq!(handle.tick(), 0);

    handle.start();
    handle.on_tick();
    handle.on_tick();
    assert!(handle.stop());
    assert!(!handle.stop());
    assert_eq!(handle.tick(), 0);
    assert!(!handle.is_running());
}

#[test]
fn restart_resets_tick_and_world() {
    let mut handle = ServerHandle::new(quiet_config(), Box::new(HeadlessListener::new()));
    handle.start();
    handle.create_world();
    for _ in 0..5 {
        handle.on_tick();
    }
    assert_eq!(handle.tick(), 5);

    assert!(handle.stop());
    assert!(handle.start());
    assert_eq!(handle.tick(), 0);
    assert_eq!(handle.worlds().len(), 1);
    assert!(handle.world(1).is_some());
}

#[test]
fn tick_updates_worlds_before_flush_and_gamemode() {
    let (mut handle, log) = recording_handle();
    handle.start();
    handle.create_world();
    log.lock().map(|mut log| log.clear()).ok();

    handle.on_tick();

    assert_eq!(
        events(&log),
        vec!["compile 1", "compile 2", "flush", "gamemode tick"]
    );
}

#[test]
fn hooks_fire_in_lifecycle_order() {
    let (mut handle, log) = recording_handle();
    handle.start();
    let player = handle.create_player(Router::connection());
    assert!(handle.join_world(player, 1));
    assert!(handle.remove_player(player));
    assert!(handle.stop());

    assert_eq!(
        events(&log),
        vec![
            "open",
            "handle start",
            "new world 1",
            "new player 1",
            "join 1 -> 1",
            "destroy player 1 in world Some(1)",
            "leave 1 <- 1",
            "destroy world 1 with 0 players",
            "handle stop",
            "close",
        ]
    );
}

#[test]
fn removing_world_fires_destroy_before_players_leave() {
    let (mut handle, log) = recording_handle();
    handle.start();
    let player = handle.create_player(Router::connection());
    handle.join_world(player, 1);
    log.lock().map(|mut log| log.clear()).ok();

    assert!(handle.remove_world(1));

    assert_eq!(events(&log), vec!["destroy world 1 with 1 players", "leave 1 <- 1"]);
    assert_eq!(handle.player(player).and_then(Player::world), None);
}

#[test]
fn teams_balance_through_the_handle() {
    let mut handle = ServerHandle::with_gamemode(
        quiet_config(),
        Box::new(HeadlessListener::new()),
        Box::new(Teams::new()),
    );
    handle.start();
    for _ in 0..4 {
        let id = handle.create_player(Router::connection());
        assert!(handle.join_world(id, 1));
    }

    let world = handle.world(1).expect("initial world");
    let sizes: Vec<usize> = world.teams.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![2, 1, 1]);
    assert_eq!(handle.player(4).and_then(|p| p.team), Some(0));

    assert!(handle.leave_world(1));
    assert_eq!(handle.player(1).and_then(|p| p.team), None);
    let world = handle.world(1).expect("initial world");
    assert_eq!(world.teams[0], vec![4]);
}

#[test]
fn simulation_runs_food_and_spawns() {
    let mut config = Config::default();
    config.food.min_amount = 60;
    config.food.spawn_amount = 30;
    let mut handle = ServerHandle::new(config, Box::new(HeadlessListener::new()));
    handle.start();
    let player = handle.create_player(Router::connection());
    handle.join_world(player, 1);
    handle.request_spawn(player, "runner");

    for _ in 0..3 {
        handle.on_tick();
    }

    // The player may have eaten a few pellets on its way.
    let stats = handle.stats();
    assert!(stats.worlds[0].food > 30 && stats.worlds[0].food <= 60);
    let world = handle.world(1).expect("initial world");
    assert_eq!(world.finder().len(), world.cell_count());
    assert!(handle.player(player).and_then(|p| p.score).is_some());
}

#[test]
fn tiny_border_spawns_without_panicking() {
    let mut config = quiet_config();
    config.border.width = 20.0;
    config.border.height = 20.0;
    assert!(config.validate().is_err());

    config.player.spawn_size = 20.0;
    config.player.minion_spawn_size = 20.0;
    assert_eq!(config.validate(), Ok(()));

    let mut handle = ServerHandle::new(config, Box::new(HeadlessListener::new()));
    handle.start();
    let player = handle.create_player(Router::connection());
    assert!(handle.join_world(player, 1));
    assert!(handle.request_spawn(player, "tiny"));
    for _ in 0..5 {
        handle.on_tick();
    }

    let cell_id = handle.player(player).expect("player exists").owned_cells[0];
    let cell = handle.world(1).and_then(|w| w.get_cell(cell_id)).expect("cell alive");
    assert_eq!(cell.position.x, 0.0);
    assert_eq!(cell.position.y, 0.0);
}

#[tokio::test(start_paused = true)]
async fn run_loop_ticks_until_stopped() {
    let mut handle = ServerHandle::new(quiet_config(), Box::new(HeadlessListener::new()));
    handle.start();

    let _ = tokio::time::timeout(Duration::from_millis(420), handle.run()).await;

    let tick = handle.tick();
    assert!((9..=11).contains(&tick), "ran {tick} ticks");
    assert!(handle.stop());

    // A stopped handle returns from run immediately.
    handle.run().await;
    assert_eq!(handle.tick(), 0);
}
