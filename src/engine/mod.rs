//! The simulation core: one `GameEngine` owns the grid, the mobile
//! entities, and the match state. Hosts call [`GameEngine::move_player`] on
//! key events, [`GameEngine::tick`] once per frame with a monotonic
//! timestamp, and poll [`GameEngine::snapshot`] for rendering.

use crate::config::GameConfig;
use crate::error::GameError;
use crate::grid::Grid;
use crate::rng::Rng;
use crate::types::{
    Direction, MatchState, MatchStatus, MobileEntity, PlayerView, RuntimeEvent, Snapshot, Vec2,
};

mod movement;
mod spawn;

use self::spawn::{build_board, Board};

#[derive(Clone, Debug)]
pub struct GameEngine {
    config: GameConfig,
    rng: Rng,
    layout: Vec<String>,

    grid: Grid,
    player: MobileEntity,
    goal: Vec2,
    items: Vec<MobileEntity>,
    enemies: Vec<MobileEntity>,

    state: MatchState,
    invulnerable_until: Option<u64>,

    last_countdown_at: Option<u64>,
    last_item_move_at: Option<u64>,
    last_enemy_move_at: Option<u64>,

    events: Vec<RuntimeEvent>,
    tick_counter: u64,
}

impl GameEngine {
    /// Builds a match from a layout. The layout is retained for `reload`.
    pub fn new(layout: Vec<String>, config: GameConfig, seed: u32) -> Result<Self, GameError> {
        let mut rng = Rng::new(seed);
        let board = build_board(&layout, &config, &mut rng)?;
        let state = fresh_state(&config);
        Ok(Self {
            config,
            rng,
            layout,
            grid: board.grid,
            player: board.player,
            goal: board.goal,
            items: board.items,
            enemies: board.enemies,
            state,
            invulnerable_until: None,
            last_countdown_at: None,
            last_item_move_at: None,
            last_enemy_move_at: None,
            events: Vec::new(),
            tick_counter: 0,
        })
    }

    /// Replaces the whole board and match state with a fresh load of
    /// `layout`. On error nothing changes: validation and placement run on a
    /// scratch board before anything is committed.
    pub fn load_layout(&mut self, layout: Vec<String>) -> Result<(), GameError> {
        let mut rng = self.rng.clone();
        let board = build_board(&layout, &self.config, &mut rng)?;
        self.rng = rng;
        self.apply_board(board);
        self.layout = layout;
        Ok(())
    }

    /// Re-applies the last successfully loaded layout, re-running placement
    /// side effects. Random placements may land elsewhere; the grid and the
    /// fresh match state are identical every time.
    pub fn reload(&mut self) -> Result<(), GameError> {
        let layout = self.layout.clone();
        self.load_layout(layout)
    }

    fn apply_board(&mut self, board: Board) {
        self.grid = board.grid;
        self.player = board.player;
        self.goal = board.goal;
        self.items = board.items;
        self.enemies = board.enemies;
        self.state = fresh_state(&self.config);
        self.invulnerable_until = None;
        self.last_countdown_at = None;
        self.last_item_move_at = None;
        self.last_enemy_move_at = None;
        self.events.clear();
        self.tick_counter = 0;
        tracing::debug!(
            countdown = self.state.countdown,
            lives = self.state.lives,
            "match loaded"
        );
    }

    /// One directional command. Facing always tracks the attempted
    /// direction; the position changes only when the candidate cell is
    /// walkable. A committed move collects any items on the target cell.
    pub fn move_player(&mut self, dir: Direction) {
        if self.state.status != MatchStatus::Playing {
            return;
        }
        self.player.dir = dir;
        let (nx, ny) = movement::step(self.player.x, self.player.y, dir);
        if !self.grid.is_walkable(nx, ny) {
            return;
        }
        self.player.x = nx;
        self.player.y = ny;
        self.collect_items_under_player();
    }

    /// One simulation tick. No-op unless the match is Playing. Order is
    /// fixed: invulnerability expiry, countdown, item movement, enemy
    /// movement, pickups, enemy contact, then the Won/Lost evaluation with
    /// Won taking precedence.
    pub fn tick(&mut self, now_ms: u64) {
        if self.state.status != MatchStatus::Playing {
            return;
        }
        self.tick_counter += 1;

        if let Some(until) = self.invulnerable_until {
            if now_ms >= until {
                self.invulnerable_until = None;
            }
        }

        if interval_elapsed(
            &mut self.last_countdown_at,
            now_ms,
            self.config.countdown_interval_ms,
        ) {
            self.state.countdown -= 1;
        }

        if interval_elapsed(
            &mut self.last_item_move_at,
            now_ms,
            self.config.item_move_interval_ms,
        ) {
            let grid = &self.grid;
            let rng = &mut self.rng;
            for item in &mut self.items {
                movement::advance(item, grid, rng);
            }
        }

        if interval_elapsed(
            &mut self.last_enemy_move_at,
            now_ms,
            self.config.enemy_move_interval_ms,
        ) {
            let grid = &self.grid;
            let rng = &mut self.rng;
            for enemy in &mut self.enemies {
                movement::advance(enemy, grid, rng);
            }
        }

        self.collect_items_under_player();
        self.resolve_enemy_contact(now_ms);

        if self.player.is_at(self.goal.x, self.goal.y) {
            self.state.status = MatchStatus::Won;
            tracing::debug!(score = self.state.score, tick = self.tick_counter, "match won");
        } else if self.state.countdown <= 0 || self.state.lives <= 0 {
            self.state.status = MatchStatus::Lost;
            tracing::debug!(
                countdown = self.state.countdown,
                lives = self.state.lives,
                tick = self.tick_counter,
                "match lost"
            );
        }
    }

    /// All coincident items are collected, not just the first.
    fn collect_items_under_player(&mut self) {
        let (px, py) = (self.player.x, self.player.y);
        let reward = self.config.item_reward;
        let score = &mut self.state.score;
        let events = &mut self.events;
        self.items.retain(|item| {
            if item.is_at(px, py) {
                *score += reward;
                events.push(RuntimeEvent::Pickup {
                    amount: reward,
                    x: px,
                    y: py,
                });
                false
            } else {
                true
            }
        });
    }

    /// At most one hit per tick, no matter how many enemies overlap the
    /// player, and none at all while the invulnerability window is open.
    fn resolve_enemy_contact(&mut self, now_ms: u64) {
        if self.invulnerable_until.is_some() {
            return;
        }
        let hit = self
            .enemies
            .iter()
            .any(|enemy| enemy.is_at(self.player.x, self.player.y));
        if !hit {
            return;
        }
        let loss = self.config.life_loss_on_hit;
        self.state.lives = (self.state.lives - loss).max(0);
        self.invulnerable_until = Some(now_ms + self.config.invulnerable_duration_ms);
        self.events.push(RuntimeEvent::Damage {
            amount: loss,
            x: self.player.x,
            y: self.player.y,
        });
    }

    /// Read-only post-tick view. With `include_events` the pending pickup
    /// and damage notifications are drained into the snapshot.
    pub fn snapshot(&mut self, include_events: bool) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            tiles: self.grid.rows(),
            player: PlayerView {
                x: self.player.x,
                y: self.player.y,
                dir: self.player.dir,
                invulnerable: self.invulnerable_until.is_some(),
            },
            items: self.items.clone(),
            enemies: self.enemies.clone(),
            goal: self.goal,
            match_state: self.state,
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn state(&self) -> MatchState {
        self.state
    }

    pub fn is_over(&self) -> bool {
        self.state.status != MatchStatus::Playing
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn player_position(&self) -> Vec2 {
        Vec2 {
            x: self.player.x,
            y: self.player.y,
        }
    }

    pub fn goal_position(&self) -> Vec2 {
        self.goal
    }
}

fn fresh_state(config: &GameConfig) -> MatchState {
    MatchState {
        score: 0,
        countdown: config.starting_countdown,
        lives: config.starting_lives,
        status: MatchStatus::Playing,
    }
}

/// Minimum-interval gate. The first observation anchors the timer without
/// firing; after that it fires and re-anchors whenever at least
/// `interval_ms` has passed since the last firing.
fn interval_elapsed(last: &mut Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    match last {
        None => {
            *last = Some(now_ms);
            false
        }
        Some(prev) => {
            if now_ms.saturating_sub(*prev) >= interval_ms {
                *prev = now_ms;
                true
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::default_layout;

    fn rows(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    fn corridor_config(width: i32, max_items: usize, max_enemies: usize) -> GameConfig {
        GameConfig {
            width,
            height: 1,
            max_items,
            max_enemies,
            ..GameConfig::default()
        }
    }

    #[test]
    fn pickup_on_committed_move() {
        let config = corridor_config(4, 1, 0);
        let mut engine = GameEngine::new(rows(&["Po.G"]), config, 1).expect("loads");

        engine.move_player(Direction::Right);

        let snapshot = engine.snapshot(true);
        assert_eq!(snapshot.match_state.score, 10);
        assert!(snapshot.items.is_empty());
        assert_eq!(
            snapshot.events,
            vec![RuntimeEvent::Pickup {
                amount: 10,
                x: 1,
                y: 0
            }]
        );
    }

    #[test]
    fn blocked_move_updates_facing_only() {
        let config = corridor_config(4, 0, 0);
        let mut engine = GameEngine::new(rows(&["#P.G"]), config, 1).expect("loads");
        let before = engine.state();

        engine.move_player(Direction::Left);

        assert_eq!(engine.player_position(), Vec2 { x: 1, y: 0 });
        assert_eq!(engine.player.dir, Direction::Left);
        assert_eq!(engine.state(), before);
        assert!(engine.snapshot(true).events.is_empty());
    }

    #[test]
    fn damage_once_then_invulnerable() {
        let config = corridor_config(5, 0, 1);
        let mut engine = GameEngine::new(rows(&["PE..G"]), config, 1).expect("loads");

        engine.move_player(Direction::Right);
        assert_eq!(engine.player_position(), Vec2 { x: 1, y: 0 });

        engine.tick(0);
        assert_eq!(engine.state().lives, 2);
        let snapshot = engine.snapshot(true);
        assert!(snapshot.player.invulnerable);
        assert_eq!(
            snapshot.events,
            vec![RuntimeEvent::Damage {
                amount: 1,
                x: 1,
                y: 0
            }]
        );

        // Same coincidence on the next tick: no further loss while the
        // window is open.
        engine.tick(10);
        assert_eq!(engine.state().lives, 2);
        assert!(engine.snapshot(true).events.is_empty());
    }

    #[test]
    fn invulnerability_expires_and_damage_repeats() {
        let config = corridor_config(5, 0, 1);
        let mut engine = GameEngine::new(rows(&["PE..G"]), config, 1).expect("loads");
        engine.move_player(Direction::Right);

        engine.tick(0);
        assert_eq!(engine.state().lives, 2);

        // The window closes at exactly 1000 ms, before contact resolution.
        // Facing the enemy up the corridor wall keeps it pinned on the
        // player's cell when its move interval fires.
        engine.enemies[0].dir = Direction::Up;
        engine.tick(1_000);
        assert_eq!(engine.state().lives, 1);
    }

    #[test]
    fn multiple_coincident_enemies_hit_once_per_tick() {
        let config = corridor_config(5, 0, 0);
        let mut engine = GameEngine::new(rows(&["P...G"]), config, 1).expect("loads");
        engine.enemies.push(MobileEntity::new(0, 0, Direction::Up));
        engine.enemies.push(MobileEntity::new(0, 0, Direction::Up));

        engine.tick(0);
        assert_eq!(engine.state().lives, 2);
        assert_eq!(engine.snapshot(true).events.len(), 1);
    }

    #[test]
    fn multiple_coincident_items_all_collected() {
        let config = corridor_config(5, 0, 0);
        let mut engine = GameEngine::new(rows(&["P...G"]), config, 1).expect("loads");
        engine.items.push(MobileEntity::new(1, 0, Direction::Up));
        engine.items.push(MobileEntity::new(1, 0, Direction::Up));

        engine.move_player(Direction::Right);
        assert_eq!(engine.state().score, 20);
        assert!(engine.items.is_empty());
        assert_eq!(engine.snapshot(true).events.len(), 2);
    }

    #[test]
    fn lose_by_time() {
        let config = GameConfig {
            starting_countdown: 1,
            ..corridor_config(3, 0, 0)
        };
        let mut engine = GameEngine::new(rows(&["P.G"]), config, 1).expect("loads");

        engine.tick(0); // anchors the countdown timer
        assert_eq!(engine.state().status, MatchStatus::Playing);

        engine.tick(1_000);
        assert_eq!(engine.state().countdown, 0);
        assert_eq!(engine.state().status, MatchStatus::Lost);
    }

    #[test]
    fn lose_by_lives() {
        let config = GameConfig {
            starting_lives: 1,
            ..corridor_config(5, 0, 0)
        };
        let mut engine = GameEngine::new(rows(&["P...G"]), config, 1).expect("loads");
        engine.enemies.push(MobileEntity::new(0, 0, Direction::Up));

        engine.tick(0);
        assert_eq!(engine.state().lives, 0);
        assert_eq!(engine.state().status, MatchStatus::Lost);
    }

    #[test]
    fn win_takes_precedence_over_simultaneous_timeout() {
        let config = GameConfig {
            starting_countdown: 1,
            ..corridor_config(3, 0, 0)
        };
        let mut engine = GameEngine::new(rows(&["P.G"]), config, 1).expect("loads");

        engine.tick(0);
        engine.move_player(Direction::Right);
        engine.move_player(Direction::Right);
        assert_eq!(engine.player_position(), engine.goal_position());

        // This tick both drops the countdown to zero and sees the player on
        // the goal; the win check runs first.
        engine.tick(1_000);
        assert_eq!(engine.state().status, MatchStatus::Won);
    }

    #[test]
    fn terminal_status_freezes_the_match() {
        let config = corridor_config(3, 0, 0);
        let mut engine = GameEngine::new(rows(&["P.G"]), config, 1).expect("loads");
        engine.move_player(Direction::Right);
        engine.move_player(Direction::Right);
        engine.tick(0);
        assert_eq!(engine.state().status, MatchStatus::Won);

        let frozen = engine.state();
        let ticks_seen = engine.snapshot(false).tick;
        engine.move_player(Direction::Left);
        engine.tick(5_000);
        assert_eq!(engine.state(), frozen);
        assert_eq!(engine.snapshot(false).tick, ticks_seen);
        assert_eq!(engine.player_position(), engine.goal_position());
    }

    #[test]
    fn item_movement_waits_for_its_interval() {
        let config = corridor_config(4, 0, 0);
        let mut engine = GameEngine::new(rows(&["Po.G"]), config, 1).expect("loads");
        engine
            .items
            .push(MobileEntity::new(1, 0, Direction::Right));

        engine.tick(0); // anchors
        assert_eq!((engine.items[0].x, engine.items[0].y), (1, 0));
        engine.tick(499);
        assert_eq!((engine.items[0].x, engine.items[0].y), (1, 0));
        engine.tick(500);
        assert_eq!((engine.items[0].x, engine.items[0].y), (2, 0));
    }

    #[test]
    fn drifting_item_is_collected_on_the_tick_it_arrives() {
        let config = corridor_config(4, 0, 0);
        let mut engine = GameEngine::new(rows(&["P..G"]), config, 1).expect("loads");
        engine.items.push(MobileEntity::new(1, 0, Direction::Left));

        engine.tick(0);
        engine.tick(500); // item drifts onto the player's cell
        assert_eq!(engine.state().score, 10);
        assert!(engine.items.is_empty());
    }

    #[test]
    fn reload_is_idempotent_for_match_state_and_grid() {
        let mut engine =
            GameEngine::new(default_layout(), GameConfig::default(), 42).expect("loads");
        engine.tick(0);
        engine.move_player(Direction::Right);
        engine.tick(1_000);

        engine.reload().expect("first reload");
        let state_once = engine.state();
        let grid_once = engine.grid().clone();

        engine.reload().expect("second reload");
        assert_eq!(engine.state(), state_once);
        assert_eq!(engine.grid(), &grid_once);
        assert_eq!(engine.state().score, 0);
        assert_eq!(engine.state().status, MatchStatus::Playing);
    }

    #[test]
    fn failed_load_leaves_previous_match_untouched() {
        let mut engine =
            GameEngine::new(default_layout(), GameConfig::default(), 42).expect("loads");
        engine.tick(0);
        engine.move_player(Direction::Right);
        let state_before = engine.state();
        let grid_before = engine.grid().clone();
        let player_before = engine.player_position();

        let err = engine
            .load_layout(rows(&["###", "#P#", "###"]))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidLayout(_)));
        assert_eq!(engine.state(), state_before);
        assert_eq!(engine.grid(), &grid_before);
        assert_eq!(engine.player_position(), player_before);
    }

    #[test]
    fn entities_stay_on_walkable_cells_through_random_play() {
        let mut engine =
            GameEngine::new(default_layout(), GameConfig::default(), 9_001).expect("loads");
        let mut rng = Rng::new(5);

        for step in 0..600u64 {
            let dir = Direction::ALL[rng.pick_index(4)];
            engine.move_player(dir);
            engine.tick(step * 100);

            let pos = engine.player_position();
            assert!(engine.grid().is_walkable(pos.x, pos.y));
            for item in &engine.items {
                assert!(engine.grid().is_walkable(item.x, item.y));
            }
            for enemy in &engine.enemies {
                assert!(engine.grid().is_walkable(enemy.x, enemy.y));
            }

            match engine.state().status {
                MatchStatus::Won => {
                    assert_eq!(engine.player_position(), engine.goal_position());
                    break;
                }
                MatchStatus::Lost => {
                    let state = engine.state();
                    assert!(state.countdown <= 0 || state.lives <= 0);
                    break;
                }
                MatchStatus::Playing => {}
            }
        }
    }

    #[test]
    fn same_seed_same_progression() {
        let mut a = GameEngine::new(default_layout(), GameConfig::default(), 424_242).expect("a");
        let mut b = GameEngine::new(default_layout(), GameConfig::default(), 424_242).expect("b");

        for step in 0..400u64 {
            a.tick(step * 50);
            b.tick(step * 50);
            let sa = a.snapshot(false);
            let sb = b.snapshot(false);
            assert_eq!(sa.match_state, sb.match_state);
            assert_eq!(sa.items, sb.items);
            assert_eq!(sa.enemies, sb.enemies);
        }
    }

    #[test]
    fn snapshot_drains_events_only_when_requested() {
        let config = corridor_config(4, 1, 0);
        let mut engine = GameEngine::new(rows(&["Po.G"]), config, 1).expect("loads");
        engine.move_player(Direction::Right);

        assert!(engine.snapshot(false).events.is_empty());
        assert_eq!(engine.snapshot(true).events.len(), 1);
        assert!(engine.snapshot(true).events.is_empty());
    }
}
