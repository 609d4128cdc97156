use clap::Parser;
use maze_sim::config::GameConfig;
use maze_sim::engine::GameEngine;
use maze_sim::grid::{default_layout, Grid};
use maze_sim::rng::Rng;
use maze_sim::types::{Direction, MatchStatus, RuntimeEvent, Snapshot, Vec2};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const TICK_MS: u64 = 50;
const PLAYER_MOVE_INTERVAL_MS: u64 = 200;
const DEFAULT_MAX_TICKS: u64 = 20 * 60 * 5;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Seed for the engine; random when omitted.
    #[arg(long)]
    seed: Option<u64>,
    /// Number of matches; runs after the first reload the same layout.
    #[arg(long)]
    runs: Option<usize>,
    /// Layout file, one row per line. Defaults to the built-in board.
    #[arg(long)]
    layout: Option<PathBuf>,
    #[arg(long)]
    max_ticks: Option<u64>,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize)]
struct RunResultLine {
    run: usize,
    seed: u32,
    status: String,
    ticks: u64,
    #[serde(rename = "simTimeMs")]
    sim_time_ms: u64,
    score: i32,
    #[serde(rename = "livesLeft")]
    lives_left: i32,
    #[serde(rename = "countdownLeft")]
    countdown_left: i32,
    pickups: usize,
    hits: usize,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct RunOutcome {
    result: RunResultLine,
    anomaly_records: Vec<AnomalyRecord>,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "runCount")]
    run_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageTicks")]
    average_ticks: u64,
    #[serde(rename = "statusCounts")]
    status_counts: BTreeMap<String, usize>,
    runs: Vec<RunResultLine>,
}

#[derive(Clone, Debug, Serialize)]
struct StructuredLogLine {
    #[serde(rename = "timestampMs")]
    timestamp_ms: u64,
    level: String,
    event: String,
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tick: Option<u64>,
    details: Value,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = GameConfig::default();
    let seed = normalize_seed(cli.seed.unwrap_or_else(|| rand::random::<u64>()));
    let runs = cli.runs.unwrap_or(1).max(1);
    let max_ticks = cli.max_ticks.unwrap_or(DEFAULT_MAX_TICKS);
    let run_started_at_ms = now_ms();
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(seed, run_started_at_ms));

    let layout = match cli.layout.as_ref() {
        Some(path) => match read_layout(path) {
            Ok(rows) => rows,
            Err(error) => {
                emit_log(
                    "error",
                    "layout_read_failed",
                    &match_id,
                    None,
                    None,
                    None,
                    json!({
                        "path": path.to_string_lossy(),
                        "error": error.to_string(),
                    }),
                );
                std::process::exit(2);
            }
        },
        None => default_layout(),
    };

    let mut engine = match GameEngine::new(layout, config.clone(), seed) {
        Ok(engine) => engine,
        Err(error) => {
            emit_log(
                "error",
                "load_failed",
                &match_id,
                None,
                Some(seed),
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    };

    let mut has_anomaly = false;
    let mut run_results = Vec::new();
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_ticks = 0u64;
    let mut total_anomalies = 0usize;

    for run in 0..runs {
        if run > 0 {
            if let Err(error) = engine.reload() {
                emit_log(
                    "error",
                    "reload_failed",
                    &match_id,
                    Some(run),
                    Some(seed),
                    None,
                    json!({ "error": error.to_string() }),
                );
                std::process::exit(2);
            }
        }
        emit_log(
            "info",
            "run_started",
            &match_id,
            Some(run),
            Some(seed),
            None,
            json!({ "maxTicks": max_ticks }),
        );

        let outcome = drive_match(&mut engine, &config, run, seed, max_ticks);

        for anomaly in &outcome.anomaly_records {
            emit_log(
                "warn",
                "anomaly_detected",
                &match_id,
                Some(run),
                Some(seed),
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        if !outcome.result.anomalies.is_empty() {
            has_anomaly = true;
        }
        total_anomalies += outcome.anomaly_records.len();
        total_ticks += outcome.result.ticks;
        *status_counts
            .entry(outcome.result.status.clone())
            .or_insert(0) += 1;

        emit_log(
            "info",
            "run_finished",
            &match_id,
            Some(run),
            Some(seed),
            Some(outcome.result.ticks),
            json!({
                "status": outcome.result.status,
                "score": outcome.result.score,
                "anomalyCount": outcome.anomaly_records.len(),
            }),
        );

        println!(
            "{}",
            serde_json::to_string(&outcome.result).expect("run result should serialize")
        );
        run_results.push(outcome.result);
    }

    let run_finished_at_ms = now_ms();
    let summary = build_run_summary(
        match_id.clone(),
        run_started_at_ms,
        run_finished_at_ms,
        run_results,
        status_counts,
        total_anomalies,
        total_ticks,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            emit_log(
                "error",
                "summary_write_failed",
                &match_id,
                None,
                None,
                None,
                json!({
                    "path": path.to_string_lossy(),
                    "error": error.to_string(),
                }),
            );
            std::process::exit(2);
        }
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        "info",
        "simulation_finished",
        &match_id,
        None,
        None,
        None,
        json!({
            "runCount": summary.run_count,
            "anomalyCount": summary.anomaly_count,
            "averageTicks": summary.average_ticks,
            "statusCounts": summary.status_counts,
            "summaryOut": summary_out_written,
        }),
    );

    if has_anomaly {
        std::process::exit(1);
    }
}

fn drive_match(
    engine: &mut GameEngine,
    config: &GameConfig,
    run: usize,
    seed: u32,
    max_ticks: u64,
) -> RunOutcome {
    let mut policy_rng = Rng::new(seed.wrapping_add(run as u32));
    let mut pickups = 0usize;
    let mut hits = 0usize;
    let mut last_score = 0i32;
    let mut anomalies = Vec::new();
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut ticks = 0u64;
    let mut now = 0u64;
    let mut next_move_at = 0u64;

    while !engine.is_over() && ticks < max_ticks {
        if now >= next_move_at {
            if let Some(dir) = step_toward_goal(
                engine.grid(),
                engine.player_position(),
                engine.goal_position(),
                &mut policy_rng,
            ) {
                engine.move_player(dir);
            }
            next_move_at = now + PLAYER_MOVE_INTERVAL_MS;
        }
        engine.tick(now);
        let snapshot = engine.snapshot(true);
        ticks = snapshot.tick;

        for message in collect_snapshot_anomalies(&snapshot, config, last_score) {
            push_anomaly(
                &mut anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        last_score = snapshot.match_state.score;

        for event in &snapshot.events {
            match event {
                RuntimeEvent::Pickup { .. } => pickups += 1,
                RuntimeEvent::Damage { .. } => hits += 1,
            }
        }
        now += TICK_MS;
    }

    if !engine.is_over() {
        push_anomaly(
            &mut anomalies,
            &mut anomaly_records,
            &mut anomaly_seen,
            ticks,
            "tick safety limit exceeded".to_string(),
        );
    }

    let state = engine.state();
    RunOutcome {
        result: RunResultLine {
            run,
            seed,
            status: status_key(state.status),
            ticks,
            sim_time_ms: now,
            score: state.score,
            lives_left: state.lives,
            countdown_left: state.countdown,
            pickups,
            hits,
            anomalies,
        },
        anomaly_records,
    }
}

/// First step of a breadth-first path from the player to the goal, or a
/// random walkable direction when the goal is unreachable.
fn step_toward_goal(grid: &Grid, from: Vec2, goal: Vec2, rng: &mut Rng) -> Option<Direction> {
    if from == goal {
        return None;
    }
    let width = grid.width();
    let index = |p: Vec2| (p.y * width + p.x) as usize;
    let mut first_step = vec![None; (width * grid.height()) as usize];
    let mut queue = VecDeque::new();
    queue.push_back(from);
    let mut visited = vec![false; first_step.len()];
    visited[index(from)] = true;

    while let Some(pos) = queue.pop_front() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            let next = Vec2 {
                x: pos.x + dx,
                y: pos.y + dy,
            };
            if !grid.is_walkable(next.x, next.y) || visited[index(next)] {
                continue;
            }
            visited[index(next)] = true;
            first_step[index(next)] = first_step[index(pos)].or(Some(dir));
            if next == goal {
                return first_step[index(next)];
            }
            queue.push_back(next);
        }
    }

    // Unreachable goal: wander so the run still exercises the engine.
    let open: Vec<Direction> = Direction::ALL
        .iter()
        .copied()
        .filter(|dir| {
            let (dx, dy) = dir.delta();
            grid.is_walkable(from.x + dx, from.y + dy)
        })
        .collect();
    if open.is_empty() {
        None
    } else {
        Some(open[rng.pick_index(open.len())])
    }
}

fn collect_snapshot_anomalies(
    snapshot: &Snapshot,
    config: &GameConfig,
    last_score: i32,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    let walkable = |x: i32, y: i32| {
        let row = snapshot.tiles.get(y as usize);
        matches!(row.and_then(|r| r.as_bytes().get(x as usize)), Some(b'.'))
    };

    if !walkable(snapshot.player.x, snapshot.player.y) {
        anomalies.push(format!(
            "player off the walkable grid: ({}, {})",
            snapshot.player.x, snapshot.player.y
        ));
    }
    for item in &snapshot.items {
        if !walkable(item.x, item.y) {
            anomalies.push(format!("item off the walkable grid: ({}, {})", item.x, item.y));
        }
    }
    for enemy in &snapshot.enemies {
        if !walkable(enemy.x, enemy.y) {
            anomalies.push(format!(
                "enemy off the walkable grid: ({}, {})",
                enemy.x, enemy.y
            ));
        }
    }

    let state = snapshot.match_state;
    if state.lives < 0 || state.lives > config.starting_lives {
        anomalies.push(format!("lives out of range: {}", state.lives));
    }
    if state.countdown > config.starting_countdown {
        anomalies.push(format!("countdown grew: {}", state.countdown));
    }
    if state.score < last_score {
        anomalies.push(format!(
            "score decreased: {} -> {}",
            last_score, state.score
        ));
    }
    if snapshot.items.len() > config.max_items {
        anomalies.push(format!("item count over cap: {}", snapshot.items.len()));
    }
    if snapshot.enemies.len() > config.max_enemies {
        anomalies.push(format!("enemy count over cap: {}", snapshot.enemies.len()));
    }
    anomalies
}

fn status_key(status: MatchStatus) -> String {
    match status {
        MatchStatus::Playing => "playing",
        MatchStatus::Won => "won",
        MatchStatus::Lost => "lost",
    }
    .to_string()
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    runs: Vec<RunResultLine>,
    status_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_ticks: u64,
) -> RunSummary {
    let run_count = runs.len();
    let average_ticks = if run_count == 0 {
        0
    } else {
        total_ticks / run_count as u64
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        run_count,
        anomaly_count,
        average_ticks,
        status_counts,
        runs,
    }
}

fn emit_log(
    level: &str,
    event: &str,
    match_id: &str,
    run: Option<usize>,
    seed: Option<u32>,
    tick: Option<u64>,
    details: Value,
) {
    let log_line = StructuredLogLine {
        timestamp_ms: now_ms(),
        level: level.to_string(),
        event: event.to_string(),
        match_id: match_id.to_string(),
        run,
        seed,
        tick,
        details,
    };
    eprintln!(
        "{}",
        serde_json::to_string(&log_line).expect("structured log should serialize")
    );
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn read_layout(path: &Path) -> io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|line| line.to_string())
        .filter(|line| !line.is_empty())
        .collect())
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).expect("run summary should serialize");
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run_result(status: &str, ticks: u64) -> RunResultLine {
        RunResultLine {
            run: 0,
            seed: 42,
            status: status.to_string(),
            ticks,
            sim_time_ms: ticks * TICK_MS,
            score: 0,
            lives_left: 3,
            countdown_left: 100,
            pickups: 0,
            hits: 0,
            anomalies: Vec::new(),
        }
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_ticks() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![make_run_result("won", 600), make_run_result("lost", 1_000)],
            BTreeMap::from([("won".to_string(), 1usize), ("lost".to_string(), 1usize)]),
            0,
            1_600,
        );
        assert_eq!(summary.average_ticks, 800);
        assert_eq!(summary.run_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let target = std::env::temp_dir()
            .join(format!("maze-sim-missing-{}", now_ms()))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_run_result("won", 600)],
            BTreeMap::from([("won".to_string(), 1usize)]),
            0,
            600,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            10,
            "same anomaly".to_string(),
        );
        push_anomaly(
            &mut anomalies,
            &mut records,
            &mut seen,
            11,
            "same anomaly".to_string(),
        );

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn step_toward_goal_finds_the_corridor_path() {
        let config = GameConfig {
            width: 5,
            height: 3,
            ..GameConfig::default()
        };
        let rows: Vec<String> = ["#####", "#P.G#", "#####"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (grid, placements) = Grid::from_layout(&rows, &config).expect("loads");
        let mut rng = Rng::new(1);
        let dir = step_toward_goal(&grid, placements.player, placements.goal, &mut rng);
        assert_eq!(dir, Some(Direction::Right));
    }

    #[test]
    fn step_toward_goal_wanders_when_goal_is_walled_off() {
        let config = GameConfig {
            width: 5,
            height: 3,
            ..GameConfig::default()
        };
        let rows: Vec<String> = ["#####", "#P.#G", "#####"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let (grid, placements) = Grid::from_layout(&rows, &config).expect("loads");
        let mut rng = Rng::new(1);
        let dir = step_toward_goal(&grid, placements.player, placements.goal, &mut rng);
        assert_eq!(dir, Some(Direction::Right));
    }
}
