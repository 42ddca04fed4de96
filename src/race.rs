//! Two tasks appending into one shared sequence.
//!
//! `run` spawns two named appender threads and reports the final sequence.
//! In [`Mode::Unsynchronized`] every append is a read-modify-write with the
//! guard released in the middle, so updates get lost. [`Mode::Synchronized`]
//! holds the guard across the whole append loop. [`Mode::MessagePassing`]
//! removes the shared vector: tasks send their batch to a single owner.

use std::fmt;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PlaygroundError, Result};
use crate::sequence::{append_batch, SharedSequence};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Unsynchronized,
    Synchronized,
    MessagePassing,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Unsynchronized => "unsynchronized",
            Mode::Synchronized => "synchronized",
            Mode::MessagePassing => "message-passing",
        };
        f.write_str(name)
    }
}

/// How the reporter waits for the appenders before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendezvous {
    /// Sleep, then read. Nothing guarantees the tasks are done by then.
    Delay(Duration),
    /// Block until both tasks have signalled completion.
    WaitGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub seed_value: String,
    pub seed_len: usize,
    /// Appends per task.
    pub count: usize,
    /// One value per task; they must differ.
    pub values: [String; 2],
    /// `Some` selects the delay rendezvous, `None` the wait group.
    pub delay_ms: Option<u64>,
    /// Upper bound of the pause inside each unsynchronized read-modify-write.
    pub race_window_us: u64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            seed_value: "xxx".to_string(),
            seed_len: 2,
            count: 10,
            values: ["zzz".to_string(), "vvv".to_string()],
            delay_ms: None,
            race_window_us: 50,
        }
    }
}

impl RaceConfig {
    pub fn rendezvous(&self) -> Rendezvous {
        match self.delay_ms {
            Some(ms) => Rendezvous::Delay(Duration::from_millis(ms)),
            None => Rendezvous::WaitGroup,
        }
    }

    /// `None` when the total does not fit in a `usize`.
    pub fn checked_expected_len(&self) -> Option<usize> {
        self.count
            .checked_mul(self.values.len())?
            .checked_add(self.seed_len)
    }

    pub fn expected_len(&self) -> usize {
        self.checked_expected_len().unwrap_or(usize::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        if self.checked_expected_len().is_none() {
            return Err(PlaygroundError::invalid_config(
                "race.count",
                format!(
                    "{} seeded plus {} per task overflows the sequence length",
                    self.seed_len, self.count
                ),
            ));
        }
        if self.values.iter().any(|v| v.is_empty()) {
            return Err(PlaygroundError::invalid_config(
                "race.values",
                "task values must be non-empty",
            ));
        }
        if self.values[0] == self.values[1] {
            return Err(PlaygroundError::invalid_config(
                "race.values",
                format!("both tasks would append '{}'", self.values[0]),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Lifecycle and report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoState {
    NotStarted,
    Running,
    Completed,
}

impl DemoState {
    fn advance(&mut self, next: DemoState) {
        debug!(from = ?self, to = ?next, "race demo state change");
        *self = next;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceReport {
    pub mode: Mode,
    pub initial_len: usize,
    pub expected_len: usize,
    pub final_len: usize,
    pub lost_updates: usize,
    pub contents: Vec<String>,
}

impl RaceReport {
    fn new(mode: Mode, config: &RaceConfig, contents: Vec<String>) -> Self {
        let expected_len = config.expected_len();
        Self {
            mode,
            initial_len: config.seed_len,
            expected_len,
            final_len: contents.len(),
            lost_updates: expected_len.saturating_sub(contents.len()),
            contents,
        }
    }

    pub fn invariant_holds(&self) -> bool {
        self.final_len == self.expected_len
    }

    /// Number of elements equal to `value`.
    pub fn occurrences(&self, value: &str) -> usize {
        self.contents.iter().filter(|v| *v == value).count()
    }
}

// =============================================================================
// Running the demo
// =============================================================================

pub fn run(mode: Mode, config: &RaceConfig) -> Result<RaceReport> {
    config.validate()?;

    let mut state = DemoState::NotStarted;
    info!(%mode, initial_len = config.seed_len, expected_len = config.expected_len(), "starting race demo");

    let contents = match mode {
        Mode::Unsynchronized | Mode::Synchronized => run_shared(mode, config, &mut state)?,
        Mode::MessagePassing => run_owned(config, &mut state)?,
    };

    state.advance(DemoState::Completed);
    let report = RaceReport::new(mode, config, contents);

    if report.lost_updates > 0 {
        warn!(%mode, lost = report.lost_updates, "updates were lost");
    }
    info!(%mode, final_len = report.final_len, "race demo completed");
    Ok(report)
}

fn spawn_named<T, F>(name: String, body: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Ok(thread::Builder::new().name(name).spawn(body)?)
}

fn join_named<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle.join().map_err(|_| PlaygroundError::TaskPanicked {
        task: name.to_string(),
    })
}

/// Joins every handle, then reports the first failure.
fn join_all<T>(handles: Vec<(String, JoinHandle<T>)>) -> Result<Vec<T>> {
    let joined: Vec<Result<T>> = handles
        .into_iter()
        .map(|(name, handle)| join_named(&name, handle))
        .collect();
    joined.into_iter().collect()
}

fn task_name(value: &str) -> String {
    format!("append-{value}")
}

/// Start line for the appenders. Each task holds a ticket and blocks on it;
/// `fire` lets all of them go together. Dropping the gun unfired makes every
/// ticket return `false`, so a task spawned before a failed sibling exits
/// instead of waiting forever.
struct StartGun {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl StartGun {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    fn ticket(&self) -> Receiver<()> {
        self.rx.clone()
    }

    fn fire(self, tasks: usize) {
        for _ in 0..tasks {
            let _ = self.tx.send(());
        }
    }
}

fn wait_for_start(ticket: &Receiver<()>) -> bool {
    ticket.recv().is_ok()
}

/// Spawns one task per entry. If a spawn fails, the tasks already started are
/// joined before the error is returned.
fn spawn_all<T, F>(
    names: Vec<String>,
    gun: Option<StartGun>,
    mut body_for: impl FnMut(usize) -> F,
) -> Result<Vec<(String, JoinHandle<T>)>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let mut handles = Vec::with_capacity(names.len());
    for (index, name) in names.into_iter().enumerate() {
        match spawn_named(name.clone(), body_for(index)) {
            Ok(handle) => handles.push((name, handle)),
            Err(err) => {
                drop(gun);
                let _ = join_all(handles);
                return Err(err);
            }
        }
    }
    if let Some(gun) = gun {
        gun.fire(handles.len());
    }
    Ok(handles)
}

fn await_rendezvous(rendezvous: Rendezvous, wait_group: WaitGroup) {
    match rendezvous {
        Rendezvous::WaitGroup => wait_group.wait(),
        Rendezvous::Delay(delay) => {
            drop(wait_group);
            thread::sleep(delay);
        }
    }
}

fn run_shared(mode: Mode, config: &RaceConfig, state: &mut DemoState) -> Result<Vec<String>> {
    let sequence = SharedSequence::seeded(&config.seed_value, config.seed_len);
    let gun = StartGun::new();
    let wait_group = WaitGroup::new();
    let window = Duration::from_micros(config.race_window_us);
    let count = config.count;

    let names = config.values.iter().map(|v| task_name(v)).collect();
    let tickets: Vec<_> = config.values.iter().map(|_| gun.ticket()).collect();
    let handles = spawn_all(names, Some(gun), |index| {
        let sequence = sequence.clone();
        let ticket = tickets[index].clone();
        let done = wait_group.clone();
        let value = config.values[index].clone();

        move || {
            if !wait_for_start(&ticket) {
                return;
            }
            match mode {
                Mode::Synchronized => {
                    let mut guard = sequence.lock();
                    append_batch(&mut guard, &value, count);
                    debug!(%value, len = guard.len(), "appended batch under lock");
                }
                _ => {
                    for _ in 0..count {
                        sequence.racy_append(&value, window);
                    }
                    debug!(%value, "appended batch without lock");
                }
            }
            drop(done);
        }
    })?;
    state.advance(DemoState::Running);

    await_rendezvous(config.rendezvous(), wait_group);
    let contents = sequence.snapshot();

    join_all(handles)?;
    Ok(contents)
}

enum OwnerMessage {
    Append { value: String, count: usize },
    Snapshot(Sender<Vec<String>>),
}

/// The only code that ever touches the vector in message-passing mode.
fn own_sequence(mut items: Vec<String>, inbox: Receiver<OwnerMessage>) -> Vec<String> {
    while let Ok(message) = inbox.recv() {
        match message {
            OwnerMessage::Append { value, count } => append_batch(&mut items, &value, count),
            OwnerMessage::Snapshot(reply_to) => {
                let _ = reply_to.send(items.clone());
            }
        }
    }
    items
}

fn send_batch(outbox: &Sender<OwnerMessage>, value: String, count: usize) -> Result<()> {
    outbox
        .send(OwnerMessage::Append { value, count })
        .map_err(|_| PlaygroundError::ChannelClosed)
}

fn request_snapshot(outbox: &Sender<OwnerMessage>) -> Result<Vec<String>> {
    let (reply_tx, reply_rx) = unbounded();
    outbox
        .send(OwnerMessage::Snapshot(reply_tx))
        .map_err(|_| PlaygroundError::ChannelClosed)?;
    reply_rx.recv().map_err(|_| PlaygroundError::ChannelClosed)
}

fn run_owned(config: &RaceConfig, state: &mut DemoState) -> Result<Vec<String>> {
    let seed = SharedSequence::seeded(&config.seed_value, config.seed_len).snapshot();
    let (tx, rx) = unbounded();
    let owner = spawn_named("sequence-owner".to_string(), move || own_sequence(seed, rx))?;

    let wait_group = WaitGroup::new();
    let count = config.count;
    let names = config.values.iter().map(|v| task_name(v)).collect();
    let spawned = spawn_all(names, None, |index| {
        let tx = tx.clone();
        let done = wait_group.clone();
        let value = config.values[index].clone();

        move || {
            let sent = send_batch(&tx, value, count);
            drop(done);
            sent
        }
    });

    let handles = match spawned {
        Ok(handles) => handles,
        Err(err) => {
            drop(tx);
            let _ = join_named("sequence-owner", owner);
            return Err(err);
        }
    };
    state.advance(DemoState::Running);

    await_rendezvous(config.rendezvous(), wait_group);
    let contents = request_snapshot(&tx);

    let sent = join_all(handles);
    drop(tx);
    join_named("sequence-owner", owner)?;

    for result in sent? {
        result?;
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_seed(seed_len: usize) -> RaceConfig {
        RaceConfig {
            seed_len,
            ..RaceConfig::default()
        }
    }

    #[test]
    fn test_synchronized_from_two_seeded() {
        let report = run(Mode::Synchronized, &config_with_seed(2)).unwrap();
        assert_eq!(report.initial_len, 2);
        assert_eq!(report.final_len, 22);
        assert_eq!(report.lost_updates, 0);
        assert!(report.invariant_holds());
    }

    #[test]
    fn test_synchronized_from_twenty_seeded() {
        let report = run(Mode::Synchronized, &config_with_seed(20)).unwrap();
        assert_eq!(report.final_len, 40);
    }

    #[test]
    fn test_synchronized_batches_are_contiguous() {
        let report = run(Mode::Synchronized, &RaceConfig::default()).unwrap();
        let appended = &report.contents[2..];

        assert_eq!(report.occurrences("zzz"), 10);
        assert_eq!(report.occurrences("vvv"), 10);
        assert!(appended[..10].iter().all(|v| v == &appended[0]));
        assert!(appended[10..].iter().all(|v| v == &appended[10]));
        assert_ne!(appended[0], appended[10]);
    }

    #[test]
    fn test_message_passing_keeps_every_append() {
        for seed_len in [0, 2, 20] {
            let report = run(Mode::MessagePassing, &config_with_seed(seed_len)).unwrap();
            assert_eq!(report.final_len, seed_len + 20);
            assert_eq!(report.occurrences("xxx"), seed_len);
        }
    }

    #[test]
    fn test_unsynchronized_never_exceeds_expected() {
        let config = RaceConfig {
            count: 200,
            ..RaceConfig::default()
        };
        for _ in 0..5 {
            let report = run(Mode::Unsynchronized, &config).unwrap();
            assert!(report.final_len <= report.expected_len);
            assert_eq!(report.lost_updates, report.expected_len - report.final_len);
            assert_eq!(report.occurrences("xxx"), 2);
        }
    }

    #[test]
    fn test_interleaved_read_modify_write_loses_update() {
        let sequence = SharedSequence::seeded("xxx", 2);

        let mut first = sequence.snapshot();
        let mut second = sequence.snapshot();
        first.push("zzz".to_string());
        second.push("vvv".to_string());
        *sequence.lock() = first;
        *sequence.lock() = second;

        assert_eq!(sequence.snapshot(), vec!["xxx", "xxx", "vvv"]);
    }

    #[test]
    fn test_delay_rendezvous_does_not_wait_for_tasks() {
        let wait_group = WaitGroup::new();
        let (release_tx, release_rx) = unbounded::<()>();
        let (finished_tx, finished_rx) = unbounded::<()>();

        let done = wait_group.clone();
        let task = thread::spawn(move || {
            let _ = release_rx.recv();
            drop(done);
            let _ = finished_tx.send(());
        });

        // The task is still parked holding its wait-group clone.
        await_rendezvous(Rendezvous::Delay(Duration::ZERO), wait_group);
        assert!(finished_rx.try_recv().is_err());

        release_tx.send(()).unwrap();
        task.join().unwrap();
        assert!(finished_rx.recv().is_ok());
    }

    #[test]
    fn test_delay_rendezvous_still_joins_tasks() {
        let config = RaceConfig {
            count: 50_000,
            delay_ms: Some(0),
            ..RaceConfig::default()
        };
        assert_eq!(config.rendezvous(), Rendezvous::Delay(Duration::ZERO));

        for mode in [Mode::Synchronized, Mode::MessagePassing] {
            let report = run(mode, &config).unwrap();
            assert!(report.final_len >= 2);
            assert!(report.final_len <= report.expected_len);
            assert_eq!(report.occurrences("xxx"), 2);
        }
    }

    #[test]
    fn test_panicking_task_is_reported_by_name() {
        let handle = spawn_named::<(), _>("boom".to_string(), || panic!("appender died")).unwrap();
        let err = join_named("boom", handle).unwrap_err();

        match err {
            PlaygroundError::TaskPanicked { task } => assert_eq!(task, "boom"),
            other => panic!("expected TaskPanicked, got {other:?}"),
        }
    }

    #[test]
    fn test_join_all_waits_for_every_task_before_failing() {
        let (tx, rx) = unbounded::<&'static str>();
        let tx_ok = tx.clone();
        let handles: Vec<(String, JoinHandle<()>)> = vec![
            (
                "boom".to_string(),
                thread::spawn(|| panic!("first task died")),
            ),
            (
                "steady".to_string(),
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(20));
                    let _ = tx_ok.send("steady finished");
                }),
            ),
        ];
        drop(tx);

        let err = join_all(handles).unwrap_err();
        assert!(matches!(err, PlaygroundError::TaskPanicked { ref task } if task == "boom"));
        assert_eq!(rx.try_recv(), Ok("steady finished"));
    }

    #[test]
    fn test_send_to_dropped_owner_is_channel_closed() {
        let (tx, rx) = unbounded::<OwnerMessage>();
        drop(rx);

        let err = send_batch(&tx, "zzz".to_string(), 10).unwrap_err();
        assert!(matches!(err, PlaygroundError::ChannelClosed));

        let err = request_snapshot(&tx).unwrap_err();
        assert!(matches!(err, PlaygroundError::ChannelClosed));
    }

    #[test]
    fn test_unfired_start_gun_releases_waiting_task() {
        let gun = StartGun::new();
        let ticket = gun.ticket();
        let task = thread::spawn(move || wait_for_start(&ticket));

        drop(gun);
        assert!(!task.join().unwrap());
    }

    #[test]
    fn test_fired_start_gun_starts_every_task() {
        let gun = StartGun::new();
        let tasks: Vec<_> = (0..2)
            .map(|_| {
                let ticket = gun.ticket();
                thread::spawn(move || wait_for_start(&ticket))
            })
            .collect();

        gun.fire(tasks.len());
        for task in tasks {
            assert!(task.join().unwrap());
        }
    }

    #[test]
    fn test_spawn_all_fires_after_spawning() {
        let gun = StartGun::new();
        let tickets: Vec<_> = (0..2).map(|_| gun.ticket()).collect();
        let names = vec!["append-a".to_string(), "append-b".to_string()];

        let handles = spawn_all(names, Some(gun), |index| {
            let ticket = tickets[index].clone();
            move || wait_for_start(&ticket)
        })
        .unwrap();

        assert_eq!(join_all(handles).unwrap(), vec![true, true]);
    }

    #[test]
    fn test_overflowing_count_rejected() {
        let config = RaceConfig {
            count: usize::MAX,
            ..RaceConfig::default()
        };
        assert_eq!(config.checked_expected_len(), None);

        let err = run(Mode::Synchronized, &config).unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidConfig { ref field, .. } if field == "race.count"));
    }

    #[test]
    fn test_zero_count_leaves_seed() {
        let config = RaceConfig {
            count: 0,
            ..RaceConfig::default()
        };
        for mode in [Mode::Unsynchronized, Mode::Synchronized, Mode::MessagePassing] {
            let report = run(mode, &config).unwrap();
            assert_eq!(report.contents, vec!["xxx", "xxx"]);
        }
    }

    #[test]
    fn test_equal_values_rejected() {
        let config = RaceConfig {
            values: ["zzz".to_string(), "zzz".to_string()],
            ..RaceConfig::default()
        };
        let err = run(Mode::Synchronized, &config).unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidConfig { .. }));
    }

    #[test]
    fn test_report_serializes_mode_kebab_case() {
        let report = run(Mode::MessagePassing, &RaceConfig::default()).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mode"], "message-passing");
        assert_eq!(json["final_len"], 22);
    }
}
