//! Command-driven state inspector and watchpoint engine.
//!
//! The debugger is off by default; hosts opt in before the session starts.
//! Inspector commands dump slices of the gamestate as JSON, and
//! watchpoints record a rendered value per watched item, reporting after
//! any accepted turn in which the value changed.

use serde_json::json;

use crate::state::Gamestate;

/// One watchable item.
#[derive(Debug, Clone, PartialEq)]
enum Watch {
    Task(usize),
    Event(usize),
    Object(usize),
    Npc(usize),
    Variable(String),
    Score,
    Room,
}

#[derive(Debug, Clone)]
struct Watchpoint {
    watch: Watch,
    last: String,
}

/// Debugger state, owned by the session rather than the gamestate so
/// that undo and restore never disturb it.
#[derive(Debug, Default)]
pub struct Debugger {
    enabled: bool,
    watchpoints: Vec<Watchpoint>,
}

const HELP: &str = "debugger commands:\n\
  state              summary of the session\n\
  rooms              per-room visited flags\n\
  objects            object positions and flags\n\
  tasks              task done/scored flags\n\
  events             event phases and timers\n\
  npcs               NPC locations and walks\n\
  variables          user variable values\n\
  watch <what> <id>  add a watchpoint (task/event/object/npc/var/score/room)\n\
  watches            list watchpoints\n\
  delete <index>     remove a watchpoint\n\
  continue           leave the debugger\n";

impl Debugger {
    pub fn new() -> Debugger {
        Debugger::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Execute one inspector command and return its output text.
    pub fn execute(&mut self, game: &mut Gamestate, command: &str) -> String {
        let mut words = command.split_whitespace();
        match words.next() {
            None | Some("help") => HELP.to_string(),
            Some("state") => json!({
                "room": game.playerroom,
                "turns": game.turns,
                "score": game.score,
                "running": game.is_running,
                "completed": game.has_completed,
                "rooms": game.rooms.len(),
                "objects": game.objects.len(),
                "tasks": game.tasks.len(),
                "events": game.events.len(),
                "npcs": game.npcs.len(),
            })
            .to_string(),
            Some("rooms") => {
                let visited: Vec<usize> = (0..game.rooms.len())
                    .filter(|&room| game.rooms[room].visited)
                    .collect();
                json!({ "visited": visited }).to_string()
            }
            Some("objects") => {
                let objects: Vec<_> = game
                    .objects
                    .iter()
                    .enumerate()
                    .map(|(index, object)| {
                        let (position, parent) = object.position.to_wire();
                        json!({
                            "index": index,
                            "position": position,
                            "parent": parent,
                            "openness": object.openness.to_wire(),
                            "state": object.state,
                            "seen": object.seen,
                            "unmoved": object.unmoved,
                        })
                    })
                    .collect();
                serde_json::Value::Array(objects).to_string()
            }
            Some("tasks") => {
                let tasks: Vec<_> = game
                    .tasks
                    .iter()
                    .enumerate()
                    .map(|(index, task)| {
                        json!({ "index": index, "done": task.done, "scored": task.scored })
                    })
                    .collect();
                serde_json::Value::Array(tasks).to_string()
            }
            Some("events") => {
                let events: Vec<_> = game
                    .events
                    .iter()
                    .enumerate()
                    .map(|(index, event)| {
                        json!({
                            "index": index,
                            "phase": event.phase.to_wire(),
                            "time": event.time,
                        })
                    })
                    .collect();
                serde_json::Value::Array(events).to_string()
            }
            Some("npcs") => {
                let npcs: Vec<_> = game
                    .npcs
                    .iter()
                    .enumerate()
                    .map(|(index, npc)| {
                        json!({
                            "index": index,
                            "location": npc.location,
                            "position": npc.position,
                            "seen": npc.seen,
                            "walksteps": npc.walksteps,
                        })
                    })
                    .collect();
                serde_json::Value::Array(npcs).to_string()
            }
            Some("variables") => {
                let vars: Vec<_> = game
                    .vars
                    .sorted()
                    .into_iter()
                    .map(|(name, value)| json!({ "name": name, "value": value.render() }))
                    .collect();
                serde_json::Value::Array(vars).to_string()
            }
            Some("watch") => self.add_watch(game, words.next(), words.next()),
            Some("watches") => {
                if self.watchpoints.is_empty() {
                    "no watchpoints set".to_string()
                } else {
                    self.watchpoints
                        .iter()
                        .enumerate()
                        .map(|(index, wp)| format!("{index}: {:?} = {}", wp.watch, wp.last))
                        .collect::<Vec<_>>()
                        .join("\n")
                }
            }
            Some("delete") => match words.next().and_then(|word| word.parse::<usize>().ok()) {
                Some(index) if index < self.watchpoints.len() => {
                    self.watchpoints.remove(index);
                    format!("watchpoint {index} deleted")
                }
                _ => "no such watchpoint".to_string(),
            },
            Some(other) => format!("unknown debugger command {other:?} (try help)"),
        }
    }

    fn add_watch(&mut self, game: &mut Gamestate, what: Option<&str>, id: Option<&str>) -> String {
        let watch = match (what, id) {
            (Some("task"), Some(id)) => id.parse().ok().map(Watch::Task),
            (Some("event"), Some(id)) => id.parse().ok().map(Watch::Event),
            (Some("object"), Some(id)) => id.parse().ok().map(Watch::Object),
            (Some("npc"), Some(id)) => id.parse().ok().map(Watch::Npc),
            (Some("var"), Some(name)) => Some(Watch::Variable(name.to_string())),
            (Some("score"), _) => Some(Watch::Score),
            (Some("room"), _) => Some(Watch::Room),
            _ => None,
        };
        match watch {
            Some(watch) => {
                let last = render_watch(game, &watch);
                self.watchpoints.push(Watchpoint { watch, last });
                format!("watchpoint {} set", self.watchpoints.len() - 1)
            }
            None => "usage: watch [task/event/object/npc/var/score/room] <id>".to_string(),
        }
    }

    /// Compare watchpoints against the current state; returns a report
    /// line for each one that changed since the last accepted turn.
    pub fn turn_update(&mut self, game: &mut Gamestate) -> Vec<String> {
        let mut reports = Vec::new();
        for (index, watchpoint) in self.watchpoints.iter_mut().enumerate() {
            let current = render_watch(game, &watchpoint.watch);
            if current != watchpoint.last {
                reports.push(format!(
                    "watchpoint {index}: {:?} changed from {} to {current}",
                    watchpoint.watch, watchpoint.last
                ));
                watchpoint.last = current;
            }
        }
        reports
    }
}

fn render_watch(game: &mut Gamestate, watch: &Watch) -> String {
    match watch {
        Watch::Task(index) => match game.tasks.get(*index) {
            Some(task) => json!({ "done": task.done, "scored": task.scored }).to_string(),
            None => "<out of range>".to_string(),
        },
        Watch::Event(index) => match game.events.get(*index) {
            Some(event) => {
                json!({ "phase": event.phase.to_wire(), "time": event.time }).to_string()
            }
            None => "<out of range>".to_string(),
        },
        Watch::Object(index) => match game.objects.get(*index) {
            Some(object) => {
                let (position, parent) = object.position.to_wire();
                json!({ "position": position, "parent": parent, "state": object.state })
                    .to_string()
            }
            None => "<out of range>".to_string(),
        },
        Watch::Npc(index) => match game.npcs.get(*index) {
            Some(npc) => json!({ "location": npc.location, "position": npc.position }).to_string(),
            None => "<out of range>".to_string(),
        },
        Watch::Variable(name) => game
            .variable(name)
            .map_or_else(|| "<no such variable>".to_string(), |value| value.render()),
        Watch::Score => game.score.to_string(),
        Watch::Room => game.playerroom.to_string(),
    }
}
