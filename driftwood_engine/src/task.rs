//! Task execution: the actions behind matched commands and fired events.
//!
//! A task runs forward to completion or in reverse to undo itself. Forward
//! runs print the completion text and apply the task's action list in
//! declared order; reverse runs clear the done flag and print the reverse
//! message. A task already running further up the stack is never
//! re-entered, which bounds recursion through run-task actions.

use log::{info, warn};

use crate::bundle::Seg;
use crate::filter::PrintFilter;
use crate::resources;
use crate::state::{Gamestate, random_int};

/// True if the task could run in some direction: forward when not yet
/// done, in reverse when done and reversible.
pub fn can_run_task(game: &Gamestate, task: usize) -> bool {
    if game.tasks[task].done {
        task_is_reversible(game, task)
    } else {
        true
    }
}

/// A task reverses if it declares so or carries reverse command patterns.
pub fn task_is_reversible(game: &Gamestate, task: usize) -> bool {
    game.bundle.entity_boolean("Tasks", task, "Reversible")
        || game
            .bundle
            .count(&["Tasks".into(), task.into(), "ReverseCommand".into()])
            > 0
}

/// Run a task forward or in reverse. Returns false when the direction is
/// not currently possible or the task is already running.
pub fn run_task(game: &mut Gamestate, filter: &mut PrintFilter, task: usize, forwards: bool) -> bool {
    if game.running_tasks.contains(&task) {
        warn!("task {task}: already running, not re-entered");
        return false;
    }
    if forwards == game.tasks[task].done {
        return false;
    }

    info!(
        "task {task}: running {}",
        if forwards { "forwards" } else { "in reverse" }
    );
    game.running_tasks.push(task);

    if forwards {
        game.tasks[task].done = true;

        let text = game.bundle.entity_string("Tasks", task, "CompletionText").to_string();
        if !text.is_empty() {
            filter.push(&text);
            filter.push_char('\n');
        }
        resources::handle_resource(game, &["Tasks".into(), task.into(), "Res".into()]);

        let action_count = game.bundle.count(&["Tasks".into(), task.into(), "Actions".into()]);
        for action in 0..action_count {
            apply_action(game, filter, task, action);
        }
    } else {
        game.tasks[task].done = false;

        let text = game.bundle.entity_string("Tasks", task, "ReverseMessage").to_string();
        if !text.is_empty() {
            filter.push(&text);
            filter.push_char('\n');
        }
    }

    game.running_tasks.pop();
    true
}

/// Apply one action from a task's action list.
fn apply_action(game: &mut Gamestate, filter: &mut PrintFilter, task: usize, action: usize) {
    let bundle = game.bundle.clone();
    let base: [Seg; 4] = ["Tasks".into(), task.into(), "Actions".into(), action.into()];
    let prop = |name: &'static str| -> Vec<Seg<'static>> {
        let mut path = base.to_vec();
        path.push(name.into());
        path
    };

    let kind = bundle.integer(&prop("Type"));
    let var1 = bundle.integer(&prop("Var1"));
    let var2 = bundle.integer(&prop("Var2"));
    let var3 = bundle.integer(&prop("Var3"));

    info!("task {task}: action {action} type {kind}");
    match kind {
        // Move an object, using the event destination encoding.
        0 => {
            let object = if var1 == 0 {
                match game.vars.ref_object() {
                    Some(object) => object as i64,
                    None => {
                        warn!("task {task}: move action with no referenced object");
                        return;
                    }
                }
            } else {
                game.nth_dynamic_object(var1 as usize - 1) as i64
            };
            crate::event::move_event_object(game, object, var2 - 1);
        }

        // Move the player.
        1 => {
            game.move_player_to_room(var1 - 1);
            crate::command::describe_player_room(game, filter, false);
        }

        // Change a stateful object's state or openness.
        2 => {
            let object = if var1 == 0 {
                match game.vars.ref_object() {
                    Some(object) => object,
                    None => {
                        warn!("task {task}: state action with no referenced object");
                        return;
                    }
                }
            } else {
                game.nth_stateful_object(var1 as usize - 1)
            };
            set_object_state(game, object, var2);
        }

        // Change a variable.
        3 => {
            let index = var1 as usize;
            let name = bundle.entity_string("Variables", index, "Name").to_string();
            match var2 {
                0 => game.vars.put_integer(&name, var3),
                1 => {
                    let current = game.integer_variable(&name);
                    game.vars.put_integer(&name, current + var3);
                }
                2 => game.vars.put_integer(&name, random_int(0, var3)),
                5 => {
                    let text = bundle.string(&prop("Expr")).to_string();
                    game.vars.put_string(&name, &text);
                }
                other => panic!("task {task}: unknown variable action {other}"),
            }
        }

        // Change the score; each task scores at most once.
        4 => {
            if !game.tasks[task].scored {
                game.score += var1;
                game.tasks[task].scored = true;
            }
        }

        // Run another task, forwards or in reverse.
        5 => {
            let target = var1 as usize - 1;
            let forwards = var2 == 0;
            if can_run_task(game, target) {
                run_task(game, filter, target, forwards);
            }
        }

        // End the game.
        6 => {
            if var1 == 0 {
                filter.push("\n*** You have won! ***\n");
            } else {
                filter.push("\n*** The game is over. ***\n");
            }
            game.has_completed = true;
            game.is_running = false;
        }

        other => panic!("task {task}: unknown action type {other}"),
    }
}

/// Write a state/openness value using the stateful-object encoding shared
/// with object-state restrictions.
fn set_object_state(game: &mut Gamestate, object: usize, var2: i64) {
    use crate::state::Openness;
    if game.object_is_openable(object) {
        if game.object_key(object).is_some() {
            if var2 <= 2 {
                game.objects[object].openness = Openness::from_wire(var2 + 5);
            } else {
                game.objects[object].state = var2 - 2;
            }
        } else if var2 <= 1 {
            game.objects[object].openness = Openness::from_wire(var2 + 5);
        } else {
            game.objects[object].state = var2 - 1;
        }
    } else {
        game.objects[object].state = var2 + 1;
    }
}

/// A task offers hints when it has a non-empty question.
pub fn has_hints(game: &Gamestate, task: usize) -> bool {
    !game.bundle.entity_string("Tasks", task, "Question").is_empty()
}

pub fn hint_question(game: &Gamestate, task: usize) -> Option<String> {
    let question = game.bundle.entity_string("Tasks", task, "Question");
    (!question.is_empty()).then(|| question.to_string())
}

pub fn hint_subtle(game: &Gamestate, task: usize) -> Option<String> {
    let hint = game.bundle.entity_string("Tasks", task, "Hint1");
    (!hint.is_empty()).then(|| hint.to_string())
}

pub fn hint_unsubtle(game: &Gamestate, task: usize) -> Option<String> {
    let hint = game.bundle.entity_string("Tasks", task, "Hint2");
    (!hint.is_empty()).then(|| hint.to_string())
}
