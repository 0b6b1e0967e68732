//! The event engine: a five-state machine per event.
//!
//! Events wait out a (possibly random) delay, run for a rolled duration
//! while printing their scheduled texts, and finish by moving objects and
//! optionally firing a task. Pause and resume predicates over task states
//! can suspend a running event. Ticking visits states in a fixed order and
//! never revisits an event moved between states within the same tick.

use log::{info, trace};

use crate::bundle::Seg;
use crate::filter::PrintFilter;
use crate::object::roomlist_selects;
use crate::resources;
use crate::state::{EventPhase, Gamestate, random_int};
use crate::task;

impl Gamestate {
    /// True if the player is in a room selected by the event's `Where`
    /// list, so its texts should be shown.
    pub fn can_see_event(&self, event: usize) -> bool {
        roomlist_selects(
            self,
            &["Events".into(), event.into(), "Where".into()],
            self.playerroom,
        )
    }

    /// True if any task at all matches the given completion state.
    fn any_task_in_state(&self, state: bool) -> bool {
        self.tasks.iter().any(|task| task.done == state)
    }
}

/// Advance each event by one turn.
///
/// States tick in Waiting, Running, Awaiting, Finished, Paused order, and
/// within each state events tick by ascending index. An event that changed
/// state earlier in this tick is skipped when its new state comes up.
pub fn tick_events(game: &mut Gamestate, filter: &mut PrintFilter) {
    let mut ticked = vec![false; game.events.len()];
    for phase in EventPhase::TICK_ORDER {
        for event in 0..game.events.len() {
            if game.events[event].phase == phase && !ticked[event] {
                ticked[event] = true;
                tick_event(game, filter, event);
            }
        }
    }
}

fn tick_event(game: &mut Gamestate, filter: &mut PrintFilter, event: usize) {
    match game.events[event].phase {
        EventPhase::Waiting => {
            game.events[event].time -= 1;
            if game.events[event].time <= 0 {
                start_event(game, filter, event);
            }
        }
        EventPhase::Running => tick_running(game, filter, event),
        EventPhase::Awaiting => {
            let task = event_integer(game, event, "TaskNum") - 1;
            if task >= 0 && game.tasks[task as usize].done {
                start_event(game, filter, event);
            }
        }
        EventPhase::Finished => {
            // A finished task-started event rearms once its task is undone.
            if event_integer(game, event, "StarterType") == 3 {
                let task = event_integer(game, event, "TaskNum") - 1;
                if task >= 0 && !game.tasks[task as usize].done {
                    game.events[event].phase = EventPhase::Awaiting;
                }
            }
        }
        EventPhase::Paused => tick_paused(game, filter, event),
    }
}

fn tick_running(game: &mut Gamestate, filter: &mut PrintFilter, event: usize) {
    trace!("event {event}: running");

    // A task-started event drops back to Awaiting if its task is undone.
    if event_integer(game, event, "StarterType") == 3 {
        let task = event_integer(game, event, "TaskNum") - 1;
        if task >= 0 && !game.tasks[task as usize].done {
            game.events[event].phase = EventPhase::Awaiting;
            return;
        }
    }

    if should_pause(game, event) && !should_resume(game, event) {
        info!("event {event}: pausing");
        game.events[event].phase = EventPhase::Paused;
        return;
    }

    game.events[event].time -= 1;

    if game.can_see_event(event) {
        for (pref_time, pref_text, res_index) in
            [("PrefTime1", "PrefText1", 2usize), ("PrefTime2", "PrefText2", 3usize)]
        {
            if event_integer(game, event, pref_time) == game.events[event].time {
                let text = event_string(game, event, pref_text);
                if !text.is_empty() {
                    filter.push(&text);
                    filter.push_char('\n');
                }
                resources::handle_resource(
                    game,
                    &["Events".into(), event.into(), "Res".into(), res_index.into()],
                );
            }
        }
    }

    if game.events[event].time <= 0 {
        finish_event(game, filter, event);
    }
}

fn tick_paused(game: &mut Gamestate, filter: &mut PrintFilter, event: usize) {
    let pause_task = event_integer(game, event, "PauseTask");
    let pause_expect = !event_boolean(game, event, "PauserCompleted");
    let resume_task = event_integer(game, event, "ResumeTask");
    let resume_expect = !event_boolean(game, event, "ResumerCompleted");

    let resume = if pause_task == 1 && !game.any_task_in_state(pause_expect) {
        trace!("event {event}: resuming, all tasks left the pausing state");
        true
    } else if pause_task > 1
        && pause_expect != game.tasks[pause_task as usize - 2].done
    {
        trace!("event {event}: resuming, pause task left its state");
        true
    } else if resume_task == 1 && game.any_task_in_state(resume_expect) {
        trace!("event {event}: resuming, a task entered the resuming state");
        true
    } else if resume_task > 1
        && resume_expect == game.tasks[resume_task as usize - 2].done
    {
        trace!("event {event}: resuming, resume task entered its state");
        true
    } else {
        false
    };

    if resume {
        game.events[event].phase = EventPhase::Running;
    } else if game.events[event].time <= 0 {
        finish_event(game, filter, event);
    }
}

fn should_pause(game: &Gamestate, event: usize) -> bool {
    let pause_task = event_integer(game, event, "PauseTask");
    let expected = !event_boolean(game, event, "PauserCompleted");
    if pause_task == 1 {
        game.any_task_in_state(expected)
    } else if pause_task > 1 {
        expected == game.tasks[pause_task as usize - 2].done
    } else {
        false
    }
}

fn should_resume(game: &Gamestate, event: usize) -> bool {
    let resume_task = event_integer(game, event, "ResumeTask");
    let expected = !event_boolean(game, event, "ResumerCompleted");
    if resume_task == 1 {
        game.any_task_in_state(expected)
    } else if resume_task > 1 {
        expected == game.tasks[resume_task as usize - 2].done
    } else {
        false
    }
}

/// Waiting (or Awaiting) to Running: print the start text, roll the run
/// duration, and move the first event object.
fn start_event(game: &mut Gamestate, filter: &mut PrintFilter, event: usize) {
    info!("event {event}: starting");

    if game.can_see_event(event) {
        let text = event_string(game, event, "StartText");
        if !text.is_empty() {
            filter.push(&text);
            filter.push_char('\n');
        }
        resources::handle_resource(
            game,
            &["Events".into(), event.into(), "Res".into(), 0.into()],
        );
    }

    game.events[event].phase = EventPhase::Running;
    let time1 = event_integer(game, event, "Time1");
    let time2 = event_integer(game, event, "Time2");
    game.events[event].time = random_int(time1, time2);

    let obj1 = event_integer(game, event, "Obj1") - 1;
    let obj1dest = event_integer(game, event, "Obj1Dest") - 1;
    move_event_object(game, obj1, obj1dest);
}

/// Running to Finished (or a restart): print the finish text, move the
/// second and third event objects, run any affected task, then dispose of
/// the event per its restart type.
fn finish_event(game: &mut Gamestate, filter: &mut PrintFilter, event: usize) {
    info!("event {event}: finishing");

    if game.can_see_event(event) {
        let text = event_string(game, event, "FinishText");
        if !text.is_empty() {
            filter.push(&text);
            filter.push_char('\n');
        }
        resources::handle_resource(
            game,
            &["Events".into(), event.into(), "Res".into(), 4.into()],
        );
    }

    for (obj_prop, dest_prop) in [("Obj2", "Obj2Dest"), ("Obj3", "Obj3Dest")] {
        let object = event_integer(game, event, obj_prop) - 1;
        let dest = event_integer(game, event, dest_prop) - 1;
        move_event_object(game, object, dest);
    }

    let affected = event_integer(game, event, "TaskAffected") - 1;
    if affected >= 0 {
        let forwards = !event_boolean(game, event, "TaskFinished");
        if task::can_run_task(game, affected as usize) {
            info!(
                "event {event}: running task {affected} {}",
                if forwards { "forwards" } else { "in reverse" }
            );
            task::run_task(game, filter, affected as usize, forwards);
        }
    }

    let starter = event_integer(game, event, "StarterType");
    match event_integer(game, event, "RestartType") {
        0 => match starter {
            1..=3 => game.events[event].phase = EventPhase::Finished,
            other => panic!("event {event}: unknown starter type {other}"),
        },
        1 => {
            game.events[event].phase = EventPhase::Waiting;
            game.events[event].time = 0;
        }
        2 => match starter {
            1 => {
                game.events[event].phase = EventPhase::Waiting;
                game.events[event].time = 0;
            }
            2 => {
                let start = event_integer(game, event, "StartTime");
                let end = event_integer(game, event, "EndTime");
                game.events[event].phase = EventPhase::Waiting;
                game.events[event].time = random_int(start, end);
            }
            3 => {
                game.events[event].phase = EventPhase::Awaiting;
                game.events[event].time = 0;
            }
            other => panic!("event {event}: unknown starter type {other}"),
        },
        other => panic!("event {event}: unknown restart type {other}"),
    }
}

/// Move an object using the event destination encoding: -1 hidden,
/// 0 held by the player, 1 the player's room, then rooms and room groups.
/// Negative object values are "no object".
pub fn move_event_object(game: &mut Gamestate, object: i64, dest: i64) {
    use crate::state::ObjectPosition;
    if object < 0 {
        return;
    }
    trace!("event: moving object {object} to destination {dest}");
    let object = object as usize;
    let room_count = game.rooms.len() as i64;
    let position = match dest {
        -1 => ObjectPosition::Hidden,
        0 => ObjectPosition::HeldByPlayer,
        1 => ObjectPosition::InRoom(game.playerroom),
        room if room < room_count + 2 => ObjectPosition::InRoom(room as usize - 2),
        group => ObjectPosition::InRoom(
            game.random_roomgroup_member((group - room_count - 2) as usize),
        ),
    };
    game.objects[object].position = position;
}

fn event_integer(game: &Gamestate, event: usize, prop: &str) -> i64 {
    game.bundle
        .integer(&[Seg::Tag("Events"), event.into(), Seg::Tag(prop)])
}

fn event_boolean(game: &Gamestate, event: usize, prop: &str) -> bool {
    game.bundle
        .boolean(&[Seg::Tag("Events"), event.into(), Seg::Tag(prop)])
}

fn event_string(game: &Gamestate, event: usize, prop: &str) -> String {
    game.bundle
        .string(&[Seg::Tag("Events"), event.into(), Seg::Tag(prop)])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use std::rc::Rc;

    fn game_with(toml: &str) -> Gamestate {
        Gamestate::new(Rc::new(Bundle::from_toml_str(toml).unwrap()))
    }

    fn bell_game() -> Gamestate {
        game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Events]]
            StarterType = 2
            StartTime = 3
            EndTime = 3
            Time1 = 2
            Time2 = 2
            StartText = "A bell rings."
            FinishText = "The echo dies."
            RestartType = 0
            Obj1 = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 3
            "#,
        )
    }

    #[test]
    fn random_delay_start_fires_on_schedule() {
        let mut game = bell_game();
        let mut filter = PrintFilter::new();
        assert_eq!(game.events[0].phase, EventPhase::Waiting);
        assert_eq!(game.events[0].time, 3);

        tick_events(&mut game, &mut filter);
        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Waiting);

        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Running);
        assert_eq!(game.events[0].time, 2);
    }

    #[test]
    fn running_event_finishes_when_time_expires() {
        let mut game = bell_game();
        let mut filter = PrintFilter::new();
        game.events[0].phase = EventPhase::Running;
        game.events[0].time = 1;

        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Finished);
    }

    #[test]
    fn started_event_is_not_revisited_same_tick() {
        let mut game = bell_game();
        let mut filter = PrintFilter::new();
        game.events[0].time = 1;

        tick_events(&mut game, &mut filter);
        // Started this tick with time 2; a same-tick revisit in the
        // Running pass would already have decremented it.
        assert_eq!(game.events[0].phase, EventPhase::Running);
        assert_eq!(game.events[0].time, 2);
    }

    #[test]
    fn task_started_event_waits_for_its_task() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Tasks]]
            Command = ["pull rope"]
            [[Events]]
            StarterType = 3
            TaskNum = 1
            Time1 = 1
            Time2 = 1
            RestartType = 0
            Obj1 = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 0
            "#,
        );
        let mut filter = PrintFilter::new();
        assert_eq!(game.events[0].phase, EventPhase::Awaiting);

        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Awaiting);

        game.tasks[0].done = true;
        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Running);
    }

    #[test]
    fn pause_predicate_suspends_running_event() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Tasks]]
            Command = ["block"]
            [[Events]]
            StarterType = 1
            Time1 = 5
            Time2 = 5
            PauseTask = 2
            PauserCompleted = false
            ResumeTask = 0
            RestartType = 0
            Obj1 = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 0
            "#,
        );
        let mut filter = PrintFilter::new();
        game.events[0].phase = EventPhase::Running;
        game.events[0].time = 5;

        // PauserCompleted false means the pause fires while task 0 is done.
        game.tasks[0].done = true;
        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Paused);
        assert_eq!(game.events[0].time, 5, "paused events do not count down");

        game.tasks[0].done = false;
        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Running);
    }

    #[test]
    fn restart_type_immediate_rearms_event() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Events]]
            StarterType = 1
            Time1 = 1
            Time2 = 1
            RestartType = 1
            Obj1 = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 0
            "#,
        );
        let mut filter = PrintFilter::new();
        game.events[0].phase = EventPhase::Running;
        game.events[0].time = 1;

        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Waiting);
        assert_eq!(game.events[0].time, 0);
    }

    #[test]
    fn event_object_moves_on_start() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Objects]]
            Short = "bell"
            Static = false
            InitialPosition = 0
            Parent = 0
            [[Events]]
            StarterType = 1
            Time1 = 1
            Time2 = 1
            Obj1 = 1
            Obj1Dest = 2
            RestartType = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 0
            "#,
        );
        let mut filter = PrintFilter::new();
        use crate::state::ObjectPosition;
        assert_eq!(game.objects[0].position, ObjectPosition::Hidden);

        // Waiting with time 0 starts on the first tick; Obj1Dest 2 - 1 = 1
        // is "the player's room".
        tick_events(&mut game, &mut filter);
        assert_eq!(game.objects[0].position, ObjectPosition::InRoom(0));
    }

    #[test]
    fn pause_check_with_pauser_completed_true() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Tower"
            [[Tasks]]
            Command = ["a"]
            [[Events]]
            StarterType = 1
            Time1 = 5
            Time2 = 5
            PauseTask = 2
            PauserCompleted = true
            ResumeTask = 0
            RestartType = 0
            Obj1 = 0
            Obj2 = 0
            Obj3 = 0
            TaskAffected = 0
            [Events.Where]
            Type = 0
            "#,
        );
        let mut filter = PrintFilter::new();
        game.events[0].phase = EventPhase::Running;
        game.events[0].time = 5;

        // PauserCompleted true pauses while the task is NOT done.
        tick_events(&mut game, &mut filter);
        assert_eq!(game.events[0].phase, EventPhase::Paused);
    }
}
