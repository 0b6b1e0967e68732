//! End-to-end scenarios driven through the full session loop with a
//! scripted host.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::Result;
use driftwood_engine::state::{EventPhase, ObjectPosition};
use driftwood_engine::{Bundle, ConfirmKind, Host, Session, Tag};

/// Feeds canned input lines and collects everything printed.
#[derive(Default)]
struct ScriptHost {
    lines: RefCell<VecDeque<String>>,
    output: String,
    saved: Option<Vec<u8>>,
}

impl ScriptHost {
    fn with_lines(lines: &[&str]) -> ScriptHost {
        ScriptHost {
            lines: RefCell::new(lines.iter().map(|line| (*line).to_string()).collect()),
            ..ScriptHost::default()
        }
    }
}

impl Host for ScriptHost {
    fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
    fn print_tag(&mut self, _tag: Tag, _argument: &str) {}
    fn flush(&mut self) {}
    fn read_line(&mut self, _prompt: &str) -> Result<String> {
        Ok(self
            .lines
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| "quit".to_string()))
    }
    fn confirm(&mut self, _kind: ConfirmKind) -> bool {
        true
    }
    fn write_save(&mut self, payload: &[u8]) -> Result<()> {
        self.saved = Some(payload.to_vec());
        Ok(())
    }
    fn read_save(&mut self) -> Result<Vec<u8>> {
        self.saved
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no save in slot"))
    }
}

fn run_session(toml: &str, lines: &[&str]) -> Session<ScriptHost> {
    let bundle = Bundle::from_toml_str(toml).expect("bundle should parse");
    let mut session = Session::new(bundle, ScriptHost::with_lines(lines));
    session.run().expect("session should run to completion");
    session
}

#[test]
fn trivial_movement() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Guardroom"
        [[Rooms.Exits]]
        [[Rooms.Exits]]
        Dest = 2
        [[Rooms]]
        Short = "Armoury"
        "#,
        &["east"],
    );

    let game = session.game();
    assert_eq!(game.playerroom, 1);
    assert!(game.rooms[1].visited);
    assert_eq!(game.turns, 1);
    assert_eq!(game.current_room_name.as_deref(), Some("Armoury"));
}

#[test]
fn simple_get_and_drop() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [Globals]
        MaxWt = 90
        MaxSize = 90
        [[Rooms]]
        Short = "Guardroom"
        [[Objects]]
        Short = "lantern"
        Prefix = "a dented"
        Static = false
        SizeWeight = 11
        InitialPosition = 4
        Parent = 0
        "#,
        &["get lantern", "i", "drop lantern", "i"],
    );

    let game = session.game();
    assert_eq!(game.objects[0].position, ObjectPosition::InRoom(0));
    assert!(!game.objects[0].unmoved);

    let output = &session.host().output;
    assert!(output.contains("You take the dented lantern."));
    assert!(output.contains("You are carrying a dented lantern."));
    assert!(output.contains("You drop the dented lantern."));
    assert!(output.contains("You are carrying nothing."));
}

#[test]
fn task_with_restriction() {
    let toml = r##"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Guardroom"
        [[Objects]]
        Short = "box"
        Prefix = "a wooden"
        Static = false
        Openable = 6
        InitialPosition = 4
        Parent = 0
        [[Tasks]]
        Command = ["open box"]
        CompletionText = "It creaks open."
        RestrMask = "#"
        [[Tasks.Restrictions]]
        Type = 1
        Var1 = 1
        Var2 = 1
        [[Tasks.Actions]]
        Type = 2
        Var1 = 1
        Var2 = 0
    "##;

    let session = run_session(toml, &["open box", "open box"]);
    let game = session.game();

    assert_eq!(
        game.objects[0].openness,
        driftwood_engine::Openness::Open,
        "task action should have opened the box"
    );
    let output = &session.host().output;
    assert!(output.contains("It creaks open."));
    assert!(
        output.contains("is already open!"),
        "second open should fall through to the library response"
    );
}

#[test]
fn event_with_random_delay() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Belfry"
        [[Events]]
        StarterType = 2
        StartTime = 3
        EndTime = 3
        Time1 = 5
        Time2 = 5
        StartText = "A bell rings."
        RestartType = 0
        Obj1 = 0
        Obj2 = 0
        Obj3 = 0
        TaskAffected = 0
        [Events.Where]
        Type = 3
        "#,
        &["wait", "wait", "wait", "wait"],
    );

    let game = session.game();
    assert!(session.host().output.contains("A bell rings."));
    assert!(matches!(
        game.events[0].phase,
        EventPhase::Running | EventPhase::Finished
    ));
}

#[test]
fn npc_walk_with_follow_player() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Courtyard"
        [[Rooms.Exits]]
        [[Rooms.Exits]]
        Dest = 2
        [[Rooms]]
        Short = "Stable"
        [[Rooms.Exits]]
        [[Rooms.Exits]]
        [[Rooms.Exits]]
        [[Rooms.Exits]]
        Dest = 1
        [[NPCs]]
        Name = "Edna"
        StartRoom = 1
        ShowEnterExit = true
        EnterText = "wanders in"
        ExitText = "wanders off"
        [[NPCs.Walks]]
        StartTask = 0
        Loop = true
        MoveTimes = [1]
        Rooms = [1]
        "#,
        &["east"],
    );

    let game = session.game();
    assert_eq!(game.npcs[0].location, 2, "Edna should have followed the player");
    assert!(
        session.host().output.contains("wanders in"),
        "enter text should have been announced"
    );
}

#[test]
fn undo_restores_score_and_turns() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [Globals]
        MaxScore = 5
        [[Rooms]]
        Short = "Gymnasium"
        [[Tasks]]
        Command = ["jump"]
        CompletionText = "You leap magnificently."
        [[Tasks.Actions]]
        Type = 4
        Var1 = 5
        "#,
        &["jump", "undo"],
    );

    let game = session.game();
    assert_eq!(game.score, 0);
    assert_eq!(game.turns, 0);
    assert!(!session.is_undo_available());
    assert!(session.host().output.contains("score has increased by 5"));
}

#[test]
fn restricted_task_surfaces_fail_message() {
    let session = run_session(
        r##"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Vault Door"
        [[Tasks]]
        Command = ["open vault"]
        CompletionText = "The vault swings open."
        RestrMask = "#"
        [[Tasks.Restrictions]]
        Type = 2
        Var1 = 2
        Var2 = 0
        FailMessage = "The wheel won't budge until the clamp is released."
        [[Tasks]]
        Command = ["release clamp"]
        CompletionText = "The clamp snaps back."
        "##,
        &["open vault", "release clamp", "open vault"],
    );

    let game = session.game();
    assert!(game.tasks[0].done);
    assert!(game.tasks[1].done);
    let output = &session.host().output;
    assert!(output.contains("The wheel won't budge"));
    assert!(output.contains("The vault swings open."));
}

#[test]
fn synonyms_rewrite_input() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [[Rooms]]
        Short = "Guardroom"
        [[Objects]]
        Short = "lantern"
        Static = false
        InitialPosition = 4
        Parent = 0
        [[Synonyms]]
        Original = "grab"
        Replacement = "get"
        "#,
        &["grab lantern"],
    );

    assert_eq!(
        session.game().objects[0].position,
        ObjectPosition::HeldByPlayer
    );
}

#[test]
fn dont_understand_reports_game_message() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [Globals]
        DontUnderstand = "That means nothing here."
        [[Rooms]]
        Short = "Guardroom"
        "#,
        &["frotz the wug"],
    );

    assert!(session.host().output.contains("That means nothing here."));
    assert_eq!(session.game().turns, 0);
}

#[test]
fn variable_interpolation_in_task_text() {
    let session = run_session(
        r#"
        [Header]
        StartRoom = 0
        [Globals]
        PlayerName = "Morgan"
        [[Rooms]]
        Short = "Guardroom"
        [[Variables]]
        Name = "charges"
        Type = 0
        Value = "2"
        [[Tasks]]
        Command = ["zap"]
        CompletionText = "%player% fires. %t_charges% charges remain."
        "#,
        &["zap"],
    );

    assert!(
        session.host().output.contains("Morgan fires. Two charges remain."),
        "output was: {}",
        session.host().output
    );
}
