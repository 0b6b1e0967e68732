//! The interpreter session: turn loop, undo, restart, and quit.
//!
//! A [`Session`] owns the primary gamestate and its two snapshot
//! companions. The temporary snapshot is written before every command;
//! when a non-administrative command succeeds it is promoted into the
//! undo slot. Restart and restore are requested by flags that unwind the
//! turn loop, so no handler ever observes a half-mutated gamestate.

use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Result, bail};
use log::info;

use crate::bundle::Bundle;
use crate::command;
use crate::debug::Debugger;
use crate::event;
use crate::filter::{self, PrintFilter};
use crate::host::{Host, Tag};
use crate::npc;
use crate::resources;
use crate::state::Gamestate;

/// Buffered input fragments and the "again" memory, reset on restart.
#[derive(Debug, Default)]
pub(crate) struct InputSession {
    pending: VecDeque<String>,
    prior: Option<String>,
}

impl InputSession {
    fn reset(&mut self) {
        self.pending.clear();
        self.prior = None;
    }
}

/// One running game: gamestate, snapshots, filter, input, and host.
pub struct Session<H: Host> {
    pub(crate) game: Gamestate,
    pub(crate) temporary: Box<Gamestate>,
    pub(crate) undo: Box<Gamestate>,
    pub(crate) undo_available: bool,
    pub(crate) filter: PrintFilter,
    pub(crate) host: H,
    pub(crate) input: InputSession,
    pub(crate) debugger: Debugger,
    bundle: Rc<Bundle>,
}

impl<H: Host> Session<H> {
    /// Build a session over a property bundle: the primary gamestate plus
    /// its temporary and undo snapshot companions.
    pub fn new(bundle: Bundle, host: H) -> Session<H> {
        let bundle = Rc::new(bundle);
        let game = Gamestate::new(bundle.clone());
        let temporary = Box::new(Gamestate::new(bundle.clone()));
        let undo = Box::new(Gamestate::new(bundle.clone()));
        info!(
            "session created: {} rooms, {} objects, {} tasks, {} events, {} NPCs",
            game.rooms.len(),
            game.objects.len(),
            game.tasks.len(),
            game.events.len(),
            game.npcs.len()
        );
        Session {
            game,
            temporary,
            undo,
            undo_available: false,
            filter: PrintFilter::new(),
            host,
            input: InputSession::default(),
            debugger: Debugger::new(),
            bundle,
        }
    }

    pub fn game(&self) -> &Gamestate {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Gamestate {
        &mut self.game
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Consume the session, handing back the host (useful for hosts that
    /// collected output).
    pub fn into_host(self) -> H {
        self.host
    }

    pub fn is_undo_available(&self) -> bool {
        self.undo_available
    }

    pub fn set_debugger_enabled(&mut self, enabled: bool) {
        self.debugger.set_enabled(enabled);
    }

    /// Interpret the game until the player quits or the game completes.
    pub fn run(&mut self) -> Result<()> {
        if self.game.is_running {
            bail!("game is already running");
        }
        if self.game.has_completed {
            bail!("game has already completed");
        }
        if self.game.rooms.is_empty() {
            bail!("game contains no rooms");
        }

        self.game.is_running = true;
        loop {
            self.main_loop()?;

            if self.game.do_restart {
                self.game.do_restart = false;
                self.restart();
                self.game.is_running = true;
                continue;
            }
            if self.game.do_restore {
                // The restore already replaced the gamestate; invalidate
                // undo and stop any sound left over from before.
                self.undo_available = false;
                self.game.do_restore = false;
                self.game.is_running = true;
                self.game.resources.stop_sound = true;
                continue;
            }
            break;
        }

        self.shutdown();
        Ok(())
    }

    fn main_loop(&mut self) -> Result<()> {
        if self.game.turns == 0 {
            self.startup();
        }

        while self.game.is_running {
            // Media first, so sounds and graphics appear before any wait
            // or waitkey delays triggered by the flush.
            resources::sync_resources(&mut self.game, &mut self.host);
            self.filter.flush(&mut self.game, &mut self.host);
            self.game.is_admin = false;

            let status = if self.game.waitturns == 0 {
                command::update_status(&mut self.game);
                let status = self.player_input_turn()?;
                // A fresh wait counts this turn as one of its turns.
                if self.game.waitturns > 0 {
                    self.game.waitturns -= 1;
                }
                status
            } else {
                self.game.waitturns -= 1;
                true
            };

            if self.game.is_running && status && !self.game.is_admin {
                self.game.turns += 1;

                event::tick_events(&mut self.game, &mut self.filter);
                npc::tick_npcs(&mut self.game, &mut self.filter);

                self.game.npc_turn_update();
                self.game.object_turn_update();
                self.game.rooms[self.game.playerroom].visited = true;

                self.notify_score_change();

                for report in self.debugger.turn_update(&mut self.game) {
                    self.host.print(&report);
                    self.host.print("\n");
                }
            }
        }

        // Final status refresh for games that vary it on completion.
        command::update_status(&mut self.game);
        self.filter.flush(&mut self.game, &mut self.host);
        Ok(())
    }

    /// First-turn output: banner, startup text, initial room, and the
    /// initial event/NPC nudges.
    fn startup(&mut self) {
        let bundle = self.bundle.clone();

        self.filter.push_tag(Tag::Cls);

        if bundle.global_boolean("BattleSystem") && !self.debugger.is_enabled() {
            self.filter.push(
                "This game uses a battle system which this interpreter only partly\n\
                 supports. Combat may not behave as the author intended.\n",
            );
            self.filter.push_tag(Tag::Cls);
        }

        let gamename = bundle.global_string("GameName");
        if !gamename.is_empty() {
            self.filter.push(gamename);
            self.filter.push_char('\n');
        }

        let startup_text = bundle.string(&["Header".into(), "StartupText".into()]);
        if !startup_text.is_empty() {
            self.filter.push(startup_text);
            self.filter.push_char('\n');
        }

        if bundle.global_boolean("DispFirstRoom") {
            command::describe_player_room(&mut self.game, &mut self.filter, true);
        }

        resources::handle_resource(&mut self.game, &["Globals".into(), "IntroRes".into()]);

        // A freshly restored or restarted gamestate skips the initial
        // nudges; a room already marked visited is the telltale.
        if !self.game.rooms[self.game.playerroom].visited {
            self.game.npc_setup_initial();
            self.game.object_setup_initial();

            event::tick_events(&mut self.game, &mut self.filter);
            npc::tick_npcs(&mut self.game, &mut self.filter);

            self.game.rooms[self.game.playerroom].visited = true;
        }
    }

    /// Read, match, and run one input fragment. Returns true when some
    /// command consumed the fragment.
    fn player_input_turn(&mut self) -> Result<bool> {
        let (fragment, rerunning) = if self.game.do_again {
            self.game.do_again = false;
            match self.input.prior.clone() {
                Some(prior) => (prior, true),
                None => {
                    self.filter.push("You can hardly repeat that.\n");
                    return Ok(false);
                }
            }
        } else {
            if self.input.pending.is_empty() {
                let line = match self.host.read_line("> ") {
                    Ok(line) => line,
                    Err(err) => {
                        // Closed input ends the session cleanly.
                        info!("input stream closed: {err:#}");
                        self.game.is_running = false;
                        return Ok(false);
                    }
                };
                for piece in line.split(',') {
                    self.input.pending.push_back(piece.trim().to_string());
                }
                if self.input.pending.is_empty() {
                    self.input.pending.push_back(String::new());
                }
            }
            (self.input.pending.pop_front().unwrap_or_default(), false)
        };

        // Snapshot for undo promotion on success.
        self.temporary.copy_dynamic_from(&self.game);

        let filtered = filter::filter_input(&self.bundle, &fragment);
        let normalized = fragment.split_whitespace().collect::<Vec<_>>().join(" ");
        if !filtered.eq_ignore_ascii_case(&normalized) && !filtered.is_empty() {
            self.host.print_tag(Tag::Italics, "");
            self.host.print(&format!("[{filtered}]"));
            self.host.print_tag(Tag::EndItalics, "");
            self.host.print("\n");
        }

        let status = self.dispatch_fragment(&filtered);
        if status {
            if !self.game.is_admin {
                self.undo.copy_dynamic_from(&self.temporary);
                self.undo_available = true;
            }
        } else if !filtered.is_empty() {
            self.game.vars.set_ref_text(&fragment);
            let message = self.bundle.global_string("DontUnderstand");
            if message.is_empty() {
                self.filter
                    .push("I don't understand what you want me to do with that.");
            } else {
                let message = message.to_string();
                self.filter.push(&message);
            }
            self.filter.push_char('\n');
            // Throw away any queued fragments after a misunderstanding.
            self.input.pending.clear();
        }

        // Restart and restore flush the rest of the input line too.
        if self.game.do_restart || self.game.do_restore {
            self.input.pending.clear();
        }

        if !rerunning && !self.game.do_again && !fragment.trim().is_empty() {
            self.input.prior = Some(fragment);
        }

        Ok(status)
    }

    /// Report a score change against the undo snapshot, when enabled.
    fn notify_score_change(&mut self) {
        if !self.undo_available || !self.game.notify_score_change {
            return;
        }
        let delta = self.game.score - self.undo.score;
        if delta > 0 {
            self.filter
                .push(&format!("\n(Your score has increased by {delta})\n"));
        } else if delta < 0 {
            self.filter
                .push(&format!("\n(Your score has decreased by {})\n", -delta));
        }
    }

    /// Restore the undo snapshot, leaving displayed media to resync.
    pub fn undo_turn(&mut self) -> bool {
        if !self.undo_available {
            return false;
        }
        let was_running = self.game.is_running;
        self.game.copy_dynamic_from(&self.undo);
        self.game.is_running = was_running;
        self.undo_available = false;

        command::update_status(&mut self.game);
        resources::sync_resources(&mut self.game, &mut self.host);
        true
    }

    /// Rebuild the gamestate from the bundle, preserving the filter and
    /// snapshot slots, and reset the input session.
    fn restart(&mut self) {
        info!("restarting game");
        let fresh = Gamestate::new(self.bundle.clone());
        self.game.copy_dynamic_from(&fresh);
        self.game.current_room_name = None;
        self.game.status_line = None;
        self.undo_available = false;
        self.input.reset();
        resources::cancel_resources(&mut self.game, &mut self.host);
    }

    /// Final shutdown after the loop exits.
    fn shutdown(&mut self) {
        self.filter.flush(&mut self.game, &mut self.host);
        resources::cancel_resources(&mut self.game, &mut self.host);
        self.input.reset();
    }

    /// Interactive debugger prompt, entered through the `debug` command.
    pub(crate) fn run_debugger_session(&mut self) {
        self.filter.flush(&mut self.game, &mut self.host);
        loop {
            let Ok(line) = self.host.read_line("debug> ") else {
                return;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed == "continue" || trimmed == "quit" {
                return;
            }
            let output = self.debugger.execute(&mut self.game, trimmed);
            self.host.print(&output);
            self.host.print("\n");
            self.host.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ConfirmKind;
    use std::cell::RefCell;

    /// Scripted host: feeds canned lines, collects all output.
    #[derive(Default)]
    pub struct ScriptHost {
        pub lines: RefCell<VecDeque<String>>,
        pub output: String,
        pub saved: Option<Vec<u8>>,
    }

    impl ScriptHost {
        pub fn with_lines(lines: &[&str]) -> ScriptHost {
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
            match self.lines.borrow_mut().pop_front() {
                Some(line) => Ok(line),
                None => Ok("quit".to_string()),
            }
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

    fn session_with(toml: &str, lines: &[&str]) -> Session<ScriptHost> {
        let bundle = Bundle::from_toml_str(toml).unwrap();
        Session::new(bundle, ScriptHost::with_lines(lines))
    }

    const TWO_ROOMS: &str = r#"
        [Header]
        StartRoom = 0
        [Globals]
        GameName = "Loop Test"
        [[Rooms]]
        Short = "Cell"
        Long = "A dank stone cell."
        [[Rooms.Exits]]
        Dest = 2
        [[Rooms]]
        Short = "Corridor"
        Long = "A narrow corridor."
    "#;

    #[test]
    fn movement_advances_turn_and_visits_room() {
        let mut session = session_with(TWO_ROOMS, &["east"]);
        // East is exit index 1; this bundle only links north. Use north.
        session.host.lines.borrow_mut().clear();
        session
            .host
            .lines
            .borrow_mut()
            .push_back("north".to_string());
        session.run().unwrap();

        assert_eq!(session.game.playerroom, 1);
        assert!(session.game.rooms[1].visited);
        // One accepted turn for the move; quit is administrative.
        assert_eq!(session.game.turns, 1);
        assert!(session.host.output.contains("Corridor"));
    }

    #[test]
    fn unknown_input_does_not_consume_a_turn() {
        let mut session = session_with(TWO_ROOMS, &["gibberish frotz"]);
        session.run().unwrap();
        assert_eq!(session.game.turns, 0);
        assert!(session.host.output.contains("I don't understand"));
    }

    #[test]
    fn comma_fragments_run_in_sequence() {
        let mut session = session_with(TWO_ROOMS, &["look, north"]);
        session.run().unwrap();
        assert_eq!(session.game.playerroom, 1);
        assert_eq!(session.game.turns, 2);
    }

    #[test]
    fn again_replays_previous_fragment() {
        const THREE_ROOMS: &str = r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "One"
            [[Rooms.Exits]]
            Dest = 2
            [[Rooms]]
            Short = "Two"
            [[Rooms.Exits]]
            Dest = 3
            [[Rooms]]
            Short = "Three"
        "#;
        let mut session = session_with(THREE_ROOMS, &["north", "again"]);
        session.run().unwrap();
        assert_eq!(session.game.playerroom, 2);
        assert_eq!(session.game.turns, 2);
    }

    #[test]
    fn undo_restores_prior_state() {
        let mut session = session_with(TWO_ROOMS, &["north", "undo"]);
        session.run().unwrap();
        assert_eq!(session.game.playerroom, 0);
        assert_eq!(session.game.turns, 0);
        assert!(!session.is_undo_available());
    }

    #[test]
    fn restart_returns_to_initial_state() {
        let mut session = session_with(TWO_ROOMS, &["north", "restart", "quit"]);
        session.run().unwrap();
        assert_eq!(session.game.playerroom, 0);
        assert_eq!(session.game.turns, 0);
    }

    #[test]
    fn save_and_restore_round_trip() {
        let mut session = session_with(TWO_ROOMS, &["north", "save", "undo", "restore"]);
        session.run().unwrap();
        // The restore re-enters the loop; the implicit quit ends it. The
        // restored state has the player back in the corridor.
        assert_eq!(session.game.playerroom, 1);
        assert_eq!(session.game.turns, 1);
    }

    #[test]
    fn score_change_is_notified() {
        const SCORING: &str = r#"
            [Header]
            StartRoom = 0
            [Globals]
            MaxScore = 10
            [[Rooms]]
            Short = "Cell"
            [[Tasks]]
            Command = ["jump"]
            CompletionText = "You jump high."
            [[Tasks.Actions]]
            Type = 4
            Var1 = 5
        "#;
        let mut session = session_with(SCORING, &["jump"]);
        session.run().unwrap();
        assert_eq!(session.game.score, 5);
        assert!(session.host.output.contains("score has increased by 5"));
    }
}
