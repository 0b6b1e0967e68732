//! Task restriction evaluation.
//!
//! A task's `RestrMask` combines its restriction list into a boolean
//! expression of `#` atoms joined by `A`/`O` with parentheses. The
//! evaluator parses the pattern by recursive descent, evaluating each `#`
//! against the next restriction in order, and remembers the first failing
//! atom so its `FailMessage` can be surfaced to the player. Atoms are
//! evaluated eagerly; there is no short-circuiting.

use log::{error, trace};

use crate::bundle::Seg;
use crate::state::{Gamestate, ObjectPosition};

/// Maximum `(`-nesting depth accepted in a restriction pattern.
const MAX_NESTING_DEPTH: usize = 32;

/// Result of a successful evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictionOutcome {
    pub pass: bool,
    /// FailMessage of the lowest-indexed failing restriction, if any.
    pub fail_message: Option<String>,
}

impl RestrictionOutcome {
    fn passed() -> RestrictionOutcome {
        RestrictionOutcome {
            pass: true,
            fail_message: None,
        }
    }
}

/// Evaluate a task's restrictions. Returns `None` when the combination
/// pattern is malformed; callers treat that as "restrictions fail" with
/// no message.
pub fn evaluate_task_restrictions(game: &mut Gamestate, task: usize) -> Option<RestrictionOutcome> {
    let bundle = game.bundle.clone();
    let restriction_count =
        bundle.count(&["Tasks".into(), task.into(), "Restrictions".into()]);
    if restriction_count == 0 {
        trace!("task {task}: no restrictions");
        return Some(RestrictionOutcome::passed());
    }

    let pattern = bundle.entity_string("Tasks", task, "RestrMask").to_string();
    trace!("task {task}: {restriction_count} restrictions, pattern {pattern:?}");

    let mut eval = Evaluator {
        game,
        task,
        tokens: pattern.chars().filter(|c| !c.is_whitespace()).collect(),
        position: 0,
        next_restriction: 0,
        stack: Vec::new(),
        lowest_fail: None,
    };

    match eval.run() {
        Ok(pass) => {
            let fail_message = if pass {
                None
            } else {
                eval.lowest_fail.and_then(|index| {
                    let message = bundle.string(&[
                        "Tasks".into(),
                        task.into(),
                        "Restrictions".into(),
                        index.into(),
                        "FailMessage".into(),
                    ]);
                    (!message.is_empty()).then(|| message.to_string())
                })
            };
            Some(RestrictionOutcome { pass, fail_message })
        }
        Err(()) => {
            error!("task {task}: malformed restriction pattern {pattern:?}");
            None
        }
    }
}

struct Evaluator<'a> {
    game: &'a mut Gamestate,
    task: usize,
    tokens: Vec<char>,
    position: usize,
    next_restriction: usize,
    stack: Vec<bool>,
    lowest_fail: Option<usize>,
}

impl Evaluator<'_> {
    fn run(&mut self) -> Result<bool, ()> {
        self.or_expr()?;
        if self.peek().is_some() {
            return Err(());
        }
        if self.stack.len() != 1 {
            return Err(());
        }
        Ok(self.stack[0])
    }

    fn peek(&self) -> Option<char> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn or_expr(&mut self) -> Result<(), ()> {
        self.and_expr()?;
        while self.peek() == Some('O') {
            self.advance();
            self.and_expr()?;
            self.combine(|a, b| a || b)?;
        }
        Ok(())
    }

    fn and_expr(&mut self) -> Result<(), ()> {
        self.unary()?;
        while self.peek() == Some('A') {
            self.advance();
            self.unary()?;
            self.combine(|a, b| a && b)?;
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), ()> {
        match self.peek() {
            Some('#') => {
                self.advance();
                let index = self.next_restriction;
                self.next_restriction += 1;
                let result = pass_restriction(self.game, self.task, index);
                if !result && self.lowest_fail.is_none() {
                    self.lowest_fail = Some(index);
                }
                if self.stack.len() >= MAX_NESTING_DEPTH {
                    return Err(());
                }
                self.stack.push(result);
                Ok(())
            }
            Some('(') => {
                self.advance();
                self.or_expr()?;
                if self.peek() != Some(')') {
                    return Err(());
                }
                self.advance();
                Ok(())
            }
            _ => Err(()),
        }
    }

    fn combine(&mut self, op: impl Fn(bool, bool) -> bool) -> Result<(), ()> {
        let right = self.stack.pop().ok_or(())?;
        let left = self.stack.pop().ok_or(())?;
        self.stack.push(op(left, right));
        Ok(())
    }
}

/// Evaluate one atomic restriction of a task.
fn pass_restriction(game: &mut Gamestate, task: usize, restriction: usize) -> bool {
    let bundle = game.bundle.clone();
    let base: [Seg; 4] = [
        "Tasks".into(),
        task.into(),
        "Restrictions".into(),
        restriction.into(),
    ];
    let prop = |name: &'static str| -> Vec<Seg<'static>> {
        let mut path = base.to_vec();
        path.push(name.into());
        path
    };

    let kind = bundle.integer(&prop("Type"));
    let var1 = bundle.integer(&prop("Var1"));
    let var2 = bundle.integer(&prop("Var2"));
    let var3 = bundle.integer(&prop("Var3"));

    let result = match kind {
        0 => pass_object_location(game, var1, var2, var3),
        1 => pass_object_state(game, var1, var2),
        2 => pass_task_state(game, var1, var2),
        3 => pass_character(game, var1, var2, var3),
        4 => {
            let var4 = bundle.string(&prop("Var4")).to_string();
            pass_variable(game, var1, var2, var3, &var4)
        }
        other => panic!("task {task}: unknown restriction type {other}"),
    };

    trace!(
        "task {task} restriction {restriction} is {}",
        if result { "PASS" } else { "FAIL" }
    );
    result
}

/// Type 0: where an object is, relative to rooms, holders, and parents.
fn pass_object_location(game: &mut Gamestate, var1: i64, var2: i64, var3: i64) -> bool {
    let mut should_be = match var2 {
        0..=5 => true,
        6..=11 => false,
        other => panic!("object location restriction: bad predicate {other}"),
    };

    let object: Option<usize> = match var1 {
        0 => {
            // "No object": flip the expected polarity, test all objects.
            should_be = !should_be;
            None
        }
        1 => None, // "Any dynamic object".
        2 => match game.vars.ref_object() {
            Some(object) => Some(object),
            None => {
                error!("object location restriction: no referenced object");
                return false;
            }
        },
        n => Some(game.nth_dynamic_object(n as usize - 3)),
    };

    // Static objects reached through the referenced object never pass.
    if var1 == 2
        && let Some(object) = object
        && game.object_is_static(object)
    {
        trace!("object location restriction: referenced object {object} is static");
        return false;
    }

    match object {
        Some(object) => should_be == object_in_place(game, object, var2, var3),
        None => {
            for target in 0..game.objects.len() {
                if object_in_place(game, target, var2, var3) {
                    return should_be;
                }
            }
            !should_be
        }
    }
}

/// Is the object in the place var2/var3 describe? Predicates 6..=11 share
/// the tests of 0..=5; polarity is handled by the caller.
fn object_in_place(game: &mut Gamestate, object: usize, var2: i64, var3: i64) -> bool {
    let position = game.objects[object].position;
    match var2 % 6 {
        // In room.
        0 => {
            if var3 == 0 {
                position == ObjectPosition::Hidden
            } else {
                position.to_wire().0 == var3
            }
        }
        // Held by.
        1 => match var3 {
            0 => position == ObjectPosition::HeldByPlayer,
            _ => match holder_npc(game, var3) {
                Some(npc) => position == ObjectPosition::HeldByNpc(npc),
                None => false,
            },
        },
        // Worn by.
        2 => match var3 {
            0 => position == ObjectPosition::WornByPlayer,
            _ => match holder_npc(game, var3) {
                Some(npc) => position == ObjectPosition::WornByNpc(npc),
                None => false,
            },
        },
        // Visible to.
        3 => {
            if var3 == 0 {
                game.object_indirectly_in_room(object, game.playerroom)
            } else {
                match holder_npc(game, var3) {
                    Some(npc) if game.npcs[npc].location > 0 => {
                        let room = game.npcs[npc].location as usize - 1;
                        game.object_indirectly_in_room(object, room)
                    }
                    _ => false,
                }
            }
        }
        // Inside.
        4 => {
            if var3 == 0 {
                !position.is_in_object()
            } else {
                position == ObjectPosition::InObject(game.nth_container_object(var3 as usize - 1))
            }
        }
        // On top of.
        5 => {
            if var3 == 0 {
                !position.is_on_object()
            } else {
                position == ObjectPosition::OnObject(game.nth_surface_object(var3 as usize - 1))
            }
        }
        _ => unreachable!(),
    }
}

/// Decode a var3 holder: 1 is the referenced character, above that a
/// specific NPC index.
fn holder_npc(game: &Gamestate, var3: i64) -> Option<usize> {
    if var3 == 1 {
        let npc = game.vars.ref_character();
        if npc.is_none() {
            error!("restriction: no referenced character");
        }
        npc
    } else {
        Some(var3 as usize - 2)
    }
}

/// Type 1: the state or openness of a stateful object. Also consulted by
/// the room-alternate logic in the command library.
pub(crate) fn pass_object_state(game: &Gamestate, var1: i64, var2: i64) -> bool {
    let object = if var1 == 0 {
        match game.vars.ref_object() {
            Some(object) => object,
            None => {
                error!("object state restriction: no referenced object");
                return false;
            }
        }
    } else {
        game.nth_stateful_object(var1 as usize - 1)
    };

    if game.object_is_openable(object) {
        // Lockable objects reserve three openness values, plain openable
        // objects two; state values follow after.
        if game.object_key(object).is_some() {
            if var2 <= 2 {
                game.objects[object].openness.to_wire() == var2 + 5
            } else {
                game.objects[object].state == var2 - 2
            }
        } else if var2 <= 1 {
            game.objects[object].openness.to_wire() == var2 + 5
        } else {
            game.objects[object].state == var2 - 1
        }
    } else {
        game.objects[object].state == var2 + 1
    }
}

/// Type 2: a task (or every task) is done or not done.
fn pass_task_state(game: &Gamestate, var1: i64, var2: i64) -> bool {
    let should_be = match var2 {
        0 => true,
        1 => false,
        other => panic!("task state restriction: bad polarity {other}"),
    };

    if var1 == 0 {
        // Passes only when no task at all is in the named state.
        !game.tasks.iter().any(|task| task.done == should_be)
    } else {
        game.tasks[var1 as usize - 1].done == should_be
    }
}

/// Type 3: player and NPC location, company, posture, and gender tests.
fn pass_character(game: &mut Gamestate, var1: i64, var2: i64, var3: i64) -> bool {
    // Types 1 and 2 are negations of types 0 and 3.
    if var2 == 1 {
        return !pass_character(game, var1, 0, var3);
    }
    if var2 == 2 {
        return !pass_character(game, var1, 3, var3);
    }

    let npc1: Option<usize> = if var1 == 1 {
        match game.vars.ref_character() {
            Some(npc) => Some(npc),
            None => {
                error!("character restriction: no referenced character");
                return false;
            }
        }
    } else if var1 > 1 {
        Some(var1 as usize - 2)
    } else {
        None
    };

    if var1 == 0 {
        // The player.
        match var2 {
            0 => match var3 {
                0 => true,
                _ => match holder_npc(game, var3) {
                    Some(npc2) => game.npcs[npc2].in_room(game.playerroom),
                    None => false,
                },
            },
            3 => game.npc_count_in_room(game.playerroom) > 1,
            4 => {
                game.playerposition == 0
                    && game.playerparent == game.nth_standable_object(var3 as usize - 1) as i64
            }
            5 => {
                game.playerposition == 1
                    && game.playerparent == game.nth_standable_object(var3 as usize - 1) as i64
            }
            6 => {
                game.playerposition == 2
                    && game.playerparent == game.nth_lieable_object(var3 as usize - 1) as i64
            }
            7 => game.bundle.global_integer("PlayerGender") == var3,
            other => panic!("character restriction: bad test {other}"),
        }
    } else {
        let npc1 = npc1.expect("character restriction: NPC index resolved above");
        match var2 {
            0 => {
                if var3 == 0 {
                    return game.npcs[npc1].in_room(game.playerroom);
                }
                match holder_npc(game, var3) {
                    Some(npc2) if game.npcs[npc2].location > 0 => {
                        let room = game.npcs[npc2].location as usize - 1;
                        game.npcs[npc1].in_room(room)
                    }
                    _ => false,
                }
            }
            3 => {
                game.npcs[npc1].location > 0
                    && game.npc_count_in_room(game.npcs[npc1].location as usize - 1) > 1
            }
            4 => {
                game.npcs[npc1].position == 0
                    && game.npcs[npc1].parent == game.nth_standable_object(var3 as usize - 1) as i64
            }
            5 => {
                game.npcs[npc1].position == 1
                    && game.npcs[npc1].parent == game.nth_standable_object(var3 as usize - 1) as i64
            }
            6 => {
                game.npcs[npc1].position == 2
                    && game.npcs[npc1].parent == game.nth_lieable_object(var3 as usize - 1) as i64
            }
            7 => game.bundle.entity_integer("NPCs", npc1, "Gender") == var3,
            other => panic!("character restriction: bad test {other}"),
        }
    }
}

/// Type 4: variable comparisons.
fn pass_variable(game: &mut Gamestate, var1: i64, var2: i64, var3: i64, var4: &str) -> bool {
    // var1 0 compares the referenced number, 1 the referenced text.
    if var1 == 0 {
        let value = game.vars.ref_number();
        return pass_integer_variable(game, var2, var3, var4, value);
    }
    if var1 == 1 {
        let value = game.vars.ref_text().unwrap_or("").to_string();
        return pass_string_variable(var2, var3, var4, &value);
    }

    let index = var1 as usize - 2;
    let name = game
        .bundle
        .entity_string("Variables", index, "Name")
        .to_string();
    match game.bundle.entity_integer("Variables", index, "Type") {
        0 => {
            let value = game.integer_variable(&name);
            pass_integer_variable(game, var2, var3, var4, value)
        }
        1 => {
            let value = game.string_variable(&name);
            pass_string_variable(var2, var3, var4, &value)
        }
        other => panic!("variable restriction: invalid variable type {other}"),
    }
}

fn pass_integer_variable(game: &mut Gamestate, var2: i64, var3: i64, var4: &str, value: i64) -> bool {
    assert!(
        var4.is_empty(),
        "variable restriction: non-empty var4 for integer comparison"
    );

    match var2 {
        0 => value < var3,
        1 => value <= var3,
        2 => value == var3,
        3 => value >= var3,
        4 => value > var3,
        5 => value != var3,
        10..=15 => {
            // Compare against the referenced number, or the var3-1'th
            // integer variable.
            let value2 = if var3 == 0 {
                game.vars.ref_number()
            } else {
                let index = nth_integer_variable(game, var3 as usize - 1);
                let name = game
                    .bundle
                    .entity_string("Variables", index, "Name")
                    .to_string();
                assert!(
                    game.bundle.entity_integer("Variables", index, "Type") == 0,
                    "variable restriction: non-integer {name} in comparison"
                );
                game.integer_variable(&name)
            };
            match var2 {
                10 => value < value2,
                11 => value <= value2,
                12 => value == value2,
                13 => value >= value2,
                14 => value > value2,
                15 => value != value2,
                _ => unreachable!(),
            }
        }
        other => panic!("variable restriction: unknown integer comparison {other}"),
    }
}

fn pass_string_variable(var2: i64, var3: i64, var4: &str, value: &str) -> bool {
    assert!(
        var3 == 0,
        "variable restriction: non-zero var3 for string comparison"
    );
    match var2 {
        0 => value == var4,
        1 => value != var4,
        other => panic!("variable restriction: unknown string comparison {other}"),
    }
}

/// Index of the n'th integer-typed variable in the `Variables` group.
fn nth_integer_variable(game: &Gamestate, n: usize) -> usize {
    let mut remaining = n as i64;
    for index in 0..game.bundle.entity_count("Variables") {
        if game.bundle.entity_integer("Variables", index, "Type") == 0 {
            remaining -= 1;
            if remaining < 0 {
                return index;
            }
        }
    }
    panic!("variable restriction: integer variable {n} out of range");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use crate::state::Openness;
    use std::rc::Rc;

    fn game_with(toml: &str) -> Gamestate {
        Gamestate::new(Rc::new(Bundle::from_toml_str(toml).unwrap()))
    }

    #[test]
    fn no_restrictions_pass() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Tasks]]
            Command = ["sing"]
            "#,
        );
        let outcome = evaluate_task_restrictions(&mut game, 0).unwrap();
        assert!(outcome.pass);
        assert!(outcome.fail_message.is_none());
    }

    fn openness_game() -> Gamestate {
        game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Objects]]
            Short = "box"
            Static = false
            Openable = 6
            InitialPosition = 4
            Parent = 0
            [[Tasks]]
            Command = ["open box"]
            RestrMask = "#"
            [[Tasks.Restrictions]]
            Type = 1
            Var1 = 1
            Var2 = 1
            FailMessage = "It's not closed."
            "##,
        )
    }

    #[test]
    fn object_state_restriction_checks_openness() {
        let mut game = openness_game();
        // Var2 1 on a non-lockable openable object means openness 6, closed.
        let outcome = evaluate_task_restrictions(&mut game, 0).unwrap();
        assert!(outcome.pass);

        game.objects[0].openness = Openness::Open;
        let outcome = evaluate_task_restrictions(&mut game, 0).unwrap();
        assert!(!outcome.pass);
        assert_eq!(outcome.fail_message.as_deref(), Some("It's not closed."));
    }

    #[test]
    fn malformed_pattern_reports_none() {
        let mut game = game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Tasks]]
            Command = ["sing"]
            RestrMask = "#A("
            [[Tasks.Restrictions]]
            Type = 2
            Var1 = 0
            Var2 = 1
            "##,
        );
        assert!(evaluate_task_restrictions(&mut game, 0).is_none());
    }

    fn combo_game(mask: &str) -> Gamestate {
        game_with(&format!(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Tasks]]
            Command = ["one"]
            [[Tasks]]
            Command = ["two"]
            [[Tasks]]
            Command = ["combo"]
            RestrMask = "{mask}"
            [[Tasks.Restrictions]]
            Type = 2
            Var1 = 1
            Var2 = 0
            FailMessage = "First not done."
            [[Tasks.Restrictions]]
            Type = 2
            Var1 = 2
            Var2 = 0
            FailMessage = "Second not done."
            "##
        ))
    }

    #[test]
    fn and_combination() {
        let mut game = combo_game("#A#");
        assert!(!evaluate_task_restrictions(&mut game, 2).unwrap().pass);
        game.tasks[0].done = true;
        game.tasks[1].done = true;
        assert!(evaluate_task_restrictions(&mut game, 2).unwrap().pass);
    }

    #[test]
    fn or_combination_and_parens() {
        let mut game = combo_game("(#O#)");
        game.tasks[1].done = true;
        assert!(evaluate_task_restrictions(&mut game, 2).unwrap().pass);
    }

    #[test]
    fn lowest_failing_restriction_supplies_message() {
        let mut game = combo_game("#A#");
        game.tasks[0].done = true;
        let outcome = evaluate_task_restrictions(&mut game, 2).unwrap();
        assert!(!outcome.pass);
        assert_eq!(outcome.fail_message.as_deref(), Some("Second not done."));

        game.tasks[0].done = false;
        let outcome = evaluate_task_restrictions(&mut game, 2).unwrap();
        assert_eq!(outcome.fail_message.as_deref(), Some("First not done."));
    }

    #[test]
    fn task_state_any_task_semantics() {
        let mut game = combo_game("#");
        // Var1 0, Var2 1: passes while no task is "not done", i.e. fails
        // here because both tasks are still undone.
        let game2 = &mut game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Tasks]]
            Command = ["a"]
            [[Tasks]]
            Command = ["guarded"]
            RestrMask = "#"
            [[Tasks.Restrictions]]
            Type = 2
            Var1 = 0
            Var2 = 1
            "##,
        );
        assert!(!evaluate_task_restrictions(game2, 1).unwrap().pass);
        game2.tasks[0].done = true;
        game2.tasks[1].done = true;
        assert!(evaluate_task_restrictions(game2, 1).unwrap().pass);

        // Keep the other fixture exercised for the plain-atom case.
        assert!(!evaluate_task_restrictions(&mut game, 2).unwrap().pass);
    }

    #[test]
    fn variable_comparisons() {
        let mut game = game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Variables]]
            Name = "depth"
            Type = 0
            Value = "10"
            [[Tasks]]
            Command = ["dig"]
            RestrMask = "#"
            [[Tasks.Restrictions]]
            Type = 4
            Var1 = 2
            Var2 = 3
            Var3 = 5
            Var4 = ""
            "##,
        );
        // depth >= 5 passes.
        assert!(evaluate_task_restrictions(&mut game, 0).unwrap().pass);
        game.vars.put_integer("depth", 2);
        assert!(!evaluate_task_restrictions(&mut game, 0).unwrap().pass);
    }

    #[test]
    fn character_same_room_restriction() {
        let mut game = game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Rooms]]
            Short = "Hall"
            [[NPCs]]
            Name = "Edna"
            StartRoom = 1
            [[Tasks]]
            Command = ["talk"]
            RestrMask = "#"
            [[Tasks.Restrictions]]
            Type = 3
            Var1 = 2
            Var2 = 0
            Var3 = 0
            "##,
        );
        // NPC 0 in the player's room.
        assert!(evaluate_task_restrictions(&mut game, 0).unwrap().pass);
        game.npcs[0].location = 2;
        assert!(!evaluate_task_restrictions(&mut game, 0).unwrap().pass);
    }

    #[test]
    fn object_location_held_by_player() {
        let mut game = game_with(
            r##"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Objects]]
            Short = "rope"
            Static = false
            InitialPosition = 4
            Parent = 0
            [[Tasks]]
            Command = ["climb"]
            RestrMask = "#"
            [[Tasks.Restrictions]]
            Type = 0
            Var1 = 3
            Var2 = 1
            Var3 = 0
            "##,
        );
        assert!(!evaluate_task_restrictions(&mut game, 0).unwrap().pass);
        game.objects[0].position = ObjectPosition::HeldByPlayer;
        assert!(evaluate_task_restrictions(&mut game, 0).unwrap().pass);
    }
}
