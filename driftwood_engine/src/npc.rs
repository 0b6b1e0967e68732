//! NPC state and the walk engine.
//!
//! Each NPC carries an array of independent walks. A walk counts down one
//! step per turn; the counter's position against the walk's `MoveTimes`
//! boundaries selects the current destination. Higher-indexed walks take
//! priority for actual movement, and an NPC moves at most once per turn.

use log::{info, trace};

use crate::filter::PrintFilter;
use crate::resources;
use crate::state::{Gamestate, random_int};
use crate::task;

/// Exit direction names for the four point compass, in exit index order.
pub const DIRNAMES_4: [&str; 8] = [
    "the north", "the east", "the south", "the west", "above", "below", "inside", "outside",
];

/// Exit direction names for the eight point compass.
pub const DIRNAMES_8: [&str; 12] = [
    "the north", "the east", "the south", "the west", "above", "below", "inside", "outside",
    "the northeast", "the southeast", "the southwest", "the northwest",
];

/// Direction names appropriate to the game's compass setting.
pub fn direction_names(game: &Gamestate) -> &'static [&'static str] {
    if game.bundle.global_boolean("EightPointCompass") {
        &DIRNAMES_8
    } else {
        &DIRNAMES_4
    }
}

impl Gamestate {
    /// Count of characters in a room, the player included.
    pub fn npc_count_in_room(&self, room: usize) -> usize {
        let player = usize::from(self.playerroom == room);
        player + self.npcs.iter().filter(|npc| npc.in_room(room)).count()
    }

    /// Display name for an NPC.
    pub fn npc_name(&self, npc: usize) -> &str {
        self.bundle.entity_string("NPCs", npc, "Name")
    }

    /// Activate a walk: the counter starts at its first move time plus one.
    pub fn start_npc_walk(&mut self, npc: usize, walk: usize) {
        let movetime = self.bundle.integer(&[
            "NPCs".into(),
            npc.into(),
            "Walks".into(),
            walk.into(),
            "MoveTimes".into(),
            0.into(),
        ]);
        info!("npc {npc}: starting walk {walk} at {}", movetime + 1);
        self.npcs[npc].walksteps[walk] = movetime + 1;
    }

    /// Start every walk whose `StartTask` is zero, then mark initial
    /// visibility. Runs once at game start.
    pub fn npc_setup_initial(&mut self) {
        let bundle = self.bundle.clone();
        for npc in 0..self.npcs.len() {
            for walk in 0..self.npcs[npc].walksteps.len() {
                let start_task = bundle.integer(&[
                    "NPCs".into(),
                    npc.into(),
                    "Walks".into(),
                    walk.into(),
                    "StartTask".into(),
                ]);
                if start_task == 0 {
                    self.start_npc_walk(npc, walk);
                }
            }
        }
        self.npc_turn_update();
    }

    /// Mark NPCs sharing the player's room as seen.
    pub fn npc_turn_update(&mut self) {
        let playerroom = self.playerroom;
        for npc in &mut self.npcs {
            if npc.location - 1 == playerroom as i64 {
                npc.seen = true;
            }
        }
    }
}

/// Advance every NPC one step along its active walks.
pub fn tick_npcs(game: &mut Gamestate, filter: &mut PrintFilter) {
    for npc in 0..game.npcs.len() {
        tick_npc(game, filter, npc);
    }
}

fn tick_npc(game: &mut Gamestate, filter: &mut PrintFilter, npc: usize) {
    let bundle = game.bundle.clone();
    let walk_count = game.npcs[npc].walksteps.len();
    let mut has_moved = false;

    for walk in (0..walk_count).rev() {
        if game.npcs[npc].walksteps[walk] <= 0 {
            continue;
        }

        let walk_path = |prop: &'static str| -> Vec<crate::bundle::Seg<'static>> {
            vec![
                "NPCs".into(),
                npc.into(),
                "Walks".into(),
                walk.into(),
                prop.into(),
            ]
        };

        let start_task = bundle.integer(&walk_path("StartTask")) - 1;
        let stopping_task = bundle.integer(&walk_path("StoppingTask")) - 1;
        if (start_task >= 0 && !game.tasks[start_task as usize].done)
            || (stopping_task >= 0 && game.tasks[stopping_task as usize].done)
        {
            trace!("npc {npc}: walk {walk} stopped, gating tasks in wrong state");
            game.npcs[npc].walksteps[walk] = -1;
            continue;
        }

        game.npcs[npc].walksteps[walk] -= 1;

        if game.npcs[npc].walksteps[walk] == 0 {
            if bundle.boolean(&walk_path("Loop")) {
                let mut path = walk_path("MoveTimes");
                path.push(0.into());
                game.npcs[npc].walksteps[walk] = bundle.integer(&path);
            } else {
                game.npcs[npc].walksteps[walk] = -1;
            }
        }

        // Only the highest-indexed active walk actually moves the NPC.
        if !has_moved {
            tick_npc_walk(game, filter, npc, walk);
            has_moved = true;
        }
    }
}

fn tick_npc_walk(game: &mut Gamestate, filter: &mut PrintFilter, npc: usize, walk: usize) {
    let bundle = game.bundle.clone();
    let roomgroups = bundle.entity_count("RoomGroups") as i64;
    let room_count = game.rooms.len() as i64;

    let walk_base: [crate::bundle::Seg; 4] =
        ["NPCs".into(), npc.into(), "Walks".into(), walk.into()];
    let walk_prop = |prop: &'static str| -> Vec<crate::bundle::Seg<'static>> {
        let mut path: Vec<crate::bundle::Seg> = walk_base.to_vec();
        path.push(prop.into());
        path
    };

    // Pick the step whose move-time boundary the counter has crossed.
    let movetimes = bundle.count(&walk_prop("MoveTimes"));
    let mut walkstep = 0;
    while walkstep + 1 < movetimes {
        let mut path = walk_prop("MoveTimes");
        path.push((walkstep + 1).into());
        if game.npcs[npc].walksteps[walk] > bundle.integer(&path) {
            break;
        }
        walkstep += 1;
    }

    let start = game.npcs[npc].location - 1;
    let mut dest = start;

    let mut rooms_path = walk_prop("Rooms");
    rooms_path.push(walkstep.into());
    let destnum = bundle.integer(&rooms_path);

    if destnum == 0 {
        dest = -1; // Hidden.
    } else if destnum == 1 {
        dest = game.playerroom as i64; // Follow the player.
    } else if destnum < room_count + 2 {
        dest = destnum - 2;
    } else if destnum < room_count + 2 + roomgroups {
        let group = (destnum - 2 - room_count) as usize;
        dest = random_adjacent_roomgroup_member(game, start, group);
        if dest == -1 {
            dest = game.random_roomgroup_member(group) as i64;
        }
    }

    game.npcs[npc].location = dest + 1;
    trace!("npc {npc}: walk {walk} step {walkstep} moved to {dest}");

    if start != dest {
        if start == game.playerroom as i64 {
            announce(game, filter, npc, start as usize, true, dest);
        } else if dest == game.playerroom as i64 {
            announce(game, filter, npc, dest as usize, false, start);
        }
    }

    // Meeting a character can fire a task.
    let char_task = bundle.integer(&walk_prop("CharTask"));
    if char_task != 0 {
        let meet_char = bundle.integer(&walk_prop("MeetChar"));
        let met = (meet_char == 0 && dest == game.playerroom as i64)
            || (meet_char > 0 && dest == game.npcs[meet_char as usize - 1].location - 1);
        if met {
            task::run_task(game, filter, char_task as usize - 1, true);
        }
    }

    // As can walking in on an object.
    let object_task = bundle.integer(&walk_prop("ObjectTask"));
    if object_task != 0 {
        let meet_object = bundle.integer(&walk_prop("MeetObject"));
        if dest >= 0 && game.object_directly_in_room(meet_object as usize, dest as usize) {
            task::run_task(game, filter, object_task as usize - 1, true);
        }
    }
}

/// A random member of `group` adjacent to `room` via its exits, or -1.
fn random_adjacent_roomgroup_member(game: &Gamestate, room: i64, group: usize) -> i64 {
    if room < 0 {
        return -1;
    }
    let directions = direction_names(game).len();
    let mut adjacent = Vec::new();
    for direction in 0..directions {
        let dest = game.bundle.integer(&[
            "Rooms".into(),
            (room as usize).into(),
            "Exits".into(),
            direction.into(),
            "Dest".into(),
        ]);
        if dest > 0 && game.room_in_group(dest as usize - 1, group) {
            adjacent.push(dest - 1);
        }
    }
    if adjacent.is_empty() {
        return -1;
    }
    adjacent[random_int(0, adjacent.len() as i64 - 1) as usize]
}

/// Report an NPC entering or leaving the player's room, following the
/// compass direction of the exit that links the two rooms when one exists.
fn announce(
    game: &mut Gamestate,
    filter: &mut PrintFilter,
    npc: usize,
    room: usize,
    is_exit: bool,
    npc_room: i64,
) {
    let bundle = game.bundle.clone();
    if !bundle.entity_boolean("NPCs", npc, "ShowEnterExit") {
        return;
    }

    let text = if is_exit {
        bundle.entity_string("NPCs", npc, "ExitText")
    } else {
        bundle.entity_string("NPCs", npc, "EnterText")
    };
    let name = bundle.entity_string("NPCs", npc, "Name");
    let dirnames = direction_names(game);

    let mut matched_direction = None;
    for (direction, dirname) in dirnames.iter().enumerate() {
        let base: [crate::bundle::Seg; 4] =
            ["Rooms".into(), room.into(), "Exits".into(), direction.into()];
        if bundle.get(&base).is_some() {
            let mut path: Vec<crate::bundle::Seg> = base.to_vec();
            path.push("Dest".into());
            if bundle.integer(&path) - 1 == npc_room {
                matched_direction = Some(*dirname);
                break;
            }
        }
    }

    filter.push_char('\n');
    filter.new_sentence();
    filter.push(name);
    filter.push_char(' ');
    filter.push(text);
    if let Some(dirname) = matched_direction {
        filter.push(if is_exit { " to " } else { " from " });
        filter.push(dirname);
    }
    filter.push(".\n");

    let res_index = if is_exit { 3 } else { 2 };
    resources::handle_resource(
        game,
        &["NPCs".into(), npc.into(), "Res".into(), res_index.into()],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use std::rc::Rc;

    fn fixture() -> Gamestate {
        let bundle = Bundle::from_toml_str(
            r#"
            [Header]
            StartRoom = 0

            [[Rooms]]
            Short = "Yard"
            [[Rooms.Exits]]
            Dest = 2

            [[Rooms]]
            Short = "Shed"

            [[NPCs]]
            Name = "Edna"
            StartRoom = 1
            ShowEnterExit = true
            EnterText = "arrives"
            ExitText = "leaves"
            [[NPCs.Walks]]
            StartTask = 0
            Loop = false
            MoveTimes = [1]
            Rooms = [3]
            "#,
        )
        .unwrap();
        Gamestate::new(Rc::new(bundle))
    }

    #[test]
    fn count_in_room_includes_player() {
        let game = fixture();
        assert_eq!(game.npc_count_in_room(0), 2);
        assert_eq!(game.npc_count_in_room(1), 0);
    }

    #[test]
    fn setup_starts_zero_start_task_walks() {
        let mut game = fixture();
        game.npc_setup_initial();
        // MoveTimes[0] + 1.
        assert_eq!(game.npcs[0].walksteps[0], 2);
        assert!(game.npcs[0].seen);
    }

    #[test]
    fn walk_counts_down_and_moves_npc() {
        let mut game = fixture();
        let mut filter = PrintFilter::new();
        game.npc_setup_initial();

        tick_npcs(&mut game, &mut filter);
        assert_eq!(game.npcs[0].walksteps[0], 1);

        // Second tick hits zero: non-loop walk finishes, NPC has walked
        // to room index 1 (destination encoding 3 = room_count offset).
        tick_npcs(&mut game, &mut filter);
        assert_eq!(game.npcs[0].walksteps[0], -1);
        assert_eq!(game.npcs[0].location, 2);
    }

    #[test]
    fn follow_player_destination_tracks_player() {
        let bundle = Bundle::from_toml_str(
            r#"
            [Header]
            StartRoom = 1

            [[Rooms]]
            Short = "Yard"
            [[Rooms]]
            Short = "Shed"

            [[NPCs]]
            Name = "Shadow"
            StartRoom = 1
            [[NPCs.Walks]]
            StartTask = 0
            Loop = true
            MoveTimes = [1]
            Rooms = [1]
            "#,
        )
        .unwrap();
        let mut game = Gamestate::new(Rc::new(bundle));
        let mut filter = PrintFilter::new();
        game.npc_setup_initial();

        tick_npcs(&mut game, &mut filter);
        tick_npcs(&mut game, &mut filter);
        assert_eq!(game.npcs[0].location, 2, "npc should follow into room 1");
        // Loop walk keeps running.
        assert!(game.npcs[0].walksteps[0] > 0);
    }

    #[test]
    fn walk_stops_when_stopping_task_done() {
        let bundle = Bundle::from_toml_str(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Yard"
            [[Tasks]]
            Command = ["halt"]
            [[NPCs]]
            Name = "Guard"
            StartRoom = 1
            [[NPCs.Walks]]
            StartTask = 0
            StoppingTask = 1
            Loop = true
            MoveTimes = [2]
            Rooms = [2]
            "#,
        )
        .unwrap();
        let mut game = Gamestate::new(Rc::new(bundle));
        let mut filter = PrintFilter::new();
        game.npc_setup_initial();
        game.tasks[0].done = true;

        tick_npcs(&mut game, &mut filter);
        assert_eq!(game.npcs[0].walksteps[0], -1);
    }
}
