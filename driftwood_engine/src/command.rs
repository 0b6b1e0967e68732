//! The command dispatcher and the built-in command library.
//!
//! Each input fragment is tried against game task commands first, then the
//! built-in movement/manipulation/meta commands, then restricted tasks (to
//! surface their failure messages), and finally the stock catch-all
//! responses. The library handlers disambiguate pattern references,
//! validate preconditions, and only then mutate the gamestate.

use lazy_static::lazy_static;
use log::{error, info};

use crate::bundle::Seg;
use crate::filter::{self, PrintFilter};
use crate::host::{ConfirmKind, Host, Tag};
use crate::npc::direction_names;
use crate::pattern::{self, CompiledPattern};
use crate::resources;
use crate::restriction;
use crate::run::Session;
use crate::state::{Gamestate, ObjectPosition, Openness};
use crate::task;
use crate::{ADRIFT_EMULATION, DRIFTWOOD_VERSION};

/// Built-in commands with gamestate effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LibCmd {
    Go(usize),
    Inventory,
    Look,
    ExamineObject,
    ExamineNpc,
    ExamineSelf,
    GetObject,
    GetNpc,
    GetAll,
    GetObjectFrom,
    GetAllFrom,
    DropObject,
    DropAll,
    PutObjectOn,
    PutObjectIn,
    OpenObject,
    CloseObject,
    UnlockObjectWith,
    UnlockObject,
    LockObjectWith,
    LockObject,
    ReadObject,
    GiveObjectNpc,
    WearObject,
    RemoveObject,
    RemoveAll,
    EatObject,
    SitOnObject,
    StandOnObject,
    LieOnObject,
    SitOnFloor,
    StandUp,
    LieOnFloor,
    AskNpcAbout,
    AttackNpcWith,
    AttackNpc,
    LocateObject,
    LocateNpc,
    Exits,
    Wait,
    Save,
    Restore,
    Restart,
    Again,
    Quit,
    Turns,
    Score,
    Undo,
    Hints,
    Verbose,
    Brief,
    NotifyOn,
    NotifyOff,
    Notify,
    Help,
    License,
    Information,
    Clear,
    Version,
    Debugger,
}

/// Movement commands for the four point compass, in exit index order.
const MOVE_COMMANDS_4: &[(&str, LibCmd)] = &[
    ("{go} {to} {the} [north/n]", LibCmd::Go(0)),
    ("{go} {to} {the} [east/e]", LibCmd::Go(1)),
    ("{go} {to} {the} [south/s]", LibCmd::Go(2)),
    ("{go} {to} {the} [west/w]", LibCmd::Go(3)),
    ("{go} {to} {the} [up/u]", LibCmd::Go(4)),
    ("{go} {to} {the} [down/d]", LibCmd::Go(5)),
    ("{go} {to} {the} [in]", LibCmd::Go(6)),
    ("{go} {to} {the} [out/o]", LibCmd::Go(7)),
];

/// Additional movement commands for the eight point compass.
const MOVE_COMMANDS_8: &[(&str, LibCmd)] = &[
    ("{go} {to} {the} [northeast/north-east/ne]", LibCmd::Go(8)),
    ("{go} {to} {the} [southeast/south-east/se]", LibCmd::Go(9)),
    ("{go} {to} {the} [southwest/south-west/sw]", LibCmd::Go(10)),
    ("{go} {to} {the} [northwest/north-west/nw]", LibCmd::Go(11)),
];

/// General library commands, tried in table order.
const GENERAL_COMMANDS: &[(&str, LibCmd)] = &[
    ("[inventory/inv/i]", LibCmd::Inventory),
    ("[x/ex/exam/examine/l/look] {{at} {the} [room/location]}", LibCmd::Look),
    ("[x/ex/exam/examine/look at/look] [me/self/myself]", LibCmd::ExamineSelf),
    ("[x/ex/exam/examine/look at/look] %object%", LibCmd::ExamineObject),
    ("[x/ex/exam/examine/look at/look] %character%", LibCmd::ExamineNpc),
    ("[get/take/pick up] %object%", LibCmd::GetObject),
    ("pick %object% up", LibCmd::GetObject),
    ("[get/take/pick up] %character%", LibCmd::GetNpc),
    ("[get/take] all", LibCmd::GetAll),
    ("pick [up all/all up]", LibCmd::GetAll),
    ("[get/take/remove] %object% from %text%", LibCmd::GetObjectFrom),
    ("[[get/take/remove] all from/empty] %object%", LibCmd::GetAllFrom),
    ("[drop/put down] %object%", LibCmd::DropObject),
    ("put %object% down", LibCmd::DropObject),
    ("drop all", LibCmd::DropAll),
    ("put [down all/all down]", LibCmd::DropAll),
    ("put %object% [on/onto/on top of] %text%", LibCmd::PutObjectOn),
    ("put %object% [in/into/inside] %text%", LibCmd::PutObjectIn),
    ("open %object%", LibCmd::OpenObject),
    ("close %object%", LibCmd::CloseObject),
    ("unlock %object% with %text%", LibCmd::UnlockObjectWith),
    ("lock %object% with %text%", LibCmd::LockObjectWith),
    ("unlock %object%", LibCmd::UnlockObject),
    ("lock %object%", LibCmd::LockObject),
    ("read %object%", LibCmd::ReadObject),
    ("give %object% to %character%", LibCmd::GiveObjectNpc),
    ("[wear/put on/don] %object%", LibCmd::WearObject),
    ("put %object% on", LibCmd::WearObject),
    ("[remove/take off/doff] %object%", LibCmd::RemoveObject),
    ("take %object% off", LibCmd::RemoveObject),
    ("[remove/take off/doff] all", LibCmd::RemoveAll),
    ("eat %object%", LibCmd::EatObject),
    ("sit [on/in] %object%", LibCmd::SitOnObject),
    ("stand on %object%", LibCmd::StandOnObject),
    ("[lie/lay] on %object%", LibCmd::LieOnObject),
    ("sit {down/on {the} [ground/floor]}", LibCmd::SitOnFloor),
    ("stand {up/on {the} [ground/floor]}", LibCmd::StandUp),
    ("[lie/lay] {down/on {the} [ground/floor]}", LibCmd::LieOnFloor),
    ("ask %character% about %text%", LibCmd::AskNpcAbout),
    ("[attack/hit/kill/slap/shoot/stab] %character% with %object%", LibCmd::AttackNpcWith),
    ("[attack/hit/kill/slap/shoot/stab/punch/kick] %character%", LibCmd::AttackNpc),
    ("[locate/where [is/are]/where/find] %object%", LibCmd::LocateObject),
    ("[locate/where [is/are]/where/find] %character%", LibCmd::LocateNpc),
    ("[exit/exits]", LibCmd::Exits),
    ("[goto/go {to}] *", LibCmd::Exits),
    ("[wait/z]", LibCmd::Wait),
    ("save", LibCmd::Save),
    ("[restore/load]", LibCmd::Restore),
    ("restart", LibCmd::Restart),
    ("[again/g]", LibCmd::Again),
    ("[quit/q]", LibCmd::Quit),
    ("turns", LibCmd::Turns),
    ("score", LibCmd::Score),
    ("undo", LibCmd::Undo),
    ("[hint/hints]", LibCmd::Hints),
    ("verbose", LibCmd::Verbose),
    ("brief", LibCmd::Brief),
    ("[notify/notification] on", LibCmd::NotifyOn),
    ("[notify/notification] off", LibCmd::NotifyOff),
    ("[notify/notification]", LibCmd::Notify),
    ("help", LibCmd::Help),
    ("[gpl/license]", LibCmd::License),
    ("[about/info/information/author]", LibCmd::Information),
    ("[clear/cls/clr]", LibCmd::Clear),
    ("version", LibCmd::Version),
    ("{#}debug{ger}", LibCmd::Debugger),
];

/// Stock response-only commands, tried last. Responses are perspective
/// triples (second, first, third person).
const STANDARD_RESPONSES: &[(&str, &str, &str, &str)] = &[
    ("[get/take/pick up] *", "You can't take that!", "I can't take that!", "%player% can't take that!"),
    ("open *", "You can't open that!", "I can't open that!", "%player% can't open that!"),
    ("close *", "You can't close that!", "I can't close that!", "%player% can't close that!"),
    ("give *", "You have nothing to give.", "I have nothing to give.", "%player% has nothing to give."),
    ("[remove/take off/doff] *", "You're not wearing that!", "I'm not wearing that!", "%player% isn't wearing that!"),
    ("[drop/put down] *", "You don't have that!", "I don't have that!", "%player% doesn't have that!"),
    ("[wear/put on/don] *", "You can't wear that!", "I can't wear that!", "%player% can't wear that!"),
    ("[x/examine/look at/look] *", "You see nothing special.", "I see nothing special.", "%player% sees nothing special."),
    (
        "[shit/fuck/bastard/cunt/crap/hell/shag/bollocks/bugger] *",
        "Such language!",
        "Such language!",
        "Such language!",
    ),
    ("ask %object% *", "You get no reply.", "I get no reply.", "%player% gets no reply."),
    ("[break/destroy/smash] %object%", "Vandalism is not the answer.", "Vandalism is not the answer.", "Vandalism is not the answer."),
    ("[break/destroy/smash] %character%", "Violence isn't the answer to this one.", "Violence isn't the answer to this one.", "Violence isn't the answer to this one."),
    ("buy *", "Nothing is for sale here.", "Nothing is for sale here.", "Nothing is for sale here."),
    ("climb *", "There's nothing worth climbing here.", "There's nothing worth climbing here.", "There's nothing worth climbing here."),
    ("cry *", "There's no need for that!", "There's no need for that!", "There's no need for that!"),
    ("dance *", "You dance a merry jig.", "I dance a merry jig.", "%player% dances a merry jig."),
    ("feed *", "There's nothing to feed here.", "There's nothing to feed here.", "There's nothing to feed here."),
    ("fix %object%", "It isn't broken.", "It isn't broken.", "It isn't broken."),
    ("fly *", "You can't fly.", "I can't fly.", "%player% can't fly."),
    ("hum *", "You hum a little tune.", "I hum a little tune.", "%player% hums a little tune."),
    ("jump *", "Wheee! That was fun.", "Wheee! That was fun.", "Wheee! That was fun."),
    ("[hit/kick/punch] %object%", "That would achieve nothing.", "That would achieve nothing.", "That would achieve nothing."),
    ("kiss %object%", "That would be unhygienic.", "That would be unhygienic.", "That would be unhygienic."),
    ("kiss %character%", "Keep your mind on the game!", "Keep my mind on the game!", "%player% should keep their mind on the game!"),
    ("listen *", "You hear nothing unusual.", "I hear nothing unusual.", "%player% hears nothing unusual."),
    ("[move/push/pull/press/turn] %object%", "Nothing happens.", "Nothing happens.", "Nothing happens."),
    ("please *", "Politeness gets you nowhere.", "Politeness gets me nowhere.", "Politeness gets %player% nowhere."),
    ("run *", "There's no need to rush.", "There's no need to rush.", "There's no need to rush."),
    ("say *", "No one seems to be listening.", "No one seems to be listening.", "No one seems to be listening."),
    ("shout *", "Yelling won't help.", "Yelling won't help.", "Yelling won't help."),
    ("sing *", "Your singing is appalling.", "My singing is appalling.", "%player%'s singing is appalling."),
    ("sleep *", "This is no time for a nap.", "This is no time for a nap.", "This is no time for a nap."),
    ("smell %object%", "It smells about as you'd expect.", "It smells about as I'd expect.", "It smells about as %player% expected."),
    ("talk *", "No one seems interested in conversation.", "No one seems interested in conversation.", "No one seems interested in conversation."),
    ("thank *", "You're welcome.", "You're welcome.", "You're welcome."),
    ("touch %object%", "You feel nothing out of the ordinary.", "I feel nothing out of the ordinary.", "%player% feels nothing out of the ordinary."),
    ("wash *", "There's no need for a wash just now.", "There's no need for a wash just now.", "There's no need for a wash just now."),
    ("whistle *", "A tuneless noise emerges.", "A tuneless noise emerges.", "A tuneless noise emerges."),
    ("[why/when/what/can/how] *", "That's a good question.", "That's a good question.", "That's a good question."),
    ("xyzzy *", "Nothing happens. This isn't that kind of cave.", "Nothing happens. This isn't that kind of cave.", "Nothing happens. This isn't that kind of cave."),
    ("yes *", "That's nice to know.", "That's nice to know.", "That's nice to know."),
    ("* %object%", "You can't do that to it.", "I can't do that to it.", "%player% can't do that to it."),
    ("* %character%", "They wouldn't appreciate that.", "They wouldn't appreciate that.", "They wouldn't appreciate that."),
];

lazy_static! {
    static ref COMPILED_MOVE_4: Vec<(CompiledPattern, LibCmd)> = MOVE_COMMANDS_4
        .iter()
        .map(|(text, cmd)| (pattern::compile(text), *cmd))
        .collect();
    static ref COMPILED_MOVE_8: Vec<(CompiledPattern, LibCmd)> = MOVE_COMMANDS_4
        .iter()
        .chain(MOVE_COMMANDS_8)
        .map(|(text, cmd)| (pattern::compile(text), *cmd))
        .collect();
    static ref COMPILED_GENERAL: Vec<(CompiledPattern, LibCmd)> = GENERAL_COMMANDS
        .iter()
        .map(|(text, cmd)| (pattern::compile(text), *cmd))
        .collect();
    static ref COMPILED_STANDARD: Vec<(CompiledPattern, usize)> = STANDARD_RESPONSES
        .iter()
        .enumerate()
        .map(|(index, (text, ..))| (pattern::compile(text), index))
        .collect();
}

/// Pick a response by the game's narrative perspective.
pub fn select_response<'a>(
    game: &Gamestate,
    second: &'a str,
    first: &'a str,
    third: &'a str,
) -> &'a str {
    match game.bundle.global_integer("Perspective") {
        1 => first,
        2 => third,
        _ => second,
    }
}

// ---------------------------------------------------------------------------
// Room naming and description
// ---------------------------------------------------------------------------

/// Does a room alternate's condition currently hold?
pub fn pass_alt_room(game: &Gamestate, room: usize, alt: usize) -> bool {
    let bundle = game.bundle.clone();
    let base: [Seg; 4] = ["Rooms".into(), room.into(), "Alts".into(), alt.into()];
    let prop = |name: &'static str| -> Vec<Seg<'static>> {
        let mut path = base.to_vec();
        path.push(name.into());
        path
    };

    let var2 = bundle.integer(&prop("Var2"));
    let var3 = bundle.integer(&prop("Var3"));
    match bundle.integer(&prop("Type")) {
        // Task done / not done.
        0 => {
            if var2 == 0 {
                true
            } else {
                game.tasks[var2 as usize - 1].done == (var3 == 0)
            }
        }
        // Stateful object in a given state.
        1 => {
            if var2 == 0 {
                true
            } else {
                restriction::pass_object_state(game, game.stateful_index_of(var2 as usize) as i64, var3 - 1)
            }
        }
        // Player condition against a dynamic object.
        2 => {
            if var3 == 0 {
                return matches!(var2, 0 | 2 | 5);
            }
            let object = game.nth_dynamic_object(var3 as usize - 1);
            match var2 {
                0 => game.objects[object].position != ObjectPosition::HeldByPlayer,
                1 => game.objects[object].position == ObjectPosition::HeldByPlayer,
                2 => game.objects[object].position != ObjectPosition::WornByPlayer,
                3 => game.objects[object].position == ObjectPosition::WornByPlayer,
                4 => !game.object_indirectly_in_room(object, game.playerroom),
                5 => game.object_indirectly_in_room(object, game.playerroom),
                other => panic!("room {room} alt {alt}: invalid player condition {other}"),
            }
        }
        other => panic!("room {room} alt {alt}: invalid type {other}"),
    }
}

/// The current name of a room, honoring alternate descriptions: type-0
/// alternates first, then type-1, then type-2, then the base short name.
pub fn room_name(game: &Gamestate, room: usize) -> String {
    let bundle = game.bundle.clone();
    let alt_count = bundle.count(&["Rooms".into(), room.into(), "Alts".into()]);

    for wanted in 0..=2_i64 {
        for alt in 0..alt_count {
            let alt_type = bundle.integer(&[
                "Rooms".into(),
                room.into(),
                "Alts".into(),
                alt.into(),
                "Type".into(),
            ]);
            if alt_type == wanted && pass_alt_room(game, room, alt) {
                let changed = bundle.string(&[
                    "Rooms".into(),
                    room.into(),
                    "Alts".into(),
                    alt.into(),
                    "Changed".into(),
                ]);
                if !changed.is_empty() {
                    return changed.to_string();
                }
            }
        }
    }
    bundle.entity_string("Rooms", room, "Short").to_string()
}

/// The room's long description with alternates applied, and whether a
/// passing alternate asks for the object list to be hidden.
fn room_description(game: &Gamestate, room: usize) -> (String, bool) {
    let bundle = game.bundle.clone();
    let mut description = bundle.entity_string("Rooms", room, "Long").to_string();
    let mut hide_objects = false;

    let alt_count = bundle.count(&["Rooms".into(), room.into(), "Alts".into()]);
    for alt in 0..alt_count {
        let base: [Seg; 4] = ["Rooms".into(), room.into(), "Alts".into(), alt.into()];
        let read = |name: &'static str| -> String {
            let mut path = base.to_vec();
            path.push(name.into());
            bundle.string(&path).to_string()
        };
        if pass_alt_room(game, room, alt) {
            let m1 = read("M1");
            if !m1.is_empty() {
                let mut path = base.to_vec();
                path.push("DisplayRoom".into());
                if bundle.integer(&path) != 0 {
                    description = m1;
                } else {
                    description.push_str("  ");
                    description.push_str(&m1);
                }
            }
            let mut path = base.to_vec();
            path.push("HideObjects".into());
            if bundle.boolean(&path) {
                hide_objects = true;
            }
        } else {
            let m2 = read("M2");
            if !m2.is_empty() {
                description.push_str("  ");
                description.push_str(&m2);
            }
        }
    }
    (description, hide_objects)
}

/// Push the room name, in bold when configured, with a trailing newline.
fn print_room_name(game: &Gamestate, filter: &mut PrintFilter, room: usize) {
    let name = room_name(game, room);
    if game.bold_room_names {
        filter.push_tag(Tag::Bold);
        filter.push(&name);
        filter.push_tag(Tag::EndBold);
    } else {
        filter.push(&name);
    }
    filter.push_char('\n');
}

/// Describe the player's current room: name, long description (unless in
/// brief mode for a visited room), exits, objects, and characters.
pub fn describe_player_room(game: &mut Gamestate, filter: &mut PrintFilter, force_full: bool) {
    let room = game.playerroom;
    print_room_name(game, filter, room);

    if !force_full && !game.verbose && game.rooms[room].visited {
        return;
    }

    let (description, hide_objects) = room_description(game, room);
    if !description.is_empty() {
        filter.push(&description);
        filter.push_char('\n');
    }

    if game.bundle.global_boolean("ShowExits") {
        list_room_exits(game, filter, room);
    }

    if !hide_objects {
        list_room_objects(game, filter, room);
    }
    list_room_npcs(game, filter, room);

    resources::handle_resource(game, &["Rooms".into(), room.into(), "Res".into()]);
}

/// "There are exits to the north and west." or a no-exits note.
fn list_room_exits(game: &Gamestate, filter: &mut PrintFilter, room: usize) {
    let names = direction_names(game);
    let exits: Vec<&str> = (0..names.len())
        .filter(|&direction| exit_destination(game, room, direction).is_some())
        .map(|direction| names[direction])
        .collect();

    if exits.is_empty() {
        filter.push("There are no obvious exits.\n");
        return;
    }
    filter.push(if exits.len() == 1 {
        "There is an exit to "
    } else {
        "There are exits to "
    });
    for (index, exit) in exits.iter().enumerate() {
        if index > 0 {
            filter.push(if index + 1 == exits.len() { " and " } else { ", " });
        }
        filter.push(exit);
    }
    filter.push(".\n");
}

fn list_room_objects(game: &Gamestate, filter: &mut PrintFilter, room: usize) {
    let mut plain: Vec<usize> = Vec::new();
    for object in 0..game.objects.len() {
        if !game.object_directly_in_room(object, room)
            || !game.object_shows_initial_description(object)
        {
            continue;
        }
        let in_room_desc = game.bundle.entity_string("Objects", object, "InRoomDesc");
        if in_room_desc.is_empty() {
            plain.push(object);
        } else {
            filter.push(in_room_desc);
            filter.push_char('\n');
        }
    }

    if !plain.is_empty() {
        filter.push(if plain.len() == 1 { "Also here is " } else { "Also here are " });
        for (index, &object) in plain.iter().enumerate() {
            if index > 0 {
                filter.push(if index + 1 == plain.len() { " and " } else { ", " });
            }
            filter.push(&game.object_name_with_article(object));
        }
        filter.push(".\n");
    }
}

fn list_room_npcs(game: &Gamestate, filter: &mut PrintFilter, room: usize) {
    for npc in 0..game.npcs.len() {
        if !game.npcs[npc].in_room(room) {
            continue;
        }
        let in_room_text = game.bundle.entity_string("NPCs", npc, "InRoomText");
        if in_room_text.is_empty() {
            filter.new_sentence();
            filter.push(game.npc_name(npc));
            filter.push(" is here.\n");
        } else {
            filter.push(in_room_text);
            filter.push_char('\n');
        }
    }
}

/// Destination room of an exit, before restriction checks.
pub fn exit_destination(game: &Gamestate, room: usize, direction: usize) -> Option<usize> {
    let dest = game.bundle.integer(&[
        "Rooms".into(),
        room.into(),
        "Exits".into(),
        direction.into(),
        "Dest".into(),
    ]);
    (dest > 0).then(|| dest as usize - 1)
}

/// Can the player currently pass through an exit? Exit restrictions name
/// a task or a stateful object with an expected value.
pub fn can_go(game: &Gamestate, room: usize, direction: usize) -> bool {
    let bundle = game.bundle.clone();
    let base: [Seg; 4] = ["Rooms".into(), room.into(), "Exits".into(), direction.into()];
    let prop = |name: &'static str| -> Vec<Seg<'static>> {
        let mut path = base.to_vec();
        path.push(name.into());
        path
    };

    let restriction = bundle.integer(&prop("Var1")) - 1;
    if restriction < 0 {
        return true;
    }

    match bundle.integer(&prop("Var3")) {
        // Task completion restriction.
        0 => {
            let check = bundle.integer(&prop("Var2"));
            (check != 0) != game.tasks[restriction as usize].done
        }
        // Stateful object restriction.
        1 => {
            let object = game.nth_stateful_object(restriction as usize);
            let check = bundle.integer(&prop("Var2"));
            if game.object_is_openable(object) {
                if game.object_key(object).is_some() {
                    if check <= 2 {
                        game.objects[object].openness.to_wire() == check + 5
                    } else {
                        game.objects[object].state == check - 2
                    }
                } else if check <= 1 {
                    game.objects[object].openness.to_wire() == check + 5
                } else {
                    game.objects[object].state == check - 1
                }
            } else {
                game.objects[object].state == check + 1
            }
        }
        other => panic!("room {room} exit {direction}: unknown restriction kind {other}"),
    }
}

/// Refresh the gamestate's current room name and status line strings.
pub fn update_status(game: &mut Gamestate) {
    let name = room_name(game, game.playerroom);
    let cooked = filter::cook_text(game, &name);
    game.current_room_name = Some(filter::strip_tags(&cooked));

    if game.bundle.global_boolean("StatusBox") {
        let status = game.bundle.global_string("StatusBoxText").to_string();
        let cooked = filter::cook_text(game, &status);
        game.status_line = Some(filter::strip_tags(&cooked));
    } else {
        game.status_line = None;
    }
}

// ---------------------------------------------------------------------------
// Reference disambiguation
// ---------------------------------------------------------------------------

/// Result of narrowing a pattern match to one entity.
enum Resolved {
    One(usize),
    Ambiguous,
    Nothing,
}

/// Narrow the object reference vector to a single object. When several
/// candidates remain but only one is visible, the visible one wins;
/// otherwise the candidates are listed and the command fails.
fn resolve_object(game: &mut Gamestate, filter: &mut PrintFilter) -> Resolved {
    let mut candidates: Vec<usize> = (0..game.objects.len())
        .filter(|&object| game.object_references[object])
        .collect();

    if candidates.len() > 1 {
        let visible: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&object| {
                game.object_indirectly_in_room(object, game.playerroom)
                    || game.object_indirectly_held_by_player(object)
            })
            .collect();
        if !visible.is_empty() {
            candidates = visible;
        }
    }

    match candidates.as_slice() {
        [] => Resolved::Nothing,
        [object] => {
            game.vars.set_ref_object(*object);
            game.it_object = *object as i64;
            Resolved::One(*object)
        }
        several => {
            filter.push("Please be more specific about which object you mean: ");
            for (index, &object) in several.iter().enumerate() {
                if index > 0 {
                    filter.push(if index + 1 == several.len() { " or " } else { ", " });
                }
                filter.push(&game.object_name_the(object));
            }
            filter.push(".\n");
            Resolved::Ambiguous
        }
    }
}

/// Narrow the NPC reference vector to a single character, preferring ones
/// in the player's room, and remember the result as pronoun memory.
fn resolve_npc(game: &mut Gamestate, filter: &mut PrintFilter) -> Resolved {
    let mut candidates: Vec<usize> = (0..game.npcs.len())
        .filter(|&npc| game.npc_references[npc])
        .collect();

    if candidates.len() > 1 {
        let present: Vec<usize> = candidates
            .iter()
            .copied()
            .filter(|&npc| game.npcs[npc].in_room(game.playerroom))
            .collect();
        if !present.is_empty() {
            candidates = present;
        }
    }

    match candidates.as_slice() {
        [] => Resolved::Nothing,
        [npc] => {
            game.vars.set_ref_character(*npc);
            match game.bundle.entity_integer("NPCs", *npc, "Gender") {
                0 => game.him_npc = *npc as i64,
                1 => game.her_npc = *npc as i64,
                _ => game.it_npc = *npc as i64,
            }
            Resolved::One(*npc)
        }
        several => {
            filter.push("Please be more specific about who you mean: ");
            for (index, &npc) in several.iter().enumerate() {
                if index > 0 {
                    filter.push(if index + 1 == several.len() { " or " } else { ", " });
                }
                filter.push(game.npc_name(npc));
            }
            filter.push(".\n");
            Resolved::Ambiguous
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

impl<H: Host> Session<H> {
    /// Try one input fragment against tasks, library commands, restricted
    /// tasks, and stock responses. True when something consumed it.
    pub(crate) fn dispatch_fragment(&mut self, input: &str) -> bool {
        self.run_task_commands(input, true)
            || self.run_general_commands(input)
            || self.run_task_commands(input, false)
            || self.run_standard_commands(input)
    }

    /// Try game task commands. With `unrestricted` set, runnable tasks
    /// whose restrictions pass are executed; otherwise tasks whose
    /// restrictions fail surface their failure message instead.
    fn run_task_commands(&mut self, input: &str, unrestricted: bool) -> bool {
        for index in 0..self.game.tasks.len() {
            if !task::can_run_task(&self.game, index) {
                continue;
            }
            let outcome = restriction::evaluate_task_restrictions(&mut self.game, index);
            let passes = outcome.as_ref().is_some_and(|outcome| outcome.pass);
            if passes != unrestricted {
                continue;
            }

            for forwards in [true, false] {
                if self.try_task_direction(input, index, forwards, unrestricted) {
                    return true;
                }
            }
        }
        false
    }

    fn try_task_direction(
        &mut self,
        input: &str,
        index: usize,
        forwards: bool,
        unrestricted: bool,
    ) -> bool {
        let group = if forwards { "Command" } else { "ReverseCommand" };
        let command_count = self
            .game
            .bundle
            .count(&["Tasks".into(), index.into(), group.into()]);

        for command in 0..command_count {
            let pattern_text = self
                .game
                .bundle
                .string(&["Tasks".into(), index.into(), group.into(), command.into()])
                .to_string();

            let trimmed = pattern_text.trim_start();
            let matched = if trimmed.starts_with('#') {
                run_special_task_function(&mut self.game, trimmed)
            } else {
                pattern::match_pattern(&pattern_text, input, &mut self.game)
            };
            if !matched {
                continue;
            }

            if unrestricted {
                if task::run_task(&mut self.game, &mut self.filter, index, forwards) {
                    return true;
                }
            } else {
                // Restricted and failing: surface the fail message.
                let outcome = restriction::evaluate_task_restrictions(&mut self.game, index);
                if let Some(outcome) = outcome
                    && let Some(message) = outcome.fail_message
                {
                    self.filter.push(&message);
                    self.filter.push_char('\n');
                    return true;
                }
            }
        }
        false
    }

    fn run_general_commands(&mut self, input: &str) -> bool {
        let movement: &[(CompiledPattern, LibCmd)] =
            if self.game.bundle.global_boolean("EightPointCompass") {
                &COMPILED_MOVE_8
            } else {
                &COMPILED_MOVE_4
            };

        for (compiled, command) in movement.iter().chain(COMPILED_GENERAL.iter()) {
            if pattern::match_compiled(compiled, input, &mut self.game) && self.run_lib_command(*command) {
                return true;
            }
        }
        false
    }

    fn run_standard_commands(&mut self, input: &str) -> bool {
        for (compiled, index) in COMPILED_STANDARD.iter() {
            if pattern::match_compiled(compiled, input, &mut self.game) {
                let (_, second, first, third) = STANDARD_RESPONSES[*index];
                let response = select_response(&self.game, second, first, third).to_string();
                self.filter.push(&response);
                self.filter.push_char('\n');
                return true;
            }
        }
        false
    }

    /// Run one matched library command. Returns false to let later table
    /// entries try the same input.
    #[allow(clippy::too_many_lines)]
    fn run_lib_command(&mut self, command: LibCmd) -> bool {
        let game = &mut self.game;
        let filter = &mut self.filter;
        match command {
            LibCmd::Go(direction) => cmd_go(game, filter, direction),
            LibCmd::Inventory => cmd_inventory(game, filter),
            LibCmd::Look => {
                describe_player_room(game, filter, true);
                true
            }
            LibCmd::ExamineObject => cmd_examine_object(game, filter),
            LibCmd::ExamineNpc => cmd_examine_npc(game, filter),
            LibCmd::ExamineSelf => {
                filter.push(select_response(
                    game,
                    "You see nothing special about yourself.",
                    "I see nothing special about myself.",
                    "%player% looks quite ordinary.",
                ));
                filter.push_char('\n');
                true
            }
            LibCmd::GetObject => cmd_get_object(game, filter),
            LibCmd::GetNpc => {
                filter.push("I don't think they would appreciate that!\n");
                true
            }
            LibCmd::GetAll => cmd_get_all(game, filter),
            LibCmd::GetObjectFrom => cmd_get_object_from(game, filter),
            LibCmd::GetAllFrom => cmd_get_all_from(game, filter),
            LibCmd::DropObject => cmd_drop_object(game, filter),
            LibCmd::DropAll => cmd_drop_all(game, filter),
            LibCmd::PutObjectOn => cmd_put_object(game, filter, true),
            LibCmd::PutObjectIn => cmd_put_object(game, filter, false),
            LibCmd::OpenObject => cmd_open_object(game, filter),
            LibCmd::CloseObject => cmd_close_object(game, filter),
            LibCmd::UnlockObject | LibCmd::UnlockObjectWith => cmd_unlock_object(game, filter),
            LibCmd::LockObject | LibCmd::LockObjectWith => cmd_lock_object(game, filter),
            LibCmd::ReadObject => cmd_read_object(game, filter),
            LibCmd::GiveObjectNpc => cmd_give_object_npc(game, filter),
            LibCmd::WearObject => cmd_wear_object(game, filter),
            LibCmd::RemoveObject => cmd_remove_object(game, filter),
            LibCmd::RemoveAll => cmd_remove_all(game, filter),
            LibCmd::EatObject => cmd_eat_object(game, filter),
            LibCmd::SitOnObject => cmd_posture_on_object(game, filter, 1),
            LibCmd::StandOnObject => cmd_posture_on_object(game, filter, 0),
            LibCmd::LieOnObject => cmd_posture_on_object(game, filter, 2),
            LibCmd::SitOnFloor => cmd_posture_on_floor(game, filter, 1),
            LibCmd::StandUp => cmd_posture_on_floor(game, filter, 0),
            LibCmd::LieOnFloor => cmd_posture_on_floor(game, filter, 2),
            LibCmd::AskNpcAbout => cmd_ask_npc_about(game, filter),
            LibCmd::AttackNpcWith => cmd_attack_npc(game, filter, true),
            LibCmd::AttackNpc => cmd_attack_npc(game, filter, false),
            LibCmd::LocateObject => cmd_locate_object(game, filter),
            LibCmd::LocateNpc => cmd_locate_npc(game, filter),
            LibCmd::Exits => {
                game.is_admin = true;
                list_room_exits(game, filter, game.playerroom);
                true
            }
            LibCmd::Wait => {
                game.waitturns = game.bundle.global_integer("WaitTurns").max(0);
                filter.push("Time passes...\n");
                true
            }
            LibCmd::Save => self.cmd_save(),
            LibCmd::Restore => self.cmd_restore(),
            LibCmd::Restart => self.cmd_restart(),
            LibCmd::Again => {
                game.is_admin = true;
                game.do_again = true;
                true
            }
            LibCmd::Quit => self.cmd_quit(),
            LibCmd::Turns => {
                game.is_admin = true;
                let turns = game.turns;
                filter.push(&format!(
                    "You have taken {turns} turn{}.\n",
                    if turns == 1 { "" } else { "s" }
                ));
                true
            }
            LibCmd::Score => {
                game.is_admin = true;
                let max_score = game.bundle.global_integer("MaxScore");
                let score = game.score;
                filter.push(&format!(
                    "Your score is {score} out of a maximum of {max_score}.\n"
                ));
                true
            }
            LibCmd::Undo => self.cmd_undo(),
            LibCmd::Hints => self.cmd_hints(),
            LibCmd::Verbose => {
                game.is_admin = true;
                game.verbose = true;
                filter.push("The game is now in its verbose mode.\n");
                true
            }
            LibCmd::Brief => {
                game.is_admin = true;
                game.verbose = false;
                filter.push("The game is now in its brief mode.\n");
                true
            }
            LibCmd::NotifyOn => {
                game.is_admin = true;
                game.notify_score_change = true;
                filter.push("Score notification is now on.\n");
                true
            }
            LibCmd::NotifyOff => {
                game.is_admin = true;
                game.notify_score_change = false;
                filter.push("Score notification is now off.\n");
                true
            }
            LibCmd::Notify => {
                game.is_admin = true;
                filter.push(if game.notify_score_change {
                    "Score notification is on.\n"
                } else {
                    "Score notification is off.\n"
                });
                true
            }
            LibCmd::Help => {
                game.is_admin = true;
                filter.push(
                    "Move with compass directions, examine and take what you find, and try\n\
                     whatever verbs the story suggests. Useful commands include inventory,\n\
                     look, save, restore, undo, again, wait, score, hints, and quit.\n",
                );
                true
            }
            LibCmd::License => {
                game.is_admin = true;
                filter.push("This interpreter is free software, distributed without warranty.\n");
                true
            }
            LibCmd::Information => {
                game.is_admin = true;
                filter.push("%title% by %author%.\n");
                true
            }
            LibCmd::Clear => {
                game.is_admin = true;
                filter.push_tag(Tag::Cls);
                true
            }
            LibCmd::Version => {
                game.is_admin = true;
                filter.push(&format!(
                    "Driftwood version {DRIFTWOOD_VERSION}, Adrift emulation {ADRIFT_EMULATION}.\n"
                ));
                true
            }
            LibCmd::Debugger => self.cmd_debugger(),
        }
    }
}

/// The one supported `#...` task command function: bind the first dynamic
/// object on the named room's floor as the referenced object. Unknown
/// functions fail closed.
fn run_special_task_function(game: &mut Gamestate, pattern_text: &str) -> bool {
    let body = pattern_text.trim_start_matches('#').trim();
    let Some(rest) = body.strip_prefix("%object%") else {
        error!("unknown task command function {pattern_text:?}");
        return false;
    };
    let rest = rest.trim_start();
    let Some(call) = rest.strip_prefix('=') else {
        error!("unknown task command function {pattern_text:?}");
        return false;
    };
    let call = call.trim();
    let Some(arg) = call
        .strip_prefix("getdynfromroom")
        .and_then(|tail| tail.trim().strip_prefix('('))
        .and_then(|tail| tail.strip_suffix(')'))
    else {
        error!("unknown task command function {pattern_text:?}");
        return false;
    };
    let wanted = arg.trim();

    let room = (0..game.rooms.len()).find(|&room| {
        game.bundle
            .entity_string("Rooms", room, "Short")
            .eq_ignore_ascii_case(wanted)
    });
    let Some(room) = room else {
        return false;
    };

    let object = (0..game.objects.len()).find(|&object| {
        !game.object_is_static(object) && game.object_directly_in_room(object, room)
    });
    let Some(object) = object else {
        return false;
    };

    game.clear_references();
    game.object_references[object] = true;
    game.vars.set_ref_object(object);
    info!("task function getdynfromroom bound object {object}");
    true
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

fn cmd_go(game: &mut Gamestate, filter: &mut PrintFilter, direction: usize) -> bool {
    let names = direction_names(game);
    let Some(destination) = exit_destination(game, game.playerroom, direction) else {
        filter.push(select_response(
            game,
            "You can't go that way.\n",
            "I can't go that way.\n",
            "%player% can't go that way.\n",
        ));
        return true;
    };

    if !can_go(game, game.playerroom, direction) {
        filter.push(select_response(
            game,
            "You can't go that way (at present).\n",
            "I can't go that way (at present).\n",
            "%player% can't go that way (at present).\n",
        ));
        return true;
    }

    if game.playerparent != -1 {
        filter.push("(Getting off ");
        filter.push(&game.object_name_the(game.playerparent as usize));
        filter.push(" first)\n");
    } else if game.playerposition != 0 {
        filter.push("(Standing up first)\n");
    }

    filter.push(select_response(game, "You move ", "I move ", "%player% moves "));
    filter.push(names[direction]);
    filter.push(".\n");

    game.move_player_to_room(destination as i64);
    describe_player_room(game, filter, false);
    true
}

// ---------------------------------------------------------------------------
// Inventory and object manipulation
// ---------------------------------------------------------------------------

fn held_objects(game: &Gamestate) -> Vec<usize> {
    (0..game.objects.len())
        .filter(|&object| {
            matches!(
                game.objects[object].position,
                ObjectPosition::HeldByPlayer | ObjectPosition::WornByPlayer
            )
        })
        .collect()
}

fn cmd_inventory(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let held = held_objects(game);
    if held.is_empty() {
        filter.push(select_response(
            game,
            "You are carrying nothing.\n",
            "I am carrying nothing.\n",
            "%player% is carrying nothing.\n",
        ));
        return true;
    }

    filter.push(select_response(
        game,
        "You are carrying ",
        "I am carrying ",
        "%player% is carrying ",
    ));
    for (index, &object) in held.iter().enumerate() {
        if index > 0 {
            filter.push(if index + 1 == held.len() { " and " } else { ", " });
        }
        filter.push(&game.object_name_with_article(object));
        if game.objects[object].position == ObjectPosition::WornByPlayer {
            filter.push(" (worn)");
        }
    }
    filter.push(".\n");
    true
}

/// Weight and size admission checks for picking an object up.
fn too_heavy_or_large(game: &Gamestate, object: usize, filter: &mut PrintFilter) -> bool {
    let carried_weight: i64 = held_objects(game)
        .iter()
        .map(|&held| game.object_weight(held))
        .sum();
    if carried_weight + game.object_weight(object) > game.player_max_weight() {
        filter.new_sentence();
        filter.push(&game.object_name_the(object));
        filter.push(select_response(
            game,
            " is too heavy for you to carry.\n",
            " is too heavy for me to carry.\n",
            " is too heavy for %player% to carry.\n",
        ));
        return true;
    }

    let carried_size: i64 = held_objects(game)
        .iter()
        .map(|&held| game.object_size(held))
        .sum();
    if carried_size + game.object_size(object) > game.player_max_size() {
        filter.new_sentence();
        filter.push(&game.object_name_the(object));
        filter.push(select_response(
            game,
            " is too bulky for you to carry.\n",
            " is too bulky for me to carry.\n",
            " is too bulky for %player% to carry.\n",
        ));
        return true;
    }
    false
}

fn take_object(game: &mut Gamestate, filter: &mut PrintFilter, object: usize) -> bool {
    if game.object_is_static(object) {
        filter.push(select_response(
            game,
            "You can't take that!\n",
            "I can't take that!\n",
            "%player% can't take that!\n",
        ));
        return true;
    }
    match game.objects[object].position {
        ObjectPosition::HeldByPlayer => {
            filter.push("You already have ");
            filter.push(&game.object_name_the(object));
            filter.push("!\n");
        }
        ObjectPosition::WornByPlayer => {
            filter.push("(Taking ");
            filter.push(&game.object_name_the(object));
            filter.push(" off first)\n");
            game.objects[object].position = ObjectPosition::HeldByPlayer;
        }
        ObjectPosition::HeldByNpc(npc) | ObjectPosition::WornByNpc(npc) => {
            filter.new_sentence();
            filter.push(game.npc_name(npc));
            filter.push(" has ");
            filter.push(&game.object_name_the(object));
            filter.push(".\n");
        }
        _ if !game.object_indirectly_in_room(object, game.playerroom) => {
            filter.push(select_response(
                game,
                "You don't see that here.\n",
                "I don't see that here.\n",
                "%player% doesn't see that here.\n",
            ));
        }
        _ => {
            if too_heavy_or_large(game, object, filter) {
                return true;
            }
            game.objects[object].position = ObjectPosition::HeldByPlayer;
            game.objects[object].unmoved = false;
            filter.push(select_response(game, "You take ", "I take ", "%player% takes "));
            filter.push(&game.object_name_the(object));
            filter.push(".\n");
        }
    }
    true
}

fn cmd_get_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    match resolve_object(game, filter) {
        Resolved::One(object) => take_object(game, filter, object),
        Resolved::Ambiguous => true,
        Resolved::Nothing => false,
    }
}

fn cmd_get_all(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let takeable: Vec<usize> = (0..game.objects.len())
        .filter(|&object| {
            !game.object_is_static(object)
                && game.object_directly_in_room(object, game.playerroom)
        })
        .collect();
    if takeable.is_empty() {
        filter.push("There is nothing to pick up here.\n");
        return true;
    }
    for object in takeable {
        take_object(game, filter, object);
    }
    true
}

fn cmd_get_object_from(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let Some(container) = resolve_text_object(game, filter) else {
        return true;
    };

    let inside = game.objects[object].position == ObjectPosition::InObject(container);
    let on_top = game.objects[object].position == ObjectPosition::OnObject(container);
    if !inside && !on_top {
        filter.new_sentence();
        filter.push(&game.object_name_the(object));
        filter.push(" is not there!\n");
        return true;
    }
    if inside && game.objects[container].openness == Openness::Closed {
        closed_container_message(game, filter, container);
        return true;
    }
    if inside && game.objects[container].openness == Openness::Locked {
        locked_container_message(game, filter, container);
        return true;
    }
    take_object(game, filter, object)
}

fn cmd_get_all_from(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let container = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_is_container(container) && !game.object_is_surface(container) {
        filter.push("You can't take anything from that!\n");
        return true;
    }
    if game.object_is_container(container)
        && matches!(game.objects[container].openness, Openness::Closed | Openness::Locked)
    {
        closed_container_message(game, filter, container);
        return true;
    }

    let contents: Vec<usize> = (0..game.objects.len())
        .filter(|&object| {
            game.objects[object].position == ObjectPosition::InObject(container)
                || game.objects[object].position == ObjectPosition::OnObject(container)
        })
        .collect();
    if contents.is_empty() {
        filter.new_sentence();
        filter.push(&game.object_name_the(container));
        filter.push(" is empty.\n");
        return true;
    }
    for object in contents {
        take_object(game, filter, object);
    }
    true
}

fn cmd_drop_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !matches!(
        game.objects[object].position,
        ObjectPosition::HeldByPlayer | ObjectPosition::WornByPlayer
    ) {
        filter.push(select_response(
            game,
            "You don't have ",
            "I don't have ",
            "%player% doesn't have ",
        ));
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    game.objects[object].position = ObjectPosition::InRoom(game.playerroom);
    filter.push(select_response(game, "You drop ", "I drop ", "%player% drops "));
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_drop_all(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let held: Vec<usize> = (0..game.objects.len())
        .filter(|&object| game.objects[object].position == ObjectPosition::HeldByPlayer)
        .collect();
    if held.is_empty() {
        filter.push(select_response(
            game,
            "You are carrying nothing to drop.\n",
            "I am carrying nothing to drop.\n",
            "%player% is carrying nothing to drop.\n",
        ));
        return true;
    }
    for object in held {
        game.objects[object].position = ObjectPosition::InRoom(game.playerroom);
        filter.push("You drop ");
        filter.push(&game.object_name_the(object));
        filter.push(".\n");
    }
    true
}

/// Resolve the `%text%` half of a two-object command as an object.
fn resolve_text_object(game: &mut Gamestate, filter: &mut PrintFilter) -> Option<usize> {
    let text = game.vars.ref_text().unwrap_or_default().to_string();
    if !pattern::match_pattern("%object%", &text, game) {
        filter.push(select_response(
            game,
            "You see no such thing.\n",
            "I see no such thing.\n",
            "%player% sees no such thing.\n",
        ));
        return None;
    }
    match resolve_object(game, filter) {
        Resolved::One(object) => Some(object),
        Resolved::Ambiguous => None,
        Resolved::Nothing => {
            filter.push("You see no such thing.\n");
            None
        }
    }
}

fn closed_container_message(game: &Gamestate, filter: &mut PrintFilter, container: usize) {
    filter.new_sentence();
    filter.push(&game.object_name_the(container));
    filter.push(" is closed.\n");
}

fn locked_container_message(game: &Gamestate, filter: &mut PrintFilter, container: usize) {
    filter.new_sentence();
    filter.push(&game.object_name_the(container));
    filter.push(" is locked.\n");
}

fn cmd_put_object(game: &mut Gamestate, filter: &mut PrintFilter, onto: bool) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let Some(target) = resolve_text_object(game, filter) else {
        return true;
    };

    if game.objects[object].position != ObjectPosition::HeldByPlayer {
        filter.push("You don't have ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }

    if object == target {
        filter.push(if onto {
            "You can't put an object onto itself!\n"
        } else {
            "You can't put an object inside itself!\n"
        });
        return true;
    }
    if game.containment_would_cycle(object, target) {
        filter.push(if onto {
            "You can't put an object onto one of its own contents!\n"
        } else {
            "You can't put an object inside one of its own contents!\n"
        });
        return true;
    }

    if onto {
        if !game.object_is_surface(target) {
            filter.push("You can't put anything on ");
            filter.push(&game.object_name_the(target));
            filter.push(".\n");
            return true;
        }
        game.objects[object].position = ObjectPosition::OnObject(target);
        filter.push("You put ");
        filter.push(&game.object_name_the(object));
        filter.push(" onto ");
        filter.push(&game.object_name_the(target));
        filter.push(".\n");
        return true;
    }

    if !game.object_is_container(target) {
        filter.push("You can't put anything inside ");
        filter.push(&game.object_name_the(target));
        filter.push(".\n");
        return true;
    }
    if matches!(game.objects[target].openness, Openness::Closed | Openness::Locked) {
        closed_container_message(game, filter, target);
        return true;
    }
    if game.object_size(object) > game.container_maxsize(target) {
        filter.new_sentence();
        filter.push(&game.object_name_the(object));
        filter.push(" is too big to fit inside ");
        filter.push(&game.object_name_the(target));
        filter.push(".\n");
        return true;
    }
    let occupancy = (0..game.objects.len())
        .filter(|&other| game.objects[other].position == ObjectPosition::InObject(target))
        .count() as i64;
    if occupancy >= game.container_capacity(target) {
        filter.push("There is no room left inside ");
        filter.push(&game.object_name_the(target));
        filter.push(".\n");
        return true;
    }

    game.objects[object].position = ObjectPosition::InObject(target);
    filter.push("You put ");
    filter.push(&game.object_name_the(object));
    filter.push(" inside ");
    filter.push(&game.object_name_the(target));
    filter.push(".\n");
    true
}

fn cmd_open_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_is_openable(object) {
        filter.push("You can't open ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    match game.objects[object].openness {
        Openness::Open | Openness::WontClose => {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is already open!\n");
        }
        Openness::Locked => {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is locked!\n");
        }
        Openness::Closed => {
            game.objects[object].openness = Openness::Open;
            filter.push(select_response(game, "You open ", "I open ", "%player% opens "));
            filter.push(&game.object_name_the(object));
            filter.push(".\n");
        }
    }
    true
}

fn cmd_close_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_is_openable(object)
        || game.objects[object].openness == Openness::WontClose
    {
        filter.push("You can't close ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    match game.objects[object].openness {
        Openness::Closed | Openness::Locked => {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is already closed!\n");
        }
        _ => {
            game.objects[object].openness = Openness::Closed;
            filter.push(select_response(game, "You close ", "I close ", "%player% closes "));
            filter.push(&game.object_name_the(object));
            filter.push(".\n");
        }
    }
    true
}

fn cmd_unlock_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let Some(key) = game.object_key(object) else {
        filter.push("You can't unlock ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    };
    if game.objects[object].openness != Openness::Locked {
        filter.new_sentence();
        filter.push(&game.object_name_the(object));
        filter.push(" is not locked!\n");
        return true;
    }
    if !acquire_key(game, filter, key) {
        return true;
    }
    game.objects[object].openness = Openness::Closed;
    filter.push(select_response(game, "You unlock ", "I unlock ", "%player% unlocks "));
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_lock_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let Some(key) = game.object_key(object) else {
        filter.push("You can't lock ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    };
    match game.objects[object].openness {
        Openness::Locked => {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is already locked!\n");
        }
        Openness::Open | Openness::WontClose => {
            filter.push("You'll have to close ");
            filter.push(&game.object_name_the(object));
            filter.push(" first.\n");
        }
        Openness::Closed => {
            if !acquire_key(game, filter, key) {
                return true;
            }
            game.objects[object].openness = Openness::Locked;
            filter.push(select_response(game, "You lock ", "I lock ", "%player% locks "));
            filter.push(&game.object_name_the(object));
            filter.push(".\n");
        }
    }
    true
}

/// Ensure the key is in hand, picking it up from the room if possible.
fn acquire_key(game: &mut Gamestate, filter: &mut PrintFilter, key: usize) -> bool {
    if game.object_indirectly_held_by_player(key) {
        return true;
    }
    if game.object_indirectly_in_room(key, game.playerroom) {
        filter.push("(Picking up ");
        filter.push(&game.object_name_the(key));
        filter.push(" first)\n");
        game.objects[key].position = ObjectPosition::HeldByPlayer;
        game.objects[key].unmoved = false;
        return true;
    }
    filter.push("You don't have anything to do that with.\n");
    false
}

fn cmd_examine_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_indirectly_in_room(object, game.playerroom)
        && !game.object_indirectly_held_by_player(object)
    {
        filter.push(select_response(
            game,
            "You see no such thing.\n",
            "I see no such thing.\n",
            "%player% sees no such thing.\n",
        ));
        return true;
    }

    // The alternate description applies once its gating task is in the
    // right completion state.
    let alt_task = game.bundle.entity_integer("Objects", object, "Task");
    let use_alt = alt_task > 0
        && game.tasks[alt_task as usize - 1].done
            != game.bundle.entity_boolean("Objects", object, "TaskNotDone");
    let description = if use_alt {
        game.bundle.entity_string("Objects", object, "AltDesc")
    } else {
        game.bundle.entity_string("Objects", object, "Description")
    };
    if description.is_empty() {
        filter.push("You see nothing special about ");
        filter.push(&game.object_name_the(object));
        filter.push(".\n");
    } else {
        filter.push(description);
        filter.push_char('\n');
    }

    if game.object_is_openable(object) {
        let status = match game.objects[object].openness {
            Openness::Open => Some("open"),
            Openness::Closed => Some("closed"),
            Openness::Locked => Some("locked"),
            Openness::WontClose => None,
        };
        if let Some(status) = status {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(&format!(" is {status}.\n"));
        }
    }

    if game.bundle.entity_boolean("Objects", object, "StateListed")
        && let Some(state) = game.object_state_name(object)
    {
        filter.push(&format!("It is currently {state}.\n"));
    }

    if game.object_is_container(object)
        && matches!(
            game.objects[object].openness,
            Openness::Open | Openness::WontClose
        )
    {
        let contents: Vec<usize> = (0..game.objects.len())
            .filter(|&other| game.objects[other].position == ObjectPosition::InObject(object))
            .collect();
        if contents.is_empty() {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is empty.\n");
        } else {
            filter.push("Inside ");
            filter.push(&game.object_name_the(object));
            filter.push(" is ");
            push_object_list(game, filter, &contents);
            filter.push(".\n");
        }
    }
    if game.object_is_surface(object) {
        let contents: Vec<usize> = (0..game.objects.len())
            .filter(|&other| game.objects[other].position == ObjectPosition::OnObject(object))
            .collect();
        if !contents.is_empty() {
            filter.push("On ");
            filter.push(&game.object_name_the(object));
            filter.push(" is ");
            push_object_list(game, filter, &contents);
            filter.push(".\n");
        }
    }
    true
}

fn push_object_list(game: &Gamestate, filter: &mut PrintFilter, objects: &[usize]) {
    for (index, &object) in objects.iter().enumerate() {
        if index > 0 {
            filter.push(if index + 1 == objects.len() { " and " } else { ", " });
        }
        filter.push(&game.object_name_with_article(object));
    }
}

fn cmd_examine_npc(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let npc = match resolve_npc(game, filter) {
        Resolved::One(npc) => npc,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.npcs[npc].in_room(game.playerroom) {
        filter.push("They are not here.\n");
        return true;
    }
    let description = game.bundle.entity_string("NPCs", npc, "Descr");
    if description.is_empty() {
        filter.push("You see nothing special about ");
        filter.push(game.npc_name(npc));
        filter.push(".\n");
    } else {
        filter.push(description);
        filter.push_char('\n');
    }
    true
}

fn cmd_read_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_is_readable(object) {
        filter.push("You can't read ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    let text = game.bundle.entity_string("Objects", object, "ReadText");
    if text.is_empty() {
        return cmd_examine_object_by_index(game, filter, object);
    }
    filter.push(text);
    filter.push_char('\n');
    true
}

/// Re-run examine against an already-resolved object.
fn cmd_examine_object_by_index(
    game: &mut Gamestate,
    filter: &mut PrintFilter,
    object: usize,
) -> bool {
    game.clear_references();
    game.object_references[object] = true;
    cmd_examine_object(game, filter)
}

fn cmd_give_object_npc(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let npc = match resolve_npc(game, filter) {
        Resolved::One(npc) => npc,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if game.objects[object].position != ObjectPosition::HeldByPlayer {
        filter.push("You don't have ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    filter.new_sentence();
    filter.push(game.npc_name(npc));
    filter.push(" doesn't seem interested in ");
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_wear_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if game.objects[object].position == ObjectPosition::WornByPlayer {
        filter.push("You are already wearing ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    if !game.object_is_wearable(object) {
        filter.push("You can't wear ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    if game.objects[object].position != ObjectPosition::HeldByPlayer {
        if !game.object_indirectly_in_room(object, game.playerroom) {
            filter.push("You don't see that here.\n");
            return true;
        }
        filter.push("(Picking up ");
        filter.push(&game.object_name_the(object));
        filter.push(" first)\n");
    }
    game.objects[object].position = ObjectPosition::WornByPlayer;
    game.objects[object].unmoved = false;
    filter.push(select_response(game, "You put on ", "I put on ", "%player% puts on "));
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_remove_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if game.objects[object].position != ObjectPosition::WornByPlayer {
        filter.push("You are not wearing ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    game.objects[object].position = ObjectPosition::HeldByPlayer;
    filter.push(select_response(game, "You remove ", "I remove ", "%player% removes "));
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_remove_all(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let worn: Vec<usize> = (0..game.objects.len())
        .filter(|&object| game.objects[object].position == ObjectPosition::WornByPlayer)
        .collect();
    if worn.is_empty() {
        filter.push("You are not wearing anything.\n");
        return true;
    }
    for object in worn {
        game.objects[object].position = ObjectPosition::HeldByPlayer;
        filter.push("You remove ");
        filter.push(&game.object_name_the(object));
        filter.push(".\n");
    }
    true
}

fn cmd_eat_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.object_is_edible(object) {
        filter.push("You can't eat ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    if game.objects[object].position != ObjectPosition::HeldByPlayer
        && !game.object_indirectly_in_room(object, game.playerroom)
    {
        filter.push("You don't see that here.\n");
        return true;
    }
    game.objects[object].position = ObjectPosition::Hidden;
    filter.push(select_response(game, "You eat ", "I eat ", "%player% eats "));
    filter.push(&game.object_name_the(object));
    filter.push(". Not bad at all.\n");
    true
}

fn cmd_posture_on_object(game: &mut Gamestate, filter: &mut PrintFilter, posture: i64) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    let suitable = if posture == 2 {
        game.object_is_lieable(object)
    } else {
        game.object_is_standable(object)
    };
    if !suitable {
        filter.push("You can't do that on ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    if !game.object_indirectly_in_room(object, game.playerroom) {
        filter.push("You don't see that here.\n");
        return true;
    }
    game.playerposition = posture;
    game.playerparent = object as i64;
    filter.push(match posture {
        0 => "You stand on ",
        1 => "You sit on ",
        _ => "You lie down on ",
    });
    filter.push(&game.object_name_the(object));
    filter.push(".\n");
    true
}

fn cmd_posture_on_floor(game: &mut Gamestate, filter: &mut PrintFilter, posture: i64) -> bool {
    if game.playerposition == posture && game.playerparent == -1 {
        filter.push(match posture {
            0 => "You are already standing!\n",
            1 => "You are already sitting down.\n",
            _ => "You are already lying down.\n",
        });
        return true;
    }
    game.playerposition = posture;
    game.playerparent = -1;
    filter.push(match posture {
        0 => "You stand up.\n",
        1 => "You sit down.\n",
        _ => "You lie down.\n",
    });
    true
}

fn cmd_ask_npc_about(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let npc = match resolve_npc(game, filter) {
        Resolved::One(npc) => npc,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.npcs[npc].in_room(game.playerroom) {
        filter.push("They are not here.\n");
        return true;
    }
    let subject_text = game.vars.ref_text().unwrap_or_default().to_lowercase();

    let topic_count = game.bundle.count(&["NPCs".into(), npc.into(), "Topics".into()]);
    for topic in 0..topic_count {
        let base: [Seg; 4] = ["NPCs".into(), npc.into(), "Topics".into(), topic.into()];
        let read = |game: &Gamestate, name: &'static str| -> String {
            let mut path = base.to_vec();
            path.push(name.into());
            game.bundle.string(&path).to_string()
        };

        let subject = read(game, "Subject").to_lowercase();
        let hit = subject
            .split(',')
            .any(|alternative| alternative.trim() == subject_text);
        if !hit {
            continue;
        }

        let mut path = base.to_vec();
        path.push("Task".into());
        let gating_task = game.bundle.integer(&path);
        let reply = if gating_task > 0 && game.tasks[gating_task as usize - 1].done {
            read(game, "AltReply")
        } else {
            read(game, "Reply")
        };
        if !reply.is_empty() {
            filter.push(&reply);
            filter.push_char('\n');
            return true;
        }
    }

    filter.new_sentence();
    filter.push(game.npc_name(npc));
    filter.push(" has nothing to say about that.\n");
    true
}

fn cmd_attack_npc(game: &mut Gamestate, filter: &mut PrintFilter, with_weapon: bool) -> bool {
    let npc = match resolve_npc(game, filter) {
        Resolved::One(npc) => npc,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.npcs[npc].in_room(game.playerroom) {
        filter.push("They are not here.\n");
        return true;
    }

    if with_weapon {
        let weapon = match resolve_object(game, filter) {
            Resolved::One(object) => object,
            Resolved::Ambiguous => return true,
            Resolved::Nothing => return false,
        };
        if game.objects[weapon].position != ObjectPosition::HeldByPlayer {
            filter.push("You are not holding ");
            filter.push(&game.object_name_the(weapon));
            filter.push(".\n");
            return true;
        }
        if !game.object_is_weapon(weapon) {
            filter.new_sentence();
            filter.push(&game.object_name_the(weapon));
            filter.push(" makes a poor weapon.\n");
            return true;
        }
    }

    filter.push("Attacking ");
    filter.push(game.npc_name(npc));
    filter.push(" would gain you nothing.\n");
    true
}

fn cmd_locate_object(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let object = match resolve_object(game, filter) {
        Resolved::One(object) => object,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.objects[object].seen {
        filter.push("You have no idea where ");
        filter.push(&game.object_name_the(object));
        filter.push(" might be.\n");
        return true;
    }
    if game.object_indirectly_held_by_player(object) {
        filter.push("You have ");
        filter.push(&game.object_name_the(object));
        filter.push("!\n");
        return true;
    }
    let located = (0..game.rooms.len()).find(|&room| game.object_indirectly_in_room(object, room));
    match located {
        Some(room) => {
            filter.new_sentence();
            filter.push(&game.object_name_the(object));
            filter.push(" is at ");
            filter.push(&room_name(game, room));
            filter.push(".\n");
        }
        None => {
            filter.push("You have no idea where ");
            filter.push(&game.object_name_the(object));
            filter.push(" might be.\n");
        }
    }
    true
}

fn cmd_locate_npc(game: &mut Gamestate, filter: &mut PrintFilter) -> bool {
    let npc = match resolve_npc(game, filter) {
        Resolved::One(npc) => npc,
        Resolved::Ambiguous => return true,
        Resolved::Nothing => return false,
    };
    if !game.npcs[npc].seen || game.npcs[npc].location <= 0 {
        filter.push("You have no idea where ");
        filter.push(game.npc_name(npc));
        filter.push(" might be.\n");
        return true;
    }
    let room = game.npcs[npc].location as usize - 1;
    filter.new_sentence();
    filter.push(game.npc_name(npc));
    filter.push(" is at ");
    filter.push(&room_name(game, room));
    filter.push(".\n");
    true
}

fn render_hints(game: &mut Gamestate, filter: &mut PrintFilter) {
    let mut offered = false;
    for index in 0..game.tasks.len() {
        if !task::can_run_task(game, index) || !task::has_hints(game, index) {
            continue;
        }
        offered = true;
        if let Some(question) = task::hint_question(game, index) {
            filter.push(&question);
            filter.push_char('\n');
        }
        if let Some(subtle) = task::hint_subtle(game, index) {
            filter.push("- ");
            filter.push(&subtle);
            filter.push_char('\n');
        }
        if let Some(unsubtle) = task::hint_unsubtle(game, index) {
            filter.push("- ");
            filter.push(&unsubtle);
            filter.push_char('\n');
        }
    }
    if !offered {
        filter.push("There are no hints available at the moment.\n");
    }
}

// ---------------------------------------------------------------------------
// Session-level command handlers (need the host)
// ---------------------------------------------------------------------------

impl<H: Host> Session<H> {
    fn cmd_save(&mut self) -> bool {
        self.game.is_admin = true;
        match crate::serial::save_game(&self.game) {
            Ok(payload) => match self.host.write_save(&payload) {
                Ok(()) => self.filter.push("Game saved.\n"),
                Err(err) => {
                    error!("save failed: {err:#}");
                    self.filter.push("The game could not be saved.\n");
                }
            },
            Err(err) => {
                error!("save failed: {err}");
                self.filter.push("The game could not be saved.\n");
            }
        }
        true
    }

    fn cmd_restore(&mut self) -> bool {
        self.game.is_admin = true;
        match self.host.read_save() {
            Ok(payload) => match crate::serial::restore_game(&mut self.game, &payload) {
                Ok(()) => {
                    // The loop finalizes the restore once the handlers
                    // unwind; nothing here may touch gamestate further.
                    self.game.do_restore = true;
                    self.game.is_running = false;
                }
                Err(err) => {
                    error!("restore failed: {err}");
                    self.filter.push("The saved game could not be restored.\n");
                }
            },
            Err(err) => {
                error!("restore failed: {err:#}");
                self.filter.push("The saved game could not be restored.\n");
            }
        }
        true
    }

    fn cmd_restart(&mut self) -> bool {
        self.game.is_admin = true;
        if self.host.confirm(ConfirmKind::Restart) {
            self.game.do_restart = true;
            self.game.is_running = false;
        }
        true
    }

    fn cmd_quit(&mut self) -> bool {
        self.game.is_admin = true;
        if self.host.confirm(ConfirmKind::Quit) {
            self.game.is_running = false;
        }
        true
    }

    fn cmd_undo(&mut self) -> bool {
        self.game.is_admin = true;
        if self.undo_turn() {
            self.filter.push("The previous turn has been undone.\n");
        } else {
            self.filter.push("There is nothing to undo!\n");
        }
        true
    }

    fn cmd_hints(&mut self) -> bool {
        self.game.is_admin = true;
        if self.host.confirm(ConfirmKind::ViewHints) {
            render_hints(&mut self.game, &mut self.filter);
        }
        true
    }

    fn cmd_debugger(&mut self) -> bool {
        self.game.is_admin = true;
        if self.debugger.is_enabled() {
            self.run_debugger_session();
        } else {
            self.filter.push("The debugger is not enabled.\n");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use std::rc::Rc;

    fn game_with(toml: &str) -> Gamestate {
        Gamestate::new(Rc::new(Bundle::from_toml_str(toml).unwrap()))
    }

    fn two_room_game() -> Gamestate {
        game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            Long = "A dank stone cell."
            [[Rooms.Exits]]
            Dest = 2
            [[Rooms]]
            Short = "Corridor"
            Long = "A narrow corridor."
            "#,
        )
    }

    #[test]
    fn go_moves_player_through_exit() {
        let mut game = two_room_game();
        let mut filter = PrintFilter::new();
        assert!(cmd_go(&mut game, &mut filter, 0));
        assert_eq!(game.playerroom, 1);
    }

    #[test]
    fn go_refuses_missing_exit() {
        let mut game = two_room_game();
        let mut filter = PrintFilter::new();
        assert!(cmd_go(&mut game, &mut filter, 1));
        assert_eq!(game.playerroom, 0);
    }

    #[test]
    fn exit_restriction_blocks_movement() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Rooms.Exits]]
            Dest = 2
            Var1 = 1
            Var2 = 0
            Var3 = 0
            [[Rooms]]
            Short = "Corridor"
            [[Tasks]]
            Command = ["press button"]
            "#,
        );
        let mut filter = PrintFilter::new();
        // Var2 0 requires the task done.
        assert!(!can_go(&game, 0, 0));
        assert!(cmd_go(&mut game, &mut filter, 0));
        assert_eq!(game.playerroom, 0);

        game.tasks[0].done = true;
        assert!(can_go(&game, 0, 0));
        assert!(cmd_go(&mut game, &mut filter, 0));
        assert_eq!(game.playerroom, 1);
    }

    #[test]
    fn room_name_uses_passing_alternate() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Dark Cave"
            [[Rooms.Alts]]
            Type = 0
            Var2 = 1
            Var3 = 0
            Changed = "Lit Cave"
            [[Tasks]]
            Command = ["light torch"]
            "#,
        );
        assert_eq!(room_name(&game, 0), "Dark Cave");
        game.tasks[0].done = true;
        assert_eq!(room_name(&game, 0), "Lit Cave");
    }

    #[test]
    fn update_status_strips_markup() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "<b>The Vault</b>"
            "#,
        );
        update_status(&mut game);
        assert_eq!(game.current_room_name.as_deref(), Some("The Vault"));
        assert!(game.status_line.is_none());
    }

    #[test]
    fn special_task_function_binds_dynamic_object() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Objects]]
            Short = "pebble"
            Static = false
            InitialPosition = 4
            Parent = 0
            "#,
        );
        assert!(run_special_task_function(
            &mut game,
            "# %object% = getdynfromroom (Cell)"
        ));
        assert_eq!(game.vars.ref_object(), Some(0));
        assert!(game.object_references[0]);

        assert!(!run_special_task_function(
            &mut game,
            "# %object% = getdynfromroom (Nowhere)"
        ));
        assert!(!run_special_task_function(&mut game, "#frobnicate(Cell)"));
    }

    #[test]
    fn select_response_follows_perspective() {
        let game = game_with(
            r#"
            [Globals]
            Perspective = 1
            "#,
        );
        assert_eq!(select_response(&game, "second", "first", "third"), "first");
    }
}
