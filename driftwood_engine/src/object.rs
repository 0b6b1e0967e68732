//! Object model queries: containment, visibility, sizes and weights.
//!
//! All queries here are pure reads over the bundle and gamestate. Static
//! objects are placed by their authored room lists unless an event has
//! force-moved them; dynamic objects live wherever their position says.
//! Size and weight decode the packed `SizeWeight` digit pair, where each
//! exponent step multiplies the base value by three.

use log::trace;

use crate::bundle::Seg;
use crate::state::{Gamestate, ObjectPosition, Openness};

/// Room list selector values used by `Where/Type` properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomListKind {
    NoRooms,
    OneRoom,
    SomeRooms,
    AllRooms,
    NpcPart,
}

impl RoomListKind {
    pub fn from_wire(value: i64) -> RoomListKind {
        match value {
            0 => RoomListKind::NoRooms,
            1 => RoomListKind::OneRoom,
            2 => RoomListKind::SomeRooms,
            3 => RoomListKind::AllRooms,
            4 => RoomListKind::NpcPart,
            other => panic!("room list: unknown selector {other}"),
        }
    }
}

/// Whether the `Where` node at `base` selects the given room. `NpcPart`
/// never selects a room here; callers that care resolve the parent NPC.
pub fn roomlist_selects(game: &Gamestate, base: &[Seg], room: usize) -> bool {
    let mut path = base.to_vec();
    path.push("Type".into());
    match RoomListKind::from_wire(game.bundle.integer(&path)) {
        RoomListKind::NoRooms | RoomListKind::NpcPart => false,
        RoomListKind::AllRooms => true,
        RoomListKind::OneRoom => {
            path.pop();
            path.push("Room".into());
            game.bundle.integer(&path) == room as i64 + 1
        }
        RoomListKind::SomeRooms => {
            path.pop();
            path.push("Rooms".into());
            path.push((room + 1).into());
            game.bundle.boolean(&path)
        }
    }
}

const SIZE_WEIGHT_DIVISOR: i64 = 10;
const DIMENSION_MULTIPLE: i64 = 3;

/// 3^exponent scaling used by sizes, weights, and carry limits.
fn scaled(base: i64, exponent: i64) -> i64 {
    let mut value = base;
    for _ in 0..exponent {
        value *= DIMENSION_MULTIPLE;
    }
    value
}

impl Gamestate {
    pub fn object_is_static(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Static")
    }

    pub fn object_is_container(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Container")
    }

    pub fn object_is_surface(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Surface")
    }

    pub fn object_is_openable(&self, object: usize) -> bool {
        self.bundle.entity_integer("Objects", object, "Openable") != 0
    }

    /// Key object index for a lockable object, or None.
    pub fn object_key(&self, object: usize) -> Option<usize> {
        let key = self
            .bundle
            .integer_or(&["Objects".into(), object.into(), "Key".into()], -1);
        (key >= 0).then(|| key as usize)
    }

    pub fn object_is_stateful(&self, object: usize) -> bool {
        self.object_is_openable(object)
            || self.bundle.entity_integer("Objects", object, "CurrentState") != 0
    }

    pub fn object_is_wearable(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Wearable")
    }

    pub fn object_is_edible(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Edible")
    }

    pub fn object_is_readable(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Readable")
    }

    pub fn object_is_weapon(&self, object: usize) -> bool {
        self.bundle.entity_boolean("Objects", object, "Weapon")
    }

    pub fn object_is_standable(&self, object: usize) -> bool {
        self.bundle.entity_integer("Objects", object, "SitLie") & 0x01 != 0
    }

    pub fn object_is_lieable(&self, object: usize) -> bool {
        self.bundle.entity_integer("Objects", object, "SitLie") & 0x02 != 0
    }

    /// Index of the n'th object satisfying a predicate, counting from 0.
    fn nth_object(&self, n: usize, pred: impl Fn(&Gamestate, usize) -> bool) -> usize {
        let mut remaining = n as i64;
        for object in 0..self.bundle.entity_count("Objects") {
            if pred(self, object) {
                remaining -= 1;
                if remaining < 0 {
                    return object;
                }
            }
        }
        panic!("object enumeration: index {n} out of range");
    }

    /// Position of `object` within the objects satisfying a predicate.
    fn object_index(&self, object: usize, pred: impl Fn(&Gamestate, usize) -> bool) -> usize {
        (0..object).filter(|&other| pred(self, other)).count()
    }

    pub fn nth_container_object(&self, n: usize) -> usize {
        self.nth_object(n, Gamestate::object_is_container)
    }

    pub fn container_index_of(&self, object: usize) -> usize {
        self.object_index(object, Gamestate::object_is_container)
    }

    pub fn nth_surface_object(&self, n: usize) -> usize {
        self.nth_object(n, Gamestate::object_is_surface)
    }

    pub fn surface_index_of(&self, object: usize) -> usize {
        self.object_index(object, Gamestate::object_is_surface)
    }

    pub fn nth_stateful_object(&self, n: usize) -> usize {
        self.nth_object(n, Gamestate::object_is_stateful)
    }

    pub fn stateful_index_of(&self, object: usize) -> usize {
        self.object_index(object, Gamestate::object_is_stateful)
    }

    pub fn nth_dynamic_object(&self, n: usize) -> usize {
        self.nth_object(n, |game, object| !game.object_is_static(object))
    }

    pub fn dynamic_index_of(&self, object: usize) -> usize {
        self.object_index(object, |game, other| !game.object_is_static(other))
    }

    pub fn nth_standable_object(&self, n: usize) -> usize {
        self.nth_object(n, Gamestate::object_is_standable)
    }

    pub fn nth_lieable_object(&self, n: usize) -> usize {
        self.nth_object(n, Gamestate::object_is_lieable)
    }

    /// Name of the object's current state, selected from the `|`-delimited
    /// `States` property. State indices are 1-based; None when the index
    /// is out of range.
    pub fn object_state_name(&self, object: usize) -> Option<String> {
        let state = self.objects[object].state;
        if state < 1 {
            return None;
        }
        let states = self.bundle.entity_string("Objects", object, "States");
        states
            .split('|')
            .nth(state as usize - 1)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
    }

    /// Relative size. Static objects have no size.
    pub fn object_size(&self, object: usize) -> i64 {
        if self.object_is_static(object) {
            return 0;
        }
        let packed = self.bundle.entity_integer("Objects", object, "SizeWeight");
        scaled(1, packed / SIZE_WEIGHT_DIVISOR)
    }

    /// Relative weight. Containers and surfaces add the weights of the
    /// objects they carry; the recursion is bounded by containment
    /// acyclicity. Static objects have no weight.
    pub fn object_weight(&self, object: usize) -> i64 {
        if self.object_is_static(object) {
            return 0;
        }
        let packed = self.bundle.entity_integer("Objects", object, "SizeWeight");
        let mut weight = scaled(1, packed % SIZE_WEIGHT_DIVISOR);

        if self.object_is_container(object) || self.object_is_surface(object) {
            for other in 0..self.objects.len() {
                match self.objects[other].position {
                    ObjectPosition::InObject(parent) | ObjectPosition::OnObject(parent)
                        if parent == object =>
                    {
                        weight += self.object_weight(other);
                    }
                    _ => {}
                }
            }
        }
        trace!("object {object} weighs {weight}");
        weight
    }

    /// Largest object size this container accepts.
    pub fn container_maxsize(&self, object: usize) -> i64 {
        let packed = self.bundle.entity_integer("Objects", object, "Capacity");
        scaled(1, packed % SIZE_WEIGHT_DIVISOR)
    }

    /// How many objects of that size fit.
    pub fn container_capacity(&self, object: usize) -> i64 {
        self.bundle.entity_integer("Objects", object, "Capacity") / SIZE_WEIGHT_DIVISOR
    }

    /// Maximum total weight the player can carry (`Globals/MaxWt`).
    pub fn player_max_weight(&self) -> i64 {
        let packed = self.bundle.global_integer("MaxWt");
        scaled(packed / SIZE_WEIGHT_DIVISOR, packed % SIZE_WEIGHT_DIVISOR)
    }

    /// Maximum total size the player can carry (`Globals/MaxSize`).
    pub fn player_max_size(&self) -> i64 {
        let packed = self.bundle.global_integer("MaxSize");
        scaled(packed / SIZE_WEIGHT_DIVISOR, packed % SIZE_WEIGHT_DIVISOR)
    }

    /// True if the object sits on the floor of the given room.
    pub fn object_directly_in_room(&self, object: usize, room: usize) -> bool {
        if self.object_is_static(object) {
            // An event may have force-moved the static object.
            match self.objects[object].position {
                ObjectPosition::InRoom(at) => return at == room,
                ObjectPosition::HeldByPlayer => return false,
                ObjectPosition::Hidden => {}
                _ => return false,
            }
            roomlist_selects(self, &["Objects".into(), object.into(), "Where".into()], room)
        } else {
            self.objects[object].position == ObjectPosition::InRoom(room)
        }
    }

    /// True if the object is in the room directly, on a surface there, in
    /// an open container there, or carried by a character who is there.
    pub fn object_indirectly_in_room(&self, object: usize, room: usize) -> bool {
        if self.object_is_static(object) {
            match self.objects[object].position {
                ObjectPosition::InRoom(at) => return at == room,
                ObjectPosition::HeldByPlayer => return self.player_in_room(room),
                ObjectPosition::Hidden => {}
                _ => return false,
            }
            let base: [Seg; 3] = ["Objects".into(), object.into(), "Where".into()];
            let kind = RoomListKind::from_wire(
                self.bundle
                    .integer(&["Objects".into(), object.into(), "Where".into(), "Type".into()]),
            );
            if kind == RoomListKind::NpcPart {
                let parent = self.bundle.entity_integer("Objects", object, "Parent");
                if parent == 0 {
                    return self.player_in_room(room);
                }
                return self.npcs[parent as usize - 1].in_room(room);
            }
            roomlist_selects(self, &base, room)
        } else {
            match self.objects[object].position {
                ObjectPosition::Hidden => false,
                ObjectPosition::HeldByPlayer
                | ObjectPosition::WornByPlayer
                | ObjectPosition::PartOfPlayer => self.player_in_room(room),
                ObjectPosition::HeldByNpc(npc)
                | ObjectPosition::WornByNpc(npc)
                | ObjectPosition::PartOfNpc(npc) => self.npcs[npc].in_room(room),
                ObjectPosition::InObject(parent) => match self.objects[parent].openness {
                    Openness::WontClose | Openness::Open => {
                        self.object_indirectly_in_room(parent, room)
                    }
                    _ => false,
                },
                ObjectPosition::OnObject(parent) => self.object_indirectly_in_room(parent, room),
                ObjectPosition::InRoom(at) => at == room,
            }
        }
    }

    /// True if the object is held or worn by the player, directly or via
    /// carried surfaces and open carried containers.
    pub fn object_indirectly_held_by_player(&self, object: usize) -> bool {
        if self.object_is_static(object) {
            return false;
        }
        match self.objects[object].position {
            ObjectPosition::HeldByPlayer | ObjectPosition::WornByPlayer => true,
            ObjectPosition::InObject(parent) => match self.objects[parent].openness {
                Openness::WontClose | Openness::Open => {
                    self.object_indirectly_held_by_player(parent)
                }
                _ => false,
            },
            ObjectPosition::OnObject(parent) => self.object_indirectly_held_by_player(parent),
            _ => false,
        }
    }

    /// Would moving `object` into or onto `parent` create a containment
    /// cycle? Follows parent links from `parent` back toward `object`.
    pub fn containment_would_cycle(&self, object: usize, parent: usize) -> bool {
        let mut current = parent;
        loop {
            if current == object {
                return true;
            }
            match self.objects[current].position {
                ObjectPosition::InObject(next) | ObjectPosition::OnObject(next) => current = next,
                _ => return false,
            }
        }
    }

    /// Should this object be listed with its initial room description?
    pub fn object_shows_initial_description(&self, object: usize) -> bool {
        match self.bundle.entity_integer("Objects", object, "OnlyWhenNotMoved") {
            0 => true,
            1 => self.objects[object].unmoved,
            2 => {
                if self.objects[object].unmoved {
                    return true;
                }
                let initial =
                    self.bundle.entity_integer("Objects", object, "InitialPosition") - 3;
                self.objects[object].position.to_wire().0 == initial
            }
            _ => false,
        }
    }

    /// Per-turn update: mark visible objects seen, held objects moved.
    pub fn object_turn_update(&mut self) {
        for object in 0..self.objects.len() {
            if self.object_indirectly_in_room(object, self.playerroom) {
                self.objects[object].seen = true;
            }
            if self.objects[object].position == ObjectPosition::HeldByPlayer {
                self.objects[object].unmoved = false;
            }
        }
    }

    /// Initial seen states, applied once at game start.
    pub fn object_setup_initial(&mut self) {
        self.object_turn_update();
    }

    /// "a brass key" -- prefix plus short name, with "a " when the prefix
    /// is empty.
    pub fn object_name_with_article(&self, object: usize) -> String {
        let prefix = self.bundle.entity_string("Objects", object, "Prefix");
        let short = self.bundle.entity_string("Objects", object, "Short");
        if prefix.is_empty() {
            format!("a {short}")
        } else {
            format!("{prefix} {short}")
        }
    }

    /// "the brass key" -- leading articles in the prefix and name are
    /// normalized to a single "the".
    pub fn object_name_the(&self, object: usize) -> String {
        let prefix = self.bundle.entity_string("Objects", object, "Prefix");
        let short = self.bundle.entity_string("Objects", object, "Short");

        let stripped_prefix = strip_leading_article(prefix);
        let stripped_name = strip_leading_article(short);

        let mut text = String::from("the");
        if stripped_prefix.is_empty() {
            text.push(' ');
        } else {
            text.push(' ');
            text.push_str(stripped_prefix);
            text.push(' ');
        }
        text.push_str(stripped_name);
        text
    }
}

/// Drop one leading "a"/"an"/"the"/"some" word, if present.
pub fn strip_leading_article(text: &str) -> &str {
    for article in ["a ", "an ", "the ", "some "] {
        if let Some(head) = text.get(..article.len())
            && head.eq_ignore_ascii_case(article)
        {
            return text[article.len()..].trim_start();
        }
    }
    for article in ["a", "an", "the", "some"] {
        if text.eq_ignore_ascii_case(article) {
            return "";
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Bundle;
    use std::rc::Rc;

    fn game_with(toml: &str) -> Gamestate {
        let bundle = Bundle::from_toml_str(toml).expect("fixture should parse");
        Gamestate::new(Rc::new(bundle))
    }

    fn fixture() -> Gamestate {
        game_with(
            r#"
            [Header]
            StartRoom = 0

            [[Rooms]]
            Short = "Cell"

            [[Rooms]]
            Short = "Corridor"

            [[Objects]]
            Short = "chest"
            Prefix = "an iron"
            Static = false
            Container = true
            Openable = 5
            SizeWeight = 22
            Capacity = 31
            InitialPosition = 4
            Parent = 0

            [[Objects]]
            Short = "coin"
            Prefix = "a gold"
            Static = false
            SizeWeight = 0
            InitialPosition = 2
            Parent = 0

            [[Objects]]
            Short = "altar"
            Static = true
            Surface = true
            [Objects.Where]
            Type = 1
            Room = 2
            "#,
        )
    }

    #[test]
    fn predicates_read_properties() {
        let game = fixture();
        assert!(game.object_is_container(0));
        assert!(!game.object_is_container(1));
        assert!(game.object_is_static(2));
        assert!(game.object_is_surface(2));
        assert!(game.object_is_openable(0));
    }

    #[test]
    fn enumeration_and_inverse_agree() {
        let game = fixture();
        assert_eq!(game.nth_container_object(0), 0);
        assert_eq!(game.container_index_of(0), 0);
        assert_eq!(game.nth_surface_object(0), 2);
        assert_eq!(game.surface_index_of(2), 0);
        assert_eq!(game.nth_dynamic_object(0), 0);
        assert_eq!(game.nth_dynamic_object(1), 1);
    }

    #[test]
    fn size_weight_decode() {
        let game = fixture();
        // SizeWeight 22: size 3^2 = 9, own weight 3^2 = 9.
        assert_eq!(game.object_size(0), 9);
        // Chest carries the weight of the coin (3^0 = 1).
        assert_eq!(game.object_weight(0), 10);
        // Static objects are weightless and sizeless.
        assert_eq!(game.object_weight(2), 0);
        assert_eq!(game.object_size(2), 0);
    }

    #[test]
    fn capacity_decode() {
        let game = fixture();
        // Capacity 31: three objects of up to size 3^1.
        assert_eq!(game.container_capacity(0), 3);
        assert_eq!(game.container_maxsize(0), 3);
    }

    #[test]
    fn initial_positions_applied() {
        let game = fixture();
        assert_eq!(game.objects[0].position, ObjectPosition::InRoom(0));
        assert_eq!(game.objects[1].position, ObjectPosition::InObject(0));
        assert_eq!(game.objects[2].position, ObjectPosition::Hidden);
    }

    #[test]
    fn directly_in_room_static_and_dynamic() {
        let game = fixture();
        assert!(game.object_directly_in_room(0, 0));
        assert!(!game.object_directly_in_room(0, 1));
        // Static altar authored into room index 1 via Where/OneRoom.
        assert!(game.object_directly_in_room(2, 1));
        assert!(!game.object_directly_in_room(2, 0));
    }

    #[test]
    fn indirectly_in_room_follows_open_containers() {
        let mut game = fixture();
        assert!(game.object_indirectly_in_room(1, 0));
        game.objects[0].openness = Openness::Closed;
        assert!(!game.object_indirectly_in_room(1, 0));
        game.objects[0].openness = Openness::Open;
        assert!(game.object_indirectly_in_room(1, 0));
    }

    #[test]
    fn indirectly_held_follows_carried_containers() {
        let mut game = fixture();
        assert!(!game.object_indirectly_held_by_player(1));
        game.objects[0].position = ObjectPosition::HeldByPlayer;
        assert!(game.object_indirectly_held_by_player(1));
        game.objects[0].openness = Openness::Closed;
        assert!(!game.object_indirectly_held_by_player(1));
    }

    #[test]
    fn containment_cycle_detected() {
        let mut game = fixture();
        // Coin is in the chest; chest into the coin would cycle.
        assert!(game.containment_would_cycle(0, 1));
        assert!(!game.containment_would_cycle(1, 0));
        game.objects[1].position = ObjectPosition::InRoom(0);
        assert!(!game.containment_would_cycle(0, 1));
    }

    #[test]
    fn turn_update_sets_seen_and_unmoved() {
        let mut game = fixture();
        game.object_turn_update();
        assert!(game.objects[0].seen);
        game.objects[1].position = ObjectPosition::HeldByPlayer;
        game.objects[1].unmoved = true;
        game.object_turn_update();
        assert!(!game.objects[1].unmoved);
    }

    #[test]
    fn display_names() {
        let game = fixture();
        assert_eq!(game.object_name_with_article(0), "an iron chest");
        assert_eq!(game.object_name_the(0), "the iron chest");
        assert_eq!(game.object_name_the(1), "the gold coin");
        assert_eq!(game.object_name_with_article(2), "a altar");
    }

    #[test]
    fn strip_article_variants() {
        assert_eq!(strip_leading_article("a brass key"), "brass key");
        assert_eq!(strip_leading_article("an iron"), "iron");
        assert_eq!(strip_leading_article("the old man"), "old man");
        assert_eq!(strip_leading_article("some coins"), "coins");
        assert_eq!(strip_leading_article("sword"), "sword");
        assert_eq!(strip_leading_article("the"), "");
        assert_eq!(strip_leading_article("anchor"), "anchor");
    }

    #[test]
    fn state_name_selects_from_list() {
        let mut game = game_with(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Cell"
            [[Objects]]
            Short = "lever"
            Static = false
            States = "up|down|stuck"
            CurrentState = 1
            InitialPosition = 4
            Parent = 0
            "#,
        );
        assert_eq!(game.object_state_name(0).as_deref(), Some("up"));
        game.objects[0].state = 3;
        assert_eq!(game.object_state_name(0).as_deref(), Some("stuck"));
        game.objects[0].state = 7;
        assert_eq!(game.object_state_name(0), None);
    }
}
