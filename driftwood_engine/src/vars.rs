//! User variables, system variables, and reference memory.
//!
//! User-defined variables are a typed name/value map seeded from the
//! bundle's `Variables` group. On lookup misses the store synthesizes
//! values from a closed set of system names (`%turns%`, `%theobject%`,
//! `%in_<objref>%`, ...) that pull from live gamestate. The store also
//! remembers the most recent referenced object, NPC, number and text,
//! which back pronoun resolution and restriction evaluation.

use std::collections::HashMap;
use std::time::Instant;

use log::{error, info};

use crate::ADRIFT_EMULATION;
use crate::bundle::{Bundle, Prop};
use crate::pattern;
use crate::state::Gamestate;

/// A typed variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Integer(i64),
    String(String),
}

impl VarValue {
    pub fn render(&self) -> String {
        match self {
            VarValue::Integer(value) => value.to_string(),
            VarValue::String(text) => text.clone(),
        }
    }
}

/// Numbers zero through twenty spelled out, for `%t_...%` renderings.
const NUMBER_NAMES: [&str; 21] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen",
    "nineteen", "twenty",
];

/// Render an integer as English for 0..=20, digits otherwise.
pub fn number_name(value: i64) -> String {
    if (0..=20).contains(&value) {
        NUMBER_NAMES[value as usize].to_string()
    } else {
        value.to_string()
    }
}

/// The variable store. One per gamestate; snapshots carry their own copy.
#[derive(Debug, Clone)]
pub struct VarStore {
    user: HashMap<String, VarValue>,
    ref_object: Option<usize>,
    ref_character: Option<usize>,
    ref_number: i64,
    number_referenced: bool,
    ref_text: Option<String>,
    started: Instant,
    time_offset: u64,
}

impl VarStore {
    /// Create a store seeded with the bundle's `Variables` group.
    pub fn from_bundle(bundle: &Bundle) -> VarStore {
        let mut store = VarStore {
            user: HashMap::new(),
            ref_object: None,
            ref_character: None,
            ref_number: 0,
            number_referenced: false,
            ref_text: None,
            started: Instant::now(),
            time_offset: 0,
        };

        for index in 0..bundle.entity_count("Variables") {
            let name = bundle.entity_string("Variables", index, "Name").to_string();
            let var_type = bundle.entity_integer("Variables", index, "Type");
            let value_prop = bundle.get(&["Variables".into(), index.into(), "Value".into()]);
            match var_type {
                0 => {
                    let value = match value_prop {
                        Some(Prop::Integer(n)) => *n,
                        Some(Prop::String(text)) => text.trim().parse().unwrap_or_else(|_| {
                            error!("variable {index}: invalid numeric initial value {text:?}");
                            0
                        }),
                        _ => 0,
                    };
                    store.put(&name, VarValue::Integer(value));
                }
                1 => {
                    let value = match value_prop {
                        Some(Prop::String(text)) => text.clone(),
                        _ => String::new(),
                    };
                    store.put(&name, VarValue::String(value));
                }
                other => panic!("variable {index}: unknown type {other}"),
            }
        }
        store
    }

    /// Create or update a variable. Changing an existing variable's type
    /// indicates corrupt game data and aborts.
    pub fn put(&mut self, name: &str, value: VarValue) {
        if let Some(existing) = self.user.get(name) {
            let same_type = matches!(
                (existing, &value),
                (VarValue::Integer(_), VarValue::Integer(_))
                    | (VarValue::String(_), VarValue::String(_))
            );
            assert!(same_type, "variable {name}: type changed");
        }
        info!("variable %{name}% = {}", value.render());
        self.user.insert(name.to_string(), value);
    }

    pub fn put_integer(&mut self, name: &str, value: i64) {
        self.put(name, VarValue::Integer(value));
    }

    pub fn put_string(&mut self, name: &str, value: &str) {
        self.put(name, VarValue::String(value.to_string()));
    }

    /// Look up a user-defined variable only; system names miss here.
    pub fn user_variable(&self, name: &str) -> Option<&VarValue> {
        self.user.get(name)
    }

    /// Iterate user variables, sorted by name for deterministic output.
    pub fn sorted(&self) -> Vec<(&str, &VarValue)> {
        let mut entries: Vec<_> = self.user.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }

    pub fn set_ref_object(&mut self, object: usize) {
        self.ref_object = Some(object);
    }

    pub fn ref_object(&self) -> Option<usize> {
        self.ref_object
    }

    pub fn restore_ref_object(&mut self, saved: Option<usize>) {
        self.ref_object = saved;
    }

    pub fn set_ref_character(&mut self, npc: usize) {
        self.ref_character = Some(npc);
    }

    pub fn ref_character(&self) -> Option<usize> {
        self.ref_character
    }

    pub fn set_ref_number(&mut self, number: i64) {
        self.ref_number = number;
        self.number_referenced = true;
    }

    /// The referenced number; 0 until one has been set.
    pub fn ref_number(&self) -> i64 {
        self.ref_number
    }

    pub fn number_referenced(&self) -> bool {
        self.number_referenced
    }

    pub fn set_ref_text(&mut self, text: &str) {
        self.ref_text = Some(text.to_string());
    }

    pub fn ref_text(&self) -> Option<&str> {
        self.ref_text.as_deref()
    }

    /// Wall-clock seconds since game start, plus any restored offset.
    pub fn elapsed_seconds(&self) -> u64 {
        self.started.elapsed().as_secs() + self.time_offset
    }

    /// Reset the clock base, used when restoring a saved game.
    pub fn set_elapsed_seconds(&mut self, seconds: u64) {
        self.started = Instant::now();
        self.time_offset = seconds;
    }
}

impl Gamestate {
    /// Resolve a `%name%` variable: user-defined first, then the system
    /// set. `None` means no such variable; callers expanding text treat
    /// that as an empty string.
    pub fn variable(&mut self, name: &str) -> Option<VarValue> {
        if let Some(value) = self.vars.user_variable(name) {
            return Some(value.clone());
        }
        self.system_variable(name)
    }

    /// Integer variable read; missing or mistyped names are fatal.
    pub fn integer_variable(&mut self, name: &str) -> i64 {
        match self.variable(name) {
            Some(VarValue::Integer(value)) => value,
            Some(VarValue::String(_)) => panic!("variable {name}: not an integer"),
            None => panic!("variable {name}: no such variable"),
        }
    }

    /// String variable read; missing or mistyped names are fatal.
    pub fn string_variable(&mut self, name: &str) -> String {
        match self.variable(name) {
            Some(VarValue::String(value)) => value,
            Some(VarValue::Integer(_)) => panic!("variable {name}: not a string"),
            None => panic!("variable {name}: no such variable"),
        }
    }

    /// Synthesize one of the closed set of system variables.
    #[allow(clippy::too_many_lines)]
    fn system_variable(&mut self, name: &str) -> Option<VarValue> {
        let bundle = self.bundle.clone();
        let value = match name {
            "author" => {
                let author = bundle.global_string("GameAuthor");
                VarValue::String(if author.is_empty() {
                    "[Author unknown]".to_string()
                } else {
                    author.to_string()
                })
            }
            "character" => match self.vars.ref_character() {
                Some(npc) => {
                    let npc_name = bundle.entity_string("NPCs", npc, "Name");
                    VarValue::String(if npc_name.is_empty() {
                        "[Character unknown]".to_string()
                    } else {
                        npc_name.to_string()
                    })
                }
                None => {
                    error!("variable %{name}%: no referenced character yet");
                    VarValue::String("[Character unknown]".to_string())
                }
            },
            "heshe" | "himher" => match self.vars.ref_character() {
                Some(npc) => {
                    let gender = bundle.entity_integer("NPCs", npc, "Gender");
                    let word = match gender {
                        0 => {
                            if name == "heshe" {
                                "he"
                            } else {
                                "him"
                            }
                        }
                        1 => {
                            if name == "heshe" {
                                "she"
                            } else {
                                "her"
                            }
                        }
                        2 => "it",
                        other => {
                            error!("variable %{name}%: unknown gender {other}");
                            "[Gender unknown]"
                        }
                    };
                    VarValue::String(word.to_string())
                }
                None => {
                    error!("variable %{name}%: no referenced character yet");
                    VarValue::String("[Gender unknown]".to_string())
                }
            },
            "maxscore" => VarValue::Integer(bundle.global_integer("MaxScore")),
            "modified" => {
                let date = bundle.string(&["CompileDate".into()]);
                VarValue::String(if date.is_empty() {
                    "[Modified unknown]".to_string()
                } else {
                    date.to_string()
                })
            }
            "number" => {
                if !self.vars.number_referenced() {
                    error!("variable %number%: no referenced number yet");
                }
                VarValue::Integer(self.vars.ref_number())
            }
            "object" => match self.vars.ref_object() {
                Some(object) => VarValue::String(self.object_name_with_article(object)),
                None => {
                    error!("variable %object%: no referenced object yet");
                    VarValue::String("[Object unknown]".to_string())
                }
            },
            "theobject" => match self.vars.ref_object() {
                Some(object) => VarValue::String(self.object_name_the(object)),
                None => {
                    error!("variable %theobject%: no referenced object yet");
                    VarValue::String("[Object unknown]".to_string())
                }
            },
            "obstate" => match self.vars.ref_object() {
                Some(object) => VarValue::String(self.object_state_text(object)),
                None => {
                    error!("variable %obstate%: no referenced object yet");
                    VarValue::String("[Obstate unavailable]".to_string())
                }
            },
            "obstatus" => match self.vars.ref_object() {
                Some(object) => VarValue::String(self.object_status_text(object)),
                None => {
                    error!("variable %obstatus%: no referenced object yet");
                    VarValue::String("[Obstatus unavailable]".to_string())
                }
            },
            "player" => {
                let player = bundle.global_string("PlayerName");
                VarValue::String(if player.is_empty() {
                    "Player".to_string()
                } else {
                    player.to_string()
                })
            }
            "room" => VarValue::String(crate::command::room_name(self, self.playerroom)),
            "score" => VarValue::Integer(self.score),
            "t_number" => {
                if self.vars.number_referenced() {
                    VarValue::String(number_name(self.vars.ref_number()))
                } else {
                    error!("variable %t_number%: no referenced number yet");
                    VarValue::String("[Number unknown]".to_string())
                }
            }
            "text" => match self.vars.ref_text() {
                Some(text) => VarValue::String(text.to_string()),
                None => {
                    error!("variable %text%: no text yet to reference");
                    VarValue::String("[Text unknown]".to_string())
                }
            },
            "time" => VarValue::Integer(self.vars.elapsed_seconds() as i64),
            "title" => {
                let title = bundle.global_string("GameName");
                VarValue::String(if title.is_empty() {
                    "[Title unknown]".to_string()
                } else {
                    title.to_string()
                })
            }
            "turns" => VarValue::Integer(self.turns as i64),
            "version" => VarValue::Integer(ADRIFT_EMULATION),
            _ => {
                if let Some(objref) = name.strip_prefix("in_") {
                    VarValue::String(self.with_bound_object(objref, "in_", |game, object| {
                        list_objects_in(game, object)
                    }))
                } else if let Some(objref) = name.strip_prefix("onin_") {
                    VarValue::String(self.with_bound_object(objref, "onin_", |game, object| {
                        let on = list_objects_on(game, object);
                        let within = list_objects_in(game, object);
                        join_listings(&on, &within)
                    }))
                } else if let Some(objref) = name.strip_prefix("on_") {
                    VarValue::String(self.with_bound_object(objref, "on_", |game, object| {
                        list_objects_on(game, object)
                    }))
                } else if let Some(objref) = name.strip_prefix("state_") {
                    VarValue::String(self.with_bound_object(objref, "state_", |game, object| {
                        game.object_state_text(object)
                    }))
                } else if let Some(objref) = name.strip_prefix("status_") {
                    VarValue::String(self.with_bound_object(objref, "status_", |game, object| {
                        game.object_status_text(object)
                    }))
                } else if let Some(varname) = name.strip_prefix("t_") {
                    match self.vars.user_variable(varname) {
                        Some(VarValue::Integer(value)) => VarValue::String(number_name(*value)),
                        Some(VarValue::String(text)) => {
                            error!("variable %{name}%: {varname} is not an integer variable");
                            VarValue::String(text.clone())
                        }
                        None => {
                            error!("variable %{name}%: no such variable {varname}");
                            VarValue::String("[Unknown variable]".to_string())
                        }
                    }
                } else {
                    return None;
                }
            }
        };
        Some(value)
    }

    /// Run the parser against `%object%` and the given object reference,
    /// apply `body` with the bound object, then restore the previously
    /// referenced object.
    fn with_bound_object(
        &mut self,
        objref: &str,
        prefix: &str,
        body: impl FnOnce(&mut Gamestate, usize) -> String,
    ) -> String {
        let saved = self.vars.ref_object();
        let result = if pattern::match_pattern("%object%", objref, self) {
            match self.vars.ref_object() {
                Some(object) => body(self, object),
                None => {
                    error!("variable %{prefix}...%: ambiguous object {objref:?}");
                    format!("[{prefix} unavailable]")
                }
            }
        } else {
            error!("variable %{prefix}...%: invalid object {objref:?}");
            format!("[{prefix} unavailable]")
        };
        self.vars.restore_ref_object(saved);
        result
    }

    /// The `%obstate%` rendering: current state name of a stateful object.
    fn object_state_text(&self, object: usize) -> String {
        if self.bundle.entity_integer("Objects", object, "CurrentState") == 0 {
            error!("variable: object {object} is stateless");
            return "[Obstate unavailable]".to_string();
        }
        match self.object_state_name(object) {
            Some(state) => state,
            None => {
                error!("variable: object {object} has an invalid state");
                "[Obstate unknown]".to_string()
            }
        }
    }

    /// The `%obstatus%` rendering: open, closed, or locked.
    fn object_status_text(&self, object: usize) -> String {
        use crate::state::Openness;
        if self.bundle.entity_integer("Objects", object, "Openable") == 0 {
            error!("variable: object {object} is not openable");
            return "[Obstatus unavailable]".to_string();
        }
        match self.objects[object].openness {
            Openness::Open => "open".to_string(),
            Openness::Closed => "closed".to_string(),
            Openness::Locked => "locked".to_string(),
            Openness::WontClose => "[Obstatus unknown]".to_string(),
        }
    }
}

/// "Inside the chest is a coin, a ring and a gem." Empty when nothing is.
fn list_objects_in(game: &Gamestate, object: usize) -> String {
    let contents: Vec<usize> = (0..game.objects.len())
        .filter(|&other| {
            game.objects[other].position == crate::state::ObjectPosition::InObject(object)
        })
        .collect();
    render_listing(game, object, &contents, "Inside ")
}

/// "On the table is a lamp." Empty when nothing is.
fn list_objects_on(game: &Gamestate, object: usize) -> String {
    let contents: Vec<usize> = (0..game.objects.len())
        .filter(|&other| {
            game.objects[other].position == crate::state::ObjectPosition::OnObject(object)
        })
        .collect();
    render_listing(game, object, &contents, "On ")
}

fn render_listing(game: &Gamestate, object: usize, contents: &[usize], lead: &str) -> String {
    if contents.is_empty() {
        return String::new();
    }
    let mut text = format!("{lead}{} is ", game.object_name_the(object));
    for (index, &item) in contents.iter().enumerate() {
        if index > 0 {
            if index + 1 == contents.len() {
                text.push_str(" and ");
            } else {
                text.push_str(", ");
            }
        }
        text.push_str(&game.object_name_with_article(item));
    }
    text.push('.');
    text
}

/// Join two listings with the double-space separator, skipping empties.
fn join_listings(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_string(),
        (_, true) => first.to_string(),
        _ => format!("{first}  {second}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_names_cover_range() {
        assert_eq!(number_name(0), "zero");
        assert_eq!(number_name(13), "thirteen");
        assert_eq!(number_name(20), "twenty");
        assert_eq!(number_name(21), "21");
        assert_eq!(number_name(-3), "-3");
    }

    #[test]
    fn put_and_get_round_trip() {
        let mut store = VarStore::from_bundle(&Bundle::empty());
        store.put_integer("count", 7);
        store.put_string("motto", "onward");
        assert_eq!(store.user_variable("count"), Some(&VarValue::Integer(7)));
        assert_eq!(
            store.user_variable("motto"),
            Some(&VarValue::String("onward".to_string()))
        );
        assert!(store.user_variable("missing").is_none());
    }

    #[test]
    fn put_updates_existing_value() {
        let mut store = VarStore::from_bundle(&Bundle::empty());
        store.put_integer("count", 7);
        store.put_integer("count", 9);
        assert_eq!(store.user_variable("count"), Some(&VarValue::Integer(9)));
    }

    #[test]
    #[should_panic(expected = "type changed")]
    fn type_change_is_fatal() {
        let mut store = VarStore::from_bundle(&Bundle::empty());
        store.put_integer("count", 7);
        store.put_string("count", "seven");
    }

    #[test]
    fn seeds_from_bundle_variables() {
        let bundle = Bundle::from_toml_str(
            r#"
            [[Variables]]
            Name = "gold"
            Type = 0
            Value = "25"

            [[Variables]]
            Name = "password"
            Type = 1
            Value = "swordfish"
            "#,
        )
        .unwrap();
        let store = VarStore::from_bundle(&bundle);
        assert_eq!(store.user_variable("gold"), Some(&VarValue::Integer(25)));
        assert_eq!(
            store.user_variable("password"),
            Some(&VarValue::String("swordfish".to_string()))
        );
    }

    #[test]
    fn references_start_unset() {
        let store = VarStore::from_bundle(&Bundle::empty());
        assert!(store.ref_object().is_none());
        assert!(store.ref_character().is_none());
        assert!(!store.number_referenced());
        assert_eq!(store.ref_number(), 0);
        assert!(store.ref_text().is_none());
    }

    #[test]
    fn elapsed_seconds_honors_offset() {
        let mut store = VarStore::from_bundle(&Bundle::empty());
        store.set_elapsed_seconds(500);
        assert!(store.elapsed_seconds() >= 500);
    }

    #[test]
    fn join_listings_skips_empties() {
        assert_eq!(join_listings("", ""), "");
        assert_eq!(join_listings("On the table is a lamp.", ""), "On the table is a lamp.");
        assert_eq!(
            join_listings("On the box is a pen.", "Inside the box is a coin."),
            "On the box is a pen.  Inside the box is a coin."
        );
    }
}
