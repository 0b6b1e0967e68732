//! Sound and graphic resource descriptors.
//!
//! The interpreter never owns media; it tracks (name, offset, length)
//! descriptor tuples and notifies the host only when the active descriptor
//! actually changes. Task, event, NPC and room text can each request a
//! resource; the turn loop synchronizes requested against active once per
//! iteration, before the print filter flushes.

use serde::{Deserialize, Serialize};

use crate::bundle::Seg;
use crate::host::Host;
use crate::state::Gamestate;

/// Descriptor for one sound or graphic. A trailing `##` on a sound name
/// marks it as looping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub offset: i64,
    pub length: i64,
}

impl Resource {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }

    pub fn clear(&mut self) {
        self.name.clear();
        self.offset = 0;
        self.length = 0;
    }
}

/// Requested and active resource state, owned by the gamestate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    pub requested_sound: Resource,
    pub requested_graphic: Resource,
    pub playing_sound: Resource,
    pub displayed_graphic: Resource,
    pub stop_sound: bool,
}

/// Record the resource request found at `base` in the bundle, if any.
///
/// The node is expected to carry `SoundFile`/`SoundOffset`/`SoundLen` and
/// `GraphicFile`/`GraphicOffset`/`GraphicLen` children; either half may be
/// absent. Requests are ignored entirely when the game does not declare
/// the matching `Globals/Sound` or `Globals/Graphics` capability.
pub fn handle_resource(game: &mut Gamestate, base: &[Seg]) {
    let bundle = game.bundle.clone();

    if bundle.global_boolean("Sound") {
        let mut path = base.to_vec();
        path.push("SoundFile".into());
        let name = bundle.string(&path).to_string();
        if !name.is_empty() {
            path.pop();
            path.push("SoundOffset".into());
            let offset = bundle.integer(&path);
            path.pop();
            path.push("SoundLen".into());
            let length = bundle.integer(&path);
            game.resources.requested_sound = Resource { name, offset, length };
        }
    }

    if bundle.global_boolean("Graphics") {
        let mut path = base.to_vec();
        path.push("GraphicFile".into());
        let name = bundle.string(&path).to_string();
        if !name.is_empty() {
            path.pop();
            path.push("GraphicOffset".into());
            let offset = bundle.integer(&path);
            path.pop();
            path.push("GraphicLen".into());
            let length = bundle.integer(&path);
            game.resources.requested_graphic = Resource { name, offset, length };
        }
    }
}

/// Bring the host's active sound and graphic into line with the latest
/// requests. Called once per turn-loop iteration, and again after undo and
/// restore so the active media match the revised gamestate.
pub fn sync_resources<H: Host>(game: &mut Gamestate, host: &mut H) {
    let res = &mut game.resources;

    if res.stop_sound {
        if !res.playing_sound.is_empty() {
            host.stop_sound();
            res.playing_sound.clear();
        }
        res.requested_sound.clear();
        res.stop_sound = false;
    }

    if res.requested_sound != res.playing_sound {
        if res.requested_sound.is_empty() {
            host.stop_sound();
        } else {
            let looping = res.requested_sound.name.ends_with("##");
            let name = res.requested_sound.name.trim_end_matches('#');
            host.play_sound(name, res.requested_sound.offset, res.requested_sound.length, looping);
        }
        res.playing_sound = res.requested_sound.clone();
    }

    if res.requested_graphic != res.displayed_graphic {
        if !res.requested_graphic.is_empty() {
            host.show_graphic(
                &res.requested_graphic.name,
                res.requested_graphic.offset,
                res.requested_graphic.length,
            );
        }
        res.displayed_graphic = res.requested_graphic.clone();
    }
}

/// Drop all requests and active descriptors, stopping any playing sound.
/// Used on restart and at session shutdown.
pub fn cancel_resources<H: Host>(game: &mut Gamestate, host: &mut H) {
    if !game.resources.playing_sound.is_empty() {
        host.stop_sound();
    }
    game.resources = ResourceSet::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_is_empty_and_clear() {
        let mut res = Resource {
            name: "chime.wav".to_string(),
            offset: 128,
            length: 2048,
        };
        assert!(!res.is_empty());
        res.clear();
        assert!(res.is_empty());
        assert_eq!(res.offset, 0);
    }

    #[test]
    fn default_set_has_no_requests() {
        let set = ResourceSet::default();
        assert!(set.requested_sound.is_empty());
        assert!(set.requested_graphic.is_empty());
        assert!(!set.stop_sound);
    }
}
