//! Host surface between the interpreter core and its front end.
//!
//! The engine produces a stream of text and structured tag events, and asks
//! the host for blocking line input, yes/no confirmations, and save-slot
//! byte storage. Sound and graphics are optional; hosts without them keep
//! the default no-op implementations.

use anyhow::Result;

/// Structured output tags, forwarded from game text to the host.
///
/// The set is closed; unknown markup in game text is passed through the
/// print filter as literal characters rather than as a tag event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Italics,
    EndItalics,
    Bold,
    EndBold,
    Underline,
    EndUnderline,
    Color,
    EndColor,
    BgColor,
    Font,
    EndFont,
    Center,
    EndCenter,
    Right,
    EndRight,
    /// Best-effort delay; the argument is tenths of a second.
    Wait,
    WaitKey,
    Cls,
}

/// Confirmation prompts the interpreter may raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    Quit,
    Restart,
    Save,
    Restore,
    ViewHints,
}

/// Everything the interpreter needs from its environment.
pub trait Host {
    /// Emit filtered text. May be called many times between flushes.
    fn print(&mut self, text: &str);

    /// Emit a structured tag event with its argument ("" when none).
    fn print_tag(&mut self, tag: Tag, argument: &str);

    /// Push any buffered output to the player.
    fn flush(&mut self);

    /// Blocking read of one input line, without trailing newline.
    fn read_line(&mut self, prompt: &str) -> Result<String>;

    /// Ask the player to confirm a destructive or administrative action.
    fn confirm(&mut self, kind: ConfirmKind) -> bool;

    /// Store a save payload in a player-selected slot.
    fn write_save(&mut self, payload: &[u8]) -> Result<()>;

    /// Retrieve a save payload from a player-selected slot.
    fn read_save(&mut self) -> Result<Vec<u8>>;

    /// Start playing a sound resource. `looping` when the game asked for it.
    fn play_sound(&mut self, _name: &str, _offset: i64, _length: i64, _looping: bool) {}

    /// Stop any playing sound.
    fn stop_sound(&mut self) {}

    /// Display a graphic resource.
    fn show_graphic(&mut self, _name: &str, _offset: i64, _length: i64) {}
}
