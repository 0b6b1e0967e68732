//! Hierarchical print filter.
//!
//! All player-visible text funnels through here. Output is buffered until
//! the turn loop flushes; the flush pass applies ALR substitutions, then
//! `%variable%` interpolation (re-expanded to a fixed depth), normalizes
//! sentence starts and whitespace runs, and finally lexes embedded markup
//! into structured tag events for the host. Malformed markup degrades to
//! literal text.

use log::trace;

use crate::bundle::Bundle;
use crate::host::{Host, Tag};
use crate::state::Gamestate;

/// Re-expansion bound for `%variable%` interpolation.
const MAX_EXPANSION_DEPTH: usize = 16;

/// Longest markup tag body we will try to lex before treating `<` as text.
const MAX_TAG_LENGTH: usize = 64;

/// The output buffer and its flush pipeline.
#[derive(Debug, Default)]
pub struct PrintFilter {
    buffer: String,
    pending_capital: bool,
}

impl PrintFilter {
    pub fn new() -> PrintFilter {
        PrintFilter::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer a string of game text.
    pub fn push(&mut self, text: &str) {
        if self.pending_capital && !text.is_empty() {
            self.pending_capital = false;
            let mut chars = text.chars();
            if let Some(first) = chars.next() {
                self.buffer.extend(first.to_uppercase());
                self.buffer.push_str(chars.as_str());
                return;
            }
        }
        self.buffer.push_str(text);
    }

    /// Buffer a single character.
    pub fn push_char(&mut self, ch: char) {
        if self.pending_capital {
            self.pending_capital = false;
            self.buffer.extend(ch.to_uppercase());
        } else {
            self.buffer.push(ch);
        }
    }

    /// Buffer a structured tag in its textual form.
    pub fn push_tag(&mut self, tag: Tag) {
        self.buffer.push('<');
        self.buffer.push_str(tag_name(tag));
        self.buffer.push('>');
    }

    /// Force the next buffered character to upper case.
    pub fn new_sentence(&mut self) {
        self.pending_capital = true;
    }

    /// Run the full filter pipeline over the buffer and hand the result to
    /// the host as interleaved text and tag events.
    pub fn flush<H: Host>(&mut self, game: &mut Gamestate, host: &mut H) {
        let raw = std::mem::take(&mut self.buffer);
        self.pending_capital = false;

        if !raw.is_empty() {
            trace!("filter: flushing {} buffered chars", raw.len());
            let cooked = cook_text(game, &raw);
            for segment in lex_segments(&cooked) {
                match segment {
                    Segment::Text(text) => host.print(&text),
                    Segment::Tagged(tag, argument) => host.print_tag(tag, &argument),
                }
            }
        }
        host.flush();
    }

    /// Discard buffered output without emitting it.
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.pending_capital = false;
    }
}

/// ALR substitution, variable expansion, and normalization, with markup
/// left in place. Used directly for status lines and hint text.
pub fn cook_text(game: &mut Gamestate, text: &str) -> String {
    let substituted = alr_substitute(&game.bundle.clone(), text);
    let expanded = expand_variables(game, &substituted);
    normalize(&expanded)
}

/// Apply the bundle's ALR pattern/replacement table in one bounded pass.
///
/// At each position the longest matching original wins; replacement text
/// is emitted without rescanning, so rewriting always terminates.
pub fn alr_substitute(bundle: &Bundle, text: &str) -> String {
    let count = bundle.entity_count("ALRs");
    if count == 0 {
        return text.to_string();
    }

    let mut rules: Vec<(&str, &str)> = (0..count)
        .map(|index| {
            (
                bundle.entity_string("ALRs", index, "Original"),
                bundle.entity_string("ALRs", index, "Replacement"),
            )
        })
        .filter(|(original, _)| !original.is_empty())
        .collect();
    rules.sort_by_key(|(original, _)| std::cmp::Reverse(original.len()));

    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (original, replacement) in &rules {
            if rest.starts_with(original) {
                output.push_str(replacement);
                rest = &rest[original.len()..];
                continue 'scan;
            }
        }
        let mut chars = rest.chars();
        output.push(chars.next().unwrap());
        rest = chars.as_str();
    }
    output
}

/// Expand `%name%` tokens, re-expanding produced text to a fixed depth.
/// Unknown variables expand to the empty string.
pub fn expand_variables(game: &mut Gamestate, text: &str) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_EXPANSION_DEPTH {
        let (next, changed) = expand_once(game, &current);
        current = next;
        if !changed {
            break;
        }
    }
    current
}

fn expand_once(game: &mut Gamestate, text: &str) -> (String, bool) {
    let mut output = String::with_capacity(text.len());
    let mut changed = false;
    let mut rest = text;

    while let Some(start) = rest.find('%') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    match game.variable(name) {
                        Some(value) => output.push_str(&value.render()),
                        None => {
                            trace!("filter: unknown variable %{name}% expands empty");
                        }
                    }
                    changed = true;
                    rest = &after[end + 1..];
                } else {
                    // Not a variable token; keep the first '%' literally.
                    output.push('%');
                    rest = after;
                }
            }
            None => {
                output.push('%');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    (output, changed)
}

/// Sentence-start capitalization and whitespace collapsing. Tag regions
/// are skipped; text between center/right markers keeps its spacing.
fn normalize(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut after_stop = false;
    let mut capitalize_next = false;
    let mut preformatted = 0usize;
    let mut pending_space = false;

    let mut rest = text;
    while !rest.is_empty() {
        if rest.starts_with('<')
            && let Some((tag, _, consumed)) = lex_one_tag(rest)
        {
            if pending_space {
                output.push(' ');
                pending_space = false;
            }
            match tag {
                Tag::Center | Tag::Right => preformatted += 1,
                Tag::EndCenter | Tag::EndRight => preformatted = preformatted.saturating_sub(1),
                _ => {}
            }
            output.push_str(&rest[..consumed]);
            rest = &rest[consumed..];
            continue;
        }

        let mut chars = rest.chars();
        let ch = chars.next().unwrap();
        rest = chars.as_str();

        if preformatted == 0 && (ch == ' ' || ch == '\t') {
            pending_space = true;
            if after_stop {
                capitalize_next = true;
            }
            continue;
        }

        if ch == '\n' {
            if after_stop {
                capitalize_next = true;
            }
            pending_space = false;
            output.push('\n');
            continue;
        }

        if pending_space {
            output.push(' ');
            pending_space = false;
        }

        after_stop = matches!(ch, '.' | '!' | '?');
        if capitalize_next && ch.is_alphabetic() {
            output.extend(ch.to_uppercase());
            capitalize_next = false;
            continue;
        }
        if !ch.is_whitespace() {
            capitalize_next = false;
        }
        output.push(ch);
    }
    output
}

/// Remove recognized markup tags, leaving plain text. Used to render room
/// names into the status line and hints into host dialogs.
pub fn strip_tags(text: &str) -> String {
    lex_segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Text(chunk) => Some(chunk),
            Segment::Tagged(..) => None,
        })
        .collect()
}

/// Substitute synonyms from the bundle table over an input line.
/// Longest originals are tried first; matching is whole-word.
pub fn filter_input(bundle: &Bundle, line: &str) -> String {
    let count = bundle.entity_count("Synonyms");
    if count == 0 {
        return line.to_string();
    }

    let mut rules: Vec<(String, &str)> = (0..count)
        .map(|index| {
            (
                bundle.entity_string("Synonyms", index, "Original").to_lowercase(),
                bundle.entity_string("Synonyms", index, "Replacement"),
            )
        })
        .filter(|(original, _)| !original.is_empty())
        .collect();
    rules.sort_by_key(|(original, _)| std::cmp::Reverse(original.len()));

    let mut words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    for (original, replacement) in &rules {
        let pattern: Vec<&str> = original.split_whitespace().collect();
        if pattern.is_empty() {
            continue;
        }
        let mut index = 0;
        while index + pattern.len() <= words.len() {
            let window = &words[index..index + pattern.len()];
            if window
                .iter()
                .zip(&pattern)
                .all(|(word, expect)| word.eq_ignore_ascii_case(expect))
            {
                let tail: Vec<String> = words.split_off(index + pattern.len());
                words.truncate(index);
                words.extend(replacement.split_whitespace().map(str::to_string));
                index = words.len();
                words.extend(tail);
            } else {
                index += 1;
            }
        }
    }
    words.join(" ")
}

/// A lexed run of output: plain text, or one recognized tag.
#[derive(Debug, PartialEq)]
enum Segment {
    Text(String),
    Tagged(Tag, String),
}

fn lex_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.starts_with('<') {
            if let Some((tag, argument, consumed)) = lex_one_tag(rest) {
                if !plain.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut plain)));
                }
                segments.push(Segment::Tagged(tag, argument));
                rest = &rest[consumed..];
                continue;
            }
        }
        let mut chars = rest.chars();
        plain.push(chars.next().unwrap());
        rest = chars.as_str();
    }
    if !plain.is_empty() {
        segments.push(Segment::Text(plain));
    }
    segments
}

/// Try to lex one `<name argument>` tag at the start of `text`. Returns
/// the tag, its argument, and the byte length consumed.
fn lex_one_tag(text: &str) -> Option<(Tag, String, usize)> {
    debug_assert!(text.starts_with('<'));
    let close = text
        .char_indices()
        .take(MAX_TAG_LENGTH)
        .find(|(_, ch)| *ch == '>')
        .map(|(index, _)| index)?;
    let body = &text[1..close];
    let (name, argument) = match body.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (body, ""),
    };
    let tag = tag_from_name(&name.to_lowercase())?;
    Some((tag, argument.to_string(), close + 1))
}

fn tag_from_name(name: &str) -> Option<Tag> {
    let tag = match name {
        "i" => Tag::Italics,
        "/i" => Tag::EndItalics,
        "b" => Tag::Bold,
        "/b" => Tag::EndBold,
        "u" => Tag::Underline,
        "/u" => Tag::EndUnderline,
        "c" => Tag::Color,
        "/c" => Tag::EndColor,
        "bgcolor" | "bgcolour" => Tag::BgColor,
        "font" => Tag::Font,
        "/font" => Tag::EndFont,
        "center" | "centre" => Tag::Center,
        "/center" | "/centre" => Tag::EndCenter,
        "right" => Tag::Right,
        "/right" => Tag::EndRight,
        "wait" => Tag::Wait,
        "waitkey" => Tag::WaitKey,
        "cls" => Tag::Cls,
        _ => return None,
    };
    Some(tag)
}

fn tag_name(tag: Tag) -> &'static str {
    match tag {
        Tag::Italics => "i",
        Tag::EndItalics => "/i",
        Tag::Bold => "b",
        Tag::EndBold => "/b",
        Tag::Underline => "u",
        Tag::EndUnderline => "/u",
        Tag::Color => "c",
        Tag::EndColor => "/c",
        Tag::BgColor => "bgcolor",
        Tag::Font => "font",
        Tag::EndFont => "/font",
        Tag::Center => "center",
        Tag::EndCenter => "/center",
        Tag::Right => "right",
        Tag::EndRight => "/right",
        Tag::Wait => "wait",
        Tag::WaitKey => "waitkey",
        Tag::Cls => "cls",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn empty_game() -> Gamestate {
        Gamestate::new(Rc::new(Bundle::empty()))
    }

    fn game_with(toml: &str) -> Gamestate {
        Gamestate::new(Rc::new(Bundle::from_toml_str(toml).unwrap()))
    }

    #[test]
    fn new_sentence_capitalizes_next_push() {
        let mut filter = PrintFilter::new();
        filter.push("end. ");
        filter.new_sentence();
        filter.push("he left.");
        assert_eq!(filter.buffer, "end. He left.");
    }

    #[test]
    fn push_tag_buffers_textual_form() {
        let mut filter = PrintFilter::new();
        filter.push_tag(Tag::Bold);
        filter.push("Cell");
        filter.push_tag(Tag::EndBold);
        assert_eq!(filter.buffer, "<b>Cell</b>");
    }

    #[test]
    fn expansion_replaces_known_and_drops_unknown() {
        let mut game = empty_game();
        game.vars.put_string("hero", "Grue");
        assert_eq!(expand_variables(&mut game, "hail %hero%%nothing%!"), "hail Grue!");
    }

    #[test]
    fn expansion_is_recursive_to_fixed_depth() {
        let mut game = empty_game();
        game.vars.put_string("a", "%b%");
        game.vars.put_string("b", "done");
        assert_eq!(expand_variables(&mut game, "%a%"), "done");
    }

    #[test]
    fn expansion_self_reference_terminates() {
        let mut game = empty_game();
        game.vars.put_string("loop", "%loop%x");
        let expanded = expand_variables(&mut game, "%loop%");
        assert!(expanded.len() <= MAX_EXPANSION_DEPTH + 1);
    }

    #[test]
    fn stray_percent_is_literal() {
        let mut game = empty_game();
        assert_eq!(expand_variables(&mut game, "50% off"), "50% off");
        assert_eq!(expand_variables(&mut game, "100%"), "100%");
    }

    #[test]
    fn alr_substitution_applies_longest_first() {
        let bundle = Bundle::from_toml_str(
            r#"
            [[ALRs]]
            Original = "cat"
            Replacement = "dog"
            [[ALRs]]
            Original = "catalog"
            Replacement = "index"
            "#,
        )
        .unwrap();
        assert_eq!(alr_substitute(&bundle, "catalog of cats"), "index of dogs");
    }

    #[test]
    fn alr_replacement_is_not_rescanned() {
        let bundle = Bundle::from_toml_str(
            r#"
            [[ALRs]]
            Original = "a"
            Replacement = "aa"
            "#,
        )
        .unwrap();
        assert_eq!(alr_substitute(&bundle, "cab"), "caab");
    }

    #[test]
    fn normalize_collapses_whitespace_and_capitalizes() {
        assert_eq!(normalize("done.  next   one"), "done. Next one");
        assert_eq!(normalize("what? yes! ok"), "what? Yes! Ok");
    }

    #[test]
    fn normalize_requires_space_after_stop() {
        assert_eq!(normalize("v2.1 beta"), "v2.1 beta");
        assert_eq!(normalize("end.\nnew line"), "end.\nNew line");
    }

    #[test]
    fn normalize_leaves_tags_alone() {
        assert_eq!(normalize("done. <b>next</b>"), "done. <b>Next</b>");
    }

    #[test]
    fn normalize_preserves_centered_spacing() {
        assert_eq!(normalize("<center>a   b</center>"), "<center>a   b</center>");
    }

    #[test]
    fn strip_tags_removes_known_markup() {
        assert_eq!(strip_tags("<b>The Vault</b>"), "The Vault");
        assert_eq!(strip_tags("2 < 3 and <nonsense>"), "2 < 3 and <nonsense>");
    }

    #[test]
    fn lex_tags_with_arguments() {
        let segments = lex_segments("<font face=courier>mono</font>");
        assert_eq!(
            segments,
            vec![
                Segment::Tagged(Tag::Font, "face=courier".to_string()),
                Segment::Text("mono".to_string()),
                Segment::Tagged(Tag::EndFont, String::new()),
            ]
        );
    }

    #[test]
    fn malformed_tag_degrades_to_text() {
        let segments = lex_segments("a < b");
        assert_eq!(segments, vec![Segment::Text("a < b".to_string())]);
    }

    #[test]
    fn filter_input_substitutes_whole_words() {
        let bundle = Bundle::from_toml_str(
            r#"
            [[Synonyms]]
            Original = "grab"
            Replacement = "get"
            [[Synonyms]]
            Original = "pick up"
            Replacement = "get"
            "#,
        )
        .unwrap();
        assert_eq!(filter_input(&bundle, "grab the lamp"), "get the lamp");
        assert_eq!(filter_input(&bundle, "pick up lamp"), "get lamp");
        assert_eq!(filter_input(&bundle, "grabby hands"), "grabby hands");
    }

    #[test]
    fn cook_text_runs_full_pipeline() {
        let mut game = game_with(
            r#"
            [[ALRs]]
            Original = "@hero@"
            Replacement = "%player%"
            [Globals]
            PlayerName = "Anna"
            "#,
        );
        assert_eq!(cook_text(&mut game, "hail   @hero@. welcome"), "hail Anna. Welcome");
    }
}
