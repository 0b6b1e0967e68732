//! Command pattern matching.
//!
//! Patterns come from game data at runtime: literal words, `[a/b/c]`
//! exact-one alternation, `{...}` optional phrases (both nest), and the
//! metatokens `%object%`, `%character%`, `%number%`, `%text%`, plus `*`
//! as a free wildcard. Matching is case-insensitive and whitespace
//! collapsing, and the matcher holds no state of its own, so task actions
//! that re-enter the parser are safe.
//!
//! A successful match populates the gamestate's object/NPC reference
//! vectors with every candidate the words could mean; the referenced
//! object or character is set only when the candidate is unique, leaving
//! ambiguity for the command handler to resolve.

use log::trace;

use crate::object::strip_leading_article;
use crate::state::Gamestate;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    /// `[a/b/c]`: exactly one alternative.
    Alternation(Vec<Vec<Token>>),
    /// `{a/b/c}`: at most one alternative.
    Optional(Vec<Vec<Token>>),
    ObjectRef,
    CharacterRef,
    TextRef,
    NumberRef,
    Wildcard,
}

/// Everything a match binds, committed to the gamestate only when the
/// whole pattern matches.
#[derive(Debug, Default, Clone)]
struct Captures {
    objects: Option<Vec<usize>>,
    object_pronoun: bool,
    npcs: Option<Vec<usize>>,
    npc_pronoun: bool,
    number: Option<i64>,
    text: Option<String>,
}

/// A pattern tokenized once, for tables matched on every input line.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    tokens: Vec<Token>,
}

/// Tokenize a pattern for repeated matching.
pub fn compile(pattern: &str) -> CompiledPattern {
    CompiledPattern {
        tokens: tokenize(&pattern.to_lowercase()),
    }
}

/// Match `input` against a compiled pattern.
pub fn match_compiled(pattern: &CompiledPattern, input: &str, game: &mut Gamestate) -> bool {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let mut captures = Captures::default();
    if !match_seq(&pattern.tokens, &words, game, &mut captures) {
        return false;
    }
    trace!("pattern matched input {input:?}");
    commit(game, &captures);
    true
}

/// Match `input` against `pattern`. On success the gamestate's reference
/// vectors, pronoun flags, and referenced number/text are updated.
pub fn match_pattern(pattern: &str, input: &str, game: &mut Gamestate) -> bool {
    match_compiled(&compile(pattern), input, game)
}

fn commit(game: &mut Gamestate, captures: &Captures) {
    game.clear_references();

    if let Some(objects) = &captures.objects {
        for &object in objects {
            game.object_references[object] = true;
        }
        game.is_object_pronoun = captures.object_pronoun;
        if let [only] = objects.as_slice() {
            game.vars.set_ref_object(*only);
        }
    }

    if let Some(npcs) = &captures.npcs {
        for &npc in npcs {
            game.npc_references[npc] = true;
        }
        game.is_npc_pronoun = captures.npc_pronoun;
        if let [only] = npcs.as_slice() {
            game.vars.set_ref_character(*only);
        }
    }

    if let Some(number) = captures.number {
        game.vars.set_ref_number(number);
    }
    if let Some(text) = &captures.text {
        game.vars.set_ref_text(text);
    }
}

/// Parse a pattern into tokens. The tokenizer is tolerant: unbalanced
/// brackets simply end their group at end of pattern.
fn tokenize(pattern: &str) -> Vec<Token> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut position = 0;
    parse_seq(&chars, &mut position, &[])
}

fn parse_seq(chars: &[char], position: &mut usize, stops: &[char]) -> Vec<Token> {
    let mut tokens = Vec::new();
    loop {
        while *position < chars.len() && chars[*position].is_whitespace() {
            *position += 1;
        }
        if *position >= chars.len() {
            return tokens;
        }
        let ch = chars[*position];
        if stops.contains(&ch) {
            return tokens;
        }
        match ch {
            '[' => {
                *position += 1;
                tokens.push(Token::Alternation(parse_group(chars, position, ']')));
            }
            '{' => {
                *position += 1;
                tokens.push(Token::Optional(parse_group(chars, position, '}')));
            }
            '%' => {
                let end = chars[*position + 1..].iter().position(|&c| c == '%');
                match end {
                    Some(offset) => {
                        let name: String =
                            chars[*position + 1..*position + 1 + offset].iter().collect();
                        *position += offset + 2;
                        tokens.push(match name.as_str() {
                            "object" => Token::ObjectRef,
                            "character" => Token::CharacterRef,
                            "text" => Token::TextRef,
                            "number" => Token::NumberRef,
                            other => Token::Word(format!("%{other}%")),
                        });
                    }
                    None => {
                        *position += 1;
                        tokens.push(Token::Word("%".to_string()));
                    }
                }
            }
            '*' => {
                *position += 1;
                tokens.push(Token::Wildcard);
            }
            _ => {
                let mut word = String::new();
                while *position < chars.len() {
                    let c = chars[*position];
                    if c.is_whitespace() || "[]{}%*".contains(c) || stops.contains(&c) {
                        break;
                    }
                    word.push(c);
                    *position += 1;
                }
                tokens.push(Token::Word(word));
            }
        }
    }
}

/// Parse `/`-separated alternatives up to the closing bracket.
fn parse_group(chars: &[char], position: &mut usize, close: char) -> Vec<Vec<Token>> {
    let mut alternatives = Vec::new();
    loop {
        alternatives.push(parse_seq(chars, position, &['/', close]));
        if *position >= chars.len() {
            return alternatives;
        }
        let ch = chars[*position];
        *position += 1;
        if ch == close {
            return alternatives;
        }
        // Otherwise ch is '/', continue with the next alternative.
    }
}

/// Longest span of input words we will bind to one entity reference.
const MAX_REF_SPAN: usize = 8;

fn match_seq(tokens: &[Token], words: &[&str], game: &Gamestate, caps: &mut Captures) -> bool {
    let Some((token, rest)) = tokens.split_first() else {
        return words.is_empty();
    };

    match token {
        Token::Word(expected) => {
            words.first() == Some(&expected.as_str()) && match_seq(rest, &words[1..], game, caps)
        }
        Token::Alternation(alternatives) => alternatives.iter().any(|alternative| {
            let mut combined: Vec<Token> = alternative.clone();
            combined.extend_from_slice(rest);
            let mut trial = caps.clone();
            if match_seq(&combined, words, game, &mut trial) {
                *caps = trial;
                true
            } else {
                false
            }
        }),
        Token::Optional(alternatives) => {
            // Prefer consuming one alternative, then skipping the group.
            let consumed = alternatives.iter().any(|alternative| {
                let mut combined: Vec<Token> = alternative.clone();
                combined.extend_from_slice(rest);
                let mut trial = caps.clone();
                if match_seq(&combined, words, game, &mut trial) {
                    *caps = trial;
                    true
                } else {
                    false
                }
            });
            consumed || match_seq(rest, words, game, caps)
        }
        Token::Wildcard => (0..=words.len()).any(|skip| {
            let mut trial = caps.clone();
            if match_seq(rest, &words[skip..], game, &mut trial) {
                *caps = trial;
                true
            } else {
                false
            }
        }),
        Token::NumberRef => {
            let Some(word) = words.first() else {
                return false;
            };
            let Ok(number) = word.parse::<i64>() else {
                return false;
            };
            let mut trial = caps.clone();
            trial.number = Some(number);
            if match_seq(rest, &words[1..], game, &mut trial) {
                *caps = trial;
                true
            } else {
                false
            }
        }
        Token::TextRef => (1..=words.len()).rev().any(|span| {
            let mut trial = caps.clone();
            trial.text = Some(words[..span].join(" "));
            if match_seq(rest, &words[span..], game, &mut trial) {
                *caps = trial;
                true
            } else {
                false
            }
        }),
        Token::ObjectRef => {
            let limit = words.len().min(MAX_REF_SPAN);
            (1..=limit).rev().any(|span| {
                let Some((candidates, pronoun)) = object_candidates(game, &words[..span]) else {
                    return false;
                };
                let mut trial = caps.clone();
                trial.objects = Some(candidates);
                trial.object_pronoun = pronoun;
                if match_seq(rest, &words[span..], game, &mut trial) {
                    *caps = trial;
                    true
                } else {
                    false
                }
            })
        }
        Token::CharacterRef => {
            let limit = words.len().min(MAX_REF_SPAN);
            (1..=limit).rev().any(|span| {
                let Some((candidates, pronoun)) = npc_candidates(game, &words[..span]) else {
                    return false;
                };
                let mut trial = caps.clone();
                trial.npcs = Some(candidates);
                trial.npc_pronoun = pronoun;
                if match_seq(rest, &words[span..], game, &mut trial) {
                    *caps = trial;
                    true
                } else {
                    false
                }
            })
        }
    }
}

/// Objects a span of words could mean, plus whether a pronoun was used.
/// None when the span means no object at all.
fn object_candidates(game: &Gamestate, span: &[&str]) -> Option<(Vec<usize>, bool)> {
    if span == ["it"] {
        if game.it_object >= 0 {
            return Some((vec![game.it_object as usize], true));
        }
        return None;
    }

    let candidates: Vec<usize> = (0..game.objects.len())
        .filter(|&object| {
            let prefix = game.bundle.entity_string("Objects", object, "Prefix");
            let short = game.bundle.entity_string("Objects", object, "Short");
            phrase_names_entity(prefix, short, span)
        })
        .collect();
    (!candidates.is_empty()).then_some((candidates, false))
}

/// NPCs a span of words could mean. Pronouns resolve through the
/// gamestate's pronoun memory.
fn npc_candidates(game: &Gamestate, span: &[&str]) -> Option<(Vec<usize>, bool)> {
    if let [pronoun] = span {
        let remembered = match *pronoun {
            "him" => game.him_npc,
            "her" => game.her_npc,
            "it" => game.it_npc,
            _ => -1,
        };
        if remembered >= 0 {
            return Some((vec![remembered as usize], true));
        }
        if matches!(*pronoun, "him" | "her") {
            return None;
        }
    }

    let candidates: Vec<usize> = (0..game.npcs.len())
        .filter(|&npc| {
            let prefix = game.bundle.entity_string("NPCs", npc, "Prefix");
            let name = game.bundle.entity_string("NPCs", npc, "Name");
            phrase_names_entity(prefix, name, span)
        })
        .collect();
    (!candidates.is_empty()).then_some((candidates, false))
}

/// Does the span of input words name this entity? The span must be a
/// suffix of the entity's article-stripped prefix-plus-name words, so
/// "brass key", "key", and "small brass key" can all reach the same
/// object while "brass" alone cannot.
fn phrase_names_entity(prefix: &str, name: &str, span: &[&str]) -> bool {
    let mut full: Vec<String> = Vec::new();
    for source in [prefix, name] {
        for word in strip_leading_article(source).split_whitespace() {
            full.push(word.to_lowercase());
        }
    }
    if full.is_empty() || span.len() > full.len() {
        return false;
    }
    let tail = &full[full.len() - span.len()..];
    tail.iter().zip(span).all(|(have, want)| have == want)
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
            Short = "Hall"

            [[Objects]]
            Short = "brass key"
            Prefix = "a small"
            Static = false
            InitialPosition = 4
            Parent = 0

            [[Objects]]
            Short = "brass lamp"
            Prefix = "a"
            Static = false
            InitialPosition = 4
            Parent = 0

            [[NPCs]]
            Name = "Edna"
            Prefix = "old"
            Gender = 1
            StartRoom = 1
            "#,
        )
        .unwrap();
        Gamestate::new(Rc::new(bundle))
    }

    #[test]
    fn literal_words_and_case() {
        let mut game = fixture();
        assert!(match_pattern("look", "LOOK", &mut game));
        assert!(!match_pattern("look", "look around", &mut game));
    }

    #[test]
    fn alternation_and_optionals() {
        let mut game = fixture();
        for input in ["go north", "north", "n", "go to the north"] {
            assert!(
                match_pattern("{go} {to} {the} [north/n]", input, &mut game),
                "{input} should match"
            );
        }
        assert!(!match_pattern("{go} {to} {the} [north/n]", "go south", &mut game));
    }

    #[test]
    fn multiword_alternatives() {
        let mut game = fixture();
        assert!(match_pattern("[get/take/pick up] %object%", "pick up key", &mut game));
        assert!(match_pattern("[get/take/pick up] %object%", "take brass key", &mut game));
    }

    #[test]
    fn object_reference_binds_unique_candidate() {
        let mut game = fixture();
        assert!(match_pattern("get %object%", "get key", &mut game));
        assert_eq!(game.vars.ref_object(), Some(0));
        assert!(game.object_references[0]);
        assert!(!game.object_references[1]);
        assert!(!game.is_object_pronoun);
    }

    #[test]
    fn adjective_alone_is_not_a_name() {
        let mut game = fixture();
        assert!(!match_pattern("get %object%", "get brass", &mut game));
        assert!(!match_pattern("get %object%", "get small", &mut game));
    }

    #[test]
    fn ambiguous_object_leaves_reference_unset() {
        let bundle = Bundle::from_toml_str(
            r#"
            [Header]
            StartRoom = 0
            [[Rooms]]
            Short = "Hall"
            [[Objects]]
            Short = "brass key"
            Static = false
            InitialPosition = 4
            Parent = 0
            [[Objects]]
            Short = "rusty key"
            Static = false
            InitialPosition = 4
            Parent = 0
            "#,
        )
        .unwrap();
        let mut game = Gamestate::new(Rc::new(bundle));
        assert!(match_pattern("get %object%", "get key", &mut game));
        assert!(game.object_references[0]);
        assert!(game.object_references[1]);
        assert!(game.vars.ref_object().is_none(), "ambiguous match must not bind");
    }

    #[test]
    fn full_prefix_and_name_accepted() {
        let mut game = fixture();
        assert!(match_pattern("get %object%", "get small brass key", &mut game));
        assert_eq!(game.vars.ref_object(), Some(0));
    }

    #[test]
    fn pronoun_resolves_from_memory() {
        let mut game = fixture();
        assert!(!match_pattern("get %object%", "get it", &mut game));
        game.it_object = 1;
        assert!(match_pattern("get %object%", "get it", &mut game));
        assert!(game.is_object_pronoun);
        assert_eq!(game.vars.ref_object(), Some(1));
    }

    #[test]
    fn character_reference_and_pronouns() {
        let mut game = fixture();
        assert!(match_pattern("talk to %character%", "talk to edna", &mut game));
        assert_eq!(game.vars.ref_character(), Some(0));

        let mut game = fixture();
        assert!(!match_pattern("kiss %character%", "kiss her", &mut game));
        game.her_npc = 0;
        assert!(match_pattern("kiss %character%", "kiss her", &mut game));
        assert!(game.is_npc_pronoun);
    }

    #[test]
    fn number_and_text_references() {
        let mut game = fixture();
        assert!(match_pattern("dial %number%", "dial 42", &mut game));
        assert_eq!(game.vars.ref_number(), 42);
        assert!(game.vars.number_referenced());

        assert!(match_pattern("say %text%", "say open sesame", &mut game));
        assert_eq!(game.vars.ref_text(), Some("open sesame"));

        assert!(!match_pattern("dial %number%", "dial tone", &mut game));
    }

    #[test]
    fn wildcard_matches_anything_including_nothing() {
        let mut game = fixture();
        assert!(match_pattern("jump *", "jump", &mut game));
        assert!(match_pattern("jump *", "jump up and down", &mut game));
        assert!(!match_pattern("jump *", "hop", &mut game));
    }

    #[test]
    fn match_is_idempotent_on_repeat() {
        let mut game = fixture();
        assert!(match_pattern("get %object%", "get brass key", &mut game));
        let refs_first = game.object_references.clone();
        let bound_first = game.vars.ref_object();

        assert!(match_pattern("get %object%", "get brass key", &mut game));
        assert_eq!(game.object_references, refs_first);
        assert_eq!(game.vars.ref_object(), bound_first);
    }

    #[test]
    fn nested_optional_with_alternation() {
        let mut game = fixture();
        let pattern = "sit {down/on {the} [ground/floor]}";
        for input in ["sit", "sit down", "sit on the floor", "sit on ground"] {
            assert!(match_pattern(pattern, input, &mut game), "{input} should match");
        }
        assert!(!match_pattern(pattern, "sit on chair", &mut game));
    }
}
