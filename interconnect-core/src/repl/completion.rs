//! Grammar-aware tab completion shared by firmware and emulator consoles.
//!
//! Candidates come straight from the [`catalog`](super::catalog), so anything
//! the parser accepts can be completed.

use super::catalog::{self, CommandSpec, CommandTag};
use super::grammar::{self, Token, TokenKind};
use heapless::Vec as HeaplessVec;

const MAX_SUGGESTIONS: usize = 8;

/// Completion result returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionResult {
    /// Replacement to apply when one candidate matches or the candidates
    /// share a longer prefix than what was typed.
    pub replacement: Option<Replacement>,
    /// Candidates for the current cursor position. Empty when nothing matched.
    pub options: HeaplessVec<&'static str, MAX_SUGGESTIONS>,
}

impl CompletionResult {
    fn empty() -> Self {
        Self {
            replacement: None,
            options: HeaplessVec::new(),
        }
    }
}

/// Portion of the buffer to substitute with a completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Replacement {
    pub start: usize,
    pub end: usize,
    pub value: &'static str,
    pub append_space: bool,
}

/// Stateless completion engine that mirrors the console grammar.
#[derive(Default)]
pub struct CompletionEngine;

impl CompletionEngine {
    pub const fn new() -> Self {
        Self
    }

    /// Computes completions for `buffer` at `cursor`.
    ///
    /// The cursor must sit on a UTF-8 boundary; callers only accept ASCII input.
    pub fn complete(&self, buffer: &str, cursor: usize) -> CompletionResult {
        if cursor > buffer.len() {
            return CompletionResult::empty();
        }

        let upto_cursor = &buffer[..cursor];
        let prefix_start = token_start(upto_cursor);
        let prefix = &upto_cursor[prefix_start..];
        let leading = &upto_cursor[..prefix_start];

        let Ok(leading_tokens) = grammar::lex(leading) else {
            return CompletionResult::empty();
        };

        let context = determine_context(leading_tokens.as_slice());
        let mut matches: HeaplessVec<&'static str, MAX_SUGGESTIONS> = HeaplessVec::new();
        match context {
            CompletionContext::Root | CompletionContext::HelpTopic => {
                for spec in catalog::commands() {
                    push_if_prefixed(&mut matches, spec.name, prefix);
                }
            }
            CompletionContext::Argument(spec) => {
                for keyword in catalog::keywords(spec) {
                    push_if_prefixed(&mut matches, keyword, prefix);
                }
            }
            CompletionContext::None => return CompletionResult::empty(),
        }

        if matches.is_empty() {
            return CompletionResult::empty();
        }

        let mut append_space = false;
        let replacement_value = if let [candidate] = matches.as_slice() {
            append_space = should_append_space(context, candidate);
            Some(*candidate)
        } else {
            let lcp = longest_common_prefix(matches.as_slice());
            let shared = common_prefix_len_ignore_case(prefix, lcp);
            (lcp.len() > shared).then_some(lcp)
        };

        let replacement = replacement_value.map(|value| Replacement {
            start: prefix_start,
            end: cursor,
            value,
            append_space,
        });

        CompletionResult {
            replacement,
            options: matches,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CompletionContext {
    Root,
    Argument(&'static CommandSpec),
    HelpTopic,
    None,
}

fn determine_context(tokens: &[Token<'_>]) -> CompletionContext {
    if tokens.iter().any(|token| token.kind == TokenKind::Error) {
        return CompletionContext::None;
    }

    match tokens {
        [] => CompletionContext::Root,
        [first] => match catalog::find(first.lexeme).map(|spec| (spec.tag, spec)) {
            Some((CommandTag::Help, _)) => CompletionContext::HelpTopic,
            Some((CommandTag::Uart | CommandTag::Mux, spec)) => CompletionContext::Argument(spec),
            Some((CommandTag::Status, _)) | None => CompletionContext::None,
        },
        _ => CompletionContext::None,
    }
}

fn push_if_prefixed(
    matches: &mut HeaplessVec<&'static str, MAX_SUGGESTIONS>,
    candidate: &'static str,
    prefix: &str,
) {
    if starts_with_ignore_ascii_case(candidate, prefix) {
        let _ = matches.push(candidate);
    }
}

fn token_start(buffer: &str) -> usize {
    buffer
        .rfind([' ', '\t'])
        .map_or(0, |index| index + 1)
}

fn starts_with_ignore_ascii_case(candidate: &str, prefix: &str) -> bool {
    prefix.len() <= candidate.len() && candidate[..prefix.len()].eq_ignore_ascii_case(prefix)
}

fn common_prefix_len_ignore_case(lhs: &str, rhs: &str) -> usize {
    lhs.as_bytes()
        .iter()
        .zip(rhs.as_bytes())
        .take_while(|(l, r)| l.eq_ignore_ascii_case(r))
        .count()
}

fn longest_common_prefix(candidates: &[&'static str]) -> &'static str {
    let Some((first, rest)) = candidates.split_first() else {
        return "";
    };
    let mut prefix = *first;
    for candidate in rest {
        let len = common_prefix_len_ignore_case(prefix, candidate);
        prefix = &prefix[..len];
    }
    prefix
}

fn should_append_space(context: CompletionContext, candidate: &'static str) -> bool {
    if context != CompletionContext::Root {
        return false;
    }

    catalog::find(candidate).is_some_and(|spec| spec.tag != CommandTag::Status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_options(
        result: CompletionResult,
    ) -> (
        Option<Replacement>,
        HeaplessVec<&'static str, MAX_SUGGESTIONS>,
    ) {
        assert!(
            !result.options.is_empty(),
            "expected suggestions but got no match"
        );
        (result.replacement, result.options)
    }

    #[test]
    fn offers_root_commands_from_empty_buffer() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("", 0));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), ["uart", "mux", "status", "help"]);
    }

    #[test]
    fn expands_unique_root_command_with_space() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("ua", 2));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.start, 0);
        assert_eq!(replacement.end, 2);
        assert_eq!(replacement.value, "uart");
        assert!(replacement.append_space);
        assert_eq!(options.as_slice(), ["uart"]);
    }

    #[test]
    fn does_not_append_space_for_status_command() {
        let engine = CompletionEngine::new();
        let (replacement, _) = expect_options(engine.complete("st", 2));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.value, "status");
        assert!(!replacement.append_space);
    }

    #[test]
    fn suggests_uart_arguments() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("uart ", 5));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), ["off", "on", "flip", "auto"]);
    }

    #[test]
    fn extends_shared_prefix() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("uart o", 6));
        assert!(replacement.is_none());
        assert_eq!(options.as_slice(), ["off", "on"]);

        let (replacement, options) = expect_options(engine.complete("uart of", 7));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.start, 5);
        assert_eq!(replacement.value, "off");
        assert!(!replacement.append_space);
        assert_eq!(options.as_slice(), ["off"]);
    }

    #[test]
    fn mux_arguments_match_case_insensitively() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("MUX B", 5));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.start, 4);
        assert_eq!(replacement.end, 5);
        assert_eq!(replacement.value, "b");
        assert_eq!(options.as_slice(), ["b"]);
    }

    #[test]
    fn help_topics_list_commands() {
        let engine = CompletionEngine::new();
        let (replacement, options) = expect_options(engine.complete("help m", 6));
        let replacement = replacement.expect("expected replacement");
        assert_eq!(replacement.value, "mux");
        assert!(!replacement.append_space);
        assert_eq!(options.as_slice(), ["mux"]);
    }

    #[test]
    fn nothing_after_a_complete_command() {
        let engine = CompletionEngine::new();
        assert!(engine.complete("uart on ", 8).options.is_empty());
        assert!(engine.complete("status ", 7).options.is_empty());
        assert!(engine.complete("bogus ", 6).options.is_empty());
    }
}
