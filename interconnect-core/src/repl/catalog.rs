//! Console command catalog expressed as a small grammar AST.
//!
//! The parser, completion engine and `help` output all read the same
//! structure, so keywords and usage strings cannot drift apart.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Uart,
    Mux,
    Status,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoiceTag {
    UartOff,
    UartOn,
    UartFlip,
    UartAuto,
    MuxOff,
    MuxA,
    MuxB,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    /// Zero or one keyword argument. A missing argument reports current state.
    OptionalChoice {
        choices: &'static [ChoiceBranch],
        next: &'static Node,
    },
    /// Free identifier naming another command.
    Topic { next: &'static Node },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChoiceBranch {
    pub keyword: &'static str,
    pub tag: ChoiceTag,
}

const END: Node = Node::End;

const UART_CHOICES: [ChoiceBranch; 4] = [
    ChoiceBranch {
        keyword: "off",
        tag: ChoiceTag::UartOff,
    },
    ChoiceBranch {
        keyword: "on",
        tag: ChoiceTag::UartOn,
    },
    ChoiceBranch {
        keyword: "flip",
        tag: ChoiceTag::UartFlip,
    },
    ChoiceBranch {
        keyword: "auto",
        tag: ChoiceTag::UartAuto,
    },
];

const UART_GRAMMAR: Node = Node::OptionalChoice {
    choices: &UART_CHOICES,
    next: &END,
};

const MUX_CHOICES: [ChoiceBranch; 3] = [
    ChoiceBranch {
        keyword: "off",
        tag: ChoiceTag::MuxOff,
    },
    ChoiceBranch {
        keyword: "a",
        tag: ChoiceTag::MuxA,
    },
    ChoiceBranch {
        keyword: "b",
        tag: ChoiceTag::MuxB,
    },
];

const MUX_GRAMMAR: Node = Node::OptionalChoice {
    choices: &MUX_CHOICES,
    next: &END,
};

const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 4] = [
    CommandSpec {
        name: "uart",
        tag: CommandTag::Uart,
        grammar: &UART_GRAMMAR,
        usage: "[off|on|flip|auto]",
        summary: "Get/set the flip and enable state of the SBU UART",
    },
    CommandSpec {
        name: "mux",
        tag: CommandTag::Mux,
        grammar: &MUX_GRAMMAR,
        usage: "[off|A|B]",
        summary: "Get/set the mux and enable state of the TYPE-C mux",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "",
        summary: "Show routes, probe voltages and debounce progress",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "[command]",
        summary: "List commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Looks up a command by its tag.
#[must_use]
pub fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Uart => &COMMANDS[0],
        CommandTag::Mux => &COMMANDS[1],
        CommandTag::Status => &COMMANDS[2],
        CommandTag::Help => &COMMANDS[3],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

/// Keywords accepted after `spec`, in catalog order.
pub fn keywords(spec: &'static CommandSpec) -> impl Iterator<Item = &'static str> {
    let choices: &'static [ChoiceBranch] = match spec.grammar {
        Node::OptionalChoice { choices, .. } => choices,
        Node::End | Node::Topic { .. } => &[],
    };
    choices.iter().map(|choice| choice.keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_tag_matches_catalog_order() {
        for spec in commands() {
            assert_eq!(command(spec.tag), spec);
        }
    }

    #[test]
    fn find_ignores_case() {
        assert_eq!(find("UART").map(|spec| spec.tag), Some(CommandTag::Uart));
        assert_eq!(find("Mux").map(|spec| spec.tag), Some(CommandTag::Mux));
        assert!(find("reboot").is_none());
    }

    #[test]
    fn keywords_follow_grammar() {
        let uart: heapless::Vec<&str, 4> = keywords(command(CommandTag::Uart)).collect();
        assert_eq!(uart.as_slice(), ["off", "on", "flip", "auto"]);
        assert_eq!(keywords(command(CommandTag::Status)).count(), 0);
    }
}
