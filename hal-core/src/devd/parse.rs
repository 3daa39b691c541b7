// SPDX-License-Identifier: GPL-3.0-only

//! devd event grammar
//!
//! ```text
//! +ugen0 vendor=0x0a12 sernum="" at port=0 on uhub3     attach
//! -ugen0 vendor=0x0a12 sernum="" at port=0 on uhub3     detach
//! !system=IFNET subsystem=bge0 type=LINK_DOWN [data]    notify
//! ? at port=0 vendor=0x0a12 on uhub3                    nomatch
//! ```
//!
//! A parent of `.` is the root of the kernel device tree and reads as no
//! parent. Values wrapped in double quotes are unquoted; a bare key has no
//! value.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty event")]
    Empty,

    #[error("unknown event tag {0:?}")]
    UnknownTag(char),

    #[error("malformed {kind} event: {line}")]
    Malformed { kind: EventKind, line: String },
}

pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Add,
    Remove,
    Notify,
    NoMatch,
}

impl EventKind {
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            '+' => Some(Self::Add),
            '-' => Some(Self::Remove),
            '!' => Some(Self::Notify),
            '?' => Some(Self::NoMatch),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Notify => "notify",
            Self::NoMatch => "nomatch",
        })
    }
}

/// `key=value` pairs of one clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: BTreeMap<String, Option<String>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `key`; `None` both when absent and when the key was bare.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Option::as_deref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    fn push_token(&mut self, token: &str) {
        match token.split_once('=') {
            Some((key, value)) => self.insert(key, Some(unquote(value).to_string())),
            None => self.insert(token, None),
        }
    }
}

/// Payload of `+` and `-` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachEvent {
    pub name: String,
    pub params: Params,
    pub at: Params,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEvent {
    pub system: String,
    pub subsystem: String,
    pub kind: String,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoMatchEvent {
    pub at: Params,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevdEvent {
    Add(AttachEvent),
    Remove(AttachEvent),
    Notify(NotifyEvent),
    NoMatch(NoMatchEvent),
}

impl DevdEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Add(_) => EventKind::Add,
            Self::Remove(_) => EventKind::Remove,
            Self::Notify(_) => EventKind::Notify,
            Self::NoMatch(_) => EventKind::NoMatch,
        }
    }
}

/// Parse one line read from the devd socket. A trailing newline is ignored.
pub fn parse_event(line: &str) -> Result<DevdEvent> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut chars = line.chars();
    let tag = chars.next().ok_or(ParseError::Empty)?;
    let kind = EventKind::from_tag(tag).ok_or(ParseError::UnknownTag(tag))?;
    let body = chars.as_str();

    let malformed = || ParseError::Malformed {
        kind,
        line: line.to_string(),
    };

    match kind {
        EventKind::Add => parse_attach(body).map(DevdEvent::Add).ok_or_else(malformed),
        EventKind::Remove => parse_attach(body).map(DevdEvent::Remove).ok_or_else(malformed),
        EventKind::Notify => parse_notify(body).map(DevdEvent::Notify).ok_or_else(malformed),
        EventKind::NoMatch => parse_nomatch(body).map(DevdEvent::NoMatch).ok_or_else(malformed),
    }
}

#[derive(Clone, Copy)]
enum Clause {
    Params,
    At,
}

/// Shared tail of attach and nomatch lines: `[k=v ...] [at k=v ...] [on parent]`.
struct Clauses {
    params: Params,
    at: Params,
    saw_at: bool,
    parent: Option<Option<String>>,
}

fn parse_clauses(tokens: &[&str]) -> Option<Clauses> {
    let mut clauses = Clauses {
        params: Params::new(),
        at: Params::new(),
        saw_at: false,
        parent: None,
    };
    let mut clause = Clause::Params;

    let mut iter = tokens.iter();
    while let Some(&token) = iter.next() {
        match token {
            "at" if !clauses.saw_at => {
                clauses.saw_at = true;
                clause = Clause::At;
            }
            "on" => {
                let parent = iter.next()?;
                if iter.next().is_some() {
                    return None;
                }
                clauses.parent = Some(match *parent {
                    "." => None,
                    parent => Some(parent.to_string()),
                });
            }
            token => match clause {
                Clause::Params => clauses.params.push_token(token),
                Clause::At => clauses.at.push_token(token),
            },
        }
    }

    Some(clauses)
}

fn parse_attach(body: &str) -> Option<AttachEvent> {
    let tokens = tokenize(body)?;
    let (name, rest) = tokens.split_first()?;
    if name.contains('=') || *name == "at" || *name == "on" {
        return None;
    }

    let clauses = parse_clauses(rest)?;
    Some(AttachEvent {
        name: name.to_string(),
        params: clauses.params,
        at: clauses.at,
        parent: clauses.parent.flatten(),
    })
}

fn parse_nomatch(body: &str) -> Option<NoMatchEvent> {
    let tokens = tokenize(body)?;
    let start = tokens.iter().position(|token| *token == "at")?;
    let clauses = parse_clauses(&tokens[start..])?;

    // Both markers are required here, there is nothing else to go on.
    let parent = clauses.parent?;
    Some(NoMatchEvent {
        at: clauses.at,
        parent,
    })
}

fn parse_notify(body: &str) -> Option<NotifyEvent> {
    let mut items = body.splitn(4, ' ');
    let system = items.next()?.strip_prefix("system=")?;
    let subsystem = items.next()?.strip_prefix("subsystem=")?;
    let kind = items.next()?.strip_prefix("type=")?;
    let data = items.next().map(str::to_string);

    Some(NotifyEvent {
        system: system.to_string(),
        subsystem: subsystem.to_string(),
        kind: kind.to_string(),
        data,
    })
}

/// Split on spaces, keeping double-quoted runs (`sernum="a b"`) together.
/// `None` when a quote is left open.
fn tokenize(body: &str) -> Option<Vec<&str>> {
    let mut tokens = Vec::new();
    let mut start = None;
    let mut quoted = false;

    for (index, c) in body.char_indices() {
        match c {
            '"' => {
                quoted = !quoted;
                start.get_or_insert(index);
            }
            c if c.is_ascii_whitespace() && !quoted => {
                if let Some(begin) = start.take() {
                    tokens.push(&body[begin..index]);
                }
            }
            _ => {
                start.get_or_insert(index);
            }
        }
    }
    if quoted {
        return None;
    }
    if let Some(begin) = start {
        tokens.push(&body[begin..]);
    }

    Some(tokens)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
