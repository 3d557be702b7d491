//! Line-oriented console front-end.
//!
//! Stdin lines arrive as [`Message::Input`] on the same channel as the
//! autosave events. While a prompt waits for its answer, any other message is
//! set aside and handed back to the dispatch loop afterwards.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

use crate::app::domain::messages::Message;
use crate::ui::dialogs::{Dialogs, SaveChoice};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New,
    Open(Option<PathBuf>),
    List,
    Show,
    Next,
    Prev,
    Switch(usize),
    Append(String),
    Set(String),
    Caret(usize),
    Find(String),
    FindPrev,
    Replace(String),
    ReplaceAll(String),
    Case(bool),
    Word(bool),
    Save,
    SaveAs,
    SaveAll,
    Rename,
    Close,
    Theme,
    Topmost(bool),
    Opacity(f64),
    Autosave(bool),
    Interval(u32),
    Purge,
    Quit,
    Help,
}

pub const HELP: &str = "\
commands:
  new | open [path] | list | show | next | prev | switch <n>
  append <text> | set <text> | caret <offset>        (\\n in text is a newline)
  find <text> | findprev | replace <with> | replaceall <with> | case on|off | word on|off
  save | saveas | saveall | rename | close
  theme | topmost on|off | opacity <0.3-1.0> | autosave on|off | interval <secs> | purge
  quit";

fn unescape(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\t", "\t")
}

fn parse_switch(arg: &str) -> Result<bool, String> {
    match arg {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        other => Err(format!("expected on/off, got '{}'", other)),
    }
}

fn parse_number<T: std::str::FromStr>(arg: &str) -> Result<T, String> {
    arg.trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", arg))
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        let (word, rest) = match line.trim_start().split_once(' ') {
            Some((w, r)) => (w, r),
            None => (line.trim(), ""),
        };

        let cmd = match word {
            "new" => Command::New,
            "open" if rest.trim().is_empty() => Command::Open(None),
            "open" => Command::Open(Some(PathBuf::from(rest.trim()))),
            "list" => Command::List,
            "show" => Command::Show,
            "next" => Command::Next,
            "prev" => Command::Prev,
            "switch" => Command::Switch(parse_number(rest)?),
            "append" => Command::Append(unescape(rest)),
            "set" => Command::Set(unescape(rest)),
            "caret" => Command::Caret(parse_number(rest)?),
            "find" => Command::Find(unescape(rest)),
            "findprev" => Command::FindPrev,
            "replace" => Command::Replace(unescape(rest)),
            "replaceall" => Command::ReplaceAll(unescape(rest)),
            "case" => Command::Case(parse_switch(rest.trim())?),
            "word" => Command::Word(parse_switch(rest.trim())?),
            "save" => Command::Save,
            "saveas" => Command::SaveAs,
            "saveall" => Command::SaveAll,
            "rename" => Command::Rename,
            "close" => Command::Close,
            "theme" => Command::Theme,
            "topmost" => Command::Topmost(parse_switch(rest.trim())?),
            "opacity" => Command::Opacity(parse_number(rest)?),
            "autosave" => Command::Autosave(parse_switch(rest.trim())?),
            "interval" => Command::Interval(parse_number(rest)?),
            "purge" => Command::Purge,
            "quit" | "exit" => Command::Quit,
            "help" | "?" => Command::Help,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        };
        Ok(cmd)
    }
}

/// Prompts answered from console input.
pub struct ConsoleDialogs<'a> {
    rx: &'a Receiver<Message>,
    deferred: Vec<Message>,
    input_closed: bool,
}

impl<'a> ConsoleDialogs<'a> {
    pub fn new(rx: &'a Receiver<Message>) -> Self {
        Self {
            rx,
            deferred: Vec::new(),
            input_closed: false,
        }
    }

    /// Messages that arrived while a prompt was waiting.
    pub fn take_deferred(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.deferred)
    }

    pub fn input_closed(&self) -> bool {
        self.input_closed
    }

    /// Stdin is gone; every later prompt is answered as dismissed.
    pub fn mark_input_closed(&mut self) {
        self.input_closed = true;
    }

    fn ask(&mut self, prompt: &str) -> Option<String> {
        if self.input_closed {
            return None;
        }
        print!("{} ", prompt);
        let _ = io::stdout().flush();

        while let Ok(msg) = self.rx.recv() {
            match msg {
                Message::Input(line) => {
                    let line = line.trim().to_string();
                    return if line.is_empty() { None } else { Some(line) };
                }
                Message::InputClosed => {
                    self.input_closed = true;
                    return None;
                }
                other => self.deferred.push(other),
            }
        }
        None
    }
}

impl Dialogs for ConsoleDialogs<'_> {
    fn open_file(&mut self) -> Option<PathBuf> {
        self.ask("Open file:").map(PathBuf::from)
    }

    fn save_file(&mut self, suggested_name: &str) -> Option<PathBuf> {
        self.ask(&format!("Save as [{}]:", suggested_name))
            .map(PathBuf::from)
    }

    fn confirm_save(&mut self, document_title: &str) -> SaveChoice {
        let answer = self.ask(&format!(
            "\"{}\" has unsaved changes. Save? [y]es / [n]o / [c]ancel:",
            document_title
        ));
        match answer.as_deref().map(str::to_lowercase).as_deref() {
            Some("y") | Some("yes") => SaveChoice::Save,
            Some("n") | Some("no") => SaveChoice::Discard,
            _ => SaveChoice::Cancel,
        }
    }

    fn prompt_new_file_name(&mut self, current: &str) -> Option<String> {
        self.ask(&format!("New name for {}:", current))
    }
}
