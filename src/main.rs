use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;

use mao_pad::app::infrastructure::paths;
use mao_pad::app::{AppState, Message, SessionState, SettingsStore, WindowGeometry};
use mao_pad::ui::console::{Command, ConsoleDialogs, HELP};

fn spawn_stdin_reader(sender: Sender<Message>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.send(Message::Input(line)).is_err() {
                return;
            }
        }
        let _ = sender.send(Message::InputClosed);
    });
}

fn print_documents(app: &AppState) {
    let active = app.documents().active_id();
    for (i, doc) in app.documents().documents().iter().enumerate() {
        let marker = if Some(doc.id) == active { '>' } else { ' ' };
        let path = doc
            .file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not saved)".to_string());
        println!("{} {} {}  {}", marker, i + 1, doc.display_title(), path);
    }
}

fn print_active(app: &AppState) {
    if let Some(doc) = app.documents().active_doc() {
        let (line, column) = doc.caret_position();
        println!("--- {} (Ln {}, Col {}) ---", doc.display_title(), line, column);
        println!("{}", doc.content());
        for hl in app.highlights() {
            let mark = if hl.current { "*" } else { " " };
            println!("{} match at {}..{}", mark, hl.span.start, hl.span.end());
        }
    }
}

fn window_geometry(app: &AppState) -> WindowGeometry {
    let s = app.settings().get();
    WindowGeometry {
        width: s.window_width,
        height: s.window_height,
        left: s.window_left,
        top: s.window_top,
    }
}

/// Run one console command. Returns true once the session has closed.
fn run_command(app: &mut AppState, cmd: Command, dialogs: &mut ConsoleDialogs) -> bool {
    let active = app.documents().active_id();
    let result = match cmd {
        Command::New => {
            app.new_tab();
            Ok(())
        }
        Command::Open(Some(path)) => app.open_file(&path).map(|_| ()),
        Command::Open(None) => app.file_open(dialogs).map(|_| ()),
        Command::List => {
            print_documents(app);
            Ok(())
        }
        Command::Show => {
            print_active(app);
            Ok(())
        }
        Command::Next => {
            app.switch_to_next_tab();
            Ok(())
        }
        Command::Prev => {
            app.switch_to_previous_tab();
            Ok(())
        }
        Command::Switch(n) => {
            let id = app.documents().documents().get(n.wrapping_sub(1)).map(|d| d.id);
            match id {
                Some(id) => app.switch_to_document(id),
                None => println!("no tab {}", n),
            }
            Ok(())
        }
        Command::Append(text) => {
            let mut content = app
                .documents()
                .active_doc()
                .map(|d| d.content().to_string())
                .unwrap_or_default();
            content.push_str(&text);
            let end = content.len();
            app.edit_active(content);
            app.move_caret(end);
            Ok(())
        }
        Command::Set(text) => {
            app.edit_active(text);
            Ok(())
        }
        Command::Caret(offset) => {
            app.move_caret(offset);
            Ok(())
        }
        Command::Find(text) => {
            if !text.is_empty() {
                app.find.find_text = text;
            }
            app.find_next();
            Ok(())
        }
        Command::FindPrev => {
            app.find_previous();
            Ok(())
        }
        Command::Replace(with) => {
            app.find.replace_text = with;
            app.replace();
            Ok(())
        }
        Command::ReplaceAll(with) => {
            app.find.replace_text = with;
            app.replace_all();
            Ok(())
        }
        Command::Case(on) => {
            app.find.case_sensitive = on;
            Ok(())
        }
        Command::Word(on) => {
            app.find.whole_word = on;
            Ok(())
        }
        Command::Save => match active {
            Some(id) => app.save(id, dialogs).map(|_| ()),
            None => Ok(()),
        },
        Command::SaveAs => match active {
            Some(id) => app.save_as(id, dialogs).map(|_| ()),
            None => Ok(()),
        },
        Command::SaveAll => app.save_all(dialogs).map(|_| ()),
        Command::Rename => match active {
            Some(id) => app.rename(id, dialogs).map(|_| ()),
            None => Ok(()),
        },
        Command::Close => match active {
            Some(id) => app.close_tab(id, dialogs).map(|_| ()),
            None => Ok(()),
        },
        Command::Theme => {
            let dark = app.toggle_theme();
            println!("theme: {}", if dark { "dark" } else { "light" });
            Ok(())
        }
        Command::Topmost(on) => {
            app.set_topmost_preference(on);
            Ok(())
        }
        Command::Opacity(value) => {
            println!("opacity: {}", app.set_window_opacity(value));
            Ok(())
        }
        Command::Autosave(on) => {
            app.set_autosave_enabled(on);
            Ok(())
        }
        Command::Interval(secs) => {
            app.set_autosave_interval(secs);
            Ok(())
        }
        Command::Purge => {
            println!("purged {} snapshot(s)", app.purge_old_snapshots());
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Quit => {
            let geometry = window_geometry(app);
            app.request_close(Some(geometry), dialogs).map(|_| ())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }
    println!("[{}]", app.status());
    app.session_state() == SessionState::Closed
}

fn main() {
    env_logger::init();

    let (sender, receiver) = mpsc::channel::<Message>();
    let settings = SettingsStore::load();
    let mut app = AppState::new(settings, paths::autosave_dir(), sender.clone());

    let purged = app.purge_old_snapshots();
    if purged > 0 {
        log::info!("Purged {} expired autosave snapshot(s)", purged);
    }

    for arg in std::env::args().skip(1) {
        if let Err(e) = app.open_file(&PathBuf::from(&arg)) {
            eprintln!("Error: {}", e);
        }
    }

    spawn_stdin_reader(sender);
    println!("{}", HELP);

    let mut pending: VecDeque<Message> = VecDeque::new();
    loop {
        let msg = match pending.pop_front() {
            Some(msg) => msg,
            None => match receiver.recv() {
                Ok(msg) => msg,
                Err(_) => break,
            },
        };

        let mut dialogs = ConsoleDialogs::new(&receiver);
        let closed = match msg {
            Message::Input(line) if line.trim().is_empty() => false,
            Message::Input(line) => match Command::parse(&line) {
                Ok(cmd) => run_command(&mut app, cmd, &mut dialogs),
                Err(e) => {
                    eprintln!("{}", e);
                    false
                }
            },
            Message::InputClosed => {
                dialogs.mark_input_closed();
                let geometry = window_geometry(&app);
                match app.request_close(Some(geometry), &mut dialogs) {
                    Ok(SessionState::Closed) => true,
                    Ok(_) => {
                        // Nobody is left to answer prompts; keep the unsaved work as snapshots
                        let written = app.write_recovery_snapshots();
                        eprintln!(
                            "Input closed with unsaved changes; wrote {} recovery snapshot(s) to {}",
                            written,
                            app.autosave().dir().display()
                        );
                        true
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        true
                    }
                }
            }
            other => {
                app.handle_message(other);
                false
            }
        };
        pending.extend(dialogs.take_deferred());
        if !closed && dialogs.input_closed() {
            pending.push_back(Message::InputClosed);
        }

        if closed {
            break;
        }
    }
}
