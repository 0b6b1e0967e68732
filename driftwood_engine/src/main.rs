#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! ** Driftwood **
//! Terminal host for the Driftwood Adrift 4.0 runtime.

use std::io::Write;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use driftwood_engine::{Bundle, ConfirmKind, DRIFTWOOD_VERSION, Host, Session, Tag};
use env_logger::Env;
use log::{info, warn};
use rustyline::DefaultEditor;
use textwrap::{fill, termwidth};

/// Longest delay honored for a `<wait>` tag, in tenths of a second.
const MAX_WAIT_TENTHS: u64 = 50;

/// Terminal front end: styled output, rustyline input, file save slots.
struct TerminalHost {
    editor: DefaultEditor,
    bold: bool,
    italic: bool,
    underline: bool,
    save_dir: PathBuf,
}

impl TerminalHost {
    fn new(save_dir: PathBuf) -> Result<TerminalHost> {
        Ok(TerminalHost {
            editor: DefaultEditor::new().context("initializing line editor")?,
            bold: false,
            italic: false,
            underline: false,
            save_dir,
        })
    }

    fn ask(&mut self, question: &str) -> Result<String> {
        let line = self.editor.readline(question)?;
        Ok(line.trim().to_string())
    }

    fn save_path(&mut self, question: &str) -> Result<PathBuf> {
        let slot = self.ask(question)?;
        let slot = if slot.is_empty() { "save".to_string() } else { slot };
        let cleaned: String = slot
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect();
        Ok(self.save_dir.join(format!("{cleaned}.drift")))
    }
}

impl Host for TerminalHost {
    fn print(&mut self, text: &str) {
        let mut styled = text.normal();
        if self.bold {
            styled = styled.bold();
        }
        if self.italic {
            styled = styled.italic();
        }
        if self.underline {
            styled = styled.underline();
        }
        print!("{styled}");
    }

    fn print_tag(&mut self, tag: Tag, argument: &str) {
        match tag {
            Tag::Bold => self.bold = true,
            Tag::EndBold => self.bold = false,
            Tag::Italics => self.italic = true,
            Tag::EndItalics => self.italic = false,
            Tag::Underline => self.underline = true,
            Tag::EndUnderline => self.underline = false,
            Tag::Cls => print!("\x1B[2J\x1B[H"),
            Tag::Wait => {
                self.flush();
                let tenths: u64 = argument.trim().parse().unwrap_or(10);
                thread::sleep(Duration::from_millis(tenths.min(MAX_WAIT_TENTHS) * 100));
            }
            Tag::WaitKey => {
                self.flush();
                let _ = self.editor.readline("[press Enter]");
            }
            // Colors, fonts, and alignment are beyond a plain terminal.
            _ => {}
        }
    }

    fn flush(&mut self) {
        let _ = std::io::stdout().flush();
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        let line = self.editor.readline(prompt)?;
        let _ = self.editor.add_history_entry(line.as_str());
        Ok(line)
    }

    fn confirm(&mut self, kind: ConfirmKind) -> bool {
        let question = match kind {
            ConfirmKind::Quit => "Are you sure you want to quit? [y/N] ",
            ConfirmKind::Restart => "Are you sure you want to restart? [y/N] ",
            ConfirmKind::Save => "Save the game? [y/N] ",
            ConfirmKind::Restore => "Restore a saved game? [y/N] ",
            ConfirmKind::ViewHints => "View hints? [y/N] ",
        };
        matches!(
            self.ask(question).as_deref(),
            Ok("y") | Ok("Y") | Ok("yes") | Ok("YES") | Ok("Yes")
        )
    }

    fn write_save(&mut self, payload: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.save_dir)
            .with_context(|| format!("creating {}", self.save_dir.display()))?;
        let path = self.save_path("Save slot name: ")?;
        std::fs::write(&path, payload).with_context(|| format!("writing {}", path.display()))?;
        info!("saved game to {}", path.display());
        Ok(())
    }

    fn read_save(&mut self) -> Result<Vec<u8>> {
        let path = self.save_path("Restore slot name: ")?;
        let payload =
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        info!("read save from {}", path.display());
        Ok(payload)
    }
}

fn default_save_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("driftwood")
        .join("saves")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();
    info!("starting Driftwood (version {DRIFTWOOD_VERSION})");

    let mut game_path = None;
    let mut debug_enabled = false;
    for argument in std::env::args().skip(1) {
        match argument.as_str() {
            "--debug" => debug_enabled = true,
            "--help" | "-h" => {
                println!(
                    "{}",
                    fill(
                        "Usage: driftwood_engine [--debug] <game.toml> -- run a compiled \
                         Adrift 4.0 game bundle in the terminal. With --debug, the in-game \
                         'debug' command opens the state inspector.",
                        termwidth()
                    )
                );
                return Ok(());
            }
            other if game_path.is_none() => game_path = Some(PathBuf::from(other)),
            other => bail!("unexpected argument {other:?}"),
        }
    }
    let Some(game_path) = game_path else {
        bail!("no game file given; try --help");
    };

    let bundle = Bundle::from_toml_path(&game_path)
        .with_context(|| format!("loading game bundle {}", game_path.display()))?;
    info!("game bundle loaded from {}", game_path.display());

    let host = TerminalHost::new(default_save_dir())?;
    let mut session = Session::new(bundle, host);
    if debug_enabled {
        session.set_debugger_enabled(true);
        warn!("debugger enabled; the 'debug' command opens the inspector");
    }

    let title = session.game().bundle.global_string("GameName").to_string();
    if !title.is_empty() {
        println!("{:^width$}", title.bright_yellow().underline(), width = termwidth());
    }

    session.run()
}
