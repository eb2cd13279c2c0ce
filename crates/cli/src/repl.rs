//! Interactive chat loop

use anyhow::{Context, Result};
use medibot_agents::ChatAgent;
use medibot_core::ChatHistory;
use medibot_db::HistoryStore;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const HELP: &str = "Commands:
  /new              - Start a new chat
  /chats            - List saved chats
  /open <id>        - Switch to a saved chat
  /sources [on|off] - Toggle research sources under answers
  /clear            - Delete every chat except the current one
  /export [id]      - Save a chat as markdown (current chat by default)
  /help             - Show this help
  /quit             - Exit
Anything else is sent to MediBot as a question.";

pub struct Repl {
    agent: ChatAgent,
    store: HistoryStore,
    profile: String,
    history: ChatHistory,
    current: Option<String>,
    show_sources: bool,
}

impl Repl {
    pub fn new(
        agent: ChatAgent,
        store: HistoryStore,
        profile: String,
        show_sources: bool,
    ) -> Result<Self> {
        let history = store
            .load(&profile)
            .with_context(|| format!("Failed to load chat history for '{}'", profile))?;

        Ok(Self {
            agent,
            store,
            profile,
            history,
            current: None,
            show_sources,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        println!("🏥 MediBot - Medical Assistant (profile: {})", self.profile);
        if !self.history.is_empty() {
            println!(
                "{} saved chats. Use /chats to list them and /open <id> to continue one.",
                self.history.len()
            );
        }
        println!(
            "Sources are {}. Type /help for commands.",
            on_off(self.show_sources)
        );
        println!();

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("you> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                println!();
                break; // EOF
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(command) = line.strip_prefix('/') {
                let (cmd, arg) = match command.split_once(char::is_whitespace) {
                    Some((cmd, arg)) => (cmd, arg.trim()),
                    None => (command, ""),
                };
                if !self.command(cmd, arg)? {
                    println!("Goodbye!");
                    break;
                }
            } else {
                self.ask(line).await?;
            }

            println!();
        }

        Ok(())
    }

    /// Handle a slash command; false means quit
    fn command(&mut self, cmd: &str, arg: &str) -> Result<bool> {
        match cmd {
            "new" | "n" => {
                let session = self.history.new_session();
                println!("✓ Started {} [{}]", session.title, session.id);
                self.current = Some(session.id.clone());
                self.save();
            }

            "chats" | "c" => {
                if self.history.is_empty() {
                    println!("No saved chats.");
                }
                for session in self.history.sessions_newest_first() {
                    let marker = if self.current.as_deref() == Some(session.id.as_str()) {
                        "*"
                    } else {
                        "•"
                    };
                    println!(
                        "{} {} [{}] {} · {} messages",
                        marker,
                        session.title,
                        session.id,
                        session.timestamp,
                        session.messages.len()
                    );
                }
            }

            "open" | "o" => {
                if arg.is_empty() {
                    println!("Usage: /open <id>");
                    return Ok(true);
                }
                match self.history.get(arg) {
                    Some(session) => {
                        println!("✓ Opened {} ({})\n", session.title, session.timestamp);
                        for message in &session.messages {
                            println!("{}: {}\n", message.role, message.content);
                        }
                        self.current = Some(session.id.clone());
                    }
                    None => println!("No chat with id {}", arg),
                }
            }

            "sources" | "s" => {
                self.show_sources = match arg {
                    "" => !self.show_sources,
                    "on" => true,
                    "off" => false,
                    _ => {
                        println!("Usage: /sources [on|off]");
                        return Ok(true);
                    }
                };
                println!("Sources {}", on_off(self.show_sources));
            }

            "clear" => {
                match &self.current {
                    Some(id) => {
                        let id = id.clone();
                        self.history.retain_only(&id);
                        println!("✓ Cleared chat history, kept the current chat");
                    }
                    None => {
                        self.history.clear();
                        println!("✓ Cleared chat history");
                    }
                }
                self.save();
            }

            "export" | "e" => {
                let id = if arg.is_empty() {
                    match &self.current {
                        Some(id) => id.clone(),
                        None => {
                            println!("No current chat. Usage: /export <id>");
                            return Ok(true);
                        }
                    }
                } else {
                    arg.to_string()
                };

                match self.history.get(&id) {
                    Some(session) => {
                        let path = PathBuf::from(format!("medibot_chat_{}.md", id));
                        match std::fs::write(&path, session.to_markdown()) {
                            Ok(()) => println!("✓ Exported to {}", path.display()),
                            Err(e) => println!("Error: failed to write {}: {}", path.display(), e),
                        }
                    }
                    None => println!("No chat with id {}", id),
                }
            }

            "help" | "h" | "?" => println!("{}", HELP),

            "quit" | "q" | "exit" => return Ok(false),

            _ => println!("Unknown command: /{}. Type /help for available commands.", cmd),
        }

        Ok(true)
    }

    /// Send a question, streaming the answer to stdout
    async fn ask(&mut self, question: &str) -> Result<()> {
        let existing = self
            .current
            .clone()
            .filter(|id| self.history.get(id).is_some());
        let id = match existing {
            Some(id) => id,
            None => {
                let id = self.history.new_session().id.clone();
                self.current = Some(id.clone());
                id
            }
        };
        let session = self.history.require_mut(&id)?;

        print!("\nmedibot> ");
        io::stdout().flush()?;

        let result = self
            .agent
            .respond_streaming(session, question, self.show_sources, &mut |text: &str| {
                print!("{}", text);
                let _ = io::stdout().flush();
            })
            .await;

        match result {
            Ok(reply) => {
                println!("{}", reply.sources_suffix());
                self.save();
            }
            Err(e) => println!("\nError: {}", e),
        }

        Ok(())
    }

    /// Persist the history; failures are reported but keep the session going
    fn save(&self) {
        if let Err(e) = self.store.save(&self.profile, &self.history) {
            eprintln!("Warning: failed to save chat history: {}", e);
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
