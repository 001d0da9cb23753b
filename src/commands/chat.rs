//! Interactive chat mode handler.
//!
//! Wires a [`LocalTransport`] to a [`GraphSyncManager`] and runs a
//! readline-based loop. Plain input is sent to the provider; special commands
//! edit, regenerate, navigate and delete turns of the conversation graph.

use crate::commands::history::{format_message_line, print_chat_list, render_tree};
use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::error::{ChatloomError, Result};
use crate::graph::{ChatMessage, Role, SiblingPosition};
use crate::providers::{create_provider, Provider};
use crate::storage::{ChatStore, SqliteStorage};
use crate::sync::{GraphSyncManager, TitleGenerator};
use crate::transport::{ChatTransport, LocalTransport};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

/// One open chat: its graph manager plus the linear transport it observes
pub struct ChatSession {
    manager: GraphSyncManager,
    transport: LocalTransport,
    provider: Arc<dyn Provider>,
    store: Arc<dyn ChatStore>,
    titler: Option<TitleGenerator>,
    greeting: Option<String>,
}

impl ChatSession {
    /// Starts a new chat
    pub async fn create(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn Provider>,
        titler: Option<TitleGenerator>,
        character_ids: Vec<String>,
        greeting: Option<String>,
    ) -> Result<Self> {
        let manager = GraphSyncManager::create(
            store.clone(),
            titler.clone(),
            character_ids,
            greeting_messages(greeting.as_deref()),
        )
        .await?;

        Ok(Self {
            transport: LocalTransport::with_messages(manager.initial_messages()),
            manager,
            provider,
            store,
            titler,
            greeting,
        })
    }

    /// Opens a stored chat by id or id prefix
    ///
    /// # Errors
    ///
    /// Returns `ChatloomError::Command` if no such chat is stored
    pub async fn resume(
        store: Arc<dyn ChatStore>,
        provider: Arc<dyn Provider>,
        titler: Option<TitleGenerator>,
        id: &str,
        greeting: Option<String>,
    ) -> Result<Self> {
        let manager = open_existing(&store, titler.clone(), id).await?;

        Ok(Self {
            transport: LocalTransport::with_messages(manager.initial_messages()),
            manager,
            provider,
            store,
            titler,
            greeting,
        })
    }

    pub fn manager(&self) -> &GraphSyncManager {
        &self.manager
    }

    /// Visible transcript
    pub fn messages(&self) -> &[ChatMessage] {
        self.transport.messages()
    }

    /// Sends a user message and waits for the reply
    pub async fn send(&mut self, text: &str) -> Result<()> {
        self.transport.submit(ChatMessage::user(text));
        self.reply().await
    }

    /// Rewrites message `index` (1-based) on a new branch
    ///
    /// Editing a user message asks for a fresh reply; other messages are
    /// replaced as written.
    pub async fn edit(&mut self, index: usize, text: &str) -> Result<()> {
        let original = self.message_at(index)?.clone();
        self.branch_before(&original.id, index)?;

        let edited = ChatMessage::new(original.role, text);
        self.transport.submit(edited);
        if original.role == Role::User {
            self.reply().await
        } else {
            self.transport.finish();
            self.manager.observe(&self.transport).await?;
            Ok(())
        }
    }

    /// Asks for a new version of the last reply, keeping the old one as a
    /// sibling branch
    pub async fn regenerate(&mut self) -> Result<()> {
        let index = self
            .transport
            .messages()
            .iter()
            .rposition(|message| message.role == Role::Assistant)
            .map(|position| position + 1)
            .ok_or_else(|| ChatloomError::Command("Nothing to regenerate".to_string()))?;
        let message_id = self.message_at(index)?.id.clone();

        self.branch_before(&message_id, index)?;
        self.reply().await
    }

    /// Cycles the turn of message `index` by `offset` siblings
    ///
    /// Returns false when the turn has no alternatives.
    pub async fn navigate(&mut self, index: usize, offset: isize) -> Result<bool> {
        let message_id = self.message_at(index)?.id.clone();
        match self.manager.select_branch(&message_id, offset) {
            Some(messages) => {
                self.transport.replace_messages(messages);
                self.manager.save().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deletes the turn of message `index` and everything after it
    pub async fn delete(&mut self, index: usize) -> Result<()> {
        let message_id = self.message_at(index)?.id.clone();
        self.manager.delete_message(&message_id).await?;
        self.transport
            .replace_messages(self.manager.initial_messages());
        Ok(())
    }

    /// Sets the title, or generates one when `title` is `None`
    pub async fn retitle(&mut self, title: Option<String>) -> Result<Option<String>> {
        match title {
            Some(title) => {
                self.manager.set_title(title.clone()).await?;
                Ok(Some(title))
            }
            None => self.manager.regenerate_title().await,
        }
    }

    /// Replaces the current chat with a fresh one
    pub async fn new_chat(&mut self) -> Result<()> {
        let manager = GraphSyncManager::create(
            self.store.clone(),
            self.titler.clone(),
            self.manager.character_ids().to_vec(),
            greeting_messages(self.greeting.as_deref()),
        )
        .await?;
        self.switch_to(manager);
        Ok(())
    }

    /// Replaces the current chat with a stored one
    pub async fn open_chat(&mut self, id: &str) -> Result<()> {
        let manager = open_existing(&self.store, self.titler.clone(), id).await?;
        self.switch_to(manager);
        Ok(())
    }

    /// Sibling position of message `index`'s turn
    pub fn sibling_position(&mut self, index: usize) -> SiblingPosition {
        let Ok(message_id) = self.message_at(index).map(|message| message.id.clone()) else {
            return SiblingPosition::default();
        };
        self.manager.get_sibling_count(&message_id)
    }

    fn switch_to(&mut self, manager: GraphSyncManager) {
        // The transport must hold the new chat's messages before anything
        // observes it again
        self.transport
            .replace_messages(manager.initial_messages());
        self.manager = manager;
        tracing::info!("Switched to chat {}", self.manager.id());
    }

    fn branch_before(&mut self, message_id: &str, index: usize) -> Result<()> {
        let branch_point = match self.manager.vertex_for_message(message_id) {
            None => {
                return Err(ChatloomError::Command(format!(
                    "Message {} has not been saved yet",
                    index
                ))
                .into())
            }
            Some(vertex_id) if vertex_id == self.manager.id() => {
                return Err(ChatloomError::Command(format!(
                    "Message {} is part of the chat opening and cannot be branched",
                    index
                ))
                .into())
            }
            Some(_) => self
                .manager
                .branch_point_for_message(message_id)
                .ok_or_else(|| ChatloomError::UnknownMessage(message_id.to_string()))?,
        };

        if !self.manager.set_branch_point(&branch_point) {
            return Err(ChatloomError::UnknownVertex(branch_point).into());
        }
        self.transport.truncate(index - 1);
        Ok(())
    }

    async fn reply(&mut self) -> Result<()> {
        self.manager.set_pending_messages(self.transport.messages());

        match self.provider.complete(self.transport.messages()).await {
            Ok(text) => {
                self.transport.begin_reply(Role::Assistant);
                self.transport.append_reply_text(&text);
                self.transport.finish();
            }
            Err(e) => {
                self.transport.fail();
                self.manager.clear_pending_messages();
                return Err(e);
            }
        }

        let reply = self
            .transport
            .last()
            .cloned()
            .ok_or_else(|| ChatloomError::Command("Reply was not recorded".to_string()))?;
        self.manager.commit_on_finish(reply).await?;
        Ok(())
    }

    fn message_at(&self, index: usize) -> Result<&ChatMessage> {
        index
            .checked_sub(1)
            .and_then(|position| self.transport.messages().get(position))
            .ok_or_else(|| ChatloomError::Command(format!("No message [{}]", index)).into())
    }
}

fn greeting_messages(greeting: Option<&str>) -> Vec<ChatMessage> {
    greeting
        .filter(|text| !text.trim().is_empty())
        .map(|text| vec![ChatMessage::assistant(text)])
        .unwrap_or_default()
}

async fn open_existing(
    store: &Arc<dyn ChatStore>,
    titler: Option<TitleGenerator>,
    id: &str,
) -> Result<GraphSyncManager> {
    let record = store
        .load(id)
        .await?
        .ok_or_else(|| ChatloomError::Command(format!("Chat not found: {}", id)))?;
    GraphSyncManager::open(record.id(), store.clone(), titler).await
}

/// Start interactive chat mode
///
/// # Arguments
///
/// * `config` - Global configuration (consumed)
/// * `resume` - Optional id (or prefix) of a stored chat to continue
/// * `characters` - Characters for a new chat; config defaults when empty
pub async fn run_chat(config: Config, resume: Option<String>, characters: Vec<String>) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let store: Arc<dyn ChatStore> =
        Arc::new(SqliteStorage::open(config.storage.history_db.as_deref())?);
    let provider = create_provider(&config.provider)?;
    let titler = Some(TitleGenerator::new(provider.clone(), config.title.clone()));
    let greeting = config.chat.greeting.clone();

    let mut session = match resume {
        Some(id) => {
            tracing::debug!("Resuming chat: {}", id);
            let mut session =
                ChatSession::resume(store, provider, titler, &id, greeting).await?;
            if !characters.is_empty() {
                session.manager.set_character_ids(characters).await?;
            }
            session
        }
        None => {
            let characters = if characters.is_empty() {
                config.chat.character_ids.clone()
            } else {
                characters
            };
            ChatSession::create(store, provider, titler, characters, greeting).await?
        }
    };

    let mut rl = DefaultEditor::new()?;

    print_welcome_banner(&session);
    print_transcript(&mut session);

    loop {
        match rl.readline(&format!("{} ", ">>".cyan().bold())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                let command = match parse_special_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}\n", e.to_string().red());
                        continue;
                    }
                };
                if command == SpecialCommand::Exit {
                    break;
                }

                if let Err(e) = handle_command(&mut session, command, trimmed).await {
                    eprintln!("{}\n", format!("Error: {}", e).red());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

async fn handle_command(
    session: &mut ChatSession,
    command: SpecialCommand,
    input: &str,
) -> Result<()> {
    match command {
        SpecialCommand::None => {
            session.send(input).await?;
            print_last_message(session);
        }
        SpecialCommand::Edit { index, text } => {
            session.edit(index, &text).await?;
            print_transcript(session);
        }
        SpecialCommand::Regenerate => {
            session.regenerate().await?;
            print_last_message(session);
        }
        SpecialCommand::NextBranch(index) => navigate(session, index, 1).await?,
        SpecialCommand::PrevBranch(index) => navigate(session, index, -1).await?,
        SpecialCommand::Delete(index) => {
            session.delete(index).await?;
            println!("{}", format!("Deleted message {} and its replies", index).green());
            print_transcript(session);
        }
        SpecialCommand::Tree => {
            print!("{}", render_tree(session.manager().graph()));
            println!();
        }
        SpecialCommand::Title(title) => match session.retitle(title).await? {
            Some(title) => println!("{} {}\n", "Title:".bold(), title),
            None => println!("{}\n", "Could not generate a title".yellow()),
        },
        SpecialCommand::New => {
            session.new_chat().await?;
            print_welcome_banner(session);
            print_transcript(session);
        }
        SpecialCommand::Open(id) => {
            session.open_chat(&id).await?;
            print_welcome_banner(session);
            print_transcript(session);
        }
        SpecialCommand::Chats => print_chat_list(session.store.as_ref()).await?,
        SpecialCommand::Help => print_help(),
        SpecialCommand::Exit => {}
    }

    Ok(())
}

async fn navigate(session: &mut ChatSession, index: usize, offset: isize) -> Result<()> {
    if session.navigate(index, offset).await? {
        print_transcript(session);
    } else {
        println!("{}\n", format!("Message {} has no alternatives", index).yellow());
    }
    Ok(())
}

fn print_welcome_banner(session: &ChatSession) {
    let manager = session.manager();
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                 Chatloom Interactive Chat                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!(
        "Chat:       {} {}",
        manager.title().unwrap_or("(untitled)").bold(),
        format!("[{}]", manager.id()).dimmed()
    );
    if !manager.character_ids().is_empty() {
        println!("Characters: {}", manager.character_ids().join(", "));
    }
    println!("Type '/help' for available commands, 'exit' to quit\n");
}

fn print_transcript(session: &mut ChatSession) {
    for index in 1..=session.messages().len() {
        let position = session.sibling_position(index);
        println!(
            "{}",
            format_message_line(index, &session.messages()[index - 1], position)
        );
    }
    println!();
}

fn print_last_message(session: &mut ChatSession) {
    let index = session.messages().len();
    if index == 0 {
        return;
    }
    let position = session.sibling_position(index);
    println!(
        "\n{}\n",
        format_message_line(index, &session.messages()[index - 1], position)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;
    use crate::storage::MemoryStore;

    fn echo_provider() -> Arc<dyn Provider> {
        let mut provider = MockProvider::new();
        provider.expect_complete().returning(|messages| {
            Ok(format!(
                "echo: {}",
                messages.last().map(|m| m.text()).unwrap_or_default()
            ))
        });
        provider.expect_name().return_const("echo");
        Arc::new(provider)
    }

    async fn session() -> (ChatSession, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = ChatSession::create(
            store.clone(),
            echo_provider(),
            None,
            vec!["alice".to_string()],
            None,
        )
        .await
        .unwrap();
        (session, store)
    }

    fn texts(session: &ChatSession) -> Vec<String> {
        session.messages().iter().map(|m| m.text()).collect()
    }

    #[tokio::test]
    async fn test_send_commits_user_and_reply() {
        let (mut session, _store) = session().await;
        session.send("hello").await.unwrap();

        assert_eq!(texts(&session), vec!["hello", "echo: hello"]);
        assert_eq!(session.manager().graph().vertex_count(), 3);
        assert_eq!(session.manager().initial_messages(), session.messages());
        assert!(session.manager().pending_messages().is_none());
    }

    #[tokio::test]
    async fn test_edit_creates_branch_and_navigation_restores_original() {
        let (mut session, _store) = session().await;
        session.send("hello").await.unwrap();
        session.edit(1, "howdy").await.unwrap();

        assert_eq!(texts(&session), vec!["howdy", "echo: howdy"]);
        assert_eq!(
            session.sibling_position(1),
            SiblingPosition { current: 2, total: 2 }
        );

        assert!(session.navigate(1, -1).await.unwrap());
        assert_eq!(texts(&session), vec!["hello", "echo: hello"]);
        assert!(session.navigate(1, 1).await.unwrap());
        assert_eq!(texts(&session), vec!["howdy", "echo: howdy"]);
    }

    #[tokio::test]
    async fn test_regenerate_adds_sibling_reply() {
        let (mut session, _store) = session().await;
        session.send("hello").await.unwrap();
        session.regenerate().await.unwrap();

        assert_eq!(texts(&session), vec!["hello", "echo: hello"]);
        assert_eq!(
            session.sibling_position(2),
            SiblingPosition { current: 2, total: 2 }
        );
        assert!(!session.navigate(1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_drops_turn_and_following() {
        let (mut session, _store) = session().await;
        session.send("one").await.unwrap();
        session.send("two").await.unwrap();
        session.delete(3).await.unwrap();

        assert_eq!(texts(&session), vec!["one", "echo: one"]);
        assert!(session.delete(9).await.is_err());
    }

    #[tokio::test]
    async fn test_new_and_open_swap_transport_with_graph() {
        let (mut session, store) = session().await;
        session.send("first chat").await.unwrap();
        let first_id = session.manager().id().to_string();

        session.new_chat().await.unwrap();
        assert!(session.messages().is_empty());
        assert_ne!(session.manager().id(), first_id);
        assert_eq!(session.manager().character_ids(), ["alice".to_string()]);

        session.send("second chat").await.unwrap();
        session.open_chat(&first_id[..8]).await.unwrap();
        assert_eq!(texts(&session), vec!["first chat", "echo: first chat"]);

        let first = store.load(&first_id).await.unwrap().unwrap();
        assert_eq!(first.snapshot.vertices.len(), 3);
        assert!(session.open_chat("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_message_for_next_commit() {
        let mut provider = MockProvider::new();
        let mut seq = mockall::Sequence::new();
        provider
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ChatloomError::Provider("offline".to_string()).into()));
        provider
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("back online".to_string()));
        provider.expect_name().return_const("mock");

        let store = Arc::new(MemoryStore::new());
        let mut session = ChatSession::create(store, Arc::new(provider), None, Vec::new(), None)
            .await
            .unwrap();

        assert!(session.send("are you there?").await.is_err());
        assert_eq!(session.manager().graph().vertex_count(), 1);
        assert!(session.manager().pending_messages().is_none());

        session.send("hello?").await.unwrap();
        assert_eq!(
            texts(&session),
            vec!["are you there?", "hello?", "back online"]
        );
        assert_eq!(session.manager().graph().vertex_count(), 4);
    }

    #[tokio::test]
    async fn test_greeting_seeds_root() {
        let store = Arc::new(MemoryStore::new());
        let session = ChatSession::create(
            store,
            echo_provider(),
            None,
            Vec::new(),
            Some("Welcome in!".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(texts(&session), vec!["Welcome in!"]);
        assert_eq!(session.manager().graph().vertex_count(), 1);
    }

    #[tokio::test]
    async fn test_opening_turn_cannot_be_branched() {
        let store = Arc::new(MemoryStore::new());
        let mut session = ChatSession::create(
            store,
            echo_provider(),
            None,
            Vec::new(),
            Some("Welcome in!".to_string()),
        )
        .await
        .unwrap();

        let err = session.regenerate().await.unwrap_err();
        assert!(err.to_string().contains("chat opening"));
        let err = session.edit(1, "Hello instead").await.unwrap_err();
        assert!(err.to_string().contains("cannot be branched"));
        assert!(!err.to_string().contains("not been saved"));
        assert_eq!(texts(&session), vec!["Welcome in!"]);
    }

    #[tokio::test]
    async fn test_reply_commits_pending_snapshot_with_reply() {
        let (mut session, _store) = session().await;
        session.send("one").await.unwrap();
        session.send("two").await.unwrap();

        let manager = session.manager();
        assert!(manager.pending_messages().is_none());
        for message in session.messages() {
            assert!(manager.vertex_for_message(&message.id).is_some());
        }
        assert_eq!(manager.graph().vertex_count(), 5);
    }
}
