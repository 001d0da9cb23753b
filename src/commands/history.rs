use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::{ChatloomError, Result};
use crate::graph::{ChatGraph, ChatMessage, Role, SiblingPosition};
use crate::storage::{ChatStore, SqliteStorage};
use colored::Colorize;
use prettytable::{format, Table};
use std::collections::HashSet;

/// Handle history commands
pub async fn handle_history(command: HistoryCommand, config: &Config) -> Result<()> {
    let storage = SqliteStorage::open(config.storage.history_db.as_deref())?;

    match command {
        HistoryCommand::List => {
            print_chat_list(&storage).await?;
            println!(
                "Use {} to resume a chat.",
                "chatloom chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id, check } => {
            let graph = load_graph(&storage, &id).await?;
            if check {
                graph.check_integrity()?;
                println!("{}", "Graph integrity OK".green());
            }
            let positions = sibling_positions(&graph);
            for (index, message) in graph.flatten().iter().enumerate() {
                let position = positions.get(index).copied().unwrap_or_default();
                println!("{}", format_message_line(index + 1, message, position));
            }
        }
        HistoryCommand::Tree { id } => {
            let graph = load_graph(&storage, &id).await?;
            print!("{}", render_tree(&graph));
        }
        HistoryCommand::Delete { id } => {
            storage.delete(&id).await?;
            println!("{}", format!("Deleted chat {}", id).green());
        }
    }

    Ok(())
}

async fn load_graph(store: &dyn ChatStore, id: &str) -> Result<ChatGraph> {
    let record = store
        .load(id)
        .await?
        .ok_or_else(|| ChatloomError::Command(format!("Chat not found: {}", id)))?;

    println!(
        "{} {}",
        record.title.as_deref().unwrap_or("(untitled)").bold(),
        format!("[{}]", record.id()).dimmed()
    );
    if !record.character_ids.is_empty() {
        println!("Characters: {}", record.character_ids.join(", "));
    }
    println!();

    Ok(ChatGraph::load(record.snapshot))
}

/// Print the stored chats as a table
pub async fn print_chat_list(store: &dyn ChatStore) -> Result<()> {
    let chats = store.list().await?;

    if chats.is_empty() {
        println!("{}", "No chat history found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "Title".bold(),
        "Characters".bold(),
        "Turns".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for chat in chats {
        let id_short: String = chat.id.chars().take(8).collect();
        let title = truncate(chat.title.as_deref().unwrap_or("-"), 40);
        let characters = if chat.character_ids.is_empty() {
            "-".to_string()
        } else {
            chat.character_ids.join(", ")
        };
        let updated = chat.updated_at.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            id_short.cyan(),
            title,
            characters,
            chat.vertex_count.saturating_sub(1),
            chat.message_count,
            updated
        ]);
    }

    println!("\nChat History:");
    table.printstd();
    println!();
    Ok(())
}

/// Sibling position of every message on the active path, in transcript order
pub fn sibling_positions(graph: &ChatGraph) -> Vec<SiblingPosition> {
    graph
        .get_parents(graph.active_vertex())
        .into_iter()
        .flat_map(|vertex| {
            let position = graph.sibling_position(&vertex.id).unwrap_or_default();
            std::iter::repeat(position).take(vertex.messages.len())
        })
        .collect()
}

/// One transcript line: number, role, branch position and text
pub fn format_message_line(index: usize, message: &ChatMessage, position: SiblingPosition) -> String {
    let role = match message.role {
        Role::User => message.role.to_string().cyan(),
        Role::Assistant => message.role.to_string().green(),
        Role::System => message.role.to_string().yellow(),
    };
    let branch = if position.total > 1 {
        format!(" <{}/{}>", position.current, position.total)
    } else {
        String::new()
    };

    format!(
        "{} {}{}: {}",
        format!("[{}]", index).dimmed(),
        role.bold(),
        branch.magenta(),
        message.text()
    )
}

/// Renders the branch tree, one line per vertex
///
/// `>` marks the active vertex and `*` the other vertices on its path.
pub fn render_tree(graph: &ChatGraph) -> String {
    let active_path: HashSet<&str> = graph
        .get_parents(graph.active_vertex())
        .into_iter()
        .map(|vertex| vertex.id.as_str())
        .collect();

    let mut out = String::new();
    let mut stack = vec![(graph.id(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let Some(vertex) = graph.get_vertex(id) else {
            continue;
        };

        let marker = if id == graph.active_vertex() {
            ">"
        } else if active_path.contains(id) {
            "*"
        } else {
            " "
        };
        let label = if vertex.is_root() {
            "root".to_string()
        } else {
            short_id(id)
        };
        let preview = match vertex.messages.first() {
            Some(message) => format!("{}: {}", message.role, truncate(&message.text(), 48)),
            None => "(empty)".to_string(),
        };
        let extra = match vertex.messages.len() {
            0 | 1 => String::new(),
            n => format!(" (+{} more)", n - 1),
        };

        out.push_str(&format!(
            "{} {}{} {}{}\n",
            marker,
            "  ".repeat(depth),
            label,
            preview,
            extra
        ));

        stack.extend(
            vertex
                .children
                .iter()
                .rev()
                .map(|child| (child.as_str(), depth + 1)),
        );
    }

    out
}

fn short_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    chars[chars.len().saturating_sub(6)..].iter().collect()
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> (ChatGraph, String, String) {
        let mut graph = ChatGraph::with_id("chat");
        let a = graph
            .create_vertex("chat", vec![ChatMessage::user("first question")])
            .unwrap();
        let b = graph
            .create_vertex("chat", vec![ChatMessage::user("second question")])
            .unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_render_tree_marks_active_path() {
        let (graph, a, b) = sample_graph();
        let rendered = render_tree(&graph);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("* root"));
        assert!(lines[1].contains(&short_id(&a)));
        assert!(lines[1].starts_with("   "));
        assert!(lines[2].starts_with(">"));
        assert!(lines[2].contains(&short_id(&b)));
        assert!(lines[2].contains("user: second question"));
    }

    #[test]
    fn test_sibling_positions_follow_transcript() {
        let (graph, _a, _b) = sample_graph();
        let positions = sibling_positions(&graph);
        assert_eq!(
            positions,
            vec![SiblingPosition {
                current: 2,
                total: 2
            }]
        );
    }

    #[test]
    fn test_format_message_line_shows_branch_position() {
        colored::control::set_override(false);
        let line = format_message_line(
            3,
            &ChatMessage::assistant("hello"),
            SiblingPosition {
                current: 1,
                total: 2,
            },
        );
        assert_eq!(line, "[3] assistant <1/2>: hello");

        let line = format_message_line(1, &ChatMessage::user("hi"), SiblingPosition::default());
        assert_eq!(line, "[1] user: hi");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
        assert_eq!(truncate("line\nbreak", 20), "line break");
    }
}
