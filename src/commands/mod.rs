/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`: Interactive branching chat
- `history`: Inspect and manage stored chats

The handlers stay thin and delegate to the library components: storage,
providers, and the graph sync manager.
*/

pub mod chat;
pub mod history;
pub mod special_commands;
