//! Runs operator commands against the catalog.
//!
//! A command is validated first; a bad payload is rejected without touching
//! storage or writing a command row. A valid command runs inside one
//! transaction together with its own success row, so a remote failure halfway
//! through leaves the previous catalog in place. Remote failures are then
//! recorded as a `failure` row; storage failures are returned to the caller.

use rusqlite::Connection;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{CatalogError, Result, ValidationError};
use crate::model::{Command, CommandKind, CommandRequest, CommandStatus, Commodity, Tag, User};
use crate::remote::CatalogApi;
use crate::store::{self, Entity, Store};
use crate::sync::{SyncOptions, SyncOrchestrator};

/// Example payload shown to the operator when a `sync_item` payload is rejected.
pub const SYNC_ITEM_EXAMPLE: &str = r#"{"tag_ids": [1, 2]}"#;
const MAX_REASON_CHARS: usize = 255;

/// Lifecycle of one command run. Only the terminal phases are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPhase {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl CommandPhase {
    pub fn advance(self, next: CommandPhase) -> Result<CommandPhase> {
        use CommandPhase::*;
        match (self, next) {
            (Pending, Processing) | (Processing, Succeeded) | (Processing, Failed) => Ok(next),
            _ => Err(CatalogError::State("illegal command phase transition")),
        }
    }

    pub fn status(self) -> Option<CommandStatus> {
        match self {
            CommandPhase::Succeeded => Some(CommandStatus::Success),
            CommandPhase::Failed => Some(CommandStatus::Failure),
            CommandPhase::Pending | CommandPhase::Processing => None,
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandPlan {
    Noop,
    SyncItems { tag_ids: Vec<i64> },
    SyncTags,
}

fn invalid_extra(message: &str) -> ValidationError {
    ValidationError::new(message).with_expected(SYNC_ITEM_EXAMPLE)
}

fn parse_tag_ids(extra: Option<&str>) -> std::result::Result<Vec<i64>, ValidationError> {
    let raw = extra.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(invalid_extra("extra is required for sync_item"));
    };
    let value: Value =
        serde_json::from_str(raw).map_err(|_| invalid_extra("extra is not valid JSON"))?;
    let Some(list) = value.get("tag_ids") else {
        return Err(invalid_extra("extra must contain tag_ids"));
    };
    let Some(list) = list.as_array() else {
        return Err(invalid_extra("tag_ids must be a list"));
    };

    let mut tag_ids = Vec::with_capacity(list.len());
    for v in list {
        match v.as_i64() {
            Some(id) => tag_ids.push(id),
            None => return Err(invalid_extra("tag_ids must contain integers")),
        }
    }
    if tag_ids.is_empty() {
        return Err(invalid_extra("tag_ids must not be empty"));
    }
    Ok(tag_ids)
}

/// Check a request and turn it into a plan. Nothing is written.
pub fn validate(request: &CommandRequest) -> std::result::Result<CommandPlan, ValidationError> {
    let reason = request.reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::new("reason is required"));
    }
    if reason.chars().count() > MAX_REASON_CHARS {
        return Err(ValidationError::new(format!(
            "reason must be at most {MAX_REASON_CHARS} characters"
        )));
    }

    Ok(match request.kind {
        CommandKind::Default => CommandPlan::Noop,
        CommandKind::SyncItem => CommandPlan::SyncItems {
            tag_ids: parse_tag_ids(request.extra.as_deref())?,
        },
        CommandKind::SyncTag => CommandPlan::SyncTags,
    })
}

pub struct CommandProcessor<'c, C> {
    store: Store<'c>,
    sync: SyncOrchestrator<'c, C>,
}

impl<'c, C: CatalogApi> CommandProcessor<'c, C> {
    pub fn new(conn: &'c Connection, api: &'c C, options: SyncOptions) -> Self {
        Self {
            store: Store::new(conn),
            sync: SyncOrchestrator::new(api, options),
        }
    }

    pub fn store(&self) -> &Store<'c> {
        &self.store
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator<'c, C> {
        &self.sync
    }

    /// Handle a newly created command and store its record.
    pub fn submit(&self, request: &CommandRequest) -> Result<Command> {
        let plan = validate(request)?;
        self.run(request, &plan, |conn, status, diagnostics| {
            store::create_command(conn, request, status, diagnostics)
        })
    }

    /// Handle an edited command: re-run it and overwrite the stored record.
    pub fn resubmit(&self, id: i64, request: &CommandRequest) -> Result<Command> {
        let plan = validate(request)?;
        let existing = self
            .store
            .get_by_id::<Command>(id)?
            .ok_or(CatalogError::NotFound {
                entity: Command::TABLE,
                id,
            })?;

        self.run(request, &plan, |conn, status, diagnostics| {
            let updated = Command {
                kind: request.kind,
                reason: request.reason.clone(),
                extra: request.extra.clone(),
                status,
                diagnostics: diagnostics.map(str::to_string),
                ..existing.clone()
            };
            updated.update(conn)?;
            Ok(updated)
        })
    }

    fn run<F>(&self, request: &CommandRequest, plan: &CommandPlan, write: F) -> Result<Command>
    where
        F: Fn(&Connection, CommandStatus, Option<&str>) -> Result<Command>,
    {
        let phase = CommandPhase::Pending.advance(CommandPhase::Processing)?;
        info!(kind = ?request.kind, reason = %request.reason, "command processing");

        let outcome = self.store.with_tx(|tx| {
            let conn: &Connection = tx;
            self.execute(conn, plan)?;
            write(conn, CommandStatus::Success, None)
        });

        match outcome {
            Ok(command) => {
                phase.advance(CommandPhase::Succeeded)?;
                info!(id = command.id, kind = ?command.kind, "command succeeded");
                Ok(command)
            }
            Err(err) if err.is_remote() => {
                let failed = phase.advance(CommandPhase::Failed)?;
                warn!(kind = ?request.kind, error = %err, "command failed; catalog left unchanged");
                let status = failed
                    .status()
                    .ok_or(CatalogError::State("failed phase has no status"))?;
                let diagnostics = err.to_string();
                self.store.with_tx(|tx| {
                    let conn: &Connection = tx;
                    write(conn, status, Some(diagnostics.as_str()))
                })
            }
            Err(err) => Err(err),
        }
    }

    fn execute(&self, conn: &Connection, plan: &CommandPlan) -> Result<()> {
        match plan {
            CommandPlan::Noop => Ok(()),
            CommandPlan::SyncItems { tag_ids } => {
                let deleted = store::delete_all::<Commodity>(conn)?;
                info!(nums_deleted = deleted, "commodities deleted");
                let items = self.sync.sync_commodities(tag_ids)?;
                store::insert_all(conn, &items)?;
                info!(inserted = items.len(), "commodities inserted");
                Ok(())
            }
            CommandPlan::SyncTags => {
                let deleted = store::delete_all::<Tag>(conn)?;
                info!(nums_deleted = deleted, "tags deleted");
                let tags = self.sync.sync_tags()?;
                store::insert_all(conn, &tags)?;
                info!(inserted = tags.len(), "tags inserted");
                Ok(())
            }
        }
    }

    /// Add each item to the tag group managed by `user_id`. Stops at the first failure.
    pub fn tag_items_for_user(&self, user_id: i64, item_ids: &[i64]) -> Result<usize> {
        let user = self
            .store
            .get_by_id::<User>(user_id)?
            .ok_or(CatalogError::NotFound {
                entity: User::TABLE,
                id: user_id,
            })?;
        let Some(tag_id) = user.tag_id else {
            return Err(ValidationError::new(format!(
                "user {} has no tag group",
                user.username
            ))
            .into());
        };

        info!(user_id, tag_id, items = ?item_ids, "tagging items");
        for &item_id in item_ids {
            self.sync.associate_item_with_tag(item_id, tag_id)?;
        }
        Ok(item_ids.len())
    }
}
