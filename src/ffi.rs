//! C ABI for the admin UI host.
//!
//! The host opens a handle, forwards operator actions, and renders the JSON it
//! gets back. Every JSON result is an envelope: `{"ok": true, ...}` or
//! `{"ok": false, "error": "...", "kind": "...", "expected": ...}`.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{CatalogConfig, Profile};
use crate::error::{CatalogError, Result};
use crate::format::{CommodityRow, command_kind_label, command_status_label, user_type_label};
use crate::logging::init_tracing;
use crate::model::{Command, CommandKind, CommandRequest, Commodity, Tag, User};
use crate::processor::CommandProcessor;
use crate::remote::RemoteCatalogClient;
use crate::store::Store;
use crate::sync::SyncOptions;

/// Opaque handle that owns the database connection and the remote client.
/// The host holds this as an unsafe pointer and passes it back to every call.
pub struct CatalogHandle {
    conn: Connection,
    api: RemoteCatalogClient,
    options: SyncOptions,
}

impl CatalogHandle {
    pub fn new(conn: Connection, config: &CatalogConfig) -> Result<Self> {
        Store::new(&conn).init_schema()?;
        Ok(Self {
            conn,
            api: RemoteCatalogClient::new(config)?,
            options: SyncOptions::from(config),
        })
    }

    fn processor(&self) -> CommandProcessor<'_, RemoteCatalogClient> {
        CommandProcessor::new(&self.conn, &self.api, self.options)
    }
}

fn ptr_to_str<'a>(ptr: *const c_char) -> std::result::Result<&'a str, ()> {
    if ptr.is_null() {
        return Err(());
    }
    unsafe { CStr::from_ptr(ptr).to_str().map_err(|_| ()) }
}

fn opt_ptr_to_str<'a>(ptr: *const c_char) -> std::result::Result<Option<&'a str>, ()> {
    if ptr.is_null() {
        return Ok(None);
    }
    Ok(Some(ptr_to_str(ptr)?))
}

fn to_cstring_ptr(s: &str) -> *mut c_char {
    CString::new(s).map(|cs| cs.into_raw()).unwrap_or(std::ptr::null_mut())
}

fn error_envelope(err: &CatalogError) -> Value {
    match err {
        CatalogError::Validation(v) => json!({
            "ok": false,
            "kind": "validation",
            "error": v.message,
            "expected": v.expected,
        }),
        CatalogError::Remote(_) => json!({ "ok": false, "kind": "remote", "error": err.to_string() }),
        CatalogError::NotFound { .. } => json!({ "ok": false, "kind": "not_found", "error": err.to_string() }),
        _ => json!({ "ok": false, "kind": "internal", "error": err.to_string() }),
    }
}

fn bad_argument(what: &str) -> *mut c_char {
    to_cstring_ptr(&json!({ "ok": false, "kind": "argument", "error": what }).to_string())
}

/// Serialize `Ok(v)` as `{"ok": true, <key>: v}` and errors as an error envelope.
fn respond<T: Serialize>(key: &str, result: Result<T>) -> *mut c_char {
    let body = match result.and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(v) => {
            let mut env = serde_json::Map::new();
            env.insert("ok".into(), Value::Bool(true));
            env.insert(key.into(), v);
            Value::Object(env)
        }
        Err(err) => error_envelope(&err),
    };
    to_cstring_ptr(&body.to_string())
}

fn with_handle<'a>(handle: *mut CatalogHandle) -> Option<&'a CatalogHandle> {
    unsafe { handle.as_ref() }
}

/// Unknown codes run as the no-op default command.
fn command_kind(code: i64) -> CommandKind {
    CommandKind::from_code(code).unwrap_or_else(|| {
        warn!(code, "unrecognized command code; treating as default command");
        CommandKind::Default
    })
}

#[derive(Serialize)]
struct CommandRow<'a> {
    #[serde(flatten)]
    command: &'a Command,
    kind_label: &'static str,
    status_label: &'static str,
}

#[derive(Serialize)]
struct UserRow<'a> {
    #[serde(flatten)]
    user: &'a User,
    type_label: &'static str,
}

/// Free a string returned by this library.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    unsafe {
        let _ = CString::from_raw(s);
    }
}

/// A bad config is reported through the fallback subscriber, since the
/// configured filter is unknown.
fn usable_config(loaded: Result<CatalogConfig>) -> Option<CatalogConfig> {
    match loaded {
        Ok(config) => Some(config),
        Err(e) => {
            let _ = init_tracing(Profile::Online.default_log_filter());
            warn!(error = %e, "catalog_open: configuration invalid");
            None
        }
    }
}

/// Load configuration from the environment and open the database.
/// `db_path` overrides the configured path when non-null. Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_open(db_path: *const c_char) -> *mut CatalogHandle {
    let path = match opt_ptr_to_str(db_path) {
        Ok(p) => p,
        Err(_) => return std::ptr::null_mut(),
    };
    let Some(config) = usable_config(CatalogConfig::from_env()) else {
        return std::ptr::null_mut();
    };
    // A host may open more than once; the first subscriber stays.
    let _ = init_tracing(config.log_filter());

    let path = path.unwrap_or(config.db_path.as_str());
    let opened = Connection::open(path)
        .map_err(CatalogError::from)
        .and_then(|conn| CatalogHandle::new(conn, &config));
    match opened {
        Ok(handle) => {
            info!(path, profile = ?config.profile, "catalog opened");
            Box::into_raw(Box::new(handle))
        }
        Err(e) => {
            warn!(path, error = %e, "catalog_open failed");
            std::ptr::null_mut()
        }
    }
}

/// Close a previously opened handle.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_close(handle: *mut CatalogHandle) {
    if handle.is_null() {
        return;
    }
    unsafe {
        let _ = Box::from_raw(handle);
    }
}

/// Create and run a command. `extra_json` may be null. Returns a JSON envelope
/// with the stored command, or a validation error showing the expected payload.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_submit_command(
    handle: *mut CatalogHandle,
    kind: i64,
    reason: *const c_char,
    extra_json: *const c_char, // nullable
) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let (Ok(reason), Ok(extra)) = (ptr_to_str(reason), opt_ptr_to_str(extra_json)) else {
        return bad_argument("reason/extra must be UTF-8 strings");
    };
    let request = CommandRequest::new(command_kind(kind), reason, extra);
    respond("command", h.processor().submit(&request))
}

/// Edit command `id` and run it again.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_resubmit_command(
    handle: *mut CatalogHandle,
    id: i64,
    kind: i64,
    reason: *const c_char,
    extra_json: *const c_char, // nullable
) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let (Ok(reason), Ok(extra)) = (ptr_to_str(reason), opt_ptr_to_str(extra_json)) else {
        return bad_argument("reason/extra must be UTF-8 strings");
    };
    let request = CommandRequest::new(command_kind(kind), reason, extra);
    respond("command", h.processor().resubmit(id, &request))
}

/// Add items to the tag group of `user_id`.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_tag_items(
    handle: *mut CatalogHandle,
    user_id: i64,
    item_ids: *const i64,
    len: usize,
) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    if item_ids.is_null() && len > 0 {
        return bad_argument("null item_ids");
    }
    let items: &[i64] = if len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(item_ids, len) }
    };
    respond("tagged", h.processor().tag_items_for_user(user_id, items))
}

/// Create a tag on the remote platform.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_create_tag(handle: *mut CatalogHandle, name: *const c_char) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let Ok(name) = ptr_to_str(name) else { return bad_argument("name must be a UTF-8 string") };
    respond("tag_id", h.processor().orchestrator().create_remote_tag(name))
}

#[unsafe(no_mangle)]
pub extern "C" fn catalog_list_commodities_json(handle: *mut CatalogHandle) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let rows = Store::new(&h.conn)
        .list_all::<Commodity>()
        .map(|items| items.iter().map(CommodityRow::from).collect::<Vec<_>>());
    respond("commodities", rows)
}

#[unsafe(no_mangle)]
pub extern "C" fn catalog_list_tags_json(handle: *mut CatalogHandle) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    respond("tags", Store::new(&h.conn).list_all::<Tag>())
}

/// Commands, newest first.
#[unsafe(no_mangle)]
pub extern "C" fn catalog_list_commands_json(handle: *mut CatalogHandle) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let body = Store::new(&h.conn).list_all::<Command>().and_then(|commands| {
        let rows: Vec<CommandRow<'_>> = commands
            .iter()
            .rev()
            .map(|command| CommandRow {
                command,
                kind_label: command_kind_label(command.kind),
                status_label: command_status_label(command.status),
            })
            .collect();
        Ok(serde_json::to_value(rows)?)
    });
    respond("commands", body)
}

#[unsafe(no_mangle)]
pub extern "C" fn catalog_list_users_json(handle: *mut CatalogHandle) -> *mut c_char {
    let Some(h) = with_handle(handle) else { return bad_argument("null handle") };
    let body = Store::new(&h.conn).list_all::<User>().and_then(|users| {
        let rows: Vec<UserRow<'_>> = users
            .iter()
            .map(|user| UserRow {
                user,
                type_label: user_type_label(user.user_type),
            })
            .collect();
        Ok(serde_json::to_value(rows)?)
    });
    respond("users", body)
}
