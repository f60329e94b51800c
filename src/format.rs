//! Display rules for the admin grids.

use serde::Serialize;

use crate::model::{CommandKind, CommandStatus, Commodity, UserType};

/// Render minor currency units as a two-decimal amount: `1999` -> `"19.99"`.
pub fn format_price(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub fn image_html(url: &str) -> String {
    format!(
        r#"<img src="{}" alt="" style="width: 75px; height: 75px">"#,
        escape_attr(url)
    )
}

pub fn detail_link_html(url: &str) -> String {
    format!(r#"<a href="{}">View details</a>"#, escape_attr(url))
}

pub fn command_kind_label(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Default => "Default command",
        CommandKind::SyncItem => "Reset commodities",
        CommandKind::SyncTag => "Reset tags",
    }
}

pub fn command_status_label(status: CommandStatus) -> &'static str {
    match status {
        CommandStatus::Success => "Success",
        CommandStatus::Failure => "Failure",
    }
}

pub fn user_type_label(user_type: UserType) -> &'static str {
    match user_type {
        UserType::Regular => "Regular",
        UserType::Admin => "Admin",
    }
}

/// A commodity with its display columns already rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommodityRow {
    pub item_id: i64,
    pub title: String,
    pub price: String,
    pub image: String,
    pub detail_url: String,
}

impl From<&Commodity> for CommodityRow {
    fn from(c: &Commodity) -> Self {
        Self {
            item_id: c.item_id,
            title: c.title.clone(),
            price: format_price(c.price),
            image: image_html(&c.image),
            detail_url: detail_link_html(&c.detail_url),
        }
    }
}
