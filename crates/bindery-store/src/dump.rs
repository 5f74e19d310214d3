//! Human-readable dump of every table.

use crate::buckets::raw::SEP;
use crate::error::StoreResult;
use crate::kv::{KvRead, decode};
use crate::store::Store;
use std::fmt::Write;

impl Store {
    /// Render every namespace as an indented tree. Thumbnails are shown as
    /// `*EXISTS*`, titles and usernames decoded, other values by size.
    pub fn dump(&self) -> StoreResult<String> {
        self.view(|t| {
            let mut out = String::new();
            render_table(&mut out, "catalog", &t.catalog)?;
            render_table(&mut out, "users", &t.users)?;
            render_table(&mut out, "downloads", &t.downloads)?;
            Ok(out)
        })
    }
}

fn render_table<K: KvRead + ?Sized>(out: &mut String, name: &str, kv: &K) -> StoreResult<()> {
    let _ = writeln!(out, "{name}/");
    for (key, value) in kv.scan_prefix("")? {
        let mut segments: Vec<&str> = key.split(SEP).collect();
        let leaf = segments.pop().unwrap_or_default();
        let depth = segments.len();
        if leaf.is_empty() {
            // Namespace marker
            let namespace = segments.last().copied().unwrap_or_default();
            let _ = writeln!(out, "{:width$}{namespace}/", "", width = depth * 2);
        } else {
            let rendered = render_value(leaf, &value);
            let _ = writeln!(out, "{:width$}{leaf}: {rendered}", "", width = (depth + 1) * 2);
        }
    }
    Ok(())
}

fn render_value(leaf: &str, value: &[u8]) -> String {
    match leaf {
        "thumbnail" => "*EXISTS*".to_string(),
        "title" | "username" => {
            decode::<String>(value).unwrap_or_else(|_| format!("<{} bytes>", value.len()))
        }
        _ => format!("<{} bytes>", value.len()),
    }
}
